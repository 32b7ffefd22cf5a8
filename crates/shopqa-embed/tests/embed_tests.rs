use shopqa_core::config::EmbeddingSettings;
use shopqa_core::traits::Embedder as _;
use shopqa_core::Error;
use shopqa_embed::{load_embedder, HashingEmbedder};

fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, ..EmbeddingSettings::default() };
    let embedder = load_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 384);
    assert_eq!(embedder.model_id(), "hashing:xxh64:d384");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    let v1 = &embs[0];
    let v2 = &embs[1];
    assert_eq!(v1.len(), 384, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    assert_eq!(v1, v2);
    assert_eq!(embedder.embed_one("hello world").unwrap(), *v1);
}

#[test]
fn hashing_embedder_ignores_case_and_punctuation() {
    let e = HashingEmbedder::new(64);
    assert_eq!(e.embed_text("Dry, HAIR!"), e.embed_text("dry hair"));
}

#[test]
fn hashing_embedder_empty_text_is_zero_vector() {
    let e = HashingEmbedder::new(16);
    assert_eq!(e.embed_text("  ... "), vec![0.0; 16]);
}

#[test]
fn shared_words_mean_smaller_distance() {
    let e = HashingEmbedder::new(384);
    let q = e.embed_text("dry hair treatment");
    let a = e.embed_text("for dry hair");
    let b = e.embed_text("for oily hair");
    assert!(l2(&q, &a) < l2(&q, &b), "a={} b={}", l2(&q, &a), l2(&q, &b));
}

#[test]
fn missing_model_dir_is_model_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = EmbeddingSettings {
        model_dir: Some(tmp.path().join("no-such-model")),
        ..EmbeddingSettings::default()
    };
    match load_embedder(&settings) {
        Err(Error::ModelUnavailable(msg)) => assert!(msg.contains("no-such-model"), "{msg}"),
        Err(other) => panic!("expected ModelUnavailable, got {other:?}"),
        Ok(_) => panic!("expected ModelUnavailable, got an embedder"),
    }
}

#[test]
fn incomplete_model_dir_is_model_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("config.json"), "{}").unwrap();
    let settings = EmbeddingSettings { model_dir: Some(tmp.path().to_path_buf()), ..EmbeddingSettings::default() };
    assert!(matches!(load_embedder(&settings), Err(Error::ModelUnavailable(_))));
}

/// Needs the all-MiniLM-L6-v2 files locally:
/// `APP_MODEL_DIR=/path/to/all-MiniLM-L6-v2 cargo test -p shopqa-embed -- --ignored`
#[ignore]
#[test]
fn sentence_embedder_real_model() {
    let settings = EmbeddingSettings {
        model_dir: std::env::var("APP_MODEL_DIR").ok().map(Into::into),
        ..EmbeddingSettings::default()
    };
    let embedder = load_embedder(&settings).expect("model");
    assert_eq!(embedder.dim(), 384);
    let texts = vec!["dry hair treatment".to_string(), "for dry hair".to_string(), "for oily hair".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed");
    for v in &embs {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
    assert!(l2(&embs[0], &embs[1]) < l2(&embs[0], &embs[2]));
    let again = embedder.embed_one("dry hair treatment").expect("embed one");
    assert!(l2(&again, &embs[0]) < 1e-6);
}
