//! Sentence embeddings from a local BERT checkpoint (all-MiniLM-L6-v2 by default).
//!
//! The model directory must hold `config.json`, `tokenizer.json` and either
//! `model.safetensors` or `pytorch_model.bin`. Output vectors are mean-pooled
//! over real tokens and L2-normalized.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use shopqa_core::config::EmbeddingSettings;
use shopqa_core::traits::Embedder;
use shopqa_core::{Embedding, Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{prepare_tokenizer, tokenize_batch};

#[derive(Deserialize)]
struct Dims { hidden_size: usize }

pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

impl SentenceEmbedder {
    /// Load the configured model. Every failure is [`Error::ModelUnavailable`].
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings)?;
        Self::load_from_dir(&model_dir, &settings.model, settings.max_len)
            .map_err(|e| Error::ModelUnavailable(format!("{} ({}): {:#}", settings.model, model_dir.display(), e)))
    }

    fn load_from_dir(model_dir: &Path, model_name: &str, max_len: usize) -> anyhow::Result<Self> {
        let started = Instant::now();
        let device = select_device();
        info!(model = model_name, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        prepare_tokenizer(&mut tokenizer, max_len)?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dims: Dims = serde_json::from_str(&raw_config)?;
        let hidden_size = dims.hidden_size;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;

        let id = format!("bert:{}:d{}", short_name(model_name), hidden_size);
        info!(model = %id, elapsed_ms = started.elapsed().as_millis() as u64, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: hidden_size, id })
    }

    fn embed_tensor(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let rows = self.embed_tensor(texts).map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, got: bad.len() });
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 1000 { warn!(batch = texts.len(), elapsed_ms = elapsed as u64, "slow embedding batch"); }
        debug!(batch = texts.len(), elapsed_ms = elapsed as u64, "embedded batch");
        Ok(rows)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> anyhow::Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        let mut map = HashMap::with_capacity(weights.len());
        for (name, tensor) in weights { map.insert(name, tensor.to_device(device)?); }
        return Ok(map);
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// `sentence-transformers/all-MiniLM-L6-v2` -> `all-MiniLM-L6-v2`
fn short_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Resolve the model directory: explicit setting, then `models/<name>`, then `../models/<name>`.
pub fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir {
        if dir.exists() { return Ok(dir.clone()); }
        return Err(Error::ModelUnavailable(format!("model directory {} does not exist", dir.display())));
    }
    let name = short_name(&settings.model);
    let candidates = [Path::new("models").join(name), Path::new("../models").join(name)];
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        debug!(dir = %found.display(), "using model dir");
        return Ok(found.clone());
    }
    Err(Error::ModelUnavailable(format!(
        "could not locate model directory for '{}' (set embedding.model_dir or APP_MODEL_DIR)",
        settings.model
    )))
}
