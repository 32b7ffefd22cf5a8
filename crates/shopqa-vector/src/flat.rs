//! Flat (brute-force) exact L2 index.
//!
//! Vectors are stored row-major in insertion order; row `i` is index position
//! `i`. Search compares the query against every row, so results are exact.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use shopqa_core::{Embedding, Error, Result, SearchHit};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from vectors in position order. All vectors must share one
    /// non-zero dimension.
    pub fn build(embeddings: &[Embedding]) -> Result<Self> {
        let Some(first) = embeddings.first() else { return Ok(Self::empty()) };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidEmbedding("zero-dimensional vector at position 0".into()));
        }
        let mut data = Vec::with_capacity(dim * embeddings.len());
        for v in embeddings {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: v.len() });
            }
            data.extend_from_slice(v);
        }
        Ok(Self { dim, data })
    }

    /// Rebuild from a row-major buffer (used when loading from storage).
    pub fn from_parts(dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::Storage(format!("buffer of {} floats does not hold rows of {}", data.len(), dim)));
        }
        Ok(Self { dim, data })
    }

    /// Vector dimensionality; 0 for an empty index.
    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        let end = start.checked_add(self.dim)?;
        self.data.get(start..end).filter(|row| !row.is_empty())
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on 0
        self.data.chunks_exact(self.dim.max(1))
    }

    pub fn as_slice(&self) -> &[f32] { &self.data }

    /// The `k` nearest rows by squared L2 distance, nearest first; equal
    /// distances resolve to the lower position. Returns `min(k, len)` hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidQuery("k must be greater than zero".into()));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, got: query.len() });
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        for (position, row) in self.vectors().enumerate() {
            let candidate = Candidate { distance: squared_l2(query, row), position };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| SearchHit { position: c.position, distance: c.distance })
            .collect())
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| { let d = x - y; d * d }).sum()
}

/// Heap entry ordered by `(distance, position)`, so the max-heap top is the
/// current worst hit.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    position: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}
