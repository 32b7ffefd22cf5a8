use anyhow::{Result, bail};
use candle_core::{DType, Tensor};

/// Attention-masked mean over the token axis, then L2 normalization.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` with 1 for real
/// tokens and 0 for padding. Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, hidden_dim) = hidden.dims3()?;
    let dtype = hidden.dtype();

    // [B, T] -> [B, T, 1] so it broadcasts over the hidden axis
    let weights = attention_mask.to_device(hidden.device())?.to_dtype(dtype)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
    let counts = weights.sum(1)?;
    let pooled = summed.broadcast_div(&counts)?;

    let eps = match dtype { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norms = (pooled.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let out = pooled.broadcast_div(&norms)?;
    if out.dims() != [batch, hidden_dim].as_slice() {
        bail!("pooled shape {:?}, expected [{}, {}]", out.dims(), batch, hidden_dim);
    }
    Ok(out)
}
