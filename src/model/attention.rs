// Additive attention pooling over encoder time steps
//
// score_t = w2 · tanh(W1 · h_t), alpha = softmax_t(score), context = sum alpha_t h_t

use candle_core::{Result, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

pub struct AttentionPooling {
    projection: Linear,
    score: Linear,
}

impl AttentionPooling {
    pub fn new(input_size: usize, attention_size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            projection: linear(input_size, attention_size, vb.pp("projection"))?,
            score: linear(attention_size, 1, vb.pp("score"))?,
        })
    }

    /// Pool (B, T, D) hidden states into (B, D) context and (B, T) weights
    pub fn forward(&self, hidden: &Tensor) -> Result<(Tensor, Tensor)> {
        let energy = self.projection.forward(hidden)?.tanh()?;
        let scores = self.score.forward(&energy)?.squeeze(2)?;
        let weights = candle_nn::ops::softmax(&scores, 1)?;
        let context = hidden.broadcast_mul(&weights.unsqueeze(2)?)?.sum(1)?;
        Ok((context, weights))
    }
}
