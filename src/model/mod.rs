// Model module - recurrent sequence classifier
//
// Architecture:
// - encoder: stacked LSTM / BiLSTM / GRU layers
// - attention: additive attention pooling over time
// - checkpoint: safetensors weights + JSON sidecar
// - mod.rs: configuration, device selection, SequenceClassifier
//
// Data flow: (B, T, F) features -> encoder (B, T, D) -> pooling (B, D)
// -> head -> (B, num_classes) logits. Without attention, pooling takes the
// final time step.

mod attention;
mod checkpoint;
mod encoder;

pub use attention::AttentionPooling;
pub use checkpoint::{sidecar_path, CheckpointMeta};
pub use encoder::RecurrentEncoder;

use crate::error::ModelError;
use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recurrent cell family used by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrentVariant {
    /// Uni-directional LSTM
    Lstm,
    /// Forward + backward LSTM, outputs concatenated
    BiLstm,
    /// Gated recurrent unit
    Gru,
}

impl RecurrentVariant {
    /// 2 for bidirectional encoders, 1 otherwise
    pub fn directions(self) -> usize {
        match self {
            RecurrentVariant::BiLstm => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for RecurrentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrentVariant::Lstm => "lstm",
            RecurrentVariant::BiLstm => "bilstm",
            RecurrentVariant::Gru => "gru",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RecurrentVariant {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lstm" => Ok(RecurrentVariant::Lstm),
            "bilstm" | "bi-lstm" => Ok(RecurrentVariant::BiLstm),
            "gru" => Ok(RecurrentVariant::Gru),
            other => Err(ModelError::InvalidConfig {
                reason: format!("unknown recurrent variant '{}'", other),
            }),
        }
    }
}

/// Classifier hyperparameters, fixed once the model is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f32,
    pub num_classes: usize,
    pub variant: RecurrentVariant,
    pub learning_rate: f64,
    pub use_attention: bool,
    pub attention_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 39,
            hidden_size: 128,
            num_layers: 2,
            dropout: 0.3,
            num_classes: 2,
            variant: RecurrentVariant::Lstm,
            learning_rate: 1e-3,
            use_attention: true,
            attention_size: 64,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: &str| {
            Err(ModelError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.input_size == 0 || self.hidden_size == 0 {
            return invalid("input_size and hidden_size must be > 0");
        }
        if self.num_layers == 0 {
            return invalid("num_layers must be >= 1");
        }
        if self.num_classes < 2 {
            return invalid("num_classes must be >= 2");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid("dropout must lie in [0, 1)");
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return invalid("learning_rate must be > 0");
        }
        if self.use_attention && self.attention_size == 0 {
            return invalid("attention_size must be > 0 when attention is enabled");
        }
        Ok(())
    }

    /// Width of the encoder output
    pub fn encoder_output_size(&self) -> usize {
        self.hidden_size * self.variant.directions()
    }
}

/// Resolve "cpu", "cuda", "cuda:N" or "metal" to a candle device
pub fn parse_device(name: &str) -> Result<Device, ModelError> {
    let requested = name.trim().to_lowercase();
    let unavailable = |err: candle_core::Error| ModelError::Device {
        requested: requested.clone(),
        reason: err.to_string(),
    };
    match requested.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0).map_err(unavailable),
        "metal" => Device::new_metal(0).map_err(unavailable),
        other => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
            Some(Ok(ordinal)) => Device::new_cuda(ordinal).map_err(unavailable),
            _ => Err(ModelError::Device {
                requested: requested.clone(),
                reason: "expected cpu, cuda, cuda:N or metal".to_string(),
            }),
        },
    }
}

/// Recurrent encoder + optional attention + MLP head
///
/// Parameters live in the model's own [`VarMap`], which the training loop
/// hands to the optimizer and the checkpoint code serializes.
pub struct SequenceClassifier {
    config: ModelConfig,
    device: Device,
    varmap: VarMap,
    encoder: RecurrentEncoder,
    attention: Option<AttentionPooling>,
    dropout: Dropout,
    hidden: Linear,
    output: Linear,
}

impl SequenceClassifier {
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self, ModelError> {
        config.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let encoder = RecurrentEncoder::new(
            config.variant,
            config.input_size,
            config.hidden_size,
            config.num_layers,
            config.dropout,
            vb.pp("encoder"),
        )?;
        let encoded = encoder.output_size();
        let attention = if config.use_attention {
            Some(AttentionPooling::new(
                encoded,
                config.attention_size,
                vb.pp("attention"),
            )?)
        } else {
            None
        };
        let head_size = (encoded / 2).max(64);
        let hidden = linear(encoded, head_size, vb.pp("head.hidden"))?;
        let output = linear(head_size, config.num_classes, vb.pp("head.output"))?;

        log::debug!(
            "[SequenceClassifier] Built {} encoder: {} layers x {} units, attention={}",
            config.variant,
            config.num_layers,
            config.hidden_size,
            config.use_attention
        );

        Ok(Self {
            dropout: Dropout::new(config.dropout),
            config,
            device: device.clone(),
            varmap,
            encoder,
            attention,
            hidden,
            output,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Lift (B, F) inputs to a single time step
    fn as_sequence(xs: &Tensor) -> Result<Tensor, ModelError> {
        match xs.rank() {
            2 => Ok(xs.unsqueeze(1)?),
            3 => Ok(xs.clone()),
            rank => Err(ModelError::InvalidConfig {
                reason: format!("expected (B, T, F) or (B, F) input, got rank {}", rank),
            }),
        }
    }

    /// Encoder hidden states, shape (B, T, D)
    pub fn encode(&self, xs: &Tensor, train: bool) -> Result<Tensor, ModelError> {
        let xs = Self::as_sequence(xs)?;
        Ok(self.encoder.forward(&xs, train)?)
    }

    fn pool(&self, hidden: &Tensor) -> Result<(Tensor, Option<Tensor>), ModelError> {
        match &self.attention {
            Some(attention) => {
                let (context, weights) = attention.forward(hidden)?;
                Ok((context, Some(weights)))
            }
            None => {
                let steps = hidden.dim(1)?;
                let last = hidden.narrow(1, steps - 1, 1)?.squeeze(1)?;
                Ok((last, None))
            }
        }
    }

    fn head(&self, pooled: &Tensor, train: bool) -> Result<Tensor, ModelError> {
        let xs = self.dropout.forward(pooled, train)?;
        let xs = self.hidden.forward(&xs)?.relu()?;
        let xs = self.dropout.forward(&xs, train)?;
        Ok(self.output.forward(&xs)?)
    }

    /// Pooling and head over precomputed encoder states (B, T, D)
    pub fn classify_encoded(&self, hidden: &Tensor, train: bool) -> Result<Tensor, ModelError> {
        let (pooled, _) = self.pool(hidden)?;
        self.head(&pooled, train)
    }

    /// Logits, shape (B, num_classes)
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor, ModelError> {
        let hidden = self.encode(xs, train)?;
        self.classify_encoded(&hidden, train)
    }

    /// Evaluation-mode logits and, with attention, the (B, T) weights
    pub fn forward_with_attention(
        &self,
        xs: &Tensor,
    ) -> Result<(Tensor, Option<Tensor>), ModelError> {
        let hidden = self.encode(xs, false)?;
        let (pooled, weights) = self.pool(&hidden)?;
        Ok((self.head(&pooled, false)?, weights))
    }

    /// Evaluation-mode class probabilities, shape (B, num_classes)
    pub fn probabilities(&self, xs: &Tensor) -> Result<Tensor, ModelError> {
        let logits = self.forward(xs, false)?;
        Ok(candle_nn::ops::softmax(&logits, 1)?)
    }
}
