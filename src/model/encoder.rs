// Recurrent encoder - stacked LSTM / BiLSTM / GRU layers
//
// Input and output are batch-major (B, T, ·). A bidirectional layer runs a
// second LSTM over the time-reversed sequence and re-reverses its outputs
// before concatenating, so position t always pairs forward and backward
// states for the same frame.

use super::RecurrentVariant;
use candle_core::{Result, Tensor, D};
use candle_nn::rnn::{gru, lstm, GRUConfig, LSTMConfig, GRU, LSTM, RNN};
use candle_nn::{Dropout, VarBuilder};

enum RecurrentLayer {
    Lstm(LSTM),
    BiLstm { forward: LSTM, backward: LSTM },
    Gru(GRU),
}

impl RecurrentLayer {
    fn build(
        variant: RecurrentVariant,
        input_size: usize,
        hidden_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(match variant {
            RecurrentVariant::Lstm => {
                RecurrentLayer::Lstm(lstm(input_size, hidden_size, LSTMConfig::default(), vb)?)
            }
            RecurrentVariant::BiLstm => RecurrentLayer::BiLstm {
                forward: lstm(
                    input_size,
                    hidden_size,
                    LSTMConfig::default(),
                    vb.pp("forward"),
                )?,
                backward: lstm(
                    input_size,
                    hidden_size,
                    LSTMConfig::default(),
                    vb.pp("backward"),
                )?,
            },
            RecurrentVariant::Gru => {
                RecurrentLayer::Gru(gru(input_size, hidden_size, GRUConfig::default(), vb)?)
            }
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            RecurrentLayer::Lstm(cell) => run_lstm(cell, xs),
            RecurrentLayer::Gru(cell) => {
                // GRU::states_to_tensor concatenates along dim 1, giving (B, T*H)
                let states = cell.seq(xs)?;
                let hidden: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
                Tensor::stack(&hidden, 1)
            }
            RecurrentLayer::BiLstm { forward, backward } => {
                let fwd = run_lstm(forward, xs)?;
                let reversed = reverse_time(xs)?;
                let bwd = reverse_time(&run_lstm(backward, &reversed)?)?;
                Tensor::cat(&[&fwd, &bwd], D::Minus1)
            }
        }
    }
}

fn run_lstm(cell: &LSTM, xs: &Tensor) -> Result<Tensor> {
    let states = cell.seq(xs)?;
    cell.states_to_tensor(&states)
}

/// Reverse a (B, T, F) tensor along the time axis
pub(crate) fn reverse_time(xs: &Tensor) -> Result<Tensor> {
    let steps = xs.dim(1)?;
    let order: Vec<u32> = (0..steps as u32).rev().collect();
    let index = Tensor::new(order.as_slice(), xs.device())?;
    xs.index_select(&index, 1)
}

/// Stacked recurrent encoder producing (B, T, output_size)
pub struct RecurrentEncoder {
    layers: Vec<RecurrentLayer>,
    dropout: Dropout,
    output_size: usize,
}

impl RecurrentEncoder {
    pub fn new(
        variant: RecurrentVariant,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let directions = variant.directions();
        let mut layers = Vec::with_capacity(num_layers);
        let mut layer_input = input_size;
        for idx in 0..num_layers {
            layers.push(RecurrentLayer::build(
                variant,
                layer_input,
                hidden_size,
                vb.pp(format!("layer_{}", idx)),
            )?);
            layer_input = hidden_size * directions;
        }
        Ok(Self {
            layers,
            dropout: Dropout::new(dropout),
            output_size: hidden_size * directions,
        })
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Encode a (B, T, F) batch; inter-layer dropout only when `train`
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut hidden = xs.contiguous()?;
        let last = self.layers.len().saturating_sub(1);
        for (idx, layer) in self.layers.iter().enumerate() {
            hidden = layer.forward(&hidden)?;
            if idx < last {
                hidden = self.dropout.forward(&hidden, train)?;
            }
        }
        Ok(hidden)
    }
}
