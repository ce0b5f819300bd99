// Copyright 2019-present, the HuggingFace Inc. team, The Google AI Language Team and Facebook, Inc.
// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::distilbert::attention::MultiHeadSelfAttention;
use crate::distilbert::distilbert_model::DistilBertConfig;
use crate::MlmExportError;
use std::borrow::Borrow;
use tch::nn::LayerNorm;
use tch::{nn, Tensor};

pub struct FeedForwardNetwork {
    lin1: nn::Linear,
    lin2: nn::Linear,
    activation: fn(&Tensor) -> Tensor,
}

impl FeedForwardNetwork {
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> FeedForwardNetwork
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let lin1 = nn::linear(p / "lin1", config.dim, config.hidden_dim, Default::default());
        let lin2 = nn::linear(p / "lin2", config.hidden_dim, config.dim, Default::default());
        let activation = config.activation.get_function();
        FeedForwardNetwork {
            lin1,
            lin2,
            activation,
        }
    }

    pub fn forward(&self, input: &Tensor) -> Tensor {
        (self.activation)(&input.apply(&self.lin1)).apply(&self.lin2)
    }
}

pub struct TransformerBlock {
    attention: MultiHeadSelfAttention,
    sa_layer_norm: LayerNorm,
    ffn: FeedForwardNetwork,
    output_layer_norm: LayerNorm,
}

impl TransformerBlock {
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> TransformerBlock
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let attention = MultiHeadSelfAttention::new(p / "attention", config);
        let layer_norm_config = nn::LayerNormConfig {
            eps: 1e-12,
            ..Default::default()
        };
        let sa_layer_norm = nn::layer_norm(p / "sa_layer_norm", vec![config.dim], layer_norm_config);
        let ffn = FeedForwardNetwork::new(p / "ffn", config);
        let output_layer_norm =
            nn::layer_norm(p / "output_layer_norm", vec![config.dim], layer_norm_config);

        TransformerBlock {
            attention,
            sa_layer_norm,
            ffn,
            output_layer_norm,
        }
    }

    pub fn forward(&self, input: &Tensor, mask: &Tensor) -> Result<Tensor, MlmExportError> {
        let output = self.attention.forward(input, mask)?;
        let output = (input + &output).apply(&self.sa_layer_norm);
        Ok((&output + self.ffn.forward(&output)).apply(&self.output_layer_norm))
    }
}

pub struct Transformer {
    layers: Vec<TransformerBlock>,
}

impl Transformer {
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> Transformer
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "layer";
        let layers = (0..config.n_layers)
            .map(|layer_index| TransformerBlock::new(&p / layer_index, config))
            .collect();
        Transformer { layers }
    }

    pub fn forward(&self, input: &Tensor, mask: &Tensor) -> Result<Tensor, MlmExportError> {
        let mut hidden_state = input.shallow_clone();
        for layer in &self.layers {
            hidden_state = layer.forward(&hidden_state, mask)?;
        }
        Ok(hidden_state)
    }
}
