// Copyright 2019-present, the HuggingFace Inc. team, The Google AI Language Team and Facebook, Inc.
// Copyright (c) 2018, NVIDIA CORPORATION.  All rights reserved.
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

use crate::bert::attention::{BertAttention, BertIntermediate, BertResidualOutput};
use crate::bert::bert_model::BertConfig;
use std::borrow::Borrow;
use tch::{nn, Tensor};

pub struct BertLayer {
    attention: BertAttention,
    intermediate: BertIntermediate,
    output: BertResidualOutput,
}

impl BertLayer {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertLayer
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let attention = BertAttention::new(p / "attention", config);
        let intermediate = BertIntermediate::new(p / "intermediate", config);
        let output = BertResidualOutput::new(p / "output", config.intermediate_size, config);

        BertLayer {
            attention,
            intermediate,
            output,
        }
    }

    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Tensor {
        let attention_output = self.attention.forward(hidden_states, mask);
        let output = self.intermediate.forward(&attention_output);
        self.output.forward(&output, &attention_output)
    }
}

/// # Stack of `num_hidden_layers` BERT transformer layers
pub struct BertEncoder {
    layers: Vec<BertLayer>,
}

impl BertEncoder {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertEncoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "layer";
        let layers = (0..config.num_hidden_layers)
            .map(|layer_index| BertLayer::new(&p / layer_index, config))
            .collect();

        BertEncoder { layers }
    }

    pub fn forward(&self, input: &Tensor, mask: &Tensor) -> Tensor {
        self.layers
            .iter()
            .fold(input.shallow_clone(), |hidden_state, layer| {
                layer.forward(&hidden_state, mask)
            })
    }
}
