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

use crate::common::kind::get_negative_infinity;
use crate::distilbert::distilbert_model::DistilBertConfig;
use crate::MlmExportError;
use std::borrow::Borrow;
use tch::{nn, Tensor};

#[derive(Debug)]
pub struct MultiHeadSelfAttention {
    n_heads: i64,
    dim_per_head: i64,
    q_lin: nn::Linear,
    k_lin: nn::Linear,
    v_lin: nn::Linear,
    out_lin: nn::Linear,
}

impl MultiHeadSelfAttention {
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> MultiHeadSelfAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let q_lin = nn::linear(p / "q_lin", config.dim, config.dim, Default::default());
        let k_lin = nn::linear(p / "k_lin", config.dim, config.dim, Default::default());
        let v_lin = nn::linear(p / "v_lin", config.dim, config.dim, Default::default());
        let out_lin = nn::linear(p / "out_lin", config.dim, config.dim, Default::default());

        MultiHeadSelfAttention {
            n_heads: config.n_heads,
            dim_per_head: config.dim / config.n_heads,
            q_lin,
            k_lin,
            v_lin,
            out_lin,
        }
    }

    fn shape(&self, x: Tensor, bs: i64) -> Tensor {
        x.view((bs, -1, self.n_heads, self.dim_per_head))
            .transpose(1, 2)
    }

    fn unshape(&self, x: Tensor, bs: i64) -> Tensor {
        x.transpose(1, 2)
            .contiguous()
            .view((bs, -1, self.n_heads * self.dim_per_head))
    }

    /// `mask` has shape (*batch size*, *sequence_length*), positions with value 0 are not attended to
    pub fn forward(&self, input: &Tensor, mask: &Tensor) -> Result<Tensor, MlmExportError> {
        let bs = input.size()[0];
        let k_length = input.size()[1];

        let q = self.shape(input.apply(&self.q_lin), bs);
        let k = self.shape(input.apply(&self.k_lin), bs);
        let v = self.shape(input.apply(&self.v_lin), bs);
        let q: Tensor = q / (self.dim_per_head as f64).sqrt();

        let scores = q.matmul(&k.transpose(2, 3));
        let mask = mask.le(0).view((bs, 1i64, 1i64, k_length)).expand_as(&scores);
        let scores = scores.masked_fill(&mask, get_negative_infinity(scores.kind())?);
        let weights = scores.softmax(-1, scores.kind());

        Ok(self.unshape(weights.matmul(&v), bs).apply(&self.out_lin))
    }
}
