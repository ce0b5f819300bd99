// Copyright 2019-present, the HuggingFace Inc. team, The Google AI Language Team and Facebook, Inc.
// Copyright 2019-2020 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Masked language model adapter
//! Wraps the supported masked language models behind a single forward pass returning the raw
//! prediction scores for every input position. Hidden states returned by the underlying
//! models are dropped, so the traced graph has exactly one output.
use crate::bert::BertForMaskedLM;
use crate::common::error::MlmExportError;
use crate::distilbert::DistilBertModelMaskedLM;
use crate::pipelines::common::{ConfigOption, ModelType};
use std::borrow::Borrow;
use tch::{nn, Tensor};

#[allow(clippy::large_enum_variant)]
/// # Abstraction that holds one particular masked language model, for any of the supported models
pub enum MaskedLanguageOption {
    /// Bert for Masked Language
    Bert(BertForMaskedLM),
    /// DistilBert for Masked Language
    DistilBert(DistilBertModelMaskedLM),
}

impl MaskedLanguageOption {
    /// Instantiate a new masked language model of the supplied type. Variables are registered in
    /// the variable store under `p` and still need to be loaded from the pretrained weights.
    ///
    /// # Arguments
    ///
    /// * `model_type` - `ModelType` indicating the model type to load (must match with the actual data to be loaded!)
    /// * `p` - `tch::nn::Path` path to the model root (e.g. `var_store.root()`)
    /// * `config` - A configuration (the model type of the configuration must be compatible with the value for `model_type`)
    pub fn new<'p, P>(
        model_type: ModelType,
        p: P,
        config: &ConfigOption,
    ) -> Result<Self, MlmExportError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        match (model_type, config) {
            (ModelType::Bert, ConfigOption::Bert(config)) => {
                Ok(MaskedLanguageOption::Bert(BertForMaskedLM::new(p, config)))
            }
            (ModelType::DistilBert, ConfigOption::DistilBert(config)) => Ok(
                MaskedLanguageOption::DistilBert(DistilBertModelMaskedLM::new(p, config)),
            ),
            (model_type, config) => Err(MlmExportError::InvalidConfigurationError(format!(
                "You can only supply a {model_type:?} configuration for {model_type}, got a {:?} configuration",
                config.model_type()
            ))),
        }
    }

    /// Returns the `ModelType` for this MaskedLanguageOption
    pub fn model_type(&self) -> ModelType {
        match *self {
            Self::Bert(_) => ModelType::Bert,
            Self::DistilBert(_) => ModelType::DistilBert,
        }
    }

    /// Interface method to forward() of the particular models, keeping only the prediction scores.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Input tensor of shape (*batch size*, *sequence_length*)
    /// * `attention_mask` - Mask of shape (*batch size*, *sequence_length*). Masked position have value 0, non-masked value 1.
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *sequence_length*, *vocab_size*)
    pub fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor, MlmExportError> {
        Ok(match *self {
            Self::Bert(ref model) => model.forward(input_ids, attention_mask)?.prediction_scores,
            Self::DistilBert(ref model) => {
                model.forward(input_ids, attention_mask)?.prediction_scores
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bert::BertConfig;
    use crate::distilbert::DistilBertConfig;
    use tch::{no_grad, Device, Kind};

    #[test]
    fn adapter_returns_prediction_scores_only() -> Result<(), MlmExportError> {
        let config = ConfigOption::DistilBert(DistilBertConfig {
            dim: 8,
            hidden_dim: 12,
            n_heads: 2,
            n_layers: 1,
            max_position_embeddings: 16,
            vocab_size: 20,
            ..Default::default()
        });
        let vs = nn::VarStore::new(Device::Cpu);
        let model = MaskedLanguageOption::new(ModelType::DistilBert, vs.root(), &config)?;
        assert_eq!(model.model_type(), ModelType::DistilBert);

        let input_ids = Tensor::zeros([1, 5], (Kind::Int64, Device::Cpu));
        let mask = Tensor::ones([1, 5], (Kind::Int64, Device::Cpu));
        let scores = no_grad(|| model.forward(&input_ids, &mask))?;
        assert_eq!(scores.size(), vec![1, 5, 20]);
        Ok(())
    }

    #[test]
    fn config_must_match_model_type() {
        let config = ConfigOption::Bert(BertConfig::default());
        let vs = nn::VarStore::new(Device::Cpu);
        let model = MaskedLanguageOption::new(ModelType::DistilBert, vs.root(), &config);
        assert!(matches!(
            model,
            Err(MlmExportError::InvalidConfigurationError(_))
        ));
    }
}
