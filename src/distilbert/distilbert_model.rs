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

use crate::common::activations::Activation;
use crate::distilbert::embeddings::DistilBertEmbedding;
use crate::distilbert::transformer::Transformer;
use crate::{Config, MlmExportError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # DistilBERT Pretrained model weight files
pub struct DistilBertModelResources;

/// # DistilBERT Pretrained model config files
pub struct DistilBertConfigResources;

/// # DistilBERT Pretrained model vocab files
pub struct DistilBertVocabResources;

impl DistilBertModelResources {
    /// Shared under Apache 2.0 license by the Hugging Face Inc. team at <https://huggingface.co/distilbert-base-uncased>. Modified with conversion to C-array format.
    pub const DISTIL_BERT: (&'static str, &'static str) = (
        "distilbert/model",
        "https://huggingface.co/distilbert-base-uncased/resolve/main/rust_model.ot",
    );
}

impl DistilBertConfigResources {
    /// Shared under Apache 2.0 license by the Hugging Face Inc. team at <https://huggingface.co/distilbert-base-uncased>. Modified with conversion to C-array format.
    pub const DISTIL_BERT: (&'static str, &'static str) = (
        "distilbert/config",
        "https://huggingface.co/distilbert-base-uncased/resolve/main/config.json",
    );
}

impl DistilBertVocabResources {
    /// Shared under Apache 2.0 license by the Google team at <https://github.com/google-research/bert>. Modified with conversion to C-array format.
    pub const DISTIL_BERT: (&'static str, &'static str) = (
        "distilbert/vocab",
        "https://huggingface.co/bert-base-uncased/resolve/main/vocab.txt",
    );
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// # DistilBERT model configuration
/// Defines the DistilBERT model architecture (e.g. number of layers, hidden layer size, vocabulary size...)
pub struct DistilBertConfig {
    pub activation: Activation,
    pub attention_dropout: f64,
    pub dim: i64,
    pub dropout: f64,
    pub hidden_dim: i64,
    pub initializer_range: f32,
    pub max_position_embeddings: i64,
    pub n_heads: i64,
    pub n_layers: i64,
    pub sinusoidal_pos_embds: bool,
    pub vocab_size: i64,
    pub pad_token_id: Option<i64>,
}

impl Config for DistilBertConfig {}

impl Default for DistilBertConfig {
    fn default() -> Self {
        DistilBertConfig {
            activation: Activation::gelu,
            attention_dropout: 0.1,
            dim: 768,
            dropout: 0.1,
            hidden_dim: 3072,
            initializer_range: 0.02,
            max_position_embeddings: 512,
            n_heads: 12,
            n_layers: 6,
            sinusoidal_pos_embds: false,
            vocab_size: 30522,
            pad_token_id: Some(0),
        }
    }
}

impl DistilBertConfig {
    pub fn validate(&self) -> Result<(), MlmExportError> {
        if self.n_heads <= 0 || self.dim % self.n_heads != 0 {
            return Err(MlmExportError::InvalidConfigurationError(format!(
                "Dimension ({}) not a multiple of the number of attention heads ({})",
                self.dim, self.n_heads
            )));
        }
        if self.vocab_size <= 0 {
            return Err(MlmExportError::InvalidConfigurationError(
                "Vocabulary size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// # DistilBERT Base model
/// Base architecture for DistilBERT models. It is made of the following blocks:
/// - `embeddings`: `token` and `position` embeddings
/// - `transformer`: Transformer made of a vector of layers. Each layer is made of a multi-head attention layer, layer-normalization layers and a feed-forward network
pub struct DistilBertModel {
    embeddings: DistilBertEmbedding,
    transformer: Transformer,
}

impl DistilBertModel {
    /// Build a new `DistilBertModel`. Variables are registered under `p / "distilbert"`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mlm_export::distilbert::{DistilBertConfig, DistilBertModel};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let config = DistilBertConfig::default();
    /// let distil_bert = DistilBertModel::new(vs.root(), &config);
    /// ```
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> DistilBertModel
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "distilbert";
        let embeddings = DistilBertEmbedding::new(&p / "embeddings", config);
        let transformer = Transformer::new(&p / "transformer", config);
        DistilBertModel {
            embeddings,
            transformer,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Input tensor of shape (*batch size*, *sequence_length*)
    /// * `mask` - Mask of shape (*batch size*, *sequence_length*). Masked position have value 0, non-masked value 1.
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *sequence_length*, *dim*)
    pub fn forward(&self, input_ids: &Tensor, mask: &Tensor) -> Result<Tensor, MlmExportError> {
        if mask.dim() != 2 {
            return Err(MlmExportError::ValueError(format!(
                "Invalid attention mask dimension {}, must be 2",
                mask.dim()
            )));
        }
        let input_embeddings = self.embeddings.forward(input_ids);
        self.transformer.forward(&input_embeddings, mask)
    }
}

/// # DistilBERT for masked language model
/// Base DistilBERT model with a masked language model head to predict missing tokens, for example `"Looks like one [MASK] is missing" -> "person"`
/// It is made of the following blocks:
/// - `distil_bert_model`: Base DistilBertModel
/// - `vocab_transform`:linear layer for classification of size (*hidden_dim*, *hidden_dim*)
/// - `vocab_layer_norm`: layer normalization
/// - `vocab_projector`: linear layer for classification of size (*hidden_dim*, *vocab_size*)
pub struct DistilBertModelMaskedLM {
    distil_bert_model: DistilBertModel,
    vocab_transform: nn::Linear,
    activation: fn(&Tensor) -> Tensor,
    vocab_layer_norm: nn::LayerNorm,
    vocab_projector: nn::Linear,
}

impl DistilBertModelMaskedLM {
    /// Build a new `DistilBertModelMaskedLM` for masked language prediction
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mlm_export::distilbert::{DistilBertConfig, DistilBertModelMaskedLM};
    /// use mlm_export::Config;
    /// use std::path::Path;
    /// use tch::{nn, Device};
    ///
    /// let config_path = Path::new("path/to/config.json");
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let config = DistilBertConfig::from_file(config_path)?;
    /// let distil_bert = DistilBertModelMaskedLM::new(vs.root(), &config);
    /// # Ok::<(), mlm_export::MlmExportError>(())
    /// ```
    pub fn new<'p, P>(p: P, config: &DistilBertConfig) -> DistilBertModelMaskedLM
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let distil_bert_model = DistilBertModel::new(p, config);
        let vocab_transform = nn::linear(
            p / "vocab_transform",
            config.dim,
            config.dim,
            Default::default(),
        );
        let layer_norm_config = nn::LayerNormConfig {
            eps: 1e-12,
            ..Default::default()
        };
        let vocab_layer_norm =
            nn::layer_norm(p / "vocab_layer_norm", vec![config.dim], layer_norm_config);
        let vocab_projector = nn::linear(
            p / "vocab_projector",
            config.dim,
            config.vocab_size,
            Default::default(),
        );

        let activation = config.activation.get_function();

        DistilBertModelMaskedLM {
            distil_bert_model,
            vocab_transform,
            activation,
            vocab_layer_norm,
            vocab_projector,
        }
    }

    /// Forward pass through the model
    ///
    /// # Returns
    ///
    /// * `DistilBertMaskedLMOutput` containing:
    ///   - `prediction_scores` - `Tensor` of shape (*batch size*, *sequence_length*, *vocab_size*)
    ///   - `hidden_state` - `Tensor` of shape (*batch size*, *sequence_length*, *dim*)
    pub fn forward(
        &self,
        input_ids: &Tensor,
        mask: &Tensor,
    ) -> Result<DistilBertMaskedLMOutput, MlmExportError> {
        let hidden_state = self.distil_bert_model.forward(input_ids, mask)?;

        let prediction_scores = (self.activation)(&hidden_state.apply(&self.vocab_transform))
            .apply(&self.vocab_layer_norm)
            .apply(&self.vocab_projector);

        Ok(DistilBertMaskedLMOutput {
            prediction_scores,
            hidden_state,
        })
    }
}

/// Container for the DistilBERT masked LM model output.
pub struct DistilBertMaskedLMOutput {
    /// Logits for the vocabulary items at each sequence position
    pub prediction_scores: Tensor,
    /// Last hidden states from the base model
    pub hidden_state: Tensor,
}

#[cfg(test)]
mod test {
    use super::*;
    use tch::{no_grad, Device, Kind};

    fn tiny_config() -> DistilBertConfig {
        DistilBertConfig {
            dim: 16,
            hidden_dim: 24,
            n_heads: 2,
            n_layers: 2,
            max_position_embeddings: 32,
            vocab_size: 40,
            ..Default::default()
        }
    }

    #[test]
    fn masked_lm_scores_cover_vocabulary() -> Result<(), MlmExportError> {
        let config = tiny_config();
        let vs = nn::VarStore::new(Device::Cpu);
        let model = DistilBertModelMaskedLM::new(vs.root(), &config);

        let input_ids = Tensor::randint(config.vocab_size, [1, 9], (Kind::Int64, Device::Cpu));
        let mask = Tensor::ones([1, 9], (Kind::Int64, Device::Cpu));
        let output = no_grad(|| model.forward(&input_ids, &mask))?;

        assert_eq!(output.prediction_scores.size(), vec![1, 9, 40]);
        assert_eq!(output.hidden_state.size(), vec![1, 9, 16]);
        Ok(())
    }

    #[test]
    fn prediction_head_uses_configured_activation() -> Result<(), MlmExportError> {
        let config = DistilBertConfig {
            activation: Activation::relu,
            ..tiny_config()
        };
        let vs = nn::VarStore::new(Device::Cpu);
        let model = DistilBertModelMaskedLM::new(vs.root(), &config);

        let input_ids = Tensor::randint(config.vocab_size, [1, 6], (Kind::Int64, Device::Cpu));
        let mask = Tensor::ones([1, 6], (Kind::Int64, Device::Cpu));
        let output = no_grad(|| model.forward(&input_ids, &mask))?;

        let transformed = output.hidden_state.apply(&model.vocab_transform);
        let expected_relu = transformed
            .relu()
            .apply(&model.vocab_layer_norm)
            .apply(&model.vocab_projector);
        let gelu_scores = transformed
            .gelu("none")
            .apply(&model.vocab_layer_norm)
            .apply(&model.vocab_projector);

        let relu_difference = (&output.prediction_scores - expected_relu)
            .abs()
            .max()
            .double_value(&[]);
        let gelu_difference = (&output.prediction_scores - gelu_scores)
            .abs()
            .max()
            .double_value(&[]);
        assert!(relu_difference < 1e-6);
        assert!(gelu_difference > 1e-6);
        Ok(())
    }

    #[test]
    fn masked_positions_do_not_change_unmasked_outputs() -> Result<(), MlmExportError> {
        let config = tiny_config();
        let vs = nn::VarStore::new(Device::Cpu);
        let model = DistilBertModelMaskedLM::new(vs.root(), &config);

        let mask = Tensor::from_slice(&[1i64, 1, 1, 0]).unsqueeze(0);
        let first = Tensor::from_slice(&[5i64, 6, 7, 8]).unsqueeze(0);
        let second = Tensor::from_slice(&[5i64, 6, 7, 30]).unsqueeze(0);

        let first_scores = no_grad(|| model.forward(&first, &mask))?.prediction_scores;
        let second_scores = no_grad(|| model.forward(&second, &mask))?.prediction_scores;

        let difference = (first_scores.narrow(1, 0, 3) - second_scores.narrow(1, 0, 3))
            .abs()
            .max()
            .double_value(&[]);
        assert!(difference < 1e-5);
        Ok(())
    }

    #[test]
    fn parameter_names_match_pretrained_weights() {
        let config = tiny_config();
        let vs = nn::VarStore::new(Device::Cpu);
        let _ = DistilBertModelMaskedLM::new(vs.root(), &config);
        let variables = vs.variables();

        for name in [
            "distilbert.embeddings.word_embeddings.weight",
            "distilbert.embeddings.position_embeddings.weight",
            "distilbert.embeddings.LayerNorm.bias",
            "distilbert.transformer.layer.0.attention.q_lin.weight",
            "distilbert.transformer.layer.1.attention.out_lin.bias",
            "distilbert.transformer.layer.1.sa_layer_norm.weight",
            "distilbert.transformer.layer.0.ffn.lin1.weight",
            "distilbert.transformer.layer.0.output_layer_norm.bias",
            "vocab_transform.weight",
            "vocab_layer_norm.weight",
            "vocab_projector.bias",
        ] {
            assert!(variables.contains_key(name), "missing variable {name}");
        }
    }
}
