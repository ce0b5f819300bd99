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

//! # Common blocks for the conversion pipeline
//!
//! Model family selection and configuration dispatch shared by the conversion steps.
use crate::bert::BertConfig;
use crate::common::error::MlmExportError;
use crate::distilbert::DistilBertConfig;
use crate::Config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
/// # Identifies the type of model
pub enum ModelType {
    Bert,
    DistilBert,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Bert => write!(f, "BERT"),
            ModelType::DistilBert => write!(f, "DistilBERT"),
        }
    }
}

/// # Abstraction that holds a model configuration, can be of any of the supported models
#[derive(Debug, Clone)]
pub enum ConfigOption {
    /// Bert configuration
    Bert(BertConfig),
    /// DistilBert configuration
    DistilBert(DistilBertConfig),
}

impl ConfigOption {
    /// Interface method to load a configuration from file
    pub fn from_file<P: AsRef<Path>>(
        model_type: ModelType,
        path: P,
    ) -> Result<Self, MlmExportError> {
        Ok(match model_type {
            ModelType::Bert => ConfigOption::Bert(BertConfig::from_file(path)?),
            ModelType::DistilBert => ConfigOption::DistilBert(DistilBertConfig::from_file(path)?),
        })
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Self::Bert(_) => ModelType::Bert,
            Self::DistilBert(_) => ModelType::DistilBert,
        }
    }

    /// Size of the prediction head output, i.e. the last dimension of the prediction scores
    pub fn vocab_size(&self) -> i64 {
        match self {
            Self::Bert(config) => config.vocab_size,
            Self::DistilBert(config) => config.vocab_size,
        }
    }

    pub fn max_position_embeddings(&self) -> i64 {
        match self {
            Self::Bert(config) => config.max_position_embeddings,
            Self::DistilBert(config) => config.max_position_embeddings,
        }
    }

    pub fn validate(&self) -> Result<(), MlmExportError> {
        match self {
            Self::Bert(config) => config.validate(),
            Self::DistilBert(config) => config.validate(),
        }
    }
}
