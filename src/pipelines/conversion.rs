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

//! # Conversion pipeline
//! Converts a pretrained masked language model to a mobile model package, together with the
//! tokenizer artifacts the application needs:
//! 1. load the tokenizer, configuration and weights (downloaded and cached on first use)
//! 2. write `vocab.json` and the placeholder `merges.txt`
//! 3. trace the forward pass on fixed-shape inputs and check the traced output shape
//! 4. write `WordPredictor.mlpackage`
//!
//! `convert_with_fallback` runs a first conversion (BERT base by default) and, whatever the
//! cause of a failure, retries exactly once with a second configuration (DistilBERT).
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mlm_export::pipelines::conversion::{convert_with_fallback, ConversionConfig};
//!
//! let report = convert_with_fallback(
//!     ConversionConfig::bert_base_uncased(),
//!     ConversionConfig::distilbert_base_uncased(),
//! )?;
//! println!("Package written to {}", report.package_path.display());
//! # Ok(())
//! # }
//! ```
use crate::common::error::MlmExportError;
use crate::pipelines::common::{ConfigOption, ModelType};
use crate::pipelines::masked_language::MaskedLanguageOption;
use crate::pipelines::mobile_package::{
    DeploymentTarget, MobilePackage, ModelDescription, PACKAGE_EXTENSION,
};
use crate::pipelines::tokenizer_artifacts::{
    save_vocabulary, write_merges_placeholder, MERGES_FILE_NAME, VOCAB_FILE_NAME,
};
use crate::pipelines::trace::{trace_masked_lm, verify_traced_module, ExampleInputs};
use crate::resources::ResourceProvider;
use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer};
use rust_tokenizers::vocab::Vocab;
use std::any::Any;
use std::ffi::OsString;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tch::nn::VarStore;
use tch::Device;

#[cfg(feature = "remote")]
use crate::{
    bert::{BertConfigResources, BertModelResources, BertVocabResources},
    distilbert::{DistilBertConfigResources, DistilBertModelResources, DistilBertVocabResources},
    resources::RemoteResource,
};

/// Name of the package (and of the application consuming it)
pub const DEFAULT_PACKAGE_NAME: &str = "WordPredictor";
/// Fixed batch size of the traced graph
pub const DEFAULT_BATCH_SIZE: i64 = 1;
/// Fixed sequence length of the traced graph
pub const DEFAULT_SEQUENCE_LENGTH: i64 = 128;

/// Default output directory: `MLM_EXPORT_OUTPUT_DIR` if set, otherwise `Predict/Predict` under
/// the crate directory.
///
/// The crate directory is resolved at compile time (`CARGO_MANIFEST_DIR`): a binary installed
/// with `cargo install` keeps writing to the checkout it was built from. Set
/// `MLM_EXPORT_OUTPUT_DIR` to write elsewhere.
pub fn default_output_dir() -> PathBuf {
    output_dir_from(std::env::var_os("MLM_EXPORT_OUTPUT_DIR"))
}

fn output_dir_from(value: Option<OsString>) -> PathBuf {
    match value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("Predict")
            .join("Predict"),
    }
}

/// # Configuration for a model conversion
/// Contains the resources of the model to convert, the fixed shapes of the traced graph and the
/// location of the written artifacts.
pub struct ConversionConfig {
    /// Name of the pretrained model, recorded in the package description
    pub model_name: String,
    /// Model type
    pub model_type: ModelType,
    /// Model weights resource (default: pretrained BERT base uncased)
    pub model_resource: Box<dyn ResourceProvider + Send>,
    /// Config resource (default: pretrained BERT base uncased)
    pub config_resource: Box<dyn ResourceProvider + Send>,
    /// Vocab resource (default: pretrained BERT base uncased)
    pub vocab_resource: Box<dyn ResourceProvider + Send>,
    /// Automatically lower case all input upon tokenization (assumes a lower-cased model)
    pub lower_case: bool,
    /// Flag indicating if the tokenizer should strip accents (normalization)
    pub strip_accents: Option<bool>,
    /// Directory receiving `vocab.json`, `merges.txt` and the model package
    pub output_dir: PathBuf,
    /// Name of the package directory, without extension
    pub package_name: String,
    pub batch_size: i64,
    pub sequence_length: i64,
    pub minimum_deployment_target: DeploymentTarget,
    /// Device used for tracing (default: CPU)
    pub device: Device,
}

impl ConversionConfig {
    /// Instantiate a new conversion configuration of the supplied type, writing to
    /// `default_output_dir()`.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the pretrained model (e.g. `bert-base-uncased`)
    /// * `model_type` - `ModelType` indicating the model type to load (must match with the actual data to be loaded!)
    /// * `model_resource` - The `ResourceProvider` pointing to the model weights to load (e.g. rust_model.ot)
    /// * `config_resource` - The `ResourceProvider` pointing to the model configuration to load (e.g. config.json)
    /// * `vocab_resource` - The `ResourceProvider` pointing to the tokenizer's vocabulary to load (e.g. vocab.txt)
    /// * `lower_case` - A `bool` indicating whether the tokenizer should lower case all input (in case of a lower-cased model)
    pub fn new<RM, RC, RV>(
        model_name: &str,
        model_type: ModelType,
        model_resource: RM,
        config_resource: RC,
        vocab_resource: RV,
        lower_case: bool,
    ) -> ConversionConfig
    where
        RM: ResourceProvider + Send + 'static,
        RC: ResourceProvider + Send + 'static,
        RV: ResourceProvider + Send + 'static,
    {
        ConversionConfig {
            model_name: model_name.to_string(),
            model_type,
            model_resource: Box::new(model_resource),
            config_resource: Box::new(config_resource),
            vocab_resource: Box::new(vocab_resource),
            lower_case,
            strip_accents: None,
            output_dir: default_output_dir(),
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            minimum_deployment_target: DeploymentTarget::default(),
            device: Device::Cpu,
        }
    }

    /// Sets the directory receiving the converted artifacts
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> ConversionConfig {
        self.output_dir = output_dir.into();
        self
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.output_dir.join(VOCAB_FILE_NAME)
    }

    pub fn merges_path(&self) -> PathBuf {
        self.output_dir.join(MERGES_FILE_NAME)
    }

    pub fn package_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{PACKAGE_EXTENSION}", self.package_name))
    }
}

#[cfg(feature = "remote")]
impl ConversionConfig {
    /// BERT base (uncased), 12 layers, 30522 token vocabulary
    pub fn bert_base_uncased() -> ConversionConfig {
        ConversionConfig::new(
            "bert-base-uncased",
            ModelType::Bert,
            RemoteResource::from_pretrained(BertModelResources::BERT),
            RemoteResource::from_pretrained(BertConfigResources::BERT),
            RemoteResource::from_pretrained(BertVocabResources::BERT),
            true,
        )
    }

    /// DistilBERT base (uncased), 6 layers, sharing the BERT base vocabulary
    pub fn distilbert_base_uncased() -> ConversionConfig {
        ConversionConfig::new(
            "distilbert-base-uncased",
            ModelType::DistilBert,
            RemoteResource::from_pretrained(DistilBertModelResources::DISTIL_BERT),
            RemoteResource::from_pretrained(DistilBertConfigResources::DISTIL_BERT),
            RemoteResource::from_pretrained(DistilBertVocabResources::DISTIL_BERT),
            true,
        )
    }
}

#[cfg(feature = "remote")]
impl Default for ConversionConfig {
    /// Provides the BERT base (uncased) conversion
    fn default() -> ConversionConfig {
        ConversionConfig::bert_base_uncased()
    }
}

#[derive(Debug, Clone)]
/// # Summary of a successful conversion
pub struct ConversionReport {
    pub model_name: String,
    pub model_type: ModelType,
    /// Number of entries written to `vocab.json`
    pub vocab_size: usize,
    /// Shape of the prediction scores returned by the traced graph
    pub output_shape: Vec<i64>,
    pub vocab_path: PathBuf,
    pub merges_path: PathBuf,
    pub package_path: PathBuf,
}

/// # Converts one pretrained masked language model
pub struct ModelConverter {
    config: ConversionConfig,
}

impl ModelConverter {
    pub fn new(config: ConversionConfig) -> ModelConverter {
        ModelConverter { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Runs the conversion. Tokenizer artifacts are written before tracing and are left in
    /// place if a later step fails. The package is only replaced once fully written.
    pub fn convert(&self) -> Result<ConversionReport, MlmExportError> {
        let config = &self.config;
        log::info!(
            "Loading {} tokenizer and model ({})",
            config.model_type,
            config.model_name
        );

        let vocab_path = config.vocab_resource.get_local_path()?;
        let config_path = config.config_resource.get_local_path()?;
        let weights_path = config.model_resource.get_local_path()?;
        log::debug!(
            "resources: vocabulary {}, configuration {}, weights {}",
            vocab_path.display(),
            config_path.display(),
            weights_path.display()
        );

        let tokenizer = BertTokenizer::from_file(
            &vocab_path,
            config.lower_case,
            config.strip_accents.unwrap_or(config.lower_case),
        )?;
        let model_config = ConfigOption::from_file(config.model_type, &config_path)?;
        model_config.validate()?;
        if config.sequence_length > model_config.max_position_embeddings() {
            return Err(MlmExportError::InvalidConfigurationError(format!(
                "Sequence length {} exceeds the maximum number of positions of the model ({})",
                config.sequence_length,
                model_config.max_position_embeddings()
            )));
        }

        let mut var_store = VarStore::new(config.device);
        let model = MaskedLanguageOption::new(config.model_type, var_store.root(), &model_config)?;
        var_store.load(&weights_path)?;
        var_store.freeze();
        log::info!("{} model loaded", config.model_type);

        fs::create_dir_all(&config.output_dir)?;
        let vocab_output = config.vocab_path();
        let vocab_size = save_vocabulary(tokenizer.vocab(), &vocab_output)?;
        log::info!(
            "Saved vocabulary ({vocab_size} tokens) to {}",
            vocab_output.display()
        );
        let merges_output = config.merges_path();
        write_merges_placeholder(&merges_output)?;
        log::info!("Saved placeholder merges file to {}", merges_output.display());

        log::info!(
            "Tracing model with inputs of shape [{}, {}]",
            config.batch_size,
            config.sequence_length
        );
        let token_id_range = model_config
            .vocab_size()
            .min(tokenizer.vocab().values().len() as i64);
        let example_inputs = ExampleInputs::new(
            token_id_range,
            config.batch_size,
            config.sequence_length,
            config.device,
        )?;
        let traced = trace_masked_lm(&model, &example_inputs, &config.package_name)?;
        let output_shape = verify_traced_module(
            &traced,
            &example_inputs,
            &[
                config.batch_size,
                config.sequence_length,
                model_config.vocab_size(),
            ],
        )?;

        log::info!(
            "Writing model package (minimum deployment target {})",
            config.minimum_deployment_target
        );
        let description = ModelDescription::masked_lm(
            &config.model_name,
            config.batch_size,
            config.sequence_length,
            model_config.vocab_size(),
            config.minimum_deployment_target,
        );
        let package_path = MobilePackage::new(description).save(&traced, config.package_path())?;
        log::info!("Model saved to {}", package_path.display());

        Ok(ConversionReport {
            model_name: config.model_name.clone(),
            model_type: config.model_type,
            vocab_size,
            output_shape,
            vocab_path: vocab_output,
            merges_path: merges_output,
            package_path,
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `attempt`, turning a panic raised by the tensor library into an error.
fn run_guarded<T, F>(attempt: F) -> Result<T, MlmExportError>
where
    F: FnOnce() -> Result<T, MlmExportError>,
{
    match panic::catch_unwind(AssertUnwindSafe(attempt)) {
        Ok(result) => result,
        Err(payload) => Err(MlmExportError::TchError(panic_message(payload))),
    }
}

/// Runs `primary`; if it fails for any reason, logs troubleshooting hints and runs `fallback`
/// exactly once. If both fail, both errors are returned in `MlmExportError::ConversionFailed`.
pub fn run_with_fallback<T, P, F>(primary: P, fallback: F) -> Result<T, MlmExportError>
where
    P: FnOnce() -> Result<T, MlmExportError>,
    F: FnOnce() -> Result<T, MlmExportError>,
{
    let primary_error = match run_guarded(primary) {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };
    log::warn!("Conversion failed: {primary_error}");
    log::warn!("Troubleshooting:");
    log::warn!("  1. Make sure libtorch is installed and can be found (LIBTORCH)");
    log::warn!("  2. Check the available disk space (BERT base weights are ~400MB)");
    log::warn!("  3. Trying the smaller distilbert-base-uncased model");

    run_guarded(fallback).map_err(|fallback_error| {
        log::warn!("Fallback conversion failed: {fallback_error}");
        MlmExportError::ConversionFailed {
            primary: Box::new(primary_error),
            fallback: Box::new(fallback_error),
        }
    })
}

/// Converts `primary`, falling back to `fallback` on any failure.
pub fn convert_with_fallback(
    primary: ConversionConfig,
    fallback: ConversionConfig,
) -> Result<ConversionReport, MlmExportError> {
    run_with_fallback(
        || ModelConverter::new(primary).convert(),
        || {
            log::info!("Retrying with {}", fallback.model_name);
            ModelConverter::new(fallback).convert()
        },
    )
}
