//! Export of BERT-style masked language models to a mobile model package.
//!
//! The crate provides the BERT and DistilBERT masked language model architectures on top of
//! [tch-rs](https://github.com/LaurentMazare/tch-rs), with parameter names matching the
//! pretrained `rust_model.ot` weight files published on the Hugging Face hub. A conversion loads
//! a pretrained model, writes the tokenizer vocabulary, traces the forward pass on fixed-shape
//! inputs and saves the traced graph as a `WordPredictor.mlpackage` directory.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mlm_export::pipelines::conversion::{convert_with_fallback, ConversionConfig};
//!
//! let report = convert_with_fallback(
//!     ConversionConfig::bert_base_uncased(),
//!     ConversionConfig::distilbert_base_uncased(),
//! )?;
//! println!(
//!     "{} converted: output shape {:?}, {} vocabulary entries",
//!     report.model_name, report.output_shape, report.vocab_size
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Loading pretrained resources
//!
//! Resources are downloaded with [cached-path](https://crates.io/crates/cached-path) (`remote`
//! feature, enabled by default) to `MLM_EXPORT_CACHE`, or `.mlm-export` in the user cache
//! directory. Local files can be used instead through `LocalResource`:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mlm_export::pipelines::common::ModelType;
//! use mlm_export::pipelines::conversion::{ConversionConfig, ModelConverter};
//! use mlm_export::resources::LocalResource;
//! use std::path::PathBuf;
//!
//! let model_dir = PathBuf::from("path/to/bert-base-uncased");
//! let config = ConversionConfig::new(
//!     "bert-base-uncased",
//!     ModelType::Bert,
//!     LocalResource::from(model_dir.join("rust_model.ot")),
//!     LocalResource::from(model_dir.join("config.json")),
//!     LocalResource::from(model_dir.join("vocab.txt")),
//!     true,
//! )
//! .with_output_dir("output");
//! ModelConverter::new(config).convert()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Progress is reported through the [log](https://crates.io/crates/log) facade. The
//! `convert-model` binary initializes `env_logger` at the `info` level, overridable with
//! `RUST_LOG`.

pub mod bert;
mod common;
pub mod distilbert;
pub mod pipelines;

pub use common::error::MlmExportError;
pub use common::resources;
pub use common::{Activation, Config};
