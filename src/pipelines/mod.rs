//! # Conversion pipeline
//!
//! The pipeline turns a pretrained masked language model into the artifacts consumed by the
//! `WordPredictor` application:
//!
//! | Artifact | Module |
//! | --- | --- |
//! | `vocab.json`, `merges.txt` | [`tokenizer_artifacts`] |
//! | traced forward pass | [`masked_language`], [`trace`] |
//! | `WordPredictor.mlpackage` | [`mobile_package`] |
//!
//! [`conversion`] chains these steps for one model and provides the single fallback from BERT
//! base to DistilBERT base:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mlm_export::pipelines::conversion::{ConversionConfig, ModelConverter};
//!
//! let converter = ModelConverter::new(ConversionConfig::distilbert_base_uncased());
//! let report = converter.convert()?;
//! assert_eq!(report.output_shape, vec![1, 128, 30522]);
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod conversion;
pub mod masked_language;
pub mod mobile_package;
pub mod tokenizer_artifacts;
pub mod trace;
