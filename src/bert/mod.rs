//! # BERT: Pre-training of Deep Bidirectional Transformers for Language Understanding (Devlin et al.)
//!
//! Implementation of the BERT masked language model ([https://arxiv.org/abs/1810.04805](https://arxiv.org/abs/1810.04805) Devlin, Chang, Lee, Toutanova, 2018),
//! restricted to inference. The base model is implemented in the `bert::BertModel` struct and the
//! masked language model head in `bert::BertForMaskedLM`.
//!
//! # Model set-up and pre-trained weights loading
//!
//! All models expect the following resources:
//! - Configuration file expected to have a structure following the [Transformers library](https://github.com/huggingface/transformers)
//! - Model weights are expected to have a structure and parameter names following the [Transformers library](https://github.com/huggingface/transformers), converted to the `.ot` format.
//! - `BertTokenizer` using a `vocab.txt` vocabulary
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mlm_export::bert::{BertConfig, BertForMaskedLM};
//! use mlm_export::resources::{LocalResource, ResourceProvider};
//! use mlm_export::Config;
//! use rust_tokenizers::tokenizer::BertTokenizer;
//! use std::path::PathBuf;
//! use tch::{nn, Device};
//!
//! let config_resource = LocalResource {
//!     local_path: PathBuf::from("path/to/config.json"),
//! };
//! let vocab_resource = LocalResource {
//!     local_path: PathBuf::from("path/to/vocab.txt"),
//! };
//! let weights_resource = LocalResource {
//!     local_path: PathBuf::from("path/to/model.ot"),
//! };
//! let config_path = config_resource.get_local_path()?;
//! let vocab_path = vocab_resource.get_local_path()?;
//! let weights_path = weights_resource.get_local_path()?;
//! let device = Device::cuda_if_available();
//! let mut vs = nn::VarStore::new(device);
//! let tokenizer = BertTokenizer::from_file(&vocab_path, true, true)?;
//! let config = BertConfig::from_file(config_path)?;
//! let bert_model = BertForMaskedLM::new(vs.root(), &config);
//! vs.load(weights_path)?;
//!
//! # Ok(())
//! # }
//! ```

mod attention;
mod bert_model;
mod embeddings;
mod encoder;

pub use bert_model::{
    BertConfig, BertConfigResources, BertForMaskedLM, BertMaskedLMOutput, BertModel,
    BertModelResources, BertVocabResources,
};
pub use embeddings::BertEmbeddings;
