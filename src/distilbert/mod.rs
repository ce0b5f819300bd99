//! # DistilBERT (Sanh et al.)
//!
//! Implementation of the DistilBERT masked language model
//! ([https://arxiv.org/abs/1910.01108](https://arxiv.org/abs/1910.01108) Sanh, Debut, Chaumond, Wolf, 2019),
//! restricted to inference. DistilBERT shares the BERT WordPiece vocabulary and is used as the
//! smaller fallback when the BERT conversion fails.
//!
//! The base model is implemented in the `distilbert::DistilBertModel` struct and the masked
//! language model head in `distilbert::DistilBertModelMaskedLM`. Pretrained resources are
//! available in `DistilBertModelResources`, `DistilBertConfigResources` and
//! `DistilBertVocabResources`.

mod attention;
mod distilbert_model;
mod embeddings;
mod transformer;

pub use distilbert_model::{
    DistilBertConfig, DistilBertConfigResources, DistilBertMaskedLMOutput, DistilBertModel,
    DistilBertModelMaskedLM, DistilBertModelResources, DistilBertVocabResources,
};
