#![allow(dead_code)]

use mlm_export::bert::{BertConfig, BertForMaskedLM};
use mlm_export::distilbert::{DistilBertConfig, DistilBertModelMaskedLM};
use mlm_export::pipelines::common::ModelType;
use mlm_export::pipelines::conversion::ConversionConfig;
use mlm_export::resources::LocalResource;
use std::fs;
use std::path::{Path, PathBuf};
use tch::{nn, Device};

pub const VOCAB: [&str; 16] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "cat", "sat", "on", "mat", "dog", "##s",
    "a", "word", "to", "predict",
];

pub fn tiny_bert_config() -> BertConfig {
    BertConfig {
        hidden_size: 8,
        intermediate_size: 16,
        num_attention_heads: 2,
        num_hidden_layers: 2,
        max_position_embeddings: 128,
        vocab_size: VOCAB.len() as i64,
        ..Default::default()
    }
}

pub fn tiny_distilbert_config() -> DistilBertConfig {
    DistilBertConfig {
        dim: 8,
        hidden_dim: 16,
        n_heads: 2,
        n_layers: 2,
        max_position_embeddings: 128,
        vocab_size: VOCAB.len() as i64,
        ..Default::default()
    }
}

/// Writes `vocab.txt`, `config.json` and randomly initialized weights (`rust_model.ot`) of a
/// tiny model to `model_dir`.
pub fn write_tiny_model(model_dir: &Path, model_type: ModelType) -> anyhow::Result<()> {
    fs::create_dir_all(model_dir)?;
    fs::write(model_dir.join("vocab.txt"), VOCAB.join("\n"))?;

    let vs = nn::VarStore::new(Device::Cpu);
    match model_type {
        ModelType::Bert => {
            let config = tiny_bert_config();
            let _ = BertForMaskedLM::new(vs.root(), &config);
            fs::write(
                model_dir.join("config.json"),
                serde_json::to_string(&config)?,
            )?;
        }
        ModelType::DistilBert => {
            let config = tiny_distilbert_config();
            let _ = DistilBertModelMaskedLM::new(vs.root(), &config);
            fs::write(
                model_dir.join("config.json"),
                serde_json::to_string(&config)?,
            )?;
        }
    }
    vs.save(model_dir.join("rust_model.ot"))?;
    Ok(())
}

/// Conversion of the tiny model stored in `model_dir`, writing to `output_dir`.
pub fn tiny_conversion(
    model_dir: &Path,
    model_type: ModelType,
    output_dir: &Path,
) -> ConversionConfig {
    ConversionConfig::new(
        &format!("tiny-{model_type}"),
        model_type,
        LocalResource::from(model_dir.join("rust_model.ot")),
        LocalResource::from(model_dir.join("config.json")),
        LocalResource::from(model_dir.join("vocab.txt")),
        true,
    )
    .with_output_dir(output_dir)
}

/// Conversion whose resources do not exist
pub fn missing_conversion(output_dir: &Path) -> ConversionConfig {
    let missing = PathBuf::from("/nonexistent/mlm-export");
    ConversionConfig::new(
        "missing",
        ModelType::Bert,
        LocalResource::from(missing.join("rust_model.ot")),
        LocalResource::from(missing.join("config.json")),
        LocalResource::from(missing.join("vocab.txt")),
        true,
    )
    .with_output_dir(output_dir)
}
