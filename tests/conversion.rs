mod common;

use common::{
    missing_conversion, tiny_bert_config, tiny_conversion, tiny_distilbert_config,
    write_tiny_model, VOCAB,
};
use mlm_export::bert::BertForMaskedLM;
use mlm_export::distilbert::DistilBertModelMaskedLM;
use mlm_export::pipelines::common::ModelType;
use mlm_export::pipelines::conversion::{convert_with_fallback, ModelConverter};
use mlm_export::pipelines::mobile_package::{load_model, read_description, read_manifest};
use mlm_export::pipelines::tokenizer_artifacts::MERGES_PLACEHOLDER;
use mlm_export::MlmExportError;
use std::collections::HashMap;
use std::fs;
use tch::{nn, no_grad, Device, Kind, Tensor};

#[test]
fn bert_conversion_writes_all_artifacts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("bert");
    let output_dir = dir.path().join("Predict").join("Predict");
    write_tiny_model(&model_dir, ModelType::Bert)?;

    let report =
        ModelConverter::new(tiny_conversion(&model_dir, ModelType::Bert, &output_dir)).convert()?;

    assert_eq!(report.model_type, ModelType::Bert);
    assert_eq!(report.vocab_size, VOCAB.len());
    assert_eq!(report.output_shape, vec![1, 128, VOCAB.len() as i64]);

    let vocab: HashMap<String, i64> =
        serde_json::from_str(&fs::read_to_string(output_dir.join("vocab.json"))?)?;
    assert_eq!(vocab.len(), VOCAB.len());
    for (id, token) in VOCAB.iter().enumerate() {
        assert_eq!(vocab[*token], id as i64);
    }
    assert_eq!(
        fs::read_to_string(output_dir.join("merges.txt"))?,
        MERGES_PLACEHOLDER
    );

    let package_path = output_dir.join("WordPredictor.mlpackage");
    assert_eq!(report.package_path, package_path);
    let description = read_description(&package_path)?;
    assert_eq!(description.source_model, "tiny-BERT");
    assert_eq!(description.outputs[0].name, "logits");
    assert_eq!(description.outputs[0].shape, vec![1, 128, VOCAB.len() as i64]);
    let manifest = read_manifest(&package_path)?;
    assert!(manifest.root_item().is_some());
    Ok(())
}

#[test]
fn traced_package_matches_eager_model() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("bert");
    let output_dir = dir.path().join("output");
    write_tiny_model(&model_dir, ModelType::Bert)?;
    let report =
        ModelConverter::new(tiny_conversion(&model_dir, ModelType::Bert, &output_dir)).convert()?;

    let mut vs = nn::VarStore::new(Device::Cpu);
    let model = BertForMaskedLM::new(vs.root(), &tiny_bert_config());
    vs.load(model_dir.join("rust_model.ot"))?;

    let input_ids = Tensor::randint(VOCAB.len() as i64, [1, 128], (Kind::Int64, Device::Cpu));
    let attention_mask = Tensor::ones([1, 128], (Kind::Int64, Device::Cpu));
    let _ = attention_mask.narrow(1, 100, 28).fill_(0);

    let traced = load_model(&report.package_path)?;
    let traced_scores = no_grad(|| {
        traced.forward_ts(&[input_ids.to_kind(Kind::Int), attention_mask.to_kind(Kind::Int)])
    })?;
    let eager_scores = no_grad(|| model.forward(&input_ids, &attention_mask))?.prediction_scores;

    assert_eq!(traced_scores.kind(), Kind::Float);
    assert_eq!(traced_scores.size(), vec![1, 128, VOCAB.len() as i64]);
    let difference = (traced_scores - eager_scores).abs().max().double_value(&[]);
    assert!(difference < 1e-4, "traced and eager outputs differ by {difference}");
    Ok(())
}

#[test]
fn traced_distilbert_package_matches_eager_model() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("distilbert");
    let output_dir = dir.path().join("output");
    write_tiny_model(&model_dir, ModelType::DistilBert)?;
    let report = ModelConverter::new(tiny_conversion(
        &model_dir,
        ModelType::DistilBert,
        &output_dir,
    ))
    .convert()?;

    let mut vs = nn::VarStore::new(Device::Cpu);
    let model = DistilBertModelMaskedLM::new(vs.root(), &tiny_distilbert_config());
    vs.load(model_dir.join("rust_model.ot"))?;

    let input_ids = Tensor::randint(VOCAB.len() as i64, [1, 128], (Kind::Int64, Device::Cpu));
    let attention_mask = Tensor::ones([1, 128], (Kind::Int64, Device::Cpu));
    let _ = attention_mask.narrow(1, 90, 38).fill_(0);

    let traced = load_model(&report.package_path)?;
    let traced_scores = no_grad(|| {
        traced.forward_ts(&[input_ids.to_kind(Kind::Int), attention_mask.to_kind(Kind::Int)])
    })?;
    let eager_scores = no_grad(|| model.forward(&input_ids, &attention_mask))?.prediction_scores;

    assert_eq!(traced_scores.kind(), Kind::Float);
    assert_eq!(traced_scores.size(), vec![1, 128, VOCAB.len() as i64]);
    let difference = (traced_scores - eager_scores).abs().max().double_value(&[]);
    assert!(difference < 1e-4, "traced and eager outputs differ by {difference}");
    Ok(())
}

#[test]
fn distilbert_fallback_runs_after_primary_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("distilbert");
    let output_dir = dir.path().join("output");
    write_tiny_model(&model_dir, ModelType::DistilBert)?;

    let report = convert_with_fallback(
        missing_conversion(&output_dir),
        tiny_conversion(&model_dir, ModelType::DistilBert, &output_dir),
    )?;

    assert_eq!(report.model_type, ModelType::DistilBert);
    assert_eq!(report.output_shape, vec![1, 128, VOCAB.len() as i64]);
    assert_eq!(
        fs::read_to_string(output_dir.join("merges.txt"))?,
        MERGES_PLACEHOLDER
    );
    assert!(output_dir
        .join("WordPredictor.mlpackage")
        .join("Data/com.apple.CoreML/model.pt")
        .is_file());
    Ok(())
}

#[test]
fn failed_conversions_keep_previous_package() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("distilbert");
    let output_dir = dir.path().join("output");
    write_tiny_model(&model_dir, ModelType::DistilBert)?;
    fs::write(model_dir.join("config.json"), "{ not json")?;

    let package_path = output_dir.join("WordPredictor.mlpackage");
    fs::create_dir_all(&package_path)?;
    fs::write(package_path.join("previous"), "previous run")?;

    let result = convert_with_fallback(
        missing_conversion(&output_dir),
        tiny_conversion(&model_dir, ModelType::DistilBert, &output_dir),
    );

    match result {
        Err(MlmExportError::ConversionFailed { primary, fallback }) => {
            assert!(matches!(*primary, MlmExportError::IOError(_)));
            assert!(matches!(*fallback, MlmExportError::SerializationError(_)));
        }
        other => panic!("unexpected conversion result: {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(package_path.join("previous"))?,
        "previous run"
    );
    assert_eq!(fs::read_dir(&output_dir)?.count(), 1);
    Ok(())
}

#[test]
fn rerun_overwrites_previous_artifacts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("bert");
    let output_dir = dir.path().join("output");
    write_tiny_model(&model_dir, ModelType::Bert)?;
    fs::create_dir_all(&output_dir)?;
    fs::write(output_dir.join("merges.txt"), "stale merges")?;

    let first =
        ModelConverter::new(tiny_conversion(&model_dir, ModelType::Bert, &output_dir)).convert()?;
    let first_manifest = read_manifest(&first.package_path)?;
    let second =
        ModelConverter::new(tiny_conversion(&model_dir, ModelType::Bert, &output_dir)).convert()?;
    let second_manifest = read_manifest(&second.package_path)?;

    assert_ne!(
        first_manifest.root_model_identifier,
        second_manifest.root_model_identifier
    );
    assert_eq!(
        fs::read_to_string(output_dir.join("merges.txt"))?,
        MERGES_PLACEHOLDER
    );
    let mut entries = fs::read_dir(&output_dir)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    assert_eq!(
        entries,
        vec!["WordPredictor.mlpackage", "merges.txt", "vocab.json"]
    );
    Ok(())
}

#[test]
fn sequence_longer_than_positions_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("bert");
    write_tiny_model(&model_dir, ModelType::Bert)?;
    let mut config = tiny_conversion(&model_dir, ModelType::Bert, &dir.path().join("output"));
    config.sequence_length = 256;

    let result = ModelConverter::new(config).convert();

    assert!(matches!(
        result,
        Err(MlmExportError::InvalidConfigurationError(_))
    ));
    Ok(())
}
