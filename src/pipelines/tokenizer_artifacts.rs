//! # Tokenizer artifacts consumed by the mobile application
//!
//! The application tokenizes text itself and expects a fixed set of files next to the model
//! package:
//! - `vocab.json`: flat JSON object mapping every vocabulary token to its id
//! - `merges.txt`: merge rules for BPE tokenizers. WordPiece vocabularies have none, but the file
//!   is still expected and contains a single comment line.
use crate::common::error::MlmExportError;
use rust_tokenizers::vocab::Vocab;
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// File name of the serialized vocabulary
pub const VOCAB_FILE_NAME: &str = "vocab.json";
/// File name of the placeholder merges file
pub const MERGES_FILE_NAME: &str = "merges.txt";
/// Content of the placeholder merges file
pub const MERGES_PLACEHOLDER: &str = "# BERT uses WordPiece tokenization, not BPE merges\n";

/// Vocabulary entries serialized as a JSON object in ascending id order
struct VocabularyEntries<'a>(Vec<(&'a str, i64)>);

impl<'a> VocabularyEntries<'a> {
    fn from_vocab<V: Vocab>(vocab: &'a V) -> Self {
        let mut entries: Vec<(&str, i64)> = vocab
            .values()
            .iter()
            .map(|(token, id)| (token.as_str(), *id))
            .collect();
        entries.sort_by_key(|&(token, id)| (id, token));
        VocabularyEntries(entries)
    }
}

impl Serialize for VocabularyEntries<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(token, id)| (token, id)))
    }
}

/// Writes the token to id mapping of `vocab` as a JSON object to `path`, overwriting any
/// existing file.
///
/// # Returns
///
/// * `usize` number of entries written
///
/// # Example
///
/// ```no_run
/// use mlm_export::pipelines::tokenizer_artifacts::save_vocabulary;
/// use rust_tokenizers::vocab::{BertVocab, Vocab};
///
/// let vocab = BertVocab::from_file("path/to/vocab.txt")?;
/// let entries = save_vocabulary(&vocab, "path/to/vocab.json")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn save_vocabulary<V: Vocab, P: AsRef<Path>>(
    vocab: &V,
    path: P,
) -> Result<usize, MlmExportError> {
    let entries = VocabularyEntries::from_vocab(vocab);
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &entries)?;
    writer.flush()?;
    log::debug!(
        "wrote {} vocabulary entries to {}",
        entries.0.len(),
        path.as_ref().display()
    );
    Ok(entries.0.len())
}

/// Writes the placeholder merges file to `path`, overwriting any existing file.
pub fn write_merges_placeholder<P: AsRef<Path>>(path: P) -> Result<(), MlmExportError> {
    std::fs::write(path.as_ref(), MERGES_PLACEHOLDER)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_tokenizers::vocab::BertVocab;
    use std::collections::HashMap;

    fn test_vocab(dir: &Path) -> anyhow::Result<BertVocab> {
        let vocab_path = dir.join("vocab.txt");
        std::fs::write(
            &vocab_path,
            "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nthe\nquick\n##ly\nfox\n",
        )?;
        Ok(BertVocab::from_file(&vocab_path)?)
    }

    #[test]
    fn vocabulary_round_trips_through_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vocab = test_vocab(dir.path())?;
        let output_path = dir.path().join(VOCAB_FILE_NAME);

        let written = save_vocabulary(&vocab, &output_path)?;

        let saved: HashMap<String, i64> =
            serde_json::from_reader(File::open(&output_path)?)?;
        assert_eq!(written, vocab.values().len());
        assert_eq!(&saved, vocab.values());
        assert_eq!(saved["##ly"], 7);
        Ok(())
    }

    #[test]
    fn vocabulary_is_written_in_id_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vocab = test_vocab(dir.path())?;
        let output_path = dir.path().join(VOCAB_FILE_NAME);

        save_vocabulary(&vocab, &output_path)?;

        let content = std::fs::read_to_string(&output_path)?;
        assert!(content.starts_with(r#"{"[PAD]":0,"[UNK]":1,"[CLS]":2"#));
        assert!(content.ends_with(r#""fox":8}"#));
        Ok(())
    }

    #[test]
    fn merges_placeholder_is_overwritten() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let merges_path = dir.path().join(MERGES_FILE_NAME);
        std::fs::write(&merges_path, "Ġ t\nĠ a\n")?;

        write_merges_placeholder(&merges_path)?;

        assert_eq!(std::fs::read_to_string(&merges_path)?, MERGES_PLACEHOLDER);
        Ok(())
    }
}
