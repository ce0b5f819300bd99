//! # Mobile model package
//!
//! Writes a traced model as a self-describing package directory:
//!
//! ```text
//! WordPredictor.mlpackage/
//! ├── Manifest.json
//! └── Data/
//!     └── com.apple.CoreML/
//!         ├── model.pt      traced TorchScript graph
//!         └── model.json    input / output interface and deployment target
//! ```
//!
//! Packages are assembled in a staging directory next to the destination and moved into place
//! once complete: a failed export leaves a previously written package untouched.
use crate::common::error::MlmExportError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tch::{CModule, Kind};
use uuid::Uuid;

/// Package format version written to the manifest
pub const PACKAGE_FORMAT_VERSION: &str = "1.0.0";
/// Directory holding the package items, relative to the package root
pub const DATA_DIRECTORY: &str = "Data/com.apple.CoreML";
/// File name of the traced graph
pub const MODEL_FILE_NAME: &str = "model.pt";
/// File name of the interface description
pub const DESCRIPTION_FILE_NAME: &str = "model.json";
/// File name of the package manifest
pub const MANIFEST_FILE_NAME: &str = "Manifest.json";
/// Extension of package directories
pub const PACKAGE_EXTENSION: &str = "mlpackage";

const ITEM_AUTHOR: &str = "mlm-export";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// # Element type of a package input or output
pub enum TensorDataType {
    Int32,
    Float32,
}

impl TensorDataType {
    pub fn kind(&self) -> Kind {
        match self {
            TensorDataType::Int32 => Kind::Int,
            TensorDataType::Float32 => Kind::Float,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
/// # Named tensor of the package interface
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
    pub dtype: TensorDataType,
}

impl TensorSpec {
    pub fn new(name: &str, shape: &[i64], dtype: TensorDataType) -> TensorSpec {
        TensorSpec {
            name: name.to_string(),
            shape: shape.to_vec(),
            dtype,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
/// # Minimum platform version able to load the package
pub enum DeploymentTarget {
    #[default]
    #[serde(rename = "iOS15")]
    IOS15,
    #[serde(rename = "iOS16")]
    IOS16,
    #[serde(rename = "iOS17")]
    IOS17,
    #[serde(rename = "macOS12")]
    MacOS12,
    #[serde(rename = "macOS13")]
    MacOS13,
    #[serde(rename = "macOS14")]
    MacOS14,
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentTarget::IOS15 => "iOS15",
            DeploymentTarget::IOS16 => "iOS16",
            DeploymentTarget::IOS17 => "iOS17",
            DeploymentTarget::MacOS12 => "macOS12",
            DeploymentTarget::MacOS13 => "macOS13",
            DeploymentTarget::MacOS14 => "macOS14",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
/// # Interface description stored next to the traced graph
pub struct ModelDescription {
    pub format_version: String,
    /// Name of the pretrained model the package was converted from
    pub source_model: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub minimum_deployment_target: DeploymentTarget,
}

impl ModelDescription {
    /// Description of a masked language model package: `input_ids` and `attention_mask`
    /// (`int32`, *batch size* x *sequence_length*) to `logits` (`float32`,
    /// *batch size* x *sequence_length* x *vocab_size*).
    pub fn masked_lm(
        source_model: &str,
        batch_size: i64,
        sequence_length: i64,
        vocab_size: i64,
        minimum_deployment_target: DeploymentTarget,
    ) -> ModelDescription {
        let input_shape = [batch_size, sequence_length];
        ModelDescription {
            format_version: PACKAGE_FORMAT_VERSION.to_string(),
            source_model: source_model.to_string(),
            inputs: vec![
                TensorSpec::new("input_ids", &input_shape, TensorDataType::Int32),
                TensorSpec::new("attention_mask", &input_shape, TensorDataType::Int32),
            ],
            outputs: vec![TensorSpec::new(
                "logits",
                &[batch_size, sequence_length, vocab_size],
                TensorDataType::Float32,
            )],
            minimum_deployment_target,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ItemInfo {
    pub author: String,
    pub description: String,
    pub name: String,
    pub path: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// # Package manifest, listing the package items by identifier
pub struct PackageManifest {
    pub file_format_version: String,
    pub item_info_entries: BTreeMap<String, ItemInfo>,
    pub root_model_identifier: String,
}

impl PackageManifest {
    fn new() -> PackageManifest {
        let mut item_info_entries = BTreeMap::new();
        let root_model_identifier = new_identifier();
        item_info_entries.insert(
            root_model_identifier.clone(),
            ItemInfo {
                author: ITEM_AUTHOR.to_string(),
                description: "TorchScript traced model".to_string(),
                name: MODEL_FILE_NAME.to_string(),
                path: format!("com.apple.CoreML/{MODEL_FILE_NAME}"),
            },
        );
        item_info_entries.insert(
            new_identifier(),
            ItemInfo {
                author: ITEM_AUTHOR.to_string(),
                description: "Model interface description".to_string(),
                name: DESCRIPTION_FILE_NAME.to_string(),
                path: format!("com.apple.CoreML/{DESCRIPTION_FILE_NAME}"),
            },
        );
        PackageManifest {
            file_format_version: PACKAGE_FORMAT_VERSION.to_string(),
            item_info_entries,
            root_model_identifier,
        }
    }

    /// Item holding the traced graph
    pub fn root_item(&self) -> Option<&ItemInfo> {
        self.item_info_entries.get(&self.root_model_identifier)
    }
}

fn new_identifier() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// # Mobile package writer
pub struct MobilePackage {
    description: ModelDescription,
}

impl MobilePackage {
    pub fn new(description: ModelDescription) -> MobilePackage {
        MobilePackage { description }
    }

    pub fn description(&self) -> &ModelDescription {
        &self.description
    }

    /// Saves the traced `module` as a package at `package_path`, replacing any existing package.
    pub fn save<P: AsRef<Path>>(
        &self,
        module: &CModule,
        package_path: P,
    ) -> Result<PathBuf, MlmExportError> {
        self.save_with(package_path, |model_path| {
            module.save(model_path)?;
            Ok(())
        })
    }

    /// Saves the package at `package_path`, delegating the serialization of the graph to
    /// `write_model`, called with the path of the model file to create.
    pub fn save_with<P, F>(&self, package_path: P, write_model: F) -> Result<PathBuf, MlmExportError>
    where
        P: AsRef<Path>,
        F: FnOnce(&Path) -> Result<(), MlmExportError>,
    {
        let package_path = package_path.as_ref();
        let file_name = package_path
            .file_name()
            .ok_or_else(|| {
                MlmExportError::InvalidConfigurationError(format!(
                    "Invalid package path {}",
                    package_path.display()
                ))
            })?
            .to_string_lossy()
            .into_owned();
        let parent = match package_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staging_path = parent.join(format!(".{file_name}.{}.partial", Uuid::new_v4()));

        if let Err(error) = self.write_contents(&staging_path, write_model) {
            let _ = fs::remove_dir_all(&staging_path);
            return Err(error);
        }

        if let Err(error) = swap_into_place(&staging_path, package_path) {
            let _ = fs::remove_dir_all(&staging_path);
            return Err(error);
        }
        log::debug!("package written to {}", package_path.display());
        Ok(package_path.to_path_buf())
    }

    fn write_contents<F>(&self, root: &Path, write_model: F) -> Result<(), MlmExportError>
    where
        F: FnOnce(&Path) -> Result<(), MlmExportError>,
    {
        let data_directory = root.join(DATA_DIRECTORY);
        fs::create_dir_all(&data_directory)?;

        write_model(&data_directory.join(MODEL_FILE_NAME))?;
        fs::write(
            data_directory.join(DESCRIPTION_FILE_NAME),
            serde_json::to_string_pretty(&self.description)?,
        )?;
        fs::write(
            root.join(MANIFEST_FILE_NAME),
            serde_json::to_string_pretty(&PackageManifest::new())?,
        )?;
        Ok(())
    }
}

/// Moves the complete package at `staging_path` to `package_path`. An existing package is
/// first moved aside and restored if the staged package cannot take its place.
fn swap_into_place(staging_path: &Path, package_path: &Path) -> Result<(), MlmExportError> {
    let backup_path = if package_path.exists() {
        let backup_path = staging_path.with_extension("previous");
        fs::rename(package_path, &backup_path)?;
        Some(backup_path)
    } else {
        None
    };

    if let Err(error) = fs::rename(staging_path, package_path) {
        if let Some(backup_path) = &backup_path {
            let _ = fs::rename(backup_path, package_path);
        }
        return Err(error.into());
    }

    if let Some(backup_path) = backup_path {
        if backup_path.is_dir() {
            fs::remove_dir_all(&backup_path)?;
        } else {
            fs::remove_file(&backup_path)?;
        }
    }
    Ok(())
}

/// Reads the interface description of the package at `package_path`
pub fn read_description<P: AsRef<Path>>(package_path: P) -> Result<ModelDescription, MlmExportError> {
    let content = fs::read_to_string(
        package_path
            .as_ref()
            .join(DATA_DIRECTORY)
            .join(DESCRIPTION_FILE_NAME),
    )?;
    Ok(serde_json::from_str(&content)?)
}

/// Reads the manifest of the package at `package_path`
pub fn read_manifest<P: AsRef<Path>>(package_path: P) -> Result<PackageManifest, MlmExportError> {
    let content = fs::read_to_string(package_path.as_ref().join(MANIFEST_FILE_NAME))?;
    Ok(serde_json::from_str(&content)?)
}

/// Loads the traced graph of the package at `package_path`
pub fn load_model<P: AsRef<Path>>(package_path: P) -> Result<CModule, MlmExportError> {
    Ok(CModule::load(
        package_path
            .as_ref()
            .join(DATA_DIRECTORY)
            .join(MODEL_FILE_NAME),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> ModelDescription {
        ModelDescription::masked_lm(
            "bert-base-uncased",
            1,
            128,
            30522,
            DeploymentTarget::default(),
        )
    }

    #[test]
    fn masked_lm_description_declares_named_inputs_and_outputs() {
        let description = description();

        assert_eq!(description.inputs.len(), 2);
        assert_eq!(description.inputs[0].name, "input_ids");
        assert_eq!(description.inputs[1].name, "attention_mask");
        assert!(description
            .inputs
            .iter()
            .all(|input| input.shape == vec![1, 128] && input.dtype == TensorDataType::Int32));
        assert_eq!(
            description.outputs,
            vec![TensorSpec::new(
                "logits",
                &[1, 128, 30522],
                TensorDataType::Float32
            )]
        );
        assert_eq!(description.minimum_deployment_target, DeploymentTarget::IOS15);
    }

    #[test]
    fn description_uses_platform_names() -> anyhow::Result<()> {
        let value = serde_json::to_value(description())?;

        assert_eq!(value["minimumDeploymentTarget"], "iOS15");
        assert_eq!(value["inputs"][0]["dtype"], "int32");
        assert_eq!(value["outputs"][0]["dtype"], "float32");
        assert_eq!(DeploymentTarget::MacOS13.to_string(), "macOS13");
        Ok(())
    }

    #[test]
    fn package_layout_is_complete() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let package_path = dir.path().join("WordPredictor.mlpackage");

        let package = MobilePackage::new(description());
        package.save_with(&package_path, |model_path| {
            fs::write(model_path, b"graph")?;
            Ok(())
        })?;

        assert!(package_path
            .join(DATA_DIRECTORY)
            .join(MODEL_FILE_NAME)
            .is_file());
        assert_eq!(&read_description(&package_path)?, package.description());

        let manifest = read_manifest(&package_path)?;
        assert_eq!(manifest.file_format_version, PACKAGE_FORMAT_VERSION);
        assert_eq!(manifest.item_info_entries.len(), 2);
        let root_item = manifest.root_item().expect("root item is listed");
        assert_eq!(root_item.name, MODEL_FILE_NAME);
        assert_eq!(root_item.path, "com.apple.CoreML/model.pt");

        let leftovers: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn existing_package_is_replaced() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let package_path = dir.path().join("WordPredictor.mlpackage");
        fs::create_dir_all(package_path.join("stale"))?;

        MobilePackage::new(description()).save_with(&package_path, |model_path| {
            fs::write(model_path, b"graph")?;
            Ok(())
        })?;

        assert!(!package_path.join("stale").exists());
        assert!(package_path.join(MANIFEST_FILE_NAME).is_file());
        Ok(())
    }

    #[test]
    fn failed_swap_restores_previous_package() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let package_path = dir.path().join("WordPredictor.mlpackage");
        fs::create_dir_all(&package_path)?;
        fs::write(package_path.join("previous"), b"previous package")?;
        let staging_path = dir.path().join(".WordPredictor.mlpackage.missing.partial");

        assert!(swap_into_place(&staging_path, &package_path).is_err());

        assert_eq!(fs::read(package_path.join("previous"))?, b"previous package");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn failed_export_keeps_previous_package() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let package_path = dir.path().join("WordPredictor.mlpackage");
        fs::create_dir_all(&package_path)?;
        fs::write(package_path.join("previous"), b"previous package")?;

        let result = MobilePackage::new(description()).save_with(&package_path, |_| {
            Err(MlmExportError::TchError("tracing failed".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(package_path.join("previous"))?, b"previous package");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
