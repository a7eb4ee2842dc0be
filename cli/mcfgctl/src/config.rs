//! Resource file loading.
//!
//! A resource file is TOML describing one record. Any string value may be
//! written as `@path` to read it from a file relative to the resource file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use machinecfg_resource::{
    ApplyMode, AttrValue, ClientConfiguration, Record, Sensitive, Timeouts,
};
use serde::Deserialize;

/// Default resource file name.
pub const DEFAULT_RESOURCE_FILE: &str = "machinecfg.toml";

/// On-disk shape of a resource file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceFile {
    pub node: Option<String>,
    pub endpoint: Option<String>,
    pub apply_mode: Option<String>,
    pub client_configuration: Option<ClientConfigurationFile>,
    pub machine_configuration_input: Option<String>,

    /// Computed; accepted here only so planning can reject it with a clear
    /// error.
    pub machine_configuration: Option<String>,

    #[serde(default)]
    pub config_patches: Vec<String>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfigurationFile {
    pub ca_certificate: String,
    pub client_certificate: String,
    pub client_key: String,
}

impl ResourceFile {
    /// Read and parse a resource file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read resource file {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse resource file {}", path.display()))
    }

    /// Build the config view, resolving `@path` references against `base_dir`.
    pub fn into_record(self, base_dir: &Path) -> Result<Record> {
        let resolve = |value: String| resolve_reference(base_dir, value);

        let apply_mode = match self.apply_mode {
            Some(mode) => AttrValue::Known(mode.parse::<ApplyMode>()?),
            None => AttrValue::Null,
        };

        let client_configuration = match self.client_configuration {
            Some(cc) => AttrValue::Known(ClientConfiguration {
                ca_certificate: resolve(cc.ca_certificate)?.trim().to_string(),
                client_certificate: resolve(cc.client_certificate)?.trim().to_string(),
                client_key: Sensitive::new(resolve(cc.client_key)?.trim()),
            }),
            None => AttrValue::Null,
        };

        let config_patches = self
            .config_patches
            .into_iter()
            .map(|patch| resolve(patch).map(AttrValue::Known))
            .collect::<Result<Vec<_>>>()?;

        Ok(Record {
            id: AttrValue::Null,
            apply_mode,
            node: self.node.into(),
            endpoint: self.endpoint.into(),
            client_configuration,
            machine_configuration_input: self
                .machine_configuration_input
                .map(resolve)
                .transpose()?
                .map(Sensitive::new)
                .into(),
            machine_configuration: self.machine_configuration.map(Sensitive::new).into(),
            config_patches,
            timeouts: self.timeouts,
        })
    }
}

/// Load a resource file and build its config view.
pub fn load_record(path: &Path) -> Result<Record> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    ResourceFile::load(path)?.into_record(base_dir)
}

/// Default state file for a resource file: `<file>.state.json`.
pub fn default_state_path(resource_file: &Path) -> PathBuf {
    let mut name = resource_file.as_os_str().to_os_string();
    name.push(".state.json");
    PathBuf::from(name)
}

fn resolve_reference(base_dir: &Path, value: String) -> Result<String> {
    let Some(reference) = value.strip_prefix('@') else {
        return Ok(value);
    };

    let path = base_dir.join(reference);
    fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_values() {
        let file: ResourceFile = toml::from_str(
            r#"
node = "10.5.0.2"
apply_mode = "staged"
machine_configuration_input = "version: v1alpha1\n"
config_patches = ["machine:\n  install:\n    disk: /dev/vda\n", ""]

[timeouts]
create = "1m"
"#,
        )
        .unwrap();

        let record = file.into_record(Path::new(".")).unwrap();

        assert_eq!(record.apply_mode, AttrValue::Known(ApplyMode::Staged));
        assert!(record.endpoint.is_null());
        assert!(record.client_configuration.is_null());
        assert_eq!(record.config_patches.len(), 2);
        assert_eq!(record.timeouts.create.as_deref(), Some("1m"));
        assert_eq!(record.timeouts.update, None);
    }

    #[test]
    fn test_file_references_are_relative_to_resource_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("patches")).unwrap();
        fs::write(dir.path().join("controlplane.yaml"), "version: v1alpha1\n").unwrap();
        fs::write(
            dir.path().join("patches/hostname.yaml"),
            "machine:\n  network:\n    hostname: cp-1\n",
        )
        .unwrap();
        let resource = dir.path().join("machinecfg.toml");
        fs::write(
            &resource,
            r#"
node = "10.5.0.2"
machine_configuration_input = "@controlplane.yaml"
config_patches = ["@patches/hostname.yaml"]
"#,
        )
        .unwrap();

        let record = load_record(&resource).unwrap();

        assert_eq!(
            record.machine_configuration_input.known().map(Sensitive::expose),
            Some("version: v1alpha1\n")
        );
        assert_eq!(
            record.config_patches,
            vec![AttrValue::Known(
                "machine:\n  network:\n    hostname: cp-1\n".to_string()
            )]
        );
    }

    #[test]
    fn test_missing_reference_is_an_error() {
        let file = ResourceFile {
            node: Some("n1".to_string()),
            machine_configuration_input: Some("@missing.yaml".to_string()),
            ..Default::default()
        };

        let err = file.into_record(Path::new("/nonexistent")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_invalid_apply_mode() {
        let file = ResourceFile {
            apply_mode: Some("sometimes".to_string()),
            ..Default::default()
        };

        let err = file.into_record(Path::new(".")).unwrap_err();
        assert!(err
            .downcast_ref::<machinecfg_resource::ResourceError>()
            .is_some());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<ResourceFile, _> = toml::from_str("nodes = \"n1\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_state_path() {
        assert_eq!(
            default_state_path(Path::new("cluster/cp-1.toml")),
            PathBuf::from("cluster/cp-1.toml.state.json")
        );
    }
}
