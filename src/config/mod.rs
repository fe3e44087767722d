//! @acp:module "Configuration"
//! @acp:summary "Project configuration loading and defaults"
//! @acp:domain cli
//! @acp:layer config
//!
//! Three layers: built-in defaults, then `.texsmith/config.yml` (or the
//! home directory copy), then command-line flags applied by the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TexsmithError};

/// Config file location relative to a project or home directory.
pub const CONFIG_FILE: &str = ".texsmith/config.yml";

fn default_template() -> String {
    "article".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_true() -> bool {
    true
}

/// @acp:summary "TeXSmith configuration file"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TexsmithConfig {
    /// Template name or path used when `--template` is absent
    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Document base level; unset means front matter or 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_level: Option<i32>,

    #[serde(default = "default_true")]
    pub promote_title: bool,

    /// Promote warnings to errors
    #[serde(default)]
    pub strict: bool,

    /// Fragments appended to every build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,

    /// Attribute overrides below explicit `--attribute` flags
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,

    /// Extra directories searched at the end of the local template tier
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_paths: Vec<PathBuf>,
}

impl Default for TexsmithConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            output_dir: default_output_dir(),
            base_level: None,
            promote_title: true,
            strict: false,
            fragments: Vec::new(),
            attributes: Map::new(),
            template_paths: Vec::new(),
        }
    }
}

impl TexsmithConfig {
    /// @acp:summary "Load config from a YAML file"
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(&content)
            .map_err(|err| TexsmithError::manifest(path, err.to_string()))?;

        // Relative template paths are anchored at the project directory
        if let Some(project) = path.parent().and_then(Path::parent) {
            for dir in &mut config.template_paths {
                if dir.is_relative() {
                    *dir = project.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// First existing config file: `<cwd>/.texsmith/config.yml`, then `<home>/.texsmith/config.yml`.
    pub fn locate(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
        std::iter::once(cwd.join(CONFIG_FILE))
            .chain(home.map(|h| h.join(CONFIG_FILE)))
            .find(|candidate| candidate.is_file())
    }

    /// @acp:summary "Load an explicit file, else the located one, else defaults"
    pub fn load_or_default(explicit: Option<&Path>, cwd: &Path, home: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::locate(cwd, home) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = TexsmithConfig::load_or_default(None, dir.path(), None).unwrap();
        assert_eq!(config, TexsmithConfig::default());
        assert_eq!(config.template, "article");
        assert!(config.promote_title);
    }

    #[test]
    fn test_project_config_beats_home() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        fs::create_dir_all(project.path().join(".texsmith")).unwrap();
        fs::create_dir_all(home.path().join(".texsmith")).unwrap();
        fs::write(
            project.path().join(CONFIG_FILE),
            "template: book\nstrict: true\nattributes:\n  fontsize: 12pt\ntemplate_paths: [vendor/templates]\n",
        )
        .unwrap();
        fs::write(home.path().join(CONFIG_FILE), "template: memo\n").unwrap();

        let config = TexsmithConfig::load_or_default(None, project.path(), Some(home.path())).unwrap();
        assert_eq!(config.template, "book");
        assert!(config.strict);
        assert_eq!(config.attributes.get("fontsize"), Some(&json!("12pt")));
        assert_eq!(config.template_paths, vec![project.path().join("vendor/templates")]);

        let fallback = TempDir::new().unwrap();
        let config = TexsmithConfig::load_or_default(None, fallback.path(), Some(home.path())).unwrap();
        assert_eq!(config.template, "memo");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "templat: book\n").unwrap();
        let err = TexsmithConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "manifest");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = TexsmithConfig {
            base_level: Some(1),
            fragments: vec!["ts-links".to_string()],
            ..TexsmithConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(TexsmithConfig::load(&path).unwrap(), config);
    }
}
