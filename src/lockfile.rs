//! renv.lock reading and writing.
//!
//! The lockfile is machine-owned JSON; unknown keys are carried through a
//! flatten map so edits never discard fields written by other tools.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const LOCKFILE_NAME: &str = "renv.lock";

/// Environment descriptor recorded at the top of the lockfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct REnvironment {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One resolved dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockEntry {
    #[serde(rename = "Package")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Repository", skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(rename = "Hash", skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Direct dependency names as reported by the registry, not computed
    /// locally.
    #[serde(rename = "Requirements", default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The whole lockfile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "R")]
    pub r: REnvironment,
    #[serde(rename = "Packages", default)]
    pub packages: BTreeMap<String, LockEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Lockfile {
    /// Fresh lockfile for a project that has never been snapshotted.
    pub fn empty(r_version: &str) -> Self {
        Self {
            r: REnvironment {
                version: r_version.to_string(),
                extra: BTreeMap::new(),
            },
            packages: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse lockfile JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn insert(&mut self, entry: LockEntry) {
        self.packages.insert(entry.name.clone(), entry);
    }

    pub fn render(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self).context("serialize lockfile")?;
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
  "R": {
    "Version": "4.4.1",
    "Repositories": [{ "Name": "CRAN", "URL": "https://cloud.r-project.org" }]
  },
  "Packages": {
    "dplyr": {
      "Package": "dplyr",
      "Version": "1.1.4",
      "Source": "Repository",
      "Repository": "CRAN",
      "Hash": "fedd9d00c2944ff00a0e2696ccf048ec"
    }
  }
}"#;

    #[test]
    fn parses_environment_and_packages() {
        let lock = Lockfile::parse(FIXTURE).expect("parse fixture");
        assert_eq!(lock.r.version, "4.4.1");
        assert!(lock.contains("dplyr"));
        let entry = &lock.packages["dplyr"];
        assert_eq!(entry.version, "1.1.4");
        assert_eq!(entry.repository.as_deref(), Some("CRAN"));
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let lock = Lockfile::parse(FIXTURE).expect("parse fixture");
        let rendered = lock.render().expect("render");
        assert!(rendered.contains("Repositories"));
        assert!(rendered.contains("cloud.r-project.org"));
    }

    #[test]
    fn insert_keys_by_package_name() {
        let mut lock = Lockfile::empty("4.4.1");
        lock.insert(LockEntry {
            name: "sf".to_string(),
            version: "1.0.16".to_string(),
            source: "Repository".to_string(),
            repository: Some("CRAN".to_string()),
            hash: None,
            requirements: vec!["units".to_string()],
            extra: BTreeMap::new(),
        });
        assert!(lock.contains("sf"));
        let rendered = lock.render().expect("render");
        let reparsed = Lockfile::parse(&rendered).expect("reparse");
        assert_eq!(reparsed.packages["sf"].requirements, vec!["units"]);
    }
}
