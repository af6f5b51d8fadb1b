//! Registry metadata resolution.
//!
//! One HTTP attempt per package per invocation; re-running the tool is the
//! retry path. Callers decide whether a failure is fatal.
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure kinds for a single metadata lookup, isolated per package.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("registry request for '{name}' failed: {message}")]
    Network { name: String, message: String },

    #[error("registry returned HTTP {status} for '{name}'")]
    Status { name: String, status: u16 },

    #[error("registry response for '{name}' is not a JSON object: {message}")]
    MalformedBody { name: String, message: String },

    #[error("registry response for '{name}' carries no version")]
    MissingVersion { name: String },
}

/// Authoritative metadata for one package, as reported by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub version: String,
    pub hash: Option<String>,
    pub repository: Option<String>,
    /// Direct dependency names, taken verbatim from the response.
    pub requirements: Vec<String>,
}

/// Seam between the reconciler and the network.
pub trait MetadataSource {
    fn resolve(&self, name: &str) -> Result<PackageMetadata, ResolveError>;
}

/// crandb-style registry client: `GET <host>/<package>` returning a JSON
/// object with a `Version` field.
pub struct RegistryClient {
    host: String,
    agent: ureq::Agent,
}

impl RegistryClient {
    pub fn new(host: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(concat!("drydock/", env!("CARGO_PKG_VERSION")))
            .build()
            .new_agent();
        Self {
            host: host.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.host, name)
    }
}

impl MetadataSource for RegistryClient {
    fn resolve(&self, name: &str) -> Result<PackageMetadata, ResolveError> {
        let url = self.package_url(name);
        tracing::debug!("resolving {name} via {url}");
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Accept", "application/json")
            .call()
            .map_err(|err| match err {
                ureq::Error::StatusCode(status) => ResolveError::Status {
                    name: name.to_string(),
                    status,
                },
                other => ResolveError::Network {
                    name: name.to_string(),
                    message: other.to_string(),
                },
            })?;
        let body: Value =
            response
                .body_mut()
                .read_json()
                .map_err(|err| ResolveError::MalformedBody {
                    name: name.to_string(),
                    message: err.to_string(),
                })?;
        metadata_from_body(name, &body)
    }
}

/// Extract (version, hash, repository) from a registry response body.
///
/// An empty version field is a failure, never an empty-string result.
pub fn metadata_from_body(name: &str, body: &Value) -> Result<PackageMetadata, ResolveError> {
    let Some(object) = body.as_object() else {
        return Err(ResolveError::MalformedBody {
            name: name.to_string(),
            message: format!("expected an object, got {body}"),
        });
    };
    let version = object
        .get("Version")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| ResolveError::MissingVersion {
            name: name.to_string(),
        })?;
    let hash = object
        .get("MD5sum")
        .and_then(Value::as_str)
        .map(str::to_string);
    let repository = object
        .get("Repository")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut requirements: Vec<String> = ["Depends", "Imports", "LinkingTo"]
        .iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_object)
        .flat_map(|map| map.keys())
        .filter(|dependency| dependency.as_str() != "R")
        .cloned()
        .collect();
    requirements.sort();
    requirements.dedup();
    Ok(PackageMetadata {
        version: version.to_string(),
        hash,
        repository,
        requirements,
    })
}
