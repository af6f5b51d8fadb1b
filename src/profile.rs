//! Environment profiles and build-strategy resolution.
//!
//! A profile names a base image plus system-library and package bundles.
//! Resolution is a small state machine whose terminal outputs are the two
//! build strategies; every bundle reference is checked against the catalog
//! before either strategy is returned.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PROFILE: &str = "minimal";

/// Fatal catalog problems; surfaced before any build attempt.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown profile '{name}' (known profiles: {known}); pick one of them or pass --base-image/--system-libs/--packages explicitly")]
    UnknownProfile { name: String, known: String },

    #[error("unknown {kind} bundle '{name}' (known {kind} bundles: {known}); fix the profile or the catalog overrides in drydock.json")]
    UnknownBundle {
        kind: &'static str,
        name: String,
        known: String,
    },
}

/// A named environment: base image plus bundle references.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub base_image: String,
    pub system_libs: String,
    pub packages: String,
}

/// Catalog overrides accepted from configuration files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogOverrides {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub system_libs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<String>>,
}

/// Read-only reference data: profiles and the bundles they point at.
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: BTreeMap<String, Profile>,
    system_libs: BTreeMap<String, Vec<String>>,
    packages: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let profiles = BTreeMap::from([
            (
                "minimal".to_string(),
                Profile {
                    base_image: "rocker/r-ver:4.4.1".to_string(),
                    system_libs: "core".to_string(),
                    packages: "minimal".to_string(),
                },
            ),
            (
                "tidyverse".to_string(),
                Profile {
                    base_image: "rocker/r-ver:4.4.1".to_string(),
                    system_libs: "core".to_string(),
                    packages: "tidyverse".to_string(),
                },
            ),
            (
                "geospatial".to_string(),
                Profile {
                    base_image: "rocker/r-ver:4.4.1".to_string(),
                    system_libs: "geospatial".to_string(),
                    packages: "geospatial".to_string(),
                },
            ),
            (
                "publishing".to_string(),
                Profile {
                    base_image: "rocker/verse:4.4.1".to_string(),
                    system_libs: "core".to_string(),
                    packages: "publishing".to_string(),
                },
            ),
        ]);
        let core_libs = vec![
            "libcurl4-openssl-dev".to_string(),
            "libssl-dev".to_string(),
            "libxml2-dev".to_string(),
            "zlib1g-dev".to_string(),
        ];
        let mut geospatial_libs = core_libs.clone();
        geospatial_libs.extend([
            "libgdal-dev".to_string(),
            "libgeos-dev".to_string(),
            "libproj-dev".to_string(),
            "libudunits2-dev".to_string(),
        ]);
        let system_libs = BTreeMap::from([
            ("core".to_string(), core_libs),
            ("geospatial".to_string(), geospatial_libs),
        ]);
        let packages = BTreeMap::from([
            ("minimal".to_string(), Vec::new()),
            (
                "tidyverse".to_string(),
                vec![
                    "tidyverse".to_string(),
                    "data.table".to_string(),
                    "janitor".to_string(),
                ],
            ),
            (
                "geospatial".to_string(),
                vec![
                    "sf".to_string(),
                    "terra".to_string(),
                    "stars".to_string(),
                    "leaflet".to_string(),
                ],
            ),
            (
                "publishing".to_string(),
                vec![
                    "rmarkdown".to_string(),
                    "knitr".to_string(),
                    "bookdown".to_string(),
                    "quarto".to_string(),
                ],
            ),
        ]);
        Self {
            profiles,
            system_libs,
            packages,
        }
    }

    /// Overlay configured profiles and bundles onto the builtin catalog.
    pub fn merge(&mut self, overrides: CatalogOverrides) {
        self.profiles.extend(overrides.profiles);
        self.system_libs.extend(overrides.system_libs);
        self.packages.extend(overrides.packages);
    }

    fn profile(&self, name: &str) -> Result<&Profile, ConfigurationError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownProfile {
                name: name.to_string(),
                known: self.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    fn system_lib_bundle(&self, name: &str) -> Result<&[String], ConfigurationError> {
        self.system_libs
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigurationError::UnknownBundle {
                kind: "system-library",
                name: name.to_string(),
                known: self
                    .system_libs
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn package_bundle(&self, name: &str) -> Result<&[String], ConfigurationError> {
        self.packages
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigurationError::UnknownBundle {
                kind: "package",
                name: name.to_string(),
                known: self.packages.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct ProfileRequest {
    pub profile: Option<String>,
    pub base_image: Option<String>,
    pub system_libs: Option<String>,
    pub packages: Option<String>,
}

impl ProfileRequest {
    fn has_overrides(&self) -> bool {
        self.base_image.is_some() || self.system_libs.is_some() || self.packages.is_some()
    }
}

/// Inputs for a synthesized build definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSpec {
    pub base_image: String,
    pub system_libs: Vec<String>,
    pub packages: Vec<String>,
}

/// How the build definition is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Reuse a precomputed definition shipped with the project.
    UseStaticDefinition(PathBuf),
    /// Synthesize a definition from the catalog.
    GenerateDefinition(GenerateSpec),
}

/// Conventional location for a profile's static definition.
pub fn static_definition_path(project_root: &Path, profile: &str) -> PathBuf {
    project_root
        .join("docker")
        .join(format!("Dockerfile.{profile}"))
}

/// Map a request onto a build strategy.
///
/// Unrecognized profile names are a hard error, and bundle references are
/// resolved before either terminal state is returned, so a broken catalog
/// never reaches the build step.
pub fn resolve(
    catalog: &Catalog,
    request: &ProfileRequest,
    project_root: &Path,
) -> Result<BuildStrategy, ConfigurationError> {
    let profile_name = request.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
    let profile = catalog.profile(profile_name)?;

    let libs_bundle = request
        .system_libs
        .as_deref()
        .unwrap_or(&profile.system_libs);
    let packages_bundle = request.packages.as_deref().unwrap_or(&profile.packages);
    let system_libs = catalog.system_lib_bundle(libs_bundle)?.to_vec();
    let packages = catalog.package_bundle(packages_bundle)?.to_vec();

    if !request.has_overrides() {
        let static_path = static_definition_path(project_root, profile_name);
        if static_path.is_file() {
            return Ok(BuildStrategy::UseStaticDefinition(static_path));
        }
    }

    let base_image = request
        .base_image
        .clone()
        .unwrap_or_else(|| profile.base_image.clone());
    Ok(BuildStrategy::GenerateDefinition(GenerateSpec {
        base_image,
        system_libs,
        packages,
    }))
}
