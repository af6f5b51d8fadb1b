//! DESCRIPTION manifest parsing and editing.
//!
//! The manifest is human-edited, so parsing preserves every field verbatim
//! and only the dependency field being edited is re-rendered canonically.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "DESCRIPTION";

/// Dependency field categories recognized by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependencyField {
    /// Required at runtime.
    Imports,
    /// Development-only.
    Suggests,
}

impl DependencyField {
    pub fn key(self) -> &'static str {
        match self {
            DependencyField::Imports => "Imports",
            DependencyField::Suggests => "Suggests",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "Imports" => Some(DependencyField::Imports),
            "Suggests" => Some(DependencyField::Suggests),
            _ => None,
        }
    }
}

/// One declared dependency: bare name, optional version constraint, category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub constraint: Option<String>,
    pub field: DependencyField,
}

#[derive(Debug, Clone)]
struct Field {
    /// `None` marks a verbatim line (blank or otherwise field-less).
    key: Option<String>,
    raw_lines: Vec<String>,
    /// Set once a dependency field is edited; rendering then canonicalizes.
    entries: Option<Vec<ManifestEntry>>,
}

/// Parsed DESCRIPTION file.
#[derive(Debug, Clone)]
pub struct Manifest {
    fields: Vec<Field>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: Vec<Field> = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.starts_with(' ') || line.starts_with('\t') {
                match fields.last_mut() {
                    Some(field) if field.key.is_some() => field.raw_lines.push(line.to_string()),
                    _ => {
                        return Err(anyhow!(
                            "{MANIFEST_FILE} line {}: continuation line without a field",
                            index + 1
                        ))
                    }
                }
                continue;
            }
            if line.trim().is_empty() {
                fields.push(Field {
                    key: None,
                    raw_lines: vec![line.to_string()],
                    entries: None,
                });
                continue;
            }
            let Some((key, _)) = line.split_once(':') else {
                return Err(anyhow!(
                    "{MANIFEST_FILE} line {}: expected `Field: value`, got {line:?}",
                    index + 1
                ));
            };
            fields.push(Field {
                key: Some(key.trim().to_string()),
                raw_lines: vec![line.to_string()],
                entries: None,
            });
        }
        Ok(Self { fields })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    /// Project name from the `Package` field.
    pub fn name(&self) -> Option<String> {
        let field = self.find(|key| key == "Package")?;
        let value = field_value_text(field);
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// All declared dependencies across recognized dependency fields.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let mut entries = Vec::new();
        for field in &self.fields {
            let Some(kind) = field
                .key
                .as_deref()
                .and_then(DependencyField::from_key)
            else {
                continue;
            };
            match &field.entries {
                Some(parsed) => entries.extend(parsed.iter().cloned()),
                None => entries.extend(parse_entries(&field_value_text(field), kind)),
            }
        }
        entries
    }

    pub fn dependency_names(&self) -> BTreeSet<String> {
        self.entries().into_iter().map(|entry| entry.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries().iter().any(|entry| entry.name == name)
    }

    /// Append a dependency without a version constraint, creating the field
    /// if the manifest does not carry it yet.
    pub fn add_entry(&mut self, name: &str, kind: DependencyField) {
        let entry = ManifestEntry {
            name: name.to_string(),
            constraint: None,
            field: kind,
        };
        if let Some(field) = self
            .fields
            .iter_mut()
            .find(|field| field.key.as_deref() == Some(kind.key()))
        {
            let mut parsed = match field.entries.take() {
                Some(parsed) => parsed,
                None => parse_entries(&field_value_text(field), kind),
            };
            if !parsed.iter().any(|existing| existing.name == entry.name) {
                parsed.push(entry);
            }
            field.entries = Some(parsed);
            return;
        }
        self.fields.push(Field {
            key: Some(kind.key().to_string()),
            raw_lines: Vec::new(),
            entries: Some(vec![entry]),
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            match (&field.entries, field.key.as_deref()) {
                (Some(entries), Some(key)) => {
                    out.push_str(key);
                    out.push(':');
                    out.push('\n');
                    for (index, entry) in entries.iter().enumerate() {
                        out.push_str("    ");
                        out.push_str(&entry.name);
                        if let Some(constraint) = &entry.constraint {
                            out.push_str(&format!(" ({constraint})"));
                        }
                        if index + 1 < entries.len() {
                            out.push(',');
                        }
                        out.push('\n');
                    }
                }
                _ => {
                    for line in &field.raw_lines {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    fn find(&self, matches: impl Fn(&str) -> bool) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.key.as_deref().is_some_and(&matches))
    }
}

/// Field value with continuation lines folded in.
fn field_value_text(field: &Field) -> String {
    let mut parts = Vec::new();
    for (index, line) in field.raw_lines.iter().enumerate() {
        if index == 0 {
            if let Some((_, value)) = line.split_once(':') {
                parts.push(value.trim().to_string());
            }
        } else {
            parts.push(line.trim().to_string());
        }
    }
    parts.join(" ")
}

/// Split a comma-separated dependency list, stripping parenthesized version
/// constraints into their own slot.
fn parse_entries(value: &str, kind: DependencyField) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, constraint) = match part.split_once('(') {
            Some((name, rest)) => {
                let constraint = rest.trim_end().trim_end_matches(')').trim();
                (
                    name.trim(),
                    (!constraint.is_empty()).then(|| constraint.to_string()),
                )
            }
            None => (part, None),
        };
        if name.is_empty() {
            continue;
        }
        entries.push(ManifestEntry {
            name: name.to_string(),
            constraint,
            field: kind,
        });
    }
    entries
}
