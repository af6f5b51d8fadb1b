//! Dependency scanner for R source trees.
//!
//! Extraction is regex-based and name-grammar gated: anything that does not
//! look like a package name is dropped before it can reach the reconciler.
use crate::util::display_path;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never scanned for package references.
const SKIPPED_DIRS: &[&str] = &["renv", "docker", "packrat"];

/// A package name observed in a source file, with its first-seen location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub name: String,
    pub path: PathBuf,
    pub line: usize,
}

/// Scanner output: unique names plus diagnostics for the run summary.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub references: Vec<PackageReference>,
    pub files_scanned: usize,
    pub warnings: Vec<String>,
}

impl ScanReport {
    /// Unique package names, order-independent.
    pub fn names(&self) -> BTreeSet<String> {
        self.references
            .iter()
            .map(|reference| reference.name.clone())
            .collect()
    }

    /// First-seen location for a package, for diagnostics.
    pub fn first_reference(&self, name: &str) -> Option<&PackageReference> {
        self.references
            .iter()
            .find(|reference| reference.name == name)
    }
}

/// Extracts externally-referenced package names from a source tree.
pub struct Scanner {
    extensions: Vec<String>,
    namespaced_call: Regex,
    load_statement: Regex,
}

impl Scanner {
    pub fn new(extensions: &[String]) -> Self {
        // `pkg::symbol` and `pkg:::symbol`; the trailing class keeps a bare
        // dangling `pkg::` from counting as a reference.
        let namespaced_call = Regex::new(r"([A-Za-z][A-Za-z0-9.]*):{2,3}[A-Za-z._`]")
            .expect("regex for namespaced calls");
        // Load statements must be terminated by `,` or `)`; an unclosed
        // `library(pkg` is not a reference.
        let load_statement = Regex::new(
            r#"\b(?:library|require|requireNamespace)\s*\(\s*["']?([A-Za-z][A-Za-z0-9.]*)["']?\s*[,)]"#,
        )
        .expect("regex for load statements");
        Self {
            extensions: extensions.to_vec(),
            namespaced_call,
            load_statement,
        }
    }

    /// Scan a project tree and collect every package reference.
    ///
    /// Unreadable files are recorded as warnings, never fatal. An empty
    /// report is a valid outcome.
    pub fn scan(&self, root: &Path) -> ScanReport {
        let mut report = ScanReport::default();
        let mut seen = BTreeSet::new();
        self.scan_dir(root, root, &mut report, &mut seen);
        report
    }

    fn scan_dir(
        &self,
        root: &Path,
        dir: &Path,
        report: &mut ScanReport,
        seen: &mut BTreeSet<String>,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                let message = format!("skipping {}: {err}", display_path(dir, Some(root)));
                tracing::warn!("{message}");
                report.warnings.push(message);
                return;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                if self.should_descend(&path) {
                    self.scan_dir(root, &path, report, seen);
                }
                continue;
            }
            if !self.wants_file(&path) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => {
                    report.files_scanned += 1;
                    self.scan_file(root, &path, &content, report, seen);
                }
                Err(err) => {
                    let message = format!("skipping {}: {err}", display_path(&path, Some(root)));
                    tracing::warn!("{message}");
                    report.warnings.push(message);
                }
            }
        }
    }

    fn should_descend(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        !name.starts_with('.') && !SKIPPED_DIRS.contains(&name)
    }

    fn wants_file(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(extension))
    }

    fn scan_file(
        &self,
        root: &Path,
        path: &Path,
        content: &str,
        report: &mut ScanReport,
        seen: &mut BTreeSet<String>,
    ) {
        for (index, line) in content.lines().enumerate() {
            for capture in self.namespaced_call.captures_iter(line) {
                self.accept(root, path, index + 1, &capture[1], report, seen);
            }
            for capture in self.load_statement.captures_iter(line) {
                self.accept(root, path, index + 1, &capture[1], report, seen);
            }
        }
    }

    fn accept(
        &self,
        root: &Path,
        path: &Path,
        line: usize,
        candidate: &str,
        report: &mut ScanReport,
        seen: &mut BTreeSet<String>,
    ) {
        if !is_valid_package_name(candidate) {
            return;
        }
        if !seen.insert(candidate.to_string()) {
            return;
        }
        report.references.push(PackageReference {
            name: candidate.to_string(),
            path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            line,
        });
    }
}

/// Package-name grammar: starts with a letter, letters/digits/dot only,
/// minimum length 2. This is the sole filter between raw matches and the
/// reconciler.
pub fn is_valid_package_name(name: &str) -> bool {
    if name.len() < 2 {
        return false;
    }
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_scanner() -> Scanner {
        Scanner::new(&["R".to_string(), "Rmd".to_string(), "qmd".to_string()])
    }

    fn scan_single_file(content: &str) -> ScanReport {
        let dir = TempDir::new().expect("temp project");
        fs::write(dir.path().join("analysis.R"), content).expect("write fixture");
        default_scanner().scan(dir.path())
    }

    #[test]
    fn finds_namespaced_calls_and_load_statements() {
        let report = scan_single_file(
            "library(ggplot2)\nrequire(dplyr)\nresult <- readr::read_csv(\"data.csv\")\n",
        );
        let names = report.names();
        assert!(names.contains("ggplot2"));
        assert!(names.contains("dplyr"));
        assert!(names.contains("readr"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn two_character_names_are_accepted() {
        let report = scan_single_file("sf::st_read(\"shapes.gpkg\")\nlibrary(sf)\n");
        assert!(report.names().contains("sf"));
    }

    #[test]
    fn unterminated_load_statement_is_rejected() {
        let report = scan_single_file("library(ggplot2\n");
        assert!(report.names().is_empty());
    }

    #[test]
    fn single_letter_names_fail_the_grammar() {
        assert!(!is_valid_package_name("s"));
        assert!(is_valid_package_name("sf"));
        assert!(is_valid_package_name("data.table"));
        assert!(!is_valid_package_name("1pkg"));
        assert!(!is_valid_package_name("pkg-name"));
    }

    #[test]
    fn triple_colon_counts_as_a_reference() {
        let report = scan_single_file("utils:::askYesNo(\"ok?\")\n");
        assert!(report.names().contains("utils"));
    }

    #[test]
    fn quoted_require_namespace_is_found() {
        let report = scan_single_file("if (requireNamespace(\"curl\", quietly = TRUE)) {}\n");
        assert!(report.names().contains("curl"));
    }

    #[test]
    fn references_carry_first_seen_location() {
        let report = scan_single_file("x <- 1\nlibrary(jsonlite)\n");
        let reference = report.first_reference("jsonlite").expect("reference");
        assert_eq!(reference.line, 2);
        assert_eq!(reference.path, PathBuf::from("analysis.R"));
    }

    #[test]
    fn renv_directory_is_not_scanned() {
        let dir = TempDir::new().expect("temp project");
        let renv = dir.path().join("renv");
        fs::create_dir(&renv).expect("create renv dir");
        fs::write(renv.join("activate.R"), "library(hidden)\n").expect("write fixture");
        fs::write(dir.path().join("run.R"), "library(visible)\n").expect("write fixture");
        let report = default_scanner().scan(dir.path());
        assert_eq!(report.names(), BTreeSet::from(["visible".to_string()]));
    }

    #[test]
    fn empty_tree_is_a_valid_result() {
        let dir = TempDir::new().expect("temp project");
        let report = default_scanner().scan(dir.path());
        assert!(report.names().is_empty());
        assert!(report.warnings.is_empty());
    }
}
