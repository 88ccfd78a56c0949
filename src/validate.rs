//! Schema validation for package documents.
//!
//! Validation runs over untyped JSON so a single pass can report every
//! problem in a document instead of stopping at the first decode error.
//! Checks never short-circuit each other; an empty result means the document
//! may be normalized into an index entry.
//!
//! ## Checks
//! - **Identity**: `name`, `version`, `query` are non-empty strings.
//! - **Sources**: a non-empty array; each entry is checked on its own and
//!   reported as `sources[N]`.
//! - **Retired fields**: `container` is rejected whatever its value.
//! - **Ownership**: `maintainer` carries non-empty `name` and `email`.
//! - **Tags**: an array of non-empty strings.
//! - **Includes**: an object when present.
//! - **Query shape**: contains a `:` (`group.artifact:tagPattern`).
//!
//! ## Example
//! ```text
//! {"name": "demo", "version": "1.0", "query": "org.demo", "container": "x", ...}
//! -> pkg/demo.json: 'container' is no longer supported; declare downloads under 'sources'
//! -> pkg/demo.json: 'query' must look like 'group.artifact:tagPattern' (e.g., org.foo.bar:1.0-*)
//! ```
//!
//! The tag/`urls` consistency rule is not checked here; the download
//! enumerator enforces it.

use crate::docs::{collect_package_files, display_path, read_package_value};
use crate::package::{
    is_nonempty_str, PackageDocument, SourceKind, HTTP_URL_PREFIXES, OCI_REF_PREFIX,
    RETIRED_FIELDS,
};
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const REQUIRED_STRING_FIELDS: [&str; 3] = ["name", "version", "query"];
const ORAS_REQUIRED_FIELDS: [&str; 3] = ["repo", "rel", "oci-ref"];

/// Accumulates messages prefixed with the document path.
struct Findings<'a> {
    rel_path: &'a str,
    errors: Vec<String>,
}

impl<'a> Findings<'a> {
    fn new(rel_path: &'a str) -> Self {
        Self {
            rel_path,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, message: impl AsRef<str>) {
        self.errors
            .push(format!("{}: {}", self.rel_path, message.as_ref()));
    }
}

/// Validate one parsed package document.
///
/// `rel_path` is used only to prefix messages; pass the path relative to the
/// package root so diagnostics stay readable.
pub fn validate_package(doc: &Value, rel_path: &str) -> Vec<String> {
    let mut findings = Findings::new(rel_path);

    if !doc.is_object() {
        findings.push(format!(
            "document must be a JSON object (got {})",
            json_kind(doc)
        ));
    }

    for key in REQUIRED_STRING_FIELDS {
        if !is_nonempty_str(doc.get(key)) {
            findings.push(format!("missing or empty '{key}' (string required)"));
        }
    }

    check_sources(doc.get("sources"), &mut findings);

    for key in RETIRED_FIELDS {
        if doc.get(key).is_some() {
            findings.push(format!(
                "'{key}' is no longer supported; declare downloads under 'sources'"
            ));
        }
    }

    let maintainer = doc.get("maintainer");
    let maintainer_ok = maintainer.is_some_and(Value::is_object)
        && is_nonempty_str(maintainer.and_then(|m| m.get("name")))
        && is_nonempty_str(maintainer.and_then(|m| m.get("email")));
    if !maintainer_ok {
        findings.push("'maintainer' must be an object with non-empty 'name' and 'email'");
    }

    let tags_ok = doc
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().all(|tag| is_nonempty_str(Some(tag))));
    if !tags_ok {
        findings.push("'tags' must be an array of non-empty strings");
    }

    if let Some(includes) = doc.get("includes") {
        if !includes.is_object() {
            findings.push("'includes' must be an object if present");
        }
    }

    if let Some(query) = doc.get("query").and_then(Value::as_str) {
        if !query.contains(':') {
            findings.push(
                "'query' must look like 'group.artifact:tagPattern' (e.g., org.foo.bar:1.0-*)",
            );
        }
    }

    findings.errors
}

/// Outcome of reading and validating every document under a package root.
#[derive(Debug, Default)]
pub struct PackageScan {
    /// Documents with no errors, in path order.
    pub valid: Vec<(PathBuf, PackageDocument)>,
    /// File-level and field-level messages, in path order.
    pub errors: Vec<String>,
    pub total_files: usize,
    pub skipped_files: usize,
}

impl PackageScan {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Read and validate every package document under `root`.
///
/// Problems in one file never stop the scan: unparsable files and files with
/// field errors are recorded and skipped.
pub fn scan_packages(root: &Path) -> Result<PackageScan> {
    let files = collect_package_files(root)?;
    if files.is_empty() {
        tracing::warn!("No package JSON files found under {}", root.display());
    }
    let mut scan = PackageScan {
        total_files: files.len(),
        ..PackageScan::default()
    };
    for file in files {
        let rel = display_path(&file, Some(root));
        let value = match read_package_value(&file) {
            Ok(value) => value,
            Err(err) => {
                scan.errors.push(format!("{rel}: {err:#}"));
                scan.skipped_files += 1;
                continue;
            }
        };
        let errors = validate_package(&value, &rel);
        if !errors.is_empty() {
            tracing::debug!(file = %rel, count = errors.len(), "package failed validation");
            scan.errors.extend(errors);
            scan.skipped_files += 1;
            continue;
        }
        match PackageDocument::from_value(&value) {
            Ok(doc) => scan.valid.push((file, doc)),
            Err(err) => {
                scan.errors.push(format!("{rel}: {err:#}"));
                scan.skipped_files += 1;
            }
        }
    }
    Ok(scan)
}

fn check_sources(sources: Option<&Value>, findings: &mut Findings<'_>) {
    let Some(sources) = sources else {
        findings.push("missing 'sources' (non-empty array required)");
        return;
    };
    let Some(sources) = sources.as_array() else {
        findings.push(format!(
            "'sources' must be an array (got {})",
            json_kind(sources)
        ));
        return;
    };
    if sources.is_empty() {
        findings.push("'sources' must contain at least one source");
        return;
    }
    for (index, source) in sources.iter().enumerate() {
        check_source(index, source, findings);
    }
}

fn check_source(index: usize, source: &Value, findings: &mut Findings<'_>) {
    let label = format!("sources[{index}]");
    let Some(fields) = source.as_object() else {
        findings.push(format!(
            "{label}: must be an object (got {})",
            json_kind(source)
        ));
        return;
    };

    let raw_type = fields.get("type");
    let kind = raw_type
        .and_then(Value::as_str)
        .and_then(SourceKind::parse);
    let Some(kind) = kind else {
        let supported: Vec<&str> = SourceKind::ALL.iter().map(|kind| kind.as_str()).collect();
        findings.push(format!(
            "{label}: 'type' must be one of {} (got {})",
            supported.join(", "),
            describe_value(raw_type)
        ));
        return;
    };

    match kind {
        SourceKind::Oras => check_oras_source(&label, fields, findings),
        SourceKind::Http => check_http_source(&label, fields, findings),
    }
}

fn check_oras_source(label: &str, fields: &Map<String, Value>, findings: &mut Findings<'_>) {
    for key in ORAS_REQUIRED_FIELDS {
        if !is_nonempty_str(fields.get(key)) {
            findings.push(format!(
                "{label}: missing or empty '{key}' (required for oras sources)"
            ));
        }
    }
    if let Some(oci_ref) = fields.get("oci-ref").and_then(Value::as_str) {
        if !oci_ref.trim().is_empty() && !oci_ref.starts_with(OCI_REF_PREFIX) {
            findings.push(format!(
                "{label}: 'oci-ref' must start with '{OCI_REF_PREFIX}' (got '{oci_ref}')"
            ));
        }
    }
}

fn check_http_source(label: &str, fields: &Map<String, Value>, findings: &mut Findings<'_>) {
    if !is_nonempty_str(fields.get("repo")) {
        findings.push(format!(
            "{label}: missing or empty 'repo' (required for http sources)"
        ));
    }
    let Some(urls) = fields.get("urls").and_then(Value::as_object) else {
        findings.push(format!(
            "{label}: 'urls' must be an object mapping tags to URLs"
        ));
        return;
    };
    for (tag, url) in urls {
        if tag.trim().is_empty() {
            findings.push(format!("{label}: 'urls' keys must be non-empty tags"));
        }
        match url.as_str().filter(|url| !url.trim().is_empty()) {
            None => findings.push(format!(
                "{label}: urls['{tag}'] must be a non-empty string"
            )),
            Some(url) if !HTTP_URL_PREFIXES.iter().any(|p| url.starts_with(p)) => {
                findings.push(format!(
                    "{label}: urls['{tag}'] must start with http:// or https:// (got '{url}')"
                ))
            }
            Some(_) => {}
        }
    }
}

fn describe_value(value: Option<&Value>) -> String {
    match value {
        None => "nothing".to_string(),
        Some(Value::String(text)) => format!("{text:?}"),
        Some(other) => json_kind(other).to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
