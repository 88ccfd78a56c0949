//! Aggregated package index.
//!
//! The index is rebuilt from scratch on every run: each valid document
//! becomes one entry keyed by its trimmed `query`. Nothing is merged with a
//! previous index on disk.
use crate::docs::display_path;
use crate::package::{Maintainer, PackageDocument};
use crate::validate::{scan_packages, PackageScan};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_SCHEMA_VERSION: u32 = 1;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Index {
    pub version: u32,
    pub owner: String,
    pub repo: String,
    /// `ghcr.io/<owner>/<repo>`, or empty when either half is missing.
    pub base: String,
    pub prefix: String,
    pub packages: BTreeMap<String, IndexEntry>,
    pub updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    pub query: String,
    pub maintainer: Maintainer,
    /// Deduplicated and sorted.
    pub tags: Vec<String>,
    pub sources: Vec<Value>,
    pub updated: String,
    /// `description`, `homepage`, `license`, `includes` when present.
    #[serde(flatten)]
    pub optional: BTreeMap<String, Value>,
}

impl IndexEntry {
    pub fn from_document(doc: &PackageDocument, updated: &str) -> Self {
        let tags: BTreeSet<String> = doc.tags.iter().cloned().collect();
        IndexEntry {
            name: doc.name.trim().to_string(),
            version: doc.version.trim().to_string(),
            query: doc.query.trim().to_string(),
            maintainer: Maintainer {
                name: doc.maintainer.name.trim().to_string(),
                email: doc.maintainer.email.trim().to_string(),
            },
            tags: tags.into_iter().collect(),
            sources: doc.sources.clone(),
            updated: updated.to_string(),
            optional: doc.optional_fields(),
        }
    }

    /// Key under which the entry is stored in `Index::packages`.
    pub fn key(&self) -> &str {
        &self.query
    }
}

impl Index {
    pub fn new(owner: &str, repo: &str, prefix: &str, updated: &str) -> Self {
        Index {
            version: INDEX_SCHEMA_VERSION,
            owner: owner.to_string(),
            repo: repo.to_string(),
            base: ghcr_base(owner, repo),
            prefix: prefix.to_string(),
            packages: BTreeMap::new(),
            updated: updated.to_string(),
        }
    }

    /// Insert an entry, returning the entry it replaced if the key was taken.
    pub fn insert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        self.packages.insert(entry.key().to_string(), entry)
    }
}

pub fn ghcr_base(owner: &str, repo: &str) -> String {
    if owner.is_empty() || repo.is_empty() {
        return String::new();
    }
    format!("ghcr.io/{owner}/{repo}")
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Inputs for a single index build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub packages_dir: PathBuf,
    pub owner: String,
    pub repo: String,
    pub prefix: String,
    pub out: PathBuf,
}

/// What a build produced and what it had to skip.
#[derive(Debug)]
pub struct BuildOutcome {
    pub index: Index,
    pub errors: Vec<String>,
    pub skipped_files: usize,
    pub out: PathBuf,
}

impl BuildOutcome {
    pub fn entry_count(&self) -> usize {
        self.index.packages.len()
    }
}

/// Fold validated documents into an index. Later documents win key clashes.
pub fn compile_index(scan: &PackageScan, options: &BuildOptions, updated: &str) -> Index {
    let mut index = Index::new(&options.owner, &options.repo, &options.prefix, updated);
    for (path, doc) in &scan.valid {
        let entry = IndexEntry::from_document(doc, updated);
        let key = entry.key().to_string();
        if index.insert(entry).is_some() {
            tracing::warn!(
                query = %key,
                file = %display_path(path, Some(options.packages_dir.as_path())),
                "duplicate query; replacing earlier entry"
            );
        }
    }
    index
}

/// Scan, validate, and write the index.
///
/// The index is written even when some documents were rejected; deciding
/// whether that fails the run is left to the caller.
pub fn build_index(options: &BuildOptions) -> Result<BuildOutcome> {
    let scan = scan_packages(&options.packages_dir)?;
    let index = compile_index(&scan, options, &now_timestamp());
    write_index(&options.out, &index)?;
    tracing::info!(
        entries = index.packages.len(),
        skipped = scan.skipped_files,
        out = %options.out.display(),
        "wrote index"
    );
    Ok(BuildOutcome {
        index,
        errors: scan.errors,
        skipped_files: scan.skipped_files,
        out: options.out.clone(),
    })
}

/// Serialize with sorted keys and two-space indentation.
pub fn render_index(index: &Index) -> Result<String> {
    let value = sort_keys(serde_json::to_value(index).context("serialize index")?);
    let mut text = serde_json::to_string_pretty(&value).context("render index JSON")?;
    text.push('\n');
    Ok(text)
}

/// Reorder object keys at every depth. Maps keep insertion order, so
/// documents read from disk come back in the order they were written.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub fn write_index(path: &Path, index: &Index) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = render_index(index)?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
