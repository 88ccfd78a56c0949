//! Download enumeration.
//!
//! Expands every package document into concrete download targets: one per
//! `urls` entry for `http` sources (in document order), one per package tag
//! for `oras` sources.
//! Documents are assumed to have passed validation already; anything that
//! does not parse aborts the whole enumeration.
use crate::docs::{collect_package_files, read_package_value};
use crate::package::{source_kind, Source, SourceKind};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One concrete (source, tag) retrieval target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadDescriptor {
    pub file: PathBuf,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// URL for `http`, `oci-ref:tag` for `oras`.
    pub reference: String,
}

/// The slice of a package document the enumerator reads.
#[derive(Debug, Deserialize)]
struct DownloadView {
    tags: Vec<String>,
    sources: Vec<Value>,
}

/// Enumerate download descriptors for every document under `root`.
pub fn collect_downloads(root: &Path) -> Result<Vec<DownloadDescriptor>> {
    let files = collect_package_files(root)?;
    if files.is_empty() {
        tracing::warn!("No package JSON files found under {}", root.display());
    }
    let mut downloads = Vec::new();
    for file in files {
        let value = read_package_value(&file).with_context(|| format!("load {}", file.display()))?;
        downloads.extend(document_downloads(&file, &value)?);
    }
    Ok(downloads)
}

/// Enumerate download descriptors for one parsed document.
pub fn document_downloads(file: &Path, doc: &Value) -> Result<Vec<DownloadDescriptor>> {
    let view = DownloadView::deserialize(doc)
        .with_context(|| format!("read tags and sources from {}", file.display()))?;
    let mut downloads = Vec::new();
    for (index, raw) in view.sources.iter().enumerate() {
        if source_kind(raw).is_none() {
            let kind = raw.get("type").map(Value::to_string);
            tracing::warn!(
                file = %file.display(),
                "Unknown source type {}",
                kind.as_deref().unwrap_or("<missing>")
            );
            continue;
        }
        let source = Source::deserialize(raw)
            .with_context(|| format!("decode sources[{index}] in {}", file.display()))?;
        match source {
            Source::Http { urls } => {
                for (tag, url) in urls {
                    if !view.tags.contains(&tag) {
                        return Err(anyhow!(
                            "Unknown tag {tag:?}: HTTP source in {} does not declare it in 'tags'",
                            file.display()
                        ));
                    }
                    downloads.push(DownloadDescriptor {
                        file: file.to_path_buf(),
                        tag,
                        kind: SourceKind::Http,
                        reference: url,
                    });
                }
            }
            Source::Oras { oci_ref } => {
                for tag in &view.tags {
                    downloads.push(DownloadDescriptor {
                        file: file.to_path_buf(),
                        tag: tag.clone(),
                        kind: SourceKind::Oras,
                        reference: format!("{oci_ref}:{tag}"),
                    });
                }
            }
        }
    }
    Ok(downloads)
}

#[cfg(test)]
#[path = "downloads_tests.rs"]
mod tests;
