//! Package document model.
//!
//! Documents are validated as untyped JSON first (see `validate`) so every
//! shape problem can be reported; the typed views here are only built from
//! documents that are expected to be well formed.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Registry prefix every `oras` reference must carry.
pub const OCI_REF_PREFIX: &str = "ghcr.io/";

/// URL schemes accepted for `http` sources.
pub const HTTP_URL_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Top-level fields that used to be part of the schema and are now rejected.
pub const RETIRED_FIELDS: [&str; 1] = ["container"];

/// Retrieval method declared by a source's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Oras,
    Http,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Oras, SourceKind::Http];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "oras" => Some(SourceKind::Oras),
            "http" => Some(SourceKind::Http),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Oras => "oras",
            SourceKind::Http => "http",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Maintainer {
    pub name: String,
    pub email: String,
}

/// A package document that passed validation.
///
/// `sources` stay untyped: the index carries them through exactly as written.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    pub version: String,
    pub query: String,
    pub maintainer: Maintainer,
    pub tags: Vec<String>,
    pub sources: Vec<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub homepage: Option<Value>,
    #[serde(default)]
    pub license: Option<Value>,
    #[serde(default)]
    pub includes: Option<Value>,
}

impl PackageDocument {
    pub fn from_value(value: &Value) -> Result<Self> {
        PackageDocument::deserialize(value).context("decode package document")
    }

    /// Optional fields present on the document, keyed by field name.
    pub fn optional_fields(&self) -> BTreeMap<String, Value> {
        let fields = [
            ("description", &self.description),
            ("homepage", &self.homepage),
            ("license", &self.license),
            ("includes", &self.includes),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| value.clone().map(|value| (key.to_string(), value)))
            .collect()
    }
}

/// Typed view of a single source, keyed on `type`.
///
/// Only the fields needed to locate downloads are decoded.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    Oras {
        #[serde(rename = "oci-ref")]
        oci_ref: String,
    },
    Http {
        /// Kept in document order.
        urls: IndexMap<String, String>,
    },
}

/// Read the `type` of a raw source, if it names a known kind.
pub fn source_kind(source: &Value) -> Option<SourceKind> {
    source
        .get("type")
        .and_then(Value::as_str)
        .and_then(SourceKind::parse)
}

pub fn is_nonempty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|text| !text.trim().is_empty())
}
