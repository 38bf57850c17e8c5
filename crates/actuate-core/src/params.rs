//! Caller parameters and the bindings they normalize into.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// Ordered name -> value bindings consumed by the substitution engine.
///
/// Insertion order follows the first appearance of a name; the value is the
/// last one written.
pub type Bindings = IndexMap<String, JsonValue>;

/// A single query-string or header parameter as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldParam {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl OldParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandQueryParams {
    #[serde(default)]
    pub query_params: Vec<OldParam>,
    #[serde(default)]
    pub header_params: Vec<OldParam>,
}

impl CommandQueryParams {
    pub fn new(query_params: Vec<OldParam>, header_params: Vec<OldParam>) -> Self {
        Self { query_params, header_params }
    }

    pub fn is_empty(&self) -> bool {
        self.query_params.is_empty() && self.header_params.is_empty()
    }

    /// True when any query or header param has an empty name
    pub fn has_unnamed(&self) -> bool {
        self.header_params.iter().chain(&self.query_params).any(OldParam::is_unnamed)
    }

    /// Merge both lists into `bindings` as string values.
    ///
    /// Headers are written first and query params second, so a name present
    /// in both resolves to the query value. Within one list the last
    /// occurrence wins. Params with an empty name are skipped; callers
    /// reject them up front with [`Self::has_unnamed`].
    pub fn merge_into(&self, bindings: &mut Bindings) {
        for param in self.header_params.iter().chain(self.query_params.iter()) {
            if param.is_unnamed() {
                continue;
            }
            bindings.insert(param.name.clone(), JsonValue::String(param.value.clone()));
        }
    }

    pub fn to_bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        self.merge_into(&mut bindings);
        bindings
    }
}

/// Reference to an uploaded file spooled to disk.
///
/// The spool file is removed once the last clone of the reference drops.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub part_name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
    spool: Arc<TempPath>,
}

impl AttachmentRef {
    pub fn new(
        part_name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        size: u64,
        spool: TempPath,
    ) -> Self {
        Self {
            part_name: part_name.into(),
            filename: filename.into(),
            content_type,
            size,
            spool: Arc::new(spool),
        }
    }

    pub fn path(&self) -> &Path {
        &self.spool
    }

    pub fn path_buf(&self) -> PathBuf {
        self.spool.to_path_buf()
    }

    /// Metadata form that stands in for the file inside bindings.
    pub fn to_binding(&self) -> JsonValue {
        json!({
            "name": self.part_name,
            "filename": self.filename,
            "contentType": self.content_type,
            "size": self.size,
            "path": self.path().display().to_string(),
        })
    }
}
