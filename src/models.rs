use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One authorization rule record: a policy type plus up to six positional
/// string fields. Absent fields are stored as empty strings, and equality is
/// always the full seven-tuple comparison.
///
/// The JSON field names (`PType`, `V0`..`V5`) are part of the persisted
/// document format and must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(rename = "PType")]
    pub ptype: String,
    #[serde(rename = "V0")]
    pub v0: String,
    #[serde(rename = "V1")]
    pub v1: String,
    #[serde(rename = "V2")]
    pub v2: String,
    #[serde(rename = "V3")]
    pub v3: String,
    #[serde(rename = "V4")]
    pub v4: String,
    #[serde(rename = "V5")]
    pub v5: String,
}

impl PolicyRule {
    /// Builds a rule from positional fields. Missing trailing fields default
    /// to empty strings; fields past the sixth are dropped.
    pub fn from_rule(ptype: &str, rule: &[String]) -> Self {
        let field = |index: usize| rule.get(index).cloned().unwrap_or_default();
        Self {
            ptype: ptype.to_string(),
            v0: field(0),
            v1: field(1),
            v2: field(2),
            v3: field(3),
            v4: field(4),
            v5: field(5),
        }
    }

    /// Positional field access; `None` past the sixth field.
    pub fn field(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(&self.v0),
            1 => Some(&self.v1),
            2 => Some(&self.v2),
            3 => Some(&self.v3),
            4 => Some(&self.v4),
            5 => Some(&self.v5),
            _ => None,
        }
    }

    /// All six positional fields in order.
    pub fn fields(&self) -> [&str; 6] {
        [
            self.v0.as_str(),
            self.v1.as_str(),
            self.v2.as_str(),
            self.v3.as_str(),
            self.v4.as_str(),
            self.v5.as_str(),
        ]
    }

    /// Textual form fed to the policy engine's line loader, e.g.
    /// `"p, alice, data1, read"`. Each field is appended only when non-empty,
    /// so embedded empty fields compact away.
    pub fn as_line(&self) -> String {
        let mut line = self.ptype.clone();
        for value in self.fields() {
            if !value.is_empty() {
                line.push_str(", ");
                line.push_str(value);
            }
        }
        line
    }
}

/// A named remote storage configuration as persisted in the registry file:
/// credentials, the paths sync should skip, and the per-file last-sync
/// timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the remote entry point. Optional so registry files written
    /// before the field existed still parse; building a driver without one
    /// fails with a configuration error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub username: String,
    pub password: String,
    /// Exact-match local paths excluded from upload.
    #[serde(default)]
    pub ignores: Vec<String>,
    /// Local path to RFC3339 timestamp of the last completed upload.
    #[serde(default)]
    pub timelines: HashMap<String, String>,
}

/// Metadata for one remote resource, produced by listing a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub href: String,
    pub owner: String,
    pub status: String,
    pub is_collection: bool,
    pub content_type: String,
    pub content_length: i64,
    pub last_modified: String,
    pub privileges: Vec<String>,
}
