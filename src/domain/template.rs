//! Route template: saved zone-to-stores assignment replayed by generation.

use serde::{Deserialize, Serialize};

/// A saved, versioned route configuration. Replacing the JSON-blob storage
/// of earlier systems with a typed structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTemplate {
    pub id: i64,
    pub version: i64,
    pub entries: Vec<TemplateEntry>,
}

/// One zone slot of a template: which stores it visits and, optionally,
/// which technician it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub zone: String,
    pub technician_id: Option<i64>,
    pub store_ids: Vec<i64>,
}
