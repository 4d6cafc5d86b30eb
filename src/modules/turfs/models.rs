use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection holding administrator-managed turfs.
pub const COLLECTION: &str = "turf";

/// A bookable venue with its catalog of slot labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turf {
    /// Storage-assigned identifier
    pub id: String,
    /// Display name of the turf
    pub name: String,
    /// Free-text address or area
    pub location: String,
    /// Ordered slot catalog, e.g. `["9AM", "10AM"]`
    #[serde(rename = "time")]
    pub slots: Vec<String>,
    /// Any other administrator-defined attributes, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Turf {
    /// Whether `slot` belongs to this turf's catalog.
    pub fn offers(&self, slot: &str) -> bool {
        self.slots.iter().any(|s| s == slot)
    }
}

/// Query string of `GET /turfs`.
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub location: Option<String>,
}

/// Query string of `GET /searchTurfs`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Response body of the turf listing endpoints.
#[derive(Debug, Serialize)]
pub struct TurfList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub turfs: Vec<Turf>,
}
