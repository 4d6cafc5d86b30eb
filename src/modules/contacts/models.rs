use serde::Serialize;
use serde_json::Value;

/// Collection holding contact form submissions.
pub const COLLECTION: &str = "contact";

/// Fields every stored contact message must carry.
pub const REQUIRED_FIELDS: &[&str] = &["name", "email", "message"];

/// Response of a successful `POST /contact`.
#[derive(Debug, Serialize)]
pub struct ContactCreated {
    pub message: &'static str,
    /// The stored document: the submitted payload plus its `id`
    pub contact: Value,
}
