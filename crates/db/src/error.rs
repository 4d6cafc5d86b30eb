use thiserror::Error;

/// Errors raised by the document store.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("duplicate key in '{collection}' violates unique index '{index}'")]
    DuplicateKey { collection: String, index: String },

    #[error("document in '{collection}' is missing required field '{field}'")]
    MissingField { collection: String, field: String },

    #[error("documents in '{collection}' must be JSON objects")]
    NotAnObject { collection: String },

    #[error("'{0}' is not a valid collection, index or field name")]
    InvalidName(String),

    #[error("failed to (de)serialize document in '{collection}': {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Engine(#[from] sqlx::Error),
}

impl DbError {
    /// Whether the error comes from a schema rule rather than the engine.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            DbError::MissingField { .. } | DbError::NotAnObject { .. }
        )
    }

    /// Classify an engine error raised while writing to `collection`.
    ///
    /// SQLite names the violated index as `index 'name'` for expression
    /// indexes; the `(collection, id)` key reports its columns instead.
    pub(crate) fn from_write(collection: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let index = db
                    .message()
                    .split_once("index '")
                    .and_then(|(_, rest)| rest.split_once('\''))
                    .map(|(name, _)| name.to_string())
                    .unwrap_or_else(|| "id".to_string());
                DbError::DuplicateKey {
                    collection: collection.to_string(),
                    index,
                }
            }
            _ => DbError::Engine(err),
        }
    }
}
