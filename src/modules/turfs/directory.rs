//! Read-only turf lookups.

use turfbook_db::{Database, DbError, Filter};

use super::models::{Turf, COLLECTION};

/// Case-insensitive substring lookups over the turf collection.
#[derive(Clone)]
pub struct TurfDirectory {
    db: Database,
}

impl TurfDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn all(&self) -> Result<Vec<Turf>, DbError> {
        self.db.find(COLLECTION, &Filter::All).await
    }

    pub async fn by_location(&self, location: &str) -> Result<Vec<Turf>, DbError> {
        self.db
            .find(COLLECTION, &Filter::contains_ignore_case("location", location))
            .await
    }

    /// Turfs whose name or location contains the given text.
    ///
    /// Criteria left out are ignored; with none at all nothing matches.
    pub async fn search(
        &self,
        name: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<Turf>, DbError> {
        let criteria = [("name", name), ("location", location)]
            .into_iter()
            .filter_map(|(field, needle)| {
                needle.map(|needle| Filter::contains_ignore_case(field, needle))
            });

        self.db.find(COLLECTION, &Filter::or(criteria)).await
    }

    pub async fn count(&self) -> Result<usize, DbError> {
        self.db.count(COLLECTION, &Filter::All).await
    }
}
