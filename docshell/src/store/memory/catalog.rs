use crate::collection::Document;
use crate::common::{Atomic, ReadExecutor};
use dashmap::DashMap;
use itertools::Itertools;
use std::sync::Arc;

pub(crate) type CollectionData = Atomic<Vec<Document>>;

type DatabaseData = Arc<DashMap<String, CollectionData>>;

/// Databases and their collections, keyed by name.
///
/// Databases and collections come into existence on first write; reading
/// from a missing collection sees no documents.
#[derive(Clone, Default)]
pub(crate) struct MemoryCatalog {
    databases: Arc<DashMap<String, DatabaseData>>,
}

impl MemoryCatalog {
    /// Names of databases holding at least one collection, sorted.
    pub(crate) fn database_names(&self) -> Vec<String> {
        self.databases
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .sorted()
            .collect()
    }

    pub(crate) fn collection_names(&self, database: &str) -> Vec<String> {
        let database = match self.databases.get(database) {
            Some(entry) => entry.value().clone(),
            None => return Vec::new(),
        };
        database
            .iter()
            .map(|entry| entry.key().clone())
            .sorted()
            .collect()
    }

    /// Returns the collection, creating it and its database when missing.
    pub(crate) fn collection(&self, database: &str, collection: &str) -> CollectionData {
        let database = self
            .databases
            .entry(database.to_string())
            .or_default()
            .value()
            .clone();
        let data = database.entry(collection.to_string()).or_default();
        data.value().clone()
    }

    pub(crate) fn existing(&self, database: &str, collection: &str) -> Option<CollectionData> {
        let database = self.databases.get(database)?.value().clone();
        let collection = database.get(collection)?.value().clone();
        Some(collection)
    }

    /// A copy of the collection's documents in storage order.
    pub(crate) fn snapshot(&self, database: &str, collection: &str) -> Vec<Document> {
        match self.existing(database, collection) {
            Some(data) => data.read_with(|docs| docs.clone()),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::WriteExecutor;
    use crate::doc;

    #[test]
    fn test_empty_catalog() {
        let catalog = MemoryCatalog::default();
        assert!(catalog.database_names().is_empty());
        assert!(catalog.collection_names("db").is_empty());
        assert!(catalog.snapshot("db", "c").is_empty());
        assert!(catalog.existing("db", "c").is_none());
    }

    #[test]
    fn test_collection_creates_on_demand() {
        let catalog = MemoryCatalog::default();
        catalog.collection("b", "zips").write_with(|docs| docs.push(doc! { "a": 1 }));
        catalog.collection("a", "y");
        catalog.collection("a", "x");

        assert_eq!(catalog.database_names(), vec!["a", "b"]);
        assert_eq!(catalog.collection_names("a"), vec!["x", "y"]);
        assert_eq!(catalog.snapshot("b", "zips"), vec![doc! { "a": 1 }]);
    }

    #[test]
    fn test_clones_share_data() {
        let catalog = MemoryCatalog::default();
        let other = catalog.clone();
        other.collection("db", "c").write_with(|docs| docs.push(doc! {}));
        assert_eq!(catalog.snapshot("db", "c").len(), 1);
    }
}
