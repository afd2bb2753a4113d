//! In-memory typed property graph.
//!
//! A [`Graph`] is a pair of sets keyed by identity tuples: assets identified
//! by `(type, value)` and relations identified by the
//! `(from, type, to)` triple. The set representation keeps cyclic graphs
//! trivially representable and makes diffing two snapshots a set difference.

mod binder;
mod bulk;
pub mod schema;
pub mod wire;

pub use binder::GraphBinder;
pub use bulk::{diff, Bulk};
pub use schema::SchemaGraph;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A typed vertex. Identity is the `(type, value)` pair; assets are
/// immutable, an update is remove-then-insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: String,
}

impl Asset {
    pub fn new(asset_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            asset_type: asset_type.into(),
            value: value.into(),
        }
    }
}

/// A directed typed edge between two assets. Identity is the full triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub from: Asset,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub to: Asset,
}

impl Relation {
    pub fn new(from: Asset, relation_type: impl Into<String>, to: Asset) -> Self {
        Self {
            from,
            relation_type: relation_type.into(),
            to,
        }
    }
}

/// A schema edge: relations named `name` may connect a `from_type` asset to
/// a `to_type` asset. This is the triple handed to
/// [`GraphBinder::relate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationType {
    pub from_type: String,
    pub name: String,
    pub to_type: String,
}

impl RelationType {
    pub fn new(
        from_type: impl Into<String>,
        name: impl Into<String>,
        to_type: impl Into<String>,
    ) -> Self {
        Self {
            from_type: from_type.into(),
            name: name.into(),
            to_type: to_type.into(),
        }
    }
}

/// An in-memory graph snapshot, closed under the invariant that every
/// relation's endpoints appear in the asset set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    assets: HashSet<Asset>,
    relations: HashSet<Relation>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an asset. Returns true when it was not already present.
    pub fn add_asset(&mut self, asset: Asset) -> bool {
        self.assets.insert(asset)
    }

    /// Inserts a relation, auto-inserting both endpoints to preserve
    /// endpoint closure.
    pub fn add_relation(&mut self, relation: Relation) -> bool {
        self.assets.insert(relation.from.clone());
        self.assets.insert(relation.to.clone());
        self.relations.insert(relation)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn contains_asset(&self, asset: &Asset) -> bool {
        self.assets.contains(asset)
    }

    pub fn contains_relation(&self, relation: &Relation) -> bool {
        self.relations.contains(relation)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.relations.is_empty()
    }

    /// Extracts the schema observed in this snapshot: every asset type and
    /// every distinct `(from_type, relation_type, to_type)` triple.
    pub fn extract_schema(&self) -> SchemaGraph {
        let mut schema = SchemaGraph::default();
        for asset in &self.assets {
            schema.add_asset_type(asset.asset_type.clone());
        }
        for relation in &self.relations {
            schema.add_relation_type(RelationType::new(
                relation.from.asset_type.clone(),
                relation.relation_type.clone(),
                relation.to.asset_type.clone(),
            ));
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_relation_inserts_endpoints() {
        let mut g = Graph::new();
        let a = Asset::new("Server", "a");
        let b = Asset::new("Server", "b");
        g.add_relation(Relation::new(a.clone(), "Connects", b.clone()));

        assert_eq!(g.asset_count(), 2);
        assert_eq!(g.relation_count(), 1);
        assert!(g.contains_asset(&a));
        assert!(g.contains_asset(&b));
    }

    #[test]
    fn test_add_asset_is_idempotent() {
        let mut g = Graph::new();
        assert!(g.add_asset(Asset::new("User", "alice")));
        assert!(!g.add_asset(Asset::new("User", "alice")));
        assert_eq!(g.asset_count(), 1);
    }

    #[test]
    fn test_extract_schema_collects_triples() {
        let mut g = Graph::new();
        g.add_relation(Relation::new(
            Asset::new("Server", "a"),
            "Connects",
            Asset::new("Server", "b"),
        ));
        g.add_asset(Asset::new("User", "alice"));

        let schema = g.extract_schema();
        assert!(schema.contains_asset_type("Server"));
        assert!(schema.contains_asset_type("User"));
        assert!(schema.contains(&RelationType::new("Server", "Connects", "Server")));
        assert!(!schema.contains(&RelationType::new("Server", "Connects", "User")));
    }

    #[test]
    fn test_asset_identity_is_type_and_value() {
        let mut g = Graph::new();
        g.add_asset(Asset::new("Server", "x"));
        g.add_asset(Asset::new("User", "x"));
        assert_eq!(g.asset_count(), 2);
    }
}
