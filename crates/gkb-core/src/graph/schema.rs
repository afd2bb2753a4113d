//! Schema graph: asset types and the relation triples allowed between them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::RelationType;

/// The schema observed or declared by a source: the set of asset types and
/// the set of `(from_type, name, to_type)` triples. Ordered sets keep the
/// serialized blob deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGraph {
    #[serde(default)]
    pub asset_types: BTreeSet<String>,
    #[serde(default)]
    pub relation_types: BTreeSet<(String, String, String)>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_asset_type(&mut self, asset_type: impl Into<String>) {
        self.asset_types.insert(asset_type.into());
    }

    /// Adds a relation triple, inserting both endpoint types as vertices.
    pub fn add_relation_type(&mut self, relation_type: RelationType) {
        self.asset_types.insert(relation_type.from_type.clone());
        self.asset_types.insert(relation_type.to_type.clone());
        self.relation_types.insert((
            relation_type.from_type,
            relation_type.name,
            relation_type.to_type,
        ));
    }

    pub fn contains_asset_type(&self, asset_type: &str) -> bool {
        self.asset_types.contains(asset_type)
    }

    pub fn contains(&self, relation_type: &RelationType) -> bool {
        self.relation_types.contains(&(
            relation_type.from_type.clone(),
            relation_type.name.clone(),
            relation_type.to_type.clone(),
        ))
    }

    /// Merges another schema into this one (set union).
    pub fn merge(&mut self, other: &SchemaGraph) {
        self.asset_types
            .extend(other.asset_types.iter().cloned());
        self.relation_types
            .extend(other.relation_types.iter().cloned());
    }

    /// True when this schema is a subset of `other`.
    pub fn is_subset_of(&self, other: &SchemaGraph) -> bool {
        self.asset_types.is_subset(&other.asset_types)
            && self.relation_types.is_subset(&other.relation_types)
    }

    pub fn is_empty(&self) -> bool {
        self.asset_types.is_empty() && self.relation_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_relation_type_inserts_vertices() {
        let mut schema = SchemaGraph::new();
        schema.add_relation_type(RelationType::new("Server", "Hosts", "Service"));

        assert!(schema.contains_asset_type("Server"));
        assert!(schema.contains_asset_type("Service"));
        assert!(schema.contains(&RelationType::new("Server", "Hosts", "Service")));
    }

    #[test]
    fn test_merge_is_union() {
        let mut a = SchemaGraph::new();
        a.add_relation_type(RelationType::new("Server", "Connects", "Server"));
        let mut b = SchemaGraph::new();
        b.add_relation_type(RelationType::new("User", "Owns", "Server"));

        a.merge(&b);
        assert!(a.contains(&RelationType::new("Server", "Connects", "Server")));
        assert!(a.contains(&RelationType::new("User", "Owns", "Server")));
        assert_eq!(a.asset_types.len(), 2);
    }

    #[test]
    fn test_serialized_form_is_deterministic() {
        let mut a = SchemaGraph::new();
        a.add_relation_type(RelationType::new("B", "r", "C"));
        a.add_relation_type(RelationType::new("A", "r", "B"));

        let mut b = SchemaGraph::new();
        b.add_relation_type(RelationType::new("A", "r", "B"));
        b.add_relation_type(RelationType::new("B", "r", "C"));

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_is_subset_of() {
        let mut small = SchemaGraph::new();
        small.add_relation_type(RelationType::new("A", "r", "B"));
        let mut big = small.clone();
        big.add_relation_type(RelationType::new("B", "s", "C"));

        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
    }
}
