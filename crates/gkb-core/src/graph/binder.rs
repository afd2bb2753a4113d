//! Ergonomic surface for sources that build graphs by asserting key/type
//! pairs without precomputing endpoints.

use super::{Asset, Graph, Relation, RelationType};

/// Wraps a [`Graph`] and offers `bind`/`relate`. The binder itself is
/// single-threaded; the owning transaction provides mutual exclusion.
#[derive(Debug)]
pub struct GraphBinder<'g> {
    graph: &'g mut Graph,
}

impl<'g> GraphBinder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    /// Binds a key to an asset type, inserting the asset. Returns the bound
    /// asset, which serves as its identity.
    pub fn bind(&mut self, value: impl Into<String>, asset_type: impl Into<String>) -> Asset {
        let asset = Asset::new(asset_type, value);
        self.graph.add_asset(asset.clone());
        asset
    }

    /// Relates two keys through a schema triple, binding both endpoints to
    /// the triple's endpoint types.
    pub fn relate(
        &mut self,
        from_value: impl Into<String>,
        relation_type: &RelationType,
        to_value: impl Into<String>,
    ) {
        let from = self.bind(from_value, relation_type.from_type.clone());
        let to = self.bind(to_value, relation_type.to_type.clone());
        self.graph
            .add_relation(Relation::new(from, relation_type.name.clone(), to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_inserts_asset() {
        let mut g = Graph::new();
        let mut binder = GraphBinder::new(&mut g);
        let asset = binder.bind("a", "Server");

        assert_eq!(asset, Asset::new("Server", "a"));
        assert!(g.contains_asset(&Asset::new("Server", "a")));
    }

    #[test]
    fn test_relate_binds_both_endpoints() {
        let mut g = Graph::new();
        let mut binder = GraphBinder::new(&mut g);
        let connects = RelationType::new("Server", "Connects", "Server");
        binder.relate("a", &connects, "b");

        assert_eq!(g.asset_count(), 2);
        assert!(g.contains_relation(&Relation::new(
            Asset::new("Server", "a"),
            "Connects",
            Asset::new("Server", "b"),
        )));
    }

    #[test]
    fn test_relate_twice_is_idempotent() {
        let mut g = Graph::new();
        let mut binder = GraphBinder::new(&mut g);
        let owns = RelationType::new("User", "Owns", "Server");
        binder.relate("alice", &owns, "a");
        binder.relate("alice", &owns, "a");

        assert_eq!(g.asset_count(), 2);
        assert_eq!(g.relation_count(), 1);
    }
}
