//! Bulk differ: the minimal upsert/removal sets between two snapshots.

use serde::{Deserialize, Serialize};

use super::{Asset, Graph, Relation};

/// The diff between two graph snapshots, as four disjoint lists. Applying a
/// bulk to the graph it was diffed against yields the new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bulk {
    pub asset_upserts: Vec<Asset>,
    pub asset_removals: Vec<Asset>,
    pub relation_upserts: Vec<Relation>,
    pub relation_removals: Vec<Relation>,
}

impl Bulk {
    /// Total number of items across the four lists.
    pub fn len(&self) -> usize {
        self.asset_upserts.len()
            + self.asset_removals.len()
            + self.relation_upserts.len()
            + self.relation_removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes the bulk turning `current` into `new`.
///
/// Emission order within each list is sorted so the result is deterministic
/// for a given pair of snapshots; the application order across lists is the
/// transaction's two-phase contract, not the differ's concern.
pub fn diff(current: &Graph, new: &Graph) -> Bulk {
    let mut bulk = Bulk {
        asset_upserts: new
            .assets()
            .filter(|a| !current.contains_asset(a))
            .cloned()
            .collect(),
        asset_removals: current
            .assets()
            .filter(|a| !new.contains_asset(a))
            .cloned()
            .collect(),
        relation_upserts: new
            .relations()
            .filter(|r| !current.contains_relation(r))
            .cloned()
            .collect(),
        relation_removals: current
            .relations()
            .filter(|r| !new.contains_relation(r))
            .cloned()
            .collect(),
    };
    bulk.asset_upserts.sort();
    bulk.asset_removals.sort();
    bulk.relation_upserts.sort();
    bulk.relation_removals.sort();
    bulk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(assets: &[(&str, &str)], relations: &[(&str, &str, &str)]) -> Graph {
        let mut g = Graph::new();
        for (t, v) in assets {
            g.add_asset(Asset::new(*t, *v));
        }
        for (f, r, t) in relations {
            g.add_relation(Relation::new(
                Asset::new("Server", *f),
                *r,
                Asset::new("Server", *t),
            ));
        }
        g
    }

    #[test]
    fn test_diff_of_identical_graphs_is_empty() {
        let g = graph(&[("Server", "a")], &[]);
        let bulk = diff(&g, &g.clone());
        assert!(bulk.is_empty());
    }

    #[test]
    fn test_diff_detects_additions() {
        let current = graph(&[("Server", "a")], &[]);
        let new = graph(&[("Server", "a")], &[("a", "Connects", "b")]);

        let bulk = diff(&current, &new);
        assert_eq!(bulk.asset_upserts, vec![Asset::new("Server", "b")]);
        assert_eq!(bulk.relation_upserts.len(), 1);
        assert!(bulk.asset_removals.is_empty());
        assert!(bulk.relation_removals.is_empty());
    }

    #[test]
    fn test_diff_detects_removals() {
        let current = graph(&[], &[("a", "Connects", "b")]);
        let new = graph(&[("Server", "a")], &[]);

        let bulk = diff(&current, &new);
        assert_eq!(bulk.asset_removals, vec![Asset::new("Server", "b")]);
        assert_eq!(bulk.relation_removals.len(), 1);
        assert!(bulk.asset_upserts.is_empty());
    }

    #[test]
    fn test_diff_is_deterministic() {
        let current = graph(&[("Server", "a"), ("Server", "b")], &[]);
        let new = graph(
            &[("Server", "c"), ("Server", "d")],
            &[("c", "Connects", "d")],
        );

        assert_eq!(diff(&current, &new), diff(&current, &new));
    }

    #[test]
    fn test_applying_diff_reaches_new_snapshot() {
        let current = graph(&[("User", "alice")], &[("a", "Connects", "b")]);
        let new = graph(&[("User", "bob")], &[("b", "Connects", "c")]);

        let bulk = diff(&current, &new);
        let mut applied = current.clone();
        for r in &bulk.relation_removals {
            applied.relations.remove(r);
        }
        for a in &bulk.asset_upserts {
            applied.add_asset(a.clone());
        }
        for a in &bulk.asset_removals {
            applied.assets.remove(a);
        }
        for r in &bulk.relation_upserts {
            applied.add_relation(r.clone());
        }
        assert_eq!(applied, new);
    }
}
