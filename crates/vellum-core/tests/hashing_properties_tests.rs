//! Properties of the dependency digest algorithm over synthetic graphs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use vellum_core::errors::ExError;
use vellum_core::hashing::{
    compute_digests, digest_summary, hash_for_record, DigestMemo, LiveDependency, RecordGraph,
};
use vellum_core::model::{RecordId, VersionId};

/// Layered graph: records in layer n depend only on records in layer n+1.
#[derive(Clone, Debug, Default)]
struct LayeredGraph {
    versions: HashMap<RecordId, Option<VersionId>>,
    deps: HashMap<RecordId, Vec<RecordId>>,
    stored: HashMap<RecordId, String>,
}

impl LayeredGraph {
    fn version_of(&self, record: RecordId) -> Option<VersionId> {
        self.versions[&record]
    }
}

impl RecordGraph for LayeredGraph {
    fn new_version(&self, record: RecordId) -> Result<Option<VersionId>, ExError> {
        Ok(self.version_of(record))
    }

    fn live_dependencies(&self, record: RecordId) -> Result<Vec<LiveDependency>, ExError> {
        Ok(self.deps[&record]
            .iter()
            .filter_map(|&dep| {
                self.version_of(dep).map(|version_id| LiveDependency {
                    entity_id: dep,
                    version_id,
                    record_id: Some(dep),
                })
            })
            .collect())
    }

    fn stored_digest(&self, record: RecordId) -> Result<String, ExError> {
        Ok(self.stored.get(&record).cloned().unwrap_or_default())
    }
}

/// Two layers: parents 0..p depend on a subset of children p..p+c.
fn layered_graph() -> impl Strategy<Value = LayeredGraph> {
    (1usize..5, 1usize..6).prop_flat_map(|(parents, children)| {
        let edges = proptest::collection::vec(
            proptest::collection::vec(any::<bool>(), children),
            parents,
        );
        let live = proptest::collection::vec(any::<bool>(), children);
        (Just(parents), Just(children), edges, live)
    })
    .prop_map(|(parents, children, edges, live)| {
        let mut graph = LayeredGraph::default();
        for c in 0..children {
            let id = (parents + c) as RecordId;
            let version = if live[c] { Some(1000 + id) } else { None };
            graph.versions.insert(id, version);
            graph.deps.insert(id, Vec::new());
        }
        for (p, row) in edges.iter().enumerate() {
            let id = p as RecordId;
            graph.versions.insert(id, Some(100 + id));
            let deps = row
                .iter()
                .enumerate()
                .filter(|(_, &edge)| edge)
                .map(|(c, _)| (parents + c) as RecordId)
                .collect();
            graph.deps.insert(id, deps);
        }
        graph
    })
}

fn all_records(graph: &LayeredGraph) -> Vec<RecordId> {
    let mut records: Vec<_> = graph.versions.keys().copied().collect();
    records.sort_unstable();
    records
}

proptest! {
    #[test]
    fn digest_ignores_dependency_order(graph in layered_graph()) {
        let records = all_records(&graph);
        let forward = compute_digests(&graph, &records).unwrap();

        let mut reversed = graph.clone();
        for deps in reversed.deps.values_mut() {
            deps.reverse();
        }
        let backward = compute_digests(&reversed, &records).unwrap();

        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn all_dependencies_deleted_gives_empty_digest(graph in layered_graph()) {
        let mut graph = graph;
        let parents: Vec<RecordId> = graph
            .deps
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(&id, _)| id)
            .collect();
        let children: HashSet<RecordId> = graph.deps.values().flatten().copied().collect();
        for child in &children {
            graph.versions.insert(*child, None);
        }

        let records = all_records(&graph);
        let digests: HashMap<_, _> = compute_digests(&graph, &records).unwrap().into_iter().collect();
        for parent in parents {
            prop_assert_eq!(digests[&parent].as_str(), "");
        }
    }

    #[test]
    fn trusted_records_are_never_recomputed(graph in layered_graph(), marker in "[0-9a-f]{8}") {
        let mut graph = graph;
        let records = all_records(&graph);
        for record in &records {
            graph.stored.insert(*record, marker.clone());
        }

        // Only record 0 (a parent) is untrusted; every dependency keeps its stored value.
        let untrusted: HashSet<RecordId> = [0].into_iter().collect();
        let mut memo = DigestMemo::new();
        let digest = hash_for_record(&graph, 0, &mut memo, &untrusted).unwrap();

        let mut live: Vec<VersionId> = graph.deps[&0]
            .iter()
            .filter_map(|&dep| graph.version_of(dep))
            .collect();
        live.sort_unstable();
        let expected = if live.is_empty() {
            String::new()
        } else {
            digest_summary(
                &live
                    .iter()
                    .map(|v| format!("{}:{}", v, marker))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        };
        prop_assert_eq!(digest, expected);
    }
}
