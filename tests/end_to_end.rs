//! End-to-end scenarios spanning `GraphStore` -> `SpectralEngine` ->
//! `ClusterService` / `PropagationEngine` / `DiscoveryEngine`.

use std::sync::Arc;

use graph_analytics_core::{
    AccountId, AccountView, AnchorSet, CancelGuard, CancelToken, ClusterKey, ClusterQuery, ClusterService, Deadline,
    Direction, DiscoveryEngine, DiscoveryRequest, Edge, ErrorKind, GraphStore, InMemoryGraphLoader, InMemoryStore,
    Polarity, Provenance, SpectralConfig, SpectralEngine, TagAssignment, TagAssignmentKey,
};

fn account(id: &str, followers: u64) -> AccountView {
    AccountView {
        id: AccountId::resolved(id),
        username: id.to_string(),
        display_name: id.to_string(),
        follower_count: followers,
        following_count: 0,
        tweet_count: 0,
        like_count: 0,
        bio: None,
        provenance: Provenance::Archive,
        fetched_at: 0,
    }
}

fn edge(a: &str, b: &str) -> Edge {
    Edge {
        source: AccountId::resolved(a),
        target: AccountId::resolved(b),
        direction: Direction::Outbound,
        provenance: Provenance::Archive,
        weight: None,
        fetched_at: 0,
    }
}

fn mutual(a: &str, b: &str) -> Vec<Edge> {
    vec![edge(a, b), edge(b, a)]
}

fn tag(ego: &str, account_id: &str, tag_key: &str, polarity: Polarity) -> TagAssignment {
    TagAssignment::new(
        "ws".to_string(),
        AccountId::resolved(ego),
        AccountId::resolved(account_id),
        tag_key.to_string(),
        polarity,
        1.0,
        "curator".to_string(),
        0,
    )
}

/// Two 5-cliques, three isolated nodes, and a 42-node chain connecting
/// them, 50 nodes total.
fn two_clique_fixture() -> (Vec<AccountView>, Vec<Edge>) {
    let mut accounts = Vec::new();
    let mut edges = Vec::new();

    for i in 0..5 {
        accounts.push(account(&format!("cliqueA-{i}"), 10));
    }
    for i in 0..5 {
        for j in (i + 1)..5 {
            edges.extend(mutual(&format!("cliqueA-{i}"), &format!("cliqueA-{j}")));
        }
    }

    for i in 0..5 {
        accounts.push(account(&format!("cliqueB-{i}"), 10));
    }
    for i in 0..5 {
        for j in (i + 1)..5 {
            edges.extend(mutual(&format!("cliqueB-{i}"), &format!("cliqueB-{j}")));
        }
    }

    for i in 0..3 {
        accounts.push(account(&format!("isolate-{i}"), 0));
    }

    for i in 0..42 {
        accounts.push(account(&format!("chain-{i}"), 1));
    }
    for i in 0..41 {
        edges.extend(mutual(&format!("chain-{i}"), &format!("chain-{}", i + 1)));
    }
    edges.extend(mutual("cliqueA-0", "chain-0"));
    edges.extend(mutual("cliqueB-0", "chain-41"));

    (accounts, edges)
}

#[tokio::test]
async fn scenario_1_two_clique_granularity_four() {
    let (accounts, edges) = two_clique_fixture();
    let loader = InMemoryGraphLoader::new(accounts, edges);
    let handle = GraphStore.load(&loader).await.unwrap();
    assert_eq!(handle.num_nodes(), 50);

    let config = SpectralConfig { n_dims: 5, ..Default::default() };
    let snapshot = SpectralEngine
        .build(&handle, &config, None, &CancelGuard::default())
        .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let service = ClusterService::new(store, "ws");
    let query = ClusterQuery { granularity: 4, ..Default::default() };
    let view = service.view(&handle, &snapshot, &query).await.unwrap();

    let dense: Vec<_> = view.clusters.iter().filter(|c| c.size == 5 && !c.is_individual).collect();
    assert_eq!(dense.len(), 2, "expected exactly two dense 5-node clusters");
    assert!(dense.iter().all(|c| !c.contains_ego));

    let individuals = view.clusters.iter().filter(|c| c.is_individual).count();
    assert!(individuals >= 3, "the three isolates must be demoted to individuals");
    assert!(view.meta.budget_remaining >= 20);
}

#[tokio::test]
async fn scenario_2_label_set_and_delete_round_trip() {
    let (accounts, edges) = two_clique_fixture();
    let loader = InMemoryGraphLoader::new(accounts, edges);
    let handle = GraphStore.load(&loader).await.unwrap();
    let config = SpectralConfig { n_dims: 5, ..Default::default() };
    let snapshot = SpectralEngine
        .build(&handle, &config, None, &CancelGuard::default())
        .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let service = ClusterService::new(store, "ws");
    let query = ClusterQuery { granularity: 4, ..Default::default() };

    let view = service.view(&handle, &snapshot, &query).await.unwrap();
    let clique_a = view
        .clusters
        .iter()
        .find(|c| c.size == 5 && c.members.iter().any(|m| m.as_str() == "cliqueA-0"))
        .expect("clique A cluster present")
        .clone();
    let key = ClusterKey::new(snapshot.manifest.source_graph_hash, 4, query.weight_bucket, clique_a.id);

    service.set_label(&key, "Group A".to_string()).await.unwrap();
    let view = service.view(&handle, &snapshot, &query).await.unwrap();
    let updated = view.clusters.iter().find(|c| c.id == clique_a.id).unwrap();
    assert_eq!(updated.label, "Group A");
    assert_eq!(updated.label_source, graph_analytics_core::LabelSource::User);

    service.delete_label(&key).await.unwrap();
    let view = service.view(&handle, &snapshot, &query).await.unwrap();
    let reverted = view.clusters.iter().find(|c| c.id == clique_a.id).unwrap();
    assert_eq!(reverted.label_source, graph_analytics_core::LabelSource::Auto);
    assert!(reverted.label.starts_with(&format!("Cluster {}: @", clique_a.id)));
}

#[tokio::test]
async fn scenario_3_anchor_propagation_with_midpoint_abstain() {
    let (accounts, edges) = two_clique_fixture();
    let loader = InMemoryGraphLoader::new(accounts, edges);
    let handle = GraphStore.load(&loader).await.unwrap();

    let ego = "curator";
    let assignments = vec![
        tag(ego, "cliqueA-0", "A", Polarity::In),
        tag(ego, "cliqueA-1", "A", Polarity::In),
        tag(ego, "cliqueB-0", "B", Polarity::In),
        tag(ego, "cliqueB-1", "B", Polarity::In),
    ];
    let anchors = AnchorSet::from_tag_assignments(assignments);
    let config = graph_analytics_core::PropagationConfig { temperature: 2.0, ..Default::default() };
    let result = graph_analytics_core::PropagationEngine
        .propagate(&handle, &anchors, &config)
        .unwrap();

    let a_idx = result.matrix.community_index("A").unwrap();
    let b_idx = result.matrix.community_index("B").unwrap();

    for id in ["cliqueA-0", "cliqueA-1"] {
        let row = result.matrix.get(&AccountId::resolved(id)).unwrap();
        assert!(row.weights[a_idx] >= 0.9, "{id} should be near-certain on A");
    }
    for id in ["cliqueB-0", "cliqueB-1"] {
        let row = result.matrix.get(&AccountId::resolved(id)).unwrap();
        assert!(row.weights[b_idx] >= 0.9, "{id} should be near-certain on B");
    }

    let midpoint = result.matrix.get(&AccountId::resolved("chain-20")).unwrap();
    assert!(midpoint.abstain, "chain midpoint should abstain, far from either anchor cluster");
}

#[tokio::test]
async fn scenario_4_discovery_composite_reconstructs_from_signals() {
    let (accounts, edges) = two_clique_fixture();
    let loader = InMemoryGraphLoader::new(accounts, edges);
    let handle = GraphStore.load(&loader).await.unwrap();

    let engine = DiscoveryEngine::default();
    let request = DiscoveryRequest { seeds: vec![AccountId::resolved("cliqueA-0")], ..Default::default() };
    let result = engine
        .discover(&handle, None, &request, "tester", &CancelGuard::default())
        .unwrap();

    assert!(!result.items.is_empty());
    let top = &result.items[0];
    assert_ne!(top.account_id, AccountId::resolved("cliqueA-0"), "seed must never be recommended");

    let weights = request.weights.normalized();
    let expected = top.signals.neighbor_overlap.normalized * weights.neighbor_overlap
        + top.signals.pagerank.normalized * weights.pagerank
        + top.signals.community.normalized * weights.community
        + top.signals.path_distance.normalized * weights.path_distance;
    assert!((top.composite - expected).abs() < 1e-4);

    for rec in &result.items {
        assert_ne!(rec.account_id, AccountId::resolved("cliqueA-0"));
    }
}

#[tokio::test]
async fn scenario_5_stale_snapshot_is_rejected() {
    let (accounts, edges) = two_clique_fixture();
    let loader = InMemoryGraphLoader::new(accounts.clone(), edges.clone());
    let handle = GraphStore.load(&loader).await.unwrap();
    let config = SpectralConfig { n_dims: 5, ..Default::default() };
    let snapshot = SpectralEngine
        .build(&handle, &config, None, &CancelGuard::default())
        .unwrap();

    let mut accounts_v2 = accounts;
    accounts_v2.push(account("extra-node", 0));
    let loader_v2 = InMemoryGraphLoader::new(accounts_v2, edges);
    let handle_v2 = GraphStore.load(&loader_v2).await.unwrap();
    assert_ne!(handle.hash(), handle_v2.hash());

    let store = Arc::new(InMemoryStore::new());
    let service = ClusterService::new(store, "ws");
    let query = ClusterQuery::default();
    let err = service.view(&handle_v2, &snapshot, &query).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Stale);
    assert!(err.message.contains(&handle.hash().to_string()));
    assert!(err.message.contains(&handle_v2.hash().to_string()));
}

#[tokio::test]
async fn scenario_6_cancellation_leaves_no_partial_artifact() {
    let dir = std::env::temp_dir().join(format!("graph-analytics-core-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("snapshot.json");

    let mut accounts = Vec::with_capacity(500);
    let mut edges = Vec::new();
    for i in 0..500 {
        accounts.push(account(&format!("n{i}"), (i % 100) as u64));
    }
    for i in 0..499 {
        edges.extend(mutual(&format!("n{i}"), &format!("n{}", i + 1)));
    }
    let loader = InMemoryGraphLoader::new(accounts, edges);
    let handle = GraphStore.load(&loader).await.unwrap();

    let cancel = CancelGuard::new(CancelToken::none(), Deadline::expired());
    let result = SpectralEngine.build(&handle, &SpectralConfig::default(), None, &cancel);
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(!out_path.exists(), "a cancelled build must never write a partial snapshot");

    std::fs::remove_dir_all(&dir).ok();
}
