//! Integration test: registry initialize / cleanup lifecycle.

use std::sync::Arc;

use reef_engine::EngineError;
use reef_integration_tests::{CountingLoader, REGIONS, TestCluster, book_key, catalogue};
use reef_router::RouteError;
use reef_store::NodeHandle;
use reef_types::AffinityPolicy;

#[tokio::test]
async fn test_cleanup_closes_every_node() {
    let c = TestCluster::three_regions().await;
    let rt = c.read_through(Arc::new(catalogue(5)));
    rt.fetch(&book_key(0), "Europe").await.unwrap();

    let errors = c.registry().cleanup().await;
    assert!(errors.is_empty());
    assert!(!c.registry().is_initialized());

    for region in REGIONS {
        assert!(c.node(region).is_closed(), "{region} left open");
    }

    let err = rt.fetch(&book_key(0), "Europe").await.unwrap_err();
    assert!(matches!(err, EngineError::Route(RouteError::NoNodesAvailable)));
}

#[tokio::test]
async fn test_cleanup_twice_is_noop() {
    let c = TestCluster::three_regions().await;

    assert!(c.registry().cleanup().await.is_empty());
    assert!(c.registry().cleanup().await.is_empty());
}

#[tokio::test]
async fn test_cleanup_without_initialize_is_noop() {
    let c = TestCluster::uninitialized(&REGIONS, AffinityPolicy::RegionFirst);
    assert!(c.registry().cleanup().await.is_empty());
    assert!(c.connector().node("Europe").is_none());
}

/// Re-initializing swaps in fresh handles and closes the old ones, so the
/// cache starts cold.
#[tokio::test]
async fn test_reinitialize_replaces_topology() {
    let c = TestCluster::three_regions().await;
    let loader = Arc::new(CountingLoader::new(catalogue(5)));
    let rt = c.read_through(loader.clone());

    rt.fetch(&book_key(1), "Asia").await.unwrap();
    let old_asia = c.node("Asia");

    c.initialize().await.unwrap();

    assert!(old_asia.is_closed());
    let new_asia = c.node("Asia");
    assert!(!Arc::ptr_eq(&old_asia, &new_asia));
    assert!(new_asia.is_empty());

    let outcome = rt.fetch_detailed(&book_key(1), "Asia").await.unwrap();
    assert!(!outcome.hit);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn test_failed_initialize_leaves_registry_empty() {
    let c = TestCluster::uninitialized(&REGIONS, AffinityPolicy::RegionFirst);
    c.refuse_connections("Europe");

    let err = c.initialize().await.unwrap_err();
    assert!(matches!(err, RouteError::Store(ref e) if e.is_unreachable()));
    assert!(!c.registry().is_initialized());

    // Asia sorts before Europe, so it was opened and must have been closed.
    assert!(c.node("Asia").is_closed());
    assert!(c.connector().node("NorthAmerica").is_none());

    c.accept_connections("Europe");
    c.initialize().await.unwrap();
    assert_eq!(c.registry().node_ids().len(), 3);
}

#[tokio::test]
async fn test_failed_reinitialize_keeps_serving() {
    let c = TestCluster::three_regions().await;
    let rt = c.read_through(Arc::new(catalogue(5)));
    rt.fetch(&book_key(2), "NorthAmerica").await.unwrap();

    c.refuse_connections("NorthAmerica");
    assert!(c.initialize().await.is_err());

    assert!(c.registry().is_initialized());
    let handle = c.registry().handle_for("NorthAmerica").unwrap();
    assert!(handle.get(&book_key(2)).await.unwrap().is_some());

    let outcome = rt.fetch_detailed(&book_key(2), "NorthAmerica").await.unwrap();
    assert!(outcome.hit);
}

#[tokio::test]
async fn test_initialize_with_no_nodes_fails() {
    let c = TestCluster::uninitialized(&[], AffinityPolicy::RegionFirst);

    let err = c.initialize().await.unwrap_err();
    assert!(matches!(err, RouteError::NoNodesAvailable));
    assert!(!c.registry().is_initialized());
}

/// Racing initialize and cleanup calls never leave a half-built registry
/// or a leaked open handle.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lifecycle_calls() {
    let c = Arc::new(TestCluster::three_regions().await);

    let mut handles = Vec::new();
    for i in 0..32 {
        let c = Arc::clone(&c);
        handles.push(tokio::spawn(async move {
            if i % 3 == 0 {
                c.registry().cleanup().await;
            } else {
                c.initialize().await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    if let Some(topology) = c.registry().snapshot() {
        assert_eq!(topology.len(), 3);
        assert_eq!(topology.ring().slot_count(), 300);
    }

    c.registry().cleanup().await;
    for region in REGIONS {
        assert!(c.node(region).is_closed(), "{region} leaked an open handle");
    }
}
