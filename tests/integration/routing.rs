//! Integration test: routing decisions across a three-region cluster.

use std::collections::BTreeMap;

use reef_integration_tests::{REGIONS, TestCluster, random_keys};
use reef_placement::HashRing;
use reef_router::RouteError;
use reef_types::{AffinityPolicy, NodeId, RouteReason};

/// A caller in a registered region is always served by that region.
#[tokio::test]
async fn test_known_region_always_wins() {
    let c = TestCluster::three_regions().await;

    for key in random_keys(2000, 1) {
        for region in REGIONS {
            let s = c.router().select(&key, region).unwrap();
            assert_eq!(s.node_id.as_str(), region);
            assert_eq!(s.handle.id().as_str(), region);

            let expected = if s.ring_choice.as_str() == region {
                RouteReason::RingAgrees
            } else {
                RouteReason::RegionOverride
            };
            assert_eq!(s.reason, expected, "{key} from {region}");
        }
    }
}

/// Unknown regions get exactly what a standalone ring over the same nodes
/// would pick.
#[tokio::test]
async fn test_unknown_region_matches_standalone_ring() {
    let c = TestCluster::three_regions().await;

    let mut ring = HashRing::new(100);
    for region in REGIONS {
        ring.add_node(NodeId::from(region));
    }

    for key in random_keys(2000, 2) {
        let s = c.router().select(&key, "Antarctica").unwrap();
        assert_eq!(Some(&s.node_id), ring.get_node(&key));
        assert_eq!(s.reason, RouteReason::RingFallback);
    }
}

/// Every node takes some share of unknown-region traffic.
#[tokio::test]
async fn test_ring_fallback_reaches_every_node() {
    let c = TestCluster::three_regions().await;
    let mut counts: BTreeMap<NodeId, usize> = BTreeMap::new();

    for key in random_keys(3000, 3) {
        let s = c.router().select(&key, "Oceania").unwrap();
        *counts.entry(s.node_id).or_default() += 1;
    }

    assert_eq!(counts.len(), 3, "some node never selected: {counts:?}");
    assert_eq!(counts.values().sum::<usize>(), 3000);
}

#[tokio::test]
async fn test_ring_only_policy_follows_ring_for_every_caller() {
    let c = TestCluster::with_policy(&REGIONS, AffinityPolicy::RingOnly).await;

    for key in random_keys(500, 4) {
        let ring_choice = c.registry().ring_node_for(&key).unwrap();
        for region in ["Europe", "Asia", "NorthAmerica", "Africa"] {
            let s = c.router().select(&key, region).unwrap();
            assert_eq!(s.node_id, ring_choice);
        }
    }
}

#[tokio::test]
async fn test_routing_is_stable_across_clusters() {
    let a = TestCluster::new(&["Europe", "Asia", "NorthAmerica"]).await;
    let b = TestCluster::new(&["NorthAmerica", "Europe", "Asia"]).await;

    for key in random_keys(1000, 5) {
        let sa = a.router().select(&key, "Africa").unwrap();
        let sb = b.router().select(&key, "Africa").unwrap();
        assert_eq!(sa.node_id, sb.node_id);
    }
}

#[tokio::test]
async fn test_region_names_are_case_sensitive() {
    let c = TestCluster::three_regions().await;

    for key in random_keys(200, 6) {
        let s = c.router().select(&key, "EUROPE").unwrap();
        assert_eq!(s.reason, RouteReason::RingFallback);
        assert_eq!(s.node_id, s.ring_choice);
    }
}

#[tokio::test]
async fn test_routing_records_access() {
    let c = TestCluster::three_regions().await;
    let keys = random_keys(50, 7);

    for key in &keys {
        c.router().select(key, "Europe").unwrap();
        c.router().select(key, "Asia").unwrap();
    }

    let tracker = c.router().tracker();
    for key in &keys {
        let record = tracker.record(key).unwrap();
        assert!(record.touches >= 2);
    }
    assert!(tracker.len() <= keys.len());
}

#[tokio::test]
async fn test_single_node_cluster_serves_everyone() {
    let c = TestCluster::new(&["Europe"]).await;

    for key in random_keys(200, 8) {
        let s = c.router().select(&key, "Asia").unwrap();
        assert_eq!(s.node_id.as_str(), "Europe");
    }
}

#[tokio::test]
async fn test_routing_before_initialize_fails() {
    let c = TestCluster::uninitialized(&REGIONS, AffinityPolicy::RegionFirst);

    let err = c.router().select("book::1984", "Europe").unwrap_err();
    assert!(matches!(err, RouteError::NoNodesAvailable));

    c.initialize().await.unwrap();
    assert!(c.router().select("book::1984", "Europe").is_ok());
}
