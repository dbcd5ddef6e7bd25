//! Tests for concurrent use of one gate from many request handlers.

use std::sync::Arc;

use tollgate::{CacheConfig, Decision, Fingerprint, PlanTier, Tollgate, UsageGate};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_never_exceed_quota() {
    let gate: Arc<UsageGate> = Arc::new(Tollgate::builder().build().unwrap());

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.check_and_consume("u1", PlanTier::Pro).unwrap() })
        })
        .collect();

    let mut allowed = 0;
    let mut remaining_seen = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Decision::Allowed { remaining } => {
                allowed += 1;
                remaining_seen.push(remaining);
            }
            Decision::Denied { quota, used, .. } => {
                assert_eq!((quota, used), (100, 100));
            }
        }
    }

    assert_eq!(allowed, 100);
    // Every allowed request saw a distinct count: no lost updates.
    remaining_seen.sort_unstable();
    assert_eq!(remaining_seen, (0..100).collect::<Vec<u32>>());
    assert_eq!(gate.usage("u1", PlanTier::Pro).unwrap().used, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn identities_are_metered_independently_under_load() {
    let gate: Arc<UsageGate> = Arc::new(Tollgate::builder().shards(4).build().unwrap());

    let handles: Vec<_> = (0..20)
        .flat_map(|user| (0..15).map(move |_| user))
        .map(|user| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.check_and_consume(&format!("user-{user}"), PlanTier::Free)
                    .unwrap()
            })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().is_allowed() {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 20 * 10);
    for user in 0..20 {
        let usage = gate.usage(&format!("user-{user}"), PlanTier::Free).unwrap();
        assert_eq!(usage.used, 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_cache_writes_respect_capacity() {
    let gate: Arc<UsageGate> = Arc::new(
        Tollgate::builder()
            .cache(CacheConfig::new().max_entries(16))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..256u64)
        .map(|i| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let fp = Fingerprint::from_raw(i % 32);
                gate.put_cached(&format!("u{}", i % 4), fp, i.to_string());
                gate.get_cached(&format!("u{}", i % 4), fp);
                assert!(gate.cache_stats().size <= 16);
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(gate.cache_stats().size, 16);
}
