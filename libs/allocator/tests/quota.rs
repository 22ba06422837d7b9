//! Quota guarantees: satisfaction first, headroom protection after.


use std::collections::HashMap;

use acre_allocator::AllocatorConfig;
use harness::{bundle_total, role, start, start_with, vector, INTERVAL};

// A role with unsatisfied quota is served before everyone else, and
// resources it declines are laid away rather than handed to non-quota
// roles.
#[tokio::test(start_paused = true)]
async fn quota_shelters_declined_resources() {
    let mut cluster = start();

    let fw1 = cluster.add_framework("quota-role").await;
    cluster
        .allocator
        .set_quota(role("quota-role"), vector("cpus:2;mem:1024"))
        .await
        .unwrap();
    let fw2 = cluster.add_framework("no-quota-role").await;
    cluster.settle().await;

    // Both agents go to the quota'ed role despite fair share favoring
    // the empty fw2.
    let _a1 = cluster.add_agent("cpus:1;mem:512").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert_eq!(bundle_total(&bundle), vector("cpus:1;mem:512"));

    let a2 = cluster.add_agent("cpus:1;mem:512").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert!(bundle.contains_key(&a2));

    // fw1 declines a2 for two intervals. The freed resources must not
    // leak to fw2: handing them out could leave fw1 short when the
    // filter expires.
    cluster
        .decline(fw1, &bundle, Some(2 * INTERVAL))
        .await;

    cluster.tick().await;
    cluster.expect_no_offer().await;
    cluster.tick().await;
    cluster.expect_no_offer().await;

    // Filter gone: the laid-away resources return to the quota'ed role.
    cluster.tick().await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert!(bundle.contains_key(&a2));
    let _ = fw2;
}

// Quota allocations are coarse-grained like everything else: the whole
// agent goes out even when the guarantee needs only a sliver of it.
#[tokio::test(start_paused = true)]
async fn quota_allocation_is_coarse_grained() {
    let mut cluster = start();

    let fw1 = cluster.add_framework("quota-role").await;
    cluster
        .allocator
        .set_quota(role("quota-role"), vector("cpus:0.5;mem:200"))
        .await
        .unwrap();
    let _fw2 = cluster.add_framework("no-quota-role").await;
    cluster.settle().await;

    cluster.add_agent("cpus:1;mem:512").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert_eq!(bundle_total(&bundle), vector("cpus:1;mem:512"));
}

// A satisfied quota'ed role stops being served in stage A; a still
// unsatisfied one keeps priority even with a larger share.
#[tokio::test(start_paused = true)]
async fn unsatisfied_quota_keeps_priority() {
    let mut cluster = start();

    cluster
        .allocator
        .set_quota(role("quota-1"), vector("cpus:1;mem:200"))
        .await
        .unwrap();
    cluster
        .allocator
        .set_quota(role("quota-2"), vector("cpus:2;mem:2000"))
        .await
        .unwrap();

    let fw1 = cluster.add_framework("quota-1").await;
    let fw2 = cluster.add_framework("quota-2").await;

    // Seed one fully-held agent per role: quota-1 is now satisfied,
    // quota-2 is not.
    cluster
        .add_agent_used(
            "cpus:1;mem:1024",
            HashMap::from([(fw1, vector("cpus:1;mem:1024"))]),
        )
        .await;
    cluster
        .add_agent_used(
            "cpus:1;mem:1024",
            HashMap::from([(fw2, vector("cpus:1;mem:1024"))]),
        )
        .await;

    let a3 = cluster.add_agent("cpus:2;mem:2048").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert!(bundle.contains_key(&a3));
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:2048"));
}

// Resources reserved to a quota'ed role charge its quota even before
// any framework holds them.
#[tokio::test(start_paused = true)]
async fn reservations_charge_quota() {
    let mut cluster = start();

    cluster
        .allocator
        .set_quota(role("quota-role"), vector("cpus:2;mem:256"))
        .await
        .unwrap();
    let fw1 = cluster.add_framework("quota-role").await;
    let fw2 = cluster.add_framework("other-role").await;
    cluster.settle().await;

    // fw1 already uses cpus:2 and the role-reserved memory, which
    // exactly meets the guarantee. The free cpus go to fw2.
    cluster
        .add_agent_used(
            "cpus:8;mem(quota-role):256",
            HashMap::from([(fw1, vector("cpus:2;mem(quota-role):256"))]),
        )
        .await;

    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert_eq!(bundle_total(&bundle), vector("cpus:6"));

    // And with quota satisfied, a fresh agent follows fair share to the
    // emptier-by-DRF framework.
    cluster.add_agent("cpus:4").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert_eq!(bundle_total(&bundle), vector("cpus:4"));
}

// Headroom for a guarantee must come from unreserved resources;
// resources reserved to another role cannot back it.
#[tokio::test(start_paused = true)]
async fn headroom_is_unreserved_only() {
    let mut cluster = start();

    let a1 = cluster.add_agent("cpus:4;mem:512").await;
    let a2 = cluster.add_agent("cpus:4;mem:512").await;

    // Reserve all of a2 for the non-quota role.
    cluster
        .allocator
        .update_available(
            a2,
            vec![acre_resources::Operation::Reserve {
                resources: vector("cpus(no-quota-role):4;mem(no-quota-role):512"),
            }],
        )
        .await
        .unwrap();

    let fw1 = cluster.add_framework("quota-role").await;
    cluster
        .allocator
        .set_quota(role("quota-role"), vector("cpus:4"))
        .await
        .unwrap();

    // fw1 is offered a1 (a2 is reserved away from it).
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert_eq!(bundle.len(), 1);
    assert!(bundle.contains_key(&a1));

    let long = Some(10 * INTERVAL);
    cluster.decline(fw1, &bundle, long).await;
    cluster.tick().await;
    cluster.expect_no_offer().await;

    // fw2 gets its reserved slice on a2...
    let fw2 = cluster.add_framework("no-quota-role").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert!(bundle.contains_key(&a2));
    assert_eq!(
        bundle_total(&bundle),
        vector("cpus(no-quota-role):4;mem(no-quota-role):512")
    );

    cluster.decline(fw2, &bundle, long).await;

    // ...but never a1's unreserved resources: they are the only thing
    // that can satisfy the quota guarantee.
    cluster.tick().await;
    cluster.expect_no_offer().await;
}

// A quota'ed role with no frameworks lays away nothing: the free pool
// goes out unhindered.
#[tokio::test(start_paused = true)]
async fn empty_quota_role_reserves_no_headroom() {
    let mut cluster = start();

    cluster
        .allocator
        .set_quota(role("absent-role"), vector("cpus:2;mem:1024"))
        .await
        .unwrap();
    let fw = cluster.add_framework("live-role").await;
    cluster.settle().await;

    cluster.add_agent("cpus:2;mem:1024").await;
    cluster.add_agent("cpus:1;mem:512").await;

    // Both agents flow to the only live framework.
    let offers = cluster.drain_offers().await;
    assert!(offers.iter().all(|(framework, _)| *framework == fw));
    let granted = acre_resources::ResourceVector::sum(
        offers.iter().flat_map(|(_, bundle)| bundle.values()),
    );
    assert_eq!(granted, vector("cpus:3;mem:1536"));
}

// The headroom rule for absent roles is a config knob; with it on, the
// engine lays away for them like the guarantee says.
#[tokio::test(start_paused = true)]
async fn absent_role_headroom_can_be_enabled() {
    let config = AllocatorConfig {
        headroom_for_empty_roles: true,
        ..AllocatorConfig::default().with_interval(INTERVAL)
    };
    let mut cluster = start_with(config);

    cluster
        .allocator
        .set_quota(role("absent-role"), vector("cpus:2;mem:1024"))
        .await
        .unwrap();
    let fw = cluster.add_framework("live-role").await;
    cluster.settle().await;

    // The first agent is exactly the guarantee: withheld entirely.
    cluster.add_agent("cpus:2;mem:1024").await;
    cluster.expect_no_offer().await;

    // The second agent exceeds the remaining need and flows out.
    let a2 = cluster.add_agent("cpus:1;mem:512").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle.len(), 1);
    assert!(bundle.contains_key(&a2));
}

// Removing quota restores plain fair sharing.
#[tokio::test(start_paused = true)]
async fn remove_quota_restores_fair_share() {
    let mut cluster = start();

    cluster
        .allocator
        .set_quota(role("quota-role"), vector("cpus:2;mem:1024"))
        .await
        .unwrap();
    let fw1 = cluster.add_framework("quota-role").await;
    let fw2 = cluster.add_framework("no-quota-role").await;

    let a1 = cluster
        .add_agent_used(
            "cpus:1;mem:512",
            HashMap::from([(fw1, vector("cpus:1;mem:512"))]),
        )
        .await;
    cluster
        .add_agent_used(
            "cpus:1;mem:512",
            HashMap::from([(fw1, vector("cpus:1;mem:512"))]),
        )
        .await;

    cluster.allocator.remove_quota(role("quota-role")).await.unwrap();
    cluster.settle().await;

    // With the guarantee gone, resources released by fw1 go to the
    // starving fw2 instead of being laid away.
    cluster
        .allocator
        .recover_resources(fw1, a1, vector("cpus:1;mem:512"), None)
        .await
        .unwrap();

    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert!(bundle.contains_key(&a1));
}
