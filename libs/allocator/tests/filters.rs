//! Decline filters, suppression, and revival.


use harness::{bundle_total, start, vector, INTERVAL};

// A decline filter of two intervals blocks exactly two batch rounds.
#[tokio::test(start_paused = true)]
async fn filter_blocks_across_batches() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);

    cluster.decline(fw, &bundle, Some(2 * INTERVAL)).await;

    // Two ticks inside the refuse window: silence.
    cluster.tick().await;
    cluster.expect_no_offer().await;
    cluster.tick().await;
    cluster.expect_no_offer().await;

    // Third tick: the filter has expired and a round has run past it.
    cluster.tick().await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));
}

// A refuse timeout smaller than the interval still holds through the
// next round: expiry additionally requires one completed round after
// the deadline, otherwise the framework would see the same offer again
// immediately.
#[tokio::test(start_paused = true)]
async fn small_timeout_filter_survives_one_round() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);

    // Refuse for half an interval.
    cluster.decline(fw, &bundle, Some(INTERVAL / 2)).await;

    // The timeout has elapsed by the next tick, but no round has run
    // since it elapsed: still blocked.
    cluster.tick().await;
    cluster.expect_no_offer().await;

    // One round later the filter is gone.
    cluster.tick().await;
    let (to, _) = cluster.expect_offer().await;
    assert_eq!(to, fw);
}

// Declining without a filter frees the resources for immediate
// reallocation.
#[tokio::test(start_paused = true)]
async fn decline_without_filter_reallocates_immediately() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;
    cluster.decline(fw, &bundle, None).await;

    // No clock movement needed: the recovery itself runs a round.
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));
}

// Revival drops every filter the framework holds and triggers a round.
#[tokio::test(start_paused = true)]
async fn revive_drops_filters() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;
    cluster.decline(fw, &bundle, Some(100 * INTERVAL)).await;

    cluster.tick().await;
    cluster.expect_no_offer().await;

    cluster.allocator.revive_offers(fw).await.unwrap();
    let (to, _) = cluster.expect_offer().await;
    assert_eq!(to, fw);
}

// Reviving twice is the same as reviving once.
#[tokio::test(start_paused = true)]
async fn revive_is_idempotent() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;

    // Redundant revival while holding an offer changes nothing.
    cluster.allocator.revive_offers(fw).await.unwrap();
    cluster.allocator.revive_offers(fw).await.unwrap();
    cluster.expect_no_offer().await;

    cluster.decline(fw, &bundle, Some(100 * INTERVAL)).await;
    cluster.allocator.revive_offers(fw).await.unwrap();
    cluster.allocator.revive_offers(fw).await.unwrap();

    // Exactly one re-offer despite the double revival.
    let offers = cluster.drain_offers().await;
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].0, fw);
}

// Suppressed frameworks drop out of the ordering until they revive.
#[tokio::test(start_paused = true)]
async fn suppress_and_revive() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;
    cluster.decline(fw, &bundle, None).await;
    let (_, bundle) = cluster.expect_offer().await;

    // Suppress first, then hand everything back: the recovery still
    // runs a round, but the framework is invisible to it.
    cluster.allocator.suppress_offers(fw).await.unwrap();
    cluster.decline(fw, &bundle, None).await;
    cluster.expect_no_offer().await;

    cluster.tick().await;
    cluster.expect_no_offer().await;

    cluster.allocator.revive_offers(fw).await.unwrap();
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));
}

// Deactivation hides the framework, clears its filters and suppression;
// reactivation brings offers back.
#[tokio::test(start_paused = true)]
async fn deactivate_and_reactivate() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;
    cluster.decline(fw, &bundle, None).await;
    let (_, bundle) = cluster.expect_offer().await;
    cluster.decline(fw, &bundle, None).await;
    let (_, bundle) = cluster.expect_offer().await;

    cluster.allocator.suppress_offers(fw).await.unwrap();
    cluster.allocator.deactivate_framework(fw).await.unwrap();
    cluster.decline(fw, &bundle, None).await;

    cluster.tick().await;
    cluster.expect_no_offer().await;

    // Reconnecting (activate) must start fresh: no leftover suppression.
    cluster.allocator.activate_framework(fw).await.unwrap();
    cluster.tick().await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));
}
