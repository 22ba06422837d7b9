//! Lifecycle mutations: in-place operations, oversubscription,
//! capabilities, thresholds, whitelists, and error paths.


use std::collections::HashMap;

use acre_allocator::{AllocatorError, Capability, FrameworkInfo};
use acre_id::{AgentId, FrameworkId};
use acre_resources::{Operation, Resource, ResourceError, Scalar};
use harness::{bundle_total, role, start, vector};

// A framework creates a persistent volume on resources it holds; after
// a decline the next offer carries the volume instead of plain disk.
#[tokio::test(start_paused = true)]
async fn update_allocation_creates_volume() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:100;mem:100;disk:100").await;
    let fw = cluster.add_framework("role1").await;

    let (_, bundle) = cluster.expect_offer().await;
    let held = bundle_total(&bundle);
    assert_eq!(held, vector("cpus:100;mem:100;disk:100"));

    let volume = Resource::scalar("disk", Scalar::units(5)).with_volume("id1", "data");
    let create = Operation::Create {
        volumes: [volume.clone()].into_iter().collect(),
    };
    let updated = held.apply(&create).unwrap();

    cluster
        .allocator
        .update_allocation(fw, agent, held, vec![create])
        .await
        .unwrap();

    cluster
        .allocator
        .recover_resources(fw, agent, updated, None)
        .await
        .unwrap();

    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    let offered = bundle_total(&bundle);
    assert!(offered.contains_resource(&volume));
    assert_eq!(offered, vector("cpus:100;mem:100;disk:95") + [volume].into_iter().collect());
}

// DESTROY of something that was never a persistent volume is rejected
// and leaves everything as it was.
#[tokio::test(start_paused = true)]
async fn update_allocation_rejects_bad_destroy() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:1;disk:100").await;
    let fw = cluster.add_framework("role1").await;
    let (_, bundle) = cluster.expect_offer().await;
    let held = bundle_total(&bundle);

    let destroy = Operation::Destroy {
        volumes: vector("disk:5"),
    };
    let result = cluster
        .allocator
        .update_allocation(fw, agent, held.clone(), vec![destroy])
        .await;
    assert!(matches!(
        result,
        Err(AllocatorError::Resource(ResourceError::NotPersistent(_)))
    ));

    // Declining the untouched resources re-offers them unchanged.
    cluster
        .allocator
        .recover_resources(fw, agent, held.clone(), None)
        .await
        .unwrap();
    let (_, bundle) = cluster.expect_offer().await;
    assert_eq!(bundle_total(&bundle), held);
}

// Creating a shared volume requires the shared capability.
#[tokio::test(start_paused = true)]
async fn shared_volume_creation_needs_capability() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:1;disk(role1):100").await;
    let fw = cluster.add_framework("role1").await;
    let (_, bundle) = cluster.expect_offer().await;
    let held = bundle_total(&bundle);

    let volume = Resource::scalar("disk", Scalar::units(5))
        .reserved_for(role("role1"))
        .with_volume("id1", "data")
        .shared();
    let create = Operation::Create {
        volumes: [volume].into_iter().collect(),
    };

    let result = cluster
        .allocator
        .update_allocation(fw, agent, held, vec![create])
        .await;
    assert!(matches!(
        result,
        Err(AllocatorError::CapabilityMismatch {
            capability: Capability::SharedResources,
            ..
        })
    ));
}

// Operator reservations through update_available succeed against free
// resources and show up in the next offer.
#[tokio::test(start_paused = true)]
async fn update_available_reserves_free_resources() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:100;mem:100;disk:100").await;
    let reserve = Operation::Reserve {
        resources: vector("cpus(role1):25;mem(role1):50"),
    };
    cluster
        .allocator
        .update_available(agent, vec![reserve])
        .await
        .unwrap();

    let fw = cluster.add_framework("role1").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(
        bundle_total(&bundle),
        vector("cpus:75;mem:50;disk:100;cpus(role1):25;mem(role1):50")
    );
}

// update_available fails atomically when the free slice cannot cover
// the operations.
#[tokio::test(start_paused = true)]
async fn update_available_fails_on_insufficient_free() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:100;mem:100").await;
    let fw = cluster.add_framework("role1").await;
    // Everything is allocated now; the free slice is empty.
    let (_, bundle) = cluster.expect_offer().await;

    let reserve = Operation::Reserve {
        resources: vector("cpus(role1):25"),
    };
    let result = cluster.allocator.update_available(agent, vec![reserve]).await;
    assert!(matches!(
        result,
        Err(AllocatorError::Resource(ResourceError::MissingResource(_)))
    ));

    // The held resources are untouched.
    cluster
        .allocator
        .recover_resources(fw, agent, bundle_total(&bundle), None)
        .await
        .unwrap();
    let (_, bundle) = cluster.expect_offer().await;
    assert_eq!(bundle_total(&bundle), vector("cpus:100;mem:100"));
}

// Oversubscription: update_agent swaps the revocable slice wholesale;
// only the increment beyond what is already allocated is offered.
#[tokio::test(start_paused = true)]
async fn oversubscription_offers_increments() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster
        .add_framework_with("role1", [Capability::RevocableResources])
        .await;
    let (_, bundle) = cluster.expect_offer().await;
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));

    let revocable = |units: i64| -> acre_resources::ResourceVector {
        [Resource::scalar("cpus", Scalar::units(units)).revocable()]
            .into_iter()
            .collect()
    };

    // +10 revocable cpus: all offered.
    cluster.allocator.update_agent(agent, revocable(10)).await.unwrap();
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), revocable(10));

    // Total revocable raised to 12: only the 2 new ones are free.
    cluster.allocator.update_agent(agent, revocable(12)).await.unwrap();
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert_eq!(bundle_total(&bundle), revocable(2));

    // Total dropped below what is already allocated: nothing to offer.
    cluster.allocator.update_agent(agent, revocable(5)).await.unwrap();
    cluster.expect_no_offer().await;
}

// Revocable resources never reach frameworks without the capability.
#[tokio::test(start_paused = true)]
async fn revocable_needs_capability() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;
    let (_, bundle) = cluster.expect_offer().await;
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));

    let oversubscribed: acre_resources::ResourceVector =
        [Resource::scalar("cpus", Scalar::units(10)).revocable()]
            .into_iter()
            .collect();
    cluster
        .allocator
        .update_agent(agent, oversubscribed)
        .await
        .unwrap();

    cluster.expect_no_offer().await;
    let _ = fw;
}

// Agents carrying gpus are invisible to frameworks without the gpu
// capability.
#[tokio::test(start_paused = true)]
async fn gpu_agents_need_gpu_capability() {
    let mut cluster = start();

    cluster.add_agent("cpus:2;mem:1024;gpus:1").await;
    let plain = cluster.add_framework("role1").await;
    cluster.expect_no_offer().await;

    let capable = cluster
        .add_framework_with("role2", [Capability::GpuResources])
        .await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, capable);
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024;gpus:1"));
    let _ = plain;
}

// Slices below both allocatable thresholds are never offered.
#[tokio::test(start_paused = true)]
async fn allocatable_thresholds() {
    let mut cluster = start();

    let fw = cluster.add_framework("role1").await;

    // Below both thresholds: cpus < 0.01 and mem < 32.
    cluster.add_agent("cpus:0.005;mem:16;disk:128").await;
    cluster.expect_no_offer().await;

    // Enough cpus alone.
    let a2 = cluster.add_agent("cpus:0.01;mem:16;disk:128").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert!(bundle.contains_key(&a2));

    // Enough memory alone.
    let a3 = cluster.add_agent("cpus:0.005;mem:32;disk:128").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert!(bundle.contains_key(&a3));

    // Thresholds are judged on the combined reserved + unreserved
    // slice for the role.
    let a4 = cluster
        .add_agent("cpus:0.005;mem:16;cpus(role1):0.005;mem(role1):16;disk:128")
        .await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw);
    assert!(bundle.contains_key(&a4));
}

// Removing a framework recovers everything it held for the others.
#[tokio::test(start_paused = true)]
async fn remove_framework_recovers_holdings() {
    let mut cluster = start();

    let a1 = cluster.add_agent("cpus:2;mem:1024").await;
    let fw1 = cluster.add_framework("role1").await;
    let (to, _) = cluster.expect_offer().await;
    assert_eq!(to, fw1);

    let fw2 = cluster.add_framework("role2").await;
    cluster.expect_no_offer().await;

    cluster.allocator.remove_framework(fw1).await.unwrap();
    cluster.tick().await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    assert!(bundle.contains_key(&a1));
    assert_eq!(bundle_total(&bundle), vector("cpus:2;mem:1024"));
}

// Agents outside the whitelist take no part in allocation.
#[tokio::test(start_paused = true)]
async fn whitelist_gates_agents() {
    let mut cluster = start();

    cluster
        .allocator
        .update_whitelist(Some(["elsewhere".to_string()].into()))
        .await
        .unwrap();

    cluster.add_agent("cpus:2;mem:1024").await;
    let fw = cluster.add_framework("role1").await;
    cluster.tick().await;
    cluster.expect_no_offer().await;

    // host1 is the first hostname the harness hands out.
    cluster
        .allocator
        .update_whitelist(Some(["host1".to_string()].into()))
        .await
        .unwrap();
    cluster.tick().await;
    let (to, _) = cluster.expect_offer().await;
    assert_eq!(to, fw);

    // Clearing the whitelist admits everyone.
    cluster.allocator.update_whitelist(None).await.unwrap();
}

// Role changes through update_framework are rejected; capability
// changes land.
#[tokio::test(start_paused = true)]
async fn update_framework_fixes_role() {
    let mut cluster = start();

    let fw = cluster.add_framework("role1").await;

    let result = cluster
        .allocator
        .update_framework(fw, FrameworkInfo::new(role("role2")))
        .await;
    assert!(matches!(result, Err(AllocatorError::RoleChange { .. })));

    cluster
        .allocator
        .update_framework(
            fw,
            FrameworkInfo::new(role("role1"))
                .with_capabilities([Capability::RevocableResources]),
        )
        .await
        .unwrap();
}

// Unknown and duplicate ids surface as typed errors.
#[tokio::test(start_paused = true)]
async fn unknown_and_duplicate_ids() {
    let cluster = start();

    let ghost_fw = FrameworkId::generate();
    let ghost_agent = AgentId::generate();

    assert!(matches!(
        cluster.allocator.remove_framework(ghost_fw).await,
        Err(AllocatorError::UnknownFramework(_))
    ));
    assert!(matches!(
        cluster.allocator.remove_agent(ghost_agent).await,
        Err(AllocatorError::UnknownAgent(_))
    ));
    assert!(matches!(
        cluster
            .allocator
            .update_agent(ghost_agent, vector("cpus:1"))
            .await,
        Err(AllocatorError::UnknownAgent(_))
    ));

    let fw = cluster.add_framework("role1").await;
    let result = cluster
        .allocator
        .add_framework(fw, FrameworkInfo::new(role("role1")), HashMap::new(), true)
        .await;
    assert!(matches!(result, Err(AllocatorError::FrameworkExists(_))));
}

// A shared volume stays offerable while in use: two shared-capable
// frameworks can hold it at once.
#[tokio::test(start_paused = true)]
async fn shared_volume_offered_while_in_use() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:2;mem:1024;disk(role1):100").await;
    let fw1 = cluster
        .add_framework_with("role1", [Capability::SharedResources])
        .await;
    let (_, bundle) = cluster.expect_offer().await;
    let held = bundle_total(&bundle);

    let volume = Resource::scalar("disk", Scalar::units(50))
        .reserved_for(role("role1"))
        .with_volume("id1", "data")
        .shared();
    let create = Operation::Create {
        volumes: [volume.clone()].into_iter().collect(),
    };
    cluster
        .allocator
        .update_allocation(fw1, agent, held, vec![create])
        .await
        .unwrap();

    // fw1 keeps everything but frees some cpu and memory, declining it
    // for the duration of the test.
    cluster
        .allocator
        .recover_resources(fw1, agent, vector("cpus:1;mem:512"), Some(100 * harness::INTERVAL))
        .await
        .unwrap();

    // A second shared-capable framework in the role is offered the free
    // slice plus the volume fw1 is still using.
    let fw2 = cluster
        .add_framework_with("role1", [Capability::SharedResources])
        .await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    let offered = bundle_total(&bundle);
    assert!(offered.contains_resource(&volume));
    assert!(offered.contains(&vector("cpus:1;mem:512")));
}

// Frameworks without the shared capability never see shared volumes.
#[tokio::test(start_paused = true)]
async fn shared_volume_hidden_without_capability() {
    let mut cluster = start();

    let agent = cluster.add_agent("cpus:2;mem:1024;disk(role1):100").await;
    let fw1 = cluster
        .add_framework_with("role1", [Capability::SharedResources])
        .await;
    let (_, bundle) = cluster.expect_offer().await;
    let held = bundle_total(&bundle);

    let volume = Resource::scalar("disk", Scalar::units(50))
        .reserved_for(role("role1"))
        .with_volume("id1", "data")
        .shared();
    let create = Operation::Create {
        volumes: [volume.clone()].into_iter().collect(),
    };
    let updated = held.apply(&create).unwrap();
    cluster
        .allocator
        .update_allocation(fw1, agent, held, vec![create])
        .await
        .unwrap();
    cluster
        .allocator
        .recover_resources(fw1, agent, updated, None)
        .await
        .unwrap();
    // Everything is free again; the re-offer to fw1 carries the volume.
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw1);
    assert!(bundle_total(&bundle).contains_resource(&volume));
    cluster.decline(fw1, &bundle, Some(100 * harness::INTERVAL)).await;

    // A plain framework in the role gets everything except the volume.
    let fw2 = cluster.add_framework("role1").await;
    let (to, bundle) = cluster.expect_offer().await;
    assert_eq!(to, fw2);
    let offered = bundle_total(&bundle);
    assert!(!offered.contains_resource(&volume));
    assert!(offered.contains(&vector("cpus:2;mem:1024;disk(role1):50")));
}

// Resource requests are advisory and never fail for known frameworks.
#[tokio::test(start_paused = true)]
async fn request_resources_is_advisory() {
    let cluster = start();
    let fw = cluster.add_framework("role1").await;
    cluster
        .allocator
        .request_resources(fw, vector("cpus:64"))
        .await
        .unwrap();
}
