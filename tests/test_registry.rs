//! Integration tests for the persisted registry and tenant data layout.

mod common;

use roost::registry::{tenant_data, TenantStore};
use roost::types::UserId;

use common::{rig, sample_tenant_input};

#[tokio::test]
async fn created_tenant_survives_a_reload() {
    let rig = rig().await;

    let created = rig.registry.create(sample_tenant_input()).await.unwrap();

    // Another store over the same file sees the entry with default policy.
    let reopened = TenantStore::load(rig.paths.registry_file()).unwrap();
    let tenant = reopened.get(&created.id).unwrap();
    assert_eq!(tenant.display_name, "Test Tenant");
    assert_eq!(tenant.permissions.max_users, 1000);
    assert_eq!(tenant.permissions.rate_limit_per_minute, 30);
    assert!(tenant.permissions.blocked_commands.iter().any(|c| c == "eval"));
    assert_eq!(tenant.stats.total_commands, 0);
}

#[tokio::test]
async fn ids_stay_unique_and_stable_under_concurrent_creation() {
    let rig = rig().await;

    let mut joins = Vec::new();
    for _ in 0..10 {
        let registry = rig.registry.clone();
        joins.push(tokio::spawn(async move {
            registry.create(sample_tenant_input()).await
        }));
    }

    let mut ids = Vec::new();
    for join in joins {
        ids.push(join.await.unwrap().unwrap().id);
    }
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 10);

    // Every id resolves to the same entry on lookup.
    for id in &ids {
        let found = rig.registry.get(id).await.unwrap().unwrap();
        assert_eq!(&found.id, id);
    }
}

#[tokio::test]
async fn interleaved_stats_updates_are_not_lost() {
    let rig = rig().await;
    let tenant = rig.registry.create(sample_tenant_input()).await.unwrap();

    let mut joins = Vec::new();
    for i in 0..20 {
        let registry = rig.registry.clone();
        let id = tenant.id.clone();
        joins.push(tokio::spawn(async move {
            registry.record_activity(&id, UserId(i % 4)).await;
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    let after = rig.registry.get(&tenant.id).await.unwrap().unwrap();
    assert_eq!(after.stats.total_commands, 20);
    assert_eq!(after.stats.users.len(), 4);
}

#[tokio::test]
async fn data_dir_materialization_is_idempotent() {
    let rig = rig().await;
    let tenant = rig.registry.create(sample_tenant_input()).await.unwrap();
    let dir = rig.paths.tenant_data_dir(&tenant.id);

    tenant_data::materialize(&dir, tenant.owner_id, &tenant.display_name).unwrap();
    let snap = tenant_data::snapshot(&dir).unwrap();
    assert_eq!(snap.owners, vec![UserId(7)]);
    assert_eq!(snap.botinfo.bot_name, "Test Tenant");

    // Accumulated state must survive a second materialization.
    std::fs::write(dir.join(tenant_data::OWNERS_FILE), "[7, 42]").unwrap();
    tenant_data::materialize(&dir, tenant.owner_id, &tenant.display_name).unwrap();
    let snap = tenant_data::snapshot(&dir).unwrap();
    assert_eq!(snap.owners, vec![UserId(7), UserId(42)]);
}
