//! Integration tests for tenant lifecycle and the admin surface.

mod common;

use std::time::Duration;

use roost::dispatch::Command;
use roost::registry::tenant_data;
use roost::supervisor::{CreationStep, TenantEvent, TenantsCommand, ToggleOutcome, SESSION_TTL};
use roost::types::UserId;

use common::{event_ctx, mock_api, rig, sample_tenant_input};

const ADMIN: UserId = UserId(1);

#[tokio::test]
async fn lifecycle_start_stop_events_and_uniqueness() {
    let mut rig = rig().await;
    let (tenant, started) = rig.supervisor.create(sample_tenant_input()).await.unwrap();
    assert!(started);

    assert_eq!(
        rig.events.recv().await,
        Some(TenantEvent::Started {
            id: tenant.id.clone()
        })
    );

    // One live process per tenant.
    assert!(rig.supervisor.start(&tenant.id).await.is_err());

    assert!(rig.supervisor.stop(&tenant.id));
    let exited = tokio::time::timeout(Duration::from_secs(5), rig.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(exited, TenantEvent::Exited { id, .. } if id == tenant.id));
    assert!(!rig.supervisor.is_running(&tenant.id));

    assert_eq!(
        rig.supervisor.toggle(&tenant.id).await.unwrap(),
        ToggleOutcome::Started
    );
}

#[tokio::test]
async fn reset_recreates_data_zeroes_stats_and_restarts() {
    let rig = rig().await;
    let (tenant, _) = rig.supervisor.create(sample_tenant_input()).await.unwrap();

    // State accumulated during operation.
    rig.registry.record_activity(&tenant.id, UserId(33)).await;
    rig.registry.record_activity(&tenant.id, UserId(34)).await;
    let dir = rig.paths.tenant_data_dir(&tenant.id);
    std::fs::write(dir.join(tenant_data::OWNERS_FILE), "[7, 33]").unwrap();

    rig.supervisor.reset(&tenant.id).await.unwrap();

    let after = rig.registry.get(&tenant.id).await.unwrap().unwrap();
    assert_eq!(after.stats.total_commands, 0);
    assert!(after.stats.users.is_empty());

    let snap = tenant_data::snapshot(&dir).unwrap();
    assert_eq!(snap.owners, vec![UserId(7)]);
    assert!(rig.supervisor.is_running(&tenant.id));
}

#[tokio::test]
async fn delete_leaves_no_trace() {
    let rig = rig().await;
    let (tenant, _) = rig.supervisor.create(sample_tenant_input()).await.unwrap();

    rig.supervisor.delete(&tenant.id).await.unwrap();

    assert!(!rig.paths.tenant_data_dir(&tenant.id).exists());
    assert!(!rig.paths.tenant_config_file(&tenant.id).exists());
    assert!(rig.registry.get(&tenant.id).await.unwrap().is_none());
    assert!(!rig.supervisor.is_running(&tenant.id));
}

#[tokio::test]
async fn bulk_start_and_stop_tally_results() {
    let rig = rig().await;
    let (a, _) = rig.supervisor.create(sample_tenant_input()).await.unwrap();
    let (b, _) = rig.supervisor.create(sample_tenant_input()).await.unwrap();
    rig.supervisor.stop(&a.id);
    rig.supervisor.stop(&b.id);

    let tally = rig.supervisor.start_all().await.unwrap();
    assert_eq!((tally.ok, tally.failed), (2, 0));

    // Already running: the second bulk start fails for both.
    let tally = rig.supervisor.start_all().await.unwrap();
    assert_eq!((tally.ok, tally.failed), (0, 2));

    let tally = rig.supervisor.stop_all().await.unwrap();
    assert_eq!((tally.ok, tally.failed), (2, 0));
}

#[tokio::test]
async fn creation_wizard_end_to_end() {
    let (_server, api) = mock_api().await;
    let rig = rig().await;
    let command = TenantsCommand::new(rig.supervisor.clone(), ADMIN);

    // Pressing Create opens the wizard.
    command
        .handle_action("create", &event_ctx(&api, ADMIN, None, Some("tenants_create")))
        .await
        .unwrap();
    assert!(command.has_active_session(ADMIN));
    assert_eq!(
        rig.supervisor.sessions().get(ADMIN).unwrap().step,
        CreationStep::Token
    );

    // Step 1: token. Step 2: owner id. Step 3: display name.
    command
        .handle_text(
            "wizard",
            &event_ctx(
                &api,
                ADMIN,
                Some("1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR"),
                None,
            ),
        )
        .await
        .unwrap();
    command
        .handle_text("wizard", &event_ctx(&api, ADMIN, Some("777"), None))
        .await
        .unwrap();
    command
        .handle_text("wizard", &event_ctx(&api, ADMIN, Some("Wizard Tenant"), None))
        .await
        .unwrap();

    assert!(!command.has_active_session(ADMIN));
    let tenants = rig.registry.list().await.unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].display_name, "Wizard Tenant");
    assert_eq!(tenants[0].owner_id, UserId(777));
    assert!(rig.supervisor.is_running(&tenants[0].id));

    // The layout was materialized with the wizard's inputs.
    let snap = tenant_data::snapshot(&rig.paths.tenant_data_dir(&tenants[0].id)).unwrap();
    assert_eq!(snap.owners, vec![UserId(777)]);
}

#[tokio::test]
async fn expired_wizard_sessions_are_swept() {
    let (_server, api) = mock_api().await;
    let rig = rig().await;
    let command = TenantsCommand::new(rig.supervisor.clone(), ADMIN);

    command
        .handle_action("create", &event_ctx(&api, ADMIN, None, Some("tenants_create")))
        .await
        .unwrap();

    // A fresh session survives the sweep.
    assert_eq!(rig.supervisor.sweep_expired(SESSION_TTL), 0);
    assert!(command.has_active_session(ADMIN));

    // Backdate it past the TTL and sweep again.
    let mut session = rig.supervisor.sessions().get(ADMIN).unwrap();
    session.started_at = chrono::Utc::now() - chrono::Duration::minutes(31);
    rig.supervisor.sessions().set(ADMIN, session);
    assert_eq!(rig.supervisor.sweep_expired(SESSION_TTL), 1);
    assert!(!command.has_active_session(ADMIN));
}
