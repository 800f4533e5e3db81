//! Integration tests for the security gate in front of a dispatch engine.
//!
//! Blocked commands must never reach command logic, must be audited
//! exactly once, and must not move tenant stats; allowed traffic is rate
//! limited per user and counted.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use roost::audit::{SecurityLog, SecurityLogReader};
use roost::dispatch::{Command, DispatchEngine, EventCtx};
use roost::guard::{RateLimiter, SecurityGate, TenantGateConfig};
use roost::types::{Tenant, UserId};

use common::{event_ctx, mock_api, rig, sample_tenant_input, TestRig};

struct CountingCommand {
    name: &'static str,
    calls: Arc<Mutex<u32>>,
}

#[async_trait]
impl Command for CountingCommand {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, _ctx: &EventCtx) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        Ok(())
    }
}

struct GatedFixture {
    rig: TestRig,
    tenant: Tenant,
    gate: SecurityGate,
    engine: DispatchEngine,
    calls: Arc<Mutex<u32>>,
    audit_path: std::path::PathBuf,
}

async fn gated_fixture(window: Duration) -> GatedFixture {
    let rig = rig().await;
    let tenant = rig.registry.create(sample_tenant_input()).await.unwrap();

    let audit_path = rig.paths.audit_log_file();
    let gate = SecurityGate::with_limiter(
        Some(TenantGateConfig::new(tenant.id.clone(), &tenant.permissions)),
        rig.registry.clone(),
        SecurityLog::open(&audit_path).unwrap(),
        RateLimiter::with_window(window),
    );

    let calls = Arc::new(Mutex::new(0));
    let mut engine = DispatchEngine::new();
    // The dangerous name has a registered handler on purpose: the gate must
    // stop the event before the engine ever sees it.
    engine.register_command(Arc::new(CountingCommand {
        name: "eval",
        calls: Arc::clone(&calls),
    }));
    engine.register_command(Arc::new(CountingCommand {
        name: "help",
        calls: Arc::clone(&calls),
    }));

    GatedFixture {
        rig,
        tenant,
        gate,
        engine,
        calls,
        audit_path,
    }
}

/// Route one command event the way a tenant bot loop does: gate first.
async fn send_command(fx: &GatedFixture, api: &Arc<roost::telegram::TelegramApi>, name: &str) {
    let ctx = event_ctx(api, UserId(9), None, None);
    if fx.gate.allow_command(name, &ctx).await {
        fx.engine.dispatch_command(name, &ctx).await.unwrap();
    }
}

#[tokio::test]
async fn blocked_command_never_reaches_the_handler() {
    let (_server, api) = mock_api().await;
    let fx = gated_fixture(Duration::from_secs(60)).await;

    send_command(&fx, &api, "eval").await;

    assert_eq!(*fx.calls.lock().unwrap(), 0);

    // Exactly one audit record, carrying the event's identity.
    let reader = SecurityLogReader::open(&fx.audit_path).unwrap();
    let records = reader.tail(10);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].blocked_command, "eval");
    assert_eq!(records[0].tenant_id, fx.tenant.id);
    assert_eq!(records[0].user_id, UserId(9));

    // Stats untouched by refused traffic.
    let after = fx.rig.registry.get(&fx.tenant.id).await.unwrap().unwrap();
    assert_eq!(after.stats.total_commands, 0);
}

#[tokio::test]
async fn allowed_command_is_dispatched_and_counted() {
    let (_server, api) = mock_api().await;
    let fx = gated_fixture(Duration::from_secs(60)).await;

    send_command(&fx, &api, "help").await;
    send_command(&fx, &api, "help").await;

    assert_eq!(*fx.calls.lock().unwrap(), 2);
    let after = fx.rig.registry.get(&fx.tenant.id).await.unwrap().unwrap();
    assert_eq!(after.stats.total_commands, 2);
    assert_eq!(after.stats.users, vec![UserId(9)]);
    assert!(after.stats.last_activity.is_some());
}

#[tokio::test]
async fn quota_caps_a_window() {
    let (_server, api) = mock_api().await;
    // A window far longer than the fill loop, so it cannot roll over
    // mid-test.
    let fx = gated_fixture(Duration::from_secs(60)).await;

    // Default policy allows 30 per window; the 31st is dropped.
    for _ in 0..31 {
        send_command(&fx, &api, "help").await;
    }
    assert_eq!(*fx.calls.lock().unwrap(), 30);
}

#[tokio::test]
async fn quota_recovers_after_the_window() {
    let (_server, api) = mock_api().await;
    let fx = gated_fixture(Duration::from_millis(200)).await;

    for _ in 0..31 {
        send_command(&fx, &api, "help").await;
    }

    // Whatever the fill phase left, the next window must admit traffic
    // again.
    let before = *fx.calls.lock().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    send_command(&fx, &api, "help").await;
    assert_eq!(*fx.calls.lock().unwrap(), before + 1);
}

#[tokio::test]
async fn unconfigured_tenant_rejects_all_traffic() {
    let (_server, api) = mock_api().await;
    let rig = rig().await;
    let gate = SecurityGate::new(
        None,
        rig.registry.clone(),
        SecurityLog::open(rig.paths.audit_log_file()).unwrap(),
    );

    let ctx = event_ctx(&api, UserId(9), None, None);
    assert!(!gate.allow_command("help", &ctx).await);

    // Not a policy violation: nothing is audited for the unconfigured case.
    let reader = SecurityLogReader::open(rig.paths.audit_log_file()).unwrap();
    assert_eq!(reader.record_count(), 0);
}
