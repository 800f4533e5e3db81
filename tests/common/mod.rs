//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use tokio::process::Command as ProcessCommand;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roost::dispatch::{CallbackRef, EventCtx};
use roost::registry::{NewTenant, RegistryHandle, TenantStore};
use roost::supervisor::{TenantEvent, TenantSupervisor};
use roost::telegram::types::{Chat, User};
use roost::telegram::TelegramApi;
use roost::types::{DataPaths, UserId};

/// A supervisor over a temp data root whose tenant processes are plain
/// `sleep`s, plus the registry handle and the outward event stream.
pub struct TestRig {
    pub paths: DataPaths,
    pub registry: RegistryHandle,
    pub supervisor: Arc<TenantSupervisor>,
    pub events: mpsc::Receiver<TenantEvent>,
    _dir: TempDir,
}

pub async fn rig() -> TestRig {
    let dir = TempDir::new().expect("should create temp data root");
    let paths = DataPaths::new(dir.path());
    let store = TenantStore::load(paths.registry_file()).expect("should load empty registry");
    let (registry, _task) = RegistryHandle::spawn(store);
    let (supervisor, events) = TenantSupervisor::new(
        paths.clone(),
        registry.clone(),
        Box::new(|_| {
            let mut cmd = ProcessCommand::new("sleep");
            cmd.arg("30");
            cmd
        }),
    );
    TestRig {
        paths,
        registry,
        supervisor,
        events,
        _dir: dir,
    }
}

/// Well-formed creation inputs.
pub fn sample_tenant_input() -> NewTenant {
    NewTenant {
        bot_token: "1234567890:AABBCCDDeeFFggHHiiJJKKllMMnnOOppQQR".into(),
        owner_id: UserId(7),
        display_name: "Test Tenant".into(),
        created_by: UserId(1),
    }
}

/// Mock Bot API server answering every call with a success of the right
/// shape: `answerCallbackQuery` returns a bare boolean, everything else a
/// sent message.
pub async fn mock_api() -> (MockServer, Arc<TelegramApi>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/answerCallbackQuery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 1}
        })))
        .mount(&server)
        .await;
    let api = Arc::new(TelegramApi::with_base_url("test-token", &server.uri()));
    (server, api)
}

/// Event context for a private chat with the given user.
pub fn event_ctx(
    api: &Arc<TelegramApi>,
    user: UserId,
    text: Option<&str>,
    callback: Option<&str>,
) -> EventCtx {
    EventCtx {
        api: Arc::clone(api),
        chat: Chat {
            id: user.0,
            chat_type: Some("private".into()),
            title: None,
        },
        user: User {
            id: user.0,
            first_name: "Tester".into(),
            username: Some("tester".into()),
        },
        text: text.map(str::to_string),
        args: Vec::new(),
        callback: callback.map(|data| CallbackRef {
            id: "cb".into(),
            data: data.into(),
            message_id: Some(9),
        }),
    }
}
