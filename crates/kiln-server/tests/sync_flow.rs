//! End-to-end protocol tests: both sync phases, the manifest projection,
//! and the auth/membership gates, driven through the full router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use kiln_server::gateway::MemoryBlobGateway;
use kiln_server::storage::Database;
use kiln_server::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    state: AppState,
    gateway: Arc<MemoryBlobGateway>,
    token: String,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kiln.db");
    let db = Arc::new(Database::new(db_path.to_str().unwrap()).await.unwrap());
    let gateway = Arc::new(MemoryBlobGateway::new());
    let state = AppState::new(
        db,
        gateway.clone(),
        "test-secret".to_string(),
        Duration::from_secs(900),
        Duration::from_secs(300),
    );
    let token = state.auth_service.issue_token("owner-1").unwrap();
    let app = router(state.clone());
    TestApp {
        _dir: dir,
        app,
        state,
        gateway,
        token,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_workspace(&self, name: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/workspaces",
                Some(&self.token),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["workspace"]["id"].as_str().unwrap().to_string()
    }

    async fn sync(&self, workspace_id: &str, version: &str, files: Value) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/workspaces/{workspace_id}/sync"),
            Some(&self.token),
            Some(json!({ "workspaceVersion": version, "files": files })),
        )
        .await
    }

    async fn confirm(
        &self,
        workspace_id: &str,
        version: &str,
        actions: Value,
    ) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/workspaces/{workspace_id}/sync/confirm"),
            Some(&self.token),
            Some(json!({ "workspaceVersion": version, "syncActions": actions })),
        )
        .await
    }

    async fn manifest(&self, workspace_id: &str) -> Value {
        let (status, body) = self
            .request(
                "GET",
                &format!("/workspaces/{workspace_id}/manifest"),
                Some(&self.token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn workspace_version(&self, workspace_id: &str) -> String {
        let (status, body) = self
            .request(
                "GET",
                &format!("/workspaces/{workspace_id}"),
                Some(&self.token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["workspace"]["version"].as_str().unwrap().to_string()
    }
}

/// Upsert echo of one planned upload, the way a client confirms it.
fn upsert_echo(action: &Value, hash: &str, size: i64) -> Value {
    json!({
        "filePath": action["filePath"],
        "type": action["type"],
        "fileId": action["fileId"],
        "objectKey": action["objectKey"],
        "action": "upsert",
        "clientHash": hash,
        "size": size,
    })
}

fn delete_echo(action: &Value) -> Value {
    json!({
        "filePath": action["filePath"],
        "type": action["type"],
        "fileId": action["fileId"],
        "objectKey": action["objectKey"],
        "action": "delete",
    })
}

/// Action list with the capability URLs stripped, for comparisons that
/// allow only the URLs to vary.
fn actions_without_urls(response: &Value) -> Value {
    let mut actions = response["actions"].clone();
    for action in actions.as_array_mut().unwrap() {
        action.as_object_mut().unwrap().remove("presignedUrl");
    }
    actions
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = spawn_app().await;
    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_sync_round_trip() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;
    assert_eq!(app.workspace_version(&id).await, "1");

    // Phase 1: two files and a folder, all new.
    let (status, body) = app
        .sync(
            &id,
            "1",
            json!([
                { "filePath": "src/main.py", "type": "file", "clientHash": "h-main", "action": "new" },
                { "filePath": "README.md", "type": "file", "clientHash": "h-readme", "action": "new" },
                { "filePath": "src", "type": "folder", "action": "new" },
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending_confirmation");
    assert_eq!(body["newWorkspaceVersion"], "2");

    let actions = body["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 3);
    for action in &actions[..2] {
        assert_eq!(action["actionRequired"], "upload");
        assert!(action["presignedUrl"].as_str().unwrap().contains("op=put"));
        assert!(action["fileId"].is_string());
    }
    let folder = &actions[2];
    assert_eq!(folder["actionRequired"], "upload");
    assert!(folder.get("presignedUrl").is_none());

    // Phase 2: echo everything back as upserts.
    let (status, body) = app
        .confirm(
            &id,
            "2",
            json!([
                upsert_echo(&actions[0], "h-main", 120),
                upsert_echo(&actions[1], "h-readme", 40),
                upsert_echo(&actions[2], "", 0),
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["finalWorkspaceVersion"], "2");
    assert_eq!(app.workspace_version(&id).await, "2");

    // The manifest shows exactly what was confirmed.
    let manifest = app.manifest(&id).await;
    assert_eq!(manifest["workspaceVersion"], "2");
    let files = manifest["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);

    let main_entry = files
        .iter()
        .find(|f| f["filePath"] == "src/main.py")
        .unwrap();
    assert_eq!(main_entry["contentHash"], "h-main");
    assert_eq!(main_entry["size"], 120);
    assert!(main_entry["downloadUrl"].as_str().unwrap().contains("op=get"));

    let folder_entry = files.iter().find(|f| f["filePath"] == "src").unwrap();
    assert_eq!(folder_entry["type"], "folder");
    assert_eq!(folder_entry["size"], 0);
    assert!(folder_entry.get("downloadUrl").is_none());
}

#[tokio::test]
async fn replayed_confirm_conflicts() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    let (_, body) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h", "action": "new" }]),
        )
        .await;
    let echo = upsert_echo(&body["actions"][0], "h", 10);

    let (status, _) = app.confirm(&id, "2", json!([echo.clone()])).await;
    assert_eq!(status, StatusCode::OK);

    // The expected predecessor moved from "1" to "2"; the replay must fail
    // and say where the workspace actually is.
    let (status, body) = app.confirm(&id, "2", json!([echo])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["currentWorkspaceVersion"], "2");
    assert!(body["errorMessage"].as_str().unwrap().contains("conflict"));

    assert_eq!(app.workspace_version(&id).await, "2");
}

#[tokio::test]
async fn planning_is_idempotent_until_confirmed() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    // A never-seen path: replanning must offer the same fileId and
    // objectKey, not mint a fresh identity per call.
    let fresh =
        json!([{ "filePath": "a.py", "type": "file", "clientHash": "h1", "action": "new" }]);
    let (_, first) = app.sync(&id, "1", fresh.clone()).await;
    let (_, second) = app.sync(&id, "1", fresh).await;

    assert_eq!(first["status"], "pending_confirmation");
    assert!(first["actions"][0]["fileId"].is_string());
    assert_eq!(first["actions"][0]["fileId"], second["actions"][0]["fileId"]);
    assert_eq!(first["actions"][0]["objectKey"], second["actions"][0]["objectKey"]);
    assert_eq!(actions_without_urls(&first), actions_without_urls(&second));

    // Land it, then replan a modification the same way.
    let echo = upsert_echo(&first["actions"][0], "h1", 10);
    app.confirm(&id, "2", json!([echo])).await;

    let modified =
        json!([{ "filePath": "a.py", "type": "file", "clientHash": "h2", "action": "modified" }]);
    let (_, first) = app.sync(&id, "2", modified.clone()).await;
    let (_, second) = app.sync(&id, "2", modified).await;

    assert_eq!(first["status"], "pending_confirmation");
    assert_eq!(first["status"], second["status"]);
    assert_eq!(first["newWorkspaceVersion"], second["newWorkspaceVersion"]);
    assert_eq!(actions_without_urls(&first), actions_without_urls(&second));

    // No durable writes happened.
    assert_eq!(app.workspace_version(&id).await, "2");
}

#[tokio::test]
async fn version_grows_by_one_per_confirm() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    for round in 0..3 {
        let current = app.workspace_version(&id).await;
        let (_, body) = app
            .sync(
                &id,
                &current,
                json!([{
                    "filePath": "a.py",
                    "type": "file",
                    "clientHash": format!("h{round}"),
                    "action": if round == 0 { "new" } else { "modified" },
                }]),
            )
            .await;
        assert_eq!(body["status"], "pending_confirmation");
        let next = body["newWorkspaceVersion"].as_str().unwrap().to_string();
        let echo = upsert_echo(&body["actions"][0], &format!("h{round}"), 10);

        let (status, body) = app.confirm(&id, &next, json!([echo])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["finalWorkspaceVersion"].as_str().unwrap(), next);
    }

    assert_eq!(app.workspace_version(&id).await, "4");
}

#[tokio::test]
async fn interleaved_confirm_forces_replan() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    // Client A plans at version "1" and is offered "2".
    let (_, plan_a) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "ha", "action": "new" }]),
        )
        .await;
    assert_eq!(plan_a["newWorkspaceVersion"], "2");
    let echo_a = upsert_echo(&plan_a["actions"][0], "ha", 10);

    // Client B commits a different change to "2" first.
    let (_, plan_b) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "b.py", "type": "file", "clientHash": "hb", "action": "new" }]),
        )
        .await;
    let echo_b = upsert_echo(&plan_b["actions"][0], "hb", 20);
    let (status, _) = app.confirm(&id, "2", json!([echo_b])).await;
    assert_eq!(status, StatusCode::OK);

    // A's confirm at "2" is now stale.
    let (status, body) = app.confirm(&id, "2", json!([echo_a])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["currentWorkspaceVersion"], "2");

    // Only B's file landed.
    let manifest = app.manifest(&id).await;
    let files = manifest["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filePath"], "b.py");
}

#[tokio::test]
async fn concurrent_confirms_have_one_winner() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    let (_, plan_a) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "ha", "action": "new" }]),
        )
        .await;
    let (_, plan_b) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "b.py", "type": "file", "clientHash": "hb", "action": "new" }]),
        )
        .await;
    let echo_a = upsert_echo(&plan_a["actions"][0], "ha", 10);
    let echo_b = upsert_echo(&plan_b["actions"][0], "hb", 20);

    let (a, b) = tokio::join!(
        app.confirm(&id, "2", json!([echo_a])),
        app.confirm(&id, "2", json!([echo_b])),
    );

    let winners = [a.0, b.0]
        .iter()
        .filter(|s| **s == StatusCode::OK)
        .count();
    assert_eq!(winners, 1, "statuses: {:?} {:?}", a.0, b.0);
    assert_eq!(app.workspace_version(&id).await, "2");
}

#[tokio::test]
async fn deleted_then_recreated_gets_fresh_identity() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    let (_, body) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h1", "action": "new" }]),
        )
        .await;
    let original = body["actions"][0].clone();
    let original_key = original["objectKey"].as_str().unwrap().to_string();
    app.confirm(&id, "2", json!([upsert_echo(&original, "h1", 10)]))
        .await;

    // Delete the path.
    let (_, body) = app
        .sync(&id, "2", json!([{ "filePath": "a.py", "type": "file", "action": "deleted" }]))
        .await;
    assert_eq!(body["actions"][0]["actionRequired"], "delete");
    let (status, _) = app
        .confirm(&id, "3", json!([delete_echo(&body["actions"][0])]))
        .await;
    assert_eq!(status, StatusCode::OK);

    // The orphaned blob was cleaned up after commit.
    assert!(app.gateway.was_deleted(&original_key));

    // Reproposing the path classifies as new with a fresh identity.
    let (_, body) = app
        .sync(
            &id,
            "3",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h2", "action": "new" }]),
        )
        .await;
    let recreated = &body["actions"][0];
    assert_eq!(recreated["actionRequired"], "upload");
    assert_ne!(recreated["fileId"], original["fileId"]);
    assert_ne!(recreated["objectKey"], original["objectKey"]);
}

#[tokio::test]
async fn matching_hashes_and_empty_lists_are_no_changes() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    let (_, body) = app
        .sync(
            &id,
            "1",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h1", "action": "new" }]),
        )
        .await;
    app.confirm(&id, "2", json!([upsert_echo(&body["actions"][0], "h1", 10)]))
        .await;

    // Unchanged entries whose hashes match stored hashes.
    let (status, body) = app
        .sync(
            &id,
            "2",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h1", "action": "unchanged" }]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_changes");
    assert!(body.get("newWorkspaceVersion").is_none());
    assert_eq!(body["actions"][0]["actionRequired"], "none");

    // Same for a modified report whose hash is already stored.
    let (_, body) = app
        .sync(
            &id,
            "2",
            json!([{ "filePath": "a.py", "type": "file", "clientHash": "h1", "action": "modified" }]),
        )
        .await;
    assert_eq!(body["status"], "no_changes");

    // And for an empty list at a matching version.
    let (_, body) = app.sync(&id, "2", json!([])).await;
    assert_eq!(body["status"], "no_changes");
    assert!(body.get("newWorkspaceVersion").is_none());
}

#[tokio::test]
async fn stale_propose_conflicts_with_authoritative_version() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    let (status, body) = app
        .sync(
            &id,
            "7",
            json!([{ "filePath": "a.py", "type": "file", "action": "new" }]),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "workspace_conflict");
    assert_eq!(body["currentWorkspaceVersion"], "1");
    assert!(body["actions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_requests_are_rejected_up_front() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;

    // A version token that is not a plain decimal string.
    let (status, body) = app
        .sync(
            &id,
            "v3",
            json!([{ "filePath": "a.py", "type": "file", "action": "new" }]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["errorMessage"].as_str().unwrap().contains("version"));

    let (status, body) = app.confirm(&id, "not-a-number", json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    // The same path twice in one batch.
    let (status, body) = app
        .sync(
            &id,
            "1",
            json!([
                { "filePath": "a.py", "type": "file", "action": "new" },
                { "filePath": "a.py", "type": "file", "action": "deleted" },
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    // None of it moved the version.
    assert_eq!(app.workspace_version(&id).await, "1");
}

#[tokio::test]
async fn auth_and_membership_gates() {
    let app = spawn_app().await;
    let id = app.create_workspace("demo").await;
    let sync_body = json!([{ "filePath": "a.py", "type": "file", "action": "new" }]);

    // Missing and malformed credentials.
    let (status, _) = app
        .request("POST", &format!("/workspaces/{id}/sync"), None, Some(json!({
            "workspaceVersion": "1", "files": sync_body,
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            "POST",
            &format!("/workspaces/{id}/sync"),
            Some("not-a-real-token"),
            Some(json!({ "workspaceVersion": "1", "files": sync_body })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A valid caller who does not own the workspace.
    let stranger = app.state.auth_service.issue_token("stranger").unwrap();
    let (status, body) = app
        .request(
            "POST",
            &format!("/workspaces/{id}/sync"),
            Some(&stranger),
            Some(json!({ "workspaceVersion": "1", "files": sync_body })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");

    let (status, _) = app
        .request(
            "GET",
            &format!("/workspaces/{id}/manifest"),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown workspace is 404 even for a valid caller.
    let (status, _) = app
        .request(
            "GET",
            "/workspaces/w-missing/manifest",
            Some(&app.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
