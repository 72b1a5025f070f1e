use std::sync::Arc;
use std::time::Duration;

use drive_core::DriveClient;
use drive_untrash::restore::backoff::Backoff;
use drive_untrash::restore::{DriveApi, DrivePolicy, FolderScope, RestoreOptions, run_restore};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FOLDER: &str = "application/vnd.google-apps.folder";
const ROOT_QUERY: &str = "mimeType = 'application/vnd.google-apps.folder' or trashed = true";

fn folder_query(id: &str) -> String {
    format!("'{id}' in parents and ({ROOT_QUERY})")
}

fn entry(id: &str, mime_type: &str, explicitly_trashed: bool) -> Value {
    json!({
        "id": id,
        "name": format!("name-{id}"),
        "mimeType": mime_type,
        "explicitlyTrashed": explicitly_trashed
    })
}

fn fast_options(dry_run: bool) -> RestoreOptions {
    RestoreOptions {
        max_connections: 4,
        policy: DrivePolicy::new(
            5,
            Arc::new(Backoff::new(
                Duration::from_millis(1),
                Duration::from_millis(5),
                false,
            )),
        ),
        page_size: 1000,
        dry_run,
    }
}

async fn mount_untrash(server: &MockServer, id: &str, status: u16, times: u64) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({"id": id, "trashed": false}))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("PATCH"))
        .and(path(format!("/drive/v3/files/{id}")))
        .and(body_json(json!({"trashed": false})))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

fn api_for(server: &MockServer) -> Arc<dyn DriveApi> {
    Arc::new(DriveClient::with_base_url(&server.uri(), "test-token").unwrap())
}

#[tokio::test]
async fn restores_explicitly_trashed_items_below_a_folder() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("top").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                entry("sub", FOLDER, false),
                entry("a", "text/plain", true),
                entry("b", "text/plain", false)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("sub").as_str()))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "p2",
            "files": [entry("c", "text/plain", true)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("sub").as_str()))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                entry("top", FOLDER, false),
                entry("d", "text/plain", true)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_untrash(&server, "a", 200, 1).await;
    mount_untrash(&server, "b", 200, 0).await;
    mount_untrash(&server, "c", 200, 1).await;
    mount_untrash(&server, "d", 404, 1).await;

    let report = run_restore(
        api_for(&server),
        fast_options(false),
        vec![FolderScope::folder("top", "top")],
    )
    .await;

    assert_eq!(report.folders_processed, 2);
    assert_eq!(report.items_restored, 2);
    assert_eq!(report.items_failed, 1);
    assert_eq!(report.listings_failed, 0);
    assert_eq!(report.duplicate_references, 1);
}

#[tokio::test]
async fn transient_untrash_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", ROOT_QUERY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [entry("x", "text/plain", true)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/x"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_untrash(&server, "x", 200, 1).await;

    let report = run_restore(api_for(&server), fast_options(false), Vec::new()).await;

    assert_eq!(report.folders_processed, 1);
    assert_eq!(report.items_restored, 1);
    assert_eq!(report.items_failed, 0);
}

#[tokio::test]
async fn unlistable_folder_does_not_stop_siblings() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("gone").as_str()))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_query("ok").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [entry("y", "text/plain", true)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_untrash(&server, "y", 200, 1).await;

    let report = run_restore(
        api_for(&server),
        fast_options(false),
        vec![FolderScope::folder("gone", "gone"), FolderScope::folder("ok", "ok")],
    )
    .await;

    assert_eq!(report.folders_processed, 2);
    assert_eq!(report.listings_failed, 1);
    assert_eq!(report.items_restored, 1);
}

#[tokio::test]
async fn dry_run_never_patches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", ROOT_QUERY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [entry("x", "text/plain", true), entry("z", "text/plain", true)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = run_restore(api_for(&server), fast_options(true), Vec::new()).await;

    assert!(report.dry_run);
    assert_eq!(report.items_restored, 2);
    assert_eq!(report.to_string(), "processed 1 folders, would restore 2 items");
}
