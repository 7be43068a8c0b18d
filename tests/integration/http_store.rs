//! End-to-end tests: `HttpTaskStore` and `TaskCollection` against an
//! in-process `tasknest-server`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use tasknest::auth::{AuthClient, Session};
use tasknest::mirror::{FileMirror, TaskMirror};
use tasknest::notify::Notifier;
use tasknest::store::http::HttpTaskStore;
use tasknest::store::{ErrorKind, StoreError, TaskStore};
use tasknest::tasks::{TaskCollection, TaskError};
use tasknest_proto::{
    FilterUpdate, Priority, SortBy, SortOrder, StatusFilter, TaskDraft, TaskId, TaskPatch,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    tasknest_server::api::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}

fn base_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{addr}")).unwrap()
}

async fn sign_up(addr: SocketAddr, email: &str) -> Session {
    AuthClient::new(base_url(addr), None)
        .unwrap()
        .register("Tester", email, "correct horse")
        .await
        .unwrap()
}

fn store_for(addr: SocketAddr, session: &Session) -> HttpTaskStore {
    HttpTaskStore::new(
        base_url(addr),
        Some(session.token.clone()),
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tasknest-http-{name}-{}", uuid::Uuid::now_v7()))
}

// ---------------------------------------------------------------------------
// Store round trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crud_round_trip() {
    let (addr, server) = start_server().await;
    let session = sign_up(addr, "crud@example.com").await;
    let store = store_for(addr, &session);

    let created = store
        .create(
            &TaskDraft::new("Write report")
                .with_priority(Priority::High)
                .with_tags(["work"]),
            &session.user.id,
        )
        .await
        .unwrap();
    assert_eq!(created.user_id, session.user.id);
    assert!(!created.completed);

    let listed = store.list().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(store.get_by_id(&created.id).await.unwrap(), created);

    let patch = TaskPatch {
        completed: Some(true),
        description: Some(Some("draft attached".to_string())),
        ..TaskPatch::default()
    };
    let updated = store.update(&created.id, &patch).await.unwrap();
    assert!(updated.completed);
    assert_eq!(updated.description.as_deref(), Some("draft attached"));
    assert_eq!(updated.priority, Priority::High);

    // Explicit null clears the field.
    let cleared = store
        .update(
            &created.id,
            &TaskPatch {
                description: Some(None),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.description.is_none());

    store.delete(&created.id).await.unwrap();
    assert!(store.list().await.unwrap().is_empty());

    let err = store.get_by_id(&created.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::Service);

    server.abort();
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (addr, server) = start_server().await;
    let store = HttpTaskStore::new(base_url(addr), None, None).unwrap();

    let err = store.list().await.unwrap_err();
    assert!(err.is_unauthorized());
    let StoreError::Service { status, message } = err else {
        panic!("expected service error");
    };
    assert_eq!(status, 401);
    assert_eq!(message, "missing bearer token");

    server.abort();
}

#[tokio::test]
async fn users_cannot_see_each_others_tasks() {
    let (addr, server) = start_server().await;
    let alice = sign_up(addr, "alice@example.com").await;
    let bob = sign_up(addr, "bob@example.com").await;

    let alice_store = store_for(addr, &alice);
    let bob_store = store_for(addr, &bob);

    let task = alice_store
        .create(&TaskDraft::new("private"), &alice.user.id)
        .await
        .unwrap();

    assert!(bob_store.list().await.unwrap().is_empty());
    assert!(bob_store.get_by_id(&task.id).await.unwrap_err().is_not_found());
    assert!(bob_store.delete(&task.id).await.unwrap_err().is_not_found());

    // Creating on someone else's behalf is refused.
    let err = bob_store
        .create(&TaskDraft::new("sneaky"), &alice.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Service { status: 403, .. }));

    server.abort();
}

#[tokio::test]
async fn server_rejects_blank_title() {
    let (addr, server) = start_server().await;
    let session = sign_up(addr, "blank@example.com").await;
    let store = store_for(addr, &session);

    let err = store
        .create(&TaskDraft::new("   "), &session.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Service { status: 400, .. }));

    server.abort();
}

#[tokio::test]
async fn stopped_server_is_transport_error() {
    let (addr, server) = start_server().await;
    let session = sign_up(addr, "gone@example.com").await;
    server.abort();
    let _ = server.await;

    let store = store_for(addr, &session);
    let err = store.list().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// ---------------------------------------------------------------------------
// Collection over HTTP with a file mirror
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collection_syncs_with_server_and_mirror() {
    let (addr, server) = start_server().await;
    let session = sign_up(addr, "flow@example.com").await;
    let dir = temp_dir("flow");

    let mut tasks = TaskCollection::new(
        store_for(addr, &session),
        FileMirror::new(&dir),
        Notifier::disabled(),
    );
    tasks.open_session(&session.user.id).await.unwrap();
    assert!(tasks.is_empty());

    let milk = tasks
        .create_task(TaskDraft::new("Buy milk").with_priority(Priority::Low))
        .await
        .unwrap();
    tasks
        .create_task(TaskDraft::new("Ship release").with_priority(Priority::High))
        .await
        .unwrap();
    tasks.toggle_task(&milk.id).await.unwrap();

    tasks.set_filter(FilterUpdate {
        status: Some(StatusFilter::All),
        ..FilterUpdate::sort(SortBy::Priority, SortOrder::Desc)
    });
    let titles: Vec<&str> = tasks.view().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["Ship release", "Buy milk"]);

    // The mirror file holds exactly what the collection holds.
    let mirrored = FileMirror::new(&dir).load(&session.user.id).unwrap();
    assert_eq!(mirrored, tasks.tasks());

    // A fresh collection sees the server's state.
    let mut again = TaskCollection::new(
        store_for(addr, &session),
        FileMirror::new(&dir),
        Notifier::disabled(),
    );
    again.open_session(&session.user.id).await.unwrap();
    assert_eq!(again.len(), 2);
    assert!(again.find(&milk.id).unwrap().completed);

    // Deleting a task the server no longer has surfaces the 404.
    tasks.delete_task(&milk.id).await.unwrap();
    let err = again.delete_task(&milk.id).await.unwrap_err();
    let TaskError::Store(store_err) = err else {
        panic!("expected store error");
    };
    assert!(store_err.is_not_found());
    assert!(again.find(&milk.id).is_some());

    let missing = TaskId::new("does-not-exist");
    assert!(matches!(
        again.delete_task(&missing).await,
        Err(TaskError::NotFound(_))
    ));

    let _ = std::fs::remove_dir_all(dir);
    server.abort();
}

#[tokio::test]
async fn task_id_cannot_reach_other_routes() {
    let (addr, server) = start_server().await;
    let session = sign_up(addr, "paths@example.com").await;
    let store = store_for(addr, &session);

    // Would resolve to GET /auth/me if the id were spliced in raw.
    let err = store
        .get_by_id(&TaskId::new("../auth/me"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");

    server.abort();
}
