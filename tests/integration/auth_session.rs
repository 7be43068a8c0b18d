//! Integration tests for registration, login and the stored session.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

use tasknest::auth::{AuthClient, AuthError, Session};
use tasknest::store::{ErrorKind, StoreError};

async fn client() -> (AuthClient, tokio::task::JoinHandle<()>) {
    let (addr, handle): (SocketAddr, _) = tasknest_server::api::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server");
    let url = Url::parse(&format!("http://{addr}")).unwrap();
    (AuthClient::new(url, None).unwrap(), handle)
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tasknest-auth-it-{name}-{}", uuid::Uuid::now_v7()))
}

#[tokio::test]
async fn register_login_and_me() {
    let (auth, server) = client().await;

    let registered = auth
        .register("Ada Lovelace", "ada@example.com", "engine")
        .await
        .unwrap();
    assert_eq!(registered.user.name, "Ada Lovelace");

    let logged_in = auth.login("ada@example.com", "engine").await.unwrap();
    assert_eq!(logged_in.user, registered.user);
    assert_ne!(logged_in.token, registered.token);

    let me = auth.me(&logged_in.token).await.unwrap();
    assert_eq!(me, registered.user);

    server.abort();
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (auth, server) = client().await;
    auth.register("", "eve@example.com", "right").await.unwrap();

    let err = auth.login("eve@example.com", "wrong").await.unwrap_err();
    let AuthError::Store(store_err) = &err else {
        panic!("expected store error, got {err:?}");
    };
    assert!(store_err.is_unauthorized());
    assert_eq!(err.kind(), ErrorKind::Service);

    server.abort();
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (auth, server) = client().await;
    auth.register("A", "dup@example.com", "pw").await.unwrap();
    let err = auth.register("B", "dup@example.com", "pw").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Store(StoreError::Service { status: 409, .. })
    ));
    server.abort();
}

#[tokio::test]
async fn bogus_token_is_rejected() {
    let (auth, server) = client().await;
    let err = auth.me("not-a-token").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Store(StoreError::Service { status: 401, .. })
    ));
    server.abort();
}

#[tokio::test]
async fn session_survives_between_invocations() {
    let (auth, server) = client().await;
    let dir = temp_dir("persist");

    let session = auth.register("Sam", "sam@example.com", "pw").await.unwrap();
    session.save(&dir).unwrap();

    let restored = Session::load(&dir).unwrap();
    assert_eq!(restored, session);
    assert_eq!(auth.me(&restored.token).await.unwrap(), session.user);

    Session::clear(&dir).unwrap();
    assert!(matches!(Session::load(&dir), Err(AuthError::NotSignedIn)));

    let _ = std::fs::remove_dir_all(dir);
    server.abort();
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let store = tasknest_server::store::ServerStore::new()
        .with_token_ttl(Some(chrono::Duration::zero()));
    let state = std::sync::Arc::new(tasknest_server::api::AppState::new(store));
    let (addr, server) = tasknest_server::api::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start test server");
    let auth = AuthClient::new(Url::parse(&format!("http://{addr}")).unwrap(), None).unwrap();

    let session = auth.register("Old", "old@example.com", "pw").await.unwrap();
    let err = auth.me(&session.token).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Store(StoreError::Service { status: 401, .. })
    ));
    server.abort();
}
