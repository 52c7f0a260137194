#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Result, anyhow};
use resfeed::{
    ApiError, AuthenticatedClient, ClientConfig, SessionState,
    session::{ACCESS_TOKEN_KEY, CredentialStore, MemoryStore, REFRESH_TOKEN_KEY, TokenPair},
};
use secrecy::ExposeSecret;
use serde_json::json;
use std::{net::TcpListener, sync::Arc, time::Duration};
use tokio::task::JoinSet;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn signed_in(uri: &str) -> Result<(AuthenticatedClient, Arc<MemoryStore>)> {
    let backend = Arc::new(MemoryStore::new());
    let credentials = Arc::new(CredentialStore::new(backend.clone()));
    credentials.set_tokens(TokenPair::new("a1", "r1"))?;
    let client = AuthenticatedClient::new(&ClientConfig::new(uri)?, credentials)?;
    Ok((client, backend))
}

fn stored_tokens(client: &AuthenticatedClient) -> Option<(String, String)> {
    client.credentials().tokens().map(|pair| {
        (
            pair.access_token.expose_secret().to_string(),
            pair.refresh_token.expose_secret().to_string(),
        )
    })
}

async fn mount_residents(server: &MockServer, bearer: &str, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!([]))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("GET"))
        .and(path("/residents"))
        .and(header("Authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(template)
        .mount(server)
        .await;
}

fn refresh_mock(delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "a2", "refreshToken": "r2"}))
                .set_delay(delay),
        )
}

#[tokio::test]
async fn valid_token_is_sent_once_without_refresh() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 200).await;
    refresh_mock(Duration::ZERO).expect(0).mount(&server).await;

    let (client, _) = signed_in(&server.uri())?;
    assert!(client.residents().await?.is_empty());
    assert_eq!(
        stored_tokens(&client),
        Some(("a1".to_string(), "r1".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn single_401_refreshes_then_retries_once() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    mount_residents(&server, "a2", 200).await;
    refresh_mock(Duration::ZERO).expect(1).mount(&server).await;

    let (client, backend) = signed_in(&server.uri())?;
    client.residents().await?;

    assert_eq!(
        stored_tokens(&client),
        Some(("a2".to_string(), "r2".to_string()))
    );
    assert!(backend.contains(ACCESS_TOKEN_KEY));

    let received = server
        .received_requests()
        .await
        .ok_or_else(|| anyhow!("request recording disabled"))?;
    let residents_calls = received
        .iter()
        .filter(|request| request.url.path() == "/residents")
        .count();
    assert_eq!(residents_calls, 2);
    Ok(())
}

#[tokio::test]
async fn second_401_is_unauthenticated() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/residents"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    refresh_mock(Duration::ZERO).expect(1).mount(&server).await;

    let (client, _) = signed_in(&server.uri())?;
    let err = client
        .residents()
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;

    assert!(matches!(err, ApiError::Unauthenticated));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_401s_share_one_refresh() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    mount_residents(&server, "a2", 200).await;
    refresh_mock(Duration::from_millis(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(&server.uri())?;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let client = client.clone();
        tasks.spawn(async move { client.residents().await });
    }

    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    assert_eq!(
        stored_tokens(&client),
        Some(("a2".to_string(), "r2".to_string()))
    );
    assert_eq!(client.session_state(), SessionState::Authenticated);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_keeps_store_until_cleared() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/residents"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, backend) = signed_in(&server.uri())?;

    let err = client
        .residents()
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(err.is_unauthenticated());
    assert_eq!(
        stored_tokens(&client),
        Some(("a1".to_string(), "r1".to_string()))
    );

    // The rejected token is not refreshed a second time.
    let err = client
        .residents()
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(err.is_unauthenticated());

    client.logout()?;
    assert!(client.credentials().access_token().is_none());
    assert!(client.credentials().refresh_token().is_none());
    assert!(!backend.contains(ACCESS_TOKEN_KEY));
    assert!(!backend.contains(REFRESH_TOKEN_KEY));
    assert_eq!(client.session_state(), SessionState::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn clear_during_refresh_wins() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    refresh_mock(Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;

    let (client, backend) = signed_in(&server.uri())?;

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.residents().await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.session_state(), SessionState::Refreshing);
    client.logout()?;

    let err = pending
        .await?
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(err.is_unauthenticated());

    assert!(stored_tokens(&client).is_none());
    assert!(!backend.contains(ACCESS_TOKEN_KEY));
    assert!(!backend.contains(REFRESH_TOKEN_KEY));
    Ok(())
}

#[tokio::test]
async fn abandoned_request_does_not_cancel_shared_refresh() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    mount_residents(&server, "a2", 200).await;
    refresh_mock(Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(&server.uri())?;

    let abandoned = tokio::spawn({
        let client = client.clone();
        async move { client.residents().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    abandoned.abort();

    client.residents().await?;
    assert_eq!(
        stored_tokens(&client),
        Some(("a2".to_string(), "r2".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    mount_residents(&server, "a2", 200).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "a2"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(&server.uri())?;
    client.residents().await?;

    assert_eq!(
        stored_tokens(&client),
        Some(("a2".to_string(), "r1".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn new_login_during_stale_refresh_gets_its_own_refresh() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_residents(&server, "a1", 401).await;
    mount_residents(&server, "b1", 401).await;
    mount_residents(&server, "b2", 200).await;
    refresh_mock(Duration::from_millis(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "s1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "b2", "refreshToken": "s2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(&server.uri())?;

    let stale = tokio::spawn({
        let client = client.clone();
        async move { client.residents().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.logout()?;
    client
        .credentials()
        .set_tokens(TokenPair::new("b1", "s1"))?;

    client.residents().await?;
    assert_eq!(
        stored_tokens(&client),
        Some(("b2".to_string(), "s2".to_string()))
    );

    let err = stale
        .await?
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(err.is_unauthenticated());

    // The late result of the first refresh leaves the new session alone.
    assert_eq!(
        stored_tokens(&client),
        Some(("b2".to_string(), "s2".to_string()))
    );
    Ok(())
}
