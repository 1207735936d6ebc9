use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use fundacion_portal::backend::SqliteBackend;
use fundacion_portal::create_app;
use fundacion_portal::models::profile::{AccountStatus, Role};

struct Reply {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("access.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((app, pool, dir))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Reply> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok(Reply { status, location, body })
}

async fn register(app: &Router, name: &str, email: &str) -> Result<Reply> {
    send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "full_name": name,
            "email": email,
            "password": "secret123",
            "confirm_password": "secret123"
        })),
    )
    .await
}

async fn login(app: &Router, email: &str) -> Result<Reply> {
    send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "secret123" })),
    )
    .await
}

fn token_of(reply: &Reply) -> Result<String> {
    reply.body["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}

#[tokio::test]
async fn member_journey_from_signup_to_panel() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let resp = register(&app, "Ada Lovelace", "ada@example.com").await?;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["redirect"], "/verificar-email");

    let resp = register(&app, "Ada Again", "ada@example.com").await?;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    // Unverified: signed in, but every protected area bounces
    let resp = login(&app, "ada@example.com").await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["redirect"], "/verificar-email");
    assert_eq!(resp.body["profile"]["status"], "pending_verification");
    let token = token_of(&resp)?;

    let resp = send(&app, "GET", "/panel", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/"));
    assert_eq!(resp.body["from"], "/panel");
    assert_eq!(resp.body["notification"]["title"], "Verify your email");

    let resp = send(&app, "GET", "/verificar-email", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["email"], "ada@example.com");

    // Verification happens out of band; a refresh picks it up
    SqliteBackend::new(pool.clone()).confirm_email("ada@example.com").await?;
    let resp = send(&app, "POST", "/auth/refresh", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["landing"], "/panel");
    assert_eq!(resp.body["profile"]["status"], "active");

    let resp = send(&app, "GET", "/panel", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["principal"]["email"], "ada@example.com");
    assert_eq!(resp.body["donations"], json!([]));

    let resp = send(&app, "GET", "/admin", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/panel"));
    assert_eq!(resp.body["notification"]["title"], "Access denied");
    assert_eq!(resp.body["notification"]["severity"], "destructive");

    for page in ["/login", "/registro", "/verificar-email"] {
        let resp = send(&app, "GET", page, Some(&token), None).await?;
        assert_eq!(resp.status, StatusCode::SEE_OTHER, "{page} should bounce a verified member");
        assert_eq!(resp.location.as_deref(), Some("/panel"));
    }

    Ok(())
}

#[tokio::test]
async fn admin_lands_on_admin_until_suspended() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let backend = SqliteBackend::new(pool.clone());

    register(&app, "Grace Hopper", "grace@example.com").await?;
    backend.confirm_email("grace@example.com").await?;
    let profile = backend.profile_by_email("grace@example.com").await?;
    backend.set_role(profile.id, &Role::Admin).await?;

    let resp = login(&app, "grace@example.com").await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["redirect"], "/admin");
    let token = token_of(&resp)?;

    let resp = send(&app, "GET", "/admin", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["users"], 1);

    // Members area is open to admins too
    let resp = send(&app, "GET", "/panel", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);

    backend.set_status(profile.id, &AccountStatus::Suspended).await?;
    let resp = send(&app, "POST", "/auth/refresh", Some(&token), None).await?;
    assert_eq!(resp.body["landing"], "/");

    let resp = send(&app, "GET", "/admin", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/"));
    assert_eq!(resp.body["notification"]["title"], "Account inactive");
    let description = resp.body["notification"]["description"].as_str().unwrap_or_default();
    assert!(description.contains("suspended"), "got: {description}");

    Ok(())
}

#[tokio::test]
async fn anonymous_and_forged_requests() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let resp = send(&app, "GET", "/panel", None, None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/login"));
    assert_eq!(resp.body["notification"], Value::Null);

    let resp = send(&app, "GET", "/admin/users", None, None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/login"));
    assert_eq!(resp.body["from"], "/admin/users");

    let resp = send(&app, "GET", "/panel", Some("not-a-jwt"), None).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(&app, "GET", "/login", None, None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["page"], "login");

    let resp = send(&app, "GET", "/auth/session", None, None).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["principal"], Value::Null);
    assert_eq!(resp.body["landing"], "/login");

    let resp = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "secret123" })),
    )
    .await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn logout_ends_the_session() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    register(&app, "Ada Lovelace", "ada@example.com").await?;
    SqliteBackend::new(pool.clone()).confirm_email("ada@example.com").await?;
    let token = token_of(&login(&app, "ada@example.com").await?)?;

    let resp = send(&app, "GET", "/api/health", None, None).await?;
    assert_eq!(resp.body["active_sessions"], 1);

    let resp = send(&app, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::OK);

    // The token still verifies, but names a session that no longer exists
    let resp = send(&app, "GET", "/panel", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/login"));

    let resp = send(&app, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(&app, "GET", "/api/health", None, None).await?;
    assert_eq!(resp.body["active_sessions"], 0);

    Ok(())
}

#[tokio::test]
async fn password_recovery_round_trip() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let backend = SqliteBackend::new(pool.clone());

    register(&app, "Ada Lovelace", "ada@example.com").await?;
    backend.confirm_email("ada@example.com").await?;

    // Unknown addresses get the same answer
    for email in ["ada@example.com", "nobody@example.com"] {
        let resp = send(&app, "POST", "/auth/password-recovery", None, Some(json!({ "email": email }))).await?;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let resp = send(&app, "POST", "/auth/recover", None, Some(json!({ "token": "bogus" }))).await?;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let recovery = backend.pending_recovery_token("ada@example.com").await?;
    let resp = send(&app, "POST", "/auth/recover", None, Some(json!({ "token": recovery }))).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["redirect"], "/panel");
    let token = token_of(&resp)?;

    // Single use
    let resp = send(&app, "POST", "/auth/recover", None, Some(json!({ "token": recovery }))).await?;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        "PUT",
        "/auth/password",
        Some(&token),
        Some(json!({ "password": "newsecret1", "confirm_password": "different" })),
    )
    .await?;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        "PUT",
        "/auth/password",
        Some(&token),
        Some(json!({ "password": "newsecret1", "confirm_password": "newsecret1" })),
    )
    .await?;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = login(&app, "ada@example.com").await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "newsecret1" })),
    )
    .await?;
    assert_eq!(resp.status, StatusCode::OK);

    Ok(())
}
