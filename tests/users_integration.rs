use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

use authd::configuration::{get_configuration, DatabaseSettings};
use authd::startup::run;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let jwt_config = configuration.jwt.clone();
    let server = run(listener, connection_pool.clone(), jwt_config).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

/// Registers an account and returns (access_token, refresh_token, user_id).
async fn register_user(app: &TestApp, email: &str, username: &str) -> (String, String, i64) {
    let client = reqwest::Client::new();
    let body = json!({
        "email": email,
        "username": username,
        "password": "SecurePass123",
        "full_name": "John Doe"
    });

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let data: Value = response.json().await.expect("Failed to parse response");
    (
        data["access_token"].as_str().unwrap().to_string(),
        data["refresh_token"].as_str().unwrap().to_string(),
        data["user"]["id"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn me_returns_the_public_account_view() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let (access_token, _, _) = register_user(&app, "john@example.com", "johndoe").await;

    let response = client
        .get(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "john@example.com");
    assert_eq!(body["username"], "johndoe");
    assert_eq!(body["full_name"], "John Doe");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn me_returns_401_without_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/users/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn update_changes_profile_fields() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let (access_token, _, _) = register_user(&app, "john@example.com", "johndoe").await;

    let response = client
        .put(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({"username": "johnny", "full_name": "Johnny D"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], "johnny");
    assert_eq!(body["full_name"], "Johnny D");
    // Untouched fields keep their value
    assert_eq!(body["email"], "john@example.com");
}

#[tokio::test]
async fn update_rejects_taken_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register_user(&app, "jane@example.com", "janedoe").await;
    let (access_token, _, _) = register_user(&app, "john@example.com", "johndoe").await;

    let response = client
        .put(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({"email": "jane@example.com"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "DUPLICATE_EMAIL");
}

#[tokio::test]
async fn password_change_rehashes_and_old_password_stops_working() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let (access_token, _, _) = register_user(&app, "john@example.com", "johndoe").await;

    let response = client
        .put(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({"password": "BrandNewPass456"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let old_login = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({"email": "john@example.com", "password": "SecurePass123"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, old_login.status().as_u16());

    let new_login = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({"email": "john@example.com", "password": "BrandNewPass456"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, new_login.status().as_u16());
}

#[tokio::test]
async fn deactivation_revokes_tokens_and_blocks_login() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let (access_token, refresh_token, user_id) =
        register_user(&app, "john@example.com", "johndoe").await;

    let response = client
        .delete(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    // A deactivated account has zero active tokens
    let active = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND is_revoked = FALSE",
    )
    .bind(user_id)
    .fetch_one(&app.db_pool)
    .await
    .expect("Failed to count refresh tokens");
    assert_eq!(active, 0);

    // The row survives as a soft delete
    let is_active =
        sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&app.db_pool)
            .await
            .expect("Failed to fetch user");
    assert!(!is_active);

    // Login collapses to the same invalid-credentials outcome
    let login = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({"email": "john@example.com", "password": "SecurePass123"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, login.status().as_u16());
    let login_body: Value = login.json().await.expect("Failed to parse response");
    assert_eq!(login_body["code"], "INVALID_CREDENTIALS");

    // The surviving refresh token is revoked
    let refresh = client
        .post(&format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, refresh.status().as_u16());

    // The still-unexpired access token no longer opens protected routes
    let me = client
        .get(&format!("{}/users/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, me.status().as_u16());
}
