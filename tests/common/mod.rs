use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/classwork-api");
        cmd.env("CLASSWORK_PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server sees DATABASE_URL from .env
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Integration tests need a reachable Postgres; without one they skip
pub fn db_configured() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

pub async fn test_pool() -> Result<PgPool> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    Ok(PgPool::connect(&url).await?)
}

static SCHEMA: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

/// Create the consumed schema when it is not already provisioned. Runs the
/// DDL once per test binary; concurrent tests share the result.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    SCHEMA
        .get_or_try_init(|| async { apply_schema(pool).await })
        .await?;
    Ok(())
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    let ddl = [
        "CREATE TABLE IF NOT EXISTS teachers (\
             id TEXT PRIMARY KEY, \
             name TEXT NOT NULL, \
             is_admin BOOLEAN NOT NULL DEFAULT false)",
        "CREATE TABLE IF NOT EXISTS students (\
             id TEXT PRIMARY KEY, \
             teacher_id TEXT NOT NULL, \
             name TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS task_types (\
             id BIGSERIAL PRIMARY KEY, \
             name TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS tasks (\
             id BIGSERIAL PRIMARY KEY, \
             type_id BIGINT NOT NULL, \
             teacher_id TEXT NOT NULL, \
             name TEXT NOT NULL, \
             files JSONB NOT NULL DEFAULT '{}', \
             other_info JSONB NOT NULL DEFAULT '{}')",
        "CREATE TABLE IF NOT EXISTS solved_tasks (\
             task_id BIGINT NOT NULL, \
             student_id TEXT NOT NULL, \
             files JSONB NOT NULL DEFAULT '{}', \
             other_info JSONB NOT NULL DEFAULT '{}', \
             UNIQUE (task_id, student_id))",
        "CREATE TABLE IF NOT EXISTS temp_files (\
             temp_id TEXT PRIMARY KEY, \
             id TEXT NOT NULL)",
    ];

    for statement in ddl {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Post one bus envelope through the bridge
pub async fn dispatch(
    server: &TestServer,
    action: &str,
    envelope: Value,
) -> Result<(StatusCode, Value)> {
    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/bus/{}", server.base_url, action))
        .json(&envelope)
        .send()
        .await?;
    let status = res.status();
    let body = res.json::<Value>().await?;
    Ok((status, body))
}

pub fn envelope(userid: Option<&str>, params: Value) -> Value {
    json!({
        "caller": { "userid": userid },
        "params": params,
    })
}

pub fn envelope_with_file(userid: Option<&str>, params: Value, key: &str, name: &str) -> Value {
    json!({
        "caller": { "userid": userid },
        "params": params,
        "file": { "key": key, "originalname": name },
    })
}

// Seed helpers: ids are unique per run so suites do not collide

pub async fn seed_teacher(pool: &PgPool, name: &str) -> Result<String> {
    let id = format!("t-{}", Uuid::new_v4().simple());
    sqlx::query("INSERT INTO teachers (id, name) VALUES ($1, $2)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_student(pool: &PgPool, teacher_id: &str, name: &str) -> Result<String> {
    let id = format!("s-{}", Uuid::new_v4().simple());
    sqlx::query("INSERT INTO students (id, teacher_id, name) VALUES ($1, $2, $3)")
        .bind(&id)
        .bind(teacher_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_task_type(pool: &PgPool) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO task_types (name) VALUES ('homework') RETURNING id")
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Register an upload token the way `create_file` would
pub async fn register_token(pool: &PgPool, temp_id: &str, key: &str) -> Result<()> {
    sqlx::query("INSERT INTO temp_files (temp_id, id) VALUES ($1, $2)")
        .bind(temp_id)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}
