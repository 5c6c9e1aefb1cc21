use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use realty_backend_runtime::{self, BackendServices};
use realty_config::{AppConfig, OtpStoreKind};
use sqlx::Row;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    for expected in ["users", "properties", "leads", "conversations", "otp_codes"] {
        let table: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(expected)
        .fetch_optional(&services.db_pool)
        .await?;
        assert_eq!(Some(expected.to_string()), table);
    }

    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_otp_store_keeps_codes_out_of_the_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("memory.db")), 2);
    config.otp.store = OtpStoreKind::Memory;

    let services = initialise(&config).await?;
    services.crm.otp.issue("visitor@example.com").await?;

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_codes")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(0, stored);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn database_otp_store_persists_codes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("sql.db")), 2);

    let services = initialise(&config).await?;
    services.crm.otp.issue("visitor@example.com").await?;

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_codes")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, stored);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_purges_expired_codes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("sweep.db")), 2);

    let services = initialise(&config).await?;
    services.crm.otp.issue("stale@example.com").await?;
    sqlx::query("UPDATE otp_codes SET expires_at = '2000-01-01T00:00:00.000Z'")
        .execute(&services.db_pool)
        .await?;

    let (_, codes) = services.run_maintenance().await?;
    assert_eq!(1, codes);

    let (sessions, codes) = services.run_maintenance().await?;
    assert_eq!((0, 0), (sessions, codes));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn gateway_state_shares_the_services() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("state.db")), 2);

    let services = initialise(&config).await?;
    let state = services.gateway_state();
    assert_eq!(config.http.cors_origins, state.http.cors_origins);

    let settings = state.crm.settings.get().await?;
    assert!(settings.assistant_enabled);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_enables_sqlite_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/foreign_keys.db");
    let config = build_config(sqlite_url(&db_path), 2);

    let services = initialise(&config).await?;

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let max_connections = 3;
    let config = build_config(sqlite_url(&db_path), max_connections);

    let services = initialise(&config).await?;
    assert_eq!(
        max_connections,
        services.db_pool.options().get_max_connections()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn in_memory_database_creates_no_files() -> Result<()> {
    let config = build_config("sqlite://:memory:".into(), 1);
    let services = initialise(&config).await?;

    let databases = sqlx::query("PRAGMA database_list")
        .fetch_all(&services.db_pool)
        .await?;
    let main_db = databases
        .into_iter()
        .find(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "main")
                .unwrap_or(false)
        })
        .context("expected main in PRAGMA database_list")?;
    let file: String = main_db.try_get("file")?;
    assert!(file.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn non_sqlite_urls_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target_dir = temp_dir.path().join("should_not_exist");
    let url = format!("postgres://{}/ignored.db", target_dir.to_string_lossy());
    let config = build_config(url, 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected sqlite connection to fail for non-sqlite URL"),
        Err(error) => error,
    };
    assert!(!target_dir.exists());
    assert!(
        format!("{error:#}").contains("failed to initialise database"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_lifetimes_fail_initialisation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("ttl.db")), 1);
    config.auth.session_ttl_seconds = i64::MAX as u64;

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("a session lifetime chrono cannot represent must be rejected"),
        Err(error) => error,
    };
    assert!(
        format!("{error:#}").contains("auth.session_ttl_seconds"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    realty_backend_runtime::telemetry::init_tracing()
        .expect("first initialisation should succeed");

    let second = realty_backend_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { realty_backend_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
