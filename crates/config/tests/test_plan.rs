//! Test plan for the `realty-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use realty_config::{
    load, AppConfig, AssistantConfig, AuthConfig, HttpConfig, OtpStoreKind, MAX_OTP_CODE_LENGTH,
    MAX_TTL_SECONDS, MIN_OTP_CODE_LENGTH,
};

const ENV_VARS_TO_RESET: &[&str] = &[
    "REALTY_CONFIG",
    "REALTY__AUTH__SESSION_TTL_SECONDS",
    "REALTY__AUTH__LEAD_TOKEN_SECRET",
    "REALTY__DATABASE__MAX_CONNECTIONS",
    "REALTY__DATABASE__URL",
    "REALTY__HTTP__ADDRESS",
    "REALTY__HTTP__PORT",
    "REALTY__OTP__CODE_LENGTH",
    "REALTY__OTP__STORE",
    "REALTY__OTP__TTL_SECONDS",
    "REALTY__ASSISTANT__NAME",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(config.auth.session_ttl_seconds, defaults.auth.session_ttl_seconds);
    assert_eq!(config.otp.code_length, defaults.otp.code_length);
    assert_eq!(config.otp.store, OtpStoreKind::Database);
    assert_eq!(config.assistant.name, defaults.assistant.name);
    assert!(config.auth.uses_development_secret());
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "realty.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/realty.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "realty.toml",
        r#"
        [http]
        port = 8181

        [otp]
        ttl_seconds = 120
        store = "memory"
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.http.port, 8181);
    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.otp.ttl_seconds, 120);
    assert_eq!(config.otp.store, OtpStoreKind::Memory);
    assert_eq!(config.otp.max_attempts, defaults.otp.max_attempts);
    assert_eq!(config.database.url, defaults.database.url);
}

#[test]
#[serial]
fn load_reads_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [assistant]
        name = "Max"

        [auth.bootstrap_admin]
        email = "owner@agency.test"
        password = "correct-horse"
        "#,
    );
    ctx.set_var(
        "REALTY_CONFIG",
        temp_dir.path().join("elsewhere/custom.toml").display().to_string(),
    );

    let config = load().expect("configuration load should read REALTY_CONFIG");
    assert_eq!(config.assistant.name, "Max");
    let admin = config.auth.bootstrap_admin.expect("bootstrap admin present");
    assert_eq!(admin.email, "owner@agency.test");
    assert!(admin.display_name.is_none());
}

#[test]
#[serial]
fn load_errors_when_explicit_path_is_missing() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var(
        "REALTY_CONFIG",
        temp_dir.path().join("missing.toml").display().to_string(),
    );

    assert!(load().is_err());
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "realty.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("REALTY__HTTP__PORT", "8080");
    ctx.set_var("REALTY__AUTH__LEAD_TOKEN_SECRET", "a-real-secret");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.auth.lead_token_secret, "a-real-secret");
    assert!(!config.auth.uses_development_secret());
}

#[test]
#[serial]
fn load_rejects_lifetimes_beyond_ten_years() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let twenty_years = (20 * 365 * 86_400u64).to_string();
    ctx.set_var("REALTY__AUTH__SESSION_TTL_SECONDS", &twenty_years);

    let error = load().expect_err("a twenty year session is not a usable lifetime");
    assert!(
        error.to_string().contains("auth.session_ttl_seconds"),
        "unexpected error: {error:#}"
    );

    ctx.set_var(
        "REALTY__AUTH__SESSION_TTL_SECONDS",
        MAX_TTL_SECONDS.to_string(),
    );
    let config = load().expect("ten years is still accepted");
    assert_eq!(config.auth.session_ttl_seconds, MAX_TTL_SECONDS);
}

#[test]
#[serial]
fn load_rejects_oversized_otp_lifetimes() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "realty.toml",
        &format!(
            r#"
        [otp]
        ttl_seconds = {}
        "#,
            MAX_TTL_SECONDS + 1
        ),
    );

    let error = load().expect_err("otp lifetime above the bound");
    assert!(error.to_string().contains("otp.ttl_seconds"));
}

#[test]
#[serial]
fn load_rejects_code_lengths_outside_the_supported_range() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    for length in [MIN_OTP_CODE_LENGTH - 1, MAX_OTP_CODE_LENGTH + 1, 12] {
        ctx.set_var("REALTY__OTP__CODE_LENGTH", length.to_string());
        let error = load().expect_err("code length outside the supported range");
        assert!(error.to_string().contains("otp.code_length"), "length {length}");
    }

    for length in [MIN_OTP_CODE_LENGTH, MAX_OTP_CODE_LENGTH] {
        ctx.set_var("REALTY__OTP__CODE_LENGTH", length.to_string());
        let config = load().expect("boundary code length is accepted");
        assert_eq!(config.otp.code_length, length);
    }
}

#[test]
#[serial]
fn load_rejects_zero_length_codes() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("REALTY__OTP__CODE_LENGTH", "0");

    let error = load().expect_err("zero-length codes are not usable");
    assert!(error.to_string().contains("otp.code_length"));
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "realty.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn auth_config_defaults_have_no_bootstrap_admin() {
    let defaults = AuthConfig::default();
    assert!(defaults.bootstrap_admin.is_none());
    assert_eq!(defaults.lead_token_issuer, "realty");
}

#[test]
fn assistant_config_defaults_limit_history() {
    let defaults = AssistantConfig::default();
    assert_eq!(defaults.history_limit, 20);
    assert_eq!(defaults.max_listings_in_reply, 3);
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
    assert!(defaults.cors_origins.is_empty());
}
