//! Persistence and environment-overlay behavior of the source configuration
//! store.
//!
//! Tests that touch process environment variables serialize on one lock,
//! since the environment is shared across the test harness's threads.

use std::sync::Mutex;

use tickbridge_core::{
    ProviderId, SourceConfigStore, SourceErrorKind, DEFAULT_SOURCE_ENV, TUSHARE_TOKEN_ENV,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvGuard;

impl EnvGuard {
    fn clean() -> (std::sync::MutexGuard<'static, ()>, Self) {
        let guard = ENV_LOCK.lock().expect("env lock is not poisoned");
        std::env::remove_var(TUSHARE_TOKEN_ENV);
        std::env::remove_var(DEFAULT_SOURCE_ENV);
        (guard, Self)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        std::env::remove_var(TUSHARE_TOKEN_ENV);
        std::env::remove_var(DEFAULT_SOURCE_ENV);
    }
}

#[test]
fn first_open_writes_the_default_document() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    let store = SourceConfigStore::open(path.clone()).expect("fresh store");
    assert_eq!(store.default_source(), ProviderId::Akshare);
    assert!(path.exists());

    let raw = std::fs::read_to_string(&path).expect("file written");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("valid JSON on disk");
    assert_eq!(doc["default_source"], "akshare");
    assert_eq!(doc["sources"]["tushare"]["enabled"], true);
}

#[test]
fn mutations_write_through_and_survive_reopen() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    {
        let mut store = SourceConfigStore::open(path.clone()).expect("fresh store");
        let mut config = store.source_config(ProviderId::Tushare);
        config
            .credentials
            .insert("token".to_owned(), "persisted-token".to_owned());
        config.rate_limit_hint = Some(120);
        store
            .update_source_config(ProviderId::Tushare, config)
            .expect("valid update persists");
        store
            .set_default_source(ProviderId::Tushare)
            .expect("default persists");
    }

    let store = SourceConfigStore::open(path).expect("reopen");
    assert_eq!(store.default_source(), ProviderId::Tushare);
    let config = store.source_config(ProviderId::Tushare);
    assert_eq!(config.token(), Some("persisted-token"));
    assert_eq!(config.rate_limit_hint, Some(120));
}

#[test]
fn rejected_update_changes_nothing_on_disk_or_in_memory() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    let mut store = SourceConfigStore::open(path.clone()).expect("fresh store");
    let before_on_disk = std::fs::read_to_string(&path).expect("seed document");

    let mut bad = store.source_config(ProviderId::Tushare);
    bad.enabled = true;
    bad.credentials.clear();
    bad.rate_limit_hint = Some(1);

    let error = store
        .update_source_config(ProviderId::Tushare, bad)
        .expect_err("enabled credentialed provider without token");
    assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);

    assert_eq!(
        store.source_config(ProviderId::Tushare).rate_limit_hint,
        Some(500)
    );
    let after_on_disk = std::fs::read_to_string(&path).expect("document unchanged");
    assert_eq!(before_on_disk, after_on_disk);
}

#[test]
fn env_token_is_merged_and_persisted_at_open() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    std::env::set_var(TUSHARE_TOKEN_ENV, "env-token");
    {
        let store = SourceConfigStore::open(path.clone()).expect("open with env");
        assert_eq!(
            store.source_config(ProviderId::Tushare).token(),
            Some("env-token")
        );
    }

    // The merge stuck: a later open without the variable still sees it.
    std::env::remove_var(TUSHARE_TOKEN_ENV);
    let store = SourceConfigStore::open(path).expect("reopen without env");
    assert_eq!(
        store.source_config(ProviderId::Tushare).token(),
        Some("env-token")
    );
}

#[test]
fn env_default_override_is_memory_only() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    std::env::set_var(DEFAULT_SOURCE_ENV, "tushare");
    {
        let store = SourceConfigStore::open(path.clone()).expect("open with env");
        assert_eq!(store.default_source(), ProviderId::Tushare);
    }

    std::env::remove_var(DEFAULT_SOURCE_ENV);
    let store = SourceConfigStore::open(path).expect("reopen without env");
    assert_eq!(store.default_source(), ProviderId::Akshare);
}

#[test]
fn env_default_override_yields_to_an_explicit_set() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    std::env::set_var(DEFAULT_SOURCE_ENV, "tushare");
    let mut store = SourceConfigStore::open(path).expect("open with env");
    assert_eq!(store.default_source(), ProviderId::Tushare);

    store
        .set_default_source(ProviderId::Akshare)
        .expect("explicit set persists");
    assert_eq!(store.default_source(), ProviderId::Akshare);
}

#[test]
fn bad_env_default_is_rejected_at_open() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");

    std::env::set_var(DEFAULT_SOURCE_ENV, "bloomberg");
    let error = SourceConfigStore::open(path).expect_err("unknown provider name");
    assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);
}

#[test]
fn corrupt_document_is_rejected_at_open() {
    let (_lock, _env) = EnvGuard::clean();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sources.json");
    std::fs::write(&path, "{ this is not json }").expect("seed corrupt file");

    let error = SourceConfigStore::open(path).expect_err("corrupt document");
    assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);
}
