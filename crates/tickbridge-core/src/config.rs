use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::provider::{ProviderId, ProviderIdentity};

/// Environment overlay applied once at load: a token here is merged into the
/// tushare credential map and persisted.
pub const TUSHARE_TOKEN_ENV: &str = "TUSHARE_TOKEN";

/// Environment overlay for the default source; memory-only, never persisted.
pub const DEFAULT_SOURCE_ENV: &str = "TICKBRIDGE_DEFAULT_SOURCE";

/// Per-provider configuration record as it appears in the JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub enabled: bool,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    /// Requests per minute; absent means the provider advertises no budget.
    #[serde(default)]
    pub rate_limit_hint: Option<u32>,
}

impl SourceConfig {
    pub fn default_for(provider: ProviderId) -> Self {
        let rate_limit_hint = match provider {
            ProviderId::Akshare => None,
            ProviderId::Tushare => Some(500),
        };
        Self {
            enabled: true,
            credentials: BTreeMap::new(),
            rate_limit_hint,
        }
    }

    /// The `token` credential, treating an empty or whitespace value as
    /// absent.
    pub fn token(&self) -> Option<&str> {
        self.credentials
            .get("token")
            .map(String::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Short stable hash of the credential map, used as the cache-identity
    /// fingerprint. Empty credentials yield no fingerprint at all, so
    /// credential-free providers cache under the bare provider name.
    pub fn fingerprint(&self) -> Option<String> {
        if self.credentials.is_empty() {
            return None;
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (name, value) in &self.credentials {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        Some(format!("{:016x}", hasher.finish()))
    }
}

/// On-disk shape: the default source plus one record per provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ConfigDocument {
    default_source: ProviderId,
    sources: BTreeMap<ProviderId, SourceConfig>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        let sources = ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, SourceConfig::default_for(provider)))
            .collect();
        Self {
            default_source: ProviderId::Akshare,
            sources,
        }
    }
}

/// JSON-file-backed store for per-provider configuration and the persisted
/// default source.
///
/// Every mutating operation validates first, then writes through to disk
/// synchronously; a rejected update leaves both memory and file untouched.
/// The synthesized default document is allowed to be incomplete (tushare
/// enabled without a token); credential validation is lazy and only bites
/// when a client is exercised or an update is requested.
#[derive(Debug)]
pub struct SourceConfigStore {
    path: PathBuf,
    doc: ConfigDocument,
    default_override: Option<ProviderId>,
}

impl SourceConfigStore {
    /// Loads the document at `path`, or synthesizes and persists the default
    /// one, then applies the process-environment overlays.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let mut store = Self::load(path.into())?;

        let token = std::env::var(TUSHARE_TOKEN_ENV).ok();
        let default_source = std::env::var(DEFAULT_SOURCE_ENV).ok();
        store.apply_env_overlay(token.as_deref(), default_source.as_deref())?;

        Ok(store)
    }

    fn load(path: PathBuf) -> Result<Self, SourceError> {
        let store = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|error| {
                SourceError::config_store(format!(
                    "cannot read {}: {error}",
                    path.display()
                ))
            })?;
            let doc = serde_json::from_str(&raw).map_err(|error| {
                SourceError::config_store(format!(
                    "cannot parse {}: {error}",
                    path.display()
                ))
            })?;
            Self {
                path,
                doc,
                default_override: None,
            }
        } else {
            let store = Self {
                path,
                doc: ConfigDocument::default(),
                default_override: None,
            };
            store.persist()?;
            store
        };
        Ok(store)
    }

    fn apply_env_overlay(
        &mut self,
        token: Option<&str>,
        default_source: Option<&str>,
    ) -> Result<(), SourceError> {
        if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
            let current = self.source_config(ProviderId::Tushare);
            if current.token() != Some(token) {
                tracing::info!("merging tushare token from environment");
                self.merge_token(ProviderId::Tushare, token)?;
            }
        }

        if let Some(value) = default_source {
            let provider: ProviderId = value.parse()?;
            tracing::info!(source = %provider, "default source overridden by environment");
            self.default_override = Some(provider);
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The provider's record, or its built-in default when the document has
    /// no entry for it.
    pub fn source_config(&self, provider: ProviderId) -> SourceConfig {
        self.doc
            .sources
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| SourceConfig::default_for(provider))
    }

    /// Replaces the provider's record after validating it, then persists.
    /// An enabled credentialed provider must carry a non-empty token.
    pub fn update_source_config(
        &mut self,
        provider: ProviderId,
        config: SourceConfig,
    ) -> Result<(), SourceError> {
        if provider.requires_token() && config.enabled && config.token().is_none() {
            return Err(SourceError::invalid_config(
                provider,
                "enabled but no token credential supplied",
            ));
        }
        self.put_unchecked(provider, config)
    }

    /// Writes a record without re-validating it, for callers that have
    /// already validated the record another way: the switch commit path
    /// persists a candidate that just passed its probe, and `merge_token`
    /// adds a credential without toggling the enabled flag.
    pub(crate) fn put_unchecked(
        &mut self,
        provider: ProviderId,
        config: SourceConfig,
    ) -> Result<(), SourceError> {
        let previous = self.doc.sources.insert(provider, config);
        if let Err(error) = self.persist() {
            match previous {
                Some(previous) => {
                    self.doc.sources.insert(provider, previous);
                }
                None => {
                    self.doc.sources.remove(&provider);
                }
            }
            return Err(error);
        }
        Ok(())
    }

    /// Merges a single token credential into the provider's record and
    /// persists the result.
    pub fn merge_token(
        &mut self,
        provider: ProviderId,
        token: impl Into<String>,
    ) -> Result<(), SourceError> {
        let mut config = self.source_config(provider);
        config
            .credentials
            .insert("token".to_owned(), token.into());
        self.put_unchecked(provider, config)
    }

    /// Effective default: the environment override when present, otherwise
    /// the persisted document value.
    pub fn default_source(&self) -> ProviderId {
        self.default_override.unwrap_or(self.doc.default_source)
    }

    /// Persists a new default and clears any environment override so the
    /// explicit choice takes effect immediately.
    pub fn set_default_source(&mut self, provider: ProviderId) -> Result<(), SourceError> {
        let previous = self.doc.default_source;
        self.doc.default_source = provider;
        if let Err(error) = self.persist() {
            self.doc.default_source = previous;
            return Err(error);
        }
        self.default_override = None;
        Ok(())
    }

    /// Cache identity for the provider as currently configured.
    pub fn identity(&self, provider: ProviderId) -> ProviderIdentity {
        ProviderIdentity::new(provider, self.source_config(provider).fingerprint())
    }

    /// Synchronous write-through of the current document.
    pub fn persist(&self) -> Result<(), SourceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|error| {
                    SourceError::config_store(format!(
                        "cannot create {}: {error}",
                        parent.display()
                    ))
                })?;
            }
        }
        let rendered = serde_json::to_string_pretty(&self.doc).map_err(|error| {
            SourceError::config_store(format!("cannot serialize config: {error}"))
        })?;
        fs::write(&self.path, rendered).map_err(|error| {
            SourceError::config_store(format!("cannot write {}: {error}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceErrorKind;

    fn store_at(dir: &tempfile::TempDir) -> SourceConfigStore {
        SourceConfigStore::load(dir.path().join("sources.json")).expect("fresh store")
    }

    #[test]
    fn missing_file_synthesizes_and_persists_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_at(&dir);

        assert_eq!(store.default_source(), ProviderId::Akshare);
        assert!(store.source_config(ProviderId::Tushare).enabled);
        assert!(store.source_config(ProviderId::Tushare).token().is_none());
        assert!(store.path().exists());
    }

    #[test]
    fn round_trips_through_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.json");

        {
            let mut store = SourceConfigStore::load(path.clone()).expect("fresh store");
            store
                .merge_token(ProviderId::Tushare, "secret-token")
                .expect("merge persists");
            store
                .set_default_source(ProviderId::Tushare)
                .expect("set persists");
        }

        let reopened = SourceConfigStore::load(path).expect("reload");
        assert_eq!(reopened.default_source(), ProviderId::Tushare);
        assert_eq!(
            reopened.source_config(ProviderId::Tushare).token(),
            Some("secret-token")
        );
    }

    #[test]
    fn rejected_update_leaves_the_store_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_at(&dir);

        let mut bad = store.source_config(ProviderId::Tushare);
        bad.enabled = true;
        bad.credentials.clear();
        bad.rate_limit_hint = Some(1);

        let error = store
            .update_source_config(ProviderId::Tushare, bad)
            .expect_err("enabled without token");
        assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);
        assert_eq!(
            store.source_config(ProviderId::Tushare).rate_limit_hint,
            Some(500)
        );
    }

    #[test]
    fn disabled_provider_may_omit_the_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_at(&dir);

        let mut config = store.source_config(ProviderId::Tushare);
        config.enabled = false;
        config.credentials.clear();

        store
            .update_source_config(ProviderId::Tushare, config)
            .expect("disabled records skip credential validation");
        assert!(!store.source_config(ProviderId::Tushare).enabled);
    }

    #[test]
    fn fingerprint_tracks_credential_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_at(&dir);

        assert!(store.identity(ProviderId::Tushare).fingerprint.is_none());

        store
            .merge_token(ProviderId::Tushare, "first")
            .expect("merge persists");
        let first = store.identity(ProviderId::Tushare).fingerprint;
        assert!(first.is_some());

        store
            .merge_token(ProviderId::Tushare, "second")
            .expect("merge persists");
        let second = store.identity(ProviderId::Tushare).fingerprint;
        assert_ne!(first, second);
    }

    #[test]
    fn env_overlay_merges_token_and_overrides_default_in_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.json");

        let mut store = SourceConfigStore::load(path.clone()).expect("fresh store");
        store
            .apply_env_overlay(Some("env-token"), Some("tushare"))
            .expect("overlay applies");

        assert_eq!(store.default_source(), ProviderId::Tushare);
        assert_eq!(
            store.source_config(ProviderId::Tushare).token(),
            Some("env-token")
        );

        // The token merge is persisted; the default override is not.
        let reopened = SourceConfigStore::load(path).expect("reload");
        assert_eq!(reopened.default_source(), ProviderId::Akshare);
        assert_eq!(
            reopened.source_config(ProviderId::Tushare).token(),
            Some("env-token")
        );
    }

    #[test]
    fn corrupt_file_is_a_config_store_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.json");
        fs::write(&path, "not json at all").expect("seed file");

        let error = SourceConfigStore::load(path).expect_err("parse must fail");
        assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);
    }
}
