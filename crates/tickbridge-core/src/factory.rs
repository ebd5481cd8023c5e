use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::adapters::{AkshareClient, TushareClient};
use crate::client::DataClient;
use crate::config::{SourceConfig, SourceConfigStore};
use crate::error::SourceError;
use crate::http_client::{HttpClient, NoopHttpClient, ReqwestHttpClient};
use crate::provider::{ProviderId, ProviderIdentity};
use crate::throttling::RateGate;

const DEFAULT_CONFIG_PATH: &str = "tickbridge-sources.json";

/// Entry point for everything source-related: hands out cached provider
/// clients, resolves the current default, and runs the switch protocol.
///
/// All shared state sits behind one async `RwLock`. The switch protocol holds
/// the write guard across its validation probe, so switches serialize and the
/// default-pointer commit is atomic with respect to every other lookup.
pub struct SourceFactory {
    inner: RwLock<FactoryInner>,
}

struct FactoryInner {
    store: SourceConfigStore,
    clients: HashMap<ProviderIdentity, Arc<dyn DataClient>>,
    offline: bool,
}

impl SourceFactory {
    pub fn builder() -> SourceFactoryBuilder {
        SourceFactoryBuilder::new()
    }

    pub fn with_store(store: SourceConfigStore, offline: bool) -> Self {
        Self {
            inner: RwLock::new(FactoryInner {
                store,
                clients: HashMap::new(),
                offline,
            }),
        }
    }

    /// Cached client for `provider`. A supplied token is merged into the
    /// store (and persisted) first, so the cache identity reflects it; a
    /// cached entry whose fingerprint no longer matches the live config is
    /// dropped and rebuilt.
    pub async fn client(
        &self,
        provider: ProviderId,
        token: Option<&str>,
    ) -> Result<Arc<dyn DataClient>, SourceError> {
        let mut inner = self.inner.write().await;
        if let Some(token) = token {
            inner.store.merge_token(provider, token)?;
        }
        inner.client_locked(provider)
    }

    /// Client for the current default source, constructed lazily on first
    /// access.
    pub async fn current_client(&self) -> Result<Arc<dyn DataClient>, SourceError> {
        let mut inner = self.inner.write().await;
        let provider = inner.store.default_source();
        inner.client_locked(provider)
    }

    /// Switches the default source with validation and rollback.
    ///
    /// Credentials are merged into an in-memory candidate record only; a
    /// candidate client built from it must pass `validate()` before anything
    /// is persisted. On success the record, the default pointer, and the
    /// cache entry are committed together. On failure nothing has been
    /// written, the prior default keeps serving, and the failed candidate
    /// stays cached with its unhealthy record for later inspection.
    pub async fn switch_data_source(
        &self,
        provider: ProviderId,
        token: Option<&str>,
    ) -> Result<Arc<dyn DataClient>, SourceError> {
        let mut inner = self.inner.write().await;

        let mut candidate_config = inner.store.source_config(provider);
        candidate_config.enabled = true;
        if let Some(token) = token {
            candidate_config
                .credentials
                .insert("token".to_owned(), token.to_owned());
        }

        let identity = ProviderIdentity::new(provider, candidate_config.fingerprint());
        let candidate = build_client(provider, &candidate_config, inner.offline);

        if let Err(cause) = candidate.validate().await {
            tracing::warn!(source = %provider, error = %cause, "switch probe failed, keeping current source");
            inner.clients.insert(identity, candidate);
            return Err(SourceError::switch_failed(provider, cause));
        }

        inner.store.put_unchecked(provider, candidate_config)?;
        inner.store.set_default_source(provider)?;
        inner.evict_stale(provider, &identity);
        inner.clients.insert(identity, Arc::clone(&candidate));
        tracing::info!(source = %provider, "default source switched");

        Ok(candidate)
    }

    /// Evicts one provider's cached clients, or every cached client.
    pub async fn clear_client_cache(&self, provider: Option<ProviderId>) {
        let mut inner = self.inner.write().await;
        match provider {
            Some(provider) => inner
                .clients
                .retain(|identity, _| identity.provider != provider),
            None => inner.clients.clear(),
        }
    }

    /// Last-known availability per provider: enabled in config, and either
    /// never constructed or not currently `Unhealthy`. Never probes.
    pub async fn available_sources(&self) -> BTreeMap<ProviderId, bool> {
        let inner = self.inner.read().await;
        ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, inner.is_available(provider)))
            .collect()
    }

    /// Health snapshot per provider, from cached clients only; a provider
    /// with no live cache entry reports the `Unknown` record.
    pub async fn health_report(&self) -> BTreeMap<ProviderId, crate::health::HealthRecord> {
        let inner = self.inner.read().await;
        ProviderId::ALL
            .into_iter()
            .map(|provider| {
                let identity = inner.store.identity(provider);
                let record = inner
                    .clients
                    .get(&identity)
                    .map(|client| client.health())
                    .unwrap_or_default();
                (provider, record)
            })
            .collect()
    }

    pub async fn is_akshare_available(&self) -> bool {
        self.inner.read().await.is_available(ProviderId::Akshare)
    }

    pub async fn is_tushare_available(&self) -> bool {
        self.inner.read().await.is_available(ProviderId::Tushare)
    }

    pub async fn default_source(&self) -> ProviderId {
        self.inner.read().await.store.default_source()
    }

    pub async fn source_config(&self, provider: ProviderId) -> SourceConfig {
        self.inner.read().await.store.source_config(provider)
    }

    /// Validated write-through to the config store. The next lookup rebuilds
    /// any cached client whose fingerprint the update invalidated.
    pub async fn update_source_config(
        &self,
        provider: ProviderId,
        config: SourceConfig,
    ) -> Result<(), SourceError> {
        let mut inner = self.inner.write().await;
        inner.store.update_source_config(provider, config)?;
        let identity = inner.store.identity(provider);
        inner.evict_stale(provider, &identity);
        Ok(())
    }

    pub async fn set_default_source(&self, provider: ProviderId) -> Result<(), SourceError> {
        self.inner.write().await.store.set_default_source(provider)
    }
}

impl FactoryInner {
    fn client_locked(
        &mut self,
        provider: ProviderId,
    ) -> Result<Arc<dyn DataClient>, SourceError> {
        let config = self.store.source_config(provider);
        if !config.enabled {
            return Err(SourceError::invalid_config(
                provider,
                "provider is disabled in the source configuration",
            ));
        }

        let identity = self.store.identity(provider);
        self.evict_stale(provider, &identity);

        if let Some(client) = self.clients.get(&identity) {
            return Ok(Arc::clone(client));
        }

        tracing::debug!(identity = %identity, "constructing provider client");
        let client = build_client(provider, &config, self.offline);
        self.clients.insert(identity, Arc::clone(&client));
        Ok(client)
    }

    /// Drops cached entries for `provider` whose identity no longer matches
    /// the live configuration.
    fn evict_stale(&mut self, provider: ProviderId, live: &ProviderIdentity) {
        self.clients
            .retain(|identity, _| identity.provider != provider || identity == live);
    }

    fn is_available(&self, provider: ProviderId) -> bool {
        let config = self.store.source_config(provider);
        if !config.enabled {
            return false;
        }
        // Every cached entry counts, not just the live-config identity: a
        // failed switch candidate sits under its own credential fingerprint
        // and its probe outcome is still the last known signal.
        self.clients
            .iter()
            .filter(|(identity, _)| identity.provider == provider)
            .all(|(_, client)| client.is_healthy())
    }
}

fn build_client(
    provider: ProviderId,
    config: &SourceConfig,
    offline: bool,
) -> Arc<dyn DataClient> {
    let http_client: Arc<dyn HttpClient> = if offline {
        Arc::new(NoopHttpClient)
    } else {
        Arc::new(ReqwestHttpClient::new())
    };
    let gate = RateGate::from_hint(config.rate_limit_hint);

    match provider {
        ProviderId::Akshare => Arc::new(AkshareClient::new(http_client, gate)),
        ProviderId::Tushare => Arc::new(TushareClient::new(
            config.token().map(str::to_owned),
            http_client,
            gate,
        )),
    }
}

/// Builder for a factory: config file location and transport mode.
pub struct SourceFactoryBuilder {
    config_path: PathBuf,
    offline: bool,
}

impl SourceFactoryBuilder {
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            offline: false,
        }
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Offline transports: every client serves deterministic fixture data.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn build(self) -> Result<SourceFactory, SourceError> {
        let store = SourceConfigStore::open(self.config_path)?;
        Ok(SourceFactory::with_store(store, self.offline))
    }
}

impl Default for SourceFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceErrorKind;

    fn offline_factory(dir: &tempfile::TempDir) -> SourceFactory {
        // Host-environment overlays would skew these scenarios.
        std::env::remove_var(crate::config::TUSHARE_TOKEN_ENV);
        std::env::remove_var(crate::config::DEFAULT_SOURCE_ENV);
        let store = SourceConfigStore::open(dir.path().join("sources.json"))
            .expect("fresh store");
        SourceFactory::with_store(store, true)
    }

    #[tokio::test]
    async fn current_client_is_cached_across_lookups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let first = factory.current_client().await.expect("default client");
        let second = factory.current_client().await.expect("default client");

        assert_eq!(first.id(), ProviderId::Akshare);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn credential_merge_invalidates_the_cached_client() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let before = factory
            .client(ProviderId::Tushare, Some("first-token"))
            .await
            .expect("client with token");
        let unchanged = factory
            .client(ProviderId::Tushare, None)
            .await
            .expect("same identity");
        assert!(Arc::ptr_eq(&before, &unchanged));

        let after = factory
            .client(ProviderId::Tushare, Some("second-token"))
            .await
            .expect("rebuilt client");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn switch_commits_pointer_and_persists_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let client = factory
            .switch_data_source(ProviderId::Tushare, Some("valid-token"))
            .await
            .expect("offline probe passes with a token");

        assert_eq!(client.id(), ProviderId::Tushare);
        assert_eq!(factory.default_source().await, ProviderId::Tushare);
        assert_eq!(
            factory.source_config(ProviderId::Tushare).await.token(),
            Some("valid-token")
        );

        let current = factory.current_client().await.expect("new default");
        assert!(Arc::ptr_eq(&client, &current));
    }

    #[tokio::test]
    async fn failed_switch_rolls_back_and_keeps_serving() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let error = factory
            .switch_data_source(ProviderId::Tushare, None)
            .await
            .expect_err("tushare without a token cannot validate");
        assert_eq!(error.kind(), SourceErrorKind::SwitchFailed);
        match &error {
            SourceError::SwitchFailed { cause, .. } => {
                assert_eq!(cause.kind(), SourceErrorKind::Authentication);
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        assert_eq!(factory.default_source().await, ProviderId::Akshare);
        assert!(factory
            .source_config(ProviderId::Tushare)
            .await
            .token()
            .is_none());

        // The failed candidate stays visible through availability.
        assert!(!factory.is_tushare_available().await);
        assert!(factory.is_akshare_available().await);

        let current = factory.current_client().await.expect("prior default");
        assert_eq!(current.id(), ProviderId::Akshare);
    }

    #[tokio::test]
    async fn availability_is_optimistic_before_first_use() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let availability = factory.available_sources().await;
        assert_eq!(availability.get(&ProviderId::Akshare), Some(&true));
        assert_eq!(availability.get(&ProviderId::Tushare), Some(&true));
    }

    #[tokio::test]
    async fn disabled_provider_is_unavailable_and_unbuildable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let mut config = factory.source_config(ProviderId::Tushare).await;
        config.enabled = false;
        config.credentials.clear();
        factory
            .update_source_config(ProviderId::Tushare, config)
            .await
            .expect("disable persists");

        assert!(!factory.is_tushare_available().await);
        let error = factory
            .client(ProviderId::Tushare, None)
            .await
            .expect_err("disabled provider");
        assert_eq!(error.kind(), SourceErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn clear_cache_forces_reconstruction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = offline_factory(&dir);

        let before = factory.current_client().await.expect("default client");
        factory.clear_client_cache(None).await;
        let after = factory.current_client().await.expect("rebuilt client");

        assert!(!Arc::ptr_eq(&before, &after));
    }
}
