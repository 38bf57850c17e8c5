//! Resolves an action id, branch, environment and view mode into the concrete
//! action version and environment-bound datasource to run against.

use crate::error::{RuntimeError, RuntimeResult};
use actuate_config::CacheSettings;
use actuate_core::{
    ActionId, ActionRecord, ActionRepository, ApplicationId, ApplicationStore, DatasourceId,
    DatasourceStore, EnvironmentId, ResolvedContext, ViewMode,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Read access to the three definition stores
#[derive(Clone)]
pub struct DefinitionStores {
    pub applications: Arc<dyn ApplicationStore>,
    pub actions: Arc<dyn ActionRepository>,
    pub datasources: Arc<dyn DatasourceStore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextKey {
    action_id: ActionId,
    branch: Option<String>,
    environment_id: EnvironmentId,
    view_mode: ViewMode,
}

#[derive(Debug, Clone)]
struct ContextCacheEntry {
    context: Arc<ResolvedContext>,
    cached_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Store-backed resolver with a TTL cache of successful resolutions.
///
/// Failures are never cached. Invalidation hooks drop every entry touching
/// the changed record; an entry is served stale for at most the TTL otherwise.
pub struct ContextResolver {
    stores: DefinitionStores,
    default_environment: EnvironmentId,
    ttl: Duration,
    max_entries: usize,
    cache: RwLock<HashMap<ContextKey, ContextCacheEntry>>,
    /// Bumped by every invalidation so a resolution racing one is not cached
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContextResolver {
    pub fn new(
        stores: DefinitionStores,
        settings: &CacheSettings,
        default_environment: impl Into<EnvironmentId>,
    ) -> Self {
        Self {
            stores,
            default_environment: default_environment.into(),
            ttl: settings.ttl(),
            max_entries: settings.max_entries.max(1),
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_environment(&self) -> &EnvironmentId {
        &self.default_environment
    }

    /// Resolve the context for one invocation.
    ///
    /// An empty or absent branch selects the default line; an empty
    /// environment id selects the configured default environment.
    pub async fn resolve(
        &self,
        action_id: &ActionId,
        branch: Option<&str>,
        environment_id: &EnvironmentId,
        view_mode: ViewMode,
    ) -> RuntimeResult<Arc<ResolvedContext>> {
        let environment_id = if environment_id.as_str().trim().is_empty() {
            self.default_environment.clone()
        } else {
            environment_id.clone()
        };
        let key = ContextKey {
            action_id: action_id.clone(),
            branch: branch.map(str::trim).filter(|b| !b.is_empty()).map(str::to_string),
            environment_id,
            view_mode,
        };

        if let Some(context) = self.cached(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(action_id = %action_id, "Resolved context served from cache");
            return Ok(context);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation.load(Ordering::Acquire);
        let context = Arc::new(self.load(&key).await?);
        tracing::debug!(
            action_id = %key.action_id,
            resolved_action_id = %context.action.id,
            datasource_id = %context.datasource.id,
            environment_id = %context.environment_id,
            view_mode = view_mode.as_str(),
            "Resolved execution context"
        );
        self.store(key, context.clone(), generation).await;
        Ok(context)
    }

    async fn load(&self, key: &ContextKey) -> RuntimeResult<ResolvedContext> {
        let requested = self.stores.actions.get(&key.action_id).await?.ok_or_else(|| {
            RuntimeError::action_not_found(format!("No action with id '{}'", key.action_id))
        })?;
        let action = match key.branch.as_deref() {
            None => requested,
            Some(branch) => self.select_branch(requested, branch).await?,
        };

        let definition = action.definition(key.view_mode).cloned().ok_or_else(|| {
            RuntimeError::action_not_found(format!(
                "Action '{}' has no {} definition",
                action.id,
                match key.view_mode {
                    ViewMode::View => "published",
                    ViewMode::Edit => "draft",
                }
            ))
        })?;

        let datasource = self
            .stores
            .datasources
            .get(&definition.datasource_id)
            .await?
            .ok_or_else(|| RuntimeError::DatasourceNotFound(definition.datasource_id.clone()))?;
        let storage = datasource.storage_for(&key.environment_id).cloned().ok_or_else(|| {
            RuntimeError::EnvironmentNotConfigured {
                datasource: datasource.id.clone(),
                environment: key.environment_id.clone(),
            }
        })?;

        if action.plugin != datasource.plugin {
            tracing::warn!(
                action_id = %action.id,
                action_plugin = %action.plugin,
                datasource_plugin = %datasource.plugin,
                "Action plugin differs from its datasource plugin; datasource wins"
            );
        }

        Ok(ResolvedContext {
            action,
            definition,
            view_mode: key.view_mode,
            datasource,
            environment_id: key.environment_id.clone(),
            storage,
        })
    }

    /// Pick the copy of `requested` that lives on `branch`
    async fn select_branch(&self, requested: ActionRecord, branch: &str) -> RuntimeResult<ActionRecord> {
        if requested.branch_name.as_deref() == Some(branch) {
            return Ok(requested);
        }
        let application = self
            .stores
            .applications
            .get(&requested.application_id)
            .await?
            .ok_or_else(|| {
                RuntimeError::action_not_found(format!(
                    "Application '{}' of action '{}' does not exist",
                    requested.application_id, requested.id
                ))
            })?;

        if application.is_default_branch(branch) {
            if requested.is_default_line() {
                return Ok(requested);
            }
            return self.stores.actions.get(&requested.base_id).await?.ok_or_else(|| {
                RuntimeError::action_not_found(format!(
                    "No default-line action with id '{}'",
                    requested.base_id
                ))
            });
        }
        if !application.has_branch(branch) {
            return Err(RuntimeError::BranchNotFound {
                application: application.id,
                branch: branch.to_string(),
            });
        }
        self.stores.actions.get_by_branch(&requested.base_id, branch).await?.ok_or_else(|| {
            RuntimeError::action_not_found(format!(
                "Action '{}' does not exist on branch '{}'",
                requested.base_id, branch
            ))
        })
    }

    async fn cached(&self, key: &ContextKey) -> Option<Arc<ResolvedContext>> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.context.clone())
    }

    async fn store(&self, key: ContextKey, context: Arc<ResolvedContext>, generation: u64) {
        let mut cache = self.cache.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        if cache.len() >= self.max_entries && !cache.contains_key(&key) {
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.cached_at.elapsed() < ttl);
            if cache.len() >= self.max_entries {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, entry)| entry.cached_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    cache.remove(&oldest);
                }
            }
        }
        cache.insert(key, ContextCacheEntry { context, cached_at: Instant::now() });
    }

    async fn invalidate_where(&self, what: &str, predicate: impl Fn(&ContextKey, &ResolvedContext) -> bool) {
        let mut cache = self.cache.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = cache.len();
        cache.retain(|key, entry| !predicate(key, &entry.context));
        tracing::debug!(target_record = what, evicted = before - cache.len(), "Resolver cache invalidated");
    }

    /// Drop entries that requested or resolved to this action, or any copy sharing its base
    pub async fn invalidate_action(&self, action_id: &ActionId) {
        self.invalidate_where(action_id.as_str(), |key, context| {
            &key.action_id == action_id
                || &context.action.id == action_id
                || &context.action.base_id == action_id
        })
        .await;
    }

    pub async fn invalidate_datasource(&self, datasource_id: &DatasourceId) {
        self.invalidate_where(datasource_id.as_str(), |_, context| &context.datasource.id == datasource_id)
            .await;
    }

    /// Drop everything belonging to an application, e.g. after a branch is added or removed
    pub async fn invalidate_application(&self, application_id: &ApplicationId) {
        self.invalidate_where(application_id.as_str(), |_, context| {
            &context.action.application_id == application_id
        })
        .await;
    }

    pub async fn clear(&self) {
        self.invalidate_where("*", |_, _| true).await;
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_core::{
        ActionDefinition, ApplicationRecord, DatasourceRecord, DatasourceStorage, ErrorKind,
        PluginKind,
    };
    use actuate_store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn definition(datasource: &str) -> ActionDefinition {
        ActionDefinition {
            datasource_id: DatasourceId::new(datasource),
            configuration: json!({"body": "select 1"}),
            timeout_ms: None,
        }
    }

    fn action(id: &str, base: &str, branch: Option<&str>) -> ActionRecord {
        ActionRecord {
            id: ActionId::new(id),
            base_id: ActionId::new(base),
            application_id: ApplicationId::new("app"),
            branch_name: branch.map(str::to_string),
            name: "getUser".into(),
            plugin: PluginKind::new("postgres"),
            unpublished: definition("db"),
            published: Some(definition("db")),
        }
    }

    async fn resolver(settings: CacheSettings) -> (ContextResolver, MemoryStore) {
        let store = MemoryStore::new();
        let app = ApplicationRecord {
            id: ApplicationId::new("app"),
            name: "App".into(),
            default_branch: Some("main".into()),
            branches: vec!["main".into(), "feature".into(), "empty".into()],
        };
        let mut environments = BTreeMap::new();
        environments.insert(
            EnvironmentId::new("production"),
            DatasourceStorage { config: json!({"host": "prod"}), credentials: json!({}) },
        );
        let datasource = DatasourceRecord {
            id: DatasourceId::new("db"),
            name: "DB".into(),
            plugin: PluginKind::new("postgres"),
            environments,
        };
        store
            .seed(
                &[app],
                &[datasource],
                &[action("a1", "a1", None), action("a1-feature", "a1", Some("feature"))],
            )
            .await
            .unwrap();
        let stores = DefinitionStores {
            applications: Arc::new(store.applications.clone()),
            actions: Arc::new(store.actions.clone()),
            datasources: Arc::new(store.datasources.clone()),
        };
        (ContextResolver::new(stores, &settings, "production"), store)
    }

    fn prod() -> EnvironmentId {
        EnvironmentId::new("production")
    }

    #[tokio::test]
    async fn branch_selects_branch_copy() {
        let (resolver, _) = resolver(CacheSettings::default()).await;
        let ctx = resolver.resolve(&ActionId::new("a1"), Some("feature"), &prod(), ViewMode::Edit).await.unwrap();
        assert_eq!(ctx.action.id, ActionId::new("a1-feature"));

        let ctx = resolver.resolve(&ActionId::new("a1-feature"), Some("main"), &prod(), ViewMode::Edit).await.unwrap();
        assert_eq!(ctx.action.id, ActionId::new("a1"));

        let ctx = resolver.resolve(&ActionId::new("a1"), Some(""), &prod(), ViewMode::View).await.unwrap();
        assert_eq!(ctx.action.id, ActionId::new("a1"));
        assert_eq!(ctx.storage.config["host"], "prod");
    }

    #[tokio::test]
    async fn unknown_branch_and_missing_copy() {
        let (resolver, _) = resolver(CacheSettings::default()).await;
        let err = resolver.resolve(&ActionId::new("a1"), Some("nope"), &prod(), ViewMode::Edit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BranchNotFound);

        let err = resolver.resolve(&ActionId::new("a1"), Some("empty"), &prod(), ViewMode::Edit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionNotFound);
    }

    #[tokio::test]
    async fn environment_falls_back_to_default_and_must_exist() {
        let (resolver, _) = resolver(CacheSettings::default()).await;
        let ctx = resolver.resolve(&ActionId::new("a1"), None, &EnvironmentId::new(""), ViewMode::Edit).await.unwrap();
        assert_eq!(ctx.environment_id, prod());

        let err = resolver
            .resolve(&ActionId::new("a1"), None, &EnvironmentId::new("staging"), ViewMode::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EnvironmentNotConfigured);
        assert_eq!(resolver.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn view_mode_requires_published_definition() {
        let (resolver, store) = resolver(CacheSettings::default()).await;
        let mut draft_only = action("a2", "a2", None);
        draft_only.published = None;
        ActionRepository::upsert(&store.actions, &draft_only).await.unwrap();

        assert!(resolver.resolve(&ActionId::new("a2"), None, &prod(), ViewMode::Edit).await.is_ok());
        let err = resolver.resolve(&ActionId::new("a2"), None, &prod(), ViewMode::View).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionNotFound);
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let (resolver, store) = resolver(CacheSettings::default()).await;
        let id = ActionId::new("a1");
        resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap();
        resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap();
        let stats = resolver.stats().await;
        assert_eq!((stats.hits, stats.misses), (1, 1));

        let mut changed = action("a1", "a1", None);
        changed.unpublished.timeout_ms = Some(1234);
        ActionRepository::upsert(&store.actions, &changed).await.unwrap();
        assert_eq!(resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap().definition.timeout_ms, None);

        resolver.invalidate_action(&id).await;
        let ctx = resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap();
        assert_eq!(ctx.definition.timeout_ms, Some(1234));

        resolver.invalidate_datasource(&DatasourceId::new("db")).await;
        assert_eq!(resolver.stats().await.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let (resolver, _) = resolver(CacheSettings { ttl_secs: 5, max_entries: 1 }).await;
        let id = ActionId::new("a1");
        resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        resolver.resolve(&id, None, &prod(), ViewMode::Edit).await.unwrap();
        assert_eq!(resolver.stats().await.misses, 2);

        // Capacity of one: a second key replaces the first.
        resolver.resolve(&id, None, &prod(), ViewMode::View).await.unwrap();
        assert_eq!(resolver.stats().await.entries, 1);
    }
}
