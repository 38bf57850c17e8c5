use actuate_core::{
    store::{ActionRepository, ApplicationStore, DatasourceStore},
    ActionId, ActionRecord, ApplicationId, ApplicationRecord, CoreResult, DatasourceId,
    DatasourceRecord,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of ApplicationStore
#[derive(Debug, Clone, Default)]
pub struct MemoryApplicationStore {
    data: Arc<RwLock<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn upsert(&self, record: &ApplicationRecord) -> CoreResult<()> {
        let mut data = self.data.write().await;
        data.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &ApplicationId) -> CoreResult<Option<ApplicationRecord>> {
        let data = self.data.read().await;
        Ok(data.get(id).cloned())
    }
}

/// In-memory implementation of ActionRepository
#[derive(Debug, Clone, Default)]
pub struct MemoryActionRepository {
    data: Arc<RwLock<HashMap<ActionId, ActionRecord>>>,
}

impl MemoryActionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionRepository for MemoryActionRepository {
    async fn upsert(&self, record: &ActionRecord) -> CoreResult<()> {
        let mut data = self.data.write().await;
        data.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &ActionId) -> CoreResult<Option<ActionRecord>> {
        let data = self.data.read().await;
        Ok(data.get(id).cloned())
    }

    async fn get_by_branch(
        &self,
        base_id: &ActionId,
        branch: &str,
    ) -> CoreResult<Option<ActionRecord>> {
        let data = self.data.read().await;
        Ok(data
            .values()
            .find(|record| {
                record.base_id == *base_id && record.branch_name.as_deref() == Some(branch)
            })
            .cloned())
    }
}

/// In-memory implementation of DatasourceStore
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasourceStore {
    data: Arc<RwLock<HashMap<DatasourceId, DatasourceRecord>>>,
}

impl MemoryDatasourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasourceStore for MemoryDatasourceStore {
    async fn upsert(&self, record: &DatasourceRecord) -> CoreResult<()> {
        let mut data = self.data.write().await;
        data.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &DatasourceId) -> CoreResult<Option<DatasourceRecord>> {
        let data = self.data.read().await;
        Ok(data.get(id).cloned())
    }
}

/// The three in-memory stores bundled together, sharing nothing but a lifetime.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub applications: MemoryApplicationStore,
    pub actions: MemoryActionRepository,
    pub datasources: MemoryDatasourceStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a full set of definitions.
    pub async fn seed(
        &self,
        applications: &[ApplicationRecord],
        datasources: &[DatasourceRecord],
        actions: &[ActionRecord],
    ) -> CoreResult<()> {
        for record in applications {
            ApplicationStore::upsert(&self.applications, record).await?;
        }
        for record in datasources {
            DatasourceStore::upsert(&self.datasources, record).await?;
        }
        for record in actions {
            ActionRepository::upsert(&self.actions, record).await?;
        }
        tracing::debug!(
            applications = applications.len(),
            datasources = datasources.len(),
            actions = actions.len(),
            "Seeded memory store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_core::{ActionDefinition, PluginKind};
    use serde_json::json;

    fn action(id: &str, base: &str, branch: Option<&str>) -> ActionRecord {
        ActionRecord {
            id: ActionId::new(id),
            base_id: ActionId::new(base),
            application_id: ApplicationId::new("app"),
            branch_name: branch.map(str::to_string),
            name: "query".into(),
            plugin: PluginKind::new("postgres"),
            unpublished: ActionDefinition {
                datasource_id: DatasourceId::new("ds"),
                configuration: json!({"body": id}),
                timeout_ms: None,
            },
            published: None,
        }
    }

    #[tokio::test]
    async fn branch_lookup_matches_base_and_branch() {
        let repo = MemoryActionRepository::new();
        repo.upsert(&action("a1", "a1", None)).await.unwrap();
        repo.upsert(&action("a1-feat", "a1", Some("feature"))).await.unwrap();
        repo.upsert(&action("b1-feat", "b1", Some("feature"))).await.unwrap();

        let found = repo.get_by_branch(&ActionId::new("a1"), "feature").await.unwrap().unwrap();
        assert_eq!(found.id, ActionId::new("a1-feat"));
        assert!(repo.get_by_branch(&ActionId::new("a1"), "other").await.unwrap().is_none());
        assert!(repo.get_by_branch(&ActionId::new("b1"), "feature").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let store = MemoryDatasourceStore::new();
        let mut record = DatasourceRecord {
            id: DatasourceId::new("ds"),
            name: "Users DB".into(),
            plugin: PluginKind::new("postgres"),
            environments: Default::default(),
        };
        store.upsert(&record).await.unwrap();
        record.name = "Renamed".into();
        store.upsert(&record).await.unwrap();

        assert_eq!(store.get(&record.id).await.unwrap().unwrap().name, "Renamed");
        assert!(store.get(&DatasourceId::new("other")).await.unwrap().is_none());
    }
}
