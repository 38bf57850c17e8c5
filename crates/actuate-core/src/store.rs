use crate::error::CoreResult;
use crate::types::{
    ActionId, ActionRecord, ApplicationId, ApplicationRecord, DatasourceId, DatasourceRecord,
};
use async_trait::async_trait;

/// Async trait for storing and retrieving applications
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Insert or update an application record
    async fn upsert(&self, record: &ApplicationRecord) -> CoreResult<()>;
    /// Get an application by id
    async fn get(&self, id: &ApplicationId) -> CoreResult<Option<ApplicationRecord>>;
}

/// Async trait for storing and retrieving action records
#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Insert or update an action record
    async fn upsert(&self, record: &ActionRecord) -> CoreResult<()>;
    /// Get an action record by its own id (default line or branch copy)
    async fn get(&self, id: &ActionId) -> CoreResult<Option<ActionRecord>>;
    /// Get the copy of `base_id` living on `branch`
    async fn get_by_branch(&self, base_id: &ActionId, branch: &str)
        -> CoreResult<Option<ActionRecord>>;
}

/// Async trait for storing and retrieving datasources
#[async_trait]
pub trait DatasourceStore: Send + Sync {
    /// Insert or update a datasource record
    async fn upsert(&self, record: &DatasourceRecord) -> CoreResult<()>;
    /// Get a datasource by id
    async fn get(&self, id: &DatasourceId) -> CoreResult<Option<DatasourceRecord>>;
}
