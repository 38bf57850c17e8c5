use crate::env_resolver::EnvResolver;
use crate::error::{ConfigError, ConfigResult};
use crate::settings::FileFormat;
use actuate_core::{
    ActionDefinition, ActionId, ActionRecord, ApplicationId, ApplicationRecord, DatasourceRecord,
    PluginKind,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Action entry as written in a definitions file; `baseId` defaults to `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    pub id: ActionId,
    #[serde(default)]
    pub base_id: Option<ActionId>,
    pub application_id: ApplicationId,
    #[serde(default)]
    pub branch_name: Option<String>,
    pub name: String,
    pub plugin: PluginKind,
    pub unpublished: ActionDefinition,
    #[serde(default)]
    pub published: Option<ActionDefinition>,
}

impl From<ActionEntry> for ActionRecord {
    fn from(entry: ActionEntry) -> Self {
        ActionRecord {
            base_id: entry.base_id.unwrap_or_else(|| entry.id.clone()),
            id: entry.id,
            application_id: entry.application_id,
            branch_name: entry.branch_name,
            name: entry.name,
            plugin: entry.plugin,
            unpublished: entry.unpublished,
            published: entry.published,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
    #[serde(default)]
    datasources: Vec<DatasourceRecord>,
    #[serde(default)]
    actions: Vec<ActionEntry>,
}

/// Validated set of definitions ready to seed a store
#[derive(Debug, Clone, Default)]
pub struct DefinitionManifest {
    pub applications: Vec<ApplicationRecord>,
    pub datasources: Vec<DatasourceRecord>,
    pub actions: Vec<ActionRecord>,
}

/// Loads `{applications, datasources, actions}` definition files
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    resolver: EnvResolver,
}

impl ManifestLoader {
    pub fn new(resolver: EnvResolver) -> Self {
        Self { resolver }
    }

    /// Load definitions from a file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<DefinitionManifest> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let manifest = self.parse_content(&content, FileFormat::from_path(path)?)?;
        tracing::info!(
            path = %path.display(),
            applications = manifest.applications.len(),
            datasources = manifest.datasources.len(),
            actions = manifest.actions.len(),
            "Loaded definitions"
        );
        Ok(manifest)
    }

    /// Parse definitions content directly. Env references are resolved, so
    /// credentials can stay out of the file.
    pub fn parse_content(&self, content: &str, format: FileFormat) -> ConfigResult<DefinitionManifest> {
        let raw = format.parse(content)?;
        let resolved = self.resolver.resolve(&raw)?;
        let raw: RawManifest = serde_json::from_value(resolved)?;
        let manifest = DefinitionManifest {
            applications: raw.applications,
            datasources: raw.datasources,
            actions: raw.actions.into_iter().map(ActionRecord::from).collect(),
        };
        validate(&manifest)?;
        Ok(manifest)
    }
}

fn validate(manifest: &DefinitionManifest) -> ConfigResult<()> {
    let applications: HashMap<&ApplicationId, &ApplicationRecord> =
        manifest.applications.iter().map(|a| (&a.id, a)).collect();
    let datasources: HashSet<_> = manifest.datasources.iter().map(|d| &d.id).collect();
    let mut action_ids = HashSet::new();

    for action in &manifest.actions {
        if !action_ids.insert(&action.id) {
            return Err(ConfigError::Validation(format!("Duplicate action id '{}'", action.id)));
        }
        let app = applications.get(&action.application_id).ok_or_else(|| {
            ConfigError::Validation(format!(
                "Action '{}' references non-existent application '{}'",
                action.id, action.application_id
            ))
        })?;
        if let Some(branch) = action.branch_name.as_deref() {
            if !app.has_branch(branch) && !app.is_default_branch(branch) {
                return Err(ConfigError::Validation(format!(
                    "Action '{}' is on branch '{}' which application '{}' does not have",
                    action.id, branch, app.id
                )));
            }
        }
        let definitions = std::iter::once(&action.unpublished).chain(action.published.as_ref());
        for definition in definitions {
            if !datasources.contains(&definition.datasource_id) {
                return Err(ConfigError::Validation(format!(
                    "Action '{}' references non-existent datasource '{}'",
                    action.id, definition.datasource_id
                )));
            }
        }
    }

    for action in manifest.actions.iter().filter(|a| !a.is_default_line()) {
        if !action_ids.contains(&action.base_id) {
            return Err(ConfigError::Validation(format!(
                "Branch action '{}' references non-existent base action '{}'",
                action.id, action.base_id
            )));
        }
    }
    Ok(())
}
