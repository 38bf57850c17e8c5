use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Nested map/sequence/scalar tree describing how to invoke a backend.
pub type ActionConfiguration = JsonValue;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an action. On a branch this is the branch copy's own id.
    ActionId
);
string_id!(ApplicationId);
string_id!(DatasourceId);
string_id!(
    /// Opaque deployment context selecting which datasource storage applies.
    EnvironmentId
);
string_id!(
    /// Plugin type key, e.g. `postgres` or `restapi`. Executors register under it.
    PluginKind
);

/// Whether the caller runs the published (viewer) or the draft (editor) copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Edit,
    View,
}

impl ViewMode {
    pub fn from_flag(view_mode: bool) -> Self {
        if view_mode {
            ViewMode::View
        } else {
            ViewMode::Edit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Edit => "edit",
            ViewMode::View => "view",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub name: String,
    /// Branch that stands for the default line. `None` for apps without version control.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
}

impl ApplicationRecord {
    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    pub fn is_default_branch(&self, branch: &str) -> bool {
        self.default_branch.as_deref() == Some(branch)
    }
}

/// One side (draft or published) of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub datasource_id: DatasourceId,
    #[serde(default)]
    pub configuration: ActionConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: ActionId,
    /// Id shared by every branch copy of this action; equals `id` on the default line.
    pub base_id: ActionId,
    pub application_id: ApplicationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    pub name: String,
    pub plugin: PluginKind,
    pub unpublished: ActionDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<ActionDefinition>,
}

impl ActionRecord {
    pub fn definition(&self, mode: ViewMode) -> Option<&ActionDefinition> {
        match mode {
            ViewMode::Edit => Some(&self.unpublished),
            ViewMode::View => self.published.as_ref(),
        }
    }

    pub fn is_default_line(&self) -> bool {
        self.id == self.base_id
    }
}

/// Connection config and credentials of a datasource in one environment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceStorage {
    #[serde(default)]
    pub config: JsonValue,
    #[serde(default)]
    pub credentials: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceRecord {
    pub id: DatasourceId,
    pub name: String,
    pub plugin: PluginKind,
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentId, DatasourceStorage>,
}

impl DatasourceRecord {
    pub fn storage_for(&self, environment: &EnvironmentId) -> Option<&DatasourceStorage> {
        self.environments.get(environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action() -> ActionRecord {
        ActionRecord {
            id: ActionId::new("a1"),
            base_id: ActionId::new("a1"),
            application_id: ApplicationId::new("app"),
            branch_name: None,
            name: "getUsers".into(),
            plugin: PluginKind::new("postgres"),
            unpublished: ActionDefinition {
                datasource_id: DatasourceId::new("ds"),
                configuration: json!({"body": "select 1"}),
                timeout_ms: None,
            },
            published: None,
        }
    }

    #[test]
    fn view_mode_reads_published_definition() {
        let mut record = action();
        assert!(record.definition(ViewMode::View).is_none());
        assert_eq!(record.definition(ViewMode::Edit).unwrap().configuration["body"], "select 1");

        let mut published = record.unpublished.clone();
        published.configuration = json!({"body": "select 2"});
        record.published = Some(published);
        assert_eq!(record.definition(ViewMode::View).unwrap().configuration["body"], "select 2");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let record = action();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["baseId"], json!("a1"));
        assert_eq!(value["plugin"], json!("postgres"));
        let back: ActionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
