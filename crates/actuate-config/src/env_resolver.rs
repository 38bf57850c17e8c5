//! `${VAR}` / `${VAR:default}` references in settings files, with a prefix whitelist

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::env;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("env reference regex"));

static WHOLE_VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^}:]+)(?::([^}]*))?\}$").expect("env reference regex"));

/// Errors that can occur during environment variable resolution
#[derive(Debug, Error)]
pub enum EnvResolverError {
    #[error("Environment variable '{0}' not found and no default provided")]
    VarNotFound(String),
    #[error("Environment variable '{0}' is not in whitelist. Allowed prefixes: {1:?}")]
    VarNotWhitelisted(String, Vec<String>),
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable resolver with whitelist support
#[derive(Clone)]
pub struct EnvResolver {
    /// Allowed prefixes; empty means no restrictions
    allowed_prefixes: Vec<String>,
    lookup: Lookup,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new(vec!["ACTUATE_".to_string(), "APP_".to_string()])
    }
}

impl fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvResolver").field("allowed_prefixes", &self.allowed_prefixes).finish()
    }
}

impl EnvResolver {
    /// Create a resolver reading the process environment
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes, lookup: Arc::new(|name| env::var(name).ok()) }
    }

    /// Create a resolver with no restrictions (allow all variables)
    pub fn unrestricted() -> Self {
        Self::new(vec![])
    }

    /// Read variables from `lookup` instead of the process environment
    pub fn with_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Resolve references throughout a JSON value.
    ///
    /// A string that is exactly one reference is coerced to bool, number or
    /// JSON when its value parses as one. Substituted text is not rescanned.
    pub fn resolve(&self, value: &JsonValue) -> Result<JsonValue, EnvResolverError> {
        match value {
            JsonValue::String(s) => self.resolve_string(s),
            JsonValue::Object(obj) => {
                let mut resolved = serde_json::Map::with_capacity(obj.len());
                for (key, val) in obj {
                    resolved.insert(key.clone(), self.resolve(val)?);
                }
                Ok(JsonValue::Object(resolved))
            }
            JsonValue::Array(arr) => {
                arr.iter().map(|item| self.resolve(item)).collect::<Result<_, _>>().map(JsonValue::Array)
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, input: &str) -> Result<JsonValue, EnvResolverError> {
        if !input.contains("${") {
            return Ok(JsonValue::String(input.to_string()));
        }

        if let Some(caps) = WHOLE_VAR_REF.captures(input) {
            let value = self.value_for(&caps)?;
            return Ok(coerce(value));
        }

        let mut failure = None;
        let rendered = VAR_REF.replace_all(input, |caps: &Captures<'_>| {
            match self.value_for(caps) {
                Ok(value) => value,
                Err(err) => {
                    failure.get_or_insert(err);
                    String::new()
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(JsonValue::String(rendered.into_owned())),
        }
    }

    fn value_for(&self, caps: &Captures<'_>) -> Result<String, EnvResolverError> {
        let name = &caps[1];
        self.validate_var_name(name)?;
        match (self.lookup)(name) {
            Some(value) => Ok(value),
            None => caps
                .get(2)
                .map(|default| default.as_str().to_string())
                .ok_or_else(|| EnvResolverError::VarNotFound(name.to_string())),
        }
    }

    fn validate_var_name(&self, name: &str) -> Result<(), EnvResolverError> {
        if self.allowed_prefixes.is_empty()
            || self.allowed_prefixes.iter().any(|prefix| name.starts_with(prefix))
        {
            return Ok(());
        }
        Err(EnvResolverError::VarNotWhitelisted(name.to_string(), self.allowed_prefixes.clone()))
    }

    /// Check every reference against the whitelist without resolving
    pub fn validate_all_vars(&self, value: &JsonValue) -> Result<(), EnvResolverError> {
        match value {
            JsonValue::String(s) => {
                VAR_REF.captures_iter(s).try_for_each(|caps| self.validate_var_name(&caps[1]))
            }
            JsonValue::Object(obj) => obj.values().try_for_each(|v| self.validate_all_vars(v)),
            JsonValue::Array(arr) => arr.iter().try_for_each(|v| self.validate_all_vars(v)),
            _ => Ok(()),
        }
    }
}

fn coerce(value: String) -> JsonValue {
    if value.starts_with('{') || value.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str(&value) {
            return parsed;
        }
    }
    if let Ok(b) = value.parse::<bool>() {
        return JsonValue::Bool(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return JsonValue::Number(n);
        }
    }
    JsonValue::String(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn resolver(vars: &[(&str, &str)]) -> EnvResolver {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EnvResolver::default().with_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_whole_reference_is_typed() {
        let r = resolver(&[("ACTUATE_TIMEOUT", "5000"), ("ACTUATE_LENIENT", "true")]);
        assert_eq!(r.resolve(&json!("${ACTUATE_TIMEOUT}")).unwrap(), json!(5000));
        assert_eq!(r.resolve(&json!("${ACTUATE_LENIENT}")).unwrap(), json!(true));
        assert_eq!(r.resolve(&json!("${ACTUATE_RATIO:0.5}")).unwrap(), json!(0.5));
    }

    #[test]
    fn test_embedded_references_render_text() {
        let r = resolver(&[("APP_HOST", "db"), ("APP_PORT", "5432")]);
        let out = r.resolve(&json!({"url": "postgres://${APP_HOST}:${APP_PORT}/x", "n": 1})).unwrap();
        assert_eq!(out, json!({"url": "postgres://db:5432/x", "n": 1}));
    }

    #[test]
    fn test_default_value() {
        let r = resolver(&[]);
        assert_eq!(r.resolve(&json!("${ACTUATE_ENV:production}")).unwrap(), json!("production"));
        assert_eq!(r.resolve(&json!("${ACTUATE_EMPTY:}")).unwrap(), json!(""));
    }

    #[test]
    fn test_missing_variable_error() {
        let r = resolver(&[]);
        let err = r.resolve(&json!(["x-${ACTUATE_MISSING}"])).unwrap_err();
        assert!(matches!(err, EnvResolverError::VarNotFound(name) if name == "ACTUATE_MISSING"));
    }

    #[test]
    fn test_whitelist_validation() {
        let r = resolver(&[("HOME", "/root")]);
        assert!(matches!(
            r.resolve(&json!("${HOME}")),
            Err(EnvResolverError::VarNotWhitelisted(_, _))
        ));
        assert!(r.validate_all_vars(&json!({"a": "${ACTUATE_A}", "b": ["${APP_B:1}"]})).is_ok());
        assert!(r.validate_all_vars(&json!({"a": "${PATH}"})).is_err());
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let r = resolver(&[("ACTUATE_A", "${ACTUATE_B}"), ("ACTUATE_B", "b")]);
        assert_eq!(r.resolve(&json!("${ACTUATE_A}")).unwrap(), json!("${ACTUATE_B}"));
    }
}
