//! Mustache-style binding substitution over configuration trees.
//!
//! Substitution is single-pass: text produced by a bound value is never scanned
//! again, so a value that itself looks like `{{ other }}` is emitted verbatim.
//! This keeps every substitution terminating regardless of binding contents.

use crate::params::Bindings;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder regex"));

static WHOLE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*([^{}]*?)\s*\}\}$").expect("whole placeholder regex"));

/// Any `{{ ... }}` left in literal text, e.g. one whose name contains a brace.
static STRAY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{\s*(.*?)\s*\}\}").expect("stray marker regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Unresolved binding '{{{{{placeholder}}}}}' at {path}")]
    Unresolved { placeholder: String, path: String },
}

/// How unresolved placeholders are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionMode {
    /// Fail on the first unresolved placeholder.
    #[default]
    Strict,
    /// Replace unresolved placeholders with an empty string and record a warning.
    Lenient,
}

/// Output of a substitution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Substituted<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

/// Traversal state shared by every node of one substitution pass.
pub struct Substitution<'a> {
    bindings: &'a Bindings,
    mode: SubstitutionMode,
    path: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> Substitution<'a> {
    pub fn new(bindings: &'a Bindings, mode: SubstitutionMode) -> Self {
        Self { bindings, mode, path: Vec::new(), warnings: Vec::new() }
    }

    pub fn mode(&self) -> SubstitutionMode {
        self.mode
    }

    /// Run `f` with `segment` pushed onto the current path.
    pub fn scoped<R>(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(segment.into());
        let result = f(self);
        self.path.pop();
        result
    }

    fn current_path(&self) -> String {
        if self.path.is_empty() {
            "$".to_string()
        } else {
            format!("$.{}", self.path.join("."))
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a JsonValue> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value);
        }
        // Fall back to a dotted path into object bindings: `user.name`.
        let mut segments = name.split('.');
        let mut current = self.bindings.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                JsonValue::Object(map) => map.get(segment)?,
                JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn unresolved(&mut self, placeholder: &str) -> Result<(), BindingError> {
        let path = self.current_path();
        match self.mode {
            SubstitutionMode::Strict => {
                Err(BindingError::Unresolved { placeholder: placeholder.to_string(), path })
            }
            SubstitutionMode::Lenient => {
                self.warnings
                    .push(format!("Unresolved binding '{{{{{}}}}}' at {} left empty", placeholder, path));
                Ok(())
            }
        }
    }

    /// Substitute inside one string leaf.
    ///
    /// Returns the bound value with its native type when the leaf is exactly
    /// one placeholder, otherwise a string with every placeholder rendered.
    pub fn render_str(&mut self, input: &str) -> Result<JsonValue, BindingError> {
        if !input.contains("{{") {
            return Ok(JsonValue::String(input.to_string()));
        }

        if let Some(caps) = WHOLE_PLACEHOLDER.captures(input) {
            let name = &caps[1];
            return match self.lookup(name) {
                Some(value) => Ok(value.clone()),
                None => {
                    self.unresolved(name)?;
                    Ok(JsonValue::String(String::new()))
                }
            };
        }

        Ok(JsonValue::String(self.render_embedded(input)?))
    }

    /// Substitute every placeholder in `input`, always producing a string.
    pub fn render_string(&mut self, input: &str) -> Result<String, BindingError> {
        if !input.contains("{{") {
            return Ok(input.to_string());
        }
        self.render_embedded(input)
    }

    fn render_embedded(&mut self, input: &str) -> Result<String, BindingError> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.render_literal(&input[last..whole.start()])?);
            match self.lookup(&caps[1]) {
                Some(value) => out.push_str(&stringify(value)),
                None => self.unresolved(&caps[1])?,
            }
            last = whole.end();
        }
        out.push_str(&self.render_literal(&input[last..])?);
        Ok(out)
    }

    /// Text between placeholders; a marker that is not a valid placeholder
    /// can never resolve.
    fn render_literal(&mut self, text: &str) -> Result<String, BindingError> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in STRAY_MARKER.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            self.unresolved(&caps[1])?;
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn finish<T>(self, value: T) -> Substituted<T> {
        Substituted { value, warnings: self.warnings }
    }
}

/// Render a bound value for concatenation into surrounding text.
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Names of every placeholder in a string, in order of appearance.
pub fn placeholders(input: &str) -> Vec<String> {
    PLACEHOLDER.captures_iter(input).map(|caps| caps[1].to_string()).collect()
}

/// A configuration shape the engine can walk.
///
/// Implementations return a new value of the same shape; the input is never
/// modified.
pub trait Substitute: Sized {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError>;
}

impl Substitute for JsonValue {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError> {
        match self {
            JsonValue::String(s) => ctx.render_str(s),
            JsonValue::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    let replaced = ctx.scoped(key.as_str(), |ctx| value.substitute_with(ctx))?;
                    out.insert(key.clone(), replaced);
                }
                Ok(JsonValue::Object(out))
            }
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    out.push(ctx.scoped(index.to_string(), |ctx| item.substitute_with(ctx))?);
                }
                Ok(JsonValue::Array(out))
            }
            other => Ok(other.clone()),
        }
    }
}

impl Substitute for String {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError> {
        ctx.render_string(self)
    }
}

impl<T: Substitute> Substitute for Vec<T> {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError> {
        let mut out = Vec::with_capacity(self.len());
        for (index, item) in self.iter().enumerate() {
            out.push(ctx.scoped(index.to_string(), |ctx| item.substitute_with(ctx))?);
        }
        Ok(out)
    }
}

impl<T: Substitute> Substitute for Option<T> {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError> {
        self.as_ref().map(|inner| inner.substitute_with(ctx)).transpose()
    }
}

impl<T: Substitute> Substitute for IndexMap<String, T> {
    fn substitute_with(&self, ctx: &mut Substitution<'_>) -> Result<Self, BindingError> {
        let mut out = IndexMap::with_capacity(self.len());
        for (key, value) in self {
            let replaced = ctx.scoped(key.as_str(), |ctx| value.substitute_with(ctx))?;
            out.insert(key.clone(), replaced);
        }
        Ok(out)
    }
}

/// Substitute `bindings` into any supported configuration shape.
pub fn substitute<T: Substitute>(
    node: &T,
    bindings: &Bindings,
    mode: SubstitutionMode,
) -> Result<Substituted<T>, BindingError> {
    let mut ctx = Substitution::new(bindings, mode);
    let value = node.substitute_with(&mut ctx)?;
    Ok(ctx.finish(value))
}
