//! Tool contract: metadata, parameter validation, and execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::jobs::{JobHandle, ProgressEmitter};

/// Caller-supplied job parameters, keyed by parameter name.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Input widget / value type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Path,
    Number,
    Boolean,
    Select,
    Multiselect,
}

/// Description of one tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Allowed values for `Select` / `Multiselect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: description.into(),
            param_type,
            required: false,
            default: None,
            options: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `params` carries a usable value for this parameter.
    fn is_present(&self, params: &Parameters) -> bool {
        match params.get(&self.name) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

/// Tool metadata shown to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub parameters: Vec<ToolParameter>,
    /// The tool modifies content.
    pub destructive: bool,
    /// The tool needs a live external content system to do real work.
    pub requires_external_system: bool,
}

impl ToolDefinition {
    /// Check that every required parameter is present and every select value
    /// is one of the declared options.
    pub fn check_parameters(&self, params: &Parameters) -> Result<(), String> {
        for param in &self.parameters {
            if param.required && !param.is_present(params) {
                return Err(format!("{} is required", param.label));
            }
            let (Some(options), Some(value)) = (&param.options, params.get(&param.name)) else {
                continue;
            };
            let allowed = |v: &str| options.iter().any(|o| o == v);
            match (param.param_type, value) {
                (ParameterType::Select, serde_json::Value::String(v)) if !allowed(v.as_str()) => {
                    return Err(format!("{} must be one of: {}", param.label, options.join(", ")));
                }
                (ParameterType::Multiselect, serde_json::Value::Array(items)) => {
                    if let Some(bad) = items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .find(|v| !allowed(*v))
                    {
                        return Err(format!("{} has unknown option: {bad}", param.label));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A pluggable unit of long-running work.
///
/// `execute` drives a job through its [`JobHandle`]: it appends results and
/// log lines and calls [`ProgressEmitter::emit`] whenever observers should
/// see the new state. Cancellation is cooperative: implementations must
/// re-check [`JobHandle::is_cancelled`] between units of work and return as
/// soon as it reports `true`.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Static metadata for this tool.
    fn definition(&self) -> &ToolDefinition;

    /// Unique tool identifier.
    fn id(&self) -> &str {
        &self.definition().id
    }

    /// Validate parameters before a job is created. `Err` carries a
    /// human-readable message.
    fn validate(&self, params: &Parameters) -> Result<(), String> {
        self.definition().check_parameters(params)
    }

    /// Run the tool. Returning `Err` (or panicking) fails the job.
    async fn execute(&self, job: &JobHandle, progress: &ProgressEmitter) -> Result<(), ToolError>;
}

/// Read a non-blank string parameter.
pub fn param_str<'a>(params: &'a Parameters, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
}

/// Read a required string parameter.
pub fn require_str<'a>(params: &'a Parameters, name: &str) -> Result<&'a str, ToolError> {
    param_str(params, name).ok_or_else(|| ToolError::failed(format!("missing parameter: {name}")))
}

/// Read a numeric parameter; accepts JSON numbers and numeric strings.
pub fn param_u64(params: &Parameters, name: &str) -> Option<u64> {
    match params.get(name)? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a boolean parameter; accepts JSON booleans and `"true"`/`"false"`.
pub fn param_bool(params: &Parameters, name: &str) -> Option<bool> {
    match params.get(name)? {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a list of strings; a single string is treated as a one-element list.
pub fn param_str_list(params: &Parameters, name: &str) -> Option<Vec<String>> {
    match params.get(name)? {
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        serde_json::Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}
