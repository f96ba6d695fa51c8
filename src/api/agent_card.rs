//! Agent card discovery document.
//!
//! Served at `/.well-known/agent-card.json` so agent clients can find the
//! tools this service exposes and how to drive them.

use serde::Serialize;
use serde_json::json;

use crate::tools::{ParameterType, ToolDefinition, ToolParameter};

pub const AGENT_NAME: &str = "Admin Tools Agent";
pub const PROTOCOL_VERSION: &str = "0.8";

#[derive(Debug, Clone, Serialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub protocol_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub tool_calls: bool,
    pub multi_turn: bool,
    pub input_types: Vec<String>,
    pub output_types: Vec<String>,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            tool_calls: true,
            multi_turn: false,
            input_types: vec!["text".into(), "structured".into()],
            output_types: vec!["text".into(), "structured".into(), "stream".into()],
        }
    }
}

/// One skill per registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<SkillParameter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl From<&ToolParameter> for SkillParameter {
    fn from(param: &ToolParameter) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.param_type,
            description: param.description.clone(),
            required: param.required,
            default: param.default.clone(),
            options: param.options.clone(),
        }
    }
}

impl From<&ToolDefinition> for AgentSkill {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.iter().map(SkillParameter::from).collect(),
        }
    }
}

impl AgentCard {
    /// Build the card for the given tools. `url` is the externally visible
    /// base URL, when known.
    pub fn new(definitions: &[ToolDefinition], url: Option<String>) -> Self {
        Self {
            name: AGENT_NAME.to_string(),
            description: "Administrative tools for content repositories. \
                Provides bulk content operations, asset reports, and health checks."
                .to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            url,
            capabilities: AgentCapabilities::default(),
            skills: definitions.iter().map(AgentSkill::from).collect(),
            metadata: json!({
                "category": "Content Administration",
                "external_system_integration": definitions
                    .iter()
                    .any(|def| def.requires_external_system),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ToolDefinition {
        ToolDefinition {
            id: "asset-report".into(),
            name: "Asset Report".into(),
            description: "Report on assets".into(),
            category: "Assets".into(),
            icon: None,
            parameters: vec![
                ToolParameter::new("dam_path", "DAM Path", "Root folder", ParameterType::Path)
                    .required(),
                ToolParameter::new("report_type", "Report", "Kind", ParameterType::Select)
                    .with_options(["inventory", "large-files"])
                    .with_default(json!("inventory")),
            ],
            destructive: false,
            requires_external_system: false,
        }
    }

    #[test]
    fn skills_mirror_tool_parameters() {
        let card = AgentCard::new(&[definition()], None);
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["protocol_version"], PROTOCOL_VERSION);
        assert!(json.get("url").is_none());
        assert_eq!(json["capabilities"]["streaming"], true);
        assert_eq!(json["capabilities"]["multi_turn"], false);

        let skill = &json["skills"][0];
        assert_eq!(skill["id"], "asset-report");
        assert_eq!(skill["parameters"][0]["type"], "path");
        assert_eq!(skill["parameters"][0]["required"], true);
        assert!(skill["parameters"][0].get("options").is_none());
        assert_eq!(skill["parameters"][1]["options"][1], "large-files");
        assert_eq!(skill["parameters"][1]["default"], "inventory");
    }

    #[test]
    fn empty_registry_has_no_skills() {
        let card = AgentCard::new(&[], Some("http://localhost:8080".into()));
        assert!(card.skills.is_empty());
        assert_eq!(card.url.as_deref(), Some("http://localhost:8080"));
    }
}
