//! Bulk tag manager: find, add, remove, or replace a tag across pages.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde_json::json;

use super::{pace, seed_from};
use crate::error::ToolError;
use crate::jobs::{JobHandle, JobResult, LogLevel, ProgressEmitter};
use crate::tools::tool::{
    ParameterType, Parameters, Tool, ToolDefinition, ToolParameter, param_bool, param_str,
    require_str,
};

/// `namespace:path/segments`
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*:[a-z0-9_-]+(/[a-z0-9_-]+)*$").expect("valid tag pattern")
});

const SECTIONS: [&str; 4] = ["en", "us", "products", "experiences"];
const COMMON_TAG: &str = "common:category/featured";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Find,
    Add,
    Remove,
    Replace,
}

impl Operation {
    const NAMES: [&'static str; 4] = ["add", "remove", "replace", "find"];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "find" => Some(Self::Find),
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    fn needs_target(self) -> bool {
        matches!(self, Self::Add | Self::Replace)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug)]
struct SimulatedPage {
    path: String,
    has_tag: bool,
    tags: Vec<String>,
}

fn simulate_pages(root_path: &str, source_tag: &str) -> Vec<SimulatedPage> {
    let mut rng = StdRng::seed_from_u64(seed_from(source_tag));
    let mut pages = Vec::new();

    for section in SECTIONS {
        let count = rng.gen_range(2..7);
        for i in 0..count {
            pages.push(SimulatedPage {
                path: format!("{root_path}/{section}/page-{i}"),
                has_tag: rng.gen_bool(0.5),
                tags: vec![source_tag.to_string(), COMMON_TAG.to_string()],
            });
        }
    }
    pages
}

/// Outcome for one page. `target` is present for add/replace.
fn apply(
    op: Operation,
    page: &SimulatedPage,
    source: &str,
    target: Option<&str>,
    dry_run: bool,
) -> JobResult {
    let target = target.unwrap_or_default();
    let message = match op {
        Operation::Find => format!("Found tag: {source}"),
        Operation::Add if page.has_tag => {
            return JobResult::skipped(&page.path, format!("Page already has tag: {target}"));
        }
        Operation::Add if dry_run => format!("[DRY RUN] Would add tag: {target}"),
        Operation::Add => format!("Added tag: {target}"),
        Operation::Remove if dry_run => format!("[DRY RUN] Would remove tag: {source}"),
        Operation::Remove => format!("Removed tag: {source}"),
        Operation::Replace if dry_run => format!("[DRY RUN] Would replace {source} with {target}"),
        Operation::Replace => format!("Replaced {source} with {target}"),
    };
    JobResult::success(&page.path, message)
}

/// Applies one tag operation to every page under a root.
#[derive(Debug)]
pub struct BulkTagManagerTool {
    definition: ToolDefinition,
    delay: Duration,
}

impl BulkTagManagerTool {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(50))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            definition: ToolDefinition {
                id: "bulk-tag-manager".to_string(),
                name: "Bulk Tag Manager".to_string(),
                description: "Add, remove, or replace tags across multiple content pages".to_string(),
                category: "Content".to_string(),
                icon: Some("tag".to_string()),
                parameters: vec![
                    ToolParameter::new(
                        "operation",
                        "Operation",
                        "The tag operation to perform",
                        ParameterType::Select,
                    )
                    .required()
                    .with_options(Operation::NAMES)
                    .with_default(json!("find")),
                    ToolParameter::new(
                        "root_path",
                        "Root Path",
                        "The content path to scan",
                        ParameterType::Path,
                    )
                    .required()
                    .with_default(json!("/content/we-retail")),
                    ToolParameter::new(
                        "source_tag",
                        "Source Tag",
                        "The tag to find/remove/replace",
                        ParameterType::String,
                    )
                    .required()
                    .with_default(json!("we-retail:activity/hiking")),
                    ToolParameter::new(
                        "target_tag",
                        "Target Tag",
                        "The tag to add/replace with (for add/replace operations)",
                        ParameterType::String,
                    ),
                    ToolParameter::new(
                        "dry_run",
                        "Dry Run",
                        "Preview changes without making them",
                        ParameterType::Boolean,
                    )
                    .with_default(json!(true)),
                ],
                destructive: true,
                requires_external_system: false,
            },
            delay,
        }
    }
}

impl Default for BulkTagManagerTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BulkTagManagerTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        self.definition.check_parameters(params)?;

        let op = param_str(params, "operation")
            .and_then(Operation::parse)
            .ok_or_else(|| "Operation is required".to_string())?;
        let source = param_str(params, "source_tag").unwrap_or_default();
        if !TAG_PATTERN.is_match(source) {
            return Err(format!("Source tag must look like namespace:path, got '{source}'"));
        }

        match param_str(params, "target_tag") {
            None if op.needs_target() => {
                Err(format!("Target tag is required for {} operation", op.as_str()))
            }
            Some(target) if !TAG_PATTERN.is_match(target) => {
                Err(format!("Target tag must look like namespace:path, got '{target}'"))
            }
            _ => Ok(()),
        }
    }

    async fn execute(&self, job: &JobHandle, progress: &ProgressEmitter) -> Result<(), ToolError> {
        let params = job.parameters().await;
        let op_name = require_str(&params, "operation")?;
        let op = Operation::parse(op_name)
            .ok_or_else(|| ToolError::failed(format!("Unknown operation: {op_name}")))?;
        let root_path = require_str(&params, "root_path")?;
        let source = require_str(&params, "source_tag")?;
        let target = param_str(&params, "target_tag");
        let dry_run = param_bool(&params, "dry_run").unwrap_or(false);

        job.add_log(LogLevel::Info, format!("Starting bulk tag operation: {op_name}"))
            .await?;
        job.add_log(LogLevel::Info, format!("Root path: {root_path}")).await?;
        job.add_log(LogLevel::Info, format!("Source tag: {source}")).await?;
        if let Some(target) = target {
            job.add_log(LogLevel::Info, format!("Target tag: {target}")).await?;
        }
        if dry_run {
            job.add_log(LogLevel::Warn, "DRY RUN MODE - No changes will be made")
                .await?;
        }

        let pages = simulate_pages(root_path, source);
        job.set_total_items(pages.len() as u64).await?;
        progress.emit().await;

        for page in &pages {
            if job.is_cancelled().await {
                tracing::debug!(job_id = %job.id(), "Tag operation cancelled");
                return Ok(());
            }

            let result = apply(op, page, source, target, dry_run)
                .with_details(json!({ "current_tags": page.tags, "operation": op_name }));
            job.add_result(result).await?;

            pace(self.delay).await;
            progress.emit().await;
        }

        let state = job.snapshot().await;
        job.add_log(
            LogLevel::Info,
            format!(
                "Operation complete. Processed: {}, Success: {}, Skipped: {}, Errors: {}",
                state.processed_items, state.success_count, state.skipped_count, state.error_count
            ),
        )
        .await?;
        Ok(())
    }
}
