//! Content health check: scans pages under a content root for common issues.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::pace;
use crate::error::ToolError;
use crate::jobs::{JobHandle, JobResult, LogLevel, ProgressEmitter};
use crate::tools::tool::{
    ParameterType, Parameters, Tool, ToolDefinition, ToolParameter, param_str, param_str_list,
    param_u64, require_str,
};

const CHECKS: [&str; 6] = [
    "missing-title",
    "missing-description",
    "broken-references",
    "stale-content",
    "missing-alt-text",
    "unpublished-changes",
];
const DEFAULT_CHECKS: [&str; 3] = ["missing-title", "missing-description", "broken-references"];
const DEFAULT_STALE_DAYS: u64 = 90;

const SECTIONS: [&str; 6] = ["en", "products", "services", "about", "blog", "contact"];
const PAGE_NAMES: [&str; 7] = ["index", "overview", "details", "faq", "pricing", "team", "careers"];
const PAGES_PER_SECTION: usize = 3;
const SEED: u64 = 42;

#[derive(Debug)]
struct SimulatedPage {
    path: String,
    title: Option<String>,
    description: Option<String>,
    broken_ref: Option<String>,
    days_since_modified: u64,
    image_without_alt: bool,
    unpublished_changes: bool,
}

impl SimulatedPage {
    fn issues(&self, checks: &[String], stale_days: u64) -> Vec<String> {
        let enabled = |name: &str| checks.iter().any(|c| c == name);
        let mut issues = Vec::new();

        if enabled("missing-title") && self.title.is_none() {
            issues.push("Missing page title".to_string());
        }
        if enabled("missing-description") && self.description.is_none() {
            issues.push("Missing meta description".to_string());
        }
        if let Some(target) = self.broken_ref.as_ref().filter(|_| enabled("broken-references")) {
            issues.push(format!("Contains broken reference to: {target}"));
        }
        if enabled("stale-content") && self.days_since_modified > stale_days {
            issues.push(format!(
                "Content is stale (last modified {} days ago)",
                self.days_since_modified
            ));
        }
        if enabled("missing-alt-text") && self.image_without_alt {
            issues.push("Image missing alt text".to_string());
        }
        if enabled("unpublished-changes") && self.unpublished_changes {
            issues.push("Has unpublished changes".to_string());
        }
        issues
    }
}

fn simulate_pages(root_path: &str) -> Vec<SimulatedPage> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut pages = Vec::with_capacity(SECTIONS.len() * PAGES_PER_SECTION);

    for section in SECTIONS {
        for i in 0..PAGES_PER_SECTION {
            let name = PAGE_NAMES[rng.gen_range(0..PAGE_NAMES.len())];
            let has_title = rng.gen_bool(0.8);
            let has_description = rng.gen_bool(0.7);
            let has_broken_ref = rng.gen_bool(0.15);
            let missing_asset = rng.gen_range(0..100);

            pages.push(SimulatedPage {
                path: format!("{root_path}/{section}/{name}-{i}"),
                title: has_title.then(|| format!("Page: {name}")),
                description: has_description.then(|| format!("Description for {name}")),
                broken_ref: has_broken_ref
                    .then(|| format!("/content/dam/missing-asset-{missing_asset}.jpg")),
                days_since_modified: rng.gen_range(0..200),
                image_without_alt: rng.gen_bool(0.3),
                unpublished_changes: rng.gen_bool(0.4),
            });
        }
    }
    pages
}

/// Reports missing metadata, broken references, and stale content per page.
#[derive(Debug)]
pub struct ContentHealthCheckTool {
    definition: ToolDefinition,
    delay: Duration,
}

impl ContentHealthCheckTool {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(100))
    }

    /// Use a custom per-page delay.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            definition: ToolDefinition {
                id: "content-health-check".to_string(),
                name: "Content Health Check".to_string(),
                description: "Scans content paths for common issues like missing properties, \
                              broken references, and stale content"
                    .to_string(),
                category: "Content".to_string(),
                icon: Some("health".to_string()),
                parameters: vec![
                    ToolParameter::new(
                        "root_path",
                        "Root Path",
                        "The content path to scan (e.g., /content/mysite)",
                        ParameterType::Path,
                    )
                    .required()
                    .with_default(json!("/content/we-retail")),
                    ToolParameter::new(
                        "checks",
                        "Checks to Run",
                        "Select which health checks to run",
                        ParameterType::Multiselect,
                    )
                    .with_options(CHECKS)
                    .with_default(json!(DEFAULT_CHECKS)),
                    ToolParameter::new(
                        "stale_days",
                        "Stale After (Days)",
                        "Content not modified in this many days is considered stale",
                        ParameterType::Number,
                    )
                    .with_default(json!(DEFAULT_STALE_DAYS)),
                    ToolParameter::new(
                        "dry_run",
                        "Dry Run",
                        "Only report issues, don't fix anything",
                        ParameterType::Boolean,
                    )
                    .with_default(json!(true)),
                ],
                destructive: false,
                requires_external_system: false,
            },
            delay,
        }
    }
}

impl Default for ContentHealthCheckTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ContentHealthCheckTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        self.definition.check_parameters(params)?;
        match param_str(params, "root_path") {
            Some(path) if path.starts_with("/content") => Ok(()),
            _ => Err("Root path must start with /content".to_string()),
        }
    }

    async fn execute(&self, job: &JobHandle, progress: &ProgressEmitter) -> Result<(), ToolError> {
        let params = job.parameters().await;
        let root_path = require_str(&params, "root_path")?;
        let checks = param_str_list(&params, "checks")
            .filter(|checks| !checks.is_empty())
            .unwrap_or_else(|| DEFAULT_CHECKS.iter().map(|c| c.to_string()).collect());
        let stale_days = param_u64(&params, "stale_days").unwrap_or(DEFAULT_STALE_DAYS);

        job.add_log(LogLevel::Info, format!("Starting content health check on: {root_path}"))
            .await?;
        job.add_log(LogLevel::Info, format!("Running checks: {}", checks.join(", ")))
            .await?;

        let pages = simulate_pages(root_path);
        job.set_total_items(pages.len() as u64).await?;
        progress.emit().await;

        for page in &pages {
            if job.is_cancelled().await {
                tracing::debug!(job_id = %job.id(), "Health check cancelled, stopping scan");
                return Ok(());
            }

            let issues = page.issues(&checks, stale_days);
            let details = json!({
                "title": page.title.clone().unwrap_or_default(),
                "issues": issues,
                "last_modified": format!("{} days ago", page.days_since_modified),
            });
            let result = if issues.is_empty() {
                JobResult::success(&page.path, "No issues found")
            } else {
                JobResult::error(&page.path, issues.join("; "))
            };
            job.add_result(result.with_details(details)).await?;

            pace(self.delay).await;
            progress.emit().await;
        }

        let job_state = job.snapshot().await;
        job.add_log(
            LogLevel::Info,
            format!(
                "Scan complete. Checked {} pages. Found {} with issues, {} healthy.",
                job_state.total_items, job_state.error_count, job_state.success_count
            ),
        )
        .await?;
        Ok(())
    }
}
