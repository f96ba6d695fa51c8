//! Asset report: inventory, metadata gaps, large files, and unused assets.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::{pace, seed_from};
use crate::error::ToolError;
use crate::jobs::{JobHandle, JobResult, LogLevel, ProgressEmitter};
use crate::tools::tool::{
    ParameterType, Parameters, Tool, ToolDefinition, ToolParameter, param_str, param_u64,
    require_str,
};

const REPORT_TYPES: [&str; 4] = ["inventory", "missing-metadata", "large-files", "unused-assets"];
const DEFAULT_THRESHOLD_MB: u64 = 10;

const FOLDERS: [(&str, &[&str]); 3] = [
    ("images", &["image/jpeg", "image/png", "image/gif", "image/svg+xml"]),
    ("documents", &["application/pdf", "application/msword", "text/plain"]),
    ("videos", &["video/mp4", "video/quicktime"]),
];

#[derive(Debug)]
struct SimulatedAsset {
    path: String,
    mime_type: &'static str,
    size_mb: f64,
    title: Option<String>,
    description: Option<String>,
    alt_text: Option<String>,
    reference_count: u32,
    days_since_modified: u32,
}

impl SimulatedAsset {
    fn missing_metadata(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        if self.alt_text.is_none() {
            missing.push("alt text");
        }
        missing
    }

    /// Top-level MIME type, e.g. `image`.
    fn kind(&self) -> &'static str {
        self.mime_type.split('/').next().unwrap_or(self.mime_type)
    }
}

fn extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "application/pdf" => ".pdf",
        "video/mp4" => ".mp4",
        _ => "",
    }
}

fn simulate_assets(dam_path: &str) -> Vec<SimulatedAsset> {
    let mut rng = StdRng::seed_from_u64(seed_from(dam_path));
    let mut assets = Vec::new();

    for (folder, mime_types) in FOLDERS {
        let count = rng.gen_range(5..15);
        for i in 0..count {
            let mime_type = mime_types[rng.gen_range(0..mime_types.len())];
            assets.push(SimulatedAsset {
                path: format!("{dam_path}/{folder}/asset-{i}{}", extension(mime_types[0])),
                mime_type,
                size_mb: rng.gen_range(0.0..50.0),
                title: rng.gen_bool(0.7).then(|| format!("Asset {i}")),
                description: rng.gen_bool(0.5).then(|| format!("Description for asset {i}")),
                alt_text: rng.gen_bool(0.6).then(|| format!("Alt text {i}")),
                reference_count: rng.gen_range(0..5),
                days_since_modified: rng.gen_range(0..365),
            });
        }
    }
    assets
}

/// Builds a report over simulated DAM assets.
#[derive(Debug)]
pub struct AssetReportTool {
    definition: ToolDefinition,
    delay: Duration,
}

impl AssetReportTool {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(30))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            definition: ToolDefinition {
                id: "asset-report".to_string(),
                name: "Asset Report".to_string(),
                description: "Generate reports on DAM assets including inventory, metadata gaps, \
                              and usage analysis"
                    .to_string(),
                category: "Assets".to_string(),
                icon: Some("document".to_string()),
                parameters: vec![
                    ToolParameter::new(
                        "dam_path",
                        "DAM Path",
                        "The DAM folder to analyze",
                        ParameterType::Path,
                    )
                    .required()
                    .with_default(json!("/content/dam/we-retail")),
                    ToolParameter::new(
                        "report_type",
                        "Report Type",
                        "Type of report to generate",
                        ParameterType::Select,
                    )
                    .required()
                    .with_options(REPORT_TYPES)
                    .with_default(json!("inventory")),
                    ToolParameter::new(
                        "file_size_threshold_mb",
                        "File Size Threshold (MB)",
                        "For large-files report, minimum size in MB",
                        ParameterType::Number,
                    )
                    .with_default(json!(DEFAULT_THRESHOLD_MB)),
                    ToolParameter::new(
                        "include_subfolders",
                        "Include Subfolders",
                        "Include assets in subfolders",
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

impl Default for AssetReportTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AssetReportTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        match param_str(params, "dam_path") {
            Some(path) if path.starts_with("/content/dam") => {}
            _ => return Err("DAM path must start with /content/dam".to_string()),
        }
        self.definition.check_parameters(params)
    }

    async fn execute(&self, job: &JobHandle, progress: &ProgressEmitter) -> Result<(), ToolError> {
        let params = job.parameters().await;
        let dam_path = require_str(&params, "dam_path")?;
        let report_type = require_str(&params, "report_type")?;
        let threshold = param_u64(&params, "file_size_threshold_mb").unwrap_or(DEFAULT_THRESHOLD_MB);

        job.add_log(
            LogLevel::Info,
            format!("Generating {report_type} report for: {dam_path}"),
        )
        .await?;

        let assets = simulate_assets(dam_path);
        job.set_total_items(assets.len() as u64).await?;
        progress.emit().await;

        let mut by_kind: BTreeMap<&str, u64> = BTreeMap::new();

        for asset in &assets {
            if job.is_cancelled().await {
                tracing::debug!(job_id = %job.id(), "Asset report cancelled");
                return Ok(());
            }

            let included = match report_type {
                "inventory" => {
                    *by_kind.entry(asset.kind()).or_default() += 1;
                    Some((
                        format!("{} - {:.2} MB", asset.mime_type, asset.size_mb),
                        json!({ "type": asset.mime_type, "size": format!("{:.2} MB", asset.size_mb) }),
                    ))
                }
                "missing-metadata" => {
                    let missing = asset.missing_metadata();
                    (!missing.is_empty()).then(|| {
                        (
                            format!("Missing: {}", missing.join(", ")),
                            json!({ "missing_fields": missing }),
                        )
                    })
                }
                "large-files" => (asset.size_mb >= threshold as f64).then(|| {
                    (
                        format!("{:.2} MB ({})", asset.size_mb, asset.mime_type),
                        json!({ "size": asset.size_mb, "type": asset.mime_type }),
                    )
                }),
                "unused-assets" => (asset.reference_count == 0).then(|| {
                    (
                        "No references found".to_string(),
                        json!({ "last_modified": format!("{} days ago", asset.days_since_modified) }),
                    )
                }),
                other => return Err(ToolError::failed(format!("Unknown report type: {other}"))),
            };

            let result = match included {
                Some((message, details)) => {
                    JobResult::success(&asset.path, message).with_details(details)
                }
                None => JobResult::skipped(
                    &asset.path,
                    format!("Not included in {report_type} report"),
                ),
            };
            job.add_result(result).await?;

            pace(self.delay).await;
            progress.emit().await;
        }

        if report_type == "inventory" {
            job.add_log(LogLevel::Info, "Asset breakdown by type:").await?;
            for (kind, count) in &by_kind {
                job.add_log(LogLevel::Info, format!("  {kind}: {count}")).await?;
            }
        }

        let state = job.snapshot().await;
        job.add_log(
            LogLevel::Info,
            format!(
                "Report complete. Total assets: {}, Included in report: {}",
                state.total_items, state.success_count
            ),
        )
        .await?;
        Ok(())
    }
}
