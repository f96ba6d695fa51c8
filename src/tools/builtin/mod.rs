//! Built-in content administration tools.
//!
//! All three work against simulated content generated from a seeded RNG, so
//! the same parameters always produce the same results.

pub mod asset_report;
pub mod health_check;
pub mod tag_manager;

use std::sync::Arc;
use std::time::Duration;

pub use asset_report::AssetReportTool;
pub use health_check::ContentHealthCheckTool;
pub use tag_manager::BulkTagManagerTool;

use crate::error::ToolError;
use crate::tools::ToolRegistry;

/// Register every built-in tool with its default pacing.
pub fn register_builtin_tools(registry: &ToolRegistry) -> Result<(), ToolError> {
    registry.register_sync(Arc::new(ContentHealthCheckTool::new()))?;
    registry.register_sync(Arc::new(BulkTagManagerTool::new()))?;
    registry.register_sync(Arc::new(AssetReportTool::new()))?;
    Ok(())
}

/// Stable string hash for RNG seeds (31-multiplier polynomial).
pub(crate) fn seed_from(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// Per-item pause between simulated units of work.
pub(crate) async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
