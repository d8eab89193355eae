//! Recorded touch streams for offline replay.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vcontrols::TouchEvent;

/// One touch sample and when it happened, relative to the start of the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TouchEvent,
}

/// Parse a trace, rejecting samples that go back in time
pub fn parse(text: &str) -> Result<Vec<TraceStep>> {
    let steps: Vec<TraceStep> = serde_json::from_str(text).context("Failed to parse trace")?;
    for pair in steps.windows(2) {
        if pair[1].at_ms < pair[0].at_ms {
            anyhow::bail!(
                "Trace goes back in time: {} ms after {} ms",
                pair[1].at_ms,
                pair[0].at_ms
            );
        }
    }
    Ok(steps)
}

pub fn load(path: &Path) -> Result<Vec<TraceStep>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace {}", path.display()))?;
    parse(&text).with_context(|| format!("Invalid trace {}", path.display()))
}
