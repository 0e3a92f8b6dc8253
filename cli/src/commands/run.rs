// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `weave run`: host the event bridge over an in-process field.
//!
//! Field events arrive as newline-delimited JSON, one [`FieldEvent`] per
//! line, either from `--events FILE` or from stdin:
//!
//! ```text
//! {"event":"coherence-changed","payload":{"previous":72.0,"current":76.0}}
//! {"event":"sacred-event","payload":{"type":"oracle.consulted","data":{"response":"listen"}}}
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use weave_core::application::{DispatchReport, EventBridge, StepOutcome};
use weave_core::domain::field::{Field, FieldEvent};
use weave_core::infrastructure::integrations::registrations_from_config;
use weave_core::infrastructure::local_field::LocalField;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read events from FILE instead of stdin
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Coherence the local field starts at
    #[arg(long, default_value = "0")]
    pub initial_coherence: f64,
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;

    let field = Arc::new(LocalField::new(args.initial_coherence, config.spec.bridge.event_buffer));
    let bridge = EventBridge::new(config.spec.bridge.clone());
    let active = bridge
        .initialize(
            Arc::clone(&field) as Arc<dyn Field>,
            registrations_from_config(&config.spec),
        )
        .await
        .context("Failed to start event bridge")?;

    if active.is_empty() {
        println!("{}", "⚠ No integrations are active; events will only be logged".yellow());
    } else {
        println!("{}", "Active integrations:".bold());
        for integration in active.all() {
            println!("  {} {} ({})", "✓".green(), integration.name(), integration.kind());
        }
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event file {:?}", path))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let result = pump_events(&bridge, &field, reader).await;
    bridge.shutdown().await;

    let summary = result?;
    println!(
        "{}",
        format!(
            "✓ {} events dispatched, {} adapter calls failed",
            summary.dispatched, summary.failed_steps
        )
        .green()
    );
    if summary.dropped > 0 {
        println!(
            "{}",
            format!(
                "⚠ {} events dropped; raise spec.bridge.event_buffer to keep up",
                summary.dropped
            )
            .yellow()
        );
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: usize,
    pub dispatched: usize,
    /// Emitted events the bridge listener lost to lag.
    pub dropped: usize,
    pub failed_steps: usize,
}

/// How often the pump re-checks for lost events while no report arrives.
const SETTLE_INTERVAL: Duration = Duration::from_millis(50);

/// Feed every line of `reader` into the field and wait until the bridge has
/// reported on each emitted event, or dropped it, or until Ctrl+C.
pub async fn pump_events(
    bridge: &EventBridge,
    field: &LocalField,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
) -> Result<RunSummary> {
    let mut reports = bridge.subscribe_reports()?;
    let mut lines = reader.lines();
    let mut summary = RunSummary::default();
    let mut line_number = 0usize;
    let mut input_done = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut settle = tokio::time::interval(SETTLE_INTERVAL);

    loop {
        summary.dropped = bridge.dropped_events() as usize;
        if input_done && summary.dispatched + summary.dropped >= summary.emitted {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if !input_done => {
                match line.context("Failed to read event input")? {
                    Some(line) => {
                        line_number += 1;
                        match parse_event_line(&line) {
                            Ok(Some(event)) => {
                                if field.emit(event) > 0 {
                                    summary.emitted += 1;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!(line = line_number, error = %e, "Skipping malformed event"),
                        }
                    }
                    None => {
                        debug!(lines = line_number, "Event input exhausted");
                        input_done = true;
                    }
                }
            }
            received = reports.recv() => match received {
                Ok(report) => {
                    summary.dispatched += 1;
                    summary.failed_steps += log_report(&report);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dispatch reports dropped");
                    summary.dispatched += skipped as usize;
                }
                Err(RecvError::Closed) => break,
            },
            _ = settle.tick(), if input_done => {}
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C signal");
                break;
            }
        }
    }

    Ok(summary)
}

/// Blank lines and `#` comments yield `None`.
pub fn parse_event_line(line: &str) -> Result<Option<FieldEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let event = serde_json::from_str(trimmed).context("Invalid field event")?;
    Ok(Some(event))
}

/// Log one report and return how many of its steps did not succeed.
fn log_report(report: &DispatchReport) -> usize {
    let failures = report.failures();
    if failures.is_empty() {
        info!(event = report.event, operations = ?report.operations(), "Event dispatched");
    }
    for step in &failures {
        match &step.outcome {
            StepOutcome::Failed(reason) => warn!(
                event = report.event,
                integration = %step.integration,
                operation = step.operation,
                error = %reason,
                "Dispatch step failed"
            ),
            StepOutcome::TimedOut(after) => warn!(
                event = report.event,
                integration = %step.integration,
                operation = step.operation,
                timeout_ms = after.as_millis() as u64,
                "Dispatch step timed out"
            ),
            StepOutcome::Succeeded => {}
        }
    }
    failures.len()
}
