//! Quit commands - one application or a whole candidate list.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use appquitter_core::{AttemptReport, BatchEvent, BatchResult, ProcessIdentity};
use chrono::Local;
use tracing::debug;

use crate::Engine;

pub async fn one(
    engine: &Engine,
    bundle_id: &str,
    pid: u32,
    name: Option<String>,
    force: bool,
    json: bool,
) -> Result<()> {
    let identity = ProcessIdentity::new(bundle_id, pid, name.unwrap_or_default())?;

    let report = if force {
        engine.force_quit_app(identity).await?
    } else {
        engine.quit_app(identity).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.message());
    }

    if !report.is_success() {
        if !force && report.state.can_escalate() {
            eprintln!("Hint: retry with `appquitter force-quit {} {}`", bundle_id, pid);
        }
        bail!("{} was not quit ({})", bundle_id, report.state);
    }
    Ok(())
}

pub async fn all(
    engine: &Engine,
    candidates: Option<&Path>,
    skip: &[String],
    json: bool,
) -> Result<()> {
    let candidates = read_candidates(candidates)?;
    for id in skip {
        engine.whitelist().add_to_session(id);
    }

    let mut handle = engine.quit_all(candidates);
    let mut result = None;
    while let Some(event) = handle.next_event().await {
        match event {
            BatchEvent::Progress { report, .. } => {
                if !json {
                    print_progress(&report);
                }
            }
            BatchEvent::Completed(done) => result = Some(done),
        }
    }
    let result = result.context("batch ended without a completion event")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    let failed = result.failed().count();
    if failed > 0 {
        bail!("{} application(s) could not be quit", failed);
    }
    Ok(())
}

/// Read a JSON array of candidates from a file, or from piped stdin.
fn read_candidates(path: Option<&Path>) -> Result<Vec<ProcessIdentity>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            if atty::is(atty::Stream::Stdin) {
                bail!("No candidates: pass --candidates FILE or pipe a JSON array on stdin");
            }
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let candidates: Vec<ProcessIdentity> =
        serde_json::from_str(&content).context("Failed to parse candidate list")?;
    debug!(count = candidates.len(), "Read candidate list");
    Ok(candidates)
}

fn print_progress(report: &AttemptReport) {
    let mark = if report.is_success() { "ok  " } else { "FAIL" };
    println!("[{}] {}", mark, report.message());
}

fn print_summary(result: &BatchResult) {
    let finished = result
        .completed_at
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("{}", "-".repeat(60));
    println!(
        "Processed {} of {} (skipped {} whitelisted): {} quit, {} failed, finished {}",
        result.processed_count(),
        result.total_candidates,
        result.filtered_count,
        result.succeeded().count(),
        result.failed().count(),
        finished
    );
}
