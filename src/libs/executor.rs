// This module walks an `InstallPlan` in order and turns every step into an
// `ActionOutcome`. It is the only part of the tool that changes the host.
//
// Per step:
// - `AlreadySatisfied` steps are recorded as skipped without running anything,
//   even when a dependency failed or the run was aborted.
// - Steps that depend (directly or through a blocked step) on a failed step
//   are skipped as blocked.
// - Otherwise artifacts are written, then the command runs with the step's
//   timeout through the `CommandRunner`.
//
// A failed non-critical step is recorded and the walk continues. A failed
// critical step aborts the run: nothing after it executes, and every remaining
// step is recorded as blocked (if it depends on a broken step) or aborted.

use crate::libs::utilities::command_runner::{CommandRunner, RunError};
use crate::schemas::plan::{InstallPlan, PlannedStep, RenderedArtifact, StepDisposition};
use crate::schemas::report::{ActionOutcome, OutcomeStatus, ProvisionReport, ProvisionStatus, SkipReason};
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::Utc;
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Progress notifications emitted while the plan is walked.
#[derive(Debug)]
pub enum ExecutionEvent<'a> {
    /// A step's command is about to run. `position` is 1-based.
    Started {
        step: &'a PlannedStep,
        position: usize,
        total: usize,
    },
    /// A step has its final outcome, whether it ran or not.
    Finished { outcome: &'a ActionOutcome },
}

/// Executes `plan` strictly in order.
///
/// Never fails: every per-step problem (non-zero exit, timeout, spawn failure,
/// artifact write error) becomes a `Failed` outcome in the report.
pub fn execute(
    plan: &InstallPlan,
    runner: &dyn CommandRunner,
    on_event: &mut dyn FnMut(ExecutionEvent<'_>),
) -> ProvisionReport {
    let started_at = Utc::now();
    let total = plan.steps.len();
    let mut outcomes: Vec<ActionOutcome> = Vec::with_capacity(total);
    let mut broken: HashSet<&str> = HashSet::new();
    let mut aborted = false;

    for (index, step) in plan.steps.iter().enumerate() {
        let blocked = step.depends_on.iter().any(|id| broken.contains(id.as_str()));

        let (status, duration_ms) = if step.disposition == StepDisposition::AlreadySatisfied {
            log_info!("[Executor] '{}' is already satisfied.", step.id.blue());
            (skipped(SkipReason::AlreadySatisfied), 0)
        } else if blocked {
            log_warn!(
                "[Executor] Skipping '{}': a dependency did not complete.",
                step.id.yellow()
            );
            (skipped(SkipReason::BlockedByFailedDependency), 0)
        } else if aborted {
            (skipped(SkipReason::RunAborted), 0)
        } else {
            on_event(ExecutionEvent::Started {
                step,
                position: index + 1,
                total,
            });
            log_info!(
                "[Executor] ({}/{}) {}: {}",
                index + 1,
                total,
                step.id.bold(),
                step.description
            );
            run_step(step, runner)
        };

        if matches!(
            status,
            OutcomeStatus::Failed { .. }
                | OutcomeStatus::Skipped {
                    reason: SkipReason::BlockedByFailedDependency
                }
        ) {
            broken.insert(step.id.as_str());
        }

        if let OutcomeStatus::Failed { exit_code, stderr, timed_out } = &status {
            tracing::warn!(action = %step.id, duration_ms, exit_code = ?exit_code, timed_out, critical = step.critical, "action failed");
            if step.critical {
                log_error!(
                    "[Executor] Required action '{}' failed. Stopping the run.",
                    step.id.red()
                );
                aborted = true;
            } else {
                log_warn!(
                    "[Executor] Optional action '{}' failed; continuing.",
                    step.id.yellow()
                );
            }
            if !stderr.is_empty() {
                log_debug!("[Executor] stderr of '{}':\n{}", step.id, stderr);
            }
        } else {
            tracing::info!(action = %step.id, duration_ms, status = %status.label(), "action finished");
        }

        let outcome = ActionOutcome {
            action_id: step.id.clone(),
            description: step.description.clone(),
            follow_up: follow_up_for(step, &status),
            status,
            duration_ms,
            critical: step.critical,
            idempotent: step.idempotent,
        };
        on_event(ExecutionEvent::Finished { outcome: &outcome });
        outcomes.push(outcome);
    }

    let status = if aborted {
        ProvisionStatus::Aborted
    } else if outcomes.iter().any(|outcome| outcome.status.is_failed()) {
        ProvisionStatus::PartiallyFailed
    } else {
        ProvisionStatus::Complete
    };

    ProvisionReport {
        status,
        outcomes,
        unavailable: plan
            .unavailable
            .iter()
            .map(|entry| format!("{} ({})", entry.capability, entry.action))
            .collect(),
        started_at,
        finished_at: Utc::now(),
    }
}

fn skipped(reason: SkipReason) -> OutcomeStatus {
    OutcomeStatus::Skipped { reason }
}

/// Writes artifacts, then runs the command. Returns the status and elapsed time.
fn run_step(step: &PlannedStep, runner: &dyn CommandRunner) -> (OutcomeStatus, u64) {
    let start = Instant::now();
    let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

    for artifact in &step.artifacts {
        if let Err(message) = write_artifact(artifact) {
            log_error!("[Executor] {}", message);
            let status = OutcomeStatus::Failed {
                exit_code: None,
                stderr: message,
                timed_out: false,
            };
            return (status, elapsed(start));
        }
    }

    log_debug!("[Executor] Running: {}", step.invocation);
    let status = match runner.run(&step.invocation, step.timeout) {
        Ok(output) if output.success() => OutcomeStatus::Succeeded,
        Ok(output) => OutcomeStatus::Failed {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
            timed_out: false,
        },
        Err(RunError::Timeout(limit)) => OutcomeStatus::Failed {
            exit_code: None,
            stderr: format!("timed out after {}s and was killed", limit.as_secs()),
            timed_out: true,
        },
        Err(e @ (RunError::Spawn(_) | RunError::Wait(_))) => OutcomeStatus::Failed {
            exit_code: None,
            stderr: format!("{}: {e}", step.invocation.program),
            timed_out: false,
        },
    };
    (status, elapsed(start))
}

fn write_artifact(artifact: &RenderedArtifact) -> Result<(), String> {
    let path = Path::new(&artifact.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {}: {e}", parent.display()))?;
    }
    fs::write(path, &artifact.contents).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    log_debug!("[Executor] Wrote {}", path.display());
    Ok(())
}

/// Manual instruction for an outcome: the follow-up of an optional step that
/// did not complete, led by a cleanup notice when a non-idempotent step failed.
fn follow_up_for(step: &PlannedStep, status: &OutcomeStatus) -> Option<String> {
    let incomplete = match status {
        OutcomeStatus::Failed { .. } => true,
        OutcomeStatus::Skipped { reason } => *reason != SkipReason::AlreadySatisfied,
        OutcomeStatus::Succeeded => false,
    };
    let manual = (!step.critical && incomplete).then(|| {
        step.follow_up
            .clone()
            .unwrap_or_else(|| step.invocation.to_string())
    });
    if step.idempotent || !status.is_failed() {
        return manual;
    }

    let cleanup = format!(
        "Undo any partial changes made by `{}` before running setup-rexon again; it is not safe to repeat",
        step.invocation
    );
    Some(match manual {
        Some(manual) => format!("{cleanup}. Then: {manual}"),
        None => cleanup,
    })
}
