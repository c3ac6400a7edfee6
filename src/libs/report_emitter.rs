// Human-readable rendering of plans and provisioning reports.
//
// Everything here is pure formatting: functions take the finished plan or
// report and return text, the command layer decides where it goes.

use crate::schemas::plan::{InstallPlan, StepDisposition};
use crate::schemas::report::{ActionOutcome, OutcomeStatus, ProvisionReport, ProvisionStatus, SkipReason};
use colored::Colorize;
use prettytable::{Cell, Row, Table, format};
use std::fmt::Write;

/// Captured stderr beyond this many lines is cut from the front.
const STDERR_TAIL_LINES: usize = 20;

/// Summarizes a finished run: status header, outcome table, outcomes grouped
/// by status, follow-up instructions and unavailable capabilities.
pub fn summarize(report: &ProvisionReport) -> String {
    let mut out = String::new();

    let incomplete = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }) || is_blocking_skip(o))
        .count();
    let status = match report.status {
        ProvisionStatus::Complete => report.status.to_string().green().bold(),
        ProvisionStatus::PartiallyFailed => report.status.to_string().yellow().bold(),
        ProvisionStatus::Aborted => report.status.to_string().red().bold(),
    };
    let _ = writeln!(
        out,
        "Provisioning {} ({} action(s), {} did not complete, {:.1}s)",
        status,
        report.outcomes.len(),
        incomplete,
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );

    if !report.outcomes.is_empty() {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(text_row(&["#", "Action", "Status", "Duration", "Required"]));
        for (i, outcome) in report.outcomes.iter().enumerate() {
            table.add_row(text_row(&[
                &(i + 1).to_string(),
                &outcome.action_id,
                &outcome.status.label(),
                &format!("{} ms", outcome.duration_ms),
                yes_no(outcome.critical),
            ]));
        }
        let _ = write!(out, "\n{table}");
    }

    let failed: Vec<&ActionOutcome> = report.outcomes.iter().filter(|o| o.status.is_failed()).collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\n{}", "Failed:".red().bold());
        for outcome in failed {
            let _ = writeln!(out, "  - {}: {} [{}]", outcome.action_id, outcome.description, outcome.status.label());
            if outcome.needs_cleanup() {
                let _ = writeln!(out, "      {}", "not idempotent: clean up its partial changes before re-running".yellow());
            }
            if let OutcomeStatus::Failed { stderr, .. } = &outcome.status {
                for line in stderr_tail(stderr) {
                    let _ = writeln!(out, "      {}", line.dimmed());
                }
            }
        }
    }

    for (title, reason) in [
        ("Blocked by a failed dependency:", SkipReason::BlockedByFailedDependency),
        ("Not run (aborted):", SkipReason::RunAborted),
        ("Already satisfied:", SkipReason::AlreadySatisfied),
    ] {
        let ids: Vec<&str> = report
            .outcomes
            .iter()
            .filter(|o| matches!(&o.status, OutcomeStatus::Skipped { reason: r } if *r == reason))
            .map(|o| o.action_id.as_str())
            .collect();
        if !ids.is_empty() {
            let _ = writeln!(out, "\n{}\n  {}", title.blue().bold(), ids.join(", "));
        }
    }

    let succeeded: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Succeeded)
        .map(|o| o.action_id.as_str())
        .collect();
    if !succeeded.is_empty() {
        let _ = writeln!(out, "\n{}\n  {}", "Succeeded:".green().bold(), succeeded.join(", "));
    }

    let follow_ups: Vec<&ActionOutcome> = report.outcomes.iter().filter(|o| o.follow_up.is_some()).collect();
    if !follow_ups.is_empty() {
        let _ = writeln!(out, "\n{}", "Follow-up (finish these manually):".cyan().bold());
        for outcome in follow_ups {
            let _ = writeln!(
                out,
                "  - {}: {}",
                outcome.action_id,
                outcome.follow_up.as_deref().unwrap_or_default()
            );
        }
    }

    if !report.unavailable.is_empty() {
        let _ = writeln!(out, "\n{}", "Unavailable on this system:".yellow().bold());
        for entry in &report.unavailable {
            let _ = writeln!(out, "  - {entry}");
        }
    }

    if report.status == ProvisionStatus::Aborted {
        let first_step = if report.outcomes.iter().any(ActionOutcome::needs_cleanup) {
            "Fix the failure above and clean up after it, then"
        } else {
            "Fix the failure above and"
        };
        let _ = writeln!(
            out,
            "\n{first_step} run `setup-rexon now` again; completed steps are detected and skipped."
        );
    }
    out
}

/// Renders a plan before execution (used by `plan` and `now --dry-run`).
pub fn describe_plan(plan: &InstallPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Install plan for {} ({} step(s))", plan.os_family.to_string().bold(), plan.steps.len());

    if !plan.steps.is_empty() {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(text_row(&["#", "Action", "Capability", "Status", "Required", "Command"]));
        for (i, step) in plan.steps.iter().enumerate() {
            let state = match step.disposition {
                StepDisposition::Execute => "will run",
                StepDisposition::AlreadySatisfied => "satisfied",
            };
            table.add_row(text_row(&[
                &(i + 1).to_string(),
                &step.id,
                &step.capability,
                state,
                yes_no(step.critical),
                &step.invocation.to_string(),
            ]));
        }
        let _ = write!(out, "\n{table}");
    }

    for entry in &plan.unavailable {
        let _ = writeln!(out, "  {} {} ({})", "unavailable:".yellow(), entry.capability, entry.action);
    }
    out
}

fn text_row(cells: &[&str]) -> Row {
    Row::new(cells.iter().map(|text| Cell::new(text)).collect())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn is_blocking_skip(outcome: &ActionOutcome) -> bool {
    matches!(
        outcome.status,
        OutcomeStatus::Skipped {
            reason: SkipReason::BlockedByFailedDependency | SkipReason::RunAborted
        }
    )
}

fn stderr_tail(stderr: &str) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines.into_iter().skip(skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::config::Invocation;
    use crate::schemas::environment::OsFamily;
    use crate::schemas::plan::{PlannedStep, UnavailableCapability};
    use chrono::Utc;
    use std::time::Duration;

    fn outcome(id: &str, status: OutcomeStatus, critical: bool, follow_up: Option<&str>) -> ActionOutcome {
        ActionOutcome {
            action_id: id.to_string(),
            description: format!("do {id}"),
            status,
            duration_ms: 5,
            critical,
            idempotent: true,
            follow_up: follow_up.map(str::to_string),
        }
    }

    fn report(status: ProvisionStatus, outcomes: Vec<ActionOutcome>) -> ProvisionReport {
        let now = Utc::now();
        ProvisionReport {
            status,
            outcomes,
            unavailable: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_complete_run_lists_every_action() {
        let text = summarize(&report(
            ProvisionStatus::Complete,
            vec![
                outcome("install-node", OutcomeStatus::Succeeded, true, None),
                outcome(
                    "install-git",
                    OutcomeStatus::Skipped { reason: SkipReason::AlreadySatisfied },
                    true,
                    None,
                ),
            ],
        ));
        assert!(text.contains("Complete"));
        assert!(text.contains("install-node"));
        assert!(text.contains("skipped (already satisfied)"));
        assert!(!text.contains("Follow-up"));
        assert!(!text.contains("Failed:"));
    }

    #[test]
    fn test_failures_show_stderr_and_follow_ups() {
        let mut summary = report(
            ProvisionStatus::PartiallyFailed,
            vec![
                outcome("install-rexon", OutcomeStatus::Succeeded, true, None),
                outcome(
                    "install-tunnel",
                    OutcomeStatus::Failed {
                        exit_code: Some(22),
                        stderr: "curl: (22) The requested URL returned error: 404".into(),
                        timed_out: false,
                    },
                    false,
                    Some("cloudflared tunnel login"),
                ),
            ],
        );
        summary.unavailable.push("ServiceConfigured(reverse_proxy) (configure-proxy)".into());
        let text = summarize(&summary);
        assert!(text.contains("PartiallyFailed"));
        assert!(text.contains("failed (exit 22)"));
        assert!(text.contains("returned error: 404"));
        assert!(text.contains("install-tunnel: cloudflared tunnel login"));
        assert!(text.contains("ServiceConfigured(reverse_proxy) (configure-proxy)"));
    }

    #[test]
    fn test_aborted_run_groups_skips_and_suggests_rerun() {
        let text = summarize(&report(
            ProvisionStatus::Aborted,
            vec![
                outcome(
                    "base-packages",
                    OutcomeStatus::Failed { exit_code: Some(100), stderr: String::new(), timed_out: false },
                    true,
                    None,
                ),
                outcome(
                    "install-node",
                    OutcomeStatus::Skipped { reason: SkipReason::BlockedByFailedDependency },
                    true,
                    None,
                ),
                outcome(
                    "install-tunnel",
                    OutcomeStatus::Skipped { reason: SkipReason::RunAborted },
                    false,
                    Some("sh -c 'curl ...'"),
                ),
            ],
        ));
        assert!(text.contains("Aborted"));
        assert!(text.contains("3 did not complete"));
        assert!(text.contains("Blocked by a failed dependency:"));
        assert!(text.contains("Not run (aborted):"));
        assert!(text.contains("install-tunnel: sh -c 'curl ...'"));
        assert!(text.contains("run `setup-rexon now` again"));
    }

    #[test]
    fn test_failed_non_idempotent_action_is_flagged_for_cleanup() {
        let mut migrate = outcome(
            "migrate-db",
            OutcomeStatus::Failed { exit_code: Some(1), stderr: "relation exists".into(), timed_out: false },
            true,
            Some("Undo any partial changes made by `rexon migrate` before running setup-rexon again"),
        );
        migrate.idempotent = false;
        let text = summarize(&report(ProvisionStatus::Aborted, vec![migrate]));
        assert!(text.contains("not idempotent: clean up its partial changes before re-running"));
        assert!(text.contains("migrate-db: Undo any partial changes made by `rexon migrate`"));
        assert!(text.contains("clean up after it, then run `setup-rexon now` again"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let long: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let tail: Vec<&str> = stderr_tail(&long).collect();
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail[0], "line 11");
        assert_eq!(tail.last(), Some(&"line 30"));
    }

    #[test]
    fn test_describe_plan_shows_commands_and_state() {
        let plan = InstallPlan {
            os_family: OsFamily::Debian,
            steps: vec![PlannedStep {
                id: "install-git".into(),
                description: "Install git".into(),
                capability: "git".into(),
                invocation: Invocation::new("apt-get", &["install", "-y", "git"]),
                artifacts: Vec::new(),
                idempotent: true,
                requires_privilege: true,
                depends_on: Vec::new(),
                critical: true,
                timeout: Duration::from_secs(60),
                follow_up: None,
                disposition: StepDisposition::AlreadySatisfied,
            }],
            unavailable: vec![UnavailableCapability {
                capability: "ServiceConfigured(tunnel)".into(),
                action: "install-tunnel".into(),
            }],
        };
        let text = describe_plan(&plan);
        assert!(text.contains("apt-get install -y git"));
        assert!(text.contains("satisfied"));
        assert!(text.contains("install-tunnel"));
    }
}
