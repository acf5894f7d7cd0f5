//! Output formatting utilities for the CLI
//!
//! Tables for the swap plan, detection results and swap reports, plus
//! coloured status lines.

use tabled::{settings::Style, Table, Tabled};

use hs_core::traits::PlanEntry;
use hs_core::{ClientKind, HostRole};
use hs_swap::{Dispatch, IdentityReport, SwapReport, TowerAction, WaitOutcome};

/// Format the plan shown at the confirmation gate
pub fn format_plan(entries: &[PlanEntry]) -> String {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "STEP")]
        label: String,
        #[tabled(rename = "VALUE")]
        value: String,
    }

    let rows: Vec<PlanRow> = entries
        .iter()
        .map(|e| PlanRow {
            label: e.label.clone(),
            value: e.value.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// One detected host
pub struct Detection {
    pub role: HostRole,
    pub host: String,
    pub ledger: String,
    pub client: ClientKind,
}

/// Format detection results as a table
pub fn format_detection(rows: &[Detection]) -> String {
    #[derive(Tabled)]
    struct DetectionRow {
        #[tabled(rename = "ROLE")]
        role: String,
        #[tabled(rename = "HOST")]
        host: String,
        #[tabled(rename = "LEDGER")]
        ledger: String,
        #[tabled(rename = "CLIENT")]
        client: String,
    }

    let rows: Vec<DetectionRow> = rows
        .iter()
        .map(|d| DetectionRow {
            role: d.role.to_string(),
            host: d.host.clone(),
            ledger: d.ledger.clone(),
            client: d.client.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format the pubkeys gathered by the identity check
pub fn format_identity(report: &IdentityReport) -> String {
    #[derive(Tabled)]
    struct IdentityRow {
        #[tabled(rename = "SOURCE")]
        source: &'static str,
        #[tabled(rename = "PUBKEY")]
        pubkey: String,
    }

    let mut rows = vec![
        IdentityRow {
            source: "MAIN key file",
            pubkey: report.main_key.clone(),
        },
        IdentityRow {
            source: "SECONDARY key file",
            pubkey: report.secondary_key.clone(),
        },
    ];
    if let Some(running) = &report.running {
        rows.insert(
            0,
            IdentityRow {
                source: "MAIN voting",
                pubkey: running.clone(),
            },
        );
    }

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a completed swap
pub fn format_report(report: &SwapReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Dispatch: {}\n", format_dispatch(report)));
    output.push_str(&format!(
        "Tower: {}\n",
        match report.tower {
            TowerAction::Migrated => "migrated from MAIN",
            TowerAction::Cleaned => "stale files removed",
            TowerAction::Skipped => "left untouched",
        }
    ));
    output.push_str(&format!("MAIN set-identity: {}\n", format_wait(report.local_wait)));
    if let Some(status) = &report.remote_status {
        output.push_str(&format!("SECONDARY set-identity: {}\n", status));
    }

    output
}

fn format_dispatch(report: &SwapReport) -> String {
    match report.dispatch {
        Dispatch::Firedancer(mode) => format!("FD ({})", mode),
        Dispatch::Agave => "AGAVE".to_string(),
    }
}

fn format_wait(outcome: WaitOutcome) -> String {
    match outcome {
        WaitOutcome::Exited(Some(0)) => "exited cleanly".to_string(),
        WaitOutcome::Exited(Some(code)) => format!("exited with {}", code),
        WaitOutcome::Exited(None) => "killed by signal".to_string(),
        WaitOutcome::StillRunning => "still running".to_string(),
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_swap::SwapMode;

    #[test]
    fn test_plan_table_lists_every_entry() {
        let table = format_plan(&[
            PlanEntry::new("MAIN client", "FD"),
            PlanEntry::new("FD mode", "armed"),
        ]);
        assert!(table.contains("STEP"));
        assert!(table.contains("MAIN client"));
        assert!(table.contains("armed"));
    }

    #[test]
    fn test_identity_table_omits_voting_row_in_fast_mode() {
        let mut report = IdentityReport {
            running: Some("Vote111".into()),
            main_key: "Vote111".into(),
            secondary_key: "Vote111".into(),
        };
        let table = format_identity(&report);
        assert!(table.contains("MAIN voting"));
        assert!(table.contains("SECONDARY key file"));

        report.running = None;
        assert!(!format_identity(&report).contains("MAIN voting"));
    }

    #[test]
    fn test_report_mentions_mode_and_wait() {
        let report = SwapReport {
            dispatch: Dispatch::Firedancer(SwapMode::Sequential),
            tower: TowerAction::Cleaned,
            local_wait: WaitOutcome::StillRunning,
            remote_status: Some("DONE".into()),
            remote_command: "fdctl set-identity".into(),
            local_command: vec!["agave-validator".into()],
        };
        let text = format_report(&report);
        assert!(text.contains("FD (sequential)"));
        assert!(text.contains("still running"));
        assert!(text.contains("SECONDARY set-identity: DONE"));
    }
}
