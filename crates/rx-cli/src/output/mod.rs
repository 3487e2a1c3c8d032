//! Output formatting utilities for the CLI
//!
//! Tables for the executable listing, the client status display, execution
//! results, and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use rx_core::{Executable, ExecutionOutput, SessionView};

/// Format the session's executables as an ASCII table
///
/// IDs are printed whole so they can be passed back to `rexec exec`.
/// Returns "No executables deployed" if the list is empty.
pub fn format_executables(executables: &[Executable]) -> String {
    if executables.is_empty() {
        return "No executables deployed".to_string();
    }

    #[derive(Tabled)]
    struct ExecutableRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
    }

    let rows: Vec<ExecutableRow> = executables
        .iter()
        .map(|e| ExecutableRow {
            id: e.id.to_string(),
            name: truncate(&e.name, 40),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format the client state as a human-readable string
pub fn format_status(view: &SessionView) -> String {
    let mut output = String::new();

    output.push_str(&format!("Phase: {}\n", view.phase));
    output.push_str(&format!(
        "Connection: {}\n",
        view.connection_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    output.push_str(&format!(
        "User: {}\n",
        match (&view.username, view.is_authenticated()) {
            (Some(user), true) => user.clone(),
            (Some(user), false) => format!("{} (not logged in)", user),
            (None, _) => "-".to_string(),
        }
    ));
    if view.is_authenticated() {
        output.push_str(&format!("Executables: {}\n", view.executables().len()));
    }
    if let Some(error) = &view.last_error {
        output.push_str(&format!("Last error ({}): {}\n", error.kind, error.message));
    }

    output
}

/// One-line summary of an execution result
pub fn format_exit(output: &ExecutionOutput) -> String {
    if output.exit_code == 0 {
        "Exited successfully".to_string()
    } else {
        format!("Exited with code {}", output.exit_code)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
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

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
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

/// Print a warning message in yellow
///
/// Outputs to stderr.
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
    use rx_core::{ErrorKind, LastError, Phase, Session};

    #[test]
    fn test_format_executables_empty() {
        assert_eq!(format_executables(&[]), "No executables deployed");
    }

    #[test]
    fn test_format_executables_table() {
        let table = format_executables(&[
            Executable::new("e1", "build"),
            Executable::new("e2", "deploy-site"),
        ]);
        assert!(table.contains("ID"));
        assert!(table.contains("NAME"));
        assert!(table.contains("deploy-site"));
    }

    #[test]
    fn test_format_executables_keeps_full_id() {
        let id = "6f1c2a9e-4b7d-4e2a-9c55-0d3e8f7a1b20";
        let name = "a-deliberately-long-executable-name-that-overflows";
        let table = format_executables(&[Executable::new(id, name)]);
        assert!(table.contains(id));
        assert!(table.contains(&truncate(name, 40)));
        assert!(!table.contains(name));
    }

    #[test]
    fn test_format_status_authenticated() {
        let view = SessionView {
            phase: Phase::Authenticated,
            ready: true,
            connection_id: Some("c1".into()),
            session: Some(Session::from_listing(vec![Executable::new("e1", "a")])),
            username: Some("alice".to_string()),
            ..Default::default()
        };
        let status = format_status(&view);
        assert!(status.contains("Phase: authenticated"));
        assert!(status.contains("Connection: c1"));
        assert!(status.contains("User: alice\n"));
        assert!(status.contains("Executables: 1"));
    }

    #[test]
    fn test_format_status_shows_last_error() {
        let view = SessionView {
            phase: Phase::Identified,
            last_error: Some(LastError::new(ErrorKind::Authentication, "bad password")),
            ..Default::default()
        };
        assert!(format_status(&view).contains("Last error (authentication): bad password"));
    }

    #[test]
    fn test_format_exit() {
        let ok = ExecutionOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(format_exit(&ok), "Exited successfully");
        let failed = ExecutionOutput { exit_code: 2, ..ok };
        assert_eq!(format_exit(&failed), "Exited with code 2");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-identifier", 10), "a-very-...");
    }
}
