//! Exec command implementation

use std::io::Write;

use anyhow::Result;

use rx_core::{ExecutableId, SessionView};

use crate::client::{open_client, require_session, ClientOptions};
use crate::output::{format_exit, print_error};

/// Find an executable by id, falling back to a unique name match
pub fn resolve_executable(view: &SessionView, target: &str) -> Result<ExecutableId> {
    let id = ExecutableId::new(target);
    if view.executables().iter().any(|e| e.id == id) {
        return Ok(id);
    }

    let mut by_name = view.executables().iter().filter(|e| e.name == target);
    match (by_name.next(), by_name.next()) {
        (Some(executable), None) => Ok(executable.id.clone()),
        (Some(_), Some(_)) => anyhow::bail!(
            "Several executables are named '{}'; use the id instead",
            target
        ),
        (None, _) => anyhow::bail!(
            "No executable '{}'. Run 'rexec list' to see what is deployed",
            target
        ),
    }
}

/// Run an executable and relay its output.
///
/// Returns the remote exit code.
pub async fn exec_command(options: &ClientOptions, target: &str, args: &[String]) -> Result<i32> {
    let client = open_client(options).await?;
    let view = client.view();

    let id = match require_session(&view).and_then(|_| resolve_executable(&view, target)) {
        Ok(id) => id,
        Err(e) => {
            client.close().await;
            return Err(e);
        }
    };

    let result = client
        .handle
        .execute_and_wait(&id, args, client.config.reply_timeout)
        .await;
    client.close().await;

    let output = result?;
    let mut stdout = std::io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    let mut stderr = std::io::stderr();
    stderr.write_all(output.stderr.as_bytes())?;
    stderr.flush()?;

    if output.exit_code != 0 {
        print_error(&format_exit(&output));
    } else {
        tracing::info!("{}", format_exit(&output));
    }

    Ok(output.exit_code)
}
