//! List command implementation

use anyhow::Result;

use crate::client::{open_client, require_session, ClientOptions};
use crate::output::format_executables;

/// Print the session's executables, optionally as JSON
pub async fn list_command(options: &ClientOptions, json: bool) -> Result<()> {
    let client = open_client(options).await?;
    let view = client.view();
    client.close().await;

    require_session(&view)?;

    if json {
        println!("{}", serde_json::to_string_pretty(view.executables())?);
    } else {
        println!("{}", format_executables(view.executables()));
    }

    Ok(())
}
