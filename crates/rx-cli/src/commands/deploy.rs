//! Deploy command implementation

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::client::{open_client, require_session, ClientOptions};
use crate::output::{print_info, print_success};

/// Upload `file` as a new executable named `name` (defaults to the file name)
pub async fn deploy_command(options: &ClientOptions, file: &Path, name: Option<&str>) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive a name from {:?}; pass --name", file))?,
    };

    let payload = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    let client = open_client(options).await?;
    if let Err(e) = require_session(&client.view()) {
        client.close().await;
        return Err(e);
    }

    print_info(&format!("Uploading {} ({} bytes)...", name, payload.len()));
    let result = client
        .handle
        .deploy_and_wait(&name, Bytes::from(payload), client.config.reply_timeout)
        .await;
    client.close().await;

    let executable = result?;
    print_success(&format!("Deployed {} as {}", executable.name, executable.id));
    Ok(())
}
