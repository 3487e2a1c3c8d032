//! Status command implementation

use anyhow::Result;

use crate::client::{open_client, ClientOptions};
use crate::output::{format_status, print_error};

/// Connect and report the client state
pub async fn status_command(options: &ClientOptions, json: bool) -> Result<()> {
    let client = match open_client(options).await {
        Ok(client) => client,
        Err(e) => {
            print_error("Backend unreachable. Check server_url with: rexec config show");
            return Err(e);
        }
    };
    let view = client.view();
    let server_url = client.config.server_url.clone();
    client.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Server: {}", server_url);
        print!("{}", format_status(&view));
    }

    Ok(())
}
