//! Login, registration, and logout

use anyhow::Result;

use rx_core::CredentialStore;

use crate::client::{open_client, ClientOptions};
use crate::output::{print_info, print_success, print_warning};

/// Log in, replacing any session restored from cached credentials
pub async fn login_command(options: &ClientOptions, username: &str, password: &str) -> Result<()> {
    let client = open_client(options).await?;
    let view = client.view();

    if view.is_authenticated() {
        if view.username.as_deref() == Some(username) {
            print_info(&format!("Already logged in as {}", username));
            client.close().await;
            return Ok(());
        }
        client.handle.logout().await?;
    }

    let result = client
        .handle
        .login_and_wait(username, password, client.config.reply_timeout)
        .await;
    client.close().await;

    let view = result?;
    print_success(&format!(
        "Logged in as {} ({} executable{})",
        username,
        view.executables().len(),
        if view.executables().len() == 1 { "" } else { "s" }
    ));
    Ok(())
}

/// Create an account and log into it
pub async fn register_command(
    options: &ClientOptions,
    username: &str,
    password: &str,
) -> Result<()> {
    let client = open_client(options).await?;

    if client.view().is_authenticated() {
        client.handle.logout().await?;
    }

    let result = client
        .handle
        .register_and_wait(username, password, client.config.reply_timeout)
        .await;
    client.close().await;

    result?;
    print_success(&format!("Registered and logged in as {}", username));
    print_info(&format!(
        "Run 'rexec login {}' to stay logged in across invocations",
        username
    ));
    Ok(())
}

/// End the session and forget cached credentials.
///
/// Local credentials are cleared even when the backend is unreachable.
pub async fn logout_command(options: &ClientOptions) -> Result<()> {
    let config = options.load_config()?;

    match open_client(options).await {
        Ok(client) => {
            let result = if client.view().is_authenticated() {
                client.handle.logout().await
            } else {
                Ok(())
            };
            client.close().await;
            if let Err(e) = result {
                print_warning(&format!("Backend was not notified: {}", e));
            }
        }
        Err(e) => {
            print_warning(&format!("Backend unreachable, logging out locally: {:#}", e));
        }
    }

    options.credential_store(&config).clear()?;
    print_success("Logged out");
    Ok(())
}
