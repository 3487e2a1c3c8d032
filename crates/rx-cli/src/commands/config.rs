//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use rx_core::config::{self, ClientConfig};

use crate::output::{print_error, print_info, print_success, print_warning};

/// Get a config value by key
pub fn config_get(path: &Path, key: &str) -> Result<()> {
    let table = match read_table(path)? {
        Some(table) => table,
        // Fall back to the built-in defaults so every key is answerable
        None => default_table()?,
    };

    let Some(value) = table.get(key) else {
        print_error(&format!("Key not found: {}", key));
        return Ok(());
    };

    match value {
        toml::Value::String(s) => println!("{}", s),
        other => println!("{}", other),
    }

    Ok(())
}

/// Set a config value by key.
///
/// The result must still be a valid client configuration.
pub fn config_set(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut table = match read_table(path)? {
        Some(table) => table,
        None => {
            print_info("Creating default configuration...");
            default_table()?
        }
    };

    let toml_value = if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(value.to_string())
    };
    table.insert(key.to_string(), toml_value);

    let new_content = toml::to_string_pretty(&table)?;
    let parsed: ClientConfig = toml::from_str(&new_content)
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;
    parsed.validate()?;

    config::save_config(path, &parsed)?;
    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(path: &Path) -> Result<()> {
    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Showing built-in defaults. Run 'rexec config init' to create a file");
        println!();
        println!("{}", toml::to_string_pretty(&ClientConfig::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write the default configuration
pub fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(path, &ClientConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

fn default_table() -> Result<toml::Table> {
    Ok(toml::from_str(&toml::to_string(&ClientConfig::default())?)?)
}

fn read_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let table = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_then_set() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");

        config_init(&path, false).unwrap();
        config_set(&path, "connect_timeout", "3").unwrap();
        config_set(&path, "server_url", "ws://backend.test/ws").unwrap();

        let config: ClientConfig = config::load_config(&path).unwrap();
        assert_eq!(config.connect_timeout.as_secs(), 3);
        assert_eq!(config.server_url, "ws://backend.test/ws");
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");

        assert!(config_set(&path, "server_url", "ftp://nope").is_err());
        assert!(config_set(&path, "connect_timeout", "soon").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"ws://kept/ws\"\n").unwrap();

        config_init(&path, false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("ws://kept/ws"));
    }
}
