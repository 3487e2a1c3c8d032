//! CLI command implementations

mod auth;
mod config;
mod deploy;
mod exec;
mod list;
mod status;

pub use auth::{login_command, logout_command, register_command};
pub use config::{config_get, config_init, config_set, config_show};
pub use deploy::deploy_command;
pub use exec::{exec_command, resolve_executable};
pub use list::list_command;
pub use status::status_command;
