//! End-to-end CLI tests
//!
//! These tests run the real `rexec` binary against an in-process backend
//! that speaks the WebSocket protocol. Each invocation is a separate
//! process, so they also exercise the credential cache that carries a
//! login from one invocation to the next.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use futures::{SinkExt, StreamExt};
use predicates::prelude::*;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use rx_protocol::{decode_args, Executable, ExecutionOutput, Inbound, Outbound};

/// Accounts known to the test backend: username -> (password, executables)
type Accounts = Arc<Mutex<HashMap<String, (String, Vec<Executable>)>>>;

/// Start a WebSocket backend and return its URL
async fn start_backend(accounts: Accounts) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut next_id = 0u32;
        while let Ok((stream, _)) = listener.accept().await {
            next_id += 1;
            let accounts = Arc::clone(&accounts);
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let hello = Inbound::SendId {
                    id: format!("conn-{}", next_id).into(),
                };
                ws.send(Message::Text(hello.to_json().unwrap().into()))
                    .await
                    .unwrap();

                let mut user: Option<String> = None;
                while let Some(Ok(frame)) = ws.next().await {
                    let Message::Text(text) = frame else { continue };
                    let reply = handle(&accounts, &mut user, Outbound::from_json(&text).unwrap());
                    if let Some(reply) = reply {
                        if ws
                            .send(Message::Text(reply.to_json().unwrap().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            });
        }
    });

    format!("ws://{}/service/ws", addr)
}

fn handle(accounts: &Accounts, user: &mut Option<String>, message: Outbound) -> Option<Inbound> {
    let mut accounts = accounts.lock().unwrap();
    match message {
        Outbound::Login { username, password } => match accounts.get(&username) {
            Some((expected, executables)) if *expected == password => {
                let exec = executables.clone();
                *user = Some(username);
                Some(Inbound::LoginOutput {
                    error: None,
                    exec: Some(exec),
                })
            }
            _ => Some(Inbound::LoginOutput {
                error: Some("invalid username or password".to_string()),
                exec: None,
            }),
        },
        Outbound::Register { username, password } => {
            accounts.insert(username.clone(), (password, Vec::new()));
            *user = Some(username);
            Some(Inbound::LoginOutput {
                error: None,
                exec: Some(Vec::new()),
            })
        }
        Outbound::Logout => {
            *user = None;
            None
        }
        Outbound::Execute { id, args } => {
            let args = decode_args(&args);
            Some(Inbound::ExecuteOutput {
                error: None,
                output: Some(ExecutionOutput {
                    exit_code: if args.first().map(String::as_str) == Some("fail") {
                        4
                    } else {
                        0
                    },
                    stdout: format!("{} ran with [{}]\n", id, args.join(",")),
                    stderr: String::new(),
                }),
            })
        }
    }
}

struct Workspace {
    #[allow(dead_code)] // Keeps temp dir alive
    dir: tempfile::TempDir,
    config: PathBuf,
    cache: PathBuf,
}

impl Workspace {
    fn new(server_url: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = dir.path().join("config.toml");
        let cache = dir.path().join("session.json");
        std::fs::write(
            &config,
            format!(
                "server_url = {:?}\ncredential_path = {:?}\nreply_timeout = 5\n",
                server_url,
                cache.to_str().unwrap()
            ),
        )
        .expect("Failed to write config");
        Self { dir, config, cache }
    }

    /// Run rexec with this workspace's config on a blocking thread
    async fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        let mut cmd = Command::cargo_bin("rexec").expect("Failed to locate rexec binary");
        cmd.env_remove("REXEC_PASSWORD")
            .env_remove("REXEC_SERVER")
            .arg("--config")
            .arg(&self.config)
            .args(args);
        let output = tokio::task::spawn_blocking(move || cmd.output())
            .await
            .expect("rexec invocation panicked")
            .expect("Failed to run rexec");
        output.assert()
    }
}

fn accounts_with(username: &str, password: &str, executables: Vec<Executable>) -> Accounts {
    let mut map = HashMap::new();
    map.insert(username.to_string(), (password.to_string(), executables));
    Arc::new(Mutex::new(map))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_then_list_uses_cached_credentials() {
    let url = start_backend(accounts_with(
        "alice",
        "pw",
        vec![Executable::new("e1", "build"), Executable::new("e2", "report")],
    ))
    .await;
    let ws = Workspace::new(&url);

    ws.run(&["login", "alice", "--password", "pw"])
        .await
        .success()
        .stdout(predicate::str::contains("Logged in as alice (2 executables)"));
    assert!(ws.cache.exists());

    ws.run(&["list"])
        .await
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("report"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_password_fails() {
    let url = start_backend(accounts_with("alice", "pw", vec![])).await;
    let ws = Workspace::new(&url);

    ws.run(&["login", "alice", "--password", "nope"])
        .await
        .failure()
        .stderr(predicate::str::contains("invalid username or password"));
    assert!(!ws.cache.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_requires_login() {
    let url = start_backend(accounts_with("alice", "pw", vec![])).await;
    let ws = Workspace::new(&url);

    ws.run(&["list"])
        .await
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_by_name_relays_output_and_exit_code() {
    let url = start_backend(accounts_with(
        "alice",
        "pw",
        vec![Executable::new("e1", "build")],
    ))
    .await;
    let ws = Workspace::new(&url);
    ws.run(&["login", "alice", "--password", "pw"])
        .await
        .success();

    ws.run(&["exec", "build", "--release", "x86"])
        .await
        .success()
        .stdout(predicate::str::contains("e1 ran with [--release,x86]"));

    ws.run(&["exec", "e1", "fail"])
        .await
        .code(4)
        .stdout(predicate::str::contains("e1 ran with [fail]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_rejects_delimiter_in_argument() {
    let url = start_backend(accounts_with(
        "alice",
        "pw",
        vec![Executable::new("e1", "build")],
    ))
    .await;
    let ws = Workspace::new(&url);
    ws.run(&["login", "alice", "--password", "pw"])
        .await
        .success();

    ws.run(&["exec", "e1", "a;b"])
        .await
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_json_reports_phase() {
    let url = start_backend(accounts_with("alice", "pw", vec![])).await;
    let ws = Workspace::new(&url);

    ws.run(&["status", "--json"])
        .await
        .success()
        .stdout(predicate::str::contains(r#""phase": "identified""#));

    ws.run(&["login", "alice", "--password", "pw"])
        .await
        .success();
    ws.run(&["status"])
        .await
        .success()
        .stdout(predicate::str::contains("User: alice"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_logout_clears_cache() {
    let url = start_backend(accounts_with("alice", "pw", vec![])).await;
    let ws = Workspace::new(&url);
    ws.run(&["login", "alice", "--password", "pw"])
        .await
        .success();

    ws.run(&["logout"]).await.success();
    assert!(!ws.cache.exists());

    ws.run(&["list"])
        .await
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
