//! Client driver and handle
//!
//! The [`ClientDriver`] is the single task that owns the
//! [`SessionCoordinator`]. It interleaves connection events and commands from
//! any number of [`ClientHandle`]s, so every state transition happens on one
//! task and in arrival order.
//!
//! A deployment upload is awaited inside the loop; events that arrive during
//! the upload queue up and are applied afterwards.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use rx_core::config::ClientConfig;
use rx_core::error::{ClientError, ErrorKind};
use rx_core::traits::{MessageSink, Uploader};
use rx_core::{CredentialStore, Executable, ExecutableId, ExecutionOutput, Phase, SessionView};

use crate::connection::{ConnectionEvent, ConnectionManager};
use crate::coordinator::SessionCoordinator;
use crate::upload::HttpUploader;

/// Channel capacity for commands from handles
const COMMAND_CHANNEL_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, ClientError>>;

/// Commands accepted by the driver
enum Command {
    Login {
        username: String,
        password: String,
        reply: Reply<()>,
    },
    Register {
        username: String,
        password: String,
        reply: Reply<()>,
    },
    Logout {
        reply: Reply<()>,
    },
    Execute {
        id: ExecutableId,
        args: Vec<String>,
        reply: Reply<Uuid>,
    },
    Deploy {
        name: String,
        payload: Bytes,
        reply: Reply<()>,
    },
    DismissError {
        reply: Reply<()>,
    },
    ClearExecutionResult {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Task owning the coordinator
pub struct ClientDriver {
    coordinator: SessionCoordinator,
    events: mpsc::Receiver<ConnectionEvent>,
    commands: mpsc::Receiver<Command>,
}

impl ClientDriver {
    /// Wrap a coordinator fed by `events`, returning the driver and its handle
    pub fn new(
        coordinator: SessionCoordinator,
        events: mpsc::Receiver<ConnectionEvent>,
    ) -> (Self, ClientHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = ClientHandle {
            commands: command_tx,
            view: coordinator.subscribe(),
        };
        let driver = Self {
            coordinator,
            events,
            commands: command_rx,
        };
        (driver, handle)
    }

    /// Spawn the driver onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shut down or until every handle is dropped
    pub async fn run(mut self) {
        let mut events_open = true;

        loop {
            tokio::select! {
                event = self.events.recv(), if events_open => {
                    match event {
                        Some(event) => self.coordinator.handle_event(event).await,
                        None => {
                            events_open = false;
                            self.coordinator.handle_closed("connection task ended");
                        }
                    }
                }

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown { reply }) => {
                            self.coordinator.shutdown().await;
                            let _ = reply.send(Ok(()));
                            break;
                        }
                        Some(command) => self.dispatch(command).await,
                        None => {
                            tracing::debug!("All client handles dropped");
                            self.coordinator.shutdown().await;
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("Client driver stopped");
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Login {
                username,
                password,
                reply,
            } => {
                let _ = reply.send(self.coordinator.login(&username, &password).await);
            }
            Command::Register {
                username,
                password,
                reply,
            } => {
                let _ = reply.send(self.coordinator.register(&username, &password).await);
            }
            Command::Logout { reply } => {
                let _ = reply.send(self.coordinator.logout().await);
            }
            Command::Execute { id, args, reply } => {
                let _ = reply.send(self.coordinator.execute(&id, &args).await);
            }
            Command::Deploy {
                name,
                payload,
                reply,
            } => {
                let _ = reply.send(self.coordinator.deploy(&name, payload).await);
            }
            Command::DismissError { reply } => {
                self.coordinator.dismiss_error();
                let _ = reply.send(Ok(()));
            }
            Command::ClearExecutionResult { reply } => {
                self.coordinator.clear_execution_result();
                let _ = reply.send(Ok(()));
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }
}

/// Open a connection per `config` and start a driver for it
pub async fn connect(
    config: &ClientConfig,
    credentials: Arc<dyn CredentialStore>,
) -> Result<ClientHandle, ClientError> {
    let (connection, events) =
        ConnectionManager::open(&config.server_url, config.connect_timeout).await?;
    let uploader = HttpUploader::new(config.deploy_url.clone(), config.upload_timeout)?;

    let coordinator = SessionCoordinator::new(
        Arc::new(connection) as Arc<dyn MessageSink>,
        Arc::new(uploader) as Arc<dyn Uploader>,
        credentials,
    )
    .with_max_username_len(config.max_username_len);

    let (driver, handle) = ClientDriver::new(coordinator, events);
    driver.spawn();
    Ok(handle)
}

/// Cloneable handle for issuing commands and observing state
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
}

impl ClientHandle {
    /// Copy of the current state
    pub fn snapshot(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.request(|reply| Command::Login {
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.request(|reply| Command::Register {
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Logout { reply }).await
    }

    /// Request a run; returns the local request tag
    pub async fn execute(&self, id: &ExecutableId, args: &[String]) -> Result<Uuid, ClientError> {
        self.request(|reply| Command::Execute {
            id: id.clone(),
            args: args.to_vec(),
            reply,
        })
        .await
    }

    /// Upload an artifact; completes once the upload is delivered
    pub async fn deploy(&self, name: &str, payload: Bytes) -> Result<(), ClientError> {
        self.request(|reply| Command::Deploy {
            name: name.to_string(),
            payload,
            reply,
        })
        .await
    }

    pub async fn dismiss_error(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::DismissError { reply }).await
    }

    pub async fn clear_execution_result(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::ClearExecutionResult { reply })
            .await
    }

    /// Close the connection and stop the driver
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    // =========================================================================
    // Waiting for outcomes
    // =========================================================================

    /// Wait until `predicate` holds for the current state
    pub async fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Result<SessionView, ClientError>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut view = self.view.clone();
        let wait = async {
            loop {
                {
                    let current = view.borrow_and_update();
                    if predicate(&*current) {
                        return Ok(current.clone());
                    }
                }
                if view.changed().await.is_err() {
                    return Err(ClientError::ConnectionLost(
                        "client driver stopped".to_string(),
                    ));
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ClientError::ReplyTimeout(timeout))?
    }

    /// Wait until the client may accept commands
    pub async fn wait_ready(&self, timeout: Duration) -> Result<SessionView, ClientError> {
        self.wait_for(timeout, |view| view.ready).await
    }

    /// Log in and wait for the backend's verdict
    pub async fn login_and_wait(
        &self,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<SessionView, ClientError> {
        self.dismiss_error().await?;
        self.login(username, password).await?;
        self.wait_for_session(timeout).await
    }

    /// Register and wait for the backend's verdict
    pub async fn register_and_wait(
        &self,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<SessionView, ClientError> {
        self.dismiss_error().await?;
        self.register(username, password).await?;
        self.wait_for_session(timeout).await
    }

    /// Deploy and wait for the backend to list the new executable
    pub async fn deploy_and_wait(
        &self,
        name: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Executable, ClientError> {
        self.dismiss_error().await?;
        let before = self.snapshot().executables().len();
        self.deploy(name, payload).await?;

        let view = self
            .wait_for(timeout, |view| view.pending_deployment.is_none())
            .await?;
        if let Some(error) = &view.last_error {
            return Err(error.to_error());
        }

        view.executables()
            .iter()
            .skip(before)
            .rev()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| {
                ClientError::Deployment(
                    "backend acknowledged the upload without a new executable".to_string(),
                )
            })
    }

    /// Execute and wait for the result
    pub async fn execute_and_wait(
        &self,
        id: &ExecutableId,
        args: &[String],
        timeout: Duration,
    ) -> Result<ExecutionOutput, ClientError> {
        self.dismiss_error().await?;
        self.clear_execution_result().await?;
        let request_id = self.execute(id, args).await?;

        let view = self
            .wait_for(timeout, |view| {
                view.pending_execution
                    .as_ref()
                    .map_or(true, |pending| pending.request_id != request_id)
            })
            .await?;
        if let Some(error) = &view.last_error {
            return Err(error.to_error());
        }
        view.last_execution.ok_or_else(|| {
            ClientError::Execution("backend replied without output".to_string())
        })
    }

    async fn wait_for_session(&self, timeout: Duration) -> Result<SessionView, ClientError> {
        let view = self
            .wait_for(timeout, |view| {
                view.is_authenticated()
                    || view.last_error.is_some()
                    || view.phase == Phase::Disconnected
            })
            .await?;

        match &view.last_error {
            Some(error) if error.kind == ErrorKind::Authentication && !view.is_authenticated() => {
                Err(error.to_error())
            }
            Some(error) if error.kind == ErrorKind::Connection => Err(error.to_error()),
            _ if view.phase == Phase::Disconnected => Err(ClientError::ConnectionLost(
                "connection closed before login completed".to_string(),
            )),
            _ => Ok(view),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| ClientError::ConnectionLost("client driver stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| ClientError::ConnectionLost("client driver stopped".to_string()))?
    }
}
