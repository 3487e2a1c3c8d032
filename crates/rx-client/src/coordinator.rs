//! Session coordinator
//!
//! Owns the client-side session state and drives it from two directions:
//! commands issued by the presentation layer, and messages pushed by the
//! backend over the connection.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting --sendId--> Identified --login/register ok--> Authenticated
//!      |            \--(cached creds)--> AutoLoginPending --ok--> Authenticated
//!      |                                        \--error--> Identified
//!      \--------------- any phase --closed--> Disconnected
//! ```
//!
//! Replies from the backend carry no request identifier. The coordinator
//! therefore keeps at most one deployment and one execution in flight and
//! matches each reply to the single outstanding request of its kind.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use uuid::Uuid;

use rx_core::error::{ClientError, ErrorKind, Precondition, TransportError};
use rx_core::traits::{MessageSink, Uploader};
use rx_core::types::{LastError, PendingDeployment, PendingExecution};
use rx_core::{CredentialStore, Credentials, Phase, Session, SessionView};
use rx_protocol::{
    encode_args, ConnectionId, Executable, ExecutableId, ExecutionOutput, Inbound, Outbound,
};

use crate::connection::ConnectionEvent;
use crate::state::ClientState;

/// Default bound on username length, in characters
pub const DEFAULT_MAX_USERNAME_LEN: usize = 40;

/// Coordinates authentication, deployment, and execution for one connection
pub struct SessionCoordinator {
    state: ClientState,
    sink: Arc<dyn MessageSink>,
    uploader: Arc<dyn Uploader>,
    credentials: Arc<dyn CredentialStore>,
    max_username_len: usize,
}

impl SessionCoordinator {
    /// Create a coordinator in the `Connecting` phase
    pub fn new(
        sink: Arc<dyn MessageSink>,
        uploader: Arc<dyn Uploader>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            state: ClientState::new(),
            sink,
            uploader,
            credentials,
            max_username_len: DEFAULT_MAX_USERNAME_LEN,
        }
    }

    /// Override the username length limit
    pub fn with_max_username_len(mut self, max_username_len: usize) -> Self {
        self.max_username_len = max_username_len;
        self
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionView {
        self.state.snapshot()
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.state.subscribe()
    }

    // =========================================================================
    // Connection events
    // =========================================================================

    /// Apply one event from the connection manager
    pub async fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(message) => self.handle_inbound(message).await,
            ConnectionEvent::Closed { reason } => self.handle_closed(&reason),
        }
    }

    /// Apply one message pushed by the backend
    pub async fn handle_inbound(&mut self, message: Inbound) {
        if self.state.read(|view| view.phase == Phase::Disconnected) {
            tracing::debug!(kind = message.kind(), "Ignoring message after disconnect");
            return;
        }

        tracing::debug!(kind = message.kind(), error = ?message.error(), "Handling message");

        match message {
            Inbound::SendId { id } => self.on_connection_id(id).await,
            Inbound::LoginOutput { error, exec } => self.on_login_output(non_empty(error), exec),
            Inbound::DeployOutput { error, id } => self.on_deploy_output(non_empty(error), id),
            Inbound::ExecuteOutput { error, output } => {
                self.on_execute_output(non_empty(error), output)
            }
            Inbound::Unknown => {
                tracing::debug!("Ignoring message of unknown type");
            }
        }
    }

    /// The connection is gone.
    ///
    /// Identity is dropped and any outstanding request is released with a
    /// connection error. Later commands fail with `ConnectionLost`.
    pub fn handle_closed(&mut self, reason: &str) {
        let released = self.state.update(|view| {
            if view.phase == Phase::Disconnected {
                return false;
            }
            let was_waiting = view.phase == Phase::AutoLoginPending;
            let had_deployment = view.pending_deployment.take().is_some();
            let had_execution = view.pending_execution.take().is_some();

            view.phase = Phase::Disconnected;
            view.ready = true;
            view.connection_id = None;

            let released = was_waiting || had_deployment || had_execution;
            if released {
                view.last_error = Some(LastError::new(ErrorKind::Connection, reason));
            }
            released
        });

        if released {
            tracing::warn!("Connection closed with requests outstanding: {}", reason);
        } else {
            tracing::info!("Connection closed: {}", reason);
        }
    }

    async fn on_connection_id(&mut self, id: ConnectionId) {
        let cached = match self.credentials.load() {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credential cache: {}", e);
                None
            }
        };

        let had_session = self.state.update(|view| {
            let had_session = view.session.take().is_some();
            view.connection_id = Some(id.clone());
            view.pending_deployment = None;
            view.pending_execution = None;
            match &cached {
                Some(credentials) => {
                    view.phase = Phase::AutoLoginPending;
                    view.ready = false;
                    view.username = Some(credentials.username.clone());
                }
                None => {
                    view.phase = Phase::Identified;
                    view.ready = true;
                }
            }
            had_session
        });

        tracing::info!(connection_id = %id, "Connection identity assigned");
        if had_session {
            tracing::info!("New identity invalidates the previous session");
        }

        if let Some(credentials) = cached {
            tracing::info!(username = %credentials.username, "Logging in with cached credentials");
            let message = Outbound::Login {
                username: credentials.username,
                password: credentials.password,
            };
            if let Err(e) = self.sink.send(message).await {
                self.connection_failed(&e);
            }
        }
    }

    fn on_login_output(&mut self, error: Option<String>, exec: Option<Vec<Executable>>) {
        let session = exec.map(Session::from_listing);
        let rejected = error.is_some()
            && session.is_none()
            && !self.state.read(SessionView::is_authenticated);

        // Cache changes land before the new state is published
        if rejected {
            if let Err(e) = self.credentials.clear() {
                tracing::warn!("Failed to clear cached credentials: {}", e);
            }
        }
        if let Some(session) = &session {
            if let Err(e) = self.credentials.save_snapshot(session) {
                tracing::warn!("Failed to store session snapshot: {}", e);
            }
        }

        let was_auto = self.state.update(|view| {
            let was_auto = view.phase == Phase::AutoLoginPending;
            if let Some(session) = session {
                view.session = Some(session);
                view.phase = Phase::Authenticated;
            } else if was_auto {
                view.phase = Phase::Identified;
            }
            if was_auto {
                view.ready = true;
            }
            if let Some(error) = &error {
                view.last_error = Some(LastError::new(ErrorKind::Authentication, error.clone()));
            }
            was_auto
        });

        match &error {
            Some(error) if rejected => {
                tracing::warn!(auto = was_auto, "Login rejected: {}", error);
            }
            Some(error) => {
                tracing::warn!("Backend reported an error alongside the session: {}", error);
            }
            None if self.state.read(SessionView::is_authenticated) => {
                let count = self.state.read(|view| view.executables().len());
                tracing::info!(executables = count, auto = was_auto, "Session established");
            }
            None => {
                tracing::warn!("Login reply carried neither a session nor an error");
            }
        }
    }

    fn on_deploy_output(&mut self, error: Option<String>, id: Option<ExecutableId>) {
        if error.is_none() && id.is_none() {
            tracing::warn!("Deploy reply carried neither an id nor an error");
            return;
        }

        // Errors are kept whenever logged in; an id needs the pending name
        let outcome = self.state.update(|view| {
            let name = view.pending_deployment.take().map(|pending| pending.name);
            if name.is_none() && !view.is_authenticated() {
                return None;
            }

            if let Some(error) = &error {
                view.last_error = Some(LastError::new(ErrorKind::Deployment, error.clone()));
            }

            let appended = match (&id, &name, view.session.as_mut()) {
                (Some(id), Some(name), Some(session)) => {
                    if session.push(Executable::new(id.clone(), name.clone())) {
                        Some(session.clone())
                    } else {
                        tracing::warn!(%id, "Deployed executable id already in session, skipping");
                        None
                    }
                }
                _ => None,
            };
            Some((name, appended))
        });

        let Some((name, snapshot)) = outcome else {
            tracing::warn!("Ignoring deploy reply while not logged in");
            return;
        };

        if let Some(error) = &error {
            tracing::warn!(name = ?name, "Deployment failed: {}", error);
        }
        if name.is_none() && id.is_some() {
            tracing::warn!(id = ?id, "Ignoring deployed id with no deployment pending");
        }
        if let Some(session) = snapshot {
            tracing::info!(name = ?name, id = ?id, "Deployment complete");
            if let Err(e) = self.credentials.save_snapshot(&session) {
                tracing::warn!("Failed to store session snapshot: {}", e);
            }
        }
    }

    fn on_execute_output(&mut self, error: Option<String>, output: Option<ExecutionOutput>) {
        if error.is_none() && output.is_none() {
            tracing::warn!("Execute reply carried neither output nor an error");
            return;
        }

        let outcome = self.state.update(|view| {
            let pending = view.pending_execution.take();
            if pending.is_none() && !view.is_authenticated() {
                return None;
            }
            if let Some(error) = &error {
                view.last_error = Some(LastError::new(ErrorKind::Execution, error.clone()));
            }
            if let Some(output) = &output {
                view.last_execution = Some(output.clone());
            }
            Some(pending)
        });

        let Some(pending) = outcome else {
            tracing::warn!("Ignoring execute reply while not logged in");
            return;
        };
        let request_id = pending.as_ref().map(|p| p.request_id);
        let executable = pending.as_ref().map(|p| p.executable_id.clone());
        if pending.is_none() {
            tracing::debug!("Execute reply arrived with no execution pending");
        }

        match (&error, &output) {
            (Some(error), _) => tracing::warn!(
                request_id = ?request_id,
                executable = ?executable,
                "Execution failed: {}",
                error
            ),
            (None, Some(output)) => tracing::info!(
                request_id = ?request_id,
                executable = ?executable,
                exit_code = output.exit_code,
                "Execution finished"
            ),
            (None, None) => {}
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Log in with an existing account.
    ///
    /// Credentials are cached for automatic login once the request is sent.
    /// The outcome arrives asynchronously as a state change.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        self.require_ready()?;
        self.validate_credentials(username, password)?;
        if self.state.read(SessionView::is_authenticated) {
            return Err(ClientError::PreconditionNotMet(
                Precondition::AlreadyAuthenticated,
            ));
        }

        self.send(Outbound::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        if let Err(e) = self.credentials.save(&Credentials::new(username, password)) {
            tracing::warn!("Failed to cache credentials: {}", e);
        }
        self.state
            .update(|view| view.username = Some(username.to_string()));

        tracing::info!(username, "Login requested");
        Ok(())
    }

    /// Create a new account. The reply is handled like a login reply.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        self.require_ready()?;
        self.validate_credentials(username, password)?;
        if self.state.read(SessionView::is_authenticated) {
            return Err(ClientError::PreconditionNotMet(
                Precondition::AlreadyAuthenticated,
            ));
        }

        self.send(Outbound::Register {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        self.state
            .update(|view| view.username = Some(username.to_string()));

        tracing::info!(username, "Registration requested");
        Ok(())
    }

    /// End the session.
    ///
    /// Local state is cleared before the backend is told, so the session is
    /// gone even if the message cannot be sent.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        if !self.state.read(SessionView::is_authenticated) {
            return Err(ClientError::PreconditionNotMet(
                Precondition::NotAuthenticated,
            ));
        }

        self.state.update(|view| {
            view.session = None;
            view.username = None;
            view.pending_deployment = None;
            view.pending_execution = None;
            if view.phase == Phase::Authenticated {
                view.phase = Phase::Identified;
            }
        });
        if let Err(e) = self.credentials.clear() {
            tracing::warn!("Failed to clear cached credentials: {}", e);
        }
        tracing::info!("Logged out");

        self.ensure_connected()?;
        self.send(Outbound::Logout).await
    }

    /// Run a deployed executable.
    ///
    /// Returns the local request tag used in logs. The result arrives
    /// asynchronously in `last_execution` or `last_error`.
    pub async fn execute(
        &mut self,
        id: &ExecutableId,
        args: &[String],
    ) -> Result<Uuid, ClientError> {
        self.require_ready()?;
        self.state.read(|view| {
            let Some(session) = &view.session else {
                return Err(ClientError::PreconditionNotMet(
                    Precondition::NotAuthenticated,
                ));
            };
            if view.pending_execution.is_some() {
                return Err(ClientError::PreconditionNotMet(
                    Precondition::ExecutionPending,
                ));
            }
            if !session.contains(id) {
                return Err(ClientError::PreconditionNotMet(
                    Precondition::UnknownExecutable(id.clone()),
                ));
            }
            Ok(())
        })?;

        let args = encode_args(args).map_err(|e| ClientError::InvalidInput(e.to_string()))?;

        let request_id = Uuid::new_v4();
        self.state.update(|view| {
            view.pending_execution = Some(PendingExecution {
                request_id,
                executable_id: id.clone(),
            });
        });

        tracing::info!(%request_id, executable = %id, "Execution requested");

        let message = Outbound::Execute {
            id: id.clone(),
            args,
        };
        if let Err(e) = self.send(message).await {
            self.state.update(|view| view.pending_execution = None);
            return Err(e);
        }

        Ok(request_id)
    }

    /// Upload an artifact under `name`.
    ///
    /// Completes once the upload is delivered. The backend's verdict arrives
    /// later as a state change.
    pub async fn deploy(&mut self, name: &str, payload: Bytes) -> Result<(), ClientError> {
        self.require_ready()?;
        if name.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "executable name must not be empty".to_string(),
            ));
        }

        let correlation = self.state.read(|view| {
            if view.session.is_none() {
                return Err(ClientError::PreconditionNotMet(
                    Precondition::NotAuthenticated,
                ));
            }
            if view.pending_deployment.is_some() {
                return Err(ClientError::PreconditionNotMet(
                    Precondition::DeploymentPending,
                ));
            }
            view.connection_id.clone().ok_or(ClientError::PreconditionNotMet(
                Precondition::NoConnectionIdentity,
            ))
        })?;

        self.state.update(|view| {
            view.pending_deployment = Some(PendingDeployment {
                name: name.to_string(),
            });
        });

        tracing::info!(name, size = payload.len(), "Deployment requested");

        if let Err(e) = self.uploader.upload(name, payload, &correlation).await {
            tracing::warn!(name, "Upload failed: {}", e);
            let message = e.to_string();
            self.state.update(|view| {
                view.pending_deployment = None;
                view.last_error = Some(LastError::new(ErrorKind::Deployment, message.clone()));
            });
            return Err(ClientError::Deployment(message));
        }

        Ok(())
    }

    /// Acknowledge the last surfaced error
    pub fn dismiss_error(&mut self) {
        self.state.update(|view| view.last_error = None);
    }

    /// Discard the last execution result
    pub fn clear_execution_result(&mut self) {
        self.state.update(|view| view.last_execution = None);
    }

    /// Close the connection
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!("Error while closing connection: {}", e);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.state.read(|view| view.phase == Phase::Disconnected) || !self.sink.is_open() {
            return Err(ClientError::ConnectionLost(
                "connection to the backend is closed".to_string(),
            ));
        }
        Ok(())
    }

    fn require_ready(&self) -> Result<(), ClientError> {
        self.ensure_connected()?;
        if !self.state.read(|view| view.ready) {
            return Err(ClientError::PreconditionNotMet(Precondition::NotReady));
        }
        Ok(())
    }

    fn validate_credentials(&self, username: &str, password: &str) -> Result<(), ClientError> {
        if username.is_empty() {
            return Err(ClientError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        if username.chars().count() > self.max_username_len {
            return Err(ClientError::InvalidInput(format!(
                "username must be at most {} characters",
                self.max_username_len
            )));
        }
        if password.is_empty() {
            return Err(ClientError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&mut self, message: Outbound) -> Result<(), ClientError> {
        let kind = message.kind();
        self.sink.send(message).await.map_err(|e| {
            tracing::warn!(kind, "Failed to send message: {}", e);
            self.connection_failed(&e);
            ClientError::ConnectionLost(e.to_string())
        })
    }

    /// A send failed: the connection cannot carry further traffic
    fn connection_failed(&mut self, error: &TransportError) {
        self.handle_closed(&error.to_string());
    }
}

fn non_empty(error: Option<String>) -> Option<String> {
    error.filter(|e| !e.is_empty())
}
