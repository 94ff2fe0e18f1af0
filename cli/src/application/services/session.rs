//! Fault-tolerant session over a [`RemoteGateway`].
//!
//! The session owns the only connection handle and login token. Every call
//! is dispatched against whatever connection is current at the time of the
//! attempt, so a retry after a relogin never reuses a stale handle.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{Instrument as _, Span, debug, info, info_span, warn};
use vmops_common::{ManagedObjectReference, ObjectContent, ServiceContent};

use crate::application::ports::RemoteGateway;
use crate::domain::{Fault, FaultKind, Policy, VmopsError};

// ── Credentials ───────────────────────────────────────────────────────────────

/// Login identity for one endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub endpoint: String,
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Calls ─────────────────────────────────────────────────────────────────────

/// One remote request, re-dispatchable against any connection.
#[derive(Clone, Copy)]
enum Call<'a> {
    Invoke {
        target: &'a ManagedObjectReference,
        method: &'a str,
        args: &'a Map<String, Value>,
    },
    Property {
        obj: &'a ManagedObjectReference,
        path: &'a str,
    },
    List {
        type_name: &'a str,
        paths: &'a [&'a str],
    },
    ServiceContent,
}

enum Reply {
    Value(Value),
    Objects(Vec<ObjectContent>),
    Content(ServiceContent),
}

impl Call<'_> {
    fn name(&self) -> &str {
        match self {
            Call::Invoke { method, .. } => *method,
            Call::Property { .. } => "RetrieveProperties",
            Call::List { .. } => "RetrieveContents",
            Call::ServiceContent => "RetrieveServiceContent",
        }
    }

    async fn dispatch<G: RemoteGateway>(
        self,
        gateway: &G,
        conn: &G::Connection,
    ) -> Result<Reply, Fault> {
        match self {
            Call::Invoke {
                target,
                method,
                args,
            } => gateway.invoke(conn, target, method, args).await.map(Reply::Value),
            Call::Property { obj, path } => {
                gateway.get_property(conn, obj, path).await.map(Reply::Value)
            }
            Call::List { type_name, paths } => gateway
                .list_objects(conn, type_name, paths)
                .await
                .map(Reply::Objects),
            Call::ServiceContent => gateway.service_content(conn).await.map(Reply::Content),
        }
    }

    /// The "nothing there" reply used when an auth fault proves authoritative.
    fn empty(self) -> Option<Reply> {
        match self {
            Call::Invoke { .. } => Some(Reply::Value(Value::Array(Vec::new()))),
            Call::Property { .. } => Some(Reply::Value(Value::Null)),
            Call::List { .. } => Some(Reply::Objects(Vec::new())),
            Call::ServiceContent => None,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

struct SessionState<C> {
    connection: Arc<C>,
    session_key: String,
    /// Bumped on every successful relogin.
    generation: u64,
}

/// Authenticated, self-healing session shared by all workflows.
pub struct Session<G: RemoteGateway> {
    gateway: G,
    credentials: Credentials,
    policy: Policy,
    state: RwLock<SessionState<G::Connection>>,
    span: Span,
}

impl<G: RemoteGateway> Session<G> {
    /// Open a connection and log in.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::LoginFailed`] if the connection cannot be opened
    /// or the credentials are rejected.
    pub async fn connect(
        gateway: G,
        credentials: Credentials,
        policy: Policy,
    ) -> Result<Self, VmopsError> {
        let span = info_span!("session", endpoint = %credentials.endpoint);
        let (connection, session_key) = login(&gateway, &credentials)
            .instrument(span.clone())
            .await?;
        span.in_scope(|| info!(user = %credentials.username, "logged in"));
        Ok(Self {
            gateway,
            credentials,
            policy,
            state: RwLock::new(SessionState {
                connection: Arc::new(connection),
                session_key,
                generation: 0,
            }),
            span,
        })
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.credentials.endpoint
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Number of relogins performed so far.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Invoke `method` on `target`. `args` must be a JSON object or null.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable faults, and the last fault once the retry
    /// budget is exhausted.
    pub async fn invoke(
        &self,
        target: &ManagedObjectReference,
        method: &str,
        args: Value,
    ) -> Result<Value, VmopsError> {
        let args = into_args(method, args)?;
        match self
            .call(Call::Invoke {
                target,
                method,
                args: &args,
            })
            .await?
        {
            Reply::Value(value) => Ok(value),
            _ => Err(VmopsError::malformed(method, "unexpected reply shape")),
        }
    }

    /// Invoke a long-running method and return its task reference.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`], plus [`VmopsError::Malformed`] when the
    /// reply is not a task reference.
    pub async fn invoke_task(
        &self,
        target: &ManagedObjectReference,
        method: &str,
        args: Value,
    ) -> Result<ManagedObjectReference, VmopsError> {
        let value = self.invoke(target, method, args).await?;
        serde_json::from_value(value).map_err(|e| VmopsError::malformed(method, e))
    }

    /// Read a property; `Null` when unset.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn get_property(
        &self,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Value, VmopsError> {
        match self.call(Call::Property { obj, path }).await? {
            Reply::Value(value) => Ok(value),
            _ => Err(VmopsError::malformed(path, "unexpected reply shape")),
        }
    }

    /// Read and deserialize a property.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`], plus [`VmopsError::Malformed`] when the
    /// value does not match `T`.
    pub async fn get_property_as<T: DeserializeOwned>(
        &self,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<T, VmopsError> {
        let value = self.get_property(obj, path).await?;
        serde_json::from_value(value).map_err(|e| VmopsError::malformed(path, e))
    }

    /// Enumerate all objects of a type.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn list_objects(
        &self,
        type_name: &str,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>, VmopsError> {
        match self.call(Call::List { type_name, paths }).await? {
            Reply::Objects(objects) => Ok(objects),
            _ => Err(VmopsError::malformed(type_name, "unexpected reply shape")),
        }
    }

    /// Manager objects of the current connection.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn service_content(&self) -> Result<ServiceContent, VmopsError> {
        match self.call(Call::ServiceContent).await? {
            Reply::Content(content) => Ok(content),
            _ => Err(VmopsError::malformed("service content", "unexpected reply shape")),
        }
    }

    /// Best-effort logout.
    pub async fn shutdown(&self) {
        let state = self.state.read().await;
        if let Err(fault) = self.gateway.logout(&state.connection).await {
            self.span
                .in_scope(|| debug!(error = %fault, "logout failed, ignoring"));
        }
    }

    async fn call(&self, call: Call<'_>) -> Result<Reply, VmopsError> {
        self.call_with_retry(call).instrument(self.span.clone()).await
    }

    async fn call_with_retry(&self, call: Call<'_>) -> Result<Reply, VmopsError> {
        let attempts = self.policy.attempts();
        let mut auth_faults_after_relogin: Option<Vec<String>> = None;
        let mut last_fault = None;

        for attempt in 1..=attempts {
            let (connection, generation) = {
                let state = self.state.read().await;
                (Arc::clone(&state.connection), state.generation)
            };
            let fault = match call.dispatch(&self.gateway, &connection).await {
                Ok(reply) => return Ok(reply),
                Err(fault) => fault,
            };

            match fault.kind {
                FaultKind::NotAuthenticated => {
                    if auth_faults_after_relogin.as_ref() == Some(&fault.faults) {
                        if let Some(empty) = call.empty() {
                            debug!(call = call.name(), "repeated auth fault after relogin, treating as empty result");
                            return Ok(empty);
                        }
                    }
                    warn!(call = call.name(), attempt, "session not authenticated, logging in again");
                    auth_faults_after_relogin = Some(fault.faults.clone());
                    self.relogin(generation).await?;
                }
                FaultKind::Overloaded => {
                    warn!(call = call.name(), attempt, attempts, error = %fault.detail, "endpoint overloaded");
                    auth_faults_after_relogin = None;
                }
                FaultKind::AlreadyExists | FaultKind::CallerError | FaultKind::Other => {
                    debug!(call = call.name(), error = %fault, "remote call failed");
                    return Err(fault.into());
                }
            }
            last_fault = Some(fault);
            if attempt < attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        Err(last_fault
            .unwrap_or_else(|| Fault::other("retry budget exhausted"))
            .into())
    }

    /// Replace the login unless another caller already did since `observed`.
    async fn relogin(&self, observed: u64) -> Result<(), VmopsError> {
        let mut state = self.state.write().await;
        if state.generation != observed {
            debug!(generation = state.generation, "relogin already performed by another caller");
            return Ok(());
        }
        let (connection, session_key) = login(&self.gateway, &self.credentials).await?;
        if let Err(fault) = self
            .gateway
            .terminate_session(&connection, &state.session_key)
            .await
        {
            debug!(error = %fault, "could not terminate previous session");
        }
        state.connection = Arc::new(connection);
        state.session_key = session_key;
        state.generation += 1;
        info!(generation = state.generation, "logged in again");
        Ok(())
    }
}

async fn login<G: RemoteGateway>(
    gateway: &G,
    credentials: &Credentials,
) -> Result<(G::Connection, String), VmopsError> {
    let failed = |source| VmopsError::LoginFailed {
        endpoint: credentials.endpoint.clone(),
        source,
    };
    let connection = gateway.open().await.map_err(failed)?;
    let key = gateway
        .login(&connection, &credentials.username, &credentials.password)
        .await
        .map_err(failed)?;
    Ok((connection, key))
}

fn into_args(method: &str, args: Value) -> Result<Map<String, Value>, VmopsError> {
    match args {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(VmopsError::Remote(Fault::caller(format!(
            "arguments of {method} must be an object, got {other}"
        )))),
    }
}
