//! `RemoteGateway` over a JSON envelope bridge.
//!
//! Every call is a `POST {base}/rpc` whose body names the operation. The
//! bridge answers `{"result": ...}` on success or
//! `{"fault": {"faults": [...], "detail": "..."}}` when the endpoint raised a
//! fault. Each connection owns its own cookie jar, which carries the session.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::trace;
use vmops_common::{ManagedObjectReference, ObjectContent, ServiceContent};

use crate::application::ports::RemoteGateway;
use crate::domain::Fault;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One bridge connection: an HTTP client with its own session cookie.
pub struct HttpConnection {
    client: reqwest::Client,
}

/// Gateway speaking the bridge envelope at `base_url`.
pub struct HttpGateway {
    rpc_url: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    fault: Option<WireFault>,
}

#[derive(Deserialize)]
struct WireFault {
    #[serde(default)]
    faults: Vec<String>,
    #[serde(default)]
    detail: String,
}

impl HttpGateway {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            rpc_url: format!("{}/rpc", base_url.trim_end_matches('/')),
        }
    }

    async fn call(&self, conn: &HttpConnection, body: Value) -> Result<Value, Fault> {
        trace!(op = %body["op"], "bridge call");
        let response = conn
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Fault::from_transport(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(Fault::overloaded(format!("bridge answered {status}")));
        }
        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| Fault::from_transport(format!("{status}: {e}")))?;
        match envelope.fault {
            Some(fault) => Err(Fault::from_server(fault.faults, fault.detail)),
            None => Ok(envelope.result),
        }
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        conn: &HttpConnection,
        body: Value,
    ) -> Result<T, Fault> {
        let op = body["op"].clone();
        let value = self.call(conn, body).await?;
        serde_json::from_value(value).map_err(|e| Fault::other(format!("bad {op} reply: {e}")))
    }
}

impl RemoteGateway for HttpGateway {
    type Connection = HttpConnection;

    async fn open(&self) -> Result<HttpConnection, Fault> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Fault::from_transport(e.to_string()))?;
        Ok(HttpConnection { client })
    }

    async fn login(
        &self,
        conn: &HttpConnection,
        username: &str,
        password: &str,
    ) -> Result<String, Fault> {
        self.call_as(
            conn,
            json!({ "op": "login", "username": username, "password": password }),
        )
        .await
    }

    async fn terminate_session(&self, conn: &HttpConnection, session_key: &str) -> Result<(), Fault> {
        self.call(conn, json!({ "op": "terminateSession", "sessionKey": session_key }))
            .await
            .map(|_| ())
    }

    async fn logout(&self, conn: &HttpConnection) -> Result<(), Fault> {
        self.call(conn, json!({ "op": "logout" })).await.map(|_| ())
    }

    async fn service_content(&self, conn: &HttpConnection) -> Result<ServiceContent, Fault> {
        self.call_as(conn, json!({ "op": "serviceContent" })).await
    }

    async fn invoke(
        &self,
        conn: &HttpConnection,
        target: &ManagedObjectReference,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, Fault> {
        self.call(
            conn,
            json!({ "op": "invoke", "target": target, "method": method, "args": args }),
        )
        .await
    }

    async fn get_property(
        &self,
        conn: &HttpConnection,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Value, Fault> {
        self.call(conn, json!({ "op": "getProperty", "obj": obj, "path": path }))
            .await
    }

    async fn list_objects(
        &self,
        conn: &HttpConnection,
        type_name: &str,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>, Fault> {
        self.call_as(
            conn,
            json!({ "op": "listObjects", "type": type_name, "properties": paths }),
        )
        .await
    }
}
