use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;

use crate::context::SessionContext;
use crate::session::LocationReport;

use super::{Uplink, UplinkError};

/// Posts reports to `{base_url}/gps` as JSON.
///
/// The bearer credential is read from the context on every request. A 401
/// signs the context out before the error is returned.
pub struct HttpUplink {
    client: reqwest::Client,
    endpoint: String,
    context: SessionContext,
}

impl HttpUplink {
    pub fn new(base_url: &str, context: SessionContext) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/gps", base_url.trim_end_matches('/')),
            context,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Uplink for HttpUplink {
    async fn submit(&self, report: &LocationReport) -> Result<(), UplinkError> {
        let mut request = self.client.post(&self.endpoint).json(report);
        if let Some(token) = self.context.credential() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UplinkError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected the credential, signing out");
            self.context.expire();
        }
        if !status.is_success() {
            return Err(UplinkError::Server {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        debug!("Report for vehicle {} accepted", report.vehicle_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AuthState, SignOutReason, VehicleId};
    use crate::position::PositionSample;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Backend {
        status: axum::http::StatusCode,
        seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn record(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> axum::http::StatusCode {
        let auth = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        backend.seen.lock().unwrap().push((auth, body));
        backend.status
    }

    async fn spawn_backend(status: axum::http::StatusCode) -> (String, Backend) {
        let backend = Backend {
            status,
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/api/gps", post(record))
            .with_state(backend.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/api/", addr), backend)
    }

    fn report() -> LocationReport {
        LocationReport::from_sample(
            VehicleId(42),
            &PositionSample::new(-6.2, 106.8, Some(2.5)),
        )
    }

    #[tokio::test]
    async fn posts_wire_payload_with_bearer_credential() {
        let (base_url, backend) = spawn_backend(axum::http::StatusCode::CREATED).await;
        let context = SessionContext::in_memory();
        context.set_credential("abc123".into());
        let uplink = HttpUplink::new(&base_url, context);
        assert!(uplink.endpoint().ends_with("/api/gps"));

        uplink.submit(&report()).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer abc123"));
        assert_eq!(
            seen[0].1,
            json!({"latitude": -6.2, "longitude": 106.8, "speed": 2.5, "vehicle_id": 42})
        );
    }

    #[tokio::test]
    async fn server_failure_is_reported_without_signing_out() {
        let (base_url, _backend) =
            spawn_backend(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let context = SessionContext::in_memory();
        context.set_credential("abc123".into());
        let uplink = HttpUplink::new(&base_url, context.clone());

        let err = uplink.submit(&report()).await.unwrap_err();

        assert!(matches!(err, UplinkError::Server { status: 500, .. }));
        assert_eq!(context.auth_state(), AuthState::SignedIn);
    }

    #[tokio::test]
    async fn unauthorized_clears_credential_and_vehicle() {
        let (base_url, _backend) = spawn_backend(axum::http::StatusCode::UNAUTHORIZED).await;
        let context = SessionContext::in_memory();
        context.set_credential("expired".into());
        context.select_vehicle(VehicleId(42));
        let uplink = HttpUplink::new(&base_url, context.clone());

        let err = uplink.submit(&report()).await.unwrap_err();

        assert!(matches!(err, UplinkError::Server { status: 401, .. }));
        assert_eq!(context.credential(), None);
        assert_eq!(context.selected_vehicle(), None);
        assert_eq!(
            context.auth_state(),
            AuthState::SignedOut(SignOutReason::Unauthorized)
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let uplink = HttpUplink::new(&format!("http://{}/api", addr), SessionContext::in_memory());

        let err = uplink.submit(&report()).await.unwrap_err();

        assert!(matches!(err, UplinkError::Network(_)));
    }
}
