//! HTTP/JSON clients for the external collaborators.
//!
//! One small JSON client on top of hyper, and one adapter per collaborator
//! trait mapping transport failures onto that trait's error type.
//!
//! | Collaborator | Call |
//! |---|---|
//! | endpoint registry | `GET {registry_url}/endpoints[?type=ATM]` |
//! | probe agent | `POST {probe_url}/ping` `{ip_address, endpoint_type}` |
//! | alarm feed | `GET {alarm_url}/alarms` |
//! | helpdesk | `POST {ticketing_url}/tickets` |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use linkwatch_alarms::{AlarmFeed, AlarmFeedError, RawAlarm};
use linkwatch_health::{ProbeTransport, RawProbeReport, TransportError};
use linkwatch_incident::{IncidentTicketRequest, TicketRef, TicketingError, TicketingService};
use linkwatch_state::{
    EndpointFilter, EndpointRegistry, EndpointType, NetworkEndpoint, RegistryError,
};

const USER_AGENT: &str = concat!("linkwatchd/", env!("CARGO_PKG_VERSION"));

/// Upper bound for one collaborator round trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of one HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// List payloads come either bare or wrapped in a `data` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Wrapped { data } => data,
            ListBody::Bare(items) => items,
        }
    }
}

/// Minimal JSON-over-HTTP/1 client bound to one base URL.
#[derive(Clone)]
pub struct JsonClient {
    base_url: String,
    timeout: Duration,
    http: Client<HttpConnector, Full<Bytes>>,
}

impl JsonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_CALL_TIMEOUT,
            http: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CallError> {
        let bytes = self.send(Method::GET, path, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| CallError::Decode(e.to_string()))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, CallError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| CallError::Request(e.to_string()))?;
        let bytes = self.send(Method::POST, path, Some(payload)).await?;
        serde_json::from_slice(&bytes).map_err(|e| CallError::Decode(e.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, CallError> {
        let uri = format!("{}{}", self.base_url, path);

        let mut builder = http::Request::builder()
            .method(method)
            .uri(&uri)
            .header("user-agent", USER_AGENT)
            .header("accept", "application/json");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| CallError::Request(e.to_string()))?;

        let call = async {
            let resp = self.http.request(req).await.map_err(|e| {
                debug!(error = %e, %uri, "collaborator request failed");
                CallError::Connect(e.to_string())
            })?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| CallError::Connect(e.to_string()))?
                .to_bytes();
            if !status.is_success() {
                debug!(%status, %uri, "collaborator non-2xx");
                return Err(CallError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Ok(bytes)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%uri, "collaborator request timed out");
                Err(CallError::Timeout)
            }
        }
    }
}

// ── Endpoint registry ──────────────────────────────────────────

pub struct HttpRegistry {
    client: JsonClient,
}

impl HttpRegistry {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointRegistry for HttpRegistry {
    async fn list_endpoints(
        &self,
        filter: &EndpointFilter,
    ) -> Result<Vec<NetworkEndpoint>, RegistryError> {
        let path = match filter.endpoint_type {
            Some(kind) => format!("/endpoints?type={kind}"),
            None => "/endpoints".to_string(),
        };
        let body: ListBody<NetworkEndpoint> =
            self.client.get_json(&path).await.map_err(|e| match e {
                CallError::Decode(msg) => RegistryError::Malformed(msg),
                other => RegistryError::Unavailable(other.to_string()),
            })?;

        // Search is applied here so registries without search support work too.
        Ok(body
            .into_vec()
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }
}

// ── Probe agent ────────────────────────────────────────────────

#[derive(Serialize)]
struct PingRequest<'a> {
    ip_address: &'a str,
    endpoint_type: EndpointType,
}

pub struct HttpProbeTransport {
    client: JsonClient,
}

impl HttpProbeTransport {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn check(
        &self,
        ip_address: &str,
        endpoint_type: EndpointType,
    ) -> Result<RawProbeReport, TransportError> {
        let request = PingRequest {
            ip_address,
            endpoint_type,
        };
        self.client
            .post_json("/ping", &request)
            .await
            .map_err(|e| match e {
                CallError::Timeout => TransportError::Timeout,
                CallError::Connect(msg) => TransportError::Unreachable(msg),
                CallError::Decode(msg) => TransportError::Malformed(msg),
                CallError::Status { status, body } if (400..500).contains(&status) => {
                    TransportError::Refused(format!("{status}: {body}"))
                }
                other => TransportError::Other(other.to_string()),
            })
    }
}

// ── Alarm feed ─────────────────────────────────────────────────

pub struct HttpAlarmFeed {
    client: JsonClient,
}

impl HttpAlarmFeed {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlarmFeed for HttpAlarmFeed {
    async fn list_current_alarms(&self) -> Result<Vec<RawAlarm>, AlarmFeedError> {
        let body: ListBody<RawAlarm> =
            self.client.get_json("/alarms").await.map_err(|e| match e {
                CallError::Decode(msg) => AlarmFeedError::Malformed(msg),
                other => AlarmFeedError::Unavailable(other.to_string()),
            })?;
        Ok(body.into_vec())
    }
}

// ── Helpdesk ───────────────────────────────────────────────────

pub struct HttpTicketing {
    client: JsonClient,
}

impl HttpTicketing {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TicketingService for HttpTicketing {
    async fn create_incident_ticket(
        &self,
        request: &IncidentTicketRequest,
    ) -> Result<TicketRef, TicketingError> {
        self.client
            .post_json("/tickets", request)
            .await
            .map_err(|e| match e {
                CallError::Status { status, body } => TicketingError::Rejected {
                    status,
                    message: body,
                },
                CallError::Decode(msg) => TicketingError::Malformed(msg),
                other => TicketingError::Unavailable(other.to_string()),
            })
    }
}

/// Stand-in when no helpdesk is configured; every request fails.
pub struct NoTicketing;

#[async_trait]
impl TicketingService for NoTicketing {
    async fn create_incident_ticket(
        &self,
        _request: &IncidentTicketRequest,
    ) -> Result<TicketRef, TicketingError> {
        Err(TicketingError::Unavailable(
            "no ticketing service configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Json;
    use axum::Router;
    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::{json, Value};

    /// Serve `router` on an ephemeral port; returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn endpoints_json() -> Value {
        json!([
            {"id": "br-1", "endpoint_type": "BRANCH", "code": "001", "name": "Main Office",
             "location": "Harbour Street", "ip_address": "10.0.0.1"},
            {"id": "atm-1", "endpoint_type": "ATM", "code": "0126", "name": "0126",
             "ip_address": "10.0.1.1", "branch_id": "br-1"}
        ])
    }

    #[tokio::test]
    async fn registry_accepts_bare_and_wrapped_lists() {
        let bare = serve(Router::new().route("/endpoints", get(|| async { Json(endpoints_json()) }))).await;
        let registry = HttpRegistry::new(JsonClient::new(&bare));
        let all = registry.list_endpoints(&EndpointFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].branch_id.as_deref(), Some("br-1"));

        let wrapped = serve(Router::new().route(
            "/endpoints",
            get(|| async { Json(json!({"success": true, "data": endpoints_json()})) }),
        ))
        .await;
        let registry = HttpRegistry::new(JsonClient::new(&wrapped));
        let filter = EndpointFilter {
            endpoint_type: None,
            search: Some("harbour".to_string()),
        };
        let hits = registry.list_endpoints(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "br-1");
    }

    #[tokio::test]
    async fn registry_passes_type_upstream() {
        let base = serve(Router::new().route(
            "/endpoints",
            get(|RawQuery(query): RawQuery| async move {
                assert_eq!(query.as_deref(), Some("type=ATM"));
                Json(endpoints_json())
            }),
        ))
        .await;
        let registry = HttpRegistry::new(JsonClient::new(&base));
        let atms = registry
            .list_endpoints(&EndpointFilter::of_type(EndpointType::Atm))
            .await
            .unwrap();
        assert_eq!(atms.len(), 1);
    }

    #[tokio::test]
    async fn registry_error_mapping() {
        let base = serve(Router::new().route("/endpoints", get(|| async { "not json" }))).await;
        let err = HttpRegistry::new(JsonClient::new(&base))
            .list_endpoints(&EndpointFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Malformed(_)));

        let base = serve(Router::new().route(
            "/endpoints",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;
        let err = HttpRegistry::new(JsonClient::new(&base))
            .list_endpoints(&EndpointFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn probe_posts_address_and_parses_report() {
        let base = serve(Router::new().route(
            "/ping",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["ip_address"], "10.0.1.1");
                assert_eq!(body["endpoint_type"], "ATM");
                Json(json!({"status": "ONLINE", "response_time_ms": 42.0, "packet_loss": 0.0}))
            }),
        ))
        .await;
        let transport = HttpProbeTransport::new(JsonClient::new(&base));
        let report = transport.check("10.0.1.1", EndpointType::Atm).await.unwrap();
        assert_eq!(report.status, "ONLINE");
        assert_eq!(report.response_time_ms, Some(42.0));
    }

    #[tokio::test]
    async fn probe_timeout_and_unreachable() {
        let base = serve(Router::new().route(
            "/ping",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({"status": "ONLINE"}))
            }),
        ))
        .await;
        let transport =
            HttpProbeTransport::new(JsonClient::new(&base).with_timeout(Duration::from_millis(50)));
        let err = transport.check("10.0.0.1", EndpointType::Branch).await.unwrap_err();
        assert_eq!(err, TransportError::Timeout);

        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = HttpProbeTransport::new(JsonClient::new(&format!("http://{addr}")));
        let err = transport.check("10.0.0.1", EndpointType::Branch).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
    }

    #[tokio::test]
    async fn alarm_feed_lists_alarms() {
        let base = serve(Router::new().route(
            "/alarms",
            get(|| async {
                Json(json!({"data": [
                    {"device_code": "0126", "alarm_type": "Cash Low", "occurred_at": "2026-01-01T08:00:00Z"},
                    {"device_code": "0127", "alarm_type": "Door Open"}
                ]}))
            }),
        ))
        .await;
        let alarms = HttpAlarmFeed::new(JsonClient::new(&base))
            .list_current_alarms()
            .await
            .unwrap();
        assert_eq!(alarms.len(), 2);
        assert!(alarms[0].occurred_at.is_some());
        assert!(alarms[1].occurred_at.is_none());
    }

    fn ticket_request() -> IncidentTicketRequest {
        use chrono::Utc;
        use linkwatch_incident::{IncidentType, TicketPriority};
        use linkwatch_state::{EndpointStatus, HealthCheckResult, IpRole};

        IncidentTicketRequest {
            endpoint_id: "atm-1".to_string(),
            endpoint_type: EndpointType::Atm,
            code: "0126".to_string(),
            incident_type: IncidentType::Outage,
            priority: TicketPriority::High,
            service_name: "ATM Network Outage - Transaction Processing Failure".to_string(),
            title: "[AUTO] ATM Network OUTAGE - 0126".to_string(),
            description: "AUTOMATED NETWORK INCIDENT REPORT".to_string(),
            network_media: None,
            branch_id: Some("br-1".to_string()),
            ping_result: HealthCheckResult {
                endpoint_id: "atm-1".to_string(),
                status: EndpointStatus::Offline,
                response_time_ms: None,
                packet_loss: Some(100.0),
                error_message: Some("Request timed out".to_string()),
                checked_at: Utc::now(),
                ip_address: "10.0.1.1".to_string(),
                ip_role: IpRole::Primary,
            },
        }
    }

    #[tokio::test]
    async fn ticketing_created_and_rejected() {
        let base = serve(Router::new().route(
            "/tickets",
            post(|Json(body): Json<Value>| async move {
                if body["code"] == "0126" {
                    (StatusCode::CREATED, Json(json!({"ticket_id": "T-77", "ticket_number": "77"})))
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "unknown service"})))
                }
            }),
        ))
        .await;
        let helpdesk = HttpTicketing::new(JsonClient::new(&base));

        let ticket = helpdesk.create_incident_ticket(&ticket_request()).await.unwrap();
        assert_eq!(ticket.ticket_id, "T-77");

        let mut request = ticket_request();
        request.code = "9999".to_string();
        let err = helpdesk.create_incident_ticket(&request).await.unwrap_err();
        assert!(matches!(err, TicketingError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn no_ticketing_always_fails() {
        let err = NoTicketing
            .create_incident_ticket(&ticket_request())
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Unavailable(_)));
    }
}
