use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokri_core::activity::{record, ActivityEntry, ActivityLogRepository};

/// Connection settings for the Steadfast partner API. Credentials are
/// optional: an instance without them is a valid configuration state and
/// every call degrades to `ServiceUnavailable`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub timeout_secs: u64,
}

/// One error type for every way a courier call can fail, so callers need
/// a single catch path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CourierError {
    #[error("Courier partner is not configured")]
    ServiceUnavailable,

    #[error("No response from courier partner")]
    NoResponse,

    #[error("Courier partner rejected the request ({status}): {body}")]
    PartnerRejected { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub invoice: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub cod_amount: i64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentResult {
    pub consignment_id: i64,
    pub tracking_code: String,
    pub status_raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub current_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    pub invoice: String,
    pub pickup_address: String,
    pub pickup_phone: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupResult {
    pub consignment_id: i64,
    pub tracking_code: String,
    pub status_raw: String,
}

/// Typed client for the courier partner's HTTP API.
#[async_trait]
pub trait CourierApi: Send + Sync {
    async fn dispatch(&self, request: &ShipmentRequest) -> Result<ShipmentResult, CourierError>;

    /// Raw partner status for a tracking code; mapping to the internal
    /// vocabulary is the Status Mapper's job.
    async fn query_status(&self, tracking_id: &str) -> Result<String, CourierError>;

    async fn list_destinations(&self) -> Result<Vec<Destination>, CourierError>;

    async fn get_balance(&self) -> Result<Balance, CourierError>;

    async fn request_return_pickup(
        &self,
        request: &PickupRequest,
    ) -> Result<PickupResult, CourierError>;
}

struct Credentials {
    api_key: String,
    secret_key: String,
}

pub struct SteadfastClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    activity: Arc<dyn ActivityLogRepository>,
    destination_cache: Mutex<Option<Vec<Destination>>>,
}

// Partner response envelopes

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    consignment: ConsignmentPayload,
}

#[derive(Debug, Deserialize)]
struct ConsignmentPayload {
    consignment_id: i64,
    tracking_code: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    delivery_status: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    current_balance: f64,
}

#[derive(Debug, Deserialize)]
struct DestinationsResponse {
    data: Vec<Destination>,
}

impl SteadfastClient {
    pub fn new(
        config: &CourierConfig,
        activity: Arc<dyn ActivityLogRepository>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let credentials = match (&config.api_key, &config.secret_key) {
            (Some(api_key), Some(secret_key)) => Some(Credentials {
                api_key: api_key.clone(),
                secret_key: secret_key.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            activity,
            destination_cache: Mutex::new(None),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&Credentials, CourierError> {
        self.credentials
            .as_ref()
            .ok_or(CourierError::ServiceUnavailable)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, CourierError> {
        let creds = self.credentials()?;
        self.http
            .get(self.url(path))
            .header("Api-Key", &creds.api_key)
            .header("Secret-Key", &creds.secret_key)
            .send()
            .await
            .map_err(|_| CourierError::NoResponse)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, CourierError> {
        let creds = self.credentials()?;
        self.http
            .post(self.url(path))
            .header("Api-Key", &creds.api_key)
            .header("Secret-Key", &creds.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|_| CourierError::NoResponse)
    }

    /// Collapse non-2xx into `PartnerRejected` with the raw body, then
    /// decode the payload. A 2xx body that fails to decode is also the
    /// partner's fault and keeps the same variant.
    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CourierError> {
        let status = response.status();
        let body = response.text().await.map_err(|_| CourierError::NoResponse)?;

        if !status.is_success() {
            return Err(CourierError::PartnerRejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|_| CourierError::PartnerRejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Write the attempt to the activity log before the caller sees the
    /// outcome. A log failure is reported on the tracing channel only and
    /// never replaces the original result.
    async fn log_attempt(&self, action: &str, meta: serde_json::Value, error: Option<&CourierError>) {
        let entry = match error {
            None => ActivityEntry::new("system:courier", action, "courier").meta(meta),
            Some(e) => ActivityEntry::new(
                "system:courier",
                &format!("{}_failed", action),
                "courier",
            )
            .meta(serde_json::json!({ "request": meta, "error": e.to_string() })),
        };
        record(self.activity.as_ref(), entry).await;
    }
}

#[async_trait]
impl CourierApi for SteadfastClient {
    async fn dispatch(&self, request: &ShipmentRequest) -> Result<ShipmentResult, CourierError> {
        let outcome = async {
            let response = self.post("create_order", request).await?;
            let payload: CreateOrderResponse = Self::decode(response).await?;
            Ok(ShipmentResult {
                consignment_id: payload.consignment.consignment_id,
                tracking_code: payload.consignment.tracking_code,
                status_raw: payload.consignment.status,
            })
        }
        .await;

        self.log_attempt(
            "courier_create",
            serde_json::json!({ "invoice": request.invoice, "cod_amount": request.cod_amount }),
            outcome.as_ref().err(),
        )
        .await;
        outcome
    }

    async fn query_status(&self, tracking_id: &str) -> Result<String, CourierError> {
        let outcome = async {
            let response = self
                .get(&format!("status_by_trackingcode/{}", tracking_id))
                .await?;
            let payload: StatusResponse = Self::decode(response).await?;
            Ok(payload.delivery_status)
        }
        .await;

        self.log_attempt(
            "courier_status_check",
            serde_json::json!({ "tracking_id": tracking_id }),
            outcome.as_ref().err(),
        )
        .await;
        outcome
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, CourierError> {
        let outcome = async {
            let response = self.get("police_stations").await?;
            let payload: DestinationsResponse = Self::decode(response).await?;
            Ok(payload.data)
        }
        .await;

        self.log_attempt("courier_destinations", serde_json::json!({}), outcome.as_ref().err())
            .await;

        match outcome {
            Ok(destinations) => {
                *self.destination_cache.lock().unwrap() = Some(destinations.clone());
                Ok(destinations)
            }
            // Degrade to the last good list when the partner is down or
            // unconfigured; only fail when we have nothing to serve.
            Err(e) => match self.destination_cache.lock().unwrap().clone() {
                Some(cached) => Ok(cached),
                None => Err(e),
            },
        }
    }

    async fn get_balance(&self) -> Result<Balance, CourierError> {
        let outcome = async {
            let response = self.get("get_balance").await?;
            let payload: BalanceResponse = Self::decode(response).await?;
            Ok(Balance {
                current_balance: payload.current_balance,
            })
        }
        .await;

        self.log_attempt("courier_balance", serde_json::json!({}), outcome.as_ref().err())
            .await;
        outcome
    }

    async fn request_return_pickup(
        &self,
        request: &PickupRequest,
    ) -> Result<PickupResult, CourierError> {
        let outcome = async {
            let response = self.post("create_return_request", request).await?;
            let payload: CreateOrderResponse = Self::decode(response).await?;
            Ok(PickupResult {
                consignment_id: payload.consignment.consignment_id,
                tracking_code: payload.consignment.tracking_code,
                status_raw: payload.consignment.status,
            })
        }
        .await;

        self.log_attempt(
            "courier_return_pickup",
            serde_json::json!({ "invoice": request.invoice }),
            outcome.as_ref().err(),
        )
        .await;
        outcome
    }
}

/// Scriptable in-process courier for tests and local development.
#[derive(Default)]
pub struct MockCourier {
    dispatch_queue: Mutex<std::collections::VecDeque<Result<ShipmentResult, CourierError>>>,
    pickup_queue: Mutex<std::collections::VecDeque<Result<PickupResult, CourierError>>>,
    statuses: Mutex<std::collections::HashMap<String, String>>,
    status_errors: Mutex<std::collections::VecDeque<CourierError>>,
    pub dispatch_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl MockCourier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next dispatch outcome; with an empty queue the mock
    /// succeeds with a generated tracking code.
    pub fn push_dispatch(&self, result: Result<ShipmentResult, CourierError>) {
        self.dispatch_queue.lock().unwrap().push_back(result);
    }

    pub fn push_pickup(&self, result: Result<PickupResult, CourierError>) {
        self.pickup_queue.lock().unwrap().push_back(result);
    }

    /// Queue an error for the next status query, ahead of any mapped
    /// status.
    pub fn push_status_error(&self, error: CourierError) {
        self.status_errors.lock().unwrap().push_back(error);
    }

    pub fn set_status(&self, tracking_id: &str, raw: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(tracking_id.to_string(), raw.to_string());
    }

    fn generated_shipment() -> ShipmentResult {
        ShipmentResult {
            consignment_id: 9000,
            tracking_code: format!("TRK{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            status_raw: "pending".to_string(),
        }
    }
}

#[async_trait]
impl CourierApi for MockCourier {
    async fn dispatch(&self, _request: &ShipmentRequest) -> Result<ShipmentResult, CourierError> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.dispatch_queue.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => Ok(Self::generated_shipment()),
        }
    }

    async fn query_status(&self, tracking_id: &str) -> Result<String, CourierError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.status_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(tracking_id)
            .cloned()
            .unwrap_or_else(|| "pending".to_string()))
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, CourierError> {
        Ok(vec![Destination {
            id: 1,
            name: "Dhaka".to_string(),
        }])
    }

    async fn get_balance(&self) -> Result<Balance, CourierError> {
        Ok(Balance {
            current_balance: 0.0,
        })
    }

    async fn request_return_pickup(
        &self,
        _request: &PickupRequest,
    ) -> Result<PickupResult, CourierError> {
        let queued = self.pickup_queue.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => Ok(PickupResult {
                consignment_id: 9100,
                tracking_code: format!("RTN{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
                status_raw: "pending".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SinkLog {
        entries: Mutex<Vec<ActivityEntry>>,
    }

    impl SinkLog {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ActivityLogRepository for SinkLog {
        async fn append(
            &self,
            entry: &ActivityEntry,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn unconfigured_client(log: Arc<SinkLog>) -> SteadfastClient {
        SteadfastClient::new(
            &CourierConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
                secret_key: None,
                timeout_secs: 1,
            },
            log,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_fast() {
        let log = SinkLog::new();
        let client = unconfigured_client(log.clone());

        let result = client
            .dispatch(&ShipmentRequest {
                invoice: "INV-1".to_string(),
                recipient_name: "Rahim".to_string(),
                recipient_phone: "01700000000".to_string(),
                recipient_address: "House 1, Road 2".to_string(),
                cod_amount: 500,
                note: None,
            })
            .await;

        assert!(matches!(result, Err(CourierError::ServiceUnavailable)));
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_failure_is_logged_before_return() {
        let log = SinkLog::new();
        let client = unconfigured_client(log.clone());

        let _ = client.query_status("TRK123").await;

        let entries = log.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "courier_status_check_failed");
        assert_eq!(entries[0].meta["request"]["tracking_id"], "TRK123");
    }

    #[tokio::test]
    async fn test_destinations_have_no_cache_when_never_fetched() {
        let log = SinkLog::new();
        let client = unconfigured_client(log);

        let result = client.list_destinations().await;
        assert!(matches!(result, Err(CourierError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn test_mock_courier_queues_failures() {
        let mock = MockCourier::new();
        mock.push_dispatch(Err(CourierError::NoResponse));

        let request = ShipmentRequest {
            invoice: "INV-2".to_string(),
            recipient_name: "Karim".to_string(),
            recipient_phone: "01800000000".to_string(),
            recipient_address: "Flat 3B".to_string(),
            cod_amount: 700,
            note: None,
        };

        assert!(matches!(
            mock.dispatch(&request).await,
            Err(CourierError::NoResponse)
        ));
        // Queue drained, next call succeeds
        assert!(mock.dispatch(&request).await.is_ok());
        assert_eq!(mock.dispatch_calls.load(Ordering::SeqCst), 2);
    }
}
