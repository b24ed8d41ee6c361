use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// One purchasable line sent to the hosted checkout page. Amounts are in
/// minor units (cents); conversion from decimal prices happens before the
/// gateway boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub unit_amount: i64,
    pub quantity: i64,
}

#[derive(Clone, Debug)]
pub struct CreateSessionRequest {
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    /// Ledger order id carried through session metadata so webhooks can
    /// find their way back without relying on the redirect.
    pub order_id: i64,
}

/// A created hosted-checkout session: its id plus the URL to redirect
/// the customer to.
#[derive(Clone, Debug, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

/// Payment state of an existing session, fetched server-side.
#[derive(Clone, Debug)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: String,
    pub payment_intent: Option<String>,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PAYMENT_STATUS_PAID
    }
}

/// Boundary to the external payment processor. The rest of the crate
/// depends on this trait, never on the HTTP client directly.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError>;
}

/// Stripe-hosted checkout over the form-encoded REST API.
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(
        api_base: String,
        secret_key: String,
        timeout_secs: u64,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal(format!("gateway HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base,
            secret_key,
        })
    }

    fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("metadata[order_id]".into(), request.order_id.to_string()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                request.currency.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(description) = &item.description {
                form.push((
                    format!("line_items[{i}][price_data][product_data][description]"),
                    description.clone(),
                ));
            }
        }
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&Self::session_form(request))
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("session create failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, %body, "Gateway rejected session create");
            return Err(ServiceError::Gateway(format!(
                "session create returned {}",
                status
            )));
        }

        response
            .json::<GatewaySession>()
            .await
            .map_err(|e| ServiceError::Gateway(format!("session create decode failed: {}", e)))
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, session_id);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("session retrieve failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Gateway(format!(
                "session retrieve returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(format!("session retrieve decode failed: {}", e)))?;
        parse_session_status(&body)
            .ok_or_else(|| ServiceError::Gateway("session retrieve: malformed body".to_string()))
    }
}

fn parse_session_status(body: &Value) -> Option<SessionStatus> {
    Some(SessionStatus {
        id: body.get("id")?.as_str()?.to_string(),
        payment_status: body
            .get("payment_status")
            .and_then(Value::as_str)
            .unwrap_or("unpaid")
            .to_string(),
        payment_intent: extract_payment_intent(body.get("payment_intent")),
    })
}

/// `payment_intent` arrives as a bare id or as an expanded object.
fn extract_payment_intent(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// A verified webhook notification, reduced to the fields the order
/// flow acts on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub payment_intent: Option<String>,
    pub order_id: Option<i64>,
}

/// Computes the signature for a timestamped payload. Shared by
/// verification and by tests that forge valid headers.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Verifies the `t=...,v1=...` signature header against the raw payload,
/// then parses the event. Rejects stale timestamps to blunt replay.
pub fn verify_webhook(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<WebhookEvent, ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(ServiceError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }

    let age = (unix_now() - timestamp).unsigned_abs();
    if age > tolerance_secs {
        return Err(ServiceError::InvalidSignature(format!(
            "timestamp outside tolerance ({}s)",
            age
        )));
    }

    let expected = sign_payload(secret, timestamp, payload);
    if !candidates
        .iter()
        .any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()))
    {
        return Err(ServiceError::InvalidSignature(
            "signature mismatch".to_string(),
        ));
    }

    parse_webhook_event(payload)
}

fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, ServiceError> {
    let body: Value = serde_json::from_slice(payload)
        .map_err(|e| ServiceError::InvalidPayload(format!("not JSON: {}", e)))?;
    let event_type = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::InvalidPayload("missing event type".to_string()))?
        .to_string();

    let object = body.get("data").and_then(|d| d.get("object"));
    let session_id = object
        .and_then(|o| o.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let payment_intent = object.and_then(|o| extract_payment_intent(o.get("payment_intent")));
    let order_id = object
        .and_then(|o| o.get("metadata"))
        .and_then(|m| m.get("order_id"))
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        });

    Ok(WebhookEvent {
        event_type,
        session_id,
        payment_intent,
        order_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed_payload(order_id: i64) -> Vec<u8> {
        json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "object": {
                "id": "cs_test_1",
                "payment_intent": "pi_test_1",
                "metadata": { "order_id": order_id.to_string() }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = completed_payload(42);
        let ts = unix_now();
        let header = format!("t={},v1={}", ts, sign_payload("whsec_x", ts, &payload));

        let event = verify_webhook(&payload, &header, "whsec_x", 300).unwrap();
        assert_eq!(event.event_type, CHECKOUT_COMPLETED);
        assert_eq!(event.session_id.as_deref(), Some("cs_test_1"));
        assert_eq!(event.payment_intent.as_deref(), Some("pi_test_1"));
        assert_eq!(event.order_id, Some(42));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = completed_payload(1);
        let ts = unix_now();
        let header = format!("t={},v1={}", ts, sign_payload("other", ts, &payload));
        assert!(matches!(
            verify_webhook(&payload, &header, "whsec_x", 300),
            Err(ServiceError::InvalidSignature(_))
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = completed_payload(1);
        let ts = unix_now();
        let header = format!("t={},v1={}", ts, sign_payload("whsec_x", ts, &payload));
        let tampered = completed_payload(999);
        assert!(verify_webhook(&tampered, &header, "whsec_x", 300).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = completed_payload(1);
        let ts = unix_now() - 10_000;
        let header = format!("t={},v1={}", ts, sign_payload("whsec_x", ts, &payload));
        assert!(matches!(
            verify_webhook(&payload, &header, "whsec_x", 300),
            Err(ServiceError::InvalidSignature(_))
        ));
    }

    #[test]
    fn rejects_malformed_header() {
        let payload = completed_payload(1);
        assert!(verify_webhook(&payload, "v1=deadbeef", "whsec_x", 300).is_err());
        assert!(verify_webhook(&payload, "t=notanumber,v1=aa", "whsec_x", 300).is_err());
        assert!(verify_webhook(&payload, "", "whsec_x", 300).is_err());
    }

    #[test]
    fn parses_event_without_metadata() {
        let payload = json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "id": "cs_2" } }
        })
        .to_string()
        .into_bytes();
        let event = parse_webhook_event(&payload).unwrap();
        assert_eq!(event.order_id, None);
        assert_eq!(event.payment_intent, None);
    }

    #[test]
    fn payment_intent_accepts_expanded_object() {
        let expanded = json!({ "id": "pi_9", "status": "succeeded" });
        assert_eq!(
            extract_payment_intent(Some(&expanded)).as_deref(),
            Some("pi_9")
        );
        assert_eq!(
            extract_payment_intent(Some(&json!("pi_3"))).as_deref(),
            Some("pi_3")
        );
        assert_eq!(extract_payment_intent(Some(&json!(null))), None);
        assert_eq!(extract_payment_intent(None), None);
    }

    #[test]
    fn session_form_encodes_line_items() {
        let request = CreateSessionRequest {
            line_items: vec![LineItem {
                name: "Mug".into(),
                description: Some("Ceramic".into()),
                unit_amount: 1299,
                quantity: 2,
            }],
            success_url: "http://x/success".into(),
            cancel_url: "http://x/cancel".into(),
            currency: "usd".into(),
            order_id: 7,
        };
        let form = StripeGateway::session_form(&request);
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[order_id]"), Some("7"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1299"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("Mug")
        );
    }
}
