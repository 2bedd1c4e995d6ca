//! Coinbase Commerce webhooks.
//!
//! The signature is the hex HMAC-SHA256 of the raw body, sent in `X-CC-Webhook-Signature`. The event payload looks like
//!
//! ```json
//! { "id": "...", "type": "charge:confirmed", "data": { "id": "...", "code": "...", "metadata": { "order_id": "..." } } }
//! ```
//!
//! and some deliveries wrap it in an outer `{ "event": { ... } }` object.
use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::{
    db_types::PaymentProvider,
    providers::{
        decode_signature,
        json_id,
        NormalizeError,
        NormalizedEvent,
        PaymentEventKind,
        PaymentProviderAdapter,
        SignatureError,
    },
};

pub const COINBASE_SIGNATURE_HEADER: &str = "x-cc-webhook-signature";

#[derive(Debug, Clone, Copy, Default)]
pub struct CoinbaseAdapter;

#[derive(Debug, Deserialize)]
struct CoinbaseEvent {
    #[serde(default)]
    id: Value,
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    data: CoinbaseEventData,
}

#[derive(Debug, Default, Deserialize)]
struct CoinbaseEventData {
    #[serde(default)]
    id: Value,
    code: Option<String>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    pricing: Value,
}

impl CoinbaseAdapter {
    fn kind_for(event_type: &str) -> Option<PaymentEventKind> {
        let suffix = event_type.rsplit(':').next().unwrap_or(event_type);
        match suffix {
            "confirmed" | "completed" => Some(PaymentEventKind::Confirmed),
            "pending" => Some(PaymentEventKind::Processing),
            "failed" | "expired" => Some(PaymentEventKind::Failed),
            "delayed" | "underpaid" => Some(PaymentEventKind::Delayed),
            "resolved" => Some(PaymentEventKind::Resolved),
            _ => None,
        }
    }
}

impl PaymentProviderAdapter for CoinbaseAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Coinbase
    }

    fn signature_header(&self) -> &'static str {
        COINBASE_SIGNATURE_HEADER
    }

    fn verify_signature(&self, secret: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
        let expected = decode_signature(signature)?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(body);
        mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    fn normalize(&self, body: &[u8]) -> Result<Option<NormalizedEvent>, NormalizeError> {
        let mut value: Value =
            serde_json::from_slice(body).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
        let envelope = value.get_mut("event").filter(|v| v.is_object()).map(Value::take);
        if let Some(inner) = envelope {
            value = inner;
        }
        let event: CoinbaseEvent =
            serde_json::from_value(value).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
        let event_type = event.event_type.ok_or(NormalizeError::MissingField("type"))?;
        let Some(kind) = Self::kind_for(&event_type) else {
            debug!("🪝 Coinbase event {event_type} does not affect orders. Ignoring it.");
            return Ok(None);
        };
        let reference = event
            .data
            .metadata
            .get("order_id")
            .and_then(json_id)
            .ok_or_else(|| NormalizeError::MissingReference { event_type: event_type.clone() })?;
        let payment_id = json_id(&event.data.id).or(event.data.code);
        let event_key = json_id(&event.id).unwrap_or_else(|| {
            let key_base = payment_id.as_deref().unwrap_or(reference.as_str());
            format!("{key_base}:{event_type}")
        });
        let amount_hint = event.data.pricing.pointer("/local/amount").and_then(json_id);
        Ok(Some(NormalizedEvent {
            provider: PaymentProvider::Coinbase,
            event_key,
            event_type,
            kind,
            reference,
            payment_id,
            amount_hint,
        }))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn verifies_signatures_over_the_raw_body() {
        let body = br#"{"type":"charge:confirmed"}"#;
        let adapter = CoinbaseAdapter;
        let sig = sign("shh", body);
        assert!(adapter.verify_signature("shh", body, &sig).is_ok());
        assert!(adapter.verify_signature("shh", body, &sig.to_uppercase()).is_ok());
        assert_eq!(adapter.verify_signature("other", body, &sig), Err(SignatureError::Mismatch));
        assert_eq!(adapter.verify_signature("shh", br#"{"type":"charge:failed"}"#, &sig), Err(SignatureError::Mismatch));
        assert_eq!(adapter.verify_signature("shh", body, ""), Err(SignatureError::Missing));
        assert_eq!(adapter.verify_signature("shh", body, "not-hex"), Err(SignatureError::Malformed));
    }

    #[test]
    fn normalizes_confirmed_charge() {
        let body = json!({
            "id": "evt_1",
            "type": "charge:confirmed",
            "data": {
                "id": "chg_1",
                "code": "ABCD",
                "metadata": { "order_id": "ord_1" },
                "pricing": { "local": { "amount": "105.00", "currency": "USD" } }
            }
        });
        let ev = CoinbaseAdapter.normalize(body.to_string().as_bytes()).unwrap().unwrap();
        assert_eq!(ev.provider, PaymentProvider::Coinbase);
        assert_eq!(ev.kind, PaymentEventKind::Confirmed);
        assert_eq!(ev.event_key, "evt_1");
        assert_eq!(ev.reference, "ord_1");
        assert_eq!(ev.payment_id.as_deref(), Some("chg_1"));
        assert_eq!(ev.amount_hint.as_deref(), Some("105.00"));
    }

    #[test]
    fn unwraps_event_envelope_and_derives_key() {
        let body = json!({
            "event": { "type": "charge:delayed", "data": { "code": "ABCD", "metadata": { "order_id": "ord_2" } } }
        });
        let ev = CoinbaseAdapter.normalize(body.to_string().as_bytes()).unwrap().unwrap();
        assert_eq!(ev.kind, PaymentEventKind::Delayed);
        assert_eq!(ev.payment_id.as_deref(), Some("ABCD"));
        assert_eq!(ev.event_key, "ABCD:charge:delayed");
    }

    #[test]
    fn event_vocabulary() {
        let cases = [
            ("charge:confirmed", Some(PaymentEventKind::Confirmed)),
            ("charge:completed", Some(PaymentEventKind::Confirmed)),
            ("charge:pending", Some(PaymentEventKind::Processing)),
            ("charge:failed", Some(PaymentEventKind::Failed)),
            ("charge:delayed", Some(PaymentEventKind::Delayed)),
            ("charge:resolved", Some(PaymentEventKind::Resolved)),
            ("charge:created", None),
            ("invoice:viewed", None),
        ];
        for (event_type, expected) in cases {
            assert_eq!(CoinbaseAdapter::kind_for(event_type), expected, "{event_type}");
        }
    }

    #[test]
    fn irrelevant_events_are_ignored_even_without_reference() {
        let body = json!({ "id": "evt_3", "type": "charge:created", "data": {} });
        assert_eq!(CoinbaseAdapter.normalize(body.to_string().as_bytes()).unwrap(), None);
    }

    #[test]
    fn malformed_bodies() {
        assert!(matches!(CoinbaseAdapter.normalize(b"not json"), Err(NormalizeError::InvalidJson(_))));
        let no_type = json!({ "data": {} }).to_string();
        assert_eq!(CoinbaseAdapter.normalize(no_type.as_bytes()), Err(NormalizeError::MissingField("type")));
        let no_ref = json!({ "type": "charge:confirmed", "data": { "id": "chg" } }).to_string();
        assert!(matches!(CoinbaseAdapter.normalize(no_ref.as_bytes()), Err(NormalizeError::MissingReference { .. })));
    }
}
