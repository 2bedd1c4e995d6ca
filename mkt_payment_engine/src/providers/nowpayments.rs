//! NOWPayments IPN callbacks.
//!
//! NOWPayments signs the JSON payload re-serialized with its object keys sorted lexicographically (recursively), using
//! HMAC-SHA512 keyed with the IPN secret. The hex digest arrives in `x-nowpayments-sig`. The `order_id` we passed when
//! creating the invoice is the checkout session id.
use std::fmt::Write;

use hmac::{Hmac, Mac};
use log::*;
use serde_json::Value;
use sha2::Sha512;

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

pub const NOWPAYMENTS_SIGNATURE_HEADER: &str = "x-nowpayments-sig";

#[derive(Debug, Clone, Copy, Default)]
pub struct NowPaymentsAdapter;

impl NowPaymentsAdapter {
    fn kind_for(payment_status: &str) -> Option<PaymentEventKind> {
        match payment_status {
            "finished" | "confirmed" => Some(PaymentEventKind::Confirmed),
            "confirming" | "sending" => Some(PaymentEventKind::Processing),
            "partially_paid" => Some(PaymentEventKind::PartiallyPaid),
            "failed" | "expired" => Some(PaymentEventKind::Failed),
            "refunded" => Some(PaymentEventKind::Refunded),
            // "waiting" means no funds have been seen yet
            _ => None,
        }
    }
}

/// Serializes `value` as compact JSON with every object's keys in lexicographic order.
pub fn sorted_json(value: &Value) -> String {
    let mut out = String::new();
    write_sorted(value, &mut out);
    out
}

fn write_sorted(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(key.clone()));
                if let Some(v) = map.get(key) {
                    write_sorted(v, out);
                }
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(item, out);
            }
            out.push(']');
        },
        scalar => {
            let _ = write!(out, "{scalar}");
        },
    }
}

impl PaymentProviderAdapter for NowPaymentsAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::NowPayments
    }

    fn signature_header(&self) -> &'static str {
        NOWPAYMENTS_SIGNATURE_HEADER
    }

    fn verify_signature(&self, secret: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
        let expected = decode_signature(signature)?;
        let value: Value = serde_json::from_slice(body).map_err(|e| SignatureError::InvalidBody(e.to_string()))?;
        let canonical = sorted_json(&value);
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(canonical.as_bytes());
        mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    fn normalize(&self, body: &[u8]) -> Result<Option<NormalizedEvent>, NormalizeError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(NormalizeError::InvalidJson("expected a JSON object".to_string()));
        }
        let status = value
            .get("payment_status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(NormalizeError::MissingField("payment_status"))?;
        let Some(kind) = Self::kind_for(&status) else {
            debug!("🪝 NOWPayments status {status} does not affect orders. Ignoring it.");
            return Ok(None);
        };
        let reference = value
            .get("order_id")
            .and_then(json_id)
            .ok_or_else(|| NormalizeError::MissingReference { event_type: status.clone() })?;
        let payment_id = value.get("payment_id").and_then(json_id);
        let key_base = payment_id.as_deref().unwrap_or(reference.as_str());
        let event_key = format!("{key_base}:{status}");
        let amount_hint =
            value.get("actually_paid").and_then(json_id).or_else(|| value.get("price_amount").and_then(json_id));
        Ok(Some(NormalizedEvent {
            provider: PaymentProvider::NowPayments,
            event_key,
            event_type: status,
            kind,
            reference,
            payment_id,
            amount_hint,
        }))
    }
}
