use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the marketplace needs to open a hosted Coinbase Commerce charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: String,
    pub name: String,
    pub description: String,
    /// Total in major units, formatted with two decimals.
    pub amount: String,
    pub currency: String,
    pub redirect_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LocalPrice<'a> {
    pub amount: &'a str,
    pub currency: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChargeMetadata<'a> {
    pub order_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChargeBody<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub pricing_type: &'static str,
    pub local_price: LocalPrice<'a>,
    pub metadata: ChargeMetadata<'a>,
    pub redirect_url: &'a str,
    pub cancel_url: &'a str,
}

impl<'a> From<&'a ChargeRequest> for ChargeBody<'a> {
    fn from(req: &'a ChargeRequest) -> Self {
        Self {
            name: &req.name,
            description: &req.description,
            pricing_type: "fixed_price",
            local_price: LocalPrice { amount: &req.amount, currency: &req.currency },
            metadata: ChargeMetadata { order_id: &req.order_id },
            redirect_url: &req.redirect_url,
            cancel_url: &req.cancel_url,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinbaseCharge {
    pub id: String,
    pub code: String,
    pub hosted_url: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChargeResponse {
    pub data: CoinbaseCharge,
}

/// What the marketplace needs to open a NOWPayments invoice. `order_id` is the checkout session id.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRequest {
    /// Total in major units.
    pub price_amount: f64,
    pub price_currency: String,
    pub order_id: String,
    pub order_description: String,
    pub ipn_callback_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NowPaymentsInvoice {
    /// NOWPayments sends this as a string in some API versions and as a number in others.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub invoice_url: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: serde::Deserializer<'de> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected a string or number, got {other}"))),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn charge_body_shape() {
        let req = ChargeRequest {
            order_id: "ord_1".into(),
            name: "Vintage camera".into(),
            description: "2 x Vintage camera".into(),
            amount: "210.00".into(),
            currency: "USD".into(),
            redirect_url: "https://shop/ok".into(),
            cancel_url: "https://shop/cancel".into(),
        };
        let body = serde_json::to_value(ChargeBody::from(&req)).unwrap();
        assert_eq!(body["pricing_type"], "fixed_price");
        assert_eq!(body["local_price"], json!({"amount": "210.00", "currency": "USD"}));
        assert_eq!(body["metadata"]["order_id"], "ord_1");
    }

    #[test]
    fn charge_response() {
        let raw = json!({"data": {"id": "f765421f", "code": "66BEOV2A", "hosted_url": "https://commerce/66BEOV2A",
            "expires_at": "2024-10-01T13:00:00Z", "pricing": {}}});
        let charge = serde_json::from_value::<ChargeResponse>(raw).unwrap().data;
        assert_eq!(charge.code, "66BEOV2A");
        assert!(charge.expires_at.is_some());
    }

    #[test]
    fn invoice_id_can_be_a_number() {
        let inv: NowPaymentsInvoice =
            serde_json::from_value(json!({"id": 4522625843u64, "invoice_url": "https://np/inv"})).unwrap();
        assert_eq!(inv.id, "4522625843");
        let inv: NowPaymentsInvoice = serde_json::from_value(json!({"id": "77", "invoice_url": "u"})).unwrap();
        assert_eq!(inv.id, "77");
    }
}
