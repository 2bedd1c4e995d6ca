use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mkt_common::Cents;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

fn random_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(20).map(char::from).collect();
    format!("{prefix}_{suffix}")
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(random_id("ord"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       SessionId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn random() -> Self {
        Self(random_id("cs"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order exists, but no payment has been confirmed yet.
    Pending,
    /// Payment has been confirmed and stock has been reserved for the buyer.
    Paid,
    /// The seller has marked the order as delivered. The buyer can raise a dispute until the order completes.
    Delivered,
    /// The order is closed. Either the buyer confirmed receipt, or the auto-complete window elapsed.
    Completed,
    /// The buyer raised a dispute after delivery. Only an operator can move the order out of this state.
    DisputeRaised,
    /// The payment failed, expired, or was cancelled before the order was paid.
    Cancelled,
    /// The payment was returned to the buyer.
    Refunded,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::DisputeRaised => "dispute_raised",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "dispute_raised" => Ok(Self::DisputeRaised),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment activity has been reported by the provider yet.
    Pending,
    /// The provider has seen a payment that is not yet final (e.g. awaiting confirmations).
    Processing,
    /// The provider has confirmed the payment in full.
    Paid,
    /// The payment arrived late or short. It can still be resolved by the provider.
    Delayed,
    /// The payment failed or expired.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Delayed => "delayed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

//--------------------------------------    PaymentProvider    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// Hosted on-chain charges. Orders are created up front and referenced in the charge metadata.
    Coinbase,
    /// Crypto invoices. A checkout session is created up front and referenced as the invoice `order_id`.
    NowPayments,
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coinbase => f.write_str("coinbase"),
            Self::NowPayments => f.write_str("nowpayments"),
        }
    }
}

impl From<String> for PaymentProvider {
    fn from(value: String) -> Self {
        match value.as_str() {
            "coinbase" => Self::Coinbase,
            "nowpayments" => Self::NowPayments,
            _ => {
                error!("Invalid payment provider: {value}. But this conversion cannot fail. Defaulting to coinbase");
                Self::Coinbase
            },
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// The unit amount of the listing at checkout time
    pub amount: Cents,
    pub quantity: i64,
    /// `amount * quantity` plus the service fee
    pub total_amount: Cents,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub payment_provider: PaymentProvider,
    /// The provider's reference for the payment. Unique per provider.
    pub payment_id: Option<String>,
    /// Set when the order needs the attention of an operator, e.g. after a partial payment.
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: Cents,
    pub quantity: i64,
    pub total_amount: Cents,
    pub payment_provider: PaymentProvider,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Creates a pending order for a synchronous checkout flow.
    pub fn pending(checkout: &CheckoutDetails, provider: PaymentProvider, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::random(),
            listing_id: checkout.listing_id.clone(),
            buyer_id: checkout.buyer_id.clone(),
            seller_id: checkout.seller_id.clone(),
            amount: checkout.amount,
            quantity: checkout.quantity,
            total_amount: checkout.total_amount(),
            payment_provider: provider,
            payment_id: None,
            created_at,
        }
    }

    /// The order that a checkout session turns into once its payment is confirmed.
    pub fn from_session(
        session: &CheckoutSession,
        provider: PaymentProvider,
        payment_id: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::random(),
            listing_id: session.listing_id.clone(),
            buyer_id: session.buyer_id.clone(),
            seller_id: session.seller_id.clone(),
            amount: session.amount,
            quantity: session.quantity,
            total_amount: session.total_amount,
            payment_provider: provider,
            payment_id: Some(payment_id.to_string()),
            created_at,
        }
    }
}

//--------------------------------------    CheckoutDetails    ---------------------------------------------------------
/// The validated purchase intent shared by both checkout flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Unit amount
    pub amount: Cents,
    pub quantity: i64,
    pub billing_email: Option<String>,
}

impl CheckoutDetails {
    pub fn subtotal(&self) -> Cents {
        self.amount * self.quantity
    }

    pub fn total_amount(&self) -> Cents {
        self.subtotal().with_service_fee()
    }
}

//--------------------------------------    CheckoutSession    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: Cents,
    pub quantity: i64,
    pub total_amount: Cents,
    pub billing_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The provider's payment id, once the provider has reported that a payment is under way.
    pub payment_id: Option<String>,
    pub payment_seen_at: Option<DateTime<Utc>>,
}

impl CheckoutSession {
    /// A session with a payment in flight must survive until the provider reports a final status.
    pub fn has_payment_in_flight(&self) -> bool {
        self.payment_seen_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub id: SessionId,
    pub details: CheckoutDetails,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCheckoutSession {
    pub fn new(details: CheckoutDetails, created_at: DateTime<Utc>) -> Self {
        Self { id: SessionId::random(), details, created_at, expires_at: None }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

//--------------------------------------        Listing        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub price: Cents,
    pub stock: i64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub price: Cents,
    pub stock: i64,
}

impl NewListing {
    pub fn new<S: Into<String>>(id: S, seller_id: S, price: Cents, stock: i64) -> Self {
        Self { id: id.into(), seller_id: seller_id.into(), title: String::default(), price, stock }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }
}

/// The result of an atomic conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    Decremented { remaining: i64 },
    InsufficientStock,
    ListingNotFound,
}

//--------------------------------------        Review         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub order_id: OrderId,
    pub listing_id: String,
    pub reviewer_id: String,
    pub seller_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub is_auto_generated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub order_id: OrderId,
    pub listing_id: String,
    pub reviewer_id: String,
    pub seller_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub is_auto_generated: bool,
    pub created_at: DateTime<Utc>,
}

impl NewReview {
    /// The review that is left on the buyer's behalf when they have not reviewed a completed order in time.
    pub fn automatic(order: &Order, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id.clone(),
            listing_id: order.listing_id.clone(),
            reviewer_id: order.buyer_id.clone(),
            seller_id: order.seller_id.clone(),
            rating: 5,
            comment: None,
            is_auto_generated: true,
            created_at,
        }
    }
}

//--------------------------------------     SystemMessage     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: Option<String>,
    pub body: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     WebhookEvent      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: PaymentProvider,
    pub event_key: String,
    pub event_type: String,
    pub reference: String,
    pub payment_id: Option<String>,
    pub outcome: String,
    pub received_at: DateTime<Utc>,
}
