//! Outbound lead delivery.

pub mod client;
pub mod payload;

pub use client::{DeliveryClient, DeliveryReceipt, HttpTransport, Transport};
pub use payload::WebhookPayload;
