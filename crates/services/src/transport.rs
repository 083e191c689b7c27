use async_trait::async_trait;
use thiserror::Error;

use tutor_core::model::UserId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound side of the messaging transport.
///
/// The core is agnostic to the wire encoding; `options` are reply choices
/// the transport may render as buttons. Delivery is at-least-once and send
/// failures never abort a user flow.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        user: UserId,
        text: &str,
        options: &[String],
    ) -> Result<(), TransportError>;
}
