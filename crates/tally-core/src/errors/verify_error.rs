//! Payment-verification errors from the gateway round trip.

/// Errors that can occur while confirming a payment with the gateway.
/// All of them surface to callers as a declined grant; the variants
/// exist so logs can distinguish "gateway down" from "payment rejected".
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Payment not succeeded: gateway reported status '{status}'")]
    Declined { status: String },

    #[error("Payment not found at the gateway")]
    NotFound,

    #[error("Gateway returned HTTP {status}")]
    Gateway { status: u16 },

    #[error("Gateway request failed: {message}")]
    Transport { message: String },
}
