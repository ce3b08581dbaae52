//! Custom Axum extractors.
//!
//! `RequestCorrelationId` gives handlers the correlation identity of the
//! current request so it can be carried onto published envelopes.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use fleetline_core::CorrelationId;
use uuid::Uuid;

use crate::middleware::CORRELATION_ID_HEADER;

/// Correlation ID of the current HTTP request.
///
/// Prefers the ID stored in request extensions by the correlation
/// middleware. When the middleware is not installed, falls back to reading
/// the `X-Correlation-ID` header directly, generating a fresh UUID if the
/// header is absent or malformed. Extraction is infallible.
///
/// # Example
///
/// ```ignore
/// async fn register_car(
///     correlation: RequestCorrelationId,
///     Json(request): Json<RegisterCarRequest>,
/// ) -> Result<Json<PublishAck>, AppError> {
///     let envelope = Envelope::new(request.into_message())
///         .with_correlation_id(correlation.0);
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestCorrelationId(pub CorrelationId);

#[async_trait]
impl<S> FromRequestParts<S> for RequestCorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uuid = parts.extensions.get::<Uuid>().copied().unwrap_or_else(|| {
            parts
                .headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4)
        });

        Ok(Self(CorrelationId::from_uuid(uuid)))
    }
}
