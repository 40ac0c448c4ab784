use thiserror::Error;

/// Core tracking failures. The server maps these onto HTTP statuses:
/// `Validation` → 400, `NotFound` → 404, `OfferMismatch` → 400,
/// `NoRedirectTarget` → 404, `InvalidTemplate` → 500. `Upstream` is never
/// surfaced to the tracking caller — it is logged and swallowed.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A conversion postback named an offer that is not the one the click
    /// was recorded against.
    #[error("offer mismatch: click is bound to {expected:?}, postback names {got}")]
    OfferMismatch { expected: Option<i64>, got: i64 },

    /// The resolved destination is not a parseable URL.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Campaign has neither a usable lander nor an offer.
    #[error("no redirect target for campaign {0}")]
    NoRedirectTarget(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}
