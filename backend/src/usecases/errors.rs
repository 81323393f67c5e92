use axum::http::StatusCode;
use crates::{
    domain::value_objects::{fees::FeeError, splits::SplitError},
    payments::errors::StripeApiError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DonationError {
    #[error("{0}")]
    Validation(String),
    #[error("payment was declined: {0}")]
    ProcessorRejection(String),
    #[error("payment processor did not confirm the request ({0}); check the donation status before retrying")]
    Transient(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("charge {0} has not settled")]
    NotSettled(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DonationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DonationError::Validation(_) => StatusCode::BAD_REQUEST,
            DonationError::ProcessorRejection(_) => StatusCode::PAYMENT_REQUIRED,
            DonationError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            DonationError::NotFound(_) => StatusCode::NOT_FOUND,
            DonationError::NotSettled(_) => StatusCode::CONFLICT,
            DonationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StripeApiError> for DonationError {
    fn from(err: StripeApiError) -> Self {
        match err {
            StripeApiError::Rejected { message, .. } => DonationError::ProcessorRejection(message),
            StripeApiError::Transient { context, message } => {
                DonationError::Transient(format!("{context}: {message}"))
            }
            StripeApiError::InvalidSignature(reason) => {
                DonationError::Validation(format!("webhook rejected: {reason}"))
            }
            err @ StripeApiError::InvalidResponse { .. } => DonationError::Internal(err.into()),
        }
    }
}

impl From<FeeError> for DonationError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::InvalidModel => DonationError::Internal(err.into()),
            other => DonationError::Validation(other.to_string()),
        }
    }
}

impl From<SplitError> for DonationError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::MalformedSnapshot(_) | SplitError::NegativeAmount(_) => {
                DonationError::Internal(err.into())
            }
            other => DonationError::Validation(other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, DonationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_errors_keep_their_meaning() {
        let timeout: DonationError = StripeApiError::Transient {
            context: "create payment intent".to_string(),
            message: "request timed out".to_string(),
        }
        .into();
        assert_eq!(timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let declined: DonationError = StripeApiError::Rejected {
            context: "create payment intent".to_string(),
            status: 402,
            code: Some("card_declined".to_string()),
            message: "Your card was declined.".to_string(),
        }
        .into();
        assert_eq!(declined.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(declined.to_string(), "payment was declined: Your card was declined.");
    }

    #[test]
    fn donor_facing_validation_errors_are_bad_requests() {
        let err: DonationError = FeeError::BelowMinimum {
            amount: 50,
            minimum: 100,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: DonationError = SplitError::SumMismatch { total_bps: 9_900 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
