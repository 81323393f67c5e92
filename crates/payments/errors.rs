use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StripeApiError {
    /// The processor answered and refused the request. Retrying the same request will not help.
    #[error("stripe rejected {context} (status {status}): {message}")]
    Rejected {
        context: String,
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Timeout, connection failure, rate limit or processor-side 5xx. The outcome is unknown.
    #[error("stripe request for {context} did not complete: {message}")]
    Transient { context: String, message: String },
    #[error("stripe returned an unreadable response for {context}: {message}")]
    InvalidResponse { context: String, message: String },
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
}

impl StripeApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StripeApiError::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StripeApiError::Rejected { status: 404, .. })
    }

    pub(crate) fn from_reqwest(context: &str, error: reqwest::Error) -> Self {
        // Never echo the request URL; it can carry ids we do not want in alerts.
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            "connection failed".to_string()
        } else if error.is_decode() {
            return StripeApiError::InvalidResponse {
                context: context.to_string(),
                message: "response body did not match the expected shape".to_string(),
            };
        } else {
            "request failed".to_string()
        };

        StripeApiError::Transient {
            context: context.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_transient() {
        let transient = StripeApiError::Transient {
            context: "create transfer".to_string(),
            message: "request timed out".to_string(),
        };
        let rejected = StripeApiError::Rejected {
            context: "create transfer".to_string(),
            status: 400,
            code: Some("balance_insufficient".to_string()),
            message: "Insufficient funds".to_string(),
        };

        assert!(transient.is_transient());
        assert!(!rejected.is_transient());
        assert!(!rejected.is_not_found());
    }
}
