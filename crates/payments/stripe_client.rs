use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::{debug, error};
use uuid::Uuid;

use super::errors::StripeApiError;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeClientConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_seconds: i64,
    pub request_timeout: Duration,
    pub api_base: Option<String>,
}

/// Processor client built on reqwest. Every call is bounded by the configured timeout.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance_seconds: i64,
    api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub application_fee_amount: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub transfer_data: Option<StripeTransferData>,
    pub latest_charge: Option<String>,
    pub last_payment_error: Option<serde_json::Value>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeTransferData {
    pub destination: String,
}

impl StripePaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    /// Canceled, or sent back for a new payment method after a declined attempt.
    pub fn is_failed(&self) -> bool {
        self.status == "canceled"
            || (self.status == "requires_payment_method" && self.last_payment_error.is_some())
    }

    pub fn destination(&self) -> Option<&str> {
        self.transfer_data
            .as_ref()
            .map(|transfer_data| transfer_data.destination.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeTransfer {
    pub id: String,
    pub amount: i64,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripePayout {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeAccount {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeExternalAccount {
    pub id: String,
    pub object: Option<String>,
    pub bank_name: Option<String>,
    pub last4: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub default_for_currency: bool,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub application_fee_amount: i64,
    pub metadata: Vec<(String, String)>,
    pub receipt_email: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTransferRequest {
    /// Holding account the funds leave from.
    pub source_account: String,
    pub destination: String,
    pub amount: i64,
    pub currency: String,
    pub transfer_group: String,
    pub metadata: Vec<(String, String)>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePayoutRequest {
    /// Holding account whose balance is paid out.
    pub account: String,
    /// External (bank) account attached to `account`.
    pub destination: String,
    pub amount: i64,
    pub currency: String,
    pub metadata: Vec<(String, String)>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateConnectedAccountRequest {
    pub organization_id: Uuid,
    pub email: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(config: StripeClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self {
            http,
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            webhook_tolerance_seconds: config.webhook_tolerance_seconds,
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> std::result::Result<reqwest::Response, StripeApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        let message = details
            .as_ref()
            .and_then(|details| details.message.clone())
            .unwrap_or_else(|| format!("http status {status}"));
        let code = details.as_ref().and_then(|details| details.code.clone());

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?code,
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.clone()),
            stripe_error_message = %message,
            context = %context,
            "stripe api request failed"
        );

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(StripeApiError::Transient {
                context: context.to_string(),
                message,
            });
        }

        Err(StripeApiError::Rejected {
            context: context.to_string(),
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
        stripe_account: Option<&str>,
    ) -> std::result::Result<T, StripeApiError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(form);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        if let Some(account) = stripe_account {
            request = request.header("Stripe-Account", account);
        }

        let resp = request
            .send()
            .await
            .map_err(|err| StripeApiError::from_reqwest(context, err))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .map_err(|err| StripeApiError::from_reqwest(context, err))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
        stripe_account: Option<&str>,
    ) -> std::result::Result<T, StripeApiError> {
        let mut request = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key));

        if let Some(account) = stripe_account {
            request = request.header("Stripe-Account", account);
        }

        let resp = request
            .send()
            .await
            .map_err(|err| StripeApiError::from_reqwest(context, err))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .map_err(|err| StripeApiError::from_reqwest(context, err))
    }

    /// Creates a destination charge: funds land on `destination`, minus the application fee.
    pub async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntentRequest,
    ) -> std::result::Result<StripePaymentIntent, StripeApiError> {
        // https://stripe.com/docs/connect/destination-charges
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                "transfer_data[destination]".to_string(),
                request.destination.clone(),
            ),
            (
                "application_fee_amount".to_string(),
                request.application_fee_amount.to_string(),
            ),
        ];

        if let Some(email) = request.receipt_email.as_ref() {
            form.push(("receipt_email".to_string(), email.clone()));
        }
        if let Some(description) = request.description.as_ref() {
            form.push(("description".to_string(), description.clone()));
        }
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.post_form(
            "/v1/payment_intents",
            "create payment intent",
            &form,
            Some(&request.idempotency_key),
            None,
        )
        .await
    }

    pub async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> std::result::Result<StripePaymentIntent, StripeApiError> {
        self.get_json(
            &format!("/v1/payment_intents/{payment_intent_id}"),
            "retrieve payment intent",
            None,
        )
        .await
    }

    /// Moves funds from the holding account's balance to another connected account.
    pub async fn create_transfer(
        &self,
        request: &CreateTransferRequest,
    ) -> std::result::Result<StripeTransfer, StripeApiError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("destination".to_string(), request.destination.clone()),
            ("transfer_group".to_string(), request.transfer_group.clone()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.post_form(
            "/v1/transfers",
            "create transfer",
            &form,
            Some(&request.idempotency_key),
            Some(&request.source_account),
        )
        .await
    }

    /// Pays the holding account's balance out to one of its external bank accounts.
    pub async fn create_payout(
        &self,
        request: &CreatePayoutRequest,
    ) -> std::result::Result<StripePayout, StripeApiError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("destination".to_string(), request.destination.clone()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.post_form(
            "/v1/payouts",
            "create payout",
            &form,
            Some(&request.idempotency_key),
            Some(&request.account),
        )
        .await
    }

    pub async fn create_connected_account(
        &self,
        request: &CreateConnectedAccountRequest,
    ) -> std::result::Result<StripeAccount, StripeApiError> {
        let mut form: Vec<(String, String)> = vec![
            ("type".to_string(), "express".to_string()),
            (
                "metadata[organization_id]".to_string(),
                request.organization_id.to_string(),
            ),
            (
                "capabilities[card_payments][requested]".to_string(),
                "true".to_string(),
            ),
            (
                "capabilities[transfers][requested]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(email) = request.email.as_ref() {
            form.push(("email".to_string(), email.clone()));
        }

        self.post_form(
            "/v1/accounts",
            "create connected account",
            &form,
            Some(&request.idempotency_key),
            None,
        )
        .await
    }

    /// Current capability flags of a connected account; onboarding flips them after creation.
    pub async fn retrieve_account(
        &self,
        account_id: &str,
    ) -> std::result::Result<StripeAccount, StripeApiError> {
        self.get_json(
            &format!("/v1/accounts/{account_id}"),
            "retrieve account",
            None,
        )
        .await
    }

    pub async fn list_external_accounts(
        &self,
        account_id: &str,
    ) -> std::result::Result<Vec<StripeExternalAccount>, StripeApiError> {
        let list: StripeList<StripeExternalAccount> = self
            .get_json(
                &format!("/v1/accounts/{account_id}/external_accounts?object=bank_account&limit=100"),
                "list external accounts",
                None,
            )
            .await?;
        Ok(list.data)
    }

    /// Verifies the `Stripe-Signature` header and parses the event.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<StripeEvent, StripeApiError> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
            self.webhook_tolerance_seconds,
        )?;

        let event: StripeEvent = serde_json::from_slice(payload).map_err(|err| {
            StripeApiError::InvalidResponse {
                context: "webhook event".to_string(),
                message: err.to_string(),
            }
        })?;
        debug!(event_id = ?event.id, event_type = %event.type_, "stripe webhook event parsed");
        Ok(event)
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

/// Checks an HMAC-SHA256 `t=...,v1=...` signature header against `payload`.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now_timestamp: i64,
    tolerance_seconds: i64,
) -> std::result::Result<(), StripeApiError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = rest.parse().ok();
        } else if let Some(rest) = part.strip_prefix("v1=") {
            if let Ok(decoded) = hex::decode(rest) {
                signatures.push(decoded);
            }
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| StripeApiError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeApiError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }
    if tolerance_seconds > 0 {
        // The timestamp is untrusted until the HMAC checks out; never let it overflow.
        let within_tolerance = now_timestamp
            .checked_sub(timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|skew| skew <= tolerance_seconds.unsigned_abs());
        if !within_tolerance {
            return Err(StripeApiError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| StripeApiError::InvalidSignature(err.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok());
    if !matched {
        return Err(StripeApiError::InvalidSignature(
            "no signature matched".to_string(),
        ));
    }

    Ok(())
}
