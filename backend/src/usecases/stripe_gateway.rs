use async_trait::async_trait;
use crates::payments::{
    errors::StripeApiError,
    stripe_client::{
        CreateConnectedAccountRequest, CreatePaymentIntentRequest, CreatePayoutRequest,
        CreateTransferRequest, StripeAccount, StripeClient, StripeEvent, StripeExternalAccount,
        StripePaymentIntent, StripePayout, StripeTransfer,
    },
};

pub type GatewayResult<T> = std::result::Result<T, StripeApiError>;

/// The processor operations the settlement engine consumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> GatewayResult<StripePaymentIntent>;

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: String,
    ) -> GatewayResult<StripePaymentIntent>;

    async fn create_transfer(&self, request: CreateTransferRequest) -> GatewayResult<StripeTransfer>;

    async fn create_payout(&self, request: CreatePayoutRequest) -> GatewayResult<StripePayout>;

    async fn create_connected_account(
        &self,
        request: CreateConnectedAccountRequest,
    ) -> GatewayResult<StripeAccount>;

    async fn retrieve_account(&self, account_id: String) -> GatewayResult<StripeAccount>;

    async fn list_external_accounts(
        &self,
        account_id: String,
    ) -> GatewayResult<Vec<StripeExternalAccount>>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str)
    -> GatewayResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> GatewayResult<StripePaymentIntent> {
        StripeClient::create_payment_intent(self, &request).await
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: String,
    ) -> GatewayResult<StripePaymentIntent> {
        StripeClient::retrieve_payment_intent(self, &payment_intent_id).await
    }

    async fn create_transfer(&self, request: CreateTransferRequest) -> GatewayResult<StripeTransfer> {
        StripeClient::create_transfer(self, &request).await
    }

    async fn create_payout(&self, request: CreatePayoutRequest) -> GatewayResult<StripePayout> {
        StripeClient::create_payout(self, &request).await
    }

    async fn create_connected_account(
        &self,
        request: CreateConnectedAccountRequest,
    ) -> GatewayResult<StripeAccount> {
        StripeClient::create_connected_account(self, &request).await
    }

    async fn retrieve_account(&self, account_id: String) -> GatewayResult<StripeAccount> {
        StripeClient::retrieve_account(self, &account_id).await
    }

    async fn list_external_accounts(
        &self,
        account_id: String,
    ) -> GatewayResult<Vec<StripeExternalAccount>> {
        StripeClient::list_external_accounts(self, &account_id).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> GatewayResult<StripeEvent> {
        StripeClient::verify_webhook_signature(self, payload, signature)
    }
}
