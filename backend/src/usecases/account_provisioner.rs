use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use crates::{
    domain::{
        entities::organizations::{OrganizationEntity, UpdatePaymentDestinationEntity},
        repositories::organizations::OrganizationRepository,
        value_objects::organizations::{ExternalAccountDto, PaymentDestinationDto},
    },
    payments::stripe_client::{CreateConnectedAccountRequest, StripeAccount},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{DonationError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

/// Per-key async mutexes. An entry lives only while someone holds or waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub async fn lock(&self, key: Uuid) -> KeyedLockGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // A waiter cancelled after the holder let go leaves an idle entry behind.
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = mutex.lock_owned().await;

        KeyedLockGuard {
            key,
            owner: self,
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct KeyedLockGuard<'a> {
    key: Uuid,
    owner: &'a KeyedLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());

        // Only the map's own reference left: nobody is waiting.
        if locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

pub struct AccountProvisioner<O, G>
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    organization_repo: Arc<O>,
    stripe: Arc<G>,
    locks: KeyedLocks,
}

impl<O, G> AccountProvisioner<O, G>
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(organization_repo: Arc<O>, stripe: Arc<G>) -> Self {
        Self {
            organization_repo,
            stripe,
            locks: KeyedLocks::default(),
        }
    }

    /// Returns the organization's connected account, creating it on first use. A destination
    /// that cannot take charges or payouts yet is re-read from the processor, since onboarding
    /// enables it after creation. Concurrent callers for one organization share a single
    /// creation.
    pub async fn ensure_destination(
        &self,
        organization_id: Uuid,
    ) -> UseCaseResult<PaymentDestinationDto> {
        let _guard = self.locks.lock(organization_id).await;

        let organization = self.load(organization_id).await?;
        if let Some(stored) = PaymentDestinationDto::from_entity(&organization) {
            if stored.charges_enabled && stored.payouts_enabled {
                return Ok(stored);
            }
            return self.refresh(stored).await;
        }

        let account = self
            .stripe
            .create_connected_account(CreateConnectedAccountRequest {
                organization_id,
                email: None,
                // Holds across processes where the in-process lock does not.
                idempotency_key: format!("org-account-{organization_id}"),
            })
            .await
            .map_err(|err| {
                error!(
                    organization_id = %organization_id,
                    error = %err,
                    "provisioning: failed to create connected account"
                );
                DonationError::from(err)
            })?;

        let destination = self.save(organization_id, &account).await?;
        info!(
            organization_id = %organization_id,
            stripe_account_id = %account.id,
            "provisioning: connected account created"
        );
        Ok(destination)
    }

    async fn refresh(&self, stored: PaymentDestinationDto) -> UseCaseResult<PaymentDestinationDto> {
        let account = match self
            .stripe
            .retrieve_account(stored.destination_account.clone())
            .await
        {
            Ok(account) => account,
            Err(err) => {
                warn!(
                    organization_id = %stored.organization_id,
                    stripe_account_id = %stored.destination_account,
                    error = %err,
                    "provisioning: could not refresh account status"
                );
                return Ok(stored);
            }
        };

        if account.charges_enabled == stored.charges_enabled
            && account.payouts_enabled == stored.payouts_enabled
        {
            return Ok(stored);
        }

        let destination = self.save(stored.organization_id, &account).await?;
        info!(
            organization_id = %stored.organization_id,
            stripe_account_id = %account.id,
            charges_enabled = account.charges_enabled,
            payouts_enabled = account.payouts_enabled,
            "provisioning: account status refreshed"
        );
        Ok(destination)
    }

    async fn save(
        &self,
        organization_id: Uuid,
        account: &StripeAccount,
    ) -> UseCaseResult<PaymentDestinationDto> {
        let updated = self
            .organization_repo
            .update_payment_destination(
                organization_id,
                UpdatePaymentDestinationEntity {
                    stripe_account_id: Some(account.id.clone()),
                    charges_enabled: account.charges_enabled,
                    payouts_enabled: account.payouts_enabled,
                    updated_at: Utc::now(),
                },
            )
            .await
            .map_err(|err| {
                error!(
                    organization_id = %organization_id,
                    stripe_account_id = %account.id,
                    db_error = ?err,
                    "provisioning: account status not saved"
                );
                DonationError::Internal(err)
            })?;

        PaymentDestinationDto::from_entity(&updated).ok_or_else(|| {
            DonationError::Internal(anyhow::anyhow!(
                "organization {organization_id} lost its destination after provisioning"
            ))
        })
    }

    /// Bank accounts attached to the organization's destination, usable as split recipients.
    pub async fn list_external_accounts(
        &self,
        organization_id: Uuid,
    ) -> UseCaseResult<Vec<ExternalAccountDto>> {
        let organization = self.load(organization_id).await?;
        let Some(account_id) = organization.stripe_account_id else {
            return Err(DonationError::Validation(format!(
                "organization {organization_id} has no payment destination"
            )));
        };

        let accounts = self
            .stripe
            .list_external_accounts(account_id)
            .await
            .map_err(|err| {
                warn!(
                    organization_id = %organization_id,
                    error = %err,
                    "provisioning: failed to list external accounts"
                );
                DonationError::from(err)
            })?;

        Ok(accounts
            .into_iter()
            .filter(|account| account.object.as_deref().is_none_or(|o| o == "bank_account"))
            .map(|account| ExternalAccountDto {
                id: account.id,
                bank_name: account.bank_name,
                last4: account.last4,
                currency: account.currency,
                status: account.status,
                default_for_currency: account.default_for_currency,
            })
            .collect())
    }

    async fn load(&self, organization_id: Uuid) -> UseCaseResult<OrganizationEntity> {
        self.organization_repo
            .find_by_id(organization_id)
            .await
            .map_err(|err| {
                error!(
                    organization_id = %organization_id,
                    db_error = ?err,
                    "provisioning: failed to load organization"
                );
                DonationError::Internal(err)
            })?
            .ok_or_else(|| DonationError::NotFound(format!("organization {organization_id}")))
    }
}
