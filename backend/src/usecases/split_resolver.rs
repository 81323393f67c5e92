use std::{collections::HashMap, sync::Arc};

use crates::domain::{
    entities::split_entries::SplitEntryEntity,
    repositories::{
        organizations::OrganizationRepository, split_configurations::SplitConfigurationRepository,
    },
    value_objects::{
        donations::SplitSourceRef,
        enums::{recipient_kinds::RecipientKind, split_sources::SplitSourceKind},
        splits::{SplitConfiguration, SplitError, SplitShare},
    },
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    errors::{DonationError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

/// Picks the split list for a donation: link, then card, then the organization's form default.
/// The first source that still has recipients after dropping unresolvable entries wins.
pub struct SplitResolver<S, O, G>
where
    S: SplitConfigurationRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    split_repo: Arc<S>,
    organization_repo: Arc<O>,
    stripe: Arc<G>,
}

impl<S, O, G> SplitResolver<S, O, G>
where
    S: SplitConfigurationRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(split_repo: Arc<S>, organization_repo: Arc<O>, stripe: Arc<G>) -> Self {
        Self {
            split_repo,
            organization_repo,
            stripe,
        }
    }

    pub async fn resolve(
        &self,
        organization_id: Uuid,
        source: &SplitSourceRef,
    ) -> UseCaseResult<Option<SplitConfiguration>> {
        for (kind, source_id) in candidate_sources(organization_id, source) {
            let entries = self
                .split_repo
                .find_entries(kind, source_id)
                .await
                .map_err(|err| {
                    error!(
                        %organization_id,
                        source_kind = %kind,
                        %source_id,
                        db_error = ?err,
                        "splits: failed to load split entries"
                    );
                    DonationError::Internal(err)
                })?;

            if entries.is_empty() {
                continue;
            }

            let shares = self.resolve_entries(&entries).await?;
            if shares.is_empty() {
                debug!(
                    %organization_id,
                    source_kind = %kind,
                    %source_id,
                    "splits: no entry resolves to a destination, trying next source"
                );
                continue;
            }

            let configuration = SplitConfiguration::new(kind, shares).map_err(|err| {
                warn!(
                    %organization_id,
                    source_kind = %kind,
                    %source_id,
                    reason = %err,
                    "splits: configuration rejected"
                );
                DonationError::from(err)
            })?;
            self.verify_bank_accounts(organization_id, &configuration).await?;

            info!(
                %organization_id,
                source_kind = %kind,
                recipients = configuration.shares().len(),
                "splits: split configuration resolved"
            );
            return Ok(Some(configuration));
        }

        Ok(None)
    }

    /// Maps entries to shares. Entries with no destination at all are dropped; an organization
    /// recipient whose destination exists but cannot take charges fails the whole resolution.
    async fn resolve_entries(&self, entries: &[SplitEntryEntity]) -> UseCaseResult<Vec<SplitShare>> {
        let organization_ids: Vec<Uuid> = entries
            .iter()
            .filter(|entry| bank_account(entry).is_none())
            .filter_map(|entry| entry.recipient_organization_id)
            .collect();

        let organizations: HashMap<Uuid, _> = if organization_ids.is_empty() {
            HashMap::new()
        } else {
            self.organization_repo
                .find_by_ids(organization_ids)
                .await
                .map_err(|err| {
                    error!(db_error = ?err, "splits: failed to load recipient organizations");
                    DonationError::Internal(err)
                })?
                .into_iter()
                .map(|organization| (organization.id, organization))
                .collect()
        };

        let mut shares = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(bank_account_id) = bank_account(entry) {
                shares.push(SplitShare {
                    split_entry_id: entry.id,
                    kind: RecipientKind::BankAccount,
                    destination: bank_account_id.to_string(),
                    percentage_bps: entry.percentage_bps,
                });
                continue;
            }

            let Some(recipient_id) = entry.recipient_organization_id else {
                continue;
            };
            let Some(recipient) = organizations.get(&recipient_id) else {
                continue;
            };
            if recipient.stripe_account_id.as_deref().unwrap_or_default().is_empty() {
                continue;
            }

            let destination = recipient
                .active_destination()
                .ok_or(SplitError::InactiveRecipient(recipient_id))?;
            shares.push(SplitShare {
                split_entry_id: entry.id,
                kind: RecipientKind::ConnectedAccount,
                destination: destination.to_string(),
                percentage_bps: entry.percentage_bps,
            });
        }

        Ok(shares)
    }

    /// Bank shares are paid out of the holding account, so each must be one of its attached
    /// external accounts. Checked before any charge exists.
    async fn verify_bank_accounts(
        &self,
        organization_id: Uuid,
        configuration: &SplitConfiguration,
    ) -> UseCaseResult<()> {
        let bank_accounts: Vec<&str> = configuration
            .shares()
            .iter()
            .filter(|share| share.kind == RecipientKind::BankAccount)
            .map(|share| share.destination.as_str())
            .collect();
        let Some(first) = bank_accounts.first() else {
            return Ok(());
        };

        let holding_account = self
            .organization_repo
            .find_by_id(organization_id)
            .await
            .map_err(|err| {
                error!(%organization_id, db_error = ?err, "splits: failed to load organization");
                DonationError::Internal(err)
            })?
            .and_then(|organization| organization.stripe_account_id)
            .ok_or_else(|| SplitError::UnattachedBankAccount(first.to_string()))?;

        let attached = self
            .stripe
            .list_external_accounts(holding_account.clone())
            .await
            .map_err(|err| {
                warn!(
                    %organization_id,
                    %holding_account,
                    error = %err,
                    "splits: could not list attached bank accounts"
                );
                DonationError::from(err)
            })?;

        for bank_account in bank_accounts {
            let is_attached = attached.iter().any(|account| {
                account.id == bank_account
                    && account.object.as_deref().is_none_or(|o| o == "bank_account")
            });
            if !is_attached {
                warn!(
                    %organization_id,
                    %holding_account,
                    %bank_account,
                    "splits: bank account is not attached to the holding account"
                );
                return Err(SplitError::UnattachedBankAccount(bank_account.to_string()).into());
            }
        }

        Ok(())
    }
}

fn candidate_sources(organization_id: Uuid, source: &SplitSourceRef) -> Vec<(SplitSourceKind, Uuid)> {
    SplitSourceKind::PRECEDENCE
        .iter()
        .filter_map(|kind| {
            let source_id = match kind {
                SplitSourceKind::Link => source.link_id?,
                SplitSourceKind::Card => source.card_id?,
                SplitSourceKind::Form => organization_id,
            };
            Some((*kind, source_id))
        })
        .collect()
}

fn bank_account(entry: &SplitEntryEntity) -> Option<&str> {
    entry
        .recipient_bank_account_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
}
