use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    entities::{donations::DonationEntity, payout_attempts::PayoutAttemptEntity},
    value_objects::{
        enums::{donation_frequencies::DonationFrequency, fee_coverage_policies::FeeCoveragePolicy},
        splits::SplitConfiguration,
    },
};

/// Charge metadata keys written at charge creation and read back at settlement.
pub mod metadata_keys {
    pub const ORGANIZATION_ID: &str = "organization_id";
    pub const CAMPAIGN_ID: &str = "campaign_id";
    pub const DONATION_AMOUNT_MINOR: &str = "donation_amount_minor";
    pub const FEE_COVERAGE: &str = "fee_coverage";
    pub const FREQUENCY: &str = "frequency";
    pub const ANONYMOUS: &str = "anonymous";
    pub const DONOR_EMAIL: &str = "donor_email";
    pub const DONOR_NAME: &str = "donor_name";
    pub const IDEMPOTENCY_KEY: &str = "idempotency_key";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorContact {
    pub email: String,
    pub name: Option<String>,
}

/// Which shareable surface the donation came through, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSourceRef {
    pub link_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
}

/// A donor's request to give; lives only for the duration of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub donor: DonorContact,
    pub organization_id: Uuid,
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub fee_coverage: FeeCoveragePolicy,
    #[serde(default)]
    pub split_source: SplitSourceRef,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub frequency: DonationFrequency,
    pub idempotency_key: Option<String>,
}

impl DonationIntent {
    /// Shape checks that need no store or processor access.
    pub fn validate(&self) -> Result<(), String> {
        if self.amount_minor <= 0 {
            return Err("amount must be positive".to_string());
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("currency {:?} is not an ISO 4217 code", self.currency));
        }
        let email = self.donor.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("donor email is invalid".to_string());
        }
        if let Some(key) = self.idempotency_key.as_deref() {
            if key.trim().is_empty() || key.len() > 255 {
                return Err("idempotency key must be 1-255 characters".to_string());
            }
        }
        Ok(())
    }

    pub fn normalized_currency(&self) -> String {
        self.currency.to_ascii_lowercase()
    }

    /// Caller-supplied key, or one derived from every parameter the charge request carries
    /// plus a time bucket, so reloads inside the bucket reuse the same processor charge while a
    /// changed request (fee coverage, campaign, split) gets a charge of its own.
    pub fn idempotency_key(
        &self,
        charge_amount: i64,
        splits: Option<&SplitConfiguration>,
        now: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> String {
        if let Some(key) = self.idempotency_key.as_deref() {
            return key.trim().to_string();
        }

        let optional = |id: Option<Uuid>| id.map(|id| id.to_string()).unwrap_or_default();
        let bucket = now.timestamp().div_euclid(bucket_seconds.max(1));

        let mut fields = vec![
            self.donor.email.trim().to_ascii_lowercase(),
            self.donor.name.clone().unwrap_or_default(),
            self.amount_minor.to_string(),
            charge_amount.to_string(),
            self.normalized_currency(),
            self.organization_id.to_string(),
            optional(self.campaign_id),
            self.fee_coverage.to_string(),
            self.frequency.to_string(),
            self.anonymous.to_string(),
            optional(self.split_source.link_id),
            optional(self.split_source.card_id),
        ];
        if let Some(splits) = splits {
            fields.push(splits.source().to_string());
            for share in splits.shares() {
                fields.push(format!("{}:{}", share.destination, share.percentage_bps));
            }
        }
        fields.push(bucket.to_string());

        let mut hasher = Sha256::new();
        for field in &fields {
            hasher.update(field.len().to_string().as_bytes());
            hasher.update(b":");
            hasher.update(field.as_bytes());
            hasher.update(b"|");
        }

        format!("donation-{}", hex::encode(hasher.finalize()))
    }
}

/// Opaque token printed on receipts; unrelated to any processor id.
pub fn new_receipt_token() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("rcpt_{}", hex::encode(bytes))
}

/// What a client needs to finish paying, plus the amounts it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeHandle {
    pub client_secret: String,
    pub charge_id: String,
    pub destination_account: String,
    pub donation_amount_minor: i64,
    pub charged_amount_minor: i64,
    pub application_fee_minor: i64,
    pub split_active: bool,
    pub idempotency_key: String,
}

/// Result of an insert-if-absent on the donation ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDonation {
    pub donation: DonationEntity,
    /// `false` when another writer had already recorded this charge.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptDto {
    pub donation_id: Uuid,
    pub charge_reference: String,
    pub receipt_token: String,
    pub amount_minor: i64,
    pub charged_amount_minor: i64,
    pub currency: String,
    pub organization_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub donor_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<DonationEntity> for ReceiptDto {
    fn from(donation: DonationEntity) -> Self {
        let donor_name = if donation.anonymous {
            None
        } else {
            donation.donor_name
        };

        Self {
            donation_id: donation.id,
            charge_reference: donation.charge_reference,
            receipt_token: donation.receipt_token,
            amount_minor: donation.amount_minor,
            charged_amount_minor: donation.charged_amount_minor,
            currency: donation.currency,
            organization_id: donation.organization_id,
            campaign_id: donation.campaign_id,
            donor_name,
            status: donation.status,
            created_at: donation.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutAttemptDto {
    pub id: Uuid,
    pub charge_reference: String,
    pub split_entry_id: Uuid,
    pub recipient_kind: String,
    pub destination: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub processor_payout_id: Option<String>,
    pub error: Option<String>,
    pub attempts: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<PayoutAttemptEntity> for PayoutAttemptDto {
    fn from(attempt: PayoutAttemptEntity) -> Self {
        Self {
            id: attempt.id,
            charge_reference: attempt.charge_reference,
            split_entry_id: attempt.split_entry_id,
            recipient_kind: attempt.recipient_kind,
            destination: attempt.destination,
            amount_minor: attempt.amount_minor,
            currency: attempt.currency,
            status: attempt.status,
            processor_payout_id: attempt.processor_payout_id,
            error: attempt.error,
            attempts: attempt.attempts,
            updated_at: attempt.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn intent() -> DonationIntent {
        DonationIntent {
            amount_minor: 5_000,
            currency: "USD".to_string(),
            donor: DonorContact {
                email: "Donor@Example.org".to_string(),
                name: Some("Dana".to_string()),
            },
            organization_id: Uuid::parse_str("0b7c6f38-9d0e-4c7e-8f0a-0c7f0d6a1e11").unwrap(),
            campaign_id: None,
            fee_coverage: FeeCoveragePolicy::PayerCoversFees,
            split_source: SplitSourceRef::default(),
            anonymous: false,
            frequency: DonationFrequency::OneTime,
            idempotency_key: None,
        }
    }

    fn key(intent: &DonationIntent, charge_amount: i64, now: DateTime<Utc>) -> String {
        intent.idempotency_key(charge_amount, None, now, 600)
    }

    #[test]
    fn derived_key_is_stable_within_a_bucket() {
        let intent = intent();
        let first = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let later = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        assert_eq!(key(&intent, 5_235, first), key(&intent, 5_235, later));
    }

    #[test]
    fn derived_key_changes_with_amount_and_bucket() {
        let intent = intent();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let next_bucket = Utc.timestamp_opt(1_700_000_600, 0).unwrap();

        let mut bigger = intent.clone();
        bigger.amount_minor += 1;

        assert_ne!(key(&intent, 5_235, now), key(&bigger, 5_236, now));
        assert_ne!(key(&intent, 5_235, now), key(&intent, 5_235, next_bucket));
    }

    #[test]
    fn toggling_fee_coverage_or_campaign_yields_a_new_key() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let covered = intent();

        let mut uncovered = covered.clone();
        uncovered.fee_coverage = FeeCoveragePolicy::OrganizationCoversFees;
        assert_ne!(key(&covered, 5_235, now), key(&uncovered, 5_000, now));
        // Same charged amount, different policy.
        assert_ne!(key(&covered, 5_235, now), key(&uncovered, 5_235, now));

        let mut campaign = covered.clone();
        campaign.campaign_id = Some(Uuid::parse_str("7d1f0c52-1111-4a3b-9c3e-5f8e2b9d0a01").unwrap());
        assert_ne!(key(&covered, 5_235, now), key(&campaign, 5_235, now));

        let mut via_link = covered.clone();
        via_link.split_source.link_id = campaign.campaign_id;
        assert_ne!(key(&covered, 5_235, now), key(&via_link, 5_235, now));
    }

    #[test]
    fn split_recipients_are_part_of_the_key() {
        use crate::domain::value_objects::{
            enums::{recipient_kinds::RecipientKind, split_sources::SplitSourceKind},
            splits::SplitShare,
        };

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let split = |bps: i32| {
            SplitConfiguration::new(
                SplitSourceKind::Form,
                vec![
                    SplitShare {
                        split_entry_id: Uuid::nil(),
                        kind: RecipientKind::ConnectedAccount,
                        destination: "acct_a".to_string(),
                        percentage_bps: bps,
                    },
                    SplitShare {
                        split_entry_id: Uuid::nil(),
                        kind: RecipientKind::ConnectedAccount,
                        destination: "acct_b".to_string(),
                        percentage_bps: 10_000 - bps,
                    },
                ],
            )
            .unwrap()
        };

        let intent = intent();
        let even = intent.idempotency_key(5_235, Some(&split(5_000)), now, 600);
        assert_ne!(even, key(&intent, 5_235, now));
        assert_ne!(even, intent.idempotency_key(5_235, Some(&split(6_000)), now, 600));
        assert_eq!(even, intent.idempotency_key(5_235, Some(&split(5_000)), now, 600));
    }

    #[test]
    fn email_case_does_not_change_the_key() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut lower = intent();
        lower.donor.email = "donor@example.org".to_string();

        assert_eq!(key(&intent(), 5_235, now), key(&lower, 5_235, now));
    }

    #[test]
    fn caller_supplied_key_wins() {
        let mut intent = intent();
        intent.idempotency_key = Some("client-key-1".to_string());
        assert_eq!(key(&intent, 5_235, Utc::now()), "client-key-1");
    }

    #[test]
    fn receipt_tokens_are_unique() {
        let first = new_receipt_token();
        assert!(first.starts_with("rcpt_"));
        assert_eq!(first.len(), 5 + 32);
        assert_ne!(first, new_receipt_token());
    }

    #[test]
    fn malformed_intents_are_rejected() {
        let mut bad_currency = intent();
        bad_currency.currency = "US".to_string();
        assert!(bad_currency.validate().is_err());

        let mut bad_email = intent();
        bad_email.donor.email = "nobody".to_string();
        assert!(bad_email.validate().is_err());

        let mut zero = intent();
        zero.amount_minor = 0;
        assert!(zero.validate().is_err());

        assert!(intent().validate().is_ok());
    }
}
