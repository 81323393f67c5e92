use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::enums::fee_coverage_policies::FeeCoveragePolicy;

/// Basis points in one whole (100%).
pub const BPS_DENOMINATOR: i64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("amount {amount} is below the minimum donation of {minimum}")]
    BelowMinimum { amount: i64, minimum: i64 },
    #[error("fee percentages must leave a positive share of the charge")]
    InvalidModel,
    #[error("amount is too large to charge")]
    Overflow,
}

/// Processor and platform fee model, all amounts in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeModel {
    pub processor_percent_bps: i64,
    pub processor_fixed_minor: i64,
    pub platform_percent_bps: i64,
    pub platform_fixed_minor: i64,
    pub minimum_amount_minor: i64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            processor_percent_bps: 290,
            processor_fixed_minor: 30,
            platform_percent_bps: 100,
            platform_fixed_minor: 0,
            minimum_amount_minor: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub gross_minor: i64,
    pub processor_fee_minor: i64,
    pub platform_fee_minor: i64,
    pub net_minor: i64,
}

impl FeeModel {
    /// Amount the payer is charged for a donation of `donation_amount` minor units.
    pub fn charge_amount(
        &self,
        donation_amount: i64,
        policy: FeeCoveragePolicy,
    ) -> Result<i64, FeeError> {
        if donation_amount < self.minimum_amount_minor {
            return Err(FeeError::BelowMinimum {
                amount: donation_amount,
                minimum: self.minimum_amount_minor,
            });
        }

        match policy {
            FeeCoveragePolicy::OrganizationCoversFees => Ok(donation_amount),
            FeeCoveragePolicy::PayerCoversFees => self.gross_up(donation_amount),
        }
    }

    /// gross = (amount + fixed fees) / (1 - percentage fees), rounded up to the next minor unit.
    fn gross_up(&self, amount: i64) -> Result<i64, FeeError> {
        let divisor = BPS_DENOMINATOR - self.processor_percent_bps - self.platform_percent_bps;
        if divisor <= 0 {
            return Err(FeeError::InvalidModel);
        }

        let numerator = (amount as i128 + self.fixed_fees() as i128)
            .checked_mul(BPS_DENOMINATOR as i128)
            .ok_or(FeeError::Overflow)?;
        let gross = ceil_div(numerator, divisor as i128);

        i64::try_from(gross).map_err(|_| FeeError::Overflow)
    }

    /// The platform's application fee on a charge of `gross` minor units.
    pub fn platform_fee(&self, gross: i64) -> i64 {
        round_half_up(gross as i128 * self.platform_percent_bps as i128, BPS_DENOMINATOR as i128)
            as i64
            + self.platform_fixed_minor
    }

    /// Splits a gross charge into processor fee, platform fee and what the organization nets.
    /// The combined percentage is rounded once so the net never drifts more than one unit.
    pub fn breakdown(&self, gross: i64) -> FeeBreakdown {
        let percent_bps = self.processor_percent_bps + self.platform_percent_bps;
        let total_fee = round_half_up(gross as i128 * percent_bps as i128, BPS_DENOMINATOR as i128)
            as i64
            + self.fixed_fees();
        let platform_fee = self.platform_fee(gross).min(total_fee);

        FeeBreakdown {
            gross_minor: gross,
            processor_fee_minor: total_fee - platform_fee,
            platform_fee_minor: platform_fee,
            net_minor: gross - total_fee,
        }
    }

    fn fixed_fees(&self) -> i64 {
        self.processor_fixed_minor + self.platform_fixed_minor
    }
}

fn ceil_div(numerator: i128, divisor: i128) -> i128 {
    (numerator + divisor - 1) / divisor
}

fn round_half_up(numerator: i128, divisor: i128) -> i128 {
    (numerator * 2 + divisor) / (divisor * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_covering_fees_charges_the_intended_amount() {
        let model = FeeModel::default();
        let charged = model
            .charge_amount(5_000, FeeCoveragePolicy::OrganizationCoversFees)
            .unwrap();
        assert_eq!(charged, 5_000);
    }

    #[test]
    fn fifty_dollars_grossed_up_with_standard_fees() {
        let model = FeeModel::default();
        let charged = model
            .charge_amount(5_000, FeeCoveragePolicy::PayerCoversFees)
            .unwrap();

        // ceil((5000 + 30) * 10000 / 9610)
        assert_eq!(charged, 5_235);

        let breakdown = model.breakdown(charged);
        assert!(breakdown.net_minor >= 5_000);
        assert_eq!(breakdown.platform_fee_minor, 52);
    }

    #[test]
    fn gross_up_nets_back_within_one_unit() {
        let model = FeeModel::default();
        let mut amount = model.minimum_amount_minor;
        while amount <= 2_000_000 {
            let gross = model
                .charge_amount(amount, FeeCoveragePolicy::PayerCoversFees)
                .unwrap();
            let net = model.breakdown(gross).net_minor;
            assert!(
                net == amount || net == amount + 1,
                "amount {amount} grossed to {gross} nets {net}"
            );
            amount += 37;
        }
    }

    #[test]
    fn gross_up_respects_platform_fixed_component() {
        let model = FeeModel {
            processor_percent_bps: 250,
            processor_fixed_minor: 25,
            platform_percent_bps: 150,
            platform_fixed_minor: 10,
            minimum_amount_minor: 50,
        };
        for amount in [50, 99, 1_234, 10_000, 987_654] {
            let gross = model
                .charge_amount(amount, FeeCoveragePolicy::PayerCoversFees)
                .unwrap();
            let net = model.breakdown(gross).net_minor;
            assert!(net == amount || net == amount + 1, "amount {amount} nets {net}");
        }
    }

    #[test]
    fn amounts_below_minimum_are_rejected() {
        let model = FeeModel::default();
        let err = model
            .charge_amount(99, FeeCoveragePolicy::OrganizationCoversFees)
            .unwrap_err();
        assert_eq!(
            err,
            FeeError::BelowMinimum {
                amount: 99,
                minimum: 100
            }
        );
    }

    #[test]
    fn model_that_consumes_the_whole_charge_is_invalid() {
        let model = FeeModel {
            processor_percent_bps: 9_000,
            platform_percent_bps: 1_000,
            ..FeeModel::default()
        };
        assert_eq!(
            model.charge_amount(1_000, FeeCoveragePolicy::PayerCoversFees),
            Err(FeeError::InvalidModel)
        );
    }
}
