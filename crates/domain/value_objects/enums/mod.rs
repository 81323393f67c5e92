pub mod donation_frequencies;
pub mod donation_statuses;
pub mod fee_coverage_policies;
pub mod payout_statuses;
pub mod recipient_kinds;
pub mod split_sources;
