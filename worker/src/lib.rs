pub mod config;
pub mod payout_redrive;
