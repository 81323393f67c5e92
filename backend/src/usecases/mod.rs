pub mod account_provisioner;
pub mod charge_initiator;
pub mod donations;
pub mod errors;
pub mod payout_distributor;
pub mod settlement_recorder;
pub mod split_resolver;
pub mod stripe_gateway;

#[cfg(test)]
pub(crate) mod test_support;
