pub mod guards;
pub mod ledger;
pub mod permissions;
pub mod registry;
