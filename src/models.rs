pub mod appointment;
pub mod ledger;
pub mod cash;
