pub mod appointments;
pub mod ledger;
pub mod cash;
