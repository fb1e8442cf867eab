pub mod appointment_repo;
pub use appointment_repo::AppointmentRepository;
pub mod availability_repo;
pub use availability_repo::AvailabilityRepository;
pub mod directory_repo;
pub use directory_repo::DirectoryRepository;
pub mod ledger_repo;
pub use ledger_repo::LedgerRepository;
pub mod cash_repo;
pub use cash_repo::CashRepository;
