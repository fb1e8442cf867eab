pub mod conflict;
pub mod slots;
pub mod scheduling_service;
pub use scheduling_service::SchedulingService;
pub mod ledger_service;
pub use ledger_service::LedgerService;
pub mod cash_session_service;
pub use cash_session_service::CashSessionService;
pub mod reconciliation_service;
pub use reconciliation_service::ReconciliationService;
