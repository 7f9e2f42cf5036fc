pub mod dashboard;
pub mod export;
pub mod redemption_ledger;
pub mod session_controller;
pub mod session_registry;
pub mod suggestions;
pub mod token_issuer;

pub use dashboard::{Dashboard, DashboardService};
pub use redemption_ledger::{RedeemAttempt, RedemptionLedger};
pub use session_controller::{ControllerSettings, SessionController, SessionExport};
pub use session_registry::SessionRegistry;
pub use token_issuer::TokenIssuer;
