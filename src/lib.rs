pub mod config;
pub mod error;
pub mod flow;
pub mod invoke;
pub mod ledger;
pub mod negotiation;
pub mod proposal;
pub mod registry;
pub mod types;
pub mod utils;

pub use config::Config;
pub use error::{ScfError, ScfResult};
pub use ledger::{LedgerStore, SledLedger};
