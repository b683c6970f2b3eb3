// basket-core: structured token issuance with debt-aware settlement.
// solvency first: every settlement either leaves each component covered or reverts.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: TokenId, AssetId, ModuleId, Holder, Timestamp
//   1.5  precise.rs: fixed-point helpers, directed rounding
//   2.x  position.rs: position ledger, external writer, multiplier rebase
//   3.x  fees.rs: issue/redeem fee split
//   3.3  streaming_fee.rs: time-based fee accrual
//   4.x  hooks.rs: debt module + manager hook traits, ordered dispatch
//   5.x  engine/: settlement engine: issue, redeem, registration, admin, streaming
//   6.x  custody.rs: asset balances with transactional rollback
//   6.1  settlement.rs: per-settlement instruction record
//   7.x  config.rs: fees, settlement variant, protocol shares, env presets
//   8.x  controller.rs: system registry of enabled tokens and modules
//   9.x  lending.rs: lending venue debt module (mocked)
//   10.x events.rs: state transition events for audit

// ledger and settlement
pub mod engine;
pub mod events;
pub mod fees;
pub mod hooks;
pub mod position;
pub mod precise;
pub mod settlement;
pub mod streaming_fee;
pub mod types;

// integration modules
pub mod config;
pub mod controller;
pub mod custody;
pub mod lending;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use fees::*;
pub use hooks::*;
pub use position::*;
pub use precise::*;
pub use streaming_fee::*;
pub use types::*;
pub use config::{BasketConfig, ConfigError, Environment, IssuanceConfig, ProtocolFeeConfig, SettlementVariant};
pub use controller::{Controller, ControllerError, ISSUE_FEE_INDEX, REDEEM_FEE_INDEX, STREAMING_FEE_INDEX};
pub use custody::{AssetInfo, Custody, CustodyError};
pub use lending::LendingDebtModule;
pub use settlement::{SettlementInstruction, SettlementRecord, SettlementStage, TransferReason};
