// 5.0: settlement engine. coordinates issuance, redemption, hook dispatch,
// fee accrual and collateral checks over every structured token.
// deterministic and event-driven with no external I/O.

mod admin;
mod config;
mod core;
mod flows;
mod issuance;
mod redemption;
mod registration;
mod results;
mod streaming;
mod validation;

pub use config::EngineConfig;
pub use core::{Engine, IssuanceSettings};
pub use flows::{debt_unit, equity_unit, flow_amount, flow_rounding, FlowKind};
pub use results::{CollateralStatus, ComponentFlows, EngineError, IssueResult, RedeemResult, StreamingFeeResult};
