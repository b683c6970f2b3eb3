// 6.1 settlement.rs: the audit record of one issue or redeem. every asset transfer and
// share mint/burn the engine performs is appended here in execution order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fees::FeeDirection;
use crate::types::{AccountId, AssetId, Holder, TokenId};

/// Where a settlement got to. `Settled` and `Reverted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    Requested,
    HooksRun,
    FlowsComputed,
    Settled,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementInstruction {
    // Move a component between two holders
    Transfer {
        from: Holder,
        to: Holder,
        asset: AssetId,
        amount: Decimal,
        reason: TransferReason,
    },

    // Create token shares
    MintShares {
        to: AccountId,
        amount: Decimal,
        reason: TransferReason,
    },

    // Destroy token shares
    BurnShares {
        from: AccountId,
        amount: Decimal,
    },
}

// Why a transfer is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    EquityDeposit,
    EquityWithdrawal,
    DebtDrawn,
    DebtRepaid,
    Shares,
    ManagerFee,
    ProtocolFee,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub token: TokenId,
    pub direction: FeeDirection,
    pub instructions: Vec<SettlementInstruction>,
}

impl SettlementRecord {
    pub fn new(token: TokenId, direction: FeeDirection) -> Self {
        Self {
            token,
            direction,
            instructions: Vec::new(),
        }
    }

    pub fn add(&mut self, instruction: SettlementInstruction) {
        self.instructions.push(instruction);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Net asset movement per holder and asset. Sums to zero per asset.
    pub fn net_flows(&self) -> HashMap<(Holder, AssetId), Decimal> {
        let mut flows = HashMap::new();

        for instruction in &self.instructions {
            if let SettlementInstruction::Transfer {
                from, to, asset, amount, ..
            } = instruction
            {
                *flows.entry((*from, *asset)).or_insert(Decimal::ZERO) -= *amount;
                *flows.entry((*to, *asset)).or_insert(Decimal::ZERO) += *amount;
            }
        }

        flows
    }

    /// Net share movement per account. Positive = received shares.
    pub fn share_flows(&self) -> HashMap<AccountId, Decimal> {
        let mut flows = HashMap::new();

        for instruction in &self.instructions {
            match instruction {
                SettlementInstruction::MintShares { to, amount, .. } => {
                    *flows.entry(*to).or_insert(Decimal::ZERO) += *amount;
                }
                SettlementInstruction::BurnShares { from, amount } => {
                    *flows.entry(*from).or_insert(Decimal::ZERO) -= *amount;
                }
                SettlementInstruction::Transfer { .. } => {}
            }
        }

        flows
    }

    /// Total transferred of `asset` for one reason.
    pub fn transferred(&self, asset: AssetId, reason: TransferReason) -> Decimal {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                SettlementInstruction::Transfer {
                    asset: a,
                    amount,
                    reason: r,
                    ..
                } if *a == asset && *r == reason => Some(*amount),
                _ => None,
            })
            .sum()
    }
}
