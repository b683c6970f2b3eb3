// 6.0 custody.rs: MOCKED. an in-memory asset book, no real token transfers.
// holds every component balance: tokens, modules, issuers, venues.
// transfers made inside a transaction are journaled so a failed settlement can be undone.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::precise::{smallest_unit, MAX_ASSET_DECIMALS};
use crate::types::{AssetId, Holder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: AssetId,
    pub symbol: String,
    // amounts finer than 10^-decimals are rejected
    pub decimals: u32,
}

impl AssetInfo {
    pub fn smallest_unit(&self) -> Decimal {
        smallest_unit(self.decimals)
    }
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        holder: Holder,
        asset: AssetId,
        previous: Decimal,
    },
    Supply {
        asset: AssetId,
        previous: Decimal,
    },
}

#[derive(Debug, Default)]
pub struct Custody {
    assets: HashMap<AssetId, AssetInfo>,
    balances: HashMap<(Holder, AssetId), Decimal>,
    supplies: HashMap<AssetId, Decimal>,
    journal: Option<Vec<JournalEntry>>,
    next_asset_id: u32,
}

impl Custody {
    pub fn new() -> Self {
        Self {
            next_asset_id: 1,
            ..Default::default()
        }
    }

    pub fn register_asset(&mut self, symbol: impl Into<String>, decimals: u32) -> Result<AssetId, CustodyError> {
        if decimals > MAX_ASSET_DECIMALS {
            return Err(CustodyError::UnsupportedDecimals(decimals));
        }
        let id = AssetId(self.next_asset_id.max(1));
        self.next_asset_id = id.0 + 1;
        let info = AssetInfo {
            id,
            symbol: symbol.into(),
            decimals,
        };
        debug!(asset = %id, symbol = %info.symbol, decimals, "asset registered");
        self.assets.insert(id, info);
        Ok(id)
    }

    pub fn asset(&self, asset: AssetId) -> Result<&AssetInfo, CustodyError> {
        self.assets.get(&asset).ok_or(CustodyError::UnknownAsset(asset))
    }

    pub fn decimals(&self, asset: AssetId) -> Result<u32, CustodyError> {
        Ok(self.asset(asset)?.decimals)
    }

    pub fn balance(&self, holder: Holder, asset: AssetId) -> Decimal {
        self.balances.get(&(holder, asset)).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_supply(&self, asset: AssetId) -> Decimal {
        self.supplies.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn mint(&mut self, to: Holder, asset: AssetId, amount: Decimal) -> Result<(), CustodyError> {
        self.validate_amount(asset, amount)?;
        let balance = self.balance(to, asset);
        let supply = self.total_supply(asset);
        self.write_balance(to, asset, balance + amount);
        self.write_supply(asset, supply + amount);
        Ok(())
    }

    pub fn burn(&mut self, from: Holder, asset: AssetId, amount: Decimal) -> Result<(), CustodyError> {
        self.validate_amount(asset, amount)?;
        let balance = self.balance(from, asset);
        if amount > balance {
            return Err(CustodyError::InsufficientBalance {
                holder: from,
                asset,
                available: balance,
                requested: amount,
            });
        }
        let supply = self.total_supply(asset);
        self.write_balance(from, asset, balance - amount);
        self.write_supply(asset, supply - amount);
        Ok(())
    }

    pub fn transfer(&mut self, from: Holder, to: Holder, asset: AssetId, amount: Decimal) -> Result<(), CustodyError> {
        self.validate_amount(asset, amount)?;
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let from_balance = self.balance(from, asset);
        if amount > from_balance {
            return Err(CustodyError::InsufficientBalance {
                holder: from,
                asset,
                available: from_balance,
                requested: amount,
            });
        }
        let to_balance = self.balance(to, asset);
        self.write_balance(from, asset, from_balance - amount);
        self.write_balance(to, asset, to_balance + amount);
        Ok(())
    }

    // 6.1: transactions. one level deep; the engine opens one per settlement.

    pub fn begin(&mut self) -> Result<(), CustodyError> {
        if self.journal.is_some() {
            return Err(CustodyError::TransactionActive);
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every write since `begin`, newest first.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let undone = journal.len();
        for entry in journal.into_iter().rev() {
            match entry {
                JournalEntry::Balance { holder, asset, previous } => {
                    self.balances.insert((holder, asset), previous);
                }
                JournalEntry::Supply { asset, previous } => {
                    self.supplies.insert(asset, previous);
                }
            }
        }
        warn!(undone, "custody transaction rolled back");
    }

    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    fn validate_amount(&self, asset: AssetId, amount: Decimal) -> Result<(), CustodyError> {
        let info = self.asset(asset)?;
        if amount < Decimal::ZERO {
            return Err(CustodyError::NegativeAmount(amount));
        }
        if amount.normalize().scale() > info.decimals {
            return Err(CustodyError::PrecisionExceeded {
                asset,
                amount,
                decimals: info.decimals,
            });
        }
        Ok(())
    }

    fn write_balance(&mut self, holder: Holder, asset: AssetId, value: Decimal) {
        let previous = self.balance(holder, asset);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(JournalEntry::Balance { holder, asset, previous });
        }
        self.balances.insert((holder, asset), value);
    }

    fn write_supply(&mut self, asset: AssetId, value: Decimal) {
        let previous = self.total_supply(asset);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(JournalEntry::Supply { asset, previous });
        }
        self.supplies.insert(asset, value);
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CustodyError {
    #[error("Unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("Assets support at most 18 decimals, got {0}")]
    UnsupportedDecimals(u32),

    #[error("Insufficient {asset} balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        holder: Holder,
        asset: AssetId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Amount must be non-negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("Amount {amount} is finer than {decimals} decimals of {asset}")]
    PrecisionExceeded {
        asset: AssetId,
        amount: Decimal,
        decimals: u32,
    },

    #[error("A custody transaction is already open")]
    TransactionActive,
}
