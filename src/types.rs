// 1.0: all the primitives live here. ids, holders, timestamps.
// each id is a newtype so the compiler catches a module passed where a token was expected.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structured token. Its shares are tracked by the token's own ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u32);

/// A fungible asset held in custody. Every component is an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

/// Handle of a registered manager issuance hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

// 1.1: anything that can own an asset balance. tokens hold their components,
// modules hold debt assets in flight, accounts are issuers/redeemers/recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Holder {
    Account(AccountId),
    Token(TokenId),
    Module(ModuleId),
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::Account(id) => write!(f, "{id}"),
            Holder::Token(id) => write!(f, "{id}"),
            Holder::Module(id) => write!(f, "{id}"),
        }
    }
}

impl From<AccountId> for Holder {
    fn from(id: AccountId) -> Self {
        Holder::Account(id)
    }
}

impl From<TokenId> for Holder {
    fn from(id: TokenId) -> Self {
        Holder::Token(id)
    }
}

impl From<ModuleId> for Holder {
    fn from(id: ModuleId) -> Self {
        Holder::Module(id)
    }
}

// 1.2: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Milliseconds from `self` to `later`, zero if `later` is earlier.
    pub fn millis_until(&self, later: &Timestamp) -> i64 {
        (later.0 - self.0).max(0)
    }
}

/// 365 days.
pub const MILLIS_PER_YEAR: Decimal = dec!(31_536_000_000);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_conversions() {
        assert_eq!(Holder::from(AccountId(7)), Holder::Account(AccountId(7)));
        assert_eq!(Holder::from(TokenId(1)), Holder::Token(TokenId(1)));
        assert_eq!(Holder::from(ModuleId(3)).to_string(), "module#3");
    }

    #[test]
    fn elapsed_time_is_clamped() {
        let start = Timestamp::from_millis(0);
        let later = Timestamp::from_millis(15_768_000_000);
        assert_eq!(start.millis_until(&later), 15_768_000_000);
        assert_eq!(later.millis_until(&start), 0);
    }
}
