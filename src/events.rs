// 10.0: every state change produces an event. used for audit trails and for rebuilding
// token state off-line. rejected settlements are recorded too, with the stage they died in.

use crate::settlement::SettlementStage;
use crate::types::{AccountId, AssetId, HookId, ModuleId, Timestamp, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    /// Token the event concerns, if any.
    pub fn token(&self) -> Option<TokenId> {
        match &self.payload {
            EventPayload::TokenCreated(e) => Some(e.token),
            EventPayload::IssuanceInitialized(e) => Some(e.token),
            EventPayload::IssuanceRemoved { token } => Some(*token),
            EventPayload::FeeRecipientUpdated(e) => Some(e.token),
            EventPayload::IssueFeeUpdated(e) | EventPayload::RedeemFeeUpdated(e) => Some(e.token),
            EventPayload::ModuleRegistered(e) | EventPayload::ModuleUnregistered(e) => Some(e.token),
            EventPayload::Issued(e) | EventPayload::Redeemed(e) => Some(e.token),
            EventPayload::SettlementRejected(e) => Some(e.token),
            EventPayload::PositionMultiplierEdited(e) => Some(e.token),
            EventPayload::ComponentAdded(e) | EventPayload::ComponentRemoved(e) => Some(e.token),
            EventPayload::StreamingFeeAccrued(e) => Some(e.token),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Lifecycle events
    TokenCreated(TokenCreatedEvent),
    IssuanceInitialized(IssuanceInitializedEvent),
    IssuanceRemoved { token: TokenId },

    // Admin events
    FeeRecipientUpdated(FeeRecipientUpdatedEvent),
    IssueFeeUpdated(FeeUpdatedEvent),
    RedeemFeeUpdated(FeeUpdatedEvent),

    // Registry events
    ModuleRegistered(ModuleRegistrationEvent),
    ModuleUnregistered(ModuleRegistrationEvent),

    // Settlement events
    Issued(SettlementEvent),
    Redeemed(SettlementEvent),
    SettlementRejected(SettlementRejectedEvent),

    // Ledger events
    PositionMultiplierEdited(MultiplierEditedEvent),
    ComponentAdded(ComponentEvent),
    ComponentRemoved(ComponentEvent),
    StreamingFeeAccrued(StreamingFeeAccruedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCreatedEvent {
    pub token: TokenId,
    pub manager: AccountId,
    pub components: Vec<AssetId>,
    pub units: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceInitializedEvent {
    pub token: TokenId,
    pub fee_recipient: AccountId,
    pub issue_fee: Decimal,
    pub redeem_fee: Decimal,
    pub manager_hook: Option<HookId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRecipientUpdatedEvent {
    pub token: TokenId,
    pub fee_recipient: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeUpdatedEvent {
    pub token: TokenId,
    pub old_fee: Decimal,
    pub new_fee: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRegistrationEvent {
    pub token: TokenId,
    pub module: ModuleId,
}

/// Shares in both directions. `quantity` is what the caller asked for; fee
/// shares were minted on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub token: TokenId,
    pub sender: AccountId,
    pub recipient: AccountId,
    pub manager_hook: Option<HookId>,
    pub quantity: Decimal,
    pub manager_fee: Decimal,
    pub protocol_fee: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRejectedEvent {
    pub token: TokenId,
    pub sender: AccountId,
    pub quantity: Decimal,
    pub stage: SettlementStage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplierEditedEvent {
    pub token: TokenId,
    pub old_multiplier: Decimal,
    pub new_multiplier: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEvent {
    pub token: TokenId,
    pub component: AssetId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingFeeAccruedEvent {
    pub token: TokenId,
    pub fee_fraction: Decimal,
    pub manager_fee: Decimal,
    pub protocol_fee: Decimal,
}
