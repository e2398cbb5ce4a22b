use crate::card::Card;

/// Every intent a seat may send to the match engine, matching §6's inbound
/// vocabulary one-for-one (`joined`/`left`/`text` are handled at the room
/// layer, not here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CardClick(Card),
    HandClick(Vec<Card>),
    ClearCurrentHand,
    Store,
    ClearStoredHands,
    PlayCurrentHand,
    PassCurrentHand,
}
