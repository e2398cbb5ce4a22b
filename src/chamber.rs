//! The card/hand chamber: a player's cross-indexed store of held cards and
//! stored hands.
//!
//! Two intrusive doubly-linked structures, joined by cross pointers, back
//! every operation here: a per-card list of "hand-pointer" nodes (which
//! stored hands reference this card) and an arena of stored hands, each
//! carrying the node id of its own entry in every card it touches. The
//! source this is ported from builds the same cross-linked graph with raw
//! `dllist` pointers; here the graph is arena-allocated and addressed by
//! index, so unlinking a card cascades through its hands in O(total cards
//! touched) without any unsafe pointer chasing.

use std::collections::HashMap;

use crate::card::Card;
use crate::error::ChamberError;
use crate::hand::{Hand, HandKind};

pub type HandId = usize;
type NodeId = usize;

/// One entry in a card's list of hands that reference it.
struct Node {
    hand: HandId,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Default, Clone, Copy)]
struct CardList {
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

#[derive(Default)]
struct NodeArena {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl NodeArena {
    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn take(&mut self, id: NodeId) -> Node {
        let node = self.nodes[id].take().expect("dangling node id");
        self.free.push(id);
        node
    }

    fn get(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("dangling node id")
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("dangling node id")
    }
}

fn push_back(arena: &mut NodeArena, list: &mut CardList, hand: HandId) -> NodeId {
    let id = arena.insert(Node {
        hand,
        prev: list.tail,
        next: None,
    });
    if let Some(tail) = list.tail {
        arena.get_mut(tail).next = Some(id);
    } else {
        list.head = Some(id);
    }
    list.tail = Some(id);
    id
}

fn unlink(arena: &mut NodeArena, list: &mut CardList, id: NodeId) {
    let node = arena.take(id);
    match node.prev {
        Some(p) => arena.get_mut(p).next = node.next,
        None => list.head = node.next,
    }
    match node.next {
        Some(n) => arena.get_mut(n).prev = node.prev,
        None => list.tail = node.prev,
    }
}

struct StoredHandEntry {
    hand: Hand,
    /// This hand's node id within each of its cards' lists, so removing
    /// the hand (or cascading from a card removal) can unlink in O(1) per
    /// card rather than scanning.
    card_nodes: HashMap<Card, NodeId>,
    /// Count of this hand's cards currently selected by the player. A
    /// 0-to-1 or 1-to-0 crossing is the highlight boundary the client
    /// cares about.
    selected: u32,
}

/// Events produced by chamber mutations. The chamber has no notion of
/// transport or seat; the match engine wraps these with a scope before
/// handing them to an [`crate::event::EventSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChamberEvent {
    SelectCard(Card),
    DeselectCard(Card),
    AddCard(Card),
    RemoveCard(Card),
    StoreHand { id: HandId, cards: Vec<Card> },
    RemoveHand { id: HandId },
    SelectHand { id: HandId },
    DeselectHand { id: HandId },
}

pub struct Chamber {
    held: [bool; 53],
    card_lists: [CardList; 53],
    arena: NodeArena,
    hands: Vec<Option<StoredHandEntry>>,
    free_hands: Vec<HandId>,
}

impl Chamber {
    pub fn new(cards: &[Card]) -> Self {
        let mut held = [false; 53];
        for &c in cards {
            held[c.0 as usize] = true;
        }
        Chamber {
            held,
            card_lists: [CardList::default(); 53],
            arena: NodeArena::default(),
            hands: Vec::new(),
            free_hands: Vec::new(),
        }
    }

    pub fn contains_card(&self, card: Card) -> bool {
        self.held.get(card.0 as usize).copied().unwrap_or(false)
    }

    pub fn iter_cards(&self) -> impl Iterator<Item = Card> + '_ {
        (1u8..=52).filter(move |&c| self.held[c as usize]).map(Card)
    }

    pub fn stored_hand(&self, id: HandId) -> Option<&Hand> {
        self.hands.get(id).and_then(|e| e.as_ref()).map(|e| &e.hand)
    }

    pub fn stored_hands(&self) -> impl Iterator<Item = (HandId, &Hand)> {
        self.hands
            .iter()
            .enumerate()
            .filter_map(|(id, e)| e.as_ref().map(|e| (id, &e.hand)))
    }

    pub fn contains_hand(&self, hand: &Hand) -> bool {
        self.find_hand(hand).is_some()
    }

    fn find_hand(&self, hand: &Hand) -> Option<HandId> {
        self.stored_hands()
            .find(|(_, h)| h.kind() == hand.kind() && h.cards().eq(hand.cards()))
            .map(|(id, _)| id)
    }

    /// Registers a new stored hand. The hand must be a storable kind
    /// (DOUBLE/TRIPLE/FULLHOUSE/STRAIGHT/BOMB; singles are never
    /// storable), every one of its cards must currently be held, and it
    /// must not duplicate an existing stored hand.
    pub fn add_hand(&mut self, hand: Hand) -> Result<(HandId, ChamberEvent), ChamberError> {
        match hand.kind() {
            HandKind::Single => return Err(ChamberError::SingleNotStorable),
            k if !k.is_storable() => return Err(ChamberError::InvalidHand(k)),
            _ => {}
        }
        for c in hand.cards() {
            if !self.contains_card(c) {
                return Err(ChamberError::CardNotHeld(c));
            }
        }
        if self.contains_hand(&hand) {
            return Err(ChamberError::DuplicateHand);
        }

        let id = if let Some(id) = self.free_hands.pop() {
            id
        } else {
            self.hands.push(None);
            self.hands.len() - 1
        };

        let mut card_nodes = HashMap::new();
        for c in hand.cards() {
            let node = push_back(&mut self.arena, &mut self.card_lists[c.0 as usize], id);
            card_nodes.insert(c, node);
        }

        let cards: Vec<Card> = hand.cards().collect();
        self.hands[id] = Some(StoredHandEntry {
            hand,
            card_nodes,
            selected: 0,
        });

        Ok((id, ChamberEvent::StoreHand { id, cards }))
    }

    /// Drops a single stored hand by id without touching the cards it
    /// referenced (other than detaching their pointers to it).
    pub fn remove_hand(&mut self, id: HandId) -> Result<ChamberEvent, ChamberError> {
        let entry = self.hands.get_mut(id).and_then(|e| e.take()).ok_or(ChamberError::HandNotFound)?;
        for (card, node) in entry.card_nodes {
            unlink(&mut self.arena, &mut self.card_lists[card.0 as usize], node);
        }
        self.free_hands.push(id);
        Ok(ChamberEvent::RemoveHand { id })
    }

    /// Card `c` is played: detach it from the chamber and cascade-remove
    /// every stored hand that referenced it, which in turn detaches those
    /// hands from their other cards.
    pub fn remove_card(&mut self, card: Card) -> Result<Vec<ChamberEvent>, ChamberError> {
        if !self.contains_card(card) {
            return Err(ChamberError::CardNotHeld(card));
        }

        let mut events = vec![ChamberEvent::RemoveCard(card)];
        self.held[card.0 as usize] = false;

        let list = self.card_lists[card.0 as usize];
        let mut hand_ids = Vec::new();
        let mut cursor = list.head;
        while let Some(node_id) = cursor {
            let node = self.arena.get(node_id);
            hand_ids.push(node.hand);
            cursor = node.next;
        }

        for hand_id in hand_ids {
            let entry = match self.hands.get_mut(hand_id).and_then(|e| e.take()) {
                Some(e) => e,
                None => continue, // already removed via an earlier card in this same pass
            };
            for (other_card, node) in entry.card_nodes {
                if other_card == card {
                    continue; // this card's own list is cleared in bulk below
                }
                unlink(&mut self.arena, &mut self.card_lists[other_card.0 as usize], node);
            }
            self.free_hands.push(hand_id);
            events.push(ChamberEvent::RemoveHand { id: hand_id });
        }

        // Reclaim every node still sitting in this card's own list.
        let mut cursor = self.card_lists[card.0 as usize].head;
        while let Some(node_id) = cursor {
            cursor = self.arena.get(node_id).next;
            self.arena.take(node_id);
        }
        self.card_lists[card.0 as usize] = CardList::default();

        Ok(events)
    }

    /// Installs `card` as held without any stored hands referencing it.
    /// Used only at deal time; the match engine never calls this mid-game.
    pub fn add_card(&mut self, card: Card) -> ChamberEvent {
        self.held[card.0 as usize] = true;
        ChamberEvent::AddCard(card)
    }

    /// Drops every stored hand, keeping the player's held cards intact.
    pub fn clear_hands(&mut self) -> Vec<ChamberEvent> {
        let ids: Vec<HandId> = self.stored_hands().map(|(id, _)| id).collect();
        ids.into_iter()
            .map(|id| self.remove_hand(id).expect("id just listed as present"))
            .collect()
    }

    /// Marks one more of a stored hand's cards as selected. Every stored
    /// hand containing `card` has its count incremented; a 0->1 crossing
    /// emits [`ChamberEvent::SelectHand`] for that hand.
    pub fn select_card(&mut self, card: Card) -> Result<Vec<ChamberEvent>, ChamberError> {
        if !self.contains_card(card) {
            return Err(ChamberError::CardNotHeld(card));
        }
        let mut events = vec![ChamberEvent::SelectCard(card)];
        for hand_id in self.hands_containing(card) {
            let entry = self.hands[hand_id].as_mut().unwrap();
            entry.selected += 1;
            if entry.selected == 1 {
                events.push(ChamberEvent::SelectHand { id: hand_id });
            }
        }
        Ok(events)
    }

    /// The inverse of [`Chamber::select_card`].
    pub fn deselect_card(&mut self, card: Card) -> Result<Vec<ChamberEvent>, ChamberError> {
        if !self.contains_card(card) {
            return Err(ChamberError::CardNotHeld(card));
        }
        let mut events = vec![ChamberEvent::DeselectCard(card)];
        for hand_id in self.hands_containing(card) {
            let entry = self.hands[hand_id].as_mut().unwrap();
            debug_assert!(entry.selected > 0);
            entry.selected -= 1;
            if entry.selected == 0 {
                events.push(ChamberEvent::DeselectHand { id: hand_id });
            }
        }
        Ok(events)
    }

    fn hands_containing(&self, card: Card) -> Vec<HandId> {
        let mut cursor = self.card_lists[card.0 as usize].head;
        let mut out = Vec::new();
        while let Some(node_id) = cursor {
            let node = self.arena.get(node_id);
            out.push(node.hand);
            cursor = node.next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use proptest::prelude::*;

    fn c(n: u8) -> Card {
        Card(n)
    }

    fn chamber_with(n: u8) -> Chamber {
        Chamber::new(&(1..=n).map(Card).collect::<Vec<_>>())
    }

    #[test]
    fn remove_card_cascades_to_every_hand_that_holds_it() {
        let mut chamber = chamber_with(13);
        let hand = Hand::from_cards(&[c(1), c(2), c(3)]).unwrap();
        chamber.add_hand(hand).unwrap();

        let events = chamber.remove_card(c(2)).unwrap();
        assert!(events.iter().any(|e| matches!(e, ChamberEvent::RemoveHand { .. })));
        assert!(!chamber.contains_card(c(2)));
        assert_eq!(chamber.stored_hands().count(), 0);
        assert!(!chamber.contains_hand(&Hand::from_cards(&[c(1), c(2), c(3)]).unwrap()));
    }

    #[test]
    fn unrelated_cards_keep_their_own_hands_after_a_cascade() {
        let mut chamber = chamber_with(13);
        let triple = Hand::from_cards(&[c(1), c(2), c(3)]).unwrap();
        let double = Hand::from_cards(&[c(5), c(6)]).unwrap();
        let (triple_id, _) = chamber.add_hand(triple).unwrap();
        let (double_id, _) = chamber.add_hand(double).unwrap();

        chamber.remove_card(c(2)).unwrap();

        assert!(chamber.stored_hand(triple_id).is_none());
        assert!(chamber.stored_hand(double_id).is_some());
        assert!(chamber.contains_card(c(5)));
        assert!(chamber.contains_card(c(6)));
    }

    #[test]
    fn select_then_deselect_every_card_returns_to_zero_crossings() {
        let mut chamber = chamber_with(13);
        let (_, _) = chamber.add_hand(Hand::from_cards(&[c(1), c(2)]).unwrap()).unwrap();

        let sel = chamber.select_card(c(1)).unwrap();
        assert!(sel.iter().any(|e| matches!(e, ChamberEvent::SelectHand { .. })));
        let sel2 = chamber.select_card(c(2)).unwrap();
        assert!(!sel2.iter().any(|e| matches!(e, ChamberEvent::SelectHand { .. })));

        let desel = chamber.deselect_card(c(1)).unwrap();
        assert!(!desel.iter().any(|e| matches!(e, ChamberEvent::DeselectHand { .. })));
        let desel2 = chamber.deselect_card(c(2)).unwrap();
        assert!(desel2.iter().any(|e| matches!(e, ChamberEvent::DeselectHand { .. })));
    }

    #[test]
    fn duplicate_hand_is_rejected() {
        let mut chamber = chamber_with(13);
        chamber.add_hand(Hand::from_cards(&[c(1), c(2)]).unwrap()).unwrap();
        let err = chamber.add_hand(Hand::from_cards(&[c(1), c(2)]).unwrap()).unwrap_err();
        assert_eq!(err, ChamberError::DuplicateHand);
    }

    #[test]
    fn single_card_cannot_be_stored() {
        let mut chamber = chamber_with(13);
        let err = chamber.add_hand(Hand::from_cards(&[c(1)]).unwrap()).unwrap_err();
        assert_eq!(err, ChamberError::SingleNotStorable);
    }

    #[derive(Debug, Clone)]
    enum Op {
        AddHand(u8, u8),
        RemoveCard(u8),
        Clear,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u8..=13, 1u8..=13).prop_map(|(a, b)| Op::AddHand(a, b)),
            (1u8..=13).prop_map(Op::RemoveCard),
            Just(Op::Clear),
        ]
    }

    proptest! {
        /// After any sequence of add_hand/remove_card/clear_hands, every
        /// card's pointer list must name exactly the stored hands that
        /// actually contain it, in both directions: this is the invariant
        /// the whole arena/cross-index exists to maintain.
        #[test]
        fn card_pointer_lists_match_stored_hands_after_arbitrary_ops(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            let mut chamber = chamber_with(13);
            for op in ops {
                match op {
                    Op::AddHand(a, b) if a != b => {
                        if let Ok(hand) = Hand::from_cards(&[c(a.min(b)), c(a.max(b))]) {
                            let _ = chamber.add_hand(hand);
                        }
                    }
                    Op::AddHand(..) => {}
                    Op::RemoveCard(card) => {
                        let _ = chamber.remove_card(c(card));
                    }
                    Op::Clear => {
                        chamber.clear_hands();
                    }
                }
            }

            for card in 1u8..=13 {
                let card = c(card);
                let mut expected: Vec<HandId> = chamber
                    .stored_hands()
                    .filter(|(_, h)| h.contains(card))
                    .map(|(id, _)| id)
                    .collect();
                let mut actual = chamber.hands_containing(card);
                expected.sort_unstable();
                actual.sort_unstable();
                prop_assert_eq!(actual, expected);

                // Every pointer in this card's list must name a hand that is
                // still actually stored (no dangling node left behind).
                for &id in &chamber.hands_containing(card) {
                    prop_assert!(chamber.stored_hand(id).is_some());
                }
            }
        }

        /// Selecting an arbitrary set of cards in some order, then
        /// deselecting that same set in reverse, must leave every stored
        /// hand's selected-count back at zero — selection is a pure 0/1
        /// crossing counter, not a history-sensitive one.
        #[test]
        fn select_then_deselect_round_trips_every_stored_hand_to_zero(
            order in proptest::sample::subsequence((1u8..=13).collect::<Vec<_>>(), 0..=13),
        ) {
            let mut chamber = chamber_with(13);
            chamber.add_hand(Hand::from_cards(&[c(1), c(2)]).unwrap()).unwrap();
            chamber.add_hand(Hand::from_cards(&[c(3), c(4), c(5)]).unwrap()).unwrap();

            for &card in &order {
                chamber.select_card(c(card)).unwrap();
            }
            for &card in order.iter().rev() {
                chamber.deselect_card(c(card)).unwrap();
            }

            for entry in chamber.hands.iter().flatten() {
                prop_assert_eq!(entry.selected, 0);
            }
        }
    }
}
