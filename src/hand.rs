//! Hand classification and comparison.
//!
//! A [`Hand`] is a 5-slot canonical tuple of cards, zero-padded at the low
//! end. Classification of a non-trivial (size >= 2) selection is a lookup
//! into a table built once at process startup; the table itself is the
//! only place combinatorics happen.

use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;
use once_cell::sync::Lazy;
use strum::IntoEnumIterator;

use crate::card::{Card, Rank, Suit};
use crate::error::HandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandKind {
    Empty,
    Single,
    Double,
    Triple,
    FullHouse,
    Straight,
    Bomb,
    /// A non-empty selection of `n` cards that matches no known
    /// combination.
    Invalid(u8),
}

impl HandKind {
    pub fn is_valid_nonempty(self) -> bool {
        !matches!(self, HandKind::Empty | HandKind::Invalid(_))
    }

    pub fn is_storable(self) -> bool {
        matches!(
            self,
            HandKind::Double | HandKind::Triple | HandKind::FullHouse | HandKind::Straight | HandKind::Bomb
        )
    }
}

type CanonicalKey = [u8; 5];

/// The classification table for every 2..=5 card combination. Singles are
/// classified without consulting this table (any single card is valid);
/// this table only needs to cover DOUBLE, TRIPLE, FULLHOUSE, STRAIGHT and
/// BOMB.
static CLASSIFICATION_TABLE: Lazy<HashMap<CanonicalKey, HandKind>> = Lazy::new(build_table);

fn canonical_key(cards: &[Card]) -> CanonicalKey {
    let mut ids: Vec<u8> = cards.iter().map(|c| c.0).collect();
    ids.sort_unstable();
    let mut key = [0u8; 5];
    let start = 5 - ids.len();
    key[start..].copy_from_slice(&ids);
    key
}

fn cards_of_rank(rank: Rank) -> Vec<Card> {
    Suit::iter().map(|s| Card::new(rank, s)).collect()
}

fn build_table() -> HashMap<CanonicalKey, HandKind> {
    let mut table = HashMap::new();
    let ranks: Vec<Rank> = Rank::iter().collect();

    // Doubles and triples: every same-rank 2- or 3-combination.
    for &rank in &ranks {
        let cards = cards_of_rank(rank);
        for combo in cards.iter().copied().combinations(2) {
            table.insert(canonical_key(&combo), HandKind::Double);
        }
        for combo in cards.iter().copied().combinations(3) {
            table.insert(canonical_key(&combo), HandKind::Triple);
        }
    }

    // Full houses: every ordered pair of distinct ranks (pair-rank,
    // triple-rank) combined with every 2-combination of the pair rank and
    // every 3-combination of the triple rank.
    for &pair_rank in &ranks {
        for &triple_rank in &ranks {
            if pair_rank == triple_rank {
                continue;
            }
            let pair_cards = cards_of_rank(pair_rank);
            let triple_cards = cards_of_rank(triple_rank);
            for pair in pair_cards.iter().copied().combinations(2) {
                for triple in triple_cards.iter().copied().combinations(3) {
                    let mut combo = pair.clone();
                    combo.extend(triple);
                    table.insert(canonical_key(&combo), HandKind::FullHouse);
                }
            }
        }
    }

    // Bombs: four of a kind plus any single card of a different rank.
    for &quad_rank in &ranks {
        let quad = cards_of_rank(quad_rank);
        for &kicker_rank in &ranks {
            if kicker_rank == quad_rank {
                continue;
            }
            for kicker in cards_of_rank(kicker_rank) {
                let mut combo = quad.clone();
                combo.push(kicker);
                table.insert(canonical_key(&combo), HandKind::Bomb);
            }
        }
    }

    // Straights: five consecutive ranks (no wrap past Two, the highest
    // rank), any combination of suits. The source this is ported from
    // leaves straight population unimplemented; this is the fixed
    // definition adopted here.
    for start in 0..=(ranks.len() - 5) {
        let window = &ranks[start..start + 5];
        let suit_choices: Vec<Vec<Suit>> = window
            .iter()
            .map(|_| Suit::iter().collect::<Vec<_>>())
            .collect();
        for suits in suit_choices.iter().map(|s| s.iter()).multi_cartesian_product() {
            let combo: Vec<Card> = window
                .iter()
                .zip(suits)
                .map(|(&r, &s)| Card::new(r, s))
                .collect();
            table.insert(canonical_key(&combo), HandKind::Straight);
        }
    }

    table
}

/// A canonical 5-slot hand: zero-padded ascending, classified on every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hand {
    slots: [Card; 5],
    kind: HandKind,
}

impl Default for Hand {
    fn default() -> Self {
        Self::empty()
    }
}

impl Hand {
    pub fn empty() -> Self {
        Hand {
            slots: [Card(0); 5],
            kind: HandKind::Empty,
        }
    }

    /// Builds and classifies a hand directly from a set of cards, without
    /// going through incremental `add`. Used by tests; production code
    /// builds hands incrementally via `add`/`remove` instead (a `hand-click`
    /// intent, for instance, is handled as a sequence of per-card clicks).
    pub fn from_cards(cards: &[Card]) -> Result<Self, HandError> {
        if cards.len() > 5 {
            return Err(HandError::Full);
        }
        let mut hand = Hand::empty();
        for &c in cards {
            hand.add(c)?;
        }
        Ok(hand)
    }

    pub fn kind(&self) -> HandKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.slots.iter().filter(|c| c.0 != 0).count()
    }

    pub fn contains(&self, card: Card) -> bool {
        self.slots.contains(&card)
    }

    /// Held cards in ascending order.
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.slots.iter().copied().filter(|c| c.0 != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Inserts `card`, re-sorting by a single bubble pass, and reclassifies.
    pub fn add(&mut self, card: Card) -> Result<(), HandError> {
        if self.size() == 5 {
            return Err(HandError::Full);
        }
        if self.contains(card) {
            return Err(HandError::Duplicate(card));
        }
        let zero_count = self.slots.iter().filter(|c| c.0 == 0).count();
        let insert_at = zero_count - 1;
        self.slots[insert_at] = card;
        let mut i = insert_at;
        while i + 1 < 5 && self.slots[i].0 > self.slots[i + 1].0 {
            self.slots.swap(i, i + 1);
            i += 1;
        }
        self.reclassify();
        Ok(())
    }

    /// Removes `card`, shifting everything below its slot one position up
    /// and zeroing the vacated low end, then reclassifies.
    pub fn remove(&mut self, card: Card) -> Result<(), HandError> {
        if self.is_empty() {
            return Err(HandError::Empty);
        }
        let pos = self
            .slots
            .iter()
            .position(|&c| c == card)
            .ok_or(HandError::NotPresent(card))?;
        for i in (1..=pos).rev() {
            self.slots[i] = self.slots[i - 1];
        }
        self.slots[0] = Card(0);
        self.reclassify();
        Ok(())
    }

    fn reclassify(&mut self) {
        let size = self.size();
        self.kind = match size {
            0 => HandKind::Empty,
            1 => HandKind::Single,
            _ => CLASSIFICATION_TABLE
                .get(&self.canonical_key())
                .copied()
                .unwrap_or(HandKind::Invalid(size as u8)),
        };
    }

    fn canonical_key(&self) -> CanonicalKey {
        let mut key = [0u8; 5];
        for (i, c) in self.slots.iter().enumerate() {
            key[i] = c.0;
        }
        key
    }

    /// The representative card used to compare two hands of the same kind:
    /// slot 4 (the top card) for single/double/straight, slot 2 (the
    /// triple's middle card, guaranteed to belong to the triple in
    /// canonical form) for triple/full house.
    fn key_card(&self) -> Option<Card> {
        match self.kind {
            HandKind::Single | HandKind::Double | HandKind::Straight => Some(self.slots[4]),
            HandKind::Triple | HandKind::FullHouse => Some(self.slots[2]),
            _ => None,
        }
    }

    /// The highest card of the four-of-a-kind component of a bomb. Same
    /// ranks sort contiguously because card ids are `rank*4+suit`, so the
    /// quad is either slots[0..4] or slots[1..5]; whichever block has equal
    /// ranks at both ends is the quad.
    fn bomb_quad_high(&self) -> Card {
        debug_assert_eq!(self.kind, HandKind::Bomb);
        if self.slots[0].rank() == self.slots[3].rank() {
            self.slots[3]
        } else {
            self.slots[4]
        }
    }
}

/// Compares two valid hands under Presidents rules. `None` means the two
/// hands are of incomparable kinds (including when either is EMPTY or
/// INVALID), distinct from either direction of `Some`.
pub fn compare(a: &Hand, b: &Hand) -> Option<Ordering> {
    match (a.kind, b.kind) {
        (HandKind::Bomb, HandKind::Bomb) => Some(a.bomb_quad_high().cmp(&b.bomb_quad_high())),
        (HandKind::Bomb, _) if b.kind.is_valid_nonempty() => Some(Ordering::Greater),
        (_, HandKind::Bomb) if a.kind.is_valid_nonempty() => Some(Ordering::Less),
        (ka, kb) if ka == kb => match (a.key_card(), b.key_card()) {
            (Some(ca), Some(cb)) => Some(ca.cmp(&cb)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use proptest::prelude::*;

    fn card(n: u8) -> Card {
        Card(n)
    }

    #[test]
    fn four_cards_in_a_row_is_invalid() {
        let h = Hand::from_cards(&[card(1), card(2), card(3), card(4)]).unwrap();
        assert_eq!(h.kind(), HandKind::Invalid(4));
    }

    #[test]
    fn three_lowest_clubs_spread_is_a_triple() {
        let h = Hand::from_cards(&[card(1), card(2), card(3)]).unwrap();
        assert_eq!(h.kind(), HandKind::Triple);
    }

    #[test]
    fn quad_plus_kicker_is_a_bomb_that_beats_everything() {
        let bomb = Hand::from_cards(&[card(49), card(50), card(51), card(52), card(1)]).unwrap();
        assert_eq!(bomb.kind(), HandKind::Bomb);
        let single = Hand::from_cards(&[card(2)]).unwrap();
        assert_eq!(compare(&bomb, &single), Some(Ordering::Greater));
        assert_eq!(compare(&single, &bomb), Some(Ordering::Less));
    }

    #[test]
    fn five_consecutive_ranks_any_suits_is_a_straight() {
        let h = Hand::from_cards(&[
            Card::new(Rank::Three, Suit::Clubs),
            Card::new(Rank::Four, Suit::Diamonds),
            Card::new(Rank::Five, Suit::Hearts),
            Card::new(Rank::Six, Suit::Spades),
            Card::new(Rank::Seven, Suit::Clubs),
        ])
        .unwrap();
        assert_eq!(h.kind(), HandKind::Straight);
    }

    #[test]
    fn triples_compare_by_rank() {
        let low = Hand::from_cards(&[card(1), card(2), card(3)]).unwrap(); // 3s
        let high = Hand::from_cards(&[card(5), card(6), card(7)]).unwrap(); // 4s
        assert_eq!(compare(&low, &high), Some(Ordering::Less));
    }

    #[test]
    fn full_house_compares_by_triple_rank_not_pair_rank() {
        // triple of 4s + pair of 3s
        let a = Hand::from_cards(&[card(5), card(6), card(7), card(1), card(2)]).unwrap();
        // triple of 3s + pair of 4s
        let b = Hand::from_cards(&[card(1), card(2), card(3), card(5), card(6)]).unwrap();
        assert_eq!(a.kind(), HandKind::FullHouse);
        assert_eq!(b.kind(), HandKind::FullHouse);
        assert_eq!(compare(&a, &b), Some(Ordering::Greater));
    }

    #[test]
    fn double_vs_triple_is_incomparable() {
        let d = Hand::from_cards(&[card(1), card(2)]).unwrap();
        let t = Hand::from_cards(&[card(5), card(6), card(7)]).unwrap();
        assert_eq!(compare(&d, &t), None);
    }

    #[test]
    fn add_then_remove_every_card_returns_to_empty() {
        let mut h = Hand::empty();
        h.add(card(10)).unwrap();
        h.add(card(3)).unwrap();
        h.add(card(40)).unwrap();
        h.remove(card(3)).unwrap();
        h.remove(card(10)).unwrap();
        h.remove(card(40)).unwrap();
        assert!(h.is_empty());
        assert_eq!(h.kind(), HandKind::Empty);
    }

    proptest! {
        #[test]
        fn slots_stay_sorted_with_zeros_leading(ops in proptest::collection::vec(1u8..=52, 0..8)) {
            let mut hand = Hand::empty();
            let mut held: Vec<u8> = Vec::new();
            for c in ops {
                if held.contains(&c) {
                    let _ = hand.remove(Card(c));
                    held.retain(|&x| x != c);
                } else if hand.size() < 5 {
                    if hand.add(Card(c)).is_ok() {
                        held.push(c);
                    }
                }
            }
            let mut sorted_held = held.clone();
            sorted_held.sort_unstable();
            let zero_count = 5 - sorted_held.len();
            for i in 0..zero_count {
                prop_assert_eq!(hand.slots[i].0, 0);
            }
            for (i, &expected) in sorted_held.iter().enumerate() {
                prop_assert_eq!(hand.slots[zero_count + i].0, expected);
            }
            prop_assert_eq!(hand.size(), sorted_held.len());
        }

        #[test]
        fn classification_is_independent_of_insertion_order(mut cards in proptest::sample::subsequence((1u8..=52).collect::<Vec<_>>(), 0..=5)) {
            let forward: Vec<Card> = cards.iter().map(|&c| Card(c)).collect();
            cards.reverse();
            let backward: Vec<Card> = cards.iter().map(|&c| Card(c)).collect();
            if let (Ok(a), Ok(b)) = (Hand::from_cards(&forward), Hand::from_cards(&backward)) {
                prop_assert_eq!(a.kind(), b.kind());
            }
        }

        #[test]
        fn any_valid_bomb_beats_any_valid_non_bomb(
            quad_rank in 0usize..13,
            kicker_rank in 0usize..13,
            kicker_suit in 0u8..4,
            other_cards in proptest::sample::subsequence((1u8..=52).collect::<Vec<_>>(), 0..=5),
        ) {
            prop_assume!(quad_rank != kicker_rank);
            let quad: Vec<Card> = (0u8..4).map(|suit| Card((quad_rank as u8) * 4 + suit + 1)).collect();
            let kicker = Card((kicker_rank as u8) * 4 + kicker_suit + 1);
            let mut bomb_cards = quad;
            bomb_cards.push(kicker);
            let bomb = Hand::from_cards(&bomb_cards).unwrap();
            prop_assert_eq!(bomb.kind(), HandKind::Bomb);

            let other: Vec<Card> = other_cards.into_iter().map(Card).collect();
            if let Ok(other) = Hand::from_cards(&other) {
                if other.kind() != HandKind::Bomb && other.kind().is_valid_nonempty() {
                    prop_assert_eq!(compare(&bomb, &other), Some(Ordering::Greater));
                    prop_assert_eq!(compare(&other, &bomb), Some(Ordering::Less));
                }
            }
        }

        #[test]
        fn same_kind_non_bomb_comparison_is_irreflexive_antisymmetric_and_transitive(
            a_cards in proptest::sample::subsequence((1u8..=52).collect::<Vec<_>>(), 0..=5),
            b_cards in proptest::sample::subsequence((1u8..=52).collect::<Vec<_>>(), 0..=5),
            c_cards in proptest::sample::subsequence((1u8..=52).collect::<Vec<_>>(), 0..=5),
        ) {
            let a: Vec<Card> = a_cards.into_iter().map(Card).collect();
            let b: Vec<Card> = b_cards.into_iter().map(Card).collect();
            let c: Vec<Card> = c_cards.into_iter().map(Card).collect();
            if let (Ok(a), Ok(b), Ok(c)) = (Hand::from_cards(&a), Hand::from_cards(&b), Hand::from_cards(&c)) {
                if a.kind() == b.kind() && b.kind().is_valid_nonempty() && a.kind() != HandKind::Bomb {
                    // Irreflexive: a hand never beats itself.
                    prop_assert_ne!(compare(&a, &a), Some(Ordering::Greater));
                    prop_assert_ne!(compare(&a, &a), Some(Ordering::Less));

                    // Antisymmetric.
                    if let Some(ord) = compare(&a, &b) {
                        prop_assert_eq!(compare(&b, &a), Some(ord.reverse()));
                    }

                    // Transitive, when all three share a kind.
                    if c.kind() == a.kind() {
                        if let (Some(ab), Some(bc)) = (compare(&a, &b), compare(&b, &c)) {
                            if ab == bc {
                                prop_assert_eq!(compare(&a, &c), Some(ab));
                            }
                        }
                    }
                }
            }
        }
    }
}
