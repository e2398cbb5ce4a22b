//! Card identity and the Presidents rank/suit order.
//!
//! Cards are numbered 1..=52. Rank order is 3,4,5,6,7,8,9,10,J,Q,K,A,2 (the
//! 2 is the highest rank in Presidents, not the ace), and strength is just
//! the card id itself: higher id, stronger card, full stop.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

/// A card in 1..=52. Newtype rather than a bare `u8` so the compiler
/// catches accidental mixing with seat indices or hand slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card(pub u8);

/// The card that must appear in the first lead of a match.
pub const THREE_OF_CLUBS: Card = Card(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Rank {
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Card {
    /// Builds the card with the given rank and suit, in the same order the
    /// classification table iterates them: `rank * 4 + suit + 1`.
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Card(rank as u8 * 4 + suit as u8 + 1)
    }

    pub fn rank(self) -> Rank {
        RANKS[((self.0 - 1) / 4) as usize]
    }

    pub fn suit(self) -> Suit {
        SUITS[((self.0 - 1) % 4) as usize]
    }

    /// Card strength under Presidents ordering. Presently just the id, but
    /// kept as a named method so callers never hand-roll `card.0` compares.
    pub fn strength(self) -> u8 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        (1..=52).contains(&self.0)
    }
}

const RANKS: [Rank; 13] = [
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
    Rank::Ace,
    Rank::Two,
];

const SUITS: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} of {:?}", self.rank(), self.suit())
    }
}

/// A freshly shuffled, evenly-split deck: four sorted 13-card hands.
pub fn deal<R: rand::Rng + ?Sized>(rng: &mut R) -> [Vec<Card>; 4] {
    use rand::seq::SliceRandom;

    let mut deck: Vec<Card> = (1..=52).map(Card).collect();
    deck.shuffle(rng);

    let mut seats: [Vec<Card>; 4] = Default::default();
    for (i, card) in deck.into_iter().enumerate() {
        seats[i % 4].push(card);
    }
    for seat in &mut seats {
        seat.sort_unstable();
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_rank_and_suit_roundtrip_through_a_card(rank: Rank, suit: Suit) {
            let c = Card::new(rank, suit);
            prop_assert_eq!(c.rank(), rank);
            prop_assert_eq!(c.suit(), suit);
            prop_assert!(c.is_valid());
        }
    }

    #[test]
    fn three_of_clubs_is_card_one() {
        assert_eq!(Card::new(Rank::Three, Suit::Clubs), THREE_OF_CLUBS);
    }

    #[test]
    fn two_of_spades_is_the_top_card() {
        assert_eq!(Card::new(Rank::Two, Suit::Spades), Card(52));
    }

    #[test]
    fn rank_and_suit_roundtrip() {
        for id in 1..=52u8 {
            let c = Card(id);
            assert_eq!(Card::new(c.rank(), c.suit()), c);
        }
    }

    #[test]
    fn deal_is_four_disjoint_thirteen_card_hands() {
        let mut rng = rand::thread_rng();
        let seats = deal(&mut rng);
        let mut all: Vec<u8> = seats.iter().flatten().map(|c| c.0).collect();
        assert_eq!(all.len(), 52);
        all.sort_unstable();
        assert_eq!(all, (1..=52).collect::<Vec<_>>());
        for seat in &seats {
            assert_eq!(seat.len(), 13);
        }
    }
}
