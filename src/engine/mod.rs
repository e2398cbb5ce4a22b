//! The four-seat trick/turn state machine.
//!
//! A [`Match`] owns everything it needs: four [`Seat`]s (each with its own
//! [`Chamber`]), the current turn state, and the finishing order. There is
//! no process-wide table of matches here — the room layer (`crate::room`)
//! is what maps an external id to a `Match` value.

pub mod intent;
pub mod seat;

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::card::{deal, Card, THREE_OF_CLUBS};
use crate::chamber::ChamberEvent;
use crate::error::IntentError;
use crate::event::{Event, EventSink, Scope};
use crate::hand::{compare, Hand, HandKind};

pub use intent::Intent;
pub use seat::{Position, Seat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// The very first play of the match: only the holder of the 3 of
    /// clubs may act, and their hand must contain it.
    Lead,
    /// A hand is in play; the current seat must beat it or pass.
    Follow { hand_in_play: Hand },
    /// Every other unfinished seat has passed on the last play; the
    /// winner may lead with anything, no beat constraint.
    Free,
}

pub struct Match {
    pub seats: [Seat; 4],
    pub current: u8,
    pub state: TurnState,
    pass_count: u8,
    /// The seat that last successfully played a hand, i.e. whoever the
    /// turn returns to once the table passes out into FREE.
    winner: u8,
    pub finishing_order: Vec<u8>,
    pub is_over: bool,
}

impl Match {
    /// Deals a fresh 52-card shuffle into four 13-card seats and starts
    /// the match with whoever holds the 3 of clubs.
    pub fn deal() -> Self {
        let mut rng = StdRng::from_entropy();
        Self::deal_with_rng(&mut rng)
    }

    pub fn deal_with_rng<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let hands = deal(rng);
        let seats = {
            let mut it = hands.into_iter().enumerate().map(|(i, cards)| Seat::new(i as u8, cards));
            [
                it.next().unwrap(),
                it.next().unwrap(),
                it.next().unwrap(),
                it.next().unwrap(),
            ]
        };
        let current = seats
            .iter()
            .find(|s| s.chamber.contains_card(THREE_OF_CLUBS))
            .map(|s| s.index)
            .expect("three of clubs is always dealt to exactly one seat");

        Match {
            seats,
            current,
            state: TurnState::Lead,
            pass_count: 0,
            winner: current,
            finishing_order: Vec::new(),
            is_over: false,
        }
    }

    fn unfinished_count(&self) -> u8 {
        self.seats.iter().filter(|s| !s.is_finished()).count() as u8
    }

    fn next_unfinished(&self, from: u8) -> u8 {
        let mut i = (from + 1) % 4;
        while self.seats[i as usize].is_finished() {
            i = (i + 1) % 4;
        }
        i
    }

    fn require_current(&self, seat: u8) -> Result<(), IntentError> {
        if seat != self.current {
            Err(IntentError::OutOfTurn)
        } else {
            Ok(())
        }
    }

    pub fn apply(&mut self, seat: u8, intent: Intent, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        match intent {
            Intent::CardClick(card) => self.card_click(seat, card, sink),
            Intent::HandClick(cards) => {
                for card in cards {
                    self.card_click(seat, card, sink)?;
                }
                Ok(())
            }
            Intent::ClearCurrentHand => self.clear_current_hand(seat, sink),
            Intent::Store => self.store(seat, sink),
            Intent::ClearStoredHands => self.clear_stored_hands(seat, sink),
            Intent::PlayCurrentHand => self.play_current_hand(seat, sink),
            Intent::PassCurrentHand => self.pass_current_hand(seat, sink),
        }
    }

    fn card_click(&mut self, seat: u8, card: Card, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        let s = &mut self.seats[seat as usize];
        if s.selection.contains(card) {
            s.selection.remove(card).expect("card just checked to be in the selection");
            let events = s.chamber.deselect_card(card)?;
            emit_chamber_events(sink, seat, events);
        } else {
            if s.selection.size() == 5 {
                return Err(IntentError::SelectionFull);
            }
            if !s.chamber.contains_card(card) {
                return Err(crate::error::ChamberError::CardNotHeld(card).into());
            }
            s.selection.add(card).expect("presence and fullness already checked");
            let events = s.chamber.select_card(card)?;
            emit_chamber_events(sink, seat, events);
        }
        Ok(())
    }

    fn clear_current_hand(&mut self, seat: u8, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        let cards: Vec<Card> = self.seats[seat as usize].selection.cards().collect();
        for card in cards {
            self.card_click(seat, card, sink)?;
        }
        sink.emit(Event::ClearCurrentHand, Scope::Seat(seat));
        Ok(())
    }

    fn store(&mut self, seat: u8, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        let s = &mut self.seats[seat as usize];
        let selection = s.selection;
        if selection.size() < 2 {
            return Err(IntentError::HandTooSmallToStore);
        }
        if !selection.kind().is_storable() {
            return Err(IntentError::InvalidHand);
        }
        if s.chamber.contains_hand(&selection) {
            return Err(IntentError::DuplicateStoredHand);
        }
        // Undo the selection highlighting on whatever stored hands already
        // share these cards before the new hand joins the cross-index,
        // so the new hand (created unselected) is never itself touched.
        let cards: Vec<Card> = selection.cards().collect();
        for &card in &cards {
            let events = s.chamber.deselect_card(card)?;
            emit_chamber_events(sink, seat, events);
        }

        let (id, stored_event) = s.chamber.add_hand(selection).map_err(|e| match e {
            crate::error::ChamberError::DuplicateHand => IntentError::DuplicateStoredHand,
            other => other.into(),
        })?;
        if let ChamberEvent::StoreHand { cards, .. } = &stored_event {
            sink.emit(
                Event::StoreHand {
                    hand: id,
                    cards: cards.clone(),
                },
                Scope::Seat(seat),
            );
        }

        for card in cards {
            s.selection.remove(card).expect("card is in the selection we just stored");
        }
        sink.emit(Event::ClearCurrentHand, Scope::Seat(seat));
        Ok(())
    }

    fn clear_stored_hands(&mut self, seat: u8, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        let events = self.seats[seat as usize].chamber.clear_hands();
        emit_chamber_events(sink, seat, events);
        Ok(())
    }

    fn play_current_hand(&mut self, seat: u8, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        self.require_current(seat)?;
        let selection = self.seats[seat as usize].selection;
        if !selection.kind().is_valid_nonempty() {
            return Err(IntentError::InvalidHand);
        }

        match &self.state {
            TurnState::Lead => {
                if !selection.contains(THREE_OF_CLUBS) {
                    return Err(IntentError::MustLeadWithThreeOfClubs);
                }
            }
            TurnState::Follow { hand_in_play } => match compare(&selection, hand_in_play) {
                None => return Err(IntentError::Incomparable),
                Some(Ordering::Greater) => {}
                Some(Ordering::Less) | Some(Ordering::Equal) => return Err(IntentError::TooWeak),
            },
            TurnState::Free => {}
        }

        let played: Vec<Card> = selection.cards().collect();
        for &card in &played {
            let events = self.seats[seat as usize].chamber.remove_card(card)?;
            emit_chamber_events(sink, seat, events);
        }
        self.seats[seat as usize].selection = Hand::empty();

        self.state = TurnState::Follow { hand_in_play: selection };
        self.pass_count = 0;
        self.winner = seat;
        sink.emit(Event::HandInPlay { cards: played }, Scope::All);

        if self.seats[seat as usize].chamber.iter_cards().next().is_none() {
            self.finish_seat(seat, sink);
        }

        if !self.is_over {
            self.current = self.next_unfinished(seat);
        }
        Ok(())
    }

    fn pass_current_hand(&mut self, seat: u8, sink: &mut dyn EventSink) -> Result<(), IntentError> {
        self.require_current(seat)?;
        if !matches!(self.state, TurnState::Follow { .. }) {
            return Err(IntentError::CannotPass);
        }
        self.pass_count += 1;
        let threshold = self.unfinished_count().saturating_sub(1);
        if self.pass_count >= threshold {
            self.state = TurnState::Free;
            self.pass_count = 0;
            self.current = self.winner;
            sink.emit(Event::ClearHandInPlay, Scope::All);
        } else {
            self.current = self.next_unfinished(seat);
        }
        Ok(())
    }

    fn finish_seat(&mut self, seat: u8, sink: &mut dyn EventSink) {
        let position = match self.finishing_order.len() {
            0 => Position::President,
            1 => Position::VicePresident,
            2 => Position::ViceAsshole,
            _ => Position::Asshole,
        };
        self.seats[seat as usize].position = Some(position);
        self.finishing_order.push(seat);
        sink.emit(Event::Finished, Scope::Seat(seat));

        if self.unfinished_count() == 1 {
            let last = self
                .seats
                .iter()
                .find(|s| !s.is_finished())
                .map(|s| s.index)
                .expect("one seat always remains when unfinished_count == 1");
            self.seats[last as usize].position = Some(Position::Asshole);
            self.finishing_order.push(last);
            sink.emit(Event::Finished, Scope::Seat(last));
            self.is_over = true;
        }
    }
}

fn emit_chamber_events(sink: &mut dyn EventSink, seat: u8, events: Vec<ChamberEvent>) {
    for event in events {
        let translated = match event {
            ChamberEvent::SelectCard(card) => Event::SelectCard { card },
            ChamberEvent::DeselectCard(card) => Event::DeselectCard { card },
            ChamberEvent::AddCard(card) => Event::AddCard { card },
            ChamberEvent::RemoveCard(card) => Event::RemoveCard { card },
            ChamberEvent::StoreHand { id, cards } => Event::StoreHand { hand: id, cards },
            ChamberEvent::RemoveHand { id } => Event::RemoveHand { hand: id },
            ChamberEvent::SelectHand { id } => Event::SelectHand { hand: id },
            ChamberEvent::DeselectHand { id } => Event::DeselectHand { hand: id },
        };
        sink.emit(translated, Scope::Seat(seat));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingSink;

    fn seeded_match(seed: u64) -> Match {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Match::deal_with_rng(&mut rng)
    }

    #[test]
    fn lead_must_contain_three_of_clubs() {
        let mut m = seeded_match(1);
        let mut sink = RecordingSink::default();
        let leader = m.current;
        let other_card = m.seats[leader as usize]
            .chamber
            .iter_cards()
            .find(|&c| c != THREE_OF_CLUBS)
            .unwrap();

        m.apply(leader, Intent::CardClick(other_card), &mut sink).unwrap();
        let err = m.apply(leader, Intent::PlayCurrentHand, &mut sink).unwrap_err();
        assert_eq!(err, IntentError::MustLeadWithThreeOfClubs);

        m.apply(leader, Intent::CardClick(other_card), &mut sink).unwrap(); // undo
        m.apply(leader, Intent::CardClick(THREE_OF_CLUBS), &mut sink).unwrap();
        m.apply(leader, Intent::PlayCurrentHand, &mut sink).unwrap();
        assert!(matches!(m.state, TurnState::Follow { .. }));
    }

    #[test]
    fn three_consecutive_passes_free_the_table() {
        let mut m = seeded_match(2);
        let mut sink = RecordingSink::default();
        let leader = m.current;
        m.apply(leader, Intent::CardClick(THREE_OF_CLUBS), &mut sink).unwrap();
        m.apply(leader, Intent::PlayCurrentHand, &mut sink).unwrap();

        for _ in 0..3 {
            let acting = m.current;
            m.apply(acting, Intent::PassCurrentHand, &mut sink).unwrap();
        }

        assert_eq!(m.state, TurnState::Free);
        assert_eq!(m.current, leader);
    }

    #[test]
    fn cannot_pass_out_of_turn() {
        let mut m = seeded_match(3);
        let mut sink = RecordingSink::default();
        let not_current = (m.current + 1) % 4;
        let err = m.apply(not_current, Intent::PassCurrentHand, &mut sink).unwrap_err();
        assert_eq!(err, IntentError::OutOfTurn);
    }

    #[test]
    fn cannot_pass_while_leading() {
        let mut m = seeded_match(4);
        let mut sink = RecordingSink::default();
        let err = m.apply(m.current, Intent::PassCurrentHand, &mut sink).unwrap_err();
        assert_eq!(err, IntentError::CannotPass);
    }

    #[test]
    fn finishing_order_assigns_all_four_positions_in_order() {
        let mut m = seeded_match(5);
        let mut sink = RecordingSink::default();

        m.finish_seat(0, &mut sink);
        assert_eq!(m.seats[0].position, Some(Position::President));
        assert!(!m.is_over);

        m.finish_seat(1, &mut sink);
        assert_eq!(m.seats[1].position, Some(Position::VicePresident));
        assert!(!m.is_over);

        m.finish_seat(2, &mut sink);
        assert_eq!(m.seats[2].position, Some(Position::ViceAsshole));
        assert_eq!(m.seats[3].position, Some(Position::Asshole));
        assert!(m.is_over);
        assert_eq!(m.finishing_order, vec![0, 1, 2, 3]);
    }
}
