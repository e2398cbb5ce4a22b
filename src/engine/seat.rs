use crate::card::Card;
use crate::chamber::Chamber;
use crate::hand::Hand;

/// Finishing position assigned once a seat runs out of cards (or is the
/// last seat left when everyone else has finished).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    President,
    VicePresident,
    ViceAsshole,
    Asshole,
}

pub struct Seat {
    pub index: u8,
    pub chamber: Chamber,
    /// The hand currently being assembled by this seat, via `card-click`
    /// toggles, before it is stored or played.
    pub selection: Hand,
    pub position: Option<Position>,
}

impl Seat {
    pub fn new(index: u8, cards: Vec<Card>) -> Self {
        Seat {
            index,
            chamber: Chamber::new(&cards),
            selection: Hand::empty(),
            position: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position.is_some()
    }
}
