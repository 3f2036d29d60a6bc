//! The 32-piece Castellan deck.
//!
//! Pieces follow the traditional Xiangqi distribution: per color one General,
//! two Advisors, two Elephants, two Chariots, two Horses, two Cannons and
//! five Soldiers. Every piece carries a fixed `point` rank used for beat
//! comparisons and hand-strength checks; red outranks black within a kind.

use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of pieces in a full deck.
pub const DECK_SIZE: usize = 32;

/// Number of pieces dealt to each seat.
pub const HAND_SIZE: usize = 8;

/// Number of seats in a room.
pub const SEAT_COUNT: usize = 4;

/// A hand with no piece above this point is weak and triggers the redeal
/// negotiation. A hand whose best piece equals the threshold is still weak.
pub const DEFAULT_WEAK_HAND_THRESHOLD: u8 = 9;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Red => "red",
            Self::Black => "black",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    General,
    Advisor,
    Elephant,
    Chariot,
    Horse,
    Cannon,
    Soldier,
}

impl PieceKind {
    /// How many copies of this kind exist per color.
    pub const fn copies(self) -> usize {
        match self {
            Self::General => 1,
            Self::Soldier => 5,
            _ => 2,
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::General => "general",
            Self::Advisor => "advisor",
            Self::Elephant => "elephant",
            Self::Chariot => "chariot",
            Self::Horse => "horse",
            Self::Cannon => "cannon",
            Self::Soldier => "soldier",
        };
        write!(f, "{repr}")
    }
}

/// An immutable game piece. Equality is structural; ordering is by `point`
/// first, so sorting a hand yields weakest-to-strongest.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub point: u8,
}

impl Piece {
    #[must_use]
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self {
            kind,
            color,
            point: point_of(kind, color),
        }
    }
}

impl Ord for Piece {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.point
            .cmp(&other.point)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.color.cmp(&other.color))
    }
}

impl PartialOrd for Piece {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind, self.point, self.color)
    }
}

/// Fixed rank table. Red outranks black within a kind.
const fn point_of(kind: PieceKind, color: Color) -> u8 {
    let red = match kind {
        PieceKind::General => 14,
        PieceKind::Advisor => 12,
        PieceKind::Elephant => 10,
        PieceKind::Chariot => 8,
        PieceKind::Horse => 6,
        PieceKind::Cannon => 4,
        PieceKind::Soldier => 2,
    };
    match color {
        Color::Red => red,
        Color::Black => red - 1,
    }
}

/// Build the full 32-piece deck in a fixed order.
#[must_use]
pub fn new_deck() -> Vec<Piece> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in [Color::Red, Color::Black] {
        for kind in [
            PieceKind::General,
            PieceKind::Advisor,
            PieceKind::Elephant,
            PieceKind::Chariot,
            PieceKind::Horse,
            PieceKind::Cannon,
            PieceKind::Soldier,
        ] {
            for _ in 0..kind.copies() {
                deck.push(Piece::new(kind, color));
            }
        }
    }
    deck
}

/// Shuffle the deck and deal four hands of eight, without replacement.
///
/// The RNG is injected so deals are reproducible under a fixed seed.
#[must_use]
pub fn deal_hands(rng: &mut StdRng) -> [Vec<Piece>; 4] {
    let mut deck = new_deck();
    deck.shuffle(rng);

    let mut hands: [Vec<Piece>; 4] = std::array::from_fn(|_| Vec::with_capacity(HAND_SIZE));
    for (i, piece) in deck.into_iter().enumerate() {
        hands[i / HAND_SIZE].push(piece);
    }
    for hand in &mut hands {
        hand.sort();
    }
    hands
}

/// A hand is weak iff no piece's point exceeds the threshold.
#[must_use]
pub fn is_weak_hand(hand: &[Piece], threshold: u8) -> bool {
    hand.iter().all(|p| p.point <= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn deck_has_32_pieces_with_xiangqi_distribution() {
        let deck = new_deck();
        assert_eq!(deck.len(), DECK_SIZE);

        for color in [Color::Red, Color::Black] {
            let count = |kind: PieceKind| {
                deck.iter()
                    .filter(|p| p.kind == kind && p.color == color)
                    .count()
            };
            assert_eq!(count(PieceKind::General), 1);
            assert_eq!(count(PieceKind::Advisor), 2);
            assert_eq!(count(PieceKind::Elephant), 2);
            assert_eq!(count(PieceKind::Chariot), 2);
            assert_eq!(count(PieceKind::Horse), 2);
            assert_eq!(count(PieceKind::Cannon), 2);
            assert_eq!(count(PieceKind::Soldier), 5);
        }
    }

    #[test]
    fn red_outranks_black_within_a_kind() {
        assert_eq!(Piece::new(PieceKind::General, Color::Red).point, 14);
        assert_eq!(Piece::new(PieceKind::General, Color::Black).point, 13);
        assert_eq!(Piece::new(PieceKind::Soldier, Color::Red).point, 2);
        assert_eq!(Piece::new(PieceKind::Soldier, Color::Black).point, 1);
    }

    #[test]
    fn deal_is_exhaustive_and_reproducible() {
        let mut rng = StdRng::seed_from_u64(7);
        let hands = deal_hands(&mut rng);
        assert!(hands.iter().all(|h| h.len() == HAND_SIZE));

        let mut all: Vec<Piece> = hands.iter().flatten().copied().collect();
        all.sort();
        let mut full = new_deck();
        full.sort();
        assert_eq!(all, full);

        let mut rng_again = StdRng::seed_from_u64(7);
        assert_eq!(hands, deal_hands(&mut rng_again));
    }

    #[test]
    fn weak_hand_boundary_is_inclusive() {
        let at_threshold = vec![Piece::new(PieceKind::Elephant, Color::Black)]; // point 9
        assert!(is_weak_hand(&at_threshold, DEFAULT_WEAK_HAND_THRESHOLD));

        let above = vec![Piece::new(PieceKind::Elephant, Color::Red)]; // point 10
        assert!(!is_weak_hand(&above, DEFAULT_WEAK_HAND_THRESHOLD));
    }
}
