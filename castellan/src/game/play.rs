//! Play classification and beat comparison.
//!
//! A play is 1..=6 pieces from one hand. `classify` is a pure function from
//! pieces to `(type, value)`; an unclassifiable set is a dump. It may still
//! be played to a pile but can never win it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::pieces::{Piece, PieceKind};

/// Maximum number of pieces in a single play.
pub const MAX_PLAY_SIZE: usize = 6;

/// Piece kinds split into the two straight groups. A straight is three
/// distinct kinds of the same color drawn from one group.
const UPPER_GROUP: [PieceKind; 3] = [PieceKind::General, PieceKind::Advisor, PieceKind::Elephant];
const LOWER_GROUP: [PieceKind; 3] = [PieceKind::Chariot, PieceKind::Horse, PieceKind::Cannon];

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Single,
    Pair,
    Triple,
    Straight,
    /// A straight promoted with one or two duplicate members (4 or 5 pieces).
    Extension,
    FourOfAKind,
    FiveOfAKind,
    SixOfAKind,
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Single => "single",
            Self::Pair => "pair",
            Self::Triple => "triple",
            Self::Straight => "straight",
            Self::Extension => "extension",
            Self::FourOfAKind => "four_of_a_kind",
            Self::FiveOfAKind => "five_of_a_kind",
            Self::SixOfAKind => "six_of_a_kind",
        };
        write!(f, "{repr}")
    }
}

/// A classified play: its type and total value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Play {
    pub play_type: PlayType,
    pub value: u32,
}

/// Classify a set of pieces. Returns `None` for an invalid (dump) play.
#[must_use]
pub fn classify(pieces: &[Piece]) -> Option<Play> {
    if pieces.is_empty() || pieces.len() > MAX_PLAY_SIZE {
        return None;
    }

    let value: u32 = pieces.iter().map(|p| u32::from(p.point)).sum();
    let uniform_color = pieces.iter().all(|p| p.color == pieces[0].color);

    let play_type = match pieces.len() {
        1 => Some(PlayType::Single),
        2 if uniform_color && same_kind(pieces) => Some(PlayType::Pair),
        3 if uniform_color && all_soldiers(pieces) => Some(PlayType::Triple),
        3 if uniform_color && is_straight(pieces) => Some(PlayType::Straight),
        4 if uniform_color && all_soldiers(pieces) => Some(PlayType::FourOfAKind),
        4 | 5 if uniform_color && is_extended_straight(pieces) => Some(PlayType::Extension),
        5 if uniform_color && all_soldiers(pieces) => Some(PlayType::FiveOfAKind),
        6 if uniform_color && is_double_straight(pieces) => Some(PlayType::SixOfAKind),
        _ => None,
    }?;

    Some(Play { play_type, value })
}

/// Whether `challenger` beats `incumbent` for a pile led with
/// `required_count` pieces. A comparable play must match the count and the
/// incumbent's type; it wins on strictly higher value.
#[must_use]
pub fn beats(challenger: &[Piece], incumbent: &Play, required_count: usize) -> bool {
    if challenger.len() != required_count {
        return false;
    }
    match classify(challenger) {
        Some(play) => play.play_type == incumbent.play_type && play.value > incumbent.value,
        None => false,
    }
}

fn same_kind(pieces: &[Piece]) -> bool {
    pieces.iter().all(|p| p.kind == pieces[0].kind)
}

fn all_soldiers(pieces: &[Piece]) -> bool {
    pieces.iter().all(|p| p.kind == PieceKind::Soldier)
}

fn kind_counts(pieces: &[Piece]) -> BTreeMap<PieceKind, usize> {
    let mut counts = BTreeMap::new();
    for p in pieces {
        *counts.entry(p.kind).or_insert(0) += 1;
    }
    counts
}

fn group_of(kind: PieceKind) -> Option<&'static [PieceKind; 3]> {
    if UPPER_GROUP.contains(&kind) {
        Some(&UPPER_GROUP)
    } else if LOWER_GROUP.contains(&kind) {
        Some(&LOWER_GROUP)
    } else {
        None
    }
}

/// Three distinct kinds covering one straight group.
fn is_straight(pieces: &[Piece]) -> bool {
    let counts = kind_counts(pieces);
    let Some(group) = group_of(pieces[0].kind) else {
        return false;
    };
    group.iter().all(|k| counts.get(k) == Some(&1))
}

/// A straight plus one or two duplicate group members: every kind belongs to
/// a single group, every group kind is present, and no kind appears more
/// than twice (the deck holds at most two of each non-soldier kind).
fn is_extended_straight(pieces: &[Piece]) -> bool {
    let counts = kind_counts(pieces);
    let Some(group) = group_of(pieces[0].kind) else {
        return false;
    };
    counts.keys().all(|k| group.contains(k))
        && group.iter().all(|k| matches!(counts.get(k), Some(1 | 2)))
}

/// Both copies of all three kinds of one group, same color. Only the
/// chariot-horse-cannon group has two of every member.
fn is_double_straight(pieces: &[Piece]) -> bool {
    let counts = kind_counts(pieces);
    let Some(group) = group_of(pieces[0].kind) else {
        return false;
    };
    counts.keys().all(|k| group.contains(k)) && group.iter().all(|k| counts.get(k) == Some(&2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::pieces::{Color, Color::*, PieceKind::*};

    fn p(kind: PieceKind, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    #[test]
    fn classifies_singles_and_pairs() {
        let single = classify(&[p(General, Red)]).unwrap();
        assert_eq!(single.play_type, PlayType::Single);
        assert_eq!(single.value, 14);

        let pair = classify(&[p(Advisor, Red), p(Advisor, Red)]).unwrap();
        assert_eq!(pair.play_type, PlayType::Pair);
        assert_eq!(pair.value, 24);

        // Mixed colors never pair.
        assert!(classify(&[p(Advisor, Red), p(Advisor, Black)]).is_none());
    }

    #[test]
    fn classifies_triples_and_soldier_stacks() {
        let triple = classify(&[p(Soldier, Black); 3]).unwrap();
        assert_eq!(triple.play_type, PlayType::Triple);

        let four = classify(&[p(Soldier, Red); 4]).unwrap();
        assert_eq!(four.play_type, PlayType::FourOfAKind);

        let five = classify(&[p(Soldier, Red); 5]).unwrap();
        assert_eq!(five.play_type, PlayType::FiveOfAKind);
    }

    #[test]
    fn classifies_straights_and_extensions() {
        let straight = classify(&[p(General, Red), p(Advisor, Red), p(Elephant, Red)]).unwrap();
        assert_eq!(straight.play_type, PlayType::Straight);
        assert_eq!(straight.value, 36);

        let ext4 = classify(&[
            p(General, Red),
            p(Advisor, Red),
            p(Advisor, Red),
            p(Elephant, Red),
        ])
        .unwrap();
        assert_eq!(ext4.play_type, PlayType::Extension);

        let ext5 = classify(&[
            p(Chariot, Black),
            p(Chariot, Black),
            p(Horse, Black),
            p(Horse, Black),
            p(Cannon, Black),
        ])
        .unwrap();
        assert_eq!(ext5.play_type, PlayType::Extension);

        // A straight across groups is a dump.
        assert!(classify(&[p(Elephant, Red), p(Chariot, Red), p(Horse, Red)]).is_none());
    }

    #[test]
    fn classifies_double_straight_as_six_of_a_kind() {
        let six = classify(&[
            p(Chariot, Red),
            p(Chariot, Red),
            p(Horse, Red),
            p(Horse, Red),
            p(Cannon, Red),
            p(Cannon, Red),
        ])
        .unwrap();
        assert_eq!(six.play_type, PlayType::SixOfAKind);
        assert_eq!(six.value, 36);
    }

    #[test]
    fn beats_requires_matching_count_and_type() {
        let lead = classify(&[p(Horse, Black)]).unwrap(); // value 5

        assert!(beats(&[p(General, Red)], &lead, 1));
        assert!(!beats(&[p(Soldier, Red)], &lead, 1)); // 2 < 5
        assert!(!beats(&[p(General, Red)], &lead, 2)); // wrong count
        assert!(!beats(
            &[p(Advisor, Red), p(Advisor, Red)],
            &classify(&[p(Soldier, Red), p(Soldier, Red)]).unwrap(),
            1
        ));
    }

    #[test]
    fn equal_value_does_not_beat() {
        let lead = classify(&[p(Elephant, Black)]).unwrap(); // 9
        assert!(!beats(&[p(Elephant, Black)], &lead, 1));
    }
}
