//! Property-based tests for the deck, the classifier and declaration rules.

use castellan::game::pieces::{self, Color, Piece, PieceKind};
use castellan::game::play::{self, PlayType};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn arb_piece() -> impl Strategy<Value = Piece> {
    let kinds = prop_oneof![
        Just(PieceKind::General),
        Just(PieceKind::Advisor),
        Just(PieceKind::Elephant),
        Just(PieceKind::Chariot),
        Just(PieceKind::Horse),
        Just(PieceKind::Cannon),
        Just(PieceKind::Soldier),
    ];
    let colors = prop_oneof![Just(Color::Red), Just(Color::Black)];
    (kinds, colors).prop_map(|(kind, color)| Piece::new(kind, color))
}

/// A subset of a real deck (multiplicities respected), 1..=6 pieces.
fn arb_play() -> impl Strategy<Value = Vec<Piece>> {
    proptest::sample::subsequence(pieces::new_deck(), 1..=6)
}

proptest! {
    #[test]
    fn deal_partitions_the_deck_for_any_seed(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let hands = pieces::deal_hands(&mut rng);

        prop_assert!(hands.iter().all(|h| h.len() == 8));
        let mut all: Vec<Piece> = hands.iter().flatten().copied().collect();
        all.sort();
        let mut deck = pieces::new_deck();
        deck.sort();
        prop_assert_eq!(all, deck);
    }

    #[test]
    fn classification_ignores_piece_order(mut pieces in arb_play()) {
        let forward = play::classify(&pieces);
        pieces.reverse();
        prop_assert_eq!(forward, play::classify(&pieces));
    }

    #[test]
    fn classified_value_is_the_point_sum(pieces in arb_play()) {
        if let Some(classified) = play::classify(&pieces) {
            let sum: u32 = pieces.iter().map(|p| u32::from(p.point)).sum();
            prop_assert_eq!(classified.value, sum);
        }
    }

    #[test]
    fn multi_piece_plays_are_single_colored(pieces in arb_play()) {
        if pieces.len() > 1
            && let Some(classified) = play::classify(&pieces)
        {
            prop_assert!(
                pieces.iter().all(|p| p.color == pieces[0].color),
                "type {:?} mixed colors",
                classified.play_type
            );
        }
    }

    #[test]
    fn play_type_matches_piece_count(pieces in arb_play()) {
        if let Some(classified) = play::classify(&pieces) {
            let expected: &[usize] = match classified.play_type {
                PlayType::Single => &[1],
                PlayType::Pair => &[2],
                PlayType::Triple | PlayType::Straight => &[3],
                PlayType::Extension => &[4, 5],
                PlayType::FourOfAKind => &[4],
                PlayType::FiveOfAKind => &[5],
                PlayType::SixOfAKind => &[6],
            };
            prop_assert!(expected.contains(&pieces.len()));
        }
    }

    #[test]
    fn beats_is_irreflexive_and_needs_matching_count(pieces in arb_play()) {
        if let Some(classified) = play::classify(&pieces) {
            // A play never beats itself (equal value is not enough).
            prop_assert!(!play::beats(&pieces, &classified, pieces.len()));
            // And a count mismatch never beats.
            prop_assert!(!play::beats(&pieces, &classified, pieces.len() + 1));
        }
    }

    #[test]
    fn beats_requires_strictly_higher_value(a in arb_play(), b in arb_play()) {
        if let (Some(play_a), Some(play_b)) = (play::classify(&a), play::classify(&b))
            && play::beats(&a, &play_b, a.len())
        {
            prop_assert_eq!(play_a.play_type, play_b.play_type);
            prop_assert!(play_a.value > play_b.value);
            prop_assert_eq!(a.len(), b.len());
        }
    }

    #[test]
    fn weak_hand_threshold_is_a_strict_boundary(hand in proptest::collection::vec(arb_piece(), 1..=8), threshold in 1u8..=13) {
        let weak = pieces::is_weak_hand(&hand, threshold);
        let max_point = hand.iter().map(|p| p.point).max().unwrap();
        prop_assert_eq!(weak, max_point <= threshold);
    }
}

// ============================================================================
// Declaration legality under arbitrary priors
// ============================================================================

proptest! {
    #[test]
    fn last_declarer_never_completes_the_sum(
        priors in proptest::collection::vec(0u8..=8, 3),
        streak in 0u8..=4,
    ) {
        use castellan::game::room::{GameSettings, Room};
        use castellan::game::phases::allowed_declarations;

        let mut room = Room::new("p".into(), GameSettings::default(), 16, Some(1));
        for name in ["a", "b", "c", "d"] {
            room.join(name, None).unwrap();
        }
        for (seat, value) in priors.iter().enumerate() {
            room.seat_mut(seat).unwrap().declared = Some(*value);
        }
        room.seat_mut(3).unwrap().zero_declares_streak = streak;

        let allowed = allowed_declarations(&room, 3);
        let prior_sum: u8 = priors.iter().sum();
        for value in allowed {
            prop_assert_ne!(prior_sum + value, 8);
            if streak >= 2 {
                prop_assert_ne!(value, 0);
            }
        }
    }
}
