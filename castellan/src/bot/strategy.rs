//! Bot decision-making.
//!
//! A strategy answers the three decision points a seat can face: the redeal
//! question, the declaration, and a play (leading or following). Strategies
//! see only what the owning seat could see: its own hand and the public
//! pile context.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::game::pieces::{self, Piece};
use crate::game::play::{Play, PlayType};
use crate::game::room::PILES_PER_ROUND;

/// Decision interface for bot seats and taken-over human seats.
pub trait BotStrategy: Send {
    /// Whether to accept a redeal for a weak hand.
    fn decide_redeal(&mut self, hand: &[Piece], threshold: u8) -> bool;

    /// Pick a declaration from the published legal set.
    fn decide_declaration(&mut self, hand: &[Piece], allowed: &[u8]) -> u8;

    /// Lead the pile: any 1..=6 hand indices forming the chosen play.
    fn decide_lead(&mut self, hand: &[Piece]) -> Vec<usize>;

    /// Follow the pile with exactly `required` hand indices.
    fn decide_follow(&mut self, hand: &[Piece], required: usize, lead: Option<Play>)
    -> Vec<usize>;
}

/// The shipped baseline: accepts redeals while weak, declares from hand
/// strength, leads its best combination and follows with the cheapest
/// winning play, dumping its weakest pieces when it cannot win.
pub struct BaselineStrategy {
    rng: StdRng,
}

impl BaselineStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic variant for tests and replay.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rough pile expectation: one pile per clearly strong piece, plus one
    /// for a strong pair.
    fn estimate_strength(hand: &[Piece]) -> u8 {
        let strong = hand.iter().filter(|p| p.point >= 10).count();
        let strong_pairs = pairs_of(hand)
            .iter()
            .filter(|(i, _)| hand[*i].point >= 8)
            .count();
        (strong + strong_pairs).min(usize::from(PILES_PER_ROUND)) as u8
    }
}

impl Default for BaselineStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BotStrategy for BaselineStrategy {
    fn decide_redeal(&mut self, hand: &[Piece], threshold: u8) -> bool {
        pieces::is_weak_hand(hand, threshold)
    }

    fn decide_declaration(&mut self, hand: &[Piece], allowed: &[u8]) -> u8 {
        let target = Self::estimate_strength(hand);
        // Nearest legal value; jitter breaks ties so four bots don't mirror
        // each other every round.
        let jitter: i16 = self.rng.random_range(-1..=1);
        let target = i16::from(target).saturating_add(jitter).max(0) as u8;
        allowed
            .iter()
            .copied()
            .min_by_key(|v| v.abs_diff(target))
            .unwrap_or(0)
    }

    fn decide_lead(&mut self, hand: &[Piece]) -> Vec<usize> {
        // Prefer the strongest pair; otherwise the strongest single.
        if let Some((i, j)) = pairs_of(hand).into_iter().max_by_key(|(i, _)| hand[*i].point) {
            return vec![i, j];
        }
        match hand.iter().enumerate().max_by_key(|(_, p)| p.point) {
            Some((i, _)) => vec![i],
            None => Vec::new(),
        }
    }

    fn decide_follow(
        &mut self,
        hand: &[Piece],
        required: usize,
        lead: Option<Play>,
    ) -> Vec<usize> {
        if let Some(lead) = lead {
            match (required, lead.play_type) {
                (1, PlayType::Single) => {
                    // Cheapest single that still wins.
                    if let Some((i, _)) = hand
                        .iter()
                        .enumerate()
                        .filter(|(_, p)| u32::from(p.point) > lead.value)
                        .min_by_key(|(_, p)| p.point)
                    {
                        return vec![i];
                    }
                }
                (2, PlayType::Pair) => {
                    if let Some((i, j)) = pairs_of(hand)
                        .into_iter()
                        .filter(|(i, j)| {
                            u32::from(hand[*i].point) + u32::from(hand[*j].point) > lead.value
                        })
                        .min_by_key(|(i, j)| hand[*i].point + hand[*j].point)
                    {
                        return vec![i, j];
                    }
                }
                _ => {}
            }
        }
        dump_lowest(hand, required)
    }
}

/// Index pairs of same-kind, same-color pieces. A sorted hand keeps pair
/// members adjacent, but this does not rely on it.
fn pairs_of(hand: &[Piece]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut used = vec![false; hand.len()];
    for i in 0..hand.len() {
        if used[i] {
            continue;
        }
        for j in (i + 1)..hand.len() {
            if !used[j] && hand[i].kind == hand[j].kind && hand[i].color == hand[j].color {
                pairs.push((i, j));
                used[i] = true;
                used[j] = true;
                break;
            }
        }
    }
    pairs
}

/// The `count` weakest hand indices, for dumping into a lost pile.
fn dump_lowest(hand: &[Piece], count: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..hand.len()).collect();
    indices.sort_by_key(|&i| hand[i].point);
    indices.truncate(count);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::pieces::{Color, Color::*, PieceKind, PieceKind::*};
    use crate::game::play;

    fn p(kind: PieceKind, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    #[test]
    fn baseline_accepts_redeal_only_while_weak() {
        let mut bot = BaselineStrategy::new();
        let weak = vec![p(Soldier, Red), p(Cannon, Black), p(Elephant, Black)];
        assert!(bot.decide_redeal(&weak, 9));

        let strong = vec![p(Soldier, Red), p(General, Red)];
        assert!(!bot.decide_redeal(&strong, 9));
    }

    #[test]
    fn declaration_is_always_legal() {
        let mut bot = BaselineStrategy::new();
        let hand = vec![
            p(General, Red),
            p(Advisor, Red),
            p(Elephant, Red),
            p(Soldier, Black),
        ];
        for _ in 0..32 {
            let allowed = vec![0, 2, 3, 4, 5, 6, 7, 8];
            let value = bot.decide_declaration(&hand, &allowed);
            assert!(allowed.contains(&value));
        }
    }

    #[test]
    fn follow_plays_the_cheapest_winning_single() {
        let mut bot = BaselineStrategy::new();
        let hand = vec![
            p(Soldier, Black),
            p(Horse, Red),
            p(Chariot, Black),
            p(General, Red),
        ];
        let lead = play::classify(&[p(Horse, Black)]).unwrap(); // value 5
        let choice = bot.decide_follow(&hand, 1, Some(lead));
        assert_eq!(choice, vec![1]); // horse(6), not general(14)
    }

    #[test]
    fn follow_dumps_lowest_when_it_cannot_win() {
        let mut bot = BaselineStrategy::new();
        let hand = vec![p(Chariot, Black), p(Soldier, Black), p(Soldier, Red)];
        let lead = play::classify(&[p(General, Red)]).unwrap();
        let choice = bot.decide_follow(&hand, 1, Some(lead));
        assert_eq!(choice, vec![1]); // black soldier, point 1
    }

    #[test]
    fn lead_prefers_a_pair_over_a_single() {
        let mut bot = BaselineStrategy::new();
        let hand = vec![
            p(General, Red),
            p(Advisor, Black),
            p(Advisor, Black),
            p(Soldier, Red),
        ];
        let mut choice = bot.decide_lead(&hand);
        choice.sort_unstable();
        assert_eq!(choice, vec![1, 2]);
    }
}
