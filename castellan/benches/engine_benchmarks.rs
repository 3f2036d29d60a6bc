//! Engine benchmarks: dealing, classification and a full scripted round.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

use castellan::bot::{BaselineStrategy, scheduler};
use castellan::game::pieces;
use castellan::game::room::GameSettings;
use castellan::game::{GameAction, GameState, PlayerAction};
use castellan::PhaseKind;

fn bench_deal(c: &mut Criterion) {
    c.bench_function("deal_hands", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| black_box(pieces::deal_hands(&mut rng)));
    });
}

fn bench_classify(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let hands = pieces::deal_hands(&mut rng);
    c.bench_function("classify_pairs", |b| {
        b.iter(|| {
            for hand in &hands {
                for window in hand.windows(2) {
                    black_box(castellan::play::classify(window));
                }
            }
        });
    });
}

fn bench_scripted_round(c: &mut Criterion) {
    c.bench_function("one_round_four_bots", |b| {
        b.iter(|| {
            let mut game = GameState::new("bench", GameSettings::default(), 1024, Some(3));
            game.join_seat("host", None, None).unwrap();
            for _ in 0..3 {
                game.handle_action(&GameAction::new(0, PlayerAction::AddBot { seat: None }))
                    .unwrap();
            }
            game.handle_action(&GameAction::new(0, PlayerAction::StartGame))
                .unwrap();

            let mut strategy = BaselineStrategy::seeded(4);
            for _ in 0..128 {
                let action = match game.phase_kind() {
                    PhaseKind::TurnResults => {
                        Some(GameAction::new(0, PlayerAction::PlayerReady))
                    }
                    PhaseKind::GameOver => None,
                    _ => (0..4)
                        .find(|&seat| !game.allowed_actions(seat).is_empty())
                        .and_then(|seat| {
                            scheduler::decide_with(&mut strategy, &game, seat)
                                .map(|d| GameAction::new(seat, d))
                        }),
                };
                let Some(action) = action else { break };
                game.handle_action(&action).unwrap();
            }
            black_box(game.version())
        });
    });
}

criterion_group!(benches, bench_deal, bench_classify, bench_scripted_round);
criterion_main!(benches);
