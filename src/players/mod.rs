// Players module - built-in bot strategies
//
// Bots see the same advisory action list a remote client would and answer
// with a fully-formed action.

use crate::actions::Action;
use crate::catalog::Catalog;
use crate::enums::{ActionType, PlayerIndex};
use crate::random::RandomSource;
use crate::state::GameState;

pub mod greedy;
pub mod random;

pub use self::greedy::GreedyPlayer;
pub use self::random::RandomPlayer;

pub trait BotPlayer: Send + Sync {
    /// Picks the next action for seat `me`. `playable` is never empty.
    fn decide(
        &self,
        state: &GameState,
        catalog: &Catalog,
        me: PlayerIndex,
        playable: &[ActionType],
        random: &dyn RandomSource,
    ) -> Action;

    fn name(&self) -> &str;
}

/// Builds a bot from a one-letter code: `R` random, `G` greedy.
pub fn from_code(code: char) -> Option<Box<dyn BotPlayer>> {
    match code.to_ascii_uppercase() {
        'R' => Some(Box::new(RandomPlayer)),
        'G' => Some(Box::new(GreedyPlayer)),
        _ => None,
    }
}

fn pick<'a, T>(items: &'a [T], random: &dyn RandomSource) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let last = u32::try_from(items.len() - 1).unwrap_or(u32::MAX);
    items.get(random.int_in_range(0, last) as usize)
}
