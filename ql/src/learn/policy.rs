use anyhow::Result;
use rand::Rng;

use crate::ml_model::model::ValueModel;
use crate::prelude::{Action, ModelActionType};

/// Epsilon-greedy action selection with an exploration rate decaying linearly over the first
/// `exploration_games` episodes:
///
/// `p_explore = max(0, exploration_games - games_played) / exploration_games`
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedyPolicy {
    exploration_games: usize,
}

impl EpsilonGreedyPolicy {
    pub fn new(exploration_games: usize) -> Self { Self { exploration_games } }

    pub fn explore_probability(
        &self,
        games_played: usize,
    ) -> f64 {
        if self.exploration_games == 0 {
            return 0.0;
        }
        self.exploration_games.saturating_sub(games_played) as f64 / self.exploration_games as f64
    }

    /// Picks a uniformly random action with probability [Self::explore_probability],
    /// otherwise the action closest to the model's value prediction for `state`.
    ///
    /// The model is only read (inference mode). Exactly one random number is drawn per call; when exploring,
    /// the random action is derived from that same draw.
    pub fn select_action<M, A, R>(
        &self,
        model: &M,
        state: &M::S,
        games_played: usize,
        rng: &mut R,
    ) -> Result<A>
    where
        M: ValueModel,
        A: Action,
        R: Rng + ?Sized,
    {
        let draw = rng.gen::<f64>();
        let explore_probability = self.explore_probability(games_played);
        if draw < explore_probability {
            // draw / p is uniform in [0, 1) here
            let numeric = (draw / explore_probability * A::ACTION_SPACE as f64) as ModelActionType;
            A::try_from_numeric(numeric.min(A::ACTION_SPACE - 1))
        } else {
            let value = model.predict_value(state)?;
            A::try_from_numeric(nearest_numeric_action::<A>(value))
        }
    }
}

/// Rounds a model output to the nearest valid numeric action
pub fn nearest_numeric_action<A: Action>(value: f32) -> ModelActionType {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, (A::ACTION_SPACE - 1) as f32) as ModelActionType
}
