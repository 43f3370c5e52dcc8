use std::time::{Duration, Instant};

use crate::environment::action::JumpAction;

#[derive(Debug, Clone)]
pub struct RewardParameter {
    /// Reward of the step which ends the episode; replaces every other term
    pub death_penalty: f32,
    /// Applied when the decision does not map to a known action
    pub invalid_action_penalty: f32,
    /// Granted once per `survival_interval` alive
    pub survival_reward: f32,
    pub survival_interval: Duration,
}

impl Default for RewardParameter {
    fn default() -> Self {
        Self {
            death_penalty: -10.0,
            invalid_action_penalty: -0.1,
            survival_reward: 1.0,
            survival_interval: Duration::from_secs(1),
        }
    }
}

/// Timers of one episode.
///
/// `episode_start` measures the score; `last_survival_grant` measures the time since the last survival reward.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeClock {
    episode_start: Instant,
    last_survival_grant: Instant,
}

impl EpisodeClock {
    pub fn started_at(now: Instant) -> Self {
        Self {
            episode_start: now,
            last_survival_grant: now,
        }
    }

    pub fn reset(
        &mut self,
        now: Instant,
    ) {
        *self = Self::started_at(now)
    }

    /// Whole seconds survived
    pub fn score(
        &self,
        now: Instant,
    ) -> u32 {
        now.saturating_duration_since(self.episode_start).as_secs() as u32
    }
}

/// Reward of one step.
///
/// `action` is the canonicalized decision; `None` stands for a raw decision which maps to no action.
pub fn step_reward(
    param: &RewardParameter,
    action: Option<JumpAction>,
    done: bool,
    clock: &mut EpisodeClock,
    now: Instant,
) -> f32 {
    if done {
        return param.death_penalty;
    }

    let mut reward = 0.0;
    if action.is_none() {
        reward += param.invalid_action_penalty;
    }
    if now.saturating_duration_since(clock.last_survival_grant) >= param.survival_interval {
        clock.last_survival_grant = now;
        reward += param.survival_reward;
    }
    reward
}
