use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use ql::learn::policy::EpsilonGreedyPolicy;
use ql::learn::replay_memory::action_distribution_line;
use ql::learn::trainer::Trainer;
use ql::prelude::{Action, ReplayMemory, Transition, ValueModel};
use ql::util::format;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::checkpoint::{ModelStore, TrainingProgress, DEFAULT_CHECKPOINT};
use crate::config::Parameter;
use crate::environment::action::JumpAction;
use crate::environment::collaborators::{CollaboratorStats, GameWindow};
use crate::environment::game::{GameEnvironment, StepResult};
use crate::learn::coordinator::StopSignal;
use crate::preprocess::Observation;

pub type JumpTransition = Transition<Observation, JumpAction>;

/// Pause after a step which had to be skipped
const SKIPPED_STEP_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEnd {
    /// Death detected; the only regular end
    Died,
    WindowGone,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EpisodeSummary {
    pub end: EpisodeEnd,
    /// Steps which produced a transition
    pub steps: usize,
    /// Steps without any valid observation to act on, or whose input could not reach the window
    pub skipped_steps: usize,
    pub total_reward: f32,
    pub score: u32,
    pub new_record: bool,
    pub action_distribution: String,
    pub failures: CollaboratorStats,
}

impl EpisodeSummary {
    pub fn died(&self) -> bool { self.end == EpisodeEnd::Died }
}

/// A learning player: model, experience and the counters driving exploration.
///
/// Owned by exactly one thread.
pub struct Agent<M>
where
    M: ValueModel<S = Observation>,
{
    model: M,
    memory: ReplayMemory<JumpTransition>,
    trainer: Trainer,
    policy: EpsilonGreedyPolicy,
    batch_size: usize,
    games_played: usize,
    record: u32,
    rng: StdRng,
}

impl<M> Agent<M>
where
    M: ValueModel<S = Observation>,
{
    pub fn new(
        model: M,
        param: &Parameter,
        seed: u64,
    ) -> Self {
        Self {
            model,
            memory: ReplayMemory::new(param.memory_capacity),
            trainer: Trainer::new(param.gamma),
            policy: EpsilonGreedyPolicy::new(param.exploration_games),
            batch_size: param.batch_size,
            games_played: 0,
            record: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn model(&self) -> &M { &self.model }

    pub fn model_mut(&mut self) -> &mut M { &mut self.model }

    pub fn memory(&self) -> &ReplayMemory<JumpTransition> { &self.memory }

    pub fn trainer(&self) -> &Trainer { &self.trainer }

    pub fn games_played(&self) -> usize { self.games_played }

    pub fn record(&self) -> u32 { self.record }

    pub fn progress(&self) -> TrainingProgress {
        TrainingProgress {
            games_played: self.games_played,
            record: self.record,
        }
    }

    pub fn restore_progress(
        &mut self,
        progress: TrainingProgress,
    ) {
        self.games_played = progress.games_played;
        self.record = progress.record;
    }

    /// Moves the local experience out, leaving the local memory empty
    pub fn take_memory(&mut self) -> Vec<JumpTransition> { self.memory.drain() }

    pub fn adopt_memory(
        &mut self,
        transitions: Vec<JumpTransition>,
    ) {
        self.memory.extend(transitions)
    }

    pub fn clear_memory(&mut self) { self.memory.clear() }

    /// One replay step on a sample of the local memory
    pub fn train_long_memory(&mut self) -> Result<Option<f32>> {
        self.trainer.train_long_memory(&mut self.model, &self.memory, self.batch_size, &mut self.rng)
    }

    /// Single-instance episode: play, then on death train on the replay memory and persist a new record.
    pub fn run_episode<W: GameWindow>(
        &mut self,
        env: &mut GameEnvironment<W>,
        store: &ModelStore,
        stop: &StopSignal,
    ) -> Result<EpisodeSummary> {
        let summary = self.play_episode(env, stop)?;
        if summary.died() {
            if let Some(loss) = self.train_long_memory()? {
                log::debug!("{}: replay training on {} transitions, loss {:.4}", env.name(), format::count(self.memory.len()), loss);
            }
            if summary.new_record {
                if let Err(e) = store.save(&self.model, DEFAULT_CHECKPOINT) {
                    log::warn!("{}: could not save new record: {:#}", env.name(), e);
                }
            }
        }
        Ok(summary)
    }

    /// Plays one game attempt, training online after every step.
    ///
    /// The attempt ends with the death of the player, a stop request, or when the window is gone.
    /// Only a death counts as a played game. Transient collaborator failures skip single steps.
    pub fn play_episode<W: GameWindow>(
        &mut self,
        env: &mut GameEnvironment<W>,
        stop: &StopSignal,
    ) -> Result<EpisodeSummary> {
        env.start_game();
        log::trace!("{}: started episode {}", env.name(), self.games_played);

        let mut steps = 0;
        let mut skipped_steps = 0;
        let mut total_reward = 0.0;
        let mut score = 0;
        let mut actions = Vec::new();

        let end = loop {
            if stop.is_raised() {
                break EpisodeEnd::Stopped;
            }
            if !env.is_valid() {
                break EpisodeEnd::WindowGone;
            }

            let Some(state) = env.observe() else {
                skipped_steps += 1;
                log::trace!("{}: no valid frame yet, skipping step", env.name());
                thread::sleep(SKIPPED_STEP_BACKOFF);
                continue;
            };

            let action: JumpAction = self.policy.select_action(&self.model, state.as_ref(), self.games_played, &mut self.rng)?;
            let outcome = match env.step(action.numeric()) {
                StepResult::Played(outcome) => outcome,
                StepResult::Skipped => {
                    skipped_steps += 1;
                    thread::sleep(SKIPPED_STEP_BACKOFF);
                    continue;
                }
            };
            log::trace!("action {} resulted in reward {:.2}, done: {}", action, outcome.reward, outcome.done);

            steps += 1;
            total_reward += outcome.reward;
            score = outcome.score;
            actions.push(action);

            let next_state = outcome.next_state.unwrap_or_else(|| Arc::clone(&state));
            let transition = Transition {
                state,
                action,
                reward: outcome.reward,
                next_state,
                done: outcome.done,
            };
            self.trainer.train_short_memory(&mut self.model, &transition)?;
            self.memory.append(transition);

            if outcome.done {
                break EpisodeEnd::Died;
            }
        };

        let mut new_record = false;
        if end == EpisodeEnd::Died {
            self.games_played += 1;
            if score > self.record {
                self.record = score;
                new_record = true;
            }
        }

        let summary = EpisodeSummary {
            end,
            steps,
            skipped_steps,
            total_reward,
            score,
            new_record,
            action_distribution: action_distribution_line(actions),
            failures: env.take_stats(),
        };
        self.log_episode(&env.name(), &summary);
        Ok(summary)
    }

    fn log_episode(
        &self,
        name: &str,
        summary: &EpisodeSummary,
    ) {
        log::info!(
            "{}: game {} {:?} after {} steps, score: {}, record: {}{}, reward: {:.1}, actions: [{}]",
            name,
            format::count(self.games_played),
            summary.end,
            format::count(summary.steps),
            summary.score,
            self.record,
            if summary.new_record { " (new)" } else { "" },
            summary.total_reward,
            summary.action_distribution
        );
        if summary.failures.total() > 0 || summary.skipped_steps > 0 {
            log::warn!("{}: collaborator failures {:?}, skipped steps: {}", name, summary.failures, summary.skipped_steps);
        }
    }
}
