use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use ql::prelude::{Action, ModelActionType};

use crate::environment::action::JumpAction;
use crate::environment::collaborators::{CollaboratorError, CollaboratorStats, Control, GameWindow};
use crate::environment::reward::{step_reward, EpisodeClock, RewardParameter};
use crate::preprocess::{Observation, Preprocessor};

/// Process-wide lock serializing "focus + inject + read resulting frame" over all windows
pub type InputLock = Arc<Mutex<()>>;

pub fn new_input_lock() -> InputLock { Arc::new(Mutex::new(())) }

#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Canonical action; `None` when the raw decision did not map to one
    pub action: Option<JumpAction>,
    pub reward: f32,
    pub done: bool,
    /// Whole seconds survived in this episode
    pub score: u32,
    /// Observation after the action; `None` if no valid frame was seen during the whole episode
    pub next_state: Option<Arc<Observation>>,
}

#[derive(Debug, Clone)]
pub enum StepResult {
    Played(StepOutcome),
    /// The window could not be focused (or is gone). The input went nowhere, so there is nothing to learn from this
    /// step; the episode itself goes on.
    Skipped,
}

/// One game window seen through the eyes of the agent.
///
/// Turns collaborator calls into observations, rewards and terminal flags. Collaborator failures never leave this
/// type: they are logged, counted and degraded to no-ops.
pub struct GameEnvironment<W: GameWindow> {
    window: W,
    preprocessor: Preprocessor,
    input_lock: InputLock,
    reward_param: RewardParameter,
    clock: EpisodeClock,
    last_observation: Option<Arc<Observation>>,
    stats: CollaboratorStats,
}

impl<W: GameWindow> GameEnvironment<W> {
    pub fn new(
        window: W,
        preprocessor: Preprocessor,
        input_lock: InputLock,
        reward_param: RewardParameter,
    ) -> Self {
        Self {
            window,
            preprocessor,
            input_lock,
            reward_param,
            clock: EpisodeClock::started_at(Instant::now()),
            last_observation: None,
            stats: CollaboratorStats::default(),
        }
    }

    pub fn window(&self) -> &W { &self.window }

    pub fn window_mut(&mut self) -> &mut W { &mut self.window }

    pub fn name(&self) -> String { self.window.name() }

    pub fn is_valid(&self) -> bool { self.window.is_valid() }

    pub fn stats(&self) -> CollaboratorStats { self.stats }

    /// Returns the failure counters collected since the last call and starts counting from zero
    pub fn take_stats(&mut self) -> CollaboratorStats { std::mem::take(&mut self.stats) }

    /// Starts a new game attempt.
    ///
    /// Triggers the start button when the menu is showing; otherwise the game is assumed to run already.
    /// Inputs and episode timers are reset either way.
    pub fn start_game(&mut self) {
        let lock = Arc::clone(&self.input_lock);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        match self.window.is_in_menu() {
            Ok(true) => {
                if let Err(e) = self.window.focus() {
                    self.report(e);
                }
                if let Err(e) = self.window.click_start() {
                    self.report(e);
                }
            }
            Ok(false) => log::debug!("{}: not in menu, assuming a running game", self.window.name()),
            Err(e) => self.report(e),
        }
        if let Err(e) = self.window.reset_inputs() {
            self.report(e);
        }

        self.clock.reset(Instant::now());
        self.last_observation = None;
    }

    /// Current preprocessed frame.
    ///
    /// A failed capture or a malformed frame falls back to the last valid observation of this episode;
    /// `None` when there is none yet.
    pub fn observe(&mut self) -> Option<Arc<Observation>> {
        match self.window.capture() {
            Ok(frame) if Preprocessor::accepts(&frame) => {
                let observation = Arc::new(self.preprocessor.process(&frame));
                self.last_observation = Some(Arc::clone(&observation));
                Some(observation)
            }
            Ok(frame) => {
                self.stats.malformed_frames += 1;
                log::warn!("{}: dropped malformed frame {}x{}", self.window.name(), frame.width(), frame.height());
                self.last_observation.clone()
            }
            Err(e) => {
                self.report(e);
                self.last_observation.clone()
            }
        }
    }

    /// Applies a raw decision to the game and reports what came out of it.
    ///
    /// Everything from focusing the window to reading the resulting frame happens under the input lock.
    pub fn step(
        &mut self,
        raw_action: ModelActionType,
    ) -> StepResult {
        let lock = Arc::clone(&self.input_lock);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.window.is_valid() {
            self.report(CollaboratorError::WindowGone);
            return StepResult::Skipped;
        }
        if let Err(e) = self.window.reset_inputs() {
            self.report(e);
        }
        if let Err(e) = self.window.focus() {
            self.report(e);
            return StepResult::Skipped;
        }

        let done = match self.window.is_in_menu() {
            Ok(in_menu) => in_menu,
            Err(e) => {
                self.report(e);
                false
            }
        };

        let action = JumpAction::try_from_numeric(raw_action).ok();
        let applied = match action {
            Some(JumpAction::Jump) => self.window.press(Control::Jump),
            Some(JumpAction::Idle) => self.window.release(Control::Jump),
            None => {
                log::debug!("{}: unknown action value {}, no input", self.window.name(), raw_action);
                Ok(())
            }
        };
        if let Err(e) = applied {
            self.report(e);
        }

        let now = Instant::now();
        let reward = step_reward(&self.reward_param, action, done, &mut self.clock, now);
        let score = self.clock.score(now);
        let next_state = self.observe();

        StepResult::Played(StepOutcome {
            action,
            reward,
            done,
            score,
            next_state,
        })
    }

    fn report(
        &mut self,
        error: CollaboratorError,
    ) {
        log::warn!("{}: {}", self.window.name(), error);
        self.stats.record(&error);
    }
}
