use std::path::PathBuf;
use std::time::Duration;

use lazy_static::lazy_static;

use crate::environment::reward::RewardParameter;
use crate::preprocess::FRAME_SIZE;

lazy_static! {
    pub static ref DEFAULT_MODEL_DIR: PathBuf = PathBuf::from("model");
}

#[derive(Debug, Clone)]
pub struct Parameter {
    /// Maximum number of transitions a replay memory (local and shared) holds
    pub memory_capacity: usize,
    /// Transitions per replay (long memory) training step
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Discount rate; (0 <= 𝛾 <= 1) represents the value of future rewards. The bigger, the more farsighted the agent becomes
    pub gamma: f32,
    /// Number of episodes, over which the exploration rate decays linearly from 1 to 0
    pub exploration_games: usize,
    /// Edge length of the (square) network input
    pub frame_size: usize,
    pub reward: RewardParameter,
    /// Directory holding the checkpoints
    pub model_dir: PathBuf,
    /// Worker `i` of `n` starts after `i * start_stagger / n`
    pub start_stagger: Duration,
    /// Persist and restore episode counter and record next to the checkpoints
    pub resume_progress: bool,
    /// Raise the stop signal after that many episodes (over all workers)
    pub max_episodes: Option<usize>,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            memory_capacity: 10_000,
            batch_size: 256,
            learning_rate: 5e-4,
            gamma: 0.9,
            exploration_games: 200,
            frame_size: FRAME_SIZE,
            reward: RewardParameter::default(),
            model_dir: DEFAULT_MODEL_DIR.clone(),
            start_stagger: Duration::from_millis(500),
            resume_progress: false,
            max_episodes: None,
        }
    }
}
