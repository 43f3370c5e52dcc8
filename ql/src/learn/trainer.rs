use anyhow::Result;
use rand::Rng;

use crate::learn::replay_memory::{ReplayMemory, Transition};
use crate::ml_model::model::ValueModel;
use crate::prelude::QlError;

/// Bellman update driver.
///
/// Every call performs exactly one optimizer step on the model, either for a single transition right after it
/// happened ("short memory") or for a batch sampled from a replay memory ("long memory").
#[derive(Debug)]
pub struct Trainer {
    /// Discount rate; (0 <= 𝛾 <= 1) represents the value of future rewards. The bigger, the more farsighted the agent becomes
    gamma: f32,
    short_steps: usize,
    long_steps: usize,
}

impl Trainer {
    pub fn new(gamma: f32) -> Self {
        assert!((0.0..=1.0).contains(&gamma), "gamma must be in 0..=1");
        Self {
            gamma,
            short_steps: 0,
            long_steps: 0,
        }
    }

    pub fn gamma(&self) -> f32 { self.gamma }

    /// number of single-transition steps performed so far
    pub fn short_steps(&self) -> usize { self.short_steps }

    /// number of batched replay steps performed so far
    pub fn long_steps(&self) -> usize { self.long_steps }

    /// Performs one optimizer step on the given batch.
    /// Returns the loss.
    pub fn train_step<M, A>(
        &self,
        model: &mut M,
        batch: &[&Transition<M::S, A>],
    ) -> Result<f32>
    where
        M: ValueModel,
    {
        if batch.is_empty() {
            return Err(QlError::from("train_step called with an empty batch").into());
        }

        let states = batch.iter().map(|t| t.state.as_ref()).collect::<Vec<_>>();
        let next_states = batch.iter().map(|t| t.next_state.as_ref()).collect::<Vec<_>>();
        let rewards = batch.iter().map(|t| t.reward).collect::<Vec<_>>();
        let dones = batch.iter().map(|t| t.done).collect::<Vec<_>>();

        // The model has a single output head, so "max over the actions' values of next_state" is just the value of
        // next_state: targets regress onto one joint action-value, not per-action Q.
        let next_values = model.batch_predict_value(&next_states)?;
        let targets = bellman_targets(self.gamma, &rewards, &next_values, &dones);

        model.train(&states, &targets)
    }

    /// Online step on the transition which just happened
    pub fn train_short_memory<M, A>(
        &mut self,
        model: &mut M,
        transition: &Transition<M::S, A>,
    ) -> Result<f32>
    where
        M: ValueModel,
    {
        let loss = self.train_step(model, &[transition])?;
        self.short_steps += 1;
        log::trace!("short memory step, loss: {:.4}", loss);
        Ok(loss)
    }

    /// Replay step on a uniform sample of `batch_size` transitions - or on the whole memory, if it is not larger.
    /// Returns `None` (and does not touch the model) for an empty memory.
    pub fn train_long_memory<M, A, R>(
        &mut self,
        model: &mut M,
        memory: &ReplayMemory<Transition<M::S, A>>,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Option<f32>>
    where
        M: ValueModel,
        R: Rng + ?Sized,
    {
        if memory.is_empty() {
            return Ok(None);
        }
        let batch = memory.sample(batch_size, rng);
        let loss = self.train_step(model, &batch)?;
        self.long_steps += 1;
        log::debug!("long memory step on {} transitions, loss: {:.4}", batch.len(), loss);
        Ok(Some(loss))
    }
}

/// `target = reward + 𝛾 * next_value * (1 - done)`
///
/// For terminal steps the target is exactly the reward.
pub fn bellman_targets(
    gamma: f32,
    rewards: &[f32],
    next_values: &[f32],
    dones: &[bool],
) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), next_values.len());
    debug_assert_eq!(rewards.len(), dones.len());
    rewards
        .iter()
        .zip(next_values)
        .zip(dones)
        .map(|((&reward, &next_value), &done)| if done { reward } else { reward + gamma * next_value })
        .collect()
}
