use std::path::Path;

use anyhow::Result;

/// 'Physical' AI model abstraction: a value function approximation `V(state)` with a single output head.
///
/// An implementation is owned by exactly one learner; inference (`&self`) and training (`&mut self`) never
/// overlap.
pub trait ValueModel {
    /// State representation the model consumes
    type S;

    /// Predicts the value of a single state in inference mode (no gradient tracking, no parameter change).
    fn predict_value(
        &self,
        state: &Self::S,
    ) -> Result<f32>;

    /// Predicts values for a batch of states in inference mode.
    /// Returns one value per state, in the same order.
    fn batch_predict_value(
        &self,
        states: &[&Self::S],
    ) -> Result<Vec<f32>>;

    /// Performs a single optimizer step on the given batch, regressing the model output towards `target_values`.
    ///
    /// # Arguments
    /// * `state_batch` states; shape [BATCH, ...state dims]
    /// * `target_values` one target per state
    ///
    /// # Returns
    ///   calculated loss (before the step)
    fn train(
        &mut self,
        state_batch: &[&Self::S],
        target_values: &[f32],
    ) -> Result<f32>;

    fn write_checkpoint(
        &self,
        file: &Path,
    ) -> Result<()>;

    fn read_checkpoint(
        &mut self,
        file: &Path,
    ) -> Result<()>;
}
