use std::cell::Cell;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::ml_model::model::ValueModel;

/// Minimal state for model-agnostic tests
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestState(pub u32);

/// Value model predicting the same `value` for every state.
///
/// Records every training call, so tests can inspect batch sizes and Bellman targets.
/// A checkpoint is the value as text.
#[derive(Debug, Clone)]
pub struct ConstantValueModel<S = TestState> {
    value: f32,
    train_calls: Vec<Vec<f32>>,
    predictions: Cell<usize>,
    _state: std::marker::PhantomData<fn(&S)>,
}

impl<S> ConstantValueModel<S> {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            train_calls: vec![],
            predictions: Cell::new(0),
            _state: std::marker::PhantomData,
        }
    }

    pub fn value(&self) -> f32 { self.value }

    /// Targets of the latest training call
    pub fn last_targets(&self) -> Option<Vec<f32>> { self.train_calls.last().cloned() }

    /// Batch size of every training call so far
    pub fn train_batch_sizes(&self) -> Vec<usize> { self.train_calls.iter().map(Vec::len).collect() }

    /// Number of single-state predictions (not counting batch predictions)
    pub fn predictions(&self) -> usize { self.predictions.get() }
}

impl<S> ValueModel for ConstantValueModel<S> {
    type S = S;

    fn predict_value(
        &self,
        _state: &S,
    ) -> Result<f32> {
        self.predictions.set(self.predictions.get() + 1);
        Ok(self.value)
    }

    fn batch_predict_value(
        &self,
        states: &[&S],
    ) -> Result<Vec<f32>> {
        Ok(vec![self.value; states.len()])
    }

    fn train(
        &mut self,
        state_batch: &[&S],
        target_values: &[f32],
    ) -> Result<f32> {
        assert_eq!(state_batch.len(), target_values.len());
        let loss = target_values.iter().map(|t| (t - self.value).powi(2)).sum::<f32>() / target_values.len() as f32;
        self.train_calls.push(target_values.to_vec());
        Ok(loss)
    }

    fn write_checkpoint(
        &self,
        file: &Path,
    ) -> Result<()> {
        fs::write(file, self.value.to_string()).with_context(|| format!("writing {}", file.display()))
    }

    fn read_checkpoint(
        &mut self,
        file: &Path,
    ) -> Result<()> {
        let content = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        self.value = content.trim().parse()?;
        Ok(())
    }
}
