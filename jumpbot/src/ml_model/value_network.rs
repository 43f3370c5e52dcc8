use std::path::Path;

use anyhow::{ensure, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{conv2d, linear, AdamW, Conv2d, Conv2dConfig, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use ql::prelude::ValueModel;

use crate::preprocess::Observation;

/// Small convolutional value network
///
/// ```text
///   [B, 1, S, S]
///   conv 3x3 1->16, relu, conv 3x3 16->64, relu, maxpool 2   -> [B, 64, S/2, S/2]
///   conv 3x3 64->16, relu, conv 3x3 16->8, relu, maxpool 2   -> [B, 8, S/4, S/4]
///   flatten, linear -> [B, 1]
/// ```
/// For S = 84 the head sees 8 * 21 * 21 = 3528 features.
#[derive(Debug, Clone)]
pub struct ConvValueNetwork {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    conv4: Conv2d,
    head: Linear,
}

impl ConvValueNetwork {
    pub fn init(
        vb: VarBuilder,
        frame_size: usize,
    ) -> Result<Self> {
        let same = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        Ok(Self {
            conv1: conv2d(1, 16, 3, same, vb.pp("conv_block_1.0"))?,
            conv2: conv2d(16, 64, 3, same, vb.pp("conv_block_1.1"))?,
            conv3: conv2d(64, 16, 3, same, vb.pp("conv_block_2.0"))?,
            conv4: conv2d(16, 8, 3, same, vb.pp("conv_block_2.1"))?,
            head: linear(Self::flatten_dim(frame_size), 1, vb.pp("classifier"))?,
        })
    }

    pub fn flatten_dim(frame_size: usize) -> usize {
        let pooled = frame_size / 2 / 2;
        8 * pooled * pooled
    }
}

impl Module for ConvValueNetwork {
    fn forward(
        &self,
        xs: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let xs = xs.apply(&self.conv1)?.relu()?;
        let xs = xs.apply(&self.conv2)?.relu()?.max_pool2d(2)?;
        let xs = xs.apply(&self.conv3)?.relu()?;
        let xs = xs.apply(&self.conv4)?.relu()?.max_pool2d(2)?;
        xs.flatten_from(1)?.apply(&self.head)
    }
}

/// [ValueModel] backed by a [ConvValueNetwork] on the CPU, trained with Adam (AdamW without weight decay).
/// Checkpoints are safetensors files.
pub struct CandleValueModel {
    frame_size: usize,
    device: Device,
    varmap: VarMap,
    network: ConvValueNetwork,
    optimizer: AdamW,
}

impl CandleValueModel {
    /// Freshly (randomly) initialized model for `frame_size` x `frame_size` observations
    pub fn init(
        frame_size: usize,
        learning_rate: f64,
    ) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = ConvValueNetwork::init(vb, frame_size)?;
        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        log::debug!(
            "initialized value network for {0}x{0} frames, {1} parameter tensors",
            frame_size,
            varmap.all_vars().len()
        );

        Ok(Self {
            frame_size,
            device,
            varmap,
            network,
            optimizer,
        })
    }

    pub fn frame_size(&self) -> usize { self.frame_size }

    /// `[B, 1, frame_size, frame_size]`
    fn batch_to_tensor(
        &self,
        states: &[&Observation],
    ) -> Result<Tensor> {
        ensure!(!states.is_empty(), "empty state batch");
        let expected = [1, self.frame_size, self.frame_size];
        for s in states {
            ensure!(s.dims() == expected, "state dimension mismatch. Expected {:?}, got {:?}", expected, s.dims());
        }
        let data = states.iter().flat_map(|s| s.pixels().iter().copied()).collect::<Vec<f32>>();
        Ok(Tensor::from_vec(data, (states.len(), 1, self.frame_size, self.frame_size), &self.device)?)
    }

    /// Inference-mode forward pass, `[B, 1]`; the result is cut off the gradient graph.
    fn infer(
        &self,
        states: &[&Observation],
    ) -> Result<Tensor> {
        let input = self.batch_to_tensor(states)?;
        Ok(self.network.forward(&input)?.detach())
    }
}

impl ValueModel for CandleValueModel {
    type S = Observation;

    fn predict_value(
        &self,
        state: &Observation,
    ) -> Result<f32> {
        Ok(self.batch_predict_value(&[state])?[0])
    }

    fn batch_predict_value(
        &self,
        states: &[&Observation],
    ) -> Result<Vec<f32>> {
        let values = self.infer(states)?;
        Ok(values.squeeze(1)?.to_vec1::<f32>()?)
    }

    fn train(
        &mut self,
        state_batch: &[&Observation],
        target_values: &[f32],
    ) -> Result<f32> {
        ensure!(
            state_batch.len() == target_values.len(),
            "{} states but {} target values",
            state_batch.len(),
            target_values.len()
        );
        let input = self.batch_to_tensor(state_batch)?;
        let prediction = self.network.forward(&input)?;
        let target = Tensor::from_slice(target_values, (target_values.len(), 1), &self.device)?;

        let loss = candle_nn::loss::mse(&prediction, &target)?;
        // gradients are computed from scratch for every step
        self.optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn write_checkpoint(
        &self,
        file: &Path,
    ) -> Result<()> {
        self.varmap.save(file)?;
        Ok(())
    }

    fn read_checkpoint(
        &mut self,
        file: &Path,
    ) -> Result<()> {
        // overwrites the values of the existing variables, so the optimizer keeps tracking the same ones
        self.varmap.load(file)?;
        Ok(())
    }
}
