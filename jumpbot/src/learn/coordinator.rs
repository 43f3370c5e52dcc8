use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use ql::learn::shared_pool::SharedExperiencePool;
use ql::prelude::ValueModel;
use ql::util::format;

use crate::checkpoint::{record_name, ModelStore, DEFAULT_CHECKPOINT};
use crate::config::Parameter;
use crate::environment::collaborators::GameWindow;
use crate::environment::game::{new_input_lock, GameEnvironment, InputLock};
use crate::learn::agent::{Agent, EpisodeSummary, JumpTransition};
use crate::preprocess::{Observation, Preprocessor};

/// Process-wide stop flag, polled by every worker between steps
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self { Self::default() }

    pub fn raise(&self) { self.0.store(true, Ordering::SeqCst) }

    pub fn is_raised(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    /// All episodes, including the stopped one
    pub episodes: usize,
    pub games_played: usize,
    pub record: u32,
    /// Replay steps on the drained shared pool
    pub joint_trainings: usize,
}

/// Runs one learning agent per game window.
///
/// Workers share nothing but the input lock, the experience pool, the checkpoint directory and the stop signal.
pub struct Coordinator {
    param: Parameter,
    store: ModelStore,
    pool: SharedExperiencePool<JumpTransition>,
    input_lock: InputLock,
    stop: StopSignal,
    finished_games: AtomicUsize,
}

impl Coordinator {
    pub fn new(
        param: Parameter,
        stop: StopSignal,
    ) -> Self {
        Self {
            store: ModelStore::new(param.model_dir.clone()),
            pool: SharedExperiencePool::new(param.memory_capacity),
            input_lock: new_input_lock(),
            stop,
            finished_games: AtomicUsize::new(0),
            param,
        }
    }

    pub fn store(&self) -> &ModelStore { &self.store }

    pub fn pool(&self) -> &SharedExperiencePool<JumpTransition> { &self.pool }

    /// Games finished by all agents of this coordinator
    pub fn finished_games(&self) -> usize { self.finished_games.load(Ordering::SeqCst) }

    /// Runs one worker thread per window until the stop signal is raised and joins them all.
    ///
    /// A failing worker is logged and does not affect the others. `model_factory` is called once inside every worker
    /// thread.
    pub fn run<W, M, F>(
        &self,
        windows: Vec<W>,
        model_factory: F,
        seed: u64,
    ) -> Result<Vec<WorkerReport>>
    where
        W: GameWindow + Send,
        M: ValueModel<S = Observation>,
        F: Fn() -> Result<M> + Sync,
    {
        if windows.is_empty() {
            bail!("no game windows to play in");
        }
        let window_count = windows.len();
        log::info!("starting {} workers", window_count);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(window_count);
            for (index, window) in windows.into_iter().enumerate() {
                let model_factory = &model_factory;
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", index))
                    .spawn_scoped(scope, move || {
                        self.stagger(index, window_count);
                        let model = model_factory()?;
                        self.run_worker(index, window, model, seed.wrapping_add(index as u64))
                    })
                    .with_context(|| format!("spawning worker-{}", index));
                match spawned {
                    Ok(handle) => handles.push((index, handle)),
                    Err(e) => {
                        // let the already running workers come to an end before the scope joins them
                        self.stop.raise();
                        return Err(e);
                    }
                }
            }

            let mut reports = Vec::with_capacity(window_count);
            for (index, handle) in handles {
                match handle.join() {
                    Ok(Ok(report)) => {
                        log::info!(
                            "worker-{} ({}) finished: {} games, record {}, {} joint trainings",
                            index,
                            report.name,
                            format::count(report.games_played),
                            report.record,
                            report.joint_trainings
                        );
                        reports.push(report)
                    }
                    Ok(Err(e)) => log::error!("worker-{} failed: {:#}", index, e),
                    Err(_) => log::error!("worker-{} panicked", index),
                }
            }
            Ok(reports)
        })
    }

    /// Plays in a single window on the current thread, without experience sharing.
    ///
    /// Replay training happens on the agent's own memory after every game; a new record is saved as the default
    /// checkpoint.
    pub fn run_single<W, M>(
        &self,
        window: W,
        mut model: M,
        seed: u64,
    ) -> Result<WorkerReport>
    where
        W: GameWindow,
        M: ValueModel<S = Observation>,
    {
        self.load_checkpoint(&mut model);
        let mut agent = Agent::new(model, &self.param, seed);
        self.restore_progress(&mut agent);
        let mut env = self.environment(window);
        let mut report = WorkerReport {
            name: env.name(),
            ..Default::default()
        };

        while !self.stop.is_raised() && env.is_valid() {
            let summary = agent.run_episode(&mut env, &self.store, &self.stop)?;
            report.episodes += 1;
            self.after_game(&agent, &summary, true);
        }

        report.games_played = agent.games_played();
        report.record = agent.record();
        Ok(report)
    }

    fn run_worker<W, M>(
        &self,
        index: usize,
        window: W,
        mut model: M,
        seed: u64,
    ) -> Result<WorkerReport>
    where
        W: GameWindow,
        M: ValueModel<S = Observation>,
    {
        self.load_checkpoint(&mut model);
        let mut agent = Agent::new(model, &self.param, seed);
        self.restore_progress(&mut agent);
        let mut env = self.environment(window);
        let mut report = WorkerReport {
            name: env.name(),
            ..Default::default()
        };

        while !self.stop.is_raised() {
            if !env.is_valid() {
                log::warn!("{}: window is gone, worker-{} ends", env.name(), index);
                break;
            }
            let summary = agent.play_episode(&mut env, &self.stop)?;
            report.episodes += 1;

            self.pool.extend(agent.take_memory());
            if summary.died() {
                if self.joint_training(&mut agent, &env.name())? {
                    report.joint_trainings += 1;
                }
                if summary.new_record {
                    self.save(&agent, &record_name(summary.score));
                }
            }
            self.after_game(&agent, &summary, index == 0);
        }

        report.games_played = agent.games_played();
        report.record = agent.record();
        Ok(report)
    }

    /// Adopts the whole shared pool, when it has grown beyond one batch, for one replay step.
    /// Returns whether it did.
    fn joint_training<M: ValueModel<S = Observation>>(
        &self,
        agent: &mut Agent<M>,
        name: &str,
    ) -> Result<bool> {
        let Some(batch) = self.pool.drain_if_larger(self.param.batch_size) else {
            return Ok(false);
        };
        let pooled = batch.len();
        agent.adopt_memory(batch);
        let loss = agent.train_long_memory()?;
        agent.clear_memory();
        log::info!(
            "{}: trained on the shared pool of {} transitions, loss: {:.4}",
            name,
            format::count(pooled),
            loss.unwrap_or_default()
        );
        self.save(agent, DEFAULT_CHECKPOINT);
        Ok(true)
    }

    /// Bookkeeping after every episode: progress file and episode limit
    fn after_game<M: ValueModel<S = Observation>>(
        &self,
        agent: &Agent<M>,
        summary: &EpisodeSummary,
        persists_progress: bool,
    ) {
        if !summary.died() {
            return;
        }
        if self.param.resume_progress && persists_progress {
            if let Err(e) = self.store.save_progress(&agent.progress()) {
                log::warn!("could not save progress: {:#}", e);
            }
        }
        let finished = self.finished_games.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max_episodes) = self.param.max_episodes {
            if finished >= max_episodes && !self.stop.is_raised() {
                log::info!("reached {} games, stopping", format::count(finished));
                self.stop.raise();
            }
        }
    }

    fn save<M: ValueModel<S = Observation>>(
        &self,
        agent: &Agent<M>,
        name: &str,
    ) {
        match self.store.save(agent.model(), name) {
            Ok(()) => log::info!("saved checkpoint '{}'", name),
            Err(e) => log::warn!("could not save checkpoint '{}': {:#}", name, e),
        }
    }

    fn load_checkpoint<M: ValueModel<S = Observation>>(
        &self,
        model: &mut M,
    ) {
        match self.store.load(model, DEFAULT_CHECKPOINT) {
            Ok(true) => {}
            Ok(false) => log::info!("no checkpoint in {}, starting from scratch", self.store.dir().display()),
            Err(e) => log::warn!("ignoring unreadable checkpoint: {:#}", e),
        }
    }

    fn restore_progress<M: ValueModel<S = Observation>>(
        &self,
        agent: &mut Agent<M>,
    ) {
        if !self.param.resume_progress {
            return;
        }
        match self.store.load_progress() {
            Ok(Some(progress)) => {
                log::info!("resuming after {} games, record {}", format::count(progress.games_played), progress.record);
                agent.restore_progress(progress);
            }
            Ok(None) => {}
            Err(e) => log::warn!("ignoring unreadable progress file: {:#}", e),
        }
    }

    fn environment<W: GameWindow>(
        &self,
        window: W,
    ) -> GameEnvironment<W> {
        GameEnvironment::new(
            window,
            Preprocessor::new(self.param.frame_size, self.param.frame_size),
            Arc::clone(&self.input_lock),
            self.param.reward.clone(),
        )
    }

    fn stagger(
        &self,
        index: usize,
        window_count: usize,
    ) {
        let delay = self.param.start_stagger.mul_f64(index as f64 / window_count as f64);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
