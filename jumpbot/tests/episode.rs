use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{environment, test_parameter, Scripted, ScriptedWindow};
use jumpbot::checkpoint::{ModelStore, DEFAULT_CHECKPOINT};
use jumpbot::learn::agent::{Agent, EpisodeEnd};
use jumpbot::learn::coordinator::StopSignal;
use jumpbot::preprocess::Observation;
use ql::test::constant_model::ConstantValueModel;

mod common;

fn idle_agent(param: &jumpbot::config::Parameter) -> Agent<ConstantValueModel<Observation>> {
    // a constant value of 0 rounds to Idle
    Agent::new(ConstantValueModel::new(0.0), param, 1)
}

#[test]
fn test_death_ends_episode_with_one_terminal_transition() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let store = ModelStore::new(dir.path());
    let mut agent = idle_agent(&param);
    let mut env = environment(ScriptedWindow::alive_then_menu(5), &param);

    let summary = agent.run_episode(&mut env, &store, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    let transitions = agent.memory().iter().collect::<Vec<_>>();
    assert_eq!(transitions.len(), summary.steps);
    let terminal = transitions.iter().filter(|t| t.done).collect::<Vec<_>>();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].reward, -10.0);
    assert!(transitions.last().unwrap().done);

    assert_eq!(agent.games_played(), 1);
    assert_eq!(agent.trainer().long_steps(), 1);
    assert_eq!(agent.trainer().short_steps(), summary.steps);
    assert_eq!(agent.model().train_batch_sizes().last(), Some(&summary.steps));

    assert_eq!(env.window().releases, summary.steps);
    assert_eq!(env.window().presses, 0);
    assert_eq!(env.window().starts, 1);
    // no second survived, no record
    assert!(!summary.new_record);
    assert!(!store.exists(DEFAULT_CHECKPOINT));
    Ok(())
}

#[test]
fn test_steps_without_any_valid_frame_are_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let mut agent = idle_agent(&param);
    let script = [Scripted::Malformed, Scripted::CaptureFailure, Scripted::Alive, Scripted::Alive, Scripted::Menu];
    let mut env = environment(ScriptedWindow::new(script), &param);

    let summary = agent.play_episode(&mut env, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    assert_eq!(summary.skipped_steps, 2);
    assert_eq!(summary.steps, 2);
    assert_eq!(summary.failures.malformed_frames, 1);
    assert_eq!(summary.failures.capture_failures, 1);
    assert_eq!(agent.memory().len(), 2);
    Ok(())
}

#[test]
fn test_malformed_frame_reuses_last_valid_observation() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let mut agent = idle_agent(&param);
    let script = [Scripted::Alive, Scripted::Malformed, Scripted::Alive, Scripted::Menu];
    let mut env = environment(ScriptedWindow::new(script), &param);

    let summary = agent.play_episode(&mut env, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    assert_eq!(summary.steps, 3);
    assert_eq!(summary.failures.malformed_frames, 1);
    let first = agent.memory().iter().next().unwrap();
    assert!(Arc::ptr_eq(&first.state, &first.next_state));
    assert!(agent.memory().iter().all(|t| t.state.dims() == [1, 16, 16]));
    Ok(())
}

#[test]
fn test_failed_focus_skips_only_that_step() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let mut agent = idle_agent(&param);
    // call 1 starts the game, call 2 belongs to the first step
    let window = ScriptedWindow::alive_then_menu(5).with_failing_focus_calls([2]);
    let mut env = environment(window, &param);

    let summary = agent.play_episode(&mut env, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    assert_eq!(summary.failures.focus_failures, 1);
    assert_eq!(summary.skipped_steps, 1);
    assert_eq!(summary.steps, 3);
    assert_eq!(agent.games_played(), 1);
    assert_eq!(agent.memory().len(), 3);
    assert_eq!(agent.memory().iter().filter(|t| t.done).count(), 1);
    assert_eq!(agent.trainer().short_steps(), 3);
    // the skipped step injected nothing
    assert_eq!(env.window().releases, 3);
    assert_eq!(env.window().starts, 1);
    Ok(())
}

#[test]
fn test_failed_focus_keeps_the_episode_clock() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let mut agent = idle_agent(&param);
    let window = ScriptedWindow::alive_then_menu(5)
        .with_failing_focus_calls([2, 3])
        .with_capture_delay(Duration::from_millis(300));
    let mut env = environment(window, &param);

    let summary = agent.play_episode(&mut env, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    assert_eq!(summary.skipped_steps, 2);
    // seven captures of 300ms each happen before death is detected
    assert!(summary.score >= 2, "score {}", summary.score);
    Ok(())
}

#[test]
fn test_raised_stop_signal_ends_episode_immediately() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let mut agent = idle_agent(&param);
    let mut env = environment(ScriptedWindow::alive_then_menu(5), &param);
    let stop = StopSignal::new();
    stop.raise();

    let summary = agent.play_episode(&mut env, &stop)?;

    assert_eq!(summary.end, EpisodeEnd::Stopped);
    assert_eq!(summary.steps, 0);
    assert_eq!(agent.games_played(), 0);
    Ok(())
}

#[test]
fn test_new_record_is_saved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let param = test_parameter(dir.path());
    let store = ModelStore::new(dir.path());
    let mut agent = idle_agent(&param);
    let window = ScriptedWindow::alive_then_menu(5).with_capture_delay(Duration::from_millis(250));
    let mut env = environment(window, &param);

    let summary = agent.run_episode(&mut env, &store, &StopSignal::new())?;

    assert_eq!(summary.end, EpisodeEnd::Died);
    assert!(summary.score >= 1);
    assert!(summary.new_record);
    assert_eq!(agent.record(), summary.score);
    assert!(store.exists(DEFAULT_CHECKPOINT));
    Ok(())
}
