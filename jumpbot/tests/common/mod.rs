#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use jumpbot::config::Parameter;
use jumpbot::environment::collaborators::{
    CollaboratorError, Control, FrameSource, GameWindow, InputSink, RawFrame, WindowProbe,
};
use jumpbot::environment::game::{new_input_lock, GameEnvironment, InputLock};
use jumpbot::preprocess::Preprocessor;

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Alive,
    Menu,
    /// zero sized frame
    Malformed,
    CaptureFailure,
}

/// Game window replaying a fixed sequence of screens.
///
/// It shows the menu until `click_start`; from then on every capture advances the script by one entry.
/// When the script is exhausted the last screen stays.
pub struct ScriptedWindow {
    script: VecDeque<Scripted>,
    started: bool,
    in_menu: bool,
    /// 1-based numbers of the `focus` calls which fail
    failing_focus_calls: BTreeSet<usize>,
    capture_delay: Duration,
    pub focus_calls: usize,
    pub presses: usize,
    pub releases: usize,
    pub captures: usize,
    pub starts: usize,
}

impl ScriptedWindow {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
            started: false,
            in_menu: true,
            failing_focus_calls: BTreeSet::new(),
            capture_delay: Duration::ZERO,
            focus_calls: 0,
            presses: 0,
            releases: 0,
            captures: 0,
            starts: 0,
        }
    }

    /// `alive` running screens, then the menu
    pub fn alive_then_menu(alive: usize) -> Self {
        Self::new(std::iter::repeat(Scripted::Alive).take(alive).chain([Scripted::Menu]))
    }

    /// The `focus` calls with these (1-based) numbers fail
    pub fn with_failing_focus_calls(
        mut self,
        calls: impl IntoIterator<Item = usize>,
    ) -> Self {
        self.failing_focus_calls.extend(calls);
        self
    }

    pub fn with_capture_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.capture_delay = delay;
        self
    }

    fn screen(&self) -> RawFrame {
        let color = if self.in_menu { Rgba([20, 20, 40, 255]) } else { Rgba([30, 200, 30, 255]) };
        RgbaImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, color)
    }
}

impl FrameSource for ScriptedWindow {
    fn capture(&mut self) -> Result<RawFrame, CollaboratorError> {
        self.captures += 1;
        if !self.capture_delay.is_zero() {
            thread::sleep(self.capture_delay);
        }
        if !self.started {
            return Ok(self.screen());
        }
        match self.script.pop_front() {
            Some(Scripted::Alive) => self.in_menu = false,
            Some(Scripted::Menu) => self.in_menu = true,
            Some(Scripted::Malformed) => return Ok(RgbaImage::new(0, 0)),
            Some(Scripted::CaptureFailure) => return Err(CollaboratorError::Capture("scripted failure".to_string())),
            None => {}
        }
        Ok(self.screen())
    }
}

impl InputSink for ScriptedWindow {
    fn press(
        &mut self,
        _control: Control,
    ) -> Result<(), CollaboratorError> {
        self.presses += 1;
        Ok(())
    }

    fn release(
        &mut self,
        _control: Control,
    ) -> Result<(), CollaboratorError> {
        self.releases += 1;
        Ok(())
    }

    fn reset_inputs(&mut self) -> Result<(), CollaboratorError> { Ok(()) }
}

impl WindowProbe for ScriptedWindow {
    fn is_in_menu(&mut self) -> Result<bool, CollaboratorError> { Ok(self.in_menu) }

    fn focus(&mut self) -> Result<(), CollaboratorError> {
        self.focus_calls += 1;
        if self.failing_focus_calls.contains(&self.focus_calls) {
            Err(CollaboratorError::Focus("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn click_start(&mut self) -> Result<(), CollaboratorError> {
        self.started = true;
        self.starts += 1;
        Ok(())
    }

    fn is_valid(&self) -> bool { true }

    fn name(&self) -> String { "scripted".to_string() }
}

/// Small and fast: tiny frames, pure exploitation
pub fn test_parameter(model_dir: &Path) -> Parameter {
    Parameter {
        batch_size: 8,
        exploration_games: 0,
        frame_size: 16,
        model_dir: model_dir.to_path_buf(),
        start_stagger: Duration::from_millis(20),
        ..Default::default()
    }
}

pub fn environment<W: GameWindow>(
    window: W,
    param: &Parameter,
) -> GameEnvironment<W> {
    shared_environment(window, param, new_input_lock())
}

pub fn shared_environment<W: GameWindow>(
    window: W,
    param: &Parameter,
    input_lock: InputLock,
) -> GameEnvironment<W> {
    GameEnvironment::new(
        window,
        Preprocessor::new(param.frame_size, param.frame_size),
        input_lock,
        param.reward.clone(),
    )
}

/// Occupancy of the "focus .. resulting frame" section, counted over all windows sharing one instance
#[derive(Debug, Default)]
pub struct CriticalSections {
    active: AtomicUsize,
    max_active: AtomicUsize,
    entered: AtomicUsize,
}

impl CriticalSections {
    fn enter(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.entered.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) { self.active.fetch_sub(1, Ordering::SeqCst); }

    /// Most windows ever inside the section at the same time
    pub fn max_active(&self) -> usize { self.max_active.load(Ordering::SeqCst) }

    pub fn entered(&self) -> usize { self.entered.load(Ordering::SeqCst) }
}

/// [ScriptedWindow] reporting to [CriticalSections]: a section opens with `focus` and closes with the next capture
/// (or start click).
pub struct SectionRecordingWindow {
    inner: ScriptedWindow,
    sections: Arc<CriticalSections>,
    inside: bool,
}

impl SectionRecordingWindow {
    pub fn new(
        inner: ScriptedWindow,
        sections: Arc<CriticalSections>,
    ) -> Self {
        Self {
            inner,
            sections,
            inside: false,
        }
    }

    fn leave(&mut self) {
        if self.inside {
            self.inside = false;
            self.sections.leave();
        }
    }
}

impl FrameSource for SectionRecordingWindow {
    fn capture(&mut self) -> Result<RawFrame, CollaboratorError> {
        let frame = self.inner.capture();
        self.leave();
        frame
    }
}

impl InputSink for SectionRecordingWindow {
    fn press(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError> {
        self.inner.press(control)
    }

    fn release(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError> {
        self.inner.release(control)
    }

    fn reset_inputs(&mut self) -> Result<(), CollaboratorError> { self.inner.reset_inputs() }
}

impl WindowProbe for SectionRecordingWindow {
    fn is_in_menu(&mut self) -> Result<bool, CollaboratorError> { self.inner.is_in_menu() }

    fn focus(&mut self) -> Result<(), CollaboratorError> {
        self.leave();
        self.inside = true;
        self.sections.enter();
        self.inner.focus()
    }

    fn click_start(&mut self) -> Result<(), CollaboratorError> {
        let clicked = self.inner.click_start();
        self.leave();
        clicked
    }

    fn is_valid(&self) -> bool { self.inner.is_valid() }

    fn name(&self) -> String { self.inner.name() }
}
