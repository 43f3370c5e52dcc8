//! Contracts of the OS-side collaborators: screen capture, keyboard/mouse injection and window probing.
//!
//! Every operation reports failure as a typed [CollaboratorError] instead of raising; the learning loop degrades
//! failures to logged no-ops and counts them in [CollaboratorStats].

use image::RgbaImage;
use thiserror::Error;

/// Raw screenshot of a game window region
pub type RawFrame = RgbaImage;

/// The single control a player operates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Jump,
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("window focus failed: {0}")]
    Focus(String),
    #[error("input injection failed: {0}")]
    Input(String),
    #[error("menu detection failed: {0}")]
    Probe(String),
    #[error("window is gone")]
    WindowGone,
}

pub trait FrameSource {
    /// Screenshot of the game region. Cheap enough to be called for every step.
    fn capture(&mut self) -> Result<RawFrame, CollaboratorError>;
}

/// Idempotent press / release of a control
pub trait InputSink {
    fn press(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError>;

    fn release(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError>;

    /// Releases everything which might still be held (including modifier keys used for focusing)
    fn reset_inputs(&mut self) -> Result<(), CollaboratorError>;
}

pub trait WindowProbe {
    /// Whether the game shows its menu - which is also how a death is detected
    fn is_in_menu(&mut self) -> Result<bool, CollaboratorError>;

    /// Brings the window to the foreground, so that injected input reaches it
    fn focus(&mut self) -> Result<(), CollaboratorError>;

    /// Triggers the "start game" button of the menu
    fn click_start(&mut self) -> Result<(), CollaboratorError>;

    /// Whether the window handle is still usable at all
    fn is_valid(&self) -> bool;

    /// Human readable identification for log lines
    fn name(&self) -> String;
}

/// Everything one game window provides
pub trait GameWindow: FrameSource + InputSink + WindowProbe {}

impl<T: FrameSource + InputSink + WindowProbe> GameWindow for T {}

/// Failure counters, making collaborator failure rates observable
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollaboratorStats {
    pub capture_failures: usize,
    pub malformed_frames: usize,
    pub focus_failures: usize,
    pub input_failures: usize,
    pub probe_failures: usize,
}

impl CollaboratorStats {
    pub fn record(
        &mut self,
        error: &CollaboratorError,
    ) {
        match error {
            CollaboratorError::Capture(_) => self.capture_failures += 1,
            CollaboratorError::Focus(_) | CollaboratorError::WindowGone => self.focus_failures += 1,
            CollaboratorError::Input(_) => self.input_failures += 1,
            CollaboratorError::Probe(_) => self.probe_failures += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.capture_failures + self.malformed_frames + self.focus_failures + self.input_failures + self.probe_failures
    }
}
