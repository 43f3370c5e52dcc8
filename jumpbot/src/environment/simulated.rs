//! Deterministic side-scrolling runner, standing in for a real game window.
//!
//! The world advances one tick per captured frame. Touching an obstacle ends the run and brings up the menu,
//! which is exactly how a real window reports a death.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::environment::collaborators::{CollaboratorError, Control, FrameSource, InputSink, RawFrame, WindowProbe};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const GROUND_Y: i32 = 100;

const PLAYER_X: f32 = 30.0;
const PLAYER_WIDTH: f32 = 10.0;
const PLAYER_HEIGHT: f32 = 14.0;
const OBSTACLE_WIDTH: f32 = 8.0;
const OBSTACLE_HEIGHT: f32 = 12.0;

const SCROLL_SPEED: f32 = 3.0;
const JUMP_VELOCITY: f32 = 7.0;
const GRAVITY: f32 = 0.6;
const OBSTACLE_GAP: std::ops::Range<f32> = 60.0..140.0;

const SKY: Rgba<u8> = Rgba([200, 220, 255, 255]);
const GROUND: Rgba<u8> = Rgba([90, 60, 30, 255]);
const PLAYER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OBSTACLE: Rgba<u8> = Rgba([200, 30, 30, 255]);
const MENU_BACKGROUND: Rgba<u8> = Rgba([20, 20, 40, 255]);
const START_BUTTON: Rgba<u8> = Rgba([250, 200, 0, 255]);

pub struct SimulatedGame {
    name: String,
    rng: StdRng,
    in_menu: bool,
    valid: bool,
    jump_held: bool,
    /// feet above ground
    player_height: f32,
    velocity: f32,
    obstacles: VecDeque<f32>,
    ticks: u64,
    deaths: usize,
    frame_interval: Duration,
    capture_failure_rate: f64,
}

impl SimulatedGame {
    /// A fresh window showing the menu
    pub fn new(
        name: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            rng: StdRng::seed_from_u64(seed),
            in_menu: true,
            valid: true,
            jump_held: false,
            player_height: 0.0,
            velocity: 0.0,
            obstacles: VecDeque::new(),
            ticks: 0,
            deaths: 0,
            frame_interval: Duration::ZERO,
            capture_failure_rate: 0.0,
        }
    }

    /// Capture blocks for that long, pacing the game like a real frame rate would
    pub fn with_frame_interval(
        mut self,
        frame_interval: Duration,
    ) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Fraction of captures failing
    pub fn with_capture_failure_rate(
        mut self,
        rate: f64,
    ) -> Self {
        self.capture_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn deaths(&self) -> usize { self.deaths }

    pub fn ticks(&self) -> u64 { self.ticks }

    /// Closes the window; every later focus reports it as gone
    pub fn close(&mut self) { self.valid = false; }

    fn restart(&mut self) {
        self.in_menu = false;
        self.jump_held = false;
        self.player_height = 0.0;
        self.velocity = 0.0;
        self.obstacles.clear();
        self.obstacles.push_back(WIDTH as f32 + 20.0);
    }

    fn tick(&mut self) {
        if self.in_menu {
            return;
        }
        self.ticks += 1;

        let on_ground = self.player_height <= 0.0;
        if on_ground && self.jump_held {
            self.velocity = JUMP_VELOCITY;
        }
        self.player_height = (self.player_height + self.velocity).max(0.0);
        self.velocity = if self.player_height > 0.0 { self.velocity - GRAVITY } else { 0.0 };

        for x in self.obstacles.iter_mut() {
            *x -= SCROLL_SPEED;
        }
        while self.obstacles.front().map_or(false, |&x| x + OBSTACLE_WIDTH < 0.0) {
            self.obstacles.pop_front();
        }
        let last = self.obstacles.back().copied().unwrap_or(0.0);
        if last < WIDTH as f32 {
            let gap = self.rng.gen_range(OBSTACLE_GAP);
            self.obstacles.push_back(last.max(WIDTH as f32 - OBSTACLE_WIDTH) + gap);
        }

        if self.collides() {
            self.in_menu = true;
            self.deaths += 1;
            log::trace!("{} crashed after {} ticks", self.name, self.ticks);
        }
    }

    fn collides(&self) -> bool {
        self.player_height < OBSTACLE_HEIGHT
            && self
                .obstacles
                .iter()
                .any(|&x| x < PLAYER_X + PLAYER_WIDTH && x + OBSTACLE_WIDTH > PLAYER_X)
    }

    fn render(&self) -> RawFrame {
        if self.in_menu {
            let mut frame = RgbaImage::from_pixel(WIDTH, HEIGHT, MENU_BACKGROUND);
            fill_rect(&mut frame, 50, 50, 60, 20, START_BUTTON);
            return frame;
        }

        let mut frame = RgbaImage::from_pixel(WIDTH, HEIGHT, SKY);
        fill_rect(&mut frame, 0, GROUND_Y, WIDTH as i32, HEIGHT as i32 - GROUND_Y, GROUND);
        let player_top = GROUND_Y - (self.player_height + PLAYER_HEIGHT).round() as i32;
        fill_rect(&mut frame, PLAYER_X as i32, player_top, PLAYER_WIDTH as i32, PLAYER_HEIGHT as i32, PLAYER);
        for &x in &self.obstacles {
            fill_rect(
                &mut frame,
                x.round() as i32,
                GROUND_Y - OBSTACLE_HEIGHT as i32,
                OBSTACLE_WIDTH as i32,
                OBSTACLE_HEIGHT as i32,
                OBSTACLE,
            );
        }
        frame
    }
}

/// Fills the part of the rectangle which lies inside the frame
fn fill_rect(
    frame: &mut RgbaImage,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color: Rgba<u8>,
) {
    let x_range = x.max(0)..(x + width).min(frame.width() as i32);
    let y_range = y.max(0)..(y + height).min(frame.height() as i32);
    for py in y_range {
        for px in x_range.clone() {
            frame.put_pixel(px as u32, py as u32, color);
        }
    }
}

impl FrameSource for SimulatedGame {
    fn capture(&mut self) -> Result<RawFrame, CollaboratorError> {
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }
        if self.capture_failure_rate > 0.0 && self.rng.gen::<f64>() < self.capture_failure_rate {
            return Err(CollaboratorError::Capture(format!("{}: simulated capture failure", self.name)));
        }
        self.tick();
        Ok(self.render())
    }
}

impl InputSink for SimulatedGame {
    fn press(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError> {
        match control {
            Control::Jump => self.jump_held = true,
        }
        Ok(())
    }

    fn release(
        &mut self,
        control: Control,
    ) -> Result<(), CollaboratorError> {
        match control {
            Control::Jump => self.jump_held = false,
        }
        Ok(())
    }

    fn reset_inputs(&mut self) -> Result<(), CollaboratorError> {
        self.jump_held = false;
        Ok(())
    }
}

impl WindowProbe for SimulatedGame {
    fn is_in_menu(&mut self) -> Result<bool, CollaboratorError> { Ok(self.in_menu) }

    fn focus(&mut self) -> Result<(), CollaboratorError> {
        if self.valid {
            Ok(())
        } else {
            Err(CollaboratorError::WindowGone)
        }
    }

    fn click_start(&mut self) -> Result<(), CollaboratorError> {
        if self.in_menu {
            self.restart();
        }
        Ok(())
    }

    fn is_valid(&self) -> bool { self.valid }

    fn name(&self) -> String { self.name.clone() }
}

/// Opens `count` simulated windows with distinct seeds derived from `seed`
pub fn discover_windows(
    count: usize,
    seed: u64,
) -> Result<Vec<SimulatedGame>> {
    if count == 0 {
        bail!("no game windows found");
    }
    Ok((0..count)
        .map(|i| SimulatedGame::new(format!("simulated-{}", i), seed.wrapping_add(i as u64)))
        .collect())
}
