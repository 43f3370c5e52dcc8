pub mod action;
pub mod collaborators;
pub mod game;
pub mod reward;
pub mod simulated;
