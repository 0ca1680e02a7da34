//! Tessel engine crate.
//!
//! State-sorted geometry batching: drawables live in a [`scene::Scene`], are
//! registered with one or more [`render::Batcher`]s and are drawn back-to-front
//! with as few draw calls as their render state allows.

pub mod config;
pub mod coords;
pub mod error;
pub mod index;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;

pub use error::{BatchError, Result};
