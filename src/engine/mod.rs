//! The frame-stepping animation engine.

pub mod animation;
pub mod drawer;
