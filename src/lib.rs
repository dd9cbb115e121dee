//! rigview - skeletal animation core for a 3D scene viewer

pub mod core;
pub mod import;
pub mod animation;
pub mod viewer;
