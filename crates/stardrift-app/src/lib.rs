//! Stardrift application: window hosting and the animated backdrop.
//!
//! Provides window creation, event handling, and the frame scheduler that
//! drives the starfield and nebula simulation.

pub mod backdrop;
pub mod platform;
pub mod scheduler;
pub mod window;
