//! C5/C6: the swapchain state machine (spec §3 "Swapchain", §4.5, §4.6).
//!
//! Split the way the teacher splits its own state machines: a pure,
//! unit-testable reducer (`events`) feeding a thin core that owns the
//! live connection and slot storage (`core`), paced by a dedicated
//! queue manager thread (`worker`) for the modes that need one.

pub mod core;
pub mod events;
mod worker;

pub use core::{PresentOptions, Swapchain, SwapchainCreateInfo};
