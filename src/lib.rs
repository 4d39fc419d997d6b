#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # x11-wsi: an X11 presentation engine
//!
//! This crate implements the client side of a Vulkan-style WSI swapchain
//! over the X11 Present, DRI3, XFIXES, RANDR, and MIT-SHM protocol
//! extensions. It owns the per-connection capability probe, the surface
//! queries, the image slot ring, and the swapchain state machine that
//! ties acquire/present/destroy and the Present event stream together.
//!
//! ## Structure of the crate
//!
//! [`registry`] caches one capability probe per X server connection.
//! [`capabilities`] performs that probe. [`surface`] answers
//! presentation-support and format/mode queries for a window without
//! constructing anything. [`image`] provisions the GPU- or CPU-backed
//! slots a swapchain presents from. [`swapchain`] is the state machine
//! itself: construction, acquire, present, event dispatch, and destroy.
//!
//! GPU image allocation and cross-process fence signaling are external
//! collaborators this crate only consumes, through the
//! [`image::ExternalImageSource`] and [`image::FenceSignal`] traits —
//! the generic Vulkan/GBM/DRM allocator framework itself is out of
//! scope here.
//!
//! ## Logging
//!
//! This crate emits [`tracing`] events rather than printing directly;
//! install a subscriber (e.g. `tracing-subscriber`) to see them.

pub mod capabilities;
pub mod error;
pub mod format;
pub mod image;
pub mod options;
pub mod registry;
pub mod surface;
pub mod swapchain;
pub mod utils;
