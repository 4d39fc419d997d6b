//! Runtime options recognised by the presentation engine (spec §6).
//!
//! The loader/CLI configuration-file parser is an external collaborator;
//! this crate only consumes the small, already-resolved set of
//! boolean/integer knobs below.

/// Options that influence swapchain construction and presentation
/// policy. All fields default to the behavior described in spec §4.5.1
/// and §4.5.7.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainOptions {
    /// `vk_x11_override_min_image_count`. `0` means no override.
    pub override_min_image_count: u32,
    /// `vk_x11_strict_image_count`. When set, the requested image count
    /// is used exactly, bypassing the fence-wait and min-count floors.
    pub strict_image_count: bool,
    /// `vk_x11_ensure_min_image_count`. Raises the image count to the
    /// min-image-count floor (default 3) when set.
    pub ensure_min_image_count: bool,
    /// `vk_xwayland_wait_ready`. Governs whether `IMMEDIATE` on XWayland
    /// reuses the mailbox fence-wait path. Defaults to `true`.
    pub xwayland_wait_ready: bool,
}

impl Default for SwapchainOptions {
    fn default() -> Self {
        Self {
            override_min_image_count: 0,
            strict_image_count: false,
            ensure_min_image_count: false,
            xwayland_wait_ready: true,
        }
    }
}

/// The floor applied by `ensure_min_image_count` and by capability
/// queries' `min_image_count`, unless overridden.
pub const DEFAULT_MIN_IMAGE_COUNT: u32 = 3;

/// Image count forced by the fence-wait policy (spec §4.5.1 step 1),
/// unless `strict_image_count` is set.
pub const FENCE_WAIT_IMAGE_COUNT: u32 = 5;

/// Reads the `WSI_DEBUG_NOSHM` debug flag.
///
/// When set (to any value), MIT-SHM is disabled for the software
/// presentation path regardless of what the server advertises.
pub fn debug_noshm() -> bool {
    std::env::var_os("WSI_DEBUG_NOSHM").is_some()
}
