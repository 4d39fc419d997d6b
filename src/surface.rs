//! C3: surface queries.
//!
//! Answers presentation-support, capability, format, present-mode, and
//! rectangle questions for a window, without constructing a swapchain
//! (spec §4.3). Grounded on the teacher's `X11Backend::new` pattern of
//! walking `setup().roots[screen].allowed_depths[].visuals[]` to find a
//! `TrueColor`/`DirectColor` visual — generalized here from "pick a
//! visual to create a window with" to "classify a window's already
//! chosen visual".

use std::sync::Arc;

use tracing::warn;
use x11rb::{
    connection::Connection,
    protocol::xproto::{ConnectionExt as _, VisualClass, Window},
    rust_connection::RustConnection,
};

use crate::{
    capabilities::ConnectionEntry,
    error::SetupError,
    format::{supported_composite_alpha, supported_formats, CompositeAlpha, PresentMode, RgbMasks,
        SurfaceFormat, PRESENT_MODES_IN_PRIORITY_ORDER},
    options::DEFAULT_MIN_IMAGE_COUNT,
};

/// A presentation target (spec §3 "Surface"): owned by the caller, with
/// a borrowed connection. XCB is the only transport this engine talks
/// (spec §0 "one concrete connection type"); an Xlib-originated display
/// reaches here the same way the caller reaches any XCB connection —
/// by handing over the `Arc<RustConnection>` obtained from it (e.g. via
/// `XGetXCBConnection`), which is outside this crate's concern.
#[derive(Debug, Clone)]
pub enum Surface {
    /// A window reached directly over an XCB connection.
    Xcb {
        /// The (borrowed, shared) connection.
        connection: Arc<RustConnection>,
        /// The target window.
        window: Window,
    },
    /// A window reached through an Xlib `Display`, whose XCB connection
    /// the caller already extracted.
    Xlib {
        /// Opaque identifier of the originating `Display*`, kept only so
        /// callers can distinguish surfaces; never dereferenced here.
        display_id: usize,
        /// The (borrowed, shared) connection extracted from that display.
        connection: Arc<RustConnection>,
        /// The target window.
        window: Window,
    },
}

impl Surface {
    /// The underlying connection, regardless of how the surface was
    /// constructed.
    pub fn connection(&self) -> &Arc<RustConnection> {
        match self {
            Surface::Xcb { connection, .. } | Surface::Xlib { connection, .. } => connection,
        }
    }

    /// The target window id.
    pub fn window(&self) -> Window {
        match self {
            Surface::Xcb { window, .. } | Surface::Xlib { window, .. } => *window,
        }
    }
}

/// A window's geometry and the RGB masks of its visual, enough to
/// answer every query in this module.
#[derive(Debug, Clone, Copy)]
pub struct WindowGeometry {
    /// Current width.
    pub width: u16,
    /// Current height.
    pub height: u16,
    /// Bit depth of the window (e.g. 24, 32).
    pub depth: u8,
    /// RGB channel masks of the window's visual.
    pub visual: RgbMasks,
    /// `true` if the visual is `TrueColor` or `DirectColor`.
    pub visual_is_presentable: bool,
}

/// Capability answer for a surface (spec §4.3 "Capabilities").
#[derive(Debug, Clone)]
pub struct SurfaceCapabilities {
    /// Current extent, equal to min and max per spec (a window has one size).
    pub current_extent: (u16, u16),
    /// Minimum image count, the `DEFAULT_MIN_IMAGE_COUNT` floor unless overridden.
    pub min_image_count: u32,
    /// Maximum image count; `0` means unbounded.
    pub max_image_count: u32,
    /// Composite-alpha modes this surface supports.
    pub supported_composite_alpha: Vec<CompositeAlpha>,
}

/// Fetches a window's geometry and visual, the one round-trip §4.3
/// needs for every other query.
pub fn query_geometry(
    connection: &RustConnection,
    window: Window,
) -> Result<WindowGeometry, SetupError> {
    let geometry = connection
        .get_geometry(window)?
        .reply()
        .map_err(|e| SetupError::NotPresentable(format!("get_geometry failed: {e}")))?;

    let attrs = connection
        .get_window_attributes(window)?
        .reply()
        .map_err(|e| SetupError::NotPresentable(format!("get_window_attributes failed: {e}")))?;

    let setup = connection.setup();
    let screen = setup
        .roots
        .iter()
        .find(|s| s.root == geometry.root)
        .ok_or_else(|| SetupError::NotPresentable("window's root screen not found".into()))?;

    let visual_info = screen
        .allowed_depths
        .iter()
        .flat_map(|depth| depth.visuals.iter().map(move |v| (depth.depth, v)))
        .find(|(_, v)| v.visual_id == attrs.visual)
        .ok_or_else(|| SetupError::NotPresentable("window visual not found in screen's depth list".into()))?;

    let (depth, visual) = visual_info;
    let visual_is_presentable =
        matches!(visual.class, VisualClass::TRUE_COLOR | VisualClass::DIRECT_COLOR);

    Ok(WindowGeometry {
        width: geometry.width,
        height: geometry.height,
        depth,
        visual: RgbMasks {
            red: visual.red_mask,
            green: visual.green_mask,
            blue: visual.blue_mask,
        },
        visual_is_presentable,
    })
}

/// Whether presentation is supported on this surface (spec §4.3
/// "Presentation support").
pub fn supports_presentation(
    entry: &ConnectionEntry,
    geometry: &WindowGeometry,
    software: bool,
) -> bool {
    if !geometry.visual_is_presentable {
        return false;
    }
    if software {
        return true;
    }
    if !entry.dri3_available && !entry.is_proprietary_stack {
        warn!("DRI3 is unavailable on a non-proprietary stack; direct-rendering presentation is unavailable");
    }
    entry.dri3_available
}

/// Capability query (spec §4.3 "Capabilities").
pub fn capabilities(geometry: &WindowGeometry, override_min_image_count: u32) -> SurfaceCapabilities {
    let min_image_count = if override_min_image_count > 0 {
        override_min_image_count
    } else {
        DEFAULT_MIN_IMAGE_COUNT
    };

    SurfaceCapabilities {
        current_extent: (geometry.width, geometry.height),
        min_image_count,
        max_image_count: 0,
        supported_composite_alpha: supported_composite_alpha(geometry.depth, geometry.visual).into_vec(),
    }
}

/// Format enumeration (spec §4.3 "Formats").
pub fn formats(geometry: &WindowGeometry, force_bgra8_unorm_first: bool) -> Vec<SurfaceFormat> {
    supported_formats(geometry.visual, force_bgra8_unorm_first).into_vec()
}

/// Present-mode enumeration (spec §4.3 "Present modes"): always the
/// full priority-ordered list, independent of the window.
pub fn present_modes() -> [PresentMode; 4] {
    PRESENT_MODES_IN_PRIORITY_ORDER
}

/// Present-rectangle query (spec §4.3 "Present rectangles"): one
/// rectangle equal to the window's geometry.
pub fn present_rectangles(geometry: &WindowGeometry) -> [(i16, i16, u16, u16); 1] {
    [(0, 0, geometry.width, geometry.height)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(visual_is_presentable: bool) -> WindowGeometry {
        WindowGeometry {
            width: 800,
            height: 600,
            depth: 24,
            visual: RgbMasks {
                red: 0x00ff_0000,
                green: 0x0000_ff00,
                blue: 0x0000_00ff,
            },
            visual_is_presentable,
        }
    }

    #[test]
    fn non_presentable_visual_fails_regardless_of_extensions() {
        let entry = ConnectionEntry {
            present_available: true,
            dri3_available: true,
            xfixes_available: true,
            has_dri3_modifiers: false,
            has_xfixes_regions: true,
            mit_shm_available_and_usable: false,
            is_xwayland: false,
            is_proprietary_stack: false,
        };
        assert!(!supports_presentation(&entry, &geometry(false), false));
    }

    #[test]
    fn software_path_does_not_require_dri3() {
        let entry = ConnectionEntry {
            present_available: true,
            dri3_available: false,
            xfixes_available: true,
            has_dri3_modifiers: false,
            has_xfixes_regions: true,
            mit_shm_available_and_usable: false,
            is_xwayland: false,
            is_proprietary_stack: false,
        };
        assert!(supports_presentation(&entry, &geometry(true), true));
    }

    #[test]
    fn min_image_count_defaults_to_three() {
        let caps = capabilities(&geometry(true), 0);
        assert_eq!(caps.min_image_count, 3);
    }

    #[test]
    fn min_image_count_override_wins() {
        let caps = capabilities(&geometry(true), 6);
        assert_eq!(caps.min_image_count, 6);
    }

    #[test]
    fn present_rectangle_matches_window_geometry() {
        let rects = present_rectangles(&geometry(true));
        assert_eq!(rects, [(0, 0, 800, 600)]);
    }
}
