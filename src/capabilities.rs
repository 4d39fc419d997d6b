//! C2: capability prober.
//!
//! Probes a connection once (spec §4.2) for the extensions and quirks the
//! rest of the engine needs to pick a presentation path, following the
//! same "prefetch everything, then consume replies" pipelining the
//! teacher's `Extensions::check_extensions` uses for its own, simpler set
//! of three mandatory extensions.

use tracing::{info, warn};
use x11rb::{
    connection::Connection,
    protocol::{
        dri3::{self, ConnectionExt as _},
        present::{self, ConnectionExt as _},
        randr::{self, ConnectionExt as _},
        shm::{self, ConnectionExt as _},
        xfixes::{self, ConnectionExt as _},
        xproto::ConnectionExt as _,
        ErrorKind,
    },
    rust_connection::{ReplyError, RustConnection},
};

use crate::error::{MissingExtensionError, SetupError};

const XWAYLAND_EXT_NAME: &str = "XWAYLAND";
const ATI_MARKER: &str = "ATIFGLRXDRI";
const NV_MARKER: &str = "NV-CONTROL";

/// Everything the swapchain core needs to know about a connection,
/// computed once and cached by the registry (spec §3 "Connection entry").
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEntry {
    /// The Present extension is available (mandatory; always `true` for
    /// a successfully constructed entry, kept for parity with spec §3).
    pub present_available: bool,
    /// DRI3 is available (mandatory).
    pub dri3_available: bool,
    /// XFIXES is available (mandatory).
    pub xfixes_available: bool,
    /// DRI3 >= 1.2 *and* Present >= 1.2: multi-plane pixmaps with
    /// explicit modifiers can be used.
    pub has_dri3_modifiers: bool,
    /// XFIXES >= 2: damage regions are supported.
    pub has_xfixes_regions: bool,
    /// MIT-SHM is present, the driver wants it, and the `detach(0)` probe
    /// confirms the opcode is implemented (spec §4.2).
    pub mit_shm_available_and_usable: bool,
    /// The server is an XWayland instance.
    pub is_xwayland: bool,
    /// A proprietary-driver marker extension was advertised. Used only
    /// to suppress a user warning when DRI3 is missing.
    pub is_proprietary_stack: bool,
}

/// Probes `connection` and builds a [`ConnectionEntry`].
///
/// `want_shm` should reflect whether the driver would use MIT-SHM at all
/// (software path, or host-visible import) were it available; this
/// probe still runs the stateful `detach(0)` check only in that case,
/// since the probe itself is not side-effect-free on every server.
pub fn probe_connection(
    connection: &RustConnection,
    root: u32,
    want_shm: bool,
) -> Result<ConnectionEntry, SetupError> {
    // Dispatch every query eagerly so replies are pipelined instead of
    // serialized one round-trip at a time.
    connection.prefetch_extension_information(dri3::X11_EXTENSION_NAME)?;
    connection.prefetch_extension_information(present::X11_EXTENSION_NAME)?;
    connection.prefetch_extension_information(randr::X11_EXTENSION_NAME)?;
    connection.prefetch_extension_information(xfixes::X11_EXTENSION_NAME)?;
    connection.prefetch_extension_information(shm::X11_EXTENSION_NAME)?;
    connection.prefetch_extension_information(XWAYLAND_EXT_NAME)?;
    connection.prefetch_extension_information(ATI_MARKER)?;
    connection.prefetch_extension_information(NV_MARKER)?;

    let has_dri3 = connection.extension_information(dri3::X11_EXTENSION_NAME)?.is_some();
    let has_present = connection.extension_information(present::X11_EXTENSION_NAME)?.is_some();
    let has_randr = connection.extension_information(randr::X11_EXTENSION_NAME)?.is_some();
    let has_xfixes = connection.extension_information(xfixes::X11_EXTENSION_NAME)?.is_some();
    let has_shm = connection.extension_information(shm::X11_EXTENSION_NAME)?.is_some();
    let has_xwayland_ext = connection.extension_information(XWAYLAND_EXT_NAME)?.is_some();
    let is_proprietary_stack = connection.extension_information(ATI_MARKER)?.is_some()
        || connection.extension_information(NV_MARKER)?.is_some();

    if !has_dri3 {
        if !is_proprietary_stack {
            warn!("DRI3 extension not found; direct rendering presentation is unavailable");
        }
        return Err(MissingExtensionError::NotFound { name: "DRI3" }.into());
    }
    if !has_present {
        return Err(MissingExtensionError::NotFound { name: "Present" }.into());
    }
    if !has_xfixes {
        return Err(MissingExtensionError::NotFound { name: "XFIXES" }.into());
    }

    // Version queries can also be pipelined: issue all cookies, then
    // collect replies in order.
    let dri3_version_cookie = connection.dri3_query_version(1, 2)?;
    let present_version_cookie = connection.present_query_version(1, 2)?;
    let xfixes_version_cookie = connection.xfixes_query_version(5, 0)?;

    let dri3_version = dri3_version_cookie.reply()?;
    let present_version = present_version_cookie.reply()?;
    let xfixes_version = xfixes_version_cookie.reply()?;

    info!(
        dri3 = format!("{}.{}", dri3_version.major_version, dri3_version.minor_version),
        present = format!("{}.{}", present_version.major_version, present_version.minor_version),
        xfixes = format!("{}.{}", xfixes_version.major_version, xfixes_version.minor_version),
        "probed X11 presentation extensions"
    );

    let has_dri3_modifiers = version_at_least(dri3_version.major_version, dri3_version.minor_version, 1, 2)
        && version_at_least(present_version.major_version, present_version.minor_version, 1, 2);
    let has_xfixes_regions = xfixes_version.major_version >= 2;

    let mit_shm_available_and_usable = if want_shm && has_shm && !crate::options::debug_noshm() {
        probe_shm_usable(connection)?
    } else {
        false
    };

    let is_xwayland = if has_xwayland_ext {
        true
    } else if has_randr {
        detect_xwayland_via_randr(connection, root)?
    } else {
        false
    };

    Ok(ConnectionEntry {
        present_available: true,
        dri3_available: true,
        xfixes_available: true,
        has_dri3_modifiers,
        has_xfixes_regions,
        mit_shm_available_and_usable,
        is_xwayland,
        is_proprietary_stack,
    })
}

fn version_at_least(major: u32, minor: u32, req_major: u32, req_minor: u32) -> bool {
    major > req_major || (major == req_major && minor >= req_minor)
}

/// The canonical MIT-SHM usability probe (spec §4.2, and the "Open
/// questions" note in §9): the server's reply to `shm_query_version`
/// reports `shared_pixmaps`, but that alone does not mean the server
/// actually implements the opcode we'll use. Sending an intentionally
/// invalid `detach(0)` and inspecting the error distinguishes "opcode
/// unimplemented" (`BadRequest`) from "opcode implemented, rejected our
/// bogus segment id" (any other error).
fn probe_shm_usable(connection: &RustConnection) -> Result<bool, SetupError> {
    let version = connection.shm_query_version()?.reply()?;
    if !version.shared_pixmaps {
        return Ok(false);
    }

    match connection.shm_detach(0)?.check() {
        Ok(()) => Ok(true),
        Err(ReplyError::X11Error(protocol_error)) => Ok(protocol_error.error_kind != ErrorKind::Request),
        Err(ReplyError::ConnectionError(err)) => Err(err.into()),
    }
}

fn detect_xwayland_via_randr(connection: &RustConnection, root: u32) -> Result<bool, SetupError> {
    let randr_version = connection.randr_query_version(1, 3)?.reply()?;
    if !version_at_least(randr_version.major_version, randr_version.minor_version, 1, 3) {
        return Ok(false);
    }

    let resources = connection
        .randr_get_screen_resources_current(root)?
        .reply()?;
    let Some(&first_output) = resources.outputs.first() else {
        return Ok(false);
    };
    let info = connection
        .randr_get_output_info(first_output, resources.config_timestamp)?
        .reply()?;
    Ok(info.name.starts_with(b"XWAYLAND"))
}

#[cfg(test)]
mod tests {
    use super::version_at_least;

    #[test]
    fn version_comparison_matches_major_minor_ordering() {
        assert!(version_at_least(1, 2, 1, 2));
        assert!(version_at_least(1, 3, 1, 2));
        assert!(version_at_least(2, 0, 1, 2));
        assert!(!version_at_least(1, 1, 1, 2));
        assert!(!version_at_least(0, 9, 1, 0));
    }
}
