//! Status codes returned by the swapchain, and the sticky-latch logic that
//! reconciles results observed from both the application thread and the
//! queue manager thread (see `DESIGN.md`, §4.6 of the spec this crate
//! implements).

use std::sync::atomic::{AtomicI32, Ordering};

use x11rb::rust_connection::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Result of an acquire, present, or event-dispatch step.
///
/// Negative variants are permanent: once observed they are latched into
/// the swapchain's status and never revert (spec invariant 4). `Timeout`
/// and `NotReady` are transient and are never written into the latch.
/// `Suboptimal` is sticky but is overwritten by any later negative status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// The operation completed normally.
    Success = 0,
    /// The chain still works, but the window no longer matches its
    /// locked extent, or a flip fell back to a copy.
    Suboptimal = 1,
    /// No image was available within the caller's timeout.
    Timeout = 2,
    /// No image was available and the caller asked not to wait.
    NotReady = 3,
    /// The window's geometry or the server connection makes this chain
    /// unusable; it must be destroyed and re-created.
    OutOfDate = -1,
    /// The server rejected a request tied to presentation, or the
    /// special-event channel was closed.
    SurfaceLost = -2,
    /// Setup failed: a required extension was missing, or an allocation
    /// failed. Conflated per spec §7/§9 — there is no finer signal.
    OutOfHostMemory = -3,
}

impl Status {
    /// Negative statuses are permanent.
    #[inline]
    pub fn is_negative(self) -> bool {
        (self as i32) < 0
    }

    fn is_transient(self) -> bool {
        matches!(self, Status::Timeout | Status::NotReady)
    }

    fn from_repr(repr: i32) -> Status {
        match repr {
            0 => Status::Success,
            1 => Status::Suboptimal,
            2 => Status::Timeout,
            3 => Status::NotReady,
            -1 => Status::OutOfDate,
            -2 => Status::SurfaceLost,
            -3 => Status::OutOfHostMemory,
            _ => unreachable!("status latch holds an un-encodable value"),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Success => "success",
            Status::Suboptimal => "suboptimal",
            Status::Timeout => "timeout",
            Status::NotReady => "not ready",
            Status::OutOfDate => "out of date",
            Status::SurfaceLost => "surface lost",
            Status::OutOfHostMemory => "out of host memory",
        };
        f.write_str(s)
    }
}

impl std::error::Error for Status {}

/// Sticky, cross-thread status latch.
///
/// Only `Success` or `Suboptimal` (the non-negative, non-transient
/// statuses) are ever stored; `Timeout`/`NotReady` pass through without
/// being written, and a negative status, once stored, can never be
/// overwritten (spec invariant 4).
#[derive(Debug)]
pub struct StatusLatch(AtomicI32);

impl StatusLatch {
    pub fn new() -> Self {
        Self(AtomicI32::new(Status::Success as i32))
    }

    /// Reads the currently latched status without merging a new result.
    pub fn current(&self) -> Status {
        Status::from_repr(self.0.load(Ordering::Acquire))
    }

    /// Merges a freshly observed result into the latch per the transition
    /// table in spec §4.6, and returns the value that should be reported
    /// to the caller.
    ///
    /// In the normal acquire/present call path, `current()` is checked
    /// first and the call returns immediately if it is already negative
    /// (spec §4.5.2/§4.5.3), so this function is mostly reached from the
    /// event-dispatch path with a non-negative latch. It still implements
    /// the full table so a late, concurrently-observed negative result
    /// is never dropped.
    pub fn merge(&self, new: Status) -> Status {
        loop {
            let current_repr = self.0.load(Ordering::Acquire);
            let current = Status::from_repr(current_repr);

            if current.is_negative() {
                // Row "negative"/col "<0": keep current either way.
                // Row "transient"/col "<0": keep current, report new.
                return if new.is_transient() { new } else { current };
            }

            if new.is_transient() {
                // Never written; reported as-is regardless of current.
                return new;
            }

            if new.is_negative() {
                if self
                    .0
                    .compare_exchange(current_repr, new as i32, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return new;
                }
                continue;
            }

            // `new` is Success or Suboptimal from here on.
            debug_assert!(matches!(new, Status::Success | Status::Suboptimal));

            if current == Status::Suboptimal {
                // Sticky: a later Success does not clear Suboptimal.
                return Status::Suboptimal;
            }

            if new == Status::Suboptimal {
                if self
                    .0
                    .compare_exchange(
                        current_repr,
                        Status::Suboptimal as i32,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    return Status::Suboptimal;
                }
                continue;
            }

            return Status::Success;
        }
    }
}

impl Default for StatusLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// An error that occurs while probing capabilities or constructing a
/// swapchain — before there is a status latch to report through.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// A mandatory extension (DRI3, Present, or XFIXES) was missing or
    /// whose version was too low.
    #[error("{0}")]
    MissingExtension(#[from] MissingExtensionError),

    /// The window's geometry could not be fetched, or its visual is not
    /// TrueColor/DirectColor.
    #[error("the window is not presentable: {0}")]
    NotPresentable(String),

    /// A protocol-level error occurred while talking to the server.
    #[error("protocol error during setup")]
    Protocol(#[from] ReplyOrIdError),

    /// Connecting to the X server failed.
    #[error("connecting to the X server failed")]
    ConnectionFailed(#[from] ConnectError),

    /// An I/O error occurred on the connection.
    #[error("connection error")]
    Connection(#[from] ConnectionError),

    /// Allocating a server or local resource for an image slot failed.
    #[error("failed to allocate image slot resources: {0}")]
    SlotAllocation(String),
}

impl From<ReplyError> for SetupError {
    fn from(err: ReplyError) -> Self {
        SetupError::Protocol(err.into())
    }
}

impl SetupError {
    /// The caller-facing status for a failed swapchain construction is
    /// always the catch-all from §7/§9 — there is no finer signal.
    pub fn as_status(&self) -> Status {
        Status::OutOfHostMemory
    }
}

/// A required extension was absent, or present at too low a version.
#[derive(Debug, thiserror::Error)]
pub enum MissingExtensionError {
    /// The extension was not advertised by the server at all.
    #[error("extension \"{name}\" was not found")]
    NotFound {
        /// Name of the extension, e.g. `"DRI3"`.
        name: &'static str,
    },
    /// The extension was present but below the minimum required version.
    #[error(
        "extension \"{name}\" version {required_major}.{required_minor} is required \
         but only {available_major}.{available_minor} is available"
    )]
    WrongVersion {
        /// Name of the extension.
        name: &'static str,
        /// Minimum required major version.
        required_major: u32,
        /// Minimum required minor version.
        required_minor: u32,
        /// Major version actually advertised.
        available_major: u32,
        /// Minor version actually advertised.
        available_minor: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_latch_reports_success() {
        let latch = StatusLatch::new();
        assert_eq!(latch.current(), Status::Success);
    }

    #[test]
    fn suboptimal_is_sticky_against_success() {
        let latch = StatusLatch::new();
        assert_eq!(latch.merge(Status::Suboptimal), Status::Suboptimal);
        assert_eq!(latch.merge(Status::Success), Status::Suboptimal);
        assert_eq!(latch.current(), Status::Suboptimal);
    }

    #[test]
    fn negative_overwrites_suboptimal() {
        let latch = StatusLatch::new();
        assert_eq!(latch.merge(Status::Suboptimal), Status::Suboptimal);
        assert_eq!(latch.merge(Status::OutOfDate), Status::OutOfDate);
        assert_eq!(latch.current(), Status::OutOfDate);
    }

    #[test]
    fn negative_is_permanent() {
        let latch = StatusLatch::new();
        assert_eq!(latch.merge(Status::SurfaceLost), Status::SurfaceLost);
        assert_eq!(latch.merge(Status::Success), Status::SurfaceLost);
        assert_eq!(latch.merge(Status::Suboptimal), Status::SurfaceLost);
        // A second, different negative does not overwrite the first.
        assert_eq!(latch.merge(Status::OutOfDate), Status::SurfaceLost);
        assert_eq!(latch.current(), Status::SurfaceLost);
    }

    #[test]
    fn transient_results_pass_through_without_latching() {
        let latch = StatusLatch::new();
        assert_eq!(latch.merge(Status::Timeout), Status::Timeout);
        assert_eq!(latch.current(), Status::Success);

        assert_eq!(latch.merge(Status::Suboptimal), Status::Suboptimal);
        assert_eq!(latch.merge(Status::NotReady), Status::NotReady);
        assert_eq!(latch.current(), Status::Suboptimal);
    }

    #[test]
    fn transient_after_negative_reports_new_but_keeps_latch() {
        let latch = StatusLatch::new();
        latch.merge(Status::OutOfDate);
        assert_eq!(latch.merge(Status::Timeout), Status::Timeout);
        assert_eq!(latch.current(), Status::OutOfDate);
    }

    #[test]
    fn success_on_fresh_latch_stays_success() {
        let latch = StatusLatch::new();
        assert_eq!(latch.merge(Status::Success), Status::Success);
        assert_eq!(latch.current(), Status::Success);
    }
}
