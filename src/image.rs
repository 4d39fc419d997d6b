//! C4: image factory.
//!
//! Provisions one ring slot: a GPU image imported as a server pixmap, a
//! damage region, and a cross-process sync fence (spec §4.4), or — on
//! the software path — a plain CPU buffer with an optional MIT-SHM
//! segment.
//!
//! The GPU/allocator boundary is modeled as a pair of traits the same
//! way the teacher models its own external collaborator, the generic
//! `Allocator`/`Swapchain<A, B>` pair it imports buffers through: this
//! crate only consumes that boundary, it does not implement it (no
//! `gbm`/`ash` dependency is pulled in — spec §1 scopes the generic WSI
//! framework out as an external collaborator).

use std::{fmt, os::fd::OwnedFd, sync::atomic::{AtomicU64, Ordering}};

use drm_fourcc::DrmModifier;
use tracing::debug;
use x11rb::{
    connection::Connection,
    protocol::{
        dri3::ConnectionExt as _,
        shm::{self, ConnectionExt as _},
        sync::ConnectionExt as _,
        xfixes::{self, ConnectionExt as _},
        xproto::{ConnectionExt as _, Pixmap, Rectangle, Window},
    },
    rust_connection::RustConnection,
};

use crate::{error::SetupError, utils::fd::{AnonymousMapping, FENCE_MEM_SIZE}};

/// Geometric description of an imported GPU image, exactly what the
/// external image source must hand back (spec §6 "Consumed from the
/// generic WSI framework").
#[derive(Debug)]
pub struct ExternalImage {
    /// DMA-buf file descriptor backing the image.
    pub dma_buf_fd: OwnedFd,
    /// Row pitch of each plane.
    pub row_pitches: [u32; 4],
    /// Byte offset of each plane within the buffer.
    pub offsets: [u32; 4],
    /// Size of each plane in bytes (informational; not consumed by the
    /// X11 import path, which only needs pitches/offsets).
    pub sizes: [u64; 4],
    /// Number of valid planes (1..=4).
    pub num_planes: u32,
    /// DRM format modifier; `DrmModifier::Invalid` means "no modifier",
    /// forcing the single-plane import path.
    pub modifier: DrmModifier,
    /// Present only for the software path: a CPU-mapped pointer to the
    /// image contents.
    pub cpu_map: Option<*mut u8>,
}

/// External collaborator that allocates/frees GPU images. Not
/// implemented in this crate (spec §1, §6).
pub trait ExternalImageSource {
    /// Allocates one image of `(width, height)`.
    fn create_image(&self, width: u32, height: u32) -> Result<ExternalImage, SetupError>;
    /// Releases a previously created image.
    fn destroy_image(&self, image: ExternalImage);
}

/// External collaborator for semaphore-to-memory fence signaling (spec
/// §6 `create_sync_for_memory`). Not implemented in this crate.
pub trait FenceSignal {
    /// Registers `mapping` as the target a GPU-side semaphore signal
    /// should write to when the image is safe to reuse.
    fn create_sync_for_memory(&self, mapping: &AnonymousMapping) -> Result<(), SetupError>;
}

/// A cross-process sync fence: a shared-memory word plus the server's
/// handle onto the same memory (spec §GLOSSARY "Sync fence").
///
/// The server triggers the word when an image becomes idle; this side
/// only polls it, mirroring the small futex-style protocol `xshmfence`
/// implementations of DRI3/Present use, re-expressed here directly on
/// `rustix` rather than pulling in a C library binding.
pub struct ImageFence {
    mapping: AnonymousMapping,
    server_fence: u32,
}

impl fmt::Debug for ImageFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFence")
            .field("server_fence", &self.server_fence)
            .finish()
    }
}

impl ImageFence {
    /// Creates a fence, initially triggered (spec §4.4 step 4: "The
    /// fence is initially triggered (image starts non-busy)").
    pub fn create(connection: &RustConnection, drawable: Window) -> Result<Self, SetupError> {
        let mapping = AnonymousMapping::new("x11-wsi-fence", FENCE_MEM_SIZE)
            .map_err(|e| SetupError::SlotAllocation(format!("failed to create fence shm: {e}")))?;

        let fence_fd = rustix::io::fcntl_dupfd_cloexec(mapping.as_fd(), 3)
            .map_err(|e| SetupError::SlotAllocation(format!("failed to dup fence fd: {e}")))?;

        let xid = connection.generate_id()?;
        connection
            .dri3_fence_from_fd(xid, drawable, true, fence_fd)?
            .check()
            .map_err(|e| SetupError::SlotAllocation(format!("dri3_fence_from_fd failed: {e}")))?;

        let fence = Self {
            mapping,
            server_fence: xid,
        };
        fence.mark_triggered();
        Ok(fence)
    }

    fn word(&self) -> &AtomicU64 {
        // SAFETY: the mapping is `FENCE_MEM_SIZE` (8) bytes, large enough
        // for one `AtomicU64`, and exclusively owned by this fence.
        unsafe { &*self.mapping.as_ptr().cast::<AtomicU64>() }
    }

    fn mark_triggered(&self) {
        self.word().store(1, Ordering::Release);
    }

    /// `true` once the server has signaled the image is idle.
    pub fn is_triggered(&self) -> bool {
        self.word().load(Ordering::Acquire) != 0
    }

    /// Resets the fence before a new present (spec §4.5.5 step 4: "Reset
    /// the slot's fence (server will trigger it on idle)").
    pub fn reset(&self, connection: &RustConnection) -> Result<(), SetupError> {
        self.word().store(0, Ordering::Release);
        connection.sync_reset_fence(self.server_fence)?.check()?;
        Ok(())
    }

    /// Blocks the calling thread until the fence is triggered. Acquire
    /// and the queue manager both await a slot's fence before treating
    /// an image as safe to reuse (spec invariant 6, §4.5.7 step 2).
    pub fn await_triggered(&self) {
        // The server-side trigger is a memory write this thread observes
        // by polling; a short backoff avoids pegging a core while still
        // reacting promptly, matching the coarse granularity other
        // fence-wait call sites in this engine already tolerate (they are
        // themselves bounded by a server round trip).
        while !self.is_triggered() {
            std::thread::yield_now();
        }
    }

    /// The server-side fence object id, used to destroy it.
    pub fn server_id(&self) -> u32 {
        self.server_fence
    }
}

/// An MIT-SHM segment backing the software presentation path when SHM
/// is usable (spec §4.4 "Software path (with MIT-SHM)").
#[derive(Debug)]
pub struct ShmSegment {
    shmid: i32,
    addr: *mut u8,
    len: usize,
    server_seg: u32,
}

// SAFETY: `addr` points at a SysV shared-memory segment this struct
// exclusively manages on the client side; no aliasing mutation happens
// concurrently with the server, which only reads after `put_image`-free
// pixmap creation hands it the segment id.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Allocates a SysV shared-memory segment, attaches it locally, and
    /// registers it with the server under a fresh `shmseg` id.
    ///
    /// Marks the segment for deletion immediately after creation so the
    /// kernel reclaims it once every attachment (ours, and the one the
    /// X server implicitly holds via `shm_attach`) is gone (spec §4.4).
    pub fn create(connection: &RustConnection, len: usize) -> Result<Self, SetupError> {
        // SAFETY: `shmget`/`shmat` are called with well-formed arguments
        // and the returned id/address are checked before use.
        let shmid = unsafe { libc::shmget(libc::IPC_PRIVATE, len, libc::IPC_CREAT | 0o600) };
        if shmid < 0 {
            return Err(SetupError::SlotAllocation("shmget failed".into()));
        }
        // SAFETY: `shmid` was just validated above.
        unsafe {
            libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut());
        }

        // SAFETY: `shmid` is a freshly created segment of `len` bytes.
        let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
        if addr == usize::MAX as *mut libc::c_void {
            return Err(SetupError::SlotAllocation("shmat failed".into()));
        }

        let server_seg = connection.generate_id()?;
        connection
            .shm_attach(server_seg, shmid as u32, false)?
            .check()
            .map_err(|e| SetupError::SlotAllocation(format!("shm_attach failed: {e}")))?;

        Ok(Self {
            shmid,
            addr: addr.cast(),
            len,
            server_seg,
        })
    }

    /// The server-side `shmseg` id, passed to `shm_create_pixmap`.
    pub fn server_seg(&self) -> u32 {
        self.server_seg
    }

    /// Mutable access to the mapped region for CPU rendering.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `addr`/`len` describe exactly the mapping from `create`.
        unsafe { std::slice::from_raw_parts_mut(self.addr, self.len) }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: `addr` is the address returned by this segment's `shmat`.
        unsafe {
            libc::shmdt(self.addr.cast());
        }
        let _ = self.shmid;
    }
}

/// One ring slot (spec §3 "Image slot").
pub struct ImageSlot {
    /// The imported GPU image, `None` on the software-without-SHM path.
    pub image: Option<ExternalImage>,
    /// Server-side pixmap id, `None` on the software-without-SHM path.
    pub pixmap: Option<Pixmap>,
    /// Long-lived XFIXES damage-region id, `None` on the software path
    /// (which has no hardware damage tracking).
    pub damage_region: Option<u32>,
    /// The region currently selected as this slot's update area; `None`
    /// means "present the whole image".
    pub current_damage: Option<u32>,
    /// `true` iff queued, server-held, or held by the application
    /// (invariant 2).
    pub busy: bool,
    /// `true` iff a present for this slot is outstanding server-side
    /// (invariant 3).
    pub present_queued: bool,
    /// The `send_sbc` value assigned at the last present of this slot.
    pub serial: u64,
    /// Cross-process fence, `None` on the software path.
    pub fence: Option<ImageFence>,
    /// MIT-SHM segment, present only on the software+SHM path.
    pub shm: Option<ShmSegment>,
}

impl fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSlot")
            .field("pixmap", &self.pixmap)
            .field("busy", &self.busy)
            .field("present_queued", &self.present_queued)
            .field("serial", &self.serial)
            .finish()
    }
}

impl ImageSlot {
    /// Provisions a hardware-path slot (spec §4.4 "Hardware path").
    pub fn create_hardware(
        connection: &RustConnection,
        window: Window,
        depth: u8,
        width: u32,
        height: u32,
        has_dri3_modifiers: bool,
        source: &dyn ExternalImageSource,
    ) -> Result<Self, SetupError> {
        let image = source.create_image(width, height)?;

        let damage_region = connection.generate_id()?;
        connection.xfixes_create_region(damage_region, &[])?;

        let pixmap = connection.generate_id()?;

        if image.modifier != DrmModifier::Invalid {
            if !has_dri3_modifiers {
                return Err(SetupError::SlotAllocation(
                    "DRM modifier set but connection lacks DRI3/Present modifier support".into(),
                ));
            }
            // XCB closes each fd after sending, so duplicate once per plane.
            let mut fds = Vec::with_capacity(image.num_planes as usize);
            for _ in 0..image.num_planes {
                let fd = rustix::io::fcntl_dupfd_cloexec(&image.dma_buf_fd, 3)
                    .map_err(|e| SetupError::SlotAllocation(format!("failed to dup image fd: {e}")))?;
                fds.push(fd);
            }
            connection.dri3_pixmap_from_buffers(
                pixmap,
                window,
                width as u16,
                height as u16,
                image.row_pitches[0],
                image.offsets[0],
                image.row_pitches[1],
                image.offsets[1],
                image.row_pitches[2],
                image.offsets[2],
                image.row_pitches[3],
                image.offsets[3],
                depth,
                32,
                u64::from(image.modifier),
                fds,
            )?;
        } else {
            if image.num_planes != 1 {
                return Err(SetupError::SlotAllocation(
                    "single-plane pixmap import requires exactly one plane".into(),
                ));
            }
            let fd = rustix::io::fcntl_dupfd_cloexec(&image.dma_buf_fd, 3)
                .map_err(|e| SetupError::SlotAllocation(format!("failed to dup image fd: {e}")))?;
            let stride = image.row_pitches[0];
            connection.dri3_pixmap_from_buffer(
                pixmap,
                window,
                u64::from(height) * u64::from(stride),
                width as u16,
                height as u16,
                stride as u16,
                depth,
                32,
                fd,
            )?;
        }

        let fence = ImageFence::create(connection, window)?;

        debug!(pixmap, "provisioned hardware image slot");

        Ok(Self {
            image: Some(image),
            pixmap: Some(pixmap),
            damage_region: Some(damage_region),
            current_damage: None,
            busy: false,
            present_queued: false,
            serial: 0,
            fence: Some(fence),
            shm: None,
        })
    }

    /// Provisions a software-path slot without MIT-SHM (spec §4.4
    /// "Software path (without MIT-SHM)").
    pub fn create_software_no_shm(source: &dyn ExternalImageSource, width: u32, height: u32) -> Result<Self, SetupError> {
        let image = source.create_image(width, height)?;
        Ok(Self {
            image: Some(image),
            pixmap: None,
            damage_region: None,
            current_damage: None,
            busy: false,
            present_queued: false,
            serial: 0,
            fence: None,
            shm: None,
        })
    }

    /// Provisions a software-path slot backed by MIT-SHM (spec §4.4
    /// "Software path (with MIT-SHM)").
    pub fn create_software_shm(
        connection: &RustConnection,
        window: Window,
        depth: u8,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> Result<Self, SetupError> {
        let len = (width * height * bytes_per_pixel) as usize;
        let shm = ShmSegment::create(connection, len)?;

        let pixmap = connection.generate_id()?;
        connection
            .shm_create_pixmap(
                pixmap,
                window,
                width as u16,
                height as u16,
                depth,
                shm.server_seg(),
                0,
            )?
            .check()
            .map_err(|e| SetupError::SlotAllocation(format!("shm_create_pixmap failed: {e}")))?;

        let fence = ImageFence::create(connection, window)?;

        Ok(Self {
            image: None,
            pixmap: Some(pixmap),
            damage_region: None,
            current_damage: None,
            busy: false,
            present_queued: false,
            serial: 0,
            fence: Some(fence),
            shm: Some(shm),
        })
    }

    /// Sets this slot's damage to exactly `rectangles`, or clears it
    /// back to "whole image" when `rectangles` is empty (spec §4.5.3).
    pub fn set_damage(&mut self, connection: &RustConnection, rectangles: &[Rectangle]) -> Result<(), SetupError> {
        let Some(region) = self.damage_region else {
            return Ok(());
        };
        if rectangles.is_empty() {
            self.current_damage = None;
            return Ok(());
        }
        connection.xfixes_set_region(region, rectangles)?;
        self.current_damage = Some(region);
        Ok(())
    }

    /// Destroys every server/local resource this slot acquired, in the
    /// fixed order spec §4.4 mandates: sync fence, local fence mapping,
    /// pixmap, damage region, GPU image, local SHM. Each step is
    /// independent of the others' success — this is not a rollback list
    /// (which only matters for partially constructed slots), it is the
    /// steady-state teardown order.
    pub fn destroy(mut self, connection: &RustConnection, source: &dyn ExternalImageSource) {
        if let Some(fence) = self.fence.take() {
            let _ = connection.sync_destroy_fence(fence.server_id());
            // `fence.mapping` unmaps itself on drop here.
        }
        if let Some(pixmap) = self.pixmap.take() {
            let _ = connection.free_pixmap(pixmap);
        }
        if let Some(region) = self.damage_region.take() {
            let _ = connection.xfixes_destroy_region(region);
        }
        if let Some(image) = self.image.take() {
            source.destroy_image(image);
        }
        // `self.shm` detaches on drop.
    }
}
