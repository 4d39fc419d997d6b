//! C5: swapchain core — construction, acquire, present, destroy, and the
//! status/suboptimal latching that ties the application thread and the
//! queue manager thread together (spec §4.5, §4.6).

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use tracing::{debug, debug_span, info, warn};
use x11rb::{
    connection::Connection,
    protocol::xproto::{
        AtomEnum, ConnectionExt as _, CreateGCAux, Gcontext, PropMode, Rectangle, Window,
    },
    rust_connection::RustConnection,
};

use crate::{
    capabilities::ConnectionEntry,
    error::{SetupError, Status, StatusLatch},
    format::PresentMode,
    image::{ExternalImageSource, ImageSlot},
    options::{SwapchainOptions, DEFAULT_MIN_IMAGE_COUNT, FENCE_WAIT_IMAGE_COUNT},
    registry::ConnectionRegistry,
    surface::{query_geometry, Surface},
    utils::{
        queue::{BoundedQueue, SHUTDOWN},
        x11rb::{SpecialEvent, SpecialEventReader},
    },
};

use super::{
    events::{apply_event, ReducerEvent, ReducerState, SlotBookkeeping},
    worker,
};

bitflags::bitflags! {
    /// `present_pixmap`'s `options` bitmask (spec §4.5.5 step 2). The
    /// request itself takes these as a raw `u32`, not this enum, so
    /// every call site converts with `.bits()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PresentOptions: u32 {
        /// No special handling.
        const NONE = 0;
        /// Present without waiting for vblank; tearing allowed.
        const ASYNC = 1;
        /// Force a copy rather than a flip.
        const COPY = 2;
        /// Relative-to-UST timing (unused by this engine).
        const UST = 4;
        /// The server should report suboptimal copies distinctly.
        const SUBOPTIMAL = 8;
    }
}

/// Parameters for [`Swapchain::create`].
pub struct SwapchainCreateInfo<'a> {
    /// The target surface.
    pub surface: &'a Surface,
    /// Requested image count before floors/overrides apply.
    pub image_count_request: u32,
    /// Requested extent; locked for the chain's lifetime.
    pub extent: (u16, u16),
    /// Presentation mode.
    pub mode: PresentMode,
    /// Runtime options (spec §6).
    pub options: SwapchainOptions,
    /// Whether to set `_VARIABLE_REFRESH` on the window.
    pub adaptive_sync: bool,
    /// Use the software (CPU) presentation path.
    pub software: bool,
    /// Bytes per pixel, needed to size the SHM segment on the software
    /// path; unused on the hardware path.
    pub bytes_per_pixel: u32,
    /// The external image allocator this swapchain imports through.
    pub image_source: &'a dyn ExternalImageSource,
}

/// A fixed-size ring of pre-allocated images bridging application
/// rendering and the Present protocol (spec §3 "Swapchain").
pub struct Swapchain {
    pub(super) connection: Arc<RustConnection>,
    pub(super) window: Window,
    gc: Gcontext,
    depth: u8,
    extent: (u16, u16),
    mode: PresentMode,
    software: bool,
    entry: Arc<ConnectionEntry>,
    options: SwapchainOptions,

    pub(super) image_count: u32,
    pub(super) min_image_count: u32,

    pub(super) slots: Mutex<Vec<ImageSlot>>,

    pub(super) status: StatusLatch,
    pub(super) sent_image_count: AtomicU32,
    send_sbc: AtomicU64,
    pub(super) last_present_msc: AtomicU64,
    copy_is_suboptimal: AtomicBool,

    pub(super) has_present_queue: bool,
    pub(super) has_acquire_queue: bool,
    pub(super) present_queue: Option<Arc<BoundedQueue>>,
    pub(super) acquire_queue: Option<Arc<BoundedQueue>>,

    pub(super) events: SpecialEventReader,
    event_id: u32,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("window", &self.window)
            .field("extent", &self.extent)
            .field("mode", &self.mode)
            .field("image_count", &self.image_count)
            .field("status", &self.status.current())
            .finish()
    }
}

impl Swapchain {
    /// Constructs a swapchain (spec §4.5.1).
    pub fn create(
        registry: &ConnectionRegistry,
        info: SwapchainCreateInfo<'_>,
    ) -> Result<Arc<Swapchain>, SetupError> {
        let connection = Arc::clone(info.surface.connection());
        let window = info.surface.window();
        let span = debug_span!("swapchain", window);
        let _enter = span.enter();

        let setup = connection.setup();
        let root = setup.roots.first().map(|s| s.root).unwrap_or(window);
        let entry = registry.get_or_create(&connection, root, info.software)?;

        // Step 1: resolve the actual image count.
        let image_count = resolve_image_count(
            info.image_count_request,
            info.mode,
            &info.options,
            entry.is_xwayland,
        );

        // Step 2: geometry, and an initial suboptimal status if the
        // window doesn't already match the requested extent.
        let geometry = query_geometry(&connection, window)?;
        let mut initial_status = Status::Success;
        if (geometry.width, geometry.height) != info.extent {
            initial_status = Status::Suboptimal;
        }

        // Step 3: register for Present events and stand up the
        // special-event reader thread.
        let event_id = connection.generate_id()?;
        connection.present_select_input(
            event_id,
            window,
            x11rb::protocol::present::EventMask::CONFIGURE_NOTIFY
                | x11rb::protocol::present::EventMask::COMPLETE_NOTIFY
                | x11rb::protocol::present::EventMask::IDLE_NOTIFY,
        )?;
        let wake_atom = connection
            .intern_atom(false, b"_X11_WSI_SHUTDOWN")?
            .reply()?
            .atom;
        let events = SpecialEventReader::spawn(Arc::clone(&connection), window, wake_atom);

        // Step 4: graphics context, exposures suppressed.
        let gc = connection.generate_id()?;
        connection.create_gc(gc, window, &CreateGCAux::new().graphics_exposures(0))?;

        // Step 5: provision every slot, rolling back on failure.
        let mut slots = Vec::with_capacity(image_count as usize);
        for i in 0..image_count {
            let result = if info.software && !entry.mit_shm_available_and_usable {
                ImageSlot::create_software_no_shm(
                    info.image_source,
                    info.extent.0 as u32,
                    info.extent.1 as u32,
                )
            } else if info.software {
                ImageSlot::create_software_shm(
                    &connection,
                    window,
                    geometry.depth,
                    info.extent.0 as u32,
                    info.extent.1 as u32,
                    info.bytes_per_pixel,
                )
            } else {
                ImageSlot::create_hardware(
                    &connection,
                    window,
                    geometry.depth,
                    info.extent.0 as u32,
                    info.extent.1 as u32,
                    entry.has_dri3_modifiers,
                    info.image_source,
                )
            };

            match result {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    warn!(slot = i, error = %err, "slot provisioning failed; rolling back prior slots");
                    for slot in slots {
                        slot.destroy(&connection, info.image_source);
                    }
                    return Err(err);
                }
            }
        }

        // Step 6: queueing structure per the mode/software table.
        let (has_present_queue, has_acquire_queue, spawn_worker) = if info.software {
            (false, false, false)
        } else {
            match info.mode {
                PresentMode::Fifo | PresentMode::FifoRelaxed => (true, true, true),
                PresentMode::Mailbox => (true, false, true),
                PresentMode::Immediate if entry.is_xwayland && info.options.xwayland_wait_ready => {
                    (true, false, true)
                }
                PresentMode::Immediate => (false, false, false),
            }
        };

        let present_queue = has_present_queue.then(|| Arc::new(BoundedQueue::new(image_count as usize + 1)));
        let acquire_queue = has_acquire_queue.then(|| {
            let queue = Arc::new(BoundedQueue::new(image_count as usize + 1));
            queue.fill_sequential(image_count);
            queue
        });

        // Step 7: adaptive sync, written or deleted per spec §6.
        let variable_refresh_atom = connection.intern_atom(false, b"_VARIABLE_REFRESH")?.reply()?.atom;
        if info.adaptive_sync {
            connection.change_property32(
                PropMode::REPLACE,
                window,
                variable_refresh_atom,
                AtomEnum::CARDINAL,
                &[1],
            )?;
        } else {
            connection.delete_property(window, variable_refresh_atom)?;
        }

        connection.flush()?;

        let min_image_count = if info.options.override_min_image_count > 0 {
            info.options.override_min_image_count
        } else {
            DEFAULT_MIN_IMAGE_COUNT
        };

        let swapchain = Arc::new(Swapchain {
            connection,
            window,
            gc,
            depth: geometry.depth,
            extent: info.extent,
            mode: info.mode,
            software: info.software,
            entry,
            options: info.options,
            image_count,
            min_image_count,
            slots: Mutex::new(slots),
            status: {
                let latch = StatusLatch::new();
                latch.merge(initial_status);
                latch
            },
            sent_image_count: AtomicU32::new(0),
            send_sbc: AtomicU64::new(0),
            last_present_msc: AtomicU64::new(0),
            copy_is_suboptimal: AtomicBool::new(false),
            has_present_queue,
            has_acquire_queue,
            present_queue,
            acquire_queue,
            events,
            event_id,
            worker: Mutex::new(None),
        });

        if spawn_worker {
            let handle = std::thread::Builder::new()
                .name("x11-wsi-queue-manager".into())
                .spawn({
                    let swapchain = Arc::clone(&swapchain);
                    move || worker::run(swapchain)
                })
                .expect("failed to spawn queue manager thread");
            *swapchain.worker.lock().unwrap() = Some(handle);
        }

        info!(
            image_count,
            has_present_queue,
            has_acquire_queue,
            mode = ?info.mode,
            "swapchain constructed"
        );

        Ok(swapchain)
    }

    /// Spec §4.5.2 "Acquire operation". On success, carries the index of
    /// the ring slot the caller now owns and must render into (and later
    /// pass to [`Swapchain::present`]) — a latched `Suboptimal` status
    /// still yields an index, matching Vulkan's `VK_SUBOPTIMAL_KHR`
    /// treating the image as usable.
    pub fn acquire(&self, timeout: Option<Duration>) -> Result<usize, Status> {
        let current = self.status.current();
        if current.is_negative() {
            return Err(current);
        }

        if self.software && !self.entry.mit_shm_available_and_usable {
            return self.acquire_software_no_shm();
        }

        if let Some(acquire_queue) = &self.acquire_queue {
            return self.acquire_from_queue(acquire_queue, timeout);
        }

        self.acquire_without_queue(timeout)
    }

    fn acquire_software_no_shm(&self) -> Result<usize, Status> {
        let mut slots = self.slots.lock().unwrap();
        for (idx, slot) in slots.iter_mut().enumerate() {
            if slot.busy {
                continue;
            }
            let geometry = match query_geometry(&self.connection, self.window) {
                Ok(g) => g,
                Err(_) => return Err(self.status.merge(Status::SurfaceLost)),
            };
            slot.busy = true;
            if (geometry.width, geometry.height) != self.extent {
                self.status.merge(Status::Suboptimal);
            } else {
                self.status.merge(Status::Success);
            }
            return Ok(idx);
        }
        Err(Status::NotReady)
    }

    fn acquire_from_queue(&self, acquire_queue: &BoundedQueue, timeout: Option<Duration>) -> Result<usize, Status> {
        let index = match timeout {
            None => acquire_queue.pop_blocking(),
            Some(d) if d.is_zero() => match acquire_queue.try_pop() {
                Some(v) => v,
                None => return Err(Status::NotReady),
            },
            Some(d) => match acquire_queue.pop_timeout(d) {
                Some(v) => v,
                None => return Err(Status::Timeout),
            },
        };
        if index == SHUTDOWN {
            return Err(self.status.merge(Status::OutOfDate));
        }

        let idx = index as usize;
        {
            let mut slots = self.slots.lock().unwrap();
            slots[idx].busy = true;
            if let Some(fence) = &slots[idx].fence {
                fence.await_triggered();
            }
        }

        self.status.merge(Status::Success);
        Ok(idx)
    }

    fn acquire_without_queue(&self, timeout: Option<Duration>) -> Result<usize, Status> {
        let deadline = timeout.map(|d| Instant::now() + d);

        loop {
            let found = {
                let mut slots = self.slots.lock().unwrap();
                slots.iter_mut().position(|s| !s.busy).map(|idx| {
                    slots[idx].busy = true;
                    idx
                })
            };

            if let Some(idx) = found {
                let slots = self.slots.lock().unwrap();
                if let Some(fence) = &slots[idx].fence {
                    fence.await_triggered();
                }
                drop(slots);
                self.status.merge(Status::Success);
                return Ok(idx);
            }

            let _ = self.connection.flush();

            match deadline {
                None => match self.events.recv() {
                    Some(event) => {
                        self.dispatch_event(event);
                    }
                    None => return Err(self.status.merge(Status::SurfaceLost)),
                },
                Some(deadline) => {
                    if timeout == Some(Duration::ZERO) {
                        match self.events.try_recv() {
                            Some(event) => self.dispatch_event(event),
                            None => return Err(Status::NotReady),
                        }
                    } else {
                        let now = Instant::now();
                        if now >= deadline {
                            return Err(Status::Timeout);
                        }
                        match self.events.recv_timeout(deadline - now) {
                            Some(Some(event)) => {
                                self.dispatch_event(event);
                            }
                            Some(None) => return Err(self.status.merge(Status::SurfaceLost)),
                            None => return Err(Status::Timeout),
                        }
                    }
                }
            }
        }
    }

    /// Spec §4.5.3 "Present operation".
    pub fn present(&self, index: usize, damage_rects: &[Rectangle]) -> Status {
        debug_assert!(damage_rects.len() <= 64, "spec bounds damage to <= 64 rectangles");

        let current = self.status.current();
        if current.is_negative() {
            return current;
        }

        {
            let mut slots = self.slots.lock().unwrap();
            if let Err(err) = slots[index].set_damage(&self.connection, damage_rects) {
                warn!(error = %err, "failed to set slot damage region");
            }
            slots[index].busy = true;
        }

        if let Some(present_queue) = &self.present_queue {
            present_queue.push(index as u32);
            self.status.current()
        } else {
            let status = if self.has_pixmap(index) {
                self.present_primitive(index, 0)
            } else {
                self.present_primitive_software(index)
            };
            self.status.merge(status)
        }
    }

    fn has_pixmap(&self, index: usize) -> bool {
        self.slots.lock().unwrap()[index].pixmap.is_some()
    }

    /// Spec §4.5.5 "Present primitive (hardware path)"; also used for
    /// the software+SHM path, which presents through a real server
    /// pixmap the same way.
    pub(super) fn present_primitive(&self, index: usize, target_msc: u64) -> Status {
        let mut options = PresentOptions::NONE;
        if self.mode == PresentMode::Immediate
            || self.mode == PresentMode::FifoRelaxed
            || (self.mode == PresentMode::Mailbox && self.entry.is_xwayland)
        {
            options |= PresentOptions::ASYNC;
        }
        if self.entry.has_dri3_modifiers {
            options |= PresentOptions::SUBOPTIMAL;
        }

        self.drain_pending_events();

        let (pixmap, idle_fence, update_area, serial) = {
            let mut slots = self.slots.lock().unwrap();
            let slot = &mut slots[index];
            if let Some(fence) = &slot.fence {
                if let Err(err) = fence.reset(&self.connection) {
                    warn!(error = %err, "failed to reset slot fence before present");
                    return Status::SurfaceLost;
                }
            }

            self.sent_image_count.fetch_add(1, Ordering::AcqRel);
            let serial = self.send_sbc.fetch_add(1, Ordering::AcqRel) + 1;
            slot.present_queued = true;
            slot.serial = serial;

            let pixmap = slot.pixmap.expect("hardware present requires a server pixmap");
            let idle_fence = slot.fence.as_ref().map(|f| f.server_id()).unwrap_or(0);
            (pixmap, idle_fence, slot.current_damage.unwrap_or(0), serial)
        };

        let result = self.connection.present_pixmap(
            self.window,
            pixmap,
            serial as u32,
            0,
            update_area,
            0,
            0,
            0,
            0,
            idle_fence,
            options.bits(),
            target_msc,
            0,
            0,
            &[],
        );

        match result {
            Err(err) => {
                warn!(error = %err, "present_pixmap request failed");
                Status::SurfaceLost
            }
            Ok(cookie) => match cookie.check() {
                Ok(()) => Status::Success,
                Err(err) => {
                    warn!(error = %err, "present_pixmap failed");
                    Status::SurfaceLost
                }
            },
        }
    }

    /// Spec §4.5.6 "Present primitive (software path)".
    pub(super) fn present_primitive_software(&self, index: usize) -> Status {
        use x11rb::protocol::xproto::ImageFormat;

        let max_request_bytes = self.connection.maximum_request_bytes();
        let (width, height) = self.extent;
        let bytes_per_row = width as usize * 4;

        let data: Vec<u8> = {
            let mut slots = self.slots.lock().unwrap();
            let slot = &mut slots[index];
            let Some(image) = &slot.image else {
                return Status::SurfaceLost;
            };
            let Some(cpu_map) = image.cpu_map else {
                return Status::SurfaceLost;
            };
            // SAFETY: `cpu_map` points at a mapping sized for this
            // image's extent, owned by the external image source for
            // as long as the slot lives.
            unsafe { std::slice::from_raw_parts(cpu_map, bytes_per_row * height as usize) }.to_vec()
        };

        let rows_per_band = ((max_request_bytes.saturating_sub(256)) / bytes_per_row.max(1)).max(1);
        let mut y = 0u16;
        while (y as usize) < height as usize {
            let band_rows = (rows_per_band as u16).min(height - y);
            let start = y as usize * bytes_per_row;
            let end = start + band_rows as usize * bytes_per_row;

            if let Err(err) = self.connection.put_image(
                ImageFormat::Z_PIXMAP,
                self.window,
                self.gc,
                width,
                band_rows,
                0,
                y as i16,
                0,
                self.depth,
                &data[start..end],
            ) {
                warn!(error = %err, "put_image failed");
                return Status::SurfaceLost;
            }
            y += band_rows;
        }

        {
            let mut slots = self.slots.lock().unwrap();
            slots[index].busy = false;
        }
        let _ = self.connection.flush();
        Status::Success
    }

    fn drain_pending_events(&self) {
        while let Some(event) = self.events.try_recv() {
            self.dispatch_event(event);
        }
    }

    /// Spec §4.5.4 "Event handling", wired onto the real connection and
    /// slot storage via the pure reducer in [`super::events`].
    pub(super) fn dispatch_event(&self, event: SpecialEvent) -> Status {
        let reducer_event = match event {
            SpecialEvent::Configure { width, height } => ReducerEvent::Configure { width, height },
            SpecialEvent::Idle { pixmap } => ReducerEvent::Idle { pixmap },
            SpecialEvent::Complete { serial, msc, mode } => ReducerEvent::Complete { serial, msc, mode },
        };

        let mut slots = self.slots.lock().unwrap();
        let mut bookkeeping: Vec<SlotBookkeeping> = slots
            .iter()
            .map(|s| SlotBookkeeping {
                pixmap: s.pixmap.unwrap_or(0),
                busy: s.busy,
                present_queued: s.present_queued,
                serial: s.serial,
            })
            .collect();

        let mut state = ReducerState {
            slots: &mut bookkeeping,
            locked_extent: self.extent,
            sent_image_count: self.sent_image_count.load(Ordering::Acquire),
            last_present_msc: self.last_present_msc.load(Ordering::Acquire),
            copy_is_suboptimal: self.copy_is_suboptimal.load(Ordering::Acquire),
        };

        let outcome = apply_event(&mut state, reducer_event);

        for (slot, updated) in slots.iter_mut().zip(bookkeeping.iter()) {
            slot.busy = updated.busy;
            slot.present_queued = updated.present_queued;
        }
        self.sent_image_count.store(state.sent_image_count, Ordering::Release);
        self.last_present_msc.store(state.last_present_msc, Ordering::Release);
        self.copy_is_suboptimal.store(state.copy_is_suboptimal, Ordering::Release);

        if let Some(idx) = outcome.became_idle {
            if let Some(acquire_queue) = &self.acquire_queue {
                acquire_queue.push(idx as u32);
            }
        }

        self.status.merge(outcome.status)
    }

    pub(super) fn fence_wait_policy_applies(&self) -> bool {
        fence_wait_policy_applies(self.mode, &self.options, self.entry.is_xwayland)
    }

    pub(super) fn await_slot_fence(&self, index: usize) {
        let slots = self.slots.lock().unwrap();
        if let Some(fence) = &slots[index].fence {
            fence.await_triggered();
        }
    }

    /// The currently latched status, without merging a new result.
    pub fn status(&self) -> Status {
        self.status.current()
    }

    /// Spec §4.5.8 "Destroy".
    pub fn destroy(self: Arc<Self>, image_source: &dyn ExternalImageSource) {
        if self.has_present_queue {
            self.status.merge(Status::OutOfDate);
            if let Some(present_queue) = &self.present_queue {
                present_queue.push(SHUTDOWN);
            }
            if let Some(handle) = self.worker.lock().unwrap().take() {
                let _ = handle.join();
            }
        }
        // `acquire_queue`/`present_queue` are dropped with the struct.

        let mut slots = self.slots.lock().unwrap();
        for slot in std::mem::take(&mut *slots) {
            slot.destroy(&self.connection, image_source);
        }
        drop(slots);

        let _ = self.connection.present_select_input(
            self.event_id,
            self.window,
            x11rb::protocol::present::EventMask::from(0u32),
        );
        debug!("swapchain destroyed");
    }
}

fn resolve_image_count(
    requested: u32,
    mode: PresentMode,
    options: &SwapchainOptions,
    is_xwayland: bool,
) -> u32 {
    if options.strict_image_count {
        return requested;
    }
    if fence_wait_policy_applies(mode, options, is_xwayland) {
        return requested.max(FENCE_WAIT_IMAGE_COUNT);
    }
    if options.ensure_min_image_count {
        let floor = if options.override_min_image_count > 0 {
            options.override_min_image_count
        } else {
            DEFAULT_MIN_IMAGE_COUNT
        };
        return requested.max(floor);
    }
    requested
}

/// Spec §4.5.7 step 2: mailbox always waits on the GPU fence before
/// presenting; immediate only does on XWayland with the wait-ready
/// option set. This same predicate governs the image-count floor in
/// `resolve_image_count` (spec §4.5.1 step 1).
fn fence_wait_policy_applies(mode: PresentMode, options: &SwapchainOptions, is_xwayland: bool) -> bool {
    match mode {
        PresentMode::Mailbox => true,
        PresentMode::Immediate => is_xwayland && options.xwayland_wait_ready,
        PresentMode::Fifo | PresentMode::FifoRelaxed => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_image_count_bypasses_every_floor() {
        let options = SwapchainOptions {
            strict_image_count: true,
            ensure_min_image_count: true,
            ..Default::default()
        };
        assert_eq!(resolve_image_count(2, PresentMode::Mailbox, &options, false), 2);
    }

    #[test]
    fn mailbox_forces_the_fence_wait_floor() {
        let options = SwapchainOptions::default();
        assert_eq!(
            resolve_image_count(2, PresentMode::Mailbox, &options, false),
            FENCE_WAIT_IMAGE_COUNT
        );
    }

    #[test]
    fn immediate_only_forces_the_floor_on_xwayland_with_wait_ready() {
        let options = SwapchainOptions::default();
        assert_eq!(resolve_image_count(2, PresentMode::Immediate, &options, false), 2);
        assert_eq!(
            resolve_image_count(2, PresentMode::Immediate, &options, true),
            FENCE_WAIT_IMAGE_COUNT
        );
    }

    #[test]
    fn immediate_on_xwayland_without_wait_ready_does_not_force_the_floor() {
        let options = SwapchainOptions {
            xwayland_wait_ready: false,
            ..Default::default()
        };
        assert_eq!(resolve_image_count(2, PresentMode::Immediate, &options, true), 2);
    }

    #[test]
    fn ensure_min_image_count_raises_to_the_default_floor() {
        let options = SwapchainOptions {
            ensure_min_image_count: true,
            ..Default::default()
        };
        assert_eq!(resolve_image_count(1, PresentMode::Fifo, &options, false), DEFAULT_MIN_IMAGE_COUNT);
        assert_eq!(resolve_image_count(8, PresentMode::Fifo, &options, false), 8);
    }

    #[test]
    fn ensure_min_image_count_respects_an_explicit_override() {
        let options = SwapchainOptions {
            ensure_min_image_count: true,
            override_min_image_count: 6,
            ..Default::default()
        };
        assert_eq!(resolve_image_count(1, PresentMode::Fifo, &options, false), 6);
    }

    #[test]
    fn fence_wait_policy_table() {
        let default_options = SwapchainOptions::default();
        assert!(fence_wait_policy_applies(PresentMode::Mailbox, &default_options, false));
        assert!(fence_wait_policy_applies(PresentMode::Mailbox, &default_options, true));
        assert!(!fence_wait_policy_applies(PresentMode::Immediate, &default_options, false));
        assert!(fence_wait_policy_applies(PresentMode::Immediate, &default_options, true));
        assert!(!fence_wait_policy_applies(PresentMode::Fifo, &default_options, true));
        assert!(!fence_wait_policy_applies(PresentMode::FifoRelaxed, &default_options, true));
    }

    #[test]
    fn present_options_bits_round_trip() {
        let bits = (PresentOptions::ASYNC | PresentOptions::SUBOPTIMAL).bits();
        assert_eq!(PresentOptions::from_bits_truncate(bits), PresentOptions::ASYNC | PresentOptions::SUBOPTIMAL);
    }
}
