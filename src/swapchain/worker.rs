//! C6: queue manager thread.
//!
//! Drains `present_queue` and paces fifo-mode presentation (spec
//! §4.5.7). Only spawned when `has_present_queue` is set (fifo,
//! mailbox, and immediate-on-XWayland-with-wait-ready).

use std::sync::Arc;

use tracing::{error, warn};

use crate::{error::Status, utils::queue::SHUTDOWN};

use super::core::Swapchain;

/// Runs until a shutdown sentinel is popped or a fatal error occurs.
pub fn run(swapchain: Arc<Swapchain>) {
    loop {
        let present_queue = swapchain
            .present_queue
            .as_ref()
            .expect("worker running without a present queue");
        let index = present_queue.pop_blocking();
        if index == SHUTDOWN {
            return;
        }
        let index = index as usize;

        if swapchain.fence_wait_policy_applies() {
            // The fence is a memory poll in this implementation (see
            // `ImageFence::await_triggered`), so there is no distinct
            // "wait failed" branch to synthesize `OutOfDate` from; a
            // real GPU-fence backend would plug a fallible wait in here.
            swapchain.await_slot_fence(index);
        }

        let target_msc = if swapchain.has_acquire_queue {
            swapchain.last_present_msc.load(std::sync::atomic::Ordering::Acquire) + 1
        } else {
            0
        };

        let status = swapchain.present_primitive(index, target_msc);
        if status.is_negative() {
            error!(?status, "queue manager thread exiting after a fatal present error");
            swapchain.status.merge(status);
            wake_acquire_waiters(&swapchain);
            return;
        }

        if swapchain.has_acquire_queue {
            if let Err(status) = wait_for_forward_progress(&swapchain, index) {
                error!(?status, "queue manager thread exiting: forward-progress wait failed");
                swapchain.status.merge(status);
                wake_acquire_waiters(&swapchain);
                return;
            }
        }
    }
}

/// Blocks until both (a) the presented slot's `present_queued` clears,
/// and (b) the server holds at least `image_count - min_image_count + 1`
/// images — the forward-progress threshold the acquire API contract
/// requires (spec §4.5.7 step 5).
fn wait_for_forward_progress(swapchain: &Arc<Swapchain>, presented_index: usize) -> Result<(), Status> {
    loop {
        let present_queued = {
            let slots = swapchain.slots.lock().unwrap();
            slots[presented_index].present_queued
        };
        let threshold = swapchain
            .image_count
            .saturating_sub(swapchain.min_image_count)
            + 1;
        let enough_in_flight =
            swapchain.sent_image_count.load(std::sync::atomic::Ordering::Acquire) >= threshold;

        if !present_queued && enough_in_flight {
            return Ok(());
        }

        match swapchain.events.recv() {
            Some(event) => {
                swapchain.dispatch_event(event);
            }
            None => {
                warn!("special-event channel closed while awaiting forward progress");
                return Err(Status::SurfaceLost);
            }
        }
    }
}

fn wake_acquire_waiters(swapchain: &Arc<Swapchain>) {
    if let Some(acquire_queue) = &swapchain.acquire_queue {
        acquire_queue.push(SHUTDOWN);
    }
}
