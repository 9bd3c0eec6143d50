// Present-loop bookkeeping
//
// Everything the frame loop decides without touching a Vulkan handle lives
// here: the monotonic frame counter, the swapchain version, the
// pending-recreate flag, and which frame slot last used each swapchain
// image. The rendering context consults this ledger and does the actual
// waiting/destroying.

/// How many frames may be in flight at once. Sync slots are cycled by the
/// frame counter modulo this, independent of the swapchain's image count.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// What a tick is allowed to do, decided before any GPU work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickGate {
    /// Framebuffer is zero-sized (minimized); skip the tick entirely.
    SkipZeroSized,
    /// A swapchain rebuild must run before this tick can render.
    RecreateFirst,
    /// Proceed straight to acquire/record/submit/present.
    Render,
}

pub struct FrameLedger {
    frames: u64,
    version: u64,
    pending_recreate: bool,
    extent: (u32, u32),
    /// Which sync slot last claimed each swapchain image.
    image_owners: Vec<Option<usize>>,
}

impl FrameLedger {
    pub fn new(width: u32, height: u32, image_count: usize) -> Self {
        Self {
            frames: 0,
            version: 1,
            pending_recreate: false,
            extent: (width, height),
            image_owners: vec![None; image_count],
        }
    }

    /// Gate a tick on the current framebuffer size. A size change marks a
    /// pending recreate; the flag survives until a rebuild completes.
    pub fn begin_tick(&mut self, width: u32, height: u32) -> TickGate {
        if width == 0 || height == 0 {
            return TickGate::SkipZeroSized;
        }
        if (width, height) != self.extent {
            self.pending_recreate = true;
        }
        if self.pending_recreate {
            TickGate::RecreateFirst
        } else {
            TickGate::Render
        }
    }

    pub fn request_recreate(&mut self) {
        self.pending_recreate = true;
    }

    pub fn recreate_pending(&self) -> bool {
        self.pending_recreate
    }

    /// Record a completed rebuild. The version strictly increases; image
    /// associations reset because the images themselves are new.
    pub fn swapchain_rebuilt(&mut self, width: u32, height: u32, image_count: usize) {
        self.extent = (width, height);
        self.version += 1;
        self.pending_recreate = false;
        self.image_owners = vec![None; image_count];
    }

    /// Sync slot for the frame about to be drawn.
    pub fn slot(&self) -> usize {
        (self.frames % FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Hand `image_index` to the current slot. Returns the slot that last
    /// used the image if it was a different one; the caller must wait on
    /// that slot's fence before reusing the image's command buffer.
    pub fn claim_image(&mut self, image_index: usize) -> Option<usize> {
        let current = self.slot();
        let prior = self.image_owners[image_index].filter(|&s| s != current);
        self.image_owners[image_index] = Some(current);
        prior
    }

    /// Completed frames only; skipped ticks never advance this.
    pub fn advance_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn swapchain_version(&self) -> u64 {
        self.version
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_1280x720() -> FrameLedger {
        FrameLedger::new(1280, 720, 3)
    }

    #[test]
    fn steady_frames_advance_counter_without_rebuild() {
        let mut ledger = ledger_1280x720();
        for _ in 0..3 {
            assert_eq!(ledger.begin_tick(1280, 720), TickGate::Render);
            ledger.advance_frame();
        }
        assert_eq!(ledger.frames(), 3);
        assert_eq!(ledger.swapchain_version(), 1);
    }

    #[test]
    fn slots_cycle_modulo_frames_in_flight() {
        let mut ledger = ledger_1280x720();
        assert_eq!(ledger.slot(), 0);
        ledger.advance_frame();
        assert_eq!(ledger.slot(), 1);
        ledger.advance_frame();
        assert_eq!(ledger.slot(), 0);
    }

    #[test]
    fn resize_triggers_exactly_one_rebuild() {
        let mut ledger = ledger_1280x720();
        assert_eq!(ledger.begin_tick(1280, 720), TickGate::Render);
        ledger.advance_frame();

        // Window shrank; the next tick must rebuild before rendering
        assert_eq!(ledger.begin_tick(640, 480), TickGate::RecreateFirst);
        ledger.swapchain_rebuilt(640, 480, 3);
        ledger.advance_frame();

        assert_eq!(ledger.swapchain_version(), 2);
        assert_eq!(ledger.extent(), (640, 480));
        assert_eq!(ledger.begin_tick(640, 480), TickGate::Render);
    }

    #[test]
    fn version_strictly_increases_per_rebuild() {
        let mut ledger = ledger_1280x720();
        for i in 0..4u64 {
            ledger.request_recreate();
            ledger.swapchain_rebuilt(1280, 720, 3);
            assert_eq!(ledger.swapchain_version(), 2 + i);
        }
    }

    #[test]
    fn zero_size_skips_without_advancing() {
        let mut ledger = ledger_1280x720();
        assert_eq!(ledger.begin_tick(0, 0), TickGate::SkipZeroSized);
        assert_eq!(ledger.begin_tick(0, 720), TickGate::SkipZeroSized);
        assert_eq!(ledger.frames(), 0);
        assert_eq!(ledger.swapchain_version(), 1);

        // Restored at a new size: exactly one rebuild, then rendering
        assert_eq!(ledger.begin_tick(800, 600), TickGate::RecreateFirst);
        ledger.swapchain_rebuilt(800, 600, 3);
        assert_eq!(ledger.swapchain_version(), 2);
        assert_eq!(ledger.begin_tick(800, 600), TickGate::Render);
    }

    #[test]
    fn out_of_date_acquire_defers_the_frame() {
        let mut ledger = ledger_1280x720();
        for _ in 0..5 {
            assert_eq!(ledger.begin_tick(1280, 720), TickGate::Render);
            ledger.advance_frame();
        }

        // Frame 5's acquire reports out-of-date: no counter advance
        assert_eq!(ledger.begin_tick(1280, 720), TickGate::Render);
        ledger.request_recreate();
        assert_eq!(ledger.frames(), 5);

        // The next call rebuilds first, then frame 5 happens for real
        assert_eq!(ledger.begin_tick(1280, 720), TickGate::RecreateFirst);
        ledger.swapchain_rebuilt(1280, 720, 3);
        ledger.advance_frame();
        assert_eq!(ledger.frames(), 6);
        assert_eq!(ledger.swapchain_version(), 2);
    }

    #[test]
    fn claiming_an_image_reports_the_prior_owner_once() {
        let mut ledger = ledger_1280x720();

        // Frame 0 (slot 0) takes image 2: never used before, no wait
        assert_eq!(ledger.claim_image(2), None);
        ledger.advance_frame();

        // Frame 1 (slot 1) gets the same image back: slot 0 may still be
        // presenting it
        assert_eq!(ledger.claim_image(2), Some(0));
        ledger.advance_frame();

        // Frame 2 (slot 0) acquires a different image
        assert_eq!(ledger.claim_image(0), None);
    }

    #[test]
    fn reclaiming_from_the_same_slot_needs_no_wait() {
        let mut ledger = ledger_1280x720();
        assert_eq!(ledger.claim_image(1), None);
        // Same slot, same image (no advance in between): own fence was
        // already awaited this tick
        assert_eq!(ledger.claim_image(1), None);
    }

    #[test]
    fn rebuild_clears_image_associations() {
        let mut ledger = ledger_1280x720();
        ledger.claim_image(0);
        ledger.advance_frame();

        ledger.request_recreate();
        ledger.swapchain_rebuilt(1280, 720, 2);

        // New chain, new images: no stale ownership
        assert_eq!(ledger.claim_image(0), None);
    }
}
