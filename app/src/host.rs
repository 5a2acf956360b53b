use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use starfall_core::{TickHandle, TickHost};

#[derive(Debug, Default)]
struct Slot {
    next: u64,
    pending: Option<TickHandle>,
}

/// Wall-clock host. The run loop polls [`WallClockHost::due`] after sleeping
/// to the frame deadline.
#[derive(Clone)]
pub struct WallClockHost {
    origin: Instant,
    slot: Rc<RefCell<Slot>>,
}

impl WallClockHost {
    pub fn new() -> Self {
        Self { origin: Instant::now(), slot: Rc::default() }
    }

    /// Take the outstanding tick, if any.
    pub fn due(&self) -> Option<TickHandle> {
        self.slot.borrow_mut().pending.take()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

impl TickHost for WallClockHost {
    fn now_ms(&self) -> f64 {
        self.elapsed_ms()
    }

    fn schedule_tick(&mut self) -> TickHandle {
        let mut slot = self.slot.borrow_mut();
        slot.next += 1;
        let h = TickHandle(slot.next);
        slot.pending = Some(h);
        h
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        let mut slot = self.slot.borrow_mut();
        if slot.pending == Some(handle) {
            slot.pending = None;
        }
    }
}
