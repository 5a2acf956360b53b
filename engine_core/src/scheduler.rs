use std::cell::RefCell;
use std::rc::Rc;

/// Identifies one scheduled tick; used to cancel it or to match the host's callback.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TickHandle(pub u64);

/// The host's "next frame" primitive.
///
/// The host calls [`crate::Engine::tick`] with the handle once the frame is due.
/// A cancelled handle must never be delivered.
pub trait TickHost {
    /// Monotonic timestamp in milliseconds.
    fn now_ms(&self) -> f64;

    fn schedule_tick(&mut self) -> TickHandle;

    fn cancel_tick(&mut self, handle: TickHandle);

    /// Process memory in bytes, if the host can report it.
    fn memory_usage(&self) -> Option<u64> {
        None
    }
}

/// Не больше одного запланированного тика. Единственная точка истины: кто/когда тикает.
pub struct FrameScheduler {
    host: Box<dyn TickHost>,
    pending: Option<TickHandle>,
}

impl FrameScheduler {
    pub fn new(host: Box<dyn TickHost>) -> Self {
        Self { host, pending: None }
    }

    #[inline]
    pub fn now_ms(&self) -> f64 {
        self.host.now_ms()
    }

    #[inline]
    pub fn memory_usage(&self) -> Option<u64> {
        self.host.memory_usage()
    }

    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn pending(&self) -> Option<TickHandle> {
        self.pending
    }

    /// Запланировать следующий тик, если ещё нет.
    pub fn schedule_next(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.host.schedule_tick());
        }
    }

    /// Отменить тик. После возврата ни один тик не висит.
    pub fn cancel(&mut self) {
        if let Some(h) = self.pending.take() {
            self.host.cancel_tick(h);
        }
    }

    /// Принять `handle`, если он текущий. Устаревшие отбрасываются.
    pub fn accept(&mut self, handle: TickHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now_ms: f64,
    next: u64,
    pending: Option<TickHandle>,
    scheduled: u64,
    cancelled: u64,
    memory: Option<u64>,
}

/// Host driven by hand: the caller moves the clock and fires ticks.
///
/// Cloning shares the same state, so a test keeps one clone while the engine
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct ManualTickHost {
    state: Rc<RefCell<ManualState>>,
}

impl ManualTickHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&self, now_ms: f64) {
        self.state.borrow_mut().now_ms = now_ms;
    }

    pub fn advance(&self, ms: f64) {
        self.state.borrow_mut().now_ms += ms;
    }

    pub fn now(&self) -> f64 {
        self.state.borrow().now_ms
    }

    pub fn set_memory(&self, bytes: Option<u64>) {
        self.state.borrow_mut().memory = bytes;
    }

    /// The outstanding tick, without firing it.
    pub fn pending(&self) -> Option<TickHandle> {
        self.state.borrow().pending
    }

    /// Fire: hand out the outstanding tick and forget it.
    pub fn take_pending(&self) -> Option<TickHandle> {
        self.state.borrow_mut().pending.take()
    }

    pub fn scheduled_count(&self) -> u64 {
        self.state.borrow().scheduled
    }

    pub fn cancelled_count(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl TickHost for ManualTickHost {
    fn now_ms(&self) -> f64 {
        self.state.borrow().now_ms
    }

    fn schedule_tick(&mut self) -> TickHandle {
        let mut s = self.state.borrow_mut();
        s.next += 1;
        s.scheduled += 1;
        let h = TickHandle(s.next);
        s.pending = Some(h);
        h
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        let mut s = self.state.borrow_mut();
        if s.pending == Some(handle) {
            s.pending = None;
        }
        s.cancelled += 1;
    }

    fn memory_usage(&self) -> Option<u64> {
        self.state.borrow().memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_pending_tick() {
        let host = ManualTickHost::new();
        let mut s = FrameScheduler::new(Box::new(host.clone()));
        s.schedule_next();
        s.schedule_next();
        assert_eq!(host.scheduled_count(), 1);
        assert!(s.is_scheduled());
    }

    #[test]
    fn cancel_clears_host_side() {
        let host = ManualTickHost::new();
        let mut s = FrameScheduler::new(Box::new(host.clone()));
        s.schedule_next();
        s.cancel();
        assert!(!s.is_scheduled());
        assert_eq!(host.pending(), None);
        assert_eq!(host.cancelled_count(), 1);

        // Нечего отменять.
        s.cancel();
        assert_eq!(host.cancelled_count(), 1);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let host = ManualTickHost::new();
        let mut s = FrameScheduler::new(Box::new(host.clone()));
        s.schedule_next();
        let first = host.take_pending().unwrap();
        assert!(s.accept(first));
        assert!(!s.accept(first));

        s.schedule_next();
        assert!(!s.accept(first));
        assert!(s.is_scheduled());
    }

    #[test]
    fn clock_is_shared() {
        let host = ManualTickHost::new();
        let s = FrameScheduler::new(Box::new(host.clone()));
        host.set_now(100.0);
        host.advance(16.0);
        assert_eq!(s.now_ms(), 116.0);
        host.set_memory(Some(42));
        assert_eq!(s.memory_usage(), Some(42));
    }
}
