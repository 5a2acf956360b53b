use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::log::Logger;

/// Cross-thread stop request, set from a signal handler and polled by the host loop.
#[derive(Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    /// Route Ctrl-C to this signal. Only one handler per process.
    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let requested = self.requested.clone();
        ctrlc::set_handler(move || {
            Logger::new("Signals").info("interrupt received, stopping");
            requested.store(true, Ordering::Relaxed);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = StopSignal::new();
        let b = a.clone();
        assert!(!b.is_requested());
        a.request();
        assert!(b.is_requested());
    }
}
