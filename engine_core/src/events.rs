//! Typed notifications published by the engine.
//!
//! Collaborators (UI, score keeping, storage) either register a callback or
//! take a channel receiver and poll it at their own pace.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::state::GameState;
use crate::telemetry::Metrics;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged {
        old: GameState,
        new: GameState,
        timestamp_ms: f64,
    },
    PerformanceWarning {
        average_fps: f64,
        target_fps: f64,
        timestamp_ms: f64,
    },
    /// A recovered failure: a system hook, or a tick that was counted by the error guard.
    Error {
        source: String,
        message: String,
        timestamp_ms: f64,
    },
    EmergencyStop {
        errors: u32,
        last_error: Option<String>,
        timestamp_ms: f64,
    },
    FrameRendered {
        frame: u64,
        delta_ms: f64,
        metrics: Metrics,
    },
    Resize {
        viewport: Viewport,
    },
}

impl EngineEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "state-changed",
            EngineEvent::PerformanceWarning { .. } => "performance-warning",
            EngineEvent::Error { .. } => "error",
            EngineEvent::EmergencyStop { .. } => "emergency-stop",
            EngineEvent::FrameRendered { .. } => "frame-rendered",
            EngineEvent::Resize { .. } => "resize",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// Single-threaded pub/sub hub. Listeners run synchronously in subscription order.
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    channels: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            listeners: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, f: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(f)));
        id
    }

    /// Returns whether `id` was subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Receiver that gets a clone of every event from now on. Dropping it
    /// unsubscribes on the next emit.
    pub fn channel(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.channels.push(tx);
        rx
    }

    pub fn emit(&mut self, event: EngineEvent) {
        for (_, f) in self.listeners.iter_mut() {
            f(&event);
        }
        self.channels.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len() + self.channels.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.channels.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
