//! Single-threaded 2D arcade game engine core.
//!
//! The host owns the clock and the "next frame" primitive ([`TickHost`]) and
//! the drawing backend ([`DrawSurface`]); the [`Engine`] ties a frame loop,
//! game state, pluggable systems and a batched draw pipeline together.

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod log;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod signals;
pub mod starfield;
pub mod state;
pub mod surface;
pub mod telemetry;
pub mod time;
pub mod viewport;

pub use crate::config::{ContextType, EngineConfig, ScalingMode};
pub use crate::engine::Engine;
pub use crate::error::{EngineError, EngineResult, SurfaceError};
pub use crate::events::{EngineEvent, EventBus, SubscriptionId};
pub use crate::registry::System;
pub use crate::render::RenderPipeline;
pub use crate::scheduler::{ManualTickHost, TickHandle, TickHost};
pub use crate::state::GameState;
pub use crate::surface::{Color, DrawSurface, RecordingSurface, Rect, TextStyle};
pub use crate::telemetry::Metrics;
pub use crate::viewport::{ContainerBounds, Viewport};
