use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::log::Logger;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GameState {
    Initializing,
    Menu,
    Playing,
    Paused,
    GameOver,
    Loading,
    Error,
}

impl GameState {
    pub const ALL: [GameState; 7] = [
        GameState::Initializing,
        GameState::Menu,
        GameState::Playing,
        GameState::Paused,
        GameState::GameOver,
        GameState::Loading,
        GameState::Error,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            GameState::Initializing => "initializing",
            GameState::Menu => "menu",
            GameState::Playing => "playing",
            GameState::Paused => "paused",
            GameState::GameOver => "gameOver",
            GameState::Loading => "loading",
            GameState::Error => "error",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameState::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::InvalidState(format!("unknown state '{s}'")))
    }
}

/// A completed transition, published as a state-changed notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateChange {
    pub old: GameState,
    pub new: GameState,
    pub timestamp_ms: f64,
}

pub struct StateMachine {
    log: Logger,
    current: GameState,
    previous: Option<GameState>,
    /// State to return to on resume.
    paused_from: Option<GameState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            log: Logger::new("State"),
            current: GameState::Initializing,
            previous: None,
            paused_from: None,
        }
    }

    #[inline]
    pub fn current(&self) -> GameState {
        self.current
    }

    #[inline]
    pub fn previous(&self) -> Option<GameState> {
        self.previous
    }

    #[inline]
    pub fn is(&self, state: GameState) -> bool {
        self.current == state
    }

    pub fn change_state(&mut self, next: GameState, now_ms: f64) -> StateChange {
        let old = self.current;
        self.previous = Some(old);
        self.current = next;
        self.log.info(format!("{old} -> {next}"));
        StateChange { old, new: next, timestamp_ms: now_ms }
    }

    /// Transition by name. Unknown names fail before anything changes.
    pub fn change_state_named(&mut self, next: &str, now_ms: f64) -> EngineResult<StateChange> {
        let next: GameState = next.parse()?;
        Ok(self.change_state(next, now_ms))
    }

    /// Enter `Paused`, remembering where we came from. `None` if already paused.
    pub fn pause(&mut self, now_ms: f64) -> Option<StateChange> {
        if self.current == GameState::Paused {
            return None;
        }
        self.paused_from = Some(self.current);
        Some(self.change_state(GameState::Paused, now_ms))
    }

    /// Leave `Paused` for the saved state, or `Playing` if none was saved.
    /// `None` if not paused.
    pub fn resume(&mut self, now_ms: f64) -> Option<StateChange> {
        if self.current != GameState::Paused {
            return None;
        }
        let back = self.paused_from.take().unwrap_or(GameState::Playing);
        Some(self.change_state(back, now_ms))
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
