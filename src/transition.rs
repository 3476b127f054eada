//! Slide navigation state machine.
//!
//! `Idle` is both the initial state and where every transition ends. Accepting a
//! request moves to `Transitioning` and updates the current index at once; the
//! playback side effects happen only when the transition completes. Requests that
//! arrive mid-transition are dropped, not queued.

use crate::config::AppConfig;
use crate::model::{MediaKind, SlideIndex};
use crate::resolver::MediaLibrary;
use crate::stage::{Direction, Stage};
use log::{debug, info, trace};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Transitioning,
}

/// Why a navigation request changed nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavRejection {
    OutOfRange(u32),
    AlreadyCurrent,
    InFlight,
}

impl fmt::Display for NavRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavRejection::OutOfRange(i) => write!(f, "slide {} is out of range", i),
            NavRejection::AlreadyCurrent => write!(f, "already on that slide"),
            NavRejection::InFlight => write!(f, "a transition is in progress"),
        }
    }
}

/// Proof of an accepted transition, redeemed by `complete`.
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionTicket {
    pub from: SlideIndex,
    pub to: SlideIndex,
    pub direction: Direction,
    /// When the visual treatment is over.
    pub deadline: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlideChange {
    pub old: SlideIndex,
    pub new: SlideIndex,
}

/// Counter, progress bar and button states for the navigation controls.
#[derive(Clone, Debug, PartialEq)]
pub struct NavigationView {
    pub current: u32,
    pub total: u32,
    pub progress_percent: f32,
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

#[derive(Debug)]
pub struct SlideTransitionController {
    current: SlideIndex,
    total: u32,
    state: TransitionState,
    duration: Duration,
    in_flight: Option<(SlideIndex, SlideIndex)>,
}

impl SlideTransitionController {
    pub fn new(total: u32, duration: Duration) -> Self {
        Self {
            current: SlideIndex::FIRST,
            total,
            state: TransitionState::Idle,
            duration,
            in_flight: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.slide_count, config.transition)
    }

    pub fn current(&self) -> SlideIndex {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// Starts a transition to `target` (1-based).
    pub fn go_to<S: Stage>(
        &mut self,
        target: u32,
        stage: &mut S,
    ) -> Result<TransitionTicket, NavRejection> {
        let to = SlideIndex::new(target)
            .filter(|i| i.get() <= self.total)
            .ok_or(NavRejection::OutOfRange(target))?;
        if to == self.current {
            return Err(NavRejection::AlreadyCurrent);
        }
        if self.state == TransitionState::Transitioning {
            trace!("Dropping navigation to slide {}: transition in flight", to);
            return Err(NavRejection::InFlight);
        }

        let from = self.current;
        let direction = if to > from { Direction::Forward } else { Direction::Backward };
        self.state = TransitionState::Transitioning;
        self.current = to;
        self.in_flight = Some((from, to));
        stage.begin_transition(from, to, direction);
        debug!("Transition {} -> {} started", from, to);

        Ok(TransitionTicket { from, to, direction, deadline: Instant::now() + self.duration })
    }

    pub fn next<S: Stage>(&mut self, stage: &mut S) -> Result<TransitionTicket, NavRejection> {
        self.go_to(self.current.get() + 1, stage)
    }

    pub fn previous<S: Stage>(&mut self, stage: &mut S) -> Result<TransitionTicket, NavRejection> {
        self.go_to(self.current.get() - 1, stage)
    }

    pub fn first<S: Stage>(&mut self, stage: &mut S) -> Result<TransitionTicket, NavRejection> {
        self.go_to(1, stage)
    }

    pub fn last<S: Stage>(&mut self, stage: &mut S) -> Result<TransitionTicket, NavRejection> {
        self.go_to(self.total, stage)
    }

    /// Finishes the transition: pauses every video, restarts the new slide's video.
    pub fn complete<S: Stage>(
        &mut self,
        ticket: TransitionTicket,
        library: &mut MediaLibrary,
        stage: &mut S,
    ) -> SlideChange {
        let change = SlideChange { old: ticket.from, new: ticket.to };
        if self.in_flight != Some((ticket.from, ticket.to)) {
            debug!("Ignoring stale transition ticket {} -> {}", ticket.from, ticket.to);
            return change;
        }

        for record in library.records_mut() {
            if record.kind == MediaKind::Video {
                record.handle.pause();
            }
        }
        if let Some(record) = library.get_mut(ticket.to) {
            if record.kind == MediaKind::Video {
                record.handle.play_from_start();
            }
        }
        stage.finish_transition(ticket.from, ticket.to);

        self.in_flight = None;
        self.state = TransitionState::Idle;
        info!("Now showing slide {} of {}", ticket.to, self.total);
        change
    }

    pub fn view(&self) -> NavigationView {
        let current = self.current.get();
        let progress_percent = if self.total == 0 {
            0.0
        } else {
            current as f32 / self.total as f32 * 100.0
        };
        NavigationView {
            current,
            total: self.total,
            progress_percent,
            prev_disabled: current <= 1,
            next_disabled: current >= self.total,
        }
    }
}
