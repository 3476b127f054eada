//! Maps raw keyboard, touch and wheel input to navigation commands.

use std::time::Duration;
use tokio::time::Instant;

/// Horizontal travel a swipe needs before it counts.
pub const SWIPE_THRESHOLD_PX: f32 = 50.0;
pub const WHEEL_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Previous,
    First,
    Last,
    GoTo(u32),
}

/// Key names as reported by the host (`ArrowRight`, `" "`, `Home`, ...).
pub fn command_for_key(key: &str) -> Option<NavCommand> {
    match key {
        "ArrowRight" | " " | "Space" => Some(NavCommand::Next),
        "ArrowLeft" => Some(NavCommand::Previous),
        "Home" => Some(NavCommand::First),
        "End" => Some(NavCommand::Last),
        _ => None,
    }
}

/// Swiping left (start right of end) advances.
pub fn command_for_swipe(start_x: f32, end_x: f32) -> Option<NavCommand> {
    let diff = start_x - end_x;
    if diff.abs() <= SWIPE_THRESHOLD_PX {
        None
    } else if diff > 0.0 {
        Some(NavCommand::Next)
    } else {
        Some(NavCommand::Previous)
    }
}

/// Collapses bursts of wheel events; only the last one in a quiet window fires.
#[derive(Debug, Default)]
pub struct WheelDebouncer {
    pending: Option<(Instant, NavCommand)>,
}

impl WheelDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wheel event at `now`, replacing any pending one.
    pub fn push(&mut self, delta_y: f32, now: Instant) {
        let command = if delta_y > 0.0 { NavCommand::Next } else { NavCommand::Previous };
        self.pending = Some((now + WHEEL_DEBOUNCE, command));
    }

    /// When the pending command becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(at, _)| at)
    }

    /// Takes the pending command if its quiet window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<NavCommand> {
        match self.pending {
            Some((at, command)) if now >= at => {
                self.pending = None;
                Some(command)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for_key("ArrowRight"), Some(NavCommand::Next));
        assert_eq!(command_for_key(" "), Some(NavCommand::Next));
        assert_eq!(command_for_key("ArrowLeft"), Some(NavCommand::Previous));
        assert_eq!(command_for_key("Home"), Some(NavCommand::First));
        assert_eq!(command_for_key("End"), Some(NavCommand::Last));
        assert_eq!(command_for_key("q"), None);
    }

    #[test]
    fn short_swipes_are_ignored() {
        assert_eq!(command_for_swipe(100.0, 60.0), None);
        assert_eq!(command_for_swipe(100.0, 150.0), None);
        assert_eq!(command_for_swipe(300.0, 100.0), Some(NavCommand::Next));
        assert_eq!(command_for_swipe(100.0, 300.0), Some(NavCommand::Previous));
    }

    #[test]
    fn wheel_fires_last_event_after_quiet_window() {
        let start = Instant::now();
        let mut wheel = WheelDebouncer::new();
        wheel.push(12.0, start);
        wheel.push(-3.0, start + Duration::from_millis(40));
        assert_eq!(wheel.poll(start + Duration::from_millis(100)), None);
        assert_eq!(wheel.deadline(), Some(start + Duration::from_millis(140)));
        assert_eq!(wheel.poll(start + Duration::from_millis(140)), Some(NavCommand::Previous));
        assert_eq!(wheel.poll(start + Duration::from_millis(500)), None);
    }
}
