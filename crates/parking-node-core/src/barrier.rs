use embassy_time::{Duration, Instant};
use log::{debug, info};
use serde::Serialize;

use crate::payload::{BarrierAction, BarrierCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierPosition {
    Closed,
    Open,
}

/// Barrier state driven by server commands, with automatic closing.
pub struct Barrier {
    position: BarrierPosition,
    hold: Duration,
    close_at: Option<Instant>,
}

impl Barrier {
    pub fn new(hold: Duration) -> Self {
        Self {
            position: BarrierPosition::Closed,
            hold,
            close_at: None,
        }
    }

    pub fn position(&self) -> BarrierPosition {
        self.position
    }

    /// Pending automatic close, if the barrier is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.close_at
    }

    /// Apply a server command, returning the position to move to.
    pub fn apply(&mut self, command: &BarrierCommand, now: Instant) -> Option<BarrierPosition> {
        match command.action {
            BarrierAction::Open => {
                self.close_at = Some(now + self.hold);
                if self.position == BarrierPosition::Open {
                    debug!("Barrier already open, hold extended");
                    return None;
                }
                match command.available {
                    Some(available) => info!("Opening barrier ({} places available)", available),
                    None => info!("Opening barrier"),
                }
                self.position = BarrierPosition::Open;
                Some(BarrierPosition::Open)
            }
            // An open cycle always runs to its deadline
            BarrierAction::StayClosed => {
                info!("Barrier stays closed");
                None
            }
            BarrierAction::Close => self.close(),
        }
    }

    /// Close the barrier once the hold time has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<BarrierPosition> {
        match self.close_at {
            Some(close_at) if now >= close_at => {
                info!("Barrier hold time elapsed");
                self.close()
            }
            _ => None,
        }
    }

    fn close(&mut self) -> Option<BarrierPosition> {
        self.close_at = None;
        if self.position == BarrierPosition::Closed {
            return None;
        }
        info!("Closing barrier");
        self.position = BarrierPosition::Closed;
        Some(BarrierPosition::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn opens_and_closes_after_hold() {
        let mut barrier = Barrier::new(Duration::from_secs(5));
        let open = BarrierCommand::new(BarrierAction::Open);

        assert_eq!(barrier.apply(&open, at(10)), Some(BarrierPosition::Open));
        assert_eq!(barrier.deadline(), Some(at(15)));

        assert_eq!(barrier.poll(at(14)), None);
        assert_eq!(barrier.poll(at(15)), Some(BarrierPosition::Closed));
        assert_eq!(barrier.deadline(), None);
        assert_eq!(barrier.poll(at(20)), None);
    }

    #[test]
    fn repeated_open_extends_hold() {
        let mut barrier = Barrier::new(Duration::from_secs(5));
        let open = BarrierCommand::new(BarrierAction::Open);

        barrier.apply(&open, at(0));
        assert_eq!(barrier.apply(&open, at(3)), None);
        assert_eq!(barrier.deadline(), Some(at(8)));
        assert_eq!(barrier.poll(at(5)), None);
        assert_eq!(barrier.position(), BarrierPosition::Open);
    }

    #[test]
    fn stay_closed_never_moves() {
        let mut barrier = Barrier::new(Duration::from_secs(5));
        let stay = BarrierCommand::new(BarrierAction::StayClosed);

        assert_eq!(barrier.apply(&stay, at(0)), None);
        assert_eq!(barrier.position(), BarrierPosition::Closed);

        barrier.apply(&BarrierCommand::new(BarrierAction::Open), at(1));
        assert_eq!(barrier.apply(&stay, at(2)), None);
        assert_eq!(barrier.position(), BarrierPosition::Open);
        assert_eq!(barrier.deadline(), Some(at(6)));
    }

    #[test]
    fn close_is_immediate() {
        let mut barrier = Barrier::new(Duration::from_secs(5));
        barrier.apply(&BarrierCommand::new(BarrierAction::Open), at(0));

        let close = BarrierCommand::new(BarrierAction::Close);
        assert_eq!(barrier.apply(&close, at(1)), Some(BarrierPosition::Closed));
        assert_eq!(barrier.deadline(), None);
        assert_eq!(barrier.apply(&close, at(2)), None);
    }
}
