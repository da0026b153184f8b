//! Cached backend availability.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Last known backend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Available,
    Unavailable,
}

#[derive(Debug)]
struct Probe {
    availability: Availability,
    checked_at: Option<Instant>,
}

/// Health flag shared by all operations of one manager.
///
/// A probe result, positive or negative, is trusted for `interval`; only
/// then is the backend pinged again.
#[derive(Debug)]
pub struct HealthState {
    probe: Mutex<Probe>,
    interval: Duration,
}

impl HealthState {
    pub fn new(interval: Duration) -> Self {
        Self {
            probe: Mutex::new(Probe {
                availability: Availability::Unknown,
                checked_at: None,
            }),
            interval,
        }
    }

    /// The cached answer, or `None` when a fresh probe is due.
    pub fn cached(&self) -> Option<bool> {
        let probe = self.probe.lock();
        match (probe.availability, probe.checked_at) {
            (Availability::Unknown, _) | (_, None) => None,
            (availability, Some(at)) if at.elapsed() < self.interval => {
                Some(availability == Availability::Available)
            }
            _ => None,
        }
    }

    /// Store a probe result. Returns the previous availability.
    pub fn record(&self, available: bool) -> Availability {
        let mut probe = self.probe.lock();
        let previous = probe.availability;
        probe.availability = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        probe.checked_at = Some(Instant::now());
        previous
    }

    /// Flag the backend as down after a failed operation.
    pub fn mark_unavailable(&self) -> Availability {
        self.record(false)
    }

    pub fn availability(&self) -> Availability {
        self.probe.lock().availability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_until_recorded() {
        let health = HealthState::new(Duration::from_secs(60));
        assert_eq!(health.cached(), None);
        assert_eq!(health.availability(), Availability::Unknown);

        assert_eq!(health.record(true), Availability::Unknown);
        assert_eq!(health.cached(), Some(true));

        assert_eq!(health.mark_unavailable(), Availability::Available);
        assert_eq!(health.cached(), Some(false));
    }

    #[test]
    fn test_result_expires_after_interval() {
        let health = HealthState::new(Duration::ZERO);
        health.record(false);
        assert_eq!(health.cached(), None);
        assert_eq!(health.availability(), Availability::Unavailable);
    }
}
