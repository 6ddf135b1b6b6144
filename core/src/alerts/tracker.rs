use serde::Serialize;

use crate::prelude::Millis;

const INITIAL_ALERT_MS: Millis = 5_000;
const FREQUENT_INTERVAL_MS: Millis = 10_000;
const SUSTAINED_AFTER_MS: Millis = 60_000;
const SUSTAINED_INTERVAL_MS: Millis = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Neutral,
    BadActive,
}

/// Alert cadence stage for a continuous bad-posture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTier {
    /// First alert, once the session reaches five seconds.
    Initial,
    /// Every ten seconds until the first minute.
    Frequent,
    /// Every thirty seconds from the first minute on.
    Sustained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPostureSession {
    pub started_at: Millis,
    pub last_tier_fired: Option<AlertTier>,
    last_boundary_ms: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierAlert {
    pub tier: AlertTier,
    pub elapsed_ms: Millis,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerUpdate {
    pub state: TrackerState,
    pub duration_ms: Millis,
    pub alert: Option<TierAlert>,
}

/// Tracks how long posture has been continuously bad and decides when to alert.
#[derive(Debug, Default)]
pub struct TemporalStatusTracker {
    session: Option<BadPostureSession>,
}

impl TemporalStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        if self.session.is_some() {
            TrackerState::BadActive
        } else {
            TrackerState::Neutral
        }
    }

    pub fn session(&self) -> Option<&BadPostureSession> {
        self.session.as_ref()
    }

    pub fn duration_ms(&self, now: Millis) -> Millis {
        self.session
            .map(|session| now.saturating_sub(session.started_at))
            .unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.session = None;
    }

    /// Feeds one classification. Each tier boundary fires at most once; a tick
    /// that skips several boundaries fires only for the latest one. The first
    /// alert of a session is always the initial tier.
    pub fn update(&mut self, is_good_posture: bool, now: Millis) -> TrackerUpdate {
        if is_good_posture {
            self.session = None;
            return TrackerUpdate {
                state: TrackerState::Neutral,
                duration_ms: 0,
                alert: None,
            };
        }

        let session = self.session.get_or_insert(BadPostureSession {
            started_at: now,
            last_tier_fired: None,
            last_boundary_ms: None,
        });
        let duration_ms = now.saturating_sub(session.started_at);

        let alert = match due_boundary(duration_ms) {
            Some((tier, boundary))
                if session.last_boundary_ms.map_or(true, |last| boundary > last) =>
            {
                let tier = if session.last_tier_fired.is_none() {
                    AlertTier::Initial
                } else {
                    tier
                };
                session.last_boundary_ms = Some(boundary);
                session.last_tier_fired = Some(tier);
                Some(TierAlert {
                    tier,
                    elapsed_ms: duration_ms,
                    message: alert_message(tier, duration_ms),
                })
            }
            _ => None,
        };

        TrackerUpdate {
            state: TrackerState::BadActive,
            duration_ms,
            alert,
        }
    }
}

/// Latest boundary reached by a session of `duration_ms`.
fn due_boundary(duration_ms: Millis) -> Option<(AlertTier, Millis)> {
    if duration_ms >= SUSTAINED_AFTER_MS {
        let steps = (duration_ms - SUSTAINED_AFTER_MS) / SUSTAINED_INTERVAL_MS;
        Some((
            AlertTier::Sustained,
            SUSTAINED_AFTER_MS + steps * SUSTAINED_INTERVAL_MS,
        ))
    } else if duration_ms >= FREQUENT_INTERVAL_MS {
        let steps = duration_ms / FREQUENT_INTERVAL_MS;
        Some((AlertTier::Frequent, steps * FREQUENT_INTERVAL_MS))
    } else if duration_ms >= INITIAL_ALERT_MS {
        Some((AlertTier::Initial, INITIAL_ALERT_MS))
    } else {
        None
    }
}

fn alert_message(tier: AlertTier, duration_ms: Millis) -> String {
    match tier {
        AlertTier::Initial => format!(
            "Poor posture detected for {} seconds. Time to adjust!",
            duration_ms / 1000
        ),
        AlertTier::Frequent => format!(
            "You've been in poor posture for {} seconds. Please sit up straight.",
            duration_ms / 1000
        ),
        AlertTier::Sustained => {
            let minutes = duration_ms / 60_000;
            let unit = if minutes == 1 { "minute" } else { "minutes" };
            format!(
                "You've been in poor posture for {} {}. Consider taking a break and stretching.",
                minutes, unit
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_bad(
        tracker: &mut TemporalStatusTracker,
        until_ms: Millis,
        step_ms: Millis,
    ) -> Vec<(Millis, AlertTier)> {
        let mut fired = Vec::new();
        let mut now = 0;
        while now <= until_ms {
            if let Some(alert) = tracker.update(false, now).alert {
                fired.push((now, alert.tier));
            }
            now += step_ms;
        }
        fired
    }

    #[test]
    fn continuous_bad_posture_follows_tier_cadence() {
        let mut tracker = TemporalStatusTracker::new();
        let fired = run_bad(&mut tracker, 125_000, 250);
        let expected = vec![
            (5_000, AlertTier::Initial),
            (10_000, AlertTier::Frequent),
            (20_000, AlertTier::Frequent),
            (30_000, AlertTier::Frequent),
            (40_000, AlertTier::Frequent),
            (50_000, AlertTier::Frequent),
            (60_000, AlertTier::Sustained),
            (90_000, AlertTier::Sustained),
            (120_000, AlertTier::Sustained),
        ];
        assert_eq!(fired, expected);
        assert_eq!(tracker.state(), TrackerState::BadActive);
    }

    #[test]
    fn irregular_ticks_fire_each_boundary_once() {
        let mut tracker = TemporalStatusTracker::new();
        let mut tiers = Vec::new();
        for now in [0, 4_900, 5_300, 5_900, 9_000, 10_700, 19_999, 26_000, 26_500] {
            if let Some(alert) = tracker.update(false, now).alert {
                tiers.push((now, alert.tier));
            }
        }
        assert_eq!(
            tiers,
            vec![
                (5_300, AlertTier::Initial),
                (10_700, AlertTier::Frequent),
                (26_000, AlertTier::Frequent),
            ]
        );
    }

    #[test]
    fn late_first_tick_still_fires_initial_tier() {
        let mut tracker = TemporalStatusTracker::new();
        assert!(tracker.update(false, 0).alert.is_none());

        let alert = tracker.update(false, 11_000).alert.unwrap();
        assert_eq!(alert.tier, AlertTier::Initial);
        assert!(alert.message.contains("11 seconds"));

        // The skipped ten-second boundary is consumed; cadence resumes at 20s.
        assert!(tracker.update(false, 12_000).alert.is_none());
        let next = tracker.update(false, 20_000).alert.unwrap();
        assert_eq!(next.tier, AlertTier::Frequent);
    }

    #[test]
    fn good_posture_resets_immediately() {
        let mut tracker = TemporalStatusTracker::new();
        run_bad(&mut tracker, 7_000, 1_000);
        assert_eq!(tracker.session().and_then(|s| s.last_tier_fired), Some(AlertTier::Initial));

        let update = tracker.update(true, 7_100);
        assert_eq!(update.state, TrackerState::Neutral);
        assert_eq!(update.duration_ms, 0);
        assert_eq!(tracker.duration_ms(7_100), 0);

        // A new session starts from scratch and re-arms the first tier.
        assert!(tracker.update(false, 8_000).alert.is_none());
        let alert = tracker.update(false, 13_000).alert.unwrap();
        assert_eq!(alert.tier, AlertTier::Initial);
    }

    #[test]
    fn messages_report_seconds_then_minutes() {
        assert!(alert_message(AlertTier::Initial, 5_400).contains("5 seconds"));
        assert!(alert_message(AlertTier::Frequent, 20_100).contains("20 seconds"));
        assert!(alert_message(AlertTier::Sustained, 60_000).contains("1 minute."));
        assert!(alert_message(AlertTier::Sustained, 150_000).contains("2 minutes."));
    }
}
