//! Temporal hysteresis over noisy per-frame match results.
//!
//! Three sources of noise are handled separately:
//! - single-frame misclassification: an identity switch must be observed
//!   on two consecutive frames before it is committed;
//! - brief occlusion of a known user: a fixed 5 s grace period before the
//!   session flips to the unknown user;
//! - the user leaving: a configurable logout delay after the last
//!   successful match before the session is closed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::events::{Event, EventSink, Identity, MatchedFace};

/// Grace period before a known user is downgraded to the unknown user.
/// Deliberately fixed, unlike the logout delay.
pub const UNKNOWN_GRACE: Duration = Duration::from_secs(5);

/// Ceiling on the consecutive-match counter.
const MATCH_STREAK_CAP: u8 = 2;

/// A committed identity change, as decided by [`SessionTracker::observe`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Login { user: Identity, distance: f64 },
    Logout { user: Identity },
}

/// Tracks the identity in front of the camera across frames.
///
/// Single instance, driven by exactly one thread. Login and logout events
/// are emitted on the injected sink at the moment they are committed; the
/// transition is also returned for the frame reporter.
pub struct SessionTracker {
    sink: Arc<dyn EventSink>,
    logout_delay: Duration,
    current: Identity,
    /// Time of the most recent successful detection+match. `None` until
    /// the first one, which reads as "infinitely long ago".
    login_timestamp: Option<Instant>,
    /// User matched on the previous frame that had any match.
    last_match: Option<String>,
    /// Consecutive frames `last_match` stayed on the same user, capped.
    consecutive_matches: u8,
}

impl SessionTracker {
    pub fn new(logout_delay: Duration, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            logout_delay,
            current: Identity::NoUser,
            login_timestamp: None,
            last_match: None,
            consecutive_matches: 0,
        }
    }

    pub fn current_identity(&self) -> &Identity {
        &self.current
    }

    /// Feed one frame's observation into the machine.
    ///
    /// `matched` is the matcher output (first entry is the candidate),
    /// `region_count` the number of detected face regions, `now` the frame
    /// timestamp. Returns the committed transition, if any. Each frame's
    /// outcome is final; nothing is retried or rolled back.
    pub fn observe(
        &mut self,
        matched: &[MatchedFace],
        region_count: usize,
        now: Instant,
    ) -> Option<Transition> {
        // Rule 1: nobody detected at all.
        if region_count == 0 {
            if self.current != Identity::NoUser && self.since_last_match(now) > self.logout_delay {
                let user = std::mem::replace(&mut self.current, Identity::NoUser);
                self.consecutive_matches = 0;
                // A stale last_match would let a single frame re-commit the
                // departed user; after a logout every identity switch has
                // to earn the two-frame debounce again.
                self.last_match = None;
                self.sink.emit(&Event::Logout {
                    user: user.as_wire_user().to_string(),
                });
                return Some(Transition::Logout { user });
            }
            return None;
        }

        // Rule 2: a face is present and somebody qualified.
        if let Some(candidate) = matched.first() {
            self.login_timestamp = Some(now);

            if self.last_match.as_deref() == Some(candidate.user_login.as_str()) {
                if self.consecutive_matches < MATCH_STREAK_CAP {
                    self.consecutive_matches += 1;
                }
            } else {
                self.consecutive_matches = 0;
            }

            let mut transition = None;
            // Commit only once the candidate was also the previous frame's
            // match, so a single misclassified frame never switches the
            // session.
            if !self.current.matches_login(&candidate.user_login) && self.consecutive_matches >= 1
            {
                self.current = Identity::Known(candidate.user_login.clone());
                self.sink.emit(&Event::Login {
                    user: candidate.user_login.clone(),
                    distance: candidate.distance,
                });
                transition = Some(Transition::Login {
                    user: self.current.clone(),
                    distance: candidate.distance,
                });
            }

            self.last_match = Some(candidate.user_login.clone());
            return transition;
        }

        // Rule 3: a face is present but nobody qualified.
        if self.current != Identity::Unknown && self.since_last_match(now) > UNKNOWN_GRACE {
            self.login_timestamp = Some(now);
            self.current = Identity::Unknown;
            self.sink.emit(&Event::Login {
                user: Identity::Unknown.as_wire_user().to_string(),
                distance: 0.0,
            });
            return Some(Transition::Login {
                user: Identity::Unknown,
                distance: 0.0,
            });
        }

        None
    }

    fn since_last_match(&self, now: Instant) -> Duration {
        match self.login_timestamp {
            Some(ts) => now.saturating_duration_since(ts),
            None => Duration::MAX,
        }
    }
}
