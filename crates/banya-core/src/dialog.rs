//! Booking dialogue state machine
//!
//! Each user drives at most one dialogue:
//! `AwaitingSlot -> AwaitingCabinCount -> (committed | aborted)`.
//!
//! The registry is an in-memory session store keyed by user id with its own
//! TTL expiry, independent of the booking data. Advancing past
//! `AwaitingSlot` requires a nonzero availability result, which the caller
//! obtains from the engine; the engine re-checks again at commit time, so a
//! stale dialogue can never overrun capacity.

use banya_util::{Slot, UserId};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Where a user's booking dialogue currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    /// Waiting for the user to name a slot.
    AwaitingSlot,

    /// Slot accepted; waiting for a cabin count up to `available`.
    AwaitingCabinCount { slot: Slot, available: usize },
}

#[derive(Debug)]
struct DialogSession {
    state: DialogState,
    last_activity: DateTime<Local>,
}

/// In-memory dialogue sessions with TTL expiry.
#[derive(Debug)]
pub struct DialogRegistry {
    sessions: HashMap<UserId, DialogSession>,
    ttl: Duration,
}

impl DialogRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Begin (or restart) a dialogue for `user`.
    pub fn begin(&mut self, user: &UserId, now: DateTime<Local>) {
        debug!(user_id = %user, "Dialogue started");
        self.sessions.insert(
            user.clone(),
            DialogSession {
                state: DialogState::AwaitingSlot,
                last_activity: now,
            },
        );
    }

    /// Current state of `user`'s dialogue, if one is in progress.
    pub fn state(&self, user: &UserId) -> Option<&DialogState> {
        self.sessions.get(user).map(|s| &s.state)
    }

    /// Accept a slot while in `AwaitingSlot`.
    ///
    /// Advances only when `available > 0`; otherwise the dialogue stays in
    /// `AwaitingSlot` so the user can try another time. Returns whether the
    /// dialogue advanced. Any other state leaves the registry untouched.
    pub fn offer_slot(
        &mut self,
        user: &UserId,
        slot: Slot,
        available: usize,
        now: DateTime<Local>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(user) else {
            return false;
        };
        if !matches!(session.state, DialogState::AwaitingSlot) {
            return false;
        }

        session.last_activity = now;
        if available == 0 {
            return false;
        }

        session.state = DialogState::AwaitingCabinCount { slot, available };
        true
    }

    /// Take the dialogue out of the registry for commit.
    ///
    /// Only valid in `AwaitingCabinCount`; the caller performs the booking
    /// (which re-checks availability) and the dialogue ends regardless of
    /// the outcome. Returns the slot the user settled on.
    pub fn take_for_commit(&mut self, user: &UserId) -> Option<Slot> {
        match self.sessions.get(user).map(|s| &s.state) {
            Some(DialogState::AwaitingCabinCount { slot, .. }) => {
                let slot = *slot;
                self.sessions.remove(user);
                Some(slot)
            }
            _ => None,
        }
    }

    /// Abort `user`'s dialogue (explicit cancel or menu interrupt).
    /// Returns whether one was in progress.
    pub fn abort(&mut self, user: &UserId) -> bool {
        let removed = self.sessions.remove(user).is_some();
        if removed {
            debug!(user_id = %user, "Dialogue aborted");
        }
        removed
    }

    /// Drop sessions idle longer than the TTL. Returns the number dropped.
    pub fn sweep(&mut self, now: DateTime<Local>) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.signed_duration_since(session.last_activity) < ttl);

        let dropped = before - self.sessions.len();
        if dropped > 0 {
            debug!(dropped, "Idle dialogues expired");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(s: &str) -> Slot {
        s.parse().unwrap()
    }

    #[test]
    fn full_dialogue_path() {
        let mut registry = DialogRegistry::new(Duration::from_secs(600));
        let user = UserId::new("u1");
        let now = banya_util::now();

        assert!(registry.state(&user).is_none());

        registry.begin(&user, now);
        assert_eq!(registry.state(&user), Some(&DialogState::AwaitingSlot));

        assert!(registry.offer_slot(&user, slot("14:30"), 2, now));
        assert_eq!(
            registry.state(&user),
            Some(&DialogState::AwaitingCabinCount {
                slot: slot("14:30"),
                available: 2
            })
        );

        assert_eq!(registry.take_for_commit(&user), Some(slot("14:30")));
        assert!(registry.state(&user).is_none());
    }

    #[test]
    fn unavailable_slot_keeps_awaiting() {
        let mut registry = DialogRegistry::new(Duration::from_secs(600));
        let user = UserId::new("u1");
        let now = banya_util::now();

        registry.begin(&user, now);
        assert!(!registry.offer_slot(&user, slot("14:30"), 0, now));
        assert_eq!(registry.state(&user), Some(&DialogState::AwaitingSlot));
    }

    #[test]
    fn commit_requires_cabin_count_state() {
        let mut registry = DialogRegistry::new(Duration::from_secs(600));
        let user = UserId::new("u1");
        let now = banya_util::now();

        assert_eq!(registry.take_for_commit(&user), None);

        registry.begin(&user, now);
        assert_eq!(registry.take_for_commit(&user), None);
        // Still awaiting a slot
        assert_eq!(registry.state(&user), Some(&DialogState::AwaitingSlot));
    }

    #[test]
    fn abort_clears_session() {
        let mut registry = DialogRegistry::new(Duration::from_secs(600));
        let user = UserId::new("u1");
        let now = banya_util::now();

        assert!(!registry.abort(&user));

        registry.begin(&user, now);
        assert!(registry.abort(&user));
        assert!(registry.state(&user).is_none());
    }

    #[test]
    fn sweep_drops_idle_sessions() {
        let mut registry = DialogRegistry::new(Duration::from_secs(60));
        let user1 = UserId::new("u1");
        let user2 = UserId::new("u2");
        let now = banya_util::now();

        registry.begin(&user1, now);
        registry.begin(&user2, now + chrono::Duration::seconds(50));

        let later = now + chrono::Duration::seconds(70);
        assert_eq!(registry.sweep(later), 1);
        assert!(registry.state(&user1).is_none());
        assert!(registry.state(&user2).is_some());
    }
}
