//! Per-user memory of already-served content
//!
//! Each user holds one TTL-expiring set of content ids. Merging is
//! additive and idempotent; `clear` takes effect synchronously so the next
//! candidate fetch after an explicit refresh sees no stale excludes.

use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

struct SeenEntry {
    ids: HashSet<Uuid>,
    refreshed_at: Instant,
}

pub struct SeenContentTracker {
    entries: DashMap<Uuid, SeenEntry>,
    ttl: Duration,
}

impl SeenContentTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Merge newly served ids into the user's seen set. Called only after
    /// the full page has been assembled, never incrementally.
    pub fn record_seen(&self, user_id: Uuid, content_ids: &[Uuid]) {
        if content_ids.is_empty() {
            return;
        }
        let mut entry = self.entries.entry(user_id).or_insert_with(|| SeenEntry {
            ids: HashSet::new(),
            refreshed_at: Instant::now(),
        });
        if entry.refreshed_at.elapsed() >= self.ttl {
            entry.ids.clear();
            entry.refreshed_at = Instant::now();
        }
        entry.ids.extend(content_ids.iter().copied());
        debug!(
            user_id = %user_id,
            added = content_ids.len(),
            total = entry.ids.len(),
            "recorded seen content"
        );
    }

    /// The user's current seen set; empty once the entry has expired.
    pub fn seen(&self, user_id: &Uuid) -> HashSet<Uuid> {
        let expired = match self.entries.get(user_id) {
            Some(entry) if entry.refreshed_at.elapsed() < self.ttl => {
                return entry.ids.clone();
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(user_id);
        }
        HashSet::new()
    }

    /// Explicit refresh / clear-history. Synchronous with respect to the
    /// next candidate fetch.
    pub fn clear(&self, user_id: &Uuid) {
        if self.entries.remove(user_id).is_some() {
            debug!(user_id = %user_id, "cleared seen content");
        }
    }

    /// How many items this user has exhausted, for diagnostics.
    pub fn exhaustion(&self, user_id: &Uuid) -> usize {
        self.seen(user_id).len()
    }

    /// Drop expired per-user entries. Called by the background sweeper.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.refreshed_at.elapsed() < self.ttl);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn merge_is_additive_and_idempotent() {
        let tracker = SeenContentTracker::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        tracker.record_seen(user, &[a]);
        tracker.record_seen(user, &[a, b]);

        let seen = tracker.seen(&user);
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&a) && seen.contains(&b));
    }

    #[test]
    fn clear_is_immediate() {
        let tracker = SeenContentTracker::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        tracker.record_seen(user, &[Uuid::new_v4()]);
        tracker.clear(&user);
        assert!(tracker.seen(&user).is_empty());
        assert_eq!(tracker.exhaustion(&user), 0);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let tracker = SeenContentTracker::new(Duration::from_millis(20));
        let user = Uuid::new_v4();
        tracker.record_seen(user, &[Uuid::new_v4()]);

        sleep(Duration::from_millis(30));
        assert!(tracker.seen(&user).is_empty());
    }

    #[test]
    fn users_are_independent() {
        let tracker = SeenContentTracker::new(Duration::from_secs(60));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        tracker.record_seen(alice, &[Uuid::new_v4(), Uuid::new_v4()]);

        assert_eq!(tracker.exhaustion(&alice), 2);
        assert_eq!(tracker.exhaustion(&bob), 0);
        tracker.clear(&bob);
        assert_eq!(tracker.exhaustion(&alice), 2);
    }

    #[test]
    fn purge_drops_only_expired() {
        let tracker = SeenContentTracker::new(Duration::from_millis(25));
        let stale = Uuid::new_v4();
        tracker.record_seen(stale, &[Uuid::new_v4()]);
        sleep(Duration::from_millis(30));
        let fresh = Uuid::new_v4();
        tracker.record_seen(fresh, &[Uuid::new_v4()]);

        assert_eq!(tracker.purge_expired(), 1);
        assert_eq!(tracker.exhaustion(&fresh), 1);
    }
}
