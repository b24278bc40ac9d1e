//! Identity-preserving pool of live text leaves.
//!
//! The pool maps a stable content identity (sid) to the live text-bearing
//! host nodes that have rendered it. Reuse is what keeps an in-progress
//! cursor or selection alive across re-renders: as long as the same leaf
//! handle comes back for the same sid, the platform's selection anchored in
//! it survives the pass.
//!
//! Entries persist across build passes. They are only removed by explicit
//! [`TextNodePool::cleanup`]; a leaf that drops out of the rendered tree
//! stays pooled so its sid can reclaim it later.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use smol_str::SmolStr;
use web_time::Instant;

/// The slice of host behavior the pool needs: creating a text leaf and
/// rewriting one's content. Blanket-implemented for every
/// [`HostTree`](crate::host::HostTree).
pub trait TextHost<L> {
    fn create_text_leaf(&mut self, text: &str) -> L;
    fn set_text_leaf(&mut self, leaf: L, text: &str);
}

/// How [`TextNodePool::add_or_reuse`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// The selection-hinted leaf was a candidate and was reused.
    ReusedSelection,
    /// The first-registered candidate was reused.
    Reused,
    /// No candidate existed; a fresh leaf was created and registered.
    Created,
}

/// Eviction knobs for [`TextNodePool::cleanup`]. Both passes are optional
/// and independent; leaves listed in `protected` are never evicted by
/// either.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions<L> {
    /// Drop entries whose last use is at least this old.
    pub max_idle: Option<Duration>,
    /// Keep at most this many sid entries, evicting the least recently
    /// used first.
    pub max_entries: Option<usize>,
    /// Leaves that must survive both passes (e.g. a leaf under an active
    /// selection).
    pub protected: Vec<L>,
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub dropped_leaves: usize,
    pub dropped_sids: usize,
}

#[derive(Debug)]
struct LeafRecord {
    /// Canonical owning sid for reverse lookup.
    sid: SmolStr,
    /// Last content written to the host for this leaf. Content equality
    /// gates the host write, so no host read is ever needed.
    text: String,
}

#[derive(Debug)]
struct SidEntry<L> {
    /// Candidate leaves in registration order. Order is load-bearing:
    /// without a selection hint, reuse always converges on the first
    /// registered candidate.
    leaves: Vec<L>,
    last_used: Instant,
    /// Monotonic recency for LRU ordering; `Instant` alone is too coarse
    /// to order touches within one pass.
    seq: u64,
}

/// Pool of live text leaves keyed by sid.
///
/// Forward (`sids`) and reverse (`leaves`) maps are only ever updated
/// together, inside [`register`](Self::register), so a leaf's owning sid
/// and its membership in that sid's candidate list cannot drift apart.
/// Re-registering a leaf under a new sid moves it: the old sid's candidate
/// list no longer yields it (strict single-ownership).
pub struct TextNodePool<L> {
    leaves: HashMap<L, LeafRecord>,
    sids: HashMap<SmolStr, SidEntry<L>>,
    next_seq: u64,
}

impl<L> Default for TextNodePool<L> {
    fn default() -> Self {
        Self {
            leaves: HashMap::new(),
            sids: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<L: Copy + Eq + Hash + fmt::Debug> TextNodePool<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sids with at least one live leaf.
    pub fn len(&self) -> usize {
        self.sids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    /// Candidate leaves for a sid, in registration order.
    pub fn candidates(&self, sid: &str) -> &[L] {
        self.sids.get(sid).map(|e| e.leaves.as_slice()).unwrap_or(&[])
    }

    /// Canonical owning sid of a leaf, if it is pooled.
    pub fn sid_for_leaf(&self, leaf: L) -> Option<&SmolStr> {
        self.leaves.get(&leaf).map(|r| &r.sid)
    }

    /// Return a live leaf for `sid` carrying `desired_text`, creating one
    /// through the host only when no candidate exists.
    ///
    /// Reuse priority: the selection-hinted leaf when it is among this
    /// sid's candidates, else the first-registered candidate, else a fresh
    /// leaf. Content is rewritten only when it differs from `desired_text`;
    /// the reuse decision itself never looks at content.
    pub fn add_or_reuse<H: TextHost<L>>(
        &mut self,
        sid: &SmolStr,
        desired_text: &str,
        selection_leaf: Option<L>,
        host: &mut H,
    ) -> (L, PoolOutcome) {
        let candidate = self.sids.get(sid.as_str()).and_then(|entry| {
            if let Some(hint) = selection_leaf {
                if entry.leaves.contains(&hint) {
                    return Some((hint, PoolOutcome::ReusedSelection));
                }
            }
            entry.leaves.first().map(|&l| (l, PoolOutcome::Reused))
        });

        match candidate {
            Some((leaf, outcome)) => {
                self.touch(sid);
                if let Some(record) = self.leaves.get_mut(&leaf) {
                    if record.text != desired_text {
                        host.set_text_leaf(leaf, desired_text);
                        record.text = desired_text.to_owned();
                    }
                }
                tracing::trace!(
                    target: "tapestry::pool",
                    %sid,
                    ?leaf,
                    ?outcome,
                    "reused text leaf"
                );
                (leaf, outcome)
            }
            None => {
                let leaf = host.create_text_leaf(desired_text);
                self.register_with_text(sid.clone(), leaf, desired_text.to_owned());
                tracing::trace!(target: "tapestry::pool", %sid, ?leaf, "created text leaf");
                (leaf, PoolOutcome::Created)
            }
        }
    }

    /// Register a leaf under a sid.
    ///
    /// Idempotent: the same leaf under the same sid only refreshes the
    /// entry's recency. The same leaf under a different sid moves it; both
    /// directions update atomically, and the old sid's candidate list drops
    /// the leaf.
    pub fn register(&mut self, sid: impl Into<SmolStr>, leaf: L) {
        let sid = sid.into();
        let current_sid = self.leaves.get(&leaf).map(|r| r.sid.clone());
        match current_sid {
            Some(old_sid) if old_sid == sid => {
                self.touch(&sid);
            }
            Some(old_sid) => {
                let mut old_empty = false;
                if let Some(old_entry) = self.sids.get_mut(old_sid.as_str()) {
                    old_entry.leaves.retain(|&l| l != leaf);
                    old_empty = old_entry.leaves.is_empty();
                }
                if old_empty {
                    self.sids.remove(old_sid.as_str());
                }
                tracing::debug!(
                    target: "tapestry::pool",
                    ?leaf,
                    %old_sid,
                    new_sid = %sid,
                    "leaf moved to new sid"
                );
                if let Some(record) = self.leaves.get_mut(&leaf) {
                    record.sid = sid.clone();
                }
                self.push_leaf(sid, leaf);
            }
            None => {
                self.leaves.insert(
                    leaf,
                    LeafRecord {
                        sid: sid.clone(),
                        text: String::new(),
                    },
                );
                self.push_leaf(sid, leaf);
            }
        }
    }

    fn register_with_text(&mut self, sid: SmolStr, leaf: L, text: String) {
        self.leaves.insert(
            leaf,
            LeafRecord {
                sid: sid.clone(),
                text,
            },
        );
        self.push_leaf(sid, leaf);
    }

    fn push_leaf(&mut self, sid: SmolStr, leaf: L) {
        let seq = self.bump_seq();
        let entry = self.sids.entry(sid).or_insert_with(|| SidEntry {
            leaves: Vec::new(),
            last_used: Instant::now(),
            seq,
        });
        if !entry.leaves.contains(&leaf) {
            entry.leaves.push(leaf);
        }
        entry.last_used = Instant::now();
        entry.seq = seq;
    }

    fn touch(&mut self, sid: &SmolStr) {
        let seq = self.bump_seq();
        if let Some(entry) = self.sids.get_mut(sid.as_str()) {
            entry.last_used = Instant::now();
            entry.seq = seq;
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Evict pool entries: first every sid idle for at least `max_idle`,
    /// then the least-recently-used overflow beyond `max_entries`. Both
    /// passes skip protected leaves; a sid entry survives as long as it
    /// retains at least one leaf.
    pub fn cleanup(&mut self, options: &CleanupOptions<L>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let protected = &options.protected;

        if let Some(max_idle) = options.max_idle {
            let idle_sids: Vec<SmolStr> = self
                .sids
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() >= max_idle)
                .map(|(sid, _)| sid.clone())
                .collect();
            for sid in idle_sids {
                self.evict_sid(&sid, protected, &mut report);
            }
        }

        if let Some(max_entries) = options.max_entries {
            if self.sids.len() > max_entries {
                let mut by_recency: Vec<(SmolStr, u64)> = self
                    .sids
                    .iter()
                    .map(|(sid, entry)| (sid.clone(), entry.seq))
                    .collect();
                by_recency.sort_by_key(|&(_, seq)| seq);
                let overflow = self.sids.len() - max_entries;
                for (sid, _) in by_recency.into_iter().take(overflow) {
                    self.evict_sid(&sid, protected, &mut report);
                }
            }
        }

        if report.dropped_leaves > 0 || report.dropped_sids > 0 {
            tracing::debug!(
                target: "tapestry::pool",
                dropped_leaves = report.dropped_leaves,
                dropped_sids = report.dropped_sids,
                remaining = self.sids.len(),
                "pool cleanup"
            );
        }
        report
    }

    fn evict_sid(&mut self, sid: &SmolStr, protected: &[L], report: &mut CleanupReport) {
        let leaves = match self.sids.get_mut(sid.as_str()) {
            Some(entry) => std::mem::take(&mut entry.leaves),
            None => return,
        };
        let mut kept = Vec::new();
        for leaf in leaves {
            if protected.contains(&leaf) {
                kept.push(leaf);
            } else {
                self.leaves.remove(&leaf);
                report.dropped_leaves += 1;
            }
        }
        if kept.is_empty() {
            self.sids.remove(sid.as_str());
            report.dropped_sids += 1;
        } else if let Some(entry) = self.sids.get_mut(sid.as_str()) {
            entry.leaves = kept;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    /// Minimal host: leaves are indices into a vec of strings.
    #[derive(Default)]
    struct FakeHost {
        texts: Vec<String>,
        writes: usize,
    }

    impl TextHost<usize> for FakeHost {
        fn create_text_leaf(&mut self, text: &str) -> usize {
            self.texts.push(text.to_owned());
            self.texts.len() - 1
        }
        fn set_text_leaf(&mut self, leaf: usize, text: &str) {
            self.texts[leaf] = text.to_owned();
            self.writes += 1;
        }
    }

    fn sid(s: &str) -> SmolStr {
        SmolStr::new(s)
    }

    #[test]
    fn test_create_then_reuse_first_registered() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();

        let (leaf, outcome) = pool.add_or_reuse(&sid("t1"), "Hello", None, &mut host);
        assert_eq!(outcome, PoolOutcome::Created);

        // Second candidate registered manually (e.g. after a split).
        let second = host.create_text_leaf("Hel");
        pool.register(sid("t1"), second);
        assert_eq!(pool.candidates("t1"), &[leaf, second][..]);

        // Without a hint, reuse converges on the first-registered leaf.
        let (reused, outcome) = pool.add_or_reuse(&sid("t1"), "Hello", None, &mut host);
        assert_eq!(outcome, PoolOutcome::Reused);
        assert_eq!(reused, leaf);
    }

    #[test]
    fn test_selection_hint_takes_priority() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();

        let (first, _) = pool.add_or_reuse(&sid("t1"), "Hello", None, &mut host);
        let second = host.create_text_leaf("Hello");
        pool.register(sid("t1"), second);

        let (leaf, outcome) = pool.add_or_reuse(&sid("t1"), "Hello", Some(second), &mut host);
        assert_eq!(outcome, PoolOutcome::ReusedSelection);
        assert_eq!(leaf, second);
        assert_ne!(leaf, first);

        // A hint that is not a candidate for this sid is ignored.
        let stranger = host.create_text_leaf("x");
        let (leaf, outcome) = pool.add_or_reuse(&sid("t1"), "Hello", Some(stranger), &mut host);
        assert_eq!(outcome, PoolOutcome::Reused);
        assert_eq!(leaf, first);
    }

    #[test]
    fn test_content_update_only_when_differs() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();

        let (leaf, _) = pool.add_or_reuse(&sid("t1"), "Hello", None, &mut host);
        assert_eq!(host.writes, 0);

        pool.add_or_reuse(&sid("t1"), "Hello", None, &mut host);
        assert_eq!(host.writes, 0, "identical content must not touch the host");

        pool.add_or_reuse(&sid("t1"), "World", None, &mut host);
        assert_eq!(host.writes, 1);
        assert_eq!(host.texts[leaf], "World");
    }

    #[test]
    fn test_register_idempotent() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();
        let (leaf, _) = pool.add_or_reuse(&sid("t1"), "x", None, &mut host);

        pool.register(sid("t1"), leaf);
        pool.register(sid("t1"), leaf);
        assert_eq!(pool.candidates("t1"), &[leaf][..]);
    }

    #[test]
    fn test_register_moves_leaf_between_sids() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();
        let (leaf, _) = pool.add_or_reuse(&sid("old"), "x", None, &mut host);

        pool.register(sid("new"), leaf);

        // Reverse lookup follows the move.
        assert_eq!(pool.sid_for_leaf(leaf), Some(&sid("new")));
        // Strict single-ownership: the old candidate list no longer yields it.
        assert!(pool.candidates("old").is_empty());
        assert_eq!(pool.candidates("new"), &[leaf][..]);
    }

    #[test]
    fn test_cleanup_capacity_keeps_most_recent() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();

        for i in 0..5 {
            let s = SmolStr::new(format!("s{i}"));
            pool.add_or_reuse(&s, "x", None, &mut host);
        }
        // Touch s0 so it becomes the most recent.
        pool.add_or_reuse(&sid("s0"), "x", None, &mut host);

        let report = pool.cleanup(&CleanupOptions {
            max_entries: Some(2),
            ..Default::default()
        });
        assert_eq!(report.dropped_sids, 3);
        assert_eq!(pool.len(), 2);
        assert!(!pool.candidates("s0").is_empty(), "most recent survives");
        assert!(!pool.candidates("s4").is_empty());
        assert!(pool.candidates("s1").is_empty());
    }

    #[test]
    fn test_cleanup_never_evicts_protected() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();

        let (protected_leaf, _) = pool.add_or_reuse(&sid("a"), "x", None, &mut host);
        pool.add_or_reuse(&sid("b"), "x", None, &mut host);
        pool.add_or_reuse(&sid("c"), "x", None, &mut host);

        let report = pool.cleanup(&CleanupOptions {
            max_entries: Some(1),
            protected: vec![protected_leaf],
            ..Default::default()
        });

        // "a" was oldest but its only leaf is protected, so the entry stays.
        assert_eq!(pool.candidates("a"), &[protected_leaf][..]);
        assert!(pool.candidates("b").is_empty());
        assert_eq!(report.dropped_sids, 1);
    }

    #[test]
    fn test_cleanup_idle_pass() {
        let mut pool = TextNodePool::new();
        let mut host = FakeHost::default();
        pool.add_or_reuse(&sid("a"), "x", None, &mut host);
        pool.add_or_reuse(&sid("b"), "x", None, &mut host);

        // A zero idle threshold treats every entry as expired.
        let report = pool.cleanup(&CleanupOptions {
            max_idle: Some(Duration::ZERO),
            ..Default::default()
        });
        assert_eq!(report.dropped_sids, 2);
        assert!(pool.is_empty());
    }
}
