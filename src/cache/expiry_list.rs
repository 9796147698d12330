use crate::cache::entry::{Entry, EntryId, Slot};
use crate::cache::policy::TouchPolicy;
use crate::utils::{ExpiryError, Timestamp};
use log::{debug, trace, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Keys ordered from least to most recently touched, swept once idle for `timeout`.
///
/// Entries live in an arena and link to their chronological neighbours by index.
/// Following `next` from the oldest entry visits every entry once, in
/// non-decreasing timestamp order, and ends at the latest entry. `sweep` relies
/// on that order to stop at the first entry that has not expired yet.
///
/// The list does no locking. Callers sharing it across threads must serialize
/// every call behind one mutex.
pub struct ExpiryList<K, T = Instant> {
    slots: Vec<Slot<K, T>>,
    free: Vec<usize>,
    oldest: Option<usize>,
    latest: Option<usize>,
    len: usize,
    timeout: Duration,
    policy: TouchPolicy,
}

impl<K, T> fmt::Debug for ExpiryList<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryList")
            .field("len", &self.len)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .field("oldest", &self.oldest)
            .field("latest", &self.latest)
            .finish()
    }
}

impl<K, T: Timestamp> ExpiryList<K, T> {
    /// Creates an empty list that repositions touched entries in sorted order.
    pub fn new(timeout: Duration) -> Self {
        Self::with_policy(timeout, TouchPolicy::Reposition)
    }

    pub fn with_policy(timeout: Duration, policy: TouchPolicy) -> Self {
        ExpiryList {
            slots: Vec::new(),
            free: Vec::new(),
            oldest: None,
            latest: None,
            len: 0,
            timeout,
            policy,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> TouchPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds `key` stamped with `timestamp` and returns its handle.
    ///
    /// Appending at or after the latest timestamp is O(1). Older timestamps are
    /// placed by scanning back from the latest entry; an entry whose timestamp
    /// equals existing ones goes after them.
    pub fn insert(&mut self, key: K, timestamp: T) -> EntryId {
        let id = self.allocate(Entry::new(key, timestamp));
        self.link_sorted(id.index);
        self.len += 1;
        debug!("Inserted entry {:?} at {:?}", id, timestamp);
        id
    }

    /// Refreshes the entry's timestamp and moves it according to the list's policy.
    ///
    /// # Panics
    ///
    /// If `id` is not linked into this list, or if the policy is
    /// `PromoteToLatest` and `timestamp` is older than another entry's.
    pub fn touch(&mut self, id: EntryId, timestamp: T) {
        if let Err(err) = self.try_touch(id, timestamp) {
            panic!("expiry list contract violation: {}", err);
        }
    }

    /// Like `touch`, but reports contract violations instead of panicking.
    /// The list is left unchanged when an error is returned.
    pub fn try_touch(&mut self, id: EntryId, timestamp: T) -> Result<(), ExpiryError> {
        match self.policy {
            TouchPolicy::Reposition => self.try_reposition(id, timestamp),
            TouchPolicy::PromoteToLatest => self.try_promote(id, timestamp),
        }
    }

    /// Sets the timestamp and re-inserts the entry in sorted position. Cost is
    /// proportional to how far the entry moves back from the latest end.
    ///
    /// # Panics
    ///
    /// If `id` is not linked into this list.
    pub fn reposition(&mut self, id: EntryId, timestamp: T) {
        if let Err(err) = self.try_reposition(id, timestamp) {
            panic!("expiry list contract violation: {}", err);
        }
    }

    /// Sets the timestamp and makes the entry the latest in O(1).
    ///
    /// # Panics
    ///
    /// If `id` is not linked into this list, or `timestamp` is older than the
    /// timestamp of any other entry.
    pub fn promote(&mut self, id: EntryId, timestamp: T) {
        if let Err(err) = self.try_promote(id, timestamp) {
            panic!("expiry list contract violation: {}", err);
        }
    }

    fn try_reposition(&mut self, id: EntryId, timestamp: T) -> Result<(), ExpiryError> {
        let index = self.resolve(id).ok_or(ExpiryError::StaleEntry(id))?;
        self.unlink(index);
        self.entry_mut(index).timestamp = timestamp;
        self.link_sorted(index);
        trace!("Repositioned entry {:?} at {:?}", id, timestamp);
        Ok(())
    }

    fn try_promote(&mut self, id: EntryId, timestamp: T) -> Result<(), ExpiryError> {
        let index = self.resolve(id).ok_or(ExpiryError::StaleEntry(id))?;

        // The newest timestamp among the other entries.
        let newest_other = if self.latest == Some(index) {
            self.entry(index).prev
        } else {
            self.latest
        };
        if let Some(other) = newest_other {
            let latest = self.entry(other).timestamp;
            if timestamp < latest {
                warn!(
                    "Rejected promote of {:?} to {:?}, latest is {:?}",
                    id, timestamp, latest
                );
                return Err(ExpiryError::NonMonotonicTouch {
                    requested: format!("{:?}", timestamp),
                    latest: format!("{:?}", latest),
                });
            }
        }

        self.unlink(index);
        self.entry_mut(index).timestamp = timestamp;
        match self.latest {
            Some(latest) => self.link_after(latest, index),
            None => {
                self.oldest = Some(index);
                self.latest = Some(index);
            }
        }
        trace!("Promoted entry {:?} to latest at {:?}", id, timestamp);
        Ok(())
    }

    /// Unlinks the entry in O(1) and returns its key.
    ///
    /// A handle that is no longer in the list (already deleted or swept) is a
    /// no-op returning `None`.
    pub fn delete(&mut self, id: EntryId) -> Option<K> {
        let Some(index) = self.resolve(id) else {
            debug!("Delete of {:?} ignored, entry is not linked", id);
            return None;
        };
        self.unlink(index);
        let entry = self.release(index);
        debug!("Deleted entry {:?}", id);
        Some(entry.key)
    }

    /// Removes every entry idle for at least `timeout` as of `now` and returns
    /// their keys, oldest first.
    ///
    /// An entry stamped later than `now` is never expired.
    pub fn sweep(&mut self, now: T) -> Vec<K> {
        let mut expired = Vec::new();
        while let Some(oldest) = self.oldest {
            let idle = now.checked_elapsed_since(self.entry(oldest).timestamp);
            if !matches!(idle, Some(idle) if idle >= self.timeout) {
                break;
            }
            self.unlink(oldest);
            expired.push(self.release(oldest).key);
        }
        if !expired.is_empty() {
            debug!(
                "Swept {} expired entries at {:?}, {} remain",
                expired.len(),
                now,
                self.len
            );
        }
        expired
    }

    /// Drops every entry. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for index in 0..self.slots.len() {
            if self.slots[index].entry.is_some() {
                self.release(index);
            }
        }
        self.oldest = None;
        self.latest = None;
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.resolve(id).is_some()
    }

    pub fn oldest(&self) -> Option<EntryId> {
        self.oldest.map(|index| self.id_of(index))
    }

    pub fn latest(&self) -> Option<EntryId> {
        self.latest.map(|index| self.id_of(index))
    }

    /// The entry touched right after `id`, if any.
    pub fn next(&self, id: EntryId) -> Option<EntryId> {
        let index = self.resolve(id)?;
        self.entry(index).next.map(|next| self.id_of(next))
    }

    /// The entry touched right before `id`, if any.
    pub fn prev(&self, id: EntryId) -> Option<EntryId> {
        let index = self.resolve(id)?;
        self.entry(index).prev.map(|prev| self.id_of(prev))
    }

    pub fn key(&self, id: EntryId) -> Option<&K> {
        self.resolve(id).map(|index| &self.entry(index).key)
    }

    pub fn timestamp(&self, id: EntryId) -> Option<T> {
        self.resolve(id).map(|index| self.entry(index).timestamp)
    }

    /// Iterates oldest to latest. Use `.rev()` to walk latest to oldest.
    pub fn iter(&self) -> Iter<'_, K, T> {
        Iter {
            list: self,
            front: self.oldest,
            back: self.latest,
            remaining: self.len,
        }
    }

    /// Walks the chain from oldest to latest and checks every link invariant.
    pub fn verify(&self) -> Result<(), ExpiryError> {
        let corrupted = |msg: String| -> Result<(), ExpiryError> { Err(ExpiryError::Corrupted(msg)) };

        if self.oldest.is_none() != self.latest.is_none() {
            return corrupted(format!(
                "only one end is set: oldest {:?}, latest {:?}",
                self.oldest, self.latest
            ));
        }
        if let Some(oldest) = self.oldest.and_then(|index| self.get(index)) {
            if oldest.prev.is_some() {
                return corrupted(format!("oldest entry {:?} has a prev link", self.oldest));
            }
        }
        if let Some(latest) = self.latest.and_then(|index| self.get(index)) {
            if latest.next.is_some() {
                return corrupted(format!("latest entry {:?} has a next link", self.latest));
            }
        }

        let mut visited = 0;
        let mut prev: Option<usize> = None;
        let mut cursor = self.oldest;
        while let Some(index) = cursor {
            visited += 1;
            if visited > self.len {
                return corrupted(format!("forward walk exceeds {} entries", self.len));
            }
            let Some(entry) = self.get(index) else {
                return corrupted(format!("link points at vacant slot {}", index));
            };
            if entry.prev != prev {
                return corrupted(format!(
                    "entry {} links back to {:?}, expected {:?}",
                    index, entry.prev, prev
                ));
            }
            if let Some(p) = prev {
                if self.entry(p).timestamp > entry.timestamp {
                    return corrupted(format!("entry {} is older than entry {}", index, p));
                }
            }
            prev = cursor;
            cursor = entry.next;
        }
        if prev != self.latest {
            return corrupted(format!(
                "forward walk ends at {:?}, latest is {:?}",
                prev, self.latest
            ));
        }

        let occupied = self.slots.iter().filter(|slot| slot.entry.is_some()).count();
        if visited != self.len || occupied != self.len {
            return corrupted(format!(
                "{} entries reachable, {} stored, length says {}",
                visited, occupied, self.len
            ));
        }
        Ok(())
    }

    // Places an unlinked entry so the chain stays sorted.
    fn link_sorted(&mut self, index: usize) {
        let (Some(oldest), Some(latest)) = (self.oldest, self.latest) else {
            self.oldest = Some(index);
            self.latest = Some(index);
            return;
        };
        let timestamp = self.entry(index).timestamp;

        if timestamp >= self.entry(latest).timestamp {
            self.link_after(latest, index);
            return;
        }
        if timestamp < self.entry(oldest).timestamp {
            self.link_before(oldest, index);
            return;
        }

        // Oldest is not newer than `timestamp`, so the scan stops before running off the front.
        let mut cursor = latest;
        loop {
            let entry = self.entry(cursor);
            if entry.timestamp <= timestamp {
                self.link_after(cursor, index);
                return;
            }
            match entry.prev {
                Some(prev) => cursor = prev,
                None => {
                    self.link_before(cursor, index);
                    return;
                }
            }
        }
    }

    fn link_after(&mut self, anchor: usize, index: usize) {
        let next = self.entry(anchor).next;
        {
            let entry = self.entry_mut(index);
            entry.prev = Some(anchor);
            entry.next = next;
        }
        self.entry_mut(anchor).next = Some(index);
        match next {
            Some(next) => self.entry_mut(next).prev = Some(index),
            None => self.latest = Some(index),
        }
    }

    fn link_before(&mut self, anchor: usize, index: usize) {
        let prev = self.entry(anchor).prev;
        {
            let entry = self.entry_mut(index);
            entry.prev = prev;
            entry.next = Some(anchor);
        }
        self.entry_mut(anchor).prev = Some(index);
        match prev {
            Some(prev) => self.entry_mut(prev).next = Some(index),
            None => self.oldest = Some(index),
        }
    }

    // Bridges the neighbours around the entry and clears its own links.
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let entry = self.entry_mut(index);
            (entry.prev.take(), entry.next.take())
        };
        match prev {
            Some(prev) => self.entry_mut(prev).next = next,
            None => self.oldest = next,
        }
        match next {
            Some(next) => self.entry_mut(next).prev = prev,
            None => self.latest = prev,
        }
    }

    fn allocate(&mut self, entry: Entry<K, T>) -> EntryId {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };
        self.id_of(index)
    }

    // Empties an unlinked slot and invalidates handles to it.
    fn release(&mut self, index: usize) -> Entry<K, T> {
        let slot = &mut self.slots[index];
        let entry = slot
            .entry
            .take()
            .expect("released slot must hold an entry");
        slot.generation += 1;
        self.free.push(index);
        self.len -= 1;
        entry
    }

    fn resolve(&self, id: EntryId) -> Option<usize> {
        let slot = self.slots.get(id.index)?;
        (slot.generation == id.generation && slot.entry.is_some()).then_some(id.index)
    }

    fn id_of(&self, index: usize) -> EntryId {
        EntryId {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn get(&self, index: usize) -> Option<&Entry<K, T>> {
        self.slots.get(index).and_then(|slot| slot.entry.as_ref())
    }

    fn entry(&self, index: usize) -> &Entry<K, T> {
        self.slots[index]
            .entry
            .as_ref()
            .expect("linked index must point at an occupied slot")
    }

    fn entry_mut(&mut self, index: usize) -> &mut Entry<K, T> {
        self.slots[index]
            .entry
            .as_mut()
            .expect("linked index must point at an occupied slot")
    }
}

/// Iterator over `(handle, key, timestamp)` in time order.
pub struct Iter<'a, K, T> {
    list: &'a ExpiryList<K, T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, K, T: Timestamp> Iterator for Iter<'a, K, T> {
    type Item = (EntryId, &'a K, T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.front?;
        let entry = self.list.entry(index);
        self.front = entry.next;
        self.remaining -= 1;
        Some((self.list.id_of(index), &entry.key, entry.timestamp))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, T: Timestamp> DoubleEndedIterator for Iter<'a, K, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.back?;
        let entry = self.list.entry(index);
        self.back = entry.prev;
        self.remaining -= 1;
        Some((self.list.id_of(index), &entry.key, entry.timestamp))
    }
}

impl<'a, K, T: Timestamp> ExactSizeIterator for Iter<'a, K, T> {}
