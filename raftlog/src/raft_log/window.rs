use crate::eraftpb::Entry;

/// Resident run of log entries, addressed by absolute index.
///
/// `entries[k].index == offset + k` for every `k`. While empty, `offset` is
/// the index the next resident entry has to take.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryWindow {
    offset: u64,
    entries: Vec<Entry>,
}

impl EntryWindow {
    pub fn new(offset: u64, entries: Vec<Entry>) -> Self {
        let window = Self { offset, entries };
        debug_assert!(window.is_contiguous());
        window
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One past the last resident index.
    pub fn end(&self) -> u64 {
        self.offset + self.entries.len() as u64
    }

    pub fn first_index(&self) -> Option<u64> {
        self.entries.first().map(|e| e.index)
    }

    pub fn last_index(&self) -> Option<u64> {
        self.entries.last().map(|e| e.index)
    }

    pub fn contains(&self, idx: u64) -> bool {
        idx >= self.offset && idx < self.end()
    }

    pub fn get(&self, idx: u64) -> Option<&Entry> {
        if !self.contains(idx) {
            return None;
        }
        self.entries.get((idx - self.offset) as usize)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries in `[lo, hi)`, or `None` unless the whole range is resident.
    pub fn slice(&self, lo: u64, hi: u64) -> Option<&[Entry]> {
        if lo > hi || lo < self.offset || hi > self.end() {
            return None;
        }
        let start = (lo - self.offset) as usize;
        let end = (hi - self.offset) as usize;
        Some(&self.entries[start..end])
    }

    /// Drops every entry below `first` and moves the offset up to it.
    /// Returns false when the window already starts at or after `first`.
    pub fn compact_to(&mut self, first: u64) -> bool {
        if first <= self.offset {
            return false;
        }
        let dropped = ((first - self.offset) as usize).min(self.entries.len());
        self.entries.drain(..dropped);
        self.offset = first;
        true
    }

    /// Installs a contiguous batch, replacing whatever is resident at or after
    /// its first index. The batch must not start past `end()` unless the
    /// window is empty.
    pub fn truncate_and_append(&mut self, ents: &[Entry]) {
        let start = match ents.first() {
            Some(e) => e.index,
            None => return,
        };

        if self.entries.is_empty() || start <= self.offset {
            self.entries.clear();
            self.offset = start;
        } else {
            debug_assert!(start <= self.end());
            self.entries.truncate((start - self.offset) as usize);
        }
        self.entries.extend_from_slice(ents);
        debug_assert!(self.is_contiguous());
    }

    /// Empties the window; the next resident entry will take `offset`.
    pub fn reset(&mut self, offset: u64) {
        self.entries.clear();
        self.offset = offset;
    }

    pub fn is_contiguous(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(k, e)| e.index == self.offset + k as u64)
    }
}
