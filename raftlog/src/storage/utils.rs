use prost::Message;

use crate::eraftpb::Entry;

/// Number of leading entries that fit in `max_size` bytes. The first entry is
/// always counted so that progress can be made with oversized entries.
pub fn limited_len(entries: &[Entry], max_size: Option<u64>) -> usize {
    let max_size = match max_size {
        Some(max_size) if max_size != u64::MAX => max_size,
        _ => return entries.len(),
    };

    let mut size = 0u64;
    let mut limit = 0;
    for (i, entry) in entries.iter().enumerate() {
        size += entry.encoded_len() as u64;
        if i > 0 && size > max_size {
            break;
        }
        limit = i + 1;
    }
    limit
}

pub fn limit_size(entries: &mut Vec<Entry>, max_size: Option<u64>) {
    let limit = limited_len(entries, max_size);
    entries.truncate(limit);
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_entry(index: u64, term: u64) -> Entry {
        Entry::new(index, term, vec![])
    }

    fn size_of(e: &Entry) -> u64 {
        e.encoded_len() as u64
    }

    #[test]
    fn test_limit_size() {
        let ents = vec![new_entry(4, 4), new_entry(5, 5), new_entry(6, 6)];
        let prefix = |n: usize| ents[..n].to_vec();
        let mut tests = vec![
            (None, prefix(3)),
            (Some(u64::MAX), prefix(3)),
            // even if maxsize is zero, the first entry should be returned
            (Some(0), prefix(1)),
            (Some(size_of(&ents[0]) + size_of(&ents[1])), prefix(2)),
            (
                Some(size_of(&ents[0]) + size_of(&ents[1]) + size_of(&ents[2]) / 2),
                prefix(2),
            ),
            (
                Some(size_of(&ents[0]) + size_of(&ents[1]) + size_of(&ents[2]) - 1),
                prefix(2),
            ),
            (
                Some(size_of(&ents[0]) + size_of(&ents[1]) + size_of(&ents[2])),
                prefix(3),
            ),
        ];
        for (i, (max_size, wentries)) in tests.drain(..).enumerate() {
            let mut entries = ents.clone();
            limit_size(&mut entries, max_size);
            if entries != wentries {
                panic!("#{}: want {:?}, got {:?}", i, wentries, entries);
            }
        }
    }

    #[test]
    fn test_limited_len_of_empty_slice() {
        assert_eq!(limited_len(&[], Some(0)), 0);
        assert_eq!(limited_len(&[], None), 0);
    }
}
