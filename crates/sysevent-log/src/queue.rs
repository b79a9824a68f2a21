//! Bounded record buffer with global sequence numbers.
//!
//! Every record offered to the queue is assigned the next value of a global,
//! always-incrementing counter, whether it is buffered or dropped. Flush
//! callers wait on these numbers: "everything below N is durable" stays
//! meaningful even across overflow, because a dropped record still consumes
//! its number.
//!
//! The queue itself is not synchronised. It lives inside the log's shared
//! state and is only touched under that lock.

/// Outcome of offering one record to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The record was buffered under `sequence`.
    Buffered {
        sequence: u64,
        /// The buffered count just reached the proactive flush threshold.
        threshold_reached: bool,
    },
    /// The queue was full and the record was discarded.
    Dropped {
        sequence: u64,
        /// Front index of the queue at the time of the drop, which
        /// identifies the overflow episode.
        front_index: u64,
        /// True for exactly one drop per overflow episode.
        first_in_episode: bool,
    },
}

/// Everything the queue held at drain time.
#[derive(Debug)]
pub struct Drained<R> {
    /// Buffered records in submission order.
    pub records: Vec<R>,
    /// One past the highest sequence number covered by this drain. Every
    /// sequence number below it was either drained now, drained earlier, or
    /// dropped.
    pub upper_bound: u64,
}

/// A bounded FIFO of records keyed by a monotonic sequence counter.
#[derive(Debug)]
pub struct SequencedQueue<R> {
    records: Vec<R>,
    /// Sequence number of the oldest buffered record (or of the next record,
    /// when empty).
    front_index: u64,
    next_sequence: u64,
    capacity: usize,
    flush_threshold: usize,
    /// Front index at which the last overflow diagnostic was issued.
    logged_full_at: Option<u64>,
}

impl<R> SequencedQueue<R> {
    /// Creates an empty queue. `capacity` is raised to at least one.
    pub fn new(capacity: usize, flush_threshold: usize) -> Self {
        Self {
            records: Vec::new(),
            front_index: 0,
            next_sequence: 0,
            capacity: capacity.max(1),
            flush_threshold,
            logged_full_at: None,
        }
    }

    /// Offers a record. Never blocks and never grows past capacity: when full,
    /// the newest record is discarded.
    pub fn push(&mut self, record: R) -> Admission {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.records.len() >= self.capacity {
            let first_in_episode = self.logged_full_at != Some(self.front_index);
            if first_in_episode {
                self.logged_full_at = Some(self.front_index);
            }
            return Admission::Dropped {
                sequence,
                front_index: self.front_index,
                first_in_episode,
            };
        }

        self.records.push(record);
        Admission::Buffered {
            sequence,
            threshold_reached: self.records.len() == self.flush_threshold,
        }
    }

    /// Removes and returns every buffered record together with the sequence
    /// number one past the last record covered.
    pub fn drain(&mut self) -> Drained<R> {
        let records = std::mem::take(&mut self.records);
        self.front_index = self.next_sequence;
        Drained {
            records,
            upper_bound: self.next_sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn front_index(&self) -> u64 {
        self.front_index
    }

    /// The sequence number the next `push` will assign.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(queue: &mut SequencedQueue<u32>, count: u32) -> Vec<Admission> {
        (0..count).map(|i| queue.push(i)).collect()
    }

    #[test]
    fn sequences_are_assigned_in_order() {
        let mut queue = SequencedQueue::new(10, 5);
        let admissions = fill(&mut queue, 3);

        let sequences: Vec<u64> = admissions
            .iter()
            .map(|a| match a {
                Admission::Buffered { sequence, .. } => *sequence,
                Admission::Dropped { .. } => panic!("queue should not be full"),
            })
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(queue.next_sequence(), 3);
        assert_eq!(queue.front_index(), 0);
    }

    #[test]
    fn overflow_drops_newest_and_reports_once_per_episode() {
        let mut queue = SequencedQueue::new(3, 2);
        let admissions = fill(&mut queue, 5);

        let first_drops = admissions
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    Admission::Dropped {
                        first_in_episode: true,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(first_drops, 1);
        assert_eq!(queue.len(), 3);
        // Dropped records still consume sequence numbers.
        assert_eq!(queue.next_sequence(), 5);

        let drained = queue.drain();
        assert_eq!(drained.records, vec![0, 1, 2]);
        assert_eq!(drained.upper_bound, 5);
    }

    #[test]
    fn new_episode_after_drain_reports_again() {
        let mut queue = SequencedQueue::new(2, 1);
        fill(&mut queue, 3);
        queue.drain();
        assert_eq!(queue.front_index(), 3);

        let admissions = fill(&mut queue, 3);
        assert!(matches!(
            admissions[2],
            Admission::Dropped {
                first_in_episode: true,
                front_index: 3,
                ..
            }
        ));
    }

    #[test]
    fn threshold_fires_when_count_reaches_it() {
        let mut queue = SequencedQueue::new(10, 2);
        let admissions = fill(&mut queue, 3);
        let fired: Vec<bool> = admissions
            .iter()
            .map(|a| {
                matches!(
                    a,
                    Admission::Buffered {
                        threshold_reached: true,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(fired, vec![false, true, false]);
    }

    #[test]
    fn empty_drain_still_reports_upper_bound() {
        let mut queue: SequencedQueue<u32> = SequencedQueue::new(4, 2);
        let drained = queue.drain();
        assert!(drained.records.is_empty());
        assert_eq!(drained.upper_bound, 0);
    }
}
