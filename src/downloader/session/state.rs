//! Per-segment scheduling state, indexed by segment position

use crate::error::Error;
use crate::retry::RetryBudget;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of one segment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SegmentStatus {
    /// Waiting for a slot
    Queued,
    /// Request outstanding
    Inflight,
    /// Bytes fetched (buffered or already written)
    Done,
    /// Retry budget exhausted or non-retryable failure
    PermanentlyFailed,
}

/// What happened to a failed segment
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FailureOutcome {
    /// Back in the retry queue
    Requeued,
    /// No further attempts
    Exhausted,
}

/// Arena of segment states plus the reorder buffer and write cursor
#[derive(Debug)]
pub(crate) struct SegmentTable {
    status: Vec<SegmentStatus>,
    failures: Vec<u32>,
    errors: BTreeMap<usize, Error>,
    retry: BTreeSet<usize>,
    next_fresh: usize,
    inflight: usize,
    done: usize,
    reorder: BTreeMap<usize, Bytes>,
    cursor: usize,
}

impl SegmentTable {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            status: vec![SegmentStatus::Queued; total],
            failures: vec![0; total],
            errors: BTreeMap::new(),
            retry: BTreeSet::new(),
            next_fresh: 0,
            inflight: 0,
            done: 0,
            reorder: BTreeMap::new(),
            cursor: 0,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.status.len()
    }

    pub(crate) fn inflight(&self) -> usize {
        self.inflight
    }

    pub(crate) fn done(&self) -> usize {
        self.done
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn status(&self, index: usize) -> SegmentStatus {
        self.status[index]
    }

    /// Failed attempts recorded for `index`
    pub(crate) fn failures(&self, index: usize) -> u32 {
        self.failures[index]
    }

    /// Claim the next segment to dispatch, marking it in flight
    ///
    /// Retry-queued segments go first (lowest index first), then segments never
    /// attempted, in playlist order.
    pub(crate) fn next_schedulable(&mut self) -> Option<usize> {
        let index = match self.retry.pop_first() {
            Some(index) => index,
            None => {
                while self.next_fresh < self.total()
                    && self.status[self.next_fresh] != SegmentStatus::Queued
                {
                    self.next_fresh += 1;
                }
                if self.next_fresh >= self.total() {
                    return None;
                }
                let index = self.next_fresh;
                self.next_fresh += 1;
                index
            }
        };
        self.status[index] = SegmentStatus::Inflight;
        self.inflight += 1;
        Some(index)
    }

    /// Store fetched bytes for `index`
    pub(crate) fn record_success(&mut self, index: usize, bytes: Bytes) {
        self.settle(index, SegmentStatus::Done);
        self.done += 1;
        self.reorder.insert(index, bytes);
    }

    /// Count a retryable failure; requeue while the budget allows
    pub(crate) fn record_failure(
        &mut self,
        index: usize,
        error: Error,
        budget: RetryBudget,
    ) -> FailureOutcome {
        self.failures[index] += 1;
        if budget.allows_another(self.failures[index]) {
            self.settle(index, SegmentStatus::Queued);
            self.retry.insert(index);
            FailureOutcome::Requeued
        } else {
            self.record_permanent(index, error);
            FailureOutcome::Exhausted
        }
    }

    /// Mark `index` as never to be retried
    pub(crate) fn record_permanent(&mut self, index: usize, error: Error) {
        if self.status[index] != SegmentStatus::Inflight {
            return;
        }
        if self.failures[index] == 0 {
            self.failures[index] = 1;
        }
        self.settle(index, SegmentStatus::PermanentlyFailed);
        self.errors.insert(index, error);
    }

    /// Return an interrupted segment to the queue without charging an attempt
    pub(crate) fn revert_aborted(&mut self, index: usize) {
        self.settle(index, SegmentStatus::Queued);
        self.retry.insert(index);
    }

    /// Remove the next buffered entry if it sits at the write cursor
    pub(crate) fn pop_ready(&mut self) -> Option<(usize, Bytes)> {
        let bytes = self.reorder.remove(&self.cursor)?;
        let index = self.cursor;
        self.cursor += 1;
        Some((index, bytes))
    }

    /// The failure blocking the write cursor, if any
    pub(crate) fn blocking_failure(&mut self) -> Option<(usize, u32, Error)> {
        if self.cursor >= self.total()
            || self.status[self.cursor] != SegmentStatus::PermanentlyFailed
        {
            return None;
        }
        let index = self.cursor;
        let error = self
            .errors
            .remove(&index)
            .unwrap_or_else(|| Error::Other("segment failed".to_string()));
        Some((index, self.failures[index], error))
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.cursor == self.total()
    }

    /// Bytes held for segments ahead of the cursor
    pub(crate) fn buffered_segments(&self) -> usize {
        self.reorder.len()
    }

    fn settle(&mut self, index: usize, status: SegmentStatus) {
        if self.status[index] == SegmentStatus::Inflight {
            self.inflight -= 1;
        }
        self.status[index] = status;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(index: usize) -> Error {
        Error::Http {
            status: 503,
            url: format!("https://cdn.example.com/{index}.ts"),
        }
    }

    #[test]
    fn fresh_segments_dispatch_in_order() {
        let mut table = SegmentTable::new(3);
        assert_eq!(table.next_schedulable(), Some(0));
        assert_eq!(table.next_schedulable(), Some(1));
        assert_eq!(table.next_schedulable(), Some(2));
        assert_eq!(table.next_schedulable(), None);
        assert_eq!(table.inflight(), 3);
    }

    #[test]
    fn retries_take_priority_over_fresh_segments() {
        let mut table = SegmentTable::new(5);
        let budget = RetryBudget::new(3);
        for _ in 0..3 {
            table.next_schedulable();
        }
        assert_eq!(
            table.record_failure(2, http_error(2), budget),
            FailureOutcome::Requeued
        );
        assert_eq!(
            table.record_failure(1, http_error(1), budget),
            FailureOutcome::Requeued
        );

        assert_eq!(table.next_schedulable(), Some(1));
        assert_eq!(table.next_schedulable(), Some(2));
        assert_eq!(table.next_schedulable(), Some(3));
        assert_eq!(table.failures(1), 1);
    }

    #[test]
    fn reorder_buffer_flushes_only_at_cursor() {
        let mut table = SegmentTable::new(3);
        for _ in 0..3 {
            table.next_schedulable();
        }
        table.record_success(2, Bytes::from_static(b"c"));
        table.record_success(1, Bytes::from_static(b"b"));
        assert_eq!(table.pop_ready(), None);
        assert_eq!(table.buffered_segments(), 2);

        table.record_success(0, Bytes::from_static(b"a"));
        let order: Vec<_> = std::iter::from_fn(|| table.pop_ready()).collect();
        assert_eq!(
            order,
            vec![
                (0, Bytes::from_static(b"a")),
                (1, Bytes::from_static(b"b")),
                (2, Bytes::from_static(b"c")),
            ]
        );
        assert!(table.is_complete());
        assert_eq!(table.done(), 3);
        assert_eq!(table.inflight(), 0);
    }

    #[test]
    fn exhausted_budget_marks_permanent_failure() {
        let mut table = SegmentTable::new(1);
        let budget = RetryBudget::new(2);
        for attempt in 1..=3 {
            assert_eq!(table.next_schedulable(), Some(0));
            let outcome = table.record_failure(0, http_error(0), budget);
            if attempt < 3 {
                assert_eq!(outcome, FailureOutcome::Requeued);
            } else {
                assert_eq!(outcome, FailureOutcome::Exhausted);
            }
        }
        assert_eq!(table.status(0), SegmentStatus::PermanentlyFailed);
        assert_eq!(table.next_schedulable(), None);

        let (index, attempts, error) = table.blocking_failure().unwrap();
        assert_eq!((index, attempts), (0, 3));
        assert!(matches!(error, Error::Http { status: 503, .. }));
    }

    #[test]
    fn failure_ahead_of_cursor_does_not_block_yet() {
        let mut table = SegmentTable::new(3);
        for _ in 0..3 {
            table.next_schedulable();
        }
        table.record_permanent(2, Error::Decrypt("bad padding".to_string()));
        assert!(table.blocking_failure().is_none());

        table.record_success(0, Bytes::from_static(b"a"));
        table.record_success(1, Bytes::from_static(b"b"));
        while table.pop_ready().is_some() {}
        assert_eq!(table.cursor(), 2);

        let (index, attempts, error) = table.blocking_failure().unwrap();
        assert_eq!((index, attempts), (2, 1));
        assert!(matches!(error, Error::Decrypt(_)));
    }

    #[test]
    fn aborted_segments_revert_without_penalty() {
        let mut table = SegmentTable::new(2);
        table.next_schedulable();
        table.next_schedulable();

        table.revert_aborted(1);
        table.revert_aborted(0);
        assert_eq!(table.inflight(), 0);
        assert_eq!(table.status(0), SegmentStatus::Queued);
        assert_eq!(table.failures(0), 0);
        assert_eq!(table.failures(1), 0);

        assert_eq!(table.next_schedulable(), Some(0));
        assert_eq!(table.next_schedulable(), Some(1));
        assert_eq!(table.next_schedulable(), None);
    }
}
