//! Per-operation loading state for catalog calls.

use std::sync::{Mutex, PoisonError};

use super::error::CatalogError;
use crate::events::{SubscriberSet, Subscription};

/// Category of catalog operation tracked independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Search,
    BookDetails,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::BookDetails => "bookDetails",
        }
    }
}

/// Loading flag and last error for one operation category
#[derive(Debug, Clone, Default)]
pub struct OperationState {
    pub loading: bool,
    pub error: Option<CatalogError>,
    in_flight: u32,
}

impl OperationState {
    /// Number of calls of this category currently running
    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }
}

/// Snapshot of every category's state
#[derive(Debug, Clone, Default)]
pub struct LoadingState {
    pub search: OperationState,
    pub book_details: OperationState,
}

impl LoadingState {
    pub fn get(&self, op: Operation) -> &OperationState {
        match op {
            Operation::Search => &self.search,
            Operation::BookDetails => &self.book_details,
        }
    }

    fn get_mut(&mut self, op: Operation) -> &mut OperationState {
        match op {
            Operation::Search => &mut self.search,
            Operation::BookDetails => &mut self.book_details,
        }
    }
}

/// Tracks loading state and notifies subscribers on every transition
#[derive(Default)]
pub struct LoadingTracker {
    state: Mutex<LoadingState>,
    subscribers: SubscriberSet<LoadingState>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LoadingState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LoadingState) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Start a call of `op`, returning a guard that finishes it. A guard
    /// dropped without [`LoadingGuard::finish`] (the caller's future was
    /// cancelled) finishes the call with no error.
    pub fn begin(&self, op: Operation) -> LoadingGuard<'_> {
        self.start(op);
        LoadingGuard {
            tracker: self,
            op,
            finished: false,
        }
    }

    /// Mark a call of `op` as started; clears that category's last error
    pub fn start(&self, op: Operation) {
        self.update(op, |s| {
            s.in_flight += 1;
            s.loading = true;
            s.error = None;
        });
    }

    /// Mark a call of `op` as finished, recording its error if it failed
    pub fn finish(&self, op: Operation, error: Option<&CatalogError>) {
        self.update(op, |s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            s.loading = s.in_flight > 0;
            s.error = error.cloned();
        });
    }

    fn update(&self, op: Operation, apply: impl FnOnce(&mut OperationState)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            apply(state.get_mut(op));
            state.clone()
        };
        self.subscribers.publish(&snapshot);
    }
}

/// One in-flight call, see [`LoadingTracker::begin`]
#[must_use = "dropping the guard finishes the call immediately"]
pub struct LoadingGuard<'a> {
    tracker: &'a LoadingTracker,
    op: Operation,
    finished: bool,
}

impl LoadingGuard<'_> {
    pub fn finish(mut self, error: Option<&CatalogError>) {
        self.finished = true;
        self.tracker.finish(self.op, error);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.finish(self.op, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::error::CatalogErrorKind;
    use std::sync::Arc;

    #[test]
    fn test_categories_are_independent() {
        let tracker = LoadingTracker::new();
        tracker.start(Operation::Search);

        let state = tracker.snapshot();
        assert!(state.search.loading);
        assert!(!state.book_details.loading);

        tracker.finish(Operation::Search, None);
        assert!(!tracker.snapshot().search.loading);
    }

    #[test]
    fn test_overlapping_calls_keep_loading() {
        let tracker = LoadingTracker::new();
        tracker.start(Operation::BookDetails);
        tracker.start(Operation::BookDetails);
        tracker.finish(Operation::BookDetails, None);

        let state = tracker.snapshot();
        assert!(state.book_details.loading);
        assert_eq!(state.book_details.in_flight(), 1);
    }

    #[test]
    fn test_dropped_guard_finishes_call() {
        let tracker = LoadingTracker::new();
        {
            let _guard = tracker.begin(Operation::Search);
            assert!(tracker.snapshot().search.loading);
        }

        let state = tracker.snapshot();
        assert!(!state.search.loading);
        assert_eq!(state.search.in_flight(), 0);
        assert!(state.search.error.is_none());
    }

    #[test]
    fn test_guard_finish_records_error_once() {
        let tracker = LoadingTracker::new();
        let other = tracker.begin(Operation::BookDetails);
        let guard = tracker.begin(Operation::BookDetails);

        guard.finish(Some(&CatalogError::new(CatalogErrorKind::NotFound)));
        let state = tracker.snapshot();
        assert_eq!(state.book_details.in_flight(), 1);
        assert!(state.book_details.loading);

        drop(other);
        assert_eq!(tracker.snapshot().book_details.in_flight(), 0);
    }

    #[test]
    fn test_error_recorded_and_published() {
        let tracker = LoadingTracker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = tracker.subscribe(move |s| {
            sink.lock().unwrap().push(s.search.loading);
        });

        tracker.start(Operation::Search);
        let err = CatalogError::new(CatalogErrorKind::Timeout);
        tracker.finish(Operation::Search, Some(&err));

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        let state = tracker.snapshot();
        assert_eq!(state.search.error.map(|e| e.kind), Some(CatalogErrorKind::Timeout));
    }
}
