//! Reading list manager.
//!
//! Keeps the three reading-status buckets cached in memory, persists the
//! whole structure after every mutation and notifies subscribers.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Book, Bucket, InvalidListType, ReadingLists};
use crate::events::{SubscriberSet, Subscription};
use crate::storage::{keys, PersistenceService, SaveOptions, StorageBackend, StorageError};

/// Errors from reading list operations
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Invalid book: missing identifier")]
    InvalidBook,

    #[error(transparent)]
    InvalidListType(#[from] InvalidListType),

    #[error("Book not found in any list: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListAction {
    Added,
    Removed,
    Progress,
    Rating,
}

/// Descriptor delivered to subscribers after every mutation
#[derive(Debug, Clone)]
pub struct ListChange {
    pub bucket: Bucket,
    pub action: ListAction,
    pub book: Book,

    /// Full state after the mutation
    pub lists: ReadingLists,
}

/// Aggregate reading statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStats {
    /// Books in the completed list
    pub books_read: usize,

    /// Pages across completed books with a known page count
    pub total_pages: u64,

    /// Mean rating of completed books, one decimal (0.0 when none are rated)
    pub average_rating: f64,

    pub currently_reading: usize,
    pub want_to_read: usize,
}

/// Reading lists backed by the persistence service
pub struct ReadingListManager<B> {
    store: Arc<PersistenceService<B>>,
    lists: Option<ReadingLists>,
    seed: ReadingLists,
    subscribers: SubscriberSet<ListChange>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Apply the status-field policy of the destination bucket
fn prepare_for(mut book: Book, bucket: Bucket) -> Book {
    match bucket {
        Bucket::Reading => {
            book.progress = Some(book.progress.unwrap_or(0));
            book.started_date = Some(book.started_date.unwrap_or_else(today));
        }
        Bucket::Completed => {
            book.completed_date = Some(book.completed_date.unwrap_or_else(today));
            book.progress = None;
        }
        Bucket::ToRead => {
            book.added_date = Some(today());
            book.progress = None;
            book.completed_date = None;
        }
    }
    book
}

impl<B: StorageBackend> ReadingListManager<B> {
    /// Manager that seeds first-run storage with the sample lists
    pub fn new(store: Arc<PersistenceService<B>>) -> Self {
        Self {
            store,
            lists: None,
            seed: ReadingLists::sample(),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Replace the lists written when storage holds none
    pub fn with_seed(mut self, seed: ReadingLists) -> Self {
        self.seed = seed;
        self
    }

    /// Drop the in-memory copy; the next access reloads from storage
    pub fn reset(&mut self) {
        self.lists = None;
    }

    fn hydrate(&mut self) -> Result<&mut ReadingLists, ListError> {
        let lists = match self.lists.take() {
            Some(lists) => lists,
            None => {
                let stored = self
                    .store
                    .load::<Option<ReadingLists>>(keys::READING_LISTS, None)?
                    .data;
                match stored {
                    Some(lists) => lists,
                    None => {
                        info!("No reading lists stored, writing defaults");
                        self.store
                            .save(keys::READING_LISTS, &self.seed, SaveOptions::default())?;
                        self.seed.clone()
                    }
                }
            }
        };

        Ok(self.lists.insert(lists))
    }

    /// Current state of all three lists
    pub fn lists(&mut self) -> Result<&ReadingLists, ListError> {
        Ok(&*self.hydrate()?)
    }

    pub fn list(&mut self, bucket: Bucket) -> Result<&[Book], ListError> {
        Ok(self.hydrate()?.bucket(bucket).as_slice())
    }

    /// Locate a book by id, searching buckets in fixed order
    pub fn find(&mut self, id: &str) -> Result<Option<(Bucket, Book)>, ListError> {
        Ok(self
            .hydrate()?
            .find(id)
            .map(|(bucket, book)| (bucket, book.clone())))
    }

    /// Register a listener for list mutations
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ListChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Persist `lists`, make them current and notify subscribers
    fn commit(
        &mut self,
        lists: ReadingLists,
        bucket: Bucket,
        action: ListAction,
        book: Book,
    ) -> Result<(), ListError> {
        self.store
            .save(keys::READING_LISTS, &lists, SaveOptions::default())?;
        self.lists = Some(lists.clone());

        debug!(id = %book.id, %bucket, ?action, "Reading lists updated");
        self.subscribers.publish(&ListChange {
            bucket,
            action,
            book,
            lists,
        });
        Ok(())
    }

    /// Put `book` at the front of `bucket`, removing it from any other list
    pub fn add_to_list(&mut self, book: Book, bucket: Bucket) -> Result<(), ListError> {
        if book.id.trim().is_empty() {
            return Err(ListError::InvalidBook);
        }

        let mut lists = self.hydrate()?.clone();
        lists.take(&book.id);

        let book = prepare_for(book, bucket);
        lists.bucket_mut(bucket).insert(0, book.clone());

        self.commit(lists, bucket, ListAction::Added, book)
    }

    /// Remove a book from `bucket`, or from the first list holding it.
    /// Returns the removed book, if any.
    pub fn remove_from_list(
        &mut self,
        id: &str,
        bucket: Option<Bucket>,
    ) -> Result<Option<Book>, ListError> {
        let mut lists = self.hydrate()?.clone();

        let search: &[Bucket] = match bucket {
            Some(ref b) => std::slice::from_ref(b),
            None => &Bucket::ALL,
        };

        let removed = search.iter().find_map(|&b| {
            let list = lists.bucket_mut(b);
            list.iter()
                .position(|book| book.id == id)
                .map(|pos| (b, list.remove(pos)))
        });

        match removed {
            Some((from, book)) => {
                self.commit(lists, from, ListAction::Removed, book.clone())?;
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    /// Move an already-listed book to another bucket
    pub fn move_to_list(&mut self, id: &str, bucket: Bucket) -> Result<(), ListError> {
        let (_, book) = self
            .find(id)?
            .ok_or_else(|| ListError::NotFound(id.to_string()))?;
        self.add_to_list(book, bucket)
    }

    /// Set reading progress, clamped to 0..=100. Reaching 100 moves the
    /// book to the completed list.
    pub fn update_progress(&mut self, id: &str, value: i32) -> Result<(), ListError> {
        let progress = value.clamp(0, 100) as u8;

        let (bucket, mut book) = self
            .find(id)?
            .ok_or_else(|| ListError::NotFound(id.to_string()))?;

        if progress == 100 {
            info!(id, "Progress reached 100%, marking completed");
            return self.add_to_list(book, Bucket::Completed);
        }

        book.progress = Some(progress);
        let mut lists = self.hydrate()?.clone();
        replace_in(&mut lists, bucket, &book);
        self.commit(lists, bucket, ListAction::Progress, book)
    }

    /// Set the reader's rating, clamped to 0..=5
    pub fn update_rating(&mut self, id: &str, value: f64) -> Result<(), ListError> {
        let rating = value.clamp(0.0, 5.0);

        let (bucket, mut book) = self
            .find(id)?
            .ok_or_else(|| ListError::NotFound(id.to_string()))?;

        book.user_rating = Some(rating);
        let mut lists = self.hydrate()?.clone();
        replace_in(&mut lists, bucket, &book);
        self.commit(lists, bucket, ListAction::Rating, book)
    }

    pub fn get_stats(&mut self) -> Result<ReadingStats, ListError> {
        let lists = self.hydrate()?;

        let total_pages = lists
            .completed
            .iter()
            .filter_map(|b| b.page_count)
            .map(u64::from)
            .sum();

        let ratings: Vec<f64> = lists
            .completed
            .iter()
            .filter_map(Book::effective_rating)
            .collect();
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        Ok(ReadingStats {
            books_read: lists.completed.len(),
            total_pages,
            average_rating,
            currently_reading: lists.reading.len(),
            want_to_read: lists.to_read.len(),
        })
    }
}

/// Overwrite the copy of `book` held in `bucket`
fn replace_in(lists: &mut ReadingLists, bucket: Bucket, book: &Book) {
    if let Some(slot) = lists.bucket_mut(bucket).iter_mut().find(|b| b.id == book.id) {
        *slot = book.clone();
    }
}
