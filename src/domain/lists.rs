//! Reading-status buckets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::book::{Book, Source};

/// One of the three reading-status lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    Reading,
    ToRead,
    Completed,
}

impl Bucket {
    /// Fixed search order used by lookups that don't name a bucket
    pub const ALL: [Bucket; 3] = [Bucket::Reading, Bucket::ToRead, Bucket::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::ToRead => "toRead",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid list type: {0}")]
pub struct InvalidListType(pub String);

impl FromStr for Bucket {
    type Err = InvalidListType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading" => Ok(Self::Reading),
            "toRead" | "to-read" | "to_read" => Ok(Self::ToRead),
            "completed" => Ok(Self::Completed),
            other => Err(InvalidListType(other.to_string())),
        }
    }
}

/// The three reading lists, each most-recently-added first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLists {
    #[serde(default)]
    pub reading: Vec<Book>,

    #[serde(default)]
    pub to_read: Vec<Book>,

    #[serde(default)]
    pub completed: Vec<Book>,
}

impl ReadingLists {
    /// Starter lists written on first run
    pub fn sample() -> Self {
        let mut dune = Book::new("OL893415W", Source::OpenLibrary, "Dune")
            .with_authors(["Frank Herbert"])
            .with_page_count(604)
            .with_rating(4.3);
        dune.progress = Some(45);

        let hobbit = Book::new("OL262758W", Source::OpenLibrary, "The Hobbit")
            .with_authors(["J.R.R. Tolkien"])
            .with_page_count(310)
            .with_rating(4.6);

        let neuromancer = Book::new("OL27258W", Source::OpenLibrary, "Neuromancer")
            .with_authors(["William Gibson"])
            .with_page_count(271);

        Self {
            reading: vec![dune],
            to_read: vec![neuromancer],
            completed: vec![hobbit],
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> &Vec<Book> {
        match bucket {
            Bucket::Reading => &self.reading,
            Bucket::ToRead => &self.to_read,
            Bucket::Completed => &self.completed,
        }
    }

    pub fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<Book> {
        match bucket {
            Bucket::Reading => &mut self.reading,
            Bucket::ToRead => &mut self.to_read,
            Bucket::Completed => &mut self.completed,
        }
    }

    /// Locate a book, searching buckets in fixed order
    pub fn find(&self, id: &str) -> Option<(Bucket, &Book)> {
        Bucket::ALL.iter().find_map(|&bucket| {
            self.bucket(bucket)
                .iter()
                .find(|b| b.id == id)
                .map(|book| (bucket, book))
        })
    }

    /// Remove a book from every bucket; returns the bucket it was found in
    pub fn take(&mut self, id: &str) -> Option<(Bucket, Book)> {
        let mut found = None;
        for bucket in Bucket::ALL {
            let list = self.bucket_mut(bucket);
            if let Some(pos) = list.iter().position(|b| b.id == id) {
                let book = list.remove(pos);
                found.get_or_insert((bucket, book));
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.reading.len() + self.to_read.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
