//! Recent search queries, newest first.

use crate::storage::{
    keys, PersistenceService, SaveOptions, StorageBackend, StorageError, MAX_SEARCH_HISTORY,
};

/// Stored search history (empty when nothing was recorded)
pub fn search_history<B: StorageBackend>(
    store: &PersistenceService<B>,
) -> Result<Vec<String>, StorageError> {
    Ok(store.load(keys::SEARCH_HISTORY, Vec::new())?.data)
}

/// Record `query` at the front of the history.
///
/// Blank queries are ignored; a repeated query (case-insensitive) moves to
/// the front instead of appearing twice.
pub fn record_search<B: StorageBackend>(
    store: &PersistenceService<B>,
    query: &str,
) -> Result<Vec<String>, StorageError> {
    let query = query.trim();
    let mut history = search_history(store)?;
    if query.is_empty() {
        return Ok(history);
    }

    history.retain(|q| !q.eq_ignore_ascii_case(query));
    history.insert(0, query.to_string());
    history.truncate(MAX_SEARCH_HISTORY);

    store.save(keys::SEARCH_HISTORY, &history, SaveOptions::default())?;
    Ok(history)
}

pub fn clear_search_history<B: StorageBackend>(
    store: &PersistenceService<B>,
) -> Result<(), StorageError> {
    store.remove(keys::SEARCH_HISTORY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_record_moves_repeat_to_front() {
        let store = PersistenceService::new(MemoryBackend::new());
        record_search(&store, "dune").unwrap();
        record_search(&store, "emma").unwrap();
        let history = record_search(&store, "  DUNE ").unwrap();

        assert_eq!(history, vec!["DUNE".to_string(), "emma".to_string()]);
        assert_eq!(search_history(&store).unwrap(), history);
    }

    #[test]
    fn test_history_is_capped() {
        let store = PersistenceService::new(MemoryBackend::new());
        for i in 0..(MAX_SEARCH_HISTORY + 5) {
            record_search(&store, &format!("query {}", i)).unwrap();
        }

        let history = search_history(&store).unwrap();
        assert_eq!(history.len(), MAX_SEARCH_HISTORY);
        assert_eq!(history[0], format!("query {}", MAX_SEARCH_HISTORY + 4));
    }

    #[test]
    fn test_blank_query_ignored_and_clear() {
        let store = PersistenceService::new(MemoryBackend::new());
        assert!(record_search(&store, "   ").unwrap().is_empty());

        record_search(&store, "tolkien").unwrap();
        clear_search_history(&store).unwrap();
        assert!(search_history(&store).unwrap().is_empty());
    }
}
