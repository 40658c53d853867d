// # Backend Implementations
//
// Bundled implementations of the collaborator traits.
//
// - `memory`: in-process data, seeded with builder methods (tests, embedding)
// - `snapshot`: JSON snapshot on disk, submitted batches written back to disk

pub mod memory;
pub mod snapshot;

pub use memory::{MemoryBackend, MemoryBackendFactory, Submission};
pub use snapshot::{Snapshot, SnapshotBackend, SnapshotBackendFactory, SnapshotZone};

use crate::error::{Error, Result};
use crate::model::ContinuationToken;
use crate::registry::BackendRegistry;

/// Register the bundled backends under `memory` and `snapshot`
pub fn register_builtin(registry: &BackendRegistry) {
    registry.register_backend("memory", Box::new(MemoryBackendFactory));
    registry.register_backend("snapshot", Box::new(SnapshotBackendFactory));
}

/// Serve one page of `items`
///
/// Tokens are the offset of the page they start; the last page carries no
/// token.
pub(crate) fn slice_page<T: Clone>(
    items: &[T],
    token: Option<&ContinuationToken>,
    page_size: usize,
) -> Result<(Vec<T>, Option<ContinuationToken>)> {
    let start = match token {
        None => 0,
        Some(token) => token
            .as_str()
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset > 0 && *offset < items.len())
            .ok_or_else(|| Error::Other(format!("Unknown continuation token '{}'", token)))?,
    };

    let end = (start + page_size.max(1)).min(items.len());
    let next = (end < items.len()).then(|| ContinuationToken::new(end.to_string()));
    Ok((items[start..end].to_vec(), next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_cover_every_item_once() {
        let items: Vec<u32> = (0..7).collect();
        let mut token = None;
        let mut seen = Vec::new();

        loop {
            let (page, next) = slice_page(&items, token.as_ref(), 3).unwrap();
            seen.extend(page);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, items);
    }

    #[test]
    fn empty_listing_is_one_empty_page() {
        let (page, next) = slice_page::<u32>(&[], None, 3).unwrap();
        assert!(page.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn foreign_tokens_are_rejected() {
        let items = [1, 2, 3];
        assert!(slice_page(&items, Some(&ContinuationToken::new("abc")), 2).is_err());
        assert!(slice_page(&items, Some(&ContinuationToken::new("9")), 2).is_err());
    }
}
