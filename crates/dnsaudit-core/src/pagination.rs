//! Continuation-token bookkeeping for paginated listings

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::ContinuationToken;

/// Tracks the token for the next page of a listing
///
/// A listing that hands back a token it has already served would otherwise
/// be followed forever; [`advance`](Self::advance) turns that into an error.
#[derive(Debug)]
pub(crate) struct PageCursor {
    listing: String,
    current: Option<ContinuationToken>,
    seen: HashSet<ContinuationToken>,
    pages: usize,
}

impl PageCursor {
    pub(crate) fn new(listing: impl Into<String>) -> Self {
        Self {
            listing: listing.into(),
            current: None,
            seen: HashSet::new(),
            pages: 0,
        }
    }

    /// Token to send with the next request (`None` for the first page)
    pub(crate) fn token(&self) -> Option<&ContinuationToken> {
        self.current.as_ref()
    }

    /// Number of pages consumed so far
    pub(crate) fn pages(&self) -> usize {
        self.pages
    }

    /// Record a fetched page's continuation token
    ///
    /// Returns `Ok(true)` while more pages remain.
    pub(crate) fn advance(&mut self, next: Option<ContinuationToken>) -> Result<bool> {
        self.pages += 1;
        match next {
            None => {
                self.current = None;
                Ok(false)
            }
            Some(token) => {
                if !self.seen.insert(token.clone()) {
                    return Err(Error::pagination(format!(
                        "{} returned continuation token '{}' twice (after {} page(s))",
                        self.listing, token, self.pages
                    )));
                }
                self.current = Some(token);
                Ok(true)
            }
        }
    }
}
