//! Poll token allocation.

use contracts::ConnectionId;
use mio::Token;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hands out unique poll tokens; a connection's token doubles as its `ConnectionId`.
///
/// Cloned into every endpoint so that tokens stay unique across the whole hub.
#[derive(Debug, Clone)]
pub struct TokenSource {
    next: Arc<AtomicUsize>,
}

impl TokenSource {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicUsize::new(1)),
        }
    }

    pub fn next_token(&self) -> Token {
        Token(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_token().0)
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_unique_across_clones() {
        let a = TokenSource::new();
        let b = a.clone();
        let t1 = a.next_token();
        let t2 = b.next_token();
        let id = a.next_id();
        assert_ne!(t1, t2);
        assert_ne!(id.0, t1.0);
        assert_ne!(id.0, t2.0);
    }
}
