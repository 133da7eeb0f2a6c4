use super::{FeedHealth, Sticky};
use crate::error::{ChargewatchError, Result};

/// Account balance as last reported by the backend
#[derive(Debug, Clone, Default)]
pub struct BalanceFeed {
    raw: Sticky<f64>,
}

impl BalanceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first successful read
    pub fn raw(&self) -> Option<f64> {
        self.raw.get().copied()
    }

    pub fn health(&self) -> FeedHealth {
        self.raw.health()
    }

    /// Returns the freshly fetched balance, `None` when the read failed
    pub fn apply(&mut self, result: Result<f64>) -> Option<f64> {
        let checked = result.and_then(|b| {
            if b.is_finite() {
                Ok(b)
            } else {
                Err(ChargewatchError::api("non-finite balance"))
            }
        });
        self.raw.apply(checked).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_reads_are_reported_failures_are_not() {
        let mut feed = BalanceFeed::new();
        assert_eq!(feed.raw(), None);
        assert_eq!(feed.apply(Ok(100.0)), Some(100.0));
        assert_eq!(feed.apply(Err(ChargewatchError::network("down"))), None);
        assert_eq!(feed.apply(Ok(f64::INFINITY)), None);
        assert_eq!(feed.raw(), Some(100.0));
    }
}
