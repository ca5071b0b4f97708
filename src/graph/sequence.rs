//! Id sequence generator
//!
//! Ids are `"<n>.graph"` / `"<n>.blob"` strings with a monotonically
//! increasing numeric part. The sequence is seeded once at startup by
//! observing every persisted key; there is no module-level counter
//! state anywhere else.

/// Generator for `"<n>.<suffix>"` ids
#[derive(Debug, Clone)]
pub struct IdSequence {
    max_seen: u64,
    suffix: &'static str,
}

impl IdSequence {
    pub fn graphs() -> Self {
        Self::new("graph")
    }

    pub fn blobs() -> Self {
        Self::new("blob")
    }

    fn new(suffix: &'static str) -> Self {
        Self { max_seen: 0, suffix }
    }

    /// Observe a persisted id so later [`next`](Self::next) calls never
    /// collide with it. Ids without a leading number are ignored.
    pub fn observe(&mut self, id: &str) {
        let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<u64>() {
            if n > self.max_seen {
                self.max_seen = n;
            }
        }
    }

    /// Allocate the next id
    pub fn next(&mut self) -> String {
        self.max_seen += 1;
        format!("{}.{}", self.max_seen, self.suffix)
    }
}
