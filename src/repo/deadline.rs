use std::time::{Duration, Instant};

use super::RepoError;

/// Time budget carried into every backend call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn check(&self) -> Result<(), RepoError> {
        if self.is_expired() {
            return Err(self.expired());
        }
        Ok(())
    }

    pub fn expired(&self) -> RepoError {
        RepoError::Timeout(self.budget)
    }
}
