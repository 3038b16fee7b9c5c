//! Fixed-window request budget for EOSDA endpoints.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Statistics,
    Default,
}

impl EndpointClass {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointClass::Statistics => "statistics",
            EndpointClass::Default => "default",
        }
    }

    /// Requests allowed per minute
    pub fn limit(self) -> u32 {
        match self {
            EndpointClass::Statistics => 20,
            EndpointClass::Default => 60,
        }
    }
}

#[derive(Debug)]
struct Usage {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    usage: Mutex<HashMap<EndpointClass, Usage>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one request from the budget. Returns false once the window is spent.
    pub fn check(&self, class: EndpointClass) -> bool {
        let now = Instant::now();
        let limit = class.limit();
        let mut usage = self.usage.lock().unwrap_or_else(|p| p.into_inner());

        let entry = usage.entry(class).or_insert(Usage {
            count: 0,
            reset_at: now + WINDOW,
        });
        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + WINDOW;
        }

        if entry.count >= limit {
            warn!(
                "EOSDA rate limit exceeded for {}: {}/{}",
                class.as_str(),
                entry.count,
                limit
            );
            return false;
        }

        entry.count += 1;
        true
    }

    pub fn remaining(&self, class: EndpointClass) -> u32 {
        let usage = self.usage.lock().unwrap_or_else(|p| p.into_inner());
        match usage.get(&class) {
            Some(entry) if Instant::now() <= entry.reset_at => {
                class.limit().saturating_sub(entry.count)
            }
            _ => class.limit(),
        }
    }
}
