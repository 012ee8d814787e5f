//! Sliding-window limit on LLM requests
//!
//! Perception and planning share one client, so the limit applies to the
//! session as a whole. A caller that would exceed the limit waits until the
//! oldest request in the window has aged out.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{LlmClient, LlmResponse, Message};

const MINUTE: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests as usize, MINUTE)
    }

    /// Wait until another request fits in the window, then record it
    pub async fn acquire(&self) {
        let mut sent = self.sent.lock().await;
        loop {
            let now = Instant::now();
            while sent
                .front()
                .map_or(false, |t| now.duration_since(*t) >= self.window)
            {
                sent.pop_front();
            }

            if sent.len() < self.max_requests {
                sent.push_back(now);
                return;
            }

            if let Some(&oldest) = sent.front() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                tracing::info!("LLM rate limit reached, waiting {:.1}s", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Any client, behind a rate limiter
pub struct RateLimitedClient {
    inner: Box<dyn LlmClient>,
    limiter: RateLimiter,
}

impl RateLimitedClient {
    pub fn new(inner: Box<dyn LlmClient>, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl LlmClient for RateLimitedClient {
    async fn send_message_with_system(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<LlmResponse> {
        self.limiter.acquire().await;
        self.inner.send_message_with_system(messages, system_prompt).await
    }
}
