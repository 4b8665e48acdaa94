// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery state of one batch.
//!
//! ```text
//!   Pending ──> InFlight ──> Delivered
//!                 │  ^
//!                 v  │
//!              BackingOff
//!                 │
//!                 v
//!           FailedTerminal
//! ```
//!
//! `InFlight` leads to `FailedTerminal` directly when retrying is disabled or
//! the time budget is spent.

use std::time::Duration;

use crate::envelope::backoff::ExponentialBackoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    InFlight { attempt: u32 },
    BackingOff { attempt: u32, delay: Duration },
    Delivered { attempts: u32 },
    FailedTerminal { attempts: u32 },
}

impl DeliveryState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Delivered { .. } | DeliveryState::FailedTerminal { .. }
        )
    }
}

#[derive(Debug)]
pub struct RetryTracker {
    state: DeliveryState,
    backoff: Option<ExponentialBackoff>,
}

impl RetryTracker {
    /// `backoff` of `None` gives a single attempt.
    pub fn new(backoff: Option<ExponentialBackoff>) -> Self {
        Self {
            state: DeliveryState::Pending,
            backoff,
        }
    }

    #[must_use]
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self.state {
            DeliveryState::Pending => 0,
            DeliveryState::InFlight { attempt } | DeliveryState::BackingOff { attempt, .. } => {
                attempt
            }
            DeliveryState::Delivered { attempts } | DeliveryState::FailedTerminal { attempts } => {
                attempts
            }
        }
    }

    /// Moves to `InFlight` from `Pending` or `BackingOff` and returns the
    /// attempt number. Other states are left as they are.
    pub fn start_attempt(&mut self) -> u32 {
        if let DeliveryState::Pending | DeliveryState::BackingOff { .. } = self.state {
            self.state = DeliveryState::InFlight {
                attempt: self.attempts() + 1,
            };
        }
        self.attempts()
    }

    pub fn on_success(&mut self) -> DeliveryState {
        if let DeliveryState::InFlight { attempt } = self.state {
            self.state = DeliveryState::Delivered { attempts: attempt };
        }
        self.state
    }

    /// Records a failed attempt after `elapsed` since the first one started.
    pub fn on_failure(&mut self, elapsed: Duration) -> DeliveryState {
        if let DeliveryState::InFlight { attempt } = self.state {
            let delay = self
                .backoff
                .as_mut()
                .and_then(|backoff| backoff.next_backoff(elapsed));
            self.state = match delay {
                Some(delay) => DeliveryState::BackingOff { attempt, delay },
                None => DeliveryState::FailedTerminal { attempts: attempt },
            };
        }
        self.state
    }
}
