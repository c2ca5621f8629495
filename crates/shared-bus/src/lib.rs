//! # Shared Bus - Diagnostics Bus for Card Emulation Components
//!
//! Carries the structured diagnostics the components raise (conflicts,
//! policy violations, routing overflow, deactivation outcomes) to whoever
//! is listening: the runtime log sink, test harnesses, statistics readers.
//!
//! ## Rules
//!
//! - Publishing is fire-and-forget; a publish never blocks and never fails
//!   the caller.
//! - No component reads the bus to make a control-flow decision.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Component A  │                    │  Log sink /  │
//! │              │    publish()       │  tests       │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{
    CardEmulationEvent, DeactivationOutcome, EventFilter, EventTopic, PolicyViolationKind,
};
pub use publisher::InMemoryEventBus;
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
