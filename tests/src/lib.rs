//! # Card Emulation Test Suite
//!
//! Cross-component tests that run the resolution engine, the routing
//! synthesizer and the emulation session together over the in-process
//! runtime adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── integration/
//! │   ├── fixtures.rs           # Shared services, stacks and bus helpers
//! │   ├── resolution_routing.rs # Resolution (1) → Routing (2) → controller
//! │   └── session_scenarios.rs  # Radio → Session (3) → services, reader taps
//! │
//! benches/
//! └── card_emulation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p nfc-tests
//!
//! # By area
//! cargo test -p nfc-tests integration::session_scenarios
//! cargo test -p nfc-tests integration::resolution_routing
//!
//! # Benchmarks
//! cargo bench -p nfc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
