//! Personalization core for the Praxis student-testing platform.
//!
//! Four engines behind one library boundary: adaptive difficulty
//! (readiness estimation + question selection), mastery tracking with
//! curriculum unlocking, gamification scoring, and deterministic
//! fill-in-the-blank rendering. The crate performs no I/O: the request
//! layer loads the relevant rows, calls in, and persists the mutated
//! aggregates as one transaction.

pub mod blanks;
pub mod config;
pub mod curriculum;
pub mod error;
pub mod gamification;
pub mod logging;
pub mod mastery;
pub mod readiness;
pub mod selector;
pub mod types;

pub use config::CoreConfig;
pub use error::CoreError;
