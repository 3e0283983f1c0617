//! Cross-messenger abstractions (Telegram today).

pub mod delivery;
pub mod pacing;
pub mod port;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
