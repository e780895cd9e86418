//! # Donor Engagement Engine
//!
//! The stateful half of the donation pipeline: persistence, the completion
//! workflow, challenge progress, reward vouchers, live history feeds, and the
//! REST surface the UI layer calls.
//!
//! | Concern                     | Module          |
//! |-----------------------------|-----------------|
//! | Pool, rows, retry           | [`db`]          |
//! | Change notification         | [`changes`]     |
//! | Completion workflow         | [`completion`]  |
//! | Challenge progress engine   | [`challenges`]  |
//! | Leaderboard                 | [`leaderboard`] |
//! | Reward voucher ledger       | [`vouchers`]    |
//! | Stream aggregator           | [`feed`]        |
//! | Challenge window sweeper    | [`sweeper`]     |
//! | REST API                    | [`api`]         |
//!
//! All race-prone writes (completion idempotency, crossing detection,
//! voucher consumption, points balances) go through single-statement
//! compare-and-swap updates or transactions; nothing in this crate does a
//! bare read-modify-write against shared state.

pub mod api;
pub mod challenges;
pub mod changes;
pub mod completion;
pub mod config;
pub mod db;
pub mod errors;
pub mod feed;
pub mod leaderboard;
pub mod sweeper;
pub mod vouchers;

pub use errors::{EngineError, Result};
