//! Ledger store adapters
//!
//! Two implementations of `domain_ledger::LedgerStore`:
//!
//! - [`MemoryLedgerStore`] - in-process maps behind a lock; the reference
//!   implementation of every store invariant, used throughout the test suite
//! - [`PgLedgerStore`] - PostgreSQL via sqlx with embedded migrations
//!
//! Both enforce the same idempotency contract: duplicate job invoices,
//! duplicate external payment ids, and duplicate open issues are rejected at
//! this boundary, not in callers.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
