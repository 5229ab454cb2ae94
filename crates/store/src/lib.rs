//! SQLite-backed `Store` implementation.
//!
//! Grounded on `athena-runner`'s persistence layer and, for the raw
//! `sqlx::query(...).bind(...)` / `SqlitePool` idiom, on the trade-executor
//! persistence code in the example pack. Uses the runtime-checked query API
//! rather than `query!`/`query_as!` — those need a live `DATABASE_URL` (or an
//! offline `.sqlx` cache) at compile time, which this workspace cannot
//! produce without ever invoking the toolchain.

mod codec;
mod sqlite;

pub use sqlite::SqliteStore;
