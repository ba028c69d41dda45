//! # Dues Ledger
//!
//! An event-sourced membership dues ledger. A chronological log of domain
//! events (new members, balance adjustments, bank transactions, rate
//! changes, consistency assertions) is replayed into per-member financial
//! state and serialized back out as a DSV snapshot.
//!
//! ## Design Principles
//!
//! - **Decimal arithmetic**: balances and rates use `rust_decimal`
//! - **Single forward pass**: the log is pre-sorted; replay never buffers
//! - **Fail-fast**: the first inconsistency aborts the run, no partial snapshot
//! - **Deterministic output**: members serialized in registration order
//!
//! ## Example
//!
//! ```no_run
//! use dues_ledger::ReplayEngine;
//! use std::io::Cursor;
//!
//! let log = "2020-01-01;newMember;hacker1;\n2020-01-15;transaction;100,hacker1;\n";
//! let mut engine = ReplayEngine::new();
//! engine.replay(Cursor::new(log)).unwrap();
//! engine.write_snapshot(std::io::stdout()).unwrap();
//! ```

pub mod dsv;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;

pub use engine::ReplayEngine;
pub use error::{LedgerError, Result};
pub use event::{Event, EventKind};
pub use ledger::{
    CashAccount, DuesHistoryRecord, LedgerConfig, MemberAccount, MemberSnapshot,
    RegisteredTransaction,
};
