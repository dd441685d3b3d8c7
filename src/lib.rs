//! `scaffold` - project file generator with an undo ledger.
//!
//! Generation runs are a sequence of tasks. Every task that touches the
//! filesystem records how to undo itself in a [`ledger::RollbackLedger`];
//! when a task fails the ledger is replayed and the project is left the way
//! it was before the command started.

pub mod cli;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fsops;
pub mod index;
pub mod ledger;
pub mod model;
pub mod reporter;
pub mod resolve;
pub mod tasks;
pub mod validate;
