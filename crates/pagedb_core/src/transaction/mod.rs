//! Transaction management with ACID guarantees.
//!
//! PageDB serializes all mutation behind a single lock and provides:
//! - **Atomicity**: a commit applies every staged page or none of them
//! - **Consistency**: optimistic base-version checks reject lost updates
//! - **Isolation**: staged edits are invisible until commit
//! - **Durability**: commits are journaled before the record file is touched

mod manager;
mod txn;

pub use manager::TransactionManager;
pub use txn::Transaction;
