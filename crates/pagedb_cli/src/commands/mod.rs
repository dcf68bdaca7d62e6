//! CLI command implementations.

pub mod dump_journal;
pub mod history;
pub mod inspect;
pub mod mv;
pub mod put;
pub mod rm;
pub mod show;
pub mod verify;
