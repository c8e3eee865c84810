//! Terminal escape sequence parser
//!
//! A stateful parser that converts bytes into terminal actions. It is
//! resumable across arbitrary chunk boundaries.

mod action;
mod state;

pub use action::{Action, CsiAction, EscAction};
pub use state::Parser;
