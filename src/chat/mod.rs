//! Chat surface
//!
//! Slash commands (`/help`, `/status`, `/inject <kind>`, `/postmortem`, `/reset`)
//! answered against the run coordinator. An inject streams the run's filtered
//! trace back through a [`ReplySink`] until its sentinel or an idle timeout.

mod command;
mod session;

pub use command::ChatCommand;
pub use session::{ChatSession, ReplySink, help_text, usage_text};
