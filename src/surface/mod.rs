//! Rendering abstraction.
//!
//! The dialog engine never touches a UI toolkit. It talks to a
//! [`ChatSurface`]: show a message, show/disable/clear a block of option
//! buttons, lock or unlock free-text input.

pub mod terminal;
pub mod transcript;

use serde::{Deserialize, Serialize};

pub use terminal::TerminalSurface;
pub use transcript::{Transcript, TranscriptEvent};

/// Identifies one rendered block of option buttons.
pub type OptionBlockId = u64;

/// Who a chat bubble belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bot,
    Visitor,
}

/// A button as the surface renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub label: String,
    pub value: String,
}

/// Capability the dialog engine renders through.
pub trait ChatSurface: Send {
    fn show_message(&mut self, speaker: Speaker, text: &str);

    /// A corrective or system notice (invalid turn, re-prompt, reset).
    fn show_notice(&mut self, text: &str);

    fn show_options(&mut self, block: OptionBlockId, options: &[OptionView]);

    /// Keep the block visible but stop accepting clicks on it.
    fn disable_options(&mut self, block: OptionBlockId);

    /// Remove the block entirely.
    fn clear_options(&mut self, block: OptionBlockId);

    fn set_input_locked(&mut self, locked: bool);
}
