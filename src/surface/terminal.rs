//! Terminal surface for the REPL.

use super::{ChatSurface, OptionBlockId, OptionView, Speaker};

/// Renders bubbles as plain lines and buttons as a numbered list.
pub struct TerminalSurface;

impl TerminalSurface {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSurface for TerminalSurface {
    fn show_message(&mut self, speaker: Speaker, text: &str) {
        match speaker {
            Speaker::Bot => println!("\n🤖 {}", text.replace('\n', "\n   ")),
            // The visitor's own line is already on screen.
            Speaker::Visitor => {}
        }
    }

    fn show_notice(&mut self, text: &str) {
        eprintln!("ℹ️  {text}");
    }

    fn show_options(&mut self, _block: OptionBlockId, options: &[OptionView]) {
        for (i, option) in options.iter().enumerate() {
            println!("   [{}] {}", i + 1, option.label);
        }
        eprintln!("   (escriba el número de una opción)");
    }

    fn disable_options(&mut self, _block: OptionBlockId) {}

    fn clear_options(&mut self, _block: OptionBlockId) {}

    fn set_input_locked(&mut self, _locked: bool) {}
}
