//! In-memory transcript surface, used by the HTTP API and by tests.

use serde::Serialize;

use super::{ChatSurface, OptionBlockId, OptionView, Speaker};

/// Everything the engine rendered, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    Message { speaker: Speaker, text: String },
    Notice { text: String },
    Options { block: OptionBlockId, options: Vec<OptionView> },
    OptionsDisabled { block: OptionBlockId },
    OptionsCleared { block: OptionBlockId },
    InputLocked { locked: bool },
}

#[derive(Debug, Clone)]
struct VisibleBlock {
    block: OptionBlockId,
    options: Vec<OptionView>,
    disabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    events: Vec<TranscriptEvent>,
    cursor: usize,
    visible: Vec<VisibleBlock>,
    input_locked: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TranscriptEvent] {
        &self.events
    }

    /// Events rendered since the previous call.
    pub fn drain_new(&mut self) -> Vec<TranscriptEvent> {
        let fresh = self.events[self.cursor..].to_vec();
        self.cursor = self.events.len();
        fresh
    }

    /// Bot and visitor bubbles, in order.
    pub fn messages(&self) -> Vec<(Speaker, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TranscriptEvent::Message { speaker, text } => Some((*speaker, text.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TranscriptEvent::Notice { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last_bot_message(&self) -> Option<&str> {
        self.messages()
            .into_iter()
            .rev()
            .find(|(speaker, _)| *speaker == Speaker::Bot)
            .map(|(_, text)| text)
    }

    /// Option blocks currently on screen, clickable or not.
    pub fn visible_option_blocks(&self) -> usize {
        self.visible.len()
    }

    /// Buttons of the clickable block, if any.
    pub fn active_options(&self) -> Option<&[OptionView]> {
        self.visible
            .iter()
            .rev()
            .find(|b| !b.disabled)
            .map(|b| b.options.as_slice())
    }

    pub fn input_locked(&self) -> bool {
        self.input_locked
    }
}

impl ChatSurface for Transcript {
    fn show_message(&mut self, speaker: Speaker, text: &str) {
        self.events.push(TranscriptEvent::Message {
            speaker,
            text: text.to_string(),
        });
    }

    fn show_notice(&mut self, text: &str) {
        self.events.push(TranscriptEvent::Notice {
            text: text.to_string(),
        });
    }

    fn show_options(&mut self, block: OptionBlockId, options: &[OptionView]) {
        self.visible.push(VisibleBlock {
            block,
            options: options.to_vec(),
            disabled: false,
        });
        self.events.push(TranscriptEvent::Options {
            block,
            options: options.to_vec(),
        });
    }

    fn disable_options(&mut self, block: OptionBlockId) {
        if let Some(b) = self.visible.iter_mut().find(|b| b.block == block) {
            b.disabled = true;
            self.events.push(TranscriptEvent::OptionsDisabled { block });
        }
    }

    fn clear_options(&mut self, block: OptionBlockId) {
        let before = self.visible.len();
        self.visible.retain(|b| b.block != block);
        if self.visible.len() != before {
            self.events.push(TranscriptEvent::OptionsCleared { block });
        }
    }

    fn set_input_locked(&mut self, locked: bool) {
        if self.input_locked != locked {
            self.input_locked = locked;
            self.events.push(TranscriptEvent::InputLocked { locked });
        }
    }
}
