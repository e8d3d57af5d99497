//! The dialog engine: script, scheduling and per-visitor sessions.

pub mod node;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod template;

pub use node::{DialogNode, DialogOption, ExtractorKind, NodeId, NodeKind};
pub use scheduler::{ScheduleHandle, Transition, TransitionScheduler};
pub use script::{NodeTable, OTHER_INDUSTRY};
pub use session::{
    BeginDelivery, ConversationSession, DeliveryReport, DeliveryState, PendingDelivery, Phase,
    SessionDeps, SessionSnapshot,
};
pub use template::{PromptContext, render};
