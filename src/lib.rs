//! Client-side session core for a multi-agent coding orchestrator.
//!
//! One event stream feeds three independent projections:
//! - [`conversation::ConversationReducer`] folds deltas into the transcript
//! - [`change_queue::ChangeQueue`] tracks proposed file changes and the
//!   approve/reject round trip
//! - [`timeline::TimelineProjector`] keeps a bounded activity log
//!
//! [`session::Session`] owns all of them plus the injected channel and HTTP
//! collaborators. Display text is produced by [`sanitizer`] at render time.
//!
//! Invariant: there is exactly one writer. Events and user actions are applied
//! one at a time, so no projection needs a lock.

pub mod backend;
pub mod change_queue;
pub mod context;
pub mod conversation;
pub mod error;
pub mod sanitizer;
pub mod session;
pub mod timeline;

pub use backend::{OrchestratorBackend, OutboundChannel};
pub use change_queue::{
    ApprovalGateway, Change, ChangeQueue, ChangeStatus, Decision, ResumeTicket,
    APPROVED_HISTORY_CAPACITY,
};
pub use context::{ContextAssembler, FileSource};
pub use conversation::{ConversationReducer, Message, MessageId, MessageKind, ReducerHost};
pub use error::SessionError;
pub use sanitizer::{sanitize, SanitizedText, StreamSanitizer};
pub use session::{DecisionOutcome, Session};
pub use timeline::{TimelineEntry, TimelineKind, TimelineProjector, TIMELINE_CAPACITY};
