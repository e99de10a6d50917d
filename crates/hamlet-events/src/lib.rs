//! Community events and the research log for the Hamlet simulation.
//!
//! # Modules
//!
//! - [`community`] -- phase-sequenced community events that pre-empt the
//!   cognitive cycle while active
//! - [`log`] -- conversation records, information-flow edges, and
//!   emergent phenomena for the research export

pub mod community;
pub mod log;

pub use community::{CommunityEvent, EventManager, EventPhase, PhaseStep};
pub use log::{ConversationLine, ConversationRecord, EmergentPhenomenon, ResearchLog};
