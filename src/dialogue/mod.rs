//! Pricing dialogue. The per-user conversation that collects material,
//! size and quantity, then quotes a price.
//!
//! The dialogue is a linear state machine. `Dialogue::transition` is pure:
//! it takes the user's current session and an event and returns the session
//! change plus the reply, so it can be driven without any messaging channel.

pub mod event;
pub mod input;
pub mod machine;
pub mod prompts;
pub mod reply;
pub mod state;

pub use event::{Event, RESTART_DATA};
pub use machine::{Dialogue, SessionChange, Transition};
pub use reply::{Button, Reply};
pub use state::{Order, Selection, Session, Step, StepKind};
