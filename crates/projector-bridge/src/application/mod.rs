//! Application layer for projector-bridge.
//!
//! The application layer orchestrates the session: it knows *what* to do,
//! but delegates *how* to do it to the infrastructure layer through the
//! [`session::RemoteSink`] and [`session::PresentationProcess`] traits.
//!
//! # Responsibilities
//!
//! - Validating subscriber JSON and turning it into remote commands
//! - Turning remote events into subscriber JSON
//! - Running the session actor: registry, status, owner timer, termination
//! - Defining the error types shared by the whole bridge
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or spawning processes (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod errors;
pub mod owner_timer;
pub mod session;
pub mod translate;

pub use errors::{CommandError, LinkError, SessionError};
pub use session::{
    Admission, PresentationProcess, RemoteSink, SessionActor, SessionHandle, SessionMessage, SubscriberHandle,
    SubscriberId,
};
pub use translate::{authorize, decode_subscriber_frame, event_frame, snapshot_frame};
