//! The session controller: public surface, inbound handlers, observable state

mod controller;
mod handlers;
mod state;

#[cfg(test)]
pub(crate) mod test_util;

pub use controller::RoomSession;
pub use state::{AttributedError, SessionEvent, SessionSnapshot};
