//! Local media acquisition and remote stream bookkeeping
//!
//! The crate does not capture or packetize media; it owns track *handles*.
//! Acquisition is behind [`LocalMediaSource`] so the host decides where
//! samples come from, and the per-track `enabled` flag is the mute
//! mechanism the host's sample pump must honor.

mod local;
mod remote;

pub use local::{LocalMedia, LocalMediaSource, LocalTrack, MediaKind, StaticMediaSource};
pub use remote::RemoteStreamInfo;
