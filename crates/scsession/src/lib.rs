//! Control-plane session manager for an embedded SuperCollider-compatible
//! synthesis engine.
//!
//! `scsession` owns the lifecycle of one running engine process:
//! booting it ([`shim::EngineShim`]), speaking its OSC wire protocol
//! ([`commands::Commands`] over [`osc::OscClient`]), demultiplexing its
//! asynchronous replies ([`reply::ReplyPump`]), and handing out
//! RAII-guarded node/buffer ids ([`session::Session`],
//! [`session::ManagedNode`], [`session::ManagedBuffer`]) so that a
//! panic partway through a synth's lifetime still frees it.
//!
//! ## Architecture
//!
//! A [`session::Session`] is generic over an [`shim::EngineShim`]
//! implementation: [`shim::ProcessEngine`] spawns a real `scsynth`-style
//! child process, while [`shim::NoopEngine`] is a test double used by
//! this crate's own lifecycle tests. `scgraph`'s compiled graphs are
//! handed to [`session::Session::load_synthdef`] as already-encoded SCgf
//! bytes; this crate has no dependency on graph construction itself.

pub mod commands;
pub mod errors;
pub mod node;
pub mod options;
pub mod osc;
pub mod reply;
pub mod session;
pub mod shim;

pub use errors::{Result, SessionError};
pub use options::ServerOptions;
pub use session::{ManagedBuffer, ManagedNode, NodeProxy, Session, SessionState};
pub use shim::{EngineShim, NoopEngine, ProcessEngine};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_and_offline_session_are_consistent() {
        let session = Session::new(NoopEngine::new(), ServerOptions::default());
        assert_eq!(session.state(), SessionState::Offline);
    }
}
