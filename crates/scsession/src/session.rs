//! Session state machine, id allocation, and RAII-guarded nodes/buffers.
//!
//! ID allocation is grounded on the teacher's
//! `vibelang-core/src/state/model.rs::ScriptState` (`next_synth_node_id`/
//! `next_buffer_id` monotonic counters via `allocate_*` methods), with
//! spec.md's own defaults (node ids from `1000`, buffer ids from `0`)
//! rather than the teacher's. The idempotent free-on-every-exit-path
//! guarantee for [`ManagedNode`]/[`ManagedBuffer`] is grounded on
//! `vibelang-core/src/scsynth_process.rs::ScsynthProcess`'s `Drop` impl,
//! which is the one place in the teacher that frees a resource
//! idempotently regardless of how its owner's scope ends.

use std::time::Duration;

use crate::commands::Commands;
use crate::errors::{Result, SessionError};
use crate::node::{AddAction, BufNum, NodeId, Target};
use crate::options::ServerOptions;
use crate::reply::ReplyPump;
use crate::shim::EngineShim;

/// Lifecycle state of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Offline,
    Booting,
    Online,
    Quitting,
}

/// A running (or not-yet-running) connection to one synthesis engine.
pub struct Session<E: EngineShim> {
    engine: E,
    commands: Option<Commands>,
    reply_pump: Option<ReplyPump>,
    state: SessionState,
    options: ServerOptions,
    next_node_id: i32,
    next_buffer_id: i32,
}

impl<E: EngineShim> Session<E> {
    pub fn new(engine: E, options: ServerOptions) -> Session<E> {
        Session {
            engine,
            commands: None,
            reply_pump: None,
            state: SessionState::Offline,
            options,
            next_node_id: 1000,
            next_buffer_id: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Boot the engine and, if it exposes a real transport, bring up
    /// the reply pump and subscribe to server notifications. Booting an
    /// already-`Online` session is a no-op; booting while `Booting` or
    /// `Quitting` is an error, since neither state has a well-defined
    /// "already done" outcome to return instead.
    pub fn boot(&mut self) -> Result<()> {
        if self.state == SessionState::Online {
            return Ok(());
        }
        if self.state != SessionState::Offline {
            return Err(SessionError::AlreadyRunning(self.state));
        }
        self.state = SessionState::Booting;
        if let Err(e) = self.engine.boot(&self.options) {
            self.state = SessionState::Offline;
            return Err(e);
        }

        if let Some(osc) = self.engine.osc_client() {
            let commands = Commands::new(osc.clone());
            commands.notify(true)?;
            self.reply_pump = Some(ReplyPump::start(osc));
            self.commands = Some(commands);
        }

        self.state = SessionState::Online;
        Ok(())
    }

    /// Tear the engine down. Safe to call more than once; a second call
    /// on an already-offline session is a no-op rather than an error,
    /// matching `ProcessEngine`'s idempotent `Drop`.
    pub fn quit(&mut self) -> Result<()> {
        if self.state == SessionState::Offline {
            return Ok(());
        }
        self.state = SessionState::Quitting;
        self.engine.quit()?;
        self.reply_pump = None;
        self.commands = None;
        self.state = SessionState::Offline;
        Ok(())
    }

    fn commands(&self) -> Result<&Commands> {
        if self.state != SessionState::Online {
            return Err(SessionError::NotRunning(self.state));
        }
        self.commands.as_ref().ok_or(SessionError::NotRunning(self.state))
    }

    pub fn alloc_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        NodeId(id)
    }

    pub fn alloc_buffer_id(&mut self) -> Result<BufNum> {
        if self.next_buffer_id as u32 >= self.options.num_buffers {
            return Err(SessionError::BufferIdPoolExhausted);
        }
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        Ok(BufNum(id))
    }

    /// Load a compiled SynthDef's encoded bytes onto the engine.
    pub fn load_synthdef(&self, bytes: Vec<u8>) -> Result<()> {
        self.commands()?.d_recv(bytes)
    }

    /// Instantiate a synth and return a lightweight, non-owning proxy:
    /// no `Drop` impl frees it automatically. Use this for synths whose
    /// lifetime outlives the scope that created them (e.g. handed off to
    /// a longer-lived group). For automatic cleanup, use
    /// [`Session::managed_synth`].
    pub fn synth(
        &mut self,
        def_name: &str,
        action: AddAction,
        target: Target,
        controls: &[(&str, f32)],
    ) -> Result<NodeProxy> {
        let commands = self.commands()?.clone();
        let id = self.alloc_node_id();
        commands.s_new(def_name, id, action, target, controls)?;
        Ok(NodeProxy { commands, id })
    }

    /// Create a group and return a lightweight, non-owning proxy. See
    /// [`Session::synth`] for why this doesn't auto-free.
    pub fn group(&mut self, action: AddAction, target: Target) -> Result<NodeProxy> {
        let commands = self.commands()?.clone();
        let id = self.alloc_node_id();
        commands.g_new(id, action, target)?;
        Ok(NodeProxy { commands, id })
    }

    /// Instantiate a synth and return a guard that frees it on drop.
    pub fn managed_synth(
        &mut self,
        def_name: &str,
        action: AddAction,
        target: Target,
        controls: &[(&str, f32)],
    ) -> Result<ManagedNode> {
        let commands = self.commands()?.clone();
        let id = self.alloc_node_id();
        commands.s_new(def_name, id, action, target, controls)?;
        Ok(ManagedNode { commands, id, freed: false })
    }

    /// Create a group and return a guard that frees it on drop.
    pub fn managed_group(&mut self, action: AddAction, target: Target) -> Result<ManagedNode> {
        let commands = self.commands()?.clone();
        let id = self.alloc_node_id();
        commands.g_new(id, action, target)?;
        Ok(ManagedNode { commands, id, freed: false })
    }

    /// Allocate a buffer and return a guard that frees it on drop.
    pub fn managed_buffer(&mut self, num_frames: i32, num_channels: i32) -> Result<ManagedBuffer> {
        let commands = self.commands()?.clone();
        let id = self.alloc_buffer_id()?;
        commands.b_alloc(id, num_frames, num_channels)?;
        Ok(ManagedBuffer { commands, id, freed: false })
    }

    /// Allocate a buffer, fill it from a sound file, and return a guard
    /// that frees it on drop.
    pub fn managed_read_buffer(&mut self, path: &str, start_frame: i32, num_frames: i32) -> Result<ManagedBuffer> {
        let commands = self.commands()?.clone();
        let id = self.alloc_buffer_id()?;
        commands.b_alloc_read(id, path, start_frame, num_frames)?;
        Ok(ManagedBuffer { commands, id, freed: false })
    }

    /// Send one OSC message and block until a reply at `reply_address`
    /// arrives or `timeout` elapses — the "send, then wait for the
    /// correlated reply" pattern every request/reply command needs.
    /// `send` is handed the session's `Commands` so callers can build
    /// arbitrary wire messages without exposing the pump or transport.
    pub fn send_msg_sync(
        &self,
        send: impl FnOnce(&Commands) -> Result<()>,
        reply_address: &str,
        timeout: Duration,
    ) -> Result<rosc::OscMessage> {
        let commands = self.commands()?;
        let pump = self.reply_pump.as_ref().ok_or(SessionError::NotRunning(self.state))?;
        send(commands)?;
        pump.wait_for(reply_address, timeout)
    }

    /// Send `/status` and wait for the matching `/status.reply`.
    pub fn status(&self, timeout: Duration) -> Result<rosc::OscMessage> {
        self.send_msg_sync(|commands| commands.status(), "/status.reply", timeout)
    }
}

/// A node id handed out by [`Session::synth`]/[`Session::group`]: a
/// plain proxy with no `Drop` behavior. The caller owns the node's
/// lifetime and is responsible for freeing it explicitly.
pub struct NodeProxy {
    commands: Commands,
    id: NodeId,
}

impl NodeProxy {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn set(&self, controls: &[(&str, f32)]) -> Result<()> {
        self.commands.n_set(self.id, controls)
    }

    pub fn free(&self) -> Result<()> {
        self.commands.n_free(&[self.id])
    }
}

/// A node id whose lifetime is tied to this guard: dropping it sends
/// `/n_free`, on every exit path including a panic unwind.
pub struct ManagedNode {
    commands: Commands,
    id: NodeId,
    freed: bool,
}

impl ManagedNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn set(&self, controls: &[(&str, f32)]) -> Result<()> {
        self.commands.n_set(self.id, controls)
    }

    /// Free the node now, consuming the guard (so `Drop` does not try
    /// to free it again).
    pub fn free(mut self) -> Result<()> {
        self.freed = true;
        self.commands.n_free(&[self.id])
    }
}

impl Drop for ManagedNode {
    fn drop(&mut self) {
        if !self.freed {
            self.freed = true;
            let _ = self.commands.n_free(&[self.id]);
        }
    }
}

/// A buffer id whose lifetime is tied to this guard: dropping it sends
/// `/b_free`.
pub struct ManagedBuffer {
    commands: Commands,
    id: BufNum,
    freed: bool,
}

impl ManagedBuffer {
    pub fn id(&self) -> BufNum {
        self.id
    }

    pub fn free(mut self) -> Result<()> {
        self.freed = true;
        self.commands.b_free(self.id)
    }
}

impl Drop for ManagedBuffer {
    fn drop(&mut self) {
        if !self.freed {
            self.freed = true;
            let _ = self.commands.b_free(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::NoopEngine;

    fn session() -> Session<NoopEngine> {
        Session::new(NoopEngine::new(), ServerOptions::default())
    }

    #[test]
    fn boots_into_online_state() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Offline);
        s.boot().unwrap();
        assert_eq!(s.state(), SessionState::Online);
    }

    #[test]
    fn double_boot_from_online_is_a_no_op() {
        let mut s = session();
        s.boot().unwrap();
        assert!(s.boot().is_ok());
        assert_eq!(s.state(), SessionState::Online);
    }

    #[test]
    fn quit_is_idempotent() {
        let mut s = session();
        s.boot().unwrap();
        s.quit().unwrap();
        assert_eq!(s.state(), SessionState::Offline);
        s.quit().unwrap();
    }

    #[test]
    fn node_ids_start_at_1000_and_increment() {
        let mut s = session();
        assert_eq!(s.alloc_node_id().as_i32(), 1000);
        assert_eq!(s.alloc_node_id().as_i32(), 1001);
    }

    #[test]
    fn buffer_ids_start_at_zero() {
        let mut s = session();
        assert_eq!(s.alloc_buffer_id().unwrap().as_i32(), 0);
        assert_eq!(s.alloc_buffer_id().unwrap().as_i32(), 1);
    }

    #[test]
    fn commands_unavailable_while_offline() {
        let s = session();
        assert!(matches!(s.commands(), Err(SessionError::NotRunning(_))));
    }

    #[test]
    fn load_synthdef_requires_online_session() {
        let s = session();
        assert!(s.load_synthdef(vec![1, 2, 3]).is_err());
    }
}
