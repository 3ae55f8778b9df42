//! Wire protocol command builders.
//!
//! Generalizes the teacher's `vibelang-core/src/scsynth.rs::Scsynth`
//! (which covers `d_recv`/`s_new`/`n_set`/`n_free`/`g_new`/`b_alloc`/
//! `b_alloc_read`/`b_write`/`b_close`/`b_free`) to the full command set
//! spec.md §4.8 names, adding `b_read`, `b_zero`, `status`, and `quit`,
//! which the teacher never needed (it always keeps scsynth running and
//! never reads a buffer back from disk into an in-use slot).

use log::debug;
use rosc::OscType;

use crate::errors::Result;
use crate::node::{AddAction, BufNum, NodeId, Target};
use crate::osc::OscClient;

/// Sends scsynth wire-protocol commands over an [`OscClient`].
#[derive(Clone)]
pub struct Commands {
    osc: OscClient,
}

impl Commands {
    pub fn new(osc: OscClient) -> Commands {
        Commands { osc }
    }

    /// `/notify` — subscribe to/unsubscribe from async notifications.
    pub fn notify(&self, on: bool) -> Result<()> {
        self.osc.send("/notify", vec![OscType::Int(on as i32)])
    }

    /// `/status` — request a `/status.reply`.
    pub fn status(&self) -> Result<()> {
        self.osc.send("/status", vec![])
    }

    /// `/quit` — ask scsynth to shut down cleanly.
    pub fn quit(&self) -> Result<()> {
        self.osc.send("/quit", vec![])
    }

    /// `/d_recv` — load a compiled SynthDef (or several, packed by
    /// [`scgraph::encoder::encode_synthdefs`]) from its SCgf bytes.
    pub fn d_recv(&self, bytes: Vec<u8>) -> Result<()> {
        debug!("d_recv: {} bytes", bytes.len());
        self.osc.send("/d_recv", vec![OscType::Blob(bytes)])
    }

    /// `/s_new` — instantiate a synth.
    pub fn s_new(
        &self,
        def_name: &str,
        node_id: NodeId,
        action: AddAction,
        target: Target,
        controls: &[(&str, f32)],
    ) -> Result<()> {
        debug!("s_new: {def_name} -> {node_id:?}");
        let mut args = vec![
            OscType::String(def_name.to_string()),
            node_id.into(),
            action.into(),
            target.into(),
        ];
        for (name, value) in controls {
            args.push(OscType::String(name.to_string()));
            args.push(OscType::Float(*value));
        }
        self.osc.send("/s_new", args)
    }

    /// `/n_set` — update one or more controls on a running node.
    pub fn n_set(&self, node_id: NodeId, controls: &[(&str, f32)]) -> Result<()> {
        let mut args = vec![node_id.into()];
        for (name, value) in controls {
            args.push(OscType::String(name.to_string()));
            args.push(OscType::Float(*value));
        }
        self.osc.send("/n_set", args)
    }

    /// `/n_free` — free one or more nodes.
    pub fn n_free(&self, node_ids: &[NodeId]) -> Result<()> {
        let args = node_ids.iter().map(|id| (*id).into()).collect();
        self.osc.send("/n_free", args)
    }

    /// `/n_run` — pause (`0`) or resume (`1`) a node.
    pub fn n_run(&self, node_id: NodeId, running: bool) -> Result<()> {
        self.osc.send("/n_run", vec![node_id.into(), OscType::Int(running as i32)])
    }

    /// `/g_new` — create a group.
    pub fn g_new(&self, node_id: NodeId, action: AddAction, target: Target) -> Result<()> {
        self.osc.send("/g_new", vec![node_id.into(), action.into(), target.into()])
    }

    /// `/g_freeAll` — free every node in a group.
    pub fn g_free_all(&self, group_id: NodeId) -> Result<()> {
        self.osc.send("/g_freeAll", vec![group_id.into()])
    }

    /// `/b_alloc` — allocate an empty buffer.
    pub fn b_alloc(&self, buf: BufNum, num_frames: i32, num_channels: i32) -> Result<()> {
        self.osc.send(
            "/b_alloc",
            vec![buf.into(), OscType::Int(num_frames), OscType::Int(num_channels)],
        )
    }

    /// `/b_allocRead` — allocate a buffer and fill it from a sound file.
    pub fn b_alloc_read(&self, buf: BufNum, path: &str, start_frame: i32, num_frames: i32) -> Result<()> {
        self.osc.send(
            "/b_allocRead",
            vec![buf.into(), OscType::String(path.to_string()), OscType::Int(start_frame), OscType::Int(num_frames)],
        )
    }

    /// `/b_read` — fill an already-allocated buffer from a sound file.
    pub fn b_read(
        &self,
        buf: BufNum,
        path: &str,
        start_frame: i32,
        num_frames: i32,
        buf_start_frame: i32,
        leave_open: bool,
    ) -> Result<()> {
        self.osc.send(
            "/b_read",
            vec![
                buf.into(),
                OscType::String(path.to_string()),
                OscType::Int(start_frame),
                OscType::Int(num_frames),
                OscType::Int(buf_start_frame),
                OscType::Int(leave_open as i32),
            ],
        )
    }

    /// `/b_write` — write a buffer's contents to a sound file.
    pub fn b_write(
        &self,
        buf: BufNum,
        path: &str,
        header_format: &str,
        sample_format: &str,
        num_frames: i32,
        start_frame: i32,
        leave_open: bool,
    ) -> Result<()> {
        self.osc.send(
            "/b_write",
            vec![
                buf.into(),
                OscType::String(path.to_string()),
                OscType::String(header_format.to_string()),
                OscType::String(sample_format.to_string()),
                OscType::Int(num_frames),
                OscType::Int(start_frame),
                OscType::Int(leave_open as i32),
            ],
        )
    }

    /// `/b_zero` — zero a buffer's contents in place.
    pub fn b_zero(&self, buf: BufNum) -> Result<()> {
        self.osc.send("/b_zero", vec![buf.into()])
    }

    /// `/b_close` — close a buffer's soundfile handle without freeing it.
    pub fn b_close(&self, buf: BufNum) -> Result<()> {
        self.osc.send("/b_close", vec![buf.into()])
    }

    /// `/b_free` — free a buffer's memory.
    pub fn b_free(&self, buf: BufNum) -> Result<()> {
        self.osc.send("/b_free", vec![buf.into()])
    }
}
