//! The engine embedding boundary: boot, feed it packets, and tear it
//! down.
//!
//! Grounded on the teacher's `vibelang-core/src/scsynth_process.rs`
//! (`find_scsynth`, `ScsynthProcess::start`, its idempotent `Drop`).
//! Like the teacher, this crate embeds the synthesis engine as a
//! spawned child process rather than through FFI — the teacher's
//! architecture never links a scsynth shared library directly, it
//! always talks to a separate `scsynth` binary over OSC, so
//! [`ProcessEngine`] keeps that shape. [`EngineShim`] names the five
//! operations spec.md requires of the embedding (`world_new` ~ `boot`,
//! `world_send_packet` ~ `send_packet`, the reply/print callback
//! hooks, `world_cleanup`/`world_wait_for_quit` ~ `quit`/`Drop`) as a
//! trait so `scsession`'s tests can swap in [`NoopEngine`] instead of
//! spawning a real binary.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::errors::{Result, SessionError};
use crate::options::ServerOptions;
use crate::osc::OscClient;

/// A callback invoked with every OSC reply the engine sends.
pub type ReplyCallback = Box<dyn Fn(rosc::OscMessage) + Send + 'static>;
/// A callback invoked with every line of the engine's stdout/stderr.
pub type PrintCallback = Box<dyn Fn(&str) + Send + 'static>;

/// The embedding boundary a [`crate::session::Session`] drives.
pub trait EngineShim: Send {
    fn boot(&mut self, options: &ServerOptions) -> Result<()>;
    fn send_packet(&self, bytes: &[u8]) -> Result<()>;
    fn osc_client(&self) -> Option<OscClient>;
    fn is_running(&self) -> bool;
    fn quit(&mut self) -> Result<()>;
}

/// Locate the `scsynth` binary the same way the teacher does: check
/// `SCSYNTH_PATH`, then fall back to `scsynth` on `$PATH`.
pub fn find_scsynth() -> PathBuf {
    if let Ok(path) = std::env::var("SCSYNTH_PATH") {
        return PathBuf::from(path);
    }
    PathBuf::from("scsynth")
}

/// Embeds the synthesis engine as a spawned `scsynth`-compatible child
/// process, talking to it over loopback UDP.
pub struct ProcessEngine {
    child: Option<Child>,
    osc: Option<OscClient>,
    running: Arc<AtomicBool>,
}

impl ProcessEngine {
    pub fn new() -> ProcessEngine {
        ProcessEngine { child: None, osc: None, running: Arc::new(AtomicBool::new(false)) }
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        ProcessEngine::new()
    }
}

impl EngineShim for ProcessEngine {
    fn boot(&mut self, options: &ServerOptions) -> Result<()> {
        let binary = find_scsynth();
        info!("booting engine: {} -u {}", binary.display(), options.port);
        let child = Command::new(&binary)
            .arg("-u")
            .arg(options.port.to_string())
            .arg("-i")
            .arg(options.num_input_bus_channels.to_string())
            .arg("-o")
            .arg(options.num_output_bus_channels.to_string())
            .arg("-a")
            .arg(options.num_audio_bus_channels.to_string())
            .arg("-c")
            .arg(options.num_control_bus_channels.to_string())
            .arg("-b")
            .arg(options.num_buffers.to_string())
            .arg("-n")
            .arg(options.max_nodes.to_string())
            .arg("-d")
            .arg(options.max_synthdefs.to_string())
            .arg("-z")
            .arg(options.block_size.to_string())
            .arg("-S")
            .arg(options.sample_rate.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SessionError::Engine(format!("failed to spawn {}: {e}", binary.display())))?;

        let mut child = child;
        spawn_log_readers(&mut child);

        self.osc = Some(OscClient::connect(format!("127.0.0.1:{}", options.port))?);
        self.child = Some(child);
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn send_packet(&self, bytes: &[u8]) -> Result<()> {
        let osc = self.osc.as_ref().ok_or_else(|| SessionError::Engine("engine not booted".into()))?;
        osc.send_raw(bytes)
    }

    fn osc_client(&self) -> Option<OscClient> {
        self.osc.clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn quit(&mut self) -> Result<()> {
        if let Some(osc) = &self.osc {
            let _ = osc.send("/quit", vec![]);
        }
        self.running.store(false, Ordering::Release);
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}

/// Pipe the child's stdout/stderr into `log`, same as the teacher's
/// `ScsynthProcess::start` does for its captured output.
fn spawn_log_readers(child: &mut Child) {
    use std::io::{BufRead, BufReader};

    if let Some(stdout) = child.stdout.take() {
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                info!("[engine] {line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                warn!("[engine] {line}");
            }
        });
    }
}

/// An engine that never actually talks to a process or socket, used by
/// `scsession`'s lifecycle tests (mirrors the teacher's
/// `Scsynth::noop()`/`OscClient::noop()` test doubles).
#[derive(Default)]
pub struct NoopEngine {
    running: bool,
    sent: Vec<Vec<u8>>,
}

impl NoopEngine {
    pub fn new() -> NoopEngine {
        NoopEngine::default()
    }

    pub fn sent_packets(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

impl EngineShim for NoopEngine {
    fn boot(&mut self, _options: &ServerOptions) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn send_packet(&self, _bytes: &[u8]) -> Result<()> {
        if !self.running {
            return Err(SessionError::Engine("engine not booted".into()));
        }
        Ok(())
    }

    fn osc_client(&self) -> Option<OscClient> {
        None
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn quit(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if self.child.is_some() {
            warn!("ProcessEngine dropped while running; killing child");
            let _ = self.quit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_engine_rejects_packets_before_boot() {
        let engine = NoopEngine::new();
        assert!(engine.send_packet(&[1, 2, 3]).is_err());
    }

    #[test]
    fn noop_engine_accepts_packets_after_boot() {
        let mut engine = NoopEngine::new();
        engine.boot(&ServerOptions::default()).unwrap();
        assert!(engine.send_packet(&[1, 2, 3]).is_ok());
        assert!(engine.is_running());
    }

    #[test]
    fn noop_engine_quit_stops_accepting_packets() {
        let mut engine = NoopEngine::new();
        engine.boot(&ServerOptions::default()).unwrap();
        engine.quit().unwrap();
        assert!(!engine.is_running());
        assert!(engine.send_packet(&[]).is_err());
    }

    #[test]
    fn find_scsynth_defaults_to_path_lookup() {
        std::env::remove_var("SCSYNTH_PATH");
        assert_eq!(find_scsynth(), PathBuf::from("scsynth"));
    }
}
