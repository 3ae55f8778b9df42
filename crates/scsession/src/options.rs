//! Server boot options.
//!
//! Plain struct with a `Default` impl rather than an external config
//! file format — matching the teacher's own `ScsynthProcess::start`,
//! which takes its handful of knobs (port, channel counts) as plain
//! arguments rather than reading a config file. Defaults match
//! scsynth's own documented defaults (spec.md §6), not the teacher's
//! narrower hand-picked values.

/// Options used to boot the synthesis engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    /// UDP port scsynth listens on.
    pub port: u16,
    pub num_input_bus_channels: u32,
    pub num_output_bus_channels: u32,
    pub num_audio_bus_channels: u32,
    pub num_control_bus_channels: u32,
    pub num_buffers: u32,
    pub max_nodes: u32,
    pub max_synthdefs: u32,
    pub block_size: u32,
    pub sample_rate: u32,
    pub memory_size_kb: u32,
    /// Maximum number of wire buffers used by `Wire`-family internal
    /// connections between UGens.
    pub max_wire_bufs: u32,
    /// Number of per-synth random number generator streams scsynth
    /// allocates for `Rand`/`TRand`/etc.
    pub num_rgens: u32,
    /// Requested hardware I/O buffer size in frames; `0` lets the audio
    /// backend choose its own default.
    pub preferred_hardware_buffer_size: u32,
    /// Whether scsynth preloads SynthDefs from its synthdefs directory
    /// at boot.
    pub load_graph_defs: bool,
    /// Whether scsynth locks its memory pages to prevent paging
    /// (real-time audio hygiene; requires OS-level privileges).
    pub memory_locking: bool,
    /// Whether scsynth runs its audio thread at real-time priority.
    pub realtime: bool,
    /// Shared-memory segment id used for the server's control-bus
    /// interface; `0` disables shared memory.
    pub shared_memory_id: u32,
    /// Output amplitude above which scsynth hard-clips to protect
    /// against runaway signals.
    pub safety_clip_threshold: f32,
    /// Wire-format verbosity level passed straight through to scsynth;
    /// not interpreted by this crate. `0` is scsynth's default
    /// (warnings and errors only); negative values suppress more,
    /// positive values add more logging.
    pub verbosity: i32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            port: 57110,
            num_input_bus_channels: 8,
            num_output_bus_channels: 8,
            num_audio_bus_channels: 1024,
            num_control_bus_channels: 16384,
            num_buffers: 1024,
            max_nodes: 1024,
            max_synthdefs: 1024,
            block_size: 64,
            sample_rate: 44100,
            memory_size_kb: 8192,
            max_wire_bufs: 64,
            num_rgens: 64,
            preferred_hardware_buffer_size: 0,
            load_graph_defs: true,
            memory_locking: false,
            realtime: true,
            shared_memory_id: 0,
            safety_clip_threshold: 1.26,
            verbosity: 0,
        }
    }
}

impl ServerOptions {
    /// Total number of audio+control buses, used to size the allocator
    /// in `session.rs`.
    pub fn total_bus_channels(&self) -> u32 {
        self.num_audio_bus_channels + self.num_control_bus_channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scsynth_conventions() {
        let opts = ServerOptions::default();
        assert_eq!(opts.port, 57110);
        assert_eq!(opts.block_size, 64);
        assert_eq!(opts.sample_rate, 44100);
        assert_eq!(opts.num_input_bus_channels, 8);
        assert_eq!(opts.num_output_bus_channels, 8);
        assert_eq!(opts.num_audio_bus_channels, 1024);
        assert_eq!(opts.num_control_bus_channels, 16384);
        assert_eq!(opts.max_wire_bufs, 64);
        assert_eq!(opts.num_rgens, 64);
        assert_eq!(opts.preferred_hardware_buffer_size, 0);
        assert!(opts.load_graph_defs);
        assert!(!opts.memory_locking);
        assert!(opts.realtime);
        assert_eq!(opts.shared_memory_id, 0);
        assert_eq!(opts.safety_clip_threshold, 1.26);
        assert_eq!(opts.verbosity, 0);
    }

    #[test]
    fn total_bus_channels_sums_audio_and_control() {
        let opts = ServerOptions::default();
        assert_eq!(opts.total_bus_channels(), 1024 + 16384);
    }
}
