//! Beat-synchronised program playback.
//!
//! This module provides:
//! - The musical clock and its phase math
//! - The sample registry and program source markers
//! - The cue state machine that swaps programs on bar boundaries
//! - The chunked renderer and the real-time deck driver

pub mod clock;
pub mod command;
pub mod cue;
pub mod deck;
pub mod events;
pub mod kernel;
pub mod program;
pub mod registry;
pub mod renderer;

pub use clock::{BeatClock, BeatPhase, ClockEvent, Tempo, BARS_PER_PHRASE, BEATS_PER_BAR};
pub use command::DeckCommand;
pub use cue::{CueController, CueEvent, CueStatus};
pub use deck::{deck, guest_deck, BlockReport, Deck, DeckEvent, DeckHandle};
pub use events::{Notifier, Subscription};
pub use kernel::{ComputeKernel, RenderBlock, RenderParams, SynthBackend};
pub use program::{Program, ProgramInterface, MAX_PROGRAM_PARAMS, MAX_PROGRAM_SAMPLES};
pub use registry::{EncodedSample, RegistryEvent, SampleEntry, SampleMap, SampleRegistry};
pub use renderer::{ChunkRenderer, RenderInputs};
