//! A deck: one live program, one cue, and the real-time driver that plays them.
//!
//! A deck is split in two halves that live on different contexts:
//!
//! - [`DeckHandle`] stays on the control context. It compiles programs, manages
//!   samples, tempo and parameters, and talks to the audio half through a
//!   lock-free command queue.
//! - [`Deck`] is moved into the audio callback. [`Deck::process_block`] is the
//!   real-time entry point: it drains pending commands, advances the clock,
//!   decides whether the bar boundary falls inside the block and swaps the cued
//!   program in exactly there.
//!
//! A deck either owns its [`BeatClock`] and [`SampleRegistry`] or shares the ones
//! of a host deck (see [`guest_deck`]). Guests read the host clock's time, so the
//! host must be processed first in every audio cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::clock::{BeatClock, BeatPhase, Tempo};
use super::command::{
    command_channel, retire_channel, send, DeckCommand, RetiredPrograms, Retirer,
};
use super::cue::{CueController, CueEvent, CueStatus, Swap};
use super::events::Notifier;
use super::kernel::SynthBackend;
use super::program::{Program, ProgramInterface};
use super::registry::{SampleEntry, SampleRegistry};
use super::renderer::{ChunkRenderer, RenderInputs};
use crate::audio::AudioData;
use crate::config::SynthConfig;
use crate::error::SynthError;

/// Summary of one [`Deck::process_block`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockReport {
    /// Clock time of the first frame.
    pub time: f64,
    pub phase: BeatPhase,
    /// Playback ran on into the next bar since the previous block. Clock jumps
    /// and tempo changes never count.
    pub bar_wrapped: bool,
    /// The cued program went live inside this block.
    pub swapped: bool,
    /// Frames rendered from the program that was live when the block started.
    pub frames_before_boundary: usize,
    pub frames: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeckEvent {
    BlockProcessed(BlockReport),
}

/// Control-context half of a deck.
pub struct DeckHandle<B: SynthBackend> {
    backend: Arc<B>,
    config: SynthConfig,
    clock: Arc<BeatClock>,
    registry: Arc<SampleRegistry<B::Texture>>,
    is_host: bool,
    commands: rtrb::Producer<DeckCommand<B::Program>>,
    retired: RetiredPrograms<B::Program>,
    cue_status: Arc<AtomicU8>,
    parameters: HashMap<String, f32>,
    last_error: Option<String>,
    cue_events: Arc<Notifier<CueEvent>>,
    deck_events: Arc<Notifier<DeckEvent>>,
}

/// Audio-context half of a deck.
pub struct Deck<B: SynthBackend> {
    config: SynthConfig,
    clock: Arc<BeatClock>,
    registry: Arc<SampleRegistry<B::Texture>>,
    is_host: bool,
    commands: rtrb::Consumer<DeckCommand<B::Program>>,
    retirer: Retirer<B::Program>,
    cue: CueController<Program<B::Program>>,
    renderer: ChunkRenderer<B::Kernel>,
    parameters: HashMap<String, f32>,
    last_time: Option<f64>,
    last_bar_index: Option<i64>,
    last_tempo: Option<Tempo>,
    /// Clock jump count seen by the previous block.
    jumps: u64,
    boundary_in_last_block: bool,
    drift_corrections: u64,
    events: Arc<Notifier<DeckEvent>>,
}

/// Create a deck that owns its clock and sample registry.
pub fn deck<B: SynthBackend>(
    backend: Arc<B>,
    config: SynthConfig,
) -> Result<(DeckHandle<B>, Deck<B>), SynthError> {
    config.validate()?;
    let clock = Arc::new(BeatClock::new(config.bpm)?);
    let registry = Arc::new(SampleRegistry::new());
    build(backend, config, clock, registry, true)
}

/// Create a deck that shares `host`'s clock and sample registry.
///
/// The guest's configured bpm is ignored; tempo belongs to the host clock.
pub fn guest_deck<B: SynthBackend>(
    host: &DeckHandle<B>,
    config: SynthConfig,
) -> Result<(DeckHandle<B>, Deck<B>), SynthError> {
    config.validate()?;
    if config.sample_rate != host.config.sample_rate {
        return Err(SynthError::invalid(format!(
            "guest sample rate {} does not match host sample rate {}",
            config.sample_rate, host.config.sample_rate
        )));
    }
    build(
        host.backend.clone(),
        config,
        host.clock.clone(),
        host.registry.clone(),
        false,
    )
}

fn build<B: SynthBackend>(
    backend: Arc<B>,
    config: SynthConfig,
    clock: Arc<BeatClock>,
    registry: Arc<SampleRegistry<B::Texture>>,
    is_host: bool,
) -> Result<(DeckHandle<B>, Deck<B>), SynthError> {
    let kernel = backend.create_kernel(config.layout())?;
    let (tx, rx) = command_channel(config.command_capacity);
    // Every command can displace at most one program.
    let (retirer, retired) = retire_channel(config.command_capacity + 2);
    let cue_status = Arc::new(AtomicU8::new(CueStatus::None as u8));
    let cue_events = Arc::new(Notifier::new());
    let deck_events = Arc::new(Notifier::new());

    let deck = Deck {
        config: config.clone(),
        clock: clock.clone(),
        registry: registry.clone(),
        is_host,
        commands: rx,
        retirer,
        cue: CueController::new(cue_status.clone(), cue_events.clone()),
        renderer: ChunkRenderer::new(kernel, config.layout(), clock.generation()),
        parameters: HashMap::new(),
        last_time: None,
        last_bar_index: None,
        last_tempo: None,
        jumps: clock.jumps(),
        boundary_in_last_block: false,
        drift_corrections: 0,
        events: deck_events.clone(),
    };

    log::info!(
        "Created {} deck: {} Hz, {} frames x {} blocks per render",
        if is_host { "host" } else { "guest" },
        config.sample_rate,
        config.buffer_size,
        config.chunk_size
    );

    let handle = DeckHandle {
        backend,
        config,
        clock,
        registry,
        is_host,
        commands: tx,
        retired,
        cue_status,
        parameters: HashMap::new(),
        last_error: None,
        cue_events,
        deck_events,
    };
    Ok((handle, deck))
}

impl<B: SynthBackend> DeckHandle<B> {
    /// Compile `source` and install it as the cue.
    ///
    /// Samples are bound against the registry as it is right now; a sample
    /// registered later is not visible to this program until the next compile.
    /// On failure the cue is cleared, the live program keeps playing and the
    /// translated message is recorded as [`last_error`](Self::last_error).
    ///
    /// Programs the audio context has retired are released first, as in
    /// [`apply_cue`](Self::apply_cue).
    pub async fn compile(&mut self, source: &str) -> Result<(), SynthError> {
        self.retired.collect();
        let result = match ProgramInterface::scan(source, |name| self.registry.contains(name)) {
            Ok(interface) => self
                .backend
                .compile(source, &interface)
                .await
                .map(|compiled| Program::new(compiled, source, interface)),
            Err(e) => Err(e),
        };

        match result {
            Ok(program) => {
                send(&mut self.commands, DeckCommand::InstallCue(Box::new(program)))?;
                log::info!("Program compiled and cued");
                self.last_error = None;
                self.cue_events.notify(&CueEvent::CompileError(None));
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    SynthError::Compile(err) => SynthError::Compile(
                        err.translate(self.backend.preamble_lines(), source.lines().count() as u32),
                    ),
                    other => other,
                };
                let message = match &e {
                    SynthError::Compile(err) => err.to_string(),
                    other => other.to_string(),
                };
                log::warn!("Compile failed, live program unaffected: {}", message);
                if let Err(queue) = send(&mut self.commands, DeckCommand::ClearCue) {
                    log::warn!("Could not clear cue: {}", queue);
                }
                self.last_error = Some(message.clone());
                self.cue_events.notify(&CueEvent::CompileError(Some(message)));
                Err(e)
            }
        }
    }

    /// Commit the cue for the next bar boundary. Ignored unless the cue is `ready`.
    pub fn apply_cue(&mut self) -> Result<(), SynthError> {
        self.retired.collect();
        send(&mut self.commands, DeckCommand::ApplyCue)
    }

    /// Cue status as last published by the audio context.
    pub fn cue_status(&self) -> CueStatus {
        CueStatus::from_u8(self.cue_status.load(Ordering::Acquire))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn register_sample(
        &self,
        name: &str,
        audio: &AudioData,
    ) -> Result<Arc<SampleEntry<B::Texture>>, SynthError> {
        self.registry.register(self.backend.as_ref(), name, audio)
    }

    /// Returns false if no such sample was registered.
    pub fn unregister_sample(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn sample_names(&self) -> BTreeSet<String> {
        self.registry.names()
    }

    /// Change tempo on the clock this deck reads, the host's for a guest.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), SynthError> {
        self.clock.set_bpm(bpm)
    }

    pub fn bpm(&self) -> f64 {
        self.clock.bpm()
    }

    /// Performance time, resolved through the host clock for a guest.
    pub fn get_time(&self) -> f64 {
        self.clock.time()
    }

    /// Set a scalar bound to `param_<name>` on every subsequent render.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), SynthError> {
        send(
            &mut self.commands,
            DeckCommand::SetParameter {
                name: name.to_string(),
                value,
            },
        )?;
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    /// Last value set for `name` from this handle.
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).copied()
    }

    /// Drop programs the audio context has finished with. Returns how many.
    ///
    /// [`compile`](Self::compile) and [`apply_cue`](Self::apply_cue) do this on
    /// their own, so the retire queue only fills if neither is called.
    pub fn collect_retired(&mut self) -> usize {
        self.retired.collect()
    }

    /// Release retired programs and, on a host deck, every registered sample.
    pub fn dispose(mut self) {
        let retired = self.collect_retired();
        if self.is_host {
            self.registry.clear();
        }
        log::debug!("Deck disposed ({} retired programs released)", retired);
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn clock(&self) -> &Arc<BeatClock> {
        &self.clock
    }

    pub fn registry(&self) -> &Arc<SampleRegistry<B::Texture>> {
        &self.registry
    }

    pub fn cue_events(&self) -> &Notifier<CueEvent> {
        &self.cue_events
    }

    pub fn deck_events(&self) -> &Notifier<DeckEvent> {
        &self.deck_events
    }
}

/// Frame index of the next bar boundary in a block starting at `bar` phase, if
/// it falls inside the block.
fn bar_boundary_in_block(bar: f64, bar_seconds: f64, sample_rate: u32, frames: usize) -> Option<usize> {
    let to_bar_end = ((1.0 - bar) * bar_seconds * sample_rate as f64).floor();
    (to_bar_end < frames as f64).then_some(to_bar_end.max(0.0) as usize)
}

impl<B: SynthBackend> Deck<B> {
    /// Render one block of `left.len()` frames.
    ///
    /// `host_time` is the host's estimate of the playback time of the first
    /// frame. The deck follows its own prediction unless the two drift apart by
    /// more than the configured threshold.
    pub fn process_block(&mut self, host_time: f64, left: &mut [f32], right: &mut [f32]) -> BlockReport {
        self.drain_commands();

        let frames = left.len();
        if frames != self.config.buffer_size || right.len() != frames {
            log::warn!(
                "Requested {}/{} frames, deck is configured for {}; playing silence",
                left.len(),
                right.len(),
                self.config.buffer_size
            );
            left.fill(0.0);
            right.fill(0.0);
            let time = self.clock.time();
            return BlockReport {
                time,
                phase: self.clock.phase_at(time),
                bar_wrapped: false,
                swapped: false,
                frames_before_boundary: 0,
                frames,
            };
        }

        let time = if self.is_host {
            self.advance_clock(host_time, frames)
        } else {
            self.clock.time()
        };
        let generation_moved = self.renderer.sync_tempo(self.clock.generation());
        let tempo = self.clock.tempo();
        let jumps = self.clock.jumps();
        let rebased = generation_moved
            || self.last_tempo.is_some_and(|last| last != tempo)
            || jumps != self.jumps;
        self.last_tempo = Some(tempo);
        self.jumps = jumps;

        let phase = tempo.phase_at(time);
        let bar_index = tempo.bar_index(time);
        // After a jump or tempo change the bar count starts over from here.
        let bar_wrapped = !rebased && self.last_bar_index == Some(bar_index - 1);

        // A wrap that the previous block did not contain puts the boundary at frame 0.
        let inside = bar_boundary_in_block(phase.bar, tempo.bar_seconds(), self.config.sample_rate, frames);
        let boundary = if bar_wrapped && !self.boundary_in_last_block {
            Some(0)
        } else {
            inside
        };
        self.boundary_in_last_block = inside.is_some();
        self.last_bar_index = Some(bar_index);

        let before = match self.cue.status() {
            CueStatus::Applying => boundary.unwrap_or(frames),
            _ => frames,
        };

        let samples = self.registry.snapshot();
        let inputs = RenderInputs {
            tempo,
            samples: &samples,
            parameters: &self.parameters,
        };

        if before > 0 {
            self.renderer.consume(
                self.cue.live(),
                &inputs,
                time,
                &mut left[..before],
                &mut right[..before],
            );
        }

        let mut swapped = false;
        if before < frames {
            if let Swap::Swapped { retired } = self.cue.consume_swap_if_due(true) {
                swapped = true;
                self.renderer.reset();
                if let Some(program) = retired {
                    self.retirer.retire(program);
                }
                log::info!("Swapped cued program in at t={:.4}s (frame {})", time, before);
            }
            let after = time + before as f64 * self.config.layout().sample_period();
            self.renderer.consume(
                self.cue.live(),
                &inputs,
                after,
                &mut left[before..],
                &mut right[before..],
            );
        }

        let report = BlockReport {
            time,
            phase,
            bar_wrapped,
            swapped,
            frames_before_boundary: before,
            frames,
        };
        self.events.notify(&DeckEvent::BlockProcessed(report));
        report
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                DeckCommand::InstallCue(program) => {
                    if let Some(displaced) = self.cue.install(program) {
                        self.retirer.retire(displaced);
                    }
                }
                DeckCommand::ClearCue => {
                    if let Some(displaced) = self.cue.clear() {
                        self.retirer.retire(displaced);
                    }
                }
                DeckCommand::ApplyCue => {
                    if !self.cue.apply() {
                        log::debug!("Apply ignored, cue is {}", self.cue.status().as_str());
                    }
                }
                DeckCommand::SetParameter { name, value } => {
                    self.parameters.insert(name, value);
                }
            }
        }
    }

    fn advance_clock(&mut self, host_time: f64, frames: usize) -> f64 {
        let time = match self.last_time {
            None => host_time,
            Some(last) => {
                let predicted = last + frames as f64 / self.config.sample_rate as f64;
                if (predicted - host_time).abs() > self.config.time_error_threshold {
                    log::warn!(
                        "Clock drift {:.4}s exceeds {:.4}s, snapping to host time",
                        predicted - host_time,
                        self.config.time_error_threshold
                    );
                    self.drift_corrections += 1;
                    self.last_time = Some(host_time);
                    self.clock.jump_to(host_time);
                    return host_time;
                }
                predicted
            }
        };
        self.last_time = Some(time);
        self.clock.set_time(time);
        time
    }

    pub fn cue_status(&self) -> CueStatus {
        self.cue.status()
    }

    pub fn live_source(&self) -> Option<&str> {
        self.cue.live().map(|p| p.source())
    }

    pub fn cued_source(&self) -> Option<&str> {
        self.cue.cued().map(|p| p.source())
    }

    pub fn chunk_head(&self) -> usize {
        self.renderer.chunk_head()
    }

    /// GPU passes issued so far.
    pub fn renders(&self) -> u64 {
        self.renderer.renders()
    }

    /// Times the clock snapped to the host timestamp.
    pub fn drift_corrections(&self) -> u64 {
        self.drift_corrections
    }

    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).copied()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<BeatClock> {
        &self.clock
    }
}
