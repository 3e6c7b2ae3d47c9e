//! Lock-free queues between the control and audio contexts.
//!
//! Commands flow control → audio and are drained at the start of every block, so
//! a block observes each command either fully or not at all. Programs that leave
//! the audio context (superseded live programs, displaced cues) flow back over a
//! second ring and are dropped on the control context, never inside the callback.

use super::program::Program;
use crate::error::SynthError;

/// Commands sent from the control context to the audio context.
pub enum DeckCommand<P> {
    /// Install a compiled program as the cue (status `ready`).
    ///
    /// Boxed so the ring slot stays pointer-sized.
    InstallCue(Box<Program<P>>),
    /// Drop the cue after a failed compile.
    ClearCue,
    /// Commit the cue for the next bar boundary.
    ApplyCue,
    SetParameter { name: String, value: f32 },
}

impl<P> std::fmt::Debug for DeckCommand<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckCommand::InstallCue(_) => write!(f, "InstallCue"),
            DeckCommand::ClearCue => write!(f, "ClearCue"),
            DeckCommand::ApplyCue => write!(f, "ApplyCue"),
            DeckCommand::SetParameter { name, value } => {
                write!(f, "SetParameter({} = {})", name, value)
            }
        }
    }
}

pub fn command_channel<P>(
    capacity: usize,
) -> (rtrb::Producer<DeckCommand<P>>, rtrb::Consumer<DeckCommand<P>>) {
    rtrb::RingBuffer::new(capacity)
}

/// Push a command without blocking.
pub fn send<P>(
    tx: &mut rtrb::Producer<DeckCommand<P>>,
    command: DeckCommand<P>,
) -> Result<(), SynthError> {
    match tx.push(command) {
        Ok(()) => Ok(()),
        Err(rtrb::PushError::Full(command)) => {
            log::warn!("Command queue full, dropping {:?}", command);
            Err(SynthError::QueueFull)
        }
    }
}

/// Audio-side end of the retire queue.
pub struct Retirer<P> {
    tx: rtrb::Producer<Box<Program<P>>>,
}

impl<P> Retirer<P> {
    /// Hand a program back to the control context for disposal.
    ///
    /// If the ring is full the program is dropped here instead.
    pub fn retire(&mut self, program: Box<Program<P>>) {
        if self.tx.push(program).is_err() {
            log::warn!("Retire queue full, dropping program on the audio thread");
        }
    }
}

/// Control-side end of the retire queue.
pub struct RetiredPrograms<P> {
    rx: rtrb::Consumer<Box<Program<P>>>,
}

impl<P> RetiredPrograms<P> {
    /// Drop every program the audio context handed back. Returns how many.
    pub fn collect(&mut self) -> usize {
        let mut count = 0;
        while let Ok(program) = self.rx.pop() {
            drop(program);
            count += 1;
        }
        count
    }
}

pub fn retire_channel<P>(capacity: usize) -> (Retirer<P>, RetiredPrograms<P>) {
    let (tx, rx) = rtrb::RingBuffer::new(capacity);
    (Retirer { tx }, RetiredPrograms { rx })
}
