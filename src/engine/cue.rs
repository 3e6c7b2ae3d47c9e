//! Double-buffered program slots and the cue state machine.
//!
//! ```text
//!   install        apply           bar boundary
//! None ──────▶ Ready ──────▶ Applying ──────▶ None (cued program is now live)
//!   ▲            │ install replaces the cue; a failed compile clears it
//!   └────────────┘
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::events::Notifier;

/// Public view of the cue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CueStatus {
    /// Nothing pending.
    None = 0,
    /// A compiled program awaits the performer's decision.
    Ready = 1,
    /// Committed; swaps in at the next bar boundary.
    Applying = 2,
}

impl CueStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CueStatus::Ready,
            2 => CueStatus::Applying,
            _ => CueStatus::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CueStatus::None => "none",
            CueStatus::Ready => "ready",
            CueStatus::Applying => "applying",
        }
    }
}

/// Notifications about the cue slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueEvent {
    StatusChanged(CueStatus),
    /// `None` after a successful compile, the translated message after a failed one.
    CompileError(Option<String>),
}

enum Cue<P> {
    None,
    Ready(Box<P>),
    Applying(Box<P>),
}

impl<P> Cue<P> {
    fn status(&self) -> CueStatus {
        match self {
            Cue::None => CueStatus::None,
            Cue::Ready(_) => CueStatus::Ready,
            Cue::Applying(_) => CueStatus::Applying,
        }
    }

    fn program(&self) -> Option<&P> {
        match self {
            Cue::None => None,
            Cue::Ready(p) | Cue::Applying(p) => Some(&**p),
        }
    }

    fn into_program(self) -> Option<Box<P>> {
        match self {
            Cue::None => None,
            Cue::Ready(p) | Cue::Applying(p) => Some(p),
        }
    }
}

/// Result of [`CueController::consume_swap_if_due`].
pub enum Swap<P> {
    NotDue,
    /// The cued program went live. `retired` is the program it replaced.
    Swapped { retired: Option<Box<P>> },
}

/// Holds the live program and at most one cued program.
///
/// Lives on the audio context; the status is mirrored into an atomic so the
/// control context can read it without a round trip.
pub struct CueController<P> {
    live: Option<Box<P>>,
    cue: Cue<P>,
    mirror: Arc<AtomicU8>,
    events: Arc<Notifier<CueEvent>>,
}

impl<P> CueController<P> {
    pub fn new(mirror: Arc<AtomicU8>, events: Arc<Notifier<CueEvent>>) -> Self {
        mirror.store(CueStatus::None as u8, Ordering::Release);
        Self {
            live: None,
            cue: Cue::None,
            mirror,
            events,
        }
    }

    pub fn status(&self) -> CueStatus {
        self.cue.status()
    }

    pub fn live(&self) -> Option<&P> {
        self.live.as_deref()
    }

    pub fn cued(&self) -> Option<&P> {
        self.cue.program()
    }

    /// Install a freshly compiled program as the cue, status `Ready`.
    ///
    /// Replaces whatever was cued, including a committed swap that has not
    /// reached its boundary yet. Returns the displaced program.
    pub fn install(&mut self, program: Box<P>) -> Option<Box<P>> {
        let previous = std::mem::replace(&mut self.cue, Cue::Ready(program));
        self.publish();
        previous.into_program()
    }

    /// Drop the cue after a failed compile. Returns the displaced program.
    pub fn clear(&mut self) -> Option<Box<P>> {
        let previous = std::mem::replace(&mut self.cue, Cue::None);
        if previous.status() != CueStatus::None {
            self.publish();
        }
        previous.into_program()
    }

    /// Commit the cue. Ignored unless the status is `Ready`.
    pub fn apply(&mut self) -> bool {
        match std::mem::replace(&mut self.cue, Cue::None) {
            Cue::Ready(program) => {
                self.cue = Cue::Applying(program);
                self.publish();
                true
            }
            other => {
                self.cue = other;
                false
            }
        }
    }

    /// Promote the committed cue if a bar boundary was crossed in this block.
    pub fn consume_swap_if_due(&mut self, bar_boundary_crossed: bool) -> Swap<P> {
        if !bar_boundary_crossed {
            return Swap::NotDue;
        }
        match std::mem::replace(&mut self.cue, Cue::None) {
            Cue::Applying(program) => {
                let retired = self.live.replace(program);
                self.publish();
                Swap::Swapped { retired }
            }
            other => {
                self.cue = other;
                Swap::NotDue
            }
        }
    }

    fn publish(&self) {
        let status = self.cue.status();
        self.mirror.store(status as u8, Ordering::Release);
        self.events.notify(&CueEvent::StatusChanged(status));
    }
}
