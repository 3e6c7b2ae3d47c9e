//! Musical clock: tempo and time → beat/bar/16-bar phase.

use std::sync::atomic::{AtomicU64, Ordering};

use super::events::Notifier;
use crate::error::SynthError;

/// Beats per bar (4/4).
pub const BEATS_PER_BAR: f64 = 4.0;
/// Bars per phrase.
pub const BARS_PER_PHRASE: f64 = 16.0;

/// Fractional position inside the current beat, bar and 16-bar phrase, each in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeatPhase {
    pub beat: f64,
    pub bar: f64,
    pub sixteen_bar: f64,
}

/// Tempo value with its derived periods. Pure arithmetic, no shared state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self, SynthError> {
        if bpm > 0.0 && bpm.is_finite() {
            Ok(Self { bpm })
        } else {
            Err(SynthError::invalid(format!("bpm must be positive, got {}", bpm)))
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn bar_seconds(&self) -> f64 {
        BEATS_PER_BAR * self.beat_seconds()
    }

    pub fn sixteen_bar_seconds(&self) -> f64 {
        BARS_PER_PHRASE * self.bar_seconds()
    }

    /// Bar containing `time`, counted from the bar that starts at zero.
    ///
    /// Agrees with [`phase_at`](Self::phase_at) where rounding puts `time` on
    /// the start of the next bar.
    pub fn bar_index(&self, time: f64) -> i64 {
        let period = self.bar_seconds();
        let rem = time.rem_euclid(period);
        let index = ((time - rem) / period).round() as i64;
        if rem / period >= 1.0 {
            index + 1
        } else {
            index
        }
    }

    pub fn phase_at(&self, time: f64) -> BeatPhase {
        BeatPhase {
            beat: fraction(time, self.beat_seconds()),
            bar: fraction(time, self.bar_seconds()),
            sixteen_bar: fraction(time, self.sixteen_bar_seconds()),
        }
    }
}

fn fraction(time: f64, period: f64) -> f64 {
    let phase = time.rem_euclid(period) / period;
    // rem_euclid can round up to exactly `period` for tiny negative inputs
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Notifications emitted by [`BeatClock`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClockEvent {
    BpmChanged { bpm: f64 },
}

/// Shared musical clock.
///
/// Owned by one deck and read by any guest decks composed onto it. Tempo and
/// time are plain atomics so the audio and control contexts never contend.
/// Every tempo change bumps a generation counter; renderers compare it against
/// the generation they last rendered under and restart at chunk 0 when it moves.
/// Discontinuous time writes are counted separately, so every deck reading the
/// clock can tell a jump from steady playback.
#[derive(Debug)]
pub struct BeatClock {
    bpm_bits: AtomicU64,
    time_bits: AtomicU64,
    generation: AtomicU64,
    jumps: AtomicU64,
    events: Notifier<ClockEvent>,
}

impl BeatClock {
    pub fn new(bpm: f64) -> Result<Self, SynthError> {
        let tempo = Tempo::new(bpm)?;
        Ok(Self {
            bpm_bits: AtomicU64::new(tempo.bpm().to_bits()),
            time_bits: AtomicU64::new(0f64.to_bits()),
            generation: AtomicU64::new(0),
            jumps: AtomicU64::new(0),
            events: Notifier::new(),
        })
    }

    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm_bits.load(Ordering::Acquire))
    }

    pub fn tempo(&self) -> Tempo {
        Tempo { bpm: self.bpm() }
    }

    /// Change tempo. Rejects non-positive values with `InvalidArgument`.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), SynthError> {
        let tempo = Tempo::new(bpm)?;
        self.bpm_bits.store(tempo.bpm().to_bits(), Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::info!("Tempo set to {:.2} bpm", bpm);
        self.events.notify(&ClockEvent::BpmChanged { bpm });
        Ok(())
    }

    /// Incremented on every tempo change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Seconds since the start of the performance, as last written by the owning driver.
    pub fn time(&self) -> f64 {
        f64::from_bits(self.time_bits.load(Ordering::Acquire))
    }

    pub fn set_time(&self, time: f64) {
        self.time_bits.store(time.to_bits(), Ordering::Release);
    }

    /// Move to `time` without continuity with the previous value.
    pub fn jump_to(&self, time: f64) {
        self.jumps.fetch_add(1, Ordering::AcqRel);
        self.set_time(time);
    }

    /// Incremented on every [`jump_to`](Self::jump_to).
    pub fn jumps(&self) -> u64 {
        self.jumps.load(Ordering::Acquire)
    }

    pub fn phase_at(&self, time: f64) -> BeatPhase {
        self.tempo().phase_at(time)
    }

    pub fn events(&self) -> &Notifier<ClockEvent> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_periods_at_120_bpm() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.beat_seconds(), 0.5);
        assert_eq!(tempo.bar_seconds(), 2.0);
        assert_eq!(tempo.sixteen_bar_seconds(), 32.0);
    }

    #[test]
    fn test_periods_scale_with_bpm() {
        for bpm in [60.0, 87.5, 140.0, 174.0] {
            let tempo = Tempo::new(bpm).unwrap();
            assert!((tempo.beat_seconds() - 60.0 / bpm).abs() < EPS);
            assert!((tempo.bar_seconds() - 4.0 * tempo.beat_seconds()).abs() < EPS);
            assert!((tempo.sixteen_bar_seconds() - 16.0 * tempo.bar_seconds()).abs() < EPS);
        }
    }

    #[test]
    fn test_phase_on_boundary_and_inside() {
        let tempo = Tempo::new(120.0).unwrap();
        assert!(tempo.phase_at(2.5).beat.abs() < EPS);
        assert!((tempo.phase_at(2.6).beat - 0.2).abs() < EPS);
        assert!((tempo.phase_at(2.6).bar - 0.3).abs() < EPS);
        assert!((tempo.phase_at(2.6).sixteen_bar - 2.6 / 32.0).abs() < EPS);
    }

    #[test]
    fn test_phase_is_periodic() {
        let tempo = Tempo::new(133.0).unwrap();
        for i in 0..50 {
            let t = i as f64 * 0.173;
            let a = tempo.phase_at(t).beat;
            let b = tempo.phase_at(t + tempo.beat_seconds()).beat;
            let diff = (a - b).abs();
            assert!(diff < 1e-6 || (1.0 - diff) < 1e-6, "t={} a={} b={}", t, a, b);
        }
    }

    #[test]
    fn test_phase_stays_in_unit_interval() {
        let tempo = Tempo::new(120.0).unwrap();
        for t in [-1e-18, -0.25, 0.0, 1.999999999, 1e6] {
            let p = tempo.phase_at(t);
            for v in [p.beat, p.bar, p.sixteen_bar] {
                assert!((0.0..1.0).contains(&v), "t={} phase={}", t, v);
            }
        }
    }

    #[test]
    fn test_invalid_bpm_rejected() {
        assert!(matches!(BeatClock::new(0.0), Err(SynthError::InvalidArgument(_))));
        let clock = BeatClock::new(120.0).unwrap();
        assert!(clock.set_bpm(-3.0).is_err());
        assert!(clock.set_bpm(f64::NAN).is_err());
        assert_eq!(clock.bpm(), 120.0);
        assert_eq!(clock.generation(), 0);
    }

    #[test]
    fn test_set_bpm_bumps_generation_and_notifies() {
        let clock = BeatClock::new(120.0).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        clock.events().subscribe(move |e: &ClockEvent| s.lock().unwrap().push(e.clone()));

        clock.set_bpm(90.0).unwrap();
        assert_eq!(clock.bpm(), 90.0);
        assert_eq!(clock.generation(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ClockEvent::BpmChanged { bpm: 90.0 }]
        );
    }

    #[test]
    fn test_time_roundtrips_through_atomic() {
        let clock = BeatClock::new(120.0).unwrap();
        clock.set_time(12.345);
        assert_eq!(clock.time(), 12.345);
    }

    #[test]
    fn test_bar_index_counts_whole_bars() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.bar_index(0.0), 0);
        assert_eq!(tempo.bar_index(1.999), 0);
        assert_eq!(tempo.bar_index(2.0), 1);
        assert_eq!(tempo.bar_index(7.5), 3);
        assert_eq!(tempo.bar_index(-0.25), -1);
        // Rounds to the start of bar 0 together with the phase.
        assert_eq!(tempo.bar_index(-1e-18), 0);
        assert_eq!(tempo.phase_at(-1e-18).bar, 0.0);
    }

    #[test]
    fn test_jump_to_is_counted() {
        let clock = BeatClock::new(120.0).unwrap();
        clock.set_time(1.0);
        assert_eq!(clock.jumps(), 0);
        clock.jump_to(0.8);
        assert_eq!(clock.time(), 0.8);
        assert_eq!(clock.jumps(), 1);
        assert_eq!(clock.generation(), 0);
    }
}
