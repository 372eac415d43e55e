// The candidate-generator capability, and a reference implementation.
//
// The fitness function needs exactly four things from whatever
// representation the evolutionary framework evolves: run it against a
// sink, sample a fresh random one, derive a nearby variation (for
// seeding a population from a previously evolved parent), and hash its
// genome. Everything else about the representation — state graphs,
// rule tables, whatever — stays on the framework's side of the line.
//
// `StepSequencer` is the minimal concrete candidate: a flat list of
// (note, duration) steps, which is the linear-genome shape crossover
// and mutation operators like best. It exists for tests and the CLI;
// real runs plug in the framework's own machines.

use std::hash::{Hash, Hasher};

use rand::Rng;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use echoform_smf::{NOTE_OFF, NOTE_ON};

use crate::sink::EventSink;

/// What the fitness function requires of a generator representation.
pub trait Candidate: Clone {
    /// Execute the generator, reporting every emitted event and its
    /// absolute tick time to `sink`. A failure here marks this one
    /// candidate as defective; it never aborts the generation.
    fn run(&self, sink: &mut dyn EventSink) -> Result<(), Box<dyn std::error::Error>>;

    /// Sample a fresh random generator with the given gene count.
    fn random<R: Rng>(rng: &mut R, gene_size: usize) -> Self;

    /// A nearby variant of this generator, used to bias an initial
    /// population toward a seed parent.
    fn variation<R: Rng>(&self, rng: &mut R) -> Self;

    /// Content hash of the genome. Two candidates with equal genomes
    /// must fingerprint equally; the fitness cache keys on this.
    fn fingerprint(&self) -> u64;
}

/// Durations a random step can take, in ticks at 96 per quarter.
const STEP_TICKS: [u32; 4] = [24, 48, 96, 192];

/// Pitch range random steps are drawn from (C3..=C6).
const NOTE_LOW: u8 = 48;
const NOTE_HIGH: u8 = 84;

/// One genome element: play `note` for `ticks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub note: u8,
    pub ticks: u32,
}

/// A linear-genome candidate that plays its steps in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSequencer {
    pub steps: Vec<Step>,
}

impl Candidate for StepSequencer {
    fn run(&self, sink: &mut dyn EventSink) -> Result<(), Box<dyn std::error::Error>> {
        let mut time: u64 = 0;
        for step in &self.steps {
            sink.write_event(time, &[NOTE_ON, step.note, 80]);
            time += u64::from(step.ticks);
            sink.write_event(time, &[NOTE_OFF, step.note, 0x40]);
        }
        Ok(())
    }

    fn random<R: Rng>(rng: &mut R, gene_size: usize) -> Self {
        let steps = (0..gene_size)
            .map(|_| Step {
                note: rng.random_range(NOTE_LOW..=NOTE_HIGH),
                ticks: STEP_TICKS[rng.random_range(0..STEP_TICKS.len())],
            })
            .collect();
        StepSequencer { steps }
    }

    fn variation<R: Rng>(&self, rng: &mut R) -> Self {
        let mut varied = self.clone();
        if varied.steps.is_empty() {
            return varied;
        }
        let idx = rng.random_range(0..varied.steps.len());
        if rng.random_bool(0.75) {
            // Pitch nudge, up to a third in either direction.
            let nudge = rng.random_range(1..=4);
            let sign = if rng.random_bool(0.5) { 1 } else { -1 };
            let note = i16::from(varied.steps[idx].note) + sign * nudge;
            varied.steps[idx].note = note.clamp(i16::from(NOTE_LOW), i16::from(NOTE_HIGH)) as u8;
        } else {
            varied.steps[idx].ticks = STEP_TICKS[rng.random_range(0..STEP_TICKS.len())];
        }
        varied
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.steps.hash(&mut hasher);
        hasher.finish()
    }
}
