// The fitness problem an evolutionary driver plugs into.
//
// `Problem` owns the target summary (decoded once, read-only afterward)
// and scores candidates by the edit distance between their pattern-key
// sequence and the target's. Lower is fitter — this is a minimization
// framing, and `fitness_less_than` is the ordering predicate a generic
// driver should sort populations with.
//
// Scores are memoized per genome fingerprint so a candidate that
// survives unchanged into the next generation is never re-run. The
// cache and the distance scratch matrix are the only shared mutable
// state; each sits behind its own mutex so independent candidates can
// be evaluated from multiple worker threads against one shared problem.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::Mutex;

use rand::Rng;

use echoform_smf::SmfReader;

use crate::candidate::Candidate;
use crate::distance::DistanceWorkspace;
use crate::evaluate::{EvaluationSummary, Evaluator};
use crate::sink::pump_track;

/// Fraction of a seeded initial population drawn as variations of the
/// seed parent rather than sampled fresh. A tunable, not a contract.
pub const SEED_FRACTION: f64 = 0.5;

/// Fitness problem: score candidates against a target event stream.
pub struct Problem<C: Candidate> {
    order: usize,
    target: EvaluationSummary,
    target_keys: Vec<String>,
    seed: Option<C>,
    cache: Mutex<BTreeMap<u64, f32>>,
    workspace: Mutex<DistanceWorkspace>,
}

impl<C: Candidate> Problem<C> {
    /// A problem scoring against an already-computed target summary.
    pub fn new(target: EvaluationSummary) -> Self {
        let target_keys = target.pattern_keys();
        Problem {
            order: target.order,
            target,
            target_keys,
            seed: None,
            cache: Mutex::new(BTreeMap::new()),
            workspace: Mutex::new(DistanceWorkspace::new()),
        }
    }

    /// Decode `track` of an SMF source into the target summary.
    ///
    /// Decoder failures propagate unchanged; a missing track is fatal
    /// too — without a target there is nothing to evolve toward.
    pub fn from_smf<R: Read + Seek>(
        source: R,
        track: u16,
        order: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut reader = SmfReader::open(source)?;
        if !reader.seek_to_track(track)? {
            return Err(format!(
                "track {track} not found ({} tracks present)",
                reader.num_tracks()
            )
            .into());
        }
        let mut evaluator = Evaluator::with_order(order);
        pump_track(&mut reader, &mut evaluator)?;
        reader.close();
        Ok(Self::new(evaluator.finish()))
    }

    /// The target summary candidates are compared against.
    pub fn target(&self) -> &EvaluationSummary {
        &self.target
    }

    /// Score a candidate; lower is fitter.
    ///
    /// Memoized per genome fingerprint: a cache hit returns the stored
    /// score without re-running the candidate. A candidate whose `run`
    /// fails is scored worst-possible and the failure logged — one
    /// defective candidate never takes down a generation.
    pub fn evaluate(&self, candidate: &C) -> f32 {
        let fingerprint = candidate.fingerprint();
        if let Some(&score) = self.cache.lock().unwrap().get(&fingerprint) {
            return score;
        }

        let mut evaluator = Evaluator::with_order(self.order);
        let score = match candidate.run(&mut evaluator) {
            Ok(()) => {
                let keys = evaluator.finish().pattern_keys();
                let distance = self
                    .workspace
                    .lock()
                    .unwrap()
                    .levenshtein(&keys, &self.target_keys);
                distance as f32
            }
            Err(e) => {
                eprintln!("echoform_evolve: candidate failed to run: {e}");
                f32::MAX
            }
        };

        self.cache.lock().unwrap().insert(fingerprint, score);
        score
    }

    /// Ordering predicate for the driver: is `a` fitter than `b`?
    pub fn fitness_less_than(&self, a: f32, b: f32) -> bool {
        a < b
    }

    /// Discard every cached score. Must be called when the target or
    /// the scoring criteria change; there is no partial eviction.
    pub fn clear_fitness_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    /// Record a previously evolved parent to bias `initial_population`,
    /// replacing any earlier seed.
    pub fn seed(&mut self, parent: C) {
        self.seed = Some(parent);
    }

    /// Fill `population` with `population_size` fresh candidates of the
    /// given gene size. With a seed recorded, roughly `SEED_FRACTION`
    /// of them are variations of the seed instead of random samples.
    pub fn initial_population<R: Rng>(
        &self,
        rng: &mut R,
        population: &mut Vec<C>,
        gene_size: usize,
        population_size: usize,
    ) {
        population.clear();
        population.reserve(population_size);
        for _ in 0..population_size {
            let candidate = match &self.seed {
                Some(parent) if rng.random_bool(SEED_FRACTION) => parent.variation(rng),
                _ => C::random(rng, gene_size),
            };
            population.push(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::candidate::{Step, StepSequencer};
    use crate::evaluate::DEFAULT_PATTERN_ORDER;
    use crate::sink::EventSink;

    use super::*;

    fn summary_of(notes: &[u8]) -> EvaluationSummary {
        let mut evaluator = Evaluator::new();
        for (i, &note) in notes.iter().enumerate() {
            evaluator.write_event(i as u64 * 96, &[0x90, note, 100]);
        }
        evaluator.finish()
    }

    fn sequencer_of(notes: &[u8]) -> StepSequencer {
        StepSequencer {
            steps: notes.iter().map(|&note| Step { note, ticks: 96 }).collect(),
        }
    }

    /// Counts how many times `run` actually executes.
    #[derive(Clone)]
    struct CountingCandidate {
        inner: StepSequencer,
        runs: &'static AtomicUsize,
    }

    impl Candidate for CountingCandidate {
        fn run(&self, sink: &mut dyn EventSink) -> Result<(), Box<dyn std::error::Error>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.inner.run(sink)
        }
        fn random<R: Rng>(_rng: &mut R, _gene_size: usize) -> Self {
            unimplemented!("not sampled in these tests")
        }
        fn variation<R: Rng>(&self, _rng: &mut R) -> Self {
            self.clone()
        }
        fn fingerprint(&self) -> u64 {
            self.inner.fingerprint()
        }
    }

    #[derive(Clone)]
    struct FailingCandidate;

    impl Candidate for FailingCandidate {
        fn run(&self, _sink: &mut dyn EventSink) -> Result<(), Box<dyn std::error::Error>> {
            Err("state graph has no initial node".into())
        }
        fn random<R: Rng>(_rng: &mut R, _gene_size: usize) -> Self {
            FailingCandidate
        }
        fn variation<R: Rng>(&self, _rng: &mut R) -> Self {
            FailingCandidate
        }
        fn fingerprint(&self) -> u64 {
            0
        }
    }

    #[test]
    fn candidate_matching_target_scores_zero() {
        let notes = [60, 62, 64, 65, 67, 69];
        let problem = Problem::new(summary_of(&notes));
        let score = problem.evaluate(&sequencer_of(&notes));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn mismatched_candidate_scores_above_matching_one() {
        let target_notes = [60, 62, 64, 65, 67, 69];
        let problem = Problem::new(summary_of(&target_notes));
        let matching = problem.evaluate(&sequencer_of(&target_notes));
        let mismatched = problem.evaluate(&sequencer_of(&[50, 55, 50, 55, 50, 55]));
        assert!(problem.fitness_less_than(matching, mismatched));
    }

    #[test]
    fn short_streams_compare_without_panicking() {
        // Fewer notes than the pattern order on both sides.
        let problem = Problem::new(summary_of(&[60, 62]));
        let score = problem.evaluate(&sequencer_of(&[64]));
        assert_eq!(score, 0.0); // both pattern tables are empty
    }

    #[test]
    fn evaluate_is_cached_per_fingerprint() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        let problem = Problem::new(summary_of(&[60, 62, 64, 65, 67]));
        let candidate = CountingCandidate {
            inner: sequencer_of(&[60, 62, 64, 65, 67]),
            runs: &RUNS,
        };

        let first = problem.evaluate(&candidate);
        let second = problem.evaluate(&candidate);
        assert_eq!(first, second);
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);

        problem.clear_fitness_cache();
        let third = problem.evaluate(&candidate);
        assert_eq!(first, third);
        assert_eq!(RUNS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_candidate_scores_worst_possible() {
        let problem: Problem<FailingCandidate> = Problem::new(summary_of(&[60, 62, 64, 65]));
        assert_eq!(problem.evaluate(&FailingCandidate), f32::MAX);
    }

    #[test]
    fn initial_population_has_requested_size() {
        let problem: Problem<StepSequencer> = Problem::new(summary_of(&[60, 62, 64, 65]));
        let mut rng = StdRng::seed_from_u64(1);
        let mut population = Vec::new();
        problem.initial_population(&mut rng, &mut population, 8, 20);
        assert_eq!(population.len(), 20);
        for candidate in &population {
            assert_eq!(candidate.steps.len(), 8);
        }
    }

    #[test]
    fn seeded_population_is_biased_toward_the_parent() {
        let mut problem: Problem<StepSequencer> = Problem::new(summary_of(&[60, 62, 64, 65]));
        let parent = sequencer_of(&[60, 62, 64, 65, 67, 69, 71, 72]);
        problem.seed(parent.clone());

        let mut rng = StdRng::seed_from_u64(5);
        let mut population = Vec::new();
        problem.initial_population(&mut rng, &mut population, parent.steps.len(), 40);

        // A variation differs from the parent in at most one step; a
        // random sample of this length essentially never does.
        let near_parent = population
            .iter()
            .filter(|candidate| {
                candidate
                    .steps
                    .iter()
                    .zip(&parent.steps)
                    .filter(|(a, b)| a != b)
                    .count()
                    <= 1
            })
            .count();
        assert!(
            near_parent >= 10,
            "expected a seeded bias, got {near_parent}/40 near the parent"
        );
    }

    #[test]
    fn from_smf_propagates_decoder_failures() {
        let garbage = std::io::Cursor::new(vec![0u8; 32]);
        let err = Problem::<StepSequencer>::from_smf(garbage, 1, DEFAULT_PATTERN_ORDER)
            .err()
            .expect("open must fail");
        assert!(err.to_string().contains("MThd"));
    }

    #[test]
    fn from_smf_reports_missing_track() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let err = Problem::<StepSequencer>::from_smf(std::io::Cursor::new(bytes), 3, 4)
            .err()
            .expect("seek must fail");
        assert!(err.to_string().contains("not found"));
    }
}
