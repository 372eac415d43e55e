// echoform_evolve — pattern evaluation and fitness for evolving music
// generators toward a target style.
//
// A target SMF is decoded once (via `echoform_smf`) and reduced to an
// `EvaluationSummary`; every candidate generator is executed against
// the same reduction; and fitness is the edit distance between the two
// pattern-key sequences, memoized per genome fingerprint. The
// evolutionary driver itself (selection, crossover, mutation) lives
// outside this crate — `Problem` is the plugin surface it consumes.
//
// Module overview:
// - `sink.rs`:      The `EventSink` capability and the file-to-sink pump.
// - `evaluate.rs`:  `Evaluator` / `EvaluationSummary` — histogram, note
//                   count, first note, order-N pattern table.
// - `distance.rs`:  Memoized Levenshtein over pattern-key sequences.
// - `candidate.rs`: The `Candidate` trait and the reference
//                   `StepSequencer` genome.
// - `problem.rs`:   `Problem` — evaluate / fitness_less_than /
//                   clear_fitness_cache / seed / initial_population.
//
// Design decisions:
// - **One sink, two producers.** File decoding and candidate execution
//   push through the same `EventSink`, so target and candidate are
//   reduced by identical code — the comparison stays meaningful.
// - **Content-keyed memoization.** Scores cache on a genome
//   fingerprint, not object identity, so identity reuse can never
//   resurrect a stale score.
// - **Lower is fitter.** Fitness is a distance; drivers must order
//   with `fitness_less_than`.

pub mod candidate;
pub mod distance;
pub mod evaluate;
pub mod problem;
pub mod sink;

pub use candidate::{Candidate, Step, StepSequencer};
pub use distance::pattern_distance;
pub use evaluate::{DEFAULT_PATTERN_ORDER, EvaluationSummary, Evaluator, pattern_key};
pub use problem::{Problem, SEED_FRACTION};
pub use sink::{EventSink, pump_track};
