// Pattern evaluation: reducing an event stream to comparable statistics.
//
// The `Evaluator` is the one concrete sink in the system. It watches
// note-ons go by and maintains a 128-entry note histogram, the total
// note count, the first note heard, and an order-N pattern table built
// from a sliding window of recent notes. `finish` freezes the result
// into an `EvaluationSummary`, which is what the fitness function
// actually compares.
//
// Pattern keys are the window's note values joined with commas — the
// same encoding the corpus uses for Markov context keys. Distinct
// windows always produce distinct keys.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use echoform_smf::NOTE_ON;

use crate::sink::EventSink;

/// Default pattern order: how many recent notes form one pattern key.
pub const DEFAULT_PATTERN_ORDER: usize = 4;

/// Incremental statistics accumulator over one event stream.
pub struct Evaluator {
    order: usize,
    counts: [u32; 128],
    n_notes: usize,
    first_note: Option<u8>,
    window: Vec<u8>,
    patterns: BTreeMap<String, u32>,
}

impl Evaluator {
    /// An evaluator with the default pattern order.
    pub fn new() -> Self {
        Self::with_order(DEFAULT_PATTERN_ORDER)
    }

    /// An evaluator with a custom pattern order (>= 1).
    pub fn with_order(order: usize) -> Self {
        assert!(order >= 1, "pattern order must be at least 1");
        Evaluator {
            order,
            counts: [0; 128],
            n_notes: 0,
            first_note: None,
            window: Vec::with_capacity(order),
            patterns: BTreeMap::new(),
        }
    }

    /// Notes observed so far.
    pub fn n_notes(&self) -> usize {
        self.n_notes
    }

    /// Freeze the accumulated statistics. No further events can be
    /// observed; the summary is immutable and safe to share across
    /// concurrent fitness evaluations.
    pub fn finish(self) -> EvaluationSummary {
        EvaluationSummary {
            order: self.order,
            counts: self.counts,
            n_notes: self.n_notes,
            first_note: self.first_note,
            patterns: self.patterns,
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Evaluator {
    fn write_event(&mut self, _time: u64, event: &[u8]) {
        if event.len() < 3 || event[0] & 0xF0 != NOTE_ON {
            return;
        }
        // A velocity-0 note-on is a note-off; producers normalize, but a
        // generator feeding this sink directly gets the same treatment.
        if event[2] == 0 {
            return;
        }

        let note = event[1] & 0x7F;
        self.counts[note as usize] += 1;
        self.n_notes += 1;
        if self.first_note.is_none() {
            self.first_note = Some(note);
        }

        self.window.push(note);
        if self.window.len() > self.order {
            self.window.remove(0);
        }
        if self.window.len() == self.order {
            *self.patterns.entry(pattern_key(&self.window)).or_insert(0) += 1;
        }
    }
}

/// Per-stream aggregate statistics, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Pattern order the table was built with.
    pub order: usize,
    /// Note-on occurrence histogram, one entry per MIDI note.
    #[serde(with = "serde_counts")]
    pub counts: [u32; 128],
    /// Total note-ons observed.
    pub n_notes: usize,
    /// First note observed, if any.
    pub first_note: Option<u8>,
    /// Pattern-frequency table: window key -> occurrence count.
    pub patterns: BTreeMap<String, u32>,
}

impl EvaluationSummary {
    /// The ordered pattern-key sequence the distance metric compares.
    pub fn pattern_keys(&self) -> Vec<String> {
        self.patterns.keys().cloned().collect()
    }

    /// Persist as JSON.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let summary: EvaluationSummary = serde_json::from_str(&data)?;
        Ok(summary)
    }
}

/// Serde plumbing for the 128-entry histogram: serde's built-in array
/// impls stop at length 32, so serialize/deserialize the array as a
/// sequence. The on-disk form is identical to a native array (a JSON
/// array of 128 numbers).
mod serde_counts {
    use serde::de::{Deserialize, Deserializer, Error};
    use serde::ser::{SerializeTuple, Serializer};

    pub fn serialize<S>(counts: &[u32; 128], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tup = serializer.serialize_tuple(128)?;
        for c in counts.iter() {
            tup.serialize_element(c)?;
        }
        tup.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u32; 128], D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<u32> = Vec::deserialize(deserializer)?;
        v.try_into()
            .map_err(|v: Vec<u32>| D::Error::invalid_length(v.len(), &"128 counts"))
    }
}

/// Encode a note window as a collision-free string key.
pub fn pattern_key(notes: &[u8]) -> String {
    notes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(note: u8, velocity: u8) -> [u8; 3] {
        [NOTE_ON, note, velocity]
    }

    fn feed(evaluator: &mut Evaluator, notes: &[u8]) {
        for (i, &note) in notes.iter().enumerate() {
            evaluator.write_event(i as u64 * 96, &note_on(note, 100));
        }
    }

    #[test]
    fn histogram_and_first_note() {
        let mut evaluator = Evaluator::new();
        feed(&mut evaluator, &[60, 64, 60]);
        let summary = evaluator.finish();

        assert_eq!(summary.counts[60], 2);
        assert_eq!(summary.counts[64], 1);
        assert_eq!(summary.n_notes, 3);
        assert_eq!(summary.first_note, Some(60));
    }

    #[test]
    fn note_offs_and_short_events_do_not_count() {
        let mut evaluator = Evaluator::new();
        evaluator.write_event(0, &[NOTE_ON, 60, 100]);
        evaluator.write_event(96, &[0x80, 60, 64]); // note off
        evaluator.write_event(96, &[0xC0, 5]); // program change
        evaluator.write_event(96, &[0xF8]); // clock
        let summary = evaluator.finish();
        assert_eq!(summary.n_notes, 1);
    }

    #[test]
    fn velocity_zero_note_on_counts_as_note_off() {
        let mut evaluator = Evaluator::new();
        evaluator.write_event(0, &note_on(60, 0));
        let summary = evaluator.finish();
        assert_eq!(summary.n_notes, 0);
        assert_eq!(summary.first_note, None);
    }

    #[test]
    fn fewer_notes_than_order_leaves_patterns_empty() {
        let mut evaluator = Evaluator::new();
        feed(&mut evaluator, &[60, 62, 64]);
        let summary = evaluator.finish();
        assert!(summary.patterns.is_empty());
        assert_eq!(summary.n_notes, 3);
    }

    #[test]
    fn pattern_occurrences_equal_notes_minus_order_plus_one() {
        let notes = [60, 62, 64, 65, 67, 69, 71, 72];
        let mut evaluator = Evaluator::new();
        feed(&mut evaluator, &notes);
        let summary = evaluator.finish();

        let total: u32 = summary.patterns.values().sum();
        assert_eq!(total as usize, notes.len() - DEFAULT_PATTERN_ORDER + 1);
    }

    #[test]
    fn repeated_window_increments_one_entry() {
        // 60,62,60,62,... at order 2 yields two alternating windows.
        let mut evaluator = Evaluator::with_order(2);
        feed(&mut evaluator, &[60, 62, 60, 62, 60]);
        let summary = evaluator.finish();

        assert_eq!(summary.patterns.get("60,62"), Some(&2));
        assert_eq!(summary.patterns.get("62,60"), Some(&2));
        assert_eq!(summary.patterns.len(), 2);
    }

    #[test]
    fn pattern_key_is_unambiguous() {
        assert_eq!(pattern_key(&[60, 62, 64, 65]), "60,62,64,65");
        // Adjacent windows that would collide under plain concatenation
        // stay distinct.
        assert_ne!(pattern_key(&[1, 12]), pattern_key(&[11, 2]));
    }

    #[test]
    fn summary_json_roundtrip() {
        let mut evaluator = Evaluator::new();
        feed(&mut evaluator, &[60, 62, 64, 65, 67]);
        let summary = evaluator.finish();

        let json = serde_json::to_string(&summary).unwrap();
        let restored: EvaluationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, summary);
    }
}
