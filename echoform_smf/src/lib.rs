// echoform_smf — Standard MIDI File event-stream decoder.
//
// Pull-based decoder for the chunked SMF container: a 14-byte `MThd`
// header followed by tagged chunks whose track payloads are streams of
// (variable-length delta time, event) pairs with running-status
// compression and escape-coded meta/sysex events. This crate is the
// byte-level foundation the evaluation pipeline reads targets through;
// it has no dependency on the evolution crates and no dependencies of
// its own.
//
// Module overview:
// - `error.rs`:  The decode failure taxonomy (`SmfError`).
// - `event.rs`:  Status-byte vocabulary, payload size table, and the
//                three-way `EventRead` outcome of a read.
// - `reader.rs`: `SmfReader` — open/seek/read/close over any
//                `Read + Seek` source.
//
// Design decisions:
// - **Writing is out of scope.** This crate only reads; producing SMF
//   bytes is left to whatever tool authored the target material.
// - **SMPTE time is rejected at open.** Only metrical
//   (ticks-per-quarter) division is supported; the absolute-time
//   encoding fails fast with `SmfError::UnsupportedTime`.
// - **Skips are not errors.** Meta events, sysex, oversized and
//   unknown events decode to `EventRead::Skipped` with their delta
//   time intact; the error taxonomy is reserved for malformed input
//   and caller misuse.

pub mod error;
pub mod event;
pub mod reader;

pub use error::SmfError;
pub use event::{EventRead, MAX_EVENT_LEN, NOTE_OFF, NOTE_ON, event_data_len};
pub use reader::SmfReader;
