// MIDI event vocabulary: status bytes, payload sizes, read outcomes.
//
// Channel statuses (0x80-0xEF) carry the channel in the low nibble; the
// size table keys on the masked high nibble. System statuses (0xF0-0xFF)
// are keyed whole. Sysex and the undefined system bytes have no fixed
// payload length and get no table entry.

/// Note off, two data bytes (key, velocity).
pub const NOTE_OFF: u8 = 0x80;
/// Note on, two data bytes (key, velocity). Velocity 0 means note off.
pub const NOTE_ON: u8 = 0x90;
/// Polyphonic aftertouch, two data bytes.
pub const POLY_AFTERTOUCH: u8 = 0xA0;
/// Control change, two data bytes.
pub const CONTROLLER: u8 = 0xB0;
/// Program change, one data byte.
pub const PROGRAM_CHANGE: u8 = 0xC0;
/// Channel pressure, one data byte.
pub const CHANNEL_PRESSURE: u8 = 0xD0;
/// Pitch bend, two data bytes.
pub const PITCH_BEND: u8 = 0xE0;
/// System exclusive start; payload length is encoded as a VLQ in SMF.
pub const SYSEX: u8 = 0xF0;
/// MTC quarter frame, one data byte.
pub const MTC_QUARTER_FRAME: u8 = 0xF1;
/// Song position pointer, two data bytes.
pub const SONG_POSITION: u8 = 0xF2;
/// Song select, one data byte.
pub const SONG_SELECT: u8 = 0xF3;
/// Tune request, no data.
pub const TUNE_REQUEST: u8 = 0xF6;
/// Sysex continuation/escape; payload length is encoded as a VLQ in SMF.
pub const SYSEX_ESCAPE: u8 = 0xF7;
/// Timing clock, no data.
pub const CLOCK: u8 = 0xF8;
/// Start, no data.
pub const START: u8 = 0xFA;
/// Continue, no data.
pub const CONTINUE: u8 = 0xFB;
/// Stop, no data.
pub const STOP: u8 = 0xFC;
/// Active sensing, no data.
pub const ACTIVE_SENSE: u8 = 0xFE;
/// Meta-event escape in SMF (system reset on the wire).
pub const META: u8 = 0xFF;

/// Meta-event type marking the logical end of a track.
pub const META_END_OF_TRACK: u8 = 0x2F;

/// The largest fixed-size event: status byte plus two data bytes.
pub const MAX_EVENT_LEN: usize = 3;

/// Number of data bytes following `status`, or `None` when the length is
/// not fixed (sysex) or the status is undefined.
pub fn event_data_len(status: u8) -> Option<usize> {
    let key = if (NOTE_OFF..SYSEX).contains(&status) {
        status & 0xF0
    } else {
        status
    };

    match key {
        NOTE_OFF | NOTE_ON | POLY_AFTERTOUCH | CONTROLLER | PITCH_BEND | SONG_POSITION => Some(2),
        PROGRAM_CHANGE | CHANNEL_PRESSURE | MTC_QUARTER_FRAME | SONG_SELECT => Some(1),
        TUNE_REQUEST | CLOCK | START | CONTINUE | STOP | ACTIVE_SENSE => Some(0),
        _ => None,
    }
}

/// Outcome of one `SmfReader::read_event` call.
///
/// `Skipped` is an expected control-flow result, not a fault: the event
/// was oversized, unknown, or a non-terminal meta event, but its delta
/// time is valid and the caller must still account for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRead {
    /// A complete event was copied into the caller's buffer.
    Event {
        /// Ticks since the previous event.
        delta: u32,
        /// Bytes written to the buffer (status + data), always >= 1.
        len: usize,
    },
    /// The event was consumed but not surfaced; the delta still elapsed.
    Skipped {
        /// Ticks since the previous event.
        delta: u32,
    },
    /// The track's end-of-track meta event was reached, or the input is
    /// exhausted at an event boundary.
    EndOfTrack,
}
