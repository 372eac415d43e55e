// Pull-based SMF decoder.
//
// `SmfReader` wraps any `Read + Seek` source and hands out one event per
// `read_event` call. Decoder state that must not leak across sessions —
// in particular the running-status byte and its event length — lives on
// the reader and is reset every time a track is (re)positioned.
//
// Contract: `read_event` must be called with the source positioned at the
// start of a delta-time field. `seek_to_track` establishes that position;
// every `read_event` outcome (including `Skipped`) leaves the source at
// the next delta time, so the contract is maintained by construction as
// long as the caller does not seek the source behind the reader's back.

use std::io::{Read, Seek, SeekFrom};

use crate::error::SmfError;
use crate::event::{
    self, EventRead, META, META_END_OF_TRACK, NOTE_OFF, NOTE_ON, SYSEX, SYSEX_ESCAPE,
};

/// Byte offset of the first chunk after the 14-byte file header.
const FIRST_CHUNK_OFFSET: u64 = 14;

/// A variable-length quantity is at most 8 bytes here; anything longer
/// has overrun a 32-bit value and the stream is treated as corrupt.
const MAX_VLQ_BYTES: usize = 8;

/// Decoder for one SMF source.
///
/// Created by [`SmfReader::open`], which validates the header and
/// positions the reader at the first track chunk if one exists.
#[derive(Debug)]
pub struct SmfReader<R> {
    source: Option<R>,
    format: u16,
    num_tracks: u16,
    ticks_per_quarter: u16,
    /// Currently positioned track ordinal (1-based), 0 when none.
    track: u16,
    /// Byte length of the positioned track's chunk.
    track_len: u32,
    /// Running status for the current read session.
    running_status: Option<u8>,
    /// Full event length (status + data) that goes with `running_status`.
    running_len: usize,
}

impl<R: Read + Seek> SmfReader<R> {
    /// Validate the 14-byte header and position at the first track chunk.
    ///
    /// Fails with [`SmfError::Format`] when the `MThd` tag is missing and
    /// with [`SmfError::UnsupportedTime`] when the division field declares
    /// SMPTE absolute time. A file whose header is valid but which holds
    /// no track chunk opens successfully with no track positioned.
    pub fn open(mut source: R) -> Result<Self, SmfError> {
        source.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        if read_exact_to_end(&mut source, &mut magic)?.is_none() || &magic != b"MThd" {
            return Err(SmfError::Format);
        }

        // Header length (bytes 4..8) is fixed in practice; skip it.
        source.seek(SeekFrom::Start(8))?;
        let format = read_u16_be(&mut source)?;
        let num_tracks = read_u16_be(&mut source)?;
        let division = read_u16_be(&mut source)?;

        if division & 0x8000 != 0 {
            return Err(SmfError::UnsupportedTime);
        }

        let mut reader = SmfReader {
            source: Some(source),
            format,
            num_tracks,
            ticks_per_quarter: division,
            track: 0,
            track_len: 0,
            running_status: None,
            running_len: 0,
        };
        reader.seek_to_track(1)?;
        Ok(reader)
    }

    /// SMF format type (0, 1, or 2) from the header.
    pub fn format(&self) -> u16 {
        self.format
    }

    /// Track count declared in the header.
    pub fn num_tracks(&self) -> u16 {
        self.num_tracks
    }

    /// Time resolution in ticks per quarter note.
    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    /// Byte length of the currently positioned track chunk.
    pub fn track_len(&self) -> u32 {
        self.track_len
    }

    /// Position at the start of the `track`-th track chunk (1-based).
    ///
    /// Scans chunk headers from the end of the file header, counting only
    /// `MTrk` chunks; unrecognized tags are extension chunks and are
    /// skipped with a warning. Returns `Ok(false)` when the input ends
    /// before the requested track — an out-of-range ordinal is "not
    /// found", not a failure. On success the running-status state is
    /// reset for the new read session.
    pub fn seek_to_track(&mut self, track: u16) -> Result<bool, SmfError> {
        if track == 0 {
            return Err(SmfError::InvalidArgument("track ordinals start at 1"));
        }
        let source = self
            .source
            .as_mut()
            .ok_or(SmfError::InvalidArgument("reader is closed"))?;

        source.seek(SeekFrom::Start(FIRST_CHUNK_OFFSET))?;
        let mut found: u16 = 0;

        loop {
            let mut tag = [0u8; 4];
            if read_exact_to_end(source, &mut tag)?.is_none() {
                return Ok(false);
            }
            let mut len_buf = [0u8; 4];
            if read_exact_to_end(source, &mut len_buf)?.is_none() {
                return Ok(false);
            }
            let chunk_len = u32::from_be_bytes(len_buf);

            if &tag == b"MTrk" {
                found += 1;
            } else {
                eprintln!(
                    "echoform_smf: skipping unknown chunk tag {:?} ({chunk_len} bytes)",
                    String::from_utf8_lossy(&tag)
                );
            }

            if found == track {
                self.track = track;
                self.track_len = chunk_len;
                self.running_status = None;
                self.running_len = 0;
                return Ok(true);
            }

            source.seek(SeekFrom::Current(i64::from(chunk_len)))?;
        }
    }

    /// Decode the next event into `buf`.
    ///
    /// See [`EventRead`] for the three outcomes. A produced note-on with
    /// velocity 0 is rewritten in the buffer to the equivalent note-off
    /// before being returned; downstream consumers never see the zero-
    /// velocity encoding.
    pub fn read_event(&mut self, buf: &mut [u8]) -> Result<EventRead, SmfError> {
        if self.track == 0 {
            return Err(SmfError::InvalidArgument("no track positioned"));
        }
        let source = self
            .source
            .as_mut()
            .ok_or(SmfError::InvalidArgument("reader is closed"))?;

        // Delta time. Clean end-of-input at this boundary is end of the
        // stream; running out mid-quantity is a truncation.
        let Some(first) = read_byte(source)? else {
            return Ok(EventRead::EndOfTrack);
        };
        let delta = read_var_len(source, first)?;

        let Some(status_byte) = read_byte(source)? else {
            return Err(SmfError::PrematureEnd);
        };

        let status;
        let ev_len;
        if status_byte < 0x80 {
            // Implicit running status: this byte is already the first data
            // byte, so rewind one so the payload read below picks it up.
            let Some(running) = self.running_status else {
                return Err(SmfError::Corrupt("running status used before any status byte"));
            };
            status = running;
            ev_len = self.running_len;
            source.seek(SeekFrom::Current(-1))?;
        } else if status_byte == META {
            // Meta event: type byte, VLQ payload length. Cancels running
            // status per the format.
            self.running_status = None;
            let Some(meta_type) = read_byte(source)? else {
                return Err(SmfError::PrematureEnd);
            };
            let Some(len_first) = read_byte(source)? else {
                return Err(SmfError::PrematureEnd);
            };
            let payload_len = read_var_len(source, len_first)?;
            if meta_type == META_END_OF_TRACK {
                return Ok(EventRead::EndOfTrack);
            }
            source.seek(SeekFrom::Current(i64::from(payload_len)))?;
            return Ok(EventRead::Skipped { delta });
        } else if status_byte == SYSEX || status_byte == SYSEX_ESCAPE {
            // Sysex payload length is a VLQ in SMF; skip it whole.
            self.running_status = None;
            let Some(len_first) = read_byte(source)? else {
                return Err(SmfError::PrematureEnd);
            };
            let payload_len = read_var_len(source, len_first)?;
            source.seek(SeekFrom::Current(i64::from(payload_len)))?;
            return Ok(EventRead::Skipped { delta });
        } else {
            match event::event_data_len(status_byte) {
                Some(data_len) => {
                    status = status_byte;
                    ev_len = data_len + 1;
                    self.running_status = Some(status_byte);
                    self.running_len = ev_len;
                }
                None => {
                    // Undefined system status; nothing follows that we can
                    // account for, so surface it as skipped.
                    return Ok(EventRead::Skipped { delta });
                }
            }
        }

        if ev_len > buf.len() {
            // Too big for the caller's buffer: consume the payload so the
            // next call lands on a delta time.
            source.seek(SeekFrom::Current(ev_len as i64 - 1))?;
            return Ok(EventRead::Skipped { delta });
        }

        buf[0] = status;
        if ev_len > 1 && read_exact_to_end(source, &mut buf[1..ev_len])?.is_none() {
            // The declared payload runs past end of input.
            return Ok(EventRead::Skipped { delta });
        }

        // A note-on with velocity 0 is a note-off in disguise; normalize
        // so consumers never have to special-case the encoding.
        if ev_len == 3 && buf[0] & 0xF0 == NOTE_ON && buf[2] == 0 {
            buf[0] = NOTE_OFF | (buf[0] & 0x0F);
            buf[2] = 0x40;
        }

        Ok(EventRead::Event { delta, len: ev_len })
    }

    /// Release the underlying source. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.source = None;
        self.track = 0;
    }
}

/// Read one byte; `Ok(None)` means clean end-of-input.
fn read_byte<R: Read>(source: &mut R) -> Result<Option<u8>, SmfError> {
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(SmfError::Io(e)),
        }
    }
}

/// `read_exact` that reports clean end-of-input as `Ok(None)`.
fn read_exact_to_end<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<Option<()>, SmfError> {
    match source.read_exact(buf) {
        Ok(()) => Ok(Some(())),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(SmfError::Io(e)),
    }
}

fn read_u16_be<R: Read>(source: &mut R) -> Result<u16, SmfError> {
    let mut buf = [0u8; 2];
    match read_exact_to_end(source, &mut buf)? {
        Some(()) => Ok(u16::from_be_bytes(buf)),
        None => Err(SmfError::PrematureEnd),
    }
}

/// Decode the rest of a variable-length quantity whose first byte has
/// already been read. Each byte contributes 7 bits, high bit set means
/// another byte follows.
fn read_var_len<R: Read>(source: &mut R, first: u8) -> Result<u32, SmfError> {
    let mut value = u32::from(first & 0x7F);
    if first & 0x80 == 0 {
        return Ok(value);
    }
    for _ in 1..MAX_VLQ_BYTES {
        let Some(byte) = read_byte(source)? else {
            return Err(SmfError::PrematureEnd);
        };
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(SmfError::Corrupt("unterminated variable-length quantity"))
}
