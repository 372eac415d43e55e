// The event-sink capability.
//
// Both producers in the system — the SMF decoder and candidate-generator
// execution — push events through this one interface, so the target and
// every candidate are reduced by the exact same code path. That symmetry
// is what makes the fitness comparison meaningful; nothing downstream
// knows or cares where a stream came from.

use std::io::{Read, Seek};

use echoform_smf::{EventRead, MAX_EVENT_LEN, SmfError, SmfReader};

/// Accept one symbolic event at an absolute tick time.
///
/// `event` is the wire encoding: status byte followed by data bytes,
/// already normalized by the producer (a velocity-0 note-on never
/// arrives from the decoder).
pub trait EventSink {
    fn write_event(&mut self, time: u64, event: &[u8]);
}

/// Drive a positioned reader to end-of-track, pushing every produced
/// event into `sink` with its absolute tick time.
///
/// Skipped events contribute their delta time but are not surfaced.
/// Returns the track's total tick length.
pub fn pump_track<R: Read + Seek>(
    reader: &mut SmfReader<R>,
    sink: &mut dyn EventSink,
) -> Result<u64, SmfError> {
    let mut buf = [0u8; MAX_EVENT_LEN];
    let mut time: u64 = 0;
    loop {
        match reader.read_event(&mut buf)? {
            EventRead::Event { delta, len } => {
                time += u64::from(delta);
                sink.write_event(time, &buf[..len]);
            }
            EventRead::Skipped { delta } => {
                time += u64::from(delta);
            }
            EventRead::EndOfTrack => return Ok(time),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use echoform_smf::{NOTE_OFF, NOTE_ON};

    use super::*;

    struct Recorder {
        events: Vec<(u64, Vec<u8>)>,
    }

    impl EventSink for Recorder {
        fn write_event(&mut self, time: u64, event: &[u8]) {
            self.events.push((time, event.to_vec()));
        }
    }

    fn one_track_smf(track: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
        bytes
    }

    #[test]
    fn pump_accumulates_absolute_time_across_skips() {
        let track = [
            0x00, NOTE_ON, 60, 100,
            // Tempo meta, delta 0x30: skipped but its time must elapse.
            0x30, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20,
            0x30, NOTE_ON, 60, 0,
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let mut reader = SmfReader::open(Cursor::new(one_track_smf(&track))).unwrap();
        let mut sink = Recorder { events: Vec::new() };
        let total = pump_track(&mut reader, &mut sink).unwrap();

        assert_eq!(total, 0x60);
        assert_eq!(sink.events.len(), 2);
        assert_eq!(sink.events[0], (0, vec![NOTE_ON, 60, 100]));
        // The velocity-0 note-on arrives normalized, at time 0x30 + 0x30.
        assert_eq!(sink.events[1], (0x60, vec![NOTE_OFF, 60, 0x40]));
    }
}
