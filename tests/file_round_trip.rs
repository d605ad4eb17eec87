//! End to end: a song saved in pattern form, loaded back and flattened,
//! matches flattening the original.

use midly::{Smf, TrackEventKind};
use sk_ir::Sequence;
use sk_master::{ExportOptions, ImportOptions, Session};

fn arpeggio() -> Sequence {
    let mut seq = Sequence::new("arp", 1);
    for (i, note) in [60u8, 64, 67, 72].iter().enumerate() {
        seq.add_note(i as i64 * 192, 96, *note, 90);
    }
    seq.triggers.add(0, 1536, 0, 0, true);
    seq.triggers.add(1536, 768, 384, 7, true);
    seq.triggers.add(3072, 1000, 96, -12, true);
    seq
}

fn midi_events(bytes: &[u8]) -> Vec<(u32, String)> {
    let smf = Smf::parse(bytes).unwrap();
    let mut out = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0;
        for ev in track {
            tick += ev.delta.as_int();
            if let TrackEventKind::Midi { channel, message } = ev.kind {
                out.push((tick, format!("{}:{:?}", channel.as_int(), message)));
            }
        }
    }
    out
}

#[test]
fn saved_and_reloaded_song_flattens_identically() {
    let mut session = Session::new();
    session.add(arpeggio());
    let direct = session.export(&ExportOptions::song()).unwrap().0;

    let saved = session.export(&ExportOptions::default()).unwrap().0;
    let mut reloaded = Session::new();
    reloaded.import(&saved, &ImportOptions::default()).unwrap();
    let flattened = reloaded.export(&ExportOptions::song()).unwrap().0;

    assert_eq!(midi_events(&flattened), midi_events(&direct));
    assert_eq!(flattened, direct);
}

#[test]
fn flattened_song_has_no_overlapping_notes() {
    let mut session = Session::new();
    session.add(arpeggio());
    let bytes = session.export(&ExportOptions::song()).unwrap().0;

    let smf = Smf::parse(&bytes).unwrap();
    let mut sounding = [false; 128];
    for ev in &smf.tracks[0] {
        if let TrackEventKind::Midi { message, .. } = ev.kind {
            match message {
                midly::MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    assert!(!sounding[key.as_int() as usize], "note {key:?} retriggered");
                    sounding[key.as_int() as usize] = true;
                }
                midly::MidiMessage::NoteOn { key, .. } | midly::MidiMessage::NoteOff { key, .. } => {
                    sounding[key.as_int() as usize] = false;
                }
                _ => {}
            }
        }
    }
    assert!(sounding.iter().all(|s| !s));
}
