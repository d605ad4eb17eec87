//! Whole-session export and import.

use midly::{Smf, TrackEventKind};
use sk_ir::{Event, Sequence, Trigger};
use sk_master::{ExportOptions, ImportOptions, Session, SessionError};

fn drum_and_bass() -> Session {
    let mut session = Session::new();

    let mut drums = Sequence::new("drums", 1);
    drums.info.channel = Some(9);
    for step in 0..4 {
        drums.add_note(step * 192, 24, 36, 120);
    }
    drums.triggers.add(0, 1536, 0, 0, true);
    session.add(drums);

    let mut bass = Sequence::new("bass", 2);
    bass.info.channel = Some(1);
    bass.add_note(0, 384, 40, 100);
    bass.add_note(768, 384, 43, 100);
    bass.events.add(Event::control_change(96, 1, 74, 64));
    bass.triggers.add(0, 1536, 0, 0, true);
    bass.triggers.add(1536, 1536, 0, 5, true);
    session.add(bass);

    session
}

#[test]
fn regular_export_round_trips_through_a_file() {
    let session = drum_and_bass();
    let (bytes, report) = session.export(&ExportOptions::default()).unwrap();
    assert!(report.failures.is_empty());

    let mut loaded = Session::new();
    let import = loaded.import(&bytes, &ImportOptions::default()).unwrap();
    assert_eq!(import.tracks.len(), 2);
    assert!(import.tracks.iter().all(|t| !t.truncated && t.dropped == 0));

    for index in 0..2 {
        let original = session.get(index).unwrap().snapshot();
        let back = loaded.get(index).unwrap().snapshot();
        assert_eq!(back.info, original.info);
        assert_eq!(back.length(), original.length());
        assert_eq!(back.events.len(), original.events.len());
        assert_eq!(back.triggers.as_slice(), original.triggers.as_slice());
    }
}

#[test]
fn song_export_is_readable_by_other_tools() {
    let session = drum_and_bass();
    let (bytes, report) = session.export(&ExportOptions::song()).unwrap();
    assert_eq!(report.exported, vec![0, 1]);

    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.tracks.len(), 2);
    let note_ons = |track: usize| {
        smf.tracks[track]
            .iter()
            .filter(|ev| matches!(ev.kind, TrackEventKind::Midi { message: midly::MidiMessage::NoteOn { vel, .. }, .. } if vel.as_int() > 0))
            .count()
    };
    // Four drum hits per bar over two bars
    assert_eq!(note_ons(0), 8);
    // Two bass notes per pattern, pattern played twice
    assert_eq!(note_ons(1), 4);
}

#[test]
fn corrupt_track_does_not_stop_the_others() {
    let session = drum_and_bass();
    session.get(1).unwrap().edit(|seq| {
        seq.triggers.append(Trigger::new(100, 900, 0, 0));
    });
    let (bytes, report) = session.export(&ExportOptions::song()).unwrap();
    assert_eq!(report.exported, vec![0]);
    assert_eq!(report.corrupt().count(), 1);
    assert_eq!(Smf::parse(&bytes).unwrap().tracks.len(), 1);
}

#[test]
fn import_rejects_non_midi() {
    let mut session = Session::new();
    let err = session.import(b"not a midi file", &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, SessionError::Format(_)));
    assert!(session.is_empty());
}
