use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sk_formats::{TrackWriter, WriterOptions};
use sk_ir::Sequence;

/// A one-bar pattern of sixteenth notes.
fn busy_pattern() -> Sequence {
    let mut seq = Sequence::new("bench", 1);
    for step in 0..16 {
        seq.add_note(step * 48, 40, 36 + (step % 12) as u8, 100);
    }
    seq
}

fn benchmark_regular_export(c: &mut Criterion) {
    let seq = busy_pattern();
    c.bench_function("regular_export", |b| {
        b.iter(|| {
            let bytes = TrackWriter::new(black_box(seq.view()), WriterOptions::default()).fill();
            black_box(bytes)
        })
    });
}

fn benchmark_song_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("song_export");

    // Trigger counts and lengths in measures
    let cases = vec![("short", 8, 1), ("long_triggers", 8, 16), ("many_triggers", 256, 2)];

    for (name, count, measures) in cases {
        let mut seq = busy_pattern();
        let len = seq.length() * measures;
        for i in 0..count {
            seq.triggers.add(i * len, len, (i * 48) % seq.length(), (i % 5) as i8, true);
        }
        group.bench_with_input(BenchmarkId::from_parameter(name), &seq, |b, seq| {
            b.iter(|| {
                let bytes = TrackWriter::new(black_box(seq.view()), WriterOptions::default()).song_fill();
                black_box(bytes)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_regular_export, benchmark_song_export);
criterion_main!(benches);
