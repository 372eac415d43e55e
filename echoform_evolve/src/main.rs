// Echoform analyzer — CLI entry point.
//
// Decodes a target SMF, reduces one track to its evaluation summary,
// and prints the statistics the fitness function would compare. Given a
// second file, also prints the pattern edit distance between the two —
// the exact number a candidate scoring identically to that file would
// receive.
//
// Usage:
//   analyze <target.mid> [candidate.mid] [--track N] [--order N]
//     [--json] [--save PATH]

use std::fs::File;
use std::path::Path;
use std::process::exit;

use echoform_evolve::evaluate::{DEFAULT_PATTERN_ORDER, EvaluationSummary, Evaluator};
use echoform_evolve::pattern_distance;
use echoform_evolve::sink::pump_track;
use echoform_smf::SmfReader;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Positional arguments: everything that is neither a flag nor a
    // flag's value.
    let mut paths: Vec<&String> = Vec::new();
    let mut skip_next = false;
    for arg in &args[1..] {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = matches!(arg.as_str(), "--track" | "--order" | "--save");
            continue;
        }
        paths.push(arg);
    }

    let Some(target_path) = paths.first() else {
        eprintln!("usage: analyze <target.mid> [candidate.mid] [--track N] [--order N] [--json] [--save PATH]");
        exit(2);
    };
    let candidate_path = paths.get(1);

    let track: u16 = parse_flag(&args, "--track").unwrap_or(1);
    let order: usize = parse_flag(&args, "--order").unwrap_or(DEFAULT_PATTERN_ORDER);
    let as_json = args.iter().any(|a| a == "--json");
    let save_path: Option<String> = parse_flag(&args, "--save");

    println!("=== Echoform Analyzer ===");
    println!("Target: {target_path} (track {track}, pattern order {order})");
    println!();

    println!("[1/2] Decoding target...");
    let summary = match summarize(target_path, track, order) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("  Failed to decode {target_path}: {e}");
            exit(1);
        }
    };
    print_summary(&summary);

    if as_json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("  Failed to serialize summary: {e}");
                exit(1);
            }
        }
    }

    if let Some(path) = save_path {
        match summary.save(Path::new(&path)) {
            Ok(()) => println!("  Summary saved to {path}."),
            Err(e) => {
                eprintln!("  Failed to save summary: {e}");
                exit(1);
            }
        }
    }

    match candidate_path {
        Some(path) => {
            println!("[2/2] Decoding candidate {path}...");
            let candidate = match summarize(path, track, order) {
                Ok(candidate) => candidate,
                Err(e) => {
                    eprintln!("  Failed to decode {path}: {e}");
                    exit(1);
                }
            };
            print_summary(&candidate);
            let distance = pattern_distance(&candidate, &summary);
            println!("Pattern edit distance: {distance} (lower is fitter)");
        }
        None => println!("[2/2] No candidate file; done."),
    }
}

fn summarize(
    path: &str,
    track: u16,
    order: usize,
) -> Result<EvaluationSummary, Box<dyn std::error::Error>> {
    let mut reader = SmfReader::open(File::open(path)?)?;
    println!(
        "  Format {} / {} tracks / {} ticks per quarter",
        reader.format(),
        reader.num_tracks(),
        reader.ticks_per_quarter()
    );
    if !reader.seek_to_track(track)? {
        return Err(format!("track {track} not found").into());
    }
    let mut evaluator = Evaluator::with_order(order);
    let total_ticks = pump_track(&mut reader, &mut evaluator)?;
    println!("  Track length: {} bytes, {total_ticks} ticks", reader.track_len());
    reader.close();
    Ok(evaluator.finish())
}

fn print_summary(summary: &EvaluationSummary) {
    println!("  Notes: {}", summary.n_notes);
    match summary.first_note {
        Some(note) => println!("  First note: {} ({note})", note_name(note)),
        None => println!("  First note: none"),
    }
    println!("  Distinct patterns: {}", summary.patterns.len());

    let mut patterns: Vec<(String, u32)> = summary
        .patterns
        .iter()
        .map(|(key, &count)| (key.clone(), count))
        .collect();
    patterns.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (key, count) in patterns.iter().take(5) {
        println!("    {count:>4}x  [{key}]");
    }

    let mut peaks: Vec<(u8, u32)> = summary
        .counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(note, &count)| (note as u8, count))
        .collect();
    peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    if !peaks.is_empty() {
        let line: Vec<String> = peaks
            .iter()
            .take(8)
            .map(|(note, count)| format!("{} x{count}", note_name(*note)))
            .collect();
        println!("  Histogram peaks: {}", line.join(", "));
    }
    println!();
}

/// Compact note name for display, e.g. 60 -> "C4".
fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = i32::from(note / 12) - 1;
    format!("{}{octave}", NAMES[usize::from(note % 12)])
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
