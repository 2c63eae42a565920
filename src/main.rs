use anyhow::{Context, Result};
use chordscope::analysis::{self, AnalysisResult};
use chordscope::config::AppConfig;
use chordscope::export::midi::{self, MidiExportOptions};
use chordscope::export::{self, ExportDocument, ExportFormat};
use chordscope::recognizer::LabFileRecognizer;
use chordscope::segment::{ChordSegment, ChordSequence};
use chordscope::stats::{self, ChordStatistics};
use chordscope::{batch, metadata, synth};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "chordscope", version, about = "Chord timeline analyzer")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recognizer output file (.lab, .txt or .json) and print a report
    Analyze {
        /// Recognizer output file
        input: PathBuf,

        /// Audio file the labels came from (shows its properties)
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Number of transitions to list (defaults to config)
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Print the segment timeline
        #[arg(long)]
        timeline: bool,

        /// Merge consecutive identical labels in the timeline
        #[arg(long, requires = "timeline")]
        coalesce: bool,
    },

    /// Analyze every recognizer output file under the given paths
    Batch {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Export an analysis as JSON or CSV
    Export {
        /// Recognizer output file
        input: PathBuf,

        /// Output format (defaults to config)
        #[arg(short, long, value_enum)]
        format: Option<ExportFormat>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Audio file to describe in the JSON document
        #[arg(long)]
        audio: Option<PathBuf>,

        /// CSV only: write the label distribution instead of the timeline
        #[arg(long)]
        distribution: bool,
    },

    /// Synthesize the chords of an analysis into a MIDI file
    Midi {
        /// Recognizer output file
        input: PathBuf,

        /// Output .mid file
        #[arg(short, long)]
        output: PathBuf,

        /// Tempo in BPM (defaults to config)
        #[arg(long)]
        tempo: Option<u32>,
    },

    /// Analyze a hand-entered progression, optionally rendering it to MIDI
    Progression {
        /// Chord labels in order (e.g. C:maj A:min F:maj G:maj)
        #[arg(required = true)]
        labels: Vec<String>,

        /// Write a MIDI rendering to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seconds per chord (defaults to config)
        #[arg(long)]
        seconds_per_chord: Option<f64>,

        /// Tempo in BPM (defaults to config)
        #[arg(long)]
        tempo: Option<u32>,
    },

    /// Show how a chord label resolves to pitches
    Parse {
        /// Chord label (e.g. "Bb:min7")
        label: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    match cli.command {
        Commands::Analyze { input, audio, top, timeline, coalesce } => {
            let result = analyze_file(&input)?;

            if let Some(audio) = audio {
                print_audio(&metadata::read_audio_metadata(&audio));
                println!();
            }

            print_report(
                &result,
                top.unwrap_or(config.report.top_transitions),
            );

            if timeline {
                println!();
                if coalesce {
                    print_timeline(&result.sequence().coalesced());
                } else {
                    print_timeline(result.sequence().segments());
                }
            }
        }

        Commands::Batch { paths, jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let sources = batch::collect_sources(&paths);
            if sources.is_empty() {
                anyhow::bail!("No recognizer output files found under the given paths.");
            }

            let report = batch::analyze_batch(&LabFileRecognizer, &sources, workers)
                .context("Batch analysis failed")?;

            print_batch_table(&report.outcomes);
            println!();
            println!(
                "Batch complete: {} analyzed, {} failed",
                report.analyzed, report.failed
            );
        }

        Commands::Export { input, format, output, audio, distribution } => {
            let result = analyze_file(&input)?;
            let format = format.unwrap_or(config.export.format);

            let rendered = match format {
                ExportFormat::Json => {
                    let audio = audio.as_deref().map(metadata::read_audio_metadata);
                    let mut doc = ExportDocument::new(&result)
                        .with_source(input.display().to_string());
                    if let Some(audio) = &audio {
                        doc = doc.with_audio(audio);
                    }
                    export::to_json(&doc).context("Failed to serialize analysis")?
                }
                ExportFormat::Csv if distribution => export::distribution_csv(&result),
                ExportFormat::Csv => export::timeline_csv(&result),
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported {} to {}", format.extension(), path.display());
                }
                None => print!("{}", rendered),
            }
        }

        Commands::Midi { input, output, tempo } => {
            let result = analyze_file(&input)?;
            let tempo = tempo.unwrap_or(config.synthesis.tempo_bpm);
            write_midi(&config, result.sequence(), tempo, &output)?;
        }

        Commands::Progression { labels, output, seconds_per_chord, tempo } => {
            let seconds = seconds_per_chord.unwrap_or(config.progression.seconds_per_chord);
            if !(seconds.is_finite() && seconds > 0.0) {
                anyhow::bail!("Seconds per chord must be positive, got {}", seconds);
            }

            let normalized = ChordSequence::from_labels(labels, seconds);
            let sequence = normalized.sequence;
            if sequence.valid_count() == 0 {
                anyhow::bail!("No valid chord labels in the progression.");
            }

            let statistics = stats::compute(&sequence);
            println!("Progression: {}", ChordStatistics::progression_summary(&sequence));
            println!();
            print_statistics(&statistics, config.report.top_transitions);

            if let Some(path) = output {
                println!();
                let tempo = tempo.unwrap_or(config.synthesis.tempo_bpm);
                write_midi(&config, &sequence, tempo, &path)?;
            }
        }

        Commands::Parse { label } => {
            let chord = config
                .chord_parser()
                .parse(&label)
                .with_context(|| format!("Cannot parse \"{}\"", label))?;

            let pitches: Vec<String> = chord.pitches().map(|p| p.to_string()).collect();
            println!("Label:     {}", label);
            println!("Root:      {} (pitch class {})", chord.root, chord.root_pitch_class);
            if chord.known_quality {
                println!("Quality:   {:?}", chord.quality);
            } else {
                println!("Quality:   {:?} (unknown, major triad used)", chord.quality);
            }
            println!("Intervals: {:?}", chord.intervals);
            println!("Pitches:   {}", pitches.join(" "));
        }
    }

    Ok(())
}

fn analyze_file(input: &Path) -> Result<AnalysisResult> {
    let result = analysis::analyze_source(&LabFileRecognizer, input)
        .with_context(|| format!("Failed to analyze {}", input.display()))?;
    for rejected in result.rejected() {
        log::warn!("{}: {}", input.display(), rejected);
    }
    Ok(result)
}

fn write_midi(config: &AppConfig, sequence: &ChordSequence, tempo: u32, output: &Path) -> Result<()> {
    let notes = synth::synthesize_with(&config.chord_parser(), sequence, tempo)
        .context("Synthesis failed")?;

    let options = MidiExportOptions {
        ppq: config.export.ppq,
        ..Default::default()
    };
    let bytes = midi::export_midi(&notes, tempo, &options).context("MIDI export failed")?;
    std::fs::write(output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} notes to {} at {} BPM",
        notes.len(),
        output.display(),
        tempo
    );
    Ok(())
}

fn print_audio(audio: &metadata::AudioMetadata) {
    println!("Audio: {}", audio.path);
    match audio.duration_secs {
        Some(secs) => println!("  Duration:    {}", format_time(secs)),
        None => println!("  Duration:    unknown"),
    }
    if let Some(rate) = audio.sample_rate {
        println!("  Sample rate: {} Hz", rate);
    }
    if let Some(channels) = audio.channels {
        println!("  Channels:    {}", channels);
    }
    if let Some(kbps) = audio.bitrate_kbps {
        println!("  Bitrate:     {} kbps", kbps);
    }
}

fn print_report(result: &AnalysisResult, top: usize) {
    let statistics = result.statistics();
    println!(
        "Segments: {} ({} rejected)",
        result.sequence().len(),
        result.rejected().len()
    );
    println!("Duration: {}", format_time(result.duration()));
    println!();
    print_statistics(statistics, top);
}

fn print_statistics(s: &ChordStatistics, top: usize) {
    println!("Chords:        {} total, {} unique", s.total_count, s.unique_count);
    if let Some(mc) = &s.most_common {
        println!("Most common:   {} ({}x)", mc.label, mc.count);
    }
    println!("Diversity:     {:.2}", s.diversity_ratio);
    println!("Changes:       {} ({:.0}%)", s.change_count, s.change_ratio * 100.0);
    println!("Longest run:   {}", s.longest_run);
    println!(
        "Major/minor:   {:.0}% / {:.0}%",
        s.major_ratio() * 100.0,
        s.minor_ratio() * 100.0
    );
    println!("Avg duration:  {:.2}s", s.average_chord_duration);
    if let Some(c) = s.complexity() {
        println!("Complexity:    {:.0} ({})", c.score, c.level.label());
    }

    println!();
    println!("{:<20} {:>6} {:>7}", "Chord", "Count", "Share");
    println!("{}", "-".repeat(35));
    for (lc, share) in s.ranked_distribution() {
        println!(
            "{:<20} {:>6} {:>6.1}%",
            truncate(&lc.label, 20),
            lc.count,
            share * 100.0
        );
    }

    let transitions = s.top_transitions(top);
    if !transitions.is_empty() {
        println!();
        println!("{:<36} {:>6}", "Transition", "Count");
        println!("{}", "-".repeat(43));
        for t in transitions {
            println!("{:<36} {:>6}", truncate(&t.pattern, 36), t.count);
        }
    }
}

fn print_timeline(segments: &[ChordSegment]) {
    println!("{:>9} {:>9}  {}", "Start", "End", "Chord");
    println!("{}", "-".repeat(40));
    for seg in segments {
        let label = if seg.is_valid() {
            seg.label.clone()
        } else {
            format!("({})", seg.label)
        };
        println!(
            "{:>9} {:>9}  {}",
            format_time(seg.start),
            format_time(seg.end),
            label
        );
    }
}

fn print_batch_table(outcomes: &[batch::BatchOutcome]) {
    println!(
        "{:<40} {:>7} {:>6} {:>6}  {}",
        "Source", "Min", "Chords", "Unique", "Most common"
    );
    println!("{}", "-".repeat(80));

    for o in outcomes {
        let name = o
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| o.source.display().to_string());

        match &o.result {
            Ok(result) => {
                let s = result.statistics();
                let most_common = s.most_common.as_ref().map(|m| m.label.as_str()).unwrap_or("-");
                println!(
                    "{:<40} {:>7.1} {:>6} {:>6}  {}",
                    truncate(&name, 40),
                    result.duration() / 60.0,
                    s.total_count,
                    s.unique_count,
                    most_common
                );
            }
            Err(e) => println!("{:<40} error: {}", truncate(&name, 40), e),
        }
    }
}

/// `m:ss.s`
fn format_time(secs: f64) -> String {
    let tenths = (secs * 10.0).round() as u64;
    format!("{}:{:02}.{}", tenths / 600, (tenths % 600) / 10, tenths % 10)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_rounds_before_splitting_minutes() {
        assert_eq!(format_time(0.0), "0:00.0");
        assert_eq!(format_time(9.54), "0:09.5");
        assert_eq!(format_time(59.96), "1:00.0");
        assert_eq!(format_time(125.25), "2:05.3");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("C:maj", 20), "C:maj");
        assert_eq!(truncate("C → G → A:min", 8), "C → G...");
    }
}
