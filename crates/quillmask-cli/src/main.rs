use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use quillmask_core::normalize::{normalize_text, strip_pos_annotations};
use quillmask_search::Operator;
use quillmask_core::output::FileSink;
use quillmask_core::{goal_js_distance, NgramProfile, ObfuscationOptions, Obfuscator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Heuristic authorship obfuscation", long_about = None)]
struct Cli {
    /// Input text file to be obfuscated
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Output file for the obfuscated text
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Target n-gram profile (regenerated if --profile-source-files is set)
    #[arg(short, long, value_name = "FILE")]
    profile: PathBuf,

    /// Source files to generate the target profile from
    #[arg(long, value_name = "FILE", num_args = 1..)]
    profile_source_files: Vec<PathBuf>,

    /// Strip POS tags from the input text
    #[arg(short = 's', long)]
    strip_pos: bool,

    /// Strip POS tags from the profile source files
    #[arg(long, requires = "profile_source_files")]
    profile_strip_pos: bool,

    /// Skip Unicode/punctuation canonicalization of the input
    #[arg(long)]
    skip_normalization: bool,

    /// Seed for operator randomness (omit for a non-deterministic run)
    #[arg(long)]
    seed: Option<u64>,

    /// Override the goal JS-distance (default: length-based formula)
    #[arg(long)]
    goal: Option<f64>,

    /// Synonym dictionary (TSV: word, alternatives...)
    #[arg(long, value_name = "FILE", default_value = "assets/synonym-dictionary.tsv")]
    synonyms: PathBuf,

    /// Hypernym dictionary (TSV: word, alternatives...)
    #[arg(long, value_name = "FILE", default_value = "assets/hypernym-dictionary.tsv")]
    hypernyms: PathBuf,

    /// Abort when free system memory falls below this many MiB
    #[arg(long, default_value_t = 2000)]
    free_memory_limit: u64,

    /// Snapshot progress every n-th goal check
    #[arg(long, default_value_t = 500)]
    status_update_interval: u64,

    /// Prune the frontier once it grows past this size
    #[arg(long, default_value_t = 40_000)]
    max_open_size: usize,
}

fn build_profile(files: &[PathBuf], strip_pos: bool) -> Result<NgramProfile, String> {
    let mut full_text = String::new();
    for path in files {
        let text = std::fs::read(path)
            .map_err(|e| format!("could not read '{}': {e}", path.display()))?;
        full_text.push_str(&String::from_utf8_lossy(&text));
    }

    if strip_pos {
        full_text = strip_pos_annotations(&full_text);
    }
    let full_text = normalize_text(&full_text);

    NgramProfile::generate_from_bytes(full_text.as_bytes()).map_err(|e| e.to_string())
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let input = std::fs::read(&cli.input).unwrap_or_else(|e| {
        error!("could not read input '{}': {e}", cli.input.display());
        process::exit(1);
    });

    let profile = if !cli.profile_source_files.is_empty() {
        info!("generating target profile from {} file(s)", cli.profile_source_files.len());
        let profile = build_profile(&cli.profile_source_files, cli.profile_strip_pos)
            .unwrap_or_else(|e| {
                error!("could not generate target profile: {e}");
                process::exit(1);
            });
        info!("saving target profile to '{}'", cli.profile.display());
        if let Err(e) = profile.save(&cli.profile) {
            error!("could not save target profile: {e}");
            process::exit(1);
        }
        profile
    } else {
        info!("loading target profile from '{}'", cli.profile.display());
        NgramProfile::load(&cli.profile).unwrap_or_else(|e| {
            error!("could not load target profile: {e}");
            process::exit(1);
        })
    };

    info!(
        "target profile: {} distinct n-grams, n = {}",
        profile.size(),
        profile.n()
    );
    if let Some(goal) = cli.goal {
        info!("goal JS-distance override: {goal:.5}");
    } else {
        info!(
            "goal JS-distance from input length: {:.5}",
            goal_js_distance(input.len())
        );
    }

    let options = ObfuscationOptions {
        strip_pos: cli.strip_pos,
        skip_normalization: cli.skip_normalization,
        seed: cli.seed,
        goal_js_dist: cli.goal,
        status_update_interval: cli.status_update_interval,
        free_memory_limit_in_mbytes: cli.free_memory_limit,
        max_open_size: cli.max_open_size,
        synonym_dictionary: Some(cli.synonyms),
        hypernym_dictionary: Some(cli.hypernyms),
        ..Default::default()
    };

    let mut sink = FileSink::new(&cli.output);
    let obfuscator = Obfuscator::new(options);

    let status = obfuscator
        .obfuscate(&input, &mut sink, Arc::new(profile))
        .unwrap_or_else(|e| {
            error!("obfuscation failed: {e}");
            process::exit(1);
        });

    info!("===== run summary =====");
    info!(
        "goal reached:    {}",
        status.has_goal_state.load(Ordering::SeqCst)
    );
    info!(
        "aborted:         caller={} memguard={}",
        status.aborted_by_caller.load(Ordering::SeqCst),
        status.aborted_by_memguard.load(Ordering::SeqCst)
    );
    info!(
        "states:          open={} closed={} duplicated={} reopened={}",
        status.size_of_open.load(Ordering::Relaxed),
        status.size_of_closed.load(Ordering::Relaxed),
        status.num_duplicated_states.load(Ordering::Relaxed),
        status.num_reopened_states.load(Ordering::Relaxed)
    );
    info!(
        "runtime:         {} ms, {} goal checks",
        status.runtime_in_millis.load(Ordering::Relaxed),
        status.num_goal_checks.load(Ordering::Relaxed)
    );
    for (op, stats) in status.operators.iter().zip(&status.operator_stats) {
        info!(
            "operator {:<24} applications={:<6} states={:<6} micros={}",
            op.name(),
            stats.num_applications.load(Ordering::Relaxed),
            stats.num_generated_states.load(Ordering::Relaxed),
            stats.runtime_in_micros.load(Ordering::Relaxed)
        );
    }
    if let Some(message) = status.error_message() {
        error!("search error: {message}");
        process::exit(1);
    }
}
