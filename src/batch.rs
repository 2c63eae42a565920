use crate::analysis::{self, AnalysisError, AnalysisResult};
use crate::recognizer::Recognizer;
use crate::SUPPORTED_EXTENSIONS;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Invalid progress template: {0}")]
    Progress(String),
}

/// Analysis outcome for one source.
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub result: Result<AnalysisResult, AnalysisError>,
}

pub struct BatchReport {
    /// In the same order as the requested sources.
    pub outcomes: Vec<BatchOutcome>,
    pub analyzed: u64,
    pub failed: u64,
}

/// Expand directories into the recognizer output files they contain (sorted).
/// Plain file paths are kept as given, whatever their extension.
pub fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sources = Vec::new();

    for path in paths {
        if !path.is_dir() {
            sources.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && has_supported_extension(e.path()))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        sources.extend(found);
    }

    sources
}

fn has_supported_extension(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Analyze every source in parallel on a pool of `workers` threads.
///
/// Each analysis is independent; a failing source is counted and reported
/// without affecting the others.
pub fn analyze_batch<R>(
    recognizer: &R,
    sources: &[PathBuf],
    workers: usize,
) -> Result<BatchReport, BatchError>
where
    R: Recognizer + ?Sized,
{
    if sources.is_empty() {
        log::info!("No sources to analyze");
        return Ok(BatchReport {
            outcomes: Vec::new(),
            analyzed: 0,
            failed: 0,
        });
    }

    let workers = workers.max(1);
    log::info!("Analyzing {} sources with {} workers", sources.len(), workers);

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .map_err(|e| BatchError::Progress(e.to_string()))?
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        sources
            .par_iter()
            .map(|source| {
                let result = analysis::analyze_source(recognizer, source);
                if let Err(e) = &result {
                    log::warn!("Analysis of {} failed: {}", source.display(), e);
                }
                pb.inc(1);
                BatchOutcome {
                    source: source.clone(),
                    result,
                }
            })
            .collect()
    });

    let analyzed = outcomes.iter().filter(|o| o.result.is_ok()).count() as u64;
    let failed = outcomes.len() as u64 - analyzed;

    pb.finish_with_message(format!("Done: {} analyzed, {} failed", analyzed, failed));

    Ok(BatchReport {
        outcomes,
        analyzed,
        failed,
    })
}
