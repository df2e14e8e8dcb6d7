//! The analysis orchestrator.
//!
//! One deterministic sequence per run: discover → estimate → check cache →
//! extract → integrate → detect cycles → assemble → cache. Extraction fans
//! out over a worker pool; everything after it is single-threaded. Per-file
//! results are path-sorted before integration so worker scheduling can never
//! leak into the output.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use depmap_ast::FileAnalyzer;
use depmap_cache::{
    content_digest, plan_incremental, CacheEntry, CacheStore, FileFingerprint, IncrementalPlan,
};
use depmap_core::{
    AnalysisResult, AnalysisStage, AnalysisOptions, AnalyzeError, AnalyzeResult,
    CancellationToken, CycleKind, FileAnalysis, ProgressSink, ProgressUpdate, ProjectInfo,
};
use depmap_graph::{
    compute_metrics, compute_quality_metrics, detect_cycles, GraphIntegrator, ModuleGraphSource,
};

use crate::discovery;
use crate::streaming::{
    self, MemoryMonitor, DEFAULT_BATCH_SIZE, LARGE_TREE_THRESHOLD, MAX_FILE_SIZE_BYTES,
    MIN_BATCH_SIZE, VERY_LARGE_TREE_THRESHOLD,
};

/// Below this file count extraction stays on the calling thread.
const SEQUENTIAL_THRESHOLD: usize = 10;
/// Cache directory byte budget.
const CACHE_SIZE_BUDGET_MB: u64 = 500;

pub struct AnalyzerEngine {
    options: AnalysisOptions,
    cache_dir: PathBuf,
    cancel: CancellationToken,
    secondary: Option<Box<dyn ModuleGraphSource + Send + Sync>>,
}

impl AnalyzerEngine {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options,
            cache_dir: default_cache_dir(),
            cancel: CancellationToken::new(),
            secondary: None,
        }
    }

    /// Override the on-disk cache location (tests, sandboxed runs).
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Attach a secondary module-graph source to merge during integration.
    pub fn with_secondary_source(
        mut self,
        source: Box<dyn ModuleGraphSource + Send + Sync>,
    ) -> Self {
        self.secondary = Some(source);
        self
    }

    /// Token observed between batches and between per-file completions.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn secondary_source(&self) -> Option<&dyn ModuleGraphSource> {
        self.secondary.as_ref().map(|boxed| {
            let source: &dyn ModuleGraphSource = boxed.as_ref();
            source
        })
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Run the full pipeline. The terminal progress stage (`done` or
    /// `failed`) is always emitted before this returns.
    pub fn analyze_project(
        &self,
        root: &Path,
        sink: &dyn ProgressSink,
    ) -> AnalyzeResult<AnalysisResult> {
        let outcome = self.run(root, sink);
        if let Err(err) = &outcome {
            sink.update(&ProgressUpdate::new(
                AnalysisStage::Failed,
                1.0,
                err.to_string(),
            ));
        }
        outcome
    }

    fn run(&self, root: &Path, sink: &dyn ProgressSink) -> AnalyzeResult<AnalysisResult> {
        let started = Instant::now();
        self.check_cancelled()?;

        emit(sink, AnalysisStage::Discovering, 0.02, "discovering source files");
        let files = discovery::discover_files(root, &self.options)?;
        sink.update(
            &ProgressUpdate::new(AnalysisStage::Discovering, 0.05, "discovery complete")
                .with_counts(0, files.len()),
        );

        emit(sink, AnalysisStage::Estimating, 0.08, "estimating tree size");
        if self.options.enable_performance_optimization && files.len() > LARGE_TREE_THRESHOLD {
            info!(files = files.len(), "large tree detected, using streamed path");
            return self.run_streamed(root, files, sink, started);
        }

        let mut store = self.open_store();
        let cache_id = CacheStore::cache_id(root, &self.options);
        let mut incremental: Option<(CacheEntry, IncrementalPlan)> = None;
        if let Some(store) = store.as_mut() {
            emit(sink, AnalysisStage::CheckingCache, 0.10, "checking analysis cache");
            if let Some(entry) = store.load(&cache_id) {
                let plan = plan_incremental(&entry, &files);
                if plan.is_safe(files.len()) {
                    incremental = Some((entry, plan));
                } else {
                    debug!("incremental plan over safety threshold, running full analysis");
                }
            }
        }

        if let Some((entry, plan)) = incremental {
            return self.run_incremental(
                root,
                &files,
                entry,
                plan,
                store.as_mut(),
                &cache_id,
                sink,
                started,
            );
        }

        let analyses = self.extract(&files, sink, 0.15, 0.75)?;
        self.integrate_and_assemble(
            root,
            &files,
            analyses,
            store.as_mut(),
            &cache_id,
            sink,
            started,
            Vec::new(),
            true,
            self.options.enable_quality_metrics,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_incremental(
        &self,
        root: &Path,
        files: &[PathBuf],
        entry: CacheEntry,
        plan: IncrementalPlan,
        store: Option<&mut CacheStore>,
        cache_id: &str,
        sink: &dyn ProgressSink,
        started: Instant,
    ) -> AnalyzeResult<AnalysisResult> {
        info!(
            reuse = plan.reuse.len(),
            reanalyze = plan.reanalyze.len(),
            new = plan.new.len(),
            dropped = plan.dropped.len(),
            "incremental analysis"
        );

        let reusable: HashSet<&String> = plan.reuse.iter().collect();
        let mut analyses: Vec<FileAnalysis> = entry
            .file_analyses
            .into_iter()
            .filter(|a| reusable.contains(&a.file_path))
            .collect();

        let mut to_extract = plan.files_to_extract();
        to_extract.sort();
        let fresh = self.extract(&to_extract, sink, 0.15, 0.75)?;
        analyses.extend(fresh);

        self.integrate_and_assemble(
            root,
            files,
            analyses,
            store,
            cache_id,
            sink,
            started,
            Vec::new(),
            true,
            self.options.enable_quality_metrics,
        )
    }

    fn run_streamed(
        &self,
        root: &Path,
        files: Vec<PathBuf>,
        sink: &dyn ProgressSink,
        started: Instant,
    ) -> AnalyzeResult<AnalysisResult> {
        let estimate = streaming::estimate_tree(&files, MAX_FILE_SIZE_BYTES);
        let mut warnings: Vec<String> = estimate
            .oversized
            .iter()
            .map(|p| format!("skipped oversized file {}", p.display()))
            .collect();
        let oversized: HashSet<&PathBuf> = estimate.oversized.iter().collect();
        let files: Vec<PathBuf> = files
            .into_iter()
            .filter(|p| !oversized.contains(p))
            .collect();
        if files.is_empty() {
            return Err(AnalyzeError::InvalidInput(
                "all candidate files exceed the per-file size cap".to_string(),
            ));
        }
        info!(
            files = files.len(),
            bytes = estimate.total_bytes,
            oversized = oversized.len(),
            "streaming analysis"
        );
        if self.options.enable_caching {
            warnings.push("cache persistence skipped on the streamed path".to_string());
        }

        // Above the very-large threshold the optional passes are dropped;
        // import-cycle detection always runs.
        let with_call_cycles = files.len() <= VERY_LARGE_TREE_THRESHOLD;
        let quality_metrics = self.options.enable_quality_metrics && with_call_cycles;

        let analyzer = FileAnalyzer::new(&self.options);
        let pool = self.build_pool(files.len())?;
        let mut monitor = MemoryMonitor::new(self.options.max_memory_mb);
        let mut integrator = GraphIntegrator::new();

        let total = files.len();
        let mut batch_size = DEFAULT_BATCH_SIZE;
        let mut offset = 0;
        while offset < total {
            self.check_cancelled()?;
            let end = (offset + batch_size).min(total);
            let batch = &files[offset..end];
            let analyses: Vec<FileAnalysis> =
                pool.install(|| batch.par_iter().map(|p| analyzer.analyze_file(p)).collect());
            for analysis in &analyses {
                if let Some(error) = &analysis.parse_error {
                    warnings.push(format!("{}: {error}", analysis.file_path));
                }
            }
            integrator.add_analyses(analyses);
            offset = end;

            sink.update(
                &ProgressUpdate::new(
                    AnalysisStage::Extracting,
                    0.15 + 0.60 * offset as f64 / total as f64,
                    "extracting",
                )
                .with_counts(offset, total),
            );

            if monitor.is_critical() {
                debug!("memory pressure between batches, reclaiming");
                integrator.shrink();
                if monitor.is_critical() {
                    if batch_size > MIN_BATCH_SIZE {
                        batch_size = (batch_size / 2).max(MIN_BATCH_SIZE);
                        debug!(batch_size, "shrinking batch size");
                    } else {
                        return Err(AnalyzeError::Resource(format!(
                            "resident memory {} exceeds ceiling at minimum batch size",
                            monitor.rss()
                        )));
                    }
                }
            }
        }

        emit(sink, AnalysisStage::Integrating, 0.80, "integrating results");
        self.check_cancelled()?;
        let (graph, relationships) = integrator.finish(self.secondary_source(), &self.options);

        emit(sink, AnalysisStage::DetectingCycles, 0.88, "detecting cycles");
        let mut cycles = detect_cycles(&relationships, CycleKind::Import);
        if with_call_cycles {
            cycles.extend(detect_cycles(&relationships, CycleKind::Call));
        }

        emit(sink, AnalysisStage::Assembling, 0.95, "assembling result");
        let metrics = compute_metrics(&graph, &relationships, &cycles, quality_metrics);
        let quality_records = if quality_metrics {
            compute_quality_metrics(&graph, &relationships)
        } else {
            Vec::new()
        };
        let analysis_id = streamed_analysis_id(root, &self.options, &files);
        let result = AnalysisResult {
            analysis_id,
            project_info: self.project_info(root, total, started),
            dependency_graph: graph,
            relationships,
            cycles,
            metrics,
            quality_metrics: quality_records,
            warnings,
        };

        emit(sink, AnalysisStage::Done, 1.0, "analysis complete");
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn integrate_and_assemble(
        &self,
        root: &Path,
        files: &[PathBuf],
        mut analyses: Vec<FileAnalysis>,
        store: Option<&mut CacheStore>,
        cache_id: &str,
        sink: &dyn ProgressSink,
        started: Instant,
        mut warnings: Vec<String>,
        with_call_cycles: bool,
        quality_metrics: bool,
    ) -> AnalyzeResult<AnalysisResult> {
        analyses.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        for analysis in &analyses {
            if let Some(error) = &analysis.parse_error {
                warnings.push(format!("{}: {error}", analysis.file_path));
            }
        }

        emit(sink, AnalysisStage::Integrating, 0.80, "integrating results");
        self.check_cancelled()?;
        let cache_payload = store.is_some().then(|| analyses.clone());
        let mut integrator = GraphIntegrator::new();
        integrator.add_analyses(analyses);
        let (graph, relationships) = integrator.finish(self.secondary_source(), &self.options);

        emit(sink, AnalysisStage::DetectingCycles, 0.88, "detecting cycles");
        let mut cycles = detect_cycles(&relationships, CycleKind::Import);
        if with_call_cycles {
            cycles.extend(detect_cycles(&relationships, CycleKind::Call));
        }

        emit(sink, AnalysisStage::Assembling, 0.95, "assembling result");
        let fingerprints = fingerprint_files(files);
        let metrics = compute_metrics(&graph, &relationships, &cycles, quality_metrics);
        let quality_records = if quality_metrics {
            compute_quality_metrics(&graph, &relationships)
        } else {
            Vec::new()
        };
        let analysis_id = analysis_id(root, &self.options, &fingerprints);
        let result = AnalysisResult {
            analysis_id,
            project_info: self.project_info(root, files.len(), started),
            dependency_graph: graph,
            relationships,
            cycles,
            metrics,
            quality_metrics: quality_records,
            warnings,
        };

        if let (Some(store), Some(payload)) = (store, cache_payload) {
            emit(sink, AnalysisStage::Caching, 0.98, "persisting analysis cache");
            let entry = CacheEntry::new(
                cache_id.to_string(),
                root.to_string_lossy().into_owned(),
                fingerprints,
                payload,
                result.clone(),
            );
            if let Err(e) = store.save(&entry) {
                warn!(error = %e, "failed to persist cache entry");
            }
        }

        emit(sink, AnalysisStage::Done, 1.0, "analysis complete");
        Ok(result)
    }

    /// Extract a file set, sequentially for small runs, otherwise on a
    /// bounded pool in chunks. Progress is reported and cancellation
    /// observed between chunk completions; an in-flight chunk runs to its
    /// end and is discarded on cancellation.
    fn extract(
        &self,
        files: &[PathBuf],
        sink: &dyn ProgressSink,
        from: f64,
        to: f64,
    ) -> AnalyzeResult<Vec<FileAnalysis>> {
        let analyzer = FileAnalyzer::new(&self.options);
        let total = files.len();
        let mut results = Vec::with_capacity(total);
        if total == 0 {
            return Ok(results);
        }

        let span = to - from;
        if total < SEQUENTIAL_THRESHOLD || self.options.max_workers <= 1 {
            for (done, file) in files.iter().enumerate() {
                self.check_cancelled()?;
                results.push(analyzer.analyze_file(file));
                sink.update(
                    &ProgressUpdate::new(
                        AnalysisStage::Extracting,
                        from + span * (done + 1) as f64 / total as f64,
                        "extracting",
                    )
                    .with_file(file.to_string_lossy())
                    .with_counts(done + 1, total),
                );
            }
            return Ok(results);
        }

        let pool = self.build_pool(total)?;
        let chunk_size = (self.options.max_workers * 4).max(16);
        let mut done = 0;
        for chunk in files.chunks(chunk_size) {
            self.check_cancelled()?;
            let mut batch: Vec<FileAnalysis> =
                pool.install(|| chunk.par_iter().map(|p| analyzer.analyze_file(p)).collect());
            done += chunk.len();
            results.append(&mut batch);
            let current = chunk.last().map(|p| p.to_string_lossy().into_owned());
            let mut update = ProgressUpdate::new(
                AnalysisStage::Extracting,
                from + span * done as f64 / total as f64,
                "extracting",
            )
            .with_counts(done, total);
            if let Some(file) = current {
                update = update.with_file(file);
            }
            sink.update(&update);
        }
        Ok(results)
    }

    fn build_pool(&self, work_items: usize) -> AnalyzeResult<rayon::ThreadPool> {
        let threads = self.options.max_workers.clamp(1, work_items.max(1));
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| AnalyzeError::Internal(format!("cannot build worker pool: {e}")))
    }

    fn open_store(&self) -> Option<CacheStore> {
        if !self.options.enable_caching {
            return None;
        }
        match CacheStore::open(&self.cache_dir, CACHE_SIZE_BUDGET_MB) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "cache unusable, continuing without it");
                None
            }
        }
    }

    fn project_info(&self, root: &Path, total_files: usize, started: Instant) -> ProjectInfo {
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        ProjectInfo {
            name: canonical
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| canonical.to_string_lossy().into_owned()),
            path: canonical.to_string_lossy().into_owned(),
            analyzed_at: Utc::now().to_rfc3339(),
            total_files,
            analysis_duration_seconds: started.elapsed().as_secs_f64(),
            analyzer_version: env!("CARGO_PKG_VERSION").to_string(),
            analysis_options: self.options.clone(),
        }
    }

    fn check_cancelled(&self) -> AnalyzeResult<()> {
        if self.cancel.is_cancelled() {
            Err(AnalyzeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn emit(sink: &dyn ProgressSink, stage: AnalysisStage, progress: f64, message: &str) {
    sink.update(&ProgressUpdate::new(stage, progress, message));
}

fn fingerprint_files(files: &[PathBuf]) -> BTreeMap<String, FileFingerprint> {
    files
        .iter()
        .filter_map(|path| FileFingerprint::from_file(path).ok())
        .map(|fingerprint| (fingerprint.file_path.clone(), fingerprint))
        .collect()
}

/// Content-addressed run identifier: identical bytes and options always
/// yield the same id.
fn analysis_id(
    root: &Path,
    options: &AnalysisOptions,
    fingerprints: &BTreeMap<String, FileFingerprint>,
) -> String {
    let mut material = String::new();
    material.push_str(&root.to_string_lossy());
    material.push('\n');
    material.push_str(&options.cache_key_material());
    for (path, fingerprint) in fingerprints {
        material.push('\n');
        material.push_str(path);
        material.push(':');
        material.push_str(&fingerprint.checksum);
    }
    content_digest(material.as_bytes())[..32].to_string()
}

/// Cheaper identifier for the streamed path, where hashing every file again
/// would defeat the memory/latency budget.
fn streamed_analysis_id(root: &Path, options: &AnalysisOptions, files: &[PathBuf]) -> String {
    let mut material = String::new();
    material.push_str(&root.to_string_lossy());
    material.push('\n');
    material.push_str(&options.cache_key_material());
    for file in files {
        material.push('\n');
        material.push_str(&file.to_string_lossy());
    }
    content_digest(material.as_bytes())[..32].to_string()
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("depmap"))
        .unwrap_or_else(|| PathBuf::from(".depmap-cache"))
}
