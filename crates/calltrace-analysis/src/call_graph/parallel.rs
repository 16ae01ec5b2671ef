//! Parallel extraction over a bounded rayon pool.
//!
//! Workers read shared parse results and write to their own output slot.
//! The cancellation flag is checked once per file, before work starts on it,
//! so a file is either fully extracted or not touched.

use calltrace_core::errors::{CallGraphError, ExtractionError};
use calltrace_core::traits::{Cancellable, CancellationToken};
use rayon::prelude::*;

use crate::parsers::types::ParseResult;
use crate::scanner::types::normalize_path_str;

use super::extractor::{extract_file, ExtractOptions, ExtractedFile};
use super::types::ExtractionFailure;

/// Outcome for one input file.
enum FileOutcome {
    Extracted(ExtractedFile),
    Failed(ExtractionFailure),
    Skipped(String),
}

/// Everything one parallel pass produced, in input order.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub extracted: Vec<ExtractedFile>,
    pub failures: Vec<ExtractionFailure>,
    /// Files never started because cancellation was requested first.
    pub skipped: Vec<String>,
}

impl ExtractionBatch {
    pub fn cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Dedicated extraction pool, sized to leave one core for persistence.
pub struct ExtractionPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl ExtractionPool {
    pub fn new(threads: usize) -> Result<Self, CallGraphError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("calltrace-extract-{i}"))
            .build()
            .map_err(|e| CallGraphError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Extract every parse result, honoring `cancel` at file boundaries.
    pub fn extract_all(
        &self,
        inputs: &[&ParseResult],
        options: &ExtractOptions,
        cancel: &CancellationToken,
    ) -> ExtractionBatch {
        let outcomes: Vec<FileOutcome> = self.pool.install(|| {
            inputs
                .par_iter()
                .map(|pr| {
                    if cancel.is_cancelled() {
                        return FileOutcome::Skipped(normalize_path_str(&pr.file));
                    }
                    match extract_file(pr, options) {
                        Ok(extracted) => FileOutcome::Extracted(extracted),
                        Err(error) => FileOutcome::Failed(ExtractionFailure {
                            file: failure_file(pr, &error),
                            error,
                        }),
                    }
                })
                .collect()
        });

        let mut batch = ExtractionBatch::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted(ef) => batch.extracted.push(ef),
                FileOutcome::Failed(failure) => {
                    tracing::warn!(
                        file = %failure.file,
                        error = %failure.error,
                        "extraction failed; file excluded from the graph"
                    );
                    batch.failures.push(failure);
                }
                FileOutcome::Skipped(file) => batch.skipped.push(file),
            }
        }
        batch
    }
}

impl std::fmt::Debug for ExtractionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPool")
            .field("threads", &self.threads)
            .finish()
    }
}

fn failure_file(pr: &ParseResult, error: &ExtractionError) -> String {
    error
        .file()
        .map(|f| f.to_string())
        .unwrap_or_else(|| normalize_path_str(&pr.file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::types::FunctionInfo;

    fn pr(file: &str) -> ParseResult {
        let mut pr = ParseResult::new(file);
        pr.functions = vec![FunctionInfo::new("f", 1, 3)];
        pr
    }

    #[test]
    fn output_keeps_input_order() {
        let pool = ExtractionPool::new(3).unwrap();
        let inputs: Vec<ParseResult> = (0..40).map(|i| pr(&format!("src/f{i:02}.ts"))).collect();
        let refs: Vec<&ParseResult> = inputs.iter().collect();
        let batch = pool.extract_all(&refs, &ExtractOptions::default(), &CancellationToken::new());
        let files: Vec<&str> = batch.extracted.iter().map(|e| e.file.as_str()).collect();
        let expected: Vec<String> = (0..40).map(|i| format!("src/f{i:02}.ts")).collect();
        assert_eq!(files, expected);
        assert!(!batch.cancelled());
    }

    #[test]
    fn pre_cancelled_token_skips_everything() {
        let pool = ExtractionPool::new(2).unwrap();
        let inputs = [pr("a.ts"), pr("b.ts")];
        let refs: Vec<&ParseResult> = inputs.iter().collect();
        let token = CancellationToken::new();
        token.cancel();
        let batch = pool.extract_all(&refs, &ExtractOptions::default(), &token);
        assert!(batch.extracted.is_empty());
        assert_eq!(batch.skipped, vec!["a.ts", "b.ts"]);
    }

    #[test]
    fn failures_are_collected_not_fatal() {
        let pool = ExtractionPool::new(2).unwrap();
        let mut bad = pr("bad.ts");
        bad.functions[0].end_line = 0;
        let inputs = [pr("good.ts"), bad];
        let refs: Vec<&ParseResult> = inputs.iter().collect();
        let batch = pool.extract_all(&refs, &ExtractOptions::default(), &CancellationToken::new());
        assert_eq!(batch.extracted.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].file, "bad.ts");
    }
}
