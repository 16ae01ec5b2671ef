//! BatchWriter: owns the write connection on a dedicated thread.
//!
//! Producers block when the queue is full. Each changeset runs in one
//! BEGIN IMMEDIATE transaction, written in chunks of `batch_size` rows; a
//! failure anywhere rolls the whole changeset back.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use calltrace_core::constants::BATCH_RECV_TIMEOUT_MS;
use calltrace_core::errors::StorageError;
use calltrace_core::tracing::metrics;
use calltrace_core::traits::GraphChangeset;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rusqlite::Connection;

use super::commands::{BatchCommand, WriteStats};
use crate::connection::writer::with_immediate_transaction;
use crate::queries::{build_log, call_edges, data_access, extractions, functions};

pub struct BatchWriter {
    tx: Sender<BatchCommand>,
    handle: Option<JoinHandle<Result<WriteStats, StorageError>>>,
}

impl BatchWriter {
    /// Spawn the writer thread with the given queue capacity and chunk size.
    pub fn new(conn: Connection, capacity: usize, batch_size: usize) -> Result<Self, StorageError> {
        let (tx, rx) = bounded(capacity.max(1));
        let batch_size = batch_size.max(1);
        let handle = std::thread::Builder::new()
            .name("calltrace-writer".to_string())
            .spawn(move || writer_loop(conn, rx, batch_size))
            .map_err(|e| StorageError::Unavailable {
                message: format!("failed to spawn writer thread: {e}"),
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a command without waiting for it.
    pub fn send(&self, command: BatchCommand) -> Result<(), StorageError> {
        self.tx
            .send(command)
            .map_err(|_| StorageError::WriterDisconnected)
    }

    /// Apply a changeset and wait until it has been committed or rolled back.
    pub fn apply(&self, changeset: GraphChangeset) -> Result<WriteStats, StorageError> {
        let (ack, done) = bounded(1);
        self.send(BatchCommand::Apply { changeset, ack })?;
        done.recv().map_err(|_| StorageError::WriterDisconnected)?
    }

    /// Wait until every queued command has been processed.
    pub fn flush(&self) -> Result<(), StorageError> {
        let (ack, done) = bounded(1);
        self.send(BatchCommand::Flush(ack))?;
        done.recv().map_err(|_| StorageError::WriterDisconnected)
    }

    /// Stop the thread after draining the queue; returns lifetime totals.
    pub fn shutdown(mut self) -> Result<WriteStats, StorageError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<WriteStats, StorageError> {
        let Some(handle) = self.handle.take() else {
            return Ok(WriteStats::default());
        };
        // A closed channel also ends the loop.
        let _ = self.tx.send(BatchCommand::Shutdown);
        handle
            .join()
            .map_err(|_| StorageError::WriterDisconnected)?
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "batch writer stopped with an error");
        }
    }
}

impl std::fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriter")
            .field("queued", &self.tx.len())
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn writer_loop(
    conn: Connection,
    rx: Receiver<BatchCommand>,
    batch_size: usize,
) -> Result<WriteStats, StorageError> {
    let timeout = Duration::from_millis(BATCH_RECV_TIMEOUT_MS);
    let mut totals = WriteStats::default();
    let mut dirty = false;

    loop {
        match rx.recv_timeout(timeout) {
            Ok(BatchCommand::Apply { changeset, ack }) => {
                let result = apply_changeset(&conn, &changeset, batch_size);
                match &result {
                    Ok(stats) => {
                        totals.add(stats);
                        dirty = true;
                    }
                    Err(e) => tracing::error!(error = %e, "changeset rolled back"),
                }
                // The producer may have given up waiting.
                let _ = ack.send(result);
            }
            Ok(BatchCommand::Flush(ack)) => {
                let _ = ack.send(());
            }
            Ok(BatchCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                // Idle: fold the WAL back into the main file.
                if dirty {
                    if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);") {
                        tracing::debug!(error = %e, "passive checkpoint skipped");
                    }
                    dirty = false;
                }
            }
        }
    }

    tracing::debug!(changesets = totals.changesets, rows = totals.rows(), "batch writer stopped");
    Ok(totals)
}

/// Deletions first, then inserts, all in one transaction.
pub(crate) fn apply_changeset(
    conn: &Connection,
    changeset: &GraphChangeset,
    batch_size: usize,
) -> Result<WriteStats, StorageError> {
    let span = tracing::debug_span!("apply_changeset", batch_write_time = tracing::field::Empty);
    let _guard = span.enter();
    let start = Instant::now();
    let result = with_immediate_transaction(conn, |tx| {
        let mut stats = WriteStats {
            changesets: 1,
            ..WriteStats::default()
        };
        if changeset.replace_all {
            functions::delete_all(tx)?;
        }
        for file in &changeset.removed_files {
            data_access::delete_by_file(tx, file)?;
            extractions::delete_by_file(tx, file)?;
        }
        for chunk in changeset.removed_functions.chunks(batch_size) {
            stats.functions_deleted += functions::delete_functions(tx, chunk)?;
        }
        for chunk in changeset.cleared_callers.chunks(batch_size) {
            stats.edges_deleted += call_edges::delete_outgoing(tx, chunk)?;
        }
        for chunk in changeset.functions.chunks(batch_size) {
            stats.functions_written += functions::upsert_functions(tx, chunk)?;
        }
        for chunk in changeset.edges.chunks(batch_size) {
            stats.edges_written += call_edges::insert_call_edges(tx, chunk)?;
        }
        for chunk in changeset.data_access.chunks(batch_size) {
            stats.data_access_rows += data_access::insert_data_access(tx, chunk)?;
        }
        for chunk in changeset.extractions.chunks(batch_size) {
            stats.extraction_rows += extractions::upsert_extractions(tx, chunk)?;
        }
        build_log::record(tx, changeset.replace_all, stats.rows())?;
        tracing::debug!(
            replace_all = changeset.replace_all,
            functions = stats.functions_written,
            edges = stats.edges_written,
            "changeset committed"
        );
        Ok(stats)
    });
    span.record(metrics::BATCH_WRITE_TIME, start.elapsed().as_millis() as u64);
    result
}
