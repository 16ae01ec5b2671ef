//! Conversions between graph values and storage rows, and the changesets a
//! build or update writes.

use std::collections::BTreeSet;
use std::sync::Arc;

use calltrace_core::errors::{CallGraphError, StorageError};
use calltrace_core::traits::{
    CallEdgeRecord, DataAccessRecord, EntryPointRecord, ExtractionRecord, FunctionRecord,
    GraphChangeset,
};

use super::extractor::ExtractedFile;
use super::invalidation::Extractions;
use super::types::{CallEdge, CallGraph, EdgeView, EntryPoint, EntryPointKind, FunctionNode, Resolution};

pub fn function_record(node: &FunctionNode) -> FunctionRecord {
    FunctionRecord {
        id: node.id.clone(),
        file: node.file.clone(),
        name: node.name.clone(),
        qualified_name: node.qualified_name.clone(),
        language: node.language.id().to_string(),
        line: node.line,
        end_line: node.end_line,
        is_exported: node.is_exported,
        signature_hash: node.signature_hash,
        body_hash: node.body_hash,
        return_type: node.return_type.clone(),
        entry_point: node.entry_point.as_ref().map(entry_point_record),
    }
}

pub fn entry_point_record(entry: &EntryPoint) -> EntryPointRecord {
    EntryPointRecord {
        kind: entry.kind.name().to_string(),
        route: entry.route.clone(),
        method: entry.method.clone(),
        framework: entry.framework.clone(),
        confidence: entry.confidence,
    }
}

/// `None` for a kind this build does not know.
pub fn entry_point_from_record(record: &EntryPointRecord) -> Option<EntryPoint> {
    Some(EntryPoint {
        kind: EntryPointKind::from_name(&record.kind)?,
        route: record.route.clone(),
        method: record.method.clone(),
        framework: record.framework.clone(),
        confidence: record.confidence,
    })
}

pub fn edge_record(caller: &str, callee: &str, edge: &CallEdge) -> CallEdgeRecord {
    CallEdgeRecord {
        caller_id: caller.to_string(),
        callee_id: callee.to_string(),
        call_site_line: edge.call_site_line,
        resolution: edge.resolution.name().to_string(),
        confidence: edge.confidence,
    }
}

pub fn edge_view(record: &CallEdgeRecord) -> Result<EdgeView, StorageError> {
    let resolution =
        Resolution::from_name(&record.resolution).ok_or_else(|| StorageError::Serialization {
            message: format!(
                "unknown resolution '{}' on edge {} -> {}",
                record.resolution, record.caller_id, record.callee_id
            ),
        })?;
    Ok(EdgeView {
        caller: record.caller_id.clone(),
        callee: record.callee_id.clone(),
        call_site_line: record.call_site_line,
        resolution,
        confidence: record.confidence,
    })
}

pub fn data_access_records(ef: &ExtractedFile) -> Vec<DataAccessRecord> {
    ef.data_access
        .iter()
        .map(|m| DataAccessRecord {
            function_id: m.function_id.clone(),
            file: ef.file.clone(),
            table_name: m.table.clone(),
            operation: m.operation.name().to_string(),
            line: m.line,
        })
        .collect()
}

pub fn encode_extraction(ef: &ExtractedFile) -> Result<ExtractionRecord, CallGraphError> {
    let payload = serde_json::to_string(ef).map_err(StorageError::from)?;
    Ok(ExtractionRecord {
        file: ef.file.clone(),
        language: ef.language.id().to_string(),
        payload,
    })
}

pub fn decode_extraction(record: &ExtractionRecord) -> Result<ExtractedFile, CallGraphError> {
    let ef: ExtractedFile =
        serde_json::from_str(&record.payload).map_err(|e| CallGraphError::CorruptExtraction {
            file: record.file.clone(),
            message: e.to_string(),
        })?;
    if ef.file != record.file {
        return Err(CallGraphError::CorruptExtraction {
            file: record.file.clone(),
            message: format!("payload belongs to {}", ef.file),
        });
    }
    Ok(ef)
}

/// Every row of a freshly built graph; replaces whatever was stored.
pub fn full_changeset(
    graph: &CallGraph,
    extractions: &Extractions,
) -> Result<GraphChangeset, CallGraphError> {
    let mut changeset = GraphChangeset {
        replace_all: true,
        functions: graph
            .canonical_functions()
            .iter()
            .map(function_record)
            .collect(),
        edges: graph
            .canonical_edges()
            .iter()
            .map(|e| CallEdgeRecord {
                caller_id: e.caller.clone(),
                callee_id: e.callee.clone(),
                call_site_line: e.call_site_line,
                resolution: e.resolution.name().to_string(),
                confidence: e.confidence,
            })
            .collect(),
        ..Default::default()
    };
    for ef in extractions.values() {
        changeset.data_access.extend(data_access_records(ef));
        changeset.extractions.push(encode_extraction(ef)?);
    }
    Ok(changeset)
}

/// What an incremental update touched, in graph terms.
pub struct IncrementalChanges<'a> {
    /// Every file removed, re-extracted or added.
    pub changed_files: &'a BTreeSet<String>,
    pub removed_functions: &'a [String],
    /// Freshly extracted files.
    pub fresh: &'a [Arc<ExtractedFile>],
    /// Callers whose outgoing edges were recomputed.
    pub reresolved: &'a BTreeSet<String>,
}

/// Rows for one incremental update, applied against the graph after it.
pub fn incremental_changeset(
    graph: &CallGraph,
    changes: &IncrementalChanges<'_>,
) -> Result<GraphChangeset, CallGraphError> {
    let mut changeset = GraphChangeset {
        removed_files: changes.changed_files.iter().cloned().collect(),
        removed_functions: changes.removed_functions.to_vec(),
        cleared_callers: changes.reresolved.iter().cloned().collect(),
        ..Default::default()
    };
    for ef in changes.fresh {
        for func in &ef.functions {
            // Fresh functions without call sites still lose their old edges.
            if !changes.reresolved.contains(&func.id) {
                changeset.cleared_callers.push(func.id.clone());
            }
            if let Some(node) = graph.function(&func.id) {
                changeset.functions.push(function_record(node));
            }
        }
        changeset.data_access.extend(data_access_records(ef));
        changeset.extractions.push(encode_extraction(ef)?);
    }
    for caller in changes.reresolved {
        for (callee, edge) in graph.callees(caller) {
            changeset.edges.push(edge_record(caller, &callee.id, edge));
        }
    }
    changeset.edges.sort_by(|a, b| {
        (&a.caller_id, &a.callee_id, a.call_site_line).cmp(&(&b.caller_id, &b.callee_id, b.call_site_line))
    });
    Ok(changeset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::extractor::{extract_file, ExtractOptions};
    use crate::parsers::types::{CallSite, FunctionInfo, ParseResult};

    fn extracted() -> ExtractedFile {
        let mut pr = ParseResult::new("src/users.ts");
        pr.functions = vec![FunctionInfo::new("load", 1, 5)];
        let mut call = CallSite::new("findMany", 2);
        call.receiver = Some("prisma.user".into());
        pr.call_sites = vec![call];
        extract_file(&pr, &ExtractOptions::default()).unwrap()
    }

    #[test]
    fn extraction_payload_round_trips() {
        let ef = extracted();
        let record = encode_extraction(&ef).unwrap();
        assert_eq!(record.language, "typescript");
        assert_eq!(decode_extraction(&record).unwrap(), ef);
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let record = ExtractionRecord {
            file: "src/users.ts".into(),
            language: "typescript".into(),
            payload: "{not json".into(),
        };
        let err = decode_extraction(&record).unwrap_err();
        assert!(matches!(err, CallGraphError::CorruptExtraction { ref file, .. } if file == "src/users.ts"));
    }

    #[test]
    fn payload_for_another_file_is_rejected() {
        let mut record = encode_extraction(&extracted()).unwrap();
        record.file = "src/other.ts".into();
        assert!(decode_extraction(&record).is_err());
    }

    #[test]
    fn unknown_resolution_name_is_an_error() {
        let record = CallEdgeRecord {
            caller_id: "a".into(),
            callee_id: "b".into(),
            call_site_line: 1,
            resolution: "guess".into(),
            confidence: 0.1,
        };
        assert!(edge_view(&record).is_err());
    }

    #[test]
    fn entry_point_records_convert_back() {
        let mut entry = EntryPoint::new(EntryPointKind::RouteHandler, 0.95);
        entry.route = Some("/users".into());
        entry.method = Some("GET".into());
        let record = entry_point_record(&entry);
        assert_eq!(record.kind, "route_handler");
        assert_eq!(entry_point_from_record(&record), Some(entry));
    }

    #[test]
    fn data_access_rows_carry_the_file() {
        let rows = data_access_records(&extracted());
        assert!(rows.iter().all(|r| r.file == "src/users.ts"));
    }
}
