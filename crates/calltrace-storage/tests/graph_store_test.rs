//! SqliteGraphStore against a real database file.

use std::sync::{Arc, Barrier};
use std::thread;

use calltrace_core::config::StorageConfig;
use calltrace_core::traits::{
    CallEdgeRecord, DataAccessRecord, EntryPointRecord, ExtractionRecord, FunctionRecord,
    GraphChangeset, GraphStore, TraversalDirection,
};
use calltrace_core::types::pagination::PaginationCursor;
use calltrace_storage::connection::pragmas::verify_wal_mode;
use calltrace_storage::SqliteGraphStore;
use tempfile::TempDir;

fn open() -> (SqliteGraphStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteGraphStore::open(&dir.path().join("calltrace.db"), &StorageConfig::default()).unwrap();
    (store, dir)
}

fn func(id: &str) -> FunctionRecord {
    let (file, name) = id.split_once("::").unwrap();
    FunctionRecord {
        id: id.to_string(),
        file: file.to_string(),
        name: name.to_string(),
        qualified_name: name.to_string(),
        language: "typescript".to_string(),
        line: 1,
        end_line: 5,
        is_exported: false,
        signature_hash: 1,
        body_hash: 2,
        return_type: None,
        entry_point: None,
    }
}

fn entry(id: &str) -> FunctionRecord {
    FunctionRecord {
        entry_point: Some(EntryPointRecord {
            kind: "route_handler".to_string(),
            route: Some("/users".to_string()),
            method: Some("GET".to_string()),
            framework: Some("express".to_string()),
            confidence: 0.95,
        }),
        ..func(id)
    }
}

fn edge(caller: &str, callee: &str, line: u32, resolution: &str, confidence: f32) -> CallEdgeRecord {
    CallEdgeRecord {
        caller_id: caller.to_string(),
        callee_id: callee.to_string(),
        call_site_line: line,
        resolution: resolution.to_string(),
        confidence,
    }
}

/// a → b → c → d, a → c, and a cycle d → b.
fn chain() -> GraphChangeset {
    GraphChangeset {
        replace_all: true,
        functions: ["x.ts::a", "x.ts::b", "y.ts::c", "y.ts::d"]
            .into_iter()
            .map(func)
            .collect(),
        edges: vec![
            edge("x.ts::a", "x.ts::b", 2, "same_file", 0.95),
            edge("x.ts::b", "y.ts::c", 3, "import_based", 0.75),
            edge("y.ts::c", "y.ts::d", 4, "same_file", 0.95),
            edge("x.ts::a", "y.ts::c", 5, "fuzzy", 0.40),
            edge("y.ts::d", "x.ts::b", 6, "export_based", 0.60),
        ],
        extractions: vec![
            ExtractionRecord {
                file: "x.ts".into(),
                language: "typescript".into(),
                payload: "{}".into(),
            },
            ExtractionRecord {
                file: "y.ts".into(),
                language: "typescript".into(),
                payload: "{}".into(),
            },
        ],
        ..Default::default()
    }
}

#[test]
fn opens_in_wal_mode() {
    let (store, _dir) = open();
    let wal = store.database().with_reader(verify_wal_mode).unwrap();
    assert!(wal);
}

#[test]
fn full_changeset_round_trips() {
    let (store, _dir) = open();
    let mut changeset = chain();
    changeset.functions[0].signature_hash = u64::MAX;
    changeset.functions[1] = entry("x.ts::b");
    store.apply_changeset(changeset).unwrap();

    assert_eq!(store.function_count().unwrap(), 4);
    assert_eq!(store.edge_count().unwrap(), 5);
    let a = store.get_function("x.ts::a").unwrap().unwrap();
    assert_eq!(a.signature_hash, u64::MAX, "hashes keep all 64 bits");
    let b = store.get_function("x.ts::b").unwrap().unwrap();
    assert_eq!(b.entry_point.unwrap().route.as_deref(), Some("/users"));
    assert_eq!(store.edges_from("x.ts::a").unwrap().len(), 2);
    assert_eq!(store.edges_to("x.ts::b").unwrap().len(), 2);
    assert_eq!(store.functions_in_file("y.ts").unwrap().len(), 2);
}

#[test]
fn replace_all_wipes_previous_rows() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    store
        .apply_changeset(GraphChangeset {
            replace_all: true,
            functions: vec![func("z.ts::only")],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(store.function_count().unwrap(), 1);
    assert_eq!(store.edge_count().unwrap(), 0);
    assert!(store.load_extractions(None).unwrap().is_empty());
}

#[test]
fn upsert_keeps_incoming_edges() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    let mut updated = func("y.ts::c");
    updated.body_hash = 99;
    store
        .apply_changeset(GraphChangeset {
            functions: vec![updated],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(store.get_function("y.ts::c").unwrap().unwrap().body_hash, 99);
    assert_eq!(store.edges_to("y.ts::c").unwrap().len(), 2);
}

#[test]
fn removing_a_function_drops_its_edges() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    store
        .apply_changeset(GraphChangeset {
            removed_functions: vec!["y.ts::c".into()],
            ..Default::default()
        })
        .unwrap();
    assert!(store.get_function("y.ts::c").unwrap().is_none());
    assert_eq!(store.edge_count().unwrap(), 2);
}

#[test]
fn cleared_callers_lose_outgoing_edges_only() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    store
        .apply_changeset(GraphChangeset {
            cleared_callers: vec!["x.ts::a".into()],
            edges: vec![edge("x.ts::a", "y.ts::d", 9, "import_based", 0.75)],
            ..Default::default()
        })
        .unwrap();
    let out = store.edges_from("x.ts::a").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].callee_id, "y.ts::d");
    assert_eq!(store.edges_to("x.ts::b").unwrap().len(), 1, "d → b survives");
}

#[test]
fn failed_changeset_leaves_store_untouched() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    let err = store.apply_changeset(GraphChangeset {
        removed_functions: vec!["x.ts::a".into()],
        functions: vec![func("z.ts::new")],
        // Dangling callee: the foreign key rejects it.
        edges: vec![edge("z.ts::new", "nowhere.ts::gone", 1, "fuzzy", 0.4)],
        ..Default::default()
    });
    assert!(err.is_err());
    assert!(store.get_function("x.ts::a").unwrap().is_some());
    assert!(store.get_function("z.ts::new").unwrap().is_none());
    assert_eq!(store.edge_count().unwrap(), 5);
}

#[test]
fn traversal_reports_shortest_depths() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    let rows = store
        .traverse("x.ts::a", TraversalDirection::Forward, 10)
        .unwrap();
    let got: Vec<(&str, u32)> = rows.iter().map(|r| (r.function_id.as_str(), r.depth)).collect();
    assert_eq!(got, vec![("x.ts::b", 1), ("y.ts::c", 1), ("y.ts::d", 2)]);

    let bounded = store
        .traverse("x.ts::a", TraversalDirection::Forward, 1)
        .unwrap();
    assert_eq!(bounded.len(), 2);

    let callers = store
        .traverse("y.ts::d", TraversalDirection::Inverse, 10)
        .unwrap();
    let got: Vec<(&str, u32)> = callers.iter().map(|r| (r.function_id.as_str(), r.depth)).collect();
    assert_eq!(got, vec![("y.ts::c", 1), ("x.ts::a", 2), ("x.ts::b", 2)]);
}

#[test]
fn shortest_path_walks_back_by_confidence() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    let path = store.shortest_path("x.ts::a", "y.ts::d", 10).unwrap().unwrap();
    let hops: Vec<(&str, &str)> = path
        .iter()
        .map(|e| (e.caller_id.as_str(), e.callee_id.as_str()))
        .collect();
    assert_eq!(hops, vec![("x.ts::a", "y.ts::c"), ("y.ts::c", "y.ts::d")]);

    assert!(store.shortest_path("y.ts::d", "x.ts::a", 10).unwrap().is_none());
    assert!(store.shortest_path("x.ts::a", "y.ts::d", 1).unwrap().is_none());
}

#[test]
fn entry_points_page_by_id() {
    let (store, _dir) = open();
    store
        .apply_changeset(GraphChangeset {
            replace_all: true,
            functions: vec![entry("r.ts::c"), entry("r.ts::a"), func("r.ts::x"), entry("r.ts::b")],
            ..Default::default()
        })
        .unwrap();
    let first = store.entry_points(None, 2).unwrap();
    assert_eq!(first.total, 3);
    assert!(first.has_more);
    let ids: Vec<&str> = first.items.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["r.ts::a", "r.ts::b"]);

    let cursor = PaginationCursor::decode(first.next_cursor.as_deref().unwrap()).unwrap();
    let second = store.entry_points(Some(&cursor), 2).unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, "r.ts::c");
    assert!(!second.has_more);
}

#[test]
fn search_orders_by_rank_then_id() {
    let (store, _dir) = open();
    store
        .apply_changeset(GraphChangeset {
            replace_all: true,
            functions: vec![
                func("b.ts::autosave"),
                func("a.ts::saveAll"),
                func("c.ts::save"),
                func("save.ts::load"),
                func("d.ts::unrelated"),
            ],
            ..Default::default()
        })
        .unwrap();
    let page = store.search_functions("SAVE", None, 3).unwrap();
    assert_eq!(page.total, 4);
    let ids: Vec<&str> = page.items.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["c.ts::save", "a.ts::saveAll", "b.ts::autosave"]);

    let cursor = PaginationCursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
    let rest = store.search_functions("save", Some(&cursor), 3).unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].id, "save.ts::load");
}

#[test]
fn removed_files_drop_extractions_and_data_access() {
    let (store, _dir) = open();
    let mut changeset = chain();
    changeset.data_access = vec![DataAccessRecord {
        function_id: "x.ts::a".into(),
        file: "x.ts".into(),
        table_name: Some("users".into()),
        operation: "read".into(),
        line: 3,
    }];
    store.apply_changeset(changeset).unwrap();
    assert_eq!(store.data_access_for_table("users").unwrap().len(), 1);

    store
        .apply_changeset(GraphChangeset {
            removed_files: vec!["x.ts".into()],
            ..Default::default()
        })
        .unwrap();
    assert!(store.data_access_for_table("users").unwrap().is_empty());
    let left = store.load_extractions(None).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].file, "y.ts");
    let some = store
        .load_extractions(Some(&["x.ts".to_string(), "y.ts".to_string()]))
        .unwrap();
    assert_eq!(some.len(), 1);
}

#[test]
fn build_log_records_each_changeset() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    store
        .apply_changeset(GraphChangeset {
            removed_functions: vec!["y.ts::d".into()],
            ..Default::default()
        })
        .unwrap();
    let log = store.recent_builds(10).unwrap();
    assert_eq!(log.len(), 2);
    assert!(!log[0].full_rebuild);
    assert_eq!(log[0].function_count, 3);
    assert!(log[1].full_rebuild);
    assert_eq!(log[1].edge_count, 5);
}

#[test]
fn concurrent_writers_are_serialized() {
    let (store, _dir) = open();
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100 {
                    store
                        .apply_changeset(GraphChangeset {
                            functions: vec![func(&format!("t{t}.ts::f{i}"))],
                            ..Default::default()
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.function_count().unwrap(), 200);
}

#[test]
fn checkpoint_after_removal_keeps_data() {
    let (store, _dir) = open();
    store.apply_changeset(chain()).unwrap();
    store
        .apply_changeset(GraphChangeset {
            removed_files: vec!["y.ts".into()],
            removed_functions: vec!["y.ts::c".into(), "y.ts::d".into()],
            ..Default::default()
        })
        .unwrap();
    assert!(store.checkpoint().unwrap() >= 0);
    assert_eq!(store.function_count().unwrap(), 2);
    assert!(store.database().with_reader(verify_wal_mode).unwrap());
}
