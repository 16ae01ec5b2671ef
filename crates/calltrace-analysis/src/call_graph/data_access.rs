//! Data-access mentions: ORM and raw-query call sites attributed to the
//! calling function.

use serde::{Deserialize, Serialize};

/// What a data-access call does to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataOperation {
    Read,
    Write,
    Delete,
    Unknown,
}

impl DataOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DataOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One data-access call inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccessMention {
    pub function_id: String,
    pub table: Option<String>,
    pub operation: DataOperation,
    pub line: u32,
}

/// Methods specific enough to an ORM that any receiver counts.
const ORM_ONLY_METHODS: &[&str] = &[
    "findOne", "findAll", "findMany", "findById", "findByPk", "findUnique", "findFirst",
    "bulkCreate", "createMany", "updateMany", "deleteMany", "upsert",
    "get_or_create", "bulk_create", "getResultList", "getSingleResult",
    "createQuery", "createNativeQuery", "find_by", "find_each", "find_in_batches",
    "firstOrCreate", "updateOrCreate", "firstOrFail", "FromSqlRaw", "ToListAsync",
    "get_result", "get_results", "fetch_one", "fetch_all", "fetch_optional",
];

/// Receiver fragments that mark a database handle.
const DATA_HANDLE_HINTS: &[&str] = &[
    "db", "conn", "pool", "knex", "sequelize", "prisma", "session", "entitymanager",
    "jdbc", "gorm", "sqlx", "activerecord", "connection", "pdo", "dbcontext",
    "repository", "repo", "dao", "objects", "model", "query",
];

/// Receiver segments that name the handle rather than a table.
const HANDLE_SEGMENTS: &[&str] = &[
    "db", "conn", "connection", "pool", "knex", "sequelize", "prisma", "session",
    "entityManager", "em", "jdbc", "gorm", "sqlx", "pdo", "DB", "PDO", "context",
    "dbContext", "ctx", "objects", "query", "this", "self",
];

fn classify(method: &str) -> Option<DataOperation> {
    let op = match method {
        "findOne" | "findAll" | "findMany" | "findById" | "findByPk" | "findUnique"
        | "findFirst" | "select" | "where" | "filter" | "get" | "First" | "Find" | "Where"
        | "Preload" | "find_by" | "find_each" | "find_in_batches" | "pluck" | "joins"
        | "getResultList" | "getSingleResult" | "fetch_one" | "fetch_all" | "fetch_optional"
        | "load" | "get_result" | "get_results" | "count" | "aggregate" | "sum" | "avg"
        | "Include" | "ThenInclude" | "AsNoTracking" | "ToListAsync" | "paginate"
        | "firstOrFail" => DataOperation::Read,
        "create" | "update" | "save" | "insert" | "bulkCreate" | "createMany" | "updateMany"
        | "upsert" | "bulk_create" | "get_or_create" | "persist" | "merge" | "Create"
        | "Save" | "firstOrCreate" | "updateOrCreate" => DataOperation::Write,
        "delete" | "destroy" | "deleteMany" | "Delete" => DataOperation::Delete,
        "query" | "execute" | "raw" | "rawQuery" | "exec" | "sql" | "createQuery"
        | "createNativeQuery" | "FromSqlRaw" => DataOperation::Unknown,
        _ => return None,
    };
    Some(op)
}

/// Classify a call site as a data access, if it looks like one.
///
/// Bare calls never count. Generic method names (`get`, `save`, `filter`)
/// need a receiver that looks like a database handle.
pub fn detect(
    function_id: &str,
    callee_name: &str,
    receiver: Option<&str>,
    line: u32,
) -> Option<DataAccessMention> {
    let receiver = receiver?;
    let operation = classify(callee_name)?;
    if !ORM_ONLY_METHODS.contains(&callee_name) && !looks_like_data_handle(receiver) {
        return None;
    }
    Some(DataAccessMention {
        function_id: function_id.to_string(),
        table: table_from_receiver(receiver),
        operation,
        line,
    })
}

fn looks_like_data_handle(receiver: &str) -> bool {
    let lower = receiver.to_lowercase();
    DATA_HANDLE_HINTS.iter().any(|hint| lower.contains(hint))
}

/// The table is the innermost receiver segment that is not the handle itself:
/// `prisma.user` → `user`, `User.objects` → `User`, `this.orderRepository` → `order`.
fn table_from_receiver(receiver: &str) -> Option<String> {
    let segment = receiver
        .rsplit('.')
        .find(|s| !s.is_empty() && !HANDLE_SEGMENTS.contains(s))?;
    let trimmed = ["Repository", "Repo", "Dao", "DAO", "Model"]
        .iter()
        .find_map(|suffix| segment.strip_suffix(suffix))
        .filter(|s| !s.is_empty())
        .unwrap_or(segment);
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prisma_model_is_the_table() {
        let m = detect("f", "findMany", Some("prisma.user"), 3).unwrap();
        assert_eq!(m.table.as_deref(), Some("user"));
        assert_eq!(m.operation, DataOperation::Read);
    }

    #[test]
    fn django_manager_uses_model_name() {
        let m = detect("f", "filter", Some("User.objects"), 3).unwrap();
        assert_eq!(m.table.as_deref(), Some("User"));
    }

    #[test]
    fn repository_suffix_is_stripped() {
        let m = detect("f", "save", Some("this.orderRepository"), 9).unwrap();
        assert_eq!(m.table.as_deref(), Some("order"));
        assert_eq!(m.operation, DataOperation::Write);
    }

    #[test]
    fn raw_query_has_no_table() {
        let m = detect("f", "query", Some("db"), 1).unwrap();
        assert_eq!(m.table, None);
        assert_eq!(m.operation, DataOperation::Unknown);
    }

    #[test]
    fn generic_method_on_plain_object_is_ignored() {
        assert!(detect("f", "get", Some("cache"), 1).is_none());
        assert!(detect("f", "save", None, 1).is_none());
    }
}
