//! Gateway tool names.
//!
//! Cache keys begin with the tool name, so the invalidation patterns of
//! mutating tools are built from these constants as well.

pub const LIST_TABLES: &str = "list_tables";
pub const LIST_EXTENSIONS: &str = "list_extensions";
pub const LIST_MIGRATIONS: &str = "list_migrations";
pub const APPLY_MIGRATION: &str = "apply_migration";
pub const EXECUTE_SQL: &str = "execute_sql";
pub const GET_LOGS: &str = "get_logs";
pub const GET_ADVISORS: &str = "get_advisors";
pub const GENERATE_TYPESCRIPT_TYPES: &str = "generate_typescript_types";

/// Read paths whose cached output a schema change makes stale.
pub const SCHEMA_READS: [&str; 3] = [LIST_MIGRATIONS, LIST_TABLES, GENERATE_TYPESCRIPT_TYPES];
