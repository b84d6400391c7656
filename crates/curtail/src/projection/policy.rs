//! Field policies, one per (entity kind, format tier).
//!
//! The whole reshaping vocabulary lives in the [`policy`] table so the
//! effect of a tier on an entity can be read in one place. The projector
//! only interprets these rules; it has no per-kind logic of its own.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::budget::FormatTier;

/// Entities the gateway knows how to reshape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Column,
    Relationship,
    LogRecord,
    Advisory,
    TypesBundle,
    Extension,
    Migration,
}

/// Which source fields survive.
#[derive(Debug)]
pub enum Keep {
    /// Every field except the policy's `drop` list.
    All,
    /// Only these fields (derived fields included).
    Only(&'static [&'static str]),
}

/// A field computed from the source entity.
#[derive(Debug)]
pub enum Derive {
    /// Length of an array or object, or line count of a string.
    Count {
        field: &'static str,
        into: &'static str,
    },
    /// First `max_chars` characters, suffixed with `...` when cut.
    Excerpt {
        field: &'static str,
        max_chars: usize,
    },
    /// Integer microseconds since the epoch rendered as RFC 3339.
    Micros { field: &'static str },
}

/// Boolean fields collapsed into one ordered list of the true ones.
#[derive(Debug)]
pub struct FlagRule {
    /// `(source field, label)` in canonical output order.
    pub fields: &'static [(&'static str, &'static str)],
    pub into: &'static str,
}

#[derive(Debug)]
pub struct FieldPolicy {
    pub keep: Keep,
    pub drop: &'static [&'static str],
    pub flags: Option<FlagRule>,
    pub derive: &'static [Derive],
    /// Array fields whose elements are projected with their own policy.
    pub nested: &'static [(&'static str, EntityKind)],
}

impl FieldPolicy {
    const fn only(fields: &'static [&'static str]) -> Self {
        Self {
            keep: Keep::Only(fields),
            drop: &[],
            flags: None,
            derive: &[],
            nested: &[],
        }
    }

    const fn all() -> Self {
        Self {
            keep: Keep::All,
            drop: &[],
            flags: None,
            derive: &[],
            nested: &[],
        }
    }

    /// Whether a field present in the output survives the keep/drop lists.
    pub fn keeps(&self, field: &str) -> bool {
        match self.keep {
            Keep::All => !self.drop.contains(&field),
            Keep::Only(fields) => fields.contains(&field),
        }
    }
}

/// Excerpt length for free-text descriptions at the summary tier.
pub const EXCERPT_CHARS: usize = 150;

const COLUMN_FLAGS: FlagRule = FlagRule {
    fields: &[
        ("is_identity", "identity"),
        ("is_generated", "generated"),
        ("is_nullable", "nullable"),
        ("is_updatable", "updatable"),
        ("is_unique", "unique"),
    ],
    into: "options",
};

// ── Tables ─────────────────────────────────────────────────────────

static TABLE_NAMES: FieldPolicy = FieldPolicy::only(&["schema", "name", "rows"]);

static TABLE_SUMMARY: FieldPolicy = FieldPolicy {
    derive: &[
        Derive::Count {
            field: "columns",
            into: "column_count",
        },
        Derive::Count {
            field: "relationships",
            into: "relationship_count",
        },
        Derive::Excerpt {
            field: "comment",
            max_chars: EXCERPT_CHARS,
        },
    ],
    ..FieldPolicy::only(&[
        "schema",
        "name",
        "rows",
        "rls_enabled",
        "primary_keys",
        "comment",
        "column_count",
        "relationship_count",
    ])
};

static TABLE_DETAILED: FieldPolicy = FieldPolicy {
    nested: &[
        ("columns", EntityKind::Column),
        ("relationships", EntityKind::Relationship),
    ],
    ..FieldPolicy::all()
};

static COLUMN_NAMES: FieldPolicy = FieldPolicy::only(&["name", "data_type"]);

static COLUMN_SUMMARY: FieldPolicy = FieldPolicy {
    flags: Some(COLUMN_FLAGS),
    derive: &[Derive::Excerpt {
        field: "comment",
        max_chars: EXCERPT_CHARS,
    }],
    ..FieldPolicy::only(&[
        "name",
        "data_type",
        "format",
        "options",
        "default_value",
        "enums",
        "comment",
    ])
};

static COLUMN_DETAILED: FieldPolicy = FieldPolicy {
    flags: Some(COLUMN_FLAGS),
    ..FieldPolicy::all()
};

static RELATIONSHIP_NAMES: FieldPolicy = FieldPolicy::only(&["constraint_name"]);

static RELATIONSHIP_SUMMARY: FieldPolicy = FieldPolicy::only(&[
    "constraint_name",
    "source_table_name",
    "source_column_name",
    "target_table_name",
    "target_column_name",
]);

// ── Logs and advisors ──────────────────────────────────────────────

static LOG_NAMES: FieldPolicy = FieldPolicy {
    derive: &[
        Derive::Micros { field: "timestamp" },
        Derive::Excerpt {
            field: "event_message",
            max_chars: 80,
        },
    ],
    ..FieldPolicy::only(&["timestamp", "event_message"])
};

static LOG_SUMMARY: FieldPolicy = FieldPolicy {
    drop: &["id", "metadata"],
    derive: &[
        Derive::Micros { field: "timestamp" },
        Derive::Excerpt {
            field: "event_message",
            max_chars: EXCERPT_CHARS,
        },
    ],
    ..FieldPolicy::all()
};

static LOG_DETAILED: FieldPolicy = FieldPolicy {
    derive: &[Derive::Micros { field: "timestamp" }],
    ..FieldPolicy::all()
};

static ADVISORY_NAMES: FieldPolicy = FieldPolicy::only(&["name", "title", "level"]);

static ADVISORY_SUMMARY: FieldPolicy = FieldPolicy {
    drop: &["cache_key", "facing", "metadata"],
    derive: &[
        Derive::Excerpt {
            field: "description",
            max_chars: EXCERPT_CHARS,
        },
        Derive::Excerpt {
            field: "detail",
            max_chars: EXCERPT_CHARS,
        },
    ],
    ..FieldPolicy::all()
};

// ── Types, extensions, migrations ──────────────────────────────────

static TYPES_NAMES: FieldPolicy = FieldPolicy {
    derive: &[Derive::Count {
        field: "types",
        into: "line_count",
    }],
    ..FieldPolicy::only(&["line_count"])
};

/// Generated type bundles are one long string; the summary keeps enough of
/// it to show the shape of the first few tables.
static TYPES_SUMMARY: FieldPolicy = FieldPolicy {
    derive: &[
        Derive::Count {
            field: "types",
            into: "line_count",
        },
        Derive::Excerpt {
            field: "types",
            max_chars: 4_000,
        },
    ],
    ..FieldPolicy::only(&["line_count", "types"])
};

static EXTENSION_NAMES: FieldPolicy = FieldPolicy::only(&["name", "schema"]);

static EXTENSION_SUMMARY: FieldPolicy =
    FieldPolicy::only(&["name", "schema", "installed_version", "default_version"]);

static MIGRATION_NAMES: FieldPolicy = FieldPolicy::only(&["version", "name"]);

static MIGRATION_SUMMARY: FieldPolicy = FieldPolicy {
    derive: &[Derive::Count {
        field: "statements",
        into: "statement_count",
    }],
    ..FieldPolicy::only(&["version", "name", "statement_count"])
};

static EVERYTHING: FieldPolicy = FieldPolicy::all();

/// The policy for `kind` at `tier`.
pub fn policy(kind: EntityKind, tier: FormatTier) -> &'static FieldPolicy {
    use EntityKind as K;
    use FormatTier as T;
    match (kind, tier) {
        (K::Table, T::NamesOnly) => &TABLE_NAMES,
        (K::Table, T::Summary) => &TABLE_SUMMARY,
        (K::Table, T::Detailed) => &TABLE_DETAILED,
        (K::Column, T::NamesOnly) => &COLUMN_NAMES,
        (K::Column, T::Summary) => &COLUMN_SUMMARY,
        (K::Column, T::Detailed) => &COLUMN_DETAILED,
        (K::Relationship, T::NamesOnly) => &RELATIONSHIP_NAMES,
        (K::Relationship, T::Summary) => &RELATIONSHIP_SUMMARY,
        (K::LogRecord, T::NamesOnly) => &LOG_NAMES,
        (K::LogRecord, T::Summary) => &LOG_SUMMARY,
        (K::LogRecord, T::Detailed) => &LOG_DETAILED,
        (K::Advisory, T::NamesOnly) => &ADVISORY_NAMES,
        (K::Advisory, T::Summary) => &ADVISORY_SUMMARY,
        (K::TypesBundle, T::NamesOnly) => &TYPES_NAMES,
        (K::TypesBundle, T::Summary) => &TYPES_SUMMARY,
        (K::Extension, T::NamesOnly) => &EXTENSION_NAMES,
        (K::Extension, T::Summary) => &EXTENSION_SUMMARY,
        (K::Migration, T::NamesOnly) => &MIGRATION_NAMES,
        (K::Migration, T::Summary) => &MIGRATION_SUMMARY,
        (K::Relationship | K::Advisory | K::TypesBundle | K::Extension | K::Migration, T::Detailed) => {
            &EVERYTHING
        }
    }
}
