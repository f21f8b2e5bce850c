//! SQLite schema for the course database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Sessions, exams, attempts
// =============================================================================

const SESSIONS_TABLE_V1: Table = Table {
    name: "sessions",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("subject_id", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("expires_at", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "revoked",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[
        ("idx_sessions_expires_at", "expires_at"),
        ("idx_sessions_subject", "subject_id"),
    ],
};

const EXAMS_TABLE_V1: Table = Table {
    name: "exams",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("duration_minutes", &SqlType::Integer, non_null = true),
        sqlite_column!("end_time", &SqlType::Integer),
    ],
    indices: &[],
};

const EXAM_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "exams",
    foreign_column: "id",
};

const EXAM_ATTEMPTS_TABLE_V1: Table = Table {
    name: "exam_attempts",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "exam_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&EXAM_FOREIGN_KEY)
        ),
        sqlite_column!("subject_id", &SqlType::Text, non_null = true),
        sqlite_column!("started_at", &SqlType::Integer, non_null = true),
        sqlite_column!("ended_at", &SqlType::Integer),
    ],
    indices: &[("idx_exam_attempts_ended_at", "ended_at")],
};

// =============================================================================
// Version 2 - Purchase orders
// =============================================================================

const PURCHASE_ORDERS_TABLE_V2: Table = Table {
    name: "purchase_orders",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("subject_id", &SqlType::Text, non_null = true),
        sqlite_column!("payment_status", &SqlType::Text, non_null = true),
        sqlite_column!("expired_at", &SqlType::Integer),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[(
        "idx_purchase_orders_status_expired",
        "payment_status, expired_at",
    )],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    PURCHASE_ORDERS_TABLE_V2.create(conn)
}

pub static COURSE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[SESSIONS_TABLE_V1, EXAMS_TABLE_V1, EXAM_ATTEMPTS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            SESSIONS_TABLE_V1,
            EXAMS_TABLE_V1,
            EXAM_ATTEMPTS_TABLE_V1,
            PURCHASE_ORDERS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
