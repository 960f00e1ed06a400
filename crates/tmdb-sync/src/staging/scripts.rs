//! SQL scripts for creating, loading, promoting and dropping staging tables

use crate::ingest::tables::TableSpec;

/// Fresh `staging_*` copies of each production table, schema and indexes included.
pub fn create_staging_script<'a>(tables: impl IntoIterator<Item = &'a TableSpec>) -> String {
    tables
        .into_iter()
        .map(|t| {
            let staging = t.staging_name();
            format!(
                "DROP TABLE IF EXISTS {staging};\nCREATE TABLE {staging} (LIKE {} INCLUDING ALL);\n",
                t.name
            )
        })
        .collect()
}

pub fn drop_staging_script<'a>(tables: impl IntoIterator<Item = &'a TableSpec>) -> String {
    tables
        .into_iter()
        .map(|t| format!("DROP TABLE IF EXISTS {};\n", t.staging_name()))
        .collect()
}

/// Swap every staging table into place. Run inside one transaction.
pub fn promote_script<'a>(tables: impl IntoIterator<Item = &'a TableSpec>) -> String {
    tables
        .into_iter()
        .map(|t| {
            let old = t.old_name();
            format!(
                "DROP TABLE IF EXISTS {old};\nALTER TABLE IF EXISTS {name} RENAME TO {old};\nALTER TABLE {staging} RENAME TO {name};\n",
                name = t.name,
                staging = t.staging_name(),
            )
        })
        .collect()
}

pub fn drop_old_script<'a>(tables: impl IntoIterator<Item = &'a TableSpec>) -> String {
    tables
        .into_iter()
        .map(|t| format!("DROP TABLE IF EXISTS {};\n", t.old_name()))
        .collect()
}

pub fn copy_statement(table: &TableSpec) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        table.staging_name(),
        table.column_list()
    )
}
