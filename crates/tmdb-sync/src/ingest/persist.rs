//! Transactional persistence of normalized graphs
//!
//! Each graph is written in a single transaction: the root row is upserted,
//! every association and owned row of the item is deleted, then lookups,
//! associations and owned collections are written back. A re-ingested item
//! therefore never keeps stale children.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use tracing::debug;

use super::graph::{ErasedRow, MediaGraph, MovieGraph, SeriesGraph, TableRows};
use super::tables::{TableRole, TableSpec};
use super::Result;
use crate::media::MediaKind;

/// Postgres caps a statement at 65,535 bind parameters.
pub const PG_BIND_LIMIT: usize = 65_535;

/// `ON CONFLICT` clause for a table's upsert.
///
/// Tables without a key get a plain insert; tables keyed on every column
/// ignore duplicates; everything else overwrites its non-key columns.
pub fn conflict_clause(table: &TableSpec) -> String {
    if table.key.is_empty() {
        return String::new();
    }

    let target = table.key.join(", ");
    let updates: Vec<String> = table
        .columns
        .iter()
        .filter(|c| !table.key.contains(*c))
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    if updates.is_empty() {
        format!(" ON CONFLICT ({target}) DO NOTHING")
    } else {
        format!(" ON CONFLICT ({target}) DO UPDATE SET {}", updates.join(", "))
    }
}

/// Multi-row upsert, chunked under the bind parameter limit.
pub(crate) async fn write_rows(
    conn: &mut PgConnection,
    table: &TableSpec,
    rows: &[&dyn ErasedRow],
) -> std::result::Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let rows_per_statement = (PG_BIND_LIMIT / table.columns.len()).max(1);
    let conflict = conflict_clause(table);
    let mut affected = 0;

    for chunk in rows.chunks(rows_per_statement) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table.name, table.column_list()));

        query_builder.push_values(chunk.iter(), |mut b, row| {
            row.push_binds(&mut b);
        });
        query_builder.push(&conflict);

        affected += query_builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(affected)
}

/// Delete every association and owned row belonging to one item.
async fn clear_children(conn: &mut PgConnection, kind: MediaKind, id: i64) -> Result<()> {
    for table in kind.tables().iter().filter(|t| t.is_child()) {
        if let Some(parent) = table.parent_column {
            let sql = format!("DELETE FROM {} WHERE {} = $1", table.name, parent);
            sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        }
    }
    Ok(())
}

async fn write_role(
    conn: &mut PgConnection,
    tables: &[TableRows<'_>],
    role: TableRole,
) -> Result<()> {
    for group in tables.iter().filter(|t| t.table.role == role) {
        write_rows(conn, group.table, &group.rows).await?;
    }
    Ok(())
}

/// Write one graph, replacing all of the item's children.
pub async fn persist(pool: &PgPool, graph: &MediaGraph) -> Result<()> {
    let kind = graph.kind();
    let id = graph.id();
    let tables = graph.tables();

    let mut tx = pool.begin().await?;

    write_role(&mut tx, &tables, TableRole::Root).await?;
    clear_children(&mut tx, kind, id).await?;
    write_role(&mut tx, &tables, TableRole::Lookup).await?;
    write_role(&mut tx, &tables, TableRole::Link).await?;
    write_role(&mut tx, &tables, TableRole::Owned).await?;

    tx.commit().await?;

    debug!(kind = %kind, id, "Persisted media item");
    Ok(())
}

pub async fn persist_movie(pool: &PgPool, graph: &MovieGraph) -> Result<()> {
    persist(pool, &MediaGraph::Movie(Box::new(graph.clone()))).await
}

pub async fn persist_series(pool: &PgPool, graph: &SeriesGraph) -> Result<()> {
    persist(pool, &MediaGraph::Series(Box::new(graph.clone()))).await
}

/// Delete media roots with all of their associations and owned rows.
///
/// Shared lookup rows are left in place. Returns the number of roots removed.
pub async fn delete_media_items(pool: &PgPool, kind: MediaKind, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    for table in kind.tables().iter().filter(|t| t.is_child()) {
        if let Some(parent) = table.parent_column {
            let sql = format!("DELETE FROM {} WHERE {} = ANY($1)", table.name, parent);
            sqlx::query(&sql).bind(ids).execute(&mut *tx).await?;
        }
    }

    let sql = format!("DELETE FROM {} WHERE id = ANY($1)", kind.root_table());
    let deleted = sqlx::query(&sql).bind(ids).execute(&mut *tx).await?.rows_affected();

    tx.commit().await?;

    debug!(kind = %kind, requested = ids.len(), deleted, "Deleted media items");
    Ok(deleted)
}

/// IDs of every stored root of `kind`.
pub async fn local_ids(pool: &PgPool, kind: MediaKind) -> Result<HashSet<i64>> {
    let sql = format!("SELECT id FROM {}", kind.root_table());
    let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    Ok(ids.into_iter().collect())
}
