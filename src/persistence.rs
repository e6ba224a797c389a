//! # SQLite Edge Store
//!
//! Persistent implementation of [`EdgeStore`] backed by a single
//! `segment_edges` table.
//!
//! Merges run as one `INSERT ... ON CONFLICT DO UPDATE` statement, so the
//! read-then-write of [`crate::upsert_edge`] collapses into an atomic update
//! inside SQLite. A whole trace is merged inside one transaction.

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};

use crate::error::Result;
use crate::geo_utils::NodeKey;
use crate::popularity::{validate_observation, EdgeStore, SegmentEdge};
use crate::segments::SegmentObservation;

/// Merge rule expressed in SQL. On conflict the unqualified columns refer to
/// the stored row and `excluded` to the new observation.
const UPSERT_SQL: &str = r#"
    INSERT INTO segment_edges (start_key, end_key, distance_m, popularity_count, avg_speed_mps)
    VALUES (?1, ?2, ?3, 1, ?4)
    ON CONFLICT(start_key, end_key) DO UPDATE SET
        avg_speed_mps = (avg_speed_mps * popularity_count + excluded.avg_speed_mps)
            / (popularity_count + 1),
        popularity_count = popularity_count + 1,
        distance_m = (distance_m + excluded.distance_m) / 2.0
"#;

/// Edge store persisted in SQLite.
pub struct SqliteEdgeStore {
    /// Database connection
    db: Connection,

    /// Database path (":memory:" for in-memory stores)
    db_path: String,
}

impl SqliteEdgeStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        log::info!("[PopularRoutes] Opened edge store at {}", db_path);

        Ok(Self {
            db,
            db_path: db_path.to_string(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            r#"
            -- Observed directed segments, shared by all riders
            CREATE TABLE IF NOT EXISTS segment_edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_key TEXT NOT NULL,
                end_key TEXT NOT NULL,
                distance_m REAL NOT NULL,
                popularity_count INTEGER NOT NULL DEFAULT 1,
                avg_speed_mps REAL NOT NULL DEFAULT 0.0,
                UNIQUE (start_key, end_key)
            );

            CREATE INDEX IF NOT EXISTS idx_segment_edges_end ON segment_edges(end_key);
            "#,
        )
    }

    fn row_to_edge(row: &Row<'_>) -> SqlResult<SegmentEdge> {
        Ok(SegmentEdge {
            start_key: NodeKey::from_raw(row.get(0)?),
            end_key: NodeKey::from_raw(row.get(1)?),
            distance_m: row.get(2)?,
            popularity_count: row.get(3)?,
            avg_speed_mps: row.get(4)?,
        })
    }
}

impl EdgeStore for SqliteEdgeStore {
    fn get_edge(&self, start_key: &NodeKey, end_key: &NodeKey) -> Result<Option<SegmentEdge>> {
        let edge = self
            .db
            .query_row(
                "SELECT start_key, end_key, distance_m, popularity_count, avg_speed_mps
                 FROM segment_edges WHERE start_key = ?1 AND end_key = ?2",
                params![start_key.as_str(), end_key.as_str()],
                Self::row_to_edge,
            )
            .optional()?;
        Ok(edge)
    }

    fn put_edge(&mut self, edge: SegmentEdge) -> Result<()> {
        self.db.execute(
            "INSERT INTO segment_edges (start_key, end_key, distance_m, popularity_count, avg_speed_mps)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(start_key, end_key) DO UPDATE SET
                 distance_m = excluded.distance_m,
                 popularity_count = excluded.popularity_count,
                 avg_speed_mps = excluded.avg_speed_mps",
            params![
                edge.start_key.as_str(),
                edge.end_key.as_str(),
                edge.distance_m,
                edge.popularity_count,
                edge.avg_speed_mps
            ],
        )?;
        Ok(())
    }

    fn edges(&self) -> Result<Vec<SegmentEdge>> {
        let mut stmt = self.db.prepare(
            "SELECT start_key, end_key, distance_m, popularity_count, avg_speed_mps
             FROM segment_edges ORDER BY start_key, end_key",
        )?;
        let edges = stmt
            .query_map([], Self::row_to_edge)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(edges)
    }

    fn edge_count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM segment_edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear(&mut self) -> Result<()> {
        self.db.execute("DELETE FROM segment_edges", [])?;
        Ok(())
    }

    fn upsert(
        &mut self,
        start_key: &NodeKey,
        end_key: &NodeKey,
        distance_m: f64,
        avg_speed_mps: f64,
    ) -> Result<()> {
        validate_observation(start_key, end_key, distance_m, avg_speed_mps)?;
        self.db.execute(
            UPSERT_SQL,
            params![start_key.as_str(), end_key.as_str(), distance_m, avg_speed_mps],
        )?;
        Ok(())
    }

    fn upsert_batch(
        &mut self,
        observations: &[SegmentObservation],
        avg_speed_mps: f64,
    ) -> Result<usize> {
        for obs in observations {
            validate_observation(&obs.start_key, &obs.end_key, obs.distance_m, avg_speed_mps)?;
        }

        let tx = self.db.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for obs in observations {
                stmt.execute(params![
                    obs.start_key.as_str(),
                    obs.end_key.as_str(),
                    obs.distance_m,
                    avg_speed_mps
                ])?;
            }
        }
        tx.commit()?;

        log::debug!(
            "[PopularRoutes] Merged {} observations into {}",
            observations.len(),
            self.db_path
        );
        Ok(observations.len())
    }
}
