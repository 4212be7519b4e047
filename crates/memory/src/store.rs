//! SQLite-backed trajectory store.
//!
//! One table holds everything: identity and filter columns for indexed
//! lookups, aggregate outcome counters, and the canonical trajectory
//! document as JSON. The document is the source of truth for steps; the
//! columns exist for filtering and statistics.

use std::fs;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use amw_trajectory::{domain_from_site_or_url, Trajectory, UsageStats};

use crate::errors::StoreError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS trajectories (
  trajectory_id TEXT PRIMARY KEY,
  site TEXT NOT NULL,
  task_type TEXT NOT NULL,
  intent TEXT NOT NULL,
  intent_signature TEXT NOT NULL,
  keywords TEXT NOT NULL,
  version INTEGER NOT NULL,
  usage_count INTEGER NOT NULL DEFAULT 0,
  success_count INTEGER NOT NULL DEFAULT 0,
  failure_count INTEGER NOT NULL DEFAULT 0,
  avg_latency_ms REAL NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  path_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_traj_site_task ON trajectories(site, task_type);
CREATE INDEX IF NOT EXISTS idx_traj_signature ON trajectories(intent_signature);
";

/// Optional filters for [`MemoryStore::list`].
#[derive(Clone, Debug, Default)]
pub struct ListFilter {
    pub site: Option<String>,
    pub task_type: Option<String>,
    pub limit: u32,
}

impl ListFilter {
    pub fn new() -> Self {
        ListFilter {
            limit: 200,
            ..ListFilter::default()
        }
    }

    pub fn site(mut self, site: &str) -> Self {
        self.site = Some(site.to_string());
        self
    }

    pub fn task_type(mut self, task_type: &str) -> Self {
        self.task_type = Some(task_type.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Durable trajectory memory. All access is serialized through one
/// connection; every mutation commits before returning.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (creating if needed) the store at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(MemoryStore {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or update. Updates keep `created_at` and all outcome counters;
    /// both paths bump `updated_at`.
    pub fn save(&self, trajectory: &Trajectory) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut normalized = trajectory.clone();
        normalized.site = domain_from_site_or_url(&trajectory.site);
        normalized.updated_at = now;

        let payload = serde_json::to_string(&normalized)?;
        let mut keywords: Vec<&str> = Vec::new();
        for keyword in &normalized.keywords {
            if !keywords.contains(&keyword.as_str()) {
                keywords.push(keyword);
            }
        }
        let keywords = keywords.join(" ");

        let conn = self.conn.lock();
        let exists: Option<String> = conn
            .query_row(
                "SELECT trajectory_id FROM trajectories WHERE trajectory_id = ?1",
                params![normalized.trajectory_id],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_some() {
            conn.execute(
                "UPDATE trajectories
                 SET site = ?1, task_type = ?2, intent = ?3, intent_signature = ?4,
                     keywords = ?5, version = ?6, updated_at = ?7, path_json = ?8
                 WHERE trajectory_id = ?9",
                params![
                    normalized.site,
                    normalized.task_type,
                    normalized.intent,
                    normalized.intent_signature,
                    keywords,
                    normalized.version,
                    now.to_rfc3339(),
                    payload,
                    normalized.trajectory_id,
                ],
            )?;
            debug!(trajectory_id = %normalized.trajectory_id, "trajectory updated");
        } else {
            conn.execute(
                "INSERT INTO trajectories (
                   trajectory_id, site, task_type, intent, intent_signature, keywords,
                   version, created_at, updated_at, path_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    normalized.trajectory_id,
                    normalized.site,
                    normalized.task_type,
                    normalized.intent,
                    normalized.intent_signature,
                    keywords,
                    normalized.version,
                    normalized.created_at.to_rfc3339(),
                    now.to_rfc3339(),
                    payload,
                ],
            )?;
            debug!(trajectory_id = %normalized.trajectory_id, "trajectory inserted");
        }
        Ok(())
    }

    /// The stored trajectory document, if present.
    pub fn get(&self, trajectory_id: &str) -> Result<Option<Trajectory>, StoreError> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT path_json FROM trajectories WHERE trajectory_id = ?1",
                params![trajectory_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Stored trajectories matching the filter, most recently updated first.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Trajectory>, StoreError> {
        let mut sql = String::from("SELECT path_json FROM trajectories WHERE 1 = 1");
        let mut args: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(site) = &filter.site {
            sql.push_str(&format!(" AND site = ?{}", args.len() + 1));
            args.push(domain_from_site_or_url(site).into());
        }
        if let Some(task_type) = &filter.task_type {
            sql.push_str(&format!(" AND task_type = ?{}", args.len() + 1));
            args.push(task_type.clone().into());
        }
        sql.push_str(&format!(" ORDER BY updated_at DESC LIMIT ?{}", args.len() + 1));
        args.push(i64::from(filter.limit).into());

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
            row.get::<_, String>(0)
        })?;
        let mut trajectories = Vec::new();
        for payload in rows {
            trajectories.push(serde_json::from_str(&payload?)?);
        }
        Ok(trajectories)
    }

    /// Fold one replay outcome into the aggregate counters. Read and update
    /// happen in one transaction. Unknown ids are a no-op.
    pub fn record_result(
        &self,
        trajectory_id: &str,
        success: bool,
        latency_ms: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let row: Option<(u64, u64, u64, f64)> = tx
            .query_row(
                "SELECT usage_count, success_count, failure_count, avg_latency_ms
                 FROM trajectories WHERE trajectory_id = ?1",
                params![trajectory_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((usage_count, success_count, failure_count, prev_avg)) = row else {
            debug!(trajectory_id, "record_result for unknown trajectory ignored");
            return Ok(());
        };

        let usage = usage_count + 1;
        let success_count = success_count + u64::from(success);
        let failure_count = failure_count + u64::from(!success);
        let avg = (prev_avg * (usage - 1) as f64 + latency_ms as f64) / usage as f64;

        tx.execute(
            "UPDATE trajectories
             SET usage_count = ?1, success_count = ?2, failure_count = ?3,
                 avg_latency_ms = ?4, updated_at = ?5
             WHERE trajectory_id = ?6",
            params![
                usage,
                success_count,
                failure_count,
                avg,
                Utc::now().to_rfc3339(),
                trajectory_id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Aggregate outcome statistics; all zeros for unknown ids.
    pub fn get_stats(&self, trajectory_id: &str) -> Result<UsageStats, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(u64, u64, f64)> = conn
            .query_row(
                "SELECT usage_count, success_count, avg_latency_ms
                 FROM trajectories WHERE trajectory_id = ?1",
                params![trajectory_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((usage_count, success_count, avg_latency_ms)) = row else {
            return Ok(UsageStats::default());
        };
        Ok(UsageStats {
            usage_count,
            success_rate: if usage_count > 0 {
                success_count as f64 / usage_count as f64
            } else {
                0.0
            },
            avg_latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use amw_trajectory::{Step, TrajectoryDraft};
    use serde_json::json;

    use super::*;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db")).unwrap();
        (dir, store)
    }

    fn sample(id: &str, site: &str, task_type: &str, intent: &str) -> Trajectory {
        TrajectoryDraft::new(id, site, task_type, intent)
            .with_steps(vec![Step::from_value(
                &json!({ "action": "open", "target": format!("https://{site}") }),
                0,
            )])
            .build()
    }

    #[test]
    fn save_and_get_round_trip() {
        let (_dir, store) = store();
        let traj = sample("t1", "https://Example.com/x", "search", "find widgets");
        store.save(&traj).unwrap();

        let loaded = store.get("t1").unwrap().unwrap();
        assert_eq!(loaded.trajectory_id, "t1");
        assert_eq!(loaded.site, "example.com");
        assert_eq!(loaded.steps.len(), 1);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn update_keeps_created_at_and_counters() {
        let (_dir, store) = store();
        let traj = sample("t1", "x.io", "search", "find widgets");
        store.save(&traj).unwrap();
        store.record_result("t1", true, 800).unwrap();

        let mut revised = traj.clone();
        revised.intent = "find cheap widgets".to_string();
        store.save(&revised).unwrap();

        let loaded = store.get("t1").unwrap().unwrap();
        assert_eq!(loaded.intent, "find cheap widgets");
        let stats = store.get_stats("t1").unwrap();
        assert_eq!(stats.usage_count, 1);
        assert_eq!(stats.avg_latency_ms, 800.0);
    }

    #[test]
    fn list_filters_by_site_and_task() {
        let (_dir, store) = store();
        store.save(&sample("a", "x.io", "search", "find widgets")).unwrap();
        store.save(&sample("b", "x.io", "checkout", "buy widgets")).unwrap();
        store.save(&sample("c", "y.io", "search", "find shoes")).unwrap();

        let both = store
            .list(&ListFilter::new().site("x.io").task_type("search"))
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].trajectory_id, "a");

        let by_site = store.list(&ListFilter::new().site("https://x.io/path")).unwrap();
        assert_eq!(by_site.len(), 2);

        let all = store.list(&ListFilter::new()).unwrap();
        assert_eq!(all.len(), 3);

        let capped = store.list(&ListFilter::new().limit(2)).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn record_result_aggregates() {
        let (_dir, store) = store();
        store.save(&sample("t1", "x.io", "search", "find widgets")).unwrap();
        store.record_result("t1", true, 1000).unwrap();
        store.record_result("t1", false, 2000).unwrap();

        let stats = store.get_stats("t1").unwrap();
        assert_eq!(stats.usage_count, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.avg_latency_ms, 1500.0);
    }

    #[test]
    fn stats_for_unknown_id_are_zero() {
        let (_dir, store) = store();
        store.record_result("ghost", true, 100).unwrap();
        let stats = store.get_stats("ghost").unwrap();
        assert_eq!(stats.usage_count, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
    }
}
