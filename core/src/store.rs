//! SQLite persistence for runs and their events.
//!
//! RULE: Only store.rs talks to the database.
//! The pipeline pushes events through `StoreSink`; it never executes SQL.

use crate::{
    error::GenResult,
    event::Event,
    kinematics::FourVector,
    output::EventSink,
    pipeline::RunStats,
    types::{EventId, Pdg, RunId},
};
use rusqlite::{params, Connection, OptionalExtension};

/// One stored particle row, as read back for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRow {
    pub index:       usize,
    pub pdg:         Pdg,
    pub status:      i32,
    pub p:           FourVector,
    pub parents:     [i64; 2],
    pub daughters:   (usize, usize),
    pub detector_id: Option<u32>,
}

/// A stored run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub n_trials:            u64,
    pub n_accepted:          u64,
    pub n_events:            u64,
    pub total_cross_section: f64,
    pub cross_section_error: f64,
}

pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (or create) the run database at `path`.
    pub fn open(path: &str) -> GenResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GenResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ──────────────────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str, config_json: &str) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, seed as i64, version, config_json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn save_summary(&self, run_id: &str, stats: &RunStats) -> GenResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO run_summary
               (run_id, n_trials, n_accepted, n_events, total_cross_section,
                cross_section_error, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                stats.n_trials as i64,
                stats.n_accepted as i64,
                stats.n_events as i64,
                stats.total_cross_section(),
                stats.cross_section_error(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn summary(&self, run_id: &str) -> GenResult<Option<SummaryRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT n_trials, n_accepted, n_events, total_cross_section, cross_section_error
                 FROM run_summary WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(SummaryRow {
                        n_trials:            row.get::<_, i64>(0)? as u64,
                        n_accepted:          row.get::<_, i64>(1)? as u64,
                        n_events:            row.get::<_, i64>(2)? as u64,
                        total_cross_section: row.get(3)?,
                        cross_section_error: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Write one event and all its particles atomically.
    pub fn insert_event(&self, run_id: &str, event_no: EventId, event: &Event) -> GenResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let k = &event.kinematics;
        tx.execute(
            "INSERT INTO event (run_id, event_no, cross_section, weight, w2, q2, t, epsilon)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![run_id, event_no as i64, event.cross_section, event.weight, k.w2, k.q2, k.t, k.epsilon],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO particle
                   (run_id, event_no, idx, pdg, status, charge, mass, e, px, py, pz,
                    vt, vx, vy, vz, parent1, parent2, daughter_begin, daughter_end, detector_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;
            for part in event.particles() {
                let [parent1, parent2] = part.parent_codes();
                stmt.execute(params![
                    run_id,
                    event_no as i64,
                    part.index as i64,
                    part.pdg,
                    part.status.code(),
                    part.charge,
                    part.mass,
                    part.p.e,
                    part.p.px,
                    part.p.py,
                    part.p.pz,
                    part.vertex.e,
                    part.vertex.px,
                    part.vertex.py,
                    part.vertex.pz,
                    parent1,
                    parent2,
                    part.daughters.0 as i64,
                    part.daughters.1 as i64,
                    part.detector_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn event_count(&self, run_id: &str) -> GenResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn particles_for_event(&self, run_id: &str, event_no: EventId) -> GenResult<Vec<ParticleRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, pdg, status, e, px, py, pz, parent1, parent2,
                    daughter_begin, daughter_end, detector_id
             FROM particle WHERE run_id = ?1 AND event_no = ?2
             ORDER BY idx ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, event_no as i64], |row| {
                Ok(ParticleRow {
                    index:       row.get::<_, i64>(0)? as usize,
                    pdg:         row.get(1)?,
                    status:      row.get(2)?,
                    p:           FourVector::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
                    parents:     [row.get(7)?, row.get(8)?],
                    daughters:   (row.get::<_, i64>(9)? as usize, row.get::<_, i64>(10)? as usize),
                    detector_id: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Sink that numbers events from 0 and writes them to an `EventStore`.
pub struct StoreSink<'a> {
    store:  &'a EventStore,
    run_id: RunId,
    next:   EventId,
}

impl<'a> StoreSink<'a> {
    pub fn new(store: &'a EventStore, run_id: impl Into<RunId>) -> Self {
        Self { store, run_id: run_id.into(), next: 0 }
    }
}

impl EventSink for StoreSink<'_> {
    fn push(&mut self, event: &Event) -> GenResult<()> {
        self.store.insert_event(&self.run_id, self.next, event)?;
        self.next += 1;
        Ok(())
    }

    fn finish(&mut self) -> GenResult<()> {
        log::info!("stored {} events for run {}", self.next, self.run_id);
        Ok(())
    }
}
