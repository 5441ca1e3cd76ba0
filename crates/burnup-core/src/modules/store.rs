use crate::domain::{BatchJob, BurnupError};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS materials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle_number INTEGER NOT NULL,
    element_name TEXT NOT NULL,
    case_name TEXT NOT NULL,
    material_id INTEGER NOT NULL,
    time_point TEXT NOT NULL,
    total_mass_g REAL NOT NULL,
    density_g_cm3 REAL NOT NULL,
    surrogate_mass_g REAL NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS isotopes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    material_ref INTEGER NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
    isotope_name TEXT NOT NULL,
    zaid INTEGER,
    mass_g REAL NOT NULL,
    weight_fraction REAL NOT NULL,
    disposition TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_materials_cycle ON materials(cycle_number);
CREATE INDEX IF NOT EXISTS idx_materials_element ON materials(element_name);
CREATE INDEX IF NOT EXISTS idx_isotopes_material ON isotopes(material_ref);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database '{}' does not exist", path.display())]
    Missing { path: PathBuf },
    #[error("failed to open database '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

impl From<StoreError> for BurnupError {
    fn from(error: StoreError) -> Self {
        let placeholder = match error {
            StoreError::Missing { .. } => "IO.DATABASE_MISSING",
            StoreError::Open { .. } | StoreError::Query(_) => "IO.DATABASE",
        };
        BurnupError::io_system(placeholder, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle_number: u32,
    pub material_count: usize,
    pub total_mass_g: f64,
    pub created_at_unix_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementHistoryEntry {
    pub cycle_number: u32,
    pub case_name: String,
    pub material_id: u32,
    pub time_point: String,
    pub total_mass_g: f64,
    pub density_g_cm3: f64,
    pub surrogate_mass_g: f64,
    pub isotope_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredIsotope {
    pub isotope_name: String,
    pub zaid: Option<u32>,
    pub mass_g: f64,
    pub weight_fraction: f64,
    pub disposition: String,
}

/// Material compositions per burnup cycle in a SQLite file.
pub struct MaterialStore {
    connection: Connection,
}

impl MaterialStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Read-only access to a database a batch already wrote. Never creates the file.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Missing {
                path: path.to_path_buf(),
            });
        }
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { connection })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self { connection })
    }

    /// Writes every job with a result under `cycle_number` in a single
    /// transaction. Returns the number of materials written.
    pub fn save_batch(&mut self, cycle_number: u32, jobs: &[&BatchJob]) -> Result<usize, StoreError> {
        let created_at = unix_timestamp_seconds();
        let transaction = self.connection.transaction()?;
        let mut saved = 0;
        for job in jobs {
            let Some(material) = job.result.as_ref() else {
                continue;
            };
            transaction.execute(
                "INSERT INTO materials (cycle_number, element_name, case_name, material_id, \
                 time_point, total_mass_g, density_g_cm3, surrogate_mass_g, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    cycle_number,
                    job.name,
                    material.case_label,
                    material.material_id,
                    material.time_label,
                    material.total_mass_g,
                    material.density_g_cm3,
                    material.surrogate_mass_g,
                    created_at,
                ],
            )?;
            let material_ref = transaction.last_insert_rowid();
            for constituent in &material.constituents {
                transaction.execute(
                    "INSERT INTO isotopes (material_ref, isotope_name, zaid, mass_g, \
                     weight_fraction, disposition) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        material_ref,
                        constituent.nuclide,
                        constituent.zaid.map(|zaid| zaid.value()),
                        constituent.mass_g,
                        constituent.weight_fraction,
                        constituent.disposition.as_str(),
                    ],
                )?;
            }
            debug!(element = %job.name, cycle_number, material_ref, "stored material");
            saved += 1;
        }
        transaction.commit()?;
        Ok(saved)
    }

    pub fn latest_cycle(&self) -> Result<Option<u32>, StoreError> {
        let latest = self.connection.query_row(
            "SELECT MAX(cycle_number) FROM materials",
            [],
            |row| row.get::<_, Option<u32>>(0),
        )?;
        Ok(latest)
    }

    pub fn list_cycles(&self) -> Result<Vec<CycleSummary>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT cycle_number, COUNT(*), SUM(total_mass_g), MIN(created_at) \
             FROM materials GROUP BY cycle_number ORDER BY cycle_number",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(CycleSummary {
                cycle_number: row.get(0)?,
                material_count: count_column(row, 1)?,
                total_mass_g: row.get(2)?,
                created_at_unix_seconds: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn cycle_status(&self, cycle_number: u32) -> Result<Option<CycleSummary>, StoreError> {
        let summary = self
            .connection
            .query_row(
                "SELECT cycle_number, COUNT(*), SUM(total_mass_g), MIN(created_at) \
                 FROM materials WHERE cycle_number = ?1 GROUP BY cycle_number",
                params![cycle_number],
                |row| {
                    Ok(CycleSummary {
                        cycle_number: row.get(0)?,
                        material_count: count_column(row, 1)?,
                        total_mass_g: row.get(2)?,
                        created_at_unix_seconds: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    pub fn element_history(&self, element_name: &str) -> Result<Vec<ElementHistoryEntry>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT m.cycle_number, m.case_name, m.material_id, m.time_point, m.total_mass_g, \
             m.density_g_cm3, m.surrogate_mass_g, \
             (SELECT COUNT(*) FROM isotopes i WHERE i.material_ref = m.id \
              AND i.disposition = 'included') \
             FROM materials m WHERE m.element_name = ?1 ORDER BY m.cycle_number, m.id",
        )?;
        let rows = statement.query_map(params![element_name], |row| {
            Ok(ElementHistoryEntry {
                cycle_number: row.get(0)?,
                case_name: row.get(1)?,
                material_id: row.get(2)?,
                time_point: row.get(3)?,
                total_mass_g: row.get(4)?,
                density_g_cm3: row.get(5)?,
                surrogate_mass_g: row.get(6)?,
                isotope_count: count_column(row, 7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn isotopes_for(
        &self,
        cycle_number: u32,
        element_name: &str,
    ) -> Result<Vec<StoredIsotope>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT i.isotope_name, i.zaid, i.mass_g, i.weight_fraction, i.disposition \
             FROM isotopes i JOIN materials m ON m.id = i.material_ref \
             WHERE m.cycle_number = ?1 AND m.element_name = ?2 ORDER BY i.id",
        )?;
        let rows = statement.query_map(params![cycle_number, element_name], |row| {
            Ok(StoredIsotope {
                isotope_name: row.get(0)?,
                zaid: row.get(1)?,
                mass_g: row.get(2)?,
                weight_fraction: row.get(3)?,
                disposition: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn count_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<usize> {
    let count: i64 = row.get(index)?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn unix_timestamp_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
