//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the zip-harvest
//! database. The `stats` column order and types are fixed; downstream
//! consumers read the table directly.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per zip code
CREATE TABLE IF NOT EXISTS stats (
    population integer,
    population_growth float,
    cost_of_living float,
    median_home_cost integer,
    median_home_age float,
    utilities_cost_of_living float,
    average_rent integer,
    rent_studio integer,
    rent_1br integer,
    rent_2br integer,
    rent_3br integer,
    rent_4br integer,
    unemployment float,
    job_growth float,
    violent_crime float,
    property_crime float,
    rental_market_percent float,
    vacancy float,
    property_tax float,
    appreciation_12mo float,
    appreciation_5yr float,
    appreciation_10yr float,
    zip_code integer,
    city text,
    state text
);

CREATE INDEX IF NOT EXISTS idx_stats_zip_code ON stats(zip_code);

-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    targets_seen INTEGER NOT NULL DEFAULT 0,
    records_written INTEGER NOT NULL DEFAULT 0
);

-- Zip codes skipped after a failure
CREATE TABLE IF NOT EXISTS crawl_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    zip_code TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    detail_url TEXT NOT NULL,
    stage TEXT NOT NULL,
    error TEXT NOT NULL,
    failed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_failures_zip ON crawl_failures(zip_code);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
