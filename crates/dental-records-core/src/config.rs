use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Application-level constants
pub const APP_NAME: &str = "Dental Records";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage key holding the serialized patient list
pub const PATIENTS_KEY: &str = "dentalPatients";
/// Storage key holding the next patient sequence number
pub const COUNTER_KEY: &str = "patientCounter";

/// Environment variable that relocates the data directory
pub const DATA_DIR_ENV: &str = "DENTAL_RECORDS_DATA_DIR";
/// SQLite file name inside the data directory
pub const DATABASE_FILE: &str = "dental-records.db";

/// Get the application data directory.
///
/// `$DENTAL_RECORDS_DATA_DIR` if set, otherwise `~/DentalRecords/`.
/// `None` when neither is available.
pub fn app_data_dir() -> Option<PathBuf> {
    let override_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
    resolve_data_dir(override_dir, dirs::home_dir())
}

fn resolve_data_dir(override_dir: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .or_else(|| home.map(|home| home.join("DentalRecords")))
}

/// Get the default database path
pub fn database_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DATABASE_FILE))
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "warn,dental_records_core=info"
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .try_init();

    if result.is_ok() {
        tracing::info!("{} starting v{}", APP_NAME, APP_VERSION);
    }
}
