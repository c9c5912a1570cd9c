//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `footprint_core` linkage without any routing layer.
//! - Print the model/reference graph of a schema manifest.
//! - Optionally count records per model in an existing database.
//!
//! Usage: `footprint_cli [schema.json [database.sqlite3]]`
//!
//! Set `FOOTPRINT_LOG_DIR` to an absolute directory to write core log events.

use footprint_core::db::open_db;
use footprint_core::{
    default_log_level, init_logging, reference_model_name, Criteria, FootprintService,
    ModelRegistry, QueryOptions, SqliteRecordStore,
};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "FOOTPRINT_LOG_DIR";

fn main() -> ExitCode {
    if let Err(err) = init_logging_from(std::env::var(LOG_DIR_ENV).ok()) {
        eprintln!("error_code=logging_init_failed error={err}");
        return ExitCode::FAILURE;
    }

    println!("footprint_core ping={}", footprint_core::ping());
    println!("footprint_core version={}", footprint_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(schema_path) = args.next() else {
        return ExitCode::SUCCESS;
    };

    let registry = match ModelRegistry::from_schema_file(&schema_path) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            eprintln!("error_code={} error={err}", err.code());
            return ExitCode::FAILURE;
        }
    };
    print_graph(&registry);

    match args.next() {
        Some(db_path) => match print_counts(registry, &db_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error={err}");
                ExitCode::FAILURE
            }
        },
        None => ExitCode::SUCCESS,
    }
}

/// Starts file logging when a non-blank directory is given.
///
/// Returns whether logging was started.
fn init_logging_from(log_dir: Option<String>) -> Result<bool, String> {
    match log_dir {
        Some(dir) if !dir.trim().is_empty() => {
            init_logging(default_log_level(), &dir)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn print_graph(registry: &ModelRegistry) {
    for model in registry.models() {
        println!("model {}", model.name);
        for reference in model.references() {
            let target = reference_model_name(model, reference.name).unwrap_or("?");
            println!(
                "  {}.{} -> {} ({})",
                model.name,
                reference.name,
                target,
                reference.cardinality.as_str()
            );
        }
    }
}

fn print_counts(
    registry: Arc<ModelRegistry>,
    db_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let store = SqliteRecordStore::try_new(&conn)?;
    let service = FootprintService::new(Arc::clone(&registry), store);

    for name in registry.model_names() {
        let records = service.find(&name, &Criteria::All, &QueryOptions::default())?;
        println!("records {name}={}", records.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::init_logging_from;
    use footprint_core::logging_status;

    #[test]
    fn logging_starts_only_when_a_directory_is_given() {
        assert_eq!(init_logging_from(None), Ok(false));
        assert_eq!(init_logging_from(Some("   ".to_string())), Ok(false));
        assert!(logging_status().is_none());

        let log_dir = tempfile::tempdir().expect("temp dir");
        let dir = log_dir.path().to_str().expect("utf-8 temp dir").to_string();
        assert_eq!(init_logging_from(Some(dir)), Ok(true));

        let (_, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_dir, log_dir.path());

        assert!(init_logging_from(Some("relative/logs".to_string())).is_err());
    }
}
