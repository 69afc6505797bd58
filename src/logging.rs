//! Diagnostic logging and subscriber setup.
//!
//! Diagnostics are data, not log records, so nothing is emitted while a
//! tree is merged or decoded. Callers that want them in the log pass them
//! through [`log_diagnostics`], gated by a [`DiagnosticFilter`] that can be
//! adjusted at runtime.

use crate::error::{ValidationError, ValidationLevel};
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Atomic minimum diagnostic level.
///
/// Stored as a u8 in severity order:
/// 0=Error, 1=MissingValue, 2=Warn, 3=MissingOptionalValue, 4=Debug
pub struct DiagnosticFilter(AtomicU8);

impl DiagnosticFilter {
    /// Log diagnostics at `level` and anything more severe.
    pub fn new(level: ValidationLevel) -> Self {
        Self(AtomicU8::new(level_to_u8(level)))
    }

    pub fn get(&self) -> ValidationLevel {
        u8_to_level(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: ValidationLevel) {
        self.0.store(level_to_u8(level), Ordering::Relaxed);
    }

    pub fn should_log(&self, level: ValidationLevel) -> bool {
        level_to_u8(level) <= self.0.load(Ordering::Relaxed)
    }
}

impl Default for DiagnosticFilter {
    fn default() -> Self {
        Self::new(ValidationLevel::Warn)
    }
}

fn level_to_u8(level: ValidationLevel) -> u8 {
    match level {
        ValidationLevel::Error => 0,
        ValidationLevel::MissingValue => 1,
        ValidationLevel::Warn => 2,
        ValidationLevel::MissingOptionalValue => 3,
        ValidationLevel::Debug => 4,
    }
}

fn u8_to_level(val: u8) -> ValidationLevel {
    match val {
        0 => ValidationLevel::Error,
        1 => ValidationLevel::MissingValue,
        2 => ValidationLevel::Warn,
        3 => ValidationLevel::MissingOptionalValue,
        _ => ValidationLevel::Debug,
    }
}

/// Map a diagnostic level to the tracing level it is logged at.
pub fn validation_level_to_tracing(level: ValidationLevel) -> Level {
    match level {
        ValidationLevel::Error => Level::ERROR,
        ValidationLevel::MissingValue | ValidationLevel::Warn => Level::WARN,
        ValidationLevel::MissingOptionalValue => Level::INFO,
        ValidationLevel::Debug => Level::DEBUG,
    }
}

/// Emit each diagnostic that passes `filter` at its mapped level.
pub fn log_diagnostics(context: &str, errors: &[ValidationError], filter: &DiagnosticFilter) {
    for error in errors.iter().filter(|e| filter.should_log(e.level)) {
        let level = error.level.as_str();
        match validation_level_to_tracing(error.level) {
            Level::ERROR => tracing::error!(context, level, "{}", error.description),
            Level::WARN => tracing::warn!(context, level, "{}", error.description),
            Level::INFO => tracing::info!(context, level, "{}", error.description),
            Level::DEBUG => tracing::debug!(context, level, "{}", error.description),
            Level::TRACE => tracing::trace!(context, level, "{}", error.description),
        }
    }
}

/// Install the global subscriber.
///
/// `target` is `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a file path opened
/// in append mode. `RUST_LOG` overrides the level chosen by `verbose`.
pub fn init_tracing(verbose: bool, target: &str) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    match target {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
