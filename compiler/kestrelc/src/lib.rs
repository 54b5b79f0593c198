//! Kestrel driver.
//!
//! Wraps `kestrel_resolve` in a Salsa database: module syntax trees are
//! Salsa inputs, and each module's resolution report is a tracked query.
//! Changing one module's tree re-resolves only the modules that read it.

pub mod db;
pub mod input;
pub mod query;
pub mod report;

pub use db::{CompilerDb, Db};
pub use input::SourceModule;
pub use query::resolution_report;
pub use report::{FunctionReport, ReportedAction, ReportedDiagnostic, ResolutionReport};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=kestrel_resolve=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
