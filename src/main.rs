//! Custom runtime process entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Install the logger at `info`
//!   3. Load config from the environment
//!   4. Apply the configured log level and resolve the handler named by `_HANDLER`
//!   5. Enter the invocation loop until a fatal error
//!
//! Failures in 2–4 are reported to `init/error` (when the endpoint address is
//! known) and the process exits 1; the platform starts a fresh environment.

use custom_runtime::config::{self, ENV_RUNTIME_API};
use custom_runtime::error::RuntimeError;
use custom_runtime::handler::ModuleRegistry;
use custom_runtime::{bootstrap, demos, logger};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), RuntimeError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();
    let runtime_api = std::env::var(ENV_RUNTIME_API).ok();

    let log = match logger::init(logger::BOOTSTRAP_LEVEL, false) {
        Ok(handle) => handle,
        Err(e) => {
            bootstrap::report_without_config(&e, runtime_api.as_deref());
            return Err(e);
        }
    };

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            bootstrap::report_without_config(&e, runtime_api.as_deref());
            return Err(e);
        }
    };

    let mut registry = ModuleRegistry::new();
    demos::register(&mut registry);

    let runtime = bootstrap::start(&config, &registry, Some(&log))?;
    Err(runtime.run())
}
