#![allow(dead_code)]

use std::sync::Once;

use netcheck_engine::{CheckerOptions, PropertyChecker, SolverChoice};
use netcheck_net::NetworkConfig;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn load_fixture(name: &str) -> NetworkConfig {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let source =
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {path}: {e}"));
    NetworkConfig::from_json(&source).unwrap_or_else(|e| panic!("Failed to parse {path}: {e}"))
}

pub fn options(parallel: bool) -> CheckerOptions {
    CheckerOptions {
        solver: SolverChoice::Z3,
        timeout_secs: 60,
        parallel,
    }
}

pub fn checker(name: &str) -> PropertyChecker {
    init_tracing();
    PropertyChecker::new(load_fixture(name), options(false))
}

pub fn parallel_checker(name: &str) -> PropertyChecker {
    init_tracing();
    PropertyChecker::new(load_fixture(name), options(true))
}
