pub mod aggregators;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod server;

pub use aggregators::{AggregatorRegistry, AttributeAggregator};
pub use error::{AggregationError, AppError};
pub use orchestrator::AggregationOrchestrator;

// Test-only printing helper: expands to tprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
