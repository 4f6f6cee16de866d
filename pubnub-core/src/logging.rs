//! Logger manager (§4.0 / §5: "the logger manager has its own mutex
//! guarding its linked list of sinks"): a fan-out list of logging sinks
//! notified of every terminal transaction outcome, independent of the
//! context pool's own locking. Grounded on `original_source/core/
//! pbcc_logger_manager.{c,h}`'s sink-list registration/reporting API;
//! concrete sinks (file, syslog, …) stay out of scope (§1) beyond the
//! default bridge into the `log` crate facade.

use std::sync::{Arc, Mutex};

/// One logging destination. Implementors are notified of every terminal
/// transaction outcome a [`LoggerManager`] reports through.
pub trait LogSink: Send + Sync {
    /// `operation` names the endpoint (`"publish"`, `"time"`, …);
    /// `result` is the HTTP status on success or the formatted error on
    /// failure.
    fn log(&self, operation: &str, result: &Result<u16, String>);
}

/// Bridges into the `log` crate facade (`log::debug!`/`log::error!`),
/// registered by default so a fresh [`LoggerManager`] is never silent.
struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn log(&self, operation: &str, result: &Result<u16, String>) {
        match result {
            Ok(status) => log::debug!("{}: ok (HTTP {})", operation, status),
            Err(e) => log::error!("{}: {}", operation, e),
        }
    }
}

/// A mutex-guarded list of [`LogSink`]s, fanned out to on every terminal
/// transaction outcome.
pub struct LoggerManager {
    sinks: Mutex<Vec<Arc<dyn LogSink>>>,
}

impl Default for LoggerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerManager {
    /// A manager with just the default `log`-facade bridge registered.
    #[must_use]
    pub fn new() -> Self {
        LoggerManager {
            sinks: Mutex::new(vec![Arc::new(LogFacadeSink) as Arc<dyn LogSink>]),
        }
    }

    /// Register an additional sink.
    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks
            .lock()
            .expect("logger manager mutex poisoned")
            .push(sink);
    }

    /// Notify every registered sink of one terminal outcome.
    pub fn report(&self, operation: &str, result: &Result<u16, String>) {
        let sinks = self.sinks.lock().expect("logger manager mutex poisoned");
        for sink in sinks.iter() {
            sink.log(operation, result);
        }
    }

    /// How many sinks are currently registered.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.lock().expect("logger manager mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);

    impl LogSink for CountingSink {
        fn log(&self, _operation: &str, _result: &Result<u16, String>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_manager_has_the_default_log_facade_sink() {
        let manager = LoggerManager::new();
        assert_eq!(manager.sink_count(), 1);
    }

    #[test]
    fn report_fans_out_to_every_registered_sink() {
        let manager = LoggerManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        manager.add_sink(Arc::new(CountingSink(Arc::clone(&count))));
        manager.report("time", &Ok(200));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
