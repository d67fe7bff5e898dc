//! Prometheus metrics collection for routenet.
//!
//! Every recorder is a no-op until [`init`] has run, so library users that
//! never call it pay nothing beyond an atomic load.
//!
//! - `routenet_commands_total{module,command}` - Commands executed by a module
//! - `routenet_command_duration_seconds{module,command}` - Module latency
//! - `routenet_command_errors_total{module,error}` - Failed commands by code, counted at the session root
//! - `routenet_forward_retries_total` - Reconnect-and-retry attempts
//! - `routenet_events_total{name}` - Events emitted on a handler's channel
//! - `routenet_listener_failures_total` - Listener callbacks that failed
//! - `routenet_active_handlers{type}` - Live handlers per level

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Commands executed by a module, by qualified name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed commands by module and error code, once per command.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Forwarding retries after a transport abort.
pub static FORWARD_RETRIES: OnceLock<IntCounter> = OnceLock::new();

/// Events emitted through handler dispatchers.
pub static EVENTS_EMITTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Listener callbacks that returned an error.
pub static LISTENER_FAILURES: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms and gauges
// ========================================================================

/// Module execution latency.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Live handlers by handler type.
pub static ACTIVE_HANDLERS: OnceLock<IntGaugeVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Repeated calls log a warning and keep the first set.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("routenet_commands_total", "Commands executed by modules"), &["module", "command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("routenet_command_duration_seconds", "Module command latency")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["module", "command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("routenet_command_errors_total", "Command routing failures"), &["module", "error"]));
    register!(FORWARD_RETRIES, IntCounter::new("routenet_forward_retries_total", "Commands re-sent after a transport abort"));
    register!(EVENTS_EMITTED, IntCounterVec::new(Opts::new("routenet_events_total", "Events emitted by handlers"), &["name"]));
    register!(LISTENER_FAILURES, IntCounter::new("routenet_listener_failures_total", "Event listeners that returned an error"));
    register!(ACTIVE_HANDLERS, IntGaugeVec::new(Opts::new("routenet_active_handlers", "Live message handlers"), &["type"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recorders
// ============================================================================

/// Record a module execution with latency.
#[inline]
pub fn record_command(module: &str, command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[module, command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[module, command]).observe(duration_secs);
    }
}

/// Record a routing failure.
#[inline]
pub fn record_command_error(module: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[module, error]).inc();
    }
}

#[inline]
pub fn record_forward_retry() {
    if let Some(c) = FORWARD_RETRIES.get() {
        c.inc();
    }
}

/// Record an emitted event by name.
#[inline]
pub fn record_event(name: &str) {
    if let Some(c) = EVENTS_EMITTED.get() {
        c.with_label_values(&[name]).inc();
    }
}

#[inline]
pub fn record_listener_failure() {
    if let Some(c) = LISTENER_FAILURES.get() {
        c.inc();
    }
}

/// Adjust the live handler gauge for a level.
#[inline]
pub fn add_active_handlers(handler_type: &str, delta: i64) {
    if let Some(g) = ACTIVE_HANDLERS.get() {
        g.with_label_values(&[handler_type]).add(delta);
    }
}
