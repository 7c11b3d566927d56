//! Lifecycle metrics.
//!
//! # Metrics
//! - `server_connections_accepted_total` (counter)
//! - `server_drain_forced_total` (counter): drains that hit the deadline
//! - `process_faults_total` (counter): classified faults, by kind
//! - `seed_runs_total` (counter): seeding attempts, by outcome
//!
//! No exporter is installed here; without a recorder these calls are no-ops.

pub fn record_connection_accepted() {
    metrics::counter!("server_connections_accepted_total").increment(1);
}

pub fn record_forced_drain(aborted: usize) {
    metrics::counter!("server_drain_forced_total").increment(1);
    metrics::gauge!("server_drain_aborted_connections").set(aborted as f64);
}

pub fn record_fault(kind: &'static str) {
    metrics::counter!("process_faults_total", "kind" => kind).increment(1);
}

pub fn record_seed_run(outcome: &'static str) {
    metrics::counter!("seed_runs_total", "outcome" => outcome).increment(1);
}
