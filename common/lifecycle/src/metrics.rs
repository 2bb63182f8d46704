use crate::component::MigrationOutcome;
use crate::phase::LifecyclePhase;

pub(crate) const METRIC_PHASE: &str = "lifecycle_phase";
pub(crate) const METRIC_MIGRATION_OUTCOME: &str = "lifecycle_migration_outcome_total";
pub(crate) const METRIC_REGISTRY_REQUESTS: &str = "lifecycle_registry_requests_total";
pub(crate) const METRIC_STEP_DURATION: &str = "lifecycle_step_duration_seconds";
pub(crate) const METRIC_SHUTDOWN_COMPLETED: &str = "lifecycle_shutdown_completed_total";

pub(crate) fn emit_phase(service_name: &str, phase: LifecyclePhase) {
    metrics::gauge!(
        METRIC_PHASE,
        "service_name" => service_name.to_string()
    )
    .set(phase.ordinal() as f64);
}

pub(crate) fn emit_migration_outcome(service_name: &str, outcome: MigrationOutcome) {
    metrics::counter!(
        METRIC_MIGRATION_OUTCOME,
        "service_name" => service_name.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub(crate) fn emit_registry_request(
    service_name: &str,
    operation: &'static str,
    result: &'static str,
) {
    metrics::counter!(
        METRIC_REGISTRY_REQUESTS,
        "service_name" => service_name.to_string(),
        "operation" => operation,
        "result" => result
    )
    .increment(1);
}

pub(crate) fn emit_step_duration(service_name: &str, step: &'static str, duration_secs: f64) {
    metrics::histogram!(
        METRIC_STEP_DURATION,
        "service_name" => service_name.to_string(),
        "step" => step
    )
    .record(duration_secs);
}

pub(crate) fn emit_shutdown_completed(service_name: &str, clean: bool) {
    metrics::counter!(
        METRIC_SHUTDOWN_COMPLETED,
        "service_name" => service_name.to_string(),
        "clean" => clean.to_string()
    )
    .increment(1);
}
