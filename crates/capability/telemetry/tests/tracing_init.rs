use pulse_telemetry::init_tracing;

#[test]
fn second_init_keeps_installed_subscriber() {
    assert!(init_tracing());
    assert!(!init_tracing());
    tracing::info!(target: "pulse.telemetry", "still_logging");
}
