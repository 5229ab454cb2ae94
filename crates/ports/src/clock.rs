use kairos_core::Timestamp;

/// Port for time abstraction.
///
/// Allows the system to use different time sources: real system time in
/// production, a fixed or steppable clock in tests.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock.
    fn now(&self) -> Timestamp;

    /// Name/identifier for debugging and tracing spans.
    fn name(&self) -> &str {
        "Clock"
    }
}
