use crate::{PolicyType, ResiliencyRecorder};

/// A no-op resiliency recorder.
///
/// Used while the resiliency metrics are uninitialized, or when they have been disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopResiliencyRecorder;

impl ResiliencyRecorder for NoopResiliencyRecorder {
    fn policy_loaded(&self, _name: &str, _namespace: &str) {}
    fn policy_executed(&self, _name: &str, _policy: PolicyType) {}
    fn circuit_breaker_open(&self, _component: &str) {}
    fn circuit_breaker_half_open_too_many_requests(&self, _component: &str) {}
}
