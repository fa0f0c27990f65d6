use metrics::{SharedString, Unit};

/// A named, described, countable quantity.
///
/// Measures are pure data: they are defined once, as constants, and bound to tag dimensions by a
/// [`View`](crate::View).  All resiliency measures are dimensionless counts, which maps to
/// [`Unit::Count`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Measure {
    name: &'static str,
    description: &'static str,
    unit: Unit,
}

impl Measure {
    /// Creates a new `Measure`.
    pub const fn new(name: &'static str, description: &'static str, unit: Unit) -> Self {
        Self { name, description, unit }
    }

    /// Creates a new dimensionless `Measure`.
    pub const fn count(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, Unit::Count)
    }

    /// Name of this measure.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Long-form description of this measure.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Unit of this measure.
    pub fn unit(&self) -> Unit {
        self.unit.clone()
    }

    pub(crate) fn shared_description(&self) -> SharedString {
        SharedString::const_str(self.description)
    }
}

/// Number of resiliency policy sets loaded.
pub const POLICY_LOADED: Measure =
    Measure::count("resiliency/loaded", "Number of resiliency policies loaded.");

/// Number of times a resiliency policy was executed.
pub const POLICY_EXECUTED: Measure =
    Measure::count("resiliency/count", "Number of times a resiliency policy has been executed.");

/// Number of execution attempts rejected while a circuit breaker is open.
pub const CIRCUIT_BREAKER_OPEN: Measure = Measure::count(
    "resiliency/circuitbreaker_open/count",
    "The number of execution attempts in open state.",
);

/// Number of execution attempts rejected while a circuit breaker is half-open and over its
/// request quota.
pub const CIRCUIT_BREAKER_TOO_MANY_REQUESTS: Measure = Measure::count(
    "resiliency/circuitbreaker_too_many_req/count",
    "The number of execution attempts in half-open state and request count is over maxRequest for cb",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_names() {
        assert_eq!(POLICY_LOADED.name(), "resiliency/loaded");
        assert_eq!(POLICY_EXECUTED.name(), "resiliency/count");
        assert_eq!(CIRCUIT_BREAKER_OPEN.name(), "resiliency/circuitbreaker_open/count");
        assert_eq!(
            CIRCUIT_BREAKER_TOO_MANY_REQUESTS.name(),
            "resiliency/circuitbreaker_too_many_req/count"
        );
    }

    #[test]
    fn test_measures_are_dimensionless() {
        let measures = [
            &POLICY_LOADED,
            &POLICY_EXECUTED,
            &CIRCUIT_BREAKER_OPEN,
            &CIRCUIT_BREAKER_TOO_MANY_REQUESTS,
        ];
        for measure in measures {
            assert_eq!(measure.unit(), Unit::Count);
        }
    }
}
