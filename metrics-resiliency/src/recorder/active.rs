use std::sync::Arc;

use metrics::{Level, Metadata, Recorder, SharedString};
use tracing::debug;

use crate::{
    measure::{
        Measure, CIRCUIT_BREAKER_OPEN, CIRCUIT_BREAKER_TOO_MANY_REQUESTS, POLICY_EXECUTED,
        POLICY_LOADED,
    },
    tags::{PolicyType, TagKey, TagSet, TagSetBuilder},
    view::{Binding, RegistrationError, View, ViewRegistry},
    ResiliencyRecorder,
};

const METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

fn shared(value: &str) -> SharedString {
    SharedString::from(Arc::<str>::from(value))
}

/// Identity of the process doing the recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    app_id: SharedString,
    namespace: SharedString,
}

impl Identity {
    /// Creates a new `Identity`.
    pub fn new<A, N>(app_id: A, namespace: N) -> Self
    where
        A: Into<String>,
        N: Into<String>,
    {
        Self {
            app_id: SharedString::from(Arc::<str>::from(app_id.into())),
            namespace: SharedString::from(Arc::<str>::from(namespace.into())),
        }
    }

    /// Application identifier.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Namespace the application runs in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Tags carried by every event.
    pub(crate) fn tags(&self) -> TagSetBuilder {
        TagSet::builder()
            .tag(TagKey::AppId, self.app_id.clone())
            .tag(TagKey::Namespace, self.namespace.clone())
    }
}

/// Views to record to, grouped by the call that feeds them.
#[derive(Debug, Default)]
struct Bindings {
    policy_loaded: Vec<Binding>,
    policy_executed: Vec<Binding>,
    circuit_breaker_open: Vec<Binding>,
    circuit_breaker_too_many_requests: Vec<Binding>,
}

impl Bindings {
    fn new(views: &[View], registry: &ViewRegistry) -> Result<Self, RegistrationError> {
        let mut bindings = Bindings::default();
        for view in views {
            let measure = view.measure();
            let slot = if *measure == POLICY_LOADED {
                &mut bindings.policy_loaded
            } else if *measure == POLICY_EXECUTED {
                &mut bindings.policy_executed
            } else if *measure == CIRCUIT_BREAKER_OPEN {
                &mut bindings.circuit_breaker_open
            } else if *measure == CIRCUIT_BREAKER_TOO_MANY_REQUESTS {
                &mut bindings.circuit_breaker_too_many_requests
            } else {
                return Err(RegistrationError::UnknownMeasure {
                    view: view.name(),
                    measure: measure.name(),
                });
            };

            if !slot.iter().any(|binding| binding.view().name() == view.name()) {
                slot.push(registry.bind(view));
            }
        }
        Ok(bindings)
    }
}

/// A resiliency recorder that forwards every event to a [`Recorder`].
///
/// Each event increments, by one, the counter of every registered view over the corresponding
/// measure, keyed by the tags each view groups by.  Events whose tags fail validation are dropped.
///
/// Obtained from [`ResiliencyMetrics::recorder`](crate::ResiliencyMetrics::recorder) once
/// initialized.
pub struct ActiveResiliencyRecorder {
    identity: Identity,
    bindings: Bindings,
    sink: Arc<dyn Recorder + Send + Sync>,
}

impl ActiveResiliencyRecorder {
    /// Binds `views` to the recording calls.
    ///
    /// Views are recorded to only while registered in `registry`.
    pub(crate) fn new(
        identity: Identity,
        views: &[View],
        registry: &ViewRegistry,
        sink: Arc<dyn Recorder + Send + Sync>,
    ) -> Result<Self, RegistrationError> {
        let bindings = Bindings::new(views, registry)?;
        Ok(Self { identity, bindings, sink })
    }

    /// Identity attached to every event.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn record<F>(&self, measure: &Measure, bindings: &[Binding], tags: F)
    where
        F: FnOnce() -> TagSetBuilder,
    {
        let mut registered = bindings.iter().filter(|binding| binding.is_registered()).peekable();
        if registered.peek().is_none() {
            return;
        }

        match tags().build() {
            Ok(tags) => {
                for binding in registered {
                    let key = binding.view().key(&tags);
                    self.sink.register_counter(&key, &METADATA).increment(1);
                }
            }
            Err(e) => {
                debug!(measure = measure.name(), error = %e, "dropping event with invalid tags")
            }
        }
    }
}

impl ResiliencyRecorder for ActiveResiliencyRecorder {
    fn policy_loaded(&self, name: &str, namespace: &str) {
        self.record(&POLICY_LOADED, &self.bindings.policy_loaded, || {
            self.identity
                .tags()
                .tag(TagKey::Name, shared(name))
                .tag(TagKey::Namespace, shared(namespace))
        });
    }

    fn policy_executed(&self, name: &str, policy: PolicyType) {
        self.record(&POLICY_EXECUTED, &self.bindings.policy_executed, || {
            self.identity
                .tags()
                .tag(TagKey::Name, shared(name))
                .tag(TagKey::Policy, SharedString::const_str(policy.as_str()))
        });
    }

    fn circuit_breaker_open(&self, component: &str) {
        self.record(&CIRCUIT_BREAKER_OPEN, &self.bindings.circuit_breaker_open, || {
            self.identity.tags().tag(TagKey::Component, shared(component))
        });
    }

    fn circuit_breaker_half_open_too_many_requests(&self, component: &str) {
        let bindings = &self.bindings.circuit_breaker_too_many_requests;
        self.record(&CIRCUIT_BREAKER_TOO_MANY_REQUESTS, bindings, || {
            self.identity.tags().tag(TagKey::Component, shared(component))
        });
    }
}

impl std::fmt::Debug for ActiveResiliencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveResiliencyRecorder")
            .field("identity", &self.identity)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}
