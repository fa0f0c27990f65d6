use std::sync::Arc;

use metrics::Recorder;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

mod active;
pub use self::active::{ActiveResiliencyRecorder, Identity};

mod noop;
pub use self::noop::NoopResiliencyRecorder;

use crate::{
    builder::ResiliencyMetricsBuilder,
    tags::PolicyType,
    view::{RegistrationError, View, ViewRegistry},
};

static NOOP_RECORDER: NoopResiliencyRecorder = NoopResiliencyRecorder;

/// A trait for recording resiliency policy events.
///
/// This is the interface the resiliency policy engine calls into.  Implementations must never
/// block, and never fail: recording exists to observe the request path, not to affect it.
pub trait ResiliencyRecorder: Send + Sync {
    /// Records that a resiliency configuration finished loading.
    ///
    /// Called once per configuration, however many policies it defines.
    fn policy_loaded(&self, name: &str, namespace: &str);

    /// Records that a policy of kind `policy`, from the configuration `name`, was applied.
    ///
    /// Called once per policy kind applied to an execution: a call guarded by a timeout, a retry
    /// and a circuit breaker records three events.
    fn policy_executed(&self, name: &str, policy: PolicyType);

    /// Records that an execution attempt against `component` was rejected by an open circuit
    /// breaker.
    fn circuit_breaker_open(&self, component: &str);

    /// Records that an execution attempt against `component` was rejected by a half-open circuit
    /// breaker whose request quota was already used up.
    fn circuit_breaker_half_open_too_many_requests(&self, component: &str);
}

// Blanket implementations.
macro_rules! impl_resiliency_recorder {
    ($inner_ty:ident, $ptr_ty:ty) => {
        impl<$inner_ty> $crate::ResiliencyRecorder for $ptr_ty
        where
            $inner_ty: $crate::ResiliencyRecorder + ?Sized,
        {
            fn policy_loaded(&self, name: &str, namespace: &str) {
                std::ops::Deref::deref(self).policy_loaded(name, namespace)
            }

            fn policy_executed(&self, name: &str, policy: $crate::PolicyType) {
                std::ops::Deref::deref(self).policy_executed(name, policy)
            }

            fn circuit_breaker_open(&self, component: &str) {
                std::ops::Deref::deref(self).circuit_breaker_open(component)
            }

            fn circuit_breaker_half_open_too_many_requests(&self, component: &str) {
                std::ops::Deref::deref(self).circuit_breaker_half_open_too_many_requests(component)
            }
        }
    };
}

impl_resiliency_recorder!(T, &T);
impl_resiliency_recorder!(T, std::boxed::Box<T>);
impl_resiliency_recorder!(T, std::sync::Arc<T>);

/// Resiliency metrics for a single process.
///
/// `ResiliencyMetrics` starts out uninitialized, silently dropping every event.  Calling
/// [`init`](ResiliencyMetrics::init) registers its views with the sink and publishes the process
/// identity, after which events are forwarded to the sink.  The transition happens at most once:
/// the identity given to the first successful `init` is kept for the lifetime of the instance.
///
/// Construct one instance at startup and hand out references to it; every component that records
/// resiliency events should share it.
pub struct ResiliencyMetrics {
    enabled: bool,
    views: Vec<View>,
    registry: ViewRegistry,
    sink: Arc<dyn Recorder + Send + Sync>,
    active: OnceCell<ActiveResiliencyRecorder>,
}

impl ResiliencyMetrics {
    /// Creates a new `ResiliencyMetrics` with the default configuration.
    ///
    /// Events are written to the global recorder of the `metrics` crate.
    pub fn new() -> Self {
        ResiliencyMetricsBuilder::new().build()
    }

    /// Creates a [`ResiliencyMetricsBuilder`].
    pub fn builder() -> ResiliencyMetricsBuilder {
        ResiliencyMetricsBuilder::new()
    }

    pub(crate) fn from_parts(
        enabled: bool,
        views: Vec<View>,
        sink: Arc<dyn Recorder + Send + Sync>,
    ) -> Self {
        Self { enabled, views, registry: ViewRegistry::new(), sink, active: OnceCell::new() }
    }

    /// Registers the views and starts forwarding events, tagged with the given identity.
    ///
    /// Calling `init` more than once is allowed.  Later calls re-register any view that was removed
    /// from the [`ViewRegistry`] in the meantime, which resumes recording to it, and otherwise
    /// leave state untouched: in particular, the identity from the first successful call is kept
    /// even if a different one is passed.
    ///
    /// An identity that is not a valid tag value is accepted, but every event would then be
    /// dropped, so a warning is logged.
    ///
    /// When the metrics were built disabled, this does nothing.
    ///
    /// # Errors
    ///
    /// If a view conflicts with a differently-defined view already registered, or aggregates a
    /// measure that no recording call writes to, an error is returned and the metrics stay
    /// uninitialized.  This is a startup failure and should not be retried.
    pub fn init(&self, app_id: &str, namespace: &str) -> Result<(), RegistrationError> {
        if !self.enabled {
            debug!(app_id, namespace, "resiliency metrics are disabled, ignoring init");
            return Ok(());
        }

        let mut initialized = false;
        let active = self.active.get_or_try_init(|| {
            let active = ActiveResiliencyRecorder::new(
                Identity::new(app_id, namespace),
                &self.views,
                &self.registry,
                Arc::clone(&self.sink),
            )?;
            self.registry.register(&self.views, &*self.sink)?;
            initialized = true;
            Ok::<_, RegistrationError>(active)
        })?;

        if initialized {
            if let Err(e) = active.identity().tags().build() {
                warn!(
                    app_id,
                    namespace,
                    error = %e,
                    "resiliency identity is not a valid tag value, every event will be dropped"
                );
            }
            info!(app_id, namespace, "resiliency metrics initialized");
            return Ok(());
        }

        self.registry.register(&self.views, &*self.sink)?;

        let identity = active.identity();
        if identity.app_id() != app_id || identity.namespace() != namespace {
            warn!(
                app_id = identity.app_id(),
                namespace = identity.namespace(),
                ignored_app_id = app_id,
                ignored_namespace = namespace,
                "resiliency metrics already initialized with a different identity"
            );
        }

        Ok(())
    }

    /// Whether or not these metrics were configured to record at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether or not [`init`](ResiliencyMetrics::init) has succeeded.
    pub fn is_active(&self) -> bool {
        self.active.get().is_some()
    }

    /// Identity published by [`init`](ResiliencyMetrics::init), if it has succeeded.
    pub fn identity(&self) -> Option<&Identity> {
        self.active.get().map(ActiveResiliencyRecorder::identity)
    }

    /// Views registered by these metrics.
    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    /// Gets the recorder events are currently dispatched to.
    ///
    /// This is the active recorder once [`init`](ResiliencyMetrics::init) has succeeded, and a
    /// no-op recorder before that.
    pub fn recorder(&self) -> &dyn ResiliencyRecorder {
        match self.active.get() {
            Some(active) => active,
            None => &NOOP_RECORDER,
        }
    }
}

impl Default for ResiliencyMetrics {
    fn default() -> Self {
        ResiliencyMetrics::new()
    }
}

impl std::fmt::Debug for ResiliencyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencyMetrics")
            .field("enabled", &self.enabled)
            .field("views", &self.views)
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

impl ResiliencyRecorder for ResiliencyMetrics {
    fn policy_loaded(&self, name: &str, namespace: &str) {
        self.recorder().policy_loaded(name, namespace)
    }

    fn policy_executed(&self, name: &str, policy: PolicyType) {
        self.recorder().policy_executed(name, policy)
    }

    fn circuit_breaker_open(&self, component: &str) {
        self.recorder().circuit_breaker_open(component)
    }

    fn circuit_breaker_half_open_too_many_requests(&self, component: &str) {
        self.recorder().circuit_breaker_half_open_too_many_requests(component)
    }
}
