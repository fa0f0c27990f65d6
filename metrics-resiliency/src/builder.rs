use std::sync::Arc;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

use crate::{
    recorder::ResiliencyMetrics,
    view::{View, DEFAULT_VIEWS},
};

/// Forwards to the recorder currently in use by the `metrics` crate.
///
/// This is the default sink: when an exporter is installed as the global recorder, resiliency
/// events end up in that exporter.  If no recorder is installed, events are discarded.
///
/// `GlobalRecorder` must not itself be installed as the global recorder.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalRecorder;

impl Recorder for GlobalRecorder {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        metrics::with_recorder(|recorder| recorder.describe_counter(key, unit, description))
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        metrics::with_recorder(|recorder| recorder.describe_gauge(key, unit, description))
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        metrics::with_recorder(|recorder| recorder.describe_histogram(key, unit, description))
    }

    fn register_counter(&self, key: &Key, metadata: &Metadata<'_>) -> Counter {
        metrics::with_recorder(|recorder| recorder.register_counter(key, metadata))
    }

    fn register_gauge(&self, key: &Key, metadata: &Metadata<'_>) -> Gauge {
        metrics::with_recorder(|recorder| recorder.register_gauge(key, metadata))
    }

    fn register_histogram(&self, key: &Key, metadata: &Metadata<'_>) -> Histogram {
        metrics::with_recorder(|recorder| recorder.register_histogram(key, metadata))
    }
}

/// Builder for creating [`ResiliencyMetrics`].
pub struct ResiliencyMetricsBuilder {
    enabled: bool,
    sink: Option<Arc<dyn Recorder + Send + Sync>>,
    views: Vec<View>,
}

impl ResiliencyMetricsBuilder {
    /// Creates a new [`ResiliencyMetricsBuilder`].
    pub fn new() -> Self {
        Self { enabled: true, sink: None, views: DEFAULT_VIEWS.to_vec() }
    }

    /// Sets whether or not the metrics record anything.
    ///
    /// Disabled metrics ignore [`init`](ResiliencyMetrics::init) and drop every event, for
    /// deployments where telemetry is intentionally turned off.
    ///
    /// Defaults to `true`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the recorder that views are registered with and events are written to.
    ///
    /// Defaults to [`GlobalRecorder`].
    pub fn sink<R>(self, recorder: R) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        self.shared_sink(Arc::new(recorder))
    }

    /// Sets a recorder, shared with other owners, that views are registered with and events are
    /// written to.
    pub fn shared_sink(mut self, recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        self.sink = Some(recorder);
        self
    }

    /// Adds a view to register at initialization, alongside the default ones.
    ///
    /// Events are recorded to every view over the measure they belong to, so a view over one of
    /// the resiliency measures, renamed with [`View::with_name`], slices that measure along its own
    /// tags.  The view is subject to the same rules as the default views: it must not conflict with
    /// a differently-defined view of the same name, and its measure must be one that is recorded.
    pub fn add_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    /// Builds the resiliency metrics.
    ///
    /// The metrics are returned uninitialized.
    pub fn build(self) -> ResiliencyMetrics {
        let sink = self.sink.unwrap_or_else(|| Arc::new(GlobalRecorder));
        ResiliencyMetrics::from_parts(self.enabled, self.views, sink)
    }
}

impl Default for ResiliencyMetricsBuilder {
    fn default() -> Self {
        ResiliencyMetricsBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use metrics::SharedString;
    use metrics_util::debugging::DebuggingRecorder;

    use super::ResiliencyMetricsBuilder;
    use crate::{test_util::counters, ResiliencyRecorder, DEFAULT_VIEWS};

    #[test]
    fn test_defaults() {
        let metrics = ResiliencyMetricsBuilder::new().build();
        assert!(metrics.is_enabled());
        assert!(!metrics.is_active());
        assert!(metrics.registry().is_empty());
    }

    #[test]
    fn test_global_recorder_forwards_to_local_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        let resiliency = ResiliencyMetricsBuilder::new().build();
        metrics::with_local_recorder(&recorder, || {
            resiliency.init("fakeID", "ns").unwrap();
            resiliency.circuit_breaker_half_open_too_many_requests("appB");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(snapshot.len(), 1);
        let (ckey, unit, description, _) = &snapshot[0];
        assert_eq!(ckey.key().name(), "resiliency/circuitbreaker_too_many_req/count");
        assert_eq!(unit, &Some(metrics::Unit::Count));
        let expected = SharedString::const_str(DEFAULT_VIEWS[3].measure().description());
        assert_eq!(description, &Some(expected));
        assert_eq!(counters(&snapshotter).len(), 1);
    }
}
