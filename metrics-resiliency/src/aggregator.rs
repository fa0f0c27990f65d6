use std::{
    collections::HashMap,
    sync::{atomic::Ordering, Arc},
};

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Label, Metadata, Recorder, SharedString, Unit,
};
use metrics_util::registry::{AtomicStorage, Registry};
use parking_lot::RwLock;

/// A single aggregated value of a view: one tag combination and its count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    tags: Vec<Label>,
    count: u64,
}

impl Row {
    /// Tags identifying this row, in the order the view lists them.
    pub fn tags(&self) -> &[Label] {
        &self.tags
    }

    /// Gets the value of a tag in this row, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|label| label.key() == key).map(Label::value)
    }

    /// Number of events recorded for this tag combination.
    pub fn count(&self) -> u64 {
        self.count
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|label| (label.key(), label.value()))
    }
}

struct Inner {
    registry: Registry<Key, AtomicStorage>,
    descriptions: RwLock<HashMap<String, (Option<Unit>, SharedString)>>,
}

/// An in-process recorder that sums counters and can be queried by view name.
///
/// Counters are lock-free once created, so `CountAggregator` can be used as the sink of
/// [`ResiliencyMetrics`](crate::ResiliencyMetrics) under concurrent recording.  Gauges and
/// histograms are not supported and are silently dropped.
///
/// Cloning a `CountAggregator` yields a handle to the same storage.
#[derive(Clone)]
pub struct CountAggregator {
    inner: Arc<Inner>,
}

impl CountAggregator {
    /// Creates an empty `CountAggregator`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Registry::atomic(),
                descriptions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Gets every row recorded for the view `name`.
    ///
    /// Rows are sorted by their tags.  A view that was never written to has no rows.
    pub fn retrieve_data(&self, name: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        self.inner.registry.visit_counters(|key, counter| {
            if key.name() == name {
                let tags = key.labels().cloned().collect();
                rows.push(Row { tags, count: counter.load(Ordering::Acquire) });
            }
        });
        rows.sort_by(|a, b| a.pairs().cmp(b.pairs()));
        rows
    }

    /// Drops every row recorded for the view `name`, returning how many were dropped.
    ///
    /// Recording to the view afterwards starts counting from zero again.
    pub fn clear(&self, name: &str) -> usize {
        let mut dropped = 0;
        self.inner.registry.retain_counters(|key, _| {
            let keep = key.name() != name;
            if !keep {
                dropped += 1;
            }
            keep
        });
        dropped
    }

    /// Gets the description of the view `name`, if it was described.
    pub fn description(&self, name: &str) -> Option<SharedString> {
        self.inner.descriptions.read().get(name).map(|(_, description)| description.clone())
    }

    /// Gets the unit of the view `name`, if it was described with one.
    pub fn unit(&self, name: &str) -> Option<Unit> {
        self.inner.descriptions.read().get(name).and_then(|(unit, _)| unit.clone())
    }
}

impl Default for CountAggregator {
    fn default() -> Self {
        CountAggregator::new()
    }
}

impl std::fmt::Debug for CountAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let described: Vec<_> = self.inner.descriptions.read().keys().cloned().collect();
        f.debug_struct("CountAggregator").field("described", &described).finish_non_exhaustive()
    }
}

impl Recorder for CountAggregator {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.inner.descriptions.write().insert(key.as_str().to_owned(), (unit, description));
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.inner.registry.get_or_create_counter(key, |c| Counter::from_arc(Arc::clone(c)))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[cfg(test)]
mod tests {
    use metrics::{Level, Metadata};

    use super::*;
    use crate::{
        PolicyType, ResiliencyMetrics, ResiliencyRecorder, POLICY_EXECUTED, POLICY_EXECUTED_VIEW,
    };

    const METADATA: Metadata<'static> = Metadata::new(module_path!(), Level::INFO, None);

    #[test]
    fn test_counters_accumulate_per_key() {
        let aggregator = CountAggregator::new();
        let first = Key::from_parts("resiliency/count", vec![Label::new("name", "a")]);
        let second = Key::from_parts("resiliency/count", vec![Label::new("name", "b")]);

        aggregator.register_counter(&first, &METADATA).increment(2);
        aggregator.register_counter(&second, &METADATA).increment(1);
        aggregator.register_counter(&first, &METADATA).increment(1);

        let rows = aggregator.retrieve_data("resiliency/count");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag("name"), Some("a"));
        assert_eq!(rows[0].count(), 3);
        assert_eq!(rows[1].tag("name"), Some("b"));
        assert_eq!(rows[1].count(), 1);
        assert!(aggregator.retrieve_data("resiliency/loaded").is_empty());
    }

    #[test]
    fn test_clear_restarts_counting() {
        let aggregator = CountAggregator::new();
        let loaded = Key::from_parts("resiliency/loaded", vec![Label::new("name", "a")]);
        let executed = Key::from_parts("resiliency/count", vec![Label::new("name", "a")]);

        aggregator.register_counter(&loaded, &METADATA).increment(2);
        aggregator.register_counter(&executed, &METADATA).increment(5);

        assert_eq!(aggregator.clear("resiliency/count"), 1);
        assert_eq!(aggregator.clear("resiliency/count"), 0);
        assert!(aggregator.retrieve_data("resiliency/count").is_empty());
        assert_eq!(aggregator.retrieve_data("resiliency/loaded")[0].count(), 2);

        aggregator.register_counter(&executed, &METADATA).increment(1);
        assert_eq!(aggregator.retrieve_data("resiliency/count")[0].count(), 1);
    }

    #[test]
    fn test_gauges_and_histograms_are_dropped() {
        let aggregator = CountAggregator::new();
        let key = Key::from_name("resiliency/count");

        aggregator.register_gauge(&key, &METADATA).set(1.0);
        aggregator.register_histogram(&key, &METADATA).record(1.0);

        assert!(aggregator.retrieve_data("resiliency/count").is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let aggregator = CountAggregator::new();
        let resiliency = ResiliencyMetrics::builder().sink(aggregator.clone()).build();

        resiliency.init("fakeID", "ns").unwrap();
        resiliency.policy_executed("res", PolicyType::Timeout);

        assert_eq!(aggregator.unit(POLICY_EXECUTED_VIEW.name()), Some(Unit::Count));
        assert_eq!(
            aggregator.description(POLICY_EXECUTED_VIEW.name()),
            Some(SharedString::const_str(POLICY_EXECUTED.description()))
        );

        let rows = aggregator.retrieve_data(POLICY_EXECUTED_VIEW.name());
        assert_eq!(rows.len(), 1);
        let tags: Vec<_> = rows[0].tags().iter().map(|l| (l.key(), l.value())).collect();
        assert_eq!(
            tags,
            vec![("app_id", "fakeID"), ("name", "res"), ("policy", "timeout"), ("namespace", "ns")]
        );
        assert_eq!(rows[0].count(), 1);
    }
}
