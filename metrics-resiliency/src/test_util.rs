use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::debugging::{DebugValue, Snapshotter};
use parking_lot::Mutex;
use std::{io, sync::Arc};

/// Records the names of described counters and drops everything else.
#[derive(Default)]
pub struct DescribeLog {
    described: Mutex<Vec<String>>,
}

impl DescribeLog {
    pub fn described(&self) -> Vec<String> {
        self.described.lock().clone()
    }
}

impl Recorder for DescribeLog {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        self.described.lock().push(key.as_str().to_owned());
    }
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::noop()
    }
    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }
    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// A counter value observed through a `Snapshotter`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Counted {
    name: String,
    tags: Vec<(String, String)>,
    count: u64,
}

impl Counted {
    pub fn new(name: &str, tags: &[(&str, &str)], count: u64) -> Self {
        let tags = tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { name: name.to_owned(), tags, count }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub fn counters(snapshotter: &Snapshotter) -> Vec<Counted> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(ckey, _, _, value)| match value {
            DebugValue::Counter(count) => {
                let key = ckey.key();
                let tags = key
                    .labels()
                    .map(|label| (label.key().to_owned(), label.value().to_owned()))
                    .collect();
                Some(Counted { name: key.name().to_owned(), tags, count })
            }
            _ => None,
        })
        .collect()
}

/// Log output captured from a `tracing_subscriber` fmt subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
