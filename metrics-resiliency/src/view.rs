use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use indexmap::IndexMap;
use metrics::{Key, KeyName, Recorder};
use parking_lot::RwLock;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::{
    measure::{
        Measure, CIRCUIT_BREAKER_OPEN, CIRCUIT_BREAKER_TOO_MANY_REQUESTS, POLICY_EXECUTED,
        POLICY_LOADED,
    },
    tags::{TagKey, TagSet},
};

/// How recorded values of a measure are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    /// Number of recorded events, grouped by tag combination.
    Count,
}

/// Binds a [`Measure`] to an ordered set of tag keys and an aggregation.
///
/// A view is named after its measure unless renamed with [`with_name`](View::with_name), which
/// allows several views to slice the same measure along different tags.  Only the tags listed in
/// the view are attached to the exported metric, in the order they are listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    name: &'static str,
    measure: Measure,
    tag_keys: &'static [TagKey],
    aggregation: Aggregation,
}

impl View {
    /// Creates a new `View`.
    pub const fn new(
        measure: Measure,
        tag_keys: &'static [TagKey],
        aggregation: Aggregation,
    ) -> Self {
        Self { name: measure.name(), measure, tag_keys, aggregation }
    }

    /// Creates a new `View` that counts events.
    pub const fn count(measure: Measure, tag_keys: &'static [TagKey]) -> Self {
        Self::new(measure, tag_keys, Aggregation::Count)
    }

    /// Renames this view.
    ///
    /// The name is what the view is exported and registered as.
    pub const fn with_name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Name of this view.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Measure this view aggregates.
    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// Tag keys this view groups by.
    pub fn tag_keys(&self) -> &'static [TagKey] {
        self.tag_keys
    }

    /// Aggregation applied to the measure.
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Builds the metric key for an event carrying `tags`.
    pub(crate) fn key(&self, tags: &TagSet) -> Key {
        Key::from_parts(KeyName::from_const_str(self.name), tags.labels_for(self.tag_keys))
    }
}

/// Counts loaded resiliency configurations.
pub const POLICY_LOADED_VIEW: View =
    View::count(POLICY_LOADED, &[TagKey::AppId, TagKey::Name, TagKey::Namespace]);

/// Counts policy executions, one per policy kind applied.
pub const POLICY_EXECUTED_VIEW: View = View::count(
    POLICY_EXECUTED,
    &[TagKey::AppId, TagKey::Name, TagKey::Policy, TagKey::Namespace],
);

/// Counts calls rejected by an open circuit breaker.
pub const CIRCUIT_BREAKER_OPEN_VIEW: View =
    View::count(CIRCUIT_BREAKER_OPEN, &[TagKey::AppId, TagKey::Component, TagKey::Namespace]);

/// Counts calls rejected by a half-open circuit breaker over its request quota.
pub const CIRCUIT_BREAKER_TOO_MANY_REQUESTS_VIEW: View = View::count(
    CIRCUIT_BREAKER_TOO_MANY_REQUESTS,
    &[TagKey::AppId, TagKey::Component, TagKey::Namespace],
);

/// Views registered by every resiliency recorder.
pub const DEFAULT_VIEWS: [View; 4] = [
    POLICY_LOADED_VIEW,
    POLICY_EXECUTED_VIEW,
    CIRCUIT_BREAKER_OPEN_VIEW,
    CIRCUIT_BREAKER_TOO_MANY_REQUESTS_VIEW,
];

/// Errors that could occur while registering views.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RegistrationError {
    /// A view with the same name but a different definition is already registered.
    #[error("cannot register view `{name}`: a different view with the same name exists")]
    Conflict {
        /// Name of the conflicting view.
        name: &'static str,
    },

    /// The view aggregates a measure that no recording call writes to.
    #[error("cannot register view `{view}`: measure `{measure}` is never recorded")]
    UnknownMeasure {
        /// Name of the view.
        view: &'static str,
        /// Name of the measure the view aggregates.
        measure: &'static str,
    },
}

/// A view as seen by the recording path.
///
/// The switch mirrors whether the view is currently registered, so that recording can skip
/// unregistered views with a single atomic load.
#[derive(Debug)]
pub(crate) struct Binding {
    view: View,
    registered: Arc<AtomicBool>,
}

impl Binding {
    pub(crate) fn view(&self) -> &View {
        &self.view
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct Views {
    registered: IndexMap<&'static str, View>,
    switches: HashMap<&'static str, Arc<AtomicBool>>,
}

impl Views {
    fn switch(&mut self, name: &'static str) -> &Arc<AtomicBool> {
        let registered = self.registered.contains_key(name);
        self.switches.entry(name).or_insert_with(|| Arc::new(AtomicBool::new(registered)))
    }
}

/// The set of registered views, keyed by name.
///
/// Registration is a set union: registering a view that is already present with an identical
/// definition is a successful no-op.  Views are described to the sink exactly once, when they are
/// first inserted.  Only registered views are recorded to.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: RwLock<Views>,
}

impl ViewRegistry {
    /// Creates an empty `ViewRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `views`, describing any new ones on `sink`.
    ///
    /// The batch is validated as a whole before anything is inserted, so on error no view from the
    /// batch is registered.  Returns the number of views that were newly registered.
    ///
    /// # Errors
    ///
    /// If a view conflicts with an already-registered view, or with another view in the same batch,
    /// an error is returned.
    pub fn register<'a, I, R>(&self, views: I, sink: &R) -> Result<usize, RegistrationError>
    where
        I: IntoIterator<Item = &'a View>,
        R: Recorder + ?Sized,
    {
        let mut views_w = self.views.write();

        let mut pending: Vec<&View> = Vec::new();
        for view in views {
            let existing = views_w
                .registered
                .get(view.name())
                .or_else(|| pending.iter().copied().find(|p| p.name() == view.name()))
                .cloned();

            match existing {
                Some(existing) if existing == *view => {}
                Some(_) => return Err(RegistrationError::Conflict { name: view.name() }),
                None => pending.push(view),
            }
        }

        for view in &pending {
            let measure = view.measure();
            sink.describe_counter(
                KeyName::from_const_str(view.name()),
                Some(measure.unit()),
                measure.shared_description(),
            );
            views_w.registered.insert(view.name(), (*view).clone());
            views_w.switch(view.name()).store(true, Ordering::Release);
            debug!(view = view.name(), tag_keys = ?view.tag_keys(), "registered view");
        }

        Ok(pending.len())
    }

    /// Removes a view, returning `true` if it was registered.
    ///
    /// Events are no longer recorded to the view once it is removed.  Values already written to
    /// the sink are left to the sink.  A later registration of the same view describes it again
    /// and resumes recording.
    pub fn unregister(&self, name: &str) -> bool {
        let mut views = self.views.write();
        let removed = views.registered.shift_remove(name).is_some();
        if let Some(switch) = views.switches.get(name) {
            switch.store(false, Ordering::Release);
        }
        if removed {
            debug!(view = name, "unregistered view");
        }
        removed
    }

    /// Gets a registered view by name.
    pub fn find(&self, name: &str) -> Option<View> {
        self.views.read().registered.get(name).cloned()
    }

    /// Whether or not a view with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.views.read().registered.contains_key(name)
    }

    /// Gets all registered views, in registration order.
    pub fn views(&self) -> Vec<View> {
        self.views.read().registered.values().cloned().collect()
    }

    /// Number of registered views.
    pub fn len(&self) -> usize {
        self.views.read().registered.len()
    }

    /// Whether or not any view is registered.
    pub fn is_empty(&self) -> bool {
        self.views.read().registered.is_empty()
    }

    /// Binds `view` to its registration state.
    ///
    /// The binding follows later calls to [`register`](ViewRegistry::register) and
    /// [`unregister`](ViewRegistry::unregister) for the view's name.
    pub(crate) fn bind(&self, view: &View) -> Binding {
        let registered = Arc::clone(self.views.write().switch(view.name()));
        Binding { view: view.clone(), registered }
    }
}
