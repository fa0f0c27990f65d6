//! Resiliency policy telemetry on top of the `metrics` facade.
//!
//! Services that guard their outbound calls with resiliency policies (timeouts, retries, and
//! circuit breakers) want to know how often those policies kick in.  This crate defines a small,
//! fixed set of counters for that purpose, and a recorder that the policy engine calls into
//! whenever something noteworthy happens.
//!
//! # Overview
//! Telemetry is described in three layers:
//!
//! - a [`Measure`] is a named, described quantity, such as "number of policies executed",
//! - a [`View`] binds a measure to the tag keys it is grouped by, and to an [`Aggregation`],
//! - a [`TagSet`] carries the tag values attached to a single event.
//!
//! Four views are defined, and registered by default:
//!
//! | view | tags |
//! |------|------|
//! | `resiliency/loaded` | `app_id`, `name`, `namespace` |
//! | `resiliency/count` | `app_id`, `name`, `policy`, `namespace` |
//! | `resiliency/circuitbreaker_open/count` | `app_id`, `component`, `namespace` |
//! | `resiliency/circuitbreaker_too_many_req/count` | `app_id`, `component`, `namespace` |
//!
//! Every view counts events: each recorded event increments the counter identified by the view
//! name and the projected tag values by exactly one.
//!
//! # Recording
//! The policy engine talks to a [`ResiliencyRecorder`].  The main implementation is
//! [`ResiliencyMetrics`], which starts out uninitialized and silently drops every event.  Once
//! [`init`](ResiliencyMetrics::init) has registered the views and published the identity of the
//! process, events are forwarded to the underlying [`metrics::Recorder`]:
//!
//! ```rust
//! use metrics_resiliency::{PolicyType, ResiliencyMetrics, ResiliencyRecorder};
//!
//! let resiliency = ResiliencyMetrics::new();
//!
//! // Dropped: not initialized yet.
//! resiliency.policy_loaded("my-resiliency", "default");
//!
//! resiliency.init("my-app", "default").expect("views conflict");
//! resiliency.policy_executed("my-resiliency", PolicyType::Retry);
//! resiliency.circuit_breaker_open("statestore");
//! ```
//!
//! By default, events go to whichever recorder is installed globally for the `metrics` crate, so
//! any exporter works out of the box.  A specific recorder can be supplied through
//! [`ResiliencyMetricsBuilder::sink`], and [`CountAggregator`] provides an in-process one that
//! can be queried directly.
//!
//! # Tag values
//! Tag values must be printable ASCII, and at most [`MAX_TAG_VALUE_LEN`] bytes long.  Events
//! carrying an invalid value are dropped: recording never fails, and never affects the request
//! path it observes.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod aggregator;
pub use self::aggregator::{CountAggregator, Row};

mod builder;
pub use self::builder::{GlobalRecorder, ResiliencyMetricsBuilder};

mod measure;
pub use self::measure::{
    Measure, CIRCUIT_BREAKER_OPEN, CIRCUIT_BREAKER_TOO_MANY_REQUESTS, POLICY_EXECUTED,
    POLICY_LOADED,
};

mod recorder;
pub use self::recorder::{
    ActiveResiliencyRecorder, Identity, NoopResiliencyRecorder, ResiliencyMetrics,
    ResiliencyRecorder,
};

mod tags;
pub use self::tags::{
    ParsePolicyTypeError, PolicyType, TagError, TagKey, TagSet, TagSetBuilder, MAX_TAG_VALUE_LEN,
};

mod view;
pub use self::view::{
    Aggregation, RegistrationError, View, ViewRegistry, CIRCUIT_BREAKER_OPEN_VIEW,
    CIRCUIT_BREAKER_TOO_MANY_REQUESTS_VIEW, DEFAULT_VIEWS, POLICY_EXECUTED_VIEW,
    POLICY_LOADED_VIEW,
};

#[cfg(test)]
mod test_util;
