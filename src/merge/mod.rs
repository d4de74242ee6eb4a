//! GTFS feed merge engine.
//!
//! A merge runs in four phases:
//!
//! - **validate**: check the inputs and order feeds newest first ([`job`]).
//! - **strategy**: for reconciling merges, compare the two feeds' trips and
//!   services and decide how the older feed's rows are kept ([`strategy`]).
//! - **tables**: merge each table in dependency order. Every row goes
//!   through a table rule ([`rules`]) that produces a [`RowPlan`], then
//!   reference resolution and key checks ([`line`]).
//! - **publish**: write the buffered tables to a temporary archive next to
//!   the destination and rename it into place ([`writer`]).
//!
//! # Determinism
//!
//! The same feeds and configuration always produce the same archive:
//!
//! - Tables are processed in schema order; rows in input order.
//! - Feeds are ordered by first service date, newest first, ties kept in
//!   input order.
//! - Result sets and maps are ordered collections.

pub mod context;
pub mod frame;
pub mod job;
pub mod line;
pub mod progress;
pub mod result;
pub mod rules;
pub mod strategy;
pub mod table;
pub mod writer;

pub use frame::{RowFrame, RowPlan, SkipReason};
pub use job::merge_feeds;
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
pub use result::{IdConflict, MergeResult, ScopedKey};
pub use strategy::{MergeStrategy, StrategyPlan};
