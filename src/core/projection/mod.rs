// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational projection of recognized events.
//!
//! Every named output is a small SQLite file derived from the analysis root
//! store (see [`DbInfo`]). Projectors write them, quantifiers summarise them
//! in a second pass, readers and charts open them read-only afterwards.

pub mod chart;
pub mod connection;
pub mod db_info;
pub mod filter;
pub mod network;
pub mod projector;
pub mod quantifier;
pub mod reader;
pub mod schema;

pub use chart::{
    ChartArgs, ChartBuilder, ChartData, ChartInfo, ChartParameter, ChartRequest, ChartSeries, FnChart,
};
pub use connection::{attach_name, DbConnection};
pub use db_info::{short_name, DbInfo, StoreRole};
pub use filter::{apply_filter, read_selection, reset_filter, FilterExpression, FILTER_TABLE};
pub use network::{NetworkInfo, Partition, LINKS_ALIAS, PARTITIONS_TABLE};
pub use projector::{EventClock, ProjectionContext, Projector, ProjectorInfo, SCHEMA_TABLE};
pub use quantifier::{QuantifierInfo, QuantifierOutcome, QuantifyFn};
pub use reader::StoreReader;
pub use schema::{
    ColumnRole, ProjectionField, ProjectionSchema, ScalarType, EVENT_ID_FIELD, MAX_SCALE,
};
