//! IDS telemetry - EVE log parsing, streaming queries, tailing and aggregation

mod aggregate;
mod eve;
mod ingest;
mod tail;

pub use aggregate::{
    aggregate_device_stats, aggregate_heatmap, DeviceTrafficStats, Heatmap, HeatmapCell,
    TimeBucket,
};
pub use eve::{parse_eve_timestamp, parse_line, Alert, EveRecord, Flow};
pub use ingest::{EveLogReader, IngestReport, MalformedRecord};
pub use tail::{EveTail, TailBatch};
