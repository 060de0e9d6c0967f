//! Flow aggregation: device x time-bucket heatmap and per-device stats

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::telemetry::eve::Flow;

/// Width of one heatmap bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    secs: u64,
}

impl TimeBucket {
    pub const MINUTE: TimeBucket = TimeBucket { secs: 60 };
    pub const HOUR: TimeBucket = TimeBucket { secs: 3600 };

    /// Zero is bumped to one second.
    pub fn from_secs(secs: u64) -> Self {
        Self { secs: secs.max(1) }
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    /// Start of the bucket containing `ts`
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.secs as i64;
        let floored = ts.timestamp().div_euclid(width) * width;
        Utc.timestamp_opt(floored, 0).single().unwrap_or(ts)
    }
}

impl Default for TimeBucket {
    fn default() -> Self {
        Self::HOUR
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub device_ip: IpAddr,
    pub bucket_start: DateTime<Utc>,
    pub flow_count: usize,
}

/// Flow counts per (source device, time bucket)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
    pub bucket_secs: u64,
    /// Sorted by device, then bucket
    pub cells: Vec<HeatmapCell>,
    /// Flows with no source address or no timestamp
    pub unbucketed: usize,
}

impl Heatmap {
    pub fn count(&self, device_ip: IpAddr, bucket_start: DateTime<Utc>) -> usize {
        self.cells
            .iter()
            .find(|c| c.device_ip == device_ip && c.bucket_start == bucket_start)
            .map(|c| c.flow_count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.cells.iter().map(|c| c.flow_count).sum()
    }
}

/// Traffic summary for one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTrafficStats {
    pub total_flows: usize,
    /// Flows the IDS raised an alert on
    pub suspicious_flows: usize,
    pub total_bytes: u64,
    pub total_packets: u64,
}

pub fn aggregate_heatmap(flows: &[Flow], bucket: TimeBucket) -> Heatmap {
    let mut counts: BTreeMap<(IpAddr, DateTime<Utc>), usize> = BTreeMap::new();
    let mut unbucketed = 0usize;

    for flow in flows {
        match (flow.src_ip, flow.start) {
            (Some(ip), Some(start)) => *counts.entry((ip, bucket.floor(start))).or_insert(0) += 1,
            _ => unbucketed += 1,
        }
    }

    Heatmap {
        bucket_secs: bucket.secs(),
        cells: counts
            .into_iter()
            .map(|((device_ip, bucket_start), flow_count)| HeatmapCell {
                device_ip,
                bucket_start,
                flow_count,
            })
            .collect(),
        unbucketed,
    }
}

/// Stats over the flows whose source is `device_ip`
pub fn aggregate_device_stats(flows: &[Flow], device_ip: IpAddr) -> DeviceTrafficStats {
    flows
        .iter()
        .filter(|f| f.src_ip == Some(device_ip))
        .fold(DeviceTrafficStats::default(), |mut stats, flow| {
            stats.total_flows += 1;
            if flow.alerted {
                stats.suspicious_flows += 1;
            }
            stats.total_bytes = stats.total_bytes.saturating_add(flow.total_bytes());
            stats.total_packets = stats.total_packets.saturating_add(flow.total_packets());
            stats
        })
}
