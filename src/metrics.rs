use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::MAX_PRECISION;
use crate::data_models::{Field, SensorRecord};

const WATT_HOURS_PER_KWH: f64 = 1000.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Summary statistics for one measured field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation; 0 for a single value.
    pub std: f64,
}

impl FieldStats {
    /// `None` for an empty input.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64> + Clone,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in values.clone() {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        if count == 0 {
            return None;
        }

        let avg = sum / count as f64;
        let variance = values
            .into_iter()
            .map(|x| (x - avg).powi(2))
            .sum::<f64>()
            / count as f64;

        Some(Self {
            // Float summation can drift a hair outside [min, max] for near-identical values
            avg: avg.max(min).min(max),
            min,
            max,
            std: variance.sqrt(),
        })
    }

    fn rounded(&self, decimals: u32) -> Self {
        Self {
            avg: round_to(self.avg, decimals),
            std: round_to(self.std, decimals),
            ..*self
        }
    }
}

/// Aggregate over the valid records of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub voltage: FieldStats,
    pub current: FieldStats,
    pub temperature: FieldStats,
    pub total_energy_kwh: f64,
    /// Hour bucket containing the single highest power reading.
    pub peak_power_hour: NaiveDateTime,
}

impl MetricsSummary {
    /// Copy with `avg`, `std` and `total_energy_kwh` rounded to `decimals` places.
    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            voltage: self.voltage.rounded(decimals),
            current: self.current.rounded(decimals),
            temperature: self.temperature.rounded(decimals),
            total_energy_kwh: round_to(self.total_energy_kwh, decimals),
            peak_power_hour: self.peak_power_hour,
        }
    }
}

/// Stateless aggregator from a set of valid records to a [`MetricsSummary`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` ("no data") for an empty slice. The input is never reordered.
    pub fn calculate(&self, records: &[SensorRecord]) -> Option<MetricsSummary> {
        let field = |f: Field| FieldStats::from_values(records.iter().map(move |r| r.value(f)));

        Some(MetricsSummary {
            voltage: field(Field::Voltage)?,
            current: field(Field::Current)?,
            temperature: field(Field::Temperature)?,
            total_energy_kwh: total_energy_kwh(records),
            peak_power_hour: peak_power_hour(records)?,
        })
    }
}

/// Record indices ordered by timestamp; ties keep input order.
fn time_order(records: &[SensorRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| records[i].timestamp);
    order
}

/// Trapezoidal integration of power over time, in kWh.
pub fn total_energy_kwh(records: &[SensorRecord]) -> f64 {
    let order = time_order(records);
    let watt_hours: f64 = order
        .windows(2)
        .map(|pair| {
            let (a, b) = (&records[pair[0]], &records[pair[1]]);
            let elapsed_hours =
                (b.timestamp - a.timestamp).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR;
            (a.power + b.power) / 2.0 * elapsed_hours
        })
        .sum();
    watt_hours / WATT_HOURS_PER_KWH
}

/// Hour-truncated timestamp of the maximum power reading; earliest wins on ties.
pub fn peak_power_hour(records: &[SensorRecord]) -> Option<NaiveDateTime> {
    records
        .iter()
        .reduce(|best, r| {
            if r.power > best.power || (r.power == best.power && r.timestamp < best.timestamp) {
                r
            } else {
                best
            }
        })
        .map(|peak| truncate_to_hour(peak.timestamp))
}

pub fn truncate_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    NaiveTime::from_hms_opt(ts.hour(), 0, 0)
        .map(|hour| ts.date().and_time(hour))
        .unwrap_or(ts)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_PRECISION) as i32);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
