use std::fmt;

use chrono::NaiveDateTime;

use crate::utils::format_value;

/// The fixed 252-byte block at the start of every EDF file.
///
/// The decoder never depends on these fields: each one is parsed leniently
/// and left empty (or `None`) when it does not hold what EDF says it should.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preamble {
    pub version: String,
    pub patient: String,
    pub recording: String,
    pub start: Option<NaiveDateTime>,
    pub header_bytes: Option<usize>,
    pub reserved: String,
    pub data_records: Option<i64>,
    /// Duration of one data record in seconds
    pub record_duration: Option<f64>,
}

/// One declared signal of the file, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub index: usize,
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i64,
    pub digital_max: i64,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl Channel {
    pub(crate) fn new(index: usize, label: String) -> Self {
        Channel {
            index,
            label,
            transducer: String::new(),
            physical_dimension: String::new(),
            physical_min: 0.0,
            physical_max: 0.0,
            digital_min: 0,
            digital_max: 0,
            prefilter: String::new(),
            samples_per_record: 0,
        }
    }

    /// Samples per second, given the duration of one data record.
    pub fn sample_rate(&self, record_duration: f64) -> Option<f64> {
        (record_duration > 0.0).then(|| self.samples_per_record as f64 / record_duration)
    }

    pub(crate) fn sensor_key(&self) -> SensorKey {
        SensorKey {
            transducer: self.transducer.clone(),
            physical_dimension: self.physical_dimension.clone(),
            physical_min: float_key(self.physical_min),
            physical_max: float_key(self.physical_max),
            digital_min: self.digital_min,
            digital_max: self.digital_max,
        }
    }
}

/// Identity of a sensor: six metadata fields compared exactly.
///
/// Floats are keyed by parsed value, so `"100"` and `"100.0"` agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SensorKey {
    transducer: String,
    physical_dimension: String,
    physical_min: u64,
    physical_max: u64,
    digital_min: i64,
    digital_max: i64,
}

fn float_key(v: f64) -> u64 {
    // -0.0 and 0.0 parse from different text but are the same value
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// A group of channels sharing one calibration.
///
/// `indices` lists the member channels in the order they were declared.
/// `data_min` and `data_max` track every decoded value of every member and
/// stay `None` until the first sample arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i64,
    pub digital_max: i64,
    pub indices: Vec<usize>,
    pub data_min: Option<f64>,
    pub data_max: Option<f64>,
    ratio: f64,
}

impl Sensor {
    /// Creates the group for `channel`, fixing the conversion ratio from its
    /// ranges. Callers reject an empty digital range beforehand.
    pub(crate) fn from_channel(channel: &Channel) -> Self {
        let ratio = (channel.physical_max - channel.physical_min)
            / (channel.digital_max - channel.digital_min) as f64;

        Sensor {
            transducer: channel.transducer.clone(),
            physical_dimension: channel.physical_dimension.clone(),
            physical_min: channel.physical_min,
            physical_max: channel.physical_max,
            digital_min: channel.digital_min,
            digital_max: channel.digital_max,
            indices: vec![channel.index],
            data_min: None,
            data_max: None,
            ratio,
        }
    }

    /// Digital-to-analog conversion ratio, physical units per digital step.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Converts a raw sample code to the sensor's physical unit.
    pub fn to_analog(&self, raw: i16) -> f64 {
        raw as f64 * self.ratio
    }

    pub fn channel_count(&self) -> usize {
        self.indices.len()
    }

    pub(crate) fn observe(&mut self, value: f64) {
        if self.data_max.map_or(true, |max| value > max) {
            self.data_max = Some(value);
        }
        if self.data_min.map_or(true, |min| value < min) {
            self.data_min = Some(value);
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transducer = if self.transducer.is_empty() {
            "<untyped>"
        } else {
            &self.transducer
        };
        let bound = |v: Option<f64>| v.map(format_value).unwrap_or_else(|| "-".to_string());

        write!(
            f,
            "{}  |  Range {} / {} {}  |  {} Sensor(s)  |  Min / Max {} / {}",
            transducer,
            format_value(self.physical_min),
            format_value(self.physical_max),
            self.physical_dimension,
            self.indices.len(),
            bound(self.data_min),
            bound(self.data_max),
        )
    }
}

/// Per-timestamp analog values, one column per channel.
///
/// Rows are stored back to back; a new row starts zeroed and is shared by
/// every channel that reaches that timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    width: usize,
    rows: usize,
    values: Vec<f64>,
}

impl SampleTable {
    pub(crate) fn new(width: usize) -> Self {
        SampleTable {
            width,
            rows: 0,
            values: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self) {
        self.values.resize(self.values.len() + self.width, 0.0);
        self.rows += 1;
    }

    pub(crate) fn set(&mut self, timestamp: usize, channel: usize, value: f64) {
        self.values[timestamp * self.width + channel] = value;
    }

    /// Number of timestamps
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of channels per row
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, timestamp: usize) -> Option<&[f64]> {
        if timestamp >= self.rows {
            return None;
        }
        let start = timestamp * self.width;
        Some(&self.values[start..start + self.width])
    }

    /// The value of `channel` at `timestamp`.
    pub fn value(&self, timestamp: usize, channel: usize) -> Option<f64> {
        self.row(timestamp)?.get(channel).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).filter_map(move |t| self.row(t))
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}

/// Everything decoded from one EDF byte stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub preamble: Preamble,
    pub channels: Vec<Channel>,
    /// Sensors ordered by ascending member count, ties in discovery order
    pub sensors: Vec<Sensor>,
    pub timestamps: SampleTable,
}

impl Recording {
    /// Splits off the timestamp table and the sorted sensor list.
    pub fn into_parts(self) -> (SampleTable, Vec<Sensor>) {
        (self.timestamps, self.sensors)
    }

    /// Usable record duration from the preamble, if it is positive.
    fn record_duration(&self) -> Option<f64> {
        self.preamble.record_duration.filter(|d| *d > 0.0)
    }

    /// Total covered time: decoded records times the record duration.
    pub fn duration_seconds(&self) -> Option<f64> {
        let duration = self.record_duration()?;
        let per_record = self.rows_per_record();
        if per_record == 0 {
            return Some(0.0);
        }
        let records = (self.timestamps.len() + per_record - 1) / per_record;
        Some(records as f64 * duration)
    }

    /// Timestamps per second, set by the fastest channel.
    pub fn timestamp_rate(&self) -> Option<f64> {
        let duration = self.record_duration()?;
        Some(self.rows_per_record() as f64 / duration)
    }

    fn rows_per_record(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.samples_per_record)
            .max()
            .unwrap_or(0)
    }
}
