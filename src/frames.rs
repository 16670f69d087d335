//! Read-only views over a decoded [`Recording`] for display layers.
//!
//! A display typically picks one sensor, maps its member channels onto
//! positions, and steps through the timestamps drawing one magnitude per
//! member. Everything here is plain indexing into the sample table.

use crate::types::{Recording, Sensor};

/// Which bounds to use when scaling a sensor's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeSource {
    /// The declared physical minimum and maximum
    #[default]
    SensorLimits,
    /// The smallest and largest value actually decoded
    DataLimits,
}

/// Controls how [`Recording::frames`] walks the timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Keep every n-th timestamp; 0 is treated as 1
    pub downsample: usize,
    /// Only the first n member channels of the sensor
    pub channel_limit: Option<usize>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            downsample: 1,
            channel_limit: None,
        }
    }
}

/// One timestamp's values for the chosen member channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: usize,
    pub values: Vec<f64>,
}

/// Iterator returned by [`Recording::frames`].
pub struct Frames<'r> {
    recording: &'r Recording,
    sensor: &'r Sensor,
    limit: usize,
    step: usize,
    next: usize,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.next >= self.recording.timestamps.len() {
            return None;
        }
        let timestamp = self.next;
        self.next = self.next.saturating_add(self.step);

        let values = self.recording.sensor_row(self.sensor, timestamp, self.limit)?;
        Some(Frame { timestamp, values })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.recording.timestamps.len();
        let left = if self.next >= total {
            0
        } else {
            (total - self.next + self.step - 1) / self.step
        };
        (0, Some(left))
    }
}

impl Sensor {
    /// Value bounds for colour or axis scaling.
    ///
    /// `DataLimits` is `None` until at least one sample was decoded.
    pub fn range(&self, source: RangeSource) -> Option<(f64, f64)> {
        match source {
            RangeSource::SensorLimits => Some((self.physical_min, self.physical_max)),
            RangeSource::DataLimits => Some((self.data_min?, self.data_max?)),
        }
    }

    /// How many of `count` display slots this sensor can fill.
    pub fn usable_channels(&self, count: usize) -> usize {
        count.min(self.indices.len())
    }
}

impl Recording {
    /// Values of the first `limit` member channels of `sensor` at
    /// `timestamp`, in member order.
    ///
    /// `None` if the timestamp does not exist or the sensor refers to a
    /// channel outside this recording.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # let bytes = edfsensors::doctest_utils::montage_bytes()?;
    /// let recording = edfsensors::parse(&bytes)?;
    /// let eeg = recording.sensors.last().unwrap();
    ///
    /// let first_two = recording.sensor_row(eeg, 0, 2).unwrap();
    /// assert_eq!(first_two.len(), 2);
    /// # Ok::<(), edfsensors::EdfError>(())
    /// ```
    pub fn sensor_row(&self, sensor: &Sensor, timestamp: usize, limit: usize) -> Option<Vec<f64>> {
        let row = self.timestamps.row(timestamp)?;
        sensor
            .indices
            .iter()
            .take(limit)
            .map(|&channel| row.get(channel).copied())
            .collect()
    }

    /// Walks timestamps `0, d, 2d, ...` yielding the sensor's values at each.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edfsensors::FrameOptions;
    ///
    /// # let bytes = edfsensors::doctest_utils::montage_bytes()?;
    /// let recording = edfsensors::parse(&bytes)?;
    /// let sensor = recording.sensors.last().unwrap();
    ///
    /// let options = FrameOptions {
    ///     downsample: recording.default_downsample(edfsensors::DEFAULT_TARGET_FRAMES),
    ///     channel_limit: Some(3),
    /// };
    /// for frame in recording.frames(sensor, &options) {
    ///     assert!(frame.values.len() <= 3);
    /// }
    /// # Ok::<(), edfsensors::EdfError>(())
    /// ```
    pub fn frames<'r>(&'r self, sensor: &'r Sensor, options: &FrameOptions) -> Frames<'r> {
        Frames {
            recording: self,
            sensor,
            limit: options.channel_limit.unwrap_or(usize::MAX),
            step: options.downsample.max(1),
            next: 0,
        }
    }

    /// Downsample factor that leaves about `target_frames` frames, at least 1.
    pub fn default_downsample(&self, target_frames: usize) -> usize {
        (self.timestamps.len() / target_frames.max(1)).max(1)
    }

    /// Index into `sensors` of the sensor whose member count is closest to
    /// `count`. An exact match wins; otherwise the smallest difference, and
    /// the earlier sensor on ties.
    pub fn closest_sensor(&self, count: usize) -> Option<usize> {
        self.sensors
            .iter()
            .enumerate()
            .min_by_key(|(_, sensor)| sensor.indices.len().abs_diff(count))
            .map(|(position, _)| position)
    }
}
