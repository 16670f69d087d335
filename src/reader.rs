use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, trace, warn};

use crate::error::{EdfError, FormatError, Result};
use crate::types::{Channel, Preamble, Recording, SampleTable, Sensor, SensorKey};
use crate::utils::{decode_sample, field_text, parse_decimal, parse_integer, parse_start};
use crate::{
    EDF_DIMENSION_WIDTH, EDF_LABEL_WIDTH, EDF_NUMBER_WIDTH, EDF_PREAMBLE_SIZE,
    EDF_PREFILTER_WIDTH, EDF_RESERVED_WIDTH, EDF_SAMPLE_BYTES, EDF_SIGNAL_COUNT_WIDTH,
    EDF_TRANSDUCER_WIDTH,
};

/// Single-pass EDF decoder over an in-memory byte stream
///
/// Decoding runs in two phases over one forward-only cursor:
///
/// 1. The signal header, starting at byte 252. Fields are stored
///    column-major (every label, then every transducer, then every unit ...),
///    and channels whose calibration fields match exactly are grouped into
///    one [`Sensor`] as soon as their digital maximum is known.
/// 2. The data records, until the end of the buffer. Each record holds, for
///    every channel in order, `samples_per_record` little-endian 16-bit
///    samples. Each sample is scaled by its sensor's ratio and written to the
///    channel's column of the next timestamp row for that channel.
///
/// The leading 252 bytes are read into a [`Preamble`] on the side; nothing
/// in them is required to be valid.
///
/// Any malformed input aborts the whole parse with [`EdfError::Format`].
///
/// # Examples
///
/// ```rust
/// use edfsensors::EdfParser;
///
/// # let bytes = edfsensors::doctest_utils::montage_bytes()?;
/// let recording = EdfParser::new(&bytes).parse()?;
///
/// for sensor in &recording.sensors {
///     println!("{}", sensor);
/// }
/// println!("{} timestamps", recording.timestamps.len());
///
/// // Value of the first member of the largest sensor at timestamp 0
/// let sensor = recording.sensors.last().unwrap();
/// let value = recording.timestamps.value(0, sensor.indices[0]);
/// assert!(value.is_some());
/// # Ok::<(), edfsensors::EdfError>(())
/// ```
pub struct EdfParser<'a> {
    data: &'a [u8],
    /// Offset of the next unread byte
    cursor: usize,
}

impl<'a> EdfParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        EdfParser {
            data,
            cursor: EDF_PREAMBLE_SIZE,
        }
    }

    /// Decodes the whole buffer.
    ///
    /// # Errors
    ///
    /// * `FormatError::Truncated` - a header field runs past the end of data
    /// * `FormatError::InvalidNumber` - a numeric header field does not parse
    /// * `FormatError::InvalidSignalCount` / `InvalidSampleCount` - negative counts
    /// * `FormatError::EmptyDigitalRange` - digital minimum equals maximum
    /// * `FormatError::IncompleteRecord` - the last data record is cut short
    /// * `FormatError::RecordTooLarge` - the declared record size does not fit in memory
    /// * `FormatError::UnconsumableData` - data follows a header whose records are empty
    pub fn parse(mut self) -> Result<Recording> {
        let preamble = self.read_preamble()?;
        let (channels, mut sensors, membership) = self.parse_header()?;
        let timestamps = self.decode_records(&channels, &mut sensors, &membership)?;

        // Stable: sensors with equal member counts keep discovery order
        sensors.sort_by_key(|s| s.indices.len());

        Ok(Recording {
            preamble,
            channels,
            sensors,
            timestamps,
        })
    }

    fn read_preamble(&self) -> Result<Preamble> {
        if self.data.len() < EDF_PREAMBLE_SIZE {
            return Err(FormatError::Truncated {
                offset: 0,
                needed: EDF_PREAMBLE_SIZE,
                available: self.data.len(),
            }
            .into());
        }

        let text = |start: usize, end: usize| field_text(&self.data[start..end]);

        let date = text(168, 176);
        let time = text(176, 184);
        let start = parse_start(&date, &time);
        if start.is_none() {
            warn!("unrecognised start date/time in preamble: {:?} {:?}", date, time);
        }

        let header_bytes = parse_integer(&text(184, 192)).and_then(|n| usize::try_from(n).ok());
        let data_records = parse_integer(&text(236, 244));
        let record_duration = parse_decimal(&text(244, 252));
        if record_duration.is_none() {
            warn!("unrecognised record duration in preamble: {:?}", text(244, 252));
        }

        Ok(Preamble {
            version: text(0, 8),
            patient: text(8, 88),
            recording: text(88, 168),
            start,
            header_bytes,
            reserved: text(192, 236),
            data_records,
            record_duration,
        })
    }

    /// Phase 1. Returns the channels, the sensors in discovery order, and
    /// for each channel the position of its sensor in that list.
    fn parse_header(&mut self) -> Result<(Vec<Channel>, Vec<Sensor>, Vec<usize>)> {
        let declared = self.read_integer("number of signals", EDF_SIGNAL_COUNT_WIDTH)?;
        let count = usize::try_from(declared)
            .map_err(|_| FormatError::InvalidSignalCount(declared))?;

        let mut channels = Vec::with_capacity(count);
        for index in 0..count {
            let label = self.read_text(EDF_LABEL_WIDTH)?;
            channels.push(Channel::new(index, label));
        }

        for channel in channels.iter_mut() {
            channel.transducer = self.read_text(EDF_TRANSDUCER_WIDTH)?;
        }
        for channel in channels.iter_mut() {
            channel.physical_dimension = self.read_text(EDF_DIMENSION_WIDTH)?;
        }
        for channel in channels.iter_mut() {
            channel.physical_min = self.read_decimal("physical minimum", EDF_NUMBER_WIDTH)?;
        }
        for channel in channels.iter_mut() {
            channel.physical_max = self.read_decimal("physical maximum", EDF_NUMBER_WIDTH)?;
        }
        for channel in channels.iter_mut() {
            channel.digital_min = self.read_integer("digital minimum", EDF_NUMBER_WIDTH)?;
        }

        let mut sensors: Vec<Sensor> = Vec::new();
        let mut groups: HashMap<SensorKey, usize> = HashMap::new();
        let mut membership = Vec::with_capacity(count);

        for channel in channels.iter_mut() {
            channel.digital_max = self.read_integer("digital maximum", EDF_NUMBER_WIDTH)?;

            if channel.digital_max == channel.digital_min {
                return Err(FormatError::EmptyDigitalRange {
                    channel: channel.index,
                    value: channel.digital_min,
                }
                .into());
            }

            let position = match groups.entry(channel.sensor_key()) {
                Entry::Occupied(entry) => {
                    let position = *entry.get();
                    sensors[position].indices.push(channel.index);
                    position
                }
                Entry::Vacant(entry) => {
                    sensors.push(Sensor::from_channel(channel));
                    *entry.insert(sensors.len() - 1)
                }
            };
            membership.push(position);
        }

        for channel in channels.iter_mut() {
            channel.prefilter = self.read_text(EDF_PREFILTER_WIDTH)?;
        }

        for channel in channels.iter_mut() {
            let declared = self.read_integer("samples per record", EDF_NUMBER_WIDTH)?;
            channel.samples_per_record = usize::try_from(declared).map_err(|_| {
                FormatError::InvalidSampleCount {
                    channel: channel.index,
                    count: declared,
                }
            })?;
        }

        self.skip(EDF_RESERVED_WIDTH * count)?;

        debug!(
            "parsed EDF header: {} channels in {} sensors, data starts at byte {}",
            channels.len(),
            sensors.len(),
            self.cursor
        );

        Ok((channels, sensors, membership))
    }

    /// Phase 2. Runs to the end of the buffer, one data record at a time.
    fn decode_records(
        &mut self,
        channels: &[Channel],
        sensors: &mut [Sensor],
        membership: &[usize],
    ) -> Result<SampleTable> {
        let mut timestamps = SampleTable::new(channels.len());
        // Next timestamp index of each channel
        let mut next_timestamp = vec![0usize; channels.len()];

        let (run_sizes, record_size) = record_layout(channels)?;
        let mut records = 0usize;

        while self.remaining() > 0 {
            if record_size == 0 {
                return Err(FormatError::UnconsumableData {
                    remaining: self.remaining(),
                }
                .into());
            }
            trace!("decoding data record {} at byte {}", records, self.cursor);

            for (channel, &needed) in channels.iter().zip(&run_sizes) {
                let available = self.remaining();
                if needed > available {
                    return Err(FormatError::IncompleteRecord {
                        channel: channel.index,
                        offset: self.cursor,
                        needed,
                        available,
                    }
                    .into());
                }

                let run = self.take(needed)?;
                let sensor = &mut sensors[membership[channel.index]];
                let cursor = &mut next_timestamp[channel.index];

                for pair in run.chunks_exact(EDF_SAMPLE_BYTES) {
                    let timestamp = *cursor;
                    *cursor += 1;

                    if timestamp == timestamps.len() {
                        timestamps.push_row();
                    }

                    let analog = sensor.to_analog(decode_sample([pair[0], pair[1]]));
                    timestamps.set(timestamp, channel.index, analog);
                    sensor.observe(analog);
                }
            }
            records += 1;
        }

        debug!(
            "decoded {} data records into {} timestamps",
            records,
            timestamps.len()
        );
        Ok(timestamps)
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(FormatError::Truncated {
                offset: self.cursor,
                needed: len,
                available,
            }
            .into());
        }
        let data: &'a [u8] = self.data;
        let bytes = &data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn read_text(&mut self, len: usize) -> Result<String> {
        Ok(field_text(self.take(len)?))
    }

    fn read_integer(&mut self, field: &'static str, len: usize) -> Result<i64> {
        let offset = self.cursor;
        let text = self.read_text(len)?;
        parse_integer(&text).ok_or_else(|| FormatError::InvalidNumber { field, offset, text }.into())
    }

    fn read_decimal(&mut self, field: &'static str, len: usize) -> Result<f64> {
        let offset = self.cursor;
        let text = self.read_text(len)?;
        parse_decimal(&text).ok_or_else(|| FormatError::InvalidNumber { field, offset, text }.into())
    }
}

/// Decodes an in-memory EDF byte stream.
///
/// Shorthand for `EdfParser::new(data).parse()`.
pub fn parse(data: &[u8]) -> Result<Recording> {
    EdfParser::new(data).parse()
}

/// Reads and decodes an EDF file.
///
/// # Errors
///
/// * `EdfError::FileNotFound` - the path does not exist
/// * `EdfError::Io` - any other failure reading the file
/// * `EdfError::Format` - the contents are not a decodable EDF stream
///
/// # Examples
///
/// ```rust
/// # edfsensors::doctest_utils::create_montage_file("recording.edf")?;
/// let recording = edfsensors::open("recording.edf")?;
/// println!("{} sensors", recording.sensors.len());
///
/// match edfsensors::open("nonexistent.edf") {
///     Err(edfsensors::EdfError::FileNotFound(msg)) => println!("File not found: {}", msg),
///     other => println!("Unexpected: {:?}", other.map(|r| r.sensors.len())),
/// }
/// # std::fs::remove_file("recording.edf").ok();
/// # Ok::<(), edfsensors::EdfError>(())
/// ```
pub fn open<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EdfError::FileNotFound(format!("{}: {}", path.display(), e)),
        _ => EdfError::Io(e),
    })?;

    debug!("read {} bytes from {}", data.len(), path.display());
    parse(&data)
}

/// Byte length of each channel's run within a data record, and their sum.
fn record_layout(channels: &[Channel]) -> Result<(Vec<usize>, usize)> {
    let mut runs = Vec::with_capacity(channels.len());
    let mut total = 0usize;
    for channel in channels {
        let too_large = || FormatError::RecordTooLarge {
            channel: channel.index,
        };
        let run = channel
            .samples_per_record
            .checked_mul(EDF_SAMPLE_BYTES)
            .ok_or_else(too_large)?;
        total = total.checked_add(run).ok_or_else(too_large)?;
        runs.push(run);
    }
    Ok((runs, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-laid header so the byte offsets are independent of the writer.
    fn header(fields: &[(&str, usize)]) -> Vec<u8> {
        let mut bytes = vec![b' '; EDF_PREAMBLE_SIZE];
        bytes[0] = b'0';
        for (text, width) in fields {
            let mut field = vec![b' '; *width];
            field[..text.len()].copy_from_slice(text.as_bytes());
            bytes.extend_from_slice(&field);
        }
        bytes
    }

    fn single_channel(digital: (&str, &str), samples: &str) -> Vec<u8> {
        header(&[
            ("1", 4),
            ("Fp1", 16),
            ("AgAgCl", 80),
            ("uV", 8),
            ("-100", 8),
            ("100", 8),
            (digital.0, 8),
            (digital.1, 8),
            ("HP:0.1Hz", 80),
            (samples, 8),
            ("", 32),
        ])
    }

    #[test]
    fn test_single_channel_header() {
        let mut bytes = single_channel(("-2048", "2047"), "2");
        bytes.extend_from_slice(&[1, 0, 0xff, 0xff]);

        let recording = parse(&bytes).unwrap();
        let channel = &recording.channels[0];
        assert_eq!(channel.label, "Fp1");
        assert_eq!(channel.transducer, "AgAgCl");
        assert_eq!(channel.prefilter, "HP:0.1Hz");
        assert_eq!(channel.samples_per_record, 2);

        let ratio = 200.0 / 4095.0;
        assert_eq!(recording.timestamps.len(), 2);
        assert!((recording.timestamps.value(0, 0).unwrap() - ratio).abs() < 1e-12);
        assert!((recording.timestamps.value(1, 0).unwrap() + ratio).abs() < 1e-12);
        assert_eq!(recording.preamble.version, "0");
    }

    #[test]
    fn test_short_preamble_is_truncated() {
        let err = parse(&[b' '; 100]).unwrap_err();
        assert!(matches!(
            err,
            EdfError::Format(FormatError::Truncated { offset: 0, needed: 252, available: 100 })
        ));
    }

    #[test]
    fn test_invalid_number_reports_offset() {
        let bytes = single_channel(("low", "2047"), "2");
        match parse(&bytes).unwrap_err() {
            EdfError::Format(FormatError::InvalidNumber { field, offset, text }) => {
                assert_eq!(field, "digital minimum");
                assert_eq!(offset, 252 + 4 + 16 + 80 + 8 + 8 + 8);
                assert_eq!(text, "low");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_digital_range_fails() {
        let bytes = single_channel(("7", "7"), "2");
        let err = parse(&bytes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid file format: channel 0 has digital minimum equal to digital maximum (7)"
        );
    }

    #[test]
    fn test_negative_counts_fail() {
        let bytes = header(&[("-1", 4)]);
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            EdfError::Format(FormatError::InvalidSignalCount(-1))
        ));

        let bytes = single_channel(("-2048", "2047"), "-3");
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            EdfError::Format(FormatError::InvalidSampleCount { channel: 0, count: -3 })
        ));
    }

    #[test]
    fn test_missing_filler_is_truncated() {
        let mut bytes = single_channel(("-2048", "2047"), "2");
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            EdfError::Format(FormatError::Truncated { needed: 32, available: 22, .. })
        ));
    }

    #[test]
    fn test_no_signals() {
        let bytes = header(&[("0", 4)]);
        let recording = parse(&bytes).unwrap();
        assert!(recording.sensors.is_empty());
        assert!(recording.timestamps.is_empty());

        let mut bytes = header(&[("0", 4)]);
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            EdfError::Format(FormatError::UnconsumableData { remaining: 2 })
        ));
    }

    #[test]
    fn test_zero_samples_per_record() {
        let bytes = single_channel(("-2048", "2047"), "0");
        let recording = parse(&bytes).unwrap();
        assert!(recording.timestamps.is_empty());
        assert_eq!(recording.sensors[0].data_min, None);

        let mut bytes = single_channel(("-2048", "2047"), "0");
        bytes.push(0);
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            EdfError::Format(FormatError::UnconsumableData { remaining: 1 })
        ));
    }

    #[test]
    fn test_incomplete_record() {
        let mut bytes = single_channel(("-2048", "2047"), "2");
        let data_start = bytes.len();
        bytes.extend_from_slice(&[1, 0, 2, 0, 3, 0]);

        match parse(&bytes).unwrap_err() {
            EdfError::Format(FormatError::IncompleteRecord { channel, offset, needed, available }) => {
                assert_eq!(channel, 0);
                assert_eq!(offset, data_start + 4);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_record_layout_overflow() {
        let mut first = Channel::new(0, "a".to_string());
        first.samples_per_record = 3;
        let mut second = Channel::new(1, "b".to_string());
        second.samples_per_record = 5;
        let (runs, total) = record_layout(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(runs, vec![6, 10]);
        assert_eq!(total, 16);

        second.samples_per_record = usize::MAX;
        assert!(matches!(
            record_layout(&[first.clone(), second]).unwrap_err(),
            EdfError::Format(FormatError::RecordTooLarge { channel: 1 })
        ));

        let mut third = Channel::new(2, "c".to_string());
        third.samples_per_record = usize::MAX / 2;
        assert!(matches!(
            record_layout(&[first, third]).unwrap_err(),
            EdfError::Format(FormatError::RecordTooLarge { channel: 2 })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = open("definitely/not/here.edf").unwrap_err();
        assert!(matches!(err, EdfError::FileNotFound(_)));
        assert!(!err.is_format_error());
    }
}
