use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::debug;

use crate::error::{EdfError, Result};
use crate::{
    EDF_DIMENSION_WIDTH, EDF_LABEL_WIDTH, EDF_NUMBER_WIDTH, EDF_PREAMBLE_SIZE,
    EDF_PREFILTER_WIDTH, EDF_RESERVED_WIDTH, EDF_SIGNAL_COUNT_WIDTH,
    EDF_TRANSDUCER_WIDTH,
};

/// Largest channel count the 4-byte signal count field can hold
const MAX_SIGNALS: usize = 9999;

/// Declaration of one signal for [`EdfWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
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

impl SignalSpec {
    /// Physical units per digital step, the same ratio the decoder applies.
    pub fn ratio(&self) -> f64 {
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min) as f64
    }

    /// Inverse of the decoder's conversion: `round(value / ratio)`, clamped
    /// to the digital range.
    pub fn to_digital(&self, physical_value: f64) -> i16 {
        let digital = (physical_value / self.ratio()).round();
        if digital.is_nan() {
            return 0;
        }
        digital.clamp(self.digital_min as f64, self.digital_max as f64) as i16
    }
}

/// Builds EDF byte streams in the layout [`EdfParser`](crate::EdfParser) reads.
///
/// Records are buffered in memory; the header is rendered when the stream
/// is requested, so the record count in the preamble is always exact.
///
/// # Examples
///
/// ```rust
/// use edfsensors::{EdfWriter, SignalSpec};
///
/// let mut writer = EdfWriter::new();
/// writer.set_patient_info("P001", "M", "01-JAN-1990", "Test Patient")?;
///
/// writer.add_signal(SignalSpec {
///     label: "EEG Fp1".to_string(),
///     transducer: "AgAgCl electrodes".to_string(),
///     physical_dimension: "uV".to_string(),
///     physical_min: -200.0,
///     physical_max: 200.0,
///     digital_min: -32768,
///     digital_max: 32767,
///     prefilter: "HP:0.1Hz LP:70Hz".to_string(),
///     samples_per_record: 256,
/// })?;
///
/// let samples: Vec<f64> = (0..256)
///     .map(|i| 50.0 * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / 256.0).sin())
///     .collect();
/// writer.write_physical_record(&[samples])?;
///
/// let bytes = writer.to_bytes()?;
/// let recording = edfsensors::parse(&bytes)?;
/// assert_eq!(recording.timestamps.len(), 256);
/// # Ok::<(), edfsensors::EdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EdfWriter {
    signals: Vec<SignalSpec>,
    patient: String,
    recording: String,
    start: NaiveDateTime,
    record_duration: f64,
    records: Vec<u8>,
    record_count: usize,
}

impl Default for EdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl EdfWriter {
    /// Creates an empty writer.
    ///
    /// Defaults: start 01.01.85 00.00.00, anonymised patient and recording
    /// fields, one-second data records.
    pub fn new() -> Self {
        let start = NaiveDate::from_ymd_opt(1985, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();

        EdfWriter {
            signals: Vec::new(),
            patient: "X X X X".to_string(),
            recording: "Startdate X X X X".to_string(),
            start,
            record_duration: 1.0,
            records: Vec::new(),
            record_count: 0,
        }
    }

    /// Declares the next signal.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidParameter` - records were already written, the
    ///   digital range is empty, inverted or outside 16 bits, or a field does
    ///   not fit its header width
    pub fn add_signal(&mut self, signal: SignalSpec) -> Result<()> {
        if self.record_count > 0 {
            return Err(EdfError::InvalidParameter(
                "Cannot add signals after data records were written".to_string(),
            ));
        }
        if self.signals.len() >= MAX_SIGNALS {
            return Err(EdfError::InvalidParameter(format!(
                "At most {} signals fit in an EDF header",
                MAX_SIGNALS
            )));
        }
        if signal.digital_min >= signal.digital_max {
            return Err(EdfError::InvalidParameter(format!(
                "Signal {:?}: digital minimum {} must be below digital maximum {}",
                signal.label, signal.digital_min, signal.digital_max
            )));
        }
        let digital_range = i16::MIN as i64..=i16::MAX as i64;
        if !digital_range.contains(&signal.digital_min) || !digital_range.contains(&signal.digital_max) {
            return Err(EdfError::InvalidParameter(format!(
                "Signal {:?}: digital range must lie within 16 bits",
                signal.label
            )));
        }

        // Render every field once so a bad signal is rejected here, not at output time
        let mut scratch = Vec::new();
        render_signal_header(&mut scratch, std::slice::from_ref(&signal))?;

        self.signals.push(signal);
        Ok(())
    }

    /// Sets the EDF+ patient identification subfields.
    ///
    /// Spaces inside a subfield become underscores.
    pub fn set_patient_info(&mut self, code: &str, sex: &str, birthdate: &str, name: &str) -> Result<()> {
        let patient = [code, sex, birthdate, name]
            .iter()
            .map(|s| subfield(s))
            .collect::<Vec<_>>()
            .join(" ");
        check_width("patient", &patient, 80)?;
        self.patient = patient;
        Ok(())
    }

    pub fn set_recording_info(&mut self, recording: &str) -> Result<()> {
        let recording = to_ascii(recording);
        check_width("recording", &recording, 80)?;
        self.recording = recording;
        Ok(())
    }

    /// Sets the start date and time; the year has to be expressible with
    /// the two-digit 1985..2084 convention.
    pub fn set_start(&mut self, start: NaiveDateTime) -> Result<()> {
        if !(1985..=2084).contains(&start.year()) {
            return Err(EdfError::InvalidParameter(format!(
                "Start year {} is outside 1985-2084",
                start.year()
            )));
        }
        self.start = start;
        Ok(())
    }

    /// Sets the duration of one data record in seconds.
    pub fn set_record_duration(&mut self, seconds: f64) -> Result<()> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(EdfError::InvalidParameter(format!(
                "Record duration must be positive, got {}",
                seconds
            )));
        }
        format_number(seconds, EDF_NUMBER_WIDTH).ok_or_else(|| {
            EdfError::InvalidParameter(format!("Record duration {} does not fit the header", seconds))
        })?;
        self.record_duration = seconds;
        Ok(())
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Appends one data record of raw sample codes, one vector per signal.
    ///
    /// Codes are written as given, without clamping to the digital range.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidParameter` - wrong number of signals, or a signal
    ///   with a sample count different from its `samples_per_record`
    pub fn write_digital_record(&mut self, samples: &[Vec<i16>]) -> Result<()> {
        self.check_record_shape(samples.iter().map(Vec::len))?;

        for signal_samples in samples {
            for &value in signal_samples {
                self.records.extend_from_slice(&value.to_le_bytes());
            }
        }
        self.record_count += 1;
        Ok(())
    }

    /// Appends one data record of physical values, one vector per signal.
    pub fn write_physical_record(&mut self, samples: &[Vec<f64>]) -> Result<()> {
        self.check_record_shape(samples.iter().map(Vec::len))?;

        let digital: Vec<Vec<i16>> = samples
            .iter()
            .zip(&self.signals)
            .map(|(values, signal)| values.iter().map(|&v| signal.to_digital(v)).collect())
            .collect();
        self.write_digital_record(&digital)
    }

    fn check_record_shape(&self, lengths: impl ExactSizeIterator<Item = usize>) -> Result<()> {
        if lengths.len() != self.signals.len() {
            return Err(EdfError::InvalidParameter(format!(
                "Record has {} signals, expected {}",
                lengths.len(),
                self.signals.len()
            )));
        }
        for (i, (len, signal)) in lengths.zip(&self.signals).enumerate() {
            if len != signal.samples_per_record {
                return Err(EdfError::InvalidParameter(format!(
                    "Signal {} expected {} samples per record, got {}",
                    i, signal.samples_per_record, len
                )));
            }
        }
        Ok(())
    }

    /// Renders the header followed by every record written so far.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_bytes = (self.signals.len() + 1) * 256;
        let mut out = Vec::with_capacity(header_bytes + self.records.len());

        self.render_preamble(&mut out, header_bytes)?;
        put_field(&mut out, "number of signals", &self.signals.len().to_string(), EDF_SIGNAL_COUNT_WIDTH)?;
        render_signal_header(&mut out, &self.signals)?;
        out.extend_from_slice(&self.records);

        Ok(out)
    }

    /// Writes the stream to `path`, consuming the writer.
    ///
    /// # Errors
    ///
    /// * `EdfError::FileNotFound` - the file cannot be created
    /// * `EdfError::Io` - writing fails
    pub fn finalize<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        let file = File::create(&path)
            .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;

        debug!(
            "wrote {} records of {} signals to {}",
            self.record_count,
            self.signals.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    fn render_preamble(&self, out: &mut Vec<u8>, header_bytes: usize) -> Result<()> {
        let date = format!(
            "{:02}.{:02}.{:02}",
            self.start.day(),
            self.start.month(),
            self.start.year() % 100
        );
        let time = format!(
            "{:02}.{:02}.{:02}",
            self.start.hour(),
            self.start.minute(),
            self.start.second()
        );
        let duration = format_number(self.record_duration, EDF_NUMBER_WIDTH).unwrap_or_else(|| "1".to_string());

        put_field(out, "version", "0", 8)?;
        put_field(out, "patient", &self.patient, 80)?;
        put_field(out, "recording", &self.recording, 80)?;
        put_field(out, "start date", &date, 8)?;
        put_field(out, "start time", &time, 8)?;
        put_field(out, "header size", &header_bytes.to_string(), 8)?;
        put_field(out, "reserved", "", 44)?;
        put_field(out, "data records", &self.record_count.to_string(), 8)?;
        put_field(out, "record duration", &duration, 8)?;

        debug_assert_eq!(out.len(), EDF_PREAMBLE_SIZE);
        Ok(())
    }
}

/// Column-major signal header: every label, then every transducer, and so on.
fn render_signal_header(out: &mut Vec<u8>, signals: &[SignalSpec]) -> Result<()> {
    for s in signals {
        put_field(out, "label", &s.label, EDF_LABEL_WIDTH)?;
    }
    for s in signals {
        put_field(out, "transducer", &s.transducer, EDF_TRANSDUCER_WIDTH)?;
    }
    for s in signals {
        put_field(out, "physical dimension", &s.physical_dimension, EDF_DIMENSION_WIDTH)?;
    }
    for s in signals {
        put_number(out, "physical minimum", s.physical_min)?;
    }
    for s in signals {
        put_number(out, "physical maximum", s.physical_max)?;
    }
    for s in signals {
        put_field(out, "digital minimum", &s.digital_min.to_string(), EDF_NUMBER_WIDTH)?;
    }
    for s in signals {
        put_field(out, "digital maximum", &s.digital_max.to_string(), EDF_NUMBER_WIDTH)?;
    }
    for s in signals {
        put_field(out, "prefilter", &s.prefilter, EDF_PREFILTER_WIDTH)?;
    }
    for s in signals {
        put_field(out, "samples per record", &s.samples_per_record.to_string(), EDF_NUMBER_WIDTH)?;
    }
    for _ in signals {
        put_field(out, "reserved", "", EDF_RESERVED_WIDTH)?;
    }

    Ok(())
}

fn put_number(out: &mut Vec<u8>, what: &str, value: f64) -> Result<()> {
    let text = format_number(value, EDF_NUMBER_WIDTH)
        .filter(|text| reads_back_as(text, value))
        .ok_or_else(|| {
            EdfError::InvalidParameter(format!(
                "{} {} cannot be written in {} bytes without losing precision",
                what, value, EDF_NUMBER_WIDTH
            ))
        })?;
    put_field(out, what, &text, EDF_NUMBER_WIDTH)
}

/// Largest relative error accepted when a number is shortened to fit its field.
const NUMBER_TOLERANCE: f64 = 1e-4;

fn reads_back_as(text: &str, value: f64) -> bool {
    let Ok(parsed) = text.parse::<f64>() else {
        return false;
    };
    if value == 0.0 {
        return parsed == 0.0;
    }
    parsed != 0.0 && ((parsed - value) / value).abs() <= NUMBER_TOLERANCE
}

/// Left-justified, space-padded ASCII field of exactly `width` bytes.
fn put_field(out: &mut Vec<u8>, what: &str, text: &str, width: usize) -> Result<()> {
    let ascii = to_ascii(text);
    check_width(what, &ascii, width)?;
    out.extend_from_slice(ascii.as_bytes());
    out.resize(out.len() + width - ascii.len(), b' ');
    Ok(())
}

fn check_width(what: &str, text: &str, width: usize) -> Result<()> {
    if text.len() > width {
        return Err(EdfError::InvalidParameter(format!(
            "{} {:?} does not fit in {} bytes",
            what, text, width
        )));
    }
    Ok(())
}

/// Shortest rendering of `value` that fits `width`, dropping decimals as needed.
fn format_number(value: f64, width: usize) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let plain = value.to_string();
    if plain.len() <= width {
        return Some(plain);
    }
    (0..width)
        .rev()
        .map(|precision| format!("{:.*}", precision, value))
        .find(|text| text.len() <= width)
}

// Header text is 7-bit ASCII; anything else becomes '_'
fn to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect()
}

fn subfield(s: &str) -> String {
    let s = to_ascii(s.trim()).replace(' ', "_");
    if s.is_empty() {
        "X".to_string()
    } else {
        s
    }
}
