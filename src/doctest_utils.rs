// Internal utilities for documentation tests
// Builds small EDF streams with a known sensor layout

use crate::{EdfWriter, Result, SignalSpec};
use std::path::Path;

fn eeg(label: &str) -> SignalSpec {
    SignalSpec {
        label: label.to_string(),
        transducer: "AgAgCl cup electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 8,
    }
}

/// Six channels: four EEG leads sharing one calibration, one ECG lead and
/// one temperature probe at a lower rate. Three one-second records.
///
/// Sorted sensors: ECG (1 channel), temperature (1 channel), EEG (4 channels).
pub fn montage_writer() -> Result<EdfWriter> {
    let mut writer = EdfWriter::new();
    writer.set_patient_info("DOC001", "M", "01-JAN-1990", "Test Patient")?;

    for label in ["EEG Fp1", "EEG Fp2", "EEG C3", "EEG C4"] {
        writer.add_signal(eeg(label))?;
    }
    writer.add_signal(SignalSpec {
        label: "ECG Lead II".to_string(),
        transducer: "Chest electrodes".to_string(),
        physical_dimension: "mV".to_string(),
        physical_min: -5.0,
        physical_max: 5.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:100Hz".to_string(),
        samples_per_record: 4,
    })?;
    writer.add_signal(SignalSpec {
        label: "Temp".to_string(),
        transducer: "Thermistor".to_string(),
        physical_dimension: "degC".to_string(),
        physical_min: 30.0,
        physical_max: 40.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "None".to_string(),
        samples_per_record: 1,
    })?;

    for second in 0..3 {
        let mut record = Vec::new();
        for lead in 0..4 {
            let freq = 8.0 + lead as f64 * 2.0;
            record.push(
                (0..8)
                    .map(|i| {
                        let t = (second * 8 + i) as f64 / 8.0;
                        50.0 * (2.0 * std::f64::consts::PI * freq * t / 16.0).sin()
                    })
                    .collect(),
            );
        }
        record.push((0..4).map(|i| if i == 0 { 2.0 } else { -0.5 }).collect());
        record.push(vec![0.01 * second as f64]);
        writer.write_physical_record(&record)?;
    }

    Ok(writer)
}

pub fn montage_bytes() -> Result<Vec<u8>> {
    montage_writer()?.to_bytes()
}

/// Writes the montage to `path`
pub fn create_montage_file<P: AsRef<Path>>(path: P) -> Result<()> {
    montage_writer()?.finalize(path)
}

