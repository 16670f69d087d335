use edfsensors::{open, EdfError, EdfWriter, FrameOptions, RangeSource, SignalSpec};
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// EEG signal spanning the full 16-bit digital range
fn create_test_eeg_signal(label: &str) -> SignalSpec {
    SignalSpec {
        label: label.to_string(),
        transducer: "AgAgCl electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 256,
    }
}

fn create_test_ecg_signal() -> SignalSpec {
    SignalSpec {
        label: "ECG Lead II".to_string(),
        transducer: "Chest electrodes".to_string(),
        physical_dimension: "mV".to_string(),
        physical_min: -5.0,
        physical_max: 5.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:100Hz".to_string(),
        samples_per_record: 128,
    }
}

#[test]
fn test_multi_channel_file_round_trip() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi_channel.edf");

    // Write 4 EEG channels and 1 ECG channel
    {
        let mut writer = EdfWriter::new();
        writer.set_patient_info("MC001", "F", "15-MAR-1985", "Multi Channel Test").unwrap();
        writer.set_record_duration(1.0).unwrap();

        for i in 0..4 {
            writer.add_signal(create_test_eeg_signal(&format!("EEG C{}", i + 1))).unwrap();
        }
        writer.add_signal(create_test_ecg_signal()).unwrap();

        for second in 0..10 {
            let mut all_samples = Vec::new();
            for ch in 0..4 {
                let freq = 8.0 + ch as f64 * 2.0;
                let samples: Vec<f64> = (0..256)
                    .map(|i| {
                        let t = (second * 256 + i) as f64 / 256.0;
                        30.0 * (2.0 * std::f64::consts::PI * freq * t).sin()
                    })
                    .collect();
                all_samples.push(samples);
            }
            let ecg: Vec<f64> = (0..128)
                .map(|i| {
                    let t = (second * 128 + i) as f64 / 128.0;
                    2.0 * (2.0 * std::f64::consts::PI * t).sin()
                })
                .collect();
            all_samples.push(ecg);

            writer.write_physical_record(&all_samples).unwrap();
        }

        writer.finalize(&path).unwrap();
    }

    // Read it back
    let recording = open(&path).unwrap();
    assert_eq!(recording.channels.len(), 5);
    assert_eq!(recording.channels[4].label, "ECG Lead II");
    assert_eq!(recording.preamble.patient, "MC001 F 15-MAR-1985 Multi_Channel_Test");
    assert_eq!(recording.preamble.data_records, Some(10));

    // 10 records of 256 rows, set by the EEG channels
    assert_eq!(recording.timestamps.len(), 2560);
    assert_eq!(recording.timestamps.width(), 5);
    assert_eq!(recording.duration_seconds(), Some(10.0));
    assert_eq!(recording.timestamp_rate(), Some(256.0));
    assert_eq!(recording.channels[4].sample_rate(1.0), Some(128.0));

    assert_eq!(recording.sensors.len(), 2);
    let ecg = &recording.sensors[0];
    let eeg = &recording.sensors[1];
    assert_eq!(ecg.indices, vec![4]);
    assert_eq!(eeg.indices, vec![0, 1, 2, 3]);

    let (eeg_min, eeg_max) = eeg.range(RangeSource::DataLimits).unwrap();
    assert!(eeg_max <= 30.1 && eeg_max > 29.0);
    assert!(eeg_min >= -30.1 && eeg_min < -29.0);
    let (ecg_min, ecg_max) = ecg.range(RangeSource::DataLimits).unwrap();
    assert!(ecg_max <= 2.01 && ecg_min >= -2.01);

    // ECG advances 128 rows per record, so it only reaches row 1279
    assert_eq!(recording.timestamps.value(1279, 4).map(|v| v != 0.0), Some(true));
    for t in 1280..2560 {
        assert_eq!(recording.timestamps.value(t, 4), Some(0.0));
    }

    let frames: Vec<_> = recording
        .frames(
            eeg,
            &FrameOptions {
                downsample: recording.default_downsample(edfsensors::DEFAULT_TARGET_FRAMES),
                channel_limit: Some(2),
            },
        )
        .collect();
    assert_eq!(frames.len(), 256);
    assert_eq!(frames[1].timestamp, 10);
    assert_eq!(frames[1].values.len(), 2);
}

#[test]
fn test_open_reports_missing_file() {
    init_logging();
    let dir = tempdir().unwrap();
    let err = open(dir.path().join("missing.edf")).unwrap_err();
    assert!(matches!(err, EdfError::FileNotFound(_)));
}

#[test]
fn test_open_rejects_non_edf_file() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.edf");
    std::fs::write(&path, "this is not an EDF file").unwrap();

    let err = open(&path).unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_sensor_listing_lines() {
    init_logging();
    let bytes = edfsensors::doctest_utils::montage_bytes().unwrap();
    let recording = edfsensors::parse(&bytes).unwrap();

    let lines: Vec<String> = recording.sensors.iter().map(|s| s.to_string()).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Chest electrodes  |  Range -5.00 / 5.00 mV  |  1 Sensor(s)"));
    assert!(lines[1].starts_with("Thermistor  |  Range 30.00 / 40.00 degC  |  1 Sensor(s)"));
    assert!(lines[2].starts_with("AgAgCl cup electrodes  |  Range -200.00 / 200.00 uV  |  4 Sensor(s)"));

    assert_eq!(recording.closest_sensor(4), Some(2));
    assert_eq!(recording.sensors[2].usable_channels(6), 4);
}
