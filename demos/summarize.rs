use edfsensors::{FrameOptions, RangeSource, Result, DEFAULT_TARGET_FRAMES};

fn main() -> Result<()> {
    env_logger::init();

    println!("EDF sensor decoder");
    println!("Library Version: {}", edfsensors::version());

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            let path = std::env::temp_dir().join("edfsensors_montage.edf");
            edfsensors::doctest_utils::create_montage_file(&path)?;
            println!("No file given, using generated montage {}", path.display());
            path.display().to_string()
        }
    };

    let recording = edfsensors::open(&path)?;

    println!("Patient: {}", recording.preamble.patient);
    if let Some(start) = recording.preamble.start {
        println!("Start: {}", start);
    }
    println!("Channels: {}", recording.channels.len());
    println!("Timestamps: {}", recording.timestamps.len());
    if let Some(seconds) = recording.duration_seconds() {
        println!("Duration: {:.1} s", seconds);
    }

    for (i, sensor) in recording.sensors.iter().enumerate() {
        println!("Sensor {}: {}", i, sensor);
        let labels: Vec<&str> = sensor
            .indices
            .iter()
            .map(|&c| recording.channels[c].label.as_str())
            .collect();
        println!("  channels: {}", labels.join(", "));
    }

    // Preview the largest sensor the way a display layer would step through it
    if let Some(sensor) = recording.sensors.last() {
        let options = FrameOptions {
            downsample: recording.default_downsample(DEFAULT_TARGET_FRAMES),
            channel_limit: None,
        };
        let (low, high) = sensor
            .range(RangeSource::DataLimits)
            .unwrap_or((sensor.physical_min, sensor.physical_max));
        println!(
            "Previewing {} frames (every {} timestamps), values in [{:.2}, {:.2}]",
            recording.frames(sensor, &options).count(),
            options.downsample,
            low,
            high
        );
        for frame in recording.frames(sensor, &options).take(3) {
            println!("  t={:>6}: {:?}", frame.timestamp, frame.values);
        }
    }

    Ok(())
}
