//! # EDF Sensor Decoder for Rust
//!
//! A pure Rust decoder for EDF (European Data Format) biosignal recordings.
//! It reads a whole file in one forward pass and returns:
//!
//! - the **sensors** of the recording: channels grouped by identical
//!   transducer, unit, physical range and digital range, sorted by how many
//!   channels they contain;
//! - the **timestamps**: one row per sample instant, holding the calibrated
//!   value of every channel.
//!
//! ## Quick Start
//!
//! ```rust
//! use edfsensors::{EdfWriter, SignalSpec, Result};
//!
//! fn main() -> Result<()> {
//!     # let mut writer = EdfWriter::new();
//!     # for label in ["C3", "C4"] {
//!     #     writer.add_signal(SignalSpec {
//!     #         label: label.to_string(),
//!     #         transducer: "AgAgCl".to_string(),
//!     #         physical_dimension: "uV".to_string(),
//!     #         physical_min: -100.0,
//!     #         physical_max: 100.0,
//!     #         digital_min: -2048,
//!     #         digital_max: 2047,
//!     #         prefilter: "HP:0.1Hz".to_string(),
//!     #         samples_per_record: 4,
//!     #     })?;
//!     # }
//!     # writer.write_digital_record(&[vec![0, 10, 20, 30], vec![0, -10, -20, -30]])?;
//!     # let bytes = writer.to_bytes()?;
//!     let recording = edfsensors::parse(&bytes)?;
//!
//!     for sensor in &recording.sensors {
//!         println!("{}", sensor);
//!         println!("  channels: {:?}", sensor.indices);
//!     }
//!
//!     // Calibrated value of channel 1 at timestamp 3
//!     let value = recording.timestamps.value(3, 1).unwrap();
//!     assert!((value + 30.0 * 200.0 / 4095.0).abs() < 1e-9);
//!     Ok(())
//! }
//! ```
//!
//! ## Digital to analog conversion
//!
//! Each sensor carries one ratio, fixed by the first channel of its group:
//!
//! ```text
//! ratio  = (physical_max - physical_min) / (digital_max - digital_min)
//! analog = raw_sample * ratio
//! ```
//!
//! A header whose digital minimum equals its digital maximum has no usable
//! ratio and is rejected with [`FormatError::EmptyDigitalRange`].
//!
//! ## Failure is all-or-nothing
//!
//! Any malformed header field, short read or incomplete data record fails
//! the whole parse with [`EdfError::Format`]; no partial tables are returned.

pub mod error;
pub mod types;
pub mod utils;
pub mod reader;
pub mod frames;
pub mod writer;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{EdfError, FormatError, Result};
pub use types::{Channel, Preamble, Recording, SampleTable, Sensor};
pub use reader::{open, parse, EdfParser};
pub use frames::{Frame, FrameOptions, Frames, RangeSource};
pub use writer::{EdfWriter, SignalSpec};

// Header layout
pub const EDF_PREAMBLE_SIZE: usize = 252;
pub const EDF_SIGNAL_COUNT_WIDTH: usize = 4;
pub const EDF_LABEL_WIDTH: usize = 16;
pub const EDF_TRANSDUCER_WIDTH: usize = 80;
pub const EDF_DIMENSION_WIDTH: usize = 8;
pub const EDF_NUMBER_WIDTH: usize = 8;
pub const EDF_PREFILTER_WIDTH: usize = 80;
pub const EDF_RESERVED_WIDTH: usize = 32;
pub const EDF_SAMPLE_BYTES: usize = 2;

/// Frame count [`Recording::default_downsample`] aims for in display layers
pub const DEFAULT_TARGET_FRAMES: usize = 250;

/// Library version
///
/// ```rust
/// let version = edfsensors::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_header_widths_fill_one_block_per_signal() {
        let per_signal = EDF_LABEL_WIDTH
            + EDF_TRANSDUCER_WIDTH
            + EDF_DIMENSION_WIDTH
            + 4 * EDF_NUMBER_WIDTH
            + EDF_PREFILTER_WIDTH
            + EDF_NUMBER_WIDTH
            + EDF_RESERVED_WIDTH;
        assert_eq!(per_signal, 256);
        assert_eq!(EDF_PREAMBLE_SIZE + EDF_SIGNAL_COUNT_WIDTH, 256);
    }
}
