use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Decodes a fixed-width header field into trimmed text.
///
/// EDF header fields are space-padded ASCII; anything that is not valid
/// UTF-8 is replaced rather than rejected.
pub fn field_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Strict integer parsing of a trimmed field. Empty text is not a number.
pub fn parse_integer(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

/// Strict float parsing of a trimmed field.
///
/// `nan` and `inf` spellings are rejected: a physical range has to be
/// finite to produce a usable conversion ratio.
pub fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Two's-complement decoding of a little-endian 16-bit sample.
///
/// Equivalent to `i16::from_le_bytes`, spelled out on the unsigned value.
pub fn decode_sample(bytes: [u8; 2]) -> i16 {
    let n = bytes[0] as i32 + bytes[1] as i32 * 256;
    (-(n & 0x8000) + (n & !0x8000)) as i16
}

/// Parses the preamble start fields, `dd.mm.yy` and `hh.mm.ss`.
///
/// Two-digit years 85..=99 map to 19xx, everything else to 20xx (the EDF
/// clipping date convention).
pub fn parse_start(date: &str, time: &str) -> Option<NaiveDateTime> {
    let [day, month, yy] = dotted_triplet(date)?;
    let year = if yy > 84 { 1900 + yy } else { 2000 + yy };
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;

    let [hour, minute, second] = dotted_triplet(time)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(NaiveDateTime::new(date, time))
}

fn dotted_triplet(s: &str) -> Option<[u32; 3]> {
    let mut parts = s.trim().split('.');
    let mut out = [0u32; 3];
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Two-decimal rendering used in sensor listings.
pub fn format_value(v: f64) -> String {
    format!("{:.2}", v)
}
