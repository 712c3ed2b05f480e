use crate::network::Timestamp;

// A fast way to check a buffer is all zeros (https://stackoverflow.com/questions/65367552/how-to-efficiently-check-a-vecu8-to-see-if-its-all-zeros).
pub fn is_zero(buf: &[bool]) -> bool {
    let (prefix, aligned, suffix) = unsafe { buf.align_to::<u128>() };

    prefix.iter().all(|&x| x == false)
        && aligned.iter().all(|&x| x == 0)
        && suffix.iter().all(|&x| x == false)
}

#[derive(thiserror::Error, Debug)]
#[error("invalid time literal: {0}")]
pub struct InvalidTime(String);

/// Parses a "HH:MM:SS" time-of-day into seconds since midnight.
/// Hours past 24 are allowed for service days running past midnight.
pub fn parse_time(s: &str) -> Result<Timestamp, InvalidTime> {
    let parts: Vec<&str> = s.split(':').collect();

    if parts.len() != 3 || parts[1].len() != 2 || parts[2].len() != 2 {
        return Err(InvalidTime(s.to_owned()));
    }

    let mut total = 0u32;
    for part in parts {
        let value: u32 = part.parse().map_err(|_| InvalidTime(s.to_owned()))?;
        total = total * 60 + value;
    }
    Ok(total)
}

pub fn get_time_str(time: Timestamp) -> String {
    let hours = time / 3600;
    let minutes = (time % 3600) / 60;
    let seconds = time % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
