use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall-clock milliseconds since the unix epoch, used to stamp events
pub fn timestamp_millis() -> u64 {
    get_duration_since_epoch().as_millis() as u64
}

pub(crate) fn get_duration_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Milliseconds of `elapsed`, saturating instead of truncating huge values
pub(crate) fn duration_as_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
