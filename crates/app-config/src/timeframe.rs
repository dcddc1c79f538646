use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

const MILLIS_PER_UNIT: &[(&[&str], u64)] = &[
    (&["ms", "msec", "msecs", "millisecond", "milliseconds"], 1),
    (&["s", "sec", "secs", "second", "seconds"], 1_000),
    (&["m", "min", "mins", "minute", "minutes"], 60 * 1_000),
    (&["h", "hr", "hrs", "hour", "hours"], 60 * 60 * 1_000),
    (&["d", "day", "days"], 24 * 60 * 60 * 1_000),
    (&["w", "week", "weeks"], 7 * 24 * 60 * 60 * 1_000),
];

/// A duration written the way people write it in config files: `90s`, `30min`, `12h`.
///
/// Serialized as whole seconds (`"3600s"`) so dumped configs can be read back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe(Duration);

impl Timeframe {
    pub fn parse_str(arg: &str) -> Result<Self, TimeframeParseError> {
        let arg = arg.trim().to_lowercase();

        let split = arg
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(arg.len());
        let (num, unit) = arg.split_at(split);

        if num.is_empty() {
            return Err(TimeframeParseError(format!("no number in {arg:?}")));
        }

        let num = num
            .parse::<u64>()
            .map_err(|e| TimeframeParseError(format!("bad number in {arg:?}: {e}")))?;

        let unit = unit.trim();
        let millis = MILLIS_PER_UNIT
            .iter()
            .find(|(names, _)| names.contains(&unit))
            .map(|(_, millis)| *millis)
            .ok_or_else(|| TimeframeParseError(format!("unknown unit {unit:?} in {arg:?}")))?;

        Ok(Self(Duration::from_millis(num.saturating_mul(millis))))
    }
}

impl From<Timeframe> for Duration {
    fn from(value: Timeframe) -> Self {
        value.0
    }
}

impl From<&Timeframe> for Duration {
    fn from(value: &Timeframe) -> Self {
        value.0
    }
}

impl From<Duration> for Timeframe {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_str(&value)
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeParseError(String);
impl fmt::Display for TimeframeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timeframe: {}", self.0)
    }
}
impl std::error::Error for TimeframeParseError {}
