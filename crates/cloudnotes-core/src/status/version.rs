use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Dotted numeric version such as `2.10.0`.
///
/// Only the leading numeric segments are kept, so `4.8.1-beta` parses as
/// `4.8.1`. Ordering is segment-wise numeric; a version sorts before any
/// version it is a strict prefix of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_start_matches(['v', 'V']);
        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let end = part
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(part.len());
            let Ok(value) = part[..end].parse::<u32>() else {
                break;
            };
            segments.push(value);
            if end != part.len() {
                break;
            }
        }
        (!segments.is_empty()).then_some(Self(segments))
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn major(&self) -> u32 {
        self.0.first().copied().unwrap_or_default()
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
            .ok_or_else(|| Error::InvalidConfiguration(format!("'{raw}' is not a version")))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                formatter.write_str(".")?;
            }
            write!(formatter, "{segment}")?;
        }
        Ok(())
    }
}
