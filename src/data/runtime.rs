//! Movie runtime, carried on the wire as `"<minutes> mins"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Running time in whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn minutes(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Minutes(i32),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Minutes(minutes) => Ok(Runtime(minutes)),
            Wire::Text(text) => text
                .strip_suffix(" mins")
                .and_then(|n| n.parse().ok())
                .map(Runtime)
                .ok_or_else(|| serde::de::Error::custom("invalid runtime format")),
        }
    }
}
