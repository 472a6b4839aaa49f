use serde::{Deserialize, Serialize};

/// Engine-wide settings. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for the page size; also the page size when none is
    /// requested. Zero or less disables limiting.
    pub max_pagesize: i64,
    /// When false, empty string values are treated as unset filters.
    pub allow_empty_string: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_pagesize: 100,
            allow_empty_string: false,
        }
    }
}

impl Config {
    pub fn new(max_pagesize: i64, allow_empty_string: bool) -> Self {
        Self {
            max_pagesize,
            allow_empty_string,
        }
    }

    pub fn max_pagesize(mut self, max_pagesize: i64) -> Self {
        self.max_pagesize = max_pagesize;
        self
    }

    pub fn allow_empty_string(mut self, allow: bool) -> Self {
        self.allow_empty_string = allow;
        self
    }
}
