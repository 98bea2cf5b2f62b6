//! Reading-position files kept by the e-reader per opened book.

use regex::Regex;
use std::fs;
use std::path::Path;

/// Matches the `text=` line of `position.cfg`, e.g.
/// `text=pbr:/word?page=12&offs=0`.
const POSITION_PATTERN: &str = r"^text=pbr:/(?:word|page)\?page=(\d+)";

#[derive(Debug, Clone)]
pub struct PositionParser {
    pattern: Regex,
}

impl PositionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(POSITION_PATTERN)?,
        })
    }

    /// Page from the first matching line of `text`.
    pub fn parse(&self, text: &str) -> Option<u32> {
        text.lines().find_map(|line| {
            let caps = self.pattern.captures(line)?;
            caps.get(1)?.as_str().parse().ok()
        })
    }

    /// Page stored in the position file at `path`; an unreadable file has none.
    pub fn read(&self, path: &Path) -> Option<u32> {
        match fs::read_to_string(path) {
            Ok(text) => self.parse(&text),
            Err(e) => {
                log::debug!("{}: {e}", path.display());
                None
            }
        }
    }
}
