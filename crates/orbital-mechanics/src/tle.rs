//! Two-line element records.
//!
//! A record is built once from raw source text and never mutated; a refetch
//! produces a new record that replaces the old one wholesale.

use serde::Serialize;

use crate::{OrbitalError, Result};

/// Character range of line 2 holding the revolution counter.
const REVOLUTION_COLUMNS: std::ops::Range<usize> = 64..68;

/// A validated name + two element lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TleRecord {
    name: String,
    line1: String,
    line2: String,
    epoch_revolution_number: u32,
}

impl TleRecord {
    /// Parse raw source lines into a record.
    ///
    /// Blank lines are discarded first; the first three remaining lines are
    /// taken as name, line 1 and line 2. Anything after them is ignored.
    pub fn parse<I, S>(raw_lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = raw_lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim_end();
                (!line.trim().is_empty()).then(|| line.to_string())
            })
            .take(3)
            .collect();

        let [name, line1, line2] = <[String; 3]>::try_from(lines)
            .map_err(|lines| OrbitalError::InsufficientLines { found: lines.len() })?;

        let epoch_revolution_number = revolution_field(&line2)?;

        Ok(Self {
            name: name.trim().to_string(),
            line1,
            line2,
            epoch_revolution_number,
        })
    }

    /// Parse newline-delimited text, as returned by a TLE source.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::parse(text.lines())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    pub fn epoch_revolution_number(&self) -> u32 {
        self.epoch_revolution_number
    }

    /// The three lines this record was parsed from, trimmed.
    pub fn lines(&self) -> [&str; 3] {
        [&self.name, &self.line1, &self.line2]
    }
}

fn revolution_field(line2: &str) -> Result<u32> {
    let field: String = line2
        .chars()
        .skip(REVOLUTION_COLUMNS.start)
        .take(REVOLUTION_COLUMNS.len())
        .collect();
    let field = field.trim();

    field.parse::<u32>().map_err(|_| {
        OrbitalError::MalformedTle(format!(
            "revolution field (line 2, columns {}-{}) is {:?}, expected an unsigned integer",
            REVOLUTION_COLUMNS.start, REVOLUTION_COLUMNS.end, field
        ))
    })
}
