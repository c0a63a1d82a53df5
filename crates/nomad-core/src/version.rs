use std::cmp::Ordering;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const VERSION_PLACEHOLDER: &str = "{{VERSION}}";

// Loosely follows semver.org, with a fourth numeric component and a
// prerelease separator that may also be a dot.
const VERSION_GRAMMAR: &str = concat!(
    r"(?P<full>",
    r"(?P<major>0|[1-9][0-9]*)",
    r"(?:\.(?P<minor>0|[1-9][0-9]*))?",
    r"(?:\.(?P<patch>0|[1-9][0-9]*))?",
    r"(?:\.(?P<patch2>0|[1-9][0-9]*))?",
    r"(?:[.-](?P<prerelease>(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*))?",
    r"(?:\+(?P<build>[0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?",
    r")"
);

const MAX_REPORTED_INPUT: usize = 80;

#[derive(Debug, Clone, Error)]
pub enum VersionError {
    #[error("no version found with pattern '{pattern}' in '{input}'")]
    NoVersionFound { pattern: String, input: String },
    #[error("version pattern '{pattern}' does not contain the {{{{VERSION}}}} placeholder")]
    MissingPlaceholder { pattern: String },
    #[error("invalid version pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("version {field} component '{value}' is not a valid number: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// A compiled extraction pattern: arbitrary regex text around one
/// `{{VERSION}}` placeholder.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    source: String,
    regex: Regex,
}

impl VersionPattern {
    pub fn new(pattern: &str) -> Result<Self, VersionError> {
        if !pattern.contains(VERSION_PLACEHOLDER) {
            return Err(VersionError::MissingPlaceholder {
                pattern: pattern.to_string(),
            });
        }

        let expanded = pattern.replace(VERSION_PLACEHOLDER, VERSION_GRAMMAR);
        let regex = Regex::new(&expanded).map_err(|source| VersionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The bare `{{VERSION}}` pattern, compiled once per process.
    pub fn standard() -> Result<&'static Self, VersionError> {
        static STANDARD: OnceLock<Result<VersionPattern, VersionError>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Self::new(VERSION_PLACEHOLDER))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Extracts the first version matched in `input`.
    pub fn parse(&self, input: &str) -> Result<Version, VersionError> {
        let no_version = || VersionError::NoVersionFound {
            pattern: self.source.clone(),
            input: truncate_for_report(input),
        };

        let captures = self.regex.captures(input).ok_or_else(no_version)?;
        let major = captures.name("major").ok_or_else(no_version)?;
        let text = captures
            .name("full")
            .map_or(major.as_str(), |full| full.as_str());

        let numeric = |field: &'static str| -> Result<Option<u64>, VersionError> {
            captures
                .name(field)
                .map(|part| {
                    part.as_str()
                        .parse::<u64>()
                        .map_err(|source| VersionError::InvalidNumber {
                            field,
                            value: part.as_str().to_string(),
                            source,
                        })
                })
                .transpose()
        };
        let textual = |field: &str| {
            captures
                .name(field)
                .map(|part| part.as_str().to_string())
                .unwrap_or_default()
        };

        Ok(Version {
            text: text.to_string(),
            major: numeric("major")?,
            minor: numeric("minor")?,
            patch: numeric("patch")?,
            patch2: numeric("patch2")?,
            prerelease: textual("prerelease"),
            build: textual("build"),
        })
    }
}

fn truncate_for_report(input: &str) -> String {
    match input.char_indices().nth(MAX_REPORTED_INPUT) {
        Some((cut, _)) => format!("{}...", &input[..cut]),
        None => input.to_string(),
    }
}

/// A version extracted from free text.
///
/// Numeric components are `None` when the pattern did not capture them; an
/// absent component is never treated as zero. The matched text is kept as is
/// and is what `Display` renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    text: String,
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    patch2: Option<u64>,
    prerelease: String,
    build: String,
}

type NumericField = fn(&Version) -> Option<u64>;
type TextField = fn(&Version) -> &str;

// Comparison order. `Option` orders `None` below any `Some`, which is exactly
// the "absent is smaller than any present value" rule.
const NUMERIC_FIELDS: [NumericField; 4] = [
    Version::major,
    Version::minor,
    Version::patch,
    Version::patch2,
];
const TEXT_FIELDS: [TextField; 2] = [Version::prerelease, Version::build];

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        VersionPattern::standard()?.parse(input)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn major(&self) -> Option<u64> {
        self.major
    }

    pub fn minor(&self) -> Option<u64> {
        self.minor
    }

    pub fn patch(&self) -> Option<u64> {
        self.patch
    }

    pub fn patch2(&self) -> Option<u64> {
        self.patch2
    }

    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    /// Field-by-field comparison: major, minor, patch, patch2, then
    /// prerelease and build as plain strings. The first differing field wins.
    pub fn compare(&self, other: &Self) -> Ordering {
        NUMERIC_FIELDS
            .iter()
            .map(|field| field(self).cmp(&field(other)))
            .chain(TEXT_FIELDS.iter().map(|field| field(self).cmp(field(other))))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }

    pub fn fill_placeholders(&self, template: &str) -> String {
        if template.is_empty() {
            return String::new();
        }

        let render = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();
        let replacements = [
            ("{{VERSION}}", self.text.clone()),
            ("{{VERSION_NO_DOT}}", self.text.replace('.', "")),
            ("{{V_MAJOR}}", render(self.major)),
            ("{{V_MINOR}}", render(self.minor)),
            ("{{V_PATCH}}", render(self.patch)),
            ("{{V_PATCH2}}", render(self.patch2)),
            ("{{V_PRERELEASE}}", self.prerelease.clone()),
            ("{{V_BUILD}}", self.build.clone()),
        ];

        replacements
            .iter()
            .fold(template.to_string(), |acc, (token, value)| {
                acc.replace(token, value)
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
