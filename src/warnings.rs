//! Warning identifiers, locations and the [`Warning`] record carried by validation reports.
//!
//! Warnings are plain data. Parser plugins and the validation context produce them; report
//! consumers compare, sort and diff them. The numeric code of a [`WarningId`] encodes its
//! severity: negative codes are suggestions, codes from 1_000_000 upwards are errors, everything
//! in between is a warning.

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Suggestion,
    Warning,
    Error,
}

macro_rules! warning_ids {
    ($($name:ident = $code:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum WarningId {
            $($name),*
        }

        impl WarningId {
            pub const ALL: &'static [WarningId] = &[$(WarningId::$name),*];

            pub fn code(&self) -> i32 {
                match self {
                    $(WarningId::$name => $code),*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(WarningId::$name => stringify!($name)),*
                }
            }
        }
    };
}

warning_ids! {
    // Suggestions
    EmptyContext = -1,
    SameLabelAndTargetReference = -2,
    HugeMarkdownFile = -3,
    UrlHostnameIsIp = -4,

    // Warnings
    EmptyMarkdownFile = 1,
    UnusedDefinedReference = 2,
    UnusedDefinedFootnote = 3,
    EmptyCodeBlock = 4,
    EffectivelyEmptyCodeBlock = 5,
    EmptyHeading = 6,
    HeadingEndsWithWhitespace = 7,
    EmptyReference = 8,
    EmptyLinkContent = 9,
    ReferenceHasExcessWhitespace = 10,
    InvalidListNumberOrder = 11,
    PathIsFsSpecific = 12,
    FileReferenceCaseMismatch = 13,
    RedirectChain = 14,
    EffectivelyEmptyHeading = 15,
    EmptyFootnoteDefinition = 16,

    // Errors
    PathNotInContext = 1_000_000,
    UnresolvedReference = 1_000_001,
    UnresolvedFootnoteReference = 1_000_002,
    DuplicateReferenceDefinition = 1_000_003,
    DuplicateHeadingDefinition = 1_000_004,
    InvalidEmailFormat = 1_000_005,
    InvalidUrlFormat = 1_000_006,
    UnclosedCodeBlock = 1_000_007,
    UnresolvableHostname = 1_000_008,
    WebRequestFailed = 1_000_009,
    WebRequestTimedOut = 1_000_010,
    WebRequestReturnedErrorCode = 1_000_011,
    TooManyRedirects = 1_000_012,
    InvalidJsonInJsonCodeBlock = 1_000_013,
}

impl WarningId {
    pub fn severity(&self) -> Severity {
        match self.code() {
            code if code < 0 => Severity::Suggestion,
            code if code >= 1_000_000 => Severity::Error,
            _ => Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl PartialOrd for WarningId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WarningId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl Display for WarningId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Byte range into a markdown source, end exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        SourceSpan { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<std::ops::Range<usize>> for SourceSpan {
    fn from(range: std::ops::Range<usize>) -> Self {
        SourceSpan::new(range.start, range.end)
    }
}

/// Byte offsets at which each line of `source` starts. Always contains at least `0`.
pub fn line_start_indexes(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
        .collect()
}

/// Zero based line containing `offset`.
pub fn line_of(line_starts: &[usize], offset: usize) -> usize {
    line_starts
        .partition_point(|start| *start <= offset)
        .saturating_sub(1)
}

/// Where a warning applies: a whole file, or a span of it.
///
/// Lines are zero based, columns are one based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarningLocation {
    pub relative_file_path: String,
    pub is_whole_file: bool,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub span: SourceSpan,
}

impl WarningLocation {
    pub fn whole_file(relative_file_path: &str) -> Self {
        WarningLocation {
            relative_file_path: relative_file_path.to_string(),
            is_whole_file: true,
            ..Default::default()
        }
    }

    pub fn from_span(relative_file_path: &str, span: SourceSpan, line_starts: &[usize]) -> Self {
        let start_line = line_of(line_starts, span.start);
        let last = if span.end > span.start {
            span.end - 1
        } else {
            span.start
        };
        let end_line = line_of(line_starts, last);
        let line_start = |line: usize| line_starts.get(line).copied().unwrap_or(0);
        WarningLocation {
            relative_file_path: relative_file_path.to_string(),
            is_whole_file: false,
            start_line,
            end_line,
            start_column: span.start - line_start(start_line) + 1,
            end_column: last - line_start(end_line) + 1,
            span,
        }
    }
}

impl PartialOrd for WarningLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WarningLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .is_whole_file
            .cmp(&self.is_whole_file)
            .then_with(|| {
                self.relative_file_path
                    .to_lowercase()
                    .cmp(&other.relative_file_path.to_lowercase())
            })
            .then_with(|| self.relative_file_path.cmp(&other.relative_file_path))
            .then_with(|| self.start_line.cmp(&other.start_line))
            .then_with(|| self.start_column.cmp(&other.start_column))
            .then_with(|| self.end_line.cmp(&other.end_line))
            .then_with(|| self.end_column.cmp(&other.end_column))
            .then_with(|| self.span.cmp(&other.span))
    }
}

impl Display for WarningLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_whole_file {
            write!(f, "{}", self.relative_file_path)
        } else {
            write!(
                f,
                "{}:{}:{}",
                self.relative_file_path,
                self.start_line + 1,
                self.start_column
            )
        }
    }
}

/// The pipeline stage that produced a warning. Informational only, not part of equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningSource {
    Parser(String),
    ParserFinalize(String),
    ParsingResultFinalize,
    UrlProcessor,
    ValidationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub id: WarningId,
    pub severity: Severity,
    pub location: WarningLocation,
    pub value: String,
    pub message: String,
    pub source: WarningSource,
}

impl Warning {
    pub fn new(
        id: WarningId,
        location: WarningLocation,
        value: impl Into<String>,
        message: impl Into<String>,
        source: WarningSource,
    ) -> Self {
        Warning {
            id,
            severity: id.severity(),
            location,
            value: value.into(),
            message: message.into(),
            source,
        }
    }

    pub fn is_error(&self) -> bool {
        self.id.is_error()
    }
}

impl PartialEq for Warning {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.location == other.location
            && self.value == other.value
            && self.message == other.message
    }
}

impl Eq for Warning {}

impl Hash for Warning {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.location.hash(state);
        self.value.hash(state);
        self.message.hash(state);
    }
}

impl PartialOrd for Warning {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Warning {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location
            .cmp(&other.location)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.location, self.id, self.message)
    }
}
