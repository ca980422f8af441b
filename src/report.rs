//! Structured diagnostics collected while reading, validating and importing subtables.
//!
//! A `Report` is passed by shared reference through the call chain. Recoverable problems are
//! pushed onto it (and mirrored to the `log` facade) while the operation carries on; fatal
//! problems are returned as errors instead.

use std::cell::{Ref, RefCell};
use std::fmt;

use log::{error, info, warn};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DiagnosticKind {
    /// Both value formats of a subtable are zero.
    EmptyValueFormats,
    /// A class count is larger than the number of classes in use, but still covers them.
    SparseClassCount,
    /// A non-zero class is not referenced by any cell with an effect.
    UnusedClass,
    /// A cell holds a value that does nothing.
    EffectlessValue,
    /// A covered glyph has no first class and is treated as class 0.
    CoverageExtra,
    /// As `CoverageExtra`, but no cell uses first class 0 so the glyph can never match.
    CoverageExtraUnused,
    /// A glyph with a first class is missing from the coverage.
    NotCovered,
    /// A glyph has a second class only, and is not covered.
    SecondClassOnly,
    /// Coverage and class definitions cannot be reconciled; the subtable is discarded.
    Unreconcilable,
    /// A cell was dropped because one of its classes is not defined.
    DroppedKey,
    /// A glyph was removed from a class definition because its class has no effect.
    PrunedGlyph,
    /// A cell refers to a class with no glyphs.
    UndefinedClass,
    /// A glyph is both a coverage extra and in the first class definition.
    ExtrasOverlap,
    /// The same adjustment was given twice for one class pair.
    DuplicateToken,
    /// A line does not start with a known keyword.
    UnknownToken,
    /// A line has the wrong shape or a field that cannot be parsed.
    BadLine,
    /// A glyph name is not known.
    UnknownGlyph,
    /// A glyph appears more than once in a class definition.
    DuplicateGlyph,
    /// An explicit class 0 in source text, which is moved to a new class.
    ExplicitClassZero,
}

/// Where in the input a diagnostic was raised.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Location {
    /// 1-based line number in source text.
    Line(usize),
    /// Absolute byte position in binary data.
    Offset(usize),
    /// A cell of the pair grid.
    Cell(u16, u16),
    Glyph(u16),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub location: Option<Location>,
    pub detail: String,
}

#[derive(Default, Debug)]
pub struct Report {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn push(
        &self,
        severity: Severity,
        kind: DiagnosticKind,
        location: Option<Location>,
        detail: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            kind,
            location,
            detail: detail.into(),
        };
        match severity {
            Severity::Info => info!("{}", diagnostic),
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Error => error!("{}", diagnostic),
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn info(
        &self,
        kind: DiagnosticKind,
        location: Option<Location>,
        detail: impl Into<String>,
    ) {
        self.push(Severity::Info, kind, location, detail)
    }

    pub fn warning(
        &self,
        kind: DiagnosticKind,
        location: Option<Location>,
        detail: impl Into<String>,
    ) {
        self.push(Severity::Warning, kind, location, detail)
    }

    pub fn error(
        &self,
        kind: DiagnosticKind,
        location: Option<Location>,
        detail: impl Into<String>,
    ) {
        self.push(Severity::Error, kind, location, detail)
    }

    pub fn diagnostics(&self) -> Ref<'_, Vec<Diagnostic>> {
        self.diagnostics.borrow()
    }

    /// Number of diagnostics of `kind` reported so far.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    /// Number of diagnostics at `severity` reported so far.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count_severity(Severity::Error) > 0
    }

    pub fn len(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.borrow().is_empty()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(line) => write!(f, "line {}", line),
            Location::Offset(offset) => write!(f, "offset {}", offset),
            Location::Cell(first, second) => write!(f, "class pair ({}, {})", first, second),
            Location::Glyph(glyph) => write!(f, "glyph {}", glyph),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(
                f,
                "{} {:?} at {}: {}",
                self.severity, self.kind, location, self.detail
            ),
            None => write!(f, "{} {:?}: {}", self.severity, self.kind, self.detail),
        }
    }
}
