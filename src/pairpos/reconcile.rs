//! Cross-checks a subtable's coverage against its class definitions and cells.

use itertools::Itertools;

use crate::layout::{Coverage, GlyphSet};
use crate::pairpos::PairClasses;
use crate::report::{DiagnosticKind, Report};

/// The outcome of reconciling a coverage table with a grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    /// `false` when the grid cannot be trusted and should be discarded.
    pub ok_to_proceed: bool,
    /// Every glyph in the coverage.
    pub coverage_glyphs: GlyphSet,
    /// Covered glyphs with no first class. These match as first class 0.
    pub extras: GlyphSet,
}

/// Compare `coverage` with the class definitions and cells of `grid`.
///
/// Discrepancies that leave the subtable usable are reported as info or warnings. Neither input
/// is modified, so reconciling the same inputs again gives the same result.
pub fn reconcile(coverage: &Coverage, grid: &PairClasses, report: &Report) -> Reconciliation {
    let coverage_glyphs = coverage.iter().collect::<GlyphSet>();
    let class1_glyphs = grid.class_def1.glyphs().collect::<GlyphSet>();
    let uses_first_zero = grid.cells.keys().any(|key| key.first == 0);

    let extras = coverage_glyphs
        .difference(&class1_glyphs)
        .copied()
        .collect::<GlyphSet>();
    if !extras.is_empty() {
        if uses_first_zero {
            report.info(
                DiagnosticKind::CoverageExtra,
                None,
                format!(
                    "glyphs {} are covered without a first class and match as class 0",
                    extras.iter().join(", ")
                ),
            );
        } else {
            report.warning(
                DiagnosticKind::CoverageExtraUnused,
                None,
                format!(
                    "glyphs {} are covered without a first class, but no class pair uses first class 0",
                    extras.iter().join(", ")
                ),
            );
        }
    }

    let not_covered = class1_glyphs
        .difference(&coverage_glyphs)
        .copied()
        .collect::<Vec<_>>();
    if !not_covered.is_empty() {
        report.warning(
            DiagnosticKind::NotCovered,
            None,
            format!(
                "glyphs {} have a first class but are not covered",
                not_covered.iter().join(", ")
            ),
        );
    }

    let second_only = grid
        .class_def2
        .glyphs()
        .filter(|glyph| !class1_glyphs.contains(glyph) && !coverage_glyphs.contains(glyph))
        .collect::<Vec<_>>();
    if !second_only.is_empty() {
        report.info(
            DiagnosticKind::SecondClassOnly,
            None,
            format!(
                "glyphs {} only appear in the second class definition",
                second_only.iter().join(", ")
            ),
        );
    }

    let mut ok_to_proceed = true;
    if !grid.cells.is_empty() && coverage_glyphs.is_empty() {
        report.error(
            DiagnosticKind::Unreconcilable,
            None,
            "the coverage is empty but class pairs are defined",
        );
        ok_to_proceed = false;
    } else if uses_first_zero && extras.is_empty() {
        report.error(
            DiagnosticKind::Unreconcilable,
            None,
            "class pairs use first class 0 but every covered glyph has a first class",
        );
        ok_to_proceed = false;
    }

    Reconciliation {
        ok_to_proceed,
        coverage_glyphs,
        extras,
    }
}
