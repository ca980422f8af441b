//! Font Worker source: a line oriented, tab delimited text format for layout data.
//!
//! A class pair subtable looks like this:
//!
//! ```text
//! firstclass definition begin
//! A	1
//! B	2
//! class definition end
//!
//! secondclass definition begin
//! V	1
//! class definition end
//!
//! left x advance	1	1	-80
//! right x placement	2	1	15
//! subtable end
//! ```
//!
//! Lines starting with `%` are comments.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::FontWorkerError;
use crate::layout::{ClassDef, ValueFormat, ValueRecord};
use crate::pairpos::reindex::{reindexed, ReindexOptions};
use crate::pairpos::{Key, PairClasses, PairValue};
use crate::report::{DiagnosticKind, Location, Report};

const SUBTABLE_END: &str = "subtable end";
const LOOKUP_END: &str = "lookup end";
const FIRST_CLASS_BEGIN: &str = "firstclass definition begin";
const SECOND_CLASS_BEGIN: &str = "secondclass definition begin";
const CLASS_DEFINITION_END: &str = "class definition end";

/// Adjustment fields in the order they are written.
const FIELDS: [(&str, ValueFormat); 4] = [
    ("x placement", ValueFormat::X_PLACEMENT),
    ("y placement", ValueFormat::Y_PLACEMENT),
    ("x advance", ValueFormat::X_ADVANCE),
    ("y advance", ValueFormat::Y_ADVANCE),
];

/// Converts between glyph ids and the names used in source text.
pub trait GlyphNamer {
    fn glyph_index(&self, name: &str) -> Option<u16>;

    fn glyph_name(&self, glyph: u16) -> Cow<'_, str>;
}

/// A table of glyph names.
///
/// Glyphs without a name are written as `g` followed by the glyph id, and such names are
/// understood when reading.
#[derive(Clone, Debug, Default)]
pub struct GlyphNames {
    by_name: FxHashMap<String, u16>,
    by_glyph: BTreeMap<u16, String>,
}

impl GlyphNames {
    pub fn new() -> Self {
        GlyphNames::default()
    }

    pub fn insert(&mut self, glyph: u16, name: impl Into<String>) {
        let name = name.into();
        if let Some(old) = self.by_glyph.insert(glyph, name.clone()) {
            self.by_name.remove(&old);
        }
        self.by_name.insert(name, glyph);
    }

    pub fn len(&self) -> usize {
        self.by_glyph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_glyph.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u16, S)> for GlyphNames {
    fn from_iter<I: IntoIterator<Item = (u16, S)>>(iter: I) -> Self {
        let mut names = GlyphNames::new();
        for (glyph, name) in iter {
            names.insert(glyph, name);
        }
        names
    }
}

impl GlyphNamer for GlyphNames {
    fn glyph_index(&self, name: &str) -> Option<u16> {
        if let Some(&glyph) = self.by_name.get(name) {
            return Some(glyph);
        }
        let digits = name.strip_prefix('g')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn glyph_name(&self, glyph: u16) -> Cow<'_, str> {
        match self.by_glyph.get(&glyph) {
            Some(name) => Cow::from(name.as_str()),
            None if glyph == 0 => Cow::from(".notdef"),
            None => Cow::from(format!("g{}", glyph)),
        }
    }
}

/// The lines of Font Worker source text.
///
/// Yields each line with surrounding whitespace removed, skipping blank lines and comments, and
/// keeps track of the 1-based number of the line last returned.
pub struct FontWorkerSource<'a> {
    lines: std::str::Lines<'a>,
    line_number: usize,
}

impl<'a> FontWorkerSource<'a> {
    pub fn new(text: &'a str) -> Self {
        FontWorkerSource {
            lines: text.lines(),
            line_number: 0,
        }
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<'a> Iterator for FontWorkerSource<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let line = self.lines.next()?.trim();
            self.line_number += 1;
            if !line.is_empty() && !line.starts_with('%') {
                return Some(line);
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FontWorkerOptions {
    /// The subtable is part of a kerning set: only `lookup end` ends it, `subtable end` lines
    /// are skipped.
    pub kern_set: bool,
}

impl PairClasses {
    /// Read a class pair subtable from `source`, stopping after its terminating line.
    ///
    /// Bad lines are reported and skipped. The result is reindexed so that every class is used
    /// and classes are numbered from 1; an explicit class 0 becomes the class after the highest.
    pub fn from_font_worker_source(
        source: &mut FontWorkerSource<'_>,
        namer: &impl GlyphNamer,
        options: FontWorkerOptions,
        report: &Report,
    ) -> Result<PairClasses, FontWorkerError> {
        let mut start_line = None;
        let mut class_def1 = ClassDef::new();
        let mut class_def2 = ClassDef::new();
        let mut cells = BTreeMap::<Key, PairValue>::new();

        while let Some(line) = source.next() {
            let line_number = source.line_number();
            start_line.get_or_insert(line_number);

            if line.eq_ignore_ascii_case(LOOKUP_END)
                || (line.eq_ignore_ascii_case(SUBTABLE_END) && !options.kern_set)
            {
                let (cells, class_def1, class_def2) = reindexed(
                    cells,
                    class_def1,
                    class_def2,
                    ReindexOptions::default(),
                    report,
                );
                return Ok(PairClasses::new(cells, class_def1, class_def2));
            } else if line.eq_ignore_ascii_case(SUBTABLE_END) {
                continue;
            }

            let tokens = line.split('\t').map(str::trim).collect::<Vec<_>>();
            let keyword = tokens[0].to_ascii_lowercase();
            if keyword == FIRST_CLASS_BEGIN {
                class_def1 = read_class_def(source, namer, report);
            } else if keyword == SECOND_CLASS_BEGIN {
                class_def2 = read_class_def(source, namer, report);
            } else if let Some((left, field)) = parse_adjustment(&keyword) {
                read_adjustment(&tokens, left, field, line_number, &mut cells, report);
            } else {
                report.error(
                    DiagnosticKind::UnknownToken,
                    Some(Location::Line(line_number)),
                    format!("unexpected token: {}", tokens[0]),
                );
            }
        }

        match start_line {
            Some(line) if !(cells.is_empty() && class_def1.is_empty() && class_def2.is_empty()) => {
                Err(FontWorkerError::MissingTerminator { line })
            }
            _ => Err(FontWorkerError::Incomplete),
        }
    }

    /// Write the class definitions and adjustments as Font Worker source, without a terminating
    /// line.
    ///
    /// Coverage extras are written as an additional first class, and cells for first class 0 are
    /// written against that class.
    pub fn write_font_worker_source<W: fmt::Write>(
        &self,
        w: &mut W,
        namer: &impl GlyphNamer,
    ) -> fmt::Result {
        let extras_class = if self.coverage_extras.is_empty() {
            None
        } else {
            Some(self.class_def1.max_class() + 1)
        };

        writeln!(w, "{}", FIRST_CLASS_BEGIN)?;
        write_class_lines(w, &self.class_def1, namer)?;
        if let Some(class) = extras_class {
            writeln!(w, "% NOTE: class 0 was renumbered to class {}", class)?;
            for &glyph in &self.coverage_extras {
                writeln!(w, "{}\t{}", namer.glyph_name(glyph), class)?;
            }
        }
        writeln!(w, "{}", CLASS_DEFINITION_END)?;
        writeln!(w)?;

        writeln!(w, "{}", SECOND_CLASS_BEGIN)?;
        write_class_lines(w, &self.class_def2, namer)?;
        writeln!(w, "{}", CLASS_DEFINITION_END)?;
        writeln!(w)?;

        let (renumbered, rest): (Vec<_>, Vec<_>) = self
            .cells
            .iter()
            .partition(|(key, _)| extras_class.is_some() && key.first == 0);
        for (key, value) in rest {
            write_value_lines(w, key.first, key.second, value)?;
        }
        if let Some(class) = extras_class {
            for (key, value) in renumbered {
                write_value_lines(w, class, key.second, value)?;
            }
        }
        Ok(())
    }
}

fn read_class_def(
    source: &mut FontWorkerSource<'_>,
    namer: &impl GlyphNamer,
    report: &Report,
) -> ClassDef {
    let start_line = source.line_number();
    let mut class_def = ClassDef::new();

    while let Some(line) = source.next() {
        if line.eq_ignore_ascii_case(CLASS_DEFINITION_END) {
            return class_def;
        }
        let location = Some(Location::Line(source.line_number()));
        let tokens = line.split('\t').map(str::trim).collect::<Vec<_>>();
        let (name, class) = match tokens.as_slice() {
            &[name, class] => (name, class),
            _ => {
                report.warning(
                    DiagnosticKind::BadLine,
                    location,
                    format!(
                        "incorrect number of tokens, expected 2, found {}",
                        tokens.len()
                    ),
                );
                continue;
            }
        };
        let glyph = match namer.glyph_index(name) {
            Some(glyph) => glyph,
            None => {
                report.warning(
                    DiagnosticKind::UnknownGlyph,
                    location,
                    format!("glyph '{}' not found", name),
                );
                continue;
            }
        };
        let class = match class.parse::<u16>() {
            Ok(class) => class,
            Err(_) => {
                report.warning(
                    DiagnosticKind::BadLine,
                    location,
                    format!(
                        "token '{}' for glyph '{}' could not be parsed as a class index",
                        class, name
                    ),
                );
                continue;
            }
        };
        if class_def.contains(glyph) {
            report.warning(
                DiagnosticKind::DuplicateGlyph,
                location,
                format!("class for '{}' previously defined", name),
            );
            continue;
        }
        if class == 0 {
            report.warning(
                DiagnosticKind::ExplicitClassZero,
                location,
                format!("glyph '{}' explicitly mapped to class 0; will re-map", name),
            );
        }
        class_def.insert(glyph, class);
    }

    report.warning(
        DiagnosticKind::BadLine,
        Some(Location::Line(start_line)),
        format!("did not find matching '{}'", CLASS_DEFINITION_END),
    );
    class_def
}

/// Split `left x advance` and the like into the glyph it applies to (true for the first) and
/// the field.
fn parse_adjustment(keyword: &str) -> Option<(bool, ValueFormat)> {
    let (left, field) = if let Some(field) = keyword.strip_prefix("left ") {
        (true, field)
    } else {
        (false, keyword.strip_prefix("right ")?)
    };
    FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|&(_, flag)| (left, flag))
}

fn read_adjustment(
    tokens: &[&str],
    left: bool,
    field: ValueFormat,
    line_number: usize,
    cells: &mut BTreeMap<Key, PairValue>,
    report: &Report,
) {
    let location = Some(Location::Line(line_number));
    let (class1, class2, delta) = match tokens {
        &[_, class1, class2, delta] => (class1, class2, delta),
        _ => {
            report.error(
                DiagnosticKind::BadLine,
                location,
                format!(
                    "incorrect number of tokens, expected 4, found {}",
                    tokens.len()
                ),
            );
            return;
        }
    };
    let parsed = (
        class1.parse::<i64>(),
        class2.parse::<i64>(),
        delta.parse::<i16>(),
    );
    let (key, delta) = match parsed {
        (Ok(class1), Ok(class2), Ok(delta)) => match Key::try_from((class1, class2)) {
            Ok(key) => (key, delta),
            Err(err) => {
                report.error(DiagnosticKind::BadLine, location, err.to_string());
                return;
            }
        },
        _ => {
            report.error(
                DiagnosticKind::BadLine,
                location,
                format!(
                    "could not parse '{}' as two classes and an adjustment",
                    tokens[1..].iter().join("\t")
                ),
            );
            return;
        }
    };
    if delta == 0 {
        return;
    }

    let value = cells.entry(key).or_default();
    let side = if left {
        &mut value.first
    } else {
        &mut value.second
    };
    let record = side.get_or_insert_with(ValueRecord::default);
    let slot = field_mut(record, field);
    if *slot != 0 {
        report.warning(
            DiagnosticKind::DuplicateToken,
            location,
            format!(
                "ignoring duplicate {} for class pair {},{}",
                tokens[0], class1, class2
            ),
        );
    } else {
        *slot = delta;
    }
}

fn field(record: &ValueRecord, field: ValueFormat) -> i16 {
    if field == ValueFormat::X_PLACEMENT {
        record.x_placement
    } else if field == ValueFormat::Y_PLACEMENT {
        record.y_placement
    } else if field == ValueFormat::X_ADVANCE {
        record.x_advance
    } else {
        record.y_advance
    }
}

fn field_mut(record: &mut ValueRecord, field: ValueFormat) -> &mut i16 {
    if field == ValueFormat::X_PLACEMENT {
        &mut record.x_placement
    } else if field == ValueFormat::Y_PLACEMENT {
        &mut record.y_placement
    } else if field == ValueFormat::X_ADVANCE {
        &mut record.x_advance
    } else {
        &mut record.y_advance
    }
}

fn write_class_lines<W: fmt::Write>(
    w: &mut W,
    class_def: &ClassDef,
    namer: &impl GlyphNamer,
) -> fmt::Result {
    let entries = class_def
        .iter()
        .sorted_by_key(|&(glyph, class)| (class, glyph));
    for (glyph, class) in entries {
        writeln!(w, "{}\t{}", namer.glyph_name(glyph), class)?;
    }
    Ok(())
}

fn write_value_lines<W: fmt::Write>(
    w: &mut W,
    class1: u16,
    class2: u16,
    value: &PairValue,
) -> fmt::Result {
    let sides = [("left", value.first.as_ref()), ("right", value.second.as_ref())];
    for (side, record) in sides {
        let record = match record {
            Some(record) => record,
            None => continue,
        };
        for (name, flag) in FIELDS {
            let delta = field(record, flag);
            if delta != 0 {
                writeln!(w, "{} {}\t{}\t{}\t{}", side, name, class1, class2, delta)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{cd, runone_grid, sample_grid};

    fn names() -> GlyphNames {
        vec![(2, "A"), (3, "B"), (23, "I"), (29, "J")]
            .into_iter()
            .collect()
    }

    fn import(text: &str, report: &Report) -> Result<PairClasses, FontWorkerError> {
        let mut source = FontWorkerSource::new(text);
        PairClasses::from_font_worker_source(
            &mut source,
            &names(),
            FontWorkerOptions::default(),
            report,
        )
    }

    fn x_placement(delta: i16) -> Option<ValueRecord> {
        Some(ValueRecord {
            x_placement: delta,
            ..ValueRecord::default()
        })
    }

    #[test]
    fn test_source_lines() {
        let mut source = FontWorkerSource::new("  a\t1  \n\n% comment\nb\n");
        assert_eq!(source.next(), Some("a\t1"));
        assert_eq!(source.line_number(), 1);
        assert_eq!(source.next(), Some("b"));
        assert_eq!(source.line_number(), 4);
        assert_eq!(source.next(), None);
    }

    #[test]
    fn test_glyph_names() {
        let names = names();
        assert_eq!(names.glyph_index("B"), Some(3));
        assert_eq!(names.glyph_index("g300"), Some(300));
        assert_eq!(names.glyph_index("g"), None);
        assert_eq!(names.glyph_index("gx1"), None);
        assert_eq!(names.glyph_name(23), "I");
        assert_eq!(names.glyph_name(7), "g7");
        assert_eq!(names.glyph_name(0), ".notdef");
    }

    #[test]
    fn test_import_with_unknown_token() {
        let text = "firstclass definition begin
A\t1
B\t2
class definition end

secondclass definition begin
I\t1
J\t2
class definition end

left x placement\t1\t2\t-123
foo
right x placement\t2\t1\t-456
lookup end
";
        let report = Report::new();
        let grid = import(text, &report).unwrap();
        assert_eq!(grid.class_def1, cd(&[(2, 1), (3, 2)]));
        assert_eq!(grid.class_def2, cd(&[(23, 1), (29, 2)]));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cells[&Key::new(1, 2)], PairValue::new(x_placement(-123), None));
        assert_eq!(grid.cells[&Key::new(2, 1)], PairValue::new(None, x_placement(-456)));

        assert_eq!(report.len(), 1);
        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownToken);
        assert_eq!(diagnostics[0].location, Some(Location::Line(12)));
        assert_eq!(diagnostics[0].detail, "unexpected token: foo");
    }

    #[test]
    fn test_duplicate_token_keeps_first() {
        let text = "firstclass definition begin
A\t1
class definition end
secondclass definition begin
I\t1
class definition end
left x advance\t1\t1\t-50
LEFT X ADVANCE\t1\t1\t-70
subtable end
";
        let report = Report::new();
        let grid = import(text, &report).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.count(DiagnosticKind::DuplicateToken), 1);
        assert_eq!(
            report.diagnostics()[0].location,
            Some(Location::Line(8))
        );
        let first = grid.cells[&Key::new(1, 1)].first.as_ref().unwrap();
        assert_eq!(first.x_advance, -50);
    }

    #[test]
    fn test_explicit_class_zero() {
        let text = "firstclass definition begin
A\t0
B\t4
class definition end
secondclass definition begin
I\t1
class definition end
right x placement\t0\t1\t-20
right x placement\t4\t1\t-30
lookup end
";
        let report = Report::new();
        let grid = import(text, &report).unwrap();
        assert_eq!(grid.class_def1, cd(&[(2, 2), (3, 1)]));
        assert_eq!(grid.cells[&Key::new(2, 1)], PairValue::new(None, x_placement(-20)));
        assert_eq!(grid.cells[&Key::new(1, 1)], PairValue::new(None, x_placement(-30)));
        assert_eq!(report.count(DiagnosticKind::ExplicitClassZero), 1);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let text = "firstclass definition begin
A
A\t1\t2
Z\t1
B\tbar
A\t1
A\t2
class definition end
secondclass definition begin
I\t1
class definition end
left x advance\t1\tx\t-50
left x advance\t-1\t1\t-50
left x advance\t1\t1
left x advance\t1\t1\t0
left x advance\t1\t1\t-60
lookup end
";
        let report = Report::new();
        let grid = import(text, &report).unwrap();
        assert_eq!(grid.class_def1, cd(&[(2, 1)]));
        assert_eq!(grid.len(), 1);
        assert_eq!(
            grid.cells[&Key::new(1, 1)].first.as_ref().map(|r| r.x_advance),
            Some(-60)
        );
        assert_eq!(report.count(DiagnosticKind::UnknownGlyph), 1);
        assert_eq!(report.count(DiagnosticKind::DuplicateGlyph), 1);
        // two bad class lines, one unparsable class, then three bad value lines
        assert_eq!(report.count(DiagnosticKind::BadLine), 6);
        assert_eq!(report.count_severity(crate::report::Severity::Error), 3);
    }

    #[test]
    fn test_kern_set_skips_subtable_end() {
        let text = "firstclass definition begin
A\t1
class definition end
secondclass definition begin
I\t1
class definition end
left x advance\t1\t1\t-50
subtable end
right x advance\t1\t1\t-5
lookup end
";
        let mut source = FontWorkerSource::new(text);
        let options = FontWorkerOptions { kern_set: true };
        let grid =
            PairClasses::from_font_worker_source(&mut source, &names(), options, &Report::new())
                .unwrap();
        let value = &grid.cells[&Key::new(1, 1)];
        assert_eq!(value.second.as_ref().map(|r| r.x_advance), Some(-5));
        assert_eq!(source.line_number(), 10);

        let report = Report::new();
        let grid = import(text, &report).unwrap();
        assert_eq!(grid.cells[&Key::new(1, 1)].second, None);
    }

    #[test]
    fn test_missing_terminator() {
        let text = "\n\nfirstclass definition begin\nA\t1\nclass definition end\n";
        assert_eq!(
            import(text, &Report::new()),
            Err(FontWorkerError::MissingTerminator { line: 3 })
        );
        assert_eq!(
            import("", &Report::new()),
            Err(FontWorkerError::Incomplete)
        );

        let report = Report::new();
        let unterminated = "firstclass definition begin\nA\t1\n";
        assert!(import(unterminated, &report).is_err());
        assert_eq!(report.count(DiagnosticKind::BadLine), 1);
    }

    #[test]
    fn test_write() {
        let mut text = String::new();
        runone_grid()
            .write_font_worker_source(&mut text, &GlyphNames::new())
            .unwrap();
        let expected = "firstclass definition begin
g8\t1
class definition end

secondclass definition begin
g20\t1
g15\t2
class definition end

left x advance\t1\t1\t-15
left x advance\t1\t2\t-15
right y placement\t1\t2\t20
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_write_renumbers_coverage_extras() {
        let mut grid = sample_grid();
        grid.insert(Key::new(0, 1), PairValue::new(x_placement(7), None));
        grid.coverage_extras.insert(3);
        let mut text = String::new();
        grid.write_font_worker_source(&mut text, &names()).unwrap();

        assert_eq!(
            text.matches("% NOTE: class 0 was renumbered to class 3").count(),
            1
        );
        assert!(text.contains("B\t3\nclass definition end"));
        assert!(text.ends_with(
            "right x placement\t1\t1\t-10\nleft x placement\t3\t1\t7\n"
        ));
    }

    #[test]
    fn test_write_then_read() {
        let grid = runone_grid();
        let mut text = String::new();
        grid.write_font_worker_source(&mut text, &GlyphNames::new())
            .unwrap();
        text.push_str("subtable end\n");

        let report = Report::new();
        let mut source = FontWorkerSource::new(&text);
        let read = PairClasses::from_font_worker_source(
            &mut source,
            &GlyphNames::new(),
            FontWorkerOptions::default(),
            &report,
        )
        .unwrap();
        assert_eq!(read, grid);
        assert!(report.is_empty());
    }
}
