//! Export of class pair kerning as VOLT project source.
//!
//! VOLT keeps glyph groups (`.vtg`) and lookups (`.vtl`) apart, so the export produces both.
//! Lines are separated by carriage returns, as VOLT writes them.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::error::VoltError;
use crate::fontworker::GlyphNamer;
use crate::layout::{ClassDef, ValueFormat, ValueRecord};
use crate::pairpos::PairClasses;

const LINE_SEPARATOR: &str = "\r";

/// Group definitions and a lookup definition in VOLT syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoltSource {
    pub groups: String,
    pub lookup: String,
}

impl PairClasses {
    /// Express this subtable as VOLT source under the lookup name `label`.
    ///
    /// Only x advance adjustments can be expressed. Every glyph that takes part must belong to a
    /// non-zero class, because VOLT groups cannot stand for "any other glyph".
    pub fn as_volt(&self, label: &str, namer: &impl GlyphNamer) -> Result<VoltSource, VoltError> {
        if !self.coverage_extras.is_empty() {
            return Err(VoltError::CoverageExtras);
        }
        let (first, second) = self.masks();
        if !(first - ValueFormat::X_ADVANCE).is_empty()
            || !(second - ValueFormat::X_ADVANCE).is_empty()
        {
            return Err(VoltError::UnsupportedValueMask {
                first: first.bits(),
                second: second.bits(),
            });
        }
        if self.cells.keys().any(|key| key.first == 0 || key.second == 0) {
            return Err(VoltError::ImplicitClass);
        }

        let group_label = label.replace('\\', "");
        let group_name =
            |prefix: &str, class: u16| format!("kern_{}_{}_{}", prefix, class, group_label);

        let mut groups = vec![String::from(LINE_SEPARATOR)];
        for (prefix, class_def) in [("1ST", &self.class_def1), ("2ND", &self.class_def2)] {
            for (class, glyphs) in class_groups(class_def) {
                groups.push(format!("DEF_GROUP \"{}\"", group_name(prefix, class)));
                groups.push(format!(
                    "ENUM {} END_ENUM",
                    glyphs
                        .iter()
                        .map(|&glyph| format!("GLYPH \"{}\"", namer.glyph_name(glyph)))
                        .join(" ")
                ));
                groups.push(String::from("END_GROUP"));
            }
        }
        groups.push(String::from("END"));

        let mut lookup = vec![
            format!(
                "DEF_LOOKUP \"{}\" PROCESS_BASE SKIP_MARKS DIRECTION LTR",
                label
            ),
            String::from("IN_CONTEXT"),
            String::from("END_CONTEXT"),
            String::from("AS_POSITION"),
            String::from("ADJUST_PAIR"),
        ];
        lookup.push(
            self.first_classes()
                .into_iter()
                .map(|class| format!("FIRST  GROUP \"{}\"", group_name("1ST", class)))
                .join(" "),
        );
        lookup.push(
            self.second_classes()
                .into_iter()
                .map(|class| format!("SECOND  GROUP \"{}\"", group_name("2ND", class)))
                .join(" "),
        );
        for (key, value) in &self.cells {
            lookup.push(format!(
                " {} {} BY {} {}",
                key.first,
                key.second,
                position(value.first.as_ref()),
                position(value.second.as_ref())
            ));
        }
        lookup.extend(
            ["END_ADJUST", "END_POSITION", " END"]
                .iter()
                .map(|line| line.to_string()),
        );

        Ok(VoltSource {
            groups: groups.join(LINE_SEPARATOR),
            lookup: lookup.join(LINE_SEPARATOR),
        })
    }
}

/// Glyphs of each class, both in ascending order.
fn class_groups(class_def: &ClassDef) -> BTreeMap<u16, Vec<u16>> {
    let mut groups = BTreeMap::<u16, Vec<u16>>::new();
    for (glyph, class) in class_def.iter() {
        groups.entry(class).or_default().push(glyph);
    }
    groups
}

fn position(record: Option<&ValueRecord>) -> String {
    match record {
        Some(record) if record.x_advance != 0 => format!("POS ADV {} END_POS", record.x_advance),
        _ => String::from("POS END_POS"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fontworker::GlyphNames;
    use crate::pairpos::{Key, PairValue};
    use crate::tests::{cd, runone_grid, sample_grid};

    fn kerning_grid() -> PairClasses {
        let advance = |x_advance| {
            Some(ValueRecord {
                x_advance,
                ..ValueRecord::default()
            })
        };
        let mut grid = PairClasses::new(
            BTreeMap::new(),
            cd(&[(36, 1), (37, 1), (38, 2)]),
            cd(&[(68, 1)]),
        );
        grid.insert(Key::new(1, 1), PairValue::new(advance(-30), None));
        grid.insert(Key::new(2, 1), PairValue::new(advance(-10), advance(5)));
        grid
    }

    #[test]
    fn test_as_volt() {
        let names = vec![(36, "A"), (37, "B"), (38, "C"), (68, "a")]
            .into_iter()
            .collect::<GlyphNames>();
        let volt = kerning_grid().as_volt("kern\\1", &names).unwrap();
        let groups = [
            "\r",
            "DEF_GROUP \"kern_1ST_1_kern1\"",
            "ENUM GLYPH \"A\" GLYPH \"B\" END_ENUM",
            "END_GROUP",
            "DEF_GROUP \"kern_1ST_2_kern1\"",
            "ENUM GLYPH \"C\" END_ENUM",
            "END_GROUP",
            "DEF_GROUP \"kern_2ND_1_kern1\"",
            "ENUM GLYPH \"a\" END_ENUM",
            "END_GROUP",
            "END",
        ];
        assert_eq!(volt.groups, groups.join("\r"));
        let lookup = [
            "DEF_LOOKUP \"kern\\1\" PROCESS_BASE SKIP_MARKS DIRECTION LTR",
            "IN_CONTEXT",
            "END_CONTEXT",
            "AS_POSITION",
            "ADJUST_PAIR",
            "FIRST  GROUP \"kern_1ST_1_kern1\" FIRST  GROUP \"kern_1ST_2_kern1\"",
            "SECOND  GROUP \"kern_2ND_1_kern1\"",
            " 1 1 BY POS ADV -30 END_POS POS END_POS",
            " 2 1 BY POS ADV -10 END_POS POS ADV 5 END_POS",
            "END_ADJUST",
            "END_POSITION",
            " END",
        ];
        assert_eq!(volt.lookup, lookup.join("\r"));
    }

    #[test]
    fn test_as_volt_rejects() {
        let names = GlyphNames::new();
        assert_eq!(
            sample_grid().as_volt("kern", &names),
            Err(VoltError::UnsupportedValueMask {
                first: 0,
                second: 0x0001
            })
        );
        assert!(matches!(
            runone_grid().as_volt("kern", &names),
            Err(VoltError::UnsupportedValueMask { .. })
        ));

        let mut grid = kerning_grid();
        grid.coverage_extras.insert(3);
        assert_eq!(grid.as_volt("kern", &names), Err(VoltError::CoverageExtras));

        let mut grid = kerning_grid();
        let value = grid.cells[&Key::new(1, 1)].clone();
        grid.insert(Key::new(1, 0), value);
        assert_eq!(grid.as_volt("kern", &names), Err(VoltError::ImplicitClass));
    }
}
