//! Applying a class pair grid to a run of glyphs.

use std::ops::AddAssign;

use tinyvec::ArrayVec;

use crate::layout::ValueRecord;
use crate::pairpos::{Key, PairClasses};

/// Accumulated positioning deltas for one glyph of a run.
///
/// Device adjustments depend on the rendering size and are not included.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Effect {
    pub x_placement: i32,
    pub y_placement: i32,
    pub x_advance: i32,
    pub y_advance: i32,
}

impl Effect {
    pub fn is_empty(&self) -> bool {
        *self == Effect::default()
    }
}

impl From<&ValueRecord> for Effect {
    fn from(record: &ValueRecord) -> Self {
        Effect {
            x_placement: i32::from(record.x_placement),
            y_placement: i32::from(record.y_placement),
            x_advance: i32::from(record.x_advance),
            y_advance: i32::from(record.y_advance),
        }
    }
}

impl AddAssign for Effect {
    fn add_assign(&mut self, other: Effect) {
        self.x_placement += other.x_placement;
        self.y_placement += other.y_placement;
        self.x_advance += other.x_advance;
        self.y_advance += other.y_advance;
    }
}

impl PairClasses {
    /// Try to match a pair starting at `glyphs[start]`.
    ///
    /// The pair is formed from the first two glyphs at or after `start` for which `is_ignorable`
    /// returns false. The first glyph must have a first class or be a coverage extra; the second
    /// glyph's class defaults to 0.
    ///
    /// On a match, returns one `Effect` per glyph in `glyphs` (starting from a copy of
    /// `cumulative`, if given) and the number of glyphs consumed. The count is 1 when the matched
    /// value leaves the second glyph alone, so it may start the next pair, and 2 otherwise.
    pub fn run_one<F>(
        &self,
        glyphs: &[u16],
        start: usize,
        cumulative: Option<&[Effect]>,
        is_ignorable: F,
    ) -> Option<(Vec<Effect>, usize)>
    where
        F: Fn(usize, u16) -> bool,
    {
        let indices = glyphs
            .iter()
            .enumerate()
            .skip(start)
            .filter(|&(index, &glyph)| !is_ignorable(index, glyph))
            .map(|(index, _)| index)
            .take(2)
            .collect::<ArrayVec<[usize; 2]>>();
        let (i1, i2) = match indices.as_slice() {
            &[i1, i2] => (i1, i2),
            _ => return None,
        };

        let (g1, g2) = (glyphs[i1], glyphs[i2]);
        let class1 = match self.class_def1.get(g1) {
            Some(class) => class,
            None if self.coverage_extras.contains(&g1) => 0,
            None => return None,
        };
        let class2 = self.class_def2.get_or(g2, 0);
        let value = self.get(Key::new(class1, class2))?;

        let mut effects = match cumulative {
            Some(cumulative) => cumulative.to_vec(),
            None => Vec::new(),
        };
        effects.resize(glyphs.len(), Effect::default());
        if let Some(first) = &value.first {
            effects[i1] += Effect::from(first);
        }
        if let Some(second) = &value.second {
            effects[i2] += Effect::from(second);
        }
        let count = if value.second.is_some() { 2 } else { 1 };
        Some((effects, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairpos::PairValue;
    use crate::tests::{cd, runone_grid};
    use std::collections::BTreeMap;

    fn never(_index: usize, _glyph: u16) -> bool {
        false
    }

    #[test]
    fn test_first_only_counts_one() {
        let delta = ValueRecord {
            x_advance: -40,
            ..ValueRecord::default()
        };
        let mut grid = PairClasses::new(BTreeMap::new(), cd(&[(8, 1)]), cd(&[(15, 1)]));
        grid.insert(Key::new(1, 1), PairValue::new(Some(delta.clone()), None));

        let (effects, count) = grid.run_one(&[8, 15], 0, None, never).unwrap();
        assert_eq!(count, 1);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::from(&delta));
        assert!(effects[1].is_empty());
    }

    #[test]
    fn test_skips_ignorable_glyphs() {
        let grid = runone_grid();
        let glyphs = [8, 8, 77, 20, 8, 77, 15];
        let ignorable = |_index: usize, glyph: u16| glyph == 77;

        assert_eq!(grid.run_one(&glyphs, 0, None, ignorable), None);

        let (effects, count) = grid.run_one(&glyphs, 1, None, ignorable).unwrap();
        assert_eq!(count, 1);
        assert_eq!(effects[1].x_advance, -15);
        assert_eq!(effects.iter().filter(|effect| !effect.is_empty()).count(), 1);

        let (effects, count) = grid
            .run_one(&glyphs, 4, Some(&effects), ignorable)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(effects[1].x_advance, -15);
        assert_eq!(effects[4].x_advance, -15);
        assert_eq!(effects[6].y_placement, 20);
        assert_eq!(effects.iter().filter(|effect| !effect.is_empty()).count(), 3);
    }

    #[test]
    fn test_cumulative_is_not_modified() {
        let grid = runone_grid();
        let cumulative = vec![Effect::default(); 2];
        let (effects, _) = grid.run_one(&[8, 20], 0, Some(&cumulative), never).unwrap();
        assert!(cumulative.iter().all(Effect::is_empty));
        assert_eq!(effects[0].x_advance, -15);
    }

    #[test]
    fn test_coverage_extras_match_class_zero() {
        let mut grid = runone_grid();
        let zero_row = PairValue::new(
            None,
            Some(ValueRecord {
                x_placement: 12,
                ..ValueRecord::default()
            }),
        );
        grid.insert(Key::new(0, 1), zero_row);
        assert_eq!(grid.run_one(&[3, 20], 0, None, never), None);

        grid.coverage_extras.insert(3);
        let (effects, count) = grid.run_one(&[3, 20], 0, None, never).unwrap();
        assert_eq!(count, 2);
        assert_eq!(effects[1].x_placement, 12);
    }

    #[test]
    fn test_too_few_glyphs() {
        let grid = runone_grid();
        assert_eq!(grid.run_one(&[8], 0, None, never), None);
        assert_eq!(grid.run_one(&[8, 20], 2, None, never), None);
        assert_eq!(grid.run_one(&[8, 20], 0, None, |_, _| true), None);
    }
}
