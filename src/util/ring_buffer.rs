// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;

/// A sliding window of row groups over one plane of 8-bit samples.
///
/// Groups are addressed by their absolute index in the plane and stored in
/// slot `index % capacity`, so pushing a new group evicts the oldest one.
/// Filters that need one row of context above or below a group ask for it
/// through [`RowGroupRing::context_above`] and
/// [`RowGroupRing::context_below`], which duplicate the edge row at the top
/// and bottom of the plane.
pub struct RowGroupRing {
    width: usize,
    group_height: usize,
    capacity: usize,
    data: Vec<u8>,
    // Absolute index of the next group to be pushed.
    next_group: usize,
    finished: bool,
}

impl RowGroupRing {
    pub fn new(width: usize, group_height: usize, capacity: usize) -> Result<RowGroupRing> {
        debug_assert!(capacity >= 1 && group_height >= 1);
        let total = width * group_height * capacity;
        let mut data = vec![];
        data.try_reserve_exact(total)?;
        data.resize(total, 0);
        Ok(RowGroupRing {
            width,
            group_height,
            capacity,
            data,
            next_group: 0,
            finished: false,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn group_height(&self) -> usize {
        self.group_height
    }

    /// Number of groups pushed so far.
    pub fn groups_pushed(&self) -> usize {
        self.next_group
    }

    /// Makes room for the next group and returns its absolute index. The
    /// contents of the new group are stale until written.
    pub fn push_group(&mut self) -> usize {
        debug_assert!(!self.finished);
        let g = self.next_group;
        self.next_group += 1;
        g
    }

    /// Declares that no more groups will be pushed; the last group pushed
    /// becomes the bottom edge of the plane.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn contains(&self, group: usize) -> bool {
        group < self.next_group && group + self.capacity >= self.next_group
    }

    fn offset(&self, group: usize, row: usize) -> usize {
        debug_assert!(self.contains(group), "group {group} not in window");
        debug_assert!(row < self.group_height);
        ((group % self.capacity) * self.group_height + row) * self.width
    }

    pub fn row(&self, group: usize, row: usize) -> &[u8] {
        let start = self.offset(group, row);
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, group: usize, row: usize) -> &mut [u8] {
        let start = self.offset(group, row);
        &mut self.data[start..start + self.width]
    }

    /// The row just above `group`: the last row of the previous group, or
    /// the group's own first row at the top of the plane.
    pub fn context_above(&self, group: usize) -> &[u8] {
        if group > 0 && self.contains(group - 1) {
            self.row(group - 1, self.group_height - 1)
        } else {
            self.row(group, 0)
        }
    }

    /// The row just below `group`: the first row of the next group, or the
    /// group's own last row at the bottom of the plane.
    pub fn context_below(&self, group: usize) -> &[u8] {
        if self.contains(group + 1) {
            self.row(group + 1, 0)
        } else {
            debug_assert!(self.finished, "context below group {group} not pushed yet");
            self.row(group, self.group_height - 1)
        }
    }

    /// Row `row` of the plane by absolute index, where indices outside
    /// `0..valid_rows` select the nearest valid row. Rows of the last group
    /// past `valid_rows` are padding, so edge filters read through this.
    pub fn clamped_row(&self, row: isize, valid_rows: usize) -> &[u8] {
        debug_assert!(valid_rows > 0);
        let r = row.clamp(0, valid_rows as isize - 1) as usize;
        self.row(r / self.group_height, r % self.group_height)
    }

    /// Row `row` of `group`, where -1 and `group_height` select the context
    /// rows above and below.
    pub fn row_with_context(&self, group: usize, row: isize) -> &[u8] {
        if row < 0 {
            self.context_above(group)
        } else if row as usize >= self.group_height {
            self.context_below(group)
        } else {
            self.row(group, row as usize)
        }
    }
}

#[cfg(test)]
mod test {
    use super::RowGroupRing;
    use crate::error::Result;
    use test_log::test;

    fn fill(ring: &mut RowGroupRing, group: usize) {
        for r in 0..ring.group_height() {
            let v = (group * 10 + r) as u8;
            ring.row_mut(group, r).fill(v);
        }
    }

    #[test]
    fn edges_are_duplicated() -> Result<()> {
        let mut ring = RowGroupRing::new(4, 2, 3)?;
        let g0 = ring.push_group();
        fill(&mut ring, g0);
        assert_eq!(ring.context_above(0), &[0, 0, 0, 0]);
        let g1 = ring.push_group();
        fill(&mut ring, g1);
        assert_eq!(ring.context_below(0), &[10, 10, 10, 10]);
        assert_eq!(ring.context_above(1), &[1, 1, 1, 1]);
        ring.finish();
        assert_eq!(ring.context_below(1), &[11, 11, 11, 11]);
        assert_eq!(ring.row_with_context(1, -1), &[1, 1, 1, 1]);
        assert_eq!(ring.row_with_context(1, 2), &[11, 11, 11, 11]);
        Ok(())
    }

    #[test]
    fn old_groups_are_evicted() -> Result<()> {
        let mut ring = RowGroupRing::new(1, 1, 3)?;
        for _ in 0..5 {
            let g = ring.push_group();
            fill(&mut ring, g);
        }
        assert!(!ring.contains(1));
        assert!(ring.contains(2));
        assert!(ring.contains(4));
        assert_eq!(ring.row(4, 0), &[40]);
        assert_eq!(ring.row(2, 0), &[20]);
        assert_eq!(ring.context_above(3), &[20]);
        Ok(())
    }

    #[test]
    fn clamped_rows_stop_at_valid_data() -> Result<()> {
        let mut ring = RowGroupRing::new(1, 4, 3)?;
        for _ in 0..2 {
            let g = ring.push_group();
            fill(&mut ring, g);
        }
        ring.finish();
        assert_eq!(ring.clamped_row(-1, 6), &[0]);
        assert_eq!(ring.clamped_row(5, 6), &[11]);
        assert_eq!(ring.clamped_row(6, 6), &[11]);
        assert_eq!(ring.clamped_row(7, 6), &[11]);
        Ok(())
    }
}
