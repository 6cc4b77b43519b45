// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{BLOCK_SIZE, error::Result, geometry::FrameGeometry};

/// Quantized DCT coefficients of one 8x8 block, in zigzag order.
pub type Block = [i16; BLOCK_SIZE];

/// A band of coefficient block rows of one component.
///
/// The band covers block rows `first_row..first_row + rows`, so the same type
/// serves as a whole-image buffer (`first_row == 0`, all rows) and as the
/// single iMCU row used by the streaming controllers.
#[derive(Debug, Clone)]
pub struct ComponentBlocks {
    blocks_wide: usize,
    rows: usize,
    first_row: usize,
    data: Vec<Block>,
}

impl ComponentBlocks {
    pub fn new(blocks_wide: usize, rows: usize) -> Result<ComponentBlocks> {
        let total = blocks_wide * rows;
        let mut data = Vec::new();
        data.try_reserve_exact(total)?;
        data.resize(total, [0; BLOCK_SIZE]);
        Ok(ComponentBlocks {
            blocks_wide,
            rows,
            first_row: 0,
            data,
        })
    }

    pub fn blocks_wide(&self) -> usize {
        self.blocks_wide
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn contains_row(&self, by: usize) -> bool {
        by >= self.first_row && by < self.first_row + self.rows
    }

    /// Moves the band to start at block row `first_row` and zeroes it.
    pub fn reset(&mut self, first_row: usize) {
        self.first_row = first_row;
        self.data.fill([0; BLOCK_SIZE]);
    }

    pub fn block(&self, bx: usize, by: usize) -> &Block {
        debug_assert!(self.contains_row(by) && bx < self.blocks_wide);
        &self.data[(by - self.first_row) * self.blocks_wide + bx]
    }

    pub fn block_mut(&mut self, bx: usize, by: usize) -> &mut Block {
        debug_assert!(self.contains_row(by) && bx < self.blocks_wide);
        &mut self.data[(by - self.first_row) * self.blocks_wide + bx]
    }

    pub fn row(&self, by: usize) -> &[Block] {
        let start = (by - self.first_row) * self.blocks_wide;
        &self.data[start..start + self.blocks_wide]
    }

    pub fn row_mut(&mut self, by: usize) -> &mut [Block] {
        let start = (by - self.first_row) * self.blocks_wide;
        &mut self.data[start..start + self.blocks_wide]
    }
}

/// Coefficient storage for every component of a frame.
#[derive(Debug, Clone)]
pub struct CoefficientBuffer {
    pub components: Vec<ComponentBlocks>,
}

impl CoefficientBuffer {
    /// Storage for the whole frame, padded to a whole number of MCUs.
    pub fn for_image(geometry: &FrameGeometry) -> Result<CoefficientBuffer> {
        let components = geometry
            .components
            .iter()
            .map(|c| ComponentBlocks::new(c.padded_blocks_wide, c.padded_blocks_high))
            .collect::<Result<_>>()?;
        Ok(CoefficientBuffer { components })
    }

    /// Storage for one iMCU row of every component.
    pub fn for_imcu_row(geometry: &FrameGeometry) -> Result<CoefficientBuffer> {
        let components = geometry
            .components
            .iter()
            .map(|c| ComponentBlocks::new(c.padded_blocks_wide, c.v_samp_factor))
            .collect::<Result<_>>()?;
        Ok(CoefficientBuffer { components })
    }

    /// Moves every band to iMCU row `imcu_row` and zeroes it.
    pub fn reset_to_imcu_row(&mut self, geometry: &FrameGeometry, imcu_row: usize) {
        for (c, blocks) in geometry.components.iter().zip(self.components.iter_mut()) {
            blocks.reset(imcu_row * c.v_samp_factor);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Result;
    use test_log::test;

    #[test]
    fn band_addressing() -> Result<()> {
        let mut band = ComponentBlocks::new(3, 2)?;
        band.reset(4);
        band.block_mut(2, 5)[0] = 7;
        assert_eq!(band.block(2, 5)[0], 7);
        assert_eq!(band.row(5)[2][0], 7);
        assert!(band.contains_row(4));
        assert!(!band.contains_row(6));
        band.reset(6);
        assert!(band.row(7).iter().all(|b| b[0] == 0));
        Ok(())
    }
}
