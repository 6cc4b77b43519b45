// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block and MCU geometry shared by both directions.

use crate::{
    BLOCK_DIM, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN,
    error::{Error, Result},
    headers::FrameHeader,
    util::div_ceil,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentGeometry {
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    /// Size of the component plane in samples.
    pub downsampled_width: usize,
    pub downsampled_height: usize,
    /// Blocks that hold image data.
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    /// Blocks in a whole number of MCUs.
    pub padded_blocks_wide: usize,
    pub padded_blocks_high: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub max_h_samp_factor: usize,
    pub max_v_samp_factor: usize,
    /// MCUs per row of an interleaved scan.
    pub mcus_per_row: usize,
    /// Rows of iMCUs, which is also the number of MCU rows of an interleaved
    /// scan.
    pub imcu_rows: usize,
    pub components: Vec<ComponentGeometry>,
}

impl FrameGeometry {
    /// `sampling` holds each component's (h, v) factors. A single-component
    /// frame always behaves as 1x1, whatever its header says.
    pub fn new(width: usize, height: usize, sampling: &[(u8, u8)]) -> FrameGeometry {
        let sampling: Vec<(usize, usize)> = if sampling.len() == 1 {
            vec![(1, 1)]
        } else {
            sampling
                .iter()
                .map(|&(h, v)| (h as usize, v as usize))
                .collect()
        };
        let max_h = sampling.iter().map(|s| s.0).max().unwrap_or(1);
        let max_v = sampling.iter().map(|s| s.1).max().unwrap_or(1);
        let mcus_per_row = div_ceil(width, max_h * BLOCK_DIM);
        let imcu_rows = div_ceil(height, max_v * BLOCK_DIM);
        let components = sampling
            .iter()
            .map(|&(h, v)| ComponentGeometry {
                h_samp_factor: h,
                v_samp_factor: v,
                downsampled_width: div_ceil(width * h, max_h),
                downsampled_height: div_ceil(height * v, max_v),
                width_in_blocks: div_ceil(width * h, max_h * BLOCK_DIM),
                height_in_blocks: div_ceil(height * v, max_v * BLOCK_DIM),
                padded_blocks_wide: mcus_per_row * h,
                padded_blocks_high: imcu_rows * v,
            })
            .collect();
        FrameGeometry {
            width,
            height,
            max_h_samp_factor: max_h,
            max_v_samp_factor: max_v,
            mcus_per_row,
            imcu_rows,
            components,
        }
    }

    pub fn from_header(frame: &FrameHeader) -> FrameGeometry {
        let sampling: Vec<_> = frame
            .components
            .iter()
            .map(|c| (c.h_samp_factor, c.v_samp_factor))
            .collect();
        Self::new(frame.width, frame.height, &sampling)
    }

    /// Full-resolution rows covered by one iMCU row.
    pub fn imcu_height(&self) -> usize {
        self.max_v_samp_factor * BLOCK_DIM
    }

    /// Full-resolution columns covered by the padded MCU grid.
    pub fn padded_width(&self) -> usize {
        self.mcus_per_row * self.max_h_samp_factor * BLOCK_DIM
    }
}

/// One block of an MCU: which scan component it belongs to and its offset
/// inside the component's MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McuBlock {
    pub scan_component: usize,
    pub dx: usize,
    pub dy: usize,
}

/// Traversal of a scan's MCUs over the component block grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLayout {
    /// Frame component indices, in scan order.
    pub components: Vec<usize>,
    pub mcus_per_row: usize,
    pub mcu_rows: usize,
    /// Blocks of one MCU in coding order.
    pub mcu_blocks: Vec<McuBlock>,
    /// (h, v) extent of each scan component's part of an MCU.
    mcu_extent: Vec<(usize, usize)>,
}

impl ScanLayout {
    pub fn new(geometry: &FrameGeometry, components: &[usize]) -> Result<ScanLayout> {
        if components.is_empty() || components.len() > MAX_COMPS_IN_SCAN {
            return Err(Error::InvalidComponentCount(components.len()));
        }
        if components.len() == 1 {
            // Non-interleaved: one block per MCU over the real block grid.
            let c = &geometry.components[components[0]];
            return Ok(ScanLayout {
                components: components.to_vec(),
                mcus_per_row: c.width_in_blocks,
                mcu_rows: c.height_in_blocks,
                mcu_blocks: vec![McuBlock {
                    scan_component: 0,
                    dx: 0,
                    dy: 0,
                }],
                mcu_extent: vec![(1, 1)],
            });
        }
        let mut mcu_blocks = vec![];
        let mut mcu_extent = vec![];
        for (sc, &ci) in components.iter().enumerate() {
            let c = &geometry.components[ci];
            mcu_extent.push((c.h_samp_factor, c.v_samp_factor));
            for dy in 0..c.v_samp_factor {
                for dx in 0..c.h_samp_factor {
                    mcu_blocks.push(McuBlock {
                        scan_component: sc,
                        dx,
                        dy,
                    });
                }
            }
        }
        if mcu_blocks.len() > MAX_BLOCKS_IN_MCU {
            return Err(Error::TooManyBlocksInMcu(mcu_blocks.len()));
        }
        Ok(ScanLayout {
            components: components.to_vec(),
            mcus_per_row: geometry.mcus_per_row,
            mcu_rows: geometry.imcu_rows,
            mcu_blocks,
            mcu_extent,
        })
    }

    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }

    pub fn total_mcus(&self) -> usize {
        self.mcus_per_row * self.mcu_rows
    }

    /// Block coordinates of `block` within its component for the MCU at
    /// (`mcu_x`, `mcu_y`).
    pub fn block_position(&self, block: &McuBlock, mcu_x: usize, mcu_y: usize) -> (usize, usize) {
        let (h, v) = self.mcu_extent[block.scan_component];
        (mcu_x * h + block.dx, mcu_y * v + block.dy)
    }
}
