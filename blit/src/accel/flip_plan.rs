//! Transfer plans for flipping a frame to the display panel.
//!
//! The DMA engine only moves rectangles, so the 2× upscale of
//! [`FlipMode::Half`] is expressed as three passes of rectangle copies:
//!
//!  1. Each source column `x` goes to panel column `2x` of the top half.
//!  2. Each row `y` of the top half is replicated to rows `2y` and `2y + 1`,
//!     bottom-up so that no row is overwritten before it's read.
//!  3. Each panel column `2x` is duplicated to column `2x + 1`.
//!
//! After the last pass, every 2×2 block of the panel holds one source pixel.
use std::iter;

use super::FlipMode;

/// The surface a [`Blit`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Source,
    Panel,
}

/// A rectangle copy, in pixels. The destination is always the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blit {
    pub from: Plane,
    pub src: [u32; 2],
    pub dst: [u32; 2],
    pub size: [u32; 2],
}

/// Enumerate the copies that flip a `size`-pixel source in the given mode.
pub fn plan(size: [u32; 2], mode: FlipMode) -> impl Iterator<Item = Blit> {
    let [w, h] = size;
    let empty = w == 0 || h == 0;

    let full = if mode == FlipMode::Full && !empty {
        Some(Blit {
            from: Plane::Source,
            src: [0, 0],
            dst: [0, 0],
            size,
        })
    } else {
        None
    };

    let half = if mode == FlipMode::Half && !empty {
        Some(half_plan(w, h))
    } else {
        None
    };

    full.into_iter().chain(half.into_iter().flatten())
}

fn half_plan(w: u32, h: u32) -> impl Iterator<Item = Blit> {
    let spread = (0..w).map(move |x| Blit {
        from: Plane::Source,
        src: [x, 0],
        dst: [x * 2, 0],
        size: [1, h],
    });

    let replicate = (0..h).rev().flat_map(move |y| {
        let row = |to: u32| Blit {
            from: Plane::Panel,
            src: [0, y],
            dst: [0, to],
            size: [w * 2, 1],
        };
        // Row 0 is already in place
        iter::once(row(y * 2 + 1)).chain(if y > 0 { Some(row(y * 2)) } else { None })
    });

    let duplicate = (0..w).map(move |x| Blit {
        from: Plane::Panel,
        src: [x * 2, 0],
        dst: [x * 2 + 1, 0],
        size: [1, h * 2],
    });

    spread.chain(replicate).chain(duplicate)
}
