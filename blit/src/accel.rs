//! Hardware 2D accelerators.
//!
//! An [`Accelerator`] performs a subset of the compositing operations on a
//! bulk data mover. Accelerators are a performance optimization only: every
//! implementation must produce the same bytes as the [software
//! compositor](crate::soft).
//!
//!  - [`SoftAccel`] implements the interface on the software compositor.
//!    It's used on hosts without an accelerator and as a reference.
//!  - [`Dma2d`] drives a DMA2D-class engine through a [`Dma2dPort`].
//!  - [`SimPort`] is a [`Dma2dPort`] that simulates the engine in software.
use quick_error::quick_error;

use crate::{pen::Pen, surface::Surface};

mod dma2d;
pub mod flip_plan;
mod sim;
mod soft;

pub use self::{
    dma2d::{Dma2d, Dma2dConfig, Dma2dPort, Mode, Transfer, TransferState, BYTES_PER_PIXEL},
    sim::SimPort,
    soft::{flip, SoftAccel},
};

/// Selects the output resolution of [`Accelerator::flip_display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipMode {
    /// The panel has the same dimensions as the source.
    Full,
    /// The panel is twice as large as the source in both directions. Every
    /// source pixel becomes a 2×2 block.
    Half,
}

quick_error! {
    /// An accelerator could not complete an operation.
    ///
    /// For runs, `done` is the number of leading pixels already in their
    /// final state. The remaining pixels are in a state where compositing
    /// them in software produces the correct result.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AccelError {
        Timeout { done: usize } {
            display("transfer timed out after {} pixels", done)
        }
        Fault { done: usize } {
            display("transfer error after {} pixels", done)
        }
        /// The accelerator can't operate on the given surfaces. Nothing was
        /// written.
        Unsupported {
            display("operation not supported by the accelerator")
        }
    }
}

impl AccelError {
    /// Get the number of pixels completed before the failure.
    pub fn done(&self) -> usize {
        match *self {
            AccelError::Timeout { done } | AccelError::Fault { done } => done,
            AccelError::Unsupported => 0,
        }
    }
}

/// A 2D accelerator.
pub trait Accelerator {
    /// Check if the accelerator can access the pixel buffer of `surface`.
    ///
    /// This is a property of the platform (e.g., which memory banks the
    /// accelerator is wired to), not of the surface's format.
    fn reaches(&self, surface: &Surface<'_>) -> bool;

    /// Fill the whole `surface` with `pen` (attenuated by `surface.alpha`).
    ///
    /// The surface is always cleared when this returns. Returns `true` if
    /// some or all of the work had to be done in software.
    fn clear(&mut self, pen: Pen, surface: &mut Surface<'_>) -> bool;

    /// Fill or blend `count` pixels of `surface` starting at pixel `offset`
    /// with `pen`, with the same result as [`crate::soft::fill_run`].
    ///
    /// Masked surfaces aren't supported.
    fn fill_or_blend_run(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> Result<(), AccelError>;

    /// Copy `source` to the display `panel`, upscaling it if `mode` is
    /// [`FlipMode::Half`].
    ///
    /// On error, the contents of `panel` are unspecified.
    fn flip_display(
        &mut self,
        source: &Surface<'_>,
        panel: &mut Surface<'_>,
        mode: FlipMode,
    ) -> Result<(), AccelError>;
}

impl<T: Accelerator + ?Sized> Accelerator for &mut T {
    fn reaches(&self, surface: &Surface<'_>) -> bool {
        (**self).reaches(surface)
    }

    fn clear(&mut self, pen: Pen, surface: &mut Surface<'_>) -> bool {
        (**self).clear(pen, surface)
    }

    fn fill_or_blend_run(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> Result<(), AccelError> {
        (**self).fill_or_blend_run(pen, surface, offset, count)
    }

    fn flip_display(
        &mut self,
        source: &Surface<'_>,
        panel: &mut Surface<'_>,
        mode: FlipMode,
    ) -> Result<(), AccelError> {
        (**self).flip_display(source, panel, mode)
    }
}

/// Check the panel geometry for a flip.
pub(crate) fn check_flip(
    source: &Surface<'_>,
    panel: &Surface<'_>,
    mode: FlipMode,
) -> Result<(), AccelError> {
    let scale = match mode {
        FlipMode::Full => 1,
        FlipMode::Half => 2,
    };
    if source.format() != panel.format()
        || source.width().checked_mul(scale) != Some(panel.width())
        || source.height().checked_mul(scale) != Some(panel.height())
    {
        return Err(AccelError::Unsupported);
    }
    Ok(())
}
