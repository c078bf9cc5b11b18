use super::{check_flip, AccelError, Accelerator, FlipMode};
use crate::{pen::Pen, soft, surface::Surface};

/// An [`Accelerator`] that does everything in software.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftAccel;

impl Accelerator for SoftAccel {
    fn reaches(&self, _: &Surface<'_>) -> bool {
        true
    }

    fn clear(&mut self, pen: Pen, surface: &mut Surface<'_>) -> bool {
        let len = surface.len();
        soft::fill_run(pen, surface, 0, len);
        false
    }

    fn fill_or_blend_run(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> Result<(), AccelError> {
        soft::fill_run(pen, surface, offset, count);
        Ok(())
    }

    fn flip_display(
        &mut self,
        source: &Surface<'_>,
        panel: &mut Surface<'_>,
        mode: FlipMode,
    ) -> Result<(), AccelError> {
        flip(source, panel, mode)
    }
}

/// Copy `source` to `panel` in software. See [`Accelerator::flip_display`].
pub fn flip(
    source: &Surface<'_>,
    panel: &mut Surface<'_>,
    mode: FlipMode,
) -> Result<(), AccelError> {
    check_flip(source, panel, mode)?;
    if source.is_empty() {
        return Ok(());
    }

    match mode {
        FlipMode::Full => {
            panel.pixels_mut().copy_from_slice(source.pixels());
        }
        FlipMode::Half => {
            let bpp = source.format().bytes_per_pixel();
            let src_stride = source.stride();
            let src = source.pixels();

            for (y, row) in panel.pixels_mut().chunks_exact_mut(src_stride * 2).enumerate() {
                let src_row = &src[y / 2 * src_stride..][..src_stride];
                for (out, px) in row.chunks_exact_mut(bpp * 2).zip(src_row.chunks_exact(bpp)) {
                    out[..bpp].copy_from_slice(px);
                    out[bpp..].copy_from_slice(px);
                }
            }
        }
    }

    Ok(())
}
