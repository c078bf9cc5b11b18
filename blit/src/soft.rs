//! The software compositor.
//!
//! Every function here operates on a *run*, a contiguous sequence of pixels
//! addressed by a linear pixel offset and a pixel count. Validation of runs
//! is the caller's job: a run is sliced out of the pixel buffer once (an
//! out-of-range run panics there) and no further checks are made per pixel.
//!
//! # Formats
//!
//! | Destination | Per-pixel operation                                       |
//! | ----------- | --------------------------------------------------------- |
//! | `Rgba8888`  | opaque write, skip, or blend of all four channels         |
//! | `Rgb888`    | opaque write, skip, or blend of three channels            |
//! | `Palette8`  | store the ink index unless it's zero                      |
//! | `Mask8`     | accumulate coverage with the surface's global opacity     |
//!
//! The opacity of a write is `combine(pen.a, surface.alpha)`, or
//! `combine(pen.a, mask, surface.alpha)` if a mask is attached.
use crate::{
    pen::{blend, combine2, combine3, pen_from_bytes, Pen},
    surface::{PixelFormat, Surface},
};

pub(crate) mod rgb;

/// Fill `count` pixels of `dest` starting at pixel `offset` with `pen`.
pub fn fill_run(pen: Pen, dest: &mut Surface<'_>, offset: usize, count: usize) {
    if count == 0 {
        return;
    }

    let alpha = dest.alpha;
    let format = dest.format();
    let mask = dest.mask().map(|m| &m.pixels()[offset..offset + count]);
    let d = run_bytes_mut(dest, offset, count);

    match format {
        PixelFormat::Rgba8888 => {
            for (i, px) in d.chunks_exact_mut(4).enumerate() {
                put_rgba(px, pen, write_alpha(pen.a, mask, i, alpha));
            }
        }
        PixelFormat::Rgb888 => {
            if let Some(mask) = mask {
                for (px, &m) in d.chunks_exact_mut(3).zip(mask) {
                    rgb::put_px(px, pen, combine3(pen.a, m, alpha));
                }
            } else {
                rgb::fill(d, pen, combine2(pen.a, alpha));
            }
        }
        PixelFormat::Palette8 => {
            // `pen.a` doubles as the ink index; zero means "no ink"
            if pen.a != 0 {
                for d in d.iter_mut() {
                    *d = pen.a;
                }
            }
        }
        PixelFormat::Mask8 => {
            for d in d.iter_mut() {
                *d = blend(pen.a, *d, alpha);
            }
        }
    }
}

/// Composite `count` pixels sampled from `src` onto `dest`.
///
/// The `i`-th destination pixel (`dest_offset + i`) is sampled from the
/// source pixel `src_offset + i * src_step`. A negative `src_step` reads
/// backwards (e.g., for mirrored sprites). Every source pixel visited must
/// be in bounds.
///
/// The source pixel is turned into a color as follows:
///
///  - A surface with a palette: `palette[index]`.
///  - `Rgba8888`: the four bytes as they are.
///  - `Rgb888`: the three bytes with full opacity.
///  - `Mask8`: white with the coverage as opacity.
///
/// `Palette8` and `Mask8` destinations take the raw source byte instead if
/// the source has one byte per pixel, or the sampled opacity otherwise. A
/// zero value leaves the destination pixel unchanged.
pub fn copy_run(
    src: &Surface<'_>,
    src_offset: usize,
    dest: &mut Surface<'_>,
    dest_offset: usize,
    count: usize,
    src_step: isize,
) {
    if count == 0 {
        return;
    }

    let sampler = Sampler::new(src, src_offset, src_step, count);

    let alpha = dest.alpha;
    let format = dest.format();
    let mask = dest
        .mask()
        .map(|m| &m.pixels()[dest_offset..dest_offset + count]);
    let d = run_bytes_mut(dest, dest_offset, count);

    match format {
        PixelFormat::Rgba8888 => {
            for (i, (px, pen)) in d.chunks_exact_mut(4).zip(sampler.pens()).enumerate() {
                put_rgba(px, pen, write_alpha(pen.a, mask, i, alpha));
            }
        }
        PixelFormat::Rgb888 => {
            if let Some(mask) = mask {
                for ((px, pen), &m) in d.chunks_exact_mut(3).zip(sampler.pens()).zip(mask) {
                    rgb::put_px(px, pen, combine3(pen.a, m, alpha));
                }
            } else if alpha == 255 && sampler.is_opaque() {
                rgb::write_stream_opaque(d, sampler.pens());
            } else {
                rgb::write_stream(d, sampler.pens().map(|pen| (pen, combine2(pen.a, alpha))));
            }
        }
        PixelFormat::Palette8 => {
            for (d, v) in d.iter_mut().zip(sampler.values()) {
                if v != 0 {
                    *d = v;
                }
            }
        }
        PixelFormat::Mask8 => {
            for (d, v) in d.iter_mut().zip(sampler.values()) {
                if v != 0 {
                    *d = blend(v, *d, alpha);
                }
            }
        }
    }
}

fn run_bytes_mut<'a>(dest: &'a mut Surface<'_>, offset: usize, count: usize) -> &'a mut [u8] {
    let bpp = dest.format().bytes_per_pixel();
    debug_assert!(offset + count <= dest.len(), "run is out of bounds");
    &mut dest.pixels_mut()[offset * bpp..(offset + count) * bpp]
}

#[inline(always)]
fn write_alpha(pen_alpha: u8, mask: Option<&[u8]>, i: usize, alpha: u8) -> u8 {
    match mask {
        Some(mask) => combine3(pen_alpha, mask[i], alpha),
        None => combine2(pen_alpha, alpha),
    }
}

#[inline(always)]
fn put_rgba(px: &mut [u8], pen: Pen, a: u8) {
    if a == 255 {
        px[0] = pen.r;
        px[1] = pen.g;
        px[2] = pen.b;
        px[3] = 255;
    } else if a > 0 {
        px[0] = blend(pen.r, px[0], a);
        px[1] = blend(pen.g, px[1], a);
        px[2] = blend(pen.b, px[2], a);
        px[3] = blend(pen.a, px[3], a);
    }
}

/// Walks the source pixels of a `copy_run`.
struct Sampler<'a> {
    data: &'a [u8],
    format: PixelFormat,
    palette: Option<&'a [Pen; 256]>,
    start: usize,
    step: isize,
    count: usize,
}

impl<'a> Sampler<'a> {
    fn new(src: &'a Surface<'_>, start: usize, step: isize, count: usize) -> Self {
        debug_assert!(start < src.len(), "source run is out of bounds");
        debug_assert!(
            {
                let last = start as isize + step * (count as isize - 1);
                last >= 0 && (last as usize) < src.len()
            },
            "source run is out of bounds"
        );

        Self {
            data: src.pixels(),
            format: src.format(),
            palette: src.palette(),
            start,
            step,
            count,
        }
    }

    /// Check if every sampled color has full opacity.
    fn is_opaque(&self) -> bool {
        self.palette.is_none() && self.format == PixelFormat::Rgb888
    }

    fn indices(&self) -> impl Iterator<Item = usize> {
        let (start, step) = (self.start as isize, self.step);
        (0..self.count as isize).map(move |i| (start + i * step) as usize)
    }

    /// Sampled colors.
    fn pens(&self) -> impl Iterator<Item = Pen> + 'a {
        let (data, format, palette) = (self.data, self.format, self.palette);
        self.indices().map(move |i| match (palette, format) {
            (Some(palette), _) => palette[data[i] as usize],
            (None, PixelFormat::Rgba8888) => pen_from_bytes(&data[i * 4..]),
            (None, PixelFormat::Rgb888) => {
                let px = &data[i * 3..i * 3 + 3];
                Pen::new(px[0], px[1], px[2], 255)
            }
            (None, _) => Pen::new(255, 255, 255, data[i]),
        })
    }

    /// Sampled single-byte values for `Palette8` and `Mask8` destinations.
    fn values(&self) -> impl Iterator<Item = u8> + 'a {
        let data = self.data;
        let raw = self.format.bytes_per_pixel() == 1;
        let pens = self.pens();
        self.indices()
            .zip(pens)
            .map(move |(i, pen)| if raw { data[i] } else { pen.a })
    }
}
