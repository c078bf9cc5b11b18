//! Pixel buffers and their metadata.
use quick_error::quick_error;
use std::fmt;

use crate::pen::Pen;

/// The pixel formats understood by the compositing routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Four bytes per pixel: red, green, blue, alpha.
    Rgba8888,
    /// Three bytes per pixel: red, green, blue.
    Rgb888,
    /// One byte per pixel, an index into the surface's palette.
    Palette8,
    /// One byte per pixel, a coverage value.
    Mask8,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Palette8 | PixelFormat::Mask8 => 1,
        }
    }
}

quick_error! {
    /// A surface was constructed or configured in violation of its
    /// invariants.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SurfaceError {
        BufferSize(expected: usize, actual: usize) {
            display("pixel buffer holds {} bytes, expected {}", actual, expected)
        }
        MaskFormat(format: PixelFormat) {
            display("a mask must be a Mask8 surface, got {:?}", format)
        }
        MaskSize(expected: [u32; 2], actual: [u32; 2]) {
            display("mask is {}x{}, its owner is {}x{}",
                actual[0], actual[1], expected[0], expected[1])
        }
        MissingPalette {
            display("Palette8 surfaces require a palette")
        }
        UnexpectedPalette(format: PixelFormat) {
            display("{:?} surfaces cannot have a palette", format)
        }
        TooLarge(width: u32, height: u32) {
            display("a {}x{} surface does not fit in the address space", width, height)
        }
    }
}

/// A rectangular pixel buffer.
///
/// A `Surface` is created and owned by the caller. The compositing routines
/// only borrow it for the duration of a call and mutate its pixels in place.
///
/// `'m` is the lifetime of the optional [mask](Surface::set_mask).
pub struct Surface<'m> {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    mask: Option<&'m Surface<'m>>,
    palette: Option<Box<[Pen; 256]>>,
    /// The global opacity multiplied into every write.
    pub alpha: u8,
    /// Route eligible runs through the hardware accelerator.
    ///
    /// This is a request, not a guarantee. It's only honored for
    /// [`PixelFormat::Rgb888`] surfaces without a mask.
    pub use_accelerator: bool,
}

impl<'m> Surface<'m> {
    /// Construct a zero-filled surface.
    ///
    /// `Palette8` surfaces must be created by [`Surface::with_palette`].
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, SurfaceError> {
        let len = buffer_len(width, height, format)?;
        Self::from_pixels(vec![0; len], width, height, format)
    }

    /// Construct a surface wrapping an existing pixel buffer.
    pub fn from_pixels(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, SurfaceError> {
        if format == PixelFormat::Palette8 {
            return Err(SurfaceError::MissingPalette);
        }
        Self::build(pixels, width, height, format, None)
    }

    /// Construct a `Palette8` surface.
    pub fn with_palette(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        palette: Box<[Pen; 256]>,
    ) -> Result<Self, SurfaceError> {
        Self::build(pixels, width, height, PixelFormat::Palette8, Some(palette))
    }

    fn build(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Option<Box<[Pen; 256]>>,
    ) -> Result<Self, SurfaceError> {
        let expected = buffer_len(width, height, format)?;
        if pixels.len() != expected {
            return Err(SurfaceError::BufferSize(expected, pixels.len()));
        }

        Ok(Self {
            width,
            height,
            format,
            pixels,
            mask: None,
            palette,
            alpha: 255,
            use_accelerator: false,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Get the number of bytes between vertically adjacent pixels.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Get the pixel value at `(x, y)` as raw bytes.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        &self.pixels[i..i + bpp]
    }

    /// Release the pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    pub fn mask(&self) -> Option<&'m Surface<'m>> {
        self.mask
    }

    /// Attach a coverage mask. Every subsequent write is attenuated by the
    /// mask value at the same position.
    pub fn set_mask(&mut self, mask: &'m Surface<'m>) -> Result<(), SurfaceError> {
        if mask.format != PixelFormat::Mask8 {
            return Err(SurfaceError::MaskFormat(mask.format));
        }
        if [mask.width, mask.height] != [self.width, self.height] {
            return Err(SurfaceError::MaskSize(
                [self.width, self.height],
                [mask.width, mask.height],
            ));
        }
        self.mask = Some(mask);
        Ok(())
    }

    /// Detach the mask, returning it.
    pub fn take_mask(&mut self) -> Option<&'m Surface<'m>> {
        self.mask.take()
    }

    #[inline]
    pub fn palette(&self) -> Option<&[Pen; 256]> {
        self.palette.as_deref()
    }

    /// Replace the palette of a `Palette8` surface.
    pub fn set_palette(&mut self, palette: Box<[Pen; 256]>) -> Result<(), SurfaceError> {
        if self.format != PixelFormat::Palette8 {
            return Err(SurfaceError::UnexpectedPalette(self.format));
        }
        self.palette = Some(palette);
        Ok(())
    }
}

impl fmt::Debug for Surface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("has_mask", &self.mask.is_some())
            .field("has_palette", &self.palette.is_some())
            .field("alpha", &self.alpha)
            .field("use_accelerator", &self.use_accelerator)
            .finish()
    }
}

fn buffer_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, SurfaceError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
        .ok_or(SurfaceError::TooLarge(width, height))
}
