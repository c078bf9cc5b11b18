//! The DMA2D driver.
use log::{debug, trace, warn};

use super::{check_flip, flip_plan, AccelError, Accelerator, FlipMode};
use crate::{
    cache::{Access, CacheMaintenance, CoherencyGuard, Region},
    pen::{combine2, Pen},
    soft,
    surface::{PixelFormat, Surface},
};

/// The engine is operated in RGB888 output mode.
pub const BYTES_PER_PIXEL: usize = 3;

/// Blend transfers are split into chunks of this many pixels. A chunk's
/// destination bytes are saved beforehand and restored if the chunk doesn't
/// complete.
const JOURNAL_PIXELS: usize = 256;

/// The operating mode of the engine. Changing it requires reprogramming
/// the control registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Register to memory: write a constant color.
    Fill,
    /// Blend a constant color over the destination with a constant
    /// opacity.
    Blend { alpha: u8 },
    /// Memory to memory.
    Copy,
}

/// A rectangular transfer.
///
/// `width` pixels are processed per line. After each line, the source and
/// destination addresses skip `src_skip` and `dst_skip` pixels respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub mode: Mode,
    /// The source address. Only used by [`Mode::Copy`].
    pub src: usize,
    pub dst: usize,
    pub width: usize,
    pub height: usize,
    pub src_skip: usize,
    pub dst_skip: usize,
    /// Only used by [`Mode::Fill`] and [`Mode::Blend`].
    pub color: Pen,
}

impl Transfer {
    fn span(&self, base: usize, skip: usize) -> Region {
        let len = if self.width == 0 || self.height == 0 {
            0
        } else {
            ((self.width + skip) * (self.height - 1) + self.width) * BYTES_PER_PIXEL
        };
        Region {
            addr: base,
            len,
            access: Access::Dest,
        }
    }

    /// Get the memory regions accessed by the transfer.
    pub fn regions(&self) -> impl Iterator<Item = Region> {
        let src = if self.mode == Mode::Copy {
            Some(Region {
                access: Access::Source,
                ..self.span(self.src, self.src_skip)
            })
        } else {
            None
        };
        src.into_iter().chain(Some(self.span(self.dst, self.dst_skip)))
    }

    /// Get the number of pixels written.
    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }
}

/// The state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Busy,
    Done,
    /// The engine stopped with an error (e.g., a bus error).
    Fault,
}

/// Register-level access to a DMA2D-class engine.
pub trait Dma2dPort {
    /// Program the control registers for `mode`.
    fn configure(&mut self, mode: Mode);

    /// Start a transfer in the mode set by the last call to `configure`.
    ///
    /// # Safety
    ///
    /// The memory regions described by `transfer` must be valid for the
    /// engine to access until `poll` returns something other than
    /// [`TransferState::Busy`] or `abort` is called. The CPU must not access
    /// them in the meantime.
    unsafe fn start(&mut self, transfer: &Transfer);

    fn poll(&mut self) -> TransferState;

    /// Stop the current transfer. Memory may be partially written.
    fn abort(&mut self);

    /// Check if the engine can access the memory region `addr..addr + len`.
    fn reaches(&self, addr: usize, len: usize) -> bool;
}

impl<T: Dma2dPort + ?Sized> Dma2dPort for &mut T {
    fn configure(&mut self, mode: Mode) {
        (**self).configure(mode)
    }

    unsafe fn start(&mut self, transfer: &Transfer) {
        (**self).start(transfer)
    }

    fn poll(&mut self) -> TransferState {
        (**self).poll()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn reaches(&self, addr: usize, len: usize) -> bool {
        (**self).reaches(addr, len)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dma2dConfig {
    /// The number of times a transfer is polled before it's considered to
    /// have timed out.
    pub poll_limit: usize,
}

impl Default for Dma2dConfig {
    fn default() -> Self {
        Self { poll_limit: 100_000 }
    }
}

/// An [`Accelerator`] driving a DMA2D-class engine.
#[derive(Debug)]
pub struct Dma2d<P, C> {
    engine: Engine<P>,
    cache: C,
}

#[derive(Debug)]
struct Engine<P> {
    port: P,
    config: Dma2dConfig,
    /// The mode the registers are currently programmed for.
    mode: Option<Mode>,
}

/// Why a single transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Timeout,
    Fault,
}

impl Stop {
    fn into_error(self, done: usize) -> AccelError {
        match self {
            Stop::Timeout => AccelError::Timeout { done },
            Stop::Fault => AccelError::Fault { done },
        }
    }
}

impl<P: Dma2dPort> Engine<P> {
    fn set_mode(&mut self, mode: Mode) {
        if self.mode != Some(mode) {
            trace!("reconfiguring: {:?} → {:?}", self.mode, mode);
            self.port.configure(mode);
            self.mode = Some(mode);
        }
    }

    /// Execute a transfer to completion.
    ///
    /// # Safety
    ///
    /// See [`Dma2dPort::start`].
    unsafe fn execute(&mut self, transfer: &Transfer) -> Result<(), Stop> {
        self.set_mode(transfer.mode);
        self.port.start(transfer);

        for _ in 0..self.config.poll_limit {
            match self.port.poll() {
                TransferState::Busy => {}
                TransferState::Done => return Ok(()),
                TransferState::Fault => {
                    warn!("transfer fault: {:?}", transfer);
                    self.port.abort();
                    self.mode = None;
                    return Err(Stop::Fault);
                }
            }
        }

        warn!(
            "transfer did not complete within {} polls: {:?}",
            self.config.poll_limit, transfer
        );
        self.port.abort();
        // The register state after an abort is not trusted
        self.mode = None;
        Err(Stop::Timeout)
    }
}

impl<P: Dma2dPort, C: CacheMaintenance> Dma2d<P, C> {
    pub fn new(port: P, cache: C) -> Self {
        Self::with_config(port, cache, Dma2dConfig::default())
    }

    pub fn with_config(port: P, cache: C, config: Dma2dConfig) -> Self {
        Self {
            engine: Engine {
                port,
                config,
                mode: None,
            },
            cache,
        }
    }

    pub fn port(&self) -> &P {
        &self.engine.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.engine.port
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn config(&self) -> &Dma2dConfig {
        &self.engine.config
    }

    /// Get the mode the engine is currently configured for.
    pub fn mode(&self) -> Option<Mode> {
        self.engine.mode
    }

    /// Execute `transfer` with the cache maintained around it.
    ///
    /// # Safety
    ///
    /// See [`Dma2dPort::start`].
    unsafe fn run(&mut self, transfer: &Transfer) -> Result<(), Stop> {
        let _guard = CoherencyGuard::new(&mut self.cache, transfer.regions());
        self.engine.execute(transfer)
    }

    fn eligible(&self, surface: &Surface<'_>) -> bool {
        surface.format() == PixelFormat::Rgb888
            && surface.mask().is_none()
            && self.reaches(surface)
    }

    /// Fill a `size`-pixel rectangle starting at pixel `offset` with a
    /// single register-to-memory transfer. The rectangle spans whole rows
    /// if it's taller than one line.
    fn fill(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        size: [usize; 2],
    ) -> Result<(), Stop> {
        let dst = surface.pixels_mut()[offset * BYTES_PER_PIXEL..].as_mut_ptr() as usize;
        let transfer = Transfer {
            mode: Mode::Fill,
            src: 0,
            dst,
            width: size[0],
            height: size[1],
            src_skip: 0,
            dst_skip: 0,
            color: pen,
        };
        // Safety: `surface` is mutably borrowed for the duration
        unsafe { self.run(&transfer) }
    }

    /// Blend `count` pixels starting at `offset`, one journaled chunk at a
    /// time.
    fn blend(
        &mut self,
        pen: Pen,
        alpha: u8,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> Result<(), AccelError> {
        let mut journal = [0u8; JOURNAL_PIXELS * BYTES_PER_PIXEL];
        let mut done = 0;

        while done < count {
            let chunk = (count - done).min(JOURNAL_PIXELS);
            let start = (offset + done) * BYTES_PER_PIXEL;
            let bytes = start..start + chunk * BYTES_PER_PIXEL;
            let journal = &mut journal[..chunk * BYTES_PER_PIXEL];

            let pixels = surface.pixels_mut();
            journal.copy_from_slice(&pixels[bytes.clone()]);

            let transfer = Transfer {
                mode: Mode::Blend { alpha },
                src: 0,
                dst: pixels[start..].as_mut_ptr() as usize,
                width: chunk,
                height: 1,
                src_skip: 0,
                dst_skip: 0,
                color: pen,
            };

            // Safety: `surface` is mutably borrowed for the duration
            if let Err(stop) = unsafe { self.run(&transfer) } {
                // The guard has invalidated the range, so this write won't
                // be discarded
                surface.pixels_mut()[bytes].copy_from_slice(journal);
                return Err(stop.into_error(done));
            }

            done += chunk;
        }

        Ok(())
    }
}

impl<P: Dma2dPort, C: CacheMaintenance> Accelerator for Dma2d<P, C> {
    fn reaches(&self, surface: &Surface<'_>) -> bool {
        let pixels = surface.pixels();
        self.engine
            .port
            .reaches(pixels.as_ptr() as usize, pixels.len())
    }

    fn clear(&mut self, pen: Pen, surface: &mut Surface<'_>) -> bool {
        let len = surface.len();

        let result = if !self.eligible(surface) {
            Err(AccelError::Unsupported)
        } else if len == 0 {
            Ok(())
        } else {
            let a = combine2(pen.a, surface.alpha);
            let size = [surface.width() as usize, surface.height() as usize];
            match a {
                0 => Ok(()),
                255 => self.fill(pen, surface, 0, size).map_err(|s| s.into_error(0)),
                _ => self.blend(pen, a, surface, 0, len),
            }
        };

        match result {
            Ok(()) => false,
            Err(e) => {
                debug!("clearing the rest of {:?} in software: {}", surface, e);
                let done = e.done();
                soft::fill_run(pen, surface, done, len - done);
                true
            }
        }
    }

    fn fill_or_blend_run(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> Result<(), AccelError> {
        if !self.eligible(surface) {
            return Err(AccelError::Unsupported);
        }
        assert!(offset + count <= surface.len(), "run is out of bounds");
        if count == 0 {
            return Ok(());
        }

        match combine2(pen.a, surface.alpha) {
            0 => Ok(()),
            255 => self
                .fill(pen, surface, offset, [count, 1])
                .map_err(|s| s.into_error(0)),
            a => self.blend(pen, a, surface, offset, count),
        }
    }

    fn flip_display(
        &mut self,
        source: &Surface<'_>,
        panel: &mut Surface<'_>,
        mode: FlipMode,
    ) -> Result<(), AccelError> {
        check_flip(source, panel, mode)?;
        if source.format() != PixelFormat::Rgb888
            || !self.reaches(source)
            || !self.reaches(panel)
        {
            return Err(AccelError::Unsupported);
        }

        let [src_w, panel_w] = [source.width() as usize, panel.width() as usize];
        let src_base = source.pixels().as_ptr() as usize;
        let panel_base = panel.pixels_mut().as_mut_ptr() as usize;
        let addr = |base: usize, width: usize, [x, y]: [u32; 2]| {
            base + (y as usize * width + x as usize) * BYTES_PER_PIXEL
        };

        for blit in flip_plan::plan([source.width(), source.height()], mode) {
            let (src, stride) = match blit.from {
                flip_plan::Plane::Source => (addr(src_base, src_w, blit.src), src_w),
                flip_plan::Plane::Panel => (addr(panel_base, panel_w, blit.src), panel_w),
            };
            let width = blit.size[0] as usize;
            let transfer = Transfer {
                mode: Mode::Copy,
                src,
                dst: addr(panel_base, panel_w, blit.dst),
                width,
                height: blit.size[1] as usize,
                src_skip: stride - width,
                dst_skip: panel_w - width,
                color: Pen::new(0, 0, 0, 0),
            };

            // Safety: `source` is borrowed and `panel` is mutably borrowed
            // for the duration. Every blit lies within its surfaces.
            unsafe { self.run(&transfer) }.map_err(|s| s.into_error(0))?;
        }

        Ok(())
    }
}
