//! Routing of compositing operations between the accelerator and the
//! software compositor.
use log::{debug, warn};

use crate::{
    accel::{self, AccelError, Accelerator, FlipMode},
    pen::Pen,
    soft,
    surface::{PixelFormat, Surface},
};

/// The backend that should execute an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Hardware,
    Software,
}

/// How an operation was executed.
///
/// The result in memory is the same in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum RunStatus {
    /// The software compositor was selected.
    Software,
    /// The accelerator completed the operation.
    Accelerated,
    /// The accelerator was selected but failed; the software compositor
    /// finished the operation.
    FellBack,
}

/// Chooses a backend for each operation and executes it.
#[derive(Debug)]
pub struct Dispatcher<A> {
    accel: A,
}

impl<A: Accelerator> Dispatcher<A> {
    pub fn new(accel: A) -> Self {
        Self { accel }
    }

    pub fn accelerator(&self) -> &A {
        &self.accel
    }

    pub fn accelerator_mut(&mut self) -> &mut A {
        &mut self.accel
    }

    pub fn into_accelerator(self) -> A {
        self.accel
    }

    /// Choose the backend for an operation writing to `surface`.
    ///
    /// The accelerator has no notion of per-pixel coverage, so it's only
    /// used for unmasked `Rgb888` surfaces that request it and whose buffer
    /// it can access.
    pub fn select_backend(&self, surface: &Surface<'_>, has_mask: bool) -> Backend {
        if surface.use_accelerator
            && !has_mask
            && surface.format() == PixelFormat::Rgb888
            && self.accel.reaches(surface)
        {
            Backend::Hardware
        } else {
            Backend::Software
        }
    }

    /// Fill `count` pixels of `surface` starting at `offset`.
    /// See [`soft::fill_run`].
    pub fn fill_run(
        &mut self,
        pen: Pen,
        surface: &mut Surface<'_>,
        offset: usize,
        count: usize,
    ) -> RunStatus {
        let has_mask = surface.mask().is_some();
        if self.select_backend(surface, has_mask) == Backend::Software {
            soft::fill_run(pen, surface, offset, count);
            return RunStatus::Software;
        }

        match self.accel.fill_or_blend_run(pen, surface, offset, count) {
            Ok(()) => RunStatus::Accelerated,
            Err(e) => {
                let done = e.done();
                log_fallback(&e, "fill_run");
                soft::fill_run(pen, surface, offset + done, count - done);
                RunStatus::FellBack
            }
        }
    }

    /// Composite a run sampled from `src`. See [`soft::copy_run`].
    ///
    /// Runs with varying colors are always composited in software.
    pub fn copy_run(
        &mut self,
        src: &Surface<'_>,
        src_offset: usize,
        dest: &mut Surface<'_>,
        dest_offset: usize,
        count: usize,
        src_step: isize,
    ) -> RunStatus {
        soft::copy_run(src, src_offset, dest, dest_offset, count, src_step);
        RunStatus::Software
    }

    /// Fill the whole `surface` with `pen`.
    pub fn clear(&mut self, pen: Pen, surface: &mut Surface<'_>) -> RunStatus {
        let has_mask = surface.mask().is_some();
        if self.select_backend(surface, has_mask) == Backend::Software {
            let len = surface.len();
            soft::fill_run(pen, surface, 0, len);
            return RunStatus::Software;
        }

        if self.accel.clear(pen, surface) {
            debug!("clear of {:?} fell back to software", surface);
            RunStatus::FellBack
        } else {
            RunStatus::Accelerated
        }
    }

    /// Copy `source` to the display `panel`. See
    /// [`Accelerator::flip_display`].
    ///
    /// The backend is selected by `source`. The accelerator must also be
    /// able to reach the panel.
    ///
    /// # Panics
    ///
    /// Panics if the panel's dimensions or format don't match `mode`.
    pub fn flip_display(
        &mut self,
        source: &Surface<'_>,
        panel: &mut Surface<'_>,
        mode: FlipMode,
    ) -> RunStatus {
        let hardware = self.select_backend(source, false) == Backend::Hardware
            && self.accel.reaches(panel);

        let status = if hardware {
            match self.accel.flip_display(source, panel, mode) {
                Ok(()) => return RunStatus::Accelerated,
                Err(e) => {
                    log_fallback(&e, "flip_display");
                    RunStatus::FellBack
                }
            }
        } else {
            RunStatus::Software
        };

        if let Err(e) = accel::flip(source, panel, mode) {
            panic!("cannot flip {:?} to {:?}: {}", source, panel, e);
        }
        status
    }
}

fn log_fallback(e: &AccelError, op: &str) {
    match e {
        AccelError::Unsupported => debug!("{}: accelerator declined, using software", op),
        _ => warn!("{}: {}; completing in software", op, e),
    }
}
