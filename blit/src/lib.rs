//! Pixel compositing for framebuffer devices with an optional 2D
//! accelerator.
//!
//! A drawing library decomposes shapes into horizontal *runs* of pixels
//! and hands them to this crate, which composites them into a [`Surface`]:
//!
//!  - [`soft`] is the software compositor, the reference for every other
//!    backend.
//!  - [`accel`] defines the [`Accelerator`] interface and its
//!    implementations, including a driver for DMA2D-class engines.
//!  - [`dispatch`] picks a backend for each run and falls back to software
//!    when the accelerator fails.
//!  - [`cache`] keeps the CPU's data cache coherent with the accelerator.
//!
//! # Examples
//!
//!     use blit::{Dispatcher, Pen, PixelFormat, RunStatus, SoftAccel, Surface};
//!
//!     let mut surface = Surface::new(8, 1, PixelFormat::Rgb888).unwrap();
//!     let mut dispatcher = Dispatcher::new(SoftAccel);
//!
//!     let status = dispatcher.fill_run(Pen::new(10, 20, 30, 255), &mut surface, 1, 5);
//!     assert_eq!(status, RunStatus::Software);
//!     assert_eq!(surface.pixel(1, 0), &[10, 20, 30]);
//!     assert_eq!(surface.pixel(0, 0), &[0, 0, 0]);
//!
pub mod accel;
pub mod cache;
pub mod diag;
pub mod dispatch;
pub mod pen;
pub mod soft;
pub mod surface;

pub use self::{
    accel::{AccelError, Accelerator, FlipMode, SoftAccel},
    dispatch::{Backend, Dispatcher, RunStatus},
    pen::Pen,
    surface::{PixelFormat, Surface, SurfaceError},
};
