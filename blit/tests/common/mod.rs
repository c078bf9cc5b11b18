#![allow(dead_code)]
use blit::{Pen, PixelFormat, Surface};

pub fn try_init_logger_for_default_harness() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A deterministic byte pattern.
pub struct Xorshift32(pub u32);

impl Iterator for Xorshift32 {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        Some(self.0)
    }
}

/// Construct an `Rgb888` surface filled with noise.
pub fn noise_rgb(width: u32, height: u32, seed: u32) -> Surface<'static> {
    let len = (width * height * 3) as usize;
    let pixels = Xorshift32(seed).take(len).map(|x| x as u8).collect();
    Surface::from_pixels(pixels, width, height, PixelFormat::Rgb888).unwrap()
}

/// Construct a copy of `s` without its mask and palette.
pub fn clone_rgb(s: &Surface<'_>) -> Surface<'static> {
    let mut out =
        Surface::from_pixels(s.pixels().to_vec(), s.width(), s.height(), s.format()).unwrap();
    out.alpha = s.alpha;
    out.use_accelerator = s.use_accelerator;
    out
}

pub fn pens() -> Vec<Pen> {
    vec![
        Pen::new(10, 20, 30, 255),
        Pen::new(0x11, 0x22, 0xff, 255),
        Pen::new(0, 0, 255, 10),
        Pen::new(255, 128, 0, 128),
        Pen::new(1, 2, 3, 0),
    ]
}
