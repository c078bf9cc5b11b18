//! `Rgb888` runs.
//!
//! Three-byte pixels never line up with machine words, so long runs are
//! written as a byte stream: up to three leading bytes one at a time, then
//! aligned 32-bit words, then whatever is left. The word loops are purely an
//! optimization and produce exactly what [`put_px`] would, for every run
//! length and every starting alignment.
use zerocopy::LayoutVerified;

use crate::pen::{blend, Pen};

/// Runs up to this many pixels long skip the word walk.
const SHORT_RUN: usize = 4;

/// Write a single pixel with opacity `a`.
#[inline(always)]
pub(crate) fn put_px(px: &mut [u8], pen: Pen, a: u8) {
    if a == 255 {
        px[0] = pen.r;
        px[1] = pen.g;
        px[2] = pen.b;
    } else if a > 0 {
        px[0] = blend(pen.r, px[0], a);
        px[1] = blend(pen.g, px[1], a);
        px[2] = blend(pen.b, px[2], a);
    }
}

/// Fill `d` (a whole number of pixels) with `pen` at a constant opacity `a`.
pub(crate) fn fill(d: &mut [u8], pen: Pen, a: u8) {
    debug_assert_eq!(d.len() % 3, 0);

    if a == 0 {
        return;
    }

    if d.len() <= SHORT_RUN * 3 {
        fill_naive(d, pen, a);
    } else if a == 255 {
        fill_words_opaque(d, pen);
    } else {
        fill_words_blend(d, pen, a);
    }
}

/// The reference implementation of [`fill`].
pub(crate) fn fill_naive(d: &mut [u8], pen: Pen, a: u8) {
    for px in d.chunks_exact_mut(3) {
        put_px(px, pen, a);
    }
}

/// Write a stream of pixels with individual opacities to `d`.
///
/// `pixels` must yield exactly `d.len() / 3` elements.
pub(crate) fn write_stream(d: &mut [u8], pixels: impl Iterator<Item = (Pen, u8)>) {
    debug_assert_eq!(d.len() % 3, 0);

    if d.len() <= SHORT_RUN * 3 {
        for (px, (pen, a)) in d.chunks_exact_mut(3).zip(pixels) {
            put_px(px, pen, a);
        }
        return;
    }

    let (head, body, tail) = match split_words(d) {
        Some(parts) => parts,
        None => {
            for (px, (pen, a)) in d.chunks_exact_mut(3).zip(pixels) {
                put_px(px, pen, a);
            }
            return;
        }
    };

    let mut bytes = pixels.flat_map(|(pen, a)| {
        let lanes = [(pen.r, a), (pen.g, a), (pen.b, a)];
        (0..3).map(move |i| lanes[i])
    });
    let mut next = move || bytes.next().unwrap_or((0, 0));

    for d in head.iter_mut() {
        let (s, a) = next();
        *d = blend(s, *d, a);
    }

    for w in body.iter_mut() {
        let dd = u32::from_le(*w);
        let mut out = 0;
        for lane in 0..4 {
            let (s, a) = next();
            let d = (dd >> (lane * 8)) as u8;
            out |= (blend(s, d, a) as u32) << (lane * 8);
        }
        *w = out.to_le();
    }

    for d in tail.iter_mut() {
        let (s, a) = next();
        *d = blend(s, *d, a);
    }
}

/// Store a stream of fully opaque pixels to `d` without blending.
///
/// `pens` must yield exactly `d.len() / 3` elements. Their alpha channels
/// are ignored.
pub(crate) fn write_stream_opaque(d: &mut [u8], pens: impl Iterator<Item = Pen>) {
    debug_assert_eq!(d.len() % 3, 0);

    if d.len() <= SHORT_RUN * 3 {
        return write_opaque_naive(d, pens);
    }

    let (head, body, tail) = match split_words(d) {
        Some(parts) => parts,
        None => return write_opaque_naive(d, pens),
    };

    // A shift register of pending bytes, least significant first. A refill
    // adds one pixel, so `bits` stays below 56.
    let mut pens = pens.map(|p| p.r as u64 | (p.g as u64) << 8 | (p.b as u64) << 16);
    let mut acc = 0u64;
    let mut bits = 0;
    let mut refill = |acc: &mut u64, bits: &mut u32, need: u32| {
        while *bits < need {
            *acc |= pens.next().unwrap_or(0) << *bits;
            *bits += 24;
        }
    };

    for d in head.iter_mut() {
        refill(&mut acc, &mut bits, 8);
        *d = acc as u8;
        acc >>= 8;
        bits -= 8;
    }

    for w in body.iter_mut() {
        refill(&mut acc, &mut bits, 32);
        *w = (acc as u32).to_le();
        acc >>= 32;
        bits -= 32;
    }

    for d in tail.iter_mut() {
        refill(&mut acc, &mut bits, 8);
        *d = acc as u8;
        acc >>= 8;
        bits -= 8;
    }
}

fn write_opaque_naive(d: &mut [u8], pens: impl Iterator<Item = Pen>) {
    for (px, pen) in d.chunks_exact_mut(3).zip(pens) {
        px.copy_from_slice(&[pen.r, pen.g, pen.b]);
    }
}

fn fill_words_opaque(d: &mut [u8], pen: Pen) {
    // `s32` holds the next four bytes of the repeating `rgbrgb...` pattern,
    // least significant byte first. It cycles through `rgbr`, `gbrg`, `brgb`.
    let mut s32 = u32::from_le_bytes([pen.r, pen.g, pen.b, pen.r]);

    let (head, body, tail) = match split_words(d) {
        Some(parts) => parts,
        None => return fill_naive(d, pen, 255),
    };

    for d in head.iter_mut() {
        *d = s32 as u8;
        s32 = rotate(s32);
    }

    // Four pixels span exactly three words, after which the pattern repeats
    let dw = [s32, rotate(s32), rotate(rotate(s32))];
    let mut groups = body.chunks_exact_mut(3);
    for group in &mut groups {
        group[0] = dw[0].to_le();
        group[1] = dw[1].to_le();
        group[2] = dw[2].to_le();
    }

    for w in groups.into_remainder() {
        *w = s32.to_le();
        s32 = rotate(s32);
    }

    for d in tail.iter_mut() {
        *d = s32 as u8;
        s32 >>= 8;
    }
}

fn fill_words_blend(d: &mut [u8], pen: Pen, a: u8) {
    let mut s32 = u32::from_le_bytes([pen.r, pen.g, pen.b, pen.r]);

    let (head, body, tail) = match split_words(d) {
        Some(parts) => parts,
        None => return fill_naive(d, pen, a),
    };

    for d in head.iter_mut() {
        *d = blend(s32 as u8, *d, a);
        s32 = rotate(s32);
    }

    for w in body.iter_mut() {
        let dd = u32::from_le(*w);
        *w = (blend(s32 as u8, dd as u8, a) as u32
            | (blend((s32 >> 8) as u8, (dd >> 8) as u8, a) as u32) << 8
            | (blend((s32 >> 16) as u8, (dd >> 16) as u8, a) as u32) << 16
            | (blend((s32 >> 24) as u8, (dd >> 24) as u8, a) as u32) << 24)
            .to_le();
        s32 = rotate(s32);
    }

    for d in tail.iter_mut() {
        *d = blend(s32 as u8, *d, a);
        s32 >>= 8;
    }
}

/// Advance the packed pattern by one byte.
#[inline(always)]
fn rotate(s32: u32) -> u32 {
    let s = s32 >> 8;
    s | (s & 0xff) << 24
}

/// Split `bytes` into a head of at most three bytes, a slice of aligned
/// words, and a tail of at most three bytes.
///
/// Returns `None` if the word view cannot be formed, in which case the
/// caller must take the byte-wise path.
fn split_words(bytes: &mut [u8]) -> Option<(&mut [u8], &mut [u32], &mut [u8])> {
    let head_len = bytes.as_ptr().align_offset(4);
    if head_len >= 4 || head_len > bytes.len() {
        return None;
    }
    let body_len = (bytes.len() - head_len) & !3;

    let (head, rest) = bytes.split_at_mut(head_len);
    let (body, tail) = rest.split_at_mut(body_len);
    let words = LayoutVerified::<_, [u32]>::new_slice(body)?;

    Some((head, words.into_mut_slice(), tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use zerocopy::AsBytes;

    /// A buffer with a known 4-byte aligned base, so that `phase` directly
    /// controls the alignment of the run start.
    fn aligned_buf(len: usize, seed: u32) -> Vec<u32> {
        (0..(len + 3) / 4 + 1)
            .map(|i| (i as u32).wrapping_mul(0x9e3779b9) ^ seed)
            .collect()
    }

    fn as_bytes(words: &mut [u32]) -> &mut [u8] {
        words.as_bytes_mut()
    }

    #[test]
    fn opaque_fill_matches_naive_for_every_phase() {
        let pen = Pen::new(0x11, 0x22, 0xff, 255);
        for count in 1..=37 {
            for phase in 0..4 {
                let mut a = aligned_buf(count * 3 + phase + 8, 1);
                let mut b = a.clone();
                let (a, b) = (as_bytes(&mut a), as_bytes(&mut b));

                fill(&mut a[phase..phase + count * 3], pen, 255);
                fill_naive(&mut b[phase..phase + count * 3], pen, 255);

                assert_eq!(a, b, "count = {}, phase = {}", count, phase);
            }
        }
    }

    #[test]
    fn blended_fill_matches_naive_for_every_phase() {
        let pen = Pen::new(200, 7, 99, 255);
        for &alpha in &[1u8, 10, 128, 254] {
            for count in 1..=37 {
                for phase in 0..4 {
                    let mut a = aligned_buf(count * 3 + phase + 8, 7);
                    let mut b = a.clone();
                    let (a, b) = (as_bytes(&mut a), as_bytes(&mut b));

                    fill(&mut a[phase..phase + count * 3], pen, alpha);
                    fill_naive(&mut b[phase..phase + count * 3], pen, alpha);

                    assert_eq!(a, b, "alpha = {}, count = {}, phase = {}", alpha, count, phase);
                }
            }
        }
    }

    #[quickcheck]
    fn stream_matches_naive(src: Vec<(u8, u8, u8, u8)>, phase: u8, seed: u32) -> bool {
        let phase = phase as usize % 4;
        let count = src.len();
        let pixels: Vec<(Pen, u8)> = src
            .iter()
            .map(|&(r, g, b, a)| (Pen::new(r, g, b, 255), a))
            .collect();

        let mut a = aligned_buf(count * 3 + phase + 8, seed);
        let mut b = a.clone();
        let (a, b) = (as_bytes(&mut a), as_bytes(&mut b));

        write_stream(&mut a[phase..phase + count * 3], pixels.iter().cloned());
        for (px, &(pen, alpha)) in b[phase..phase + count * 3]
            .chunks_exact_mut(3)
            .zip(pixels.iter())
        {
            put_px(px, pen, alpha);
        }

        a == b
    }

    #[quickcheck]
    fn opaque_stream_matches_naive(src: Vec<(u8, u8, u8)>, phase: u8, seed: u32) -> bool {
        let phase = phase as usize % 4;
        let count = src.len();
        let pens: Vec<Pen> = src.iter().map(|&(r, g, b)| Pen::new(r, g, b, 255)).collect();

        let mut a = aligned_buf(count * 3 + phase + 8, seed);
        let mut b = a.clone();
        let (a, b) = (as_bytes(&mut a), as_bytes(&mut b));

        write_stream_opaque(&mut a[phase..phase + count * 3], pens.iter().cloned());
        for (px, &pen) in b[phase..phase + count * 3].chunks_exact_mut(3).zip(pens.iter()) {
            put_px(px, pen, 255);
        }

        a == b
    }

    #[test]
    fn opaque_stream_covers_every_phase() {
        for count in 1..=37 {
            let pens: Vec<Pen> = (0..count)
                .map(|i| Pen::new(i as u8, (i * 7) as u8, (i * 13 + 1) as u8, 255))
                .collect();
            for phase in 0..4 {
                let mut a = aligned_buf(count * 3 + phase + 8, 3);
                let mut b = a.clone();
                let (a, b) = (as_bytes(&mut a), as_bytes(&mut b));

                write_stream_opaque(&mut a[phase..phase + count * 3], pens.iter().cloned());
                write_stream(
                    &mut b[phase..phase + count * 3],
                    pens.iter().map(|&pen| (pen, 255)),
                );

                assert_eq!(a, b, "count = {}, phase = {}", count, phase);
            }
        }
    }

    #[test]
    fn zero_alpha_leaves_bytes_alone() {
        let mut buf = vec![0x5au8; 60];
        fill(&mut buf[3..57], Pen::new(1, 2, 3, 255), 0);
        assert!(buf.iter().all(|&x| x == 0x5a));
    }
}
