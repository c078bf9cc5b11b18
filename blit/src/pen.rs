//! Colors and the fixed-point opacity arithmetic shared by every backend.
use rgb::RGBA8;

/// A straight (non-premultiplied) RGBA color.
pub type Pen = RGBA8;

/// Compose two opacities.
///
/// The `+ 1` bias keeps a chain of full opacities fully opaque:
/// `combine2(255, 255) == 255`.
#[inline(always)]
pub fn combine2(a1: u8, a2: u8) -> u8 {
    let a = ((a1 as u32 + 1) * (a2 as u32 + 1)) >> 8;
    if a > 255 {
        255
    } else {
        a as u8
    }
}

/// Compose three opacities. See [`combine2`].
#[inline(always)]
pub fn combine3(a1: u8, a2: u8, a3: u8) -> u8 {
    let a = ((a1 as u32 + 1) * (a2 as u32 + 1) * (a3 as u32 + 1)) >> 16;
    if a > 255 {
        255
    } else {
        a as u8
    }
}

/// Blend a source channel value `s` over a destination value `d` with
/// opacity `a`, rounding to nearest.
///
/// `a == 0` returns `d` and `a == 255` returns `s`, both exactly.
#[inline(always)]
pub fn blend(s: u8, d: u8, a: u8) -> u8 {
    // Map `0..=255` to `0..=256` at the top end only, so that the lower
    // range keeps the `(a * (s - d) + 127) >> 8` rounding bit-for-bit
    let a = if a == 255 { 256 } else { a as i32 };
    let d = d as i32;
    (d + ((a * (s as i32 - d) + 127) >> 8)) as u8
}

/// Reinterpret four bytes (`r, g, b, a` in memory order) as a [`Pen`].
#[inline]
pub fn pen_from_bytes(b: &[u8]) -> Pen {
    Pen::new(b[0], b[1], b[2], b[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn blend_alpha_zero_is_identity() {
        for s in 0..=255u8 {
            for d in 0..=255u8 {
                assert_eq!(blend(s, d, 0), d, "s = {}, d = {}", s, d);
            }
        }
    }

    #[test]
    fn blend_full_alpha_saturates() {
        for d in 0..=255u8 {
            assert_eq!(blend(255, d, 255), 255, "d = {}", d);
            assert_eq!(blend(0, d, 255), 0, "d = {}", d);
        }
    }

    #[test]
    fn blend_full_alpha_reproduces_source() {
        for s in 0..=255u8 {
            for d in 0..=255u8 {
                assert_eq!(blend(s, d, 255), s);
            }
        }
    }

    #[test]
    fn combine_keeps_full_opacity() {
        assert_eq!(combine2(255, 255), 255);
        assert_eq!(combine3(255, 255, 255), 255);
        assert_eq!(combine2(0, 0), 0);
    }

    #[quickcheck]
    fn blend_stays_between_endpoints(s: u8, d: u8, a: u8) -> bool {
        let x = blend(s, d, a);
        x >= s.min(d) && x <= s.max(d)
    }

    #[quickcheck]
    fn combine_never_exceeds_inputs(a1: u8, a2: u8, a3: u8) -> bool {
        combine2(a1, a2) <= a1.max(a2) && combine3(a1, a2, a3) <= combine2(a1, a2).max(a3)
    }
}
