use crate::foundation::error::{DriftError, DriftResult};

/// A drawable frame as premultiplied RGBA8 pixels, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes (`width * height * 4`).
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// Allocate a transparent frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Composite a premultiplied source pixel over `(x, y)`.
    ///
    /// Out-of-bounds coordinates are ignored.
    pub fn blend_px(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let dst = [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]];
        self.data[i..i + 4].copy_from_slice(&over(dst, src));
    }
}

/// Source-over composite of two premultiplied RGBA8 pixels.
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 && src[0] == 0 && src[1] == 0 && src[2] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);

    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Convert a straight-alpha color (channels in `0..=255`, alpha in `0..=1`) into
/// a premultiplied RGBA8 pixel.
pub fn premul(r: f64, g: f64, b: f64, alpha: f64) -> [u8; 4] {
    let a = alpha.clamp(0.0, 1.0);
    let q = |c: f64| ((c.clamp(0.0, 255.0) * a) + 0.5) as u8;
    [q(r), q(g), q(b), ((a * 255.0) + 0.5) as u8]
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Acquires drawable surfaces for a capture session.
///
/// The acquisition step is the first fallible operation of a generation request;
/// a failure here must leave nothing behind to tear down.
pub trait SurfaceProvider {
    /// Allocate a drawable surface at the requested resolution.
    fn acquire(&mut self, width: u32, height: u32) -> DriftResult<FrameRgba>;
}

/// Default in-process surface provider.
#[derive(Debug, Default)]
pub struct CpuSurfaceProvider;

impl SurfaceProvider for CpuSurfaceProvider {
    fn acquire(&mut self, width: u32, height: u32) -> DriftResult<FrameRgba> {
        if width == 0 || height == 0 {
            return Err(DriftError::resource_unavailable(
                "surface dimensions must be non-zero",
            ));
        }
        Ok(FrameRgba::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_src_transparent_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [0, 0, 0, 0]), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src), src);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let src = [100, 110, 120, 200];
        assert_eq!(over([0, 0, 0, 0], src), src);
    }

    #[test]
    fn premul_scales_channels_by_alpha() {
        assert_eq!(premul(255.0, 0.0, 0.0, 1.0), [255, 0, 0, 255]);
        let half = premul(255.0, 255.0, 255.0, 0.5);
        assert_eq!(half[3], 128);
        assert!(half[0] >= 127 && half[0] <= 128);
    }

    #[test]
    fn blend_px_ignores_out_of_bounds() {
        let mut f = FrameRgba::new(2, 2);
        f.blend_px(-1, 0, [255, 255, 255, 255]);
        f.blend_px(2, 0, [255, 255, 255, 255]);
        f.blend_px(0, 2, [255, 255, 255, 255]);
        assert!(f.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn cpu_provider_rejects_zero_dimensions() {
        let mut p = CpuSurfaceProvider;
        assert!(p.acquire(0, 16).is_err());
        assert!(p.acquire(16, 0).is_err());
        let s = p.acquire(4, 3).unwrap();
        assert_eq!(s.data.len(), 4 * 3 * 4);
    }
}
