//! CPU conversion of camera YUV 4:2:0 frames into upright RGBA.

use image::{
    imageops::{rotate180, rotate270, rotate90},
    RgbaImage,
};

/// Borrowed planes of a YUV_420_888 image. U and V may be interleaved
/// (pixel stride 2, NV21/NV12 layout) or planar (pixel stride 1).
pub struct Yuv420Planes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_row_stride: usize,
    pub uv_row_stride: usize,
    pub uv_pixel_stride: usize,
}

impl Yuv420Planes<'_> {
    /// Writes `width * height * 4` bytes into `rgba`, resizing it if needed.
    pub fn to_rgba(&self, width: u32, height: u32, rgba: &mut Vec<u8>) {
        let (width, height) = (width as usize, height as usize);
        rgba.resize(width * height * 4, 0);

        for row in 0..height {
            let y_row = row * self.y_row_stride;
            let uv_row = (row >> 1) * self.uv_row_stride;
            for col in 0..width {
                let uv_idx = uv_row + (col >> 1) * self.uv_pixel_stride;
                let y = sample(self.y, y_row + col) - 16;
                let u = sample(self.u, uv_idx) - 128;
                let v = sample(self.v, uv_idx) - 128;
                let out = (row * width + col) * 4;
                rgba[out..out + 4].copy_from_slice(&yuv_to_rgba(y.max(0), u, v));
            }
        }
    }
}

fn sample(plane: &[u8], idx: usize) -> i32 {
    // Vendors trim the last interleaved chroma byte; treat it as neutral.
    plane.get(idx).copied().unwrap_or(128) as i32
}

/// BT.601 integer coefficients, scaled by 1024.
fn yuv_to_rgba(y: i32, u: i32, v: i32) -> [u8; 4] {
    const MAX: i32 = 262_143;
    let y1192 = 1192 * y;
    let r = (y1192 + 1634 * v).clamp(0, MAX);
    let g = (y1192 - 833 * v - 400 * u).clamp(0, MAX);
    let b = (y1192 + 2066 * u).clamp(0, MAX);
    [(r >> 10) as u8, (g >> 10) as u8, (b >> 10) as u8, 255]
}

/// Rotate a frame clockwise by the sensor orientation (0, 90, 180, 270).
pub fn rotate_upright(frame: RgbaImage, degrees: i32) -> RgbaImage {
    match degrees.rem_euclid(360) {
        90 => rotate90(&frame),
        180 => rotate180(&frame),
        270 => rotate270(&frame),
        _ => frame,
    }
}

/// Swap the B and R channels of a BGRA buffer in place.
pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_and_white_luma() {
        let y = [16u8, 235, 16, 235];
        let uv = [128u8, 128];
        let planes = Yuv420Planes {
            y: &y,
            u: &uv[..1],
            v: &uv[1..],
            y_row_stride: 2,
            uv_row_stride: 2,
            uv_pixel_stride: 2,
        };
        let mut rgba = vec![];
        planes.to_rgba(2, 2, &mut rgba);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[254, 254, 254, 255]);
    }

    #[test]
    fn row_stride_padding_is_skipped() {
        // 2x2 image stored with 4-byte rows.
        let y = [16u8, 16, 99, 99, 16, 16, 99, 99];
        let u = [128u8];
        let v = [128u8];
        let planes = Yuv420Planes {
            y: &y,
            u: &u,
            v: &v,
            y_row_stride: 4,
            uv_row_stride: 1,
            uv_pixel_stride: 1,
        };
        let mut rgba = vec![1; 3];
        planes.to_rgba(2, 2, &mut rgba);
        assert!(rgba.chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let frame = RgbaImage::new(4, 2);
        assert_eq!(rotate_upright(frame.clone(), 90).dimensions(), (2, 4));
        assert_eq!(rotate_upright(frame.clone(), 180).dimensions(), (4, 2));
        assert_eq!(rotate_upright(frame.clone(), -90).dimensions(), (2, 4));
        assert_eq!(rotate_upright(frame, 0).dimensions(), (4, 2));
    }

    #[test]
    fn bgra_swap() {
        let mut px = [1u8, 2, 3, 4, 5, 6, 7, 8];
        bgra_to_rgba(&mut px);
        assert_eq!(px, [3, 2, 1, 4, 7, 6, 5, 8]);
    }
}
