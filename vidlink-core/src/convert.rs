//! Pixel format conversion and rescaling.
//!
//! One conversion step sits between capture and encode, and between
//! decode and display: it takes whatever the device delivered and
//! produces the canonical planar YUV 4:2:0 frame at the negotiated
//! geometry. Scaling is nearest-neighbour and RGB→YUV uses BT.601
//! integer coefficients; both are cheap enough to run per frame on
//! the scheduler task.

use crate::error::VideoError;
use crate::frame::{FrameBuffer, PixelFormat};

// ── FrameConverter ───────────────────────────────────────────────

/// Converts `src` into `dst`, honouring both buffers' declared
/// geometry and pixel format.
pub trait FrameConverter: Send {
    fn convert(&self, src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<(), VideoError>;
}

// ── BT.601 math ──────────────────────────────────────────────────

/// Full-range RGB to limited-range BT.601 YUV.
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (y as u8, u as u8, v as u8)
}

/// Sample one source pixel as YUV, whatever the packed layout.
fn yuv_at(data: &[u8], format: PixelFormat, width: usize, x: usize, y: usize) -> (u8, u8, u8) {
    match format {
        PixelFormat::Rgb24 => {
            let i = (y * width + x) * 3;
            rgb_to_yuv(data[i], data[i + 1], data[i + 2])
        }
        PixelFormat::Rgba32 => {
            let i = (y * width + x) * 4;
            rgb_to_yuv(data[i], data[i + 1], data[i + 2])
        }
        PixelFormat::Rgb565 => {
            let i = (y * width + x) * 2;
            let px = u16::from_le_bytes([data[i], data[i + 1]]);
            let r = ((px >> 11) as u8 & 0x1F) << 3;
            let g = ((px >> 5) as u8 & 0x3F) << 2;
            let b = (px as u8 & 0x1F) << 3;
            rgb_to_yuv(r, g, b)
        }
        PixelFormat::Yuyv422 => {
            // Chroma is shared per horizontal pixel pair.
            let luma = (y * width + x) * 2;
            let pair = (y * width + (x & !1)) * 2;
            (data[luma], data[pair + 1], data[pair + 3])
        }
        // Planar input goes through the plane scaler instead.
        PixelFormat::Yuv420p => (data[y * width + x], 128, 128),
    }
}

fn scale_plane(src: &[u8], sw: usize, sh: usize, dst: &mut [u8], dw: usize, dh: usize) {
    for y in 0..dh {
        let sy = y * sh / dh;
        let src_row = &src[sy * sw..][..sw];
        let dst_row = &mut dst[y * dw..][..dw];
        for (x, out) in dst_row.iter_mut().enumerate() {
            *out = src_row[x * sw / dw];
        }
    }
}

// ── ScalingConverter ─────────────────────────────────────────────

/// Software converter covering every source format the capture
/// backends produce, plus same-format rescaling for display.
#[derive(Debug, Default)]
pub struct ScalingConverter;

impl ScalingConverter {
    pub fn new() -> Self {
        Self
    }
}

impl FrameConverter for ScalingConverter {
    fn convert(&self, src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<(), VideoError> {
        let sg = src.geometry();
        let dg = dst.geometry();
        let (sw, sh) = (sg.width as usize, sg.height as usize);
        let (dw, dh) = (dg.width as usize, dg.height as usize);

        if src.used() != src.format().frame_size(sg) {
            return Err(VideoError::Convert("source frame incomplete"));
        }
        // YUYV packs chroma per pixel pair; an odd row cannot be
        // sampled without running off the row end.
        if src.format() == PixelFormat::Yuyv422 && sw % 2 != 0 {
            return Err(VideoError::Convert("odd-width yuyv source"));
        }
        let needed = dst.format().frame_size(dg);
        if dst.capacity() < needed {
            return Err(VideoError::CapacityExceeded {
                needed,
                capacity: dst.capacity(),
            });
        }

        dst.reset();
        match (src.format(), dst.format()) {
            (sf, df) if sf == df && sg == dg => {
                let out = &mut dst.as_mut_slice()[..needed];
                out.copy_from_slice(src.payload());
            }
            (PixelFormat::Yuv420p, PixelFormat::Yuv420p) => {
                let data = src.payload();
                let (sy, sc) = data.split_at(sw * sh);
                let (su, sv) = sc.split_at(sw / 2 * (sh / 2));

                let out = &mut dst.as_mut_slice()[..needed];
                let (dy, dc) = out.split_at_mut(dw * dh);
                let (du, dv) = dc.split_at_mut(dw / 2 * (dh / 2));

                scale_plane(sy, sw, sh, dy, dw, dh);
                scale_plane(su, sw / 2, sh / 2, du, dw / 2, dh / 2);
                scale_plane(sv, sw / 2, sh / 2, dv, dw / 2, dh / 2);
            }
            (sf, PixelFormat::Yuv420p) => {
                let data = src.payload();
                let out = &mut dst.as_mut_slice()[..needed];
                let (dy, dc) = out.split_at_mut(dw * dh);
                let (cw, ch) = (dw / 2, dh / 2);
                let (du, dv) = dc.split_at_mut(cw * ch);

                for y in 0..dh {
                    let sy = y * sh / dh;
                    for x in 0..dw {
                        let (luma, _, _) = yuv_at(data, sf, sw, x * sw / dw, sy);
                        dy[y * dw + x] = luma;
                    }
                }
                // Chroma is sampled on the even luma grid.
                for y in 0..ch {
                    let sy = y * 2 * sh / dh;
                    for x in 0..cw {
                        let (_, u, v) = yuv_at(data, sf, sw, x * 2 * sw / dw, sy);
                        du[y * cw + x] = u;
                        dv[y * cw + x] = v;
                    }
                }
            }
            (sf, df) if sf == df && sf != PixelFormat::Yuyv422 => {
                // Packed same-format rescale. YUYV is excluded: nearest
                // sampling at odd columns would tear its pixel pairs.
                let bpp = match sf.bytes_per_pixel() {
                    Some(bpp) => bpp,
                    None => return Err(VideoError::Convert("unsupported planar rescale")),
                };
                let data = src.payload();
                let out = &mut dst.as_mut_slice()[..needed];
                for y in 0..dh {
                    let sy = y * sh / dh;
                    for x in 0..dw {
                        let s = (sy * sw + x * sw / dw) * bpp;
                        let d = (y * dw + x) * bpp;
                        out[d..d + bpp].copy_from_slice(&data[s..s + bpp]);
                    }
                }
            }
            _ => return Err(VideoError::Convert("unsupported format pair")),
        }

        dst.set_used(needed);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
