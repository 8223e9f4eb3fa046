// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{IspError, Result};
use core::fmt;
use std::{fs, path::Path};
use tracing::debug;

/// Gamma 1.8 lookup table, `out = 255 * (in / 255)^(1 / 1.8)`.
///
/// The table has 255 entries; input 255 is handled by [`gamma_lookup`].
pub const GAMMA_1P8: [u8; 255] = [
    0, 12, 17, 22, 25, 29, 32, 35, 37, 40, 42, 44, 47, 49, 51, 53,
    55, 57, 58, 60, 62, 64, 65, 67, 69, 70, 72, 73, 75, 76, 78, 79,
    80, 82, 83, 85, 86, 87, 89, 90, 91, 92, 94, 95, 96, 97, 98, 100,
    101, 102, 103, 104, 105, 107, 108, 109, 110, 111, 112, 113, 114, 115, 116, 117,
    118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 128, 129, 130, 131, 132, 133,
    134, 135, 136, 137, 138, 139, 139, 140, 141, 142, 143, 144, 145, 146, 146, 147,
    148, 149, 150, 151, 152, 152, 153, 154, 155, 156, 157, 157, 158, 159, 160, 161,
    161, 162, 163, 164, 165, 165, 166, 167, 168, 169, 169, 170, 171, 172, 172, 173,
    174, 175, 175, 176, 177, 178, 178, 179, 180, 181, 181, 182, 183, 183, 184, 185,
    186, 186, 187, 188, 188, 189, 190, 191, 191, 192, 193, 193, 194, 195, 195, 196,
    197, 198, 198, 199, 200, 200, 201, 202, 202, 203, 204, 204, 205, 206, 206, 207,
    208, 208, 209, 209, 210, 211, 211, 212, 213, 213, 214, 215, 215, 216, 217, 217,
    218, 218, 219, 220, 220, 221, 222, 222, 223, 223, 224, 225, 225, 226, 226, 227,
    228, 228, 229, 230, 230, 231, 231, 232, 233, 233, 234, 234, 235, 236, 236, 237,
    237, 238, 238, 239, 240, 240, 241, 241, 242, 243, 243, 244, 244, 245, 245, 246,
    247, 247, 248, 248, 249, 249, 250, 251, 251, 252, 252, 253, 253, 254, 255,];

/// Looks up the gamma corrected value of one byte.
///
/// Input 255 lies past the end of the table and maps to full scale, the
/// same value as the last entry.
#[inline]
pub fn gamma_lookup(value: u8) -> u8 {
    GAMMA_1P8.get(value as usize).copied().unwrap_or(u8::MAX)
}

/// Applies gamma 1.8 to every byte of `img` in place.
pub fn gamma_correct(img: &mut [u8]) {
    for px in img.iter_mut() {
        *px = gamma_lookup(*px);
    }
}

/// Applies gamma 1.8 from `src` into `dst`.
///
/// # Errors
///
/// Returns an error if the buffers differ in length.
pub fn gamma_correct_into(src: &[u8], dst: &mut [u8]) -> Result<()> {
    if src.len() != dst.len() {
        return Err(IspError::Dimensions(format!(
            "gamma source has {} bytes but destination has {}",
            src.len(),
            dst.len()
        )));
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d = gamma_lookup(*s);
    }
    Ok(())
}

fn check_len(len: usize, width: usize, height: usize, channels: usize) -> Result<()> {
    let expected = width * height * channels;
    if len != expected {
        return Err(IspError::Dimensions(format!(
            "{}x{}x{} image needs {} bytes but buffer has {}",
            width, height, channels, expected, len
        )));
    }
    Ok(())
}

/// Read-only row-major view over an interleaved image buffer.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    channels: usize,
}

impl<'a> ImageView<'a> {
    pub fn new(data: &'a [u8], width: usize, height: usize, channels: usize) -> Result<Self> {
        check_len(data.len(), width, height, channels)?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width * self.channels
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize, channel: usize) -> u8 {
        self.data[row * self.stride() + col * self.channels + channel]
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &'a [u8] {
        let start = row * self.stride() + col * self.channels;
        &self.data[start..start + self.channels]
    }
}

/// Mutable row-major view over an interleaved image buffer.
#[derive(Debug)]
pub struct ImageViewMut<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    channels: usize,
}

impl<'a> ImageViewMut<'a> {
    pub fn new(data: &'a mut [u8], width: usize, height: usize, channels: usize) -> Result<Self> {
        check_len(data.len(), width, height, channels)?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn stride(&self) -> usize {
        self.width * self.channels
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: u8) {
        let stride = self.stride();
        self.data[row * stride + col * self.channels + channel] = value;
    }

    #[inline]
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [u8] {
        let start = row * self.stride() + col * self.channels;
        &mut self.data[start..start + self.channels]
    }

    pub fn as_view(&self) -> ImageView<'_> {
        ImageView {
            data: &*self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }
}

/// Owned interleaved 8-bit image.
///
/// # Example
///
/// ```
/// use edgefirst_isp::image::Image;
///
/// let img = Image::new(640, 480, 3);
/// assert_eq!(img.size(), 921600);
/// assert_eq!(img.view().at(0, 0, 0), 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Image {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            data: vec![0; width * height * channels],
            width,
            height,
            channels,
        }
    }

    pub fn from_vec(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Result<Self> {
        check_len(data.len(), width, height, channels)?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            data: self.data.as_slice(),
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    pub fn view_mut(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            data: self.data.as_mut_slice(),
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// Returns a new image resized with [`bilinear_resize`].
    pub fn resize(&self, width: usize, height: usize) -> Result<Image> {
        let mut out = Image::new(width, height, self.channels);
        bilinear_resize(&self.view(), &mut out.view_mut())?;
        Ok(out)
    }

    /// Returns a new image rotated 90 degrees clockwise.
    pub fn rotate90(&self) -> Result<Image> {
        let mut out = Image::new(self.height, self.width, self.channels);
        rotate90_channels(&self.view(), &mut out.view_mut())?;
        Ok(out)
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Source coordinate step per output pixel along one axis.
///
/// A single output pixel samples the first source pixel.
fn axis_ratio(in_dim: usize, out_dim: usize) -> f32 {
    if out_dim <= 1 || in_dim <= 1 {
        0.0
    } else {
        (in_dim - 1) as f32 / (out_dim - 1) as f32
    }
}

/// Splits a source coordinate into the low index, the fractional weight
/// and the high index, clamped to the last valid index.
#[inline]
fn split_coord(pos: f32, last: usize) -> (usize, f32, usize) {
    let low = (pos as usize).min(last);
    let frac = pos - low as f32;
    (low, frac, (low + 1).min(last))
}

/// Resizes `src` into `dst` with bilinear interpolation.
///
/// The destination dimensions select the output size. Each output pixel
/// blends the four source pixels around `(x * x_ratio, y * y_ratio)` where
/// the ratios are `(in - 1) / (out - 1)`, so corners map onto corners and
/// resizing to the same size reproduces the input exactly.
///
/// # Errors
///
/// Returns an error if the channel counts differ or either image is empty.
pub fn bilinear_resize(src: &ImageView, dst: &mut ImageViewMut) -> Result<()> {
    if src.channels() != dst.channels() {
        return Err(IspError::Dimensions(format!(
            "cannot resize {} channels into {}",
            src.channels(),
            dst.channels()
        )));
    }
    if src.width() == 0 || src.height() == 0 {
        return Err(IspError::Dimensions("empty source image".to_string()));
    }

    let x_ratio = axis_ratio(src.width(), dst.width());
    let y_ratio = axis_ratio(src.height(), dst.height());
    let x_last = src.width() - 1;
    let y_last = src.height() - 1;

    for i in 0..dst.height() {
        let (y_l, yw, y_h) = split_coord(y_ratio * i as f32, y_last);
        for j in 0..dst.width() {
            let (x_l, xw, x_h) = split_coord(x_ratio * j as f32, x_last);
            for ch in 0..src.channels() {
                let a = src.at(y_l, x_l, ch) as f32;
                let b = src.at(y_l, x_h, ch) as f32;
                let c = src.at(y_h, x_l, ch) as f32;
                let d = src.at(y_h, x_h, ch) as f32;
                let pixel = a * (1.0 - xw) * (1.0 - yw)
                    + b * xw * (1.0 - yw)
                    + c * yw * (1.0 - xw)
                    + d * xw * yw;
                dst.set(i, j, ch, pixel as u8);
            }
        }
    }
    Ok(())
}

fn check_rotation(src: &ImageView, dst: &ImageViewMut) -> Result<()> {
    if dst.width() != src.height()
        || dst.height() != src.width()
        || dst.channels() != src.channels()
    {
        return Err(IspError::Dimensions(format!(
            "rotating {}x{}x{} needs a {}x{}x{} destination, got {}x{}x{}",
            src.width(),
            src.height(),
            src.channels(),
            src.height(),
            src.width(),
            src.channels(),
            dst.width(),
            dst.height(),
            dst.channels()
        )));
    }
    Ok(())
}

/// Rotates a single-channel image 90 degrees clockwise.
///
/// Source pixel `(x, y)` lands at `(height - 1 - y, x)`; the destination is
/// `height` wide and `width` tall. Source and destination cannot alias.
///
/// # Errors
///
/// Returns an error for multi-channel images or a destination of the wrong
/// shape.
pub fn rotate90(src: &ImageView, dst: &mut ImageViewMut) -> Result<()> {
    if src.channels() != 1 {
        return Err(IspError::Dimensions(format!(
            "rotate90 expects 1 channel, got {}",
            src.channels()
        )));
    }
    check_rotation(src, dst)?;
    let height = src.height();
    for y in 0..height {
        for x in 0..src.width() {
            dst.set(x, height - 1 - y, 0, src.at(y, x, 0));
        }
    }
    Ok(())
}

/// Rotates an interleaved image 90 degrees clockwise, keeping each pixel's
/// channels together.
pub fn rotate90_channels(src: &ImageView, dst: &mut ImageViewMut) -> Result<()> {
    check_rotation(src, dst)?;
    let height = src.height();
    for y in 0..height {
        for x in 0..src.width() {
            dst.pixel_mut(x, height - 1 - y).copy_from_slice(src.pixel(y, x));
        }
    }
    Ok(())
}

/// Luma of one RGB pixel using integer BT.601 weights.
#[inline]
pub fn greyscale(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

/// Reduces interleaved RGB pixels to greyscale.
///
/// # Errors
///
/// Returns an error unless `rgb` holds exactly three bytes per `grey` byte.
pub fn rgb_to_greyscale(grey: &mut [u8], rgb: &[u8]) -> Result<()> {
    if rgb.len() != grey.len() * 3 {
        return Err(IspError::Dimensions(format!(
            "{} RGB bytes do not match {} greyscale pixels",
            rgb.len(),
            grey.len()
        )));
    }
    for (g, px) in grey.iter_mut().zip(rgb.chunks_exact(3)) {
        *g = greyscale(px[0], px[1], px[2]);
    }
    Ok(())
}

/// Reduces interleaved RGB pixels to greyscale within the same buffer.
///
/// The greyscale image occupies the first third of `buf`, which is
/// returned.
pub fn rgb_to_greyscale_in_place(buf: &mut [u8]) -> &mut [u8] {
    let n_pix = buf.len() / 3;
    for i in 0..n_pix {
        let (r, g, b) = (buf[3 * i], buf[3 * i + 1], buf[3 * i + 2]);
        buf[i] = greyscale(r, g, b);
    }
    &mut buf[..n_pix]
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Converts one RGB pixel to full-range YUV (BT.601), returned as
/// `[y, u, v]`.
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = (77 * r + 150 * g + 29 * b + 128) >> 8;
    let u = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
    let v = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
    [clamp_u8(y), clamp_u8(u), clamp_u8(v)]
}

/// Converts one full-range YUV (BT.601) pixel to RGB, returned as
/// `[r, g, b]`.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = y + ((359 * e + 128) >> 8);
    let g = y - ((88 * d + 183 * e + 128) >> 8);
    let b = y + ((454 * d + 128) >> 8);
    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

/// Shifts signed samples into the unsigned range (`-128` becomes `0`).
pub fn int8_to_uint8(output: &mut [u8], input: &[i8]) {
    for (o, i) in output.iter_mut().zip(input) {
        *o = (*i as u8) ^ 0x80;
    }
}

/// Reorders `[height][width][channels]` into `[width][channels][height]`.
pub fn swap_dims(
    input: &[u8],
    output: &mut [u8],
    height: usize,
    width: usize,
    channels: usize,
) -> Result<()> {
    check_len(input.len(), width, height, channels)?;
    check_len(output.len(), width, height, channels)?;
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                output[(x * channels + c) * height + y] = input[(y * width + x) * channels + c];
            }
        }
    }
    Ok(())
}

/// Writes raw image bytes to `path` with no header.
///
/// The dimensions are only used to check the buffer; readers must track
/// them separately.
pub fn write_image<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    height: usize,
    width: usize,
    channels: usize,
) -> Result<()> {
    check_len(data.len(), width, height, channels)?;
    fs::write(path.as_ref(), data)?;
    debug!(
        "wrote {}x{}x{} image to {}",
        width,
        height,
        channels,
        path.as_ref().display()
    );
    Ok(())
}
