use ndarray::{Array4, ArrayView3};

use crate::VideoError;

/// Channel order of packed 8-bit, 3-channel pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Bgr,
    Rgb,
}

/// One decoded video frame, row-major, 3 bytes per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, VideoError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(VideoError::InvalidFrame(format!(
                "{width}x{height} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, layout: PixelLayout, pixel: [u8; 3]) -> Self {
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Reorders channels to RGB; a no-op for frames already in RGB.
    pub fn into_rgb(mut self) -> Self {
        if self.layout == PixelLayout::Bgr {
            for pixel in self.data.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
            self.layout = PixelLayout::Rgb;
        }
        self
    }

    /// `(height, width, channel)` view of the pixel data.
    pub fn view(&self) -> Result<ArrayView3<'_, u8>, VideoError> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, 3),
            self.data.as_slice(),
        )
        .map_err(|err| VideoError::InvalidFrame(err.to_string()))
    }
}

/// Horizontal band of a frame, in pixel columns `[x0, x1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub x1: u32,
}

impl Region {
    /// Splits `width` into `parts` equal bands, left to right.
    pub fn split(width: u32, parts: usize) -> Vec<Region> {
        let parts = parts.max(1) as u32;
        (0..parts)
            .map(|i| Region {
                x0: width * i / parts,
                x1: width * (i + 1) / parts,
            })
            .filter(|region| region.x1 > region.x0)
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }
}

/// Nearest-neighbour resize of `region` to a `[1, size, size, 3]` tensor in `[0, 1]`.
pub fn region_tensor(frame: &Frame, region: Region, size: usize) -> Result<Array4<f32>, VideoError> {
    let pixels = frame.view()?;
    if size == 0 || region.width() == 0 || region.x1 > frame.width || frame.height == 0 {
        return Err(VideoError::InvalidFrame(format!(
            "cannot sample {region:?} of a {}x{} frame at {size}px",
            frame.width, frame.height
        )));
    }
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    let scale_x = region.width() as f32 / size as f32;
    let scale_y = frame.height as f32 / size as f32;
    for row in 0..size {
        let src_y = ((row as f32 + 0.5) * scale_y) as usize;
        let src_y = src_y.min(frame.height as usize - 1);
        for col in 0..size {
            let src_x = region.x0 as usize + ((col as f32 + 0.5) * scale_x) as usize;
            let src_x = src_x.min(region.x1 as usize - 1);
            for channel in 0..3 {
                tensor[[0, row, col, channel]] = f32::from(pixels[[src_y, src_x, channel]]) / 255.0;
            }
        }
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_frames_convert_to_rgb() {
        let frame = Frame::filled(2, 2, PixelLayout::Bgr, [10, 20, 30]).into_rgb();
        assert_eq!(frame.layout, PixelLayout::Rgb);
        assert_eq!(&frame.data[..3], &[30, 20, 10]);
        let again = frame.clone().into_rgb();
        assert_eq!(again, frame);
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        assert!(Frame::new(4, 4, PixelLayout::Rgb, vec![0; 10]).is_err());
        let frame = Frame::new(2, 1, PixelLayout::Rgb, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.view().unwrap()[[0, 1, 2]], 6);
    }

    #[test]
    fn split_covers_the_full_width() {
        let regions = Region::split(641, 2);
        assert_eq!(regions, vec![Region { x0: 0, x1: 320 }, Region { x0: 320, x1: 641 }]);
        assert_eq!(Region::split(100, 0), vec![Region { x0: 0, x1: 100 }]);
    }

    #[test]
    fn region_tensor_samples_the_requested_band() {
        let mut frame = Frame::filled(4, 2, PixelLayout::Rgb, [0, 0, 0]);
        for row in 0..2 {
            let offset = (row * 4 + 3) * 3;
            frame.data[offset] = 255;
        }
        let right = region_tensor(&frame, Region { x0: 2, x1: 4 }, 2).unwrap();
        assert_eq!(right.shape(), &[1, 2, 2, 3]);
        assert_eq!(right[[0, 0, 1, 0]], 1.0);
        assert_eq!(right[[0, 0, 0, 0]], 0.0);
        assert!(region_tensor(&frame, Region { x0: 2, x1: 5 }, 2).is_err());
    }
}
