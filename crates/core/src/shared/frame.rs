use ndarray::{Array2, ArrayView3};

/// Single-channel 8-bit image in (row, column) order.
pub type GrayImage = Array2<u8>;

/// A single video frame: contiguous interleaved bytes in row-major order.
///
/// Three-channel frames are RGB; single-channel frames are already luma.
/// Colour conversion happens at I/O boundaries and in [`Frame::to_gray`].
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Luma plane using BT.601 weights (the same weights OpenCV uses for
    /// RGB→GRAY). One- and two-channel frames (gray, gray + alpha) keep their
    /// first channel; from three channels up the first three are RGB.
    pub fn to_gray(&self) -> GrayImage {
        let w = self.width as usize;
        let h = self.height as usize;
        let c = self.channels as usize;
        if c == 0 {
            return Array2::zeros((h, w));
        }
        if c < 3 {
            return Array2::from_shape_fn((h, w), |(y, x)| self.data[(y * w + x) * c]);
        }
        Array2::from_shape_fn((h, w), |(y, x)| {
            let i = (y * w + x) * c;
            let r = self.data[i] as f32;
            let g = self.data[i + 1] as f32;
            let b = self.data[i + 2] as f32;
            (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
        })
    }
}
