use crate::ImageSize;

/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height}, channels={channels})")]
    InvalidDimensions {
        width: usize,
        height: usize,
        channels: usize,
    },
    #[error("row stride {stride} is smaller than a packed row of {row_bytes} bytes")]
    InvalidStride { stride: usize, row_bytes: usize },
    #[error("invalid image buffer length (expected at least {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
}

/// Borrowed, packed, row-major frame (len = w * h * channels).
#[derive(Clone, Copy, Debug)]
pub struct FrameImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: &'a [u8],
}

impl FrameImageView<'_> {
    #[inline]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width as u32, self.height as u32)
    }
}

/// Owned copy of a captured frame, retained for chessboard-corner interpolation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameImage {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

fn packed_row_bytes(width: usize, height: usize, channels: usize) -> Result<usize, ImageError> {
    let invalid = ImageError::InvalidDimensions {
        width,
        height,
        channels,
    };
    if width == 0 || height == 0 || channels == 0 {
        return Err(invalid);
    }
    width.checked_mul(channels).ok_or(invalid)
}

impl FrameImage {
    /// Take ownership of a packed buffer.
    pub fn from_packed(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let row = packed_row_bytes(width, height, channels)?;
        let expected = row
            .checked_mul(height)
            .ok_or(ImageError::InvalidDimensions {
                width,
                height,
                channels,
            })?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Copy a possibly padded foreign buffer (`stride` bytes per row) into a
    /// packed owned image. The source is not retained.
    pub fn copy_strided(
        width: usize,
        height: usize,
        channels: usize,
        stride: usize,
        src: &[u8],
    ) -> Result<Self, ImageError> {
        let row = packed_row_bytes(width, height, channels)?;
        if stride < row {
            return Err(ImageError::InvalidStride {
                stride,
                row_bytes: row,
            });
        }
        // The last row only needs its packed bytes.
        let expected = stride * (height - 1) + row;
        if src.len() < expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: src.len(),
            });
        }
        let mut data = Vec::with_capacity(row * height);
        for y in 0..height {
            let start = y * stride;
            data.extend_from_slice(&src[start..start + row]);
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width as u32, self.height as u32)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn view(&self) -> FrameImageView<'_> {
        FrameImageView {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: &self.data,
        }
    }
}

impl<'a> From<FrameImageView<'a>> for FrameImage {
    fn from(view: FrameImageView<'a>) -> Self {
        Self {
            width: view.width,
            height: view.height,
            channels: view.channels,
            data: view.data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_copy_drops_row_padding() {
        // 2x2 gray image, 3 bytes per row.
        let src = [1u8, 2, 0xff, 3, 4];
        let img = FrameImage::copy_strided(2, 2, 1, 3, &src).expect("copy");
        assert_eq!(img.data(), &[1, 2, 3, 4]);
        assert_eq!(img.size(), ImageSize::new(2, 2));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = FrameImage::copy_strided(4, 2, 1, 4, &[0u8; 6]).unwrap_err();
        assert_eq!(
            err,
            ImageError::InvalidBuffer {
                expected: 8,
                got: 6
            }
        );
    }

    #[test]
    fn stride_smaller_than_row_is_rejected() {
        let err = FrameImage::copy_strided(4, 1, 3, 8, &[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            ImageError::InvalidStride {
                stride: 8,
                row_bytes: 12
            }
        );
    }

    #[test]
    fn packed_length_must_match() {
        assert!(FrameImage::from_packed(2, 2, 1, vec![0; 4]).is_ok());
        assert!(FrameImage::from_packed(2, 2, 1, vec![0; 5]).is_err());
        assert!(FrameImage::from_packed(0, 2, 1, vec![]).is_err());
    }
}
