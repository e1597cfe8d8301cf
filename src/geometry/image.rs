//! Raster input: RGBA images and binary wall masks

use crate::consts::MASK_THRESHOLD;
use crate::error::{Result, SimError};

/// Raw RGBA8 image buffer
#[derive(Debug, Clone)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Image {
    /// Wrap an RGBA buffer, validating its length
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SimError::EmptyImage { width, height });
        }
        let expected = width * height * 4;
        if data.len() != expected {
            return Err(SimError::ImageSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build an image from a per-pixel color function
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> [u8; 4],
    {
        let mut data = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Binary mask; `true` marks wall (outside the simulation domain)
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    /// Surround the mask with a one pixel wall border so every boundary closes
    pub fn padded(&self) -> Self {
        Self::from_fn(self.width + 2, self.height + 2, |x, y| {
            if x == 0 || y == 0 || x == self.width + 1 || y == self.height + 1 {
                true
            } else {
                self.is_wall(x - 1, y - 1)
            }
        })
    }
}

/// Darkness weighted by alpha, in [0, 765]
#[inline]
fn darkness([r, g, b, a]: [u8; 4]) -> f64 {
    let inv = (255 - r) as f64 + (255 - g) as f64 + (255 - b) as f64;
    inv * (a as f64 / 255.0)
}

/// Threshold an image into a padded wall mask
///
/// Dark opaque pixels become wall. If the top-left pixel ends up inside, the
/// whole mask is inverted so the region touching the border is always wall.
/// An image with no pixels gives a mask that is all border.
pub fn image_to_mask(image: &Image) -> Mask {
    if image.width == 0 || image.height == 0 {
        return Mask::from_fn(0, 0, |_, _| true).padded();
    }

    let mut mask = Mask::from_fn(image.width, image.height, |x, y| {
        darkness(image.pixel(x, y)) > MASK_THRESHOLD
    });

    if !mask.data[0] {
        for v in mask.data.iter_mut() {
            *v = !*v;
        }
    }

    mask.padded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    #[test]
    fn test_image_size_validation() {
        assert!(Image::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            Image::new(2, 2, vec![0; 15]),
            Err(SimError::ImageSize { expected: 16, .. })
        ));
        assert!(matches!(
            Image::new(0, 4, vec![]),
            Err(SimError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_dark_frame_is_wall() {
        // Black frame around a white interior
        let image = Image::from_fn(6, 6, |x, y| {
            if x == 0 || y == 0 || x == 5 || y == 5 { BLACK } else { WHITE }
        });
        let mask = image_to_mask(&image);
        assert_eq!(mask.width, 8);
        assert_eq!(mask.height, 8);
        assert!(mask.is_wall(0, 0));
        assert!(mask.is_wall(1, 1));
        assert!(!mask.is_wall(3, 3));
    }

    #[test]
    fn test_inverted_when_corner_inside() {
        // Black disc on white: corner is white, so the mask flips and the disc becomes inside
        let image = Image::from_fn(9, 9, |x, y| {
            let dx = x as f64 - 4.0;
            let dy = y as f64 - 4.0;
            if dx * dx + dy * dy < 6.0 { BLACK } else { WHITE }
        });
        let mask = image_to_mask(&image);
        assert!(mask.is_wall(1, 1));
        assert!(!mask.is_wall(5, 5));
    }

    #[test]
    fn test_transparent_pixels_are_not_wall() {
        let image = Image::from_fn(3, 3, |x, y| {
            if x == 1 && y == 1 { [0, 0, 0, 0] } else { BLACK }
        });
        let mask = image_to_mask(&image);
        assert!(mask.is_wall(1, 1));
        assert!(!mask.is_wall(2, 2));
    }

    #[test]
    fn test_empty_image_is_all_wall() {
        for (w, h) in [(0, 0), (0, 5), (5, 0)] {
            let mask = image_to_mask(&Image::from_fn(w, h, |_, _| WHITE));
            assert_eq!((mask.width, mask.height), (2, 2));
            assert!(mask.data.iter().all(|&wall| wall));
        }
    }

    proptest! {
        #[test]
        fn prop_mask_border_is_wall(w in 1usize..12, h in 1usize..12, seed in any::<u64>()) {
            let image = Image::from_fn(w, h, |x, y| {
                let bit = (seed >> ((x * 7 + y * 13) % 64)) & 1;
                if bit == 1 { BLACK } else { WHITE }
            });
            let mask = image_to_mask(&image);
            prop_assert_eq!(mask.width, w + 2);
            prop_assert_eq!(mask.height, h + 2);
            for x in 0..mask.width {
                prop_assert!(mask.is_wall(x, 0));
                prop_assert!(mask.is_wall(x, mask.height - 1));
            }
            for y in 0..mask.height {
                prop_assert!(mask.is_wall(0, y));
                prop_assert!(mask.is_wall(mask.width - 1, y));
            }
            // Top-left source pixel always ends up as wall
            prop_assert!(mask.is_wall(1, 1));
        }
    }
}
