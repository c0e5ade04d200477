// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values produced by operators and handed between nodes.

use std::sync::Arc;

/// Pixel data produced by an image operator.
///
/// Pixels are shared behind an [`Arc`], so cloning a value that crosses
/// the result hand-off is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA pixels, row-major
    pub pixels: Arc<Vec<[f32; 4]>>,
}

impl ImageData {
    /// Create an image filled with a constant color
    pub fn constant(width: u32, height: u32, color: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: Arc::new(vec![color; (width as usize) * (height as usize)]),
        }
    }
}

/// A value flowing through the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// 2D vector
    Vec2([f64; 2]),
    /// 3D vector
    Vec3([f64; 3]),
    /// Color (RGBA)
    Color([f32; 4]),
    /// String
    Text(String),
    /// Raster image
    Image(ImageData),
}

impl Value {
    /// Interpret the value as a float, if it is one
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Interpret the value as an image, if it is one
    pub fn as_image(&self) -> Option<&ImageData> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image() {
        let image = ImageData::constant(4, 2, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(image.pixels.len(), 8);
        assert_eq!(image.pixels[0], [1.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Text("x".to_string()).as_float(), None);
    }
}
