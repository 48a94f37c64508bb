use std::io;
use std::sync::Arc;

/// One captured video frame. Pixel layout is whatever the vision backend
/// produces; the core only passes frames back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }
}

/// Screen rectangle in capture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Capture and recognition backend.
pub trait Vision: Send {
    fn capture(&mut self) -> io::Result<Frame>;

    /// Text of a single line inside `region`. `invert` flips the image first,
    /// for light text on dark backgrounds.
    fn recognize_line(&mut self, frame: &Frame, region: Region, invert: bool) -> io::Result<String>;

    /// PNG bytes of `region`, for publishing to users.
    fn encode_png(&mut self, frame: &Frame, region: Region, invert: bool) -> io::Result<Vec<u8>>;
}
