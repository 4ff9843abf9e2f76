// crates/stillreel-core/src/frame.rs
//
// Packed pixel buffer handed from the image source to the encoder session.

use serde::{Deserialize, Serialize};

/// A decoded image: tightly packed RGBA rows, no stride padding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RgbaFrame {
    pub width:  u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub data:   Vec<u8>,
}

impl RgbaFrame {
    /// Byte length a frame of these dimensions must have.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// True when `data` matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_checks_byte_length() {
        let ok = RgbaFrame { width: 2, height: 3, data: vec![0; 24] };
        assert!(ok.is_well_formed());

        let short = RgbaFrame { width: 2, height: 3, data: vec![0; 23] };
        assert!(!short.is_well_formed());
    }
}
