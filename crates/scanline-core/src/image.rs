/// An owned RGBA8888 pixel buffer.
///
/// The reader treats the "real" image container as an external collaborator
/// it only needs a contract for; this is the concrete stand-in the rest of
/// the crate compiles and is tested against.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Image {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn solid_color(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Image { width, height, data }
    }

    /// Copies `pixels` in, converting to RGBA8888 when the source isn't
    /// already 4 bytes per pixel. Only the formats the scaler ever hands
    /// back (RGBA and RGB24) are supported; anything else is a caller bug.
    pub fn from_pixels(width: u32, height: u32, bytes_per_pixel: u32, pixels: &[u8]) -> Self {
        match bytes_per_pixel {
            4 => Image {
                width,
                height,
                data: pixels.to_vec(),
            },
            3 => {
                let mut data = Vec::with_capacity(width as usize * height as usize * 4);
                for chunk in pixels.chunks_exact(3) {
                    data.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
                }
                Image { width, height, data }
            }
            other => panic!("unsupported bytes-per-pixel: {other}"),
        }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_fills_every_pixel() {
        let img = Image::solid_color(2, 2, [10, 20, 30, 255]);
        assert_eq!(img.data.len(), 16);
        assert!(img.data.chunks_exact(4).all(|p| p == [10, 20, 30, 255]));
    }

    #[test]
    fn from_pixels_converts_rgb24_to_rgba() {
        let rgb = vec![1, 2, 3, 4, 5, 6];
        let img = Image::from_pixels(2, 1, 3, &rgb);
        assert_eq!(img.data, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }
}
