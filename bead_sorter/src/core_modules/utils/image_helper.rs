// Debug rendering of a capture: the raw image, the arc pixels the locator kept,
// and a swatch of the color it measured underneath. Only used by offline tools.

pub mod image_helper {
    use image::{ImageResult, Rgb, RgbImage, imageops};
    use std::path::Path;

    use crate::core_modules::bead_locator::BeadSample;
    use crate::core_modules::color::color::Color;
    use crate::core_modules::pixel_buffer::PixelBuffer;

    /// Rows of bead-color swatch drawn under the capture.
    pub const SWATCH_ROWS: u32 = 10;
    pub const HIGHLIGHT: Rgb<u8> = Rgb([255, 0, 0]);

    fn rgb(color: Color) -> Rgb<u8> {
        Rgb([color.red, color.green, color.blue])
    }

    pub fn render(buffer: &PixelBuffer, sample: &BeadSample) -> RgbImage {
        let width = buffer.width();
        let height = buffer.height();
        let mut image = RgbImage::new(width, height + SWATCH_ROWS);

        for index in 0..buffer.len() {
            let (x, y) = buffer.coordinates(index);
            image.put_pixel(x, y, rgb(buffer.color_at(index)));
        }
        for &index in &sample.arc.retained {
            let (x, y) = buffer.coordinates(index);
            image.put_pixel(x, y, HIGHLIGHT);
        }
        for y in height..height + SWATCH_ROWS {
            for x in 0..width {
                image.put_pixel(x, y, rgb(sample.color));
            }
        }
        image
    }

    /// Writes `image` as a PNG, blown up `scale` times with nearest-neighbour sampling.
    pub fn save(path: &Path, image: &RgbImage, scale: u32) -> ImageResult<()> {
        let scale = scale.max(1);
        let scaled = imageops::resize(
            image,
            image.width() * scale,
            image.height() * scale,
            imageops::FilterType::Nearest,
        );
        scaled.save_with_format(path, image::ImageFormat::Png)
    }
}
