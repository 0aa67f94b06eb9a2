// THEORY:
// The `color` module is the leaf of the whole sorter. Everything above it (the
// arc sampler, the locator, the tube store) only ever asks two questions about
// colors: "how different are these two?" and "what is the typical color of this
// handful of pixels?".
//
// 1.  **Redmean distance**: Plain Euclidean RGB distance treats a red shift the
//     same as a blue shift, which doesn't match how beads look to a person. The
//     redmean approximation weights the red and blue channel differences by the
//     average red level of the pair and the green difference by a flat 4. The
//     constants (512 + rmean, 767 - rmean, both >> 8) are the psychovisual tuning
//     the clustering threshold was calibrated against; changing them invalidates
//     every threshold in the config.
// 2.  **Quadratic mean**: Averaging a bead's samples uses the root of the mean
//     of squares per channel, which leans towards the brighter, more saturated
//     samples on the curved surface.
// 3.  **Sensor boundary**: The camera hands us RGB565. Expanding 5/6-bit
//     channels to 8 bits uses rounded rescaling so fixtures stay bit-exact.

pub mod color {
    pub type Channel = u8;
    pub type Distance = u32;

    /// An immutable 8-bit-per-channel RGB color.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Color {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    impl Color {
        pub const ZERO: Color = Color::new(0, 0, 0);

        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Expands a packed 5/6/5 sensor pixel into 8-bit channels.
        pub fn from_rgb565(packed: u16) -> Self {
            let red5 = u32::from(packed >> 11) & 0b1_1111;
            let green6 = u32::from(packed >> 5) & 0b11_1111;
            let blue5 = u32::from(packed) & 0b1_1111;

            Self {
                red: ((red5 * 255 + 15) / 31) as Channel,
                green: ((green6 * 255 + 31) / 63) as Channel,
                blue: ((blue5 * 255 + 15) / 31) as Channel,
            }
        }

        /// Packs the color back into RGB565, truncating the low bits.
        pub fn to_rgb565(self) -> u16 {
            (u16::from(self.red >> 3) << 11) | (u16::from(self.green >> 2) << 5) | u16::from(self.blue >> 3)
        }

        pub fn distance(&self, other: &Color) -> Distance {
            distance(*self, *other)
        }
    }

    impl std::fmt::Display for Color {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        }
    }

    /// Redmean-weighted perceptual distance between two colors.
    pub fn distance(a: Color, b: Color) -> Distance {
        let rmean = (i64::from(a.red) + i64::from(b.red)) / 2;
        let dr = i64::from(a.red) - i64::from(b.red);
        let dg = i64::from(a.green) - i64::from(b.green);
        let db = i64::from(a.blue) - i64::from(b.blue);

        let weighted = (((512 + rmean) * dr * dr) >> 8) + 4 * dg * dg + (((767 - rmean) * db * db) >> 8);

        // Every term is non-negative: rmean never exceeds 255.
        (weighted as u64).isqrt() as Distance
    }

    /// Per-channel quadratic mean. An empty input averages to `Color::ZERO`.
    pub fn mean<I>(colors: I) -> Color
    where
        I: IntoIterator<Item = Color>,
    {
        let mut count = 0u64;
        let (mut sum_r, mut sum_g, mut sum_b) = (0u64, 0u64, 0u64);

        for color in colors {
            count += 1;
            sum_r += u64::from(color.red).pow(2);
            sum_g += u64::from(color.green).pow(2);
            sum_b += u64::from(color.blue).pow(2);
        }

        if count == 0 {
            return Color::ZERO;
        }

        Color {
            red: (sum_r / count).isqrt() as Channel,
            green: (sum_g / count).isqrt() as Channel,
            blue: (sum_b / count).isqrt() as Channel,
        }
    }

}
