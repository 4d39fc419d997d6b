//! Format, present-mode, and composite-alpha enumeration (spec §4.3).

use smallvec::SmallVec;

/// The fixed surface format table this engine knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    /// `B8G8R8A8_SRGB`, 8 bits per channel.
    B8g8r8a8Srgb,
    /// `B8G8R8A8_UNORM`, 8 bits per channel.
    B8g8r8a8Unorm,
    /// `A2R10G10B10_UNORM_PACK32`, 10 bits per RGB channel, 2 bits alpha.
    A2r10g10b10UnormPack32,
}

impl SurfaceFormat {
    const ALL: [SurfaceFormat; 3] = [
        SurfaceFormat::B8g8r8a8Srgb,
        SurfaceFormat::B8g8r8a8Unorm,
        SurfaceFormat::A2r10g10b10UnormPack32,
    ];

    fn bits_per_rgb_channel(self) -> u32 {
        match self {
            SurfaceFormat::B8g8r8a8Srgb | SurfaceFormat::B8g8r8a8Unorm => 8,
            SurfaceFormat::A2r10g10b10UnormPack32 => 10,
        }
    }

    /// Colorspace is always sRGB-nonlinear for every format in the table.
    pub fn colorspace(self) -> &'static str {
        "srgb-nonlinear"
    }
}

/// The red/green/blue channel masks of an X11 visual, as reported by
/// `get_window_attributes`/the screen's visual list.
#[derive(Debug, Clone, Copy)]
pub struct RgbMasks {
    /// Red channel mask.
    pub red: u32,
    /// Green channel mask.
    pub green: u32,
    /// Blue channel mask.
    pub blue: u32,
}

/// Enumerates formats usable with `visual`, in priority order, applying
/// the `force_bgra8_unorm_first` override if requested (spec §4.3).
pub fn supported_formats(visual: RgbMasks, force_bgra8_unorm_first: bool) -> SmallVec<[SurfaceFormat; 3]> {
    let per_channel_bits = [
        visual.red.count_ones(),
        visual.green.count_ones(),
        visual.blue.count_ones(),
    ];

    let mut formats: SmallVec<[SurfaceFormat; 3]> = SurfaceFormat::ALL
        .into_iter()
        .filter(|format| per_channel_bits.iter().all(|&bits| bits == format.bits_per_rgb_channel()))
        .collect();

    if force_bgra8_unorm_first {
        if let Some(pos) = formats.iter().position(|f| *f == SurfaceFormat::B8g8r8a8Unorm) {
            formats.swap(0, pos);
        }
    }

    formats
}

/// The four KHR present modes, in the priority order clients should try
/// them (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// Present as soon as possible; tearing is allowed.
    Immediate,
    /// Present as soon as possible from the most recently queued image;
    /// older queued images are replaced, never blocking the producer.
    Mailbox,
    /// Present at most one image per vblank, in submission order.
    Fifo,
    /// Like `Fifo`, but a late image may tear in rather than wait for
    /// the next vblank.
    FifoRelaxed,
}

/// `PresentMode`s in the order surface queries should report them.
pub const PRESENT_MODES_IN_PRIORITY_ORDER: [PresentMode; 4] = [
    PresentMode::Immediate,
    PresentMode::Mailbox,
    PresentMode::Fifo,
    PresentMode::FifoRelaxed,
];

/// Composite-alpha handling a surface supports, depending on whether its
/// visual carries bits beyond the RGB mask (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeAlpha {
    /// No alpha bits: the window is always fully opaque.
    Opaque,
    /// Alpha bits present: inherit the destination's existing alpha.
    Inherit,
    /// Alpha bits present: the source's colors are already premultiplied.
    PreMultiplied,
}

/// Returns the composite-alpha modes supported for a visual of the given
/// pixel `depth` with the given RGB masks.
pub fn supported_composite_alpha(depth: u8, visual: RgbMasks) -> SmallVec<[CompositeAlpha; 2]> {
    let rgb_bits = visual.red.count_ones() + visual.green.count_ones() + visual.blue.count_ones();
    if u32::from(depth) > rgb_bits {
        SmallVec::from_slice(&[CompositeAlpha::Inherit, CompositeAlpha::PreMultiplied])
    } else {
        SmallVec::from_slice(&[CompositeAlpha::Opaque])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUECOLOR_8888: RgbMasks = RgbMasks {
        red: 0x00ff_0000,
        green: 0x0000_ff00,
        blue: 0x0000_00ff,
    };

    const TRUECOLOR_101010: RgbMasks = RgbMasks {
        red: 0x3ff0_0000,
        green: 0x000f_fc00,
        blue: 0x0000_03ff,
    };

    #[test]
    fn eight_bit_visual_yields_both_bgra8_formats_only() {
        let formats = supported_formats(TRUECOLOR_8888, false);
        assert_eq!(
            formats.as_slice(),
            &[SurfaceFormat::B8g8r8a8Srgb, SurfaceFormat::B8g8r8a8Unorm]
        );
    }

    #[test]
    fn force_bgra8_unorm_first_reorders() {
        let formats = supported_formats(TRUECOLOR_8888, true);
        assert_eq!(formats[0], SurfaceFormat::B8g8r8a8Unorm);
    }

    #[test]
    fn ten_bit_visual_yields_only_a2r10g10b10() {
        let formats = supported_formats(TRUECOLOR_101010, false);
        assert_eq!(formats.as_slice(), &[SurfaceFormat::A2r10g10b10UnormPack32]);
    }

    #[test]
    fn opaque_only_without_alpha_bits() {
        let alphas = supported_composite_alpha(24, TRUECOLOR_8888);
        assert_eq!(alphas.as_slice(), &[CompositeAlpha::Opaque]);
    }

    #[test]
    fn inherit_and_premultiplied_with_alpha_bits() {
        let alphas = supported_composite_alpha(32, TRUECOLOR_8888);
        assert_eq!(
            alphas.as_slice(),
            &[CompositeAlpha::Inherit, CompositeAlpha::PreMultiplied]
        );
    }

    #[test]
    fn present_mode_priority_order_is_stable() {
        assert_eq!(
            PRESENT_MODES_IN_PRIORITY_ORDER,
            [
                PresentMode::Immediate,
                PresentMode::Mailbox,
                PresentMode::Fifo,
                PresentMode::FifoRelaxed,
            ]
        );
    }
}
