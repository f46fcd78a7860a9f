//! Error metrics for the compare stage of a round-trip test.

use std::fmt;

use crate::image::{Image, CHANNELS};

/// Channel mask of the channels a source with `channel_count` channels
/// actually carries: L, L+A, RGB or RGBA.
pub fn significant_channels(channel_count: u32) -> [bool; CHANNELS] {
    match channel_count {
        1 => [true, false, false, false],
        2 => [true, false, false, true],
        3 => [true, true, true, false],
        _ => [true; CHANNELS],
    }
}

/// Fidelity of a decoded image against its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    /// PSNR in dB over all significant channels. Infinite for an exact match.
    pub psnr: f64,
    /// PSNR per channel, `None` for channels the source does not carry.
    pub channel_psnr: [Option<f64>; CHANNELS],
    /// Root mean square error over all significant channels.
    pub rmse: f64,
    /// Peak signal value used for PSNR.
    pub peak: f64,
}

impl ErrorMetrics {
    /// Compare `decoded` against `original`. Returns `None` if their
    /// dimensions differ.
    ///
    /// LDR values are compared in [0, 1]. For HDR sources the peak is the
    /// largest significant source value, never below 1.
    pub fn compute(
        original: &Image,
        decoded: &Image,
        is_hdr: bool,
        channel_count: u32,
    ) -> Option<Self> {
        let dims = original.dims();
        if decoded.dims() != dims {
            return None;
        }
        let mask = significant_channels(channel_count);

        let mut sum_sq = [0f64; CHANNELS];
        let mut peak = 1f64;
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let a = original.texel(x, y, z);
                    let b = decoded.texel(x, y, z);
                    for c in (0..CHANNELS).filter(|c| mask[*c]) {
                        let diff = f64::from(a[c]) - f64::from(b[c]);
                        sum_sq[c] += diff * diff;
                        if is_hdr && a[c].is_finite() {
                            peak = peak.max(f64::from(a[c]));
                        }
                    }
                }
            }
        }

        let texels = dims.volume().max(1) as f64;
        let psnr_of = |mse: f64| {
            if mse > 0.0 {
                10.0 * (peak * peak / mse).log10()
            } else {
                f64::INFINITY
            }
        };

        let mut channel_psnr = [None; CHANNELS];
        for c in (0..CHANNELS).filter(|c| mask[*c]) {
            channel_psnr[c] = Some(psnr_of(sum_sq[c] / texels));
        }
        let used = mask.iter().filter(|m| **m).count() as f64;
        let mse = sum_sq.iter().sum::<f64>() / (texels * used);

        Some(Self {
            psnr: psnr_of(mse),
            channel_psnr,
            rmse: mse.sqrt(),
            peak,
        })
    }
}

impl fmt::Display for ErrorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PSNR {:.4} dB, RMSE {:.6}", self.psnr, self.rmse)?;
        for (name, psnr) in ["R", "G", "B", "A"].iter().zip(self.channel_psnr) {
            if let Some(psnr) = psnr {
                write!(f, ", {name} {psnr:.4} dB")?;
            }
        }
        Ok(())
    }
}
