//! Positional spatializer: inverse-distance attenuation with equal-power panning.
//! The listener sits at the origin facing -Z.

const REF_DISTANCE: f64 = 1.0;
const ROLLOFF: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGain {
    pub left: f32,
    pub right: f32,
}

impl StereoGain {
    pub const CENTER: StereoGain = StereoGain {
        left: std::f32::consts::FRAC_1_SQRT_2,
        right: std::f32::consts::FRAC_1_SQRT_2,
    };
}

/// Gains for a source at live (x, z), positions scaled by `width` (0 = centered)
pub fn spatialize(x: f64, z: f64, width: f64) -> StereoGain {
    let (x, z) = (x * width, z * width);
    if !(x.is_finite() && z.is_finite()) {
        return StereoGain::CENTER;
    }

    let distance = (x * x + z * z).sqrt();
    let attenuation = REF_DISTANCE / (REF_DISTANCE + ROLLOFF * (distance.max(REF_DISTANCE) - REF_DISTANCE));
    if distance <= f64::EPSILON {
        return StereoGain::CENTER;
    }

    // Azimuth in degrees, folded into the frontal half-plane
    let mut azimuth = x.atan2(-z).to_degrees();
    if azimuth > 90.0 {
        azimuth = 180.0 - azimuth;
    } else if azimuth < -90.0 {
        azimuth = -180.0 - azimuth;
    }

    let pan = (azimuth + 90.0) / 180.0 * std::f64::consts::FRAC_PI_2;
    StereoGain {
        left: (pan.cos() * attenuation) as f32,
        right: (pan.sin() * attenuation) as f32,
    }
}
