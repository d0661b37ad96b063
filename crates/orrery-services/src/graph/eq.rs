//! Three-band EQ: low shelf, mid peak, high shelf

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use orrery_core::{EqBand, EqSettings};

#[derive(Debug, Clone, Copy)]
enum BandKind {
    LowShelf,
    Peak,
    HighShelf,
}

struct BandFilter {
    kind: BandKind,
    band: EqBand,
    left: DirectForm2Transposed<f32>,
    right: DirectForm2Transposed<f32>,
}

impl BandFilter {
    fn new(kind: BandKind, band: EqBand, sample_rate: f32) -> Self {
        let coeffs = coefficients(kind, band, sample_rate).unwrap_or_else(unity);
        Self {
            kind,
            band,
            left: DirectForm2Transposed::<f32>::new(coeffs),
            right: DirectForm2Transposed::<f32>::new(coeffs),
        }
    }

    fn set(&mut self, band: EqBand, sample_rate: f32) {
        if band == self.band {
            return;
        }
        // Invalid parameters (e.g. above Nyquist) keep the previous response
        if let Some(coeffs) = coefficients(self.kind, band, sample_rate) {
            self.left.update_coefficients(coeffs);
            self.right.update_coefficients(coeffs);
        }
        self.band = band;
    }

    #[inline]
    fn run(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.run(left), self.right.run(right))
    }
}

fn coefficients(kind: BandKind, band: EqBand, sample_rate: f32) -> Option<Coefficients<f32>> {
    if !(band.gain_db.is_finite() && band.frequency_hz.is_finite() && band.q.is_finite()) {
        return None;
    }
    let filter = match kind {
        BandKind::LowShelf => Type::LowShelf(band.gain_db),
        BandKind::Peak => Type::PeakingEQ(band.gain_db),
        BandKind::HighShelf => Type::HighShelf(band.gain_db),
    };
    Coefficients::<f32>::from_params(filter, sample_rate.hz(), band.frequency_hz.hz(), band.q.max(0.01)).ok()
}

fn unity() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Stereo EQ stage in series: low shelf into mid peak into high shelf
pub struct ThreeBandEq {
    sample_rate: f32,
    bands: [BandFilter; 3],
}

impl ThreeBandEq {
    pub fn new(settings: &EqSettings, sample_rate: f32) -> Self {
        Self {
            sample_rate,
            bands: [
                BandFilter::new(BandKind::LowShelf, settings.low, sample_rate),
                BandFilter::new(BandKind::Peak, settings.mid, sample_rate),
                BandFilter::new(BandKind::HighShelf, settings.high, sample_rate),
            ],
        }
    }

    pub fn set(&mut self, settings: &EqSettings) {
        let sample_rate = self.sample_rate;
        let [low, mid, high] = &mut self.bands;
        low.set(settings.low, sample_rate);
        mid.set(settings.mid, sample_rate);
        high.set(settings.high, sample_rate);
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.bands
            .iter_mut()
            .fold((left, right), |(l, r), band| band.run(l, r))
    }
}
