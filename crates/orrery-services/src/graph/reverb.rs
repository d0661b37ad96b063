//! Convolution reverb
//!
//! Uniformly partitioned overlap-save convolution: the impulse response is
//! split into `BLOCK`-sized partitions, each transformed once up front. Every
//! `BLOCK` input samples are transformed and pushed into a frequency-domain
//! delay line, multiplied against the partitions and transformed back. The wet
//! path therefore lags by one block.

use std::sync::Arc;

use orrery_core::ImpulseKey;
use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

pub const BLOCK: usize = 256;
const FFT_SIZE: usize = 2 * BLOCK;

/// Two channels of exponentially decaying noise:
/// `random(-1, 1) * e^(-decay * t / size)`.
///
/// Each channel is scaled to unit energy after generation. The raw curve gets
/// louder as the room grows, so without the scaling the reverb send level would
/// shift with every size or decay change.
pub fn generate_impulse(key: ImpulseKey, sample_rate: f32, rng: &mut fastrand::Rng) -> [Vec<f32>; 2] {
    let len = ((key.size_s * sample_rate) as usize).max(1);
    let mut channel = || {
        let mut ir: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                (rng.f32() * 2.0 - 1.0) * (-key.decay * t / key.size_s).exp()
            })
            .collect();
        let energy = ir.iter().map(|s| s * s).sum::<f32>().sqrt();
        if energy > f32::EPSILON {
            ir.iter_mut().for_each(|s| *s /= energy);
        }
        ir
    };
    [channel(), channel()]
}

struct ChannelConvolver {
    partitions: Vec<Vec<Complex32>>,
    delay_line: Vec<Vec<Complex32>>,
    head: usize,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    time_scratch: Vec<f32>,
    spectrum: Vec<Complex32>,
    accumulator: Vec<Complex32>,
}

impl ChannelConvolver {
    fn new(impulse: &[f32], r2c: &Arc<dyn RealToComplex<f32>>) -> Self {
        let mut time_scratch = vec![0.0; FFT_SIZE];
        let partitions: Vec<Vec<Complex32>> = impulse
            .chunks(BLOCK)
            .map(|chunk| {
                time_scratch.fill(0.0);
                time_scratch[..chunk.len()].copy_from_slice(chunk);
                let mut spectrum = r2c.make_output_vec();
                // Buffer lengths always match the plan
                let _ = r2c.process(&mut time_scratch, &mut spectrum);
                spectrum
            })
            .collect();
        let count = partitions.len().max(1);

        Self {
            delay_line: vec![r2c.make_output_vec(); count],
            partitions,
            head: 0,
            window: vec![0.0; FFT_SIZE],
            input: vec![0.0; BLOCK],
            output: vec![0.0; BLOCK],
            time_scratch,
            spectrum: r2c.make_output_vec(),
            accumulator: r2c.make_output_vec(),
        }
    }

    fn process_block(&mut self, r2c: &dyn RealToComplex<f32>, c2r: &dyn ComplexToReal<f32>) {
        self.window.copy_within(BLOCK.., 0);
        self.window[BLOCK..].copy_from_slice(&self.input);
        self.time_scratch.copy_from_slice(&self.window);
        let _ = r2c.process(&mut self.time_scratch, &mut self.spectrum);

        let count = self.delay_line.len();
        self.head = (self.head + 1) % count;
        self.delay_line[self.head].copy_from_slice(&self.spectrum);

        self.accumulator.fill(Complex32::new(0.0, 0.0));
        for (p, partition) in self.partitions.iter().enumerate() {
            let past = &self.delay_line[(self.head + count - p) % count];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }

        // c2r requires purely real DC and Nyquist bins
        let last = self.accumulator.len() - 1;
        self.accumulator[0].im = 0.0;
        self.accumulator[last].im = 0.0;
        let _ = c2r.process(&mut self.accumulator, &mut self.time_scratch);

        let scale = 1.0 / FFT_SIZE as f32;
        for (out, y) in self.output.iter_mut().zip(&self.time_scratch[BLOCK..]) {
            *out = y * scale;
        }
    }
}

/// Stereo convolver; built on the control side and handed to the engine whole
pub struct Convolver {
    channels: [ChannelConvolver; 2],
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    fill: usize,
}

impl Convolver {
    pub fn new(impulse: &[Vec<f32>; 2]) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(FFT_SIZE);
        let c2r = planner.plan_fft_inverse(FFT_SIZE);
        Self {
            channels: [
                ChannelConvolver::new(&impulse[0], &r2c),
                ChannelConvolver::new(&impulse[1], &r2c),
            ],
            r2c,
            c2r,
            fill: 0,
        }
    }

    /// Number of impulse partitions per channel
    pub fn partitions(&self) -> usize {
        self.channels[0].partitions.len()
    }

    /// Feed one frame, returning the wet frame from one block earlier
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let i = self.fill;
        let [l, r] = &mut self.channels;
        let wet = (l.output[i], r.output[i]);
        l.input[i] = left;
        r.input[i] = right;

        self.fill += 1;
        if self.fill == BLOCK {
            self.fill = 0;
            for channel in &mut self.channels {
                channel.process_block(self.r2c.as_ref(), self.c2r.as_ref());
            }
        }
        wet
    }
}
