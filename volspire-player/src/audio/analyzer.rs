//! FFT spectrum analyzer
//!
//! Turns a raw sample buffer into a fixed number of normalized frequency bands:
//!
//! 1. Frame `fft_size` samples (zero tail when the input is short)
//! 2. Hann window
//! 3. Forward real FFT, squared magnitude per bin
//! 4. Decibels against a reference of 1.0
//! 5. Square-law band mapping, so low bins get most of the bands
//! 6. Normalize `[min_db, max_db]` to `[0, 1]`
//! 7. Exponential smoothing against the previous output
//!
//! All buffers are allocated once in [`SpectrumAnalyzer::new`]; `analyze` runs
//! on every spectrum tick and does not allocate.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;
use tracing::warn;
use volspire_common::config::AnalyzerConfig;

/// Windowed-FFT band analyzer with temporal smoothing
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    window: Vec<f32>,
    frame: Vec<f32>,
    bins: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bin_db: Vec<f32>,
    raw_bands: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub const DEFAULT_BAND_COUNT: usize = 64;

    /// Create an analyzer from (validated) analyzer settings
    pub fn new(config: &AnalyzerConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window = (0..fft_size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / fft_size as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        Self {
            frame: fft.make_input_vec(),
            bins: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            fft_size,
            smoothing: config.smoothing,
            min_db: config.min_db,
            max_db: config.max_db,
            window,
            bin_db: vec![0.0; fft_size / 2],
            raw_bands: vec![0.0; config.band_count],
            magnitudes: vec![0.0; config.band_count],
        }
    }

    /// Default tuning with a custom band count
    pub fn with_band_count(band_count: usize) -> Self {
        Self::new(&AnalyzerConfig {
            band_count,
            ..AnalyzerConfig::default()
        })
    }

    pub fn band_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Latest smoothed spectrum
    pub fn spectrum(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Zero the smoothed spectrum without recomputing anything
    pub fn reset(&mut self) {
        self.magnitudes.fill(0.0);
    }

    /// Analyze one buffer and return the updated spectrum
    ///
    /// For multi-channel input only the first `len / channel_count` samples
    /// are used, taken by index rather than de-interleaved. An empty buffer
    /// leaves the spectrum unchanged.
    pub fn analyze(&mut self, samples: &[f32], channel_count: usize) -> &[f32] {
        if samples.is_empty() {
            return &self.magnitudes;
        }

        let frames = samples.len() / channel_count.max(1);
        let n = frames.min(self.fft_size);

        for ((dst, src), w) in self.frame[..n]
            .iter_mut()
            .zip(&samples[..n])
            .zip(&self.window[..n])
        {
            *dst = if src.is_finite() { src * w } else { 0.0 };
        }
        self.frame[n..].fill(0.0);

        // The FFT uses `frame` as scratch space, which is why it is rebuilt every call
        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.frame, &mut self.bins, &mut self.scratch)
        {
            warn!("Spectrum FFT failed: {}", e);
            return &self.magnitudes;
        }

        for (db, bin) in self.bin_db.iter_mut().zip(&self.bins) {
            // Floor keeps silent bins finite so band means never go to -inf
            let power = bin.norm_sqr().max(f32::MIN_POSITIVE);
            *db = 20.0 * power.log10();
        }

        map_to_bands(&self.bin_db, &mut self.raw_bands, self.min_db, self.max_db);

        let smoothing = self.smoothing;
        for (out, raw) in self.magnitudes.iter_mut().zip(&self.raw_bands) {
            *out = smoothing * *out + (1.0 - smoothing) * raw;
        }

        &self.magnitudes
    }
}

/// FFT bin range `[low, high)` covered by `band`
///
/// Edges grow with the square of the band index. Every band covers at least
/// one bin, and the range never runs past `bin_count`.
pub fn band_bin_range(band: usize, band_count: usize, bin_count: usize) -> (usize, usize) {
    let low_fraction = (band as f32 / band_count as f32).powi(2);
    let high_fraction = ((band + 1) as f32 / band_count as f32).powi(2);

    let low = (low_fraction * bin_count as f32) as usize;
    let high = ((high_fraction * bin_count as f32) as usize)
        .max(low + 1)
        .min(bin_count);
    (low, high)
}

fn map_to_bands(bin_db: &[f32], bands: &mut [f32], min_db: f32, max_db: f32) {
    let bin_count = bin_db.len();
    let band_count = bands.len();

    for (i, band) in bands.iter_mut().enumerate() {
        let (low, high) = band_bin_range(i, band_count, bin_count);
        let avg_db = if high > low {
            bin_db[low..high].iter().sum::<f32>() / (high - low) as f32
        } else {
            min_db
        };
        *band = ((avg_db - min_db) / (max_db - min_db)).clamp(0.0, 1.0);
    }
}

/// Reduce a spectrum to `band_count` values
///
/// Each output is the mean of a contiguous chunk of `len / band_count`
/// inputs; trailing inputs that do not fill a chunk are ignored. The result
/// always has exactly `band_count` values (zero-padded when the input is
/// shorter than the output).
pub fn downsample(spectrum: &[f32], band_count: usize) -> Vec<f32> {
    let mut result = vec![0.0; band_count];
    if spectrum.is_empty() || band_count == 0 {
        return result;
    }

    let chunk_size = spectrum.len() / band_count;
    if chunk_size == 0 {
        result[..spectrum.len()].copy_from_slice(spectrum);
        return result;
    }

    for (i, out) in result.iter_mut().enumerate() {
        let start = i * chunk_size;
        let end = (start + chunk_size).min(spectrum.len());
        let slice = &spectrum[start..end];
        *out = slice.iter().sum::<f32>() / slice.len() as f32;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(&AnalyzerConfig::default())
    }

    fn assert_in_unit_range(values: &[f32]) {
        for v in values {
            assert!((0.0..=1.0).contains(v), "band value {} outside [0, 1]", v);
        }
    }

    #[test]
    fn test_initial_spectrum_is_zero() {
        let a = analyzer();
        assert_eq!(a.band_count(), 64);
        assert_eq!(a.fft_size(), 2048);
        assert!(a.spectrum().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_empty_input_keeps_previous_state() {
        let mut a = analyzer();
        let dc = vec![0.5f32; 2048];
        let before = a.analyze(&dc, 1).to_vec();

        let after = a.analyze(&[], 1).to_vec();
        assert_eq!(after, before);
        assert_eq!(after.len(), 64);
    }

    #[test]
    fn test_output_length_fixed_for_any_input_size() {
        let mut a = analyzer();
        for len in [1usize, 7, 100, 2047, 2048, 4096, 10_000] {
            let samples = vec![0.25f32; len];
            assert_eq!(a.analyze(&samples, 1).len(), 64);
            assert_eq!(a.analyze(&samples, 2).len(), 64);
        }
    }

    #[test]
    fn test_silence_stays_zero() {
        let mut a = analyzer();
        let out = a.analyze(&vec![0.0f32; 2048], 1);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_dc_signal_lights_lowest_bands_only() {
        let mut a = analyzer();
        let out = a.analyze(&vec![0.5f32; 2048], 1).to_vec();

        // DC lands in bin 0, which bands 0 and 1 both cover
        assert!(out[0] > 0.2);
        assert!(out[1] > 0.2);
        assert!(out[40..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_smoothing_applies_inertia() {
        let mut a = analyzer();
        let dc = vec![0.5f32; 2048];

        // Raw band 0 saturates at 1.0, so the smoothed value follows 0.3, 0.51, ...
        let first = a.analyze(&dc, 1)[0];
        assert!((first - 0.3).abs() < 1e-5);
        let second = a.analyze(&dc, 1)[0];
        assert!((second - 0.51).abs() < 1e-5);
    }

    #[test]
    fn test_bounds_with_hostile_input() {
        let mut a = analyzer();
        let mut samples: Vec<f32> = (0..2048)
            .map(|i| ((i * 7919) % 2003) as f32 / 1001.5 - 1.0)
            .collect();
        assert_in_unit_range(a.analyze(&samples, 1));

        samples[3] = f32::NAN;
        samples[9] = f32::INFINITY;
        samples[10] = 1e30;
        assert_in_unit_range(a.analyze(&samples, 1));
        assert_in_unit_range(a.analyze(&samples, 6));
    }

    #[test]
    fn test_multichannel_uses_first_slice_by_index() {
        let interleaved: Vec<f32> = (0..4096)
            .map(|i| {
                let gain = if i % 2 == 0 { 0.8 } else { -0.3 };
                gain * (i as f32 * 0.01).sin()
            })
            .collect();

        let mut stereo = analyzer();
        let mut mono = analyzer();
        let from_stereo = stereo.analyze(&interleaved, 2).to_vec();
        let from_prefix = mono.analyze(&interleaved[..2048], 1).to_vec();
        assert_eq!(from_stereo, from_prefix);
    }

    #[test]
    fn test_undersized_input_is_zero_padded() {
        let mut padded = analyzer();
        let mut explicit = analyzer();

        let short = vec![0.5f32; 100];
        let mut long = short.clone();
        long.resize(2048, 0.0);

        assert_eq!(padded.analyze(&short, 1).to_vec(), explicit.analyze(&long, 1).to_vec());
    }

    #[test]
    fn test_reset_zeroes_spectrum() {
        let mut a = analyzer();
        a.analyze(&vec![0.5f32; 2048], 1);
        assert!(a.spectrum()[0] > 0.0);

        a.reset();
        assert!(a.spectrum().iter().all(|v| *v == 0.0));
        assert_eq!(a.spectrum().len(), 64);
    }

    #[test]
    fn test_band_bin_ranges() {
        let bin_count = 1024;
        assert_eq!(band_bin_range(0, 64, bin_count), (0, 1));
        assert_eq!(band_bin_range(20, 64, bin_count), (100, 110));
        assert_eq!(band_bin_range(63, 64, bin_count).1, bin_count);

        let mut prev_low = 0;
        for band in 0..64 {
            let (low, high) = band_bin_range(band, 64, bin_count);
            assert!(low >= prev_low);
            assert!(high > low);
            assert!(high <= bin_count);
            prev_low = low;
        }
    }

    #[test]
    fn test_custom_range_normalization() {
        let config = AnalyzerConfig {
            min_db: -40.0,
            max_db: 200.0,
            smoothing: 0.0,
            ..AnalyzerConfig::default()
        };
        let mut a = SpectrumAnalyzer::new(&config);
        let out = a.analyze(&vec![0.5f32; 2048], 1);

        // DC bin is ~108 dB, which no longer saturates a 240 dB range
        assert!(out[0] > 0.5 && out[0] < 1.0);
    }

    #[test]
    fn test_downsample_64_to_5() {
        let spectrum: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        let small = downsample(&spectrum, 5);
        assert_eq!(small.len(), 5);

        // chunk size 12; inputs 60..64 are not covered
        for (i, value) in small.iter().enumerate() {
            let chunk = &spectrum[i * 12..i * 12 + 12];
            let mean = chunk.iter().sum::<f32>() / 12.0;
            assert!((value - mean).abs() < 1e-6);
        }
    }

    #[test]
    fn test_downsample_edge_cases() {
        assert_eq!(downsample(&[], 5), vec![0.0; 5]);
        assert!(downsample(&[1.0, 2.0], 0).is_empty());
        assert_eq!(downsample(&[0.5, 0.25], 5), vec![0.5, 0.25, 0.0, 0.0, 0.0]);
        assert_eq!(downsample(&[1.0; 5], 5), vec![1.0; 5]);
    }
}
