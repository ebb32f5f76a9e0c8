//! Synthetic sample generators for driving a pipeline without hardware.
//!
//! All generators are deterministic, which keeps tests and demos repeatable.
//!
//! # Example
//!
//! ```
//! use stream_capture::synthetic::{AudioGenerator, FaceTrack};
//! use std::time::Duration;
//!
//! let mut track = FaceTrack::new(7, Duration::from_millis(33));
//! let first = track.next_sample();
//! assert_eq!(first.tracking_id, 7);
//!
//! let mut mic = AudioGenerator::new(16000, 1);
//! let frame = mic.sine(440.0, 100);
//! assert_eq!(frame.duration(), Duration::from_millis(100));
//! ```

use std::time::Duration;

use crate::sample::{AudioFrame, FaceBounds, FaceSample, FingerprintScan};

/// A face drifting across a 640x480 preview, one sample per frame.
#[derive(Debug, Clone)]
pub struct FaceTrack {
    tracking_id: u32,
    frame_interval: Duration,
    frame: u32,
}

impl FaceTrack {
    /// Creates a track emitting one face per `frame_interval`.
    pub fn new(tracking_id: u32, frame_interval: Duration) -> Self {
        Self {
            tracking_id,
            frame_interval,
            frame: 0,
        }
    }

    /// Returns the face for the next frame.
    pub fn next_sample(&mut self) -> FaceSample {
        let t = self.frame as f32;
        let bounds = FaceBounds {
            x: 200.0 + 80.0 * (t / 15.0).sin(),
            y: 140.0 + 30.0 * (t / 23.0).cos(),
            width: 220.0,
            height: 260.0,
        };
        // Blink every 40 frames, smile on a slow cycle.
        let eye = if self.frame % 40 < 3 { 0.05 } else { 0.95 };
        let mut face = FaceSample::new(self.tracking_id, bounds, self.frame_interval * self.frame);
        face.left_eye_open = Some(eye);
        face.right_eye_open = Some(eye);
        face.smiling = Some(0.5 + 0.5 * (t / 50.0).sin());

        self.frame += 1;
        face
    }

    /// Number of samples produced so far.
    pub fn frames(&self) -> u32 {
        self.frame
    }
}

impl Iterator for FaceTrack {
    type Item = FaceSample;

    fn next(&mut self) -> Option<FaceSample> {
        Some(self.next_sample())
    }
}

/// Produces consecutive PCM frames with running timestamps.
#[derive(Debug, Clone)]
pub struct AudioGenerator {
    sample_rate: u32,
    channels: u16,
    elapsed: Duration,
    phase_frames: u64,
}

impl AudioGenerator {
    /// Creates a generator for the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            elapsed: Duration::ZERO,
            phase_frames: 0,
        }
    }

    /// 16kHz mono, the usual voice-capture format.
    pub fn voice() -> Self {
        Self::new(16000, 1)
    }

    /// Next `duration_ms` of silence.
    pub fn silence(&mut self, duration_ms: u64) -> AudioFrame {
        let frames = self.frames_for(duration_ms);
        let samples = vec![0i16; frames * self.channels as usize];
        self.emit(samples, frames)
    }

    /// Next `duration_ms` of a sine tone, phase-continuous across calls.
    pub fn sine(&mut self, frequency: f64, duration_ms: u64) -> AudioFrame {
        let frames = self.frames_for(duration_ms);
        let sample_rate = f64::from(self.sample_rate.max(1));
        let mut samples = Vec::with_capacity(frames * self.channels as usize);

        for i in 0..frames as u64 {
            let t = (self.phase_frames + i) as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            let sample = (value * 32767.0) as i16;
            for _ in 0..self.channels {
                samples.push(sample);
            }
        }
        self.emit(samples, frames)
    }

    fn frames_for(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }

    fn emit(&mut self, samples: Vec<i16>, frames: usize) -> AudioFrame {
        let frame = AudioFrame::new(samples, self.elapsed, self.sample_rate, self.channels);
        self.elapsed += frame.duration();
        self.phase_frames += frames as u64;
        frame
    }
}

/// Produces fingerprint scans with a ridge-like stripe pattern.
#[derive(Debug, Clone)]
pub struct ScanGenerator {
    width: u32,
    height: u32,
    scans: u32,
}

impl ScanGenerator {
    /// Creates a generator for `width` x `height` images.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scans: 0,
        }
    }

    /// Returns the next scan. Quality cycles between 40 and 99.
    pub fn next_scan(&mut self) -> FingerprintScan {
        let offset = self.scans;
        let mut image = Vec::with_capacity(pixel_count(self.width, self.height));
        for y in 0..self.height {
            for x in 0..self.width {
                let ridge = ((x + y + offset) / 4) % 2 == 0;
                image.push(if ridge { 40 } else { 210 });
            }
        }
        let quality = (40 + (self.scans * 17) % 60) as u8;
        let timestamp = Duration::from_millis(u64::from(self.scans) * 500);
        self.scans += 1;
        FingerprintScan::new(image, self.width, self.height, quality, timestamp)
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_track_timestamps_advance() {
        let mut track = FaceTrack::new(1, Duration::from_millis(33));
        let a = track.next_sample();
        let b = track.next_sample();
        assert_eq!(a.timestamp, Duration::ZERO);
        assert_eq!(b.timestamp, Duration::from_millis(33));
        assert_eq!(track.frames(), 2);
        // First frames fall in a blink.
        assert!(!a.eyes_open(0.5));
        let open = track.nth(1).unwrap();
        assert!(open.eyes_open(0.5));
    }

    #[test]
    fn test_face_track_is_deterministic() {
        let a: Vec<_> = FaceTrack::new(1, Duration::from_millis(10)).take(20).collect();
        let b: Vec<_> = FaceTrack::new(1, Duration::from_millis(10)).take(20).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_audio_silence() {
        let mut mic = AudioGenerator::voice();
        let frame = mic.silence(100);
        assert_eq!(frame.samples.len(), 1600);
        assert!(frame.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_audio_sine_has_both_signs() {
        let mut mic = AudioGenerator::new(16000, 1);
        let frame = mic.sine(440.0, 100);
        assert!(frame.samples.iter().any(|&s| s > 0));
        assert!(frame.samples.iter().any(|&s| s < 0));
    }

    #[test]
    fn test_audio_stereo_and_timestamps() {
        let mut mic = AudioGenerator::new(48000, 2);
        let first = mic.silence(100);
        let second = mic.sine(440.0, 100);
        assert_eq!(first.samples.len(), 9600);
        assert_eq!(first.timestamp, Duration::ZERO);
        assert_eq!(second.timestamp, Duration::from_millis(100));
    }

    #[test]
    fn test_scan_generator() {
        let mut scanner = ScanGenerator::new(16, 8);
        let scan = scanner.next_scan();
        assert!(scan.is_well_formed());
        assert_eq!(scan.quality, 40);
        let next = scanner.next_scan();
        assert_eq!(next.quality, 57);
        assert_eq!(next.timestamp, Duration::from_millis(500));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_pixel_count_exceeds_u32() {
        assert_eq!(pixel_count(16, 8), 128);
        assert_eq!(pixel_count(70_000, 70_000), 4_900_000_000);
    }
}
