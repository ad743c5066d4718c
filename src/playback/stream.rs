//! Stream generation: the per-callback audio pipeline
//!
//! [`StreamState`] holds every piece of mutable playback state — active
//! buffer, cursor, preload slot, gain and crossfade configuration — and
//! produces interleaved stereo output one chunk at a time. The audio
//! backend drives it through [`StreamSource`], which takes the engine lock
//! for exactly one `produce` call per callback.
//!
//! The pipeline per chunk: slice raw samples, apply EQ (outside the
//! crossfade window), apply gain (volume × loudness, clipping-capped), mix
//! the equal-power crossfade near track end, advance the cursor. Hitting
//! end-of-buffer either swaps in an eligible preload without stopping the
//! device (auto-advance) or marks the stream finished; both queue an
//! end-of-track notification that the control thread delivers.

use crate::audio::buffer::{DecodedBuffer, CHANNELS};
use crate::dsp::equalizer::{Equalizer, EQ_BANDS};
use crate::playback::state::{EndReason, PlaybackEndInfo, PlaybackState};
use std::f32::consts::FRAC_PI_2;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// ReplayGain loudness normalization parameters.
///
/// `peak` exists solely to prevent clipping from positive gain; it is
/// clamped away from zero on construction.
#[derive(Debug, Clone, Copy)]
pub struct ReplayGain {
    pub gain_db: f32,
    pub peak: f32,
}

impl ReplayGain {
    const MIN_PEAK: f32 = 0.001;

    pub fn new(gain_db: f32, peak: f32) -> Self {
        Self {
            gain_db,
            peak: peak.max(Self::MIN_PEAK),
        }
    }

    /// Linear multiplier for the dB term
    pub fn linear(&self) -> f32 {
        10f32.powf(self.gain_db / 20.0)
    }
}

impl Default for ReplayGain {
    fn default() -> Self {
        Self {
            gain_db: 0.0,
            peak: 1.0,
        }
    }
}

/// Effective linear gain: `min(volume × 10^(gain_db/20), 1/peak)`.
pub fn effective_gain(volume: f32, replay_gain: &ReplayGain) -> f32 {
    let base = volume * replay_gain.linear();
    let cap = 1.0 / replay_gain.peak.max(ReplayGain::MIN_PEAK);
    base.min(cap)
}

/// Equal-power crossfade gains at normalized position `t`.
///
/// Returns `(fade_out, fade_in) = (cos(t·π/2), sin(t·π/2))`, so that
/// `fade_out² + fade_in² == 1` for every `t`.
pub fn equal_power_gains(t: f32) -> (f32, f32) {
    let t = t.clamp(0.0, 1.0);
    ((t * FRAC_PI_2).cos(), (t * FRAC_PI_2).sin())
}

/// A decoded next track waiting for gapless/crossfade takeover.
#[derive(Clone)]
pub struct PreloadSlot {
    pub buffer: Arc<DecodedBuffer>,
    pub path: PathBuf,
    /// Rates matched at preload time; a mismatch disables both the
    /// crossfade mix and auto-advance (nothing here resamples).
    pub crossfade_eligible: bool,
}

/// All mutable playback state, guarded by one lock at the engine level.
pub struct StreamState {
    pub(crate) state: PlaybackState,
    pub(crate) playback_started: bool,

    buffer: Option<Arc<DecodedBuffer>>,
    current_path: Option<PathBuf>,
    position_frames: usize,
    sample_rate: u32,

    volume: f32,
    replay_gain: ReplayGain,

    crossfade_ms: u64,
    crossfade_frames: usize,

    equalizer: Equalizer,
    preload: Option<PreloadSlot>,

    /// Set when the active track ran out with nothing to advance to
    finished: bool,
    /// Notifications queued by the callback path, drained by the control
    /// thread's `check_if_ended` poll
    pending_end: Vec<PlaybackEndInfo>,
}

impl StreamState {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: PlaybackState::Idle,
            playback_started: false,
            buffer: None,
            current_path: None,
            position_frames: 0,
            sample_rate,
            volume: 1.0,
            replay_gain: ReplayGain::default(),
            crossfade_ms: 0,
            crossfade_frames: 0,
            equalizer: Equalizer::new(sample_rate),
            preload: None,
            finished: false,
            pending_end: Vec::new(),
        }
    }

    // ===== control-thread configuration =====

    /// Make a freshly decoded buffer the active track.
    ///
    /// Resets the cursor, end-of-track flags and equalizer state, and
    /// rederives the crossfade frame count from the buffer's rate.
    pub fn install_track(&mut self, buffer: Arc<DecodedBuffer>, path: PathBuf) {
        self.sample_rate = buffer.sample_rate;
        self.position_frames = 0;
        self.finished = false;
        self.pending_end.clear();
        self.update_crossfade_frames();
        self.equalizer.set_sample_rate(self.sample_rate);
        self.equalizer.reset();
        self.buffer = Some(buffer);
        self.current_path = Some(path);
    }

    /// Drop the active buffer and the preload slot.
    pub fn clear_tracks(&mut self) {
        self.buffer = None;
        self.current_path = None;
        self.preload = None;
        self.position_frames = 0;
        self.finished = false;
        self.pending_end.clear();
    }

    pub fn has_track(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn current_path(&self) -> Option<&PathBuf> {
        self.current_path.as_ref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_preload(&mut self, slot: Option<PreloadSlot>) {
        self.preload = slot;
    }

    pub fn preload(&self) -> Option<&PreloadSlot> {
        self.preload.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_replay_gain(&mut self, replay_gain: ReplayGain) {
        self.replay_gain = replay_gain;
    }

    pub fn set_crossfade_ms(&mut self, duration_ms: u64) {
        self.crossfade_ms = duration_ms;
        self.update_crossfade_frames();
    }

    pub fn crossfade_ms(&self) -> u64 {
        self.crossfade_ms
    }

    pub fn crossfade_frames(&self) -> usize {
        self.crossfade_frames
    }

    fn update_crossfade_frames(&mut self) {
        self.crossfade_frames =
            (self.crossfade_ms as u128 * self.sample_rate as u128 / 1000) as usize;
    }

    pub fn equalizer_mut(&mut self) -> &mut Equalizer {
        &mut self.equalizer
    }

    pub fn set_equalizer_gains(&mut self, gains: &[f32; EQ_BANDS]) {
        self.equalizer.set_gains(gains);
    }

    pub fn set_equalizer_enabled(&mut self, enabled: bool) {
        self.equalizer.set_enabled(enabled);
    }

    /// Move the cursor, clamped to the buffer, and reset filter state so
    /// transients do not bleed across the discontinuity.
    pub fn seek_to_ms(&mut self, position_ms: u64) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let frames = (position_ms as u128 * self.sample_rate as u128 / 1000) as usize;
        self.position_frames = frames.min(buffer.frames());
        self.finished = false;
        self.equalizer.reset();
    }

    pub fn position_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.position_frames as u64 * 1000) / self.sample_rate as u64
    }

    pub fn duration_ms(&self) -> u64 {
        self.buffer.as_ref().map_or(0, |b| b.duration_ms())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain queued end-of-track notifications (control thread only).
    pub fn take_pending_end(&mut self) -> Vec<PlaybackEndInfo> {
        std::mem::take(&mut self.pending_end)
    }

    // ===== callback path =====

    /// Fill an interleaved stereo output slice.
    ///
    /// Holds no resources beyond `self`; never blocks and never panics.
    /// Anything it cannot produce is left as silence.
    pub fn produce(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        if self.state != PlaybackState::Playing || !self.playback_started || self.finished {
            return;
        }

        let channels = CHANNELS as usize;
        let mut filled = 0usize;

        while filled < out.len() {
            let Some(buffer) = self.buffer.clone() else {
                break;
            };
            let total_frames = buffer.frames();

            if self.position_frames >= total_frames {
                if self.advance_track() {
                    continue;
                }
                break;
            }

            let frames_wanted = (out.len() - filled) / channels;
            if frames_wanted == 0 {
                break;
            }
            let frames = frames_wanted.min(total_frames - self.position_frames);

            let start = self.position_frames * channels;
            let seg = &mut out[filled..filled + frames * channels];
            seg.copy_from_slice(&buffer.samples[start..start + frames * channels]);

            let crossfade_start = total_frames.saturating_sub(self.crossfade_frames);
            let in_crossfade = self.crossfade_frames > 0
                && self.position_frames >= crossfade_start
                && self.preload.as_ref().is_some_and(|p| p.crossfade_eligible);

            // EQ runs on the single stream here, or once on the mixed
            // result inside the crossfade branch — never on both streams
            // separately, which would contaminate the filter state.
            if !in_crossfade {
                self.equalizer.process(seg);
            }

            let gain = effective_gain(self.volume, &self.replay_gain);
            if gain != 1.0 {
                for sample in seg.iter_mut() {
                    *sample *= gain;
                }
            }

            if in_crossfade {
                self.mix_crossfade(seg, crossfade_start, gain);
            }

            self.position_frames += frames;
            filled += frames * channels;
        }
    }

    /// Blend the outgoing segment with the preloaded track's head using the
    /// equal-power curve, then EQ the mixed result.
    fn mix_crossfade(&mut self, seg: &mut [f32], crossfade_start: usize, gain: f32) {
        let channels = CHANNELS as usize;
        let crossfade_frames = self.crossfade_frames;
        let crossfade_pos = self.position_frames - crossfade_start;

        if let Some(slot) = self.preload.as_ref() {
            let incoming = &slot.buffer.samples;
            let incoming_start = crossfade_pos * channels;

            for (i, sample) in seg.iter_mut().enumerate() {
                let frame_in_fade = crossfade_pos + i / channels;
                let t = if crossfade_frames > 0 {
                    (frame_in_fade as f32 / crossfade_frames as f32).min(1.0)
                } else {
                    1.0
                };
                let (fade_out, fade_in) = equal_power_gains(t);

                let incoming_sample =
                    incoming.get(incoming_start + i).copied().unwrap_or(0.0) * gain;
                *sample = *sample * fade_out + incoming_sample * fade_in;
            }
        }

        self.equalizer.process(seg);
    }

    /// Handle end-of-buffer: swap in an eligible preload, or finish.
    ///
    /// Returns true when playback continues on the preloaded track.
    fn advance_track(&mut self) -> bool {
        let ended_path = self.current_path.take();

        match self.preload.take() {
            Some(slot)
                if slot.crossfade_eligible && slot.buffer.sample_rate == self.sample_rate =>
            {
                // Crossfade already consumed the head of the next track;
                // skip past it so nothing replays.
                let had_crossfade = self.crossfade_ms > 0;

                self.sample_rate = slot.buffer.sample_rate;
                self.update_crossfade_frames();
                self.position_frames = if had_crossfade {
                    self.crossfade_frames.min(slot.buffer.frames())
                } else {
                    0
                };
                self.equalizer.set_sample_rate(self.sample_rate);
                self.equalizer.reset();

                let next_path = slot.path.clone();
                self.buffer = Some(slot.buffer);
                self.current_path = Some(slot.path);

                self.pending_end.push(PlaybackEndInfo {
                    ended_path,
                    next_path: Some(next_path),
                    reason: EndReason::AutoAdvance,
                });
                true
            }
            other => {
                if other.is_some() {
                    debug!("auto-advance disabled by sample rate mismatch");
                }
                self.finished = true;
                self.pending_end.push(PlaybackEndInfo {
                    ended_path,
                    next_path: None,
                    reason: EndReason::Ended,
                });
                false
            }
        }
    }
}

/// Handle the audio backend pulls samples through.
///
/// Takes the shared lock once per callback; a poisoned lock degrades to
/// silence rather than panicking the audio thread.
pub struct StreamSource {
    shared: Arc<Mutex<StreamState>>,
}

impl StreamSource {
    pub fn new(shared: Arc<Mutex<StreamState>>) -> Self {
        Self { shared }
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        match self.shared.lock() {
            Ok(mut state) => state.produce(out),
            Err(_) => out.fill(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_buffer(frames: usize, value: f32, sample_rate: u32) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::new(vec![value; frames * 2], sample_rate))
    }

    fn playing_state(frames: usize, value: f32) -> StreamState {
        let mut state = StreamState::new(44100);
        state.install_track(stereo_buffer(frames, value, 44100), PathBuf::from("/a.flac"));
        state.state = PlaybackState::Playing;
        state.playback_started = true;
        state
    }

    #[test]
    fn test_effective_gain_is_capped_by_peak() {
        // +12 dB against a 0.5 peak: the cap (2.0) must win over the
        // uncapped gain (~3.98).
        let rg = ReplayGain::new(12.0, 0.5);
        let gain = effective_gain(1.0, &rg);
        assert!((gain - 2.0).abs() < 1e-6);

        // Low volume stays below the cap.
        let gain = effective_gain(0.1, &rg);
        assert!(gain < 0.5);
    }

    #[test]
    fn test_equal_power_endpoints() {
        let (out0, in0) = equal_power_gains(0.0);
        assert!((out0 - 1.0).abs() < 1e-6);
        assert!(in0.abs() < 1e-6);

        let (out1, in1) = equal_power_gains(1.0);
        assert!(out1.abs() < 1e-6);
        assert!((in1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_produce_copies_samples() {
        let mut state = playing_state(1024, 0.25);
        let mut out = vec![0.0f32; 512];
        state.produce(&mut out);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
        assert_eq!(state.position_frames, 256);
    }

    #[test]
    fn test_produce_applies_volume() {
        let mut state = playing_state(1024, 0.5);
        state.set_volume(0.5);
        let mut out = vec![0.0f32; 64];
        state.produce(&mut out);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_produce_silence_when_not_playing() {
        let mut state = playing_state(1024, 0.5);
        state.state = PlaybackState::Paused;
        let mut out = vec![1.0f32; 64];
        state.produce(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_end_without_preload_finishes_once() {
        let mut state = playing_state(100, 0.5);
        let mut out = vec![0.0f32; 512];
        state.produce(&mut out);

        assert!(state.is_finished());
        let events = state.take_pending_end();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, EndReason::Ended);
        assert_eq!(events[0].ended_path, Some(PathBuf::from("/a.flac")));
        assert_eq!(events[0].next_path, None);

        // Producing again queues nothing further.
        state.produce(&mut out);
        assert!(state.take_pending_end().is_empty());
    }

    #[test]
    fn test_gapless_advance_without_crossfade() {
        let mut state = playing_state(100, 0.25);
        state.set_preload(Some(PreloadSlot {
            buffer: stereo_buffer(200, 0.75, 44100),
            path: PathBuf::from("/b.flac"),
            crossfade_eligible: true,
        }));

        // 150 frames: 100 from track A, 50 from track B.
        let mut out = vec![0.0f32; 300];
        state.produce(&mut out);

        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[299] - 0.75).abs() < 1e-6);
        assert_eq!(state.position_frames, 50);

        let events = state.take_pending_end();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, EndReason::AutoAdvance);
        assert_eq!(events[0].next_path, Some(PathBuf::from("/b.flac")));
    }

    #[test]
    fn test_rate_mismatch_stops_instead_of_advancing() {
        let mut state = playing_state(100, 0.25);
        state.set_preload(Some(PreloadSlot {
            buffer: stereo_buffer(200, 0.75, 48000),
            path: PathBuf::from("/b.flac"),
            crossfade_eligible: false,
        }));

        let mut out = vec![0.0f32; 300];
        state.produce(&mut out);

        assert!(state.is_finished());
        let events = state.take_pending_end();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, EndReason::Ended);
        // The tail past end-of-track is silence.
        assert_eq!(out[299], 0.0);
    }

    #[test]
    fn test_crossfade_mix_is_equal_power() {
        let mut state = playing_state(200, 0.5);
        state.set_crossfade_ms(2); // ~88 frames at 44.1 kHz
        let crossfade_frames = state.crossfade_frames();
        assert!(crossfade_frames > 0);

        state.set_preload(Some(PreloadSlot {
            buffer: stereo_buffer(400, 0.5, 44100),
            path: PathBuf::from("/b.flac"),
            crossfade_eligible: true,
        }));

        // Jump to the start of the crossfade window.
        state.position_frames = 200 - crossfade_frames;
        let mut out = vec![0.0f32; crossfade_frames * 2];
        state.produce(&mut out);

        // Both streams carry 0.5, so each mixed frame is
        // 0.5·(cos + sin)(t·π/2) — peaking at √2/2 above a single stream
        // mid-fade and equal to 0.5 at both endpoints.
        let (fade_out, fade_in) = equal_power_gains(0.0);
        let expected_first = 0.5 * fade_out + 0.5 * fade_in;
        assert!((out[0] - expected_first).abs() < 1e-5);

        let mid = crossfade_frames / 2;
        let t_mid = mid as f32 / crossfade_frames as f32;
        let (fo, fi) = equal_power_gains(t_mid);
        let expected_mid = 0.5 * fo + 0.5 * fi;
        assert!((out[mid * 2] - expected_mid).abs() < 1e-5);
    }

    #[test]
    fn test_advance_realigns_past_consumed_crossfade() {
        let mut state = playing_state(200, 0.5);
        state.set_crossfade_ms(2);
        let crossfade_frames = state.crossfade_frames();

        state.set_preload(Some(PreloadSlot {
            buffer: stereo_buffer(400, 0.75, 44100),
            path: PathBuf::from("/b.flac"),
            crossfade_eligible: true,
        }));

        // Play through the end; the crossfade consumed the head of B.
        let mut out = vec![0.0f32; 200 * 2 + 16];
        state.produce(&mut out);

        assert_eq!(state.position_frames, crossfade_frames + 8);
        assert_eq!(
            state.current_path(),
            Some(&PathBuf::from("/b.flac"))
        );
    }

    #[test]
    fn test_seek_clamps_and_resets() {
        let mut state = playing_state(44100, 0.5);
        state.seek_to_ms(500);
        assert_eq!(state.position_frames, 22050);
        assert_eq!(state.position_ms(), 500);

        state.seek_to_ms(10_000_000);
        assert_eq!(state.position_frames, 44100);
    }

    #[test]
    fn test_crossfade_frames_follow_sample_rate() {
        let mut state = StreamState::new(44100);
        state.set_crossfade_ms(1000);
        assert_eq!(state.crossfade_frames(), 44100);

        state.install_track(stereo_buffer(100, 0.0, 48000), PathBuf::from("/c.flac"));
        assert_eq!(state.crossfade_frames(), 48000);
    }
}
