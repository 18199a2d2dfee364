//! Stream composition.
//!
//! Merging is a reference-level operation: the audio capture track is attached
//! to the video-producing stream without copying or transcoding anything.

use crate::foundation::core::Fps;
use std::rc::Rc;

/// Live video track captured from the animator's surface.
#[derive(Debug)]
pub struct VideoTrack {
    fps: Fps,
    stopped: bool,
}

impl VideoTrack {
    /// Capture a video track at `fps`.
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            stopped: false,
        }
    }

    /// Capture frame rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Stop the track. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether the track has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Capturable audio track: a shared handle onto the source's capture output.
#[derive(Debug)]
pub struct AudioTrack {
    pcm: Rc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    stopped: bool,
}

impl AudioTrack {
    /// Wrap the capture output of an ambient source.
    pub fn new(pcm: Rc<Vec<f32>>, sample_rate: u32, channels: u16) -> Self {
        Self {
            pcm,
            sample_rate,
            channels,
            stopped: false,
        }
    }

    /// Interleaved capture PCM.
    pub fn pcm(&self) -> &[f32] {
        &self.pcm
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Stop the track. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether the track has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// One recordable stream combining a video track and an audio track.
#[derive(Debug)]
pub struct CombinedStream {
    video: VideoTrack,
    audio: AudioTrack,
}

impl CombinedStream {
    /// Attach `audio` onto the video-producing stream.
    pub fn merge(video: VideoTrack, audio: AudioTrack) -> Self {
        Self { video, audio }
    }

    /// The video track.
    pub fn video(&self) -> &VideoTrack {
        &self.video
    }

    /// The audio track.
    pub fn audio(&self) -> &AudioTrack {
        &self.audio
    }

    /// Stop every track in the stream. Idempotent.
    pub fn stop_tracks(&mut self) {
        self.video.stop();
        self.audio.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> CombinedStream {
        let video = VideoTrack::new(Fps { num: 60, den: 1 });
        let audio = AudioTrack::new(Rc::new(vec![0.0; 16]), 48_000, 2);
        CombinedStream::merge(video, audio)
    }

    #[test]
    fn merge_attaches_without_copying() {
        let pcm = Rc::new(vec![0.25f32; 8]);
        let audio = AudioTrack::new(Rc::clone(&pcm), 48_000, 2);
        assert_eq!(Rc::strong_count(&pcm), 2, "track shares the source buffer");
        assert_eq!(audio.pcm(), &pcm[..]);
    }

    #[test]
    fn stop_tracks_is_idempotent() {
        let mut s = stream();
        s.stop_tracks();
        s.stop_tracks();
        assert!(s.video().is_stopped());
        assert!(s.audio().is_stopped());
    }
}
