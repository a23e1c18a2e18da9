//! Deterministic test-pattern source.
//!
//! Implements the collaborator traits without any real container or codec so
//! the engine can be exercised end to end. Descriptors look like
//! `synthetic:fps=30,frames=90,corrupt_every=10`.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    Codec, CodecOutput, Demuxer, MediaKind, MediaSource, Rational, RawFrame, SendOutcome,
    SourceInfo, StreamInfo,
};
use crate::error::{CodecError, Result, XPlayError};
use crate::frame::Picture;
use crate::packet::Packet;

const SCHEME: &str = "synthetic";
const MAGIC: &[u8; 4] = b"XPS1";
const CORRUPT_MAGIC: &[u8; 4] = b"XBAD";
const HEADER_LEN: usize = 16;
const VIDEO_TIME_BASE: Rational = Rational::new(1, 90_000);
const AUDIO_TIME_BASE: Rational = Rational::new(1, 48_000);
const AUDIO_PACKET_TICKS: i64 = 1024;

/// Parameters of a synthetic stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub fps: u32,
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    /// Every n-th video packet is corrupt; `0` disables.
    pub corrupt_every: u64,
    pub frames_per_packet: u32,
    pub discont: bool,
    pub fail_codec: bool,
    /// Interleave an audio stream the engine must ignore.
    pub audio: bool,
    /// Maximum random pts offset in seconds.
    pub jitter: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            fps: 30,
            frames: 150,
            width: 64,
            height: 36,
            corrupt_every: 0,
            frames_per_packet: 1,
            discont: false,
            fail_codec: false,
            audio: false,
            jitter: 0.0,
            seed: 0,
        }
    }
}

impl SyntheticSpec {
    /// Parse a `synthetic:key=value,...` descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let fail = |reason: String| XPlayError::SourceOpen {
            descriptor: descriptor.to_string(),
            reason,
        };

        let (scheme, params) = match descriptor.split_once(':') {
            Some((scheme, params)) => (scheme, params),
            None => (descriptor, ""),
        };
        if scheme != SCHEME {
            return Err(fail(format!("unknown scheme '{}'", scheme)));
        }

        let mut spec = Self::default();
        for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| fail(format!("expected key=value, got '{}'", pair)))?;
            let bad_value = || fail(format!("invalid value '{}' for '{}'", value, key));
            match key {
                "fps" => spec.fps = value.parse().map_err(|_| bad_value())?,
                "frames" => spec.frames = value.parse().map_err(|_| bad_value())?,
                "width" => spec.width = value.parse().map_err(|_| bad_value())?,
                "height" => spec.height = value.parse().map_err(|_| bad_value())?,
                "corrupt_every" => spec.corrupt_every = value.parse().map_err(|_| bad_value())?,
                "frames_per_packet" => {
                    spec.frames_per_packet = value.parse().map_err(|_| bad_value())?
                }
                "discont" => spec.discont = value.parse().map_err(|_| bad_value())?,
                "fail_codec" => spec.fail_codec = value.parse().map_err(|_| bad_value())?,
                "audio" => spec.audio = value.parse().map_err(|_| bad_value())?,
                "jitter" => spec.jitter = value.parse().map_err(|_| bad_value())?,
                "seed" => spec.seed = value.parse().map_err(|_| bad_value())?,
                _ => return Err(fail(format!("unknown parameter '{}'", key))),
            }
        }

        if spec.fps == 0 {
            return Err(fail("fps must be positive".to_string()));
        }
        if spec.frames_per_packet == 0 {
            return Err(fail("frames_per_packet must be positive".to_string()));
        }
        if !spec.jitter.is_finite() || spec.jitter < 0.0 {
            return Err(fail(format!(
                "jitter must be a non-negative number of seconds, got {}",
                spec.jitter
            )));
        }
        if spec.width.checked_mul(spec.height).is_none() {
            return Err(fail(format!(
                "picture size {}x{} is too large",
                spec.width, spec.height
            )));
        }
        Ok(spec)
    }

    /// Ticks of the video time base per frame.
    fn frame_ticks(&self) -> i64 {
        VIDEO_TIME_BASE.den / (self.fps as i64 * VIDEO_TIME_BASE.num)
    }

    /// Jitter bound converted to ticks of the video time base.
    fn jitter_ticks(&self) -> i64 {
        (self.jitter * VIDEO_TIME_BASE.den as f64 / VIDEO_TIME_BASE.num as f64).round() as i64
    }

    fn packet_count(&self) -> u64 {
        self.frames.div_ceil(self.frames_per_packet as u64)
    }

    fn info(&self) -> SourceInfo {
        let mut streams = vec![StreamInfo {
            index: 0,
            kind: MediaKind::Video,
            time_base: VIDEO_TIME_BASE,
            frame_rate: Some(Rational::new(self.fps as i64, 1)),
            attached_picture: false,
        }];
        if self.audio {
            streams.push(StreamInfo {
                index: 1,
                kind: MediaKind::Audio,
                time_base: AUDIO_TIME_BASE,
                frame_rate: None,
                attached_picture: false,
            });
        }
        SourceInfo {
            streams,
            duration: Some(self.frames as f64 / self.fps as f64),
            ts_discontinuous: self.discont,
        }
    }
}

/// [`MediaSource`] that understands `synthetic:` descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSource for SyntheticSource {
    fn open(&self, descriptor: &str) -> Result<Box<dyn Demuxer>> {
        let spec = SyntheticSpec::parse(descriptor)?;
        log::info!(
            "synthetic source: {} frames at {} fps, {} frame(s) per packet",
            spec.frames,
            spec.fps,
            spec.frames_per_packet
        );
        Ok(Box::new(SyntheticDemuxer::new(spec)))
    }
}

struct SyntheticDemuxer {
    info: SourceInfo,
    spec: SyntheticSpec,
    next_packet: u64,
    audio_due: bool,
    audio_ticks: i64,
    rng: StdRng,
}

impl SyntheticDemuxer {
    fn new(spec: SyntheticSpec) -> Self {
        Self {
            info: spec.info(),
            rng: StdRng::seed_from_u64(spec.seed),
            spec,
            next_packet: 0,
            audio_due: false,
            audio_ticks: 0,
        }
    }

    fn video_packet(&mut self, index: u64) -> Packet {
        let fpp = self.spec.frames_per_packet as u64;
        let first_frame = index * fpp;
        let count = fpp.min(self.spec.frames - first_frame) as u32;
        let corrupt = self.spec.corrupt_every > 0 && (index + 1) % self.spec.corrupt_every == 0;

        let mut data = Vec::with_capacity(HEADER_LEN);
        data.extend_from_slice(if corrupt { CORRUPT_MAGIC } else { MAGIC });
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&first_frame.to_le_bytes());

        let frame_ticks = self.spec.frame_ticks();
        let max_jitter = self.spec.jitter_ticks();
        let jitter = if max_jitter > 0 {
            self.rng.gen_range(0..=max_jitter)
        } else {
            0
        };
        let pts = first_frame as i64 * frame_ticks + jitter;
        Packet::new(0, data)
            .with_pts(pts)
            .with_dts(pts)
            .with_duration(frame_ticks * count as i64)
            .with_pos(index * HEADER_LEN as u64)
    }

    fn audio_packet(&mut self) -> Packet {
        let pts = self.audio_ticks;
        self.audio_ticks += AUDIO_PACKET_TICKS;
        Packet::new(1, vec![0; 32])
            .with_pts(pts)
            .with_duration(AUDIO_PACKET_TICKS)
    }
}

impl Demuxer for SyntheticDemuxer {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.next_packet >= self.spec.packet_count() {
            return Ok(None);
        }
        if self.audio_due {
            self.audio_due = false;
            return Ok(Some(self.audio_packet()));
        }
        let index = self.next_packet;
        self.next_packet += 1;
        self.audio_due = self.spec.audio;
        Ok(Some(self.video_packet(index)))
    }

    fn seek(&mut self, target: f64) -> Result<()> {
        if !target.is_finite() || target < 0.0 {
            return Err(XPlayError::Demux(format!("invalid seek target {}", target)));
        }
        let frame = ((target * self.spec.fps as f64).floor() as u64).min(self.spec.frames);
        self.next_packet = frame / self.spec.frames_per_packet as u64;
        self.audio_due = false;
        self.audio_ticks = (target * AUDIO_TIME_BASE.den as f64) as i64;
        log::debug!("synthetic seek to {:.3}s -> packet {}", target, self.next_packet);
        Ok(())
    }

    fn open_codec(&mut self, stream_index: usize) -> Result<Box<dyn Codec>> {
        if self.spec.fail_codec || stream_index != 0 {
            return Err(XPlayError::CodecOpen {
                stream_index,
                reason: "synthetic codec unavailable".to_string(),
            });
        }
        Ok(Box::new(SyntheticCodec {
            frame_ticks: self.spec.frame_ticks(),
            width: self.spec.width,
            height: self.spec.height,
            buffered: VecDeque::new(),
            draining: false,
        }))
    }
}

struct SyntheticCodec {
    frame_ticks: i64,
    width: u32,
    height: u32,
    buffered: VecDeque<RawFrame>,
    draining: bool,
}

impl SyntheticCodec {
    fn decode(&mut self, packet: &Packet) -> std::result::Result<(), CodecError> {
        let data = &packet.data;
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(CodecError::Corrupt(format!(
                "bad packet header at pos {:?}",
                packet.pos
            )));
        }
        let count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&data[8..16]);
        let first_frame = u64::from_le_bytes(index_bytes);

        let pixels = self.width as usize * self.height as usize;
        for offset in 0..count as u64 {
            let index = first_frame + offset;
            self.buffered.push_back(RawFrame {
                picture: Picture {
                    width: self.width,
                    height: self.height,
                    data: vec![(index % 251) as u8; pixels],
                },
                pts: packet.pts.map(|pts| pts + offset as i64 * self.frame_ticks),
                pos: packet.pos,
            });
        }
        Ok(())
    }
}

impl Codec for SyntheticCodec {
    fn send(&mut self, packet: Option<&Packet>) -> std::result::Result<SendOutcome, CodecError> {
        match packet {
            Some(packet) => self.decode(packet)?,
            None => self.draining = true,
        }
        Ok(SendOutcome::Accepted)
    }

    fn receive(&mut self) -> std::result::Result<CodecOutput, CodecError> {
        if let Some(frame) = self.buffered.pop_front() {
            return Ok(CodecOutput::Frame(frame));
        }
        if self.draining {
            Ok(CodecOutput::Drained)
        } else {
            Ok(CodecOutput::NeedsInput)
        }
    }

    fn flush(&mut self) {
        self.buffered.clear();
        self.draining = false;
    }
}
