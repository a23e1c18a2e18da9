use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use xplay_lib::decoder::DecoderState;
use xplay_lib::error::{CodecError, Result};
use xplay_lib::packet::Packet;
use xplay_lib::settings::{FrameDrop, SyncMaster};
use xplay_lib::source::{
    Codec, CodecOutput, Demuxer, MediaKind, MediaSource, Rational, SendOutcome, SourceInfo,
    StreamInfo, SyntheticSource,
};
use xplay_lib::{OpenOptions, RefreshState, SyncSettings, XPlay, XPlayError};

fn session() -> XPlay {
    XPlay::new(Box::new(SyntheticSource::new()), SyncSettings::default())
}

/// Drive the host loop until `done` holds or the deadline passes.
fn play_until(
    player: &XPlay,
    limit: Duration,
    mut done: impl FnMut(&XPlay, &RefreshState) -> bool,
) -> Vec<RefreshState> {
    let deadline = Instant::now() + limit;
    let mut fresh = Vec::new();
    loop {
        let state = player.refresh();
        let stop = done(player, &state);
        if state.fresh {
            fresh.push(state.clone());
        }
        if stop {
            return fresh;
        }
        assert!(Instant::now() < deadline, "playback did not finish in time");
        thread::sleep(Duration::from_secs_f64(state.remaining_time.min(0.005)));
    }
}

#[test]
fn plays_every_frame_in_order() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=100,frames=20"))
        .unwrap();

    let fresh = play_until(&player, Duration::from_secs(10), |p, _| p.is_finished());
    let pts: Vec<f64> = fresh
        .iter()
        .map(|s| s.frame.as_ref().unwrap().pts.unwrap())
        .collect();
    assert_eq!(pts.len(), 20);
    assert!(pts.windows(2).all(|w| w[1] > w[0]));

    let stats = player.stats();
    assert_eq!(stats.frames_presented, 20);
    assert_eq!(stats.total_drops(), 0);
    assert_eq!(stats.decoder_state, DecoderState::Finished);
    assert!(stats.decoder_alive && stats.reader_alive);
    player.close();
}

#[test]
fn corrupt_packets_are_skipped() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=200,frames=20,corrupt_every=5"))
        .unwrap();
    play_until(&player, Duration::from_secs(10), |p, _| p.is_finished());

    let stats = player.stats();
    assert_eq!(stats.decode_errors, 4);
    assert_eq!(stats.frames_presented, 16);
}

#[test]
fn unknown_source_fails_without_threads() {
    let player = session();
    let err = player.open(&OpenOptions::new("rtsp://camera")).unwrap_err();
    assert!(matches!(err, XPlayError::SourceOpen { .. }));
    assert!(!player.is_open());

    let stats = player.stats();
    assert!(!stats.decoder_alive && !stats.reader_alive);
    assert!(player.refresh().frame.is_none());
}

#[test]
fn codec_failure_is_reported() {
    let player = session();
    let err = player
        .open(&OpenOptions::new("synthetic:fail_codec=true"))
        .unwrap_err();
    assert!(matches!(err, XPlayError::CodecOpen { stream_index: 0, .. }));
    assert!(!player.is_open());
}

#[test]
fn invalid_settings_block_open() {
    let settings = SyncSettings {
        picture_queue_size: 0,
        ..SyncSettings::default()
    };
    let player = XPlay::new(Box::new(SyntheticSource), settings);
    let err = player.open(&OpenOptions::new("synthetic")).unwrap_err();
    assert!(matches!(err, XPlayError::Settings(_)));
}

#[test]
fn setting_setters_clamp_and_validate() {
    let player = session();
    player.set_picture_queue_size(64);
    assert_eq!(player.settings().picture_queue_size, 16);
    player.set_picture_queue_size(0);
    assert_eq!(player.settings().picture_queue_size, 2);

    player.set_sync_master(SyncMaster::External);
    player.set_framedrop(FrameDrop::Never);
    player.set_infinite_buffer(true);
    let settings = player.settings();
    assert_eq!(settings.sync_master, SyncMaster::External);
    assert_eq!(settings.framedrop, FrameDrop::Never);
    assert!(settings.infinite_buffer);

    let bad = SyncSettings {
        refresh_rate: 0.0,
        ..SyncSettings::default()
    };
    assert!(player.set_settings(bad).is_err());
    assert!(player.settings().infinite_buffer);
}

#[test]
fn controls_require_open_session() {
    let player = session();
    assert!(matches!(player.seek(1.0), Err(XPlayError::NotOpen)));
    assert!(matches!(player.toggle_pause(), Err(XPlayError::NotOpen)));
    assert!(matches!(player.set_external_clock(1.0), Err(XPlayError::NotOpen)));
    assert_eq!(player.position(), None);
    assert!(!player.is_finished());
}

#[test]
fn close_is_idempotent_and_bounded() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=30,frames=5000"))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    player.close();
    player.close();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!player.is_open());
}

#[test]
fn drop_with_blocked_workers_returns() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=30,frames=5000"))
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    drop(player);
}

#[test]
fn reopen_replaces_previous_source() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=30,frames=5000"))
        .unwrap();
    player
        .open(&OpenOptions::new("synthetic:fps=100,frames=5"))
        .unwrap();
    assert_eq!(player.duration(), Some(0.05));
    play_until(&player, Duration::from_secs(10), |p, _| p.is_finished());
    assert_eq!(player.stats().frames_presented, 5);
}

#[test]
fn seek_presents_frames_from_new_position() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=50,frames=500"))
        .unwrap();
    play_until(&player, Duration::from_secs(5), |_, s| s.fresh);

    player.seek(6.0).unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| {
        s.fresh && s.frame.as_ref().map(|f| f.serial) == Some(2)
    });
    let frame = fresh.last().unwrap().frame.clone().unwrap();
    assert!((frame.pts.unwrap() - 6.0).abs() < 1e-9);
    assert_eq!(player.stats().serial, 2);
}

#[test]
fn start_position_skips_ahead() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=10,frames=100").start_at(5.0))
        .unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| s.fresh);
    let pts = fresh[0].frame.as_ref().unwrap().pts.unwrap();
    assert!((pts - 5.0).abs() < 1e-9);
}

#[test]
fn pause_freezes_presentation() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=100,frames=500"))
        .unwrap();
    play_until(&player, Duration::from_secs(5), |_, s| s.fresh);

    assert!(player.toggle_pause().unwrap());
    let presented = player.stats().frames_presented;
    let position = player.position();
    for _ in 0..10 {
        assert!(!player.refresh().fresh);
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(player.stats().frames_presented, presented);
    assert_eq!(player.position(), position);

    player.step_frame().unwrap();
    play_until(&player, Duration::from_secs(5), |_, s| s.fresh);
    assert_eq!(player.stats().frames_presented, presented + 1);
    assert!(player.is_paused());

    player.resume().unwrap();
    play_until(&player, Duration::from_secs(5), |p, _| {
        p.stats().frames_presented >= presented + 5
    });
}

#[test]
fn external_clock_can_be_driven() {
    let player = session();
    player.set_sync_master(SyncMaster::External);
    player.set_framedrop(FrameDrop::Never);
    player
        .open(&OpenOptions::new("synthetic:fps=25,frames=100"))
        .unwrap();
    player.set_external_clock(2.0).unwrap();
    let position = player.position().unwrap();
    assert!((2.0..2.5).contains(&position));
}

struct AudioOnly;

struct AudioDemuxer {
    info: SourceInfo,
}

impl MediaSource for AudioOnly {
    fn open(&self, _descriptor: &str) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(AudioDemuxer {
            info: SourceInfo {
                streams: vec![StreamInfo {
                    index: 0,
                    kind: MediaKind::Audio,
                    time_base: Rational::new(1, 48_000),
                    frame_rate: None,
                    attached_picture: false,
                }],
                duration: None,
                ts_discontinuous: false,
            },
        }))
    }
}

struct NeverCodec;

impl Codec for NeverCodec {
    fn send(&mut self, _packet: Option<&Packet>) -> std::result::Result<SendOutcome, CodecError> {
        Ok(SendOutcome::Accepted)
    }

    fn receive(&mut self) -> std::result::Result<CodecOutput, CodecError> {
        Ok(CodecOutput::NeedsInput)
    }

    fn flush(&mut self) {}
}

impl Demuxer for AudioDemuxer {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        Ok(None)
    }

    fn seek(&mut self, _target: f64) -> Result<()> {
        Ok(())
    }

    fn open_codec(&mut self, _stream_index: usize) -> Result<Box<dyn Codec>> {
        Ok(Box::new(NeverCodec))
    }
}

#[test]
fn audio_only_source_has_no_video_stream() {
    let player = XPlay::new(Box::new(AudioOnly), SyncSettings::default());
    let err = player.open(&OpenOptions::new("tone.wav")).unwrap_err();
    assert!(matches!(err, XPlayError::NoVideoStream));
}

#[test]
fn session_is_shareable_across_threads() {
    let player = Arc::new(session());
    player
        .open(&OpenOptions::new("synthetic:fps=200,frames=40"))
        .unwrap();

    let render = {
        let player = player.clone();
        thread::spawn(move || {
            play_until(&player, Duration::from_secs(10), |p, _| p.is_finished()).len()
        })
    };
    let _ = player.stats();
    assert_eq!(render.join().unwrap(), 40);
}

/// Synthetic source whose demuxer takes a while to reposition.
struct SlowSeekSource;

struct SlowSeekDemuxer {
    inner: Box<dyn Demuxer>,
}

impl MediaSource for SlowSeekSource {
    fn open(&self, descriptor: &str) -> Result<Box<dyn Demuxer>> {
        let inner = SyntheticSource.open(descriptor)?;
        Ok(Box::new(SlowSeekDemuxer { inner }))
    }
}

impl Demuxer for SlowSeekDemuxer {
    fn info(&self) -> &SourceInfo {
        self.inner.info()
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        self.inner.read_packet()
    }

    fn seek(&mut self, target: f64) -> Result<()> {
        thread::sleep(Duration::from_millis(100));
        self.inner.seek(target)
    }

    fn open_codec(&mut self, stream_index: usize) -> Result<Box<dyn Codec>> {
        self.inner.open_codec(stream_index)
    }
}

fn shown(state: &RefreshState) -> (u64, f64) {
    let frame = state.frame.as_ref().unwrap();
    (frame.serial, frame.pts.unwrap())
}

#[test]
fn seek_while_paused_shows_new_position() {
    let player = XPlay::new(Box::new(SlowSeekSource), SyncSettings::default());
    player
        .open(&OpenOptions::new("synthetic:fps=50,frames=500"))
        .unwrap();
    play_until(&player, Duration::from_secs(5), |_, s| s.fresh);

    player.pause().unwrap();
    player.seek(6.0).unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| {
        s.fresh && s.frame.as_ref().map(|f| f.serial) == Some(2)
    });
    assert!(fresh.iter().all(|s| shown(s).0 == 2));
    let (serial, pts) = shown(fresh.last().unwrap());
    assert_eq!(serial, 2);
    assert!((pts - 6.0).abs() < 1e-9);
    assert!(player.is_paused());

    for _ in 0..10 {
        let state = player.refresh();
        assert!(!state.fresh);
        assert_eq!(shown(&state).0, 2);
        thread::sleep(Duration::from_millis(5));
    }

    player.step_frame().unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| s.fresh);
    let (serial, pts) = shown(&fresh[0]);
    assert_eq!(serial, 2);
    assert!((pts - 6.02).abs() < 1e-9);
    assert!(player.is_paused());
}

#[test]
fn seek_relative_moves_from_current_position() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=50,frames=500"))
        .unwrap();
    play_until(&player, Duration::from_secs(5), |_, s| {
        s.fresh && s.frame.as_ref().and_then(|f| f.pts).is_some_and(|pts| pts >= 0.2)
    });

    player.seek_relative(3.0).unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| {
        s.fresh && s.frame.as_ref().map(|f| f.serial) == Some(2)
    });
    let (_, pts) = shown(fresh.last().unwrap());
    assert!((3.1..3.6).contains(&pts), "landed at {}", pts);

    player.seek_relative(-100.0).unwrap();
    let fresh = play_until(&player, Duration::from_secs(5), |_, s| {
        s.fresh && s.frame.as_ref().map(|f| f.serial) == Some(3)
    });
    assert_eq!(shown(fresh.last().unwrap()), (3, 0.0));
}

#[test]
fn concurrent_pause_calls_leave_session_paused() {
    let player = Arc::new(session());
    player
        .open(&OpenOptions::new("synthetic:fps=100,frames=500"))
        .unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let player = player.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    player.pause().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(player.is_paused());

    player.resume().unwrap();
    player.resume().unwrap();
    assert!(!player.is_paused());
    assert!(player.toggle_pause().unwrap());
}

#[test]
fn jittered_source_plays_to_the_end() {
    let player = session();
    player
        .open(&OpenOptions::new("synthetic:fps=100,frames=30,jitter=0.004,seed=3"))
        .unwrap();
    let info = player.source_info().unwrap();
    assert_eq!(info.streams.len(), 1);

    play_until(&player, Duration::from_secs(10), |p, _| p.is_finished());
    let stats = player.stats();
    assert_eq!(stats.frames_presented, 30);
    assert_eq!(stats.total_drops(), 0);
}
