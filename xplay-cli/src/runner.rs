use std::fs;
use std::thread::sleep;
use std::time::Instant;

use clap::ArgMatches;
use log::{info, warn};
use xplay_lib::settings::{FrameDrop, SyncMaster};
use xplay_lib::source::SyntheticSource;
use xplay_lib::tools::time::wait_duration;
use xplay_lib::{OpenOptions, Result, SyncSettings, XPlay};

use crate::report::Report;

/// Load settings from `--settings-json`, then apply flag overrides.
fn load_settings(args: &ArgMatches) -> Result<SyncSettings> {
    let mut settings = match args.get_one::<String>("settings-json") {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            SyncSettings::from_json_str(&json)?
        }
        None => SyncSettings::default(),
    };

    match args.get_one::<String>("sync").map(String::as_str) {
        Some("external") => settings.sync_master = SyncMaster::External,
        Some("video") => settings.sync_master = SyncMaster::Video,
        _ => {}
    }
    match args.get_one::<String>("framedrop").map(String::as_str) {
        Some("always") => settings.framedrop = FrameDrop::Always,
        Some("never") => settings.framedrop = FrameDrop::Never,
        Some("auto") => settings.framedrop = FrameDrop::Auto,
        _ => {}
    }
    settings.validate()?;
    Ok(settings)
}

pub fn run(args: &ArgMatches) -> Result<i32> {
    let Some(source) = args.get_one::<String>("SOURCE") else {
        return Ok(2);
    };
    let json = args.get_flag("json");
    let quiet = args.get_flag("quiet") || json;
    let max_seconds = args.get_one::<f64>("max-seconds").copied();
    let mut pending_seek = args
        .get_one::<f64>("seek-at")
        .map(|at| (*at, args.get_one::<f64>("seek-to").copied().unwrap_or(0.0)));

    let settings = load_settings(args)?;
    let player = XPlay::new(Box::new(SyntheticSource::new()), settings);

    let mut options = OpenOptions::new(source.as_str());
    if let Some(position) = args.get_one::<f64>("seek") {
        options = options.start_at(*position);
    }
    player.open(&options)?;
    info!("Starting XPlay on {}", source);

    let started = Instant::now();
    let mut finished = false;
    loop {
        let state = player.refresh();
        if state.fresh && !quiet {
            if let Some(frame) = &state.frame {
                let pts = frame
                    .pts
                    .map(|pts| format!("{:.3}", pts))
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "frame pts={} serial={} {}x{}",
                    pts, frame.serial, frame.picture.width, frame.picture.height
                );
            }
        }

        if player.is_finished() {
            finished = true;
            break;
        }

        let elapsed = started.elapsed().as_secs_f64();
        if max_seconds.is_some_and(|limit| elapsed >= limit) {
            warn!("stopping after {:.3}s before the end of the source", elapsed);
            break;
        }
        if let Some((at, target)) = pending_seek {
            if elapsed >= at {
                player.seek(target)?;
                pending_seek = None;
            }
        }

        sleep(wait_duration(state.remaining_time));
    }

    let stats = player.stats();
    let duration = player.duration();
    player.close();

    let report = Report {
        source,
        duration,
        finished,
        wall_seconds: started.elapsed().as_secs_f64(),
        stats: &stats,
    };
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.to_text());
    }
    Ok(0)
}
