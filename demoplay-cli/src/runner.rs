use std::{
    cell::Cell,
    io,
    path::Path,
    rc::Rc,
    sync::Arc,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor,
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use demoplay_lib::clock::SystemClock;
use demoplay_lib::playback::{Player, PlayerConfig, PlaybackState, RodioElement, TrackIdentity};
use demoplay_lib::scheduler::{FrameDriver, FrameScheduler};
use demoplay_lib::visualizer::{attach_stage, VisualizerKind, VisualizerSettings, VisualizerStage};
use log::{error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::cli::{analyze, waveform};
use crate::controls::{self, KeyAction};
use crate::error::CliError;
use crate::logging::{BackendStderr, LogBuffer};
use crate::ui;

const LOOP_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(matches: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, CliError> {
    match matches.subcommand() {
        Some(("play", sub)) => run_play(sub, log_buffer),
        Some(("waveform", sub)) => waveform::run_waveform(sub).map(|_| 0),
        Some(("analyze", sub)) => analyze::run_analyze(sub).map(|_| 0),
        Some(("settings", _)) => {
            println!("{}", VisualizerSettings::default().to_json_pretty()?);
            Ok(0)
        }
        _ => Err(CliError::Usage("no subcommand given".to_string())),
    }
}

fn track_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn load_track(player: &mut Player, path: &str) {
    info!("loading {}", path);
    player.set_track_identity(Some(TrackIdentity::new(path, None)));
    player.set_source(Some(path));
    if let Err(err) = player.play() {
        warn!("{}", err.user_message());
    }
}

fn play_config(matches: &ArgMatches) -> Result<PlayerConfig, CliError> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => PlayerConfig::from_path(path)?,
        None => PlayerConfig::default(),
    };
    if matches.get_flag("no-background") {
        config.allow_background_playback = false;
    }
    if let Some(volume) = matches.get_one::<u8>("volume") {
        config.initial_volume = *volume as f32 / 100.0;
    }
    Ok(config.sanitized())
}

fn run_play(matches: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, CliError> {
    let inputs: Vec<String> = matches
        .get_many::<String>("INPUT")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if let Some(missing) = inputs.iter().find(|path| !Path::new(path).is_file()) {
        return Err(CliError::Usage(format!("file not found: {}", missing)));
    }
    let settings = match matches.get_one::<String>("settings") {
        Some(path) => VisualizerSettings::from_path(path)?,
        None => VisualizerSettings::default(),
    };
    let kind = matches
        .get_one::<String>("visualizer")
        .map(|name| name.parse::<VisualizerKind>())
        .transpose()
        .map_err(CliError::Usage)?
        .unwrap_or(VisualizerKind::Bars);
    let fps = *matches.get_one::<u32>("fps").unwrap_or(&30);
    let quiet = matches.get_flag("quiet");
    let config = play_config(matches)?;

    let element = RodioElement::open_default().map_err(|err| CliError::Audio(err.to_string()))?;
    let mut player = Player::new(Box::new(element), config);
    if let Err(err) = player.analysis_mut().set_fft_size(settings.fft_size) {
        warn!("keeping default analyser size: {}", err);
    }
    player.analysis_mut().set_smoothing(settings.smoothing);

    let track_ended = Rc::new(Cell::new(false));
    let ended_flag = track_ended.clone();
    player.set_on_track_end(move || ended_flag.set(true));

    let mut index = 0;
    load_track(&mut player, &inputs[index]);

    let scheduler = FrameScheduler::new();
    let stage = VisualizerStage::new(kind.create(&settings), 0, 0).shared();
    let subscription = attach_stage(&stage, &scheduler);
    let mut driver = FrameDriver::spawn(scheduler.clone(), Arc::new(SystemClock::new()), fps);

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide, EnableFocusChange);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };
    let stderr_guard = if terminal.is_some() {
        match BackendStderr::capture(log_buffer.clone()) {
            Ok(guard) => Some(guard),
            Err(err) => {
                warn!("backend stderr stays on the terminal: {}", err);
                None
            }
        }
    } else {
        None
    };

    loop {
        player.pump();

        let mut advance = track_ended.replace(false);
        if quiet && player.state() == PlaybackState::Error {
            error!("skipping {}", inputs[index]);
            advance = true;
        }
        if advance {
            index += 1;
            if index >= inputs.len() {
                break;
            }
            load_track(&mut player, &inputs[index]);
        }

        {
            let mut stage = stage.lock().unwrap();
            stage.set_taps(player.analysis_taps());
            stage.set_playing(player.is_playing());
        }

        if let Some(term) = terminal.as_mut() {
            let snapshot = player.snapshot();
            let name = track_name(&inputs[index]);
            let kind = stage.lock().unwrap().kind();
            let status = controls::status_text(controls::StatusArgs {
                snapshot: &snapshot,
                track_name: &name,
                track_index: index,
                track_count: inputs.len(),
                visualizer: kind,
                plays_counted: player.plays_counted(),
            });
            let log_lines = log_buffer.snapshot();
            ui::draw_status(term, &status, &stage, &log_lines);
        }

        match controls::poll_action(LOOP_INTERVAL) {
            KeyAction::None => {}
            KeyAction::Quit => break,
            KeyAction::TogglePlay => {
                if let Err(err) = player.toggle_play_pause() {
                    warn!("{}", err.user_message());
                }
            }
            KeyAction::SeekBy(delta) => {
                player.seek_by(delta);
            }
            KeyAction::VolumeBy(delta) => {
                let volume = player.volume() + delta;
                player.set_volume(volume.clamp(0.0, 1.0));
            }
            KeyAction::ToggleMute => player.toggle_mute(),
            KeyAction::NextVisualizer => {
                let mut stage = stage.lock().unwrap();
                let next = stage.kind().next();
                stage.set_visualizer(next.create(&settings));
                info!("visualizer: {}", next);
            }
            KeyAction::NextTrack => {
                if index + 1 < inputs.len() {
                    player.pause();
                    index += 1;
                    load_track(&mut player, &inputs[index]);
                } else {
                    info!("already on the last track");
                }
            }
            KeyAction::Visibility(signal) => player.on_visibility(signal),
        }
    }

    drop(subscription);
    driver.stop();
    player.pause();
    info!("{} play(s) counted", player.plays_counted());

    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, DisableFocusChange, LeaveAlternateScreen, cursor::Show);
    }
    drop(stderr_guard);

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;

    fn play_matches(args: &[&str]) -> ArgMatches {
        let mut full = vec!["demoplay", "play", "a.wav"];
        full.extend_from_slice(args);
        let matches = build_cli().try_get_matches_from(full).unwrap();
        matches.subcommand_matches("play").unwrap().clone()
    }

    #[test]
    fn flags_override_player_config() {
        let config = play_config(&play_matches(&["--no-background", "--volume", "25"])).unwrap();
        assert!(!config.allow_background_playback);
        assert!((config.initial_volume - 0.25).abs() < 1e-6);
    }

    #[test]
    fn defaults_keep_background_playback() {
        let config = play_config(&play_matches(&[])).unwrap();
        assert!(config.allow_background_playback);
    }

    #[test]
    fn track_names_use_file_name() {
        assert_eq!(track_name("/music/demo one.wav"), "demo one.wav");
        assert_eq!(track_name("demo.flac"), "demo.flac");
    }
}
