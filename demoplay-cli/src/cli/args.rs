//! CLI argument definitions for `demoplay`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("demoplay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play, visualize and analyse music demos")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Play one or more files with a live visualizer")
                .arg(
                    Arg::new("INPUT")
                        .help("Audio files, played in order")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("volume")
                        .long("volume")
                        .short('g')
                        .value_name("PERCENT")
                        .value_parser(value_parser!(u8).range(0..=100))
                        .help("Initial volume in percent"),
                )
                .arg(
                    Arg::new("visualizer")
                        .long("visualizer")
                        .short('v')
                        .value_name("KIND")
                        .default_value("bars")
                        .help("bars, oscilloscope, spectrogram, meter, loudness or particles"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("PATH")
                        .help("Visualizer settings JSON"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("PATH")
                        .help("Player configuration JSON"),
                )
                .arg(
                    Arg::new("fps")
                        .long("fps")
                        .value_name("FPS")
                        .default_value("30")
                        .value_parser(value_parser!(u32).range(1..=120))
                        .help("Visualizer frame rate"),
                )
                .arg(
                    Arg::new("no-background")
                        .long("no-background")
                        .action(ArgAction::SetTrue)
                        .help("Pause while the terminal loses focus"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Play without drawing the interface"),
                ),
        )
        .subcommand(
            Command::new("waveform")
                .about("Print the waveform preview of a file as JSON")
                .arg(Arg::new("INPUT").help("Audio file").required(true))
                .arg(
                    Arg::new("bins")
                        .long("bins")
                        .short('b')
                        .value_name("COUNT")
                        .default_value("200")
                        .value_parser(value_parser!(usize))
                        .help("Number of amplitude bins"),
                )
                .arg(
                    Arg::new("cache-dir")
                        .long("cache-dir")
                        .value_name("DIR")
                        .help("Directory for the durable waveform cache"),
                ),
        )
        .subcommand(
            Command::new("analyze")
                .about("Measure stereo levels and loudness of a file")
                .arg(Arg::new("INPUT").help("Audio file").required(true))
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("PATH")
                        .help("Visualizer settings JSON (meter ranges, FFT size)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(Command::new("settings").about("Print the default visualizer settings"))
}
