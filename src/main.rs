// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use mirror::backends::camera::types::CameraBackendType;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "mirror")]
#[command(about = "Use your camera as a mirror")]
#[command(version = mirror::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera backend to use
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Keep preferences in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    V4l2,
    Virtual,
}

impl From<BackendArg> for CameraBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::V4l2 => CameraBackendType::V4l2,
            BackendArg::Virtual => CameraBackendType::Virtual,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MirrorArg {
    On,
    Off,
    Toggle,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Choose the camera to use from now on
    Select {
        /// Camera id (from 'mirror list')
        id: String,
    },

    /// Show or change mirroring
    Mirror {
        #[arg(value_enum)]
        mode: Option<MirrorArg>,
    },

    /// Show session state and preferences
    Status,

    /// Take a photo
    Photo {
        /// Camera id to use; also becomes the saved choice
        #[arg(short, long)]
        camera: Option<String>,

        /// Output file or directory (default: ~/Pictures/Mirror)
        #[arg(short, long, conflicts_with = "dialog")]
        output: Option<PathBuf>,

        /// Ask where to save with a dialog
        #[arg(short, long)]
        dialog: bool,

        /// Image format (default: saved preference)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Open the photo once saved
        #[arg(long)]
        open: bool,
    },

    /// Run the live preview and report frame rate
    Preview {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=mirror=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();
    let options = cli::Options {
        backend: args.backend.map(Into::into),
        ephemeral: args.ephemeral,
    };

    match args.command {
        Some(Commands::List) => cli::list_cameras(&options),
        Some(Commands::Select { id }) => cli::select_camera(&options, &id),
        Some(Commands::Mirror { mode }) => cli::mirror_setting(
            &options,
            mode.map(|mode| match mode {
                MirrorArg::On => cli::MirrorChange::Set(true),
                MirrorArg::Off => cli::MirrorChange::Set(false),
                MirrorArg::Toggle => cli::MirrorChange::Toggle,
            }),
        ),
        Some(Commands::Status) => cli::status(&options),
        Some(Commands::Photo {
            camera,
            output,
            dialog,
            format,
            open,
        }) => cli::take_photo(
            &options,
            cli::PhotoOptions {
                camera,
                output,
                dialog,
                format: format.map(|format| match format {
                    FormatArg::Jpeg => mirror::pipelines::photo::EncodingFormat::Jpeg,
                    FormatArg::Png => mirror::pipelines::photo::EncodingFormat::Png,
                }),
                open,
            },
        ),
        Some(Commands::Preview { seconds }) => cli::preview(&options, seconds),
        None => cli::preview(&options, None),
    }
}
