use std::process;

use clap::Parser;
use log::{error, info};
use wlframe::{ScanLine, Window, WindowConfig};

#[derive(Parser)]
#[command(name = "scanline")]
#[command(about = "Opens a window and animates a scan line in it, one step per frame")]
#[command(version)]
struct Cli {
    /// Display to connect to, a socket name or an absolute path (default: $WAYLAND_DISPLAY)
    #[arg(short, long)]
    display: Option<String>,

    #[arg(long, default_value_t = 640, value_parser = clap::value_parser!(i32).range(1..=8192))]
    width: i32,

    #[arg(long, default_value_t = 480, value_parser = clap::value_parser!(i32).range(1..=8192))]
    height: i32,

    #[arg(short, long, default_value = "Example client")]
    title: String,

    /// Application id reported to the compositor
    #[arg(long)]
    app_id: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    wlframe::init_log();

    let mut session = match wlframe::connect(cli.display.as_deref()) {
        Ok(session) => session,
        Err(err) => {
            error!("Unable to connect to the display: {err}");
            process::exit(1);
        }
    };

    let config = WindowConfig {
        title: cli.title,
        app_id: cli.app_id,
        width: cli.width,
        height: cli.height,
    };

    match Window::run(&mut session, &config, ScanLine::default()) {
        Ok(()) => info!("Bye"),
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    }
}
