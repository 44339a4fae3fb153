use std::{
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::Context;
use clap::Parser;
use handmarks::{
    app::App,
    config::{Args, Config},
    gui::Gui,
    hand::HandLandmarker,
    video::webcam::Webcam,
};

const WINDOW_TITLE: &str = "Hand Landmarks";

fn main() -> anyhow::Result<()> {
    // The first FPS window is measured from here, start-up work included.
    let start = Instant::now();
    handmarks::init_logger!();

    let config = Config::try_from(Args::parse())?;
    log::debug!("{config:?}");

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("failed to install Ctrl-C handler")?;

    let detector = HandLandmarker::load(&config)?;
    let webcam = Webcam::open(config.webcam_options())?;
    let gui = Gui::new(WINDOW_TITLE)?;

    let outcome = App::new(webcam, detector, gui)
        .fps_window(config.fps_window)
        .fps_start(start)
        .interrupt_flag(interrupt)
        .run()?;
    log::info!(
        "exiting after {} frames ({} hands drawn, last at {:.1} FPS)",
        outcome.stats.frames,
        outcome.stats.hands_drawn,
        outcome.stats.fps,
    );

    match outcome.reason.exit_code() {
        0 => Ok(()),
        code => process::exit(code),
    }
}
