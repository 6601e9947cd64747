mod app;
mod classify;
mod copy;
mod dicom;
mod error;
mod tree;

#[cfg(test)]
mod test_support;

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

fn main() -> eframe::Result<()> {
    init_logging();

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title(app::APP_TITLE)
            .with_inner_size(app::INITIAL_WINDOW_SIZE)
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        app::APP_TITLE,
        native_options,
        Box::new(|_cc| Ok(Box::new(app::DicomSortApp::default()))),
    )
}

fn init_logging() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto).is_err() {
        eprintln!("Logger already installed; continuing without terminal logging setup");
    }
}
