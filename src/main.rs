#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod analyzer;
mod login;
mod model_download;
mod overlay;
mod pipeline;
mod snapshot;
mod types;
mod ui;

use analyzer::AnalyzerBackend;
use anyhow::Result;
use crossbeam_channel::bounded;
use gpui::Application;
use gpui_component;

fn main() -> Result<()> {
    env_logger::init();

    let (ui_frame_tx, ui_frame_rx) = bounded(1);
    let (analyzer_frame_tx, analyzer_frame_rx) = bounded(1);

    let backend = AnalyzerBackend::default();

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(
                app,
                ui_frame_rx,
                ui_frame_tx,
                analyzer_frame_rx,
                analyzer_frame_tx,
                backend,
            ) {
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
