mod app;
mod audio;
mod config;
mod library;
mod mpris;
mod runtime;
mod timeline;
mod ui;
mod visual;
mod waveform;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
