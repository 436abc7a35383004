use std::error::Error;
use std::fs::OpenOptions;
use std::sync::mpsc::Receiver;

use log::info;

use crate::audio::{AudioGraphAnalyzer, ExclusivitySweeper, PlaybackEvent, PlaybackService};
use crate::config::{self, LoggingSettings};
use crate::visual::VisualizationRenderer;

/// The audio core of one session, wired together.
pub struct Core {
    pub service: PlaybackService,
    pub analyzer: AudioGraphAnalyzer,
    pub renderer: VisualizationRenderer,
    pub events: Receiver<PlaybackEvent>,
}

/// Route `log` output to `logging.file`. Without a file nothing is logged:
/// the terminal belongs to the UI.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), Box<dyn Error>> {
    let Some(path) = settings.file.as_deref() else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.level))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()?;
    Ok(())
}

/// One service on the default output, the analyzer tapping it and the
/// renderer drawing from the analyzer.
pub fn build_core(settings: &config::Settings) -> Result<Core, Box<dyn Error>> {
    let sweeper = ExclusivitySweeper::new();
    let mut service = PlaybackService::with_default_output(sweeper, &settings.playback)?;
    let events = service.subscribe();

    let mut analyzer = AudioGraphAnalyzer::new(&settings.analyzer);
    analyzer.attach(service.output_handle())?;
    info!(
        "analyzer attached: fft {} -> {} bins",
        analyzer.fft_size(),
        analyzer.bin_count()
    );

    let renderer = VisualizationRenderer::new(settings.visualizer.clone());
    Ok(Core {
        service,
        analyzer,
        renderer,
        events,
    })
}
