use std::env;
use std::error::Error;
use std::path::Path;
use std::sync::mpsc;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use log::{info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::App;
use crate::config;
use crate::library::scan;
use crate::mpris::ControlCmd;

mod event_loop;
mod mpris_sync;
mod settings;
mod startup;

pub fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--dump-config") {
        print!("{}", config::Settings::default().to_toml()?);
        return Ok(());
    }

    let (settings, settings_problem) = settings::load_settings();
    if let Err(e) = startup::init_logging(&settings.logging) {
        eprintln!("soundstage: logging disabled: {e}");
    }
    if let Some(msg) = settings_problem {
        warn!("{msg}");
    }

    let dir = args
        .into_iter()
        .find(|a| !a.starts_with("--"))
        .unwrap_or_else(|| {
            env::current_dir()
                .ok()
                .and_then(|p| p.to_str().map(|s| s.to_string()))
                .unwrap_or_else(|| "Music".to_string())
        });

    let tracks = scan(Path::new(&dir), &settings.library);
    info!("{} tracks under {dir}", tracks.len());

    let mut core = startup::build_core(&settings)?;
    let mut app = App::new(tracks);
    app.follow_playback = settings.ui.follow_playback;
    if !app.has_tracks() {
        app.set_status(format!("no audio files found under {dir}"));
    }
    app.set_current_dir(dir);

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx.clone(), core.service.playback_handle());
    mpris_sync::update_mpris(&mpris, &app);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = event_loop::EventLoopState::default();
    let run_result = event_loop::run(
        &mut terminal,
        &settings,
        &mut app,
        &mut core,
        &mpris,
        &control_tx,
        &control_rx,
        &mut state,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}
