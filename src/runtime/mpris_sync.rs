use crate::app::App;
use crate::mpris::MprisHandle;

/// Push the app's playback mirror to MPRIS. The handle drops repeats.
pub fn update_mpris(mpris: &MprisHandle, app: &App) {
    let index = app.current_index();
    let track = app.playback.current_track.as_ref();
    mpris.set_track_metadata(index, track);
    mpris.set_playback(&app.playback, app.phase);
}
