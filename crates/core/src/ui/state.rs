//! UI-side types and event definitions.
//!
//! The geometry and phase of the dialog live in [`crate::dialog::DialogState`];
//! this module only adds what the window needs on top of it.

use crate::dialog::Notice;

/// Outcome of a dialog session, shared with the caller of `run`.
#[derive(Clone, Default, Debug)]
pub struct DialogResult {
    /// Public path of the stored header, set once the upload succeeded.
    pub stored_path: Option<String>,
}

/// Events received from the background upload task.
///
/// Sent through a channel from the export/upload thread to the UI thread.
pub(crate) enum UploadEvent {
    /// The crop was stored under this path.
    Stored(String),
    /// Export or upload failed; the message is for the log.
    Failed(String),
}

/// Transient banner shown at the bottom of the dialog.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Banner {
    pub notice: Notice,
    /// Seconds since the egui clock started when the banner appeared.
    pub shown_at: f64,
}

impl Banner {
    /// How long a banner stays visible, in seconds.
    pub const LIFETIME: f64 = 6.0;

    pub fn is_expired(&self, now: f64) -> bool {
        now - self.shown_at > Self::LIFETIME
    }
}
