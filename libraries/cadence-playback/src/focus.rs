//! Audio focus arbitration seam

use tracing::debug;

/// Platform audio focus
///
/// Focus *changes* arrive later as `FocusChange` values through the
/// orchestrator; this trait only covers the synchronous request.
pub trait AudioFocus: Send {
    /// Ask for focus; `true` when granted
    fn request(&mut self) -> bool;

    /// Give focus back
    fn abandon(&mut self);
}

/// Focus provider for hosts without arbitration; every request succeeds
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl AudioFocus for AlwaysGranted {
    fn request(&mut self) -> bool {
        true
    }

    fn abandon(&mut self) {
        debug!("Audio focus abandoned");
    }
}
