use std::sync::Arc;

use tracing::{error, info, warn};

use crate::audio::AudioInterrupt;
use crate::service::MutationService;

// Failure is logged only; whatever clears the alarm runs regardless.
pub fn interrupt(audio: &dyn AudioInterrupt) {
    match audio.request_interrupt() {
        Ok(()) => info!("Alarm fired, audio interrupt requested"),
        Err(e) => warn!(error = %e, "Alarm fired, audio interrupt failed"),
    }
}

/// What happens when the armed timer goes off.
pub struct FireHandler {
    audio: Arc<dyn AudioInterrupt>,
    mutations: MutationService,
}

impl FireHandler {
    pub fn new(audio: Arc<dyn AudioInterrupt>, mutations: MutationService) -> Self {
        Self { audio, mutations }
    }

    /// Request an audio interrupt, then disarm.
    ///
    /// The interrupt goes first so anyone reading the alarm state in
    /// between still sees it as active. A failed interrupt never stops the
    /// disarm.
    pub fn execute(&self) {
        interrupt(self.audio.as_ref());

        if let Err(e) = self.mutations.disarm() {
            error!(error = %e, "Failed to disarm fired alarm");
        }
    }
}
