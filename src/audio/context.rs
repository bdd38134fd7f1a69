use anyhow::{bail, Result};
use std::sync::Mutex;
use tracing::debug;

/// Audio context lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet running (power-saving default)
    Suspended,
    Running,
    Closed,
}

/// Audio context pinned to a fixed sample rate and mono output.
///
/// Created suspended; must be resumed before the audio processing unit is
/// installed. Closing is terminal and idempotent.
pub struct AudioContext {
    sample_rate: u32,
    channels: u16,
    state: Mutex<ContextState>,
}

impl AudioContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            state: Mutex::new(ContextState::Suspended),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bring a suspended context to `Running`. No-op when already running.
    pub async fn resume(&self) -> Result<()> {
        // Model the asynchronous hop a real context resume takes
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ContextState::Closed => bail!("audio context is closed"),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                *state = ContextState::Running;
                debug!("audio context resumed ({} Hz)", self.sample_rate);
                Ok(())
            }
        }
    }

    /// Close the context. Idempotent.
    pub async fn close(&self) {
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != ContextState::Closed {
            *state = ContextState::Closed;
            debug!("audio context closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_starts_suspended() {
        let context = AudioContext::new(16000);
        assert_eq!(context.state(), ContextState::Suspended);
        assert_eq!(context.sample_rate(), 16000);
        assert_eq!(context.channels(), 1);
    }

    #[tokio::test]
    async fn test_resume_transitions_to_running() {
        let context = AudioContext::new(16000);

        context.resume().await.unwrap();
        assert_eq!(context.state(), ContextState::Running);

        // Resume is a no-op once running
        context.resume().await.unwrap();
        assert_eq!(context.state(), ContextState::Running);
    }

    #[tokio::test]
    async fn test_closed_context_cannot_resume() {
        let context = AudioContext::new(16000);
        context.close().await;

        assert_eq!(context.state(), ContextState::Closed);
        assert!(context.resume().await.is_err());

        // Close stays idempotent
        context.close().await;
        assert_eq!(context.state(), ContextState::Closed);
    }
}
