//! Background thread running a [`StreamEngine`]

use std::thread::{self, JoinHandle};

use crate::audio::AudioBackend;
use crate::engine::control::ControlHandle;
use crate::engine::stream::StreamEngine;
use crate::error::{Result, StreamError};

/// Owns the thread a [`StreamEngine`] runs on.
///
/// The engine's terminal result comes back through [`join`](StreamWorker::join).
/// Dropping a worker that was never joined stops the engine and waits for it.
pub struct StreamWorker {
    control: ControlHandle,
    handle: Option<JoinHandle<Result<()>>>,
}

impl StreamWorker {
    /// Start `engine` on a dedicated thread
    pub fn spawn<B: AudioBackend>(engine: StreamEngine<B>) -> Result<Self> {
        let control = engine.control();

        let handle = thread::Builder::new()
            .name("stream-engine".to_string())
            .spawn(move || engine.start())?;

        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    /// Toggle pause; returns `true` when now paused
    pub fn pause_resume(&self) -> bool {
        self.control.pause_resume()
    }

    pub fn stop(&self) {
        self.control.stop()
    }

    /// Whether the engine thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the engine to exit and return its result
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => join_engine(handle),
            None => Ok(()),
        }
    }
}

fn join_engine(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle.join().unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panicked".to_string());
        tracing::error!("Stream engine panicked: {}", reason);
        Err(StreamError::Worker(reason))
    })
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.control.stop();
            // Already logged by the engine or by `join_engine`
            let _ = join_engine(handle);
        }
    }
}
