//! Screen capture capability.
//!
//! Pages and elements are captured the same way from the matcher's point of
//! view, so both implement [`ScreenshotTarget`].

use crate::options::CaptureOptions;
use crate::result::{ShotmatchError, ShotmatchResult};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Anything that can produce an encoded screenshot
#[async_trait]
pub trait ScreenshotTarget: Send + Sync {
    /// Capture with the given options
    ///
    /// # Errors
    ///
    /// Returns error if the capture fails or times out
    async fn screenshot(&self, options: &CaptureOptions) -> ShotmatchResult<Vec<u8>>;
}

/// Target that returns preset bytes and remembers every capture request
#[derive(Debug, Default)]
pub struct FixedCapture {
    image: Vec<u8>,
    failure: Option<String>,
    calls: Mutex<Vec<CaptureOptions>>,
}

impl FixedCapture {
    /// Target that always returns `image`
    #[must_use]
    pub fn new(image: impl Into<Vec<u8>>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Target whose captures always fail with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Options of every capture so far
    #[must_use]
    pub fn calls(&self) -> Vec<CaptureOptions> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of captures so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether any capture happened
    #[must_use]
    pub fn was_captured(&self) -> bool {
        self.call_count() > 0
    }
}

#[async_trait]
impl ScreenshotTarget for FixedCapture {
    async fn screenshot(&self, options: &CaptureOptions) -> ShotmatchResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.clone());

        match &self.failure {
            Some(message) => Err(ShotmatchError::capture(message.clone())),
            None => Ok(self.image.clone()),
        }
    }
}
