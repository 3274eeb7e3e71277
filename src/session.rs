//! One identification at a time per session.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::IdentificationClient;
use crate::error::{PlantIdError, Result};
use crate::image::ImageBlob;
use crate::plant::PlantInfo;

/// Wraps a client and refuses to start a second identification while one
/// is still running. A superseded request is never raced; it is rejected
/// up front with [`PlantIdError::Busy`].
#[derive(Debug)]
pub struct IdentificationSession {
    client: IdentificationClient,
    in_flight: AtomicBool,
}

impl IdentificationSession {
    /// Creates a session around `client`.
    pub fn new(client: IdentificationClient) -> Self {
        Self {
            client,
            in_flight: AtomicBool::new(false),
        }
    }

    /// True while an identification is running.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The wrapped client.
    pub fn client(&self) -> &IdentificationClient {
        &self.client
    }

    /// Identifies `blob`, or fails with `Busy` if another call is in flight.
    pub async fn identify_blob(&self, blob: ImageBlob) -> Result<PlantInfo> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        self.client.identify_blob(blob).await
    }

    /// Identifies the image at `path`, or fails with `Busy`.
    pub async fn identify_path(&self, path: impl AsRef<Path>) -> Result<PlantInfo> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        self.client.identify_path(path).await
    }
}

/// Clears the flag on drop, including when the future is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PlantIdError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
