use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::job::MediaKind;
use format::TargetFormat;

pub mod compress;
pub mod format;
pub mod level;

/// What the provider is asked to turn into a result.
pub struct ConversionRequest {
    pub name: String,
    pub kind: MediaKind,
    pub bytes: Arc<[u8]>,
    /// `None` when the batch runs in compress mode on a non-image payload.
    pub target: Option<TargetFormat>,
}

/// Produces result bytes for every payload that is not compressed in process.
#[async_trait]
pub trait ConversionProvider: Send + Sync {
    async fn convert(&self, request: ConversionRequest) -> anyhow::Result<Arc<[u8]>>;
}

/// Stand-in until a real transcoding backend exists: waits a fixed delay and
/// hands the payload back untouched.
pub struct SimulatedConverter {
    delay: Duration,
}

impl SimulatedConverter {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(800);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedConverter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl ConversionProvider for SimulatedConverter {
    async fn convert(&self, request: ConversionRequest) -> anyhow::Result<Arc<[u8]>> {
        info!(
            "simulating {} ({}) -> {} for {:?}",
            request.name,
            request.kind,
            request
                .target
                .map(|t| t.to_string())
                .unwrap_or_else(|| "original".to_string()),
            self.delay
        );
        tokio::time::sleep(self.delay).await;
        Ok(request.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn simulated_converter_returns_input_after_delay() {
        let converter = SimulatedConverter::default();
        let bytes: Arc<[u8]> = Arc::from(&b"payload"[..]);
        let start = tokio::time::Instant::now();

        let out = converter
            .convert(ConversionRequest {
                name: "clip.mov".to_string(),
                kind: MediaKind::Video,
                bytes: bytes.clone(),
                target: Some(TargetFormat::MP4),
            })
            .await
            .unwrap();

        assert_eq!(&*out, &*bytes);
        assert!(start.elapsed() >= Duration::from_millis(800));
    }
}
