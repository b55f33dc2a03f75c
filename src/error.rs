/// Error types shared between the skin store, the payload codec and the viewport
///
/// All variants carry owned strings so they can travel inside iced messages
/// (which must be `Clone`).

use thiserror::Error;

/// Failures of the durable skin store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The durable medium could not be opened (or was never opened).
    /// Writes stay disabled until a retry succeeds.
    #[error("skin store unavailable: {0}")]
    Unavailable(String),
    /// A single add/remove transaction failed and was rolled back.
    #[error("skin store write failed: {0}")]
    WriteFailed(String),
    /// Delete target absent. Callers treat this as a no-op.
    #[error("no stored skin matches the request")]
    NotFound,
}

/// Failures while turning a user file into a stored payload (and back).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("not a supported image: {0}")]
    NotAnImage(String),
    #[error("skins must be 64x64 or 64x32, got {width}x{height}")]
    UnsupportedDimensions { width: u32, height: u32 },
    #[error("malformed skin data: {0}")]
    Malformed(String),
    #[error("file error: {0}")]
    Io(String),
}

/// Failures of the rendering surface lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewportError {
    /// No GPU adapter/device could be acquired at startup.
    #[error("no usable GPU: {0}")]
    GpuUnavailable(String),
    #[error("failed to create rendering surface at {width}x{height}: {reason}")]
    SurfaceCreateFailed {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("failed to load skin: {0}")]
    AssetLoadFailed(String),
    /// A newer selection replaced this one before it finished loading.
    #[error("skin selection was superseded")]
    Superseded,
    /// Another surface is still attached to the display region.
    #[error("display region already has a live surface (#{0})")]
    RegionBusy(u64),
    #[error("viewport has been detached")]
    Disposed,
}

/// Failures reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
