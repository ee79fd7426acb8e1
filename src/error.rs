//! Error kinds.
//!
//! A [`StartupError`] ends the application. An [`AssetError`] is logged and the scene
//! keeps rendering without the asset that failed.

use thiserror::Error;

/// Fatal failures while bringing the scene up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not create a render surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("could not open the graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("physics world rejected its settings: {0}")]
    Physics(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("level asset failed to load: {0}")]
    Asset(#[source] AssetError),
}

/// Recoverable failures while fetching or decoding an asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(target_arch = "wasm32")]
    #[error("could not fetch {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not parse {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{path} has an embedded buffer but no binary chunk")]
    MissingBlob { path: String },
    #[error("{path} embeds data in a data: URI, which is not supported; export it as .glb")]
    DataUri { path: String },
    #[error("could not decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

impl AssetError {
    /// The asset path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            AssetError::Io { path, .. }
            | AssetError::Gltf { path, .. }
            | AssetError::MissingBlob { path }
            | AssetError::DataUri { path }
            | AssetError::Image { path, .. } => path,
            #[cfg(target_arch = "wasm32")]
            AssetError::Http { path, .. } => path,
        }
    }
}

/// Failures reading `scene.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
