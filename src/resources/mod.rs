use std::sync::Arc;

use crate::{
    config::AssetFailurePolicy,
    error::AssetError,
    flow::{MaybeSend, MaybeSync},
    resources::level::{parse_environment, Environment},
};

/**
 * This module contains all logic for loading meshes and textures from external files,
 * plus the procedural meshes the scene builds itself.
 */
pub mod level;
pub mod mesh;
pub mod texture;

#[cfg(not(target_arch = "wasm32"))]
pub type AssetFuture<'a> = futures::future::BoxFuture<'a, Result<Vec<u8>, AssetError>>;
#[cfg(target_arch = "wasm32")]
pub type AssetFuture<'a> = futures::future::LocalBoxFuture<'a, Result<Vec<u8>, AssetError>>;

/// Where asset bytes come from.
///
/// The scene only ever asks for paths relative to an asset root; the source decides
/// whether that means the filesystem or an HTTP origin.
pub trait AssetSource: MaybeSend + MaybeSync {
    fn fetch<'a>(&'a self, path: &'a str) -> AssetFuture<'a>;
}

/// Reads assets below a root directory (native) or below `<origin>/<root>/` (web).
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: String,
}

impl FileAssetSource {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Option<reqwest::Url> {
    let window = web_sys::window()?;
    let origin = window.location().origin().ok()?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root)).ok()?;
    base.join(file_name).ok()
}

impl AssetSource for FileAssetSource {
    fn fetch<'a>(&'a self, path: &'a str) -> AssetFuture<'a> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Box::pin(async move {
                let full_path = std::path::Path::new(&self.root).join(path);
                tokio::fs::read(&full_path)
                    .await
                    .map_err(|source| AssetError::Io {
                        path: path.to_string(),
                        source,
                    })
            })
        }
        #[cfg(target_arch = "wasm32")]
        {
            Box::pin(async move {
                let url = format_url(&self.root, path).ok_or_else(|| AssetError::Io {
                    path: path.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "cannot build an asset url from the page location",
                    ),
                })?;
                let http_err = |source| AssetError::Http {
                    path: path.to_string(),
                    source,
                };
                let response = reqwest::get(url)
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(http_err)?;
                let bytes = response.bytes().await.map_err(http_err)?;
                Ok(bytes.to_vec())
            })
        }
    }
}

/// Fetch and decode the level asset, retrying as far as `policy` allows.
///
/// This is the only suspending step of the scene setup. It is meant to run in the
/// background while the render loop is already drawing.
pub async fn load_environment(
    source: Arc<dyn AssetSource>,
    path: String,
    policy: AssetFailurePolicy,
) -> Result<Environment, AssetError> {
    let attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        let result = match source.fetch(&path).await {
            Ok(bytes) => parse_environment(&bytes, &path, source.as_ref()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(environment) => return Ok(environment),
            Err(e) if attempt < attempts => {
                log::warn!("Loading {} failed (attempt {}/{}): {}", path, attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
