#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use hoop_scene::{
    error::AssetError,
    input::PointerLock,
    resources::{AssetFuture, AssetSource},
};

pub const LEVEL: &str = "models/level.glb";

/// In-memory [`AssetSource`] that can fail its first fetches and counts every call.
#[derive(Default)]
pub struct MockSource {
    files: HashMap<String, Vec<u8>>,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    /// Make the next `n` fetches fail regardless of the path.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AssetSource for MockSource {
    fn fetch<'a>(&'a self, path: &'a str) -> AssetFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AssetError::Io {
                    path: path.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "flaky"),
                });
            }
            self.files.get(path).cloned().ok_or_else(|| AssetError::Io {
                path: path.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        })
    }
}

/// A binary glTF with `surfaces` nodes, each a 2x2 floor quad shifted by two units
/// along +X per node.
pub fn level_glb(surfaces: usize) -> Vec<u8> {
    let positions: [f32; 12] = [
        -1.0, 0.0, -1.0, //
        1.0, 0.0, -1.0, //
        -1.0, 0.0, 1.0, //
        1.0, 0.0, 1.0,
    ];
    let indices: [u16; 6] = [0, 2, 1, 1, 2, 3];
    let mut bin: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
    bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let meshes: Vec<String> = (0..surfaces)
        .map(|i| {
            format!(
                r#"{{"name":"floor{}","primitives":[{{"attributes":{{"POSITION":0}},"indices":1}}]}}"#,
                i
            )
        })
        .collect();
    let nodes: Vec<String> = (0..surfaces)
        .map(|i| {
            format!(
                r#"{{"name":"surface{}","mesh":{},"translation":[{},0,0]}}"#,
                i,
                i,
                i * 2
            )
        })
        .collect();
    let roots: Vec<String> = (0..surfaces).map(|i| i.to_string()).collect();
    let json = format!(
        concat!(
            r#"{{"asset":{{"version":"2.0"}},"#,
            r#""buffers":[{{"byteLength":{}}}],"#,
            r#""bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":48}},"#,
            r#"{{"buffer":0,"byteOffset":48,"byteLength":12}}],"#,
            r#""accessors":[{{"bufferView":0,"componentType":5126,"count":4,"type":"VEC3","min":[-1,0,-1],"max":[1,0,1]}},"#,
            r#"{{"bufferView":1,"componentType":5123,"count":6,"type":"SCALAR"}}],"#,
            r#""meshes":[{}],"nodes":[{}],"scenes":[{{"nodes":[{}]}}],"scene":0}}"#
        ),
        bin.len(),
        meshes.join(","),
        nodes.join(","),
        roots.join(",")
    );
    let mut json = json.into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

/// [`PointerLock`] that records every request.
#[derive(Debug, Default)]
pub struct RecordingLock {
    pub locked: bool,
    pub requests: u32,
    pub releases: u32,
}

impl PointerLock for RecordingLock {
    fn request_lock(&mut self) {
        self.requests += 1;
        self.locked = true;
    }

    fn release_lock(&mut self) {
        self.releases += 1;
        self.locked = false;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}
