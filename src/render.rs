//! Render composition.
//!
//! A flow describes what it wants drawn each frame with a [`Render`]. The event loop
//! flattens the renders of all flows into one batch for the scene pipeline.

use crate::data_structures::model::Model;

/// A model drawn `amount` times with the transforms in `instance`.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// What a flow draws this frame.
///
/// - `None` renders nothing
/// - `Defaults(Vec<Instanced>)` renders a batch of instanced objects
pub enum Render<'a> {
    None,
    Defaults(Vec<Instanced<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn collect(self, basics: &mut Vec<Instanced<'a>>) {
        match self {
            Render::None => (),
            Render::Defaults(mut vec) => basics.append(&mut vec),
        }
    }
}

impl<'a> From<Vec<Instanced<'a>>> for Render<'a> {
    fn from(value: Vec<Instanced<'a>>) -> Self {
        if value.is_empty() {
            Render::None
        } else {
            Render::Defaults(value)
        }
    }
}
