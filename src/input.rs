//! Pointer lock on mouse buttons.
//!
//! Buttons are numbered like DOM `MouseEvent.button`: 0 primary, 1 middle (auxiliary),
//! 2 secondary. Pressing the primary button engages pointer lock, pressing the middle
//! button releases it.

use std::sync::Arc;

use winit::{
    event::MouseButton,
    window::{CursorGrabMode, Window},
};

pub const PRIMARY_BUTTON: u16 = 0;
pub const AUXILIARY_BUTTON: u16 = 1;

/// Something that can capture and release the pointer.
pub trait PointerLock {
    fn request_lock(&mut self);
    fn release_lock(&mut self);
    fn is_locked(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Engaged,
    Released,
    Ignored,
}

pub fn button_index(button: MouseButton) -> u16 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::Back => 3,
        MouseButton::Forward => 4,
        MouseButton::Other(n) => n,
    }
}

/// Maps button presses onto a [`PointerLock`] and remembers whether the primary
/// button is held.
#[derive(Debug, Default, Clone)]
pub struct PointerLockHandler {
    primary_held: bool,
}

impl PointerLockHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pointer_down(&mut self, button: u16, lock: &mut dyn PointerLock) -> PointerAction {
        match button {
            PRIMARY_BUTTON => {
                self.primary_held = true;
                lock.request_lock();
                log::debug!("Pointer lock requested");
                PointerAction::Engaged
            }
            AUXILIARY_BUTTON => {
                lock.release_lock();
                log::debug!("Pointer lock released");
                PointerAction::Released
            }
            _ => PointerAction::Ignored,
        }
    }

    pub fn on_pointer_up(&mut self, button: u16) {
        if button == PRIMARY_BUTTON {
            self.primary_held = false;
        }
    }

    /// The window lost focus: button-up events may never arrive, so forget the held
    /// button and let go of the pointer.
    pub fn on_focus_lost(&mut self, lock: &mut dyn PointerLock) {
        self.primary_held = false;
        if lock.is_locked() {
            lock.release_lock();
            log::debug!("Pointer lock released on focus loss");
        }
    }

    pub fn primary_held(&self) -> bool {
        self.primary_held
    }

    /// Pointer motion turns the camera while locked or while dragging.
    pub fn should_rotate(&self, lock: &dyn PointerLock) -> bool {
        lock.is_locked() || self.primary_held
    }
}

/// [`PointerLock`] on a winit window.
///
/// Uses a locked cursor where the platform supports it and falls back to confining it
/// to the window. The cursor is hidden while locked.
#[derive(Debug, Clone)]
pub struct WindowPointerLock {
    window: Arc<Window>,
    locked: bool,
}

impl WindowPointerLock {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            locked: false,
        }
    }
}

impl PointerLock for WindowPointerLock {
    fn request_lock(&mut self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                self.locked = true;
            }
            Err(e) => log::warn!("Pointer lock unavailable: {}", e),
        }
    }

    fn release_lock(&mut self) {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("Could not release the pointer: {}", e);
        }
        self.window.set_cursor_visible(true);
        self.locked = false;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}
