mod common;

use std::sync::Arc;

use hoop_scene::{
    bootstrap::SceneBootstrapper,
    config::SceneConfig,
    input::{button_index, PointerAction, AUXILIARY_BUTTON, PRIMARY_BUTTON},
};
use winit::{event::MouseButton, keyboard::KeyCode};

use crate::common::test_utils::{MockSource, RecordingLock};

fn bootstrapper() -> SceneBootstrapper {
    SceneBootstrapper::new(SceneConfig::default(), Arc::new(MockSource::new())).unwrap()
}

#[test]
fn primary_press_engages_once_per_press() {
    let mut boot = bootstrapper();
    let mut lock = RecordingLock::default();

    for expected in 1..=3 {
        assert_eq!(boot.on_pointer_down(PRIMARY_BUTTON, &mut lock), PointerAction::Engaged);
        boot.on_pointer_up(PRIMARY_BUTTON);
        assert_eq!(lock.requests, expected);
    }
    assert_eq!(lock.releases, 0);
    assert!(lock.locked);
}

#[test]
fn middle_press_releases_once_per_press() {
    let mut boot = bootstrapper();
    let mut lock = RecordingLock::default();
    boot.on_pointer_down(PRIMARY_BUTTON, &mut lock);

    assert_eq!(boot.on_pointer_down(AUXILIARY_BUTTON, &mut lock), PointerAction::Released);
    assert_eq!(boot.on_pointer_down(AUXILIARY_BUTTON, &mut lock), PointerAction::Released);
    assert_eq!(lock.releases, 2);
    assert_eq!(lock.requests, 1);
    assert!(!lock.locked);
}

#[test]
fn other_buttons_do_nothing() {
    let mut boot = bootstrapper();
    let mut lock = RecordingLock::default();
    for button in [MouseButton::Right, MouseButton::Back, MouseButton::Forward, MouseButton::Other(9)] {
        assert_eq!(boot.on_pointer_down(button_index(button), &mut lock), PointerAction::Ignored);
    }
    assert_eq!((lock.requests, lock.releases), (0, 0));
}

#[test]
fn pointer_motion_turns_the_camera_only_while_locked() {
    let mut boot = bootstrapper();
    let mut lock = RecordingLock::default();

    assert!(!boot.on_pointer_motion(200.0, 0.0, &lock));
    assert_eq!(boot.scene().camera().unwrap().yaw.0, 0.0);

    boot.on_pointer_down(PRIMARY_BUTTON, &mut lock);
    boot.on_pointer_up(PRIMARY_BUTTON);
    assert!(boot.on_pointer_motion(200.0, 0.0, &lock));
    assert!((boot.scene().camera().unwrap().yaw.0 - 0.1).abs() < 1e-6);

    boot.on_pointer_down(AUXILIARY_BUTTON, &mut lock);
    assert!(!boot.on_pointer_motion(200.0, 0.0, &lock));
}

#[test]
fn wasd_moves_the_camera() {
    let mut boot = bootstrapper();
    assert!(boot.on_key(KeyCode::KeyW, true));
    boot.advance(instant::Duration::from_secs_f32(1.0 / 60.0));
    let z = boot.scene().camera().unwrap().position.z;
    assert!((z - (-4.9)).abs() < 1e-4, "{}", z);
    assert!(boot.on_key(KeyCode::KeyW, false));
    assert!(!boot.on_key(KeyCode::KeyZ, true));
}

#[test]
fn focus_loss_stops_held_keys_and_releases_the_pointer() {
    let mut boot = bootstrapper();
    let mut lock = RecordingLock::default();
    boot.on_pointer_down(PRIMARY_BUTTON, &mut lock);
    boot.on_key(KeyCode::KeyW, true);

    boot.on_focus_lost(&mut lock);
    let before = boot.scene().camera().unwrap().position;
    for _ in 0..60 {
        boot.advance(instant::Duration::from_secs_f32(1.0 / 60.0));
    }
    assert_eq!(boot.scene().camera().unwrap().position, before);
    assert_eq!(lock.releases, 1);
    assert!(!lock.locked);
    assert!(!boot.on_pointer_motion(200.0, 0.0, &lock));
}
