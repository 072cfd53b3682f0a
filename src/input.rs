//! Keyboard and mouse state polled once per tick.
//!
//! Keys stay down until released or until the tick that consumed them calls
//! [`InputState::force_release`], which turns held toggle keys into
//! one-shot actions.

use std::collections::HashSet;

use cgmath::Vector2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    cursor: Vector2<f32>,
    last_click: Vector2<f32>,
    window_size: Vector2<f32>,
}

impl InputState {
    pub fn new(width: u32, height: u32) -> Self {
        let window_size = Vector2::new(width as f32, height as f32);
        Self {
            pressed_keys: HashSet::new(),
            pressed_buttons: HashSet::new(),
            cursor: window_size / 2.0,
            last_click: Vector2::new(0.0, 0.0),
            window_size,
        }
    }

    /// Feeds a window event. Returns `true` if it was an input event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return false;
                };
                if event.repeat {
                    return true;
                }
                match event.state {
                    ElementState::Pressed => self.on_key_pressed(key),
                    ElementState::Released => self.on_key_released(key),
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => self.on_mouse_pressed(*button),
                    ElementState::Released => self.on_mouse_released(*button),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_mouse_moved(position.x as f32, position.y as f32);
                true
            }
            _ => false,
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Records the press and where it happened.
    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.last_click = self.cursor;
        self.pressed_buttons.insert(button);
    }

    /// Leaves the click position alone, so dragging before release does
    /// not move the pick point.
    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        self.cursor = Vector2::new(x, y);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// All of `keys` held at once. An empty chord is never pressed.
    pub fn is_chord_pressed(&self, keys: &[KeyCode]) -> bool {
        !keys.is_empty() && keys.iter().all(|k| self.is_key_pressed(*k))
    }

    pub fn force_release(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn force_release_mouse(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Cursor position of the last button press, window space with the
    /// origin top left.
    pub fn last_click(&self) -> Vector2<f32> {
        self.last_click
    }

    pub fn cursor(&self) -> Vector2<f32> {
        self.cursor
    }

    pub fn window_size(&self) -> Vector2<f32> {
        self.window_size
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = Vector2::new(width as f32, height as f32);
    }

    pub fn center(&self) -> Vector2<f32> {
        self.window_size / 2.0
    }

    /// Cursor displacement from the window centre.
    pub fn mouse_offset(&self) -> Vector2<f32> {
        self.cursor - self.center()
    }

    /// Call after warping the pointer back to the centre.
    pub fn recenter(&mut self) {
        self.cursor = self.center();
    }
}
