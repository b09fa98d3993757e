//! Keyboard and mouse state

use std::hash::Hash;

use glam::Vec2;
use rustc_hash::FxHashSet;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

/// Held / just pressed / just released tracking for one kind of button
#[derive(Debug)]
struct ButtonState<T> {
    held: FxHashSet<T>,
    pressed: FxHashSet<T>,
    released: FxHashSet<T>,
}

impl<T: Copy + Eq + Hash> ButtonState<T> {
    fn new() -> Self {
        Self {
            held: FxHashSet::default(),
            pressed: FxHashSet::default(),
            released: FxHashSet::default(),
        }
    }

    fn process(&mut self, button: T, state: ElementState) {
        match state {
            ElementState::Pressed => {
                // Key repeat arrives as further presses
                if self.held.insert(button) {
                    self.pressed.insert(button);
                }
            }
            ElementState::Released => {
                if self.held.remove(&button) {
                    self.released.insert(button);
                }
            }
        }
    }

    fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }
}

/// Input state for the current frame
#[derive(Debug)]
pub struct Input {
    keys: ButtonState<KeyCode>,
    mouse_buttons: ButtonState<MouseButton>,
    cursor: Option<Vec2>,
    cursor_delta: Vec2,
    scroll_delta: Vec2,
}

impl Input {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: ButtonState::new(),
            mouse_buttons: ButtonState::new(),
            cursor: None,
            cursor_delta: Vec2::ZERO,
            scroll_delta: Vec2::ZERO,
        }
    }

    /// Clear per-frame state; call once the frame has consumed its input
    pub fn end_frame(&mut self) {
        self.keys.end_frame();
        self.mouse_buttons.end_frame();
        self.cursor_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
    }

    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        self.keys.process(key, state);
    }

    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        self.mouse_buttons.process(button, state);
    }

    /// Track the cursor; the first position only seeds the delta
    pub fn process_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    /// The cursor left the window
    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub fn process_scroll(&mut self, delta: Vec2) {
        self.scroll_delta += delta;
    }

    #[must_use]
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.held.contains(&key)
    }

    #[must_use]
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys.pressed.contains(&key)
    }

    #[must_use]
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.keys.released.contains(&key)
    }

    #[must_use]
    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        self.mouse_buttons.held.contains(&button)
    }

    #[must_use]
    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Cursor movement this frame
    #[must_use]
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    /// Cursor movement this frame while `button` is held
    #[must_use]
    pub fn drag_delta(&self, button: MouseButton) -> Vec2 {
        if self.is_mouse_button_pressed(button) {
            self.cursor_delta
        } else {
            Vec2::ZERO
        }
    }

    #[must_use]
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_press_is_not_just_pressed_again() {
        let mut input = Input::new();
        input.process_keyboard(KeyCode::KeyB, ElementState::Pressed);
        assert!(input.is_key_just_pressed(KeyCode::KeyB));

        input.end_frame();
        input.process_keyboard(KeyCode::KeyB, ElementState::Pressed);
        assert!(input.is_key_pressed(KeyCode::KeyB));
        assert!(!input.is_key_just_pressed(KeyCode::KeyB));

        input.process_keyboard(KeyCode::KeyB, ElementState::Released);
        assert!(input.is_key_just_released(KeyCode::KeyB));
        assert!(!input.is_key_pressed(KeyCode::KeyB));
    }

    #[test]
    fn test_first_cursor_position_has_no_delta() {
        let mut input = Input::new();
        input.process_cursor(Vec2::new(100.0, 100.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);

        input.process_cursor(Vec2::new(110.0, 95.0));
        input.process_cursor(Vec2::new(112.0, 95.0));
        assert_eq!(input.cursor_delta(), Vec2::new(12.0, -5.0));

        input.end_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn test_drag_requires_held_button() {
        let mut input = Input::new();
        input.process_cursor(Vec2::ZERO);
        input.process_cursor(Vec2::new(4.0, 0.0));
        assert_eq!(input.drag_delta(MouseButton::Left), Vec2::ZERO);

        input.process_mouse_button(MouseButton::Left, ElementState::Pressed);
        assert_eq!(input.drag_delta(MouseButton::Left), Vec2::new(4.0, 0.0));
    }

    #[test]
    fn test_cursor_reenter_does_not_jump() {
        let mut input = Input::new();
        input.process_cursor(Vec2::ZERO);
        input.cursor_left();
        input.process_cursor(Vec2::new(500.0, 500.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }
}
