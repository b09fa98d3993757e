//! Key bindings
//!
//! Physical keys map to viewer actions so the demo can be rebound without
//! touching its update loop.

use rustc_hash::FxHashMap;
use winit::keyboard::KeyCode;

use super::Input;

/// Things the viewer can be asked to do from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerAction {
    ToggleBloom,
    ToggleHdr,
    ToggleGammaCorrection,
    ToggleMsaa,
    ToggleBlinnPhong,
    /// Switch between forward and deferred pipelines
    TogglePipeline,
    /// Switch the deferred pass between Phong and PBR materials
    ToggleDeferredMaterial,
    ToggleLamps,
    OrbitLeft,
    OrbitRight,
    OrbitUp,
    OrbitDown,
    ZoomIn,
    ZoomOut,
    Quit,
}

/// Key to action map
#[derive(Debug, Clone)]
pub struct KeyBindings {
    keys: FxHashMap<KeyCode, ViewerAction>,
    actions: FxHashMap<ViewerAction, Vec<KeyCode>>,
}

impl KeyBindings {
    /// No bindings
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: FxHashMap::default(),
            actions: FxHashMap::default(),
        }
    }

    /// The viewer's default layout
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut bindings = Self::new();
        bindings.bind(KeyCode::KeyB, ViewerAction::ToggleBloom);
        bindings.bind(KeyCode::KeyH, ViewerAction::ToggleHdr);
        bindings.bind(KeyCode::KeyG, ViewerAction::ToggleGammaCorrection);
        bindings.bind(KeyCode::KeyM, ViewerAction::ToggleMsaa);
        bindings.bind(KeyCode::KeyP, ViewerAction::ToggleBlinnPhong);
        bindings.bind(KeyCode::KeyD, ViewerAction::TogglePipeline);
        bindings.bind(KeyCode::KeyR, ViewerAction::ToggleDeferredMaterial);
        bindings.bind(KeyCode::KeyL, ViewerAction::ToggleLamps);
        bindings.bind(KeyCode::ArrowLeft, ViewerAction::OrbitLeft);
        bindings.bind(KeyCode::ArrowRight, ViewerAction::OrbitRight);
        bindings.bind(KeyCode::ArrowUp, ViewerAction::OrbitUp);
        bindings.bind(KeyCode::ArrowDown, ViewerAction::OrbitDown);
        bindings.bind(KeyCode::Equal, ViewerAction::ZoomIn);
        bindings.bind(KeyCode::Minus, ViewerAction::ZoomOut);
        bindings.bind(KeyCode::Escape, ViewerAction::Quit);
        bindings
    }

    /// Bind `key`, replacing whatever it was bound to
    pub fn bind(&mut self, key: KeyCode, action: ViewerAction) {
        if let Some(previous) = self.keys.insert(key, action)
            && let Some(keys) = self.actions.get_mut(&previous)
        {
            keys.retain(|k| *k != key);
        }
        self.actions.entry(action).or_default().push(key);
    }

    pub fn unbind(&mut self, key: KeyCode) {
        if let Some(action) = self.keys.remove(&key)
            && let Some(keys) = self.actions.get_mut(&action)
        {
            keys.retain(|k| *k != key);
        }
    }

    #[must_use]
    pub fn action(&self, key: KeyCode) -> Option<ViewerAction> {
        self.keys.get(&key).copied()
    }

    #[must_use]
    pub fn keys(&self, action: ViewerAction) -> &[KeyCode] {
        self.actions
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any key bound to `action` went down this frame
    #[must_use]
    pub fn triggered(&self, input: &Input, action: ViewerAction) -> bool {
        self.keys(action)
            .iter()
            .any(|key| input.is_key_just_pressed(*key))
    }

    /// Whether any key bound to `action` is held
    #[must_use]
    pub fn held(&self, input: &Input, action: ViewerAction) -> bool {
        self.keys(action).iter().any(|key| input.is_key_pressed(*key))
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use winit::event::ElementState;

    use super::*;

    #[test]
    fn test_defaults_cover_every_toggle() {
        let bindings = KeyBindings::with_defaults();
        for action in [
            ViewerAction::ToggleBloom,
            ViewerAction::ToggleHdr,
            ViewerAction::ToggleGammaCorrection,
            ViewerAction::ToggleMsaa,
            ViewerAction::ToggleBlinnPhong,
            ViewerAction::TogglePipeline,
        ] {
            assert!(!bindings.keys(action).is_empty(), "{action:?} unbound");
        }
    }

    #[test]
    fn test_rebinding_moves_key() {
        let mut bindings = KeyBindings::with_defaults();
        bindings.bind(KeyCode::KeyB, ViewerAction::ToggleHdr);

        assert_eq!(bindings.action(KeyCode::KeyB), Some(ViewerAction::ToggleHdr));
        assert!(bindings.keys(ViewerAction::ToggleBloom).is_empty());
        assert_eq!(bindings.keys(ViewerAction::ToggleHdr).len(), 2);
    }

    #[test]
    fn test_unbind() {
        let mut bindings = KeyBindings::with_defaults();
        bindings.unbind(KeyCode::Escape);
        assert!(bindings.action(KeyCode::Escape).is_none());
        assert!(bindings.keys(ViewerAction::Quit).is_empty());
    }

    #[test]
    fn test_triggered_only_on_press_frame() {
        let bindings = KeyBindings::with_defaults();
        let mut input = Input::new();

        input.process_keyboard(KeyCode::KeyB, ElementState::Pressed);
        assert!(bindings.triggered(&input, ViewerAction::ToggleBloom));
        assert!(!bindings.triggered(&input, ViewerAction::ToggleHdr));

        input.end_frame();
        assert!(!bindings.triggered(&input, ViewerAction::ToggleBloom));
        assert!(bindings.held(&input, ViewerAction::ToggleBloom));
    }
}
