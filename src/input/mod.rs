//! Input handling
//!
//! Raw key and mouse state, plus the key bindings of the viewer's actions.

mod bindings;
mod state;

pub use bindings::{KeyBindings, ViewerAction};
pub use state::Input;
