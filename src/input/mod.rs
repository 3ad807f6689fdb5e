//! Input event fan-out: named, typed [`control::Control`]s bound to key
//! codes, owned by an [`control::InputSystem`] (spec §3 "Control", §6 "Input
//! system"). The demo application's `handle_keyboard_input` is the platform
//! surface this system's `press_key`/`release_key` are driven from.

pub mod codes;
pub mod control;

pub use codes::KeyCode;
pub use control::{Control, ControlId, ControlType, InputSystem};
