//! Key codes. The original engine (`systems/input/input_codes.hpp`) defines
//! its own `KeyCode` enum so the renderer core never depends on a particular
//! windowing backend; this port's windowing collaborator is `winit` (spec
//! §6), so `KeyCode` is simply an alias for `winit`'s virtual key code
//! rather than a second parallel enum that would need a translation table
//! kept in sync by hand.

pub type KeyCode = winit::event::VirtualKeyCode;

/// Number of distinct key codes, used to size the pressed/released/hold
/// dispatch tables in [`super::control::InputSystem`] (mirrors the source's
/// `Control* _on_key_pressed_events[(InputCode) KeyCode::MAX_KEY_CODE]`).
pub const MAX_KEY_CODE: usize = 163;

pub fn key_code_index(code: KeyCode) -> usize {
    code as usize
}
