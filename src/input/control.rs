//! Input `Control`s and the `InputSystem` that owns them, ported from the
//! original engine's `systems/input/control.hpp` + `input_system.hpp`.
//! Controls are named, typed (Press/Release/Hold) event sources; the
//! `InputSystem` owns them in an arena (spec §9's "owned graph, stable ids"
//! — the source's raw `Control*` dispatch tables become index maps here)
//! and fans out key events to whichever controls are mapped to that key.

use std::collections::HashMap;
use std::time::Instant;

use crate::event::Event;
use crate::input::codes::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Press,
    Release,
    Hold,
}

/// `(dt_since_press, dt_since_release)` for Press/Release controls, or
/// `(delta_time, time_since_press)` for Hold controls (spec §6).
pub type ControlArgs = (f64, f64);

pub struct Control {
    pub name: String,
    control_type: ControlType,
    mapped_keys: Vec<KeyCode>,
    hold_active: u32,
    last_press: Option<Instant>,
    last_release: Option<Instant>,
    pub event: Event<ControlArgs>,
}

impl Control {
    fn new(name: String, control_type: ControlType) -> Self {
        Self {
            name,
            control_type,
            mapped_keys: Vec::new(),
            hold_active: 0,
            last_press: None,
            last_release: None,
            event: Event::new(),
        }
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn is_hold_active(&self) -> bool {
        self.hold_active > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(usize);

/// Owns all [`Control`]s and routes key press/release events to them. Single
/// producer, serialized on the main thread per spec §5 (resource systems are
/// not re-entrant).
#[derive(Default)]
pub struct InputSystem {
    controls: Vec<Control>,
    by_name: HashMap<String, ControlId>,
    on_press: HashMap<KeyCode, Vec<ControlId>>,
    on_release: HashMap<KeyCode, Vec<ControlId>>,
    on_hold: HashMap<KeyCode, Vec<ControlId>>,
}

impl InputSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, unmapped control. Fails (returns `None`, logged) if a
    /// control with this name already exists, mirroring the source's
    /// `RuntimeError` on duplicate creation.
    pub fn create_control(&mut self, name: impl Into<String>, control_type: ControlType) -> Option<ControlId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            log::warn!("InputSystem: control \"{name}\" already exists");
            return None;
        }
        let id = ControlId(self.controls.len());
        self.by_name.insert(name.clone(), id);
        self.controls.push(Control::new(name, control_type));
        Some(id)
    }

    pub fn destroy_control(&mut self, id: ControlId) {
        for table in [&mut self.on_press, &mut self.on_release, &mut self.on_hold] {
            for ids in table.values_mut() {
                ids.retain(|&cid| cid != id);
            }
        }
    }

    pub fn control(&self, id: ControlId) -> &Control {
        &self.controls[id.0]
    }

    pub fn control_mut(&mut self, id: ControlId) -> &mut Control {
        &mut self.controls[id.0]
    }

    pub fn find(&self, name: &str) -> Option<ControlId> {
        self.by_name.get(name).copied()
    }

    /// Maps `key` to `id`'s control. Updates the dispatch table matching the
    /// control's type, mirroring `Control::map_key`.
    pub fn map_key(&mut self, id: ControlId, key: KeyCode) {
        self.controls[id.0].mapped_keys.push(key);
        let table = match self.controls[id.0].control_type {
            ControlType::Press => &mut self.on_press,
            ControlType::Release => &mut self.on_release,
            ControlType::Hold => &mut self.on_hold,
        };
        table.entry(key).or_default().push(id);
    }

    /// Removes `key` from `id`'s mapping. Refuses while the control's hold
    /// state is active, mirroring the source's guard ("cannot be unmapped
    /// while control is active").
    pub fn unmap_key(&mut self, id: ControlId, key: KeyCode) {
        if self.controls[id.0].is_hold_active() {
            log::warn!(
                "InputSystem: cannot unmap key from \"{}\" while it is active",
                self.controls[id.0].name
            );
            return;
        }
        self.controls[id.0].mapped_keys.retain(|&k| k != key);
        let table = match self.controls[id.0].control_type {
            ControlType::Press => &mut self.on_press,
            ControlType::Release => &mut self.on_release,
            ControlType::Hold => &mut self.on_hold,
        };
        if let Some(ids) = table.get_mut(&key) {
            ids.retain(|&cid| cid != id);
        }
    }

    /// Fires every Press control mapped to `key` with `(dt_since_press,
    /// dt_since_release)`, and marks every mapped Hold control active.
    pub fn press_key(&mut self, key: KeyCode, now: Instant) {
        if let Some(ids) = self.on_press.get(&key).cloned() {
            for id in ids {
                let control = &mut self.controls[id.0];
                let dt_press = control
                    .last_press
                    .map(|t| (now - t).as_secs_f64())
                    .unwrap_or(0.0);
                let dt_release = control
                    .last_release
                    .map(|t| (now - t).as_secs_f64())
                    .unwrap_or(0.0);
                control.last_press = Some(now);
                control.event.invoke(&(dt_press, dt_release));
            }
        }
        if let Some(ids) = self.on_hold.get(&key).cloned() {
            for id in ids {
                self.controls[id.0].hold_active += 1;
                self.controls[id.0].last_press.get_or_insert(now);
            }
        }
    }

    /// Fires every Release control mapped to `key`, and decrements the hold
    /// counter of every mapped Hold control. Release controls do not fire
    /// for Hold/Press mappings of the same key.
    pub fn release_key(&mut self, key: KeyCode, now: Instant) {
        if let Some(ids) = self.on_release.get(&key).cloned() {
            for id in ids {
                let control = &mut self.controls[id.0];
                let dt_press = control
                    .last_press
                    .map(|t| (now - t).as_secs_f64())
                    .unwrap_or(0.0);
                let dt_release = control
                    .last_release
                    .map(|t| (now - t).as_secs_f64())
                    .unwrap_or(0.0);
                control.last_release = Some(now);
                control.event.invoke(&(dt_press, dt_release));
            }
        }
        if let Some(ids) = self.on_hold.get(&key).cloned() {
            for id in ids {
                let control = &mut self.controls[id.0];
                control.hold_active = control.hold_active.saturating_sub(1);
            }
        }
    }

    /// Fires every active Hold control once per frame with `(delta_time,
    /// time_since_press)`. Called once per frame by the frame driver.
    pub fn invoke_held_keys(&mut self, delta_time: f64, now: Instant) {
        for control in &mut self.controls {
            if control.control_type == ControlType::Hold && control.is_hold_active() {
                let since_press = control
                    .last_press
                    .map(|t| (now - t).as_secs_f64())
                    .unwrap_or(0.0);
                control.event.invoke(&(delta_time, since_press));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn press_fires_press_control_but_not_release() {
        let mut input = InputSystem::new();
        let id = input.create_control("jump", ControlType::Press).unwrap();
        input.map_key(id, KeyCode::Space);

        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        input.control_mut(id).event.subscribe(move |_| {
            f.store(true, Ordering::SeqCst);
        });

        let t0 = Instant::now();
        input.press_key(KeyCode::Space, t0);
        assert!(fired.load(Ordering::SeqCst));

        fired.store(false, Ordering::SeqCst);
        input.release_key(KeyCode::Space, t0 + Duration::from_millis(10));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn hold_control_activates_on_press_and_deactivates_on_release() {
        let mut input = InputSystem::new();
        let id = input.create_control("sprint", ControlType::Hold).unwrap();
        input.map_key(id, KeyCode::LShift);

        let t0 = Instant::now();
        input.press_key(KeyCode::LShift, t0);
        assert!(input.control(id).is_hold_active());

        input.release_key(KeyCode::LShift, t0 + Duration::from_millis(5));
        assert!(!input.control(id).is_hold_active());
    }

    #[test]
    fn duplicate_control_name_is_rejected() {
        let mut input = InputSystem::new();
        assert!(input.create_control("dup", ControlType::Press).is_some());
        assert!(input.create_control("dup", ControlType::Press).is_none());
    }
}
