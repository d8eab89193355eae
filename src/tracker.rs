use crate::protocol::{ControlId, PointerId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, trace, warn};

/// Hooks into the rendering surface's own touch pipeline
///
/// The surface synthesizes mouse input from raw touches on its own. Pointers
/// claimed by a control must be excluded from that synthesis, otherwise the
/// hosted runtime sees the same finger twice.
pub trait SurfaceHooks: Send + Sync {
    /// Stop synthesizing input from this pointer
    fn pointer_consumed(&self, pointer: PointerId);

    /// The pointer is free again
    fn pointer_released(&self, pointer: PointerId);

    /// Show or hide the on-screen keyboard
    fn toggle_soft_keyboard(&self) {
        debug!("Surface has no soft keyboard");
    }
}

/// Registry of which pointers are owned by which control
///
/// One instance is shared by a layout, its controls and the surface adapter.
/// The lock only covers the map mutation; surface hooks run after it is
/// released.
pub struct PointerTracker {
    claims: Mutex<HashMap<PointerId, ControlId>>,
    surface: RwLock<Option<Arc<dyn SurfaceHooks>>>,
}
impl PointerTracker {
    /// Create a tracker with no surface attached
    pub fn new() -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            surface: RwLock::new(None),
        }
    }

    /// Create a tracker that notifies the given surface
    pub fn with_surface(surface: Arc<dyn SurfaceHooks>) -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            surface: RwLock::new(Some(surface)),
        }
    }

    /// Attach or replace the surface that receives claim notifications
    pub fn attach_surface(&self, surface: Arc<dyn SurfaceHooks>) {
        *self
            .surface
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(surface);
    }

    pub fn surface(&self) -> Option<Arc<dyn SurfaceHooks>> {
        self.surface
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PointerId, ControlId>> {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim a pointer for a control
    ///
    /// Returns `false` if the pointer is already owned; the existing claim is
    /// kept and the surface is not notified again.
    pub fn claim(&self, pointer: PointerId, control: &str) -> bool {
        {
            let mut claims = self.lock();
            if let Some(owner) = claims.get(&pointer) {
                warn!(
                    "Pointer {} already claimed by '{}', ignoring claim from '{}'",
                    pointer, owner, control
                );
                return false;
            }
            claims.insert(pointer, control.to_string());
        }

        trace!("Pointer {} claimed by '{}'", pointer, control);
        self.notify_consumed(pointer);
        true
    }

    /// Release a pointer; unknown pointers are a silent no-op
    pub fn release(&self, pointer: PointerId) -> bool {
        let removed = self.lock().remove(&pointer);
        match removed {
            Some(owner) => {
                trace!("Pointer {} released by '{}'", pointer, owner);
                self.notify_released(pointer);
                true
            }
            None => false,
        }
    }

    /// Release every pointer owned by one control
    pub fn release_control(&self, control: &str) -> Vec<PointerId> {
        let released: Vec<PointerId> = {
            let mut claims = self.lock();
            let owned: Vec<PointerId> = claims
                .iter()
                .filter(|(_, owner)| owner.as_str() == control)
                .map(|(pointer, _)| *pointer)
                .collect();
            for pointer in &owned {
                claims.remove(pointer);
            }
            owned
        };

        for pointer in &released {
            debug!("Pointer {} force-released from '{}'", pointer, control);
            self.notify_released(*pointer);
        }
        released
    }

    pub fn is_claimed(&self, pointer: PointerId) -> bool {
        self.lock().contains_key(&pointer)
    }

    pub fn owner(&self, pointer: PointerId) -> Option<ControlId> {
        self.lock().get(&pointer).cloned()
    }

    /// Snapshot of all current claims, sorted by pointer id
    pub fn claimed(&self) -> Vec<(PointerId, ControlId)> {
        let mut claims: Vec<_> = self
            .lock()
            .iter()
            .map(|(pointer, control)| (*pointer, control.clone()))
            .collect();
        claims.sort_by_key(|(pointer, _)| *pointer);
        claims
    }

    /// Drop every claim, notifying the surface once per released pointer
    pub fn clear_all(&self) -> usize {
        let drained: Vec<PointerId> = self.lock().drain().map(|(pointer, _)| pointer).collect();
        for pointer in &drained {
            self.notify_released(*pointer);
        }
        if !drained.is_empty() {
            debug!("Cleared {} pointer claims", drained.len());
        }
        drained.len()
    }

    fn notify_consumed(&self, pointer: PointerId) {
        match self.surface() {
            Some(surface) => surface.pointer_consumed(pointer),
            None => debug!("No surface attached to exclude pointer {}", pointer),
        }
    }

    fn notify_released(&self, pointer: PointerId) {
        match self.surface() {
            Some(surface) => surface.pointer_released(pointer),
            None => debug!("No surface attached to free pointer {}", pointer),
        }
    }
}
impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}
