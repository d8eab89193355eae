//! Layout container: owns the controls, routes touches and timers to them.

use crate::behavior::{Behavior, DispatchContext, TouchOutcome};
use crate::config::EngineConfig;
use crate::control::{ControlSpec, LayoutDocument};
use crate::error::LayoutError;
use crate::protocol::{PointerId, SurfaceMetrics, TouchAction, TouchEvent};
use crate::sink::InputSink;
use crate::timer::{ManualTimers, SlotKey, TimerEvent, TimerQueue};
use crate::tracker::PointerTracker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// What the surface should do with a raw touch after the layout saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// A control owns this pointer; the surface must not act on it
    Consumed,
    /// A control handled it and the surface should handle it as well
    PassThrough,
    /// No control wanted it
    Unhandled,
}
impl From<TouchOutcome> for Routing {
    fn from(outcome: TouchOutcome) -> Self {
        match outcome {
            TouchOutcome::Consumed => Routing::Consumed,
            TouchOutcome::PassThrough => Routing::PassThrough,
            TouchOutcome::Ignored => Routing::Unhandled,
        }
    }
}

struct Slot {
    key: SlotKey,
    spec: ControlSpec,
    behavior: Behavior,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    slot: SlotKey,
    x: f32,
    y: f32,
}

/// Everything a behavior call borrows besides its own slot
struct Environment<T> {
    tracker: Arc<PointerTracker>,
    sink: Arc<dyn InputSink>,
    config: EngineConfig,
    surface: SurfaceMetrics,
    timers: T,
}
impl<T: TimerQueue> Environment<T> {
    fn run<R>(
        &mut self,
        slot: &mut Slot,
        f: impl FnOnce(&mut Behavior, &ControlSpec, &mut DispatchContext<'_>) -> R,
    ) -> R {
        let mut ctx = DispatchContext {
            slot: slot.key,
            control_id: &slot.spec.id,
            sink: self.sink.as_ref(),
            tracker: &self.tracker,
            timers: &mut self.timers,
            surface: self.surface,
            config: &self.config,
        };
        f(&mut slot.behavior, &slot.spec, &mut ctx)
    }

    fn teardown(&mut self, slot: &mut Slot) {
        self.run(slot, |behavior, spec, ctx| behavior.teardown(spec, ctx));
    }
}

/// Ordered set of controls over one rendering surface
///
/// Later controls sit on top of earlier ones. A touch-down goes to the
/// top-most interactive control under it, and the rest of that pointer's
/// stream follows it there regardless of where the finger travels.
pub struct ControlLayout<T: TimerQueue> {
    slots: Vec<Slot>,
    routes: HashMap<PointerId, Route>,
    env: Environment<T>,
    next_slot: SlotKey,
}
impl<T: TimerQueue> ControlLayout<T> {
    pub fn new(tracker: Arc<PointerTracker>, sink: Arc<dyn InputSink>, timers: T) -> Self {
        Self {
            slots: Vec::new(),
            routes: HashMap::new(),
            env: Environment {
                tracker,
                sink,
                config: EngineConfig::default(),
                surface: SurfaceMetrics::default(),
                timers,
            },
            next_slot: 1,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.env.config = config;
        self
    }

    pub fn with_surface(mut self, surface: SurfaceMetrics) -> Self {
        self.env.surface = surface;
        self
    }

    pub fn tracker(&self) -> &Arc<PointerTracker> {
        &self.env.tracker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.env.config
    }

    pub fn surface(&self) -> SurfaceMetrics {
        self.env.surface
    }

    /// The surface was resized or moved to another display
    pub fn set_surface(&mut self, surface: SurfaceMetrics) {
        debug!(
            "Surface is now {}x{} at density {}",
            surface.width, surface.height, surface.density
        );
        self.env.surface = surface;
    }

    pub fn timers(&self) -> &T {
        &self.env.timers
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Controls in drawing order, bottom first
    pub fn controls(&self) -> impl Iterator<Item = &ControlSpec> {
        self.slots.iter().map(|slot| &slot.spec)
    }

    pub fn get(&self, id: &str) -> Option<&ControlSpec> {
        self.slots
            .iter()
            .find(|slot| slot.spec.id == id)
            .map(|slot| &slot.spec)
    }

    pub fn behavior(&self, id: &str) -> Option<&Behavior> {
        self.slots
            .iter()
            .find(|slot| slot.spec.id == id)
            .map(|slot| &slot.behavior)
    }

    /// Pointers currently routed to a control, with the control's id
    pub fn routed_pointers(&self) -> Vec<(PointerId, &str)> {
        let mut routed: Vec<_> = self
            .routes
            .iter()
            .filter_map(|(pointer, route)| {
                self.slots
                    .iter()
                    .find(|slot| slot.key == route.slot)
                    .map(|slot| (*pointer, slot.spec.id.as_str()))
            })
            .collect();
        routed.sort_by_key(|(pointer, _)| *pointer);
        routed
    }

    /// Route one raw touch event
    pub fn handle_touch(&mut self, event: &TouchEvent) -> Routing {
        match event.action {
            TouchAction::Down => self.route_down(event),
            _ => self.route_followup(event),
        }
    }

    fn route_down(&mut self, event: &TouchEvent) -> Routing {
        if self.routes.contains_key(&event.pointer) {
            warn!(
                "Pointer {} went down twice without a release, ignoring",
                event.pointer
            );
            return Routing::Unhandled;
        }
        if let Some(owner) = self.env.tracker.owner(event.pointer) {
            warn!(
                "Pointer {} is already claimed by '{}', ignoring",
                event.pointer, owner
            );
            return Routing::Unhandled;
        }

        let Some(index) = self
            .slots
            .iter()
            .rposition(|slot| slot.spec.is_interactive() && slot.spec.hit_test(event.x, event.y))
        else {
            trace!("No control under pointer {} at ({}, {})", event.pointer, event.x, event.y);
            return Routing::Unhandled;
        };

        let slot = &mut self.slots[index];
        let outcome = self
            .env
            .run(slot, |behavior, spec, ctx| behavior.on_touch(spec, event, ctx));
        match outcome {
            TouchOutcome::Consumed | TouchOutcome::PassThrough => {
                trace!("Pointer {} routed to '{}'", event.pointer, slot.spec.id);
                self.routes.insert(
                    event.pointer,
                    Route {
                        slot: slot.key,
                        x: event.x,
                        y: event.y,
                    },
                );
            }
            TouchOutcome::Ignored => {
                trace!("'{}' ignored pointer {}", slot.spec.id, event.pointer);
            }
        }
        outcome.into()
    }

    fn route_followup(&mut self, event: &TouchEvent) -> Routing {
        let Some(route) = self.routes.get_mut(&event.pointer) else {
            return Routing::Unhandled;
        };
        route.x = event.x;
        route.y = event.y;
        let key = route.slot;

        let ends = matches!(event.action, TouchAction::Up | TouchAction::Cancel);
        if ends {
            self.routes.remove(&event.pointer);
        }

        let Some(slot) = self.slots.iter_mut().find(|slot| slot.key == key) else {
            // Control was removed under the finger; its teardown already ran
            self.routes.remove(&event.pointer);
            return Routing::Unhandled;
        };
        self.env
            .run(slot, |behavior, spec, ctx| behavior.on_touch(spec, event, ctx))
            .into()
    }

    /// Deliver a fired timer to the control that armed it
    pub fn handle_timer(&mut self, event: TimerEvent) {
        match self.slots.iter_mut().find(|slot| slot.key == event.slot) {
            Some(slot) => self
                .env
                .run(slot, |behavior, _, ctx| behavior.on_timer(event, ctx)),
            None => trace!("Dropping {:?} for removed slot {}", event.kind, event.slot),
        }
    }

    /// Cancel every routed pointer, as if the whole touch stream was aborted
    pub fn cancel_all(&mut self) -> usize {
        let mut routed: Vec<_> = self.routes.iter().map(|(p, r)| (*p, *r)).collect();
        routed.sort_by_key(|(pointer, _)| *pointer);
        for (pointer, route) in &routed {
            self.handle_touch(&TouchEvent::cancel(*pointer, route.x, route.y));
        }
        if !routed.is_empty() {
            debug!("Cancelled {} routed pointer(s)", routed.len());
        }
        routed.len()
    }

    /// Append a control on top of the existing ones
    pub fn add(&mut self, spec: ControlSpec) -> Result<(), LayoutError> {
        spec.validate()?;
        if self.get(&spec.id).is_some() {
            return Err(LayoutError::DuplicateId(spec.id));
        }

        let key = self.next_slot;
        self.next_slot += 1;
        debug!("Adding {:?} control '{}'", spec.kind(), spec.id);
        self.slots.push(Slot {
            key,
            behavior: Behavior::for_spec(&spec),
            spec,
        });
        Ok(())
    }

    /// Remove a control, ending whatever gesture it was tracking
    pub fn remove(&mut self, id: &str) -> Result<ControlSpec, LayoutError> {
        let index = self.index_of(id)?;
        let mut slot = self.slots.remove(index);
        self.env.teardown(&mut slot);
        self.routes.retain(|_, route| route.slot != slot.key);
        debug!("Removed control '{}'", id);
        Ok(slot.spec)
    }

    /// Replace a control's description
    ///
    /// Geometry, style and name changes keep the in-flight gesture. A new
    /// input mapping tears the old behavior down first.
    pub fn update(&mut self, id: &str, spec: ControlSpec) -> Result<(), LayoutError> {
        if spec.id != id {
            return Err(LayoutError::IdMismatch {
                from: id.to_string(),
                to: spec.id,
            });
        }
        spec.validate()?;
        let index = self.index_of(id)?;

        if self.slots[index].spec.mapping != spec.mapping {
            let old_key = self.slots[index].key;
            self.env.teardown(&mut self.slots[index]);
            self.routes.retain(|_, route| route.slot != old_key);

            let slot = &mut self.slots[index];
            slot.key = self.next_slot;
            self.next_slot += 1;
            slot.behavior = Behavior::for_spec(&spec);
            debug!("Rebuilt '{}' for its new {:?} mapping", id, spec.kind());
        } else {
            trace!("Updated '{}' in place", id);
        }
        self.slots[index].spec = spec;
        Ok(())
    }

    /// Replace every control with the contents of a document
    pub fn load(&mut self, document: LayoutDocument) -> Result<(), LayoutError> {
        document.validate()?;
        self.clear();
        let count = document.controls.len();
        for spec in document.controls {
            self.add(spec)?;
        }
        info!("Loaded layout with {} control(s)", count);
        Ok(())
    }

    /// Remove all controls, releasing every pointer claim
    pub fn clear(&mut self) {
        let mut slots = std::mem::take(&mut self.slots);
        for slot in slots.iter_mut().rev() {
            self.env.teardown(slot);
        }
        self.routes.clear();
        let stale = self.env.tracker.clear_all();
        if stale > 0 {
            warn!("Released {} claim(s) left over after teardown", stale);
        }
    }

    fn index_of(&self, id: &str) -> Result<usize, LayoutError> {
        self.slots
            .iter()
            .position(|slot| slot.spec.id == id)
            .ok_or_else(|| LayoutError::UnknownControl(id.to_string()))
    }
}

impl ControlLayout<ManualTimers> {
    /// Move the virtual clock forward, firing every timer that comes due
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = self.env.timers.now() + by;
        self.advance_to(until)
    }

    /// Fire timers due at or before `until` and move the clock there
    pub fn advance_to(&mut self, until: Duration) -> usize {
        let mut fired = 0;
        while let Some(event) = self.env.timers.pop_due(until) {
            self.handle_timer(event);
            fired += 1;
        }
        self.env.timers.set_now(until);
        fired
    }

    pub fn now(&self) -> Duration {
        self.env.timers.now()
    }
}
