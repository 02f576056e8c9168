//! Force-directed placement of the nodes in a [`ViewGraph`].
//!
//! The layout owns its own position store keyed by node id. Graph values are
//! never touched; the renderer and hit-tester read positions from here.

mod forces;
mod quadtree;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

use super::filter::ViewGraph;
use super::style::body_radius;
use crate::util::{stable_direction, stable_pair};
use forces::{Collision, Repulsion, accumulate_collisions, accumulate_repulsion, spring};
use quadtree::Cell;

const BARNES_HUT_THETA: f32 = 0.8;
const REHEAT_ALPHA: f32 = 0.3;
const JITTER: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Steps run synchronously the first time a map is entered.
    pub warmup_iterations: usize,
    /// Steps run synchronously on re-entry, moving only newcomers.
    pub reentry_iterations: usize,
    pub iterations_per_frame: usize,
    pub repulsion: f32,
    pub link_distance: f32,
    pub link_stiffness: f32,
    pub collision: f32,
    pub center_pull: f32,
    /// Fraction of velocity lost per step.
    pub velocity_decay: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    /// Mean squared speed under which the layout counts as settled.
    pub energy_threshold: f32,
    pub max_speed: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 100,
            reentry_iterations: 60,
            iterations_per_frame: 2,
            repulsion: 350.0,
            link_distance: 80.0,
            link_stiffness: 0.08,
            collision: 0.6,
            center_pull: 0.01,
            velocity_decay: 0.3,
            alpha_decay: 0.02,
            alpha_min: 0.001,
            energy_threshold: 0.002,
            max_speed: 40.0,
        }
    }
}

impl LayoutConfig {
    /// Copy with every field pulled into a range the integrator stays stable in.
    pub fn clamped(self) -> Self {
        Self {
            warmup_iterations: self.warmup_iterations.min(2_000),
            reentry_iterations: self.reentry_iterations.min(2_000),
            iterations_per_frame: self.iterations_per_frame.clamp(1, 16),
            repulsion: self.repulsion.clamp(0.0, 5_000.0),
            link_distance: self.link_distance.clamp(10.0, 600.0),
            link_stiffness: self.link_stiffness.clamp(0.0, 1.0),
            collision: self.collision.clamp(0.0, 1.0),
            center_pull: self.center_pull.clamp(0.0, 0.5),
            velocity_decay: self.velocity_decay.clamp(0.01, 0.95),
            alpha_decay: self.alpha_decay.clamp(0.001, 0.5),
            alpha_min: self.alpha_min.clamp(0.0, 0.5),
            energy_threshold: self.energy_threshold.clamp(0.0, 10.0),
            max_speed: self.max_speed.clamp(1.0, 500.0),
        }
    }
}

#[derive(Clone, Debug)]
struct Body {
    id: String,
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    /// Coordinate fixed by the document.
    anchor: Option<Vec2>,
    /// Held in place for the current warm-up only.
    held: bool,
}

#[derive(Clone, Copy, Debug)]
struct Spring {
    from: usize,
    to: usize,
    stiffness: f32,
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    forces: Vec<Vec2>,
}

pub struct Layout {
    config: LayoutConfig,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    index_by_id: HashMap<String, usize>,
    pins: HashMap<String, Vec2>,
    alpha: f32,
    idle: bool,
    steps: u64,
    scratch: Scratch,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl Layout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config: config.clamped(),
            bodies: Vec::new(),
            springs: Vec::new(),
            index_by_id: HashMap::new(),
            pins: HashMap::new(),
            alpha: 0.0,
            idle: true,
            steps: 0,
            scratch: Scratch::default(),
        }
    }

    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    pub fn set_config(&mut self, config: LayoutConfig) {
        let config = config.clamped();
        if config != self.config {
            self.config = config;
            self.reheat(REHEAT_ALPHA);
        }
    }

    /// Drops every body and user pin, as when a different map is loaded.
    pub fn reset(&mut self) {
        self.bodies.clear();
        self.springs.clear();
        self.index_by_id.clear();
        self.pins.clear();
        self.alpha = 0.0;
        self.idle = true;
    }

    /// Adopts a new view.
    ///
    /// Bodies already present keep their exact position. Newcomers are placed
    /// next to a linked neighbour that already has a position, else next to the
    /// focus, and the warm-up moves only them. The very first entry places
    /// everything and warms up the whole view.
    pub fn enter(&mut self, view: &ViewGraph) {
        let first_entry = self.bodies.is_empty();
        let mut previous = std::mem::take(&mut self.bodies)
            .into_iter()
            .map(|body| (body.id.clone(), body))
            .collect::<HashMap<_, _>>();

        let mut placed: HashMap<String, Vec2> = HashMap::with_capacity(view.len());
        let focus_first = view
            .index_of(view.focus())
            .into_iter()
            .chain((0..view.len()).filter(|&index| view.nodes()[index].node.id != view.focus()));

        let mut order = Vec::with_capacity(view.len());
        for index in focus_first {
            let view_node = &view.nodes()[index];
            let node = &view_node.node;
            let anchor = node
                .fixed_position()
                .map(|position| vec2(position.x, position.y));
            let radius = body_radius(view_node.role, node.kind());

            let body = match previous.remove(&node.id) {
                Some(mut body) => {
                    body.anchor = anchor;
                    body.radius = radius;
                    body.held = !first_entry;
                    body
                }
                None => {
                    let position = self
                        .pins
                        .get(&node.id)
                        .copied()
                        .or(anchor)
                        .or_else(|| node.position.map(|position| vec2(position.x, position.y)))
                        .unwrap_or_else(|| self.initial_position(view, &node.id, &placed));
                    Body {
                        id: node.id.clone(),
                        position,
                        velocity: Vec2::ZERO,
                        radius,
                        anchor,
                        held: false,
                    }
                }
            };
            placed.insert(body.id.clone(), body.position);
            order.push((index, body));
        }

        // Bodies are stored in view order so indices line up with the view.
        order.sort_by_key(|(index, _)| *index);
        let bodies = order.into_iter().map(|(_, body)| body).collect::<Vec<_>>();

        self.index_by_id = bodies
            .iter()
            .enumerate()
            .map(|(index, body)| (body.id.clone(), index))
            .collect();
        self.springs = view
            .links()
            .iter()
            .filter_map(|link| {
                let from = *self.index_by_id.get(&link.source)?;
                let to = *self.index_by_id.get(&link.target)?;
                (from != to).then(|| Spring {
                    from,
                    to,
                    stiffness: (link.strength as f32).clamp(0.1, 5.0).sqrt(),
                })
            })
            .collect();
        self.bodies = bodies;

        let iterations = if first_entry {
            self.config.warmup_iterations
        } else {
            self.config.reentry_iterations
        };
        let has_newcomers = first_entry || self.bodies.iter().any(|body| !body.held);
        self.alpha = 1.0;
        if has_newcomers {
            for _ in 0..iterations {
                self.step();
            }
        }
        for body in &mut self.bodies {
            body.held = false;
        }

        self.alpha = if first_entry {
            self.alpha.max(REHEAT_ALPHA * 0.5)
        } else {
            REHEAT_ALPHA
        };
        self.idle = false;
        tracing::debug!(
            bodies = self.bodies.len(),
            springs = self.springs.len(),
            first_entry,
            "layout entered view"
        );
    }

    fn initial_position(&self, view: &ViewGraph, id: &str, placed: &HashMap<String, Vec2>) -> Vec2 {
        let spread = self.config.link_distance * 0.6;
        let neighbour = view
            .links()
            .iter()
            .filter_map(|link| link.opposite(id))
            .find_map(|other| placed.get(other).copied());
        let anchor = neighbour
            .or_else(|| placed.get(view.focus()).copied())
            .unwrap_or(Vec2::ZERO);

        if placed.is_empty() {
            // The first body of a fresh layout sits at the origin.
            return anchor;
        }
        let (_, radial) = stable_pair(id);
        anchor + stable_direction(id) * spread * (1.0 + 0.25 * radial)
    }

    /// Advances at most `iterations_per_frame` steps. Returns whether anything moved.
    pub fn step_frame(&mut self) -> bool {
        if self.idle {
            return false;
        }
        let mut moved = false;
        for _ in 0..self.config.iterations_per_frame {
            moved |= self.step();
            if self.settled() {
                self.idle = true;
                tracing::debug!(steps = self.steps, "layout settled");
                break;
            }
        }
        moved
    }

    fn settled(&self) -> bool {
        self.alpha < self.config.alpha_min || self.kinetic_energy() < self.config.energy_threshold
    }

    /// Mean squared speed over the bodies that are free to move.
    pub fn kinetic_energy(&self) -> f32 {
        let (sum, count) = self
            .bodies
            .iter()
            .filter(|body| !self.is_fixed(body))
            .fold((0.0, 0usize), |(sum, count), body| {
                (sum + body.velocity.length_sq(), count + 1)
            });
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    fn is_fixed(&self, body: &Body) -> bool {
        body.held || body.anchor.is_some() || self.pins.contains_key(&body.id)
    }

    fn step(&mut self) -> bool {
        let count = self.bodies.len();
        self.steps += 1;
        self.alpha += (0.0 - self.alpha) * self.config.alpha_decay;
        if count == 0 {
            return false;
        }

        let config = self.config;
        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.radii.clear();
        scratch.forces.clear();
        scratch.forces.resize(count, Vec2::ZERO);
        let mut max_radius = 0.0_f32;
        for body in &self.bodies {
            scratch.positions.push(body.position);
            scratch.radii.push(body.radius);
            max_radius = max_radius.max(body.radius);
        }

        if let Some(root) = Cell::build(&scratch.positions) {
            let repulsion = Repulsion {
                strength: config.repulsion,
                softening: 25.0,
                theta: BARNES_HUT_THETA,
            };
            for (index, force) in scratch.forces.iter_mut().enumerate() {
                accumulate_repulsion(&root, index, &scratch.positions, repulsion, force);
            }

            let spacing = 6.0;
            let reach = max_radius * 2.0 + spacing;
            accumulate_collisions(
                &root,
                &root,
                true,
                &scratch.positions,
                &scratch.radii,
                Collision {
                    strength: config.collision,
                    spacing,
                    reach_sq: reach * reach,
                },
                &mut scratch.forces,
            );
        }

        for link in &self.springs {
            let rest = config.link_distance + scratch.radii[link.from] + scratch.radii[link.to];
            let pull = spring(
                scratch.positions[link.from],
                scratch.positions[link.to],
                rest,
                config.link_stiffness * link.stiffness,
            );
            scratch.forces[link.from] += pull;
            scratch.forces[link.to] -= pull;
        }

        for (force, position) in scratch.forces.iter_mut().zip(&scratch.positions) {
            *force -= *position * config.center_pull;
        }

        let retain = 1.0 - config.velocity_decay;
        let mut moved = false;
        for index in 0..count {
            let fixed_at = {
                let body = &self.bodies[index];
                self.pins
                    .get(&body.id)
                    .copied()
                    .or(body.anchor)
                    .or(body.held.then_some(body.position))
            };
            let mut force = scratch.forces[index];
            if !force.is_finite() {
                force = jitter(&self.bodies[index].id);
            }

            let body = &mut self.bodies[index];
            if let Some(target) = fixed_at {
                body.velocity = Vec2::ZERO;
                body.position = target;
                continue;
            }

            let mut velocity = (body.velocity + force * self.alpha) * retain;
            let speed = velocity.length();
            if speed > config.max_speed {
                velocity *= config.max_speed / speed;
            }
            if !velocity.is_finite() {
                velocity = Vec2::ZERO;
            }
            body.velocity = velocity;
            body.position += velocity;
            if !body.position.is_finite() {
                body.position = jitter(&body.id);
                body.velocity = Vec2::ZERO;
            }
            moved |= velocity.length_sq() > 1e-8;
        }
        moved
    }

    /// Restarts stepping after something outside the simulation changed.
    pub fn reheat(&mut self, alpha: f32) {
        if self.bodies.is_empty() {
            return;
        }
        self.alpha = self.alpha.max(alpha.clamp(0.0, 1.0));
        self.idle = false;
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.index_by_id
            .get(id)
            .map(|&index| self.bodies[index].position)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, Vec2)> {
        self.bodies
            .iter()
            .map(|body| (body.id.as_str(), body.position))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Holds `id` at `position` until unpinned. Pins outlive view changes.
    pub fn pin(&mut self, id: &str, position: Vec2) {
        if !position.is_finite() {
            return;
        }
        self.pins.insert(id.to_owned(), position);
        if let Some(&index) = self.index_by_id.get(id) {
            let body = &mut self.bodies[index];
            body.position = position;
            body.velocity = Vec2::ZERO;
        }
        self.reheat(REHEAT_ALPHA);
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        let removed = self.pins.remove(id).is_some();
        if removed {
            self.reheat(REHEAT_ALPHA);
        }
        removed
    }

    pub fn is_user_pinned(&self, id: &str) -> bool {
        self.pins.contains_key(id)
    }

    /// Whether `id` is held by a user pin or by the document.
    pub fn is_pinned(&self, id: &str) -> bool {
        self.is_user_pinned(id)
            || self
                .index_by_id
                .get(id)
                .is_some_and(|&index| self.bodies[index].anchor.is_some())
    }

    pub fn user_pins(&self) -> &HashMap<String, Vec2> {
        &self.pins
    }

    /// Forgets everything about a node that left the map.
    pub fn forget(&mut self, id: &str) {
        self.pins.remove(id);
    }
}

fn jitter(id: &str) -> Vec2 {
    let (x, y) = stable_pair(id);
    vec2(x, y) * JITTER
}
