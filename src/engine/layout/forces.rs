use eframe::egui::{Vec2, vec2};

use super::quadtree::Cell;

const MIN_DISTANCE: f32 = 0.0001;

#[derive(Clone, Copy, Debug)]
pub(super) struct Repulsion {
    pub(super) strength: f32,
    pub(super) softening: f32,
    pub(super) theta: f32,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Collision {
    pub(super) strength: f32,
    pub(super) spacing: f32,
    pub(super) reach_sq: f32,
}

/// Deterministic unit vector used when two bodies coincide.
pub(super) fn separation_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214 + 0.37) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Push on `a` away from `b`, falling off with the inverse of their distance.
fn push_apart(delta: Vec2, strength: f32, softening: f32) -> Vec2 {
    delta * (strength / (delta.length_sq() + softening))
}

pub(super) fn accumulate_repulsion(
    cell: &Cell,
    index: usize,
    positions: &[Vec2],
    params: Repulsion,
    force: &mut Vec2,
) {
    if cell.count <= 0.0 {
        return;
    }
    let point = positions[index];

    if cell.is_leaf() {
        for &other in &cell.members {
            if other == index {
                continue;
            }
            let mut delta = point - positions[other];
            if delta.length_sq() < MIN_DISTANCE * MIN_DISTANCE {
                delta = separation_direction(index, other) * 0.5;
            }
            *force += push_apart(delta, params.strength, params.softening);
        }
        return;
    }

    let delta = point - cell.centroid;
    let distance = delta.length().max(MIN_DISTANCE);
    let far_enough = !cell.square.contains(point) && cell.square.side() / distance < params.theta;
    if far_enough {
        *force += push_apart(delta, params.strength * cell.count, params.softening);
        return;
    }

    for child in cell.children() {
        accumulate_repulsion(child, index, positions, params, force);
    }
}

fn collide(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    params: Collision,
    forces: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    let direction = if distance > MIN_DISTANCE {
        delta / distance
    } else {
        separation_direction(from, to)
    };

    let min_distance = radii[from] + radii[to] + params.spacing;
    if distance < min_distance {
        let push = direction * ((min_distance - distance) * params.strength);
        forces[from] += push;
        forces[to] -= push;
    }
}

/// Resolves overlaps between every pair of bodies in two cells that are close enough to touch.
pub(super) fn accumulate_collisions(
    a: &Cell,
    b: &Cell,
    same: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: Collision,
    forces: &mut [Vec2],
) {
    if a.square.gap_sq(b.square) > params.reach_sq {
        return;
    }

    if a.is_leaf() && b.is_leaf() {
        if same {
            for (offset, &from) in a.members.iter().enumerate() {
                for &to in &a.members[offset + 1..] {
                    collide(from, to, positions, radii, params, forces);
                }
            }
        } else {
            for &from in &a.members {
                for &to in &b.members {
                    collide(from, to, positions, radii, params, forces);
                }
            }
        }
        return;
    }

    if same {
        let children = a.children().collect::<Vec<_>>();
        for (offset, first) in children.iter().enumerate() {
            accumulate_collisions(first, first, true, positions, radii, params, forces);
            for second in &children[offset + 1..] {
                accumulate_collisions(first, second, false, positions, radii, params, forces);
            }
        }
        return;
    }

    let split_a = !a.is_leaf() && (b.is_leaf() || a.square.half >= b.square.half);
    if split_a {
        for child in a.children() {
            accumulate_collisions(child, b, false, positions, radii, params, forces);
        }
    } else {
        for child in b.children() {
            accumulate_collisions(a, child, false, positions, radii, params, forces);
        }
    }
}

/// Hooke spring along one link; returns the force on `from` (the opposite acts on `to`).
pub(super) fn spring(from: Vec2, to: Vec2, rest_length: f32, stiffness: f32) -> Vec2 {
    let delta = to - from;
    let distance = delta.length();
    if distance <= MIN_DISTANCE {
        return Vec2::ZERO;
    }
    delta / distance * ((distance - rest_length) * stiffness)
}
