//! Pure visual rules for nodes and links.
//!
//! Nothing here paints; the canvas turns these values into shapes.

use eframe::egui::Color32;

use super::filter::{ViewGraph, ViewRole};
use crate::map::{Link, NodeKind};

pub const GOLD: Color32 = Color32::from_rgb(212, 175, 55);
pub const CENTER_FILL: Color32 = Color32::from_rgb(128, 100, 51);
pub const BLUE: Color32 = Color32::from_rgb(96, 165, 250);
pub const PURPLE: Color32 = Color32::from_rgb(168, 85, 247);
pub const RED: Color32 = Color32::from_rgb(239, 68, 68);
pub const CONTENT_DOT: Color32 = Color32::from_rgb(201, 168, 76);
pub const BACKGROUND: Color32 = Color32::from_rgb(8, 12, 20);

/// World radius of a fully grown node.
pub fn body_radius(role: ViewRole, kind: NodeKind) -> f32 {
    match role {
        ViewRole::Center => NodeKind::Root.base_size(),
        ViewRole::History => NodeKind::Issue.base_size(),
        ViewRole::Inner | ViewRole::Outer => kind.base_size(),
    }
}

/// Paint tier; nodes are drawn in ascending tier order.
pub fn draw_tier(role: ViewRole, kind: NodeKind) -> u8 {
    match role {
        ViewRole::Center => 5,
        ViewRole::History => 2,
        ViewRole::Inner | ViewRole::Outer => kind.tier(),
    }
}

/// View node indices in paint order. Ties keep view order.
pub fn draw_order(view: &ViewGraph) -> Vec<usize> {
    let mut order = (0..view.len()).collect::<Vec<_>>();
    order.sort_by_key(|&index| {
        let view_node = &view.nodes()[index];
        draw_tier(view_node.role, view_node.node.kind())
    });
    order
}

/// How a node relates to whatever the pointer is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverRelation {
    /// Nothing is hovered.
    Idle,
    Hovered,
    Neighbour,
    /// Something else is hovered and this node is not adjacent to it.
    Unrelated,
}

impl HoverRelation {
    pub fn of(view: &ViewGraph, id: &str, hovered: Option<&str>) -> Self {
        match hovered {
            None => Self::Idle,
            Some(hovered) if hovered == id => Self::Hovered,
            Some(hovered) if view.links().iter().any(|link| link.connects(id, hovered)) => {
                Self::Neighbour
            }
            Some(_) => Self::Unrelated,
        }
    }

    pub fn dims(self) -> bool {
        self == Self::Unrelated
    }

    pub fn lit(self) -> bool {
        matches!(self, Self::Hovered | Self::Neighbour)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeState {
    pub role: ViewRole,
    pub kind: NodeKind,
    pub hover: HoverRelation,
    pub selected: bool,
    pub pinned: bool,
    /// Linear birth progress in `[0, 1]`; [`node_visual`] applies the easing.
    pub birth: f32,
    pub has_summary: bool,
    pub edit_mode: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelStyle {
    Hidden,
    /// Bold, inside the body.
    Inside,
    /// Above the body, in the given color.
    Above(Color32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeVisual {
    pub radius: f32,
    pub fill: Option<Color32>,
    pub stroke: Color32,
    pub stroke_width: f32,
    pub glow: bool,
    pub halo: bool,
    pub selection_ring: bool,
    pub pin_marker: bool,
    pub content_dot: bool,
    pub label: LabelStyle,
    pub controls: bool,
}

pub fn node_visual(state: NodeState) -> NodeVisual {
    let dimmed = state.hover.dims();
    let center = state.role == ViewRole::Center;
    let history = state.role == ViewRole::History;

    let (mut fill, mut stroke, stroke_width) = if center {
        (Some(CENTER_FILL), GOLD, 2.0)
    } else if history {
        (None, PURPLE, 1.2)
    } else {
        let stroke = match state.kind {
            NodeKind::Root => GOLD,
            NodeKind::Driver => BLUE,
            NodeKind::Risk => RED,
            NodeKind::Issue | NodeKind::Peripheral | NodeKind::Other => Color32::WHITE,
        };
        (None, stroke, 1.5)
    };

    if dimmed {
        stroke = if history {
            PURPLE.gamma_multiply(0.3)
        } else {
            Color32::WHITE.gamma_multiply(0.1)
        };
        fill = fill.map(|color| color.gamma_multiply(0.4));
    }

    let label = if dimmed {
        LabelStyle::Hidden
    } else if center {
        LabelStyle::Inside
    } else if state.hover == HoverRelation::Hovered {
        LabelStyle::Above(Color32::WHITE.gamma_multiply(0.95))
    } else if state.selected {
        LabelStyle::Above(Color32::WHITE.gamma_multiply(0.75))
    } else {
        LabelStyle::Above(Color32::WHITE.gamma_multiply(0.28))
    };

    NodeVisual {
        radius: body_radius(state.role, state.kind) * birth_curve(state.birth),
        fill,
        stroke,
        stroke_width,
        glow: state.hover.lit(),
        halo: center && !dimmed,
        selection_ring: state.selected && !dimmed,
        pin_marker: state.pinned,
        content_dot: state.has_summary && !center && !dimmed,
        label,
        controls: state.edit_mode,
    }
}

/// Cubic ease-out applied to a raw `[0, 1]` progress.
pub fn birth_curve(progress: f32) -> f32 {
    let t = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkState {
    pub history: bool,
    pub hover: HoverRelation,
    pub touches_selected: bool,
    pub kinds: (NodeKind, NodeKind),
    /// Reveal progress in `[0, 1]`.
    pub reveal: f32,
}

impl LinkState {
    /// Hover relation of a link: lit when an endpoint is hovered.
    pub fn hover_of(link: &Link, hovered: Option<&str>) -> HoverRelation {
        match hovered {
            None => HoverRelation::Idle,
            Some(id) if link.touches(id) => HoverRelation::Neighbour,
            Some(_) => HoverRelation::Unrelated,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkVisual {
    pub color: Color32,
    /// Screen-space width in points.
    pub width: f32,
    /// Dash and gap lengths, for dashed links.
    pub dash: Option<(f32, f32)>,
    /// Fraction of the line drawn from source towards target.
    pub reveal: f32,
    pub glow: bool,
}

pub fn link_visual(state: LinkState) -> LinkVisual {
    let reveal = state.reveal.clamp(0.0, 1.0);
    if state.history {
        return LinkVisual {
            color: Color32::from_rgb(139, 92, 246).gamma_multiply(0.3),
            width: 0.8,
            dash: Some((2.0, 4.0)),
            reveal,
            glow: false,
        };
    }

    let (a, b) = state.kinds;
    let (base_opacity, base_width) = match (a, b) {
        (NodeKind::Root, NodeKind::Root) => (0.55, 0.8),
        (NodeKind::Root, NodeKind::Driver) | (NodeKind::Driver, NodeKind::Root) => (0.35, 0.5),
        _ => (0.2, 0.4),
    };
    let risky = a == NodeKind::Risk || b == NodeKind::Risk;

    let (color, width, glow): (Color32, f32, bool) = if state.hover.lit() {
        (BLUE.gamma_multiply(0.9), 1.2, true)
    } else if state.hover.dims() {
        (Color32::WHITE.gamma_multiply(0.03), 0.4, false)
    } else if risky {
        (
            Color32::from_rgb(201, 74, 74).gamma_multiply(base_opacity + 0.05),
            base_width,
            false,
        )
    } else {
        (Color32::WHITE.gamma_multiply(base_opacity), base_width, false)
    };

    let width = if state.touches_selected && !state.hover.dims() {
        width.max(0.9)
    } else {
        width
    };

    LinkVisual {
        color,
        width: width * 2.0,
        dash: None,
        reveal,
        glow,
    }
}
