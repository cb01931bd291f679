//! The composition engine.
//!
//! Laying out a fragment happens in two passes. The scale-resolution pass
//! ([`resolve`]) walks the tree bottom-up with top-down size targets and
//! assigns every node its extents and dynamic scale, cached in a
//! [`LayoutArena`] keyed by node id. The render pass ([`render`]) walks
//! top-down with an accumulated target rectangle and paints through the
//! glyph provider, retrying from scratch whenever ink required larger
//! margins than were reserved.
//!
//! Both passes are pure functions of the context, the tree and the target
//! rectangle, apart from the arena cache; a different context requires a
//! fresh arena.

pub mod fit;
pub mod insert;
pub mod render;
pub mod resolve;
pub mod shade;
pub mod silhouette;

use crate::config::Settings;
use crate::fonts::GlyphSource;
use crate::geometry::Rect;
use crate::surface::{Canvas, Color};
use crate::tree::{Direction, Fragment, NodeId, Note, Seq, Switch};
use crate::Result;

use self::shade::{HatchDir, ShadeSet};

/// Immutable configuration of one render request.
pub struct Context<'s> {
    /// The glyph provider.
    pub source: &'s dyn GlyphSource,

    /// The engine settings.
    pub settings: Settings,
}

impl<'s> Context<'s> {
    /// Creates a context over a glyph provider.
    pub fn new(source: &'s dyn GlyphSource, settings: Settings) -> Context<'s> {
        Context { source, settings }
    }
}

/// Currently inherited values of the overridable properties at a tree point.
#[derive(Clone, Debug)]
pub struct Ambient {
    /// Writing direction.
    pub direction: Direction,

    /// Ink color.
    pub color: Color,

    /// Whether groups are shaded by default.
    pub shade: bool,

    /// Separation factor between sibling groups.
    pub sep: f64,

    /// Whether operators fit by pixel inspection by default.
    pub fit: bool,

    /// Whether glyphs are mirrored.
    pub mirror: bool,

    /// Nominal unit size in ems.
    pub unit_em: f64,
}

impl Ambient {
    /// The ambient defaults at the root of a fragment.
    pub fn for_fragment(fragment: &Fragment) -> Ambient {
        let base = Ambient {
            direction: fragment.direction.unwrap_or(Direction::HorizontalLr),
            color: Color::BLACK,
            shade: false,
            sep: 1.0,
            fit: false,
            mirror: false,
            unit_em: fragment.unit.unwrap_or(1.0),
        };
        base.with_switch(&fragment.defaults)
    }

    /// Returns the ambient with a switch folded on top.
    pub fn with_switch(&self, switch: &Switch) -> Ambient {
        Ambient {
            direction: self.direction,
            color: switch.color.unwrap_or(self.color),
            shade: switch.shade.unwrap_or(self.shade),
            sep: switch.sep.unwrap_or(self.sep),
            fit: switch.fit.unwrap_or(self.fit),
            mirror: switch.mirror.unwrap_or(self.mirror),
            unit_em: self.unit_em,
        }
    }
}

/// The ambient defaults in force at each group and operator of a sequence.
///
/// A switch closing a nested range back-propagates onto the next sibling's
/// leading position, so the ambient after group `i` folds the group's
/// trailing switch before the sequence's own switch.
pub(crate) fn seq_ambients(seq: &Seq, ambient: &Ambient) -> (Vec<Ambient>, Vec<Ambient>) {
    let mut groups = Vec::with_capacity(seq.groups.len());
    let mut ops = Vec::with_capacity(seq.ops.len());
    let mut current = ambient.clone();

    for (i, group) in seq.groups.iter().enumerate() {
        groups.push(current.clone());
        if i < seq.ops.len() {
            current = current.with_switch(&group.trailing_switch());
            ops.push(current.clone());
            current = current.with_switch(&seq.switches[i]);
        }
    }

    (groups, ops)
}

/// Resolved geometry of one node, in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Resolved {
    /// Width.
    pub w: f64,

    /// Height.
    pub h: f64,

    /// Dynamic scale relative to the nominal unit.
    pub scale: f64,

    /// Horizontal offset within the parent, for overlaid children.
    pub dx: f64,

    /// Vertical offset within the parent, for overlaid children.
    pub dy: f64,
}

impl Resolved {
    /// The resolved extent along an axis.
    pub fn extent(&self, horizontal: bool) -> f64 {
        if horizontal {
            self.w
        } else {
            self.h
        }
    }
}

/// Per-node layout results, keyed by the tree's stable preorder indices.
///
/// The parsed tree stays immutable; this derived cache is recomputed by
/// every scale-resolution pass.
pub struct LayoutArena {
    slots: Vec<Resolved>,
}

impl LayoutArena {
    /// An arena for a tree of the given node count.
    pub fn new(nodes: usize) -> LayoutArena {
        LayoutArena {
            slots: vec![Resolved::default(); nodes],
        }
    }

    /// The cached result for a node.
    pub fn get(&self, id: NodeId) -> Resolved {
        self.slots[id]
    }

    /// Stores the result for a node.
    pub fn set(&mut self, id: NodeId, resolved: Resolved) {
        self.slots[id] = resolved;
    }
}

/// Monotonically growing pixel margins around the rendered fragment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Margins {
    /// Left margin.
    pub left: i32,

    /// Right margin.
    pub right: i32,

    /// Top margin.
    pub top: i32,

    /// Bottom margin.
    pub bottom: i32,
}

impl Margins {
    /// Equal margins on all four sides.
    pub fn uniform(px: i32) -> Margins {
        Margins {
            left: px,
            right: px,
            top: px,
            bottom: px,
        }
    }

    /// Total horizontal margin.
    pub fn horizontal(&self) -> i32 {
        self.left + self.right
    }

    /// Total vertical margin.
    pub fn vertical(&self) -> i32 {
        self.top + self.bottom
    }
}

/// A note waiting for placement once the main pass has painted.
pub(crate) struct PendingNote {
    /// The rectangle of the owning group, in global coordinates.
    pub rect: Rect,

    /// The note itself.
    pub note: Note,
}

/// Mutable state scoped to one render call.
pub struct Environment {
    margins: Margins,
    reserved: Margins,
    grew: bool,

    /// The hatching accumulator.
    pub(crate) shade: ShadeSet,

    /// Fitting-probe renders measure ink only; shading and notes are off.
    pub(crate) probe: bool,

    /// Paint-time mirroring for right-to-left directions.
    pub(crate) mirror: bool,

    pending_notes: Vec<PendingNote>,
}

impl Environment {
    /// A fresh environment with the given reserved margins.
    pub fn new(settings: &Settings, direction: Direction, margins: Margins) -> Environment {
        let mirror = direction.is_reversed();
        Environment {
            margins,
            reserved: margins,
            grew: false,
            shade: ShadeSet::new(
                HatchDir::for_flow(direction, mirror),
                settings.shade_spacing_px,
                settings.shade_tolerance_px,
                settings.shade_width_px,
            ),
            probe: false,
            mirror,
            pending_notes: Vec::new(),
        }
    }

    /// An environment for an ink-measurement probe render.
    pub fn probe(settings: &Settings, direction: Direction) -> Environment {
        let mut env = Environment::new(settings, direction, Margins::default());
        env.probe = true;
        env
    }

    /// The margins after the pass, possibly grown beyond the reserved ones.
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// True if some ink required more margin than was reserved.
    pub fn grew(&self) -> bool {
        self.grew
    }

    /// Requires at least the given left margin.
    pub fn ensure_left(&mut self, px: f64) {
        let px = px.ceil() as i32;
        if px > self.margins.left {
            self.margins.left = px;
        }
        if px > self.reserved.left {
            self.grew = true;
        }
    }

    /// Requires at least the given right margin.
    pub fn ensure_right(&mut self, px: f64) {
        let px = px.ceil() as i32;
        if px > self.margins.right {
            self.margins.right = px;
        }
        if px > self.reserved.right {
            self.grew = true;
        }
    }

    /// Requires at least the given top margin.
    pub fn ensure_top(&mut self, px: f64) {
        let px = px.ceil() as i32;
        if px > self.margins.top {
            self.margins.top = px;
        }
        if px > self.reserved.top {
            self.grew = true;
        }
    }

    /// Requires at least the given bottom margin.
    pub fn ensure_bottom(&mut self, px: f64) {
        let px = px.ceil() as i32;
        if px > self.margins.bottom {
            self.margins.bottom = px;
        }
        if px > self.reserved.bottom {
            self.grew = true;
        }
    }

    pub(crate) fn push_note(&mut self, rect: Rect, note: Note) {
        if !self.probe {
            self.pending_notes.push(PendingNote { rect, note });
        }
    }

    pub(crate) fn take_notes(&mut self) -> Vec<PendingNote> {
        std::mem::take(&mut self.pending_notes)
    }
}

/// Resolves a fragment and returns its extent in pixels, without painting.
pub fn measure_fragment(ctx: &Context, fragment: &Fragment) -> Result<Rect> {
    let mut arena = LayoutArena::new(fragment.node_count());
    let root = resolve::resolve_fragment(ctx, fragment, &mut arena)?;
    Ok(Rect::new(0.0, 0.0, root.w, root.h))
}

/// Renders a fragment onto a canvas, with its content top left at `(x, y)`.
///
/// Returns the hit-test rectangles of the top-level groups, in the canvas
/// coordinate system.
pub fn render_fragment(
    ctx: &Context,
    fragment: &Fragment,
    canvas: &mut Canvas,
    x: f64,
    y: f64,
) -> Result<Vec<Rect>> {
    let mut arena = LayoutArena::new(fragment.node_count());
    let root = resolve::resolve_fragment(ctx, fragment, &mut arena)?;
    let (scratch, rects, margins) = render::render_to_canvas(ctx, fragment, &arena, root)?;

    canvas.blit(
        &scratch,
        (x - f64::from(margins.left)).round() as i32,
        (y - f64::from(margins.top)).round() as i32,
    );

    Ok(rects
        .into_iter()
        .map(|r| r.translated(x - f64::from(margins.left), y - f64::from(margins.top)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::mock::MockSource;
    use crate::tree::{Fragment, Group, NamedGlyph, Op, Seq};

    fn ctx(source: &MockSource) -> Context {
        Context::new(source, Settings::default())
    }

    #[test]
    fn empty_fragment_has_zero_extent() {
        let source = MockSource;
        let ctx = ctx(&source);
        let fragment = Fragment::default();
        let rect = measure_fragment(&ctx, &fragment).unwrap();
        assert_eq!(rect.w, 0.0);
        assert_eq!(rect.h, 0.0);
    }

    #[test]
    fn ambient_switch_folding() {
        let fragment = Fragment::default();
        let ambient = Ambient::for_fragment(&fragment);
        assert_eq!(ambient.sep, 1.0);
        assert!(!ambient.fit);

        let switch = Switch {
            sep: Some(2.0),
            ..Switch::default()
        };
        let inner = ambient.with_switch(&switch);
        assert_eq!(inner.sep, 2.0);
        assert_eq!(inner.color, ambient.color);
    }

    #[test]
    fn margins_grow_monotonically() {
        let settings = Settings::default();
        let mut env = Environment::new(&settings, Direction::HorizontalLr, Margins::uniform(2));
        env.ensure_top(5.0);
        env.ensure_top(3.0);
        assert_eq!(env.margins().top, 5);
        assert!(env.grew());

        let mut env = Environment::new(&settings, Direction::HorizontalLr, Margins::uniform(8));
        env.ensure_top(5.0);
        assert!(!env.grew());
        assert_eq!(env.margins().top, 8);
    }

    #[test]
    fn measure_two_glyph_row() {
        let source = MockSource;
        let ctx = ctx(&source);
        let mut fragment = Fragment::with_sequence(Seq::new(
            vec![
                Group::Glyph(NamedGlyph::new("A1")),
                Group::Glyph(NamedGlyph::new("D21")),
            ],
            vec![Op::plain()],
            vec![Switch::default()],
        ));
        fragment.assign_ids();

        // A1 is 27x36, D21 is 36x13 at a 36px em; the gap is one separation
        // unit wide.
        let rect = measure_fragment(&ctx, &fragment).unwrap();
        let gap = ctx.settings.op_sep_px();
        assert!((rect.w - (27.0 + gap + 36.0)).abs() <= 1.0);
        assert!((rect.h - 36.0).abs() <= 1.0);
    }
}
