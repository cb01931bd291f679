//! The layout tree.
//!
//! A [`Fragment`] is one inscription, already decoded by one of the external
//! front ends. The engine never validates structural well-formedness (that
//! is a front-end guarantee); it only reads the tree, resolves sizes into a
//! separate arena and paints. The tree itself stays immutable during a
//! render.
//!
//! Every group and operator carries a [`NodeId`], assigned in preorder by
//! [`Fragment::assign_ids`]. Front ends call it once after building or
//! editing a tree; the id keys the per-node layout-result arena.

use crate::surface::Color;

/// Index of a node in the layout-result arena.
pub type NodeId = usize;

/// Writing direction of a fragment or box interior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Signs in a row, reading left to right.
    HorizontalLr,

    /// Signs in a row, reading right to left.
    HorizontalRl,

    /// Signs in a column, columns advancing left to right.
    VerticalLr,

    /// Signs in a column, columns advancing right to left.
    VerticalRl,
}

impl Direction {
    /// Returns true for the two row directions.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::HorizontalLr | Direction::HorizontalRl)
    }

    /// Returns true for right-to-left reading order.
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::HorizontalRl | Direction::VerticalRl)
    }
}

/// An annotation attached to a glyph or box, placed at render time.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    /// The annotation text.
    pub text: String,

    /// Color override for the annotation.
    pub color: Option<Color>,
}

/// A sparse bag of inheritable property overrides.
///
/// A switch shadows the ambient defaults from its position downward. A
/// switch at the end of a nested range back-propagates onto the next
/// sibling's leading position (see [`Group::trailing_switch`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Switch {
    /// Ink color.
    pub color: Option<Color>,

    /// Whether groups are shaded by default.
    pub shade: Option<bool>,

    /// Separation factor between sibling groups.
    pub sep: Option<f64>,

    /// Whether operators compute their separation by pixel fitting.
    pub fit: Option<bool>,

    /// Whether glyphs are mirrored.
    pub mirror: Option<bool>,
}

impl Switch {
    /// Returns true if the switch overrides nothing.
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.shade.is_none()
            && self.sep.is_none()
            && self.fit.is_none()
            && self.mirror.is_none()
    }

    /// Folds another switch on top of this one; the other one wins.
    pub fn join(&self, other: &Switch) -> Switch {
        Switch {
            color: other.color.or(self.color),
            shade: other.shade.or(self.shade),
            sep: other.sep.or(self.sep),
            fit: other.fit.or(self.fit),
            mirror: other.mirror.or(self.mirror),
        }
    }
}

/// Forced-size request carried by an operator.
///
/// Only meaningful on the first operator of a sequence, where it overrides
/// the nominal unit for all the sequence's groups.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SizeReq {
    /// No request; the ambient unit applies.
    None,

    /// Fit within the given multiple of the em.
    Finite(f64),

    /// No size constraint at all; groups keep their natural size.
    Infinite,
}

/// A separator between two sibling groups of a sequence.
#[derive(Clone, Debug)]
pub struct Op {
    /// Arena index.
    pub id: NodeId,

    /// Explicit separation factor, overriding the ambient one.
    pub sep: Option<f64>,

    /// Whether separation is computed by pixel fitting.
    pub fit: Option<bool>,

    /// Forced-size request for the sequence.
    pub size: SizeReq,

    /// A fixed gap is never stretched to absorb surplus space.
    pub fix: bool,

    /// Shading pattern codes applying to the gap.
    pub shades: Vec<String>,
}

impl Op {
    /// An operator with no explicit settings.
    pub fn plain() -> Op {
        Op {
            id: 0,
            sep: None,
            fit: None,
            size: SizeReq::None,
            fix: false,
            shades: Vec::new(),
        }
    }
}

/// Shading request of a glyph or box.
#[derive(Clone, Debug, PartialEq)]
pub enum Shading {
    /// Inherit the ambient shade default.
    Unspecified,

    /// Shade the whole rectangle.
    On,

    /// Never shade, regardless of the ambient default.
    Off,

    /// Shade the quadrants selected by halving instructions.
    ///
    /// Each pattern is a string over `t`, `b`, `s`, `e`, each halving the
    /// rectangle (top, bottom, start, end) before the next is applied.
    Patterns(Vec<String>),
}

/// N groups interleaved with N-1 operators and N-1 switches.
#[derive(Clone, Debug)]
pub struct Seq {
    /// The groups of the sequence, two or more for a proper sequence.
    pub groups: Vec<Group>,

    /// The operators between consecutive groups.
    pub ops: Vec<Op>,

    /// The switches taking effect after each operator.
    pub switches: Vec<Switch>,
}

impl Seq {
    /// Builds a sequence, checking the interleaving arity.
    pub fn new(groups: Vec<Group>, ops: Vec<Op>, switches: Vec<Switch>) -> Seq {
        debug_assert_eq!(ops.len() + 1, groups.len());
        debug_assert_eq!(switches.len(), ops.len());
        Seq {
            groups,
            ops,
            switches,
        }
    }

    /// A sequence holding a single group.
    pub fn single(group: Group) -> Seq {
        Seq {
            groups: vec![group],
            ops: Vec::new(),
            switches: Vec::new(),
        }
    }
}

/// A child of a horizontal or vertical group, with its override-bag pair.
#[derive(Clone, Debug)]
pub struct Wrapped {
    /// Switch taking effect before the child.
    pub lead: Switch,

    /// The child itself.
    pub group: Group,

    /// Switch taking effect after the child.
    pub trail: Switch,
}

impl Wrapped {
    /// Wraps a group with empty switches.
    pub fn plain(group: Group) -> Wrapped {
        Wrapped {
            lead: Switch::default(),
            group,
            trail: Switch::default(),
        }
    }
}

/// A row of two or more children composed side by side.
#[derive(Clone, Debug)]
pub struct HorizontalGroup {
    /// Arena index.
    pub id: NodeId,

    /// The children, in reading order.
    pub children: Vec<Wrapped>,
}

/// A column of two or more children stacked on top of each other.
#[derive(Clone, Debug)]
pub struct VerticalGroup {
    /// Arena index.
    pub id: NodeId,

    /// The children, top to bottom.
    pub children: Vec<Wrapped>,
}

/// A leaf sign, identified by name and resolved by the glyph provider.
#[derive(Clone, Debug)]
pub struct NamedGlyph {
    /// Arena index.
    pub id: NodeId,

    /// Symbolic sign name (Gardiner code or mnemonic).
    pub name: String,

    /// Mirror the sign around its vertical axis.
    pub mirror: bool,

    /// Clockwise rotation in degrees.
    pub rotate: u16,

    /// Horizontal stretch factor.
    pub xscale: f64,

    /// Vertical stretch factor.
    pub yscale: f64,

    /// Uniform explicit scale.
    pub scale: f64,

    /// Ink color override.
    pub color: Option<Color>,

    /// Shading request.
    pub shade: Shading,

    /// Attached notes, in order.
    pub notes: Vec<Note>,
}

impl NamedGlyph {
    /// A plain sign with default attributes.
    pub fn new(name: &str) -> NamedGlyph {
        NamedGlyph {
            id: 0,
            name: name.to_string(),
            mirror: false,
            rotate: 0,
            xscale: 1.0,
            yscale: 1.0,
            scale: 1.0,
            color: None,
            shade: Shading::Unspecified,
            notes: Vec::new(),
        }
    }
}

/// An invisible leaf of explicit size, optionally framed.
#[derive(Clone, Debug)]
pub struct EmptyGlyph {
    /// Arena index.
    pub id: NodeId,

    /// Width in ems.
    pub width: f64,

    /// Height in ems.
    pub height: f64,

    /// Draw a visible frame around the empty area.
    pub frame: bool,

    /// Shading request.
    pub shade: Shading,

    /// An optional note.
    pub note: Option<Note>,
}

/// The four separations of a box interior.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoxSeps {
    /// Separation after the opening glyph.
    pub open: Option<f64>,

    /// Separation before the closing glyph.
    pub close: Option<f64>,

    /// Separation below the contents.
    pub under: Option<f64>,

    /// Separation above the contents.
    pub over: Option<f64>,
}

/// A cartouche-like enclosure around an inner sequence.
#[derive(Clone, Debug)]
pub struct BoxGroup {
    /// Arena index.
    pub id: NodeId,

    /// Key naming the open/segment/close glyph triple (e.g. `cartouche`).
    pub kind: String,

    /// Direction override for the interior.
    pub direction: Option<Direction>,

    /// Mirror the whole box.
    pub mirror: bool,

    /// Uniform explicit scale.
    pub scale: f64,

    /// Ink color override.
    pub color: Option<Color>,

    /// Shading request.
    pub shade: Shading,

    /// Size multiplier of the frame glyphs.
    pub size: f64,

    /// The four interior separations.
    pub sep: BoxSeps,

    /// Inner sequence, absent for an empty box.
    pub inner: Option<Seq>,

    /// Trailing notes.
    pub notes: Vec<Note>,
}

impl BoxGroup {
    /// A plain box of the given kind around a sequence.
    pub fn new(kind: &str, inner: Option<Seq>) -> BoxGroup {
        BoxGroup {
            id: 0,
            kind: kind.to_string(),
            direction: None,
            mirror: false,
            scale: 1.0,
            color: None,
            shade: Shading::Unspecified,
            size: 1.0,
            sep: BoxSeps::default(),
            inner,
            notes: Vec::new(),
        }
    }
}

/// Which child of a stack cuts out the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackClip {
    /// The second child lies on top and cuts a halo into the first.
    On,

    /// The second child lies underneath and is cut by the first.
    Under,
}

/// Two children overlaid with an anchor offset.
#[derive(Clone, Debug)]
pub struct StackGroup {
    /// Arena index.
    pub id: NodeId,

    /// Horizontal anchor fraction in [0, 1].
    pub x: f64,

    /// Vertical anchor fraction in [0, 1].
    pub y: f64,

    /// Clip order.
    pub clip: StackClip,

    /// The base child.
    pub first: Box<Wrapped>,

    /// The overlaid child.
    pub second: Box<Wrapped>,
}

/// Place codes for a decorative insertion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Place {
    /// Centered against the top edge.
    Top,

    /// Centered against the bottom edge.
    Bottom,

    /// Centered against the leading edge.
    Start,

    /// Centered against the trailing edge.
    End,

    /// Top leading corner.
    TopStart,

    /// Top trailing corner.
    TopEnd,

    /// Bottom leading corner.
    BottomStart,

    /// Bottom trailing corner.
    BottomEnd,

    /// Free floating; the placement search also optimizes the anchor.
    Free,
}

impl Place {
    /// The anchor fractions this place code pins, if any.
    pub fn anchor(self) -> Option<(f64, f64)> {
        match self {
            Place::Top => Some((0.5, 0.0)),
            Place::Bottom => Some((0.5, 1.0)),
            Place::Start => Some((0.0, 0.5)),
            Place::End => Some((1.0, 0.5)),
            Place::TopStart => Some((0.0, 0.0)),
            Place::TopEnd => Some((1.0, 0.0)),
            Place::BottomStart => Some((0.0, 1.0)),
            Place::BottomEnd => Some((1.0, 1.0)),
            Place::Free => None,
        }
    }
}

/// A host child with a decorative second child fitted into its whitespace.
#[derive(Clone, Debug)]
pub struct InsertGroup {
    /// Arena index.
    pub id: NodeId,

    /// Where the secondary goes.
    pub place: Place,

    /// Initial horizontal anchor fraction for free placement.
    pub x: f64,

    /// Initial vertical anchor fraction for free placement.
    pub y: f64,

    /// Keep the secondary at its initial scale, skipping the search.
    pub fix: bool,

    /// Clearance override between host ink and the secondary.
    pub sep: Option<f64>,

    /// The host child.
    pub first: Box<Wrapped>,

    /// The decorative child.
    pub second: Box<Wrapped>,
}

/// A single child resized and offset within ghost margins.
#[derive(Clone, Debug)]
pub struct ModifyGroup {
    /// Arena index.
    pub id: NodeId,

    /// Forced width in ems.
    pub width: Option<f64>,

    /// Forced height in ems.
    pub height: Option<f64>,

    /// Ghost margin above, as a fraction of the child height.
    pub above: f64,

    /// Ghost margin below, as a fraction of the child height.
    pub below: f64,

    /// Ghost margin before, as a fraction of the child width.
    pub before: f64,

    /// Ghost margin after, as a fraction of the child width.
    pub after: f64,

    /// Clip ink to the core slot, omitting whatever lands in the ghosts.
    pub omit: bool,

    /// The child.
    pub child: Box<Wrapped>,
}

/// Any composable layout unit.
#[derive(Clone, Debug)]
pub enum Group {
    /// A row of groups.
    Horizontal(HorizontalGroup),

    /// A column of groups.
    Vertical(VerticalGroup),

    /// A named sign.
    Glyph(NamedGlyph),

    /// An empty area.
    Blank(EmptyGlyph),

    /// An enclosure.
    Boxed(BoxGroup),

    /// An overlay.
    Stack(StackGroup),

    /// A decorative insertion.
    Insert(InsertGroup),

    /// A resized and offset child.
    Modify(ModifyGroup),
}

impl Group {
    /// Arena index of this group.
    pub fn id(&self) -> NodeId {
        match self {
            Group::Horizontal(g) => g.id,
            Group::Vertical(g) => g.id,
            Group::Glyph(g) => g.id,
            Group::Blank(g) => g.id,
            Group::Boxed(g) => g.id,
            Group::Stack(g) => g.id,
            Group::Insert(g) => g.id,
            Group::Modify(g) => g.id,
        }
    }

    /// The switch a group carries at its very end.
    ///
    /// A switch closing a nested range applies to whatever follows the
    /// range, so it is folded onto the leading position of the next sibling.
    /// Enclosures bound propagation: nothing escapes a box, stack, insert or
    /// leaf.
    pub fn trailing_switch(&self) -> Switch {
        match self {
            Group::Horizontal(g) => trailing_of(&g.children),
            Group::Vertical(g) => trailing_of(&g.children),
            Group::Modify(g) => g.child.trail.join(&g.child.group.trailing_switch()),
            _ => Switch::default(),
        }
    }
}

fn trailing_of(children: &[Wrapped]) -> Switch {
    match children.last() {
        Some(last) => last.group.trailing_switch().join(&last.trail),
        None => Switch::default(),
    }
}

/// The root of one inscription.
#[derive(Clone, Debug, Default)]
pub struct Fragment {
    /// Explicit direction, defaulting to horizontal left-to-right.
    pub direction: Option<Direction>,

    /// Explicit nominal unit size, in ems.
    pub unit: Option<f64>,

    /// Fragment-wide default overrides.
    pub defaults: Switch,

    /// The top sequence, absent for an empty fragment.
    pub sequence: Option<Seq>,
}

impl Fragment {
    /// A fragment holding the given sequence with default settings.
    pub fn with_sequence(sequence: Seq) -> Fragment {
        Fragment {
            direction: None,
            unit: None,
            defaults: Switch::default(),
            sequence: Some(sequence),
        }
    }

    /// Assigns preorder arena indices to every group and operator.
    ///
    /// Must be called once after building or structurally editing the tree,
    /// before any layout pass. Returns the number of nodes.
    pub fn assign_ids(&mut self) -> usize {
        let mut next = 0;
        if let Some(seq) = &mut self.sequence {
            assign_seq(seq, &mut next);
        }
        next
    }

    /// The number of nodes, as assigned by the last [`Fragment::assign_ids`].
    pub fn node_count(&self) -> usize {
        let mut max = 0;
        if let Some(seq) = &self.sequence {
            count_seq(seq, &mut max);
        }
        max
    }
}

fn assign_seq(seq: &mut Seq, next: &mut usize) {
    for group in &mut seq.groups {
        assign_group(group, next);
    }
    for op in &mut seq.ops {
        op.id = take(next);
    }
}

fn take(next: &mut usize) -> usize {
    let id = *next;
    *next += 1;
    id
}

fn assign_group(group: &mut Group, next: &mut usize) {
    match group {
        Group::Horizontal(g) => {
            g.id = take(next);
            for child in &mut g.children {
                assign_group(&mut child.group, next);
            }
        }
        Group::Vertical(g) => {
            g.id = take(next);
            for child in &mut g.children {
                assign_group(&mut child.group, next);
            }
        }
        Group::Glyph(g) => g.id = take(next),
        Group::Blank(g) => g.id = take(next),
        Group::Boxed(g) => {
            g.id = take(next);
            if let Some(inner) = &mut g.inner {
                assign_seq(inner, next);
            }
        }
        Group::Stack(g) => {
            g.id = take(next);
            assign_group(&mut g.first.group, next);
            assign_group(&mut g.second.group, next);
        }
        Group::Insert(g) => {
            g.id = take(next);
            assign_group(&mut g.first.group, next);
            assign_group(&mut g.second.group, next);
        }
        Group::Modify(g) => {
            g.id = take(next);
            assign_group(&mut g.child.group, next);
        }
    }
}

fn count_seq(seq: &Seq, max: &mut usize) {
    for group in &seq.groups {
        count_group(group, max);
    }
    for op in &seq.ops {
        *max = (*max).max(op.id + 1);
    }
}

fn count_group(group: &Group, max: &mut usize) {
    *max = (*max).max(group.id() + 1);
    match group {
        Group::Horizontal(g) => {
            for child in &g.children {
                count_group(&child.group, max);
            }
        }
        Group::Vertical(g) => {
            for child in &g.children {
                count_group(&child.group, max);
            }
        }
        Group::Boxed(g) => {
            if let Some(inner) = &g.inner {
                count_seq(inner, max);
            }
        }
        Group::Stack(g) => {
            count_group(&g.first.group, max);
            count_group(&g.second.group, max);
        }
        Group::Insert(g) => {
            count_group(&g.first.group, max);
            count_group(&g.second.group, max);
        }
        Group::Modify(g) => count_group(&g.child.group, max),
        Group::Glyph(_) | Group::Blank(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_glyph_seq() -> Seq {
        Seq::new(
            vec![
                Group::Glyph(NamedGlyph::new("A1")),
                Group::Glyph(NamedGlyph::new("D21")),
            ],
            vec![Op::plain()],
            vec![Switch::default()],
        )
    }

    #[test]
    fn ids_are_dense_preorder() {
        let mut fragment = Fragment::with_sequence(two_glyph_seq());
        let count = fragment.assign_ids();
        assert_eq!(count, 3);
        assert_eq!(fragment.node_count(), 3);

        let seq = fragment.sequence.as_ref().unwrap();
        assert_eq!(seq.groups[0].id(), 0);
        assert_eq!(seq.groups[1].id(), 1);
        assert_eq!(seq.ops[0].id, 2);
    }

    #[test]
    fn switch_join_prefers_latest() {
        let older = Switch {
            sep: Some(1.0),
            fit: Some(false),
            ..Switch::default()
        };
        let newer = Switch {
            sep: Some(2.0),
            ..Switch::default()
        };
        let joined = older.join(&newer);
        assert_eq!(joined.sep, Some(2.0));
        assert_eq!(joined.fit, Some(false));
    }

    #[test]
    fn trailing_switch_escapes_nested_groups() {
        let inner = Group::Vertical(VerticalGroup {
            id: 0,
            children: vec![
                Wrapped::plain(Group::Glyph(NamedGlyph::new("A1"))),
                Wrapped {
                    lead: Switch::default(),
                    group: Group::Glyph(NamedGlyph::new("D21")),
                    trail: Switch {
                        sep: Some(0.0),
                        ..Switch::default()
                    },
                },
            ],
        });
        assert_eq!(inner.trailing_switch().sep, Some(0.0));

        let boxed = Group::Boxed(BoxGroup::new("cartouche", Some(Seq::single(inner))));
        assert!(boxed.trailing_switch().is_empty());
    }
}
