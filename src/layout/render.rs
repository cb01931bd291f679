//! The render pass.
//!
//! Walks the tree top-down with an accumulated target rectangle in
//! fragment coordinates and paints through the glyph provider. Ink that
//! falls outside the reserved margins (notes, mostly) grows the margins
//! and the whole pass restarts on a fresh canvas; margins only ever grow,
//! so the retry loop terminates.

use crate::fonts::GlyphStyle;
use crate::geometry::Rect;
use crate::layout::resolve::{
    box_part, box_sep, box_style, forced_direction, glyph_style, hv_gap, pair_ambients,
};
use crate::layout::shade::frame_slices;
use crate::layout::silhouette;
use crate::layout::{Ambient, Context, Environment, LayoutArena, Margins, Resolved};
use crate::surface::{AlphaGrid, Canvas, Color};
use crate::tree::{
    BoxGroup, Fragment, Group, InsertGroup, ModifyGroup, Seq, Shading, StackClip, StackGroup,
    Wrapped,
};
use crate::Result;

/// The canvas origin in fragment coordinates.
type Origin = (f64, f64);

fn local(rect: &Rect, origin: Origin) -> Rect {
    rect.translated(-origin.0, -origin.1)
}

/// Renders a resolved fragment onto its own canvas.
///
/// Returns the canvas, the hit-test rectangles of the top-level groups in
/// fragment coordinates, and the margins the content ended up needing.
pub(crate) fn render_to_canvas(
    ctx: &Context,
    fragment: &Fragment,
    arena: &LayoutArena,
    root: Resolved,
) -> Result<(Canvas, Vec<Rect>, Margins)> {
    let ambient = Ambient::for_fragment(fragment);
    let mut margins = Margins::uniform(ctx.settings.margin_px as i32);
    let mut attempt = 0;

    loop {
        let mut env = Environment::new(&ctx.settings, ambient.direction, margins);
        let width = (root.w.ceil() as i32 + margins.horizontal()).max(1) as u32;
        let height = (root.h.ceil() as i32 + margins.vertical()).max(1) as u32;
        let mut canvas = Canvas::new(width, height)?;
        let origin = (-f64::from(margins.left), -f64::from(margins.top));

        let content = Rect::new(0.0, 0.0, root.w, root.h);
        let rects = match &fragment.sequence {
            Some(seq) => render_seq(ctx, &mut env, arena, &mut canvas, origin, seq, &content, &ambient)?,
            None => Vec::new(),
        };

        env.shade
            .paint(&mut canvas, -origin.0, -origin.1, Color::SHADE);
        place_notes(ctx, &mut env, &mut canvas, origin, &ambient, &content)?;

        // Margins only grow and are whole pixels, so the loop reaches a
        // fixed point; the cap only guards against a runaway provider.
        if !env.grew() || attempt >= 32 {
            if env.grew() {
                warn!("margins still growing after {} retries; accepting clipped ink", attempt);
            }
            return Ok((canvas, rects, margins));
        }

        margins = env.margins();
        attempt += 1;
    }
}

/// Renders a group into a blank canvas of the given extent and reads back
/// its ink coverage.
pub(crate) fn probe_group(
    ctx: &Context,
    arena: &LayoutArena,
    group: &Group,
    ambient: &Ambient,
    w: f64,
    h: f64,
) -> Result<AlphaGrid> {
    let width = (w.ceil() as i64).max(1) as u32;
    let height = (h.ceil() as i64).max(1) as u32;
    let mut canvas = Canvas::new(width, height)?;
    let mut env = Environment::probe(&ctx.settings, ambient.direction);

    let r = arena.get(group.id());
    let rect = Rect::new(0.0, 0.0, w, h).center(r.w, r.h);
    render_group(ctx, &mut env, arena, &mut canvas, (0.0, 0.0), group, &rect, ambient)?;

    Ok(canvas.ink())
}

/// Renders a sequence into a target rectangle, stretching non-fixed gaps
/// to absorb any surplus space.
#[allow(clippy::too_many_arguments)]
fn render_seq(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    seq: &Seq,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<Vec<Rect>> {
    let horizontal = ambient.direction.is_horizontal();
    let reversed = horizontal && ambient.direction.is_reversed();
    let (group_amb, op_amb) = super::seq_ambients(seq, ambient);

    let mut natural = 0.0;
    for group in &seq.groups {
        natural += arena.get(group.id()).extent(horizontal);
    }
    for op in &seq.ops {
        natural += arena.get(op.id).w;
    }

    let target = if horizontal { rect.w } else { rect.h };
    // Surplus or deficit is absorbed by the stretchable gaps; fixed gaps
    // never move.
    let stretchable = seq.ops.iter().filter(|op| !op.fix).count();
    let extra = if stretchable > 0 {
        (target - natural) / stretchable as f64
    } else {
        0.0
    };

    let mut rects = Vec::with_capacity(seq.groups.len());
    let mut offset = 0.0;

    for (i, group) in seq.groups.iter().enumerate() {
        let r = arena.get(group.id());
        let len = r.extent(horizontal);
        let slice = place_slice(rect, offset, len, horizontal, reversed);
        let target_rect = slice.center(r.w, r.h);

        render_group(ctx, env, arena, canvas, origin, group, &target_rect, &group_amb[i])?;
        rects.push(target_rect);
        offset += len;

        if i < seq.ops.len() {
            let op = &seq.ops[i];
            let mut gap = arena.get(op.id).w;
            if !op.fix {
                gap += extra;
            }

            if !env.probe && !op.shades.is_empty() && gap > 0.0 {
                let gap_rect = place_slice(rect, offset, gap, horizontal, reversed);
                env.shade.apply(
                    &gap_rect,
                    &Shading::Patterns(op.shades.clone()),
                    op_amb[i].shade,
                    ambient.direction,
                    ambient.mirror,
                );
            }

            offset += gap;
        }
    }

    Ok(rects)
}

/// The slice of a sequence rectangle at a main-axis offset.
fn place_slice(rect: &Rect, offset: f64, len: f64, horizontal: bool, reversed: bool) -> Rect {
    if horizontal {
        let x = if reversed {
            rect.x_max() - offset - len
        } else {
            rect.x + offset
        };
        Rect::new(x, rect.y, len, rect.h)
    } else {
        let y = if reversed {
            rect.y_max() - offset - len
        } else {
            rect.y + offset
        };
        Rect::new(rect.x, y, rect.w, len)
    }
}

/// Paints one group into its target rectangle.
#[allow(clippy::too_many_arguments)]
fn render_group(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    group: &Group,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<()> {
    match group {
        Group::Glyph(g) => {
            let r = arena.get(g.id);
            let style = glyph_style(ctx, g, ambient, r.scale, env.mirror);
            let color = g.color.unwrap_or(ambient.color);
            let l = local(rect, origin);

            ctx.source.paint(
                canvas,
                l.x,
                l.y,
                &Rect::new(0.0, 0.0, r.w, r.h),
                &g.name,
                &style,
                color,
            )?;

            if !env.probe {
                env.shade
                    .apply(rect, &g.shade, ambient.shade, ambient.direction, ambient.mirror);
                for note in &g.notes {
                    env.push_note(*rect, note.clone());
                }
            }
        }

        Group::Blank(g) => {
            if g.frame {
                canvas.frame_rect(&local(rect, origin), ambient.color, 1.0);
            }
            if !env.probe {
                env.shade
                    .apply(rect, &g.shade, ambient.shade, ambient.direction, ambient.mirror);
                if let Some(note) = &g.note {
                    env.push_note(*rect, note.clone());
                }
            }
        }

        Group::Horizontal(g) => {
            render_row(ctx, env, arena, canvas, origin, &g.children, rect, ambient, true)?;
        }

        Group::Vertical(g) => {
            render_row(ctx, env, arena, canvas, origin, &g.children, rect, ambient, false)?;
        }

        Group::Boxed(g) => render_box(ctx, env, arena, canvas, origin, g, rect, ambient)?,
        Group::Stack(g) => render_stack(ctx, env, arena, canvas, origin, g, rect, ambient)?,
        Group::Insert(g) => render_insert(ctx, env, arena, canvas, origin, g, rect, ambient)?,
        Group::Modify(g) => render_modify(ctx, env, arena, canvas, origin, g, rect, ambient)?,
    }

    Ok(())
}

/// Paints the children of a row or column, recomputing the same gaps the
/// resolution pass measured.
#[allow(clippy::too_many_arguments)]
fn render_row(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    children: &[Wrapped],
    rect: &Rect,
    ambient: &Ambient,
    horizontal: bool,
) -> Result<()> {
    let direction = forced_direction(ambient.direction, horizontal);
    let reversed = horizontal && direction.is_reversed();

    let mut current = ambient.clone();
    current.direction = direction;

    let mut ambients = Vec::with_capacity(children.len());
    for child in children {
        let amb = current.with_switch(&child.lead);
        current = amb
            .with_switch(&child.group.trailing_switch())
            .with_switch(&child.trail);
        ambients.push(amb);
    }

    let mut offset = 0.0;
    for (i, child) in children.iter().enumerate() {
        let r = arena.get(child.group.id());
        let len = r.extent(horizontal);
        let slice = place_slice(rect, offset, len, horizontal, reversed);
        let target = slice.center(r.w, r.h);

        render_group(ctx, env, arena, canvas, origin, &child.group, &target, &ambients[i])?;
        offset += len;

        if i + 1 < children.len() {
            offset += hv_gap(
                ctx,
                arena,
                &child.group,
                &children[i + 1].group,
                ambients[i + 1].sep,
                horizontal,
            );
        }
    }

    Ok(())
}

/// Paints a box: the open and close glyphs at the ends, segment glyphs
/// tiled across the span between them, and the interior sequence inside
/// the four separations.
#[allow(clippy::too_many_arguments)]
fn render_box(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    group: &BoxGroup,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<()> {
    let r = arena.get(group.id);
    let s2 = r.scale * group.scale;
    let direction = group.direction.unwrap_or(ambient.direction);
    let style = box_style(ctx, group, ambient, r.scale, env.mirror);
    let color = group.color.unwrap_or(ambient.color);

    let open_name = box_part(&group.kind, "open");
    let close_name = box_part(&group.kind, "close");
    let segment_name = box_part(&group.kind, "segment");

    let open = ctx.source.measure(&open_name, &style)?;
    let close = ctx.source.measure(&close_name, &style)?;
    let segment = ctx.source.measure(&segment_name, &style)?;

    let sep_open = box_sep(ctx, group.sep.open, s2);
    let sep_close = box_sep(ctx, group.sep.close, s2);
    let sep_under = box_sep(ctx, group.sep.under, s2);
    let sep_over = box_sep(ctx, group.sep.over, s2);

    let l = local(rect, origin);
    let open_at_end = direction.is_horizontal() && direction.is_reversed();

    let interior = if direction.is_horizontal() {
        let (lead_w, trail_w) = if open_at_end {
            (close.w + sep_close, open.w + sep_open)
        } else {
            (open.w + sep_open, close.w + sep_close)
        };
        rect.inset(lead_w, trail_w, sep_over, sep_under)
    } else {
        rect.inset(sep_over, sep_under, open.h + sep_open, close.h + sep_close)
    };

    if direction.is_horizontal() {
        let open_x = if open_at_end { l.x_max() - open.w } else { l.x };
        let close_x = if open_at_end { l.x } else { l.x_max() - close.w };

        ctx.source
            .paint(canvas, open_x, l.y + (l.h - open.h) / 2.0, &open, &open_name, &style, color)?;
        ctx.source.paint(
            canvas,
            close_x,
            l.y + (l.h - close.h) / 2.0,
            &close,
            &close_name,
            &style,
            color,
        )?;

        let span_x0 = l.x + if open_at_end { close.w } else { open.w };
        let span_x1 = l.x_max() - if open_at_end { open.w } else { close.w };
        tile_segments(
            ctx,
            canvas,
            &segment,
            &segment_name,
            &style,
            color,
            span_x0,
            span_x1,
            l.y + (l.h - segment.h) / 2.0,
            true,
        )?;
    } else {
        ctx.source
            .paint(canvas, l.x + (l.w - open.w) / 2.0, l.y, &open, &open_name, &style, color)?;
        ctx.source.paint(
            canvas,
            l.x + (l.w - close.w) / 2.0,
            l.y_max() - close.h,
            &close,
            &close_name,
            &style,
            color,
        )?;

        tile_segments(
            ctx,
            canvas,
            &segment,
            &segment_name,
            &style,
            color,
            l.y + open.h,
            l.y_max() - close.h,
            l.x + (l.w - segment.w) / 2.0,
            false,
        )?;
    }

    if let Some(seq) = &group.inner {
        let mut inner = ambient.clone();
        inner.direction = direction;
        inner.mirror ^= group.mirror;
        if let Some(color) = group.color {
            inner.color = color;
        }
        render_seq(ctx, env, arena, canvas, origin, seq, &interior, &inner)?;
    }

    if !env.probe {
        match &group.shade {
            Shading::Patterns(_) => {
                env.shade
                    .apply(rect, &group.shade, ambient.shade, direction, ambient.mirror);
            }
            _ => {
                for slice in frame_slices(rect, &interior).iter() {
                    env.shade
                        .apply(slice, &group.shade, ambient.shade, direction, ambient.mirror);
                }
            }
        }
        for note in &group.notes {
            env.push_note(*rect, note.clone());
        }
    }

    Ok(())
}

/// Tiles segment glyphs over a span, overlapping each joint and clipping
/// the final tile to the span end.
///
/// A span shorter than one whole segment gets none at all.
#[allow(clippy::too_many_arguments)]
fn tile_segments(
    ctx: &Context,
    canvas: &mut Canvas,
    segment: &Rect,
    name: &str,
    style: &GlyphStyle,
    color: Color,
    span_start: f64,
    span_end: f64,
    cross: f64,
    horizontal: bool,
) -> Result<()> {
    let step = if horizontal { segment.w } else { segment.h };
    let overlap = ctx.settings.segment_overlap_px;
    let advance = step - overlap;

    if span_end - span_start < step || advance <= 0.5 || step <= 0.0 {
        return Ok(());
    }

    let mut at = span_start - overlap;
    while at + step <= span_end + overlap {
        let (x, y) = if horizontal { (at, cross) } else { (cross, at) };
        ctx.source.paint(canvas, x, y, segment, name, style, color)?;
        at += advance;
    }

    // A trailing remainder gets one more tile, clipped to the span end.
    if at < span_end - 0.5 {
        let remain = span_end - at;
        let (cw, ch) = if horizontal {
            (remain, segment.h)
        } else {
            (segment.w, remain)
        };
        let mut scratch = Canvas::new((cw.ceil() as i64).max(1) as u32, (ch.ceil() as i64).max(1) as u32)?;
        ctx.source.paint(&mut scratch, 0.0, 0.0, segment, name, style, color)?;
        let (x, y) = if horizontal { (at, cross) } else { (cross, at) };
        canvas.blit(&scratch, x.round() as i32, y.round() as i32);
    }

    Ok(())
}

/// Paints a stack: both children go onto scratch canvases, then the
/// covered child is blitted through the external-pixel mask of the
/// covering one, and the covering child is blitted whole on top.
#[allow(clippy::too_many_arguments)]
fn render_stack(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    group: &StackGroup,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<()> {
    let r = arena.get(group.id);
    let r1 = arena.get(group.first.group.id());
    let r2 = arena.get(group.second.group.id());
    let (a1, a2) = pair_ambients(ambient, &group.first, &group.second);

    let rect1 = Rect::new(rect.x + r1.dx, rect.y + r1.dy, r1.w, r1.h);
    let rect2 = Rect::new(rect.x + r2.dx, rect.y + r2.dy, r2.w, r2.h);

    let width = (r.w.ceil() as i64).max(1) as u32;
    let height = (r.h.ceil() as i64).max(1) as u32;
    let scratch_origin = (rect.x, rect.y);

    let mut first = Canvas::new(width, height)?;
    render_group(ctx, env, arena, &mut first, scratch_origin, &group.first.group, &rect1, &a1)?;

    let mut second = Canvas::new(width, height)?;
    render_group(ctx, env, arena, &mut second, scratch_origin, &group.second.group, &rect2, &a2)?;

    let (covering, covered) = match group.clip {
        StackClip::On => (&second, &first),
        StackClip::Under => (&first, &second),
    };

    let keep = silhouette::external(&covering.ink());
    let l = local(rect, origin);
    canvas.blit_masked(covered, l.x.round() as i32, l.y.round() as i32, &keep);
    canvas.blit(covering, l.x.round() as i32, l.y.round() as i32);

    Ok(())
}

/// Paints an insert: the host at its own geometry, the decorative child
/// at the offset the placement search settled on.
#[allow(clippy::too_many_arguments)]
fn render_insert(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    group: &InsertGroup,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<()> {
    let r1 = arena.get(group.first.group.id());
    let r2 = arena.get(group.second.group.id());
    let (a1, a2) = pair_ambients(ambient, &group.first, &group.second);

    let rect1 = Rect::new(rect.x, rect.y, r1.w, r1.h);
    let rect2 = Rect::new(rect.x + r2.dx, rect.y + r2.dy, r2.w, r2.h);

    render_group(ctx, env, arena, canvas, origin, &group.first.group, &rect1, &a1)?;
    render_group(ctx, env, arena, canvas, origin, &group.second.group, &rect2, &a2)?;

    Ok(())
}

/// Paints a modify: the child at its ghost offset, optionally clipped to
/// the core slot.
#[allow(clippy::too_many_arguments)]
fn render_modify(
    ctx: &Context,
    env: &mut Environment,
    arena: &LayoutArena,
    canvas: &mut Canvas,
    origin: Origin,
    group: &ModifyGroup,
    rect: &Rect,
    ambient: &Ambient,
) -> Result<()> {
    let rc = arena.get(group.child.group.id());
    let amb = ambient.with_switch(&group.child.lead);
    let child_rect = Rect::new(rect.x + rc.dx, rect.y + rc.dy, rc.w, rc.h);

    if group.omit {
        let core = rect.inset(
            rc.w * group.before,
            rc.w * group.after,
            rc.h * group.above,
            rc.h * group.below,
        );
        let width = (core.w.ceil() as i64).max(1) as u32;
        let height = (core.h.ceil() as i64).max(1) as u32;
        let mut scratch = Canvas::new(width, height)?;

        render_group(
            ctx,
            env,
            arena,
            &mut scratch,
            (core.x, core.y),
            &group.child.group,
            &child_rect,
            &amb,
        )?;

        let l = local(&core, origin);
        canvas.blit(&scratch, l.x.round() as i32, l.y.round() as i32);
    } else {
        render_group(ctx, env, arena, canvas, origin, &group.child.group, &child_rect, &amb)?;
    }

    Ok(())
}

/// Paints the accumulated notes next to their owners, growing margins
/// where a note falls outside the content area.
fn place_notes(
    ctx: &Context,
    env: &mut Environment,
    canvas: &mut Canvas,
    origin: Origin,
    ambient: &Ambient,
    content: &Rect,
) -> Result<()> {
    let style = GlyphStyle::sized(ctx.settings.note_em * ctx.settings.em_px);
    let horizontal = ambient.direction.is_horizontal();

    let mut last: Option<Rect> = None;
    let mut shift = 0.0;

    for pending in env.take_notes() {
        let m = ctx.source.measure(&pending.note.text, &style)?;

        if last != Some(pending.rect) {
            shift = 0.0;
            last = Some(pending.rect);
        }

        // Above the owner for rows, at the leading side for columns; in
        // right-to-left column flow the leading side is the right one.
        let (x, y) = if horizontal {
            (pending.rect.x, pending.rect.y - 2.0 - m.h - shift)
        } else if ambient.direction.is_reversed() {
            (pending.rect.x_max() + 2.0 + shift, pending.rect.y)
        } else {
            (pending.rect.x - 2.0 - m.w - shift, pending.rect.y)
        };

        if x < 0.0 {
            env.ensure_left(-x);
        }
        if y < 0.0 {
            env.ensure_top(-y);
        }
        if x + m.w > content.w {
            env.ensure_right(x + m.w - content.w);
        }
        if y + m.h > content.h {
            env.ensure_bottom(y + m.h - content.h);
        }

        let color = pending.note.color.unwrap_or(Color::RED);
        ctx.source
            .paint(canvas, x - origin.0, y - origin.1, &m, &pending.note.text, &style, color)?;

        shift += if horizontal { m.h + 2.0 } else { m.w + 2.0 };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::fonts::mock::MockSource;
    use crate::layout::{render_fragment, resolve, Context, LayoutArena};
    use crate::surface::INK;
    use crate::tree::{
        BoxGroup, BoxSeps, Direction, Fragment, Group, NamedGlyph, Note, Op, Seq, StackClip,
        StackGroup, Switch, Wrapped,
    };

    fn render(fragment: &mut Fragment) -> (Canvas, Vec<Rect>) {
        fragment.assign_ids();
        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let margin = f64::from(ctx.settings.margin_px);
        let rect = crate::layout::measure_fragment(&ctx, fragment).unwrap();

        let mut canvas = Canvas::new(
            (rect.w.ceil() + 2.0 * margin + 40.0) as u32,
            (rect.h.ceil() + 2.0 * margin + 40.0) as u32,
        )
        .unwrap();
        let rects = render_fragment(&ctx, fragment, &mut canvas, 20.0, 20.0).unwrap();
        (canvas, rects)
    }

    fn ink_columns(canvas: &Canvas) -> usize {
        let grid = canvas.ink();
        let mut columns = 0;
        for x in 0..grid.width() {
            let mut any = false;
            for y in 0..grid.height() {
                if grid.get(x as i32, y as i32) >= INK {
                    any = true;
                }
            }
            if any {
                columns += 1;
            }
        }
        columns
    }

    #[test]
    fn two_glyph_row_hit_rects() {
        let mut fragment = Fragment::with_sequence(Seq::new(
            vec![
                Group::Glyph(NamedGlyph::new("A1")),
                Group::Glyph(NamedGlyph::new("D21")),
            ],
            vec![Op::plain()],
            vec![Switch::default()],
        ));
        let (_, rects) = render(&mut fragment);

        assert_eq!(rects.len(), 2);
        // A1 is 27x36, D21 is 36x13; the gap is one separation unit.
        let settings = Settings::default();
        let gap = settings.op_sep_px();
        assert!((rects[0].w - 27.0).abs() <= 1.0);
        assert!((rects[1].w - 36.0).abs() <= 1.0);
        assert!((rects[1].x - rects[0].x_max() - gap).abs() <= 1.0);
        // D21 is centered on the row height.
        let offset = (rects[1].y + rects[1].h / 2.0) - (rects[0].y + rects[0].h / 2.0);
        assert!(offset.abs() <= 1.0);
    }

    #[test]
    fn empty_box_paints_only_its_end_glyphs() {
        let boxed = Group::Boxed(BoxGroup {
            id: 0,
            kind: "cartouche".to_string(),
            direction: None,
            mirror: false,
            scale: 1.0,
            color: None,
            shade: crate::tree::Shading::Unspecified,
            size: 1.0,
            sep: BoxSeps::default(),
            inner: None,
            notes: Vec::new(),
        });
        let mut fragment = Fragment::with_sequence(Seq::single(boxed));
        let (canvas, rects) = render(&mut fragment);

        // The mock end caps are each a quarter em wide and solid, and the
        // empty box is exactly their combined width with no segments.
        assert_eq!(rects.len(), 1);
        assert!((rects[0].w - 18.0).abs() <= 1.0);
        assert_eq!(ink_columns(&canvas), 18);
    }

    #[test]
    fn stack_keeps_covering_ink_intact() {
        let stack = Group::Stack(StackGroup {
            id: 0,
            x: 0.5,
            y: 0.5,
            clip: StackClip::On,
            first: Box::new(Wrapped::plain(Group::Glyph(NamedGlyph::new("A1")))),
            second: Box::new(Wrapped::plain(Group::Glyph(NamedGlyph::new("D21")))),
        });
        let mut fragment = Fragment::with_sequence(Seq::single(stack));
        let (canvas, rects) = render(&mut fragment);

        // The union of a 27x36 base and a 36x13 overlay centered on it.
        assert!((rects[0].w - 36.0).abs() <= 1.0);
        assert!((rects[0].h - 36.0).abs() <= 1.0);

        // The overlay is solid ink; its center pixel must survive the
        // masking.
        let cx = (rects[0].x + rects[0].w / 2.0) as i32;
        let cy = (rects[0].y + rects[0].h / 2.0) as i32;
        let grid = canvas.ink();
        assert!(grid.get(cx, cy) >= INK);
    }

    #[test]
    fn note_grows_the_top_margin() {
        let mut glyph = NamedGlyph::new("A1");
        glyph.notes.push(Note {
            text: "*".to_string(),
            color: None,
        });
        let mut fragment = Fragment::with_sequence(Seq::single(Group::Glyph(glyph)));
        fragment.assign_ids();

        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let mut arena = LayoutArena::new(fragment.node_count());
        let root = resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();
        let (_, _, margins) = render_to_canvas(&ctx, &fragment, &arena, root).unwrap();

        // The note sits above the glyph, past the default margin.
        assert!(margins.top > ctx.settings.margin_px as i32);
    }

    #[test]
    fn empty_fragment_accumulates_no_shading() {
        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let ambient = Ambient::for_fragment(&Fragment::default());

        let fragment = Fragment::default();
        let mut arena = LayoutArena::new(fragment.node_count().max(1));
        let root = resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();
        assert_eq!((root.w, root.h), (0.0, 0.0));

        let mut env = Environment::new(&ctx.settings, ambient.direction, Margins::uniform(0));
        let mut canvas = Canvas::new(1, 1).unwrap();
        if let Some(seq) = &fragment.sequence {
            let content = Rect::new(0.0, 0.0, root.w, root.h);
            render_seq(&ctx, &mut env, &arena, &mut canvas, (0.0, 0.0), seq, &content, &ambient)
                .unwrap();
        }
        assert!(env.shade.is_empty());
        assert!(canvas.ink().is_blank());

        // A shaded glyph does feed the accumulator through the same path.
        let mut shaded = NamedGlyph::new("A1");
        shaded.shade = Shading::On;
        let mut fragment = Fragment::with_sequence(Seq::single(Group::Glyph(shaded)));
        fragment.assign_ids();
        let mut arena = LayoutArena::new(fragment.node_count());
        let root = resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();

        let mut env = Environment::new(&ctx.settings, ambient.direction, Margins::uniform(0));
        let mut canvas = Canvas::new(root.w.ceil() as u32, root.h.ceil() as u32).unwrap();
        let seq = fragment.sequence.as_ref().unwrap();
        let content = Rect::new(0.0, 0.0, root.w, root.h);
        render_seq(&ctx, &mut env, &arena, &mut canvas, (0.0, 0.0), seq, &content, &ambient)
            .unwrap();
        assert!(!env.shade.is_empty());
    }

    #[test]
    fn reversed_column_note_sits_to_the_right() {
        let mut glyph = NamedGlyph::new("A1");
        glyph.notes.push(Note {
            text: "*".to_string(),
            color: None,
        });
        let mut fragment = Fragment::with_sequence(Seq::single(Group::Glyph(glyph)));
        fragment.direction = Some(Direction::VerticalRl);
        fragment.assign_ids();

        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let mut arena = LayoutArena::new(fragment.node_count());
        let root = resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();
        let (_, _, margins) = render_to_canvas(&ctx, &fragment, &arena, root).unwrap();

        // The leading side of a right-to-left column is the right one, so
        // only the right margin grows.
        assert!(margins.right > ctx.settings.margin_px as i32);
        assert_eq!(margins.left, ctx.settings.margin_px as i32);
    }

    #[test]
    fn stacked_notes_settle_the_margins() {
        let mut glyph = NamedGlyph::new("A1");
        for _ in 0..5 {
            glyph.notes.push(Note {
                text: "*".to_string(),
                color: None,
            });
        }
        let mut fragment = Fragment::with_sequence(Seq::single(Group::Glyph(glyph)));
        fragment.assign_ids();

        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let mut arena = LayoutArena::new(fragment.node_count());
        let root = resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();
        let (canvas, _, margins) = render_to_canvas(&ctx, &fragment, &arena, root).unwrap();

        // Five notes stack above the glyph; the retry loop runs until the
        // margins hold them all, and the canvas matches the final margins.
        let style = GlyphStyle::sized(ctx.settings.note_em * ctx.settings.em_px);
        let m = ctx.source.measure("*", &style).unwrap();
        assert!(f64::from(margins.top) >= 5.0 * (m.h + 2.0));
        assert_eq!(canvas.height(), (root.h.ceil() as i32 + margins.vertical()) as u32);
    }

    #[test]
    fn probe_lands_all_ink_inside_the_grid() {
        let mut fragment = Fragment::with_sequence(Seq::single(Group::Glyph(NamedGlyph::new("A1"))));
        fragment.assign_ids();

        let source = MockSource;
        let ctx = Context::new(&source, Settings::default());
        let mut arena = LayoutArena::new(fragment.node_count());
        resolve::resolve_fragment(&ctx, &fragment, &mut arena).unwrap();

        let seq = fragment.sequence.as_ref().unwrap();
        let group = &seq.groups[0];
        let r = arena.get(group.id());
        let ambient = Ambient::for_fragment(&fragment);
        let grid = probe_group(&ctx, &arena, group, &ambient, r.w, r.h).unwrap();

        assert!(!grid.is_blank());
        assert_eq!(grid.width(), r.w.ceil() as usize);
        assert_eq!(grid.height(), r.h.ceil() as usize);
    }
}
