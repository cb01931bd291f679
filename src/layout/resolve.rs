//! The scale-resolution pass.
//!
//! Walks the tree bottom-up with top-down size targets, assigning every
//! node its extents in pixels and its dynamic scale. Children of a sequence
//! that exceed the ambient nominal unit are shrunk toward it, never
//! enlarged; the shrink loop re-measures after every step because glyph
//! proportions change with size, and stops at the iterate limit or the
//! scale floor. Non-convergence is accepted, not an error.

use crate::fonts::GlyphStyle;
use crate::geometry::Rect;
use crate::layout::{
    fit, insert, render, silhouette, Ambient, Context, LayoutArena, Resolved,
};
use crate::surface::AlphaGrid;
use crate::tree::{
    BoxGroup, Direction, Fragment, Group, InsertGroup, ModifyGroup, NamedGlyph, Seq, SizeReq,
    StackGroup, Wrapped,
};
use crate::Result;

/// Resolves a whole fragment, filling the arena, and returns the root
/// geometry.
pub fn resolve_fragment(
    ctx: &Context,
    fragment: &Fragment,
    arena: &mut LayoutArena,
) -> Result<Resolved> {
    let ambient = Ambient::for_fragment(fragment);
    let mut resolver = Resolver { ctx, arena };

    match &fragment.sequence {
        None => Ok(Resolved::default()),
        Some(seq) => resolver.seq(seq, &ambient, 1.0),
    }
}

/// The style of a named glyph at a dynamic scale.
///
/// Shared with the render pass so that measurement and painting always
/// agree.
pub(crate) fn glyph_style(
    ctx: &Context,
    glyph: &NamedGlyph,
    ambient: &Ambient,
    scale: f64,
    paint_mirror: bool,
) -> GlyphStyle {
    GlyphStyle {
        size_px: ctx.settings.em_px * scale * glyph.scale,
        xscale: glyph.xscale,
        yscale: glyph.yscale,
        rotate: glyph.rotate,
        mirror: glyph.mirror ^ ambient.mirror ^ paint_mirror,
    }
}

/// Name of one glyph of a box triple (`open`, `segment` or `close`).
pub(crate) fn box_part(kind: &str, part: &str) -> String {
    format!("{}-{}", kind, part)
}

/// Style of the frame glyphs of a box.
pub(crate) fn box_style(
    ctx: &Context,
    group: &BoxGroup,
    ambient: &Ambient,
    scale: f64,
    paint_mirror: bool,
) -> GlyphStyle {
    GlyphStyle {
        size_px: ctx.settings.em_px * scale * group.scale * group.size,
        xscale: 1.0,
        yscale: 1.0,
        rotate: 0,
        mirror: group.mirror ^ ambient.mirror ^ paint_mirror,
    }
}

/// One of the four box separations in pixels.
pub(crate) fn box_sep(ctx: &Context, factor: Option<f64>, scale: f64) -> f64 {
    factor.unwrap_or(1.0) * ctx.settings.box_sep_em * ctx.settings.em_px * scale
}

/// The scale of the glyphs touching one edge of a group.
///
/// Operators size their gap from the larger of the two scales facing them,
/// so a shrunken group does not get a full-size gap.
pub(crate) fn edge_scale(
    arena: &LayoutArena,
    group: &Group,
    leading: bool,
    horizontal: bool,
) -> f64 {
    let children = match group {
        Group::Horizontal(g) if horizontal => {
            return side_child(&g.children, leading)
                .map(|c| edge_scale(arena, c, leading, horizontal))
                .unwrap_or_else(|| arena.get(g.id).scale);
        }
        Group::Vertical(g) if !horizontal => {
            return side_child(&g.children, leading)
                .map(|c| edge_scale(arena, c, leading, horizontal))
                .unwrap_or_else(|| arena.get(g.id).scale);
        }
        Group::Horizontal(g) => Some(&g.children),
        Group::Vertical(g) => Some(&g.children),
        _ => None,
    };

    match children {
        // All children touch the edge; the largest of them rules.
        Some(children) => children
            .iter()
            .map(|c| edge_scale(arena, &c.group, leading, horizontal))
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE),
        None => arena.get(group.id()).scale,
    }
}

fn side_child(children: &[Wrapped], leading: bool) -> Option<&Group> {
    if leading {
        children.first().map(|c| &c.group)
    } else {
        children.last().map(|c| &c.group)
    }
}

/// The ambient defaults of the two children of a pair node.
pub(crate) fn pair_ambients(
    ambient: &Ambient,
    first: &Wrapped,
    second: &Wrapped,
) -> (Ambient, Ambient) {
    let a1 = ambient.with_switch(&first.lead);
    let a2 = a1
        .with_switch(&first.group.trailing_switch())
        .with_switch(&first.trail)
        .with_switch(&second.lead);
    (a1, a2)
}

struct Resolver<'a, 's> {
    ctx: &'a Context<'s>,
    arena: &'a mut LayoutArena,
}

impl<'a, 's> Resolver<'a, 's> {
    /// Resolves a sequence and its operators.
    fn seq(&mut self, seq: &Seq, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let horizontal = ambient.direction.is_horizontal();

        // A forced-size request is only honored on the first operator.
        let mut local = ambient.clone();
        let mut unconstrained = false;
        match seq.ops.first().map(|op| op.size) {
            Some(SizeReq::Finite(unit)) => local.unit_em = unit,
            Some(SizeReq::Infinite) => unconstrained = true,
            _ => {}
        }

        let (group_amb, op_amb) = super::seq_ambients(seq, &local);
        let unit_px = local.unit_em * self.ctx.settings.em_px * scale;

        for (group, amb) in seq.groups.iter().zip(&group_amb) {
            self.group_fitted(group, amb, scale, unit_px, unconstrained)?;
        }

        for (i, op) in seq.ops.iter().enumerate() {
            let amb = &op_amb[i];
            let a = &seq.groups[i];
            let b = &seq.groups[i + 1];
            let edge = edge_scale(self.arena, a, false, horizontal)
                .max(edge_scale(self.arena, b, true, horizontal));
            let nominal = op.sep.unwrap_or(amb.sep) * self.ctx.settings.op_sep_px() * edge;

            let width = if op.fit.unwrap_or(amb.fit) {
                self.fit_gap(a, b, amb, nominal, horizontal)?
            } else {
                nominal
            };

            self.arena.set(
                op.id,
                Resolved {
                    w: width,
                    h: 0.0,
                    scale: edge,
                    dx: 0.0,
                    dy: 0.0,
                },
            );
        }

        let mut main = 0.0;
        let mut cross: f64 = 0.0;
        for group in &seq.groups {
            let r = self.arena.get(group.id());
            main += r.extent(horizontal);
            cross = cross.max(r.extent(!horizontal));
        }
        for op in &seq.ops {
            main += self.arena.get(op.id).w;
        }

        Ok(if horizontal {
            Resolved {
                w: main,
                h: cross,
                scale,
                dx: 0.0,
                dy: 0.0,
            }
        } else {
            Resolved {
                w: cross,
                h: main,
                scale,
                dx: 0.0,
                dy: 0.0,
            }
        })
    }

    /// Resolves a group, shrinking it toward the nominal unit if oversized.
    fn group_fitted(
        &mut self,
        group: &Group,
        ambient: &Ambient,
        scale: f64,
        unit_px: f64,
        unconstrained: bool,
    ) -> Result<Resolved> {
        let mut s = scale;
        let mut r = self.group(group, ambient, s)?;

        if !unconstrained {
            let mut steps = 0;
            loop {
                let cross = r.extent(!ambient.direction.is_horizontal());
                if cross <= unit_px + 0.5 || steps >= self.ctx.settings.iterate_limit {
                    break;
                }

                let factor = (unit_px / cross).min(1.0);
                let next = s * factor;
                if next < self.ctx.settings.scale_floor {
                    debug!("scale floor reached while shrinking; keeping oversized geometry");
                    break;
                }

                s = next;
                r = self.group(group, ambient, s)?;
                steps += 1;
            }
        }

        Ok(r)
    }

    /// Resolves one group at a fixed dynamic scale and caches the result.
    fn group(&mut self, group: &Group, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let resolved = match group {
            Group::Glyph(g) => {
                let style = glyph_style(self.ctx, g, ambient, scale, false);
                let ink = self.ctx.source.measure(&g.name, &style)?;
                Resolved {
                    w: ink.w,
                    h: ink.h,
                    scale,
                    dx: 0.0,
                    dy: 0.0,
                }
            }

            Group::Blank(g) => Resolved {
                w: g.width * self.ctx.settings.em_px * scale,
                h: g.height * self.ctx.settings.em_px * scale,
                scale,
                dx: 0.0,
                dy: 0.0,
            },

            Group::Horizontal(g) => self.row(&g.children, ambient, scale, true)?,
            Group::Vertical(g) => self.row(&g.children, ambient, scale, false)?,
            Group::Boxed(g) => self.boxed(g, ambient, scale)?,
            Group::Stack(g) => self.stack(g, ambient, scale)?,
            Group::Insert(g) => self.insert(g, ambient, scale)?,
            Group::Modify(g) => self.modify(g, ambient, scale)?,
        };

        self.arena.set(group.id(), resolved);
        Ok(resolved)
    }

    /// Resolves the children of a horizontal or vertical group.
    fn row(
        &mut self,
        children: &[Wrapped],
        ambient: &Ambient,
        scale: f64,
        horizontal: bool,
    ) -> Result<Resolved> {
        let direction = forced_direction(ambient.direction, horizontal);
        let unit_px = ambient.unit_em * self.ctx.settings.em_px * scale;

        let mut current = ambient.clone();
        current.direction = direction;

        let mut ambients = Vec::with_capacity(children.len());
        for child in children {
            let amb = current.with_switch(&child.lead);
            self.group_fitted(&child.group, &amb, scale, unit_px, false)?;
            current = amb
                .with_switch(&child.group.trailing_switch())
                .with_switch(&child.trail);
            ambients.push(amb);
        }

        let mut main = 0.0;
        let mut cross: f64 = 0.0;
        for child in children {
            let r = self.arena.get(child.group.id());
            main += r.extent(horizontal);
            cross = cross.max(r.extent(!horizontal));
        }

        for i in 0..children.len().saturating_sub(1) {
            main += hv_gap(
                self.ctx,
                self.arena,
                &children[i].group,
                &children[i + 1].group,
                ambients[i + 1].sep,
                horizontal,
            );
        }

        Ok(if horizontal {
            Resolved {
                w: main,
                h: cross,
                scale,
                dx: 0.0,
                dy: 0.0,
            }
        } else {
            Resolved {
                w: cross,
                h: main,
                scale,
                dx: 0.0,
                dy: 0.0,
            }
        })
    }

    /// Sizes a box from the real ink of its frame glyphs and recurses into
    /// the interior space left after subtracting the four separations.
    fn boxed(&mut self, group: &BoxGroup, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let s2 = scale * group.scale;
        let direction = group.direction.unwrap_or(ambient.direction);
        let style = box_style(self.ctx, group, ambient, scale, false);

        let open = self
            .ctx
            .source
            .measure(&box_part(&group.kind, "open"), &style)?;
        let close = self
            .ctx
            .source
            .measure(&box_part(&group.kind, "close"), &style)?;

        let sep_open = box_sep(self.ctx, group.sep.open, s2);
        let sep_close = box_sep(self.ctx, group.sep.close, s2);
        let sep_under = box_sep(self.ctx, group.sep.under, s2);
        let sep_over = box_sep(self.ctx, group.sep.over, s2);

        let mut inner_ambient = ambient.clone();
        inner_ambient.direction = direction;
        inner_ambient.mirror ^= group.mirror;
        if let Some(color) = group.color {
            inner_ambient.color = color;
        }

        if direction.is_horizontal() {
            let h = open.h;
            let avail = (h - sep_over - sep_under).max(0.0);
            inner_ambient.unit_em = avail / (self.ctx.settings.em_px * s2);

            let inner = match &group.inner {
                Some(seq) => self.seq(seq, &inner_ambient, s2)?,
                None => Resolved::default(),
            };

            let content = if inner.w > 0.0 {
                sep_open + inner.w + sep_close
            } else {
                0.0
            };

            Ok(Resolved {
                w: open.w + content + close.w,
                h,
                scale,
                dx: 0.0,
                dy: 0.0,
            })
        } else {
            let w = open.w;
            let avail = (w - sep_over - sep_under).max(0.0);
            inner_ambient.unit_em = avail / (self.ctx.settings.em_px * s2);

            let inner = match &group.inner {
                Some(seq) => self.seq(seq, &inner_ambient, s2)?,
                None => Resolved::default(),
            };

            let content = if inner.h > 0.0 {
                sep_open + inner.h + sep_close
            } else {
                0.0
            };

            Ok(Resolved {
                w,
                h: open.h + content + close.h,
                scale,
                dx: 0.0,
                dy: 0.0,
            })
        }
    }

    /// Combines the two children of a stack by translation only.
    fn stack(&mut self, group: &StackGroup, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let (a1, a2) = pair_ambients(ambient, &group.first, &group.second);
        let r1 = self.group(&group.first.group, &a1, scale)?;
        let r2 = self.group(&group.second.group, &a2, scale)?;

        // The anchor point of the base aligns with the center of the
        // overlay.
        let dx = group.x * r1.w - r2.w / 2.0;
        let dy = group.y * r1.h - r2.h / 2.0;

        let union = Rect::new(0.0, 0.0, r1.w, r1.h).include(&Rect::new(dx, dy, r2.w, r2.h));

        self.arena.set(
            group.first.group.id(),
            Resolved {
                dx: -union.x,
                dy: -union.y,
                ..r1
            },
        );
        self.arena.set(
            group.second.group.id(),
            Resolved {
                dx: dx - union.x,
                dy: dy - union.y,
                ..r2
            },
        );

        Ok(Resolved {
            w: union.w,
            h: union.h,
            scale,
            dx: 0.0,
            dy: 0.0,
        })
    }

    /// Resolves an insert: the host keeps its geometry, the decorative
    /// child is independently rescaled by the placement search.
    fn insert(&mut self, group: &InsertGroup, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let (a1, a2) = pair_ambients(ambient, &group.first, &group.second);
        let r1 = self.group(&group.first.group, &a1, scale)?;

        let host = render::probe_group(self.ctx, self.arena, &group.first.group, &a1, r1.w, r1.h)?;
        let ext = silhouette::external(&host);

        let radius = (group.sep.unwrap_or(1.0) * self.ctx.settings.op_sep_px() * scale)
            .round()
            .max(0.0) as i32;
        let initial = self.ctx.settings.insert_initial * scale;

        let placement = if group.fix {
            insert::Placement {
                scale: initial,
                x: group.place.anchor().map(|(x, _)| x).unwrap_or(group.x),
                y: group.place.anchor().map(|(_, y)| y).unwrap_or(group.y),
            }
        } else {
            let growth = self.ctx.settings.insert_growth.clone();
            let search = insert::Search {
                host: &host,
                ext: &ext,
                place: group.place,
                x: group.x,
                y: group.y,
                initial,
                floor: self.ctx.settings.scale_floor,
                growth: &growth,
                min_step: self.ctx.settings.insert_min_step,
            };

            let ctx = self.ctx;
            let arena = &mut *self.arena;
            let second = &group.second.group;
            let amb2 = a2.clone();
            let mut piece_at = |candidate: f64| -> Result<(AlphaGrid, i32)> {
                let mut sub = Resolver {
                    ctx,
                    arena: &mut *arena,
                };
                let r2 = sub.group(second, &amb2, candidate)?;
                let grid = render::probe_group(ctx, arena, second, &amb2, r2.w, r2.h)?;
                let aura = fit::outline_aura(&grid, radius)?;
                Ok((aura, radius + 1))
            };

            search.run(&mut piece_at)?
        };

        let r2 = self.group(&group.second.group, &a2, placement.scale)?;
        self.arena.set(
            group.second.group.id(),
            Resolved {
                dx: placement.x * (r1.w - r2.w),
                dy: placement.y * (r1.h - r2.h),
                ..r2
            },
        );

        Ok(Resolved {
            w: r1.w,
            h: r1.h,
            scale,
            dx: 0.0,
            dy: 0.0,
        })
    }

    /// Resolves a modify: the child keeps its natural ink and is translated
    /// within ghost margins; only the slot is resized.
    fn modify(&mut self, group: &ModifyGroup, ambient: &Ambient, scale: f64) -> Result<Resolved> {
        let amb = ambient.with_switch(&group.child.lead);
        let rc = self.group(&group.child.group, &amb, scale)?;

        let ghost_w = rc.w * (1.0 + group.before + group.after);
        let ghost_h = rc.h * (1.0 + group.above + group.below);

        let em = self.ctx.settings.em_px * scale;
        let w = group.width.map(|v| v * em).unwrap_or(ghost_w);
        let h = group.height.map(|v| v * em).unwrap_or(ghost_h);

        self.arena.set(
            group.child.group.id(),
            Resolved {
                dx: rc.w * group.before + (w - ghost_w) / 2.0,
                dy: rc.h * group.above + (h - ghost_h) / 2.0,
                ..rc
            },
        );

        Ok(Resolved {
            w,
            h,
            scale,
            dx: 0.0,
            dy: 0.0,
        })
    }

    /// Computes a fitted gap between two neighbors from their real ink.
    fn fit_gap(
        &mut self,
        a: &Group,
        b: &Group,
        ambient: &Ambient,
        nominal: f64,
        horizontal: bool,
    ) -> Result<f64> {
        let ra = self.arena.get(a.id());
        let rb = self.arena.get(b.id());
        let cap = self.ctx.settings.max_fit_px();

        if horizontal {
            let h = ra.h.max(rb.h);
            let ga = render::probe_group(self.ctx, self.arena, a, ambient, ra.w, h)?;
            let gb = render::probe_group(self.ctx, self.arena, b, ambient, rb.w, h)?;
            fit::fit_hor(&ga, &gb, nominal, cap)
        } else {
            let w = ra.w.max(rb.w);
            let ga = render::probe_group(self.ctx, self.arena, a, ambient, w, ra.h)?;
            let gb = render::probe_group(self.ctx, self.arena, b, ambient, w, rb.h)?;
            fit::fit_vert(&ga, &gb, nominal, cap)
        }
    }
}

/// The gap between two adjacent children of a horizontal or vertical group.
pub(crate) fn hv_gap(
    ctx: &Context,
    arena: &LayoutArena,
    a: &Group,
    b: &Group,
    sep: f64,
    horizontal: bool,
) -> f64 {
    let edge = edge_scale(arena, a, false, horizontal).max(edge_scale(arena, b, true, horizontal));
    sep * ctx.settings.op_sep_px() * edge
}

/// The direction a row or column imposes on its children, keeping the
/// reversal of the ambient one.
pub(crate) fn forced_direction(ambient: Direction, horizontal: bool) -> Direction {
    match (horizontal, ambient.is_reversed()) {
        (true, false) => Direction::HorizontalLr,
        (true, true) => Direction::HorizontalRl,
        (false, false) => Direction::VerticalLr,
        (false, true) => Direction::VerticalRl,
    }
}
