//! Chains a shape's oriented half-edges into closed (or diagnostically
//! open) subpaths per fill index.
//!
//! Edges are authored as oriented half-edges that each bound up to two
//! regions: `fillStyle1` is on the right of the oriented curve,
//! `fillStyle0` is on the left. Reassembly walks the inverse of that
//! authoring contract: for a given fill index, collect every edge that
//! touches it (forward if it is that edge's `fillStyle1`, reversed if it
//! is `fillStyle0`), then chain contributions end-to-start by nearest
//! endpoint.

use crate::{PathCommand, Point};
use log::debug;

/// Chaining and closure tolerance, L1 metric, in pixels.
const CHAIN_EPSILON: f64 = 1.0;

/// The subset of an `Edge` the assembler needs: its two fill references
/// and its decoded command list. `xfl-model` owns the full `Edge` type
/// (which also carries a stroke reference and belongs to a styled
/// `Shape`); this is the narrow view the chaining algorithm operates on.
#[derive(Debug, Clone)]
pub struct EdgeRef {
    pub fill_style0: Option<u32>,
    pub fill_style1: Option<u32>,
    pub commands: Vec<PathCommand>,
}

#[derive(Debug, Clone, Copy)]
struct Contribution<'a> {
    edge_index: usize,
    reversed: bool,
    start: Point,
    end: Point,
    commands: &'a [PathCommand],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub commands: Vec<PathCommand>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainDiagnostic {
    pub edge_indices: Vec<usize>,
    pub gap: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFill {
    pub fill_style: u32,
    pub chains: Vec<Chain>,
    pub diagnostics: Vec<ChainDiagnostic>,
}

fn first_point(commands: &[PathCommand]) -> Option<Point> {
    commands.iter().find_map(|c| match *c {
        PathCommand::MoveTo(x, y) => Some(Point::new(x, y)),
        _ => None,
    })
}

/// An edge's effective (start, end) points. Tolerates a command list with
/// no leading `MoveTo` (e.g. a reversed fragment mid-chain) by tracking
/// the implied pen position from whichever command is first.
fn endpoints(commands: &[PathCommand]) -> Option<(Point, Point)> {
    if commands.is_empty() {
        return None;
    }
    let mut pen = Point::new(0.0, 0.0);
    let mut start = None;
    for command in commands {
        match *command {
            PathCommand::MoveTo(x, y) => {
                pen = Point::new(x, y);
                start.get_or_insert(pen);
            }
            PathCommand::Close => {}
            _ => {
                start.get_or_insert(pen);
                if let Some(end) = command.end_point() {
                    pen = end;
                }
            }
        }
    }
    Some((start.unwrap_or(pen), pen))
}

/// Reverses a command list end-to-start, mirroring curve control points,
/// so a half-edge contributed via `fillStyle0` can be walked the other
/// way. The result still begins with an explicit `MoveTo`.
fn reverse_commands(commands: &[PathCommand]) -> Vec<PathCommand> {
    // Turn the command list into explicit (start, command-without-start)
    // segments first, since reversal needs each segment's start point,
    // which implicit pen tracking normally hides.
    struct Segment {
        start: Point,
        end: Point,
        kind: SegmentKind,
    }
    enum SegmentKind {
        Line,
        Quad(f64, f64),
        Cubic(f64, f64, f64, f64),
    }

    let mut segments = Vec::new();
    let mut pen = first_point(commands).unwrap_or(Point::new(0.0, 0.0));
    for command in commands {
        match *command {
            PathCommand::MoveTo(x, y) => {
                pen = Point::new(x, y);
            }
            PathCommand::LineTo(x, y) => {
                let end = Point::new(x, y);
                segments.push(Segment {
                    start: pen,
                    end,
                    kind: SegmentKind::Line,
                });
                pen = end;
            }
            PathCommand::QuadTo(cx, cy, x, y) => {
                let end = Point::new(x, y);
                segments.push(Segment {
                    start: pen,
                    end,
                    kind: SegmentKind::Quad(cx, cy),
                });
                pen = end;
            }
            PathCommand::CubicTo(c1x, c1y, c2x, c2y, x, y) => {
                let end = Point::new(x, y);
                segments.push(Segment {
                    start: pen,
                    end,
                    kind: SegmentKind::Cubic(c1x, c1y, c2x, c2y),
                });
                pen = end;
            }
            PathCommand::Close => {}
        }
    }

    if segments.is_empty() {
        return commands.to_vec();
    }

    let mut out = Vec::with_capacity(segments.len() + 1);
    let new_start = segments.last().unwrap().end;
    out.push(PathCommand::MoveTo(new_start.x, new_start.y));
    for segment in segments.iter().rev() {
        match segment.kind {
            SegmentKind::Line => out.push(PathCommand::LineTo(segment.start.x, segment.start.y)),
            SegmentKind::Quad(cx, cy) => {
                out.push(PathCommand::QuadTo(cx, cy, segment.start.x, segment.start.y))
            }
            SegmentKind::Cubic(c1x, c1y, c2x, c2y) => out.push(PathCommand::CubicTo(
                c2x,
                c2y,
                c1x,
                c1y,
                segment.start.x,
                segment.start.y,
            )),
        }
    }
    out
}

fn contributions_for(fill: u32, edges: &[EdgeRef]) -> Vec<(usize, bool, Vec<PathCommand>)> {
    let mut out = Vec::new();
    for (index, edge) in edges.iter().enumerate() {
        if edge.fill_style1 == Some(fill) {
            out.push((index, false, edge.commands.clone()));
        } else if edge.fill_style0 == Some(fill) && edge.fill_style0 != edge.fill_style1 {
            out.push((index, true, reverse_commands(&edge.commands)));
        }
    }
    out
}

/// Strips the leading `MoveTo` from a continuation's commands; it is
/// implied by the previous contribution's end point.
fn drop_leading_move(commands: &[PathCommand]) -> &[PathCommand] {
    match commands.first() {
        Some(PathCommand::MoveTo(..)) => &commands[1..],
        _ => commands,
    }
}

/// Chain every contribution for one fill index into subpaths.
pub fn assemble_fill(fill: u32, edges: &[EdgeRef]) -> AssembledFill {
    let owned = contributions_for(fill, edges);
    let mut contributions: Vec<Contribution> = owned
        .iter()
        .filter_map(|(index, reversed, commands)| {
            let (start, end) = endpoints(commands)?;
            Some(Contribution {
                edge_index: *index,
                reversed: *reversed,
                start,
                end,
                commands,
            })
        })
        .collect();

    let mut used = vec![false; contributions.len()];
    let mut chains = Vec::new();
    let mut diagnostics = Vec::new();

    // Contributions are already in ascending edge_index order because
    // `contributions_for` walks `edges` in order.
    contributions.sort_by_key(|c| c.edge_index);

    loop {
        let Some(start_idx) = used.iter().position(|u| !u) else {
            break;
        };
        used[start_idx] = true;
        let mut chain_indices = vec![start_idx];
        let mut current_end = contributions[start_idx].end;
        let chain_start = contributions[start_idx].start;

        loop {
            let mut best: Option<(usize, f64)> = None;
            for (i, contribution) in contributions.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let d = contribution.start.l1_distance(&current_end);
                if d <= CHAIN_EPSILON {
                    match best {
                        Some((_, bd)) if bd <= d => {}
                        _ => best = Some((i, d)),
                    }
                }
            }
            match best {
                Some((i, _)) => {
                    used[i] = true;
                    chain_indices.push(i);
                    current_end = contributions[i].end;
                }
                None => break,
            }
        }

        let gap = current_end.l1_distance(&chain_start);
        let mut commands = Vec::new();
        for (n, &idx) in chain_indices.iter().enumerate() {
            let c = &contributions[idx];
            if n == 0 {
                commands.extend_from_slice(c.commands);
            } else {
                commands.extend_from_slice(drop_leading_move(c.commands));
            }
        }

        let closed = if gap <= CHAIN_EPSILON {
            if gap > 0.0 {
                commands.push(PathCommand::LineTo(chain_start.x, chain_start.y));
            }
            commands.push(PathCommand::Close);
            true
        } else {
            debug!(
                "shape assembler: fill {} left an open chain with gap {:.3}px",
                fill, gap
            );
            diagnostics.push(ChainDiagnostic {
                edge_indices: chain_indices.iter().map(|&i| contributions[i].edge_index).collect(),
                gap,
            });
            false
        };

        chains.push(Chain { commands, closed });
    }

    AssembledFill {
        fill_style: fill,
        chains,
        diagnostics,
    }
}
