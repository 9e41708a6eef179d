#![allow(dead_code)]

//! Decoder for the tokenised hybrid text/hex edge mini-language used by
//! `edges`/`cubics` attributes, and the shape assembler that chains the
//! resulting half-edges into closed subpaths.
//!
//! The decoder never fails: malformed tokens are skipped and decoding
//! continues from the next recognised token, mirroring how a lossy
//! vector format is expected to degrade rather than abort a whole shape.

use log::debug;
use std::fmt;

mod point;
mod shape_assembler;

pub use point::Point;
pub use shape_assembler::{assemble_fill, AssembledFill, Chain, ChainDiagnostic, EdgeRef};

/// A single drawing instruction, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64),
    Close,
}

impl PathCommand {
    /// The end point a command leaves the pen at, if it moves the pen.
    pub fn end_point(&self) -> Option<Point> {
        match *self {
            PathCommand::MoveTo(x, y) => Some(Point::new(x, y)),
            PathCommand::LineTo(x, y) => Some(Point::new(x, y)),
            PathCommand::QuadTo(_, _, x, y) => Some(Point::new(x, y)),
            PathCommand::CubicTo(_, _, _, _, x, y) => Some(Point::new(x, y)),
            PathCommand::Close => None,
        }
    }
}

/// Position of a mid-edge fill-style switch, recorded but not acted on
/// unless `ParseOptions::enable_edge_splitting_on_style_change` is set by
/// the caller (that decision lives in `xfl-model`; this crate only
/// reports where the markers were).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleChange {
    pub command_index: usize,
    pub fill_style1: u32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedEdge {
    pub commands: Vec<PathCommand>,
    pub style_changes: Vec<StyleChange>,
}

/// A decoder-internal error. The decoder itself never returns `Err` to its
/// caller (per spec, malformed tokens are skipped); this type exists so
/// the per-token parsing functions have a normal `Result`-based internal
/// control flow instead of sentinels.
#[derive(Debug, PartialEq)]
enum TokenError {
    InvalidHex,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenError::InvalidHex => write!(f, "invalid hex integer"),
        }
    }
}

/// Emit a `MoveTo` only when it actually moves the pen.
const MOVE_EPSILON: f64 = 0.5;
/// Drop zero-length lines under this displacement.
const LINE_EPSILON: f64 = 0.5;
/// Auto-close tolerance for the trailing implicit close.
const CLOSE_EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Bang,       // !
    Pipe,       // |
    LBracket,   // [
    Slash,      // /
    Style,      // S
    LParen,     // (
    RParen,     // )
    Semicolon,  // ;
    QuadApprox, // q or Q
    Number(&'a str),
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' | ',' => {
                i += 1;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            'S' => {
                tokens.push(Token::Style);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            'q' | 'Q' => {
                tokens.push(Token::QuadApprox);
                i += 1;
            }
            '#' => {
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_hexdigit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] as char == '.' {
                    i += 1;
                    while i < bytes.len() && (bytes[i] as char).is_ascii_hexdigit() {
                        i += 1;
                    }
                }
                tokens.push(Token::Number(&input[start..i]));
            }
            '-' | '0'..='9' => {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                tokens.push(Token::Number(&input[start..i]));
            }
            _ => {
                // Unrecognised character: skip it rather than aborting.
                i += 1;
            }
        }
    }
    tokens
}

fn parse_decimal(token: &str) -> Result<f64, TokenError> {
    let value: i64 = token.parse().map_err(|_| TokenError::InvalidHex)?;
    Ok(value as f64 / 20.0)
}

fn parse_hex(token: &str) -> Result<f64, TokenError> {
    let rest = &token[1..]; // strip '#'
    let (int_part, frac_part) = match rest.find('.') {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };
    if int_part.is_empty() {
        return Err(TokenError::InvalidHex);
    }
    let unsigned = u64::from_str_radix(int_part, 16).map_err(|_| TokenError::InvalidHex)?;
    let ndigits = int_part.len() as u32;
    let bits = 4 * ndigits;
    let signed: i64 = if ndigits >= 6 && bits < 64 && unsigned >= (1u64 << (bits - 1)) {
        unsigned as i64 - (1i64 << bits)
    } else {
        unsigned as i64
    };
    let mut value = signed as f64;
    if let Some(frac) = frac_part {
        if !frac.is_empty() {
            let frac_value =
                u64::from_str_radix(frac, 16).map_err(|_| TokenError::InvalidHex)? as f64;
            let denom = 16f64.powi(frac.len() as i32);
            let magnitude = frac_value / denom;
            value += if signed < 0 { -magnitude } else { magnitude };
        }
    }
    Ok(value / 20.0)
}

fn parse_coord(token: &str) -> Result<f64, TokenError> {
    if token.starts_with('#') {
        parse_hex(token)
    } else {
        parse_decimal(token)
    }
}

/// Decode exactly `n` coordinates starting at `*pos`. Returns `None` if
/// fewer than `n` number tokens are available or one fails to parse.
fn take_coords(tokens: &[Token], pos: &mut usize, n: usize) -> Option<Vec<f64>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        match tokens.get(*pos) {
            Some(Token::Number(s)) => {
                *pos += 1;
                match parse_coord(s) {
                    Ok(v) => out.push(v),
                    Err(e) => {
                        debug!("edge decoder: {} in token {:?}", e, s);
                        return None;
                    }
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

fn all_valid(coords: &[f64]) -> bool {
    coords.iter().all(|v| point::is_valid_coord(*v))
}

struct Decoder<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    commands: Vec<PathCommand>,
    style_changes: Vec<StyleChange>,
    /// `None` until the first command sets a pen position. A `None` pen
    /// means "no prior position to compare against," not "at the origin,"
    /// so the very first `MoveTo`/anchor in a decode is never suppressed.
    current: Option<Point>,
    subpath_start: Point,
    has_subpath: bool,
    emitted_close_at_end: bool,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokens: tokenize(input),
            pos: 0,
            commands: Vec::new(),
            style_changes: Vec::new(),
            current: None,
            subpath_start: Point::new(0.0, 0.0),
            has_subpath: false,
            emitted_close_at_end: false,
        }
    }

    /// Whether moving the pen to `target` should emit a `MoveTo`/`LineTo`:
    /// always true with no prior position, otherwise gated by `epsilon`.
    fn moved_from_current(&self, target: &Point, epsilon: f64) -> bool {
        match self.current {
            None => true,
            Some(cur) => target.l1_distance(&cur) > epsilon,
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn run(mut self) -> DecodedEdge {
        while let Some(tok) = self.peek() {
            match tok {
                Token::Bang => {
                    self.pos += 1;
                    self.handle_move();
                }
                Token::Pipe => {
                    self.pos += 1;
                    self.handle_line();
                }
                Token::LBracket => {
                    self.pos += 1;
                    self.handle_quad();
                }
                Token::Slash => {
                    self.pos += 1;
                    self.handle_close();
                }
                Token::Style => {
                    self.pos += 1;
                    self.handle_style();
                }
                Token::LParen => {
                    self.pos += 1;
                    self.handle_cubic_block();
                }
                Token::QuadApprox => {
                    self.pos += 1;
                    self.skip_quad_approx();
                }
                // A dangling RParen/Semicolon/Number outside of any
                // recognised construct: skip it, the grammar is lossy.
                Token::RParen | Token::Semicolon | Token::Number(_) => {
                    self.pos += 1;
                }
            }
        }
        self.finish_auto_close();
        DecodedEdge {
            commands: self.commands,
            style_changes: self.style_changes,
        }
    }

    fn handle_move(&mut self) {
        let Some(coords) = take_coords(&self.tokens, &mut self.pos, 2) else {
            return;
        };
        if !all_valid(&coords) {
            return;
        }
        let target = Point::new(coords[0], coords[1]);
        self.subpath_start = target;
        self.has_subpath = true;
        if self.moved_from_current(&target, MOVE_EPSILON) {
            self.commands.push(PathCommand::MoveTo(target.x, target.y));
        }
        self.current = Some(target);
    }

    fn handle_line(&mut self) {
        let Some(coords) = take_coords(&self.tokens, &mut self.pos, 2) else {
            return;
        };
        if !all_valid(&coords) {
            return;
        }
        let target = Point::new(coords[0], coords[1]);
        if self.moved_from_current(&target, LINE_EPSILON) {
            self.commands.push(PathCommand::LineTo(target.x, target.y));
            self.current = Some(target);
        }
    }

    fn handle_quad(&mut self) {
        let Some(coords) = take_coords(&self.tokens, &mut self.pos, 4) else {
            return;
        };
        if !all_valid(&coords) {
            return;
        }
        self.commands
            .push(PathCommand::QuadTo(coords[0], coords[1], coords[2], coords[3]));
        self.current = Some(Point::new(coords[2], coords[3]));
    }

    fn handle_cubic(&mut self) -> bool {
        let Some(coords) = take_coords(&self.tokens, &mut self.pos, 6) else {
            return false;
        };
        if !all_valid(&coords) {
            return false;
        }
        self.commands.push(PathCommand::CubicTo(
            coords[0], coords[1], coords[2], coords[3], coords[4], coords[5],
        ));
        self.current = Some(Point::new(coords[4], coords[5]));
        true
    }

    fn handle_close(&mut self) {
        self.commands.push(PathCommand::Close);
        self.current = Some(self.subpath_start);
        self.emitted_close_at_end = true;
    }

    fn handle_style(&mut self) {
        let Some(coords) = take_coords(&self.tokens, &mut self.pos, 1) else {
            return;
        };
        self.style_changes.push(StyleChange {
            command_index: self.commands.len(),
            fill_style1: coords[0].max(0.0) as u32,
        });
    }

    /// `(` has already been consumed. Either an anchor pair precedes the
    /// `;`, or `;` follows directly.
    fn handle_cubic_block(&mut self) {
        self.emitted_close_at_end = false;
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        } else if let Some(coords) = take_coords(&self.tokens, &mut self.pos, 2) {
            if all_valid(&coords) {
                // The anchor behaves like an ordinary moveTo: it starts a
                // (possibly new) subpath at this point.
                let target = Point::new(coords[0], coords[1]);
                self.subpath_start = target;
                self.has_subpath = true;
                if self.moved_from_current(&target, MOVE_EPSILON) {
                    self.commands.push(PathCommand::MoveTo(target.x, target.y));
                }
                self.current = Some(target);
            }
            if !matches!(self.peek(), Some(Token::Semicolon)) {
                return;
            }
            self.pos += 1;
        } else {
            return;
        }

        loop {
            match self.peek() {
                Some(Token::Number(_)) => {
                    if !self.handle_cubic() {
                        // A malformed group: stop the block rather than
                        // looping on tokens we can't consume as a unit.
                        break;
                    }
                }
                Some(Token::QuadApprox) => {
                    self.pos += 1;
                    self.skip_quad_approx();
                }
                Some(Token::RParen) => {
                    self.pos += 1;
                    if matches!(self.peek(), Some(Token::Semicolon)) {
                        self.pos += 1;
                    }
                    break;
                }
                _ => break,
            }
        }
    }

    /// Skip a `q`/`Q` quadratic-approximation pair: consume number tokens
    /// until the next command token, without interpreting them.
    fn skip_quad_approx(&mut self) {
        while let Some(Token::Number(_)) = self.peek() {
            self.pos += 1;
        }
    }

    fn finish_auto_close(&mut self) {
        if self.emitted_close_at_end || !self.has_subpath {
            return;
        }
        if let Some(cur) = self.current {
            if cur.within(&self.subpath_start, CLOSE_EPSILON) {
                self.commands.push(PathCommand::Close);
            }
        }
    }
}

/// Decode a quadratic (`edges` attribute) or cubic (`cubics` attribute)
/// edge string into an ordered path command list.
pub fn decode_edge(input: &str) -> DecodedEdge {
    Decoder::new(input).run()
}
