//! Parser for the SII unit dialect (also used by `.mat` files).
//!
//! ```text
//! SiiNunit
//! {
//! city_data : city.berlin
//! {
//!     city_name: "Berlin"
//!     map_x_offsets: 2
//!     map_x_offsets[0]: 10
//!     map_x_offsets[1]: -4
//!     vehicles[]: .veh.0
//! }
//! }
//! ```
//!
//! Each attribute value is classified once, when its line is read, into a
//! [`Value`]. Array attributes come in two shapes: a fixed-length array,
//! announced by an integer length under the bare name and filled by index,
//! and a list appended to with `name[]`. The shape of each array name is
//! tracked explicitly in [`ArrayShape`] while its unit is being read.

use std::collections::HashMap;

use super::{strip_comments, trim_bom};
use crate::{Error, Result};

/// File header of SII unit files.
pub const SII_HEADER: &str = "SiiNunit";

const INCLUDE_KEYWORD: &str = "@include";

/// Cap on pre-sized fixed arrays.
const MAX_DECLARED_LEN: usize = 1 << 16;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer literal.
    Int(i64),
    /// Decimal or `&`-prefixed hex bit pattern float.
    Float(f64),
    /// Quoted string.
    String(String),
    /// Parenthesized component list `(x, y, z)`.
    Vector(Vec<f64>),
    /// Parenthesized `(w; x, y, z)` list, `w` first.
    Tuple(Vec<f64>),
    /// Bare word such as `true`, `null` or an enum name.
    Token(String),
    /// Unit name reference such as `.veh.0` or `company.volvo`.
    Pointer(String),
    /// Array or list elements. Unset fixed-array slots are `Token("null")`.
    Array(Vec<Value>),
}

impl Value {
    /// Classifies a raw attribute value.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix('"') {
            return Value::String(unescape(rest));
        }
        if let Some(inner) = raw.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            if let Some(value) = parse_components(inner) {
                return value;
            }
        }
        if let Some(bits) = parse_hex_float(raw) {
            return Value::Float(bits);
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Value::Int(int);
        }
        if let Ok(uint) = raw.parse::<u64>() {
            return Value::Float(uint as f64);
        }
        if looks_numeric(raw) {
            if let Ok(float) = raw.parse::<f64>() {
                return Value::Float(float);
            }
        }
        if raw.contains('.') && !raw.contains(char::is_whitespace) {
            return Value::Pointer(raw.to_string());
        }
        Value::Token(raw.to_string())
    }

    /// Calls `f` with every string contained in this value.
    pub fn for_each_string<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Value::String(s) => f(s),
            Value::Array(items) => items.iter().for_each(|item| item.for_each_string(f)),
            _ => {}
        }
    }

    fn null() -> Self {
        Value::Token("null".to_string())
    }
}

fn looks_numeric(raw: &str) -> bool {
    raw.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
        && raw.chars().any(|c| c.is_ascii_digit())
}

fn parse_hex_float(raw: &str) -> Option<f64> {
    let hex = raw.strip_prefix('&')?;
    if hex.len() != 8 {
        return None;
    }
    u32::from_str_radix(hex, 16)
        .ok()
        .map(|bits| f64::from(f32::from_bits(bits)))
}

fn parse_float(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    parse_hex_float(raw).or_else(|| raw.parse::<f64>().ok())
}

fn parse_components(inner: &str) -> Option<Value> {
    let floats = |s: &str| -> Option<Vec<f64>> { s.split(',').map(parse_float).collect() };
    match inner.split_once(';') {
        Some((w, rest)) => {
            let mut out = vec![parse_float(w)?];
            out.extend(floats(rest)?);
            Some(Value::Tuple(out))
        }
        None => floats(inner).map(Value::Vector),
    }
}

/// Reads a quoted string body up to the closing quote.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    match u8::from_str_radix(&hex, 16) {
                        Ok(b) => out.push(char::from(b)),
                        Err(_) => {
                            out.push_str("\\x");
                            out.push_str(&hex);
                        }
                    }
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// A unit: `class : name { attributes }`, possibly with nested units.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unit {
    /// Unit class.
    pub class: String,
    /// Unit name (unquoted).
    pub name: String,
    /// Attributes in first-definition order. Redefinition replaces the value.
    pub attributes: Vec<(String, Value)>,
    /// Nested units, as in `.mat` texture blocks.
    pub children: Vec<Unit>,
}

impl Unit {
    /// Returns an attribute value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Calls `f` with every string value of this unit and its children.
    pub fn for_each_string<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        for (_, value) in &self.attributes {
            value.for_each_string(f);
        }
        for child in &self.children {
            child.for_each_string(f);
        }
    }
}

/// A parsed SII or `.mat` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiiFile {
    /// Top-level units.
    pub units: Vec<Unit>,
    /// Targets of `@include` directives, unresolved.
    pub includes: Vec<String>,
}

impl SiiFile {
    /// Calls `f` with every string value in the file.
    pub fn for_each_string<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        for unit in &self.units {
            unit.for_each_string(f);
        }
    }
}

/// Shape of an array attribute within the unit being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayShape {
    /// Length known up front; `name[]` writes at the insert cursor.
    Fixed { next: usize },
    /// Grows with every `name[]`.
    List,
}

/// A unit under construction.
#[derive(Debug, Default)]
struct UnitBuilder {
    unit: Unit,
    index: HashMap<String, usize>,
    shapes: HashMap<String, ArrayShape>,
}

impl UnitBuilder {
    fn new(class: String, name: String) -> Self {
        Self {
            unit: Unit {
                class,
                name,
                ..Unit::default()
            },
            ..Self::default()
        }
    }

    fn set(&mut self, key: &str, value: Value) {
        match self.index.get(key) {
            Some(&i) => self.unit.attributes[i].1 = value,
            None => {
                self.index.insert(key.to_string(), self.unit.attributes.len());
                self.unit.attributes.push((key.to_string(), value));
            }
        }
    }

    fn attribute(&mut self, key: &str, raw: &str) -> Result<()> {
        let value = Value::parse(raw);
        let Some(open) = key.find('[').filter(|_| key.ends_with(']')) else {
            self.set(key, value);
            return Ok(());
        };

        let name = &key[..open];
        let index_text = &key[open + 1..key.len() - 1];
        let explicit = if index_text.is_empty() {
            None
        } else {
            Some(index_text.parse::<usize>().map_err(|_| {
                Error::Decode(format!("bad array index in attribute {key:?}"))
            })?)
        };

        let shape = match self.shapes.get(name) {
            Some(&shape) => shape,
            None => {
                let declared = self.index.get(name).map(|&i| &self.unit.attributes[i].1);
                let (shape, initial) = match declared {
                    Some(Value::Int(len)) => (
                        ArrayShape::Fixed { next: 0 },
                        vec![Value::null(); usize::try_from(*len).unwrap_or(0).min(MAX_DECLARED_LEN)],
                    ),
                    Some(Value::Array(items)) => (ArrayShape::List, items.clone()),
                    // a scalar defined under the bare name becomes element 0
                    Some(other) => (ArrayShape::List, vec![other.clone()]),
                    None if explicit.is_some() => (ArrayShape::Fixed { next: 0 }, Vec::new()),
                    None => (ArrayShape::List, Vec::new()),
                };
                self.set(name, Value::Array(initial));
                shape
            }
        };

        let slot = self.index[name];
        let Value::Array(items) = &mut self.unit.attributes[slot].1 else {
            return Err(Error::Decode(format!("attribute {name:?} is not an array")));
        };

        let next_shape = match (shape, explicit) {
            (_, Some(i)) => {
                if items.len() <= i {
                    items.resize(i + 1, Value::null());
                }
                items[i] = value;
                match shape {
                    ArrayShape::Fixed { .. } => ArrayShape::Fixed { next: i + 1 },
                    ArrayShape::List => ArrayShape::List,
                }
            }
            (ArrayShape::Fixed { next }, None) => {
                if items.len() <= next {
                    items.resize(next + 1, Value::null());
                }
                items[next] = value;
                ArrayShape::Fixed { next: next + 1 }
            }
            (ArrayShape::List, None) => {
                items.push(value);
                ArrayShape::List
            }
        };
        self.shapes.insert(name.to_string(), next_shape);
        Ok(())
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

/// Splits `class : name` (with an optional trailing `{`).
fn split_header(line: &str) -> Option<(String, String)> {
    let line = line.trim_end_matches('{').trim();
    let (class, name) = line.split_once(':')?;
    let class = class.trim();
    if class.is_empty() || class.contains(char::is_whitespace) {
        return None;
    }
    Some((class.to_string(), unquote(name)))
}

/// Parses SII or `.mat` text.
///
/// Comments are removed first. The `SiiNunit { ... }` wrapper is optional so
/// that `.sui` fragments and `.mat` files parse with the same grammar.
///
/// # Errors
///
/// Returns [`Error::Decode`] on unbalanced braces, stray attributes outside
/// of a unit, or malformed array indices.
pub fn parse(text: &str) -> Result<SiiFile> {
    let text = strip_comments(trim_bom(text));
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();

    let mut file = SiiFile::default();
    let mut stack: Vec<UnitBuilder> = Vec::new();
    let mut wrapper_depth = 0usize;

    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix(INCLUDE_KEYWORD) {
            file.includes.push(unquote(rest));
            continue;
        }
        if line == SII_HEADER {
            if lines.peek() == Some(&"{") {
                lines.next();
            }
            wrapper_depth += 1;
            continue;
        }
        if line == "}" {
            match stack.pop() {
                Some(done) => match stack.last_mut() {
                    Some(parent) => parent.unit.children.push(done.unit),
                    None => file.units.push(done.unit),
                },
                None if wrapper_depth > 0 => wrapper_depth -= 1,
                None => return Err(Error::Decode("unbalanced '}' in SII text".into())),
            }
            continue;
        }

        let opens_block = line.ends_with('{') || lines.peek() == Some(&"{");
        if opens_block {
            if let Some((class, name)) = split_header(line) {
                if !line.ends_with('{') {
                    lines.next();
                }
                stack.push(UnitBuilder::new(class, name));
                continue;
            }
        }

        let Some(current) = stack.last_mut() else {
            return Err(Error::Decode(format!(
                "attribute outside of a unit: {line:?}"
            )));
        };
        let Some((key, raw)) = line.split_once(':') else {
            return Err(Error::Decode(format!("malformed attribute line {line:?}")));
        };
        current.attribute(key.trim(), raw)?;
    }

    if !stack.is_empty() {
        return Err(Error::Decode("unterminated unit in SII text".into()));
    }
    Ok(file)
}
