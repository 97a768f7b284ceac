//! Field/method descriptor token trees and the tokenizer/printer pair used
//! by the type-name mapper (spec §4.1: "every method descriptor is parsed
//! token-by-token ... primitive letters passthrough, `L…;` references
//! rewritten, `[` arrays recurse, `(…)R` method signatures recurse").

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    Primitive(char),
    Reference(String),
    Array(Box<Descriptor>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<Descriptor>,
    pub ret: Option<Descriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorParseError;

impl fmt::Display for DescriptorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed descriptor")
    }
}

const PRIMITIVES: &str = "BCDFIJSZ";

pub fn parse_descriptor(s: &str) -> Result<Descriptor, DescriptorParseError> {
    let mut chars = s.chars().peekable();
    let d = parse_one(&mut chars)?;
    if chars.next().is_some() {
        return Err(DescriptorParseError);
    }
    Ok(d)
}

fn parse_one(chars: &mut core::iter::Peekable<core::str::Chars>) -> Result<Descriptor, DescriptorParseError> {
    match chars.next().ok_or(DescriptorParseError)? {
        c if PRIMITIVES.contains(c) => Ok(Descriptor::Primitive(c)),
        '[' => Ok(Descriptor::Array(Box::new(parse_one(chars)?))),
        'L' => {
            let mut name = String::new();
            loop {
                match chars.next().ok_or(DescriptorParseError)? {
                    ';' => break,
                    c => name.push(c),
                }
            }
            Ok(Descriptor::Reference(name))
        }
        _ => Err(DescriptorParseError),
    }
}

pub fn render_descriptor(d: &Descriptor) -> String {
    match d {
        Descriptor::Primitive(c) => c.to_string(),
        Descriptor::Array(inner) => format!("[{}", render_descriptor(inner)),
        Descriptor::Reference(name) => format!("L{name};"),
    }
}

/// `(param…)Rret` style method signatures, per spec §4.1.
pub fn parse_method_descriptor(s: &str) -> Result<MethodDescriptor, DescriptorParseError> {
    let mut chars = s.chars().peekable();
    if chars.next() != Some('(') {
        return Err(DescriptorParseError);
    }
    let mut params = Vec::new();
    while chars.peek() != Some(&')') {
        params.push(parse_one(&mut chars)?);
    }
    chars.next(); // consume ')'
    let ret = if chars.peek() == Some(&'V') {
        chars.next();
        None
    } else {
        Some(parse_one(&mut chars)?)
    };
    if chars.next().is_some() {
        return Err(DescriptorParseError);
    }
    Ok(MethodDescriptor { params, ret })
}

pub fn render_method_descriptor(d: &MethodDescriptor) -> String {
    let mut out = String::from("(");
    for p in &d.params {
        out.push_str(&render_descriptor(p));
    }
    out.push(')');
    match &d.ret {
        Some(r) => out.push_str(&render_descriptor(r)),
        None => out.push('V'),
    }
    out
}

/// Applies `f` to every `Reference` leaf, recursing through arrays.
pub fn map_references(d: &Descriptor, f: &impl Fn(&str) -> String) -> Descriptor {
    match d {
        Descriptor::Primitive(c) => Descriptor::Primitive(*c),
        Descriptor::Array(inner) => Descriptor::Array(Box::new(map_references(inner, f))),
        Descriptor::Reference(name) => Descriptor::Reference(f(name)),
    }
}

pub fn map_method_references(d: &MethodDescriptor, f: &impl Fn(&str) -> String) -> MethodDescriptor {
    MethodDescriptor {
        params: d.params.iter().map(|p| map_references(p, f)).collect(),
        ret: d.ret.as_ref().map(|r| map_references(r, f)),
    }
}
