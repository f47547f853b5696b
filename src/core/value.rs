//! # Typed Attribute Values
//!
//! The closed set of attribute shapes that can cross the process boundary, and their
//! fixed byte layouts.
//!
//! ## Wire Format
//! All multi-byte scalars are big-endian.
//! ```text
//! Bool        [u8]                      0x00 | 0x01
//! Int         [i64]
//! Float       [f32]
//! Double      [f64]
//! String      [len: u32] [utf-8 bytes]
//! Color       [r: f32] [g: f32] [b: f32] [a: f32]
//! Rect        [x: f64] [y: f64] [width: f64] [height: f64]
//! Point       [x: f64] [y: f64]
//! Size        [width: f64] [height: f64]
//! EdgeInsets  [top: f64] [left: f64] [bottom: f64] [right: f64]
//! ```
//!
//! ## Color range
//! Color components are carried exactly as sent. Values outside `[0, 1]` occur during
//! interpolation and are valid on the wire; clamping to display range is left to the
//! consumer (see [`Rgba::clamped`]).

use crate::error::DecodeError;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Default upper bound for string values (64 KiB)
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Closed enumeration of attribute wire shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    Bool,
    Int,
    Float,
    Double,
    String,
    Color,
    Rect,
    Point,
    Size,
    EdgeInsets,
}

impl AttrType {
    /// Get the tag byte for the wire protocol
    pub fn tag(self) -> u8 {
        match self {
            AttrType::Bool => 1,
            AttrType::Int => 2,
            AttrType::Float => 3,
            AttrType::Double => 4,
            AttrType::String => 5,
            AttrType::Color => 6,
            AttrType::Rect => 7,
            AttrType::Point => 8,
            AttrType::Size => 9,
            AttrType::EdgeInsets => 10,
        }
    }

    /// Resolve a tag byte. Anything outside the enumeration fails closed.
    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(AttrType::Bool),
            2 => Ok(AttrType::Int),
            3 => Ok(AttrType::Float),
            4 => Ok(AttrType::Double),
            5 => Ok(AttrType::String),
            6 => Ok(AttrType::Color),
            7 => Ok(AttrType::Rect),
            8 => Ok(AttrType::Point),
            9 => Ok(AttrType::Size),
            10 => Ok(AttrType::EdgeInsets),
            other => Err(DecodeError::UnknownType(other)),
        }
    }

    /// Encoded size for fixed layouts, `None` for length-prefixed ones
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            AttrType::Bool => Some(1),
            AttrType::Int => Some(8),
            AttrType::Float => Some(4),
            AttrType::Double => Some(8),
            AttrType::String => None,
            AttrType::Color => Some(16),
            AttrType::Rect => Some(32),
            AttrType::Point => Some(16),
            AttrType::Size => Some(16),
            AttrType::EdgeInsets => Some(32),
        }
    }

    pub const ALL: [AttrType; 10] = [
        AttrType::Bool,
        AttrType::Int,
        AttrType::Float,
        AttrType::Double,
        AttrType::String,
        AttrType::Color,
        AttrType::Rect,
        AttrType::Point,
        AttrType::Size,
        AttrType::EdgeInsets,
    ];
}

/// RGBA color, components nominally in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Copy with every component clamped to display range
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// An attribute value; the active variant is its [`AttrType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Color(Rgba),
    Rect(Rect),
    Point(Point),
    Size(Size),
    EdgeInsets(EdgeInsets),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::Double(_) => AttrType::Double,
            AttrValue::String(_) => AttrType::String,
            AttrValue::Color(_) => AttrType::Color,
            AttrValue::Rect(_) => AttrType::Rect,
            AttrValue::Point(_) => AttrType::Point,
            AttrValue::Size(_) => AttrType::Size,
            AttrValue::EdgeInsets(_) => AttrType::EdgeInsets,
        }
    }

    /// Number of bytes [`write_value`] produces for this value
    pub fn encoded_len(&self) -> usize {
        match self {
            AttrValue::String(s) => 4 + s.len(),
            other => other.attr_type().fixed_len().unwrap_or(0),
        }
    }
}

/// Rust types a capability can declare as its parameter.
///
/// The associated [`AttrType`] is fixed at compile time, so a capability's declared
/// parameter type can never drift from the type it actually accepts.
pub trait FromAttrValue: Sized {
    const ATTR_TYPE: AttrType;

    fn from_attr_value(value: AttrValue) -> Option<Self>;
}

macro_rules! attr_value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    AttrValue::$variant(value)
                }
            }

            impl FromAttrValue for $ty {
                const ATTR_TYPE: AttrType = AttrType::$variant;

                fn from_attr_value(value: AttrValue) -> Option<Self> {
                    match value {
                        AttrValue::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

attr_value_conversions! {
    bool => Bool,
    i64 => Int,
    f32 => Float,
    f64 => Double,
    String => String,
    Rgba => Color,
    Rect => Rect,
    Point => Point,
    Size => Size,
    EdgeInsets => EdgeInsets,
}

/// Encode `value` under the declared `attr_type`.
///
/// A value whose variant differs from `attr_type` is refused rather than converted.
pub fn encode(value: &AttrValue, attr_type: AttrType) -> Result<Vec<u8>, DecodeError> {
    if value.attr_type() != attr_type {
        return Err(DecodeError::TypeMismatch {
            declared: attr_type,
            actual: value.attr_type(),
        });
    }
    let mut buf = BytesMut::with_capacity(value.encoded_len());
    write_value(&mut buf, value);
    Ok(buf.to_vec())
}

/// Decode exactly one value of `attr_type` from `bytes`
pub fn decode(bytes: &[u8], attr_type: AttrType) -> Result<AttrValue, DecodeError> {
    let mut cursor = bytes;
    let value = read_value(&mut cursor, attr_type, MAX_STRING_LEN)?;
    if cursor.has_remaining() {
        return Err(DecodeError::MalformedPayload {
            attr_type,
            expected: value.encoded_len(),
            actual: bytes.len(),
        });
    }
    Ok(value)
}

/// Append the layout of `value` to `buf`
pub fn write_value(buf: &mut BytesMut, value: &AttrValue) {
    buf.reserve(value.encoded_len());
    match value {
        AttrValue::Bool(v) => buf.put_u8(u8::from(*v)),
        AttrValue::Int(v) => buf.put_i64(*v),
        AttrValue::Float(v) => buf.put_f32(*v),
        AttrValue::Double(v) => buf.put_f64(*v),
        AttrValue::String(s) => {
            buf.put_u32(s.len() as u32);
            buf.put_slice(s.as_bytes());
        }
        AttrValue::Color(c) => {
            buf.put_f32(c.r);
            buf.put_f32(c.g);
            buf.put_f32(c.b);
            buf.put_f32(c.a);
        }
        AttrValue::Rect(r) => {
            buf.put_f64(r.x);
            buf.put_f64(r.y);
            buf.put_f64(r.width);
            buf.put_f64(r.height);
        }
        AttrValue::Point(p) => {
            buf.put_f64(p.x);
            buf.put_f64(p.y);
        }
        AttrValue::Size(s) => {
            buf.put_f64(s.width);
            buf.put_f64(s.height);
        }
        AttrValue::EdgeInsets(e) => {
            buf.put_f64(e.top);
            buf.put_f64(e.left);
            buf.put_f64(e.bottom);
            buf.put_f64(e.right);
        }
    }
}

/// Read one value of `attr_type` from the front of `cursor`, advancing it.
///
/// Nothing is consumed unless the whole value is present.
pub fn read_value(
    cursor: &mut &[u8],
    attr_type: AttrType,
    max_string_len: usize,
) -> Result<AttrValue, DecodeError> {
    let available = cursor.remaining();
    let malformed = |expected: usize| DecodeError::MalformedPayload {
        attr_type,
        expected,
        actual: available,
    };

    if let Some(len) = attr_type.fixed_len() {
        if available < len {
            return Err(malformed(len));
        }
    }

    let value = match attr_type {
        AttrType::Bool => match cursor[0] {
            0x00 => AttrValue::Bool(false),
            0x01 => AttrValue::Bool(true),
            _ => return Err(malformed(1)),
        },
        AttrType::Int => AttrValue::Int(i64::from_be_bytes(take::<8>(cursor))),
        AttrType::Float => AttrValue::Float(f32::from_be_bytes(take::<4>(cursor))),
        AttrType::Double => AttrValue::Double(f64::from_be_bytes(take::<8>(cursor))),
        AttrType::String => {
            if available < 4 {
                return Err(malformed(4));
            }
            let len = u32::from_be_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]) as usize;
            if len > max_string_len || available - 4 < len {
                return Err(malformed(4 + len));
            }
            let text = std::str::from_utf8(&cursor[4..4 + len])
                .map_err(|_| malformed(4 + len))?
                .to_owned();
            cursor.advance(4 + len);
            AttrValue::String(text)
        }
        AttrType::Color => AttrValue::Color(Rgba {
            r: cursor.get_f32(),
            g: cursor.get_f32(),
            b: cursor.get_f32(),
            a: cursor.get_f32(),
        }),
        AttrType::Rect => AttrValue::Rect(Rect {
            x: cursor.get_f64(),
            y: cursor.get_f64(),
            width: cursor.get_f64(),
            height: cursor.get_f64(),
        }),
        AttrType::Point => AttrValue::Point(Point {
            x: cursor.get_f64(),
            y: cursor.get_f64(),
        }),
        AttrType::Size => AttrValue::Size(Size {
            width: cursor.get_f64(),
            height: cursor.get_f64(),
        }),
        AttrType::EdgeInsets => AttrValue::EdgeInsets(EdgeInsets {
            top: cursor.get_f64(),
            left: cursor.get_f64(),
            bottom: cursor.get_f64(),
            right: cursor.get_f64(),
        }),
    };

    // Bool is matched on a peeked byte
    if attr_type == AttrType::Bool {
        cursor.advance(1);
    }
    Ok(value)
}

/// Length is checked by the caller
#[inline]
fn take<const N: usize>(cursor: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    cursor.copy_to_slice(&mut out);
    out
}
