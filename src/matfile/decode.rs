//! Level-5 data element decoding.
//!
//! A MAT-file body is a sequence of tagged data elements. Variables are
//! `miMATRIX` elements, optionally wrapped in zlib-compressed
//! `miCOMPRESSED` elements.

use super::value::{MatStruct, MatValue, checked_numel};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::debug;

pub(crate) const MI_INT8: u32 = 1;
pub(crate) const MI_UINT8: u32 = 2;
pub(crate) const MI_INT16: u32 = 3;
pub(crate) const MI_UINT16: u32 = 4;
pub(crate) const MI_INT32: u32 = 5;
pub(crate) const MI_UINT32: u32 = 6;
pub(crate) const MI_SINGLE: u32 = 7;
pub(crate) const MI_DOUBLE: u32 = 9;
pub(crate) const MI_INT64: u32 = 12;
pub(crate) const MI_UINT64: u32 = 13;
pub(crate) const MI_MATRIX: u32 = 14;
pub(crate) const MI_COMPRESSED: u32 = 15;
pub(crate) const MI_UTF8: u32 = 16;
pub(crate) const MI_UTF16: u32 = 17;

pub(crate) const MX_CELL: u32 = 1;
pub(crate) const MX_STRUCT: u32 = 2;
pub(crate) const MX_OBJECT: u32 = 3;
pub(crate) const MX_CHAR: u32 = 4;
pub(crate) const MX_SPARSE: u32 = 5;
pub(crate) const MX_DOUBLE: u32 = 6;
pub(crate) const MX_UINT64: u32 = 15;

/// Limit on cell/struct nesting so a hostile file cannot blow the stack
const MAX_DEPTH: usize = 64;

/// Smallest possible encoded element: one 8-byte tag
const MIN_ELEMENT_LEN: usize = 8;

/// Field-less struct elements occupy no bytes, so their count is capped directly
const MAX_FIELDLESS_ELEMENTS: usize = 1 << 16;

pub(crate) type DecodeResult<T> = std::result::Result<T, String>;

/// Byte order declared by the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        }
    }

    fn i16(self, b: &[u8]) -> i16 {
        match self {
            Endian::Little => LittleEndian::read_i16(b),
            Endian::Big => BigEndian::read_i16(b),
        }
    }

    pub(crate) fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(b),
            Endian::Big => BigEndian::read_i32(b),
        }
    }

    fn i64(self, b: &[u8]) -> i64 {
        match self {
            Endian::Little => LittleEndian::read_i64(b),
            Endian::Big => BigEndian::read_i64(b),
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        }
    }

    fn f32(self, b: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(b),
            Endian::Big => BigEndian::read_f32(b),
        }
    }

    fn f64(self, b: &[u8]) -> f64 {
        match self {
            Endian::Little => LittleEndian::read_f64(b),
            Endian::Big => BigEndian::read_f64(b),
        }
    }

    /// Header version field, read with this byte order
    pub(crate) fn version(self, b: &[u8]) -> u16 {
        self.u16(b)
    }
}

struct Element<'a> {
    data_type: u32,
    bytes: &'a [u8],
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(format!(
                "truncated element at byte {}: need {} bytes, {} left",
                self.pos,
                n,
                self.remaining()
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> DecodeResult<u32> {
        let bytes = self.take(4)?;
        Ok(self.endian.u32(bytes))
    }

    fn next_element(&mut self) -> DecodeResult<Option<Element<'a>>> {
        if self.remaining() == 0 {
            return Ok(None);
        }

        let first = self.read_u32()?;
        let small_len = (first >> 16) as usize;
        if small_len != 0 {
            // Small data element: type and length packed into one word
            if small_len > 4 {
                return Err(format!("invalid small element length {}", small_len));
            }
            let payload = self.take(4)?;
            return Ok(Some(Element {
                data_type: first & 0xFFFF,
                bytes: &payload[..small_len],
            }));
        }

        let data_type = first;
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;

        if data_type != MI_COMPRESSED {
            let padding = (8 - len % 8) % 8;
            self.pos += padding.min(self.remaining());
        }

        Ok(Some(Element { data_type, bytes }))
    }

    fn expect_element(&mut self, what: &str) -> DecodeResult<Element<'a>> {
        self.next_element()?
            .ok_or_else(|| format!("array ended before {}", what))
    }
}

/// Decode every top-level variable in file order
pub(crate) fn decode_variables(body: &[u8], endian: Endian) -> DecodeResult<Vec<(String, MatValue)>> {
    let mut cursor = Cursor::new(body, endian);
    let mut variables = Vec::new();

    while let Some(element) = cursor.next_element()? {
        match element.data_type {
            MI_MATRIX => variables.push(decode_matrix(element.bytes, endian, 0)?),
            MI_COMPRESSED => {
                let inflated = inflate(element.bytes)?;
                let mut inner = Cursor::new(&inflated, endian);
                while let Some(nested) = inner.next_element()? {
                    if nested.data_type == MI_MATRIX {
                        variables.push(decode_matrix(nested.bytes, endian, 0)?);
                    } else {
                        debug!("Ignoring compressed element of type {}", nested.data_type);
                    }
                }
            }
            other => debug!("Ignoring top-level element of type {}", other),
        }
    }

    Ok(variables)
}

fn inflate(bytes: &[u8]) -> DecodeResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| format!("corrupt compressed element: {}", e))?;
    Ok(out)
}

fn decode_matrix(bytes: &[u8], endian: Endian, depth: usize) -> DecodeResult<(String, MatValue)> {
    if depth > MAX_DEPTH {
        return Err(format!("arrays nested deeper than {} levels", MAX_DEPTH));
    }

    // A zero-length miMATRIX is how writers store []
    if bytes.is_empty() {
        return Ok((
            String::new(),
            MatValue::Numeric {
                dims: vec![0, 0],
                data: Vec::new(),
            },
        ));
    }

    let mut cursor = Cursor::new(bytes, endian);

    let flags = cursor.expect_element("array flags")?;
    if flags.bytes.len() < 4 {
        return Err("array flags element too short".to_string());
    }
    let class = endian.u32(&flags.bytes[..4]) & 0xFF;

    let dims_element = cursor.expect_element("dimensions")?;
    let dims = decode_numeric(dims_element.data_type, dims_element.bytes, endian)?
        .into_iter()
        .map(|d| if d < 0.0 { 0 } else { d as usize })
        .collect::<Vec<_>>();

    let name_element = cursor.expect_element("array name")?;
    let name = String::from_utf8_lossy(name_element.bytes)
        .trim_end_matches('\0')
        .to_string();

    let count = checked_numel(&dims)
        .ok_or_else(|| format!("array '{}' has overflowing dimensions {:?}", name, dims))?;

    let value = match class {
        MX_CELL => {
            ensure_room(&cursor, count, "cell items")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let item = cursor.expect_element("cell item")?;
                if item.data_type != MI_MATRIX {
                    return Err(format!("cell item has element type {}", item.data_type));
                }
                items.push(decode_matrix(item.bytes, endian, depth + 1)?.1);
            }
            MatValue::Cell { dims, items }
        }
        MX_STRUCT => MatValue::Struct(decode_struct(&mut cursor, dims, count, endian, depth)?),
        MX_CHAR => {
            let text = match cursor.next_element()? {
                Some(data) => decode_text(data.data_type, data.bytes, endian)?,
                None => String::new(),
            };
            MatValue::Char {
                text: char_rows(&text, &dims),
                dims,
            }
        }
        MX_DOUBLE..=MX_UINT64 => {
            let data = match cursor.next_element()? {
                Some(real) => decode_numeric(real.data_type, real.bytes, endian)?,
                None => Vec::new(),
            };
            if data.len() != count {
                return Err(format!(
                    "array '{}' declares {} elements but holds {}",
                    name,
                    count,
                    data.len()
                ));
            }
            // Any imaginary part that follows is dropped
            MatValue::Numeric { dims, data }
        }
        MX_OBJECT => MatValue::Unsupported {
            class: "object".to_string(),
        },
        MX_SPARSE => MatValue::Unsupported {
            class: "sparse".to_string(),
        },
        other => MatValue::Unsupported {
            class: format!("class {}", other),
        },
    };

    Ok((name, value))
}

fn decode_struct(
    cursor: &mut Cursor<'_>,
    dims: Vec<usize>,
    count: usize,
    endian: Endian,
    depth: usize,
) -> DecodeResult<MatStruct> {
    let len_element = cursor.expect_element("field name length")?;
    let name_len = decode_numeric(len_element.data_type, len_element.bytes, endian)?
        .first()
        .copied()
        .unwrap_or(0.0) as usize;

    let names_element = cursor.expect_element("field names")?;
    let field_names: Vec<String> = if name_len == 0 {
        Vec::new()
    } else {
        names_element
            .bytes
            .chunks(name_len)
            .map(|chunk| {
                let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
                String::from_utf8_lossy(&chunk[..end]).to_string()
            })
            .collect()
    };

    if field_names.is_empty() {
        if count > MAX_FIELDLESS_ELEMENTS {
            return Err(format!(
                "field-less struct declares {} elements, limit is {}",
                count, MAX_FIELDLESS_ELEMENTS
            ));
        }
    } else {
        let values = count
            .checked_mul(field_names.len())
            .ok_or_else(|| format!("struct declares too many values ({} elements)", count))?;
        ensure_room(cursor, values, "struct fields")?;
    }

    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        let mut values = Vec::with_capacity(field_names.len());
        for field in &field_names {
            let element = cursor.expect_element(&format!("field '{}'", field))?;
            if element.data_type != MI_MATRIX {
                return Err(format!(
                    "field '{}' has element type {}",
                    field, element.data_type
                ));
            }
            values.push(decode_matrix(element.bytes, endian, depth + 1)?.1);
        }
        elements.push(values);
    }

    Ok(MatStruct::new(dims, field_names, elements))
}

/// Reject counts the remaining bytes cannot possibly hold
fn ensure_room(cursor: &Cursor<'_>, elements: usize, what: &str) -> DecodeResult<()> {
    let capacity = cursor.remaining() / MIN_ELEMENT_LEN;
    if elements > capacity {
        return Err(format!(
            "truncated array: {} {} declared, room for at most {}",
            elements, what, capacity
        ));
    }
    Ok(())
}

fn decode_numeric(data_type: u32, bytes: &[u8], endian: Endian) -> DecodeResult<Vec<f64>> {
    let width = match data_type {
        MI_INT8 | MI_UINT8 | MI_UTF8 => 1,
        MI_INT16 | MI_UINT16 | MI_UTF16 => 2,
        MI_INT32 | MI_UINT32 | MI_SINGLE => 4,
        MI_DOUBLE | MI_INT64 | MI_UINT64 => 8,
        other => return Err(format!("element type {} is not numeric", other)),
    };
    if bytes.len() % width != 0 {
        return Err(format!(
            "{} bytes is not a multiple of the {}-byte element width",
            bytes.len(),
            width
        ));
    }

    let values = bytes.chunks_exact(width).map(|b| match data_type {
        MI_INT8 => b[0] as i8 as f64,
        MI_UINT8 | MI_UTF8 => b[0] as f64,
        MI_INT16 => endian.i16(b) as f64,
        MI_UINT16 | MI_UTF16 => endian.u16(b) as f64,
        MI_INT32 => endian.i32(b) as f64,
        MI_UINT32 => endian.u32(b) as f64,
        MI_SINGLE => endian.f32(b) as f64,
        MI_INT64 => endian.i64(b) as f64,
        MI_UINT64 => endian.u64(b) as f64,
        _ => endian.f64(b),
    });

    Ok(values.collect())
}

fn decode_text(data_type: u32, bytes: &[u8], endian: Endian) -> DecodeResult<String> {
    match data_type {
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = bytes.chunks_exact(2).map(|b| endian.u16(b)).collect();
            Ok(String::from_utf16_lossy(&units))
        }
        MI_UTF8 | MI_INT8 | MI_UINT8 => Ok(String::from_utf8_lossy(bytes).to_string()),
        other => Ok(decode_numeric(other, bytes, endian)?
            .into_iter()
            .filter_map(|code| char::from_u32(code as u32))
            .collect()),
    }
}

/// Char arrays are stored column-major; rebuild rows joined by newlines
fn char_rows(text: &str, dims: &[usize]) -> String {
    let rows = dims.first().copied().unwrap_or(1);
    let chars: Vec<char> = text.chars().collect();
    // Dimensions that do not fit the text are ignored
    if rows <= 1 || rows > chars.len() || chars.len() % rows != 0 {
        return text.to_string();
    }
    let cols = chars.len() / rows;
    (0..rows)
        .map(|r| (0..cols).map(|c| chars[c * rows + r]).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
