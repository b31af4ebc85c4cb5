//! Test fixtures: a minimal Level-5 MAT-file encoder plus battery record builders.

use crate::matfile::{Endian, MatStruct, MatValue};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

const MI_INT8: u32 = 1;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

pub const MX_CELL: u32 = 1;
pub const MX_STRUCT: u32 = 2;
const MX_CHAR: u32 = 4;
const MX_DOUBLE: u32 = 6;

const FIELD_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub endian: Endian,
    pub compress: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            compress: false,
        }
    }
}

struct Encoder {
    endian: Endian,
}

impl Encoder {
    fn u16(&self, v: u16) -> [u8; 2] {
        match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        }
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        }
    }

    fn f64(&self, v: f64) -> [u8; 8] {
        match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        }
    }

    fn element(&self, out: &mut Vec<u8>, data_type: u32, payload: &[u8]) {
        out.extend_from_slice(&self.u32(data_type));
        out.extend_from_slice(&self.u32(payload.len() as u32));
        out.extend_from_slice(payload);
        let padding = (8 - payload.len() % 8) % 8;
        out.extend(std::iter::repeat_n(0u8, padding));
    }

    fn matrix(&self, name: &str, value: &MatValue) -> Vec<u8> {
        let mut body = Vec::new();

        let class = match value {
            MatValue::Numeric { .. } => MX_DOUBLE,
            MatValue::Char { .. } => MX_CHAR,
            MatValue::Struct(_) => MX_STRUCT,
            MatValue::Cell { .. } => MX_CELL,
            MatValue::Unsupported { class } => panic!("cannot encode {}", class),
        };
        let mut flags = Vec::new();
        flags.extend_from_slice(&self.u32(class));
        flags.extend_from_slice(&self.u32(0));
        self.element(&mut body, MI_UINT32, &flags);

        let dims: Vec<u8> = value
            .dims()
            .iter()
            .flat_map(|d| self.u32(*d as u32))
            .collect();
        self.element(&mut body, MI_INT32, &dims);
        self.element(&mut body, MI_INT8, name.as_bytes());

        match value {
            MatValue::Numeric { data, .. } => {
                let payload: Vec<u8> = data.iter().flat_map(|v| self.f64(*v)).collect();
                self.element(&mut body, MI_DOUBLE, &payload);
            }
            MatValue::Char { text, .. } => {
                let payload: Vec<u8> = text.encode_utf16().flat_map(|u| self.u16(u)).collect();
                self.element(&mut body, MI_UINT16, &payload);
            }
            MatValue::Struct(s) => {
                self.element(&mut body, MI_INT32, &self.u32(FIELD_NAME_LEN as u32));
                let mut names = Vec::new();
                for field in s.field_names() {
                    let mut padded = field.as_bytes().to_vec();
                    padded.resize(FIELD_NAME_LEN, 0);
                    names.extend(padded);
                }
                self.element(&mut body, MI_INT8, &names);
                for index in 0..s.len() {
                    for field in s.element(index).unwrap_or_default() {
                        body.extend(self.matrix("", field));
                    }
                }
            }
            MatValue::Cell { items, .. } => {
                for item in items {
                    body.extend(self.matrix("", item));
                }
            }
            MatValue::Unsupported { .. } => unreachable!(),
        }

        let mut out = Vec::new();
        self.element(&mut out, MI_MATRIX, &body);
        out
    }
}

/// Encode variables as a complete Level-5 MAT-file
pub fn encode_mat_file(variables: &[(&str, MatValue)], options: EncodeOptions) -> Vec<u8> {
    let encoder = Encoder {
        endian: options.endian,
    };

    let mut out = Vec::new();
    let mut text = b"MATLAB 5.0 MAT-file, Platform: GLNXA64, Created by: battery_processor tests"
        .to_vec();
    text.resize(116, b' ');
    out.extend(text);
    out.extend([0u8; 8]);
    out.extend_from_slice(&encoder.u16(0x0100));
    out.extend_from_slice(match options.endian {
        Endian::Little => b"IM",
        Endian::Big => b"MI",
    });

    for (name, value) in variables {
        let matrix = encoder.matrix(name, value);
        if options.compress {
            let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
            zlib.write_all(&matrix).unwrap();
            let compressed = zlib.finish().unwrap();
            out.extend_from_slice(&encoder.u32(MI_COMPRESSED));
            out.extend_from_slice(&encoder.u32(compressed.len() as u32));
            out.extend(compressed);
        } else {
            out.extend(matrix);
        }
    }

    out
}

/// A MAT-file holding one array header whose declared dimensions are not
/// backed by any element data
pub fn declared_only_matrix_file(class: u32, dims: &[i32], field_names: &[&str]) -> Vec<u8> {
    let encoder = Encoder {
        endian: Endian::Little,
    };

    let mut body = Vec::new();
    let mut flags = class.to_le_bytes().to_vec();
    flags.extend_from_slice(&0u32.to_le_bytes());
    encoder.element(&mut body, MI_UINT32, &flags);
    let dims: Vec<u8> = dims.iter().flat_map(|d| d.to_le_bytes()).collect();
    encoder.element(&mut body, MI_INT32, &dims);
    encoder.element(&mut body, MI_INT8, b"");
    if class == MX_STRUCT {
        encoder.element(&mut body, MI_INT32, &(FIELD_NAME_LEN as i32).to_le_bytes());
        let mut names = Vec::new();
        for field in field_names {
            let mut padded = field.as_bytes().to_vec();
            padded.resize(FIELD_NAME_LEN, 0);
            names.extend(padded);
        }
        encoder.element(&mut body, MI_INT8, &names);
    }

    let mut out = encode_mat_file(&[], EncodeOptions::default());
    encoder.element(&mut out, MI_MATRIX, &body);
    out
}

/// Write a MAT-file into `dir` and return its path
pub fn write_mat_file(dir: &Path, file_name: &str, variables: &[(&str, MatValue)]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, encode_mat_file(variables, EncodeOptions::default())).unwrap();
    path
}

pub const CYCLE_FIELDS: [&str; 4] = ["type", "ambient_temperature", "time", "data"];

/// Samples 0..n spaced by one second, offset by `base`
pub fn series(n: usize, base: f64) -> MatValue {
    MatValue::row(&(0..n).map(|i| base + i as f64).collect::<Vec<_>>())
}

pub fn charge_data(n: usize) -> MatStruct {
    MatStruct::single(vec![
        ("Voltage_measured", series(n, 3.5)),
        ("Current_measured", series(n, 1.5)),
        ("Temperature_measured", series(n, 24.0)),
        ("Current_charge", series(n, 1.4)),
        ("Voltage_charge", series(n, 4.2)),
        ("Time", series(n, 0.0)),
    ])
}

pub fn discharge_data(n: usize, capacity: Option<MatValue>) -> MatStruct {
    let mut fields = vec![
        ("Voltage_measured", series(n, 4.1)),
        ("Current_measured", series(n, -2.0)),
        ("Temperature_measured", series(n, 25.0)),
        ("Current_load", series(n, 2.0)),
        ("Voltage_load", series(n, 3.0)),
        ("Time", series(n, 0.0)),
    ];
    if let Some(capacity) = capacity {
        fields.push(("Capacity", capacity));
    }
    MatStruct::single(fields)
}

pub fn impedance_data() -> MatStruct {
    MatStruct::single(vec![
        ("Sense_current", MatValue::row(&[0.1, 0.2])),
        ("Battery_current", MatValue::row(&[0.1, 0.2])),
        ("Re", MatValue::scalar(0.05)),
        ("Rct", MatValue::scalar(0.08)),
    ])
}

/// One cycle record in the instrument's layout
pub fn cycle(kind: &str, ambient: f64, data: MatStruct) -> Vec<MatValue> {
    vec![
        MatValue::text(kind),
        MatValue::scalar(ambient),
        MatValue::row(&[2008.0, 4.0, 2.0, 13.0, 8.0, 17.9]),
        MatValue::Struct(data),
    ]
}

/// Top-level battery record wrapping the given cycles
pub fn battery_record(cycles: Vec<Vec<MatValue>>) -> MatValue {
    MatValue::Struct(MatStruct::single(vec![(
        "cycle",
        MatValue::Struct(MatStruct::row_of(&CYCLE_FIELDS, cycles)),
    )]))
}

/// Copy of a 1x1 struct without `field`
pub fn without_field(data: &MatStruct, field: &str) -> MatStruct {
    let values = data.element(0).unwrap_or_default();
    let (names, values): (Vec<String>, Vec<MatValue>) = data
        .field_names()
        .iter()
        .cloned()
        .zip(values.iter().cloned())
        .filter(|(name, _)| name != field)
        .unzip();
    MatStruct::new(vec![1, 1], names, vec![values])
}

/// Copy of a 1x1 struct with `field` replaced by `value`
pub fn with_field(data: &MatStruct, field: &str, value: MatValue) -> MatStruct {
    let values = data.element(0).unwrap_or_default();
    let values: Vec<MatValue> = data
        .field_names()
        .iter()
        .zip(values.iter())
        .map(|(name, v)| if name == field { value.clone() } else { v.clone() })
        .collect();
    MatStruct::new(vec![1, 1], data.field_names().to_vec(), vec![values])
}
