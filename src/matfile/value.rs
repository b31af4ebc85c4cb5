//! In-memory representation of decoded MAT-file arrays.

/// One decoded MATLAB array
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    /// Any numeric or logical class, widened to f64 and stored column-major
    Numeric { dims: Vec<usize>, data: Vec<f64> },
    Char { dims: Vec<usize>, text: String },
    Struct(MatStruct),
    Cell { dims: Vec<usize>, items: Vec<MatValue> },
    /// Sparse matrices, objects and anything else we do not interpret
    Unsupported { class: String },
}

impl MatValue {
    /// Row vector of doubles
    pub fn row(values: &[f64]) -> Self {
        MatValue::Numeric {
            dims: vec![1, values.len()],
            data: values.to_vec(),
        }
    }

    /// 1x1 double
    pub fn scalar(value: f64) -> Self {
        MatValue::Numeric {
            dims: vec![1, 1],
            data: vec![value],
        }
    }

    pub fn text(text: &str) -> Self {
        MatValue::Char {
            dims: vec![1, text.chars().count()],
            text: text.to_string(),
        }
    }

    /// 1x1 cell wrapping `value`
    pub fn wrapped(value: MatValue) -> Self {
        MatValue::Cell {
            dims: vec![1, 1],
            items: vec![value],
        }
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            MatValue::Numeric { dims, .. }
            | MatValue::Char { dims, .. }
            | MatValue::Cell { dims, .. } => dims,
            MatValue::Struct(s) => s.dims(),
            MatValue::Unsupported { .. } => &[],
        }
    }

    /// Number of elements (product of dimensions)
    pub fn numel(&self) -> usize {
        match self {
            MatValue::Unsupported { .. } => 0,
            other => numel(other.dims()),
        }
    }

    pub fn as_struct(&self) -> Option<&MatStruct> {
        match self {
            MatValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            MatValue::Numeric { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Text content, looking through single-element cells
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MatValue::Char { text, .. } => Some(text),
            MatValue::Cell { items, .. } if items.len() == 1 => items[0].as_text(),
            _ => None,
        }
    }

    /// Short human-readable description used in log messages
    pub fn describe(&self) -> String {
        let shape = self
            .dims()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        match self {
            MatValue::Numeric { .. } => format!("{} numeric", shape),
            MatValue::Char { .. } => format!("{} char", shape),
            MatValue::Struct(_) => format!("{} struct", shape),
            MatValue::Cell { .. } => format!("{} cell", shape),
            MatValue::Unsupported { class } => format!("unsupported {}", class),
        }
    }
}

/// Element count, saturating at `usize::MAX` for absurd dimensions
pub(crate) fn numel(dims: &[usize]) -> usize {
    checked_numel(dims).unwrap_or(usize::MAX)
}

/// Element count, or None when the product overflows
pub(crate) fn checked_numel(dims: &[usize]) -> Option<usize> {
    if dims.is_empty() {
        Some(0)
    } else {
        dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
    }
}

/// A struct array: every element carries one value per field
#[derive(Debug, Clone, PartialEq)]
pub struct MatStruct {
    dims: Vec<usize>,
    field_names: Vec<String>,
    elements: Vec<Vec<MatValue>>,
}

impl MatStruct {
    /// Build a struct array. Each element must hold exactly one value per field.
    pub fn new(dims: Vec<usize>, field_names: Vec<String>, elements: Vec<Vec<MatValue>>) -> Self {
        debug_assert!(elements.iter().all(|e| e.len() == field_names.len()));
        Self {
            dims,
            field_names,
            elements,
        }
    }

    /// Build a 1x1 struct from `(field, value)` pairs
    pub fn single(fields: Vec<(&str, MatValue)>) -> Self {
        let (names, values): (Vec<_>, Vec<_>) = fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .unzip();
        Self::new(vec![1, 1], names, vec![values])
    }

    /// Build a 1xN struct array from records that share one field list
    pub fn row_of(field_names: &[&str], elements: Vec<Vec<MatValue>>) -> Self {
        Self::new(
            vec![1, elements.len()],
            field_names.iter().map(|n| n.to_string()).collect(),
            elements,
        )
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_names.iter().any(|f| f == name)
    }

    /// Value of `name` in element `index`
    pub fn field(&self, index: usize, name: &str) -> Option<&MatValue> {
        let position = self.field_names.iter().position(|f| f == name)?;
        self.elements.get(index).and_then(|e| e.get(position))
    }

    pub fn element(&self, index: usize) -> Option<&[MatValue]> {
        self.elements.get(index).map(|e| e.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_field_lookup() {
        let s = MatStruct::single(vec![
            ("type", MatValue::text("charge")),
            ("ambient_temperature", MatValue::scalar(24.0)),
        ]);

        assert_eq!(s.len(), 1);
        assert!(s.has_field("type"));
        assert!(!s.has_field("data"));
        assert_eq!(s.field(0, "type").and_then(|v| v.as_text()), Some("charge"));
        assert_eq!(s.field(1, "type"), None);
    }

    #[test]
    fn test_text_through_cell() {
        let value = MatValue::wrapped(MatValue::text("discharge"));
        assert_eq!(value.as_text(), Some("discharge"));
        assert_eq!(value.numel(), 1);
        assert_eq!(value.describe(), "1x1 cell");
    }

    #[test]
    fn test_numel_overflow() {
        assert_eq!(checked_numel(&[]), Some(0));
        assert_eq!(checked_numel(&[3, 0]), Some(0));
        assert_eq!(checked_numel(&[usize::MAX, 2]), None);
        assert_eq!(numel(&[usize::MAX, 2]), usize::MAX);
    }
}
