use crate::scx_internal_error;
use crate::scx_type_error;
use crate::utils::err::*;
use crate::utils::info::Info;

use strum_macros::{EnumIter, FromRepr};

use std::fmt;

// The scalar/vector/matrix grid. The numerical layout is load-bearing: scalars come first in
// promotion order, vectors are grouped by base type (three sizes per base) and matrices by base
// type (nine shapes per base), so shape conversions are plain index arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, EnumIter, FromRepr)]
#[repr(u8)]
pub enum DataType {
    Bool, Int, UInt, Half, Float, Double,

    Bool2, Bool3, Bool4,
    Int2, Int3, Int4,
    UInt2, UInt3, UInt4,
    Half2, Half3, Half4,
    Float2, Float3, Float4,
    Double2, Double3, Double4,

    Bool2x2, Bool2x3, Bool2x4, Bool3x2, Bool3x3, Bool3x4, Bool4x2, Bool4x3, Bool4x4,
    Int2x2, Int2x3, Int2x4, Int3x2, Int3x3, Int3x4, Int4x2, Int4x3, Int4x4,
    UInt2x2, UInt2x3, UInt2x4, UInt3x2, UInt3x3, UInt3x4, UInt4x2, UInt4x3, UInt4x4,
    Half2x2, Half2x3, Half2x4, Half3x2, Half3x3, Half3x4, Half4x2, Half4x3, Half4x4,
    Float2x2, Float2x3, Float2x4, Float3x2, Float3x3, Float3x4, Float4x2, Float4x3, Float4x4,
    Double2x2, Double2x3, Double2x4, Double3x2, Double3x3, Double3x4, Double4x2, Double4x3,
    Double4x4,

    String,
}

fn idx(t: DataType) -> u8 {
    t as u8
}

impl DataType {
    pub fn is_scalar(&self) -> bool {
        *self >= DataType::Bool && *self <= DataType::Double
    }

    pub fn is_vector(&self) -> bool {
        *self >= DataType::Bool2 && *self <= DataType::Double4
    }

    pub fn is_matrix(&self) -> bool {
        *self >= DataType::Bool2x2 && *self <= DataType::Double4x4
    }

    pub fn is_boolean(&self) -> bool {
        self.base() == DataType::Bool
    }

    pub fn is_integral(&self) -> bool {
        let b = self.base();
        b == DataType::Int || b == DataType::UInt
    }

    pub fn is_real(&self) -> bool {
        let b = self.base();
        b >= DataType::Half && b <= DataType::Double
    }

    pub fn is_half(&self) -> bool {
        self.base() == DataType::Half
    }

    pub fn is_double(&self) -> bool {
        self.base() == DataType::Double
    }

    // Strips vector and matrix shapes down to the scalar component type.
    pub fn base(&self) -> DataType {
        if self.is_vector() {
            let ofs = (idx(*self) - idx(DataType::Bool2)) / 3;
            DataType::from_repr(idx(DataType::Bool) + ofs).unwrap()
        } else if self.is_matrix() {
            let ofs = (idx(*self) - idx(DataType::Bool2x2)) / 9;
            DataType::from_repr(idx(DataType::Bool) + ofs).unwrap()
        } else {
            *self
        }
    }

    pub fn vector_dim(&self) -> usize {
        if self.is_scalar() {
            1
        } else if self.is_vector() {
            ((idx(*self) - idx(DataType::Bool2)) % 3 + 2) as usize
        } else {
            0
        }
    }

    pub fn matrix_dim(&self) -> (usize, usize) {
        if self.is_scalar() {
            (1, 1)
        } else if self.is_vector() {
            (self.vector_dim(), 1)
        } else if self.is_matrix() {
            let shape = (idx(*self) - idx(DataType::Bool2x2)) % 9;
            ((shape / 3 + 2) as usize, (shape % 3 + 2) as usize)
        } else {
            (0, 0)
        }
    }
}

pub fn vector_data_type(base: DataType, dim: usize) -> Option<DataType> {
    if !base.is_scalar() {
        return None;
    }
    match dim {
        1 => Some(base),
        2..=4 => {
            let ofs = idx(base) - idx(DataType::Bool);
            DataType::from_repr(idx(DataType::Bool2) + ofs * 3 + (dim as u8 - 2))
        },
        _ => None,
    }
}

pub fn matrix_data_type(base: DataType, rows: usize, cols: usize) -> Option<DataType> {
    if !base.is_scalar() {
        return None;
    }
    match (rows, cols) {
        (1, 1) => Some(base),
        (1, n) | (n, 1) => vector_data_type(base, n),
        (2..=4, 2..=4) => {
            let ofs = idx(base) - idx(DataType::Bool);
            let shape = (rows as u8 - 2) * 3 + (cols as u8 - 2);
            DataType::from_repr(idx(DataType::Bool2x2) + ofs * 9 + shape)
        },
        _ => None,
    }
}

// Narrows every double-based shape to its float counterpart; all other types pass through.
pub fn double_to_float(t: DataType) -> DataType {
    let base = t.base();
    if base != DataType::Double {
        return t;
    }
    if t.is_scalar() {
        DataType::Float
    } else if t.is_vector() {
        vector_data_type(DataType::Float, t.vector_dim()).unwrap()
    } else {
        let (r, c) = t.matrix_dim();
        matrix_data_type(DataType::Float, r, c).unwrap()
    }
}

fn swizzle_dim(subscript: &str, dim: usize, i: &Info) -> CompileResult<usize> {
    let len = subscript.len();
    if len < 1 || len > 4 {
        return scx_type_error!(i, "Vector subscript cannot have {len} components");
    }
    let in_set = |set: &str| {
        subscript.chars().all(|c| set[..dim].contains(c))
    };
    if in_set("xyzw") || in_set("rgba") {
        Ok(len)
    } else {
        scx_type_error!(i, "Invalid subscript '{subscript}' for vector dimension {dim}")
    }
}

// Parses a chain of matrix subscripts, either zero-based ("_m00_m11") or one-based ("_11_22").
// The two bases must not be mixed within one chain.
fn matrix_swizzle_dim(
    subscript: &str,
    rows: usize,
    cols: usize,
    i: &Info
) -> CompileResult<usize> {
    let s = subscript.as_bytes();
    let mut pos = 0;
    let mut count = 0;
    let mut zero_based: Option<bool> = None;
    while pos < s.len() {
        if s[pos] != b'_' {
            return scx_type_error!(i, "Invalid character in matrix subscript '{subscript}'");
        }
        pos += 1;
        let zb = pos < s.len() && s[pos] == b'm';
        if zb {
            pos += 1;
        }
        match zero_based {
            Some(prev) if prev != zb => {
                return scx_type_error!(
                    i, "Matrix subscript '{subscript}' mixes zero-based and one-based entries"
                );
            },
            _ => zero_based = Some(zb),
        }
        if pos + 2 > s.len() {
            return scx_type_error!(i, "Incomplete matrix subscript '{subscript}'");
        }
        let lo = if zb { b'0' } else { b'1' };
        let r = s[pos].wrapping_sub(lo) as usize;
        let c = s[pos + 1].wrapping_sub(lo) as usize;
        if s[pos] < lo || s[pos + 1] < lo || r >= rows || c >= cols {
            return scx_type_error!(
                i, "Matrix subscript '{subscript}' is outside the {rows}x{cols} shape"
            );
        }
        pos += 2;
        count += 1;
    }
    if count < 1 || count > 4 {
        scx_type_error!(i, "Matrix subscript cannot have {count} components")
    } else {
        Ok(count)
    }
}

// The data type produced by subscripting a vector with a swizzle or a matrix with an "_mRC"/"_RC"
// chain. Scalars admit single-component swizzles ("f.x") like one-element vectors.
pub fn subscript_data_type(t: DataType, subscript: &str, i: &Info) -> CompileResult<DataType> {
    let (rows, cols) = t.matrix_dim();
    let dim = if t.is_matrix() {
        matrix_swizzle_dim(subscript, rows, cols, i)?
    } else if t.is_scalar() || t.is_vector() {
        swizzle_dim(subscript, rows, i)?
    } else {
        return scx_type_error!(i, "Cannot subscript non-numeric type {t}");
    };
    match vector_data_type(t.base(), dim) {
        Some(r) => Ok(r),
        None => scx_internal_error!(i, "Subscript produced no valid vector type"),
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == DataType::String {
            return write!(f, "string");
        }
        let base = match self.base() {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Half => "half",
            DataType::Float => "float",
            DataType::Double => "double",
            _ => unreachable!(),
        };
        if self.is_scalar() {
            write!(f, "{base}")
        } else if self.is_vector() {
            write!(f, "{base}{0}", self.vector_dim())
        } else {
            let (r, c) = self.matrix_dim();
            write!(f, "{base}{r}x{c}")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    fn i() -> Info {
        Info::default()
    }

    #[test]
    fn vector_round_trip() {
        for t in DataType::iter().filter(|t| t.is_vector()) {
            let back = vector_data_type(t.base(), t.vector_dim());
            assert_eq!(back, Some(t), "round trip failed for {t}");
        }
    }

    #[test]
    fn matrix_round_trip() {
        for t in DataType::iter().filter(|t| t.is_matrix()) {
            let (r, c) = t.matrix_dim();
            assert_eq!(matrix_data_type(t.base(), r, c), Some(t));
        }
    }

    #[test]
    fn degenerate_matrix_shapes_collapse() {
        assert_eq!(matrix_data_type(DataType::Float, 1, 1), Some(DataType::Float));
        assert_eq!(matrix_data_type(DataType::Float, 1, 3), Some(DataType::Float3));
        assert_eq!(matrix_data_type(DataType::Float, 4, 1), Some(DataType::Float4));
    }

    #[test]
    fn base_strips_shape() {
        assert_eq!(DataType::UInt3.base(), DataType::UInt);
        assert_eq!(DataType::Double4x4.base(), DataType::Double);
        assert_eq!(DataType::Half.base(), DataType::Half);
    }

    #[test]
    fn classification_predicates() {
        assert!(DataType::Int2x2.is_integral());
        assert!(DataType::Half3.is_real());
        assert!(DataType::Bool4.is_boolean());
        assert!(!DataType::Float.is_integral());
        assert!(DataType::Double2.is_double());
    }

    #[test]
    fn swizzle_types() {
        assert_eq!(
            subscript_data_type(DataType::Float4, "xyz", &i()).unwrap(),
            DataType::Float3
        );
        assert_eq!(
            subscript_data_type(DataType::Float3, "rgb", &i()).unwrap(),
            DataType::Float3
        );
        assert_eq!(
            subscript_data_type(DataType::Float, "x", &i()).unwrap(),
            DataType::Float
        );
    }

    #[test]
    fn swizzle_rejects_out_of_range_and_mixed_sets() {
        assert!(subscript_data_type(DataType::Float, "xyzw", &i()).is_err());
        assert!(subscript_data_type(DataType::Float2, "xz", &i()).is_err());
        assert!(subscript_data_type(DataType::Float4, "xg", &i()).is_err());
    }

    #[test]
    fn matrix_subscripts() {
        assert_eq!(
            subscript_data_type(DataType::Float4x4, "_m00", &i()).unwrap(),
            DataType::Float
        );
        assert_eq!(
            subscript_data_type(DataType::Float4x4, "_m00_m11_m22", &i()).unwrap(),
            DataType::Float3
        );
        assert_eq!(
            subscript_data_type(DataType::Float2x2, "_11_22", &i()).unwrap(),
            DataType::Float2
        );
    }

    #[test]
    fn matrix_subscript_rejects_mixed_bases() {
        assert!(subscript_data_type(DataType::Float4x4, "_m00_11", &i()).is_err());
        assert!(subscript_data_type(DataType::Float2x2, "_m22", &i()).is_err());
        assert!(subscript_data_type(DataType::Float4x4, "_m0", &i()).is_err());
    }

    #[test]
    fn double_narrowing() {
        assert_eq!(double_to_float(DataType::Double), DataType::Float);
        assert_eq!(double_to_float(DataType::Double3), DataType::Float3);
        assert_eq!(double_to_float(DataType::Double4x4), DataType::Float4x4);
        assert_eq!(double_to_float(DataType::Int2), DataType::Int2);
    }

    #[test]
    fn display_names() {
        assert_eq!(format!("{0}", DataType::Float4), "float4");
        assert_eq!(format!("{0}", DataType::Half2x3), "half2x3");
        assert_eq!(format!("{0}", DataType::UInt), "uint");
    }
}
