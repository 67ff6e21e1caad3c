use super::ast::SamplerValue;
use crate::scx_semantic_error;
use crate::utils::err::*;

use std::fmt;

// Effect-file sampler-state values. The generated code never carries them (separate samplers
// fold into combined ones), but declarations are still validated: unknown keys or values and
// contradictory duplicate entries are errors, and the parsed description is available to
// reflection consumers.

pub static FILTERS: phf::Set<&'static str> = phf::phf_set! {
    "MIN_MAG_MIP_POINT",
    "MIN_MAG_POINT_MIP_LINEAR",
    "MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MIN_POINT_MAG_MIP_LINEAR",
    "MIN_LINEAR_MAG_MIP_POINT",
    "MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MIN_MAG_LINEAR_MIP_POINT",
    "MIN_MAG_MIP_LINEAR",
    "ANISOTROPIC",
    "COMPARISON_MIN_MAG_MIP_POINT",
    "COMPARISON_MIN_MAG_POINT_MIP_LINEAR",
    "COMPARISON_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "COMPARISON_MIN_POINT_MAG_MIP_LINEAR",
    "COMPARISON_MIN_LINEAR_MAG_MIP_POINT",
    "COMPARISON_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "COMPARISON_MIN_MAG_LINEAR_MIP_POINT",
    "COMPARISON_MIN_MAG_MIP_LINEAR",
    "COMPARISON_ANISOTROPIC",
    "MINIMUM_MIN_MAG_MIP_POINT",
    "MINIMUM_MIN_MAG_POINT_MIP_LINEAR",
    "MINIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MINIMUM_MIN_POINT_MAG_MIP_LINEAR",
    "MINIMUM_MIN_LINEAR_MAG_MIP_POINT",
    "MINIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MINIMUM_MIN_MAG_LINEAR_MIP_POINT",
    "MINIMUM_MIN_MAG_MIP_LINEAR",
    "MINIMUM_ANISOTROPIC",
    "MAXIMUM_MIN_MAG_MIP_POINT",
    "MAXIMUM_MIN_MAG_POINT_MIP_LINEAR",
    "MAXIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MAXIMUM_MIN_POINT_MAG_MIP_LINEAR",
    "MAXIMUM_MIN_LINEAR_MAG_MIP_POINT",
    "MAXIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MAXIMUM_MIN_MAG_LINEAR_MIP_POINT",
    "MAXIMUM_MIN_MAG_MIP_LINEAR",
    "MAXIMUM_ANISOTROPIC",
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureAddressMode {
    Wrap, Mirror, Clamp, Border, MirrorOnce,
}

impl TextureAddressMode {
    pub fn parse(s: &str) -> Option<TextureAddressMode> {
        match s {
            "WRAP" => Some(TextureAddressMode::Wrap),
            "MIRROR" => Some(TextureAddressMode::Mirror),
            "CLAMP" => Some(TextureAddressMode::Clamp),
            "BORDER" => Some(TextureAddressMode::Border),
            "MIRROR_ONCE" => Some(TextureAddressMode::MirrorOnce),
            _ => None,
        }
    }
}

impl fmt::Display for TextureAddressMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TextureAddressMode::Wrap => "WRAP",
            TextureAddressMode::Mirror => "MIRROR",
            TextureAddressMode::Clamp => "CLAMP",
            TextureAddressMode::Border => "BORDER",
            TextureAddressMode::MirrorOnce => "MIRROR_ONCE",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonFunc {
    Never, Less, Equal, LessEqual, Greater, NotEqual, GreaterEqual, Always,
}

impl ComparisonFunc {
    pub fn parse(s: &str) -> Option<ComparisonFunc> {
        match s {
            "NEVER" => Some(ComparisonFunc::Never),
            "LESS" => Some(ComparisonFunc::Less),
            "EQUAL" => Some(ComparisonFunc::Equal),
            "LESS_EQUAL" => Some(ComparisonFunc::LessEqual),
            "GREATER" => Some(ComparisonFunc::Greater),
            "NOT_EQUAL" => Some(ComparisonFunc::NotEqual),
            "GREATER_EQUAL" => Some(ComparisonFunc::GreaterEqual),
            "ALWAYS" => Some(ComparisonFunc::Always),
        _ => None,
        }
    }
}

impl fmt::Display for ComparisonFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ComparisonFunc::Never => "NEVER",
            ComparisonFunc::Less => "LESS",
            ComparisonFunc::Equal => "EQUAL",
            ComparisonFunc::LessEqual => "LESS_EQUAL",
            ComparisonFunc::Greater => "GREATER",
            ComparisonFunc::NotEqual => "NOT_EQUAL",
            ComparisonFunc::GreaterEqual => "GREATER_EQUAL",
            ComparisonFunc::Always => "ALWAYS",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Default)]
pub struct SamplerStateDesc {
    pub filter: Option<String>,
    pub address_u: Option<TextureAddressMode>,
    pub address_v: Option<TextureAddressMode>,
    pub address_w: Option<TextureAddressMode>,
    pub comparison: Option<ComparisonFunc>,
}

fn set_once<T: PartialEq + fmt::Debug>(
    slot: &mut Option<T>,
    value: T,
    v: &SamplerValue
) -> CompileResult<()> {
    match slot {
        Some(prev) if *prev != value => {
            scx_semantic_error!(
                v.i,
                "Contradictory sampler state: '{0}' was already set to {prev:?}",
                v.key
            )
        },
        _ => {
            *slot = Some(value);
            Ok(())
        },
    }
}

pub fn validate(values: &[SamplerValue]) -> CompileResult<SamplerStateDesc> {
    let mut desc = SamplerStateDesc::default();
    for v in values {
        match v.key.as_str() {
            "Filter" => {
                if !FILTERS.contains(v.value.as_str()) {
                    return scx_semantic_error!(
                        v.i, "Unknown sampler filter '{0}'", v.value
                    );
                }
                set_once(&mut desc.filter, v.value.clone(), v)?;
            },
            "AddressU" | "AddressV" | "AddressW" => {
                let mode = match TextureAddressMode::parse(&v.value) {
                    Some(m) => m,
                    None => {
                        return scx_semantic_error!(
                            v.i, "Unknown texture address mode '{0}'", v.value
                        );
                    },
                };
                let slot = match v.key.as_str() {
                    "AddressU" => &mut desc.address_u,
                    "AddressV" => &mut desc.address_v,
                    _ => &mut desc.address_w,
                };
                set_once(slot, mode, v)?;
            },
            "ComparisonFunc" => {
                let func = match ComparisonFunc::parse(&v.value) {
                    Some(f) => f,
                    None => {
                        return scx_semantic_error!(
                            v.i, "Unknown comparison function '{0}'", v.value
                        );
                    },
                };
                set_once(&mut desc.comparison, func, v)?;
            },
            // Numeric states (LOD bounds, bias, anisotropy, border color) pass through
            // unvalidated.
            "MinLOD" | "MaxLOD" | "MipLODBias" | "MaxAnisotropy" | "BorderColor" => (),
            other => {
                return scx_semantic_error!(v.i, "Unknown sampler state key '{other}'");
            },
        }
    }
    Ok(desc)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::info::Info;

    fn val(key: &str, value: &str) -> SamplerValue {
        SamplerValue {
            key: key.to_string(),
            value: value.to_string(),
            i: Info::default(),
        }
    }

    #[test]
    fn valid_state_parses() {
        let desc = validate(&[
            val("Filter", "MIN_MAG_MIP_LINEAR"),
            val("AddressU", "WRAP"),
            val("AddressV", "CLAMP"),
            val("ComparisonFunc", "LESS_EQUAL"),
        ]).unwrap();
        assert_eq!(desc.address_u, Some(TextureAddressMode::Wrap));
        assert_eq!(desc.address_v, Some(TextureAddressMode::Clamp));
        assert_eq!(desc.comparison, Some(ComparisonFunc::LessEqual));
    }

    #[test]
    fn address_mode_round_trip() {
        for s in ["WRAP", "MIRROR", "CLAMP", "BORDER", "MIRROR_ONCE"] {
            let m = TextureAddressMode::parse(s).unwrap();
            assert_eq!(format!("{m}"), s);
        }
    }

    #[test]
    fn comparison_func_round_trip() {
        for s in ["NEVER", "LESS", "EQUAL", "LESS_EQUAL", "GREATER",
                  "NOT_EQUAL", "GREATER_EQUAL", "ALWAYS"] {
            let f = ComparisonFunc::parse(s).unwrap();
            assert_eq!(format!("{f}"), s);
        }
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let r = validate(&[val("Filter", "SOMETHING_ELSE")]);
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Semantic);
    }

    #[test]
    fn contradictory_duplicates_are_rejected() {
        let r = validate(&[
            val("AddressU", "WRAP"),
            val("AddressU", "CLAMP"),
        ]);
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Semantic);
    }

    #[test]
    fn agreeing_duplicates_are_allowed() {
        let r = validate(&[
            val("AddressU", "WRAP"),
            val("AddressU", "WRAP"),
        ]);
        assert!(r.is_ok());
    }
}
