//! JSON numbers as read off the wire, and the checked conversions generated
//! deserializers use to narrow them into member types.

use thiserror::Error;

/// A number in one of three representations, chosen by the tokenizer.
///
/// `PosInt` holds non-negative integers, `NegInt` negative ones, and `Float`
/// anything written with a fraction or exponent (or too large for 64 bits).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    PosInt(u64),
    NegInt(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryFromNumberError {
    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("{value} has a fractional part and cannot be converted to {target}")]
    Fractional { value: String, target: &'static str },
}

impl Number {
    /// Lossy conversion used for epoch-seconds timestamps and float members.
    pub fn to_f64_lossy(self) -> f64 {
        match self {
            Number::PosInt(v) => v as f64,
            Number::NegInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn describe(self) -> String {
        match self {
            Number::PosInt(v) => v.to_string(),
            Number::NegInt(v) => v.to_string(),
            Number::Float(v) => v.to_string(),
        }
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<Number> for $ty {
                type Error = TryFromNumberError;

                fn try_from(value: Number) -> Result<Self, Self::Error> {
                    let out_of_range = || TryFromNumberError::OutOfRange {
                        value: value.describe(),
                        target: stringify!($ty),
                    };
                    match value {
                        Number::PosInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range()),
                        Number::NegInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range()),
                        Number::Float(v) => {
                            if v.fract() != 0.0 {
                                return Err(TryFromNumberError::Fractional {
                                    value: value.describe(),
                                    target: stringify!($ty),
                                });
                            }
                            if v < <$ty>::MIN as f64 || v > <$ty>::MAX as f64 {
                                return Err(out_of_range());
                            }
                            Ok(v as $ty)
                        }
                    }
                }
            }

            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    let value = i64::from(value);
                    if value < 0 {
                        Number::NegInt(value)
                    } else {
                        Number::PosInt(value as u64)
                    }
                }
            }
        )*
    };
}

int_conversions!(i8, i16, i32, i64);

impl TryFrom<Number> for f64 {
    type Error = TryFromNumberError;

    fn try_from(value: Number) -> Result<Self, Self::Error> {
        Ok(value.to_f64_lossy())
    }
}

impl TryFrom<Number> for f32 {
    type Error = TryFromNumberError;

    fn try_from(value: Number) -> Result<Self, Self::Error> {
        let v = value.to_f64_lossy();
        if v.is_finite() && (v < f32::MIN as f64 || v > f32::MAX as f64) {
            return Err(TryFromNumberError::OutOfRange {
                value: value.describe(),
                target: "f32",
            });
        }
        Ok(v as f32)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(f64::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(i8::try_from(Number::PosInt(127)), Ok(127));
        assert!(i8::try_from(Number::PosInt(128)).is_err());
        assert_eq!(i16::try_from(Number::NegInt(-300)), Ok(-300));
        assert!(i32::try_from(Number::PosInt(u64::MAX)).is_err());
    }

    #[test]
    fn integral_floats_narrow() {
        assert_eq!(i32::try_from(Number::Float(4.0)), Ok(4));
        assert!(matches!(
            i32::try_from(Number::Float(4.5)),
            Err(TryFromNumberError::Fractional { .. })
        ));
    }

    #[test]
    fn sign_picks_variant() {
        assert_eq!(Number::from(-3i32), Number::NegInt(-3));
        assert_eq!(Number::from(3i64), Number::PosInt(3));
        assert_eq!(Number::from(0i8), Number::PosInt(0));
    }
}
