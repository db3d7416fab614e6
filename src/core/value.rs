use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar stored in a record column or bound to a statement placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Double(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            Self::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type code a caller would naturally bind this value with.
    pub fn natural_param_type(&self) -> ParamType {
        match self {
            Self::Integer(_) => ParamType::Integer,
            Self::Double(_) => ParamType::Double,
            Self::Blob(_) => ParamType::Blob,
            Self::Null | Self::Text(_) => ParamType::String,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            // Numeric columns read back from a store may change representation
            (Self::Integer(i), Self::Double(f)) | (Self::Double(f), Self::Integer(i)) => {
                exact_integer(*f) == Some(*i)
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Double(f) => match exact_integer(*f) {
                Some(i) => {
                    1u8.hash(state);
                    i.hash(state);
                }
                None => {
                    2u8.hash(state);
                    let normalized = if f.is_nan() { f64::NAN } else { *f };
                    normalized.to_bits().hash(state);
                }
            },
            Self::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Self::Blob(b) => {
                4u8.hash(state);
                b.hash(state);
            }
        }
    }
}

/// The integer `f` holds exactly, if any.
fn exact_integer(f: f64) -> Option<i64> {
    // i64::MIN is -2^63 exactly; 2^63 itself is out of range
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Double(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parameter kind of a column, written as a one-character code in parameter lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Double,
    String,
    Blob,
}

impl ParamType {
    pub fn code(&self) -> char {
        match self {
            Self::Integer => 'i',
            Self::Double => 'd',
            Self::String => 's',
            Self::Blob => 'b',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(Self::Integer),
            'd' => Some(Self::Double),
            's' => Some(Self::String),
            'b' => Some(Self::Blob),
            _ => None,
        }
    }

    /// Whether a value may be bound to a placeholder of this kind.
    ///
    /// NULL binds to every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Double, Value::Double(_)) => true,
            (Self::Double, Value::Integer(_)) => true,
            (Self::String, Value::Text(_)) => true,
            (Self::Blob, Value::Blob(_)) => true,
            (Self::Blob, Value::Text(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Double(3.5), Value::Double(3.5));
        assert_eq!(Value::Integer(3), Value::Double(3.0));
        assert_ne!(Value::Integer(1), Value::Integer(2));
        assert_ne!(Value::Null, Value::Integer(0));
        assert_ne!(Value::Text("1".into()), Value::Integer(1));
    }

    fn hash_of(value: &Value) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_integer_double_equality_is_exact() {
        // 2^53 + 1 has no f64 representation
        let big = 9_007_199_254_740_993_i64;
        assert_ne!(Value::Integer(big), Value::Double(9_007_199_254_740_992.0));
        assert_eq!(Value::Integer(big - 1), Value::Double(9_007_199_254_740_992.0));
        assert_ne!(Value::Integer(i64::MAX), Value::Double(i64::MAX as f64));
        assert_eq!(Value::Integer(i64::MIN), Value::Double(i64::MIN as f64));
        assert_ne!(Value::Integer(2), Value::Double(2.5));
        assert_eq!(Value::Integer(0), Value::Double(-0.0));

        assert_eq!(hash_of(&Value::Integer(3)), hash_of(&Value::Double(3.0)));
        assert_eq!(hash_of(&Value::Integer(0)), hash_of(&Value::Double(-0.0)));
    }

    #[test]
    fn test_param_type_codes() {
        for ty in [
            ParamType::Integer,
            ParamType::Double,
            ParamType::String,
            ParamType::Blob,
        ] {
            assert_eq!(ParamType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ParamType::from_code('x'), None);
    }

    #[test]
    fn test_param_type_acceptance() {
        assert!(ParamType::Integer.accepts(&Value::Null));
        assert!(ParamType::Double.accepts(&Value::Integer(4)));
        assert!(!ParamType::Integer.accepts(&Value::Text("four".into())));
        assert!(ParamType::Blob.accepts(&Value::Blob(vec![0, 1])));
    }
}
