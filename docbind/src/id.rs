use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::ID_GENERATOR;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const OBJECT_ID_HEX_LEN: usize = 16;

/// Identifier assigned by the mapper to documents that do not carry their own `_id`.
///
/// An `ObjectId` is a 64-bit snowflake value rendered as 16 lowercase hex
/// digits. Ids generated by one process sort by creation time.
///
/// ```rust
/// use docbind::ObjectId;
///
/// let id = ObjectId::new();
/// let parsed: ObjectId = id.to_hex().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct ObjectId {
    value: u64,
}

impl ObjectId {
    pub fn new() -> Self {
        ObjectId {
            value: ID_GENERATOR.next_id(),
        }
    }

    pub fn from_value(value: u64) -> Self {
        ObjectId { value }
    }

    /// Parses the 16-digit hex form produced by [ObjectId::to_hex].
    pub fn from_hex(hex: &str) -> DocbindResult<Self> {
        if hex.len() != OBJECT_ID_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DocbindError::new(
                &format!("'{}' is not a valid object id", hex),
                ErrorKind::InvalidId,
            ));
        }
        u64::from_str_radix(hex, 16)
            .map(ObjectId::from_value)
            .map_err(|e| DocbindError::new(&format!("'{}' is not a valid object id: {}", hex, e), ErrorKind::InvalidId))
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.value)
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = DocbindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// A document identifier: a mapper-assigned [ObjectId] or any string.
///
/// Identifiers compare by their canonical string form, so
/// `Id::Object(oid)` equals `Id::Text(oid.to_hex())`. The mapper stores `_id`
/// as that string.
///
/// ```rust
/// use docbind::{Id, ObjectId};
///
/// let oid = ObjectId::new();
/// assert_eq!(Id::from(oid), Id::from(oid.to_hex().as_str()));
/// ```
#[derive(Clone)]
pub enum Id {
    Object(ObjectId),
    Text(String),
}

impl Id {
    /// Reads an identifier out of a stored `_id` value.
    pub fn from_value(value: &Value) -> DocbindResult<Id> {
        match value {
            Value::String(s) => Ok(Id::from(s.as_str())),
            Value::Number(n) => Ok(Id::Text(n.to_string())),
            other => {
                log::error!("Unsupported _id value {}", other);
                Err(DocbindError::new(
                    &format!("Value {} cannot be used as a document id", other),
                    ErrorKind::InvalidId,
                ))
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.canonical())
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Id::Object(oid) => Some(*oid),
            Id::Text(_) => None,
        }
    }

    fn canonical(&self) -> String {
        match self {
            Id::Object(oid) => oid.to_hex(),
            Id::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Id::Object(a), Id::Object(b)) => a == b,
            _ => self.canonical() == other.canonical(),
        }
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Object(oid) => write!(f, "{:?}", oid),
            Id::Text(s) => write!(f, "Id({:?})", s),
        }
    }
}

impl From<ObjectId> for Id {
    fn from(oid: ObjectId) -> Self {
        Id::Object(oid)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        match ObjectId::from_hex(s) {
            Ok(oid) => Id::Object(oid),
            Err(_) => Id::Text(s.to_string()),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::from(s.as_str())
    }
}

impl From<&Id> for Id {
    fn from(id: &Id) -> Self {
        id.clone()
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Id::from(s))
    }
}
