//! Typedef registry
//!
//! Named field layouts used to pick sub-fields out of an event's 32-bit
//! operand words, together with the optional enum tables attached to members.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Byte order of a typedef or member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Offsets count from the least significant byte
    LittleEndian,
    /// Offsets count from the most significant byte
    BigEndian,
}

/// Integer type of a typedef member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum IntegerType {
    #[serde(rename = "uint8_t")]
    U8,
    #[serde(rename = "int8_t")]
    I8,
    #[serde(rename = "uint16_t")]
    U16,
    #[serde(rename = "int16_t")]
    I16,
    #[serde(rename = "uint32_t")]
    U32,
    #[serde(rename = "int32_t")]
    I32,
}

impl IntegerType {
    /// Width in bytes
    pub fn width(self) -> u32 {
        match self {
            IntegerType::U8 | IntegerType::I8 => 1,
            IntegerType::U16 | IntegerType::I16 => 2,
            IntegerType::U32 | IntegerType::I32 => 4,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntegerType::I8 | IntegerType::I16 | IntegerType::I32)
    }
}

/// One value → name pair of a member's enum table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumEntry {
    pub value: i64,
    pub name: String,
}

/// A member of a typedef
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "MemberSpec")]
pub struct MemberDefinition {
    pub name: String,
    /// Byte offset expression, evaluated at extraction time
    pub offset: String,
    pub integer_type: IntegerType,
    /// Overrides the typedef's byte order when set
    pub big_endian: Option<bool>,
    /// Enum table (raw value → name), empty if the member has none
    pub enums: BTreeMap<i64, String>,
}

impl MemberDefinition {
    pub fn new(name: impl Into<String>, offset: impl Into<String>, integer_type: IntegerType) -> Self {
        Self {
            name: name.into(),
            offset: offset.into(),
            integer_type,
            big_endian: None,
            enums: BTreeMap::new(),
        }
    }

    /// Builder method: override the typedef's byte order
    pub fn with_big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = Some(big_endian);
        self
    }

    /// Builder method: add an enum entry
    pub fn with_enum(mut self, value: i64, name: impl Into<String>) -> Self {
        self.enums.insert(value, name.into());
        self
    }

    /// Enum name for `value`, if the member's table has one
    pub fn enum_name(&self, value: i64) -> Option<&str> {
        self.enums.get(&value).map(String::as_str)
    }
}

/// Offset as written in a schema snapshot: a number or an expression
#[derive(Deserialize)]
#[serde(untagged)]
enum OffsetSpec {
    Number(u32),
    Expression(String),
}

#[derive(Deserialize)]
struct MemberSpec {
    name: String,
    #[serde(default)]
    offset: Option<OffsetSpec>,
    #[serde(rename = "type")]
    integer_type: IntegerType,
    #[serde(default)]
    big_endian: Option<bool>,
    #[serde(default)]
    enums: Vec<EnumEntry>,
}

impl From<MemberSpec> for MemberDefinition {
    fn from(spec: MemberSpec) -> Self {
        let offset = match spec.offset {
            Some(OffsetSpec::Number(n)) => n.to_string(),
            Some(OffsetSpec::Expression(expr)) => expr,
            None => "0".to_string(),
        };
        Self {
            name: spec.name,
            offset,
            integer_type: spec.integer_type,
            big_endian: spec.big_endian,
            enums: spec
                .enums
                .into_iter()
                .map(|entry| (entry.value, entry.name))
                .collect(),
        }
    }
}

/// A named field layout
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypedefEntry {
    pub name: String,
    /// Size in bytes
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default)]
    pub big_endian: bool,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<MemberDefinition>,
}

fn default_size() -> u32 {
    4
}

impl TypedefEntry {
    pub fn new(name: impl Into<String>, size: u32, big_endian: bool) -> Self {
        Self {
            name: name.into(),
            size,
            big_endian,
            members: Vec::new(),
        }
    }

    /// Builder method: append a member
    pub fn with_member(mut self, member: MemberDefinition) -> Self {
        self.members.push(member);
        self
    }

    pub fn member(&self, name: &str) -> Option<&MemberDefinition> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Effective byte order of `member`
    pub fn byte_order_of(&self, member: &MemberDefinition) -> ByteOrder {
        if member.big_endian.unwrap_or(self.big_endian) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// First member (in declaration order) whose enum table maps `value`
    pub fn find_enum(&self, value: i64) -> Option<&str> {
        self.members.iter().find_map(|m| m.enum_name(value))
    }
}

/// All typedefs of the loaded schema set, keyed by name
#[derive(Debug, Clone, Default)]
pub struct TypedefRegistry {
    typedefs: HashMap<String, TypedefEntry>,
}

impl TypedefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typedef; a later definition with the same name replaces the earlier one
    pub fn add_typedef(&mut self, typedef: TypedefEntry) {
        if let Some(previous) = self.typedefs.insert(typedef.name.clone(), typedef) {
            log::warn!("Typedef '{}' defined more than once, keeping the last definition", previous.name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypedefEntry> {
        self.typedefs.get(name)
    }

    /// Look up a member of a typedef
    pub fn member(&self, typedef: &str, member: &str) -> Option<(&TypedefEntry, &MemberDefinition)> {
        let entry = self.typedefs.get(typedef)?;
        entry.member(member).map(|m| (entry, m))
    }

    pub fn len(&self) -> usize {
        self.typedefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typedefs.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let num_members = self.typedefs.values().map(|t| t.members.len()).sum();
        let num_enum_entries = self
            .typedefs
            .values()
            .flat_map(|t| t.members.iter())
            .map(|m| m.enums.len())
            .sum();

        RegistryStats {
            num_typedefs: self.typedefs.len(),
            num_members,
            num_enum_entries,
        }
    }
}

impl FromIterator<TypedefEntry> for TypedefRegistry {
    fn from_iter<I: IntoIterator<Item = TypedefEntry>>(iter: I) -> Self {
        let mut registry = TypedefRegistry::new();
        for typedef in iter {
            registry.add_typedef(typedef);
        }
        registry
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub num_typedefs: usize,
    pub num_members: usize,
    pub num_enum_entries: usize,
}
