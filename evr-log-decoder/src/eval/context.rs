//! Per-record evaluation context
//!
//! Holds the operand words of the record being rendered, the typedef bindings
//! of its event definition and the registry they refer to. A context is built
//! for one record and passed explicitly to every evaluation.

use super::expression::evaluate_at_depth;
use crate::bitfield::BitFieldExtractor;
use crate::schema::{EventDefinition, TypedefRegistry};
use crate::types::{DecoderError, RawRecord, Result, Value};
use std::collections::BTreeMap;

/// Operand names in binding order
pub const OPERANDS: [&str; 4] = ["val1", "val2", "val3", "val4"];

/// Bindings for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    operands: [i64; 4],
    bindings: Option<&'a BTreeMap<String, String>>,
    typedefs: &'a TypedefRegistry,
}

impl<'a> EvalContext<'a> {
    /// Context with all operands zero and no typedef bindings
    pub fn new(typedefs: &'a TypedefRegistry) -> Self {
        Self {
            operands: [0; 4],
            bindings: None,
            typedefs,
        }
    }

    /// Context for rendering `record` with the bindings of `definition`
    pub fn for_record(
        record: &RawRecord,
        definition: Option<&'a EventDefinition>,
        typedefs: &'a TypedefRegistry,
    ) -> Self {
        Self {
            operands: record.operands(),
            bindings: definition.map(|d| &d.bindings),
            typedefs,
        }
    }

    /// Builder method: set the operand words
    pub fn with_operands(mut self, operands: [i64; 4]) -> Self {
        self.operands = operands;
        self
    }

    /// Builder method: set the operand → typedef bindings
    pub fn with_bindings(mut self, bindings: &'a BTreeMap<String, String>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Value bound to an operand name
    pub fn operand(&self, name: &str) -> Option<i64> {
        OPERANDS
            .iter()
            .position(|op| *op == name)
            .map(|idx| self.operands[idx])
    }

    /// Typedef name bound to an operand
    pub fn typedef_for(&self, operand: &str) -> Option<&'a str> {
        self.bindings?.get(operand).map(String::as_str)
    }

    /// Evaluate an expression in this context
    pub fn evaluate(&self, expression: &str) -> Result<Value> {
        evaluate_at_depth(expression, self, 0)
    }

    /// Resolve `operand.member` through the operand's typedef binding
    pub(crate) fn field(&self, operand: &str, member: &str, depth: usize) -> Result<Value> {
        let word = self.operand(operand).ok_or_else(|| {
            DecoderError::SyntaxError(format!("unknown identifier '{}'", operand))
        })?;
        let typedef = self.typedef_for(operand).ok_or_else(|| {
            DecoderError::FieldNotFound(format!("{} is not bound to a typedef", operand))
        })?;
        let (entry, definition) = self.typedefs.member(typedef, member).ok_or_else(|| {
            DecoderError::FieldNotFound(format!("{}.{}", typedef, member))
        })?;

        let offset = match evaluate_at_depth(&definition.offset, self, depth + 1)? {
            Value::Integer(offset) => u32::try_from(offset).map_err(|_| {
                DecoderError::FieldNotFound(format!(
                    "{}.{} has negative offset {}",
                    typedef, member, offset
                ))
            })?,
            Value::Float(_) => {
                return Err(DecoderError::SyntaxError(format!(
                    "integer offset expected for {}.{}",
                    typedef, member
                )))
            }
        };

        BitFieldExtractor::extract(
            word as u32,
            offset,
            definition.integer_type,
            entry.byte_order_of(definition),
        )
        .map(Value::Integer)
        .ok_or_else(|| {
            DecoderError::FieldNotFound(format!(
                "{}.{} at offset {} exceeds the 32-bit source word",
                typedef, member, offset
            ))
        })
    }

    /// Name for `value` from an enum reference `Typedef[:member]`
    ///
    /// Without a member, the first member of the typedef whose enum table
    /// contains the value wins.
    pub fn resolve_enum(&self, value: i64, reference: &str) -> Result<String> {
        let (typedef, member) = match reference.split_once(':') {
            Some((typedef, member)) => (typedef.trim(), Some(member.trim())),
            None => (reference.trim(), None),
        };

        let entry = self.typedefs.get(typedef).ok_or_else(|| {
            DecoderError::EnumNotFound(format!("typedef '{}' is not defined", typedef))
        })?;

        let name = match member {
            Some(member) => {
                let definition = entry.member(member).ok_or_else(|| {
                    DecoderError::EnumNotFound(format!("{}:{} is not defined", typedef, member))
                })?;
                definition.enum_name(value)
            }
            None => entry.find_enum(value),
        };

        name.map(str::to_string).ok_or_else(|| {
            DecoderError::EnumNotFound(format!("{} has no entry for {}", reference.trim(), value))
        })
    }
}
