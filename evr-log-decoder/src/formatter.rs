//! Event formatter
//!
//! Renders one decoded record into its display text. Records with an event
//! definition are rendered through the definition's template; records
//! without one fall back to a numeric dump of their payload.
//!
//! Template directives have the form `%<c>[<expr>]`:
//!
//! | directive | rendering                                   |
//! |-----------|---------------------------------------------|
//! | `d`       | signed decimal                              |
//! | `u`       | unsigned decimal                            |
//! | `x`       | `0x` + lowercase hex                        |
//! | `t`       | string at address                           |
//! | `F`, `N`  | string at address, or `0x%08x` if unmapped  |
//! | `I`       | IPv4 dotted quad                            |
//! | `J`       | IPv6 (lower 64 bits, four groups)           |
//! | `M`       | MAC address                                 |
//! | `S`       | address as bare 8-digit hex                 |
//! | `T`       | value in its own type                       |
//! | `E`       | enum name, `%E[expr, Typedef[:member]]`     |
//! | `U`       | ignored                                     |
//! | `C`       | not supported, fails the record             |

use crate::eval::EvalContext;
use crate::schema::{EventDefinition, TypedefRegistry};
use crate::types::{DecoderError, Payload, RawRecord, Result, Value};
use std::collections::BTreeMap;

/// Address → string lookup used by the `t`, `F` and `N` directives
pub trait AddressResolver {
    /// String stored at `address`, empty if the address is not mapped
    fn lookup_string(&self, address: u64) -> String;
}

/// Resolver without any strings; every lookup is empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStrings;

impl AddressResolver for NoStrings {
    fn lookup_string(&self, _address: u64) -> String {
        String::new()
    }
}

/// In-memory string table keyed by start address
///
/// An address inside a stored string resolves to the remainder of that
/// string, matching how a target pointer into a string literal reads.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: BTreeMap<u64, String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: u64, text: impl Into<String>) {
        self.strings.insert(address, text.into());
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl FromIterator<(u64, String)> for StringTable {
    fn from_iter<I: IntoIterator<Item = (u64, String)>>(iter: I) -> Self {
        Self {
            strings: iter.into_iter().collect(),
        }
    }
}

impl AddressResolver for StringTable {
    fn lookup_string(&self, address: u64) -> String {
        let Some((start, text)) = self.strings.range(..=address).next_back() else {
            return String::new();
        };
        let offset = (address - start) as usize;
        text.get(offset..).unwrap_or_default().to_string()
    }
}

/// Renders records into display text
pub struct EventFormatter<'a> {
    typedefs: &'a TypedefRegistry,
    resolver: &'a dyn AddressResolver,
}

impl<'a> EventFormatter<'a> {
    pub fn new(typedefs: &'a TypedefRegistry, resolver: &'a dyn AddressResolver) -> Self {
        Self { typedefs, resolver }
    }

    /// Render `record`, using its event definition if there is one
    ///
    /// Redirected stdout blobs always render as escaped text; the text
    /// report adds the surrounding quotes.
    pub fn format_record(&self, record: &RawRecord, definition: Option<&EventDefinition>) -> Result<String> {
        if record.is_stdout_text() {
            if let Payload::Blob(data) = &record.payload {
                return Ok(escape_text(&String::from_utf8_lossy(data)));
            }
        }

        match definition {
            Some(definition) => {
                let ctx = EvalContext::for_record(record, Some(definition), self.typedefs);
                self.render_template(&definition.template, &ctx)
            }
            None => Ok(record.values_as_string()),
        }
    }

    /// Expand all directives of `template`
    ///
    /// Any failing directive fails the whole template.
    pub fn render_template(&self, template: &str, ctx: &EvalContext<'_>) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let Some(directive) = after.chars().next() else {
                out.push('%');
                return Ok(out);
            };
            let after = &after[directive.len_utf8()..];

            rest = match directive {
                '%' => {
                    out.push('%');
                    after
                }
                'E' => {
                    let (name, tail) = self.enum_directive(after, ctx)?;
                    out.push_str(&name);
                    tail
                }
                'd' | 'u' | 't' | 'x' | 'F' | 'C' | 'I' | 'J' | 'N' | 'M' | 'S' | 'T' | 'U' => {
                    let (value, tail) = match bracketed(after)? {
                        Some((expr, ']', tail)) => (ctx.evaluate(expr)?, tail),
                        Some((expr, _, _)) => {
                            return Err(DecoderError::SyntaxError(format!(
                                "']' expected after '%{}[{}'",
                                directive, expr
                            )))
                        }
                        None => (Value::default(), after),
                    };
                    out.push_str(&self.render_value(directive, value)?);
                    tail
                }
                other => {
                    out.push(other);
                    after
                }
            };
        }

        out.push_str(rest);
        Ok(out)
    }

    /// `%E[expr, Typedef[:member]]`, returns the name and the remaining template
    fn enum_directive<'t>(&self, after: &'t str, ctx: &EvalContext<'_>) -> Result<(String, &'t str)> {
        let Some((expr, ',', tail)) = bracketed(after)? else {
            return Err(DecoderError::SyntaxError(
                "%E expects '[<expr>, <typedef>[:<member>]]'".to_string(),
            ));
        };

        let value = ctx.evaluate(expr)?;
        let end = tail.find(']').ok_or_else(|| {
            DecoderError::SyntaxError(format!("unterminated enum reference '{}'", tail))
        })?;
        let name = ctx.resolve_enum(value.as_i64(), &tail[..end])?;
        Ok((name, &tail[end + 1..]))
    }

    /// Render an evaluated value according to `directive`
    pub fn render_value(&self, directive: char, value: Value) -> Result<String> {
        let bits = value.as_u64();
        let text = match directive {
            'd' => value.as_i64().to_string(),
            'u' => bits.to_string(),
            'x' => format!("0x{:02x}", bits),
            't' => self.resolver.lookup_string(bits),
            'F' | 'N' => {
                let text = self.resolver.lookup_string(bits);
                if text.is_empty() {
                    format!("0x{:08x}", bits)
                } else {
                    text
                }
            }
            'C' => {
                return Err(DecoderError::SyntaxError(
                    "directive %C is not supported".to_string(),
                ))
            }
            'I' => format!(
                "{}.{}.{}.{}",
                (bits >> 24) & 0xFF,
                (bits >> 16) & 0xFF,
                (bits >> 8) & 0xFF,
                bits & 0xFF
            ),
            'J' => format!(
                "{:x}:{:x}:{:x}:{:x}",
                (bits >> 48) & 0xFFFF,
                (bits >> 32) & 0xFFFF,
                (bits >> 16) & 0xFFFF,
                bits & 0xFFFF
            ),
            'M' => format!(
                "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
                (bits >> 40) & 0xFF,
                (bits >> 32) & 0xFF,
                (bits >> 24) & 0xFF,
                (bits >> 16) & 0xFF,
                (bits >> 8) & 0xFF,
                bits & 0xFF
            ),
            'S' => format!("{:08x}", bits),
            'T' => value.to_string(),
            'U' => String::new(),
            other => other.to_string(),
        };
        Ok(text)
    }
}

/// Split `[expr<term>rest` at the first `,` or `]`
///
/// Returns `None` if `text` does not open a bracket.
fn bracketed(text: &str) -> Result<Option<(&str, char, &str)>> {
    let Some(inner) = text.strip_prefix('[') else {
        return Ok(None);
    };
    let end = inner.find([',', ']']).ok_or_else(|| {
        DecoderError::SyntaxError(format!("unterminated directive expression '[{}'", inner))
    })?;
    let terminator = if inner.as_bytes()[end] == b',' { ',' } else { ']' };
    Ok(Some((&inner[..end], terminator, &inner[end + 1..])))
}

/// C-style escaping of target stdout text
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{1B}' => out.push_str("\\e"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0B}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
