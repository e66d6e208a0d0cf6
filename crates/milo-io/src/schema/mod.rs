//! Versioned field protocol.
//!
//! A record type is described by an ordered table of [`FieldStep`]s. Each step
//! names a field, the revisions in which it is on the wire, how it is encoded,
//! and optionally how to derive it when the revision leaves it out. One
//! walker (see [`walker`]) reads and writes every table.
//!
//! ```
//! use milo_io::schema::RevisionPredicate::{Always, Between};
//! use milo_io::schema::{FieldStep, Schema, WireType};
//!
//! static FIELDS: &[FieldStep] = &[
//!     FieldStep::new("width", Always, WireType::U32),
//!     FieldStep::new("index_f", Between(8, 10), WireType::F32),
//! ];
//! static TEX: Schema = Schema::new("Tex", &[7, 8, 9, 10, 11], FIELDS);
//!
//! assert!(TEX.supports(9));
//! assert!(!FIELDS[1].when.matches(11));
//! ```

mod value;
pub mod walker;

pub use value::{Record, Value};
pub use walker::{FieldContext, RecordVariant, read_fields, refresh_derived, write_fields};

/// Which revisions a field is present in.
///
/// Presence is not monotonic: a field may exist only inside a closed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionPredicate {
    Always,
    Equal(u16),
    NotEqual(u16),
    Greater(u16),
    AtLeast(u16),
    Less(u16),
    AtMost(u16),
    /// Inclusive on both ends.
    Between(u16, u16),
}

impl RevisionPredicate {
    #[must_use]
    pub const fn matches(self, revision: u16) -> bool {
        match self {
            Self::Always => true,
            Self::Equal(r) => revision == r,
            Self::NotEqual(r) => revision != r,
            Self::Greater(r) => revision > r,
            Self::AtLeast(r) => revision >= r,
            Self::Less(r) => revision < r,
            Self::AtMost(r) => revision <= r,
            Self::Between(lo, hi) => revision >= lo && revision <= hi,
        }
    }
}

/// Computes a byte count from fields that precede it.
pub type LengthFn = fn(&Record) -> Option<usize>;

/// Computes a field the current revision does not store.
pub type DeriveFn = fn(&Record) -> Value;

/// Where a byte block gets its length.
#[derive(Debug, Clone, Copy)]
pub enum LengthSource {
    /// A `u32` length precedes the bytes.
    Prefixed,
    /// No length on the wire; computed from earlier fields.
    Derived(LengthFn),
}

/// Wire encoding of a field.
#[derive(Debug, Clone, Copy)]
pub enum WireType {
    U8,
    /// One byte, zero or one.
    Bool,
    U16,
    I16,
    U32,
    I32,
    F32,
    Symbol,
    Bytes(LengthSource),
    /// `u32` count followed by that many items.
    List(&'static WireType),
    /// Fixed number of items, no count on the wire.
    Array(&'static WireType, usize),
    /// Nested steps evaluated under the same revision.
    Struct(&'static [FieldStep]),
}

impl WireType {
    /// Smallest possible encoded size, used to sanity-check counts.
    #[must_use]
    pub fn min_size(&self) -> usize {
        match self {
            Self::U8 | Self::Bool => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 | Self::Symbol | Self::List(_) => 4,
            Self::Bytes(LengthSource::Prefixed) => 4,
            Self::Bytes(LengthSource::Derived(_)) | Self::Struct(_) => 0,
            Self::Array(item, count) => item.min_size().saturating_mul(*count),
        }
    }

    /// Zero value used for freshly constructed records.
    #[must_use]
    pub fn zero(&self, cx: &FieldContext) -> Value {
        match self {
            Self::U8 => Value::U8(0),
            Self::Bool => Value::Bool(false),
            Self::U16 => Value::U16(0),
            Self::I16 => Value::I16(0),
            Self::U32 => Value::U32(0),
            Self::I32 => Value::I32(0),
            Self::F32 => Value::F32(0.0),
            Self::Symbol => Value::Symbol(crate::Symbol::default()),
            Self::Bytes(_) => Value::Bytes(Vec::new()),
            Self::List(_) => Value::List(Vec::new()),
            Self::Array(item, count) => Value::List((0..*count).map(|_| item.zero(cx)).collect()),
            Self::Struct(steps) => Value::Struct(walker::default_record(steps, cx)),
        }
    }
}

/// How a step behaves in the proxy variant of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRule {
    /// Written for proxies and full records alike.
    Keep,
    /// Omitted when the owning entry is a proxy.
    Omit,
}

/// One row of a record table.
#[derive(Debug, Clone, Copy)]
pub struct FieldStep {
    pub name: &'static str,
    pub when: RevisionPredicate,
    pub wire: WireType,
    pub derive: Option<DeriveFn>,
    pub proxy: ProxyRule,
}

impl FieldStep {
    #[must_use]
    pub const fn new(name: &'static str, when: RevisionPredicate, wire: WireType) -> Self {
        Self {
            name,
            when,
            wire,
            derive: None,
            proxy: ProxyRule::Keep,
        }
    }

    /// Compute the field when the revision does not store it.
    #[must_use]
    pub const fn derived(mut self, derive: DeriveFn) -> Self {
        self.derive = Some(derive);
        self
    }

    /// Skip the field for proxy entries.
    #[must_use]
    pub const fn full_only(mut self) -> Self {
        self.proxy = ProxyRule::Omit;
        self
    }

    /// Whether the field is on the wire for this context.
    #[must_use]
    pub fn applies(&self, cx: &FieldContext) -> bool {
        self.when.matches(cx.revision)
            && !(self.proxy == ProxyRule::Omit && cx.variant == RecordVariant::Proxy)
    }
}

/// A record type: the revisions it knows and its field table.
#[derive(Debug)]
pub struct Schema {
    pub type_name: &'static str,
    pub revisions: &'static [u16],
    pub fields: &'static [FieldStep],
}

impl Schema {
    #[must_use]
    pub const fn new(
        type_name: &'static str,
        revisions: &'static [u16],
        fields: &'static [FieldStep],
    ) -> Self {
        Self {
            type_name,
            revisions,
            fields,
        }
    }

    #[must_use]
    pub fn supports(&self, revision: u16) -> bool {
        self.revisions.contains(&revision)
    }

    /// Highest declared revision, used for new records.
    #[must_use]
    pub fn latest_revision(&self) -> u16 {
        self.revisions.iter().copied().max().unwrap_or(0)
    }

    /// Names of the fields present at a revision, in wire order.
    #[must_use]
    pub fn fields_at(&self, revision: u16) -> Vec<&'static str> {
        let cx = FieldContext::new(crate::Endian::Little, revision);
        self.fields
            .iter()
            .filter(|step| step.applies(&cx))
            .map(|step| step.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::RevisionPredicate::{
        Always, AtLeast, AtMost, Between, Equal, Greater, Less, NotEqual,
    };
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Always.matches(0));
        assert!(Equal(3).matches(3) && !Equal(3).matches(4));
        assert!(NotEqual(3).matches(4) && !NotEqual(3).matches(3));
        assert!(Greater(3).matches(4) && !Greater(3).matches(3));
        assert!(AtLeast(3).matches(3) && !AtLeast(3).matches(2));
        assert!(Less(3).matches(2) && !Less(3).matches(3));
        assert!(AtMost(3).matches(3) && !AtMost(3).matches(4));
    }

    #[test]
    fn test_closed_interval_is_absent_on_both_sides() {
        let window = Between(8, 10);
        assert!(!window.matches(7));
        assert!(window.matches(8));
        assert!(window.matches(10));
        assert!(!window.matches(11));
    }

    #[test]
    fn test_proxy_rule() {
        let step = FieldStep::new("environ", Always, WireType::Symbol).full_only();
        let full = FieldContext::new(crate::Endian::Big, 1);
        let proxy = full.with_variant(RecordVariant::Proxy);
        assert!(step.applies(&full));
        assert!(!step.applies(&proxy));
    }

    #[test]
    fn test_fields_at() {
        static FIELDS: &[FieldStep] = &[
            FieldStep::new("a", Always, WireType::U8),
            FieldStep::new("b", AtLeast(2), WireType::U8),
            FieldStep::new("c", Less(2), WireType::U8),
        ];
        static SCHEMA: Schema = Schema::new("T", &[1, 2], FIELDS);
        assert_eq!(SCHEMA.fields_at(1), vec!["a", "c"]);
        assert_eq!(SCHEMA.fields_at(2), vec!["a", "b"]);
        assert_eq!(SCHEMA.latest_revision(), 2);
    }
}
