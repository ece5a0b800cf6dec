//! Runtime type resolution
//!
//! Nodes come back from the store as untyped records. `Object` is the
//! tagged union of every handle type; the label registry maps a record's
//! type label to the constructor that inflates it.

use std::sync::Arc;

use graphads_core::schema::label;
use graphads_core::{Error, HashTag, NodeRecord, ObjectName, Result};
use graphads_engine::Database;

use crate::domain::DomainElement;
use crate::element::{Element, Lifecycle};
use crate::list::List;
use crate::map::Map;
use crate::query::StoredQuery;
use crate::set::Set;
use crate::variable::{
    CompositeArrayDate, CompositeArrayNumber, CompositeArrayString, CompositeString, SimpleDate,
    SimpleNumber,
};

/// Any persisted handle
#[derive(Debug, Clone)]
pub enum Object {
    /// Number variable
    Number(SimpleNumber),
    /// Date variable
    Date(SimpleDate),
    /// String variable
    Text(CompositeString),
    /// Number array
    NumberArray(CompositeArrayNumber),
    /// String array
    TextArray(CompositeArrayString),
    /// Date array
    DateArray(CompositeArrayDate),
    /// Caller-defined node
    Domain(DomainElement),
    /// Linked list
    List(List),
    /// Hash set
    Set(Set),
    /// Key/value map
    Map(Map),
    /// Stored query
    Query(StoredQuery),
}

type Inflate = fn(Arc<Database>, &NodeRecord) -> Result<Object>;

/// Type label to constructor
const REGISTRY: &[(&str, Inflate)] = &[
    (label::NUMBER, |db, r| SimpleNumber::from_record(db, r).map(Object::Number)),
    (label::DATE, |db, r| SimpleDate::from_record(db, r).map(Object::Date)),
    (label::TEXT, |db, r| CompositeString::from_record(db, r).map(Object::Text)),
    (label::NUMBER_ARRAY, |db, r| {
        CompositeArrayNumber::from_record(db, r).map(Object::NumberArray)
    }),
    (label::TEXT_ARRAY, |db, r| {
        CompositeArrayString::from_record(db, r).map(Object::TextArray)
    }),
    (label::DATE_ARRAY, |db, r| {
        CompositeArrayDate::from_record(db, r).map(Object::DateArray)
    }),
    (label::DOMAIN, |db, r| DomainElement::from_record(db, r).map(Object::Domain)),
    (label::LIST, |db, r| List::from_record(db, r).map(Object::List)),
    (label::SET, |db, r| Set::from_record(db, r).map(Object::Set)),
    (label::MAP, |db, r| Map::from_record(db, r).map(Object::Map)),
    (label::STORED_QUERY, |db, r| StoredQuery::from_record(db, r).map(Object::Query)),
];

impl Object {
    /// Inflate a record through the label registry
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when no registered label is present.
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        let (_, inflate) = REGISTRY
            .iter()
            .find(|(l, _)| record.has_label(l))
            .ok_or_else(|| {
                Error::type_mismatch("Object::from_record", "element", record.labels.join(":"))
            })?;
        inflate(db, record)
    }

    fn element(&self) -> &dyn Element {
        match self {
            Object::Number(v) => v,
            Object::Date(v) => v,
            Object::Text(v) => v,
            Object::NumberArray(v) => v,
            Object::TextArray(v) => v,
            Object::DateArray(v) => v,
            Object::Domain(v) => v,
            Object::List(v) => v,
            Object::Set(v) => v,
            Object::Map(v) => v,
            Object::Query(v) => v,
        }
    }

    /// Number value, for number variables
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Number(v) => Some(*v.value()),
            _ => None,
        }
    }

    /// String value, for string variables
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Object::Text(v) => Some(v.value().as_str()),
            _ => None,
        }
    }

    /// Domain element, if this is one
    pub fn as_domain(&self) -> Option<&DomainElement> {
        match self {
            Object::Domain(v) => Some(v),
            _ => None,
        }
    }
}

impl Element for Object {
    fn name(&self) -> &ObjectName {
        self.element().name()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.element().lifecycle()
    }

    fn kind(&self) -> &'static str {
        self.element().kind()
    }

    fn hash_tag(&self) -> Result<HashTag> {
        self.element().hash_tag()
    }
}
