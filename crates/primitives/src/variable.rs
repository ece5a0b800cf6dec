//! Typed variables
//!
//! A `Variable<K>` is one named node carrying a single `value` property.
//! The kind `K` fixes the Rust type, the node label, the property encoding
//! and whether the value has a content hash.
//!
//! | Alias                  | Value              | Hashable |
//! |------------------------|--------------------|----------|
//! | `SimpleNumber`         | `f64`              | yes      |
//! | `SimpleDate`           | `NaiveDate`        | yes      |
//! | `CompositeString`      | `String`           | yes      |
//! | `CompositeArrayNumber` | `Vec<f64>`         | no       |
//! | `CompositeArrayString` | `Vec<String>`      | no       |
//! | `CompositeArrayDate`   | `Vec<NaiveDate>`   | no       |
//!
//! Value changes are local until `save()`.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use graphads_core::schema::{label, prop};
use graphads_core::{
    canonical_float, Error, HashTag, NodeRecord, ObjectName, Properties, Result, Selector,
    Statement, Value,
};
use graphads_engine::Database;

use crate::element::{Element, Identity, Lifecycle};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value encoding for one variable type
pub trait VariableKind: Send + Sync + 'static {
    /// Rust-side value
    type Value: Clone + PartialEq + Debug;

    /// Type-specific node label
    const LABEL: &'static str;

    /// Type name for faults
    const KIND: &'static str;

    /// Property encoding
    fn encode(value: &Self::Value) -> Value;

    /// Property decoding, with a type check
    fn decode(value: &Value) -> Result<Self::Value>;

    /// Canonical string form for hashing; `None` for unhashable kinds
    fn canonical(_value: &Self::Value) -> Option<String> {
        None
    }
}

/// Kinds whose value is a sequence
pub trait ArrayKind: VariableKind<Value = Vec<<Self as ArrayKind>::Item>> {
    /// Element type
    type Item: Clone + PartialEq + Debug;

    /// Check and convert one dynamically typed entry
    fn item(value: &Value) -> Result<Self::Item>;
}

fn number(value: &Value, context: &'static str) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| Error::type_mismatch(context, "number", value.type_name()))
}

fn text(value: &Value, context: &'static str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::type_mismatch(context, "string", value.type_name()))
}

fn date(value: &Value, context: &'static str) -> Result<NaiveDate> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(context, "date", value.type_name()))?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| Error::type_mismatch(context, "date", format!("string {:?}", raw)))
}

fn format_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn list<T>(
    value: &Value,
    context: &'static str,
    item: impl Fn(&Value) -> Result<T>,
) -> Result<Vec<T>> {
    match value {
        Value::List(items) => items.iter().map(item).collect(),
        // A node written with an empty array reads back without the key
        Value::Null => Ok(Vec::new()),
        other => Err(Error::type_mismatch(context, "list", other.type_name())),
    }
}

// ============================================================================
// Kinds
// ============================================================================

/// Double precision number
#[derive(Debug, Clone, Copy)]
pub struct Number;

impl VariableKind for Number {
    type Value = f64;
    const LABEL: &'static str = label::NUMBER;
    const KIND: &'static str = "SimpleNumber";

    fn encode(value: &f64) -> Value {
        Value::Float(*value)
    }

    fn decode(value: &Value) -> Result<f64> {
        number(value, Self::KIND)
    }

    fn canonical(value: &f64) -> Option<String> {
        Some(canonical_float(*value))
    }
}

/// Calendar date
#[derive(Debug, Clone, Copy)]
pub struct Date;

impl VariableKind for Date {
    type Value = NaiveDate;
    const LABEL: &'static str = label::DATE;
    const KIND: &'static str = "SimpleDate";

    fn encode(value: &NaiveDate) -> Value {
        Value::String(format_date(value))
    }

    fn decode(value: &Value) -> Result<NaiveDate> {
        date(value, Self::KIND)
    }

    fn canonical(value: &NaiveDate) -> Option<String> {
        Some(format_date(value))
    }
}

/// UTF-8 string
#[derive(Debug, Clone, Copy)]
pub struct Text;

impl VariableKind for Text {
    type Value = String;
    const LABEL: &'static str = label::TEXT;
    const KIND: &'static str = "CompositeString";

    fn encode(value: &String) -> Value {
        Value::String(value.clone())
    }

    fn decode(value: &Value) -> Result<String> {
        text(value, Self::KIND)
    }

    fn canonical(value: &String) -> Option<String> {
        Some(value.clone())
    }
}

/// Array of numbers
#[derive(Debug, Clone, Copy)]
pub struct NumberArray;

impl VariableKind for NumberArray {
    type Value = Vec<f64>;
    const LABEL: &'static str = label::NUMBER_ARRAY;
    const KIND: &'static str = "CompositeArrayNumber";

    fn encode(value: &Vec<f64>) -> Value {
        Value::List(value.iter().copied().map(Value::Float).collect())
    }

    fn decode(value: &Value) -> Result<Vec<f64>> {
        list(value, Self::KIND, Self::item)
    }
}

impl ArrayKind for NumberArray {
    type Item = f64;

    fn item(value: &Value) -> Result<f64> {
        number(value, Self::KIND)
    }
}

/// Array of strings
#[derive(Debug, Clone, Copy)]
pub struct TextArray;

impl VariableKind for TextArray {
    type Value = Vec<String>;
    const LABEL: &'static str = label::TEXT_ARRAY;
    const KIND: &'static str = "CompositeArrayString";

    fn encode(value: &Vec<String>) -> Value {
        Value::List(value.iter().cloned().map(Value::String).collect())
    }

    fn decode(value: &Value) -> Result<Vec<String>> {
        list(value, Self::KIND, Self::item)
    }
}

impl ArrayKind for TextArray {
    type Item = String;

    fn item(value: &Value) -> Result<String> {
        text(value, Self::KIND)
    }
}

/// Array of dates
#[derive(Debug, Clone, Copy)]
pub struct DateArray;

impl VariableKind for DateArray {
    type Value = Vec<NaiveDate>;
    const LABEL: &'static str = label::DATE_ARRAY;
    const KIND: &'static str = "CompositeArrayDate";

    fn encode(value: &Vec<NaiveDate>) -> Value {
        Value::List(value.iter().map(|d| Value::String(format_date(d))).collect())
    }

    fn decode(value: &Value) -> Result<Vec<NaiveDate>> {
        list(value, Self::KIND, Self::item)
    }
}

impl ArrayKind for DateArray {
    type Item = NaiveDate;

    fn item(value: &Value) -> Result<NaiveDate> {
        date(value, Self::KIND)
    }
}

/// Number variable
pub type SimpleNumber = Variable<Number>;
/// Date variable
pub type SimpleDate = Variable<Date>;
/// String variable
pub type CompositeString = Variable<Text>;
/// Number array variable
pub type CompositeArrayNumber = Variable<NumberArray>;
/// String array variable
pub type CompositeArrayString = Variable<TextArray>;
/// Date array variable
pub type CompositeArrayDate = Variable<DateArray>;

// ============================================================================
// Variable
// ============================================================================

/// A named, typed value persisted as one node
#[derive(Debug, Clone)]
pub struct Variable<K: VariableKind> {
    id: Identity,
    value: K::Value,
    _kind: PhantomData<K>,
}

impl<K: VariableKind> Variable<K> {
    /// Unsaved variable; anonymous when `name` is `None`
    pub fn new(db: Arc<Database>, value: K::Value, name: Option<&str>) -> Self {
        Self {
            id: Identity::new(db, name),
            value,
            _kind: PhantomData,
        }
    }

    /// Construct and save in one step
    pub fn create(db: Arc<Database>, value: K::Value, name: Option<&str>) -> Result<Self> {
        let mut variable = Self::new(db, value, name);
        variable.save()?;
        Ok(variable)
    }

    /// Handle on an existing node
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        if !record.has_label(K::LABEL) {
            return Err(Error::type_mismatch(
                "Variable::from_record",
                K::KIND,
                record.labels.join(":"),
            ));
        }
        let value = K::decode(record.property(prop::VALUE).unwrap_or(&Value::Null))?;
        Ok(Self {
            id: Identity::saved(db, record.require_name()?),
            value,
            _kind: PhantomData,
        })
    }

    /// Node labels for this kind
    pub fn labels() -> Vec<String> {
        vec![
            label::ELEMENT.to_string(),
            label::VARIABLE.to_string(),
            K::LABEL.to_string(),
        ]
    }

    /// Current local value
    pub fn value(&self) -> &K::Value {
        &self.value
    }

    /// Replace the local value; `save()` persists it
    pub fn set_value(&mut self, value: K::Value) {
        self.value = value;
    }

    /// Create the node, or write the value of an existing one
    pub fn save(&mut self) -> Result<()> {
        let mut properties = Properties::new();
        properties.insert(prop::VALUE.to_string(), K::encode(&self.value));
        match self.id.state {
            Lifecycle::Unsaved => {
                self.id.create(Self::labels(), properties)?;
                debug!(target: "graphads::element", name = %self.id.name, kind = K::KIND, "created");
                Ok(())
            }
            Lifecycle::Saved => {
                let updated = self
                    .id
                    .db
                    .run(&Statement::UpdateProperties {
                        name: self.id.name.clone(),
                        properties,
                    })?
                    .count()?;
                if updated == 0 {
                    return Err(Error::ObjectNotFound(self.id.name.to_string()));
                }
                Ok(())
            }
            Lifecycle::Deleted => Err(Error::ObjectDeleted { operation: "save" }),
        }
    }

    /// Reload the value from the store
    pub fn refresh(&mut self) -> Result<()> {
        self.id.check("refresh")?;
        let record = self
            .id
            .db
            .run(&Statement::FetchNode {
                name: self.id.name.clone(),
            })?
            .into_optional_node()?
            .ok_or_else(|| Error::ObjectNotFound(self.id.name.to_string()))?;
        self.value = K::decode(record.property(prop::VALUE).unwrap_or(&Value::Null))?;
        Ok(())
    }

    /// Remove the node
    ///
    /// Fails with `StillReferenced` while a container holds this variable.
    pub fn delete(&mut self) -> Result<()> {
        self.id.delete("delete")
    }
}

impl<K: VariableKind> Element for Variable<K> {
    fn name(&self) -> &ObjectName {
        &self.id.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.id.state
    }

    fn kind(&self) -> &'static str {
        K::KIND
    }

    fn hash_tag(&self) -> Result<HashTag> {
        K::canonical(&self.value)
            .map(|form| HashTag::of_canonical(&form))
            .ok_or(Error::Unhashable(K::KIND))
    }
}

// ============================================================================
// Arrays
// ============================================================================

impl<K: ArrayKind> Variable<K> {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// True when there are no entries
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Result<&K::Item> {
        let length = self.value.len() as u64;
        self.value
            .get(index)
            .ok_or(Error::IndexOutOfBounds { index, length })
    }

    /// Overwrite the entry at `index`
    pub fn set(&mut self, index: usize, item: K::Item) -> Result<()> {
        let length = self.value.len() as u64;
        let slot = self
            .value
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index, length })?;
        *slot = item;
        Ok(())
    }

    /// Overwrite the entry at `index` from a dynamically typed value
    ///
    /// Numbers accept integers and floats; anything else of the wrong type
    /// is a type mismatch.
    pub fn set_dynamic(&mut self, index: usize, value: &Value) -> Result<()> {
        let item = K::item(value)?;
        self.set(index, item)
    }

    /// Drop every entry locally
    pub fn clear(&mut self) {
        self.value.clear();
    }
}

impl Variable<NumberArray> {
    /// Fill the array with the store ids of the selected nodes
    ///
    /// Ids are captured in selector order by one statement and then read
    /// back. A non-empty array needs `auto_reset`.
    pub fn from_query_ids(&mut self, selector: Selector, auto_reset: bool) -> Result<()> {
        self.id.check("from_query_ids")?;
        if !self.value.is_empty() && !auto_reset {
            return Err(Error::ContainerNotEmpty {
                name: self.id.name.to_string(),
                kind: NumberArray::KIND,
            });
        }
        let mut reset = Properties::new();
        reset.insert(prop::VALUE.to_string(), Value::List(Vec::new()));
        let outcomes = self.id.db.run_batch(&[
            Statement::UpdateProperties {
                name: self.id.name.clone(),
                properties: reset,
            },
            Statement::CaptureIds {
                array: self.id.name.clone(),
                selector,
            },
        ])?;
        if outcomes[0].count()? == 0 {
            return Err(Error::ObjectNotFound(self.id.name.to_string()));
        }
        self.refresh()
    }

    /// Stored values as node ids
    pub fn ids(&self) -> Vec<i64> {
        self.value.iter().map(|v| *v as i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_number_save_refresh() {
        let db = Database::ephemeral();
        let mut n = SimpleNumber::create(db.clone(), 2.5, Some("n")).unwrap();
        n.set_value(3.0);
        n.save().unwrap();

        let mut other = SimpleNumber::new(db, 0.0, Some("n"));
        assert!(matches!(other.refresh(), Err(Error::ObjectUnsaved { .. })));
        n.refresh().unwrap();
        assert_eq!(*n.value(), 3.0);
    }

    #[test]
    fn test_hash_uses_canonical_form() {
        let db = Database::ephemeral();
        let a = SimpleNumber::new(db.clone(), 1.0, None);
        let b = SimpleNumber::new(db.clone(), 1.0, None);
        assert_eq!(a.hash_tag().unwrap(), b.hash_tag().unwrap());
        assert_eq!(a.hash_tag().unwrap(), HashTag::of_canonical("1.0"));

        let d = SimpleDate::new(db.clone(), day(2020, 2, 29), None);
        assert_eq!(d.hash_tag().unwrap(), HashTag::of_canonical("2020-02-29"));

        let s = CompositeString::new(db, "hello".into(), None);
        assert_eq!(s.hash_tag().unwrap(), HashTag::of_canonical("hello"));
    }

    #[test]
    fn test_arrays_are_unhashable() {
        let db = Database::ephemeral();
        let a = CompositeArrayString::new(db, vec!["x".into()], None);
        assert!(matches!(
            a.hash_tag(),
            Err(Error::Unhashable("CompositeArrayString"))
        ));
    }

    #[test]
    fn test_date_round_trip() {
        let db = Database::ephemeral();
        let mut d = SimpleDate::create(db, day(1999, 12, 31), Some("eve")).unwrap();
        d.refresh().unwrap();
        assert_eq!(*d.value(), day(1999, 12, 31));
    }

    #[test]
    fn test_delete_twice() {
        let db = Database::ephemeral();
        let mut s = CompositeString::create(db, "x".into(), None).unwrap();
        s.delete().unwrap();
        assert_eq!(s.lifecycle(), Lifecycle::Deleted);
        assert!(matches!(s.delete(), Err(Error::ObjectDeleted { .. })));
        assert!(matches!(s.save(), Err(Error::ObjectDeleted { .. })));
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let db = Database::ephemeral();
        SimpleNumber::create(db.clone(), 1.0, Some("same")).unwrap();
        let err = CompositeString::create(db, "y".into(), Some("same")).unwrap_err();
        assert!(matches!(err, Error::NameConflict(_)));
    }

    mod arrays {
        use super::*;

        #[test]
        fn test_get_set_bounds() {
            let db = Database::ephemeral();
            let mut a = CompositeArrayNumber::new(db, vec![1.0, 2.0], None);
            assert_eq!(*a.get(1).unwrap(), 2.0);
            a.set(0, 5.0).unwrap();
            assert_eq!(a.value(), &vec![5.0, 2.0]);
            assert!(matches!(
                a.get(2),
                Err(Error::IndexOutOfBounds { index: 2, length: 2 })
            ));
            assert!(a.set(9, 0.0).is_err());
        }

        #[test]
        fn test_set_dynamic_type_checks() {
            let db = Database::ephemeral();
            let mut numbers = CompositeArrayNumber::new(db.clone(), vec![0.0], None);
            numbers.set_dynamic(0, &Value::Int(7)).unwrap();
            assert_eq!(*numbers.get(0).unwrap(), 7.0);
            assert!(matches!(
                numbers.set_dynamic(0, &Value::from("seven")),
                Err(Error::TypeMismatch { .. })
            ));

            let mut dates = CompositeArrayDate::new(db, vec![day(2000, 1, 1)], None);
            dates.set_dynamic(0, &Value::from("2001-02-03")).unwrap();
            assert_eq!(*dates.get(0).unwrap(), day(2001, 2, 3));
            assert!(dates.set_dynamic(0, &Value::from("yesterday")).is_err());
            assert!(dates.set_dynamic(0, &Value::Float(1.0)).is_err());
        }

        #[test]
        fn test_clear_then_save_persists_empty() {
            let db = Database::ephemeral();
            let mut a =
                CompositeArrayString::create(db, vec!["a".into(), "b".into()], None).unwrap();
            a.clear();
            a.save().unwrap();
            a.refresh().unwrap();
            assert!(a.is_empty());
        }

        #[test]
        fn test_from_query_ids() {
            let db = Database::ephemeral();
            for (i, name) in ["p", "q", "r"].iter().enumerate() {
                SimpleNumber::create(db.clone(), i as f64, Some(name)).unwrap();
            }
            let mut ids = CompositeArrayNumber::create(db.clone(), Vec::new(), None).unwrap();
            ids.from_query_ids(Selector::names(["r", "p"]), false).unwrap();
            assert_eq!(ids.len(), 2);

            assert!(matches!(
                ids.from_query_ids(Selector::names(["q"]), false),
                Err(Error::ContainerNotEmpty { .. })
            ));
            ids.from_query_ids(Selector::names(["nobody"]), true).unwrap();
            assert!(ids.is_empty());
        }
    }
}
