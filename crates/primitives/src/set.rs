//! Set: hash-tagged wrapper items, at most one per distinct hash
//!
//! ```text
//! (:Set)-[:MEMBER]->(:SetItem {hash})-[:HOLDS]->(element)
//! ```
//!
//! Hashes are computed client-side from the element's value; the store only
//! compares them. Set algebra writes into a fresh anonymous set, copying
//! wrapper items (never elements).

use std::collections::HashSet;
use std::sync::Arc;

use graphads_core::{
    ContainerFamily, Error, HashTag, NodeRecord, ObjectName, Result, Selector, StagedEntry,
    StagingAnchor, Statement,
};
use graphads_engine::Database;
use tracing::debug;

use crate::container::ContainerCore;
use crate::element::{Element, Lifecycle};
use crate::object::Object;

/// A persisted hash set
#[derive(Debug, Clone)]
pub struct Set {
    core: ContainerCore,
}

impl Set {
    /// Unsaved set; anonymous when `name` is `None`
    pub fn new(db: Arc<Database>, name: Option<&str>) -> Self {
        Self {
            core: ContainerCore::new(db, ContainerFamily::Set, name),
        }
    }

    /// Construct and save in one step
    pub fn create(db: Arc<Database>, name: Option<&str>) -> Result<Self> {
        let mut set = Self::new(db, name);
        set.save()?;
        Ok(set)
    }

    /// Handle on an existing set node
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        Ok(Self {
            core: ContainerCore::from_record(db, ContainerFamily::Set, record)?,
        })
    }

    /// Create the empty set node
    pub fn save(&mut self) -> Result<()> {
        self.core.save()
    }

    /// Re-read the stored length
    pub fn refresh(&mut self) -> Result<()> {
        self.core.refresh()
    }

    /// Cached number of members
    pub fn len(&self) -> Result<u64> {
        self.core.len("len")
    }

    /// True when the cached length is zero
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every member; elements stay
    pub fn clear(&mut self) -> Result<()> {
        self.core.clear()
    }

    /// Remove the set node; the set must be empty
    pub fn delete(&mut self) -> Result<()> {
        self.core.delete()
    }

    /// Clear, then delete
    pub fn destroy(&mut self) -> Result<()> {
        self.core.destroy()
    }

    fn db(&self) -> &Arc<Database> {
        self.core.db()
    }

    fn name_owned(&self) -> ObjectName {
        self.core.name().clone()
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// True when an item carries `hash`
    pub fn contains_hash(&self, hash: &HashTag) -> Result<bool> {
        Ok(self.find(hash, "contains_hash")?.is_some())
    }

    /// True when an item carries the element's hash
    pub fn contains<E: Element + ?Sized>(&self, element: &E) -> Result<bool> {
        self.contains_hash(&element.hash_tag()?)
    }

    fn find(&self, hash: &HashTag, operation: &'static str) -> Result<Option<NodeRecord>> {
        self.core.check(operation)?;
        self.db()
            .run(&Statement::SetFindHash {
                set: self.name_owned(),
                hash: *hash,
            })?
            .into_optional_node()
    }

    /// Insert under an explicit hash; returns false when the hash is present
    pub fn add_with_hash<E: Element + ?Sized>(
        &mut self,
        element: &E,
        hash: HashTag,
    ) -> Result<bool> {
        self.core.check("add")?;
        element.ensure_saved("add")?;
        let inserted = self
            .db()
            .run(&Statement::SetInsert {
                set: self.name_owned(),
                element: element.name().clone(),
                hash,
            })?
            .count()?;
        if inserted > 0 {
            self.core.length += 1;
        }
        Ok(inserted > 0)
    }

    /// Insert unless an equal element is present; returns whether it was added
    pub fn add<E: Element + ?Sized>(&mut self, element: &E) -> Result<bool> {
        let hash = element.hash_tag()?;
        self.add_with_hash(element, hash)
    }

    /// Element stored under `hash`
    pub fn retrieve_by_hash(&self, hash: &HashTag) -> Result<Option<Object>> {
        self.find(hash, "retrieve_by_hash")?
            .map(|record| Object::from_record(Arc::clone(self.db()), &record))
            .transpose()
    }

    /// Remove the item carrying `hash`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when no item carries it.
    pub fn remove_by_hash(&mut self, hash: &HashTag) -> Result<()> {
        self.core.check("remove")?;
        let removed = self
            .db()
            .run(&Statement::SetRemoveHash {
                set: self.name_owned(),
                hash: *hash,
            })?
            .count()?;
        if removed == 0 {
            return Err(Error::KeyNotFound(hash.to_hex()));
        }
        self.core.length = self.core.length.saturating_sub(removed);
        Ok(())
    }

    /// Remove the member equal to `element`
    pub fn remove<E: Element + ?Sized>(&mut self, element: &E) -> Result<()> {
        self.remove_by_hash(&element.hash_tag()?)
    }

    /// Every member with its hash, ordered by hash
    pub fn members(&self) -> Result<Vec<(HashTag, Object)>> {
        self.core.check("members")?;
        let db = self.db();
        db.run(&Statement::SetMembers {
            set: self.name_owned(),
        })?
        .into_members()?
        .into_iter()
        .map(|m| Ok((m.hash, Object::from_record(Arc::clone(db), &m.element)?)))
        .collect()
    }

    // ========================================================================
    // Algebra
    // ========================================================================

    /// Fill a fresh anonymous set with the statements `fill` writes into it
    fn derive<F>(&self, other: &Set, operation: &'static str, fill: F) -> Result<Set>
    where
        F: FnOnce(ObjectName) -> Vec<Statement>,
    {
        self.core.check(operation)?;
        other.core.check(operation)?;
        let mut result = Set::new(Arc::clone(self.db()), None);
        let target = result.name_owned();

        let mut batch = vec![result.core.create_statement()];
        batch.extend(fill(target.clone()));
        batch.push(result.core.recount());

        let outcomes = self.db().run_batch(&batch)?;
        result.core.id.state = Lifecycle::Saved;
        let last = outcomes
            .last()
            .ok_or_else(|| Error::protocol("empty batch result"))?;
        result.core.apply_length(last)?;
        debug!(
            target: "graphads::set",
            operation,
            left = %self.core.name(),
            right = %other.core.name(),
            result = %target,
            length = result.core.length,
            "derived set"
        );
        Ok(result)
    }

    /// Members of either set
    pub fn union(&self, other: &Set) -> Result<Set> {
        let (left, right) = (self.name_owned(), other.name_owned());
        self.derive(other, "union", |target| {
            vec![
                Statement::SetMerge {
                    target: target.clone(),
                    source: left,
                },
                Statement::SetMerge {
                    target,
                    source: right,
                },
            ]
        })
    }

    /// Members of both sets
    pub fn intersection(&self, other: &Set) -> Result<Set> {
        let (left, right) = (self.name_owned(), other.name_owned());
        self.derive(other, "intersection", |target| {
            vec![Statement::SetIntersect {
                target,
                left,
                right,
            }]
        })
    }

    /// Members of this set absent from `other`
    pub fn difference(&self, other: &Set) -> Result<Set> {
        let (left, right) = (self.name_owned(), other.name_owned());
        self.derive(other, "difference", |target| {
            vec![Statement::SetSubtract {
                target,
                left,
                right,
            }]
        })
    }

    /// Members of exactly one set: two difference passes into one result
    pub fn symmetric_difference(&self, other: &Set) -> Result<Set> {
        let (left, right) = (self.name_owned(), other.name_owned());
        self.derive(other, "symmetric_difference", |target| {
            vec![
                Statement::SetSubtract {
                    target: target.clone(),
                    left: left.clone(),
                    right: right.clone(),
                },
                Statement::SetSubtract {
                    target,
                    left: right,
                    right: left,
                },
            ]
        })
    }

    /// Same hash collections
    ///
    /// Differing cached lengths answer `false` without a round trip.
    pub fn is_equal(&self, other: &Set) -> Result<bool> {
        if self.len()? != other.len()? {
            return Ok(false);
        }
        self.db()
            .run(&Statement::SetEquals {
                left: self.name_owned(),
                right: other.name_owned(),
            })?
            .flag()
    }

    // ========================================================================
    // Bulk construction
    // ========================================================================

    /// Copy the items of `other` into this set
    pub fn from_set(&mut self, other: &Set, auto_reset: bool) -> Result<()> {
        self.core.check("from_set")?;
        other.core.check("from_set")?;
        let mut batch: Vec<Statement> =
            self.core.reset_statement(auto_reset)?.into_iter().collect();
        batch.push(Statement::SetMerge {
            target: self.name_owned(),
            source: other.name_owned(),
        });
        batch.push(self.core.recount());
        self.run_build(&batch)
    }

    /// Build from `(hash, node id)` pairs; the first pair per hash wins
    pub fn from_hashed_elements(
        &mut self,
        entries: &[(HashTag, i64)],
        auto_reset: bool,
    ) -> Result<()> {
        self.core.check("from_hashed_elements")?;
        let mut batch: Vec<Statement> =
            self.core.reset_statement(auto_reset)?.into_iter().collect();
        batch.extend(staged_build(self.core.name(), entries));
        batch.push(self.core.recount());
        self.run_build(&batch)
    }

    /// Build from the rows of a selector
    ///
    /// Rows are fetched and hashed here, deduplicated by hash (first
    /// occurrence wins) and staged in one batch.
    pub fn from_query(&mut self, selector: Selector, auto_reset: bool) -> Result<()> {
        self.core.check("from_query")?;
        if self.core.length > 0 && !auto_reset {
            return Err(self.core.not_empty());
        }
        let entries = hashed_rows(self.db(), selector)?;
        self.from_hashed_elements(&entries, auto_reset)
    }

    fn run_build(&mut self, batch: &[Statement]) -> Result<()> {
        let outcomes = self.db().run_batch(batch)?;
        let last = outcomes
            .last()
            .ok_or_else(|| Error::protocol("empty batch result"))?;
        self.core.apply_length(last)
    }
}

impl Element for Set {
    fn name(&self) -> &ObjectName {
        self.core.name()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core.id.state
    }

    fn kind(&self) -> &'static str {
        "Set"
    }
}

/// Fetch the selected rows and hash them; first occurrence per hash wins
pub(crate) fn hashed_rows(db: &Arc<Database>, selector: Selector) -> Result<Vec<(HashTag, i64)>> {
    let records = db.run(&Statement::Select { selector })?.into_nodes()?;
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let hash = Object::from_record(Arc::clone(db), record)?.hash_tag()?;
        if seen.insert(hash) {
            entries.push((hash, record.id));
        }
    }
    Ok(entries)
}

/// Stage, attach as members, drop staging edges
pub(crate) fn staged_build(set: &ObjectName, entries: &[(HashTag, i64)]) -> Vec<Statement> {
    let mut seen = HashSet::new();
    let staged: Vec<StagedEntry> = entries
        .iter()
        .filter(|(hash, _)| seen.insert(*hash))
        .enumerate()
        .map(|(ordinal, (hash, node))| StagedEntry {
            ordinal: ordinal as u64,
            node: *node,
            hash: Some(*hash),
        })
        .collect();
    vec![
        Statement::StageEntries {
            container: set.clone(),
            family: ContainerFamily::Set,
            entries: staged,
        },
        Statement::AnchorStaged {
            container: set.clone(),
            anchor: StagingAnchor::Members,
        },
        Statement::DropStaged {
            container: set.clone(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{CompositeString, SimpleNumber};

    fn set_of(db: &Arc<Database>, name: &str, values: &[f64]) -> Set {
        let mut set = Set::create(db.clone(), Some(name)).unwrap();
        for v in values {
            let n = SimpleNumber::create(db.clone(), *v, None).unwrap();
            set.add(&n).unwrap();
        }
        set
    }

    fn sorted_numbers(set: &Set) -> Vec<f64> {
        let mut values: Vec<f64> = set
            .members()
            .unwrap()
            .iter()
            .filter_map(|(_, o)| o.as_number())
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values
    }

    #[test]
    fn test_add_is_idempotent_by_value() {
        let db = Database::ephemeral();
        let mut set = Set::create(db.clone(), None).unwrap();
        let a = SimpleNumber::create(db.clone(), 1.0, None).unwrap();
        let b = SimpleNumber::create(db.clone(), 1.0, None).unwrap();
        assert!(set.add(&a).unwrap());
        assert!(!set.add(&b).unwrap());
        assert_eq!(set.len().unwrap(), 1);
        assert!(set.contains(&b).unwrap());
    }

    #[test]
    fn test_remove_missing_is_key_not_found() {
        let db = Database::ephemeral();
        let mut set = set_of(&db, "s", &[1.0]);
        let absent = SimpleNumber::new(db, 2.0, None);
        assert!(matches!(set.remove(&absent), Err(Error::KeyNotFound(_))));
        assert_eq!(set.len().unwrap(), 1);
    }

    #[test]
    fn test_unhashable_element() {
        let db = Database::ephemeral();
        let mut set = Set::create(db.clone(), None).unwrap();
        let inner = Set::create(db, None).unwrap();
        assert!(matches!(set.add(&inner), Err(Error::Unhashable("Set"))));
    }

    #[test]
    fn test_retrieve_by_hash() {
        let db = Database::ephemeral();
        let mut set = Set::create(db.clone(), None).unwrap();
        let word = CompositeString::create(db, "graph".into(), None).unwrap();
        set.add(&word).unwrap();
        let found = set.retrieve_by_hash(&word.hash_tag().unwrap()).unwrap();
        assert_eq!(found.unwrap().as_text(), Some("graph"));
        assert!(set
            .retrieve_by_hash(&HashTag::of_canonical("other"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_algebra_scenario() {
        let db = Database::ephemeral();
        let u = set_of(&db, "U", &[1.0, 2.0, 3.0]);
        let v = set_of(&db, "V", &[2.0, 3.0, 5.0, 6.0]);

        let both = u.intersection(&v).unwrap();
        assert_eq!(both.len().unwrap(), 2);
        let two = SimpleNumber::new(db.clone(), 2.0, None);
        assert!(both.contains(&two).unwrap());
        assert!(both.name().is_anonymous());

        let sym = u.symmetric_difference(&v).unwrap();
        assert_eq!(sym.len().unwrap(), 3);
        assert_eq!(sorted_numbers(&sym), vec![1.0, 5.0, 6.0]);

        let either = u.difference(&v).unwrap().union(&v.difference(&u).unwrap()).unwrap();
        assert!(either.is_equal(&sym).unwrap());

        let all = u.union(&v).unwrap();
        assert_eq!(all.len().unwrap(), 5);
        assert!(!all.is_equal(&u).unwrap());
    }

    #[test]
    fn test_from_query_dedupes_by_hash() {
        let db = Database::ephemeral();
        for (name, v) in [("a", 1.0), ("b", 2.0), ("c", 1.0)] {
            SimpleNumber::create(db.clone(), v, Some(name)).unwrap();
        }
        let mut set = Set::create(db.clone(), None).unwrap();
        set.from_query(Selector::names(["c", "a", "b"]), false).unwrap();
        assert_eq!(set.len().unwrap(), 2);

        // first occurrence wins
        let one = SimpleNumber::new(db, 1.0, None).hash_tag().unwrap();
        let kept = set.retrieve_by_hash(&one).unwrap().unwrap();
        assert_eq!(kept.name().as_str(), "c");

        assert!(matches!(
            set.from_query(Selector::names(["a"]), false),
            Err(Error::ContainerNotEmpty { .. })
        ));
    }

    #[test]
    fn test_from_set_copies_items() {
        let db = Database::ephemeral();
        let source = set_of(&db, "src", &[4.0, 5.0]);
        let mut copy = Set::create(db.clone(), None).unwrap();
        copy.from_set(&source, false).unwrap();
        assert_eq!(copy.len().unwrap(), 2);
        assert!(copy.is_equal(&source).unwrap());

        let mut source = source;
        source.clear().unwrap();
        assert_eq!(source.len().unwrap(), 0);
        copy.refresh().unwrap();
        assert_eq!(copy.len().unwrap(), 2);
    }

    #[test]
    fn test_from_record_reads_stored_length() {
        let db = Database::ephemeral();
        set_of(&db, "s", &[1.0, 2.0]);
        let record = db
            .run(&Statement::FetchNode {
                name: ObjectName::new("s"),
            })
            .unwrap()
            .into_optional_node()
            .unwrap()
            .unwrap();
        let reopened = Set::from_record(db, &record).unwrap();
        assert_eq!(reopened.len().unwrap(), 2);
    }
}
