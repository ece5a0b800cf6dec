//! Map: a key set and a value set kept aligned by hash
//!
//! ```text
//! (:Map)-[:KEYS]->(:Set)    items hashed by key
//! (:Map)-[:VALUES]->(:Set)  items hashed by the same key hash
//! ```
//!
//! Both component sets are anonymous and allocated on the first write.
//! Reads on an unallocated map report absence and allocate nothing.

use std::sync::Arc;

use graphads_core::{
    ContainerFamily, Error, HashTag, MapComponents, NodeRecord, ObjectName, Result, Selector,
    Statement,
};
use graphads_engine::Database;
use tracing::debug;

use crate::container::ContainerCore;
use crate::element::{Element, Lifecycle};
use crate::object::Object;
use crate::set::staged_build;

/// A persisted key/value map
#[derive(Debug, Clone)]
pub struct Map {
    core: ContainerCore,
}

impl Map {
    /// Unsaved map; anonymous when `name` is `None`
    pub fn new(db: Arc<Database>, name: Option<&str>) -> Self {
        Self {
            core: ContainerCore::new(db, ContainerFamily::Map, name),
        }
    }

    /// Construct and save in one step
    pub fn create(db: Arc<Database>, name: Option<&str>) -> Result<Self> {
        let mut map = Self::new(db, name);
        map.save()?;
        Ok(map)
    }

    /// Handle on an existing map node
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        Ok(Self {
            core: ContainerCore::from_record(db, ContainerFamily::Map, record)?,
        })
    }

    /// Create the map node; components come later
    pub fn save(&mut self) -> Result<()> {
        self.core.save()
    }

    /// Re-read the stored length
    pub fn refresh(&mut self) -> Result<()> {
        self.core.refresh()
    }

    /// Cached number of entries
    pub fn len(&self) -> Result<u64> {
        self.core.len("len")
    }

    /// True when the cached length is zero
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn db(&self) -> &Arc<Database> {
        self.core.db()
    }

    fn name_owned(&self) -> ObjectName {
        self.core.name().clone()
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Key and value set names, `None` while unallocated
    pub fn components(&self) -> Result<Option<MapComponents>> {
        self.core.check("components")?;
        self.db()
            .run(&Statement::MapComponents {
                map: self.name_owned(),
            })?
            .into_components()
    }

    /// Allocate both component sets if this map has none yet
    pub fn ensure_initialized(&mut self) -> Result<MapComponents> {
        if let Some(components) = self.components()? {
            return Ok(components);
        }
        let keys = ContainerCore::new(Arc::clone(self.db()), ContainerFamily::Set, None);
        let values = ContainerCore::new(Arc::clone(self.db()), ContainerFamily::Set, None);
        let components = MapComponents {
            keys: keys.name().clone(),
            values: values.name().clone(),
        };
        self.db().run_batch(&[
            keys.create_statement(),
            values.create_statement(),
            Statement::MapAttach {
                map: self.name_owned(),
                keys: components.keys.clone(),
                values: components.values.clone(),
            },
        ])?;
        debug!(
            target: "graphads::map",
            map = %self.core.name(),
            keys = %components.keys,
            values = %components.values,
            "allocated components"
        );
        Ok(components)
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Value stored under `key`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when the key is absent.
    pub fn get<K: Element + ?Sized>(&self, key: &K) -> Result<Object> {
        let hash = key.hash_tag()?;
        let Some(components) = self.components()? else {
            return Err(Error::KeyNotFound(hash.to_hex()));
        };
        let record = self
            .find(&components.values, hash)?
            .ok_or_else(|| Error::KeyNotFound(hash.to_hex()))?;
        Object::from_record(Arc::clone(self.db()), &record)
    }

    /// True when `key` has an entry
    pub fn contains<K: Element + ?Sized>(&self, key: &K) -> Result<bool> {
        let hash = key.hash_tag()?;
        match self.components()? {
            Some(components) => Ok(self.find(&components.keys, hash)?.is_some()),
            None => Ok(false),
        }
    }

    fn find(&self, set: &ObjectName, hash: HashTag) -> Result<Option<NodeRecord>> {
        self.db()
            .run(&Statement::SetFindHash {
                set: set.clone(),
                hash,
            })?
            .into_optional_node()
    }

    /// Assign `value` to `key`, replacing any previous value
    pub fn set<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: Element + ?Sized,
        V: Element + ?Sized,
    {
        self.core.check("set")?;
        key.ensure_saved("set")?;
        value.ensure_saved("set")?;
        let hash = key.hash_tag()?;
        self.require_stored(key.name())?;
        self.require_stored(value.name())?;
        let components = self.ensure_initialized()?;
        let batch = [
            Statement::SetRemoveHash {
                set: components.values.clone(),
                hash,
            },
            Statement::SetInsert {
                set: components.keys,
                element: key.name().clone(),
                hash,
            },
            Statement::SetInsert {
                set: components.values,
                element: value.name().clone(),
                hash,
            },
            self.core.recount(),
        ];
        let outcomes = self.db().run_batch(&batch)?;
        if outcomes[2].count()? == 0 {
            self.core.refresh()?;
            return Err(Error::ObjectNotFound(value.name().to_string()));
        }
        self.core.apply_length(&outcomes[3])
    }

    /// Both halves of an entry must exist before the old value is dropped
    fn require_stored(&self, name: &ObjectName) -> Result<()> {
        self.db()
            .run(&Statement::FetchNode { name: name.clone() })?
            .into_optional_node()?
            .map(|_| ())
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    /// Drop the entry for `key`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when the key is absent; nothing changes.
    pub fn remove<K: Element + ?Sized>(&mut self, key: &K) -> Result<()> {
        self.core.check("remove")?;
        let hash = key.hash_tag()?;
        let Some(components) = self.components()? else {
            return Err(Error::KeyNotFound(hash.to_hex()));
        };
        let batch = [
            Statement::SetRemoveHash {
                set: components.keys,
                hash,
            },
            Statement::SetRemoveHash {
                set: components.values,
                hash,
            },
            self.core.recount(),
        ];
        let outcomes = self.db().run_batch(&batch)?;
        self.core.apply_length(&outcomes[2])?;
        if outcomes[0].count()? == 0 {
            return Err(Error::KeyNotFound(hash.to_hex()));
        }
        Ok(())
    }

    fn component_members(&self, pick: fn(MapComponents) -> ObjectName) -> Result<Vec<Object>> {
        let Some(components) = self.components()? else {
            return Ok(Vec::new());
        };
        let db = self.db();
        db.run(&Statement::SetMembers {
            set: pick(components),
        })?
        .into_members()?
        .into_iter()
        .map(|m| Object::from_record(Arc::clone(db), &m.element))
        .collect()
    }

    /// Keys, ordered by hash
    pub fn keys(&self) -> Result<Vec<Object>> {
        self.component_members(|c| c.keys)
    }

    /// Values, in the same order as [`Map::keys`]
    pub fn values(&self) -> Result<Vec<Object>> {
        self.component_members(|c| c.values)
    }

    // ========================================================================
    // Bulk construction
    // ========================================================================

    /// Build from two correlated selections: row `i` of `values` belongs to
    /// row `i` of `keys`
    ///
    /// Repeated keys keep their first value.
    ///
    /// # Errors
    ///
    /// `Construction` when the selections differ in length.
    pub fn from_keyvalue_query(
        &mut self,
        keys: Selector,
        values: Selector,
        auto_reset: bool,
    ) -> Result<()> {
        self.core.check("from_keyvalue_query")?;
        let reset = self.core.reset_statement(auto_reset)?;
        let key_rows = hashed_pairs(self.db(), keys)?;
        let value_rows = self
            .db()
            .run(&Statement::Select { selector: values })?
            .into_nodes()?;
        if key_rows.len() != value_rows.len() {
            return Err(Error::Construction(format!(
                "{} keys but {} values",
                key_rows.len(),
                value_rows.len()
            )));
        }
        let key_entries: Vec<(HashTag, i64)> = key_rows.iter().map(|(h, id)| (*h, *id)).collect();
        let value_entries: Vec<(HashTag, i64)> = key_rows
            .iter()
            .zip(&value_rows)
            .map(|((hash, _), value)| (*hash, value.id))
            .collect();

        let components = self.ensure_initialized()?;
        let mut batch: Vec<Statement> = reset.into_iter().collect();
        batch.extend(staged_build(&components.keys, &key_entries));
        batch.extend(staged_build(&components.values, &value_entries));
        for set in [&components.keys, &components.values] {
            batch.push(Statement::Recount {
                container: set.clone(),
                family: ContainerFamily::Set,
            });
        }
        batch.push(self.core.recount());
        let outcomes = self.db().run_batch(&batch)?;
        let last = outcomes
            .last()
            .ok_or_else(|| Error::protocol("empty batch result"))?;
        self.core.apply_length(last)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Remove every entry; components stay allocated
    pub fn clear(&mut self) -> Result<()> {
        self.core.clear()
    }

    fn teardown(&mut self, clear: bool, operation: &'static str) -> Result<()> {
        self.core.check(operation)?;
        let mut batch = Vec::new();
        if clear {
            batch.push(self.core.clear_items());
        }
        if let Some(components) = self.components()? {
            batch.push(Statement::MapDetach {
                map: self.name_owned(),
            });
            for set in [components.keys, components.values] {
                batch.push(Statement::DeleteNode {
                    name: set,
                    detach: false,
                });
            }
        }
        batch.push(Statement::DeleteNode {
            name: self.name_owned(),
            detach: false,
        });
        self.db().run_batch(&batch)?;
        self.core.length = 0;
        self.core.id.state = Lifecycle::Deleted;
        debug!(target: "graphads::map", map = %self.core.name(), operation, "removed");
        Ok(())
    }

    /// Remove the map and its components; the map must be empty
    pub fn delete(&mut self) -> Result<()> {
        if self.len()? > 0 {
            return Err(self.core.not_empty());
        }
        self.teardown(false, "delete")
    }

    /// Clear, then remove the map and its components in one batch
    pub fn destroy(&mut self) -> Result<()> {
        self.teardown(true, "destroy")
    }
}

impl Element for Map {
    fn name(&self) -> &ObjectName {
        self.core.name()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core.id.state
    }

    fn kind(&self) -> &'static str {
        "Map"
    }
}

fn hashed_pairs(db: &Arc<Database>, selector: Selector) -> Result<Vec<(HashTag, i64)>> {
    let records = db.run(&Statement::Select { selector })?.into_nodes()?;
    records
        .iter()
        .map(|r| Ok((Object::from_record(Arc::clone(db), r)?.hash_tag()?, r.id)))
        .collect()
}
