//! List: a doubly linked chain of wrapper items
//!
//! ```text
//! (:List)-[:NEXT]->(i0)-[:NEXT]->(i1)-[:NEXT]->(i2)
//!                  (i0)<-[:PREV]-(i1)<-[:PREV]-(i2)
//! (iN)-[:HOLDS]->(element)
//! ```
//!
//! Index `i` is reached by walking exactly `i + 1` NEXT edges from the list
//! node inside one statement. Every mutation pairs a structural statement
//! with a length write in one batch.

use std::sync::Arc;

use graphads_core::{
    ChainReport, ContainerFamily, Error, NodeRecord, ObjectName, Result, Selector, StagingAnchor,
    StagingLink, Statement,
};
use graphads_engine::Database;
use tracing::{debug, warn};

use crate::container::ContainerCore;
use crate::element::{Element, Lifecycle};
use crate::object::Object;
use crate::variable::CompositeArrayNumber;

/// A persisted doubly linked list
#[derive(Debug, Clone)]
pub struct List {
    core: ContainerCore,
}

impl List {
    /// Unsaved list; anonymous when `name` is `None`
    pub fn new(db: Arc<Database>, name: Option<&str>) -> Self {
        Self {
            core: ContainerCore::new(db, ContainerFamily::List, name),
        }
    }

    /// Construct and save in one step
    pub fn create(db: Arc<Database>, name: Option<&str>) -> Result<Self> {
        let mut list = Self::new(db, name);
        list.save()?;
        Ok(list)
    }

    /// Handle on an existing list node
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        Ok(Self {
            core: ContainerCore::from_record(db, ContainerFamily::List, record)?,
        })
    }

    /// Create the empty list node
    pub fn save(&mut self) -> Result<()> {
        self.core.save()
    }

    /// Re-read the stored length
    pub fn refresh(&mut self) -> Result<()> {
        self.core.refresh()
    }

    /// Cached number of items
    pub fn len(&self) -> Result<u64> {
        self.core.len("len")
    }

    /// True when the cached length is zero
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every item; payload elements stay
    pub fn clear(&mut self) -> Result<()> {
        self.core.clear()
    }

    /// Remove the list node; the list must be empty
    pub fn delete(&mut self) -> Result<()> {
        self.core.delete()
    }

    /// Clear, then delete
    pub fn destroy(&mut self) -> Result<()> {
        self.core.destroy()
    }

    fn check_index(&self, index: usize, operation: &'static str) -> Result<u64> {
        let length = self.core.len(operation)?;
        if (index as u64) < length {
            Ok(index as u64 + 1)
        } else {
            Err(Error::IndexOutOfBounds { index, length })
        }
    }

    /// Payload node at `index`
    pub fn get_record(&self, index: usize) -> Result<NodeRecord> {
        let hops = self.check_index(index, "get")?;
        let found = self
            .core
            .db()
            .run(&Statement::ListItemAt {
                list: self.core.name().clone(),
                hops,
            })?
            .into_optional_node()?;
        found.ok_or(Error::IndexOutOfBounds {
            index,
            length: self.core.length,
        })
    }

    /// Payload at `index`
    pub fn get(&self, index: usize) -> Result<Object> {
        let record = self.get_record(index)?;
        Object::from_record(Arc::clone(self.core.db()), &record)
    }

    /// Unlink the item at `index` and relink its neighbours
    ///
    /// The payload element is not deleted.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let hops = self.check_index(index, "remove")?;
        let name = self.core.name().clone();
        let outcomes = self.core.db().run_batch(&[
            Statement::ListUnlinkAt {
                list: name.clone(),
                hops,
            },
            Statement::AdjustLength {
                container: name,
                delta: -1,
            },
        ])?;
        if outcomes[0].count()? == 0 {
            // Stored chain was shorter than the cached length
            self.resync()?;
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.core.length,
            });
        }
        self.core.apply_length(&outcomes[1])
    }

    /// Append a saved element
    pub fn append<E: Element + ?Sized>(&mut self, element: &E) -> Result<()> {
        self.core.check("append")?;
        element.ensure_saved("append")?;
        let list = self.core.name().clone();
        let element_name = element.name().clone();
        let link = if self.core.length == 0 {
            Statement::ListAttachHead {
                list: list.clone(),
                element: element_name,
            }
        } else {
            Statement::ListAppendAfterTail {
                list: list.clone(),
                element: element_name,
            }
        };
        let outcomes = self.core.db().run_batch(&[
            link,
            Statement::AdjustLength {
                container: list,
                delta: 1,
            },
        ])?;
        if outcomes[0].count()? == 0 {
            self.resync()?;
            return Err(Error::ObjectNotFound(element.name().to_string()));
        }
        self.core.apply_length(&outcomes[1])
    }

    /// Move every item of `other` to the end of this list
    ///
    /// `other`'s node is removed; its items now belong to this list.
    pub fn extend_by_merging(&mut self, mut other: List) -> Result<()> {
        self.core.check("extend_by_merging")?;
        let moved = other.core.len("extend_by_merging")?;
        if self.core.name() == other.core.name() {
            return Err(Error::Construction(format!(
                "list {} cannot be merged into itself",
                self.core.name()
            )));
        }
        if moved == 0 {
            return other.destroy();
        }

        let list = self.core.name().clone();
        let donor = other.core.name().clone();
        let link = if self.core.length == 0 {
            Statement::ListAdoptHead {
                list: list.clone(),
                other: donor.clone(),
            }
        } else {
            Statement::ListSpliceTail {
                list: list.clone(),
                other: donor.clone(),
            }
        };
        let outcomes = self.core.db().run_batch(&[
            link,
            Statement::AdjustLength {
                container: list,
                delta: moved as i64,
            },
            Statement::DeleteNode {
                name: donor,
                detach: false,
            },
        ])?;
        if outcomes[0].count()? == 0 {
            return Err(Error::ObjectNotFound(other.core.name().to_string()));
        }
        other.core.id.state = Lifecycle::Deleted;
        self.core.apply_length(&outcomes[1])
    }

    /// Build the list from the rows of a selector, in selector order
    ///
    /// Runs the staged protocol in one batch: stage items with ordinals,
    /// link NEXT and PREV between neighbouring ordinals, anchor ordinal 0,
    /// drop the staging edges and recount. A populated list needs
    /// `auto_reset`; `distinct` drops repeated rows first.
    pub fn from_query(
        &mut self,
        selector: Selector,
        auto_reset: bool,
        distinct: bool,
    ) -> Result<()> {
        self.core.check("from_query")?;
        let list = self.core.name().clone();
        let mut batch: Vec<Statement> =
            self.core.reset_statement(auto_reset)?.into_iter().collect();
        batch.extend([
            Statement::StageSelection {
                container: list.clone(),
                family: ContainerFamily::List,
                selector,
                distinct,
            },
            Statement::ChainStaged {
                container: list.clone(),
                link: StagingLink::Forward,
            },
            Statement::ChainStaged {
                container: list.clone(),
                link: StagingLink::Backward,
            },
            Statement::AnchorStaged {
                container: list.clone(),
                anchor: StagingAnchor::Head,
            },
            Statement::DropStaged {
                container: list.clone(),
            },
            self.core.recount(),
        ]);
        let outcomes = self.core.db().run_batch(&batch)?;
        let last = outcomes
            .last()
            .ok_or_else(|| Error::protocol("empty batch result"))?;
        self.core.apply_length(last)?;
        debug!(
            target: "graphads::list",
            name = %list,
            length = self.core.length,
            "built from query"
        );
        Ok(())
    }

    /// Build the list from node ids stored in a number array
    pub fn from_id_array(&mut self, array: &CompositeArrayNumber, auto_reset: bool) -> Result<()> {
        array.ensure_saved("from_id_array")?;
        self.from_query(Selector::Ids(array.ids()), auto_reset, false)
    }

    /// Every payload in chain order, one statement
    pub fn elements(&self) -> Result<Vec<Object>> {
        self.core.check("elements")?;
        let db = self.core.db();
        db.run(&Statement::ListElements {
            list: self.core.name().clone(),
        })?
        .into_nodes()?
        .iter()
        .map(|record| Object::from_record(Arc::clone(db), record))
        .collect()
    }

    /// Reachable item count and broken NEXT/PREV pairs
    pub fn inspect_links(&self) -> Result<ChainReport> {
        self.core.check("inspect_links")?;
        let report = self
            .core
            .db()
            .run(&Statement::InspectChain {
                list: self.core.name().clone(),
            })?
            .chain()?;
        if report.broken_links > 0 || report.reachable != self.core.length {
            warn!(
                target: "graphads::list",
                name = %self.core.name(),
                cached = self.core.length,
                reachable = report.reachable,
                broken = report.broken_links,
                "chain disagrees with bookkeeping"
            );
        }
        Ok(report)
    }

    fn resync(&mut self) -> Result<()> {
        let outcome = self.core.db().run(&self.core.recount())?;
        self.core.apply_length(&outcome)
    }
}

impl Element for List {
    fn name(&self) -> &ObjectName {
        self.core.name()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core.id.state
    }

    fn kind(&self) -> &'static str {
        "List"
    }
}
