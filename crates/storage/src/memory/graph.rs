//! In-process labeled property graph
//!
//! Plain adjacency-indexed storage with the handful of primitives the statement
//! interpreter needs. Node and edge ids are allocated monotonically and never
//! reused, so creation order equals id order.
//!
//! Uniqueness constraints from `schema::UNIQUE_CONSTRAINTS` are enforced on
//! every create and property update.
//!
//! Writes are applied in place. Inside [`GraphState::transaction`] every
//! primitive edit records its inverse, and a failing transaction replays
//! the inverses newest first.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use graphads_core::schema::{self, label, prop, rel};
use graphads_core::{Error, NodeRecord, Properties, Result, Value};

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl StoredNode {
    pub fn has_label(&self, wanted: &str) -> bool {
        self.labels.iter().any(|l| l == wanted)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredEdge {
    pub rel: &'static str,
    pub from: i64,
    pub to: i64,
    pub properties: Properties,
}

/// Inverse of one primitive edit
#[derive(Debug)]
enum Undo {
    RemoveNode(i64),
    RestoreNode(i64, StoredNode),
    RestoreProperties(i64, Properties),
    RemoveEdge(i64),
    RestoreEdge(i64, StoredEdge),
}

/// Graph contents
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    nodes: BTreeMap<i64, StoredNode>,
    edges: BTreeMap<i64, StoredEdge>,
    names: HashMap<String, i64>,
    outgoing: HashMap<i64, BTreeSet<i64>>,
    incoming: HashMap<i64, BTreeSet<i64>>,
    next_node: i64,
    next_edge: i64,
    journal: Option<Vec<Undo>>,
}

impl GraphState {
    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `work` all or nothing
    ///
    /// Ids handed out by a rolled back transaction are not reused.
    pub fn transaction<T>(&mut self, work: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.journal = Some(Vec::new());
        let result = work(self);
        let journal = self.journal.take().unwrap_or_default();
        if result.is_err() {
            for undo in journal.into_iter().rev() {
                self.revert(undo);
            }
        }
        result
    }

    fn remember(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveNode(id) => {
                self.outgoing.remove(&id);
                self.incoming.remove(&id);
                if let Some(node) = self.nodes.remove(&id) {
                    self.unindex(id, &node);
                }
            }
            Undo::RestoreNode(id, node) => {
                self.index(id, &node);
                self.nodes.insert(id, node);
            }
            Undo::RestoreProperties(id, properties) => {
                if let Some(mut node) = self.nodes.remove(&id) {
                    self.unindex(id, &node);
                    node.properties = properties;
                    self.index(id, &node);
                    self.nodes.insert(id, node);
                }
            }
            Undo::RemoveEdge(id) => {
                self.detach_edge(id);
            }
            Undo::RestoreEdge(id, edge) => self.attach_edge(id, edge),
        }
    }

    fn index(&mut self, id: i64, node: &StoredNode) {
        if node.has_label(label::ELEMENT) {
            if let Some(Value::String(name)) = node.properties.get(prop::NAME) {
                self.names.insert(name.clone(), id);
            }
        }
    }

    fn unindex(&mut self, id: i64, node: &StoredNode) {
        if let Some(Value::String(name)) = node.properties.get(prop::NAME) {
            if self.names.get(name) == Some(&id) {
                self.names.remove(name);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn create_node(&mut self, labels: Vec<String>, properties: Properties) -> Result<i64> {
        let properties: Properties = properties
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        self.check_unique(None, &labels, &properties)?;
        let id = self.next_node;
        self.next_node += 1;
        let node = StoredNode { labels, properties };
        self.index(id, &node);
        self.nodes.insert(id, node);
        self.remember(Undo::RemoveNode(id));
        Ok(id)
    }

    /// Create a wrapper item with the given item label
    pub fn create_item(&mut self, item_label: &str, hash: Option<String>) -> i64 {
        let mut properties = Properties::new();
        if let Some(hash) = hash {
            properties.insert(prop::HASH.to_string(), Value::String(hash));
        }
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(
            id,
            StoredNode {
                labels: vec![label::ITEM.to_string(), item_label.to_string()],
                properties,
            },
        );
        self.remember(Undo::RemoveNode(id));
        id
    }

    pub fn node(&self, id: i64) -> Option<&StoredNode> {
        self.nodes.get(&id)
    }

    pub fn record(&self, id: i64) -> Option<NodeRecord> {
        self.nodes.get(&id).map(|n| NodeRecord {
            id,
            labels: n.labels.clone(),
            properties: n.properties.clone(),
        })
    }

    pub fn records(&self, ids: impl IntoIterator<Item = i64>) -> Vec<NodeRecord> {
        ids.into_iter().filter_map(|id| self.record(id)).collect()
    }

    /// Element by name, optionally requiring a label
    pub fn named(&self, name: &str, required: Option<&str>) -> Option<i64> {
        let id = *self.names.get(name)?;
        match required {
            Some(l) if !self.nodes.get(&id)?.has_label(l) => None,
            _ => Some(id),
        }
    }

    pub fn ids_with_label(&self, wanted: &str) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.has_label(wanted))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn property(&self, id: i64, key: &str) -> Option<&Value> {
        self.nodes.get(&id)?.properties.get(key)
    }

    /// Merge properties; `Null` removes the key
    pub fn update_properties(&mut self, id: i64, updates: &Properties) -> Result<()> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| Error::protocol(format!("node {} vanished", id)))?;
        let mut merged = node.properties.clone();
        for (k, v) in updates {
            if v.is_null() {
                merged.remove(k);
            } else {
                merged.insert(k.clone(), v.clone());
            }
        }
        self.check_unique(Some(id), &node.labels, &merged)?;
        self.replace_properties(id, merged);
        Ok(())
    }

    pub fn set_length(&mut self, id: i64, length: i64) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let mut properties = node.properties.clone();
        properties.insert(prop::LENGTH.to_string(), Value::Int(length));
        self.replace_properties(id, properties);
    }

    fn replace_properties(&mut self, id: i64, properties: Properties) {
        let Some(mut node) = self.nodes.remove(&id) else {
            return;
        };
        self.unindex(id, &node);
        let previous = std::mem::replace(&mut node.properties, properties);
        self.index(id, &node);
        self.nodes.insert(id, node);
        self.remember(Undo::RestoreProperties(id, previous));
    }

    pub fn length(&self, id: i64) -> i64 {
        match self.property(id, prop::LENGTH) {
            Some(Value::Int(n)) => *n,
            Some(Value::Float(f)) => *f as i64,
            _ => 0,
        }
    }

    /// Delete a node; without `detach` any relationship is a fault
    pub fn delete_node(&mut self, id: i64, detach: bool) -> Result<()> {
        let attached: Vec<i64> = self
            .outgoing
            .get(&id)
            .into_iter()
            .chain(self.incoming.get(&id))
            .flat_map(|edges| edges.iter().copied())
            .collect();
        if !detach && !attached.is_empty() {
            let label = self
                .nodes
                .get(&id)
                .and_then(|n| n.properties.get(prop::NAME))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("node {}", id));
            return Err(Error::StillReferenced(label));
        }
        for edge in attached {
            self.remove_edge(edge);
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        if let Some(node) = self.nodes.remove(&id) {
            self.unindex(id, &node);
            self.remember(Undo::RestoreNode(id, node));
        }
        Ok(())
    }

    fn check_unique(&self, own: Option<i64>, labels: &[String], props: &Properties) -> Result<()> {
        for (constrained_label, key) in schema::UNIQUE_CONSTRAINTS {
            if !labels.iter().any(|l| l == constrained_label) {
                continue;
            }
            let Some(value) = props.get(*key) else {
                continue;
            };
            let clash = if *constrained_label == label::ELEMENT && *key == prop::NAME {
                value
                    .as_str()
                    .and_then(|name| self.names.get(name))
                    .is_some_and(|other| Some(*other) != own)
            } else {
                self.nodes.iter().any(|(other, n)| {
                    Some(*other) != own
                        && n.has_label(constrained_label)
                        && n.properties.get(*key) == Some(value)
                })
            };
            if clash {
                return Err(Error::NameConflict(format!(
                    "{}.{} = {}",
                    constrained_label,
                    key,
                    value.canonical_form()
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Edges
    // ========================================================================

    pub fn add_edge(&mut self, from: i64, rel: &'static str, to: i64, properties: Properties) -> i64 {
        let id = self.next_edge;
        self.next_edge += 1;
        self.attach_edge(
            id,
            StoredEdge {
                rel,
                from,
                to,
                properties,
            },
        );
        self.remember(Undo::RemoveEdge(id));
        id
    }

    pub fn link(&mut self, from: i64, rel: &'static str, to: i64) -> i64 {
        self.add_edge(from, rel, to, Properties::new())
    }

    pub fn remove_edge(&mut self, id: i64) {
        if let Some(edge) = self.detach_edge(id) {
            self.remember(Undo::RestoreEdge(id, edge));
        }
    }

    fn attach_edge(&mut self, id: i64, edge: StoredEdge) {
        self.outgoing.entry(edge.from).or_default().insert(id);
        self.incoming.entry(edge.to).or_default().insert(id);
        self.edges.insert(id, edge);
    }

    fn detach_edge(&mut self, id: i64) -> Option<StoredEdge> {
        let edge = self.edges.remove(&id)?;
        if let Some(out) = self.outgoing.get_mut(&edge.from) {
            out.remove(&id);
        }
        if let Some(inc) = self.incoming.get_mut(&edge.to) {
            inc.remove(&id);
        }
        Some(edge)
    }

    pub fn edge(&self, id: i64) -> Option<&StoredEdge> {
        self.edges.get(&id)
    }

    /// Outgoing edges of a type: (edge id, target)
    pub fn out(&self, node: i64, rel: &str) -> Vec<(i64, i64)> {
        self.outgoing
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edges.get(e).map(|edge| (*e, edge)))
            .filter(|(_, edge)| edge.rel == rel)
            .map(|(e, edge)| (e, edge.to))
            .collect()
    }

    /// Incoming edges of a type: (edge id, source)
    pub fn inn(&self, node: i64, rel: &str) -> Vec<(i64, i64)> {
        self.incoming
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edges.get(e).map(|edge| (*e, edge)))
            .filter(|(_, edge)| edge.rel == rel)
            .map(|(e, edge)| (e, edge.from))
            .collect()
    }

    pub fn first_out(&self, node: i64, rel: &str) -> Option<(i64, i64)> {
        self.out(node, rel).into_iter().next()
    }

    pub fn has_incoming(&self, node: i64) -> bool {
        self.incoming.get(&node).is_some_and(|e| !e.is_empty())
    }

    pub fn has_edge(&self, from: i64, rel: &str, to: i64) -> bool {
        self.out(from, rel).iter().any(|(_, target)| *target == to)
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Items reachable from a node through NEXT edges, in order
    pub fn chain(&self, start: i64) -> Vec<i64> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.first_out(start, rel::NEXT).map(|(_, to)| to);
        while let Some(item) = cursor {
            if !seen.insert(item) {
                break;
            }
            items.push(item);
            cursor = self.first_out(item, rel::NEXT).map(|(_, to)| to);
        }
        items
    }

    /// Payload of a wrapper item
    pub fn payload(&self, item: i64) -> Option<i64> {
        self.first_out(item, rel::HOLDS).map(|(_, to)| to)
    }

    /// Set items with their hash strings
    pub fn members(&self, set: i64) -> Vec<(i64, String)> {
        self.out(set, rel::MEMBER)
            .into_iter()
            .map(|(_, item)| {
                let hash = self
                    .property(item, prop::HASH)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (item, hash)
            })
            .collect()
    }

    pub fn member_hashes(&self, set: i64) -> HashSet<String> {
        self.members(set).into_iter().map(|(_, h)| h).collect()
    }

    /// Create a set item holding `payload` and attach it to `set`
    pub fn attach_member(&mut self, set: i64, payload: i64, hash: String) -> i64 {
        let item = self.create_item(label::SET_ITEM, Some(hash));
        self.link(set, rel::MEMBER, item);
        self.link(item, rel::HOLDS, payload);
        item
    }
}
