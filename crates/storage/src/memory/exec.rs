//! Statement interpreter for the in-process graph
//!
//! Each arm mirrors the Cypher the renderer produces for the same statement:
//! a pattern that fails to match affects nothing (`Count(0)`, `Nodes([])`),
//! while statements that must report a container's state fail with
//! `ObjectNotFound` when the container is missing. `SetInsert` also fails
//! when its payload is missing, so a batch that writes a vanished element
//! rolls back.

use std::collections::{BTreeMap, HashSet};

use graphads_core::schema::{label, prop, rel};
use graphads_core::{
    ChainReport, ContainerFamily, Error, HashTag, MapComponents, Member, ObjectName, Outcome,
    Properties, Result, Selector, StagedEntry, StagingAnchor, StagingLink, Statement, SweepPass,
    Value,
};

use super::graph::GraphState;
use super::BACKEND;

impl GraphState {
    /// Execute any statement
    pub(crate) fn execute(&mut self, statement: &Statement) -> Result<Outcome> {
        if statement.is_read_only() {
            return self.evaluate(statement);
        }
        match statement {
            Statement::CreateNode { labels, properties } => {
                let id = self.create_node(labels.clone(), properties.clone())?;
                let node = self
                    .record(id)
                    .ok_or_else(|| Error::protocol("created node vanished"))?;
                Ok(Outcome::Node(node))
            }
            Statement::UpdateProperties { name, properties } => {
                match self.named(name.as_str(), None) {
                    Some(id) => {
                        self.update_properties(id, properties)?;
                        Ok(Outcome::Count(1))
                    }
                    None => Ok(Outcome::Count(0)),
                }
            }
            Statement::DeleteNode { name, detach } => match self.named(name.as_str(), None) {
                Some(id) => {
                    self.delete_node(id, *detach)?;
                    Ok(Outcome::Count(1))
                }
                None => Ok(Outcome::Count(0)),
            },
            Statement::CaptureIds { array, selector } => {
                let Some(target) = self.named(array.as_str(), Some(label::NUMBER_ARRAY)) else {
                    return Ok(Outcome::Count(0));
                };
                let ids = self.select(selector, false)?;
                let count = ids.len() as u64;
                let mut update = Properties::new();
                update.insert(
                    prop::VALUE.to_string(),
                    Value::List(ids.into_iter().map(Value::Int).collect()),
                );
                self.update_properties(target, &update)?;
                Ok(Outcome::Count(count))
            }
            Statement::AdjustLength { container, delta } => {
                let id = self.container(container, None)?;
                let length = self.length(id) + delta;
                self.set_length(id, length);
                Ok(Outcome::Length(length.max(0) as u64))
            }
            Statement::SetLength { container, length } => {
                let id = self.container(container, None)?;
                self.set_length(id, *length as i64);
                Ok(Outcome::Length(*length))
            }
            Statement::Recount { container, family } => {
                let id = self.container(container, Some(*family))?;
                let length = self.entry_count(id, *family) as i64;
                self.set_length(id, length);
                Ok(Outcome::Length(length as u64))
            }
            Statement::ClearItems { container, family } => {
                let Some(id) = self.named(container.as_str(), Some(family.label())) else {
                    return Ok(Outcome::Count(0));
                };
                let items = self.reachable_items(id, *family);
                for item in &items {
                    self.delete_node(*item, true)?;
                }
                if *family == ContainerFamily::Map {
                    for set in self.component_sets(id) {
                        self.set_length(set, 0);
                    }
                }
                self.set_length(id, 0);
                Ok(Outcome::Count(items.len() as u64))
            }
            Statement::ListUnlinkAt { list, hops } => self.unlink_at(list, *hops),
            Statement::ListAttachHead { list, element } => {
                let (Some(l), Some(e)) = (
                    self.named(list.as_str(), Some(label::LIST)),
                    self.named(element.as_str(), None),
                ) else {
                    return Ok(Outcome::Count(0));
                };
                if self.first_out(l, rel::NEXT).is_some() {
                    return Ok(Outcome::Count(0));
                }
                let item = self.create_item(label::LIST_ITEM, None);
                self.link(l, rel::NEXT, item);
                self.link(item, rel::HOLDS, e);
                Ok(Outcome::Count(1))
            }
            Statement::ListAppendAfterTail { list, element } => {
                let (Some(l), Some(e)) = (
                    self.named(list.as_str(), Some(label::LIST)),
                    self.named(element.as_str(), None),
                ) else {
                    return Ok(Outcome::Count(0));
                };
                let Some(tail) = self.chain(l).last().copied() else {
                    return Ok(Outcome::Count(0));
                };
                let item = self.create_item(label::LIST_ITEM, None);
                self.link(tail, rel::NEXT, item);
                self.link(item, rel::PREV, tail);
                self.link(item, rel::HOLDS, e);
                Ok(Outcome::Count(1))
            }
            Statement::ListSpliceTail { list, other } => {
                let (Some(l), Some(o)) = (
                    self.named(list.as_str(), Some(label::LIST)),
                    self.named(other.as_str(), Some(label::LIST)),
                ) else {
                    return Ok(Outcome::Count(0));
                };
                let (Some(tail), Some((edge, head))) =
                    (self.chain(l).last().copied(), self.first_out(o, rel::NEXT))
                else {
                    return Ok(Outcome::Count(0));
                };
                self.remove_edge(edge);
                self.link(tail, rel::NEXT, head);
                self.link(head, rel::PREV, tail);
                Ok(Outcome::Count(1))
            }
            Statement::ListAdoptHead { list, other } => {
                let (Some(l), Some(o)) = (
                    self.named(list.as_str(), Some(label::LIST)),
                    self.named(other.as_str(), Some(label::LIST)),
                ) else {
                    return Ok(Outcome::Count(0));
                };
                if self.first_out(l, rel::NEXT).is_some() {
                    return Ok(Outcome::Count(0));
                }
                let Some((edge, head)) = self.first_out(o, rel::NEXT) else {
                    return Ok(Outcome::Count(0));
                };
                self.remove_edge(edge);
                self.link(l, rel::NEXT, head);
                Ok(Outcome::Count(1))
            }
            Statement::StageSelection {
                container,
                family,
                selector,
                distinct,
            } => {
                let Some(c) = self.named(container.as_str(), Some(label::CONTAINER)) else {
                    return Ok(Outcome::Count(0));
                };
                let rows = self.select(selector, *distinct)?;
                for (ordinal, node) in rows.iter().enumerate() {
                    self.stage(c, container, *family, ordinal as u64, *node, None);
                }
                Ok(Outcome::Count(rows.len() as u64))
            }
            Statement::StageEntries {
                container,
                family,
                entries,
            } => {
                let Some(c) = self.named(container.as_str(), Some(label::CONTAINER)) else {
                    return Ok(Outcome::Count(0));
                };
                let mut staged = 0;
                for StagedEntry {
                    ordinal,
                    node,
                    hash,
                } in entries
                {
                    if self.node(*node).is_none() {
                        continue;
                    }
                    self.stage(c, container, *family, *ordinal, *node, hash.as_ref());
                    staged += 1;
                }
                Ok(Outcome::Count(staged))
            }
            Statement::ChainStaged { container, link } => {
                let Some(c) = self.named(container.as_str(), Some(label::CONTAINER)) else {
                    return Ok(Outcome::Count(0));
                };
                let staged = self.staged(c, container);
                let mut created = 0;
                for (ordinal, item) in &staged {
                    let Some(next) = staged.get(&(ordinal + 1)) else {
                        continue;
                    };
                    match link {
                        StagingLink::Forward => self.link(*item, rel::NEXT, *next),
                        StagingLink::Backward => self.link(*next, rel::PREV, *item),
                    };
                    created += 1;
                }
                Ok(Outcome::Count(created))
            }
            Statement::AnchorStaged { container, anchor } => {
                let Some(c) = self.named(container.as_str(), Some(label::CONTAINER)) else {
                    return Ok(Outcome::Count(0));
                };
                let staged = self.staged(c, container);
                match anchor {
                    StagingAnchor::Head => match staged.get(&0) {
                        Some(head) => {
                            self.link(c, rel::NEXT, *head);
                            Ok(Outcome::Count(1))
                        }
                        None => Ok(Outcome::Count(0)),
                    },
                    StagingAnchor::Members => {
                        for item in staged.values() {
                            self.link(c, rel::MEMBER, *item);
                        }
                        Ok(Outcome::Count(staged.len() as u64))
                    }
                }
            }
            Statement::DropStaged { container } => {
                let Some(c) = self.named(container.as_str(), Some(label::CONTAINER)) else {
                    return Ok(Outcome::Count(0));
                };
                let edges = self.staging_edges(c, container);
                for (edge, _, _) in &edges {
                    self.remove_edge(*edge);
                }
                Ok(Outcome::Count(edges.len() as u64))
            }
            Statement::SetInsert { set, element, hash } => {
                let Some(s) = self.named(set.as_str(), Some(label::SET)) else {
                    return Ok(Outcome::Count(0));
                };
                let e = self
                    .named(element.as_str(), None)
                    .ok_or_else(|| Error::ObjectNotFound(element.to_string()))?;
                let hex = hash.to_hex();
                if self.member_hashes(s).contains(&hex) {
                    return Ok(Outcome::Count(0));
                }
                self.attach_member(s, e, hex);
                let length = self.length(s) + 1;
                self.set_length(s, length);
                Ok(Outcome::Count(1))
            }
            Statement::SetRemoveHash { set, hash } => {
                let Some(s) = self.named(set.as_str(), Some(label::SET)) else {
                    return Ok(Outcome::Count(0));
                };
                let hex = hash.to_hex();
                let doomed: Vec<i64> = self
                    .members(s)
                    .into_iter()
                    .filter(|(_, h)| *h == hex)
                    .map(|(item, _)| item)
                    .collect();
                for item in &doomed {
                    self.delete_node(*item, true)?;
                }
                let length = self.length(s) - doomed.len() as i64;
                self.set_length(s, length);
                Ok(Outcome::Count(doomed.len() as u64))
            }
            Statement::SetMerge { target, source } => {
                self.copy_members(target, source, None, |present, _, hash| {
                    !present.contains(hash)
                })
            }
            Statement::SetIntersect {
                target,
                left,
                right,
            } => self.copy_members(target, left, Some(right), |_, filter, hash| {
                filter.contains(hash)
            }),
            Statement::SetSubtract {
                target,
                left,
                right,
            } => self.copy_members(target, left, Some(right), |_, filter, hash| {
                !filter.contains(hash)
            }),
            Statement::MapAttach { map, keys, values } => {
                let (Some(m), Some(k), Some(v)) = (
                    self.named(map.as_str(), Some(label::MAP)),
                    self.named(keys.as_str(), Some(label::SET)),
                    self.named(values.as_str(), Some(label::SET)),
                ) else {
                    return Ok(Outcome::Count(0));
                };
                self.link(m, rel::KEYS, k);
                self.link(m, rel::VALUES, v);
                Ok(Outcome::Count(1))
            }
            Statement::MapDetach { map } => {
                let Some(m) = self.named(map.as_str(), Some(label::MAP)) else {
                    return Ok(Outcome::Count(0));
                };
                let edges: Vec<i64> = self
                    .out(m, rel::KEYS)
                    .into_iter()
                    .chain(self.out(m, rel::VALUES))
                    .map(|(edge, _)| edge)
                    .collect();
                for edge in &edges {
                    self.remove_edge(*edge);
                }
                Ok(Outcome::Count(edges.len() as u64))
            }
            Statement::Sweep { pass } => self.sweep(*pass).map(Outcome::Count),
            Statement::Raw { .. } => Err(Error::Unsupported {
                backend: BACKEND,
                statement: statement.kind(),
            }),
            _ => self.evaluate(statement),
        }
    }

    /// Execute a read-only statement
    pub(crate) fn evaluate(&self, statement: &Statement) -> Result<Outcome> {
        match statement {
            Statement::FetchNode { name } => Ok(Outcome::Nodes(
                self.records(self.named(name.as_str(), None)),
            )),
            Statement::ListNames { label: filter } => {
                let mut names: Vec<ObjectName> = self
                    .ids_with_label(label::ELEMENT)
                    .into_iter()
                    .filter(|id| match filter {
                        Some(l) => self.node(*id).is_some_and(|n| n.has_label(l)),
                        None => true,
                    })
                    .filter_map(|id| self.property(id, prop::NAME))
                    .filter_map(Value::as_str)
                    .map(ObjectName::from)
                    .collect();
                names.sort();
                Ok(Outcome::Names(names))
            }
            Statement::Select { selector } => {
                let ids = self.select(selector, false)?;
                Ok(Outcome::Nodes(self.records(ids)))
            }
            Statement::ListItemAt { list, hops } => {
                let Some(l) = self.named(list.as_str(), Some(label::LIST)) else {
                    return Ok(Outcome::Nodes(Vec::new()));
                };
                let payload = self
                    .item_at(l, *hops)
                    .and_then(|(_, item)| self.payload(item));
                Ok(Outcome::Nodes(self.records(payload)))
            }
            Statement::ListElements { list } => {
                let Some(l) = self.named(list.as_str(), Some(label::LIST)) else {
                    return Ok(Outcome::Nodes(Vec::new()));
                };
                let payloads: Vec<i64> = self
                    .chain(l)
                    .into_iter()
                    .filter_map(|item| self.payload(item))
                    .collect();
                Ok(Outcome::Nodes(self.records(payloads)))
            }
            Statement::InspectChain { list } => {
                let l = self.container(list, Some(ContainerFamily::List))?;
                let items = self.chain(l);
                let broken = items
                    .windows(2)
                    .filter(|pair| !self.has_edge(pair[1], rel::PREV, pair[0]))
                    .count();
                Ok(Outcome::Chain(ChainReport {
                    reachable: items.len() as u64,
                    broken_links: broken as u64,
                }))
            }
            Statement::SetFindHash { set, hash } => {
                let Some(s) = self.named(set.as_str(), Some(label::SET)) else {
                    return Ok(Outcome::Nodes(Vec::new()));
                };
                let hex = hash.to_hex();
                let payloads: Vec<i64> = self
                    .members(s)
                    .into_iter()
                    .filter(|(_, h)| *h == hex)
                    .filter_map(|(item, _)| self.payload(item))
                    .collect();
                Ok(Outcome::Nodes(self.records(payloads)))
            }
            Statement::SetEquals { left, right } => {
                let l = self.container(left, Some(ContainerFamily::Set))?;
                let r = self.container(right, Some(ContainerFamily::Set))?;
                Ok(Outcome::Flag(self.member_hashes(l) == self.member_hashes(r)))
            }
            Statement::SetMembers { set } => {
                let Some(s) = self.named(set.as_str(), Some(label::SET)) else {
                    return Ok(Outcome::Members(Vec::new()));
                };
                let mut members = Vec::new();
                for (item, hex) in self.members(s) {
                    let Some(element) = self.payload(item).and_then(|p| self.record(p)) else {
                        continue;
                    };
                    members.push(Member {
                        hash: HashTag::from_hex(&hex)?,
                        element,
                    });
                }
                members.sort_by(|a, b| a.hash.cmp(&b.hash));
                Ok(Outcome::Members(members))
            }
            Statement::MapComponents { map } => {
                let m = self.container(map, Some(ContainerFamily::Map))?;
                let name_of = |rel_type: &str| {
                    self.first_out(m, rel_type)
                        .and_then(|(_, set)| self.property(set, prop::NAME))
                        .and_then(Value::as_str)
                        .map(ObjectName::from)
                };
                match (name_of(rel::KEYS), name_of(rel::VALUES)) {
                    (Some(keys), Some(values)) => {
                        Ok(Outcome::Components(Some(MapComponents { keys, values })))
                    }
                    (None, None) => Ok(Outcome::Components(None)),
                    _ => Err(Error::protocol(format!(
                        "map {} has a single component set",
                        map
                    ))),
                }
            }
            other => Err(Error::protocol(format!(
                "{} is not a read-only statement",
                other.kind()
            ))),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn container(&self, name: &ObjectName, family: Option<ContainerFamily>) -> Result<i64> {
        let required = family.map(|f| f.label()).unwrap_or(label::CONTAINER);
        self.named(name.as_str(), Some(required))
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    fn select(&self, selector: &Selector, distinct: bool) -> Result<Vec<i64>> {
        let ids: Vec<i64> = match selector {
            Selector::Names(names) => names
                .iter()
                .filter_map(|n| self.named(n.as_str(), None))
                .collect(),
            Selector::Label(l) => self.ids_with_label(l),
            Selector::Ids(ids) => ids
                .iter()
                .copied()
                .filter(|id| self.node(*id).is_some())
                .collect(),
            Selector::Cypher(_) => {
                return Err(Error::Unsupported {
                    backend: BACKEND,
                    statement: "Selector::Cypher",
                })
            }
        };
        if !distinct {
            return Ok(ids);
        }
        let mut seen = HashSet::new();
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }

    /// Item `hops` NEXT edges away from the list node, with its predecessor
    fn item_at(&self, list: i64, hops: u64) -> Option<(i64, i64)> {
        if hops == 0 {
            return None;
        }
        let mut previous = list;
        let mut cursor = self.first_out(list, rel::NEXT)?.1;
        for _ in 1..hops {
            previous = cursor;
            cursor = self.first_out(cursor, rel::NEXT)?.1;
        }
        Some((previous, cursor))
    }

    fn unlink_at(&mut self, list: &ObjectName, hops: u64) -> Result<Outcome> {
        let Some(l) = self.named(list.as_str(), Some(label::LIST)) else {
            return Ok(Outcome::Count(0));
        };
        let Some((previous, item)) = self.item_at(l, hops) else {
            return Ok(Outcome::Count(0));
        };
        let next = self.first_out(item, rel::NEXT).map(|(_, n)| n);
        self.delete_node(item, true)?;
        if let Some(next) = next {
            self.link(previous, rel::NEXT, next);
            if previous != l {
                self.link(next, rel::PREV, previous);
            }
        }
        Ok(Outcome::Count(1))
    }

    fn component_sets(&self, map: i64) -> Vec<i64> {
        self.out(map, rel::KEYS)
            .into_iter()
            .chain(self.out(map, rel::VALUES))
            .map(|(_, set)| set)
            .collect()
    }

    /// Wrapper items a container owns through its anchors
    fn reachable_items(&self, container: i64, family: ContainerFamily) -> Vec<i64> {
        match family {
            ContainerFamily::List => self.chain(container),
            ContainerFamily::Set => self.members(container).into_iter().map(|(i, _)| i).collect(),
            ContainerFamily::Map => self
                .component_sets(container)
                .into_iter()
                .flat_map(|set| self.members(set))
                .map(|(item, _)| item)
                .collect(),
        }
    }

    /// Number of entries a container holds: map entries are counted on the key set
    fn entry_count(&self, container: i64, family: ContainerFamily) -> usize {
        match family {
            ContainerFamily::Map => self
                .first_out(container, rel::KEYS)
                .map(|(_, keys)| self.members(keys).len())
                .unwrap_or(0),
            other => self.reachable_items(container, other).len(),
        }
    }

    fn stage(
        &mut self,
        container: i64,
        scope: &ObjectName,
        family: ContainerFamily,
        ordinal: u64,
        payload: i64,
        hash: Option<&HashTag>,
    ) {
        let item = self.create_item(family.item_label(), hash.map(HashTag::to_hex));
        self.link(item, rel::HOLDS, payload);
        let mut props = Properties::new();
        props.insert(prop::SCOPE.to_string(), Value::from(scope.as_str()));
        props.insert(prop::ORDINAL.to_string(), Value::Int(ordinal as i64));
        self.add_edge(container, rel::STAGED, item, props);
    }

    /// Staging edges scoped to this container: (edge, ordinal, item)
    fn staging_edges(&self, container: i64, scope: &ObjectName) -> Vec<(i64, i64, i64)> {
        self.out(container, rel::STAGED)
            .into_iter()
            .filter_map(|(edge, item)| {
                let props = &self.edge(edge)?.properties;
                if props.get(prop::SCOPE).and_then(Value::as_str) != Some(scope.as_str()) {
                    return None;
                }
                let ordinal = props.get(prop::ORDINAL).and_then(Value::as_int)?;
                Some((edge, ordinal, item))
            })
            .collect()
    }

    fn staged(&self, container: i64, scope: &ObjectName) -> BTreeMap<u64, i64> {
        self.staging_edges(container, scope)
            .into_iter()
            .filter(|(_, ordinal, _)| *ordinal >= 0)
            .map(|(_, ordinal, item)| (ordinal as u64, item))
            .collect()
    }

    fn copy_members(
        &mut self,
        target: &ObjectName,
        source: &ObjectName,
        filter: Option<&ObjectName>,
        keep: impl Fn(&HashSet<String>, &HashSet<String>, &String) -> bool,
    ) -> Result<Outcome> {
        let (Some(t), Some(s)) = (
            self.named(target.as_str(), Some(label::SET)),
            self.named(source.as_str(), Some(label::SET)),
        ) else {
            return Ok(Outcome::Count(0));
        };
        let filter_hashes = match filter {
            Some(name) => match self.named(name.as_str(), Some(label::SET)) {
                Some(f) => self.member_hashes(f),
                None => return Ok(Outcome::Count(0)),
            },
            None => HashSet::new(),
        };
        let present = self.member_hashes(t);
        let mut copied = 0;
        for (item, hash) in self.members(s) {
            if !keep(&present, &filter_hashes, &hash) {
                continue;
            }
            if let Some(payload) = self.payload(item) {
                self.attach_member(t, payload, hash);
                copied += 1;
            }
        }
        Ok(Outcome::Count(copied))
    }

    fn is_anonymous_unreferenced(&self, id: i64) -> bool {
        !self.has_incoming(id)
            && self
                .property(id, prop::NAME)
                .and_then(Value::as_str)
                .is_some_and(graphads_core::is_anonymous_name)
    }

    fn sweep(&mut self, pass: SweepPass) -> Result<u64> {
        let doomed: Vec<i64> = match pass {
            SweepPass::AnonymousMaps => self
                .ids_with_label(label::MAP)
                .into_iter()
                .filter(|id| self.is_anonymous_unreferenced(*id))
                .collect(),
            SweepPass::AnonymousSets => self
                .ids_with_label(label::SET)
                .into_iter()
                .filter(|id| self.is_anonymous_unreferenced(*id))
                .flat_map(|set| {
                    let mut nodes: Vec<i64> =
                        self.members(set).into_iter().map(|(item, _)| item).collect();
                    nodes.push(set);
                    nodes
                })
                .collect(),
            SweepPass::AnonymousLists => self
                .ids_with_label(label::LIST)
                .into_iter()
                .filter(|id| self.is_anonymous_unreferenced(*id))
                .flat_map(|list| {
                    let mut nodes = self.chain(list);
                    nodes.push(list);
                    nodes
                })
                .collect(),
            SweepPass::SeveredListFragments => {
                let mut nodes = Vec::new();
                let mut seen = HashSet::new();
                for head in self.ids_with_label(label::LIST_ITEM) {
                    let severed = self.inn(head, rel::NEXT).is_empty()
                        && self.out(head, rel::PREV).is_empty()
                        && self.inn(head, rel::STAGED).is_empty()
                        && self.first_out(head, rel::NEXT).is_some();
                    if !severed {
                        continue;
                    }
                    for node in std::iter::once(head).chain(self.chain(head)) {
                        if seen.insert(node) {
                            nodes.push(node);
                        }
                    }
                }
                nodes
            }
            SweepPass::AnonymousVariables => self
                .ids_with_label(label::VARIABLE)
                .into_iter()
                .filter(|id| self.is_anonymous_unreferenced(*id))
                .collect(),
        };
        for id in &doomed {
            self.delete_node(*id, true)?;
        }
        Ok(doomed.len() as u64)
    }
}
