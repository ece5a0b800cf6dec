//! Statement vocabulary
//!
//! Every container operation compiles to one statement or a short fixed batch
//! of them. A statement is a single declarative rewrite or inspection of a
//! subgraph; backends execute it without client-side traversal.
//!
//! ## Result shapes
//!
//! | Statement family             | Outcome       |
//! |------------------------------|---------------|
//! | node lookups and selections  | `Nodes`       |
//! | node creation                | `Node`        |
//! | structural rewrites          | `Count`       |
//! | length bookkeeping           | `Length`      |
//! | set equality                 | `Flag`        |
//! | name listing                 | `Names`       |
//! | set membership dump          | `Members`     |
//! | map component lookup         | `Components`  |
//! | chain inspection             | `Chain`       |
//! | raw query                    | `Rows`        |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::NodeRecord;
use crate::schema::ContainerFamily;
use crate::selector::Selector;
use crate::types::{HashTag, ObjectName};
use crate::value::{Properties, Value};

/// Direction of the adjacency edges created from staged ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingLink {
    /// `ordinal k -[:NEXT]-> ordinal k+1`
    Forward,
    /// `ordinal k+1 -[:PREV]-> ordinal k`
    Backward,
}

/// How staged items are attached to their container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingAnchor {
    /// Container points at ordinal 0 (lists)
    Head,
    /// Container gets a membership edge to every staged item (sets)
    Members,
}

/// One pre-hashed row of a staged build
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEntry {
    /// Position in the build
    pub ordinal: u64,
    /// Store id of the payload node
    pub node: i64,
    /// Hash tag for set items
    pub hash: Option<HashTag>,
}

/// Garbage collection pass, in the order the collector runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepPass {
    /// Anonymous maps nothing points at
    AnonymousMaps,
    /// Anonymous sets nothing points at, with their items
    AnonymousSets,
    /// Anonymous lists nothing points at, with their item chains
    AnonymousLists,
    /// List items cut off from any list that still link to a next item,
    /// with everything after them
    SeveredListFragments,
    /// Anonymous variables nothing points at
    AnonymousVariables,
}

impl SweepPass {
    /// All passes in dependency order
    pub const ORDER: [SweepPass; 5] = [
        SweepPass::AnonymousMaps,
        SweepPass::AnonymousSets,
        SweepPass::AnonymousLists,
        SweepPass::SeveredListFragments,
        SweepPass::AnonymousVariables,
    ];

    /// Short tag for logging and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepPass::AnonymousMaps => "anonymous_maps",
            SweepPass::AnonymousSets => "anonymous_sets",
            SweepPass::AnonymousLists => "anonymous_lists",
            SweepPass::SeveredListFragments => "severed_list_fragments",
            SweepPass::AnonymousVariables => "anonymous_variables",
        }
    }
}

/// A single declarative statement against the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    // ------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------
    /// Create a node with labels and properties
    CreateNode {
        /// Labels to attach
        labels: Vec<String>,
        /// Initial properties, `name` included
        properties: Properties,
    },
    /// Fetch an element by name (zero or one node)
    FetchNode {
        /// Element name
        name: ObjectName,
    },
    /// Merge properties into an element; `Null` removes a key
    UpdateProperties {
        /// Element name
        name: ObjectName,
        /// Properties to merge
        properties: Properties,
    },
    /// Delete an element
    ///
    /// Without `detach` the store refuses to delete a node that still has
    /// relationships.
    DeleteNode {
        /// Element name
        name: ObjectName,
        /// Remove relationships too
        detach: bool,
    },
    /// Names of all elements, optionally restricted to a label
    ListNames {
        /// Label filter
        label: Option<String>,
    },
    /// Nodes chosen by a selector, in selector order
    Select {
        /// Row source
        selector: Selector,
    },
    /// Store the ids of selected nodes into a number array
    CaptureIds {
        /// Target array
        array: ObjectName,
        /// Row source
        selector: Selector,
    },

    // ------------------------------------------------------------------
    // Container bookkeeping
    // ------------------------------------------------------------------
    /// Add `delta` to the stored length
    AdjustLength {
        /// Container name
        container: ObjectName,
        /// Signed change
        delta: i64,
    },
    /// Overwrite the stored length
    SetLength {
        /// Container name
        container: ObjectName,
        /// New length
        length: u64,
    },
    /// Recompute the stored length from the anchors
    Recount {
        /// Container name
        container: ObjectName,
        /// Container family
        family: ContainerFamily,
    },
    /// Delete every wrapper item reachable from the anchors; length becomes zero
    ///
    /// For maps this empties both component sets but keeps them attached.
    ClearItems {
        /// Container name
        container: ObjectName,
        /// Container family
        family: ContainerFamily,
    },

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------
    /// Payload of the item `hops` NEXT edges away from the list node
    ListItemAt {
        /// List name
        list: ObjectName,
        /// Index + 1
        hops: u64,
    },
    /// Delete the item `hops` NEXT edges away and relink its neighbours
    ListUnlinkAt {
        /// List name
        list: ObjectName,
        /// Index + 1
        hops: u64,
    },
    /// Make a new item holding `element` the head of an empty list
    ListAttachHead {
        /// List name
        list: ObjectName,
        /// Payload
        element: ObjectName,
    },
    /// Link a new item holding `element` after the tail
    ListAppendAfterTail {
        /// List name
        list: ObjectName,
        /// Payload
        element: ObjectName,
    },
    /// Move `other`'s head onto `list`'s tail
    ListSpliceTail {
        /// Receiving list
        list: ObjectName,
        /// Donor list
        other: ObjectName,
    },
    /// Move `other`'s head onto empty `list`
    ListAdoptHead {
        /// Receiving list
        list: ObjectName,
        /// Donor list
        other: ObjectName,
    },
    /// All payloads in chain order
    ListElements {
        /// List name
        list: ObjectName,
    },
    /// Reachable item count and broken NEXT/PREV pairs
    InspectChain {
        /// List name
        list: ObjectName,
    },

    // ------------------------------------------------------------------
    // Staged construction
    // ------------------------------------------------------------------
    /// Create one staged item per selected row
    StageSelection {
        /// Container name
        container: ObjectName,
        /// Container family, decides the item label
        family: ContainerFamily,
        /// Row source
        selector: Selector,
        /// Drop repeated rows before staging
        distinct: bool,
    },
    /// Create one staged item per pre-hashed entry
    StageEntries {
        /// Container name
        container: ObjectName,
        /// Container family, decides the item label
        family: ContainerFamily,
        /// Rows with ordinals and hash tags
        entries: Vec<StagedEntry>,
    },
    /// Turn adjacent ordinals into chain edges
    ChainStaged {
        /// Container name
        container: ObjectName,
        /// Which edge to create
        link: StagingLink,
    },
    /// Attach staged items to the container
    AnchorStaged {
        /// Container name
        container: ObjectName,
        /// Head pointer or membership edges
        anchor: StagingAnchor,
    },
    /// Remove staging edges
    DropStaged {
        /// Container name
        container: ObjectName,
    },

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------
    /// Payload of the item carrying `hash`
    SetFindHash {
        /// Set name
        set: ObjectName,
        /// Hash tag
        hash: HashTag,
    },
    /// Insert an item unless the hash is present; bumps the length on insert
    ///
    /// The in-process graph rejects a missing payload with `ObjectNotFound`.
    /// Cypher matches nothing instead, so callers that need the payload
    /// check it first.
    SetInsert {
        /// Set name
        set: ObjectName,
        /// Payload
        element: ObjectName,
        /// Hash tag
        hash: HashTag,
    },
    /// Remove the item carrying `hash`; decrements the length on removal
    SetRemoveHash {
        /// Set name
        set: ObjectName,
        /// Hash tag
        hash: HashTag,
    },
    /// Copy `source` items whose hash is absent from `target`
    SetMerge {
        /// Receiving set
        target: ObjectName,
        /// Donor set
        source: ObjectName,
    },
    /// Copy `left` items whose hash is present in `right`
    SetIntersect {
        /// Receiving set
        target: ObjectName,
        /// Items come from here
        left: ObjectName,
        /// Filter
        right: ObjectName,
    },
    /// Copy `left` items whose hash is absent from `right`
    SetSubtract {
        /// Receiving set
        target: ObjectName,
        /// Items come from here
        left: ObjectName,
        /// Filter
        right: ObjectName,
    },
    /// Compare hash collections
    SetEquals {
        /// First set
        left: ObjectName,
        /// Second set
        right: ObjectName,
    },
    /// Every (hash, payload) pair, ordered by hash
    SetMembers {
        /// Set name
        set: ObjectName,
    },

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------
    /// Names of the key and value sets, if allocated
    MapComponents {
        /// Map name
        map: ObjectName,
    },
    /// Connect component sets
    MapAttach {
        /// Map name
        map: ObjectName,
        /// Key set
        keys: ObjectName,
        /// Value set
        values: ObjectName,
    },
    /// Disconnect component sets
    MapDetach {
        /// Map name
        map: ObjectName,
    },

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------
    /// One garbage collection pass
    Sweep {
        /// Which pass
        pass: SweepPass,
    },
    /// Caller-supplied Cypher
    Raw {
        /// Query text
        cypher: String,
        /// Parameters
        params: Properties,
    },
}

impl Statement {
    /// Short tag for logging and unsupported-statement faults
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateNode { .. } => "CreateNode",
            Statement::FetchNode { .. } => "FetchNode",
            Statement::UpdateProperties { .. } => "UpdateProperties",
            Statement::DeleteNode { .. } => "DeleteNode",
            Statement::ListNames { .. } => "ListNames",
            Statement::Select { .. } => "Select",
            Statement::CaptureIds { .. } => "CaptureIds",
            Statement::AdjustLength { .. } => "AdjustLength",
            Statement::SetLength { .. } => "SetLength",
            Statement::Recount { .. } => "Recount",
            Statement::ClearItems { .. } => "ClearItems",
            Statement::ListItemAt { .. } => "ListItemAt",
            Statement::ListUnlinkAt { .. } => "ListUnlinkAt",
            Statement::ListAttachHead { .. } => "ListAttachHead",
            Statement::ListAppendAfterTail { .. } => "ListAppendAfterTail",
            Statement::ListSpliceTail { .. } => "ListSpliceTail",
            Statement::ListAdoptHead { .. } => "ListAdoptHead",
            Statement::ListElements { .. } => "ListElements",
            Statement::InspectChain { .. } => "InspectChain",
            Statement::StageSelection { .. } => "StageSelection",
            Statement::StageEntries { .. } => "StageEntries",
            Statement::ChainStaged { .. } => "ChainStaged",
            Statement::AnchorStaged { .. } => "AnchorStaged",
            Statement::DropStaged { .. } => "DropStaged",
            Statement::SetFindHash { .. } => "SetFindHash",
            Statement::SetInsert { .. } => "SetInsert",
            Statement::SetRemoveHash { .. } => "SetRemoveHash",
            Statement::SetMerge { .. } => "SetMerge",
            Statement::SetIntersect { .. } => "SetIntersect",
            Statement::SetSubtract { .. } => "SetSubtract",
            Statement::SetEquals { .. } => "SetEquals",
            Statement::SetMembers { .. } => "SetMembers",
            Statement::MapComponents { .. } => "MapComponents",
            Statement::MapAttach { .. } => "MapAttach",
            Statement::MapDetach { .. } => "MapDetach",
            Statement::Sweep { .. } => "Sweep",
            Statement::Raw { .. } => "Raw",
        }
    }

    /// True for statements that never write
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Statement::FetchNode { .. }
                | Statement::ListNames { .. }
                | Statement::Select { .. }
                | Statement::ListItemAt { .. }
                | Statement::ListElements { .. }
                | Statement::InspectChain { .. }
                | Statement::SetFindHash { .. }
                | Statement::SetEquals { .. }
                | Statement::SetMembers { .. }
                | Statement::MapComponents { .. }
        )
    }
}

/// Set membership row
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Item hash tag
    pub hash: HashTag,
    /// Payload node
    pub element: NodeRecord,
}

/// Component sets of an allocated map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapComponents {
    /// Key set name
    pub keys: ObjectName,
    /// Value set name
    pub values: ObjectName,
}

/// Structural health of a list chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainReport {
    /// Items reachable from the head through NEXT edges
    pub reachable: u64,
    /// NEXT edges without the matching PREV edge
    pub broken_links: u64,
}

/// Tabular result of a raw query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in return order
    pub columns: Vec<String>,
    /// Rows, each aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A single created node
    Node(NodeRecord),
    /// Matched nodes in statement order
    Nodes(Vec<NodeRecord>),
    /// Number of affected items, edges or nodes
    Count(u64),
    /// Stored container length after the statement
    Length(u64),
    /// Boolean answer
    Flag(bool),
    /// Element names
    Names(Vec<ObjectName>),
    /// Set membership
    Members(Vec<Member>),
    /// Map components, `None` while unallocated
    Components(Option<MapComponents>),
    /// Chain inspection
    Chain(ChainReport),
    /// Raw rows
    Rows(RowSet),
}

impl Outcome {
    fn kind(&self) -> &'static str {
        match self {
            Outcome::Node(_) => "Node",
            Outcome::Nodes(_) => "Nodes",
            Outcome::Count(_) => "Count",
            Outcome::Length(_) => "Length",
            Outcome::Flag(_) => "Flag",
            Outcome::Names(_) => "Names",
            Outcome::Members(_) => "Members",
            Outcome::Components(_) => "Components",
            Outcome::Chain(_) => "Chain",
            Outcome::Rows(_) => "Rows",
        }
    }

    fn mismatch(&self, wanted: &str) -> Error {
        Error::protocol(format!("expected {} outcome, got {}", wanted, self.kind()))
    }

    /// Unwrap a created node
    pub fn into_node(self) -> Result<NodeRecord> {
        match self {
            Outcome::Node(node) => Ok(node),
            other => Err(other.mismatch("Node")),
        }
    }

    /// Unwrap matched nodes
    pub fn into_nodes(self) -> Result<Vec<NodeRecord>> {
        match self {
            Outcome::Nodes(nodes) => Ok(nodes),
            other => Err(other.mismatch("Nodes")),
        }
    }

    /// Unwrap zero or one matched node
    pub fn into_optional_node(self) -> Result<Option<NodeRecord>> {
        let mut nodes = self.into_nodes()?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            n => Err(Error::protocol(format!("expected at most one node, got {}", n))),
        }
    }

    /// Unwrap an affected count
    pub fn count(&self) -> Result<u64> {
        match self {
            Outcome::Count(n) => Ok(*n),
            other => Err(other.mismatch("Count")),
        }
    }

    /// Unwrap a stored length
    pub fn length(&self) -> Result<u64> {
        match self {
            Outcome::Length(n) => Ok(*n),
            other => Err(other.mismatch("Length")),
        }
    }

    /// Unwrap a boolean answer
    pub fn flag(&self) -> Result<bool> {
        match self {
            Outcome::Flag(b) => Ok(*b),
            other => Err(other.mismatch("Flag")),
        }
    }

    /// Unwrap element names
    pub fn into_names(self) -> Result<Vec<ObjectName>> {
        match self {
            Outcome::Names(names) => Ok(names),
            other => Err(other.mismatch("Names")),
        }
    }

    /// Unwrap set membership
    pub fn into_members(self) -> Result<Vec<Member>> {
        match self {
            Outcome::Members(members) => Ok(members),
            other => Err(other.mismatch("Members")),
        }
    }

    /// Unwrap map components
    pub fn into_components(self) -> Result<Option<MapComponents>> {
        match self {
            Outcome::Components(c) => Ok(c),
            other => Err(other.mismatch("Components")),
        }
    }

    /// Unwrap a chain report
    pub fn chain(&self) -> Result<ChainReport> {
        match self {
            Outcome::Chain(report) => Ok(*report),
            other => Err(other.mismatch("Chain")),
        }
    }

    /// Unwrap raw rows
    pub fn into_rows(self) -> Result<RowSet> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(other.mismatch("Rows")),
        }
    }
}
