//! Cypher rendering
//!
//! Compiles each `Statement` to one parameterized Cypher query. Names, hash
//! tags and property maps always travel as parameters; only labels (quoted)
//! and hop counts (integers) are spliced into the text.
//!
//! Statements that report a container's state (`Length`, `Flag`, `Chain`,
//! `Components`) return no row when the container is missing, which the
//! decoder turns into `ObjectNotFound`.

use serde_json::{json, Map, Value as Json};

use graphads_core::schema::{self, label, prop, rel, ANONYMOUS_NAME_PATTERN};
use graphads_core::{
    ContainerFamily, ObjectName, Properties, Selector, StagingAnchor, StagingLink, Statement,
    SweepPass,
};

/// A rendered query with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    /// Query text
    pub text: String,
    /// Parameter map
    pub params: Map<String, Json>,
}

impl CypherQuery {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    fn name(self, key: &str, name: &ObjectName) -> Self {
        self.param(key, name.as_str())
    }
}

/// Quote a label or relationship type
pub fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn labels_clause(labels: &[String]) -> String {
    labels.iter().map(|l| format!(":{}", quote(l))).collect()
}

fn node_columns(var: &str) -> String {
    format!(
        "id({v}) AS id, labels({v}) AS labels, properties({v}) AS props",
        v = var
    )
}

fn properties_json(properties: &Properties) -> Json {
    Json::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), Json::from(v.clone())))
            .collect(),
    )
}

/// Row source binding `item`; the bool says whether `rank` orders it
fn selector_source(selector: &Selector, query: &mut CypherQuery) -> (String, bool) {
    match selector {
        Selector::Names(names) => {
            let names: Vec<Json> = names.iter().map(|n| Json::from(n.as_str())).collect();
            query.params.insert("names".into(), Json::Array(names));
            (
                format!(
                    "UNWIND range(0, size($names) - 1) AS rank \
                     MATCH (item:{} {{name: $names[rank]}})",
                    quote(label::ELEMENT)
                ),
                true,
            )
        }
        Selector::Label(l) => (
            format!("MATCH (item:{}) WITH *, id(item) AS rank", quote(l)),
            true,
        ),
        Selector::Ids(ids) => {
            query.params.insert("ids".into(), json!(ids));
            (
                "UNWIND range(0, size($ids) - 1) AS rank \
                 MATCH (item) WHERE id(item) = $ids[rank]"
                    .to_string(),
                true,
            )
        }
        Selector::Cypher(fragment) => (fragment.trim().to_string(), false),
    }
}

fn order_by_rank(ordered: bool) -> &'static str {
    if ordered {
        " ORDER BY rank"
    } else {
        ""
    }
}

/// Render a statement to Cypher
pub fn render(statement: &Statement) -> CypherQuery {
    let element = quote(label::ELEMENT);
    let container = quote(label::CONTAINER);
    let list = quote(label::LIST);
    let list_item = quote(label::LIST_ITEM);
    let set = quote(label::SET);
    let set_item = quote(label::SET_ITEM);
    let map = quote(label::MAP);

    match statement {
        Statement::CreateNode { labels, properties } => {
            let properties: Properties = properties
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            CypherQuery::new(format!(
                "CREATE (n{} $props) RETURN {}",
                labels_clause(labels),
                node_columns("n")
            ))
            .param("props", properties_json(&properties))
        }
        Statement::FetchNode { name } => CypherQuery::new(format!(
            "MATCH (n:{} {{name: $name}}) RETURN {}",
            element,
            node_columns("n")
        ))
        .name("name", name),
        Statement::UpdateProperties { name, properties } => CypherQuery::new(format!(
            "MATCH (n:{} {{name: $name}}) SET n += $props RETURN count(n) AS affected",
            element
        ))
        .name("name", name)
        .param("props", properties_json(properties)),
        Statement::DeleteNode { name, detach } => CypherQuery::new(format!(
            "MATCH (n:{} {{name: $name}}) {}DELETE n RETURN count(*) AS affected",
            element,
            if *detach { "DETACH " } else { "" }
        ))
        .name("name", name),
        Statement::ListNames { label: filter } => {
            let extra = filter.as_deref().map(quote).map(|l| format!(":{}", l));
            CypherQuery::new(format!(
                "MATCH (n:{}{}) RETURN n.name AS name ORDER BY name",
                element,
                extra.unwrap_or_default()
            ))
        }
        Statement::Select { selector } => {
            let mut query = CypherQuery::new("");
            let (source, ordered) = selector_source(selector, &mut query);
            query.text = format!(
                "{} RETURN {}{}",
                source,
                node_columns("item"),
                order_by_rank(ordered)
            );
            query
        }
        Statement::CaptureIds { array, selector } => {
            let mut query = CypherQuery::new("").name("array", array);
            let (source, ordered) = selector_source(selector, &mut query);
            query.text = format!(
                "MATCH (a:{} {{name: $array}}) {} \
                 WITH a, item{} \
                 WITH a, collect(id(item)) AS ids \
                 SET a.value = ids \
                 RETURN size(ids) AS affected",
                quote(label::NUMBER_ARRAY),
                source,
                order_by_rank(ordered)
            );
            query
        }

        // --------------------------------------------------------------
        // Container bookkeeping
        // --------------------------------------------------------------
        Statement::AdjustLength { container: c, delta } => CypherQuery::new(format!(
            "MATCH (c:{} {{name: $container}}) \
             SET c.length = coalesce(c.length, 0) + $delta \
             RETURN c.length AS length",
            container
        ))
        .name("container", c)
        .param("delta", *delta),
        Statement::SetLength { container: c, length } => CypherQuery::new(format!(
            "MATCH (c:{} {{name: $container}}) SET c.length = $length RETURN c.length AS length",
            container
        ))
        .name("container", c)
        .param("length", *length),
        Statement::Recount { container: c, family } => {
            let pattern = match family {
                ContainerFamily::List => format!("(c)-[:{}*]->(i:{})", rel::NEXT, list_item),
                ContainerFamily::Set => format!("(c)-[:{}]->(i:{})", rel::MEMBER, set_item),
                ContainerFamily::Map => format!(
                    "(c)-[:{}]->(:{})-[:{}]->(i:{})",
                    rel::KEYS,
                    set,
                    rel::MEMBER,
                    set_item
                ),
            };
            CypherQuery::new(format!(
                "MATCH (c:{} {{name: $container}}) \
                 OPTIONAL MATCH {} \
                 WITH c, count(DISTINCT i) AS n \
                 SET c.length = n \
                 RETURN n AS length",
                quote(family.label()),
                pattern
            ))
            .name("container", c)
        }
        Statement::ClearItems { container: c, family } => {
            let text = match family {
                ContainerFamily::List | ContainerFamily::Set => {
                    let pattern = if *family == ContainerFamily::List {
                        format!("(c)-[:{}*]->(i:{})", rel::NEXT, list_item)
                    } else {
                        format!("(c)-[:{}]->(i:{})", rel::MEMBER, set_item)
                    };
                    format!(
                        "MATCH (c:{} {{name: $container}}) \
                         OPTIONAL MATCH {} \
                         WITH c, collect(DISTINCT i) AS items \
                         FOREACH (x IN items | DETACH DELETE x) \
                         SET c.length = 0 \
                         RETURN size(items) AS affected",
                        quote(family.label()),
                        pattern
                    )
                }
                ContainerFamily::Map => format!(
                    "MATCH (c:{map} {{name: $container}}) \
                     OPTIONAL MATCH (c)-[:{keys}|{values}]->(part:{set}) \
                     OPTIONAL MATCH (part)-[:{member}]->(i:{set_item}) \
                     WITH c, collect(DISTINCT part) AS parts, collect(DISTINCT i) AS items \
                     FOREACH (x IN items | DETACH DELETE x) \
                     FOREACH (p IN parts | SET p.length = 0) \
                     SET c.length = 0 \
                     RETURN size(items) AS affected",
                    map = map,
                    keys = rel::KEYS,
                    values = rel::VALUES,
                    set = set,
                    member = rel::MEMBER,
                    set_item = set_item
                ),
            };
            CypherQuery::new(text).name("container", c)
        }

        // --------------------------------------------------------------
        // Lists
        // --------------------------------------------------------------
        Statement::ListItemAt { list: l, hops } => CypherQuery::new(format!(
            "MATCH (l:{} {{name: $list}})-[:{}*{}]->(i:{})-[:{}]->(e) RETURN {}",
            list,
            rel::NEXT,
            hops,
            list_item,
            rel::HOLDS,
            node_columns("e")
        ))
        .name("list", l),
        Statement::ListUnlinkAt { list: l, hops } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}})-[:{next}*{hops}]->(i:{item}) \
             MATCH (p)-[:{next}]->(i) \
             OPTIONAL MATCH (i)-[:{next}]->(n:{item}) \
             FOREACH (ignored IN CASE WHEN n IS NULL THEN [] ELSE [1] END | \
                 CREATE (p)-[:{next}]->(n)) \
             FOREACH (ignored IN CASE WHEN n IS NOT NULL AND p:{item} THEN [1] ELSE [] END | \
                 CREATE (n)-[:{prev}]->(p)) \
             DETACH DELETE i \
             RETURN count(*) AS affected",
            list = list,
            next = rel::NEXT,
            prev = rel::PREV,
            hops = hops,
            item = list_item
        ))
        .name("list", l),
        Statement::ListAttachHead { list: l, element: e } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}}), (e:{element} {{name: $element}}) \
             WHERE NOT EXISTS {{ (l)-[:{next}]->() }} \
             CREATE (l)-[:{next}]->(i:{item_base}:{item})-[:{holds}]->(e) \
             RETURN count(i) AS affected",
            list = list,
            element = element,
            next = rel::NEXT,
            holds = rel::HOLDS,
            item_base = quote(label::ITEM),
            item = list_item
        ))
        .name("list", l)
        .name("element", e),
        Statement::ListAppendAfterTail { list: l, element: e } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}})-[:{next}*]->(t:{item}) \
             WHERE NOT EXISTS {{ (t)-[:{next}]->() }} \
             MATCH (e:{element} {{name: $element}}) \
             CREATE (t)-[:{next}]->(i:{item_base}:{item})-[:{holds}]->(e), (i)-[:{prev}]->(t) \
             RETURN count(i) AS affected",
            list = list,
            element = element,
            next = rel::NEXT,
            prev = rel::PREV,
            holds = rel::HOLDS,
            item_base = quote(label::ITEM),
            item = list_item
        ))
        .name("list", l)
        .name("element", e),
        Statement::ListSpliceTail { list: l, other } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}})-[:{next}*]->(t:{item}) \
             WHERE NOT EXISTS {{ (t)-[:{next}]->() }} \
             MATCH (o:{list} {{name: $other}})-[r:{next}]->(h:{item}) \
             DELETE r \
             CREATE (t)-[:{next}]->(h), (h)-[:{prev}]->(t) \
             RETURN count(h) AS affected",
            list = list,
            next = rel::NEXT,
            prev = rel::PREV,
            item = list_item
        ))
        .name("list", l)
        .name("other", other),
        Statement::ListAdoptHead { list: l, other } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}}) \
             WHERE NOT EXISTS {{ (l)-[:{next}]->() }} \
             MATCH (o:{list} {{name: $other}})-[r:{next}]->(h:{item}) \
             DELETE r \
             CREATE (l)-[:{next}]->(h) \
             RETURN count(h) AS affected",
            list = list,
            next = rel::NEXT,
            item = list_item
        ))
        .name("list", l)
        .name("other", other),
        Statement::ListElements { list: l } => CypherQuery::new(format!(
            "MATCH path = (l:{} {{name: $list}})-[:{}*]->(i:{}) \
             MATCH (i)-[:{}]->(e) \
             RETURN {} ORDER BY length(path)",
            list,
            rel::NEXT,
            list_item,
            rel::HOLDS,
            node_columns("e")
        ))
        .name("list", l),
        Statement::InspectChain { list: l } => CypherQuery::new(format!(
            "MATCH (l:{list} {{name: $list}}) \
             OPTIONAL MATCH (l)-[:{next}*]->(i:{item}) \
             OPTIONAL MATCH (i)-[:{next}]->(n:{item}) \
             RETURN l.name AS list, count(DISTINCT i) AS reachable, \
             sum(CASE WHEN n IS NOT NULL AND NOT EXISTS {{ (n)-[:{prev}]->(i) }} \
             THEN 1 ELSE 0 END) AS broken",
            list = list,
            next = rel::NEXT,
            prev = rel::PREV,
            item = list_item
        ))
        .name("list", l),

        // --------------------------------------------------------------
        // Staged construction
        // --------------------------------------------------------------
        Statement::StageSelection {
            container: c,
            family,
            selector,
            distinct,
        } => {
            let mut query = CypherQuery::new("").name("container", c);
            let (source, ordered) = selector_source(selector, &mut query);
            query.text = format!(
                "MATCH (c:{container} {{name: $container}}) {source} \
                 WITH c, item{order} \
                 WITH c, collect({distinct}item) AS rows \
                 UNWIND range(0, size(rows) - 1) AS ordinal \
                 WITH c, rows[ordinal] AS element, ordinal \
                 CREATE (c)-[:{staged} {{{scope}: $container, {ordinal}: ordinal}}]->\
                 (i:{item_base}:{item})-[:{holds}]->(element) \
                 RETURN count(i) AS affected",
                container = container,
                source = source,
                order = order_by_rank(ordered),
                distinct = if *distinct { "DISTINCT " } else { "" },
                staged = rel::STAGED,
                scope = prop::SCOPE,
                ordinal = prop::ORDINAL,
                item_base = quote(label::ITEM),
                item = quote(family.item_label()),
                holds = rel::HOLDS
            );
            query
        }
        Statement::StageEntries {
            container: c,
            family,
            entries,
        } => {
            let rows: Vec<Json> = entries
                .iter()
                .map(|e| {
                    json!({
                        "ordinal": e.ordinal,
                        "node": e.node,
                        "hash": e.hash.map(|h| h.to_hex()),
                    })
                })
                .collect();
            CypherQuery::new(format!(
                "MATCH (c:{container} {{name: $container}}) \
                 UNWIND $entries AS entry \
                 MATCH (e) WHERE id(e) = entry.node \
                 CREATE (c)-[:{staged} {{{scope}: $container, {ordinal}: entry.ordinal}}]->\
                 (i:{item_base}:{item} {{{hash}: entry.hash}})-[:{holds}]->(e) \
                 RETURN count(i) AS affected",
                container = container,
                staged = rel::STAGED,
                scope = prop::SCOPE,
                ordinal = prop::ORDINAL,
                hash = prop::HASH,
                item_base = quote(label::ITEM),
                item = quote(family.item_label()),
                holds = rel::HOLDS
            ))
            .name("container", c)
            .param("entries", Json::Array(rows))
        }
        Statement::ChainStaged { container: c, link } => {
            let create = match link {
                StagingLink::Forward => format!("CREATE (x)-[:{}]->(y)", rel::NEXT),
                StagingLink::Backward => format!("CREATE (y)-[:{}]->(x)", rel::PREV),
            };
            CypherQuery::new(format!(
                "MATCH (c:{container} {{name: $container}})-[a:{staged} {{{scope}: $container}}]->(x) \
                 MATCH (c)-[b:{staged} {{{scope}: $container}}]->(y) \
                 WHERE b.{ordinal} = a.{ordinal} + 1 \
                 {create} \
                 RETURN count(*) AS affected",
                container = container,
                staged = rel::STAGED,
                scope = prop::SCOPE,
                ordinal = prop::ORDINAL,
                create = create
            ))
            .name("container", c)
        }
        Statement::AnchorStaged { container: c, anchor } => {
            let (filter, rel_type) = match anchor {
                StagingAnchor::Head => (format!(", {}: 0", prop::ORDINAL), rel::NEXT),
                StagingAnchor::Members => (String::new(), rel::MEMBER),
            };
            CypherQuery::new(format!(
                "MATCH (c:{container} {{name: $container}})-[:{staged} {{{scope}: $container{filter}}}]->(x) \
                 CREATE (c)-[:{rel_type}]->(x) \
                 RETURN count(x) AS affected",
                container = container,
                staged = rel::STAGED,
                scope = prop::SCOPE,
                filter = filter,
                rel_type = rel_type
            ))
            .name("container", c)
        }
        Statement::DropStaged { container: c } => CypherQuery::new(format!(
            "MATCH (c:{} {{name: $container}})-[a:{} {{{}: $container}}]->() \
             DELETE a RETURN count(*) AS affected",
            container,
            rel::STAGED,
            prop::SCOPE
        ))
        .name("container", c),

        // --------------------------------------------------------------
        // Sets
        // --------------------------------------------------------------
        Statement::SetFindHash { set: s, hash } => CypherQuery::new(format!(
            "MATCH (s:{} {{name: $set}})-[:{}]->(:{} {{hash: $hash}})-[:{}]->(e) RETURN {}",
            set,
            rel::MEMBER,
            set_item,
            rel::HOLDS,
            node_columns("e")
        ))
        .name("set", s)
        .param("hash", hash.to_hex()),
        Statement::SetInsert {
            set: s,
            element: e,
            hash,
        } => CypherQuery::new(format!(
            "MATCH (s:{set} {{name: $set}}), (e:{element} {{name: $element}}) \
             WHERE NOT EXISTS {{ (s)-[:{member}]->(:{set_item} {{hash: $hash}}) }} \
             CREATE (s)-[:{member}]->(i:{item_base}:{set_item} {{hash: $hash}})-[:{holds}]->(e) \
             SET s.length = coalesce(s.length, 0) + 1 \
             RETURN count(i) AS affected",
            set = set,
            element = element,
            member = rel::MEMBER,
            holds = rel::HOLDS,
            item_base = quote(label::ITEM),
            set_item = set_item
        ))
        .name("set", s)
        .name("element", e)
        .param("hash", hash.to_hex()),
        Statement::SetRemoveHash { set: s, hash } => CypherQuery::new(format!(
            "MATCH (s:{} {{name: $set}})-[:{}]->(i:{} {{hash: $hash}}) \
             DETACH DELETE i \
             WITH s, count(*) AS removed \
             SET s.length = coalesce(s.length, 0) - removed \
             RETURN removed AS affected",
            set,
            rel::MEMBER,
            set_item
        ))
        .name("set", s)
        .param("hash", hash.to_hex()),
        Statement::SetMerge { target, source } => CypherQuery::new(format!(
            "MATCH (t:{set} {{name: $target}}), (src:{set} {{name: $source}}) \
             OPTIONAL MATCH (t)-[:{member}]->(ti:{set_item}) \
             WITH t, src, collect(ti.hash) AS present \
             MATCH (src)-[:{member}]->(si:{set_item})-[:{holds}]->(e) \
             WHERE NOT si.hash IN present \
             CREATE (t)-[:{member}]->(i:{item_base}:{set_item} {{hash: si.hash}})-[:{holds}]->(e) \
             RETURN count(i) AS affected",
            set = set,
            member = rel::MEMBER,
            holds = rel::HOLDS,
            item_base = quote(label::ITEM),
            set_item = set_item
        ))
        .name("target", target)
        .name("source", source),
        Statement::SetIntersect {
            target,
            left,
            right,
        } => filtered_copy(target, left, right, true),
        Statement::SetSubtract {
            target,
            left,
            right,
        } => filtered_copy(target, left, right, false),
        Statement::SetEquals { left, right } => CypherQuery::new(format!(
            "MATCH (a:{set} {{name: $left}}), (b:{set} {{name: $right}}) \
             OPTIONAL MATCH (a)-[:{member}]->(x:{set_item}) \
             WITH a, b, collect(x.hash) AS lh \
             OPTIONAL MATCH (b)-[:{member}]->(y:{set_item}) \
             WITH a, b, lh, collect(y.hash) AS rh \
             RETURN size(lh) = size(rh) AND all(h IN lh WHERE h IN rh) AS flag",
            set = set,
            member = rel::MEMBER,
            set_item = set_item
        ))
        .name("left", left)
        .name("right", right),
        Statement::SetMembers { set: s } => CypherQuery::new(format!(
            "MATCH (s:{} {{name: $set}})-[:{}]->(i:{})-[:{}]->(e) \
             RETURN i.hash AS hash, {} ORDER BY hash",
            set,
            rel::MEMBER,
            set_item,
            rel::HOLDS,
            node_columns("e")
        ))
        .name("set", s),

        // --------------------------------------------------------------
        // Maps
        // --------------------------------------------------------------
        Statement::MapComponents { map: m } => CypherQuery::new(format!(
            "MATCH (m:{} {{name: $map}}) \
             OPTIONAL MATCH (m)-[:{}]->(k:{}) \
             OPTIONAL MATCH (m)-[:{}]->(v:{}) \
             RETURN k.name AS keys, v.name AS values",
            map,
            rel::KEYS,
            set,
            rel::VALUES,
            set
        ))
        .name("map", m),
        Statement::MapAttach {
            map: m,
            keys,
            values,
        } => CypherQuery::new(format!(
            "MATCH (m:{map} {{name: $map}}), (k:{set} {{name: $keys}}), (v:{set} {{name: $values}}) \
             CREATE (m)-[:{keys_rel}]->(k), (m)-[:{values_rel}]->(v) \
             RETURN count(m) AS affected",
            map = map,
            set = set,
            keys_rel = rel::KEYS,
            values_rel = rel::VALUES
        ))
        .name("map", m)
        .name("keys", keys)
        .name("values", values),
        Statement::MapDetach { map: m } => CypherQuery::new(format!(
            "MATCH (m:{} {{name: $map}})-[r:{}|{}]->() DELETE r RETURN count(r) AS affected",
            map,
            rel::KEYS,
            rel::VALUES
        ))
        .name("map", m),

        // --------------------------------------------------------------
        // Maintenance
        // --------------------------------------------------------------
        Statement::Sweep { pass } => render_sweep(*pass),
        Statement::Raw { cypher, params } => CypherQuery {
            text: cypher.clone(),
            params: params
                .iter()
                .map(|(k, v)| (k.clone(), Json::from(v.clone())))
                .collect(),
        },
    }
}

fn filtered_copy(
    target: &ObjectName,
    left: &ObjectName,
    right: &ObjectName,
    keep_shared: bool,
) -> CypherQuery {
    CypherQuery::new(format!(
        "MATCH (t:{set} {{name: $target}}), (l:{set} {{name: $left}}), (r:{set} {{name: $right}}) \
         OPTIONAL MATCH (r)-[:{member}]->(ri:{set_item}) \
         WITH t, l, collect(ri.hash) AS other \
         MATCH (l)-[:{member}]->(li:{set_item})-[:{holds}]->(e) \
         WHERE {negate}li.hash IN other \
         CREATE (t)-[:{member}]->(i:{item_base}:{set_item} {{hash: li.hash}})-[:{holds}]->(e) \
         RETURN count(i) AS affected",
        set = quote(label::SET),
        set_item = quote(label::SET_ITEM),
        item_base = quote(label::ITEM),
        member = rel::MEMBER,
        holds = rel::HOLDS,
        negate = if keep_shared { "" } else { "NOT " }
    ))
    .name("target", target)
    .name("left", left)
    .name("right", right)
}

fn render_sweep(pass: SweepPass) -> CypherQuery {
    let unreferenced = |l: &str| {
        format!(
            "MATCH (n:{}) WHERE n.name =~ $pattern AND NOT EXISTS {{ ()-->(n) }}",
            quote(l)
        )
    };
    let text = match pass {
        SweepPass::AnonymousMaps => format!(
            "{} DETACH DELETE n RETURN count(*) AS affected",
            unreferenced(label::MAP)
        ),
        SweepPass::AnonymousSets => format!(
            "{} OPTIONAL MATCH (n)-[:{}]->(i:{}) \
             WITH n, collect(i) AS items \
             FOREACH (x IN items | DETACH DELETE x) \
             DETACH DELETE n \
             RETURN sum(size(items) + 1) AS affected",
            unreferenced(label::SET),
            rel::MEMBER,
            quote(label::SET_ITEM)
        ),
        SweepPass::AnonymousLists => format!(
            "{} OPTIONAL MATCH (n)-[:{}*]->(i:{}) \
             WITH n, collect(DISTINCT i) AS items \
             FOREACH (x IN items | DETACH DELETE x) \
             DETACH DELETE n \
             RETURN sum(size(items) + 1) AS affected",
            unreferenced(label::LIST),
            rel::NEXT,
            quote(label::LIST_ITEM)
        ),
        SweepPass::SeveredListFragments => format!(
            "MATCH (h:{item}) \
             WHERE NOT EXISTS {{ ()-[:{next}]->(h) }} \
             AND NOT EXISTS {{ (h)-[:{prev}]->() }} \
             AND NOT EXISTS {{ ()-[:{staged}]->(h) }} \
             AND EXISTS {{ (h)-[:{next}]->(:{item}) }} \
             OPTIONAL MATCH (h)-[:{next}*]->(t:{item}) \
             WITH collect(DISTINCT h) + collect(DISTINCT t) AS doomed \
             UNWIND doomed AS d \
             WITH DISTINCT d \
             DETACH DELETE d \
             RETURN count(*) AS affected",
            item = quote(label::LIST_ITEM),
            next = rel::NEXT,
            prev = rel::PREV,
            staged = rel::STAGED
        ),
        SweepPass::AnonymousVariables => format!(
            "{} DETACH DELETE n RETURN count(*) AS affected",
            unreferenced(label::VARIABLE)
        ),
    };
    let query = CypherQuery::new(text);
    match pass {
        SweepPass::SeveredListFragments => query,
        _ => query.param("pattern", ANONYMOUS_NAME_PATTERN),
    }
}

/// Schema bootstrap: uniqueness constraints and the item hash index
pub fn render_schema() -> Vec<CypherQuery> {
    let mut queries: Vec<CypherQuery> = schema::UNIQUE_CONSTRAINTS
        .iter()
        .map(|(l, key)| {
            CypherQuery::new(format!(
                "CREATE CONSTRAINT graphads_{}_{} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                l.to_lowercase(),
                key,
                quote(l),
                key
            ))
        })
        .collect();
    queries.push(CypherQuery::new(format!(
        "CREATE INDEX graphads_item_hash IF NOT EXISTS FOR (n:{}) ON (n.{})",
        quote(label::SET_ITEM),
        prop::HASH
    )));
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphads_core::{HashTag, StagedEntry, Value};

    fn name(n: &str) -> ObjectName {
        ObjectName::new(n)
    }

    #[test]
    fn test_quote_escapes_backticks() {
        assert_eq!(quote("Person"), "`Person`");
        assert_eq!(quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_names_travel_as_parameters() {
        let query = render(&Statement::FetchNode {
            name: name("x' OR 1=1"),
        });
        assert!(!query.text.contains("OR 1=1"));
        assert_eq!(query.params["name"], Json::from("x' OR 1=1"));
        assert!(query.text.contains("AS props"));
    }

    #[test]
    fn test_create_node_drops_nulls_and_quotes_labels() {
        let mut props = Properties::new();
        props.insert("name".into(), Value::from("n"));
        props.insert("gone".into(), Value::Null);
        let query = render(&Statement::CreateNode {
            labels: vec!["Element".into(), "Number".into()],
            properties: props,
        });
        assert!(query.text.starts_with("CREATE (n:`Element`:`Number` $props)"));
        assert_eq!(query.params["props"], json!({"name": "n"}));
    }

    #[test]
    fn test_hops_are_literal() {
        let query = render(&Statement::ListItemAt {
            list: name("l"),
            hops: 4,
        });
        assert!(query.text.contains("[:NEXT*4]"));
        let unlink = render(&Statement::ListUnlinkAt {
            list: name("l"),
            hops: 1,
        });
        assert!(unlink.text.contains("[:NEXT*1]"));
        assert!(unlink.text.contains("DETACH DELETE i"));
    }

    #[test]
    fn test_stage_selection_orders_named_rows() {
        let query = render(&Statement::StageSelection {
            container: name("l"),
            family: ContainerFamily::List,
            selector: Selector::names(["a", "b"]),
            distinct: true,
        });
        assert!(query.text.contains("ORDER BY rank"));
        assert!(query.text.contains("collect(DISTINCT item)"));
        assert!(query.text.contains("`ListItem`"));
        assert_eq!(query.params["names"], json!(["a", "b"]));
        assert_eq!(query.params["container"], json!("l"));
    }

    #[test]
    fn test_cypher_selector_is_spliced_without_ordering() {
        let query = render(&Statement::Select {
            selector: Selector::cypher("MATCH (item:Person) WHERE item.age > 30"),
        });
        assert!(query
            .text
            .starts_with("MATCH (item:Person) WHERE item.age > 30 RETURN"));
        assert!(!query.text.contains("ORDER BY"));
    }

    #[test]
    fn test_stage_entries_carry_hashes() {
        let hash = HashTag::of_canonical("1.0");
        let query = render(&Statement::StageEntries {
            container: name("s"),
            family: ContainerFamily::Set,
            entries: vec![StagedEntry {
                ordinal: 0,
                node: 42,
                hash: Some(hash),
            }],
        });
        assert_eq!(
            query.params["entries"],
            json!([{"ordinal": 0, "node": 42, "hash": hash.to_hex()}])
        );
        assert!(query.text.contains("`SetItem`"));
    }

    #[test]
    fn test_set_difference_negates_filter() {
        let intersect = render(&Statement::SetIntersect {
            target: name("t"),
            left: name("a"),
            right: name("b"),
        });
        let subtract = render(&Statement::SetSubtract {
            target: name("t"),
            left: name("a"),
            right: name("b"),
        });
        assert!(intersect.text.contains("WHERE li.hash IN other"));
        assert!(subtract.text.contains("WHERE NOT li.hash IN other"));
    }

    #[test]
    fn test_sweeps_use_anonymous_pattern() {
        for pass in SweepPass::ORDER {
            let query = render(&Statement::Sweep { pass });
            assert!(query.text.contains("DETACH DELETE"));
            if pass != SweepPass::SeveredListFragments {
                assert_eq!(query.params["pattern"], json!(ANONYMOUS_NAME_PATTERN));
            }
        }
    }

    #[test]
    fn test_schema_bootstrap() {
        let queries = render_schema();
        assert_eq!(queries.len(), schema::UNIQUE_CONSTRAINTS.len() + 1);
        assert!(queries[0].text.contains("REQUIRE n.name IS UNIQUE"));
        assert!(queries.last().unwrap().text.contains("ON (n.hash)"));
    }
}
