//! Decorators: annotations overlaid on the rendered tree.
//!
//! Decorators live beside the model, not inside it - adding or removing one
//! never touches the base template output. Block and layer decorators
//! resolve against their target node's position among its parent's
//! children; inline decorators resolve against text offsets inside a single
//! rendered text node, splitting it into runs at decorator boundaries.

use std::collections::{BTreeSet, HashMap};

use smol_str::SmolStr;

use crate::builder::{BuildContext, VNodeBuilder};
use crate::model::ModelValue;
use crate::template::Registry;
use crate::vnode::{
    ATTR_DECO_CATEGORY, ATTR_DECO_POSITION, ATTR_DECO_SID, ATTR_DECO_TYPE, ATTR_ERROR, VNode,
};

/// Decorator category, deciding how its target reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorCategory {
    /// Rendered as an overlay layer beside the target.
    Layer,
    /// Resolved against text offsets within a single text node.
    Inline,
    /// Resolved against the target node's position among its siblings.
    Block,
}

impl DecoratorCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "layer" => Some(Self::Layer),
            "inline" => Some(Self::Inline),
            "block" => Some(Self::Block),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::Inline => "inline",
            Self::Block => "block",
        }
    }

    /// Default placement when the decorator does not specify one.
    pub fn default_position(&self) -> DecoratorPosition {
        match self {
            Self::Block | Self::Layer => DecoratorPosition::After,
            Self::Inline => DecoratorPosition::Overlay,
        }
    }

    /// Tag used for diagnostic placeholders of this category.
    fn placeholder_tag(&self) -> &'static str {
        match self {
            Self::Inline => "span",
            Self::Block | Self::Layer => "div",
        }
    }
}

/// Placement of a decorator's rendered node relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorPosition {
    Before,
    After,
    InsideStart,
    InsideEnd,
    Overlay,
    Absolute,
}

impl DecoratorPosition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "inside-start" => Some(Self::InsideStart),
            "inside-end" => Some(Self::InsideEnd),
            "overlay" => Some(Self::Overlay),
            "absolute" => Some(Self::Absolute),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::InsideStart => "inside-start",
            Self::InsideEnd => "inside-end",
            Self::Overlay => "overlay",
            Self::Absolute => "absolute",
        }
    }
}

/// What a decorator is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoratorTarget {
    /// A single node, optionally narrowed to a text offset range.
    Node {
        sid: SmolStr,
        start: Option<usize>,
        end: Option<usize>,
    },
    /// A range spanning from one node to another.
    Range {
        start_sid: SmolStr,
        start: Option<usize>,
        end_sid: SmolStr,
        end: Option<usize>,
    },
}

/// An annotation attached to the model, independent of its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub sid: SmolStr,
    /// The decorator's own template name.
    pub stype: SmolStr,
    pub category: DecoratorCategory,
    pub target: DecoratorTarget,
    /// Explicit placement; `None` falls back to the category default.
    pub position: Option<DecoratorPosition>,
    pub enabled: bool,
    /// Payload passed to the decorator's renderer.
    pub data: ModelValue,
}

impl Decorator {
    pub fn new(
        sid: impl Into<SmolStr>,
        stype: impl Into<SmolStr>,
        category: DecoratorCategory,
        target: DecoratorTarget,
    ) -> Self {
        Self {
            sid: sid.into(),
            stype: stype.into(),
            category,
            target,
            position: None,
            enabled: true,
            data: ModelValue::Null,
        }
    }

    pub fn with_position(mut self, position: DecoratorPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_data(mut self, data: ModelValue) -> Self {
        self.data = data;
        self
    }

    pub fn resolved_position(&self) -> DecoratorPosition {
        self.position.unwrap_or_else(|| self.category.default_position())
    }

    /// Whether this decorator targets the given node. Cross-node ranges
    /// match either endpoint. An empty sid never matches anything.
    pub fn matches_sid(&self, sid: &str) -> bool {
        if sid.is_empty() {
            return false;
        }
        match &self.target {
            DecoratorTarget::Node { sid: target, .. } => target == sid,
            DecoratorTarget::Range {
                start_sid, end_sid, ..
            } => start_sid == sid || end_sid == sid,
        }
    }

    /// The clamped, non-empty `[start, end)` char range this decorator
    /// covers within the given node's text of length `len`. `None` when
    /// the decorator does not cover this node, the range is inverted
    /// (skipped with a warning), or it clamps to empty.
    fn inline_range(&self, sid: &str, len: usize) -> Option<(usize, usize)> {
        let (raw_start, raw_end) = match &self.target {
            DecoratorTarget::Node { sid: target, start, end } if target == sid => {
                (start.unwrap_or(0), end.unwrap_or(len))
            }
            DecoratorTarget::Range {
                start_sid,
                start,
                end_sid,
                end,
            } => {
                if start_sid == sid && end_sid == sid {
                    (start.unwrap_or(0), end.unwrap_or(len))
                } else if start_sid == sid {
                    // Range continues past this node.
                    (start.unwrap_or(0), len)
                } else if end_sid == sid {
                    (0, end.unwrap_or(len))
                } else {
                    return None;
                }
            }
            _ => return None,
        };

        if raw_end < raw_start {
            tracing::warn!(
                target: "tapestry::decor",
                deco_sid = %self.sid,
                raw_start,
                raw_end,
                "inverted decorator range, skipping for split"
            );
            return None;
        }
        let start = raw_start.min(len);
        let end = raw_end.min(len);
        (end > start).then_some((start, end))
    }
}

/// Decorators partitioned by category. Disabled decorators are dropped.
#[derive(Debug, Default)]
pub struct Categorized<'a> {
    pub block: Vec<&'a Decorator>,
    pub layer: Vec<&'a Decorator>,
    pub inline: Vec<&'a Decorator>,
}

/// Single-pass partition by category.
pub fn categorize<'a>(decorators: impl IntoIterator<Item = &'a Decorator>) -> Categorized<'a> {
    let mut out = Categorized::default();
    for deco in decorators {
        if !deco.enabled {
            continue;
        }
        match deco.category {
            DecoratorCategory::Block => out.block.push(deco),
            DecoratorCategory::Layer => out.layer.push(deco),
            DecoratorCategory::Inline => out.inline.push(deco),
        }
    }
    out
}

/// All enabled decorators targeting `sid`. An empty or missing sid yields
/// no matches, never an error.
pub fn decorators_for_node<'a>(sid: &str, decorators: &'a [Decorator]) -> Vec<&'a Decorator> {
    if sid.is_empty() {
        return Vec::new();
    }
    decorators
        .iter()
        .filter(|d| d.enabled && d.matches_sid(sid))
        .collect()
}

/// One contiguous slice of a text node after splitting at decorator
/// boundaries. Runs are disjoint, sorted, and cover `[0, len)` exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Char offsets within the source text.
    pub start: usize,
    pub end: usize,
    /// First covering decorator, for single-decorator consumers.
    pub decorator: Option<Decorator>,
    /// Every decorator whose range fully covers this run.
    pub decorators: Vec<Decorator>,
}

/// Split a text node's content at the boundaries of the given inline
/// decorators, resolved against `target_sid`.
///
/// Boundary offsets always include `0` and the text length; each run
/// carries every decorator whose clamped range fully covers it. Lookup is
/// via a start-offset index with a linear fallback for ranges whose start
/// precedes the run (nested or overlapping decorators).
pub fn split_text_by_decorators(
    text: &str,
    decorators: &[&Decorator],
    target_sid: &str,
) -> Vec<TextRun> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let ranges: Vec<(usize, usize, &Decorator)> = decorators
        .iter()
        .filter_map(|d| d.inline_range(target_sid, len).map(|(s, e)| (s, e, *d)))
        .collect();

    if ranges.is_empty() || len == 0 {
        return vec![TextRun {
            text: text.to_owned(),
            start: 0,
            end: len,
            decorator: None,
            decorators: Vec::new(),
        }];
    }

    let mut boundaries: BTreeSet<usize> = BTreeSet::from([0, len]);
    let mut by_start: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, &(start, end, _)) in ranges.iter().enumerate() {
        boundaries.insert(start);
        boundaries.insert(end);
        by_start.entry(start).or_default().push(i);
    }

    let bounds: Vec<usize> = boundaries.into_iter().collect();
    let mut runs = Vec::with_capacity(bounds.len() - 1);
    for pair in bounds.windows(2) {
        let (run_start, run_end) = (pair[0], pair[1]);

        let mut covering: Vec<usize> = Vec::new();
        if let Some(indices) = by_start.get(&run_start) {
            for &i in indices {
                if ranges[i].1 >= run_end {
                    covering.push(i);
                }
            }
        }
        // Fallback scan for ranges that started before this run.
        for (i, &(start, end, _)) in ranges.iter().enumerate() {
            if start < run_start && end >= run_end && !covering.contains(&i) {
                covering.push(i);
            }
        }
        // Keep the caller's decorator order, not discovery order.
        covering.sort_unstable();

        runs.push(TextRun {
            text: chars[run_start..run_end].iter().collect(),
            start: run_start,
            end: run_end,
            decorator: covering.first().map(|&i| ranges[i].2.clone()),
            decorators: covering.iter().map(|&i| ranges[i].2.clone()).collect(),
        });
    }
    runs
}

/// Decode a decorator set out of raw model data.
///
/// Entries missing identity, or carrying an unknown category, are dropped
/// with a diagnostic - one malformed decorator never fails the set.
pub fn decorators_from_model(value: &ModelValue) -> Vec<Decorator> {
    let Some(entries) = value.as_list() else {
        if !value.is_null() {
            tracing::warn!(target: "tapestry::decor", "decorator set is not a list, ignoring");
        }
        return Vec::new();
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(sid) = entry.get("sid").and_then(ModelValue::as_str).filter(|s| !s.is_empty())
        else {
            tracing::warn!(target: "tapestry::decor", "decorator without sid, dropping");
            continue;
        };
        let Some(stype) = entry.get("stype").and_then(ModelValue::as_str) else {
            tracing::warn!(target: "tapestry::decor", sid, "decorator without stype, dropping");
            continue;
        };
        let category_raw = entry
            .get("category")
            .and_then(ModelValue::as_str)
            .unwrap_or_default();
        let Some(category) = DecoratorCategory::parse(category_raw) else {
            tracing::warn!(
                target: "tapestry::decor",
                sid,
                category = category_raw,
                "unknown decorator category, dropping"
            );
            continue;
        };

        let Some(target) = target_from_model(entry.get("target")) else {
            tracing::warn!(target: "tapestry::decor", sid, "decorator without target, dropping");
            continue;
        };

        let position = entry
            .get("position")
            .and_then(ModelValue::as_str)
            .and_then(|raw| {
                let parsed = DecoratorPosition::parse(raw);
                if parsed.is_none() {
                    tracing::warn!(
                        target: "tapestry::decor",
                        sid,
                        position = raw,
                        "unknown decorator position, using category default"
                    );
                }
                parsed
            });

        let enabled = match entry.get("enabled") {
            Some(ModelValue::Bool(b)) => *b,
            _ => true,
        };

        out.push(Decorator {
            sid: SmolStr::new(sid),
            stype: SmolStr::new(stype),
            category,
            target,
            position,
            enabled,
            data: entry.get("data").cloned().unwrap_or_default(),
        });
    }
    out
}

fn target_from_model(value: Option<&ModelValue>) -> Option<DecoratorTarget> {
    let value = value?;
    let as_offset = |key: &str| -> Option<usize> {
        match value.get(key) {
            Some(ModelValue::Number(n)) if *n >= 0.0 => Some(*n as usize),
            _ => None,
        }
    };
    if let (Some(start_sid), Some(end_sid)) = (
        value.get("start_sid").and_then(ModelValue::as_str),
        value.get("end_sid").and_then(ModelValue::as_str),
    ) {
        return Some(DecoratorTarget::Range {
            start_sid: SmolStr::new(start_sid),
            start: as_offset("start"),
            end_sid: SmolStr::new(end_sid),
            end: as_offset("end"),
        });
    }
    let sid = value.get("sid").and_then(ModelValue::as_str)?;
    Some(DecoratorTarget::Node {
        sid: SmolStr::new(sid),
        start: as_offset("start"),
        end: as_offset("end"),
    })
}

/// The model handed to a decorator's renderer: its payload map (when it is
/// one) plus the decorator's own identity fields.
fn decorator_model(deco: &Decorator) -> ModelValue {
    let mut fields = match &deco.data {
        ModelValue::Map(m) => m.clone(),
        ModelValue::Null => HashMap::new(),
        other => HashMap::from([(SmolStr::new("data"), other.clone())]),
    };
    fields.insert(SmolStr::new("sid"), ModelValue::Str(deco.sid.to_string()));
    fields.insert(SmolStr::new("stype"), ModelValue::Str(deco.stype.to_string()));
    ModelValue::Map(fields)
}

/// Stamp a decorator's identity and resolved position into a VNode's
/// attributes, so the reconciler can pass them straight through to the
/// host without special-casing.
fn stamp_identity(vnode: &mut VNode, deco: &Decorator, position: DecoratorPosition) {
    vnode.set_attr(ATTR_DECO_SID, deco.sid.clone());
    vnode.set_attr(ATTR_DECO_TYPE, deco.stype.clone());
    vnode.set_attr(ATTR_DECO_CATEGORY, deco.category.as_str());
    vnode.set_attr(ATTR_DECO_POSITION, position.as_str());
}

/// Applies a decorator set onto a built VNode subtree.
pub struct DecoratorProcessor<'r> {
    registry: &'r Registry,
}

impl<'r> DecoratorProcessor<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolve, build, and insert decorators for `vnode` and every
    /// sid-bearing descendant that is not itself decorator output.
    pub fn process_tree(
        &self,
        builder: &VNodeBuilder<'r>,
        vnode: &mut VNode,
        decorators: &[Decorator],
        ctx: &BuildContext,
    ) {
        if vnode.children.is_empty() || decorators.is_empty() {
            return;
        }

        if let Some(sid) = vnode.sid.clone() {
            let matching = decorators_for_node(&sid, decorators);
            if !matching.is_empty() {
                tracing::trace!(
                    target: "tapestry::decor",
                    %sid,
                    count = matching.len(),
                    "applying decorators"
                );
                let categorized = categorize(matching.iter().copied());
                if !categorized.inline.is_empty() {
                    self.split_text_children(vnode, &categorized.inline, &sid);
                }
                let built: Vec<(VNode, DecoratorPosition)> = matching
                    .iter()
                    .map(|deco| {
                        (
                            self.build_decorator_vnode(builder, deco, ctx),
                            deco.resolved_position(),
                        )
                    })
                    .collect();
                insert_decorators_into_children(vnode, built);
            }
        }

        for child in vnode.children.iter_mut() {
            if !child.is_decorator() && child.sid.is_some() {
                self.process_tree(builder, child, decorators, ctx);
            }
        }
    }

    /// Build one decorator's VNode through its registered component.
    ///
    /// Never fails: a missing template or a failing build produces a
    /// diagnostic placeholder carrying the decorator's identity, so one
    /// broken decorator cannot take down the render.
    pub fn build_decorator_vnode(
        &self,
        builder: &VNodeBuilder<'r>,
        deco: &Decorator,
        ctx: &BuildContext,
    ) -> VNode {
        let position = deco.resolved_position();
        let Some(component) = self.registry.component(&deco.stype) else {
            tracing::warn!(
                target: "tapestry::decor",
                deco_sid = %deco.sid,
                stype = %deco.stype,
                "no template registered for decorator, emitting placeholder"
            );
            return self.placeholder(deco, position, "missing-template");
        };

        let model = decorator_model(deco);
        match builder.try_build_component(component, &deco.stype, &model, ctx) {
            Ok(mut vnode) => {
                stamp_identity(&mut vnode, deco, position);
                vnode
            }
            Err(err) => {
                tracing::warn!(
                    target: "tapestry::decor",
                    deco_sid = %deco.sid,
                    stype = %deco.stype,
                    error = %err,
                    "decorator template failed to build, emitting placeholder"
                );
                self.placeholder(deco, position, "build-failed")
            }
        }
    }

    fn placeholder(
        &self,
        deco: &Decorator,
        position: DecoratorPosition,
        reason: &str,
    ) -> VNode {
        let mut vnode = VNode::element(deco.category.placeholder_tag());
        vnode.set_attr(ATTR_ERROR, reason);
        stamp_identity(&mut vnode, deco, position);
        vnode
    }

    /// Replace text children with their decorator-split runs. Decorated
    /// runs are wrapped in an identity-stamped decorator-wrapper node.
    fn split_text_children(&self, vnode: &mut VNode, inline: &[&Decorator], sid: &str) {
        let old = std::mem::take(&mut vnode.children);
        let mut children = Vec::with_capacity(old.len());
        for child in old {
            if !child.is_text() {
                children.push(child);
                continue;
            }
            let text = child.text.clone().unwrap_or_default();
            let runs = split_text_by_decorators(&text, inline, sid);
            if runs.len() == 1 && runs[0].decorators.is_empty() {
                children.push(child);
                continue;
            }
            // The source leaf's sid goes to the first run only; stamping
            // it on every run would duplicate sids among siblings.
            let mut source_sid = child.sid.clone();
            for run in runs {
                let mut leaf = VNode::text(run.text.clone());
                leaf.sid = source_sid.take();
                match &run.decorator {
                    Some(deco) => {
                        let mut wrapper = VNode::decorator_wrapper();
                        stamp_identity(&mut wrapper, deco, deco.resolved_position());
                        wrapper.children.push(leaf);
                        children.push(wrapper);
                    }
                    None => children.push(leaf),
                }
            }
        }
        vnode.children = children;
    }
}

/// Insert built decorator VNodes into a target's children per their
/// resolved positions.
///
/// `inside-start`/`inside-end` only nest when the first/last child is an
/// element; a bare text child falls back to sibling insertion so text
/// content is never torn apart by nesting.
pub fn insert_decorators_into_children(
    vnode: &mut VNode,
    decorators: Vec<(VNode, DecoratorPosition)>,
) {
    let mut front = 0usize;
    for (deco, position) in decorators {
        match position {
            DecoratorPosition::Before => {
                vnode.children.insert(front, deco);
                front += 1;
            }
            DecoratorPosition::After
            | DecoratorPosition::Overlay
            | DecoratorPosition::Absolute => {
                vnode.children.push(deco);
            }
            DecoratorPosition::InsideStart => {
                // Anchor on the target's own children, skipping decorator
                // nodes this batch (or the run splitter) already inserted.
                match vnode.children.iter_mut().find(|c| !c.is_decorator()) {
                    Some(first) if first.is_element() => first.children.insert(0, deco),
                    _ => {
                        vnode.children.insert(front, deco);
                        front += 1;
                    }
                }
            }
            DecoratorPosition::InsideEnd => {
                match vnode.children.iter_mut().rev().find(|c| !c.is_decorator()) {
                    Some(last) if last.is_element() => last.children.push(deco),
                    _ => vnode.children.push(deco),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(sid: &str, start: usize, end: usize) -> Decorator {
        Decorator::new(
            format!("d-{start}-{end}"),
            "highlight",
            DecoratorCategory::Inline,
            DecoratorTarget::Node {
                sid: SmolStr::new(sid),
                start: Some(start),
                end: Some(end),
            },
        )
    }

    fn format_runs(runs: &[TextRun]) -> String {
        runs.iter()
            .map(|r| {
                let decos: Vec<&str> = r.decorators.iter().map(|d| d.sid.as_str()).collect();
                format!("{}..{} {:?} [{}]", r.start, r.end, r.text, decos.join(","))
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    #[test]
    fn test_split_single_decorator() {
        let deco = inline("t1", 0, 5);
        let runs = split_text_by_decorators("Hello World", &[&deco], "t1");
        insta::assert_snapshot!(
            format_runs(&runs),
            @r#"0..5 "Hello" [d-0-5] | 5..11 " World" []"#
        );
        assert!(runs[0].decorator.is_some());
        assert!(runs[1].decorator.is_none());
    }

    #[test]
    fn test_split_overlapping_decorators() {
        let a = inline("t1", 0, 6);
        let b = inline("t1", 4, 11);
        let runs = split_text_by_decorators("Hello World", &[&a, &b], "t1");
        insta::assert_snapshot!(
            format_runs(&runs),
            @r#"0..4 "Hell" [d-0-6] | 4..6 "o " [d-0-6,d-4-11] | 6..11 "World" [d-4-11]"#
        );
        // First covering decorator kept in the single-decorator field.
        assert_eq!(runs[1].decorator.as_ref().unwrap().sid, "d-0-6");
    }

    #[test]
    fn test_split_covers_whole_text_exactly_once() {
        let decos = [inline("t1", 2, 4), inline("t1", 3, 9), inline("t1", 0, 11)];
        let refs: Vec<&Decorator> = decos.iter().collect();
        let runs = split_text_by_decorators("Hello World", &refs, "t1");

        let mut cursor = 0;
        for run in &runs {
            assert_eq!(run.start, cursor, "runs must be contiguous");
            assert!(run.end > run.start);
            cursor = run.end;
        }
        assert_eq!(cursor, 11);
    }

    #[test]
    fn test_split_clamps_and_skips_inverted() {
        // Out-of-bounds end clamps to the text length.
        let long = inline("t1", 3, 99);
        let runs = split_text_by_decorators("Hello", &[&long], "t1");
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[1].start, runs[1].end), (3, 5));

        // Inverted range is skipped entirely.
        let bad = Decorator::new(
            "bad",
            "highlight",
            DecoratorCategory::Inline,
            DecoratorTarget::Node {
                sid: SmolStr::new("t1"),
                start: Some(4),
                end: Some(1),
            },
        );
        let runs = split_text_by_decorators("Hello", &[&bad], "t1");
        assert_eq!(runs.len(), 1);
        assert!(runs[0].decorators.is_empty());
    }

    #[test]
    fn test_split_cross_node_range() {
        let deco = Decorator::new(
            "d1",
            "highlight",
            DecoratorCategory::Inline,
            DecoratorTarget::Range {
                start_sid: SmolStr::new("t1"),
                start: Some(3),
                end_sid: SmolStr::new("t2"),
                end: Some(2),
            },
        );

        // On the start node the range runs to the end of the text.
        let runs = split_text_by_decorators("Hello", &[&deco], "t1");
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[1].start, runs[1].end), (3, 5));
        assert!(runs[1].decorator.is_some());

        // On the end node it runs from the start.
        let runs = split_text_by_decorators("World", &[&deco], "t2");
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start, runs[0].end), (0, 2));
        assert!(runs[0].decorator.is_some());

        // Unrelated nodes are untouched.
        let runs = split_text_by_decorators("Other", &[&deco], "t3");
        assert_eq!(runs.len(), 1);
        assert!(runs[0].decorators.is_empty());
    }

    #[test]
    fn test_matching_rules() {
        let node = inline("t1", 0, 2);
        assert!(node.matches_sid("t1"));
        assert!(!node.matches_sid("t2"));
        assert!(!node.matches_sid(""));

        let decos = vec![node];
        assert_eq!(decorators_for_node("t1", &decos).len(), 1);
        assert!(decorators_for_node("", &decos).is_empty());

        let mut disabled = decos[0].clone();
        disabled.enabled = false;
        assert!(decorators_for_node("t1", &[disabled]).is_empty());
    }

    #[test]
    fn test_categorize_partitions() {
        let mk = |category| {
            Decorator::new(
                "d",
                "x",
                category,
                DecoratorTarget::Node {
                    sid: SmolStr::new("t1"),
                    start: None,
                    end: None,
                },
            )
        };
        let decos = [
            mk(DecoratorCategory::Block),
            mk(DecoratorCategory::Inline),
            mk(DecoratorCategory::Layer),
            mk(DecoratorCategory::Block),
        ];
        let cats = categorize(decos.iter());
        assert_eq!(cats.block.len(), 2);
        assert_eq!(cats.inline.len(), 1);
        assert_eq!(cats.layer.len(), 1);
    }

    #[test]
    fn test_decorators_from_model() {
        let raw = ModelValue::List(vec![
            ModelValue::map([
                ("sid", ModelValue::str("d1")),
                ("stype", ModelValue::str("highlight")),
                ("category", ModelValue::str("inline")),
                (
                    "target",
                    ModelValue::map([
                        ("sid", ModelValue::str("t1")),
                        ("start", ModelValue::Number(0.0)),
                        ("end", ModelValue::Number(5.0)),
                    ]),
                ),
            ]),
            // Unknown category: dropped with a diagnostic.
            ModelValue::map([
                ("sid", ModelValue::str("d2")),
                ("stype", ModelValue::str("x")),
                ("category", ModelValue::str("banner")),
                ("target", ModelValue::map([("sid", ModelValue::str("t1"))])),
            ]),
            // Disabled, but still parsed.
            ModelValue::map([
                ("sid", ModelValue::str("d3")),
                ("stype", ModelValue::str("x")),
                ("category", ModelValue::str("block")),
                ("target", ModelValue::map([("sid", ModelValue::str("p1"))])),
                ("enabled", ModelValue::Bool(false)),
            ]),
        ]);

        let decos = decorators_from_model(&raw);
        assert_eq!(decos.len(), 2);
        assert_eq!(decos[0].sid, "d1");
        assert_eq!(decos[0].category, DecoratorCategory::Inline);
        assert!(!decos[1].enabled);
    }

    #[test]
    fn test_split_source_sid_goes_to_first_run_only() {
        let mut registry = Registry::new();
        registry.register(
            "highlight",
            crate::template::Template::Element(crate::template::ElementTemplate::new("mark")),
        );
        let builder = VNodeBuilder::new(&registry);
        let processor = DecoratorProcessor::new(&registry);

        let mut span = VNode::element("span").with_sid("t1");
        span.children.push(VNode::text("Hello World").with_sid("t1"));
        let deco = inline("t1", 2, 4);
        processor.process_tree(
            &builder,
            &mut span,
            std::slice::from_ref(&deco),
            &BuildContext::new(),
        );

        // Runs: plain [0,2), wrapped [2,4), plain [4,11). Only the first
        // keeps the source leaf's sid; duplicating it across runs would
        // put the same sid on several siblings.
        let sids: Vec<Option<&str>> = span
            .children
            .iter()
            .filter(|c| c.is_text())
            .map(|c| c.sid.as_deref())
            .collect();
        assert_eq!(sids, vec![Some("t1"), None]);

        let wrapper = span
            .children
            .iter()
            .find(|c| matches!(c.kind, crate::vnode::VNodeKind::Decorator))
            .unwrap();
        assert_eq!(wrapper.children[0].sid, None);
    }

    #[test]
    fn test_insert_positions() {
        let mk_deco = |tag: &str| VNode::element(tag).with_attr(ATTR_DECO_SID, "d");

        let mut vnode = VNode::element("div")
            .with_child(VNode::element("span").with_sid("a"))
            .with_child(VNode::element("span").with_sid("b"));

        insert_decorators_into_children(
            &mut vnode,
            vec![
                (mk_deco("before"), DecoratorPosition::Before),
                (mk_deco("after"), DecoratorPosition::After),
                (mk_deco("start"), DecoratorPosition::InsideStart),
                (mk_deco("end"), DecoratorPosition::InsideEnd),
                (mk_deco("overlay"), DecoratorPosition::Overlay),
            ],
        );

        let tags: Vec<&str> = vnode
            .children
            .iter()
            .map(|c| match &c.kind {
                crate::vnode::VNodeKind::Element { tag } => tag.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(tags, ["before", "span", "span", "after", "overlay"]);

        // inside-start nested into the first element child, inside-end
        // into the last (the "overlay" append happened afterwards).
        assert_eq!(vnode.children[1].children.len(), 1);
        assert_eq!(vnode.children[2].children.len(), 1);
        // Sibling decorators inserted earlier in the batch are never
        // nesting anchors.
        assert!(vnode.children[0].children.is_empty());
        assert!(vnode.children[3].children.is_empty());
    }

    #[test]
    fn test_inside_position_falls_back_for_text_children() {
        let mk_deco = || VNode::element("deco").with_attr(ATTR_DECO_SID, "d");
        let mut vnode = VNode::element("div").with_child(VNode::text("plain"));

        insert_decorators_into_children(
            &mut vnode,
            vec![
                (mk_deco(), DecoratorPosition::InsideStart),
                (mk_deco(), DecoratorPosition::InsideEnd),
            ],
        );

        // Both fell back to sibling insertion around the text node.
        assert_eq!(vnode.children.len(), 3);
        assert!(vnode.children[0].is_element());
        assert!(vnode.children[1].is_text());
        assert!(vnode.children[2].is_element());
    }
}
