//! Join trees: logical (structure only) or physical (annotated with operators
//! and cardinality bounds).
//!
//! Trees are plain values. Every combinator returns a new tree; nodes are
//! never shared between trees, so cloning is the only way to reuse them.

use std::collections::BTreeSet;
use std::fmt;

use planhint_core::table::{TableReference, TableSet};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::physops::{
    JoinOperatorAssignment, PhysicalOperator, PhysicalOperatorAssignment, ScanOperatorAssignment,
};
use crate::qep::QueryExecutionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAnnotation {
    #[serde(default)]
    pub operator: Option<PhysicalOperator>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
    /// Which child of a join is the inner (build) input, if known.
    #[serde(default)]
    pub inner: Option<ChildSide>,
}

impl NodeAnnotation {
    /// The cardinality bound, with NaN treated as missing.
    pub fn bound(&self) -> Option<f64> {
        self.upper_bound.filter(|b| !b.is_nan())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTableNode {
    pub table: TableReference,
    #[serde(default)]
    pub annotation: NodeAnnotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateJoinNode {
    pub left: Box<JoinTreeNode>,
    pub right: Box<JoinTreeNode>,
    #[serde(default)]
    pub annotation: NodeAnnotation,
    tables: TableSet,
}

impl IntermediateJoinNode {
    /// Join two disjoint subtrees; `left` stays left.
    pub fn new(left: JoinTreeNode, right: JoinTreeNode) -> Result<Self> {
        let lt = left.tables();
        let rt = right.tables();
        if !lt.is_disjoint(&rt) {
            return Err(PlanError::OverlappingTrees(format!("{} and {}", lt, rt)));
        }
        Ok(Self {
            tables: lt.union(&rt),
            left: Box::new(left),
            right: Box::new(right),
            annotation: NodeAnnotation::default(),
        })
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn child(&self, side: ChildSide) -> &JoinTreeNode {
        match side {
            ChildSide::Left => &self.left,
            ChildSide::Right => &self.right,
        }
    }

    /// The child recorded as inner, if the direction is known.
    pub fn inner_child(&self) -> Option<&JoinTreeNode> {
        self.annotation.inner.map(|side| self.child(side))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinTreeNode {
    Base(BaseTableNode),
    Join(IntermediateJoinNode),
}

impl JoinTreeNode {
    pub fn base(table: TableReference) -> Self {
        JoinTreeNode::Base(BaseTableNode {
            table,
            annotation: NodeAnnotation::default(),
        })
    }

    pub fn tables(&self) -> TableSet {
        match self {
            JoinTreeNode::Base(b) => TableSet::single(b.table.clone()),
            JoinTreeNode::Join(j) => j.tables.clone(),
        }
    }

    pub fn annotation(&self) -> &NodeAnnotation {
        match self {
            JoinTreeNode::Base(b) => &b.annotation,
            JoinTreeNode::Join(j) => &j.annotation,
        }
    }

    fn annotation_mut(&mut self) -> &mut NodeAnnotation {
        match self {
            JoinTreeNode::Base(b) => &mut b.annotation,
            JoinTreeNode::Join(j) => &mut j.annotation,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, JoinTreeNode::Join(_))
    }

    /// Joins of this subtree in execution order: the right subtree of every
    /// join is expanded before the join itself. Left subtrees that are joins
    /// are left alone.
    pub fn join_sequence(&self) -> Vec<&IntermediateJoinNode> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        let mut cur = self;
        while let JoinTreeNode::Join(j) = cur {
            stack.push(j);
            cur = &j.right;
        }
        while let Some(j) = stack.pop() {
            out.push(j);
        }
        out
    }

    fn find_mut(&mut self, tables: &TableSet) -> Option<&mut JoinTreeNode> {
        if &self.tables() == tables {
            return Some(self);
        }
        match self {
            JoinTreeNode::Base(_) => None,
            JoinTreeNode::Join(j) => {
                if tables.is_subset(&j.left.tables()) {
                    j.left.find_mut(tables)
                } else {
                    j.right.find_mut(tables)
                }
            }
        }
    }

    fn clear_physical(&mut self) {
        let annotation = self.annotation_mut();
        annotation.operator = None;
        annotation.inner = None;
        if let JoinTreeNode::Join(j) = self {
            j.left.clear_physical();
            j.right.clear_physical();
        }
    }

    fn collect_subtrees(&self, acc: &mut BTreeSet<TableSet>) {
        if let JoinTreeNode::Join(j) = self {
            acc.insert(j.tables.clone());
            j.left.collect_subtrees(acc);
            j.right.collect_subtrees(acc);
        }
    }

    fn collect_operators(&self, acc: &mut PhysicalOperatorAssignment) -> Result<()> {
        match self {
            JoinTreeNode::Base(b) => {
                if let Some(op) = b.annotation.operator.and_then(|op| op.as_scan()) {
                    acc.set_scan_operator(ScanOperatorAssignment {
                        operator: op,
                        table: b.table.clone(),
                    });
                }
                Ok(())
            }
            JoinTreeNode::Join(j) => {
                if let Some(op) = j.annotation.operator.and_then(|op| op.as_join()) {
                    acc.set_join_operator(JoinOperatorAssignment {
                        operator: op,
                        tables: j.tables.clone(),
                        inner: j.inner_child().map(|c| c.tables()),
                    })?;
                }
                j.left.collect_operators(acc)?;
                j.right.collect_operators(acc)
            }
        }
    }

    fn from_plan(plan: &QueryExecutionPlan) -> Result<Self> {
        let plan = plan.unwrap_passthrough();
        let mut annotation = NodeAnnotation {
            operator: plan.physical_operator,
            upper_bound: Some(plan.cardinality()),
            inner: None,
        };
        if plan.is_scan {
            let table = plan.table.clone().ok_or_else(|| {
                PlanError::MalformedPlan(format!("scan node '{}' has no table", plan.node_type))
            })?;
            return Ok(JoinTreeNode::Base(BaseTableNode { table, annotation }));
        }
        if !plan.is_join {
            return Err(PlanError::MalformedPlan(format!(
                "node '{}' is neither a scan nor a join and has {} children",
                plan.node_type,
                plan.children.len()
            )));
        }
        let (outer, inner) = match (plan.outer_child(), plan.inner_child()) {
            (Some(o), Some(i)) => (o, i),
            _ => {
                return Err(PlanError::MalformedPlan(format!(
                    "join node '{}' needs two children",
                    plan.node_type
                )))
            }
        };
        let mut join = IntermediateJoinNode::new(Self::from_plan(outer)?, Self::from_plan(inner)?)?;
        annotation.inner = Some(ChildSide::Right);
        join.annotation = annotation;
        Ok(JoinTreeNode::Join(join))
    }
}

impl fmt::Display for JoinTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinTreeNode::Base(b) => write!(f, "{}", b.table.identifier()),
            JoinTreeNode::Join(j) => write!(f, "({} ⋈ {})", j.left, j.right),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinTree {
    root: Option<JoinTreeNode>,
}

impl JoinTree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_base_table(table: TableReference) -> Self {
        Self {
            root: Some(JoinTreeNode::base(table)),
        }
    }

    /// Join two trees. An empty side is the identity.
    pub fn joining(left: JoinTree, right: JoinTree) -> Result<Self> {
        let root = match (left.root, right.root) {
            (None, r) => r,
            (l, None) => l,
            (Some(l), Some(r)) => Some(JoinTreeNode::Join(IntermediateJoinNode::new(l, r)?)),
        };
        Ok(Self { root })
    }

    /// Left-deep fold over `trees`.
    pub fn cross_product_of<I>(trees: I) -> Result<Self>
    where
        I: IntoIterator<Item = JoinTree>,
    {
        trees
            .into_iter()
            .try_fold(JoinTree::empty(), JoinTree::joining)
    }

    /// Build a physical tree from an execution plan. Outer inputs become
    /// left children, inner inputs right children.
    pub fn load_from_query_plan(plan: &QueryExecutionPlan) -> Result<Self> {
        Ok(Self {
            root: Some(JoinTreeNode::from_plan(plan)?),
        })
    }

    pub fn root(&self) -> Option<&JoinTreeNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn tables(&self) -> TableSet {
        self.root
            .as_ref()
            .map(JoinTreeNode::tables)
            .unwrap_or_default()
    }

    pub fn join_sequence(&self) -> Vec<&IntermediateJoinNode> {
        self.root
            .as_ref()
            .map(JoinTreeNode::join_sequence)
            .unwrap_or_default()
    }

    /// Table sets of all intermediate nodes.
    pub fn subtrees(&self) -> BTreeSet<TableSet> {
        let mut acc = BTreeSet::new();
        if let Some(root) = &self.root {
            root.collect_subtrees(&mut acc);
        }
        acc
    }

    /// The operator assignment implied by the annotations of this tree.
    /// Fails if a join's recorded inner child no longer lies inside it.
    pub fn physical_operators(&self) -> Result<PhysicalOperatorAssignment> {
        let mut acc = PhysicalOperatorAssignment::new();
        if let Some(root) = &self.root {
            root.collect_operators(&mut acc)?;
        }
        Ok(acc)
    }

    /// Drop operator choices and join directions, keeping structure and bounds.
    pub fn into_logical(mut self) -> Self {
        if let Some(root) = self.root.as_mut() {
            root.clear_physical();
        }
        self
    }

    /// Attach a cardinality bound to the node joining exactly `tables`.
    pub fn with_upper_bound(mut self, tables: &TableSet, bound: f64) -> Result<Self> {
        self.node_mut(tables)?.annotation_mut().upper_bound = Some(bound);
        Ok(self)
    }

    pub fn with_operator(mut self, tables: &TableSet, operator: impl Into<PhysicalOperator>) -> Result<Self> {
        self.node_mut(tables)?.annotation_mut().operator = Some(operator.into());
        Ok(self)
    }

    fn node_mut(&mut self, tables: &TableSet) -> Result<&mut JoinTreeNode> {
        self.root
            .as_mut()
            .and_then(|root| root.find_mut(tables))
            .ok_or_else(|| PlanError::MalformedPlan(format!("no node of the join tree covers {}", tables)))
    }
}

impl fmt::Display for JoinTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{}", root),
            None => write!(f, "<empty>"),
        }
    }
}
