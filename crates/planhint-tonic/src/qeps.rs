//! Query execution plan synopsis (QEP-S).
//!
//! A path from the root spells a join order: the edge taken for a join is the
//! identifier of its outer input (a base table, optionally together with its
//! filter, or the table set of a nested join). The node reached through that
//! edge holds the decayed costs of the operators observed for the join.
//! Nested joins on the outer side are subqueries; their own join order lives
//! below the node's `subquery_root`.
//!
//! Recommendations for a join are read from the same child node whose costs
//! `integrate_costs` updates for that join, not from the node the walk is
//! currently at.

use std::collections::BTreeMap;
use std::fmt;

use planhint_core::config::TonicConfig;
use planhint_core::query::{FilterPredicate, SqlQuery};
use planhint_core::table::{TableReference, TableSet};
use planhint_planner::{
    IntermediateJoinNode, JoinOperator, JoinOperatorAssignment, JoinTree, JoinTreeNode,
    PhysicalOperatorAssignment, QueryExecutionPlan,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TonicError};

/// Edge label of the synopsis: tables plus an optional filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QepsIdentifier {
    tables: TableSet,
    filter: Option<FilterPredicate>,
}

impl QepsIdentifier {
    pub fn new(tables: TableSet, filter: Option<FilterPredicate>) -> Self {
        Self { tables, filter }
    }

    pub fn for_table(table: TableReference) -> Self {
        Self::new(TableSet::single(table), None)
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// The table, if this identifier names exactly one.
    pub fn table(&self) -> Option<&TableReference> {
        self.tables.as_single()
    }

    pub fn filter(&self) -> Option<&FilterPredicate> {
        self.filter.as_ref()
    }
}

impl fmt::Display for QepsIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table() {
            Some(table) => write!(f, "{}", table.identifier())?,
            None => write!(f, "#{}", self.tables.join_identifiers("#"))?,
        }
        if let Some(filter) = &self.filter {
            write!(f, "[{}]", filter)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct QepsNode {
    filter_aware: bool,
    gamma: f64,
    /// Insertion ordered; the first inserted operator wins cost ties.
    operator_costs: Vec<(JoinOperator, f64)>,
    child_nodes: BTreeMap<QepsIdentifier, QepsNode>,
    subquery_root: Option<Box<QepsNode>>,
}

impl QepsNode {
    /// `gamma` is taken as is; `QueryExecutionPlanSynopsis::create` validates it.
    pub fn new(filter_aware: bool, gamma: f64) -> Self {
        Self {
            filter_aware,
            gamma,
            operator_costs: Vec::new(),
            child_nodes: BTreeMap::new(),
            subquery_root: None,
        }
    }

    fn spawn(&self) -> Self {
        Self::new(self.filter_aware, self.gamma)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn filter_aware(&self) -> bool {
        self.filter_aware
    }

    pub fn operator_costs(&self) -> &[(JoinOperator, f64)] {
        &self.operator_costs
    }

    pub fn cost_of(&self, operator: JoinOperator) -> Option<f64> {
        self.operator_costs
            .iter()
            .find(|(op, _)| *op == operator)
            .map(|(_, cost)| *cost)
    }

    pub fn is_empty(&self) -> bool {
        self.operator_costs.is_empty() && self.child_nodes.is_empty()
    }

    /// `cost_new = cost + gamma * cost_old`, with a missing entry counting as 0.
    pub fn update_costs(&mut self, operator: JoinOperator, cost: f64) {
        let gamma = self.gamma;
        match self.operator_costs.iter_mut().find(|(op, _)| *op == operator) {
            Some((_, current)) => *current = cost + gamma * *current,
            None => self.operator_costs.push((operator, cost)),
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(%operator, cost, updated = self.cost_of(operator), "QEP-S cost update");
    }

    /// The cheapest operator, but only once there is something to compare.
    pub fn current_recommendation(&self) -> Option<JoinOperator> {
        if self.operator_costs.len() < 2 {
            return None;
        }
        let mut best: Option<(JoinOperator, f64)> = None;
        for &(op, cost) in &self.operator_costs {
            match best {
                Some((_, best_cost)) if cost >= best_cost => {}
                _ => best = Some((op, cost)),
            }
        }
        best.map(|(op, _)| op)
    }

    /// Get-or-insert the child reached through `identifier`.
    pub fn child_node(&mut self, identifier: QepsIdentifier) -> &mut QepsNode {
        let fresh = self.spawn();
        self.child_nodes.entry(identifier).or_insert(fresh)
    }

    pub fn child(&self, identifier: &QepsIdentifier) -> Option<&QepsNode> {
        self.child_nodes.get(identifier)
    }

    pub fn children(&self) -> impl Iterator<Item = (&QepsIdentifier, &QepsNode)> {
        self.child_nodes.iter()
    }

    /// Root of the nested synopsis for the subquery this node stands for.
    /// Created on first access.
    pub fn subquery_root(&mut self) -> &mut QepsNode {
        let fresh = self.spawn();
        self.subquery_root.get_or_insert_with(|| Box::new(fresh))
    }

    pub fn subquery(&self) -> Option<&QepsNode> {
        self.subquery_root.as_deref()
    }

    fn identifier_for(&self, query: &SqlQuery, table: &TableReference) -> QepsIdentifier {
        let filter = if self.filter_aware {
            query.filters_for(table).cloned()
        } else {
            None
        };
        QepsIdentifier::new(TableSet::single(table.clone()), filter)
    }

    /// Write recommendations for `join_sequence` into `assignment`.
    ///
    /// The sequence is the linearization of a join tree (see
    /// `JoinTree::join_sequence`). Walks stop where the synopsis has no
    /// matching child, since nothing was observed below that point.
    pub fn recommend_operators(
        &self,
        query: &SqlQuery,
        join_sequence: &[&IntermediateJoinNode],
        assignment: &mut PhysicalOperatorAssignment,
    ) -> Result<()> {
        let (join, remaining) = match join_sequence.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let (identifier, subquery) = match join.left.as_ref() {
            JoinTreeNode::Base(base) => (self.identifier_for(query, &base.table), None),
            JoinTreeNode::Join(nested) => (QepsIdentifier::new(nested.tables().clone(), None), Some(join.left.as_ref())),
        };
        let child = match self.child(&identifier) {
            Some(child) => child,
            None => return Ok(()),
        };

        if let Some(operator) = child.current_recommendation() {
            #[cfg(feature = "tracing")]
            tracing::debug!(tables = %join.tables(), %operator, "QEP-S recommendation");
            let inner = assignment
                .get_join_operator(join.tables())
                .and_then(|existing| existing.inner.clone());
            assignment.set_join_operator(JoinOperatorAssignment {
                operator,
                tables: join.tables().clone(),
                inner,
            })?;
        }

        if let (Some(subtree), Some(sub_root)) = (subquery, child.subquery()) {
            sub_root.recommend_operators(query, &subtree.join_sequence(), assignment)?;
        }
        child.recommend_operators(query, remaining, assignment)
    }

    /// Fold the observed costs of `plan_sequence` into the synopsis.
    ///
    /// The sequence is the linearization of an execution plan (see
    /// `QueryExecutionPlan::join_sequence`). Every entry must be a join with
    /// a join operator and a cost, whose outer input is a scan of a table or
    /// another join. The whole sequence, nested outer joins included, is
    /// checked before the first cost is recorded, so a rejected plan leaves
    /// the synopsis untouched.
    pub fn integrate_costs(&mut self, query: &SqlQuery, plan_sequence: &[&QueryExecutionPlan]) -> Result<()> {
        validate_sequence(plan_sequence)?;
        self.integrate_checked(query, plan_sequence)
    }

    fn integrate_checked(&mut self, query: &SqlQuery, plan_sequence: &[&QueryExecutionPlan]) -> Result<()> {
        let (join, remaining) = match plan_sequence.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let (operator, outer) = checked_join(join)?;
        match &outer.table {
            Some(table) if outer.is_scan => {
                let identifier = self.identifier_for(query, table);
                let child = self.child_node(identifier);
                child.update_costs(operator, join.cost);
                child.integrate_checked(query, remaining)
            }
            _ => {
                let child = self.child_node(QepsIdentifier::new(outer.tables(), None));
                child.update_costs(operator, join.cost);
                let nested = outer.join_sequence()?;
                child.subquery_root().integrate_checked(query, &nested)?;
                child.integrate_checked(query, remaining)
            }
        }
    }

    /// Indented dump of this node and everything below it.
    pub fn inspect(&self) -> String {
        let mut lines = vec!["[ROOT]".to_string()];
        self.inspect_children(2, &mut lines);
        lines.join("\n")
    }

    fn inspect_node(&self, indent: usize, lines: &mut Vec<String>) {
        let prefix = " ".repeat(indent);
        let costs: Vec<String> = self
            .operator_costs
            .iter()
            .map(|(op, cost)| format!("{}={}", op, cost))
            .collect();
        lines.push(format!("{}[{}]", prefix, costs.join(", ")));
        if let Some(sub) = self.subquery().filter(|s| !s.is_empty()) {
            lines.push(format!("{}[SUBQUERY]", prefix));
            sub.inspect_children(indent + 2, lines);
        }
        self.inspect_children(indent, lines);
    }

    fn inspect_children(&self, indent: usize, lines: &mut Vec<String>) {
        let prefix = " ".repeat(indent);
        for (i, (identifier, child)) in self.child_nodes.iter().enumerate() {
            if i > 0 {
                lines.push(format!("{}-----", prefix));
            }
            lines.push(format!("{}QEP-S node {}", prefix, identifier));
            child.inspect_node(indent + 2, lines);
        }
    }
}

/// Operator and (pass-through free) outer input of a join entry.
fn checked_join(join: &QueryExecutionPlan) -> Result<(JoinOperator, &QueryExecutionPlan)> {
    if !join.is_join {
        return Err(TonicError::MalformedPlanNode(format!(
            "'{}' is not a join node",
            join.node_type
        )));
    }
    let operator = join
        .physical_operator
        .and_then(|op| op.as_join())
        .ok_or_else(|| {
            TonicError::MalformedPlanNode(format!("join node '{}' carries no join operator", join.node_type))
        })?;
    if join.cost.is_nan() {
        return Err(TonicError::MalformedPlanNode(format!(
            "join node '{}' carries no cost",
            join.node_type
        )));
    }
    let outer = join
        .outer_child()
        .ok_or_else(|| TonicError::MalformedPlanNode(format!("join node '{}' has no outer input", join.node_type)))?
        .unwrap_passthrough();
    if outer.is_scan {
        if outer.table.is_none() {
            return Err(TonicError::MalformedPlanNode(format!(
                "scan node '{}' has no table",
                outer.node_type
            )));
        }
    } else if !outer.is_join {
        return Err(TonicError::MalformedPlanNode(format!(
            "outer input '{}' of join '{}' is neither a scan nor a join",
            outer.node_type, join.node_type
        )));
    }
    Ok((operator, outer))
}

fn validate_sequence(plan_sequence: &[&QueryExecutionPlan]) -> Result<()> {
    for join in plan_sequence {
        let (_, outer) = checked_join(join)?;
        if outer.is_join {
            validate_sequence(&outer.join_sequence()?)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct QueryExecutionPlanSynopsis {
    root: QepsNode,
}

impl QueryExecutionPlanSynopsis {
    /// Fails unless `gamma` lies in (0, 1].
    pub fn create(filter_aware: bool, gamma: f64) -> Result<Self> {
        Self::from_config(&TonicConfig { gamma, filter_aware })
    }

    pub fn from_config(config: &TonicConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: QepsNode::new(config.filter_aware, config.gamma),
        })
    }

    pub fn root(&self) -> &QepsNode {
        &self.root
    }

    /// Recommendations for `join_order`, seeded with the operators the tree
    /// already carries. An empty tree returns the seed.
    pub fn recommend_operators(&self, query: &SqlQuery, join_order: &JoinTree) -> Result<PhysicalOperatorAssignment> {
        let mut assignment = join_order.physical_operators()?;
        self.root
            .recommend_operators(query, &join_order.join_sequence(), &mut assignment)?;
        Ok(assignment)
    }

    pub fn integrate_costs(&mut self, query: &SqlQuery, plan: &QueryExecutionPlan) -> Result<()> {
        let sequence = plan.join_sequence()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(joins = sequence.len(), "integrating plan costs into QEP-S");
        self.root.integrate_costs(query, &sequence)
    }

    pub fn inspect(&self) -> String {
        self.root.inspect()
    }
}
