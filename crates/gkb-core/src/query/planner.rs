//! Lowering of parsed queries onto the relational projection.
//!
//! Each pattern chain becomes aliases over `assets` joined through
//! `relations`; variable-length edges expand into UNION arms with
//! materialized hops. The output is a single parameterized statement; user
//! input only ever reaches the database as bound parameters.

use std::collections::HashMap;

use super::ast::{
    Aggregate, BinaryOp, Direction, EdgePattern, Expr, Literal, NodePattern, Pattern, Query,
};
use crate::error::QueryError;

/// Hop cap applied to unbounded variable-length ranges.
const MAX_HOPS: u32 = 10;

/// Guard against the cartesian product of variable-length ranges exploding.
const MAX_ARMS: usize = 256;

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlParam {
    fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::String(s) => SqlParam::String(s.clone()),
            Literal::Integer(i) => SqlParam::Int(*i),
            Literal::Float(f) => SqlParam::Float(*f),
            Literal::Boolean(b) => SqlParam::Bool(*b),
            Literal::Null => SqlParam::Null,
        }
    }
}

/// How many result columns a projection occupies and how to decode them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionShape {
    /// One column holding a scalar value.
    Scalar,
    /// Three columns: id, type, value.
    Asset,
    /// Four columns: id, from_id, to_id, type.
    Relation,
}

/// The compiled statement handed to the executor.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub shapes: Vec<ProjectionShape>,
    pub columns: Vec<String>,
}

/// Lowers a parsed query into a single SQL statement.
pub fn plan(query: &Query) -> Result<SqlQuery, QueryError> {
    Planner::new(query)?.lower()
}

/// What a pattern variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarKind {
    Node,
    Edge { var_length: bool },
}

struct Planner<'q> {
    query: &'q Query,
    /// Chains in join order (selectivity-first, lexicographic tiebreak).
    chains: Vec<&'q Pattern>,
    vars: HashMap<String, VarKind>,
}

impl<'q> Planner<'q> {
    fn new(query: &'q Query) -> Result<Self, QueryError> {
        let mut vars: HashMap<String, VarKind> = HashMap::new();
        for pattern in &query.patterns {
            for node in std::iter::once(&pattern.start)
                .chain(pattern.steps.iter().map(|(_, n)| n))
            {
                validate_node_properties(node)?;
                if let Some(var) = &node.variable {
                    match vars.get(var) {
                        None => {
                            vars.insert(var.clone(), VarKind::Node);
                        }
                        Some(VarKind::Node) => {}
                        Some(VarKind::Edge { .. }) => {
                            return Err(QueryError::Plan(format!(
                                "variable {var} names both a node and a relation"
                            )));
                        }
                    }
                }
            }
            for (edge, _) in &pattern.steps {
                if !edge.properties.is_empty() {
                    return Err(QueryError::Plan(
                        "relations do not carry properties".to_string(),
                    ));
                }
                if let Some(var) = &edge.variable {
                    if vars.contains_key(var) {
                        return Err(QueryError::Plan(format!(
                            "relation variable {var} is already bound"
                        )));
                    }
                    vars.insert(
                        var.clone(),
                        VarKind::Edge {
                            var_length: edge.range.is_some(),
                        },
                    );
                }
            }
        }

        let mut chains: Vec<&Pattern> = query.patterns.iter().collect();
        // Most selective chain first; no cost model, so the stable tiebreak
        // is the first variable name.
        chains.sort_by(|a, b| {
            chain_selectivity(b)
                .cmp(&chain_selectivity(a))
                .then_with(|| first_variable(a).cmp(&first_variable(b)))
        });

        Ok(Self {
            query,
            chains,
            vars,
        })
    }

    fn lower(&self) -> Result<SqlQuery, QueryError> {
        let shapes = self.projection_shapes()?;
        let columns: Vec<String> = self
            .query
            .projections
            .iter()
            .map(|p| p.column_name())
            .collect();

        let arms = self.enumerate_arms()?;
        let has_aggregate = self
            .query
            .projections
            .iter()
            .any(|p| p.expr.has_aggregate());

        let mut builder = SqlBuilder::default();
        if has_aggregate {
            self.lower_aggregated(&arms, &mut builder)?;
        } else {
            // UNION between arms dedups identical projected rows, which is
            // the path semantics wanted for variable-length expansion; a
            // single arm keeps row multiplicity untouched.
            for (i, arm) in arms.iter().enumerate() {
                if i > 0 {
                    builder.push(" UNION ");
                }
                self.lower_arm_select(arm, &mut builder, SelectMode::Projections)?;
            }
        }

        Ok(SqlQuery {
            sql: builder.sql,
            params: builder.params,
            shapes,
            columns,
        })
    }

    /// Aggregated queries wrap the row arms in a derived table and apply the
    /// aggregates outside, grouped by every non-aggregated projection.
    fn lower_aggregated(&self, arms: &[Arm], builder: &mut SqlBuilder) -> Result<(), QueryError> {
        builder.push("SELECT ");
        let mut group_cols: Vec<String> = Vec::new();
        for (i, projection) in self.query.projections.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            match &projection.expr {
                Expr::Call(agg, arg) => match agg {
                    Aggregate::Count if arg.is_none() => builder.push("COUNT(*)"),
                    // MariaDB widens SUM over integers to DECIMAL; cast so
                    // the cursor decodes a plain numeric.
                    Aggregate::Sum => builder.push(&format!("CAST(SUM(p{i}) AS DOUBLE)")),
                    _ => builder.push(&format!("{}(p{i})", agg.as_sql())),
                },
                Expr::Variable(_) => {
                    builder.push(&format!("p{i}_id, p{i}_type, p{i}_value"));
                    group_cols.push(format!("p{i}_id"));
                    group_cols.push(format!("p{i}_type"));
                    group_cols.push(format!("p{i}_value"));
                }
                _ => {
                    builder.push(&format!("p{i}"));
                    group_cols.push(format!("p{i}"));
                }
            }
        }
        builder.push(" FROM (");
        // UNION ALL inside the derived table: aggregates count matches, so
        // row multiplicity must survive the union.
        for (i, arm) in arms.iter().enumerate() {
            if i > 0 {
                builder.push(" UNION ALL ");
            }
            self.lower_arm_select(arm, builder, SelectMode::AggregateInputs)?;
        }
        builder.push(") AS sub");
        if !group_cols.is_empty() {
            builder.push(" GROUP BY ");
            builder.push(&group_cols.join(", "));
        }
        Ok(())
    }

    fn projection_shapes(&self) -> Result<Vec<ProjectionShape>, QueryError> {
        self.query
            .projections
            .iter()
            .map(|p| match &p.expr {
                Expr::Variable(var) => match self.vars.get(var) {
                    Some(VarKind::Node) => Ok(ProjectionShape::Asset),
                    Some(VarKind::Edge { var_length: false }) => Ok(ProjectionShape::Relation),
                    Some(VarKind::Edge { var_length: true }) => Err(QueryError::Plan(format!(
                        "cannot project variable-length relation {var}"
                    ))),
                    None => Err(QueryError::Plan(format!("unknown variable {var}"))),
                },
                _ => Ok(ProjectionShape::Scalar),
            })
            .collect()
    }

    /// Expands variable-length edges into the cartesian product of hop
    /// choices across all edges of all chains.
    fn enumerate_arms(&self) -> Result<Vec<Arm>, QueryError> {
        let mut edges: Vec<&EdgePattern> = Vec::new();
        for chain in &self.chains {
            for (edge, _) in &chain.steps {
                edges.push(edge);
            }
        }

        let mut choices: Vec<Vec<u32>> = Vec::with_capacity(edges.len());
        for edge in &edges {
            match edge.range {
                None => choices.push(vec![1]),
                Some(range) => {
                    let max = range.max.unwrap_or(MAX_HOPS).min(MAX_HOPS);
                    if range.min > max {
                        return Err(QueryError::Plan(format!(
                            "empty variable-length range *{}..{max}",
                            range.min
                        )));
                    }
                    choices.push((range.min..=max).collect());
                }
            }
        }

        let total: usize = choices.iter().map(Vec::len).product();
        if total > MAX_ARMS {
            return Err(QueryError::Plan(format!(
                "variable-length expansion produces {total} plan arms (limit {MAX_ARMS})"
            )));
        }

        let mut products = Vec::with_capacity(total);
        let mut hops = vec![0u32; choices.len()];
        enumerate_products(&choices, 0, &mut hops, &mut products);
        Ok(products.into_iter().map(|hops| Arm { hops }).collect())
    }

    /// Emits `SELECT .. FROM .. WHERE ..` for one arm.
    fn lower_arm_select(
        &self,
        arm: &Arm,
        builder: &mut SqlBuilder,
        mode: SelectMode,
    ) -> Result<(), QueryError> {
        let layout = self.layout_arm(arm)?;

        builder.push("SELECT ");
        for (i, projection) in self.query.projections.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            match (&projection.expr, mode) {
                (Expr::Variable(var), _) => match self.vars.get(var.as_str()) {
                    Some(VarKind::Node) => {
                        let alias = layout.node_alias(var)?;
                        builder.push(&format!(
                            "{alias}.id AS p{i}_id, {alias}.type AS p{i}_type, {alias}.value AS p{i}_value"
                        ));
                    }
                    Some(VarKind::Edge { .. }) => {
                        let alias = layout.edge_alias(var)?;
                        builder.push(&format!(
                            "{alias}.id AS p{i}_id, {alias}.from_id AS p{i}_from_id, \
                             {alias}.to_id AS p{i}_to_id, {alias}.type AS p{i}_type"
                        ));
                    }
                    None => return Err(QueryError::Plan(format!("unknown variable {var}"))),
                },
                (Expr::Call(_, arg), SelectMode::AggregateInputs) => {
                    match arg {
                        // count(*): any placeholder row marker will do.
                        None => builder.push("1"),
                        Some(arg) => lower_value_expr(arg, &layout, builder)?,
                    }
                    builder.push(&format!(" AS p{i}"));
                }
                (Expr::Call(..), SelectMode::Projections) => {
                    return Err(QueryError::Plan(
                        "aggregate outside an aggregated statement".to_string(),
                    ));
                }
                (expr, _) => {
                    lower_value_expr(expr, &layout, builder)?;
                    builder.push(&format!(" AS p{i}"));
                }
            }
        }

        builder.push(" FROM ");
        let mut first = true;
        for alias in &layout.node_aliases {
            if !first {
                builder.push(", ");
            }
            builder.push(&format!("assets {alias}"));
            first = false;
        }
        for alias in &layout.relation_aliases {
            builder.push(&format!(", relations {alias}"));
        }

        let mut conditions = layout.conditions.clone();
        if let Some(filter) = &self.query.filter {
            let mut cond = SqlBuilder::default();
            lower_filter_expr(filter, &layout, &mut cond)?;
            conditions.push(cond);
        }
        if !conditions.is_empty() {
            builder.push(" WHERE ");
            for (i, cond) in conditions.into_iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                builder.push("(");
                builder.merge(cond);
                builder.push(")");
            }
        }
        Ok(())
    }

    /// Unifies node occurrences, assigns aliases and collects the join and
    /// filter conditions for one arm.
    fn layout_arm(&self, arm: &Arm) -> Result<ArmLayout, QueryError> {
        let mut slots: Slots = Slots::default();

        // First pass: register every node occurrence so slot order (and so
        // alias numbering) is independent of hop choices.
        let mut occurrence_slots: Vec<Vec<usize>> = Vec::new();
        for chain in &self.chains {
            let mut chain_slots = Vec::new();
            for node in std::iter::once(&chain.start).chain(chain.steps.iter().map(|(_, n)| n)) {
                chain_slots.push(slots.register(node.variable.as_deref(), node));
            }
            occurrence_slots.push(chain_slots);
        }

        // Second pass: walk edges, materializing hops; zero-length edges
        // unify their endpoints.
        let mut edge_jobs: Vec<EdgeJob> = Vec::new();
        let mut edge_counter = 0usize;
        for (chain_idx, chain) in self.chains.iter().enumerate() {
            for (step_idx, (edge, _)) in chain.steps.iter().enumerate() {
                let hops = arm.hops[edge_counter];
                edge_counter += 1;
                let from_slot = occurrence_slots[chain_idx][step_idx];
                let to_slot = occurrence_slots[chain_idx][step_idx + 1];
                if hops == 0 {
                    slots.union(from_slot, to_slot);
                } else {
                    edge_jobs.push(EdgeJob {
                        edge,
                        from_slot,
                        to_slot,
                        hops,
                    });
                }
            }
        }

        // Synthetic slots for intermediate hops, then aliases per
        // representative in first-appearance order.
        let mut layout = ArmLayout::default();
        let mut relation_counter = 0usize;
        let mut mids_per_job: Vec<Vec<usize>> = Vec::with_capacity(edge_jobs.len());
        for job in &edge_jobs {
            let mut mids = Vec::new();
            for _ in 1..job.hops {
                mids.push(slots.synthetic());
            }
            mids_per_job.push(mids);
        }

        layout.assign_aliases(&slots);

        // Join predicates and per-hop relation aliases.
        for (job, mids) in edge_jobs.iter().zip(&mids_per_job) {
            let edge = job.edge;
            let mut prev = job.from_slot;
            let path: Vec<usize> = mids.iter().copied().chain([job.to_slot]).collect();
            for (hop_idx, next) in path.iter().enumerate() {
                let rel_alias = format!("r{relation_counter}");
                relation_counter += 1;
                layout.relation_aliases.push(rel_alias.clone());
                if hop_idx == 0 && edge.range.is_none() {
                    if let Some(var) = &edge.variable {
                        layout.edge_aliases.insert(var.clone(), rel_alias.clone());
                    }
                }
                let from = layout.slot_alias(&slots, prev);
                let to = layout.slot_alias(&slots, *next);
                let mut cond = SqlBuilder::default();
                match edge.direction {
                    Direction::Outgoing => cond.push(&format!(
                        "{rel_alias}.from_id = {from}.id AND {rel_alias}.to_id = {to}.id"
                    )),
                    Direction::Incoming => cond.push(&format!(
                        "{rel_alias}.from_id = {to}.id AND {rel_alias}.to_id = {from}.id"
                    )),
                    Direction::Undirected => cond.push(&format!(
                        "(({rel_alias}.from_id = {from}.id AND {rel_alias}.to_id = {to}.id) \
                         OR ({rel_alias}.from_id = {to}.id AND {rel_alias}.to_id = {from}.id))"
                    )),
                }
                layout.conditions.push(cond);
                if !edge.types.is_empty() {
                    let mut cond = SqlBuilder::default();
                    cond.push(&format!("{rel_alias}.type IN ("));
                    for (i, t) in edge.types.iter().enumerate() {
                        if i > 0 {
                            cond.push(", ");
                        }
                        cond.param(SqlParam::String(t.clone()));
                    }
                    cond.push(")");
                    layout.conditions.push(cond);
                }
                prev = *next;
            }
        }

        // Node filters, merged per representative.
        for slot_idx in 0..slots.slots.len() {
            if slots.find(slot_idx) != slot_idx {
                continue;
            }
            let alias = layout.slot_alias(&slots, slot_idx);
            for member in slots.members(slot_idx) {
                let node = match slots.slots[member].node {
                    Some(node) => node,
                    None => continue,
                };
                if !node.types.is_empty() {
                    let mut cond = SqlBuilder::default();
                    cond.push(&format!("{alias}.type IN ("));
                    for (i, t) in node.types.iter().enumerate() {
                        if i > 0 {
                            cond.push(", ");
                        }
                        cond.param(SqlParam::String(t.clone()));
                    }
                    cond.push(")");
                    layout.conditions.push(cond);
                }
                for (_, value) in &node.properties {
                    let mut cond = SqlBuilder::default();
                    cond.push(&format!("{alias}.value = "));
                    cond.param(SqlParam::from_literal(value));
                    layout.conditions.push(cond);
                }
            }
        }

        // Variable lookup tables for expressions.
        for (var, slot_idx) in &slots.by_var {
            let alias = layout.slot_alias(&slots, *slot_idx);
            layout.node_by_var.insert(var.clone(), alias);
        }
        Ok(layout)
    }
}

#[derive(Debug, Clone, Copy)]
enum SelectMode {
    /// Select the projections as the final row values.
    Projections,
    /// Select the raw inputs aggregates are computed from.
    AggregateInputs,
}

struct EdgeJob<'q> {
    edge: &'q EdgePattern,
    from_slot: usize,
    to_slot: usize,
    hops: u32,
}

/// One UNION arm: a fixed hop count per edge, in chain order.
struct Arm {
    hops: Vec<u32>,
}

/// Union-find over node occurrences.
#[derive(Default)]
struct Slots<'q> {
    slots: Vec<Slot<'q>>,
    parent: Vec<usize>,
    by_var: HashMap<String, usize>,
}

struct Slot<'q> {
    node: Option<&'q NodePattern>,
}

impl<'q> Slots<'q> {
    fn register(&mut self, var: Option<&str>, node: &'q NodePattern) -> usize {
        if let Some(var) = var {
            if let Some(&existing) = self.by_var.get(var) {
                // Later occurrences of the same variable contribute their
                // filters through an extra slot unioned with the first.
                let idx = self.push(Some(node));
                self.union(existing, idx);
                return existing;
            }
        }
        let idx = self.push(Some(node));
        if let Some(var) = var {
            self.by_var.insert(var.to_string(), idx);
        }
        idx
    }

    fn synthetic(&mut self) -> usize {
        self.push(None)
    }

    fn push(&mut self, node: Option<&'q NodePattern>) -> usize {
        let idx = self.slots.len();
        self.slots.push(Slot { node });
        self.parent.push(idx);
        idx
    }

    fn find(&self, mut idx: usize) -> usize {
        while self.parent[idx] != idx {
            idx = self.parent[idx];
        }
        idx
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so alias numbering follows first appearance.
            let (keep, fold) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[fold] = keep;
        }
    }

    fn members(&self, representative: usize) -> Vec<usize> {
        (0..self.slots.len())
            .filter(|&i| self.find(i) == representative)
            .collect()
    }
}

#[derive(Default)]
struct ArmLayout {
    /// Aliases of slot representatives, in first-appearance order.
    node_aliases: Vec<String>,
    alias_by_representative: HashMap<usize, String>,
    relation_aliases: Vec<String>,
    edge_aliases: HashMap<String, String>,
    node_by_var: HashMap<String, String>,
    conditions: Vec<SqlBuilder>,
}

impl ArmLayout {
    fn assign_aliases(&mut self, slots: &Slots<'_>) {
        for idx in 0..slots.slots.len() {
            let representative = slots.find(idx);
            if representative == idx {
                let alias = format!("a{}", self.node_aliases.len());
                self.node_aliases.push(alias.clone());
                self.alias_by_representative.insert(idx, alias);
            }
        }
    }

    fn slot_alias(&self, slots: &Slots<'_>, idx: usize) -> String {
        self.alias_by_representative[&slots.find(idx)].clone()
    }

    fn node_alias(&self, var: &str) -> Result<String, QueryError> {
        self.node_by_var
            .get(var)
            .cloned()
            .ok_or_else(|| QueryError::Plan(format!("unknown variable {var}")))
    }

    fn edge_alias(&self, var: &str) -> Result<String, QueryError> {
        self.edge_aliases
            .get(var)
            .cloned()
            .ok_or_else(|| QueryError::Plan(format!("unknown relation variable {var}")))
    }
}

/// Accumulates SQL text and its bound parameters in lockstep.
#[derive(Default, Debug, Clone)]
struct SqlBuilder {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn param(&mut self, param: SqlParam) {
        self.sql.push('?');
        self.params.push(param);
    }

    fn merge(&mut self, other: SqlBuilder) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }
}

/// Lowers an expression appearing in value position (RETURN or aggregate
/// argument).
fn lower_value_expr(
    expr: &Expr,
    layout: &ArmLayout,
    out: &mut SqlBuilder,
) -> Result<(), QueryError> {
    match expr {
        Expr::Literal(lit) => {
            out.param(SqlParam::from_literal(lit));
            Ok(())
        }
        Expr::Property(var, field) => lower_property(var, field, layout, out),
        Expr::Variable(var) => Err(QueryError::Plan(format!(
            "variable {var} cannot be used as a plain value here"
        ))),
        Expr::Call(..) => Err(QueryError::Plan(
            "aggregates cannot be nested".to_string(),
        )),
        Expr::Binary(..) | Expr::Not(..) | Expr::List(..) => {
            lower_filter_expr(expr, layout, out)
        }
    }
}

/// Lowers a boolean expression appearing in WHERE position.
fn lower_filter_expr(
    expr: &Expr,
    layout: &ArmLayout,
    out: &mut SqlBuilder,
) -> Result<(), QueryError> {
    match expr {
        Expr::Binary(left, BinaryOp::In, right) => {
            lower_value_expr(left, layout, out)?;
            out.push(" IN (");
            match right.as_ref() {
                Expr::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push(", ");
                        }
                        out.param(SqlParam::from_literal(item));
                    }
                }
                other => {
                    return Err(QueryError::Plan(format!(
                        "IN expects a literal list, got {}",
                        other.render()
                    )))
                }
            }
            out.push(")");
            Ok(())
        }
        Expr::Binary(left, op, right) => {
            out.push("(");
            lower_operand(left, layout, out)?;
            out.push(&format!(" {} ", op.as_sql()));
            lower_operand(right, layout, out)?;
            out.push(")");
            Ok(())
        }
        Expr::Not(inner) => {
            out.push("NOT (");
            lower_filter_expr(inner, layout, out)?;
            out.push(")");
            Ok(())
        }
        Expr::Property(var, field) => lower_property(var, field, layout, out),
        Expr::Literal(lit) => {
            out.param(SqlParam::from_literal(lit));
            Ok(())
        }
        Expr::Variable(var) => Err(QueryError::Plan(format!(
            "variable {var} cannot be used as a condition"
        ))),
        Expr::Call(..) => Err(QueryError::Plan(
            "aggregates are only allowed in RETURN".to_string(),
        )),
        Expr::List(_) => Err(QueryError::Plan(
            "a list is only allowed on the right of IN".to_string(),
        )),
    }
}

fn lower_operand(expr: &Expr, layout: &ArmLayout, out: &mut SqlBuilder) -> Result<(), QueryError> {
    match expr {
        Expr::Binary(..) | Expr::Not(..) => lower_filter_expr(expr, layout, out),
        _ => lower_value_expr(expr, layout, out),
    }
}

fn lower_property(
    var: &str,
    field: &str,
    layout: &ArmLayout,
    out: &mut SqlBuilder,
) -> Result<(), QueryError> {
    if let Some(alias) = layout.node_by_var.get(var) {
        return match field {
            "value" | "type" | "id" => {
                out.push(&format!("{alias}.{field}"));
                Ok(())
            }
            _ => Err(QueryError::Plan(format!(
                "unknown asset field {field}; expected value, type or id"
            ))),
        };
    }
    if let Some(alias) = layout.edge_aliases.get(var) {
        return match field {
            "type" | "id" | "from_id" | "to_id" => {
                out.push(&format!("{alias}.{field}"));
                Ok(())
            }
            _ => Err(QueryError::Plan(format!(
                "unknown relation field {field}"
            ))),
        };
    }
    Err(QueryError::Plan(format!("unknown variable {var}")))
}

fn validate_node_properties(node: &NodePattern) -> Result<(), QueryError> {
    for (key, _) in &node.properties {
        if key != "value" {
            return Err(QueryError::Plan(format!(
                "unsupported property {key}; asset identity is value-only"
            )));
        }
    }
    Ok(())
}

/// Selectivity score used for join ordering: a property equality beats a
/// type filter beats an unconstrained node.
fn chain_selectivity(pattern: &Pattern) -> u32 {
    std::iter::once(&pattern.start)
        .chain(pattern.steps.iter().map(|(_, n)| n))
        .map(|node| {
            let mut score = 0;
            if !node.properties.is_empty() {
                score += 2;
            }
            if !node.types.is_empty() {
                score += 1;
            }
            score
        })
        .max()
        .unwrap_or(0)
}

fn first_variable(pattern: &Pattern) -> String {
    std::iter::once(&pattern.start)
        .chain(pattern.steps.iter().map(|(_, n)| n))
        .find_map(|n| n.variable.clone())
        .unwrap_or_default()
}

fn enumerate_products(
    choices: &[Vec<u32>],
    depth: usize,
    current: &mut Vec<u32>,
    out: &mut Vec<Vec<u32>>,
) {
    if depth == choices.len() {
        out.push(current.clone());
        return;
    }
    for &choice in &choices[depth] {
        current[depth] = choice;
        enumerate_products(choices, depth + 1, current, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    fn plan_text(query: &str) -> SqlQuery {
        plan(&parse(query).unwrap()).unwrap()
    }

    #[test]
    fn test_plan_single_typed_node() {
        let q = plan_text("MATCH (n:Server) RETURN n.value");
        assert_eq!(
            q.sql,
            "SELECT a0.value AS p0 FROM assets a0 WHERE (a0.type IN (?))"
        );
        assert_eq!(q.params, vec![SqlParam::String("Server".to_string())]);
        assert_eq!(q.shapes, vec![ProjectionShape::Scalar]);
        assert_eq!(q.columns, vec!["n.value".to_string()]);
    }

    #[test]
    fn test_plan_single_hop_join() {
        let q = plan_text("MATCH (a)-[:Connects]->(b) RETURN a.value, b.value");
        assert_eq!(
            q.sql,
            "SELECT a0.value AS p0, a1.value AS p1 \
             FROM assets a0, assets a1, relations r0 \
             WHERE (r0.from_id = a0.id AND r0.to_id = a1.id) AND (r0.type IN (?))"
        );
        assert_eq!(q.params, vec![SqlParam::String("Connects".to_string())]);
    }

    #[test]
    fn test_plan_incoming_edge_flips_join() {
        let q = plan_text("MATCH (a)<-[:Owns]-(b) RETURN a.value");
        assert!(q
            .sql
            .contains("(r0.from_id = a1.id AND r0.to_id = a0.id)"));
    }

    #[test]
    fn test_plan_undirected_edge_ors_both_directions() {
        let q = plan_text("MATCH (a)-[:Connects]-(b) RETURN a.value");
        assert!(q.sql.contains(
            "((r0.from_id = a0.id AND r0.to_id = a1.id) \
             OR (r0.from_id = a1.id AND r0.to_id = a0.id))"
        ));
    }

    #[test]
    fn test_plan_variable_length_unions_arms() {
        let q = plan_text("MATCH (a:Server)-[:Connects*1..2]->(b:Server) RETURN a.value, b.value");
        let arms: Vec<&str> = q.sql.split(" UNION ").collect();
        assert_eq!(arms.len(), 2);
        assert!(arms[0].contains("relations r0"));
        assert!(!arms[0].contains("relations r1"));
        assert!(arms[1].contains("assets a2"));
        assert!(arms[1].contains("(r0.from_id = a0.id AND r0.to_id = a2.id)"));
        assert!(arms[1].contains("(r1.from_id = a2.id AND r1.to_id = a1.id)"));
        // Per-hop type filter plus two node filters per arm.
        assert_eq!(q.params.len(), 3 + 4);
    }

    #[test]
    fn test_plan_zero_length_equates_endpoints() {
        let q = plan_text("MATCH (a:Server)-[:Connects*0..0]->(b:Server) RETURN a.value");
        assert_eq!(
            q.sql,
            "SELECT a0.value AS p0 FROM assets a0 \
             WHERE (a0.type IN (?)) AND (a0.type IN (?))"
        );
    }

    #[test]
    fn test_plan_shared_variable_unifies_chains() {
        let q = plan_text("MATCH (a)-[:R1]->(n), (n)-[:R2]->(b) RETURN n");
        assert_eq!(
            q.sql,
            "SELECT a1.id AS p0_id, a1.type AS p0_type, a1.value AS p0_value \
             FROM assets a0, assets a1, assets a2, relations r0, relations r1 \
             WHERE (r0.from_id = a0.id AND r0.to_id = a1.id) AND (r0.type IN (?)) \
             AND (r1.from_id = a1.id AND r1.to_id = a2.id) AND (r1.type IN (?))"
        );
        assert_eq!(q.shapes, vec![ProjectionShape::Asset]);
    }

    #[test]
    fn test_plan_count_star() {
        let q = plan_text("MATCH (n:Server) RETURN count(*)");
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM (SELECT 1 AS p0 FROM assets a0 WHERE (a0.type IN (?))) AS sub"
        );
    }

    #[test]
    fn test_plan_mixed_aggregate_groups_by_plain_projections() {
        let q = plan_text("MATCH (n) RETURN n.type, count(*)");
        assert_eq!(
            q.sql,
            "SELECT p0, COUNT(*) FROM (SELECT a0.type AS p0, 1 AS p1 FROM assets a0) AS sub \
             GROUP BY p0"
        );
    }

    #[test]
    fn test_plan_sum_is_cast_to_double() {
        let q = plan_text("MATCH (n) RETURN sum(n.id)");
        assert!(q.sql.starts_with("SELECT CAST(SUM(p0) AS DOUBLE) FROM ("));
    }

    #[test]
    fn test_plan_where_lowers_to_sql() {
        let q = plan_text("MATCH (n) WHERE n.value = \"a\" OR NOT n.type = \"User\" RETURN n");
        assert!(q
            .sql
            .ends_with("WHERE (((a0.value = ?) OR NOT ((a0.type = ?))))"));
        assert_eq!(
            q.params,
            vec![
                SqlParam::String("a".to_string()),
                SqlParam::String("User".to_string()),
            ]
        );
    }

    #[test]
    fn test_plan_in_list() {
        let q = plan_text("MATCH (n) WHERE n.value IN [\"a\", \"b\"] RETURN n.value");
        assert!(q.sql.contains("a0.value IN (?, ?)"));
    }

    #[test]
    fn test_plan_edge_variable_projection() {
        let q = plan_text("MATCH (a)-[r:Connects]->(b) RETURN r");
        assert!(q.sql.starts_with(
            "SELECT r0.id AS p0_id, r0.from_id AS p0_from_id, \
             r0.to_id AS p0_to_id, r0.type AS p0_type FROM"
        ));
        assert_eq!(q.shapes, vec![ProjectionShape::Relation]);
    }

    #[test]
    fn test_plan_orders_most_selective_chain_first() {
        let q = plan_text("MATCH (b)-[:R]->(c), (a {value: \"x\"})-[:S]->(d) RETURN a.value, b.value");
        // The property-filtered chain wins the first aliases.
        assert!(q.sql.starts_with("SELECT a0.value AS p0, a2.value AS p1"));
        assert!(q.sql.contains("(a0.value = ?)"));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let text = "MATCH (a:Server)-[:Connects*1..3]->(b), (c)-[:Owns]->(a) \
                    WHERE b.value <> \"x\" RETURN a.value, count(*)";
        let first = plan(&parse(text).unwrap()).unwrap();
        let second = plan(&parse(text).unwrap()).unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.params, second.params);
    }

    #[test]
    fn test_plan_rejects_variable_length_edge_projection() {
        let err = plan(&parse("MATCH (a)-[r:Connects*1..2]->(b) RETURN r").unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn test_plan_rejects_unknown_variable() {
        let err = plan(&parse("MATCH (a) RETURN missing.value").unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn test_plan_rejects_non_value_properties() {
        let err = plan(&parse("MATCH (a {name: \"x\"}) RETURN a").unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn test_plan_rejects_edge_properties() {
        let err = plan(&parse("MATCH (a)-[:R {weight: 2}]->(b) RETURN a").unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn test_plan_rejects_empty_range() {
        let err = plan(&parse("MATCH (a)-[:R*5..2]->(b) RETURN a.value").unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn test_plan_unbounded_range_is_capped() {
        let q = plan_text("MATCH (a)-[:R*8..]->(b) RETURN a.value");
        let arms = q.sql.split(" UNION ").count();
        assert_eq!(arms, (MAX_HOPS - 8 + 1) as usize);
    }
}
