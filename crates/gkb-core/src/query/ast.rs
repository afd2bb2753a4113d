//! Abstract syntax tree for the graph pattern language.

/// A full query: `MATCH` patterns, optional `WHERE`, `RETURN` projections.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub patterns: Vec<Pattern>,
    pub filter: Option<Expr>,
    pub projections: Vec<Projection>,
}

/// One comma-separated pattern chain: a node followed by edge/node pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub steps: Vec<(EdgePattern, NodePattern)>,
}

/// `(var:Type1|Type2 {value: "x"})`, every element optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub properties: Vec<(String, Literal)>,
}

/// Direction of an edge pattern in the written chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-[..]->`
    Outgoing,
    /// `<-[..]-`
    Incoming,
    /// `-[..]-`
    Undirected,
}

/// `-[var:Type1|Type2 *m..n {..}]->`, every element optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub direction: Direction,
    pub range: Option<Range>,
    pub properties: Vec<(String, Literal)>,
}

/// A variable-length range `*m..n`. `max` of `None` means unbounded (the
/// planner applies its hop cap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: u32,
    pub max: Option<u32>,
}

/// A projected expression with an optional `AS` alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Projection {
    /// The column name shown to the caller: the alias when given, otherwise
    /// the rendered expression.
    pub fn column_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expr.render(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    In,
}

impl BinaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::In => "IN",
        }
    }
}

/// Aggregation functions allowed in projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A bare pattern variable, e.g. `n`.
    Variable(String),
    /// `var.field`, e.g. `n.value`.
    Property(String, String),
    /// An aggregate call; `Count` with a `None` argument is `count(*)`.
    Call(Aggregate, Option<Box<Expr>>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Not(Box<Expr>),
    /// The right-hand side of `IN`.
    List(Vec<Literal>),
}

impl Expr {
    /// True when this expression contains an aggregate call.
    pub fn has_aggregate(&self) -> bool {
        match self {
            Expr::Call(..) => true,
            Expr::Binary(l, _, r) => l.has_aggregate() || r.has_aggregate(),
            Expr::Not(e) => e.has_aggregate(),
            _ => false,
        }
    }

    /// Renders the expression as written, for default column names.
    pub fn render(&self) -> String {
        match self {
            Expr::Literal(lit) => lit.render(),
            Expr::Variable(v) => v.clone(),
            Expr::Property(v, f) => format!("{v}.{f}"),
            Expr::Call(agg, None) => format!("{}(*)", agg.as_sql().to_ascii_lowercase()),
            Expr::Call(agg, Some(arg)) => {
                format!("{}({})", agg.as_sql().to_ascii_lowercase(), arg.render())
            }
            Expr::Binary(l, op, r) => format!("{} {} {}", l.render(), op.as_sql(), r.render()),
            Expr::Not(e) => format!("NOT {}", e.render()),
            Expr::List(items) => {
                let rendered: Vec<String> = items.iter().map(Literal::render).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

impl Literal {
    pub fn render(&self) -> String {
        match self {
            Literal::String(s) => format!("\"{s}\""),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }
}
