//! Values delivered by the query cursor.

use serde::Serialize;

/// A projected asset: the stored row with its surrogate id. `sources` is
/// populated only when the caller asked for provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

/// A projected relation row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationSummary {
    pub id: i64,
    pub from_id: i64,
    pub to_id: i64,
    #[serde(rename = "type")]
    pub relation_type: String,
}

/// One projected value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Asset(AssetSummary),
    Relation(RelationSummary),
}

impl std::fmt::Display for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryValue::Null => write!(f, "null"),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::Int(i) => write!(f, "{i}"),
            QueryValue::Float(x) => write!(f, "{x}"),
            QueryValue::String(s) => write!(f, "{s}"),
            QueryValue::Asset(a) => write!(f, "({}:{})", a.asset_type, a.value),
            QueryValue::Relation(r) => {
                write!(f, "[{}:{}->{}]", r.relation_type, r.from_id, r.to_id)
            }
        }
    }
}
