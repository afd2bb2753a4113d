//! Parser for the graph pattern language.
//!
//! `MATCH (a:Server)-[:Connects*1..2]->(b) WHERE a.value = "x" RETURN b.value`
//! is parsed into [`ast::Query`] with nom combinators. Keywords are
//! case-insensitive; identifiers are `[A-Za-z_][A-Za-z0-9_]*`.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, tag_no_case};
use nom::character::complete::{char as pchar, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::IResult;

use super::ast::{
    Aggregate, BinaryOp, Direction, EdgePattern, Expr, Literal, NodePattern, Pattern, Projection,
    Query, Range,
};
use crate::error::QueryError;

/// Parses a complete query string.
pub fn parse(input: &str) -> Result<Query, QueryError> {
    match all_consuming(ws(query))(input) {
        Ok((_, q)) => Ok(q),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(QueryError::Parse(format!(
            "invalid query near {:?}",
            snippet(e.input)
        ))),
        Err(nom::Err::Incomplete(_)) => {
            Err(QueryError::Parse("unexpected end of query".to_string()))
        }
    }
}

fn snippet(input: &str) -> &str {
    let end = input
        .char_indices()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    &input[..end]
}

fn query(input: &str) -> IResult<&str, Query> {
    let (input, _) = keyword("MATCH")(input)?;
    let (input, patterns) = separated_list1(ws(pchar(',')), ws(pattern))(input)?;
    let (input, filter) = opt(preceded(keyword("WHERE"), ws(expr)))(input)?;
    let (input, _) = keyword("RETURN")(input)?;
    let (input, projections) = separated_list1(ws(pchar(',')), ws(projection))(input)?;
    Ok((
        input,
        Query {
            patterns,
            filter,
            projections,
        },
    ))
}

fn pattern(input: &str) -> IResult<&str, Pattern> {
    let (input, start) = node_pattern(input)?;
    let (input, steps) = many0(pair(ws(edge_pattern), ws(node_pattern)))(input)?;
    Ok((input, Pattern { start, steps }))
}

fn node_pattern(input: &str) -> IResult<&str, NodePattern> {
    let (input, _) = pchar('(')(input)?;
    let (input, variable) = opt(ws(identifier))(input)?;
    let (input, types) = opt(preceded(ws(pchar(':')), type_list))(input)?;
    let (input, properties) = opt(ws(property_map))(input)?;
    let (input, _) = ws(pchar(')'))(input)?;
    Ok((
        input,
        NodePattern {
            variable,
            types: types.unwrap_or_default(),
            properties: properties.unwrap_or_default(),
        },
    ))
}

fn edge_pattern(input: &str) -> IResult<&str, EdgePattern> {
    alt((incoming_edge, outgoing_or_undirected_edge))(input)
}

/// `<-[detail]-`
fn incoming_edge(input: &str) -> IResult<&str, EdgePattern> {
    let (input, _) = tag("<-")(input)?;
    let (input, detail) = opt(ws(edge_detail))(input)?;
    let (input, _) = tag("-")(input)?;
    Ok((input, build_edge(detail, Direction::Incoming)))
}

/// `-[detail]->` or `-[detail]-`
fn outgoing_or_undirected_edge(input: &str) -> IResult<&str, EdgePattern> {
    let (input, _) = tag("-")(input)?;
    let (input, detail) = opt(ws(edge_detail))(input)?;
    let (input, direction) = alt((
        value(Direction::Outgoing, tag("->")),
        value(Direction::Undirected, tag("-")),
    ))(input)?;
    Ok((input, build_edge(detail, direction)))
}

struct EdgeDetail {
    variable: Option<String>,
    types: Vec<String>,
    range: Option<Range>,
    properties: Vec<(String, Literal)>,
}

fn build_edge(detail: Option<EdgeDetail>, direction: Direction) -> EdgePattern {
    match detail {
        Some(d) => EdgePattern {
            variable: d.variable,
            types: d.types,
            direction,
            range: d.range,
            properties: d.properties,
        },
        None => EdgePattern {
            variable: None,
            types: Vec::new(),
            direction,
            range: None,
            properties: Vec::new(),
        },
    }
}

fn edge_detail(input: &str) -> IResult<&str, EdgeDetail> {
    let (input, _) = pchar('[')(input)?;
    let (input, variable) = opt(ws(identifier))(input)?;
    let (input, types) = opt(preceded(ws(pchar(':')), type_list))(input)?;
    let (input, range) = opt(ws(range))(input)?;
    let (input, properties) = opt(ws(property_map))(input)?;
    let (input, _) = ws(pchar(']'))(input)?;
    Ok((
        input,
        EdgeDetail {
            variable,
            types: types.unwrap_or_default(),
            range,
            properties: properties.unwrap_or_default(),
        },
    ))
}

/// `*`, `*n`, `*m..n`, `*m..`, `*..n`
fn range(input: &str) -> IResult<&str, Range> {
    let (input, _) = pchar('*')(input)?;
    let (input, min) = opt(ws(u32_number))(input)?;
    let (input, upper) = opt(preceded(ws(tag("..")), opt(ws(u32_number))))(input)?;
    let range = match (min, upper) {
        (None, None) => Range { min: 1, max: None },
        (Some(n), None) => Range {
            min: n,
            max: Some(n),
        },
        (min, Some(max)) => Range {
            min: min.unwrap_or(1),
            max,
        },
    };
    Ok((input, range))
}

fn type_list(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(ws(pchar('|')), ws(identifier))(input)
}

fn property_map(input: &str) -> IResult<&str, Vec<(String, Literal)>> {
    delimited(
        pchar('{'),
        separated_list1(
            ws(pchar(',')),
            separated_pair(ws(identifier), ws(pchar(':')), ws(literal)),
        ),
        ws(pchar('}')),
    )(input)
}

fn projection(input: &str) -> IResult<&str, Projection> {
    let (input, expr) = expr(input)?;
    let (input, alias) = opt(preceded(keyword("AS"), ws(identifier)))(input)?;
    Ok((input, Projection { expr, alias }))
}

// Expression precedence, loosest first: OR, AND, NOT, comparison, primary.

fn expr(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("OR"), ws(and_expr)))(input)?;
    Ok((input, fold_binary(first, rest, BinaryOp::Or)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(keyword("AND"), ws(not_expr)))(input)?;
    Ok((input, fold_binary(first, rest, BinaryOp::And)))
}

fn fold_binary(first: Expr, rest: Vec<Expr>, op: BinaryOp) -> Expr {
    rest.into_iter()
        .fold(first, |acc, e| Expr::Binary(Box::new(acc), op, Box::new(e)))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(keyword("NOT"), ws(not_expr)), |e| {
            Expr::Not(Box::new(e))
        }),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = primary(input)?;
    let (input, op) = opt(ws(comparison_op))(input)?;
    match op {
        None => Ok((input, left)),
        Some(BinaryOp::In) => {
            let (input, list) = ws(literal_list)(input)?;
            Ok((
                input,
                Expr::Binary(Box::new(left), BinaryOp::In, Box::new(Expr::List(list))),
            ))
        }
        Some(op) => {
            let (input, right) = ws(primary)(input)?;
            Ok((input, Expr::Binary(Box::new(left), op, Box::new(right))))
        }
    }
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Neq, tag("<>")),
        value(BinaryOp::Lte, tag("<=")),
        value(BinaryOp::Gte, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Eq, tag("=")),
        value(BinaryOp::In, keyword("IN")),
    ))(input)
}

fn literal_list(input: &str) -> IResult<&str, Vec<Literal>> {
    delimited(
        pchar('['),
        separated_list1(ws(pchar(',')), ws(literal)),
        ws(pchar(']')),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(literal, Expr::Literal),
        aggregate_call,
        property_access,
        map(identifier, Expr::Variable),
        delimited(pchar('('), ws(expr), pchar(')')),
    ))(input)
}

fn aggregate_call(input: &str) -> IResult<&str, Expr> {
    let (input, agg) = map_res(terminated(identifier, ws(pchar('('))), |name| {
        Aggregate::from_name(&name).ok_or("not an aggregate")
    })(input)?;
    let (input, arg) = alt((
        map(ws(pchar('*')), |_| None),
        map(ws(expr), |e| Some(Box::new(e))),
    ))(input)?;
    let (input, _) = ws(pchar(')'))(input)?;
    Ok((input, Expr::Call(agg, arg)))
}

fn property_access(input: &str) -> IResult<&str, Expr> {
    map(
        separated_pair(identifier, pchar('.'), identifier),
        |(var, field)| Expr::Property(var, field),
    )(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(string_lit, Literal::String),
        number,
        value(Literal::Boolean(true), keyword("true")),
        value(Literal::Boolean(false), keyword("false")),
        value(Literal::Null, keyword("null")),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    map_res(
        recognize(tuple((
            opt(pchar('-')),
            digit1,
            opt(pair(pchar('.'), digit1)),
        ))),
        |s: &str| -> Result<Literal, String> {
            if s.contains('.') {
                s.parse().map(Literal::Float).map_err(|e| e.to_string())
            } else {
                s.parse().map(Literal::Integer).map_err(|e| e.to_string())
            }
        },
    )(input)
}

fn string_lit(input: &str) -> IResult<&str, String> {
    alt((quoted_lit('"'), quoted_lit('\'')))(input)
}

fn quoted_lit<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input| {
        let plain = match quote {
            '"' => "\\\"",
            _ => "\\'",
        };
        let body = escaped_transform(
            is_not(plain),
            '\\',
            alt((
                value("\\", tag("\\")),
                value("\"", tag("\"")),
                value("'", tag("'")),
                value("\n", tag("n")),
                value("\t", tag("t")),
                value("\r", tag("r")),
            )),
        );
        delimited(
            pchar(quote),
            map(opt(body), Option::unwrap_or_default),
            pchar(quote),
        )(input)
    }
}

/// An identifier that is not a reserved keyword.
fn identifier(input: &str) -> IResult<&str, String> {
    map(
        verify(
            recognize(pair(
                satisfy(is_ident_start),
                many0(satisfy(is_ident_continue)),
            )),
            |s: &str| !is_keyword(s),
        ),
        |s: &str| s.to_string(),
    )(input)
}

fn is_keyword(s: &str) -> bool {
    matches!(
        s.to_ascii_uppercase().as_str(),
        "MATCH" | "WHERE" | "RETURN" | "AS" | "AND" | "OR" | "NOT" | "IN" | "TRUE" | "FALSE"
            | "NULL"
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn u32_number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

/// Matches a keyword case-insensitively, refusing to split an identifier.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        delimited(
            multispace0,
            terminated(tag_no_case(kw), not(satisfy(is_ident_continue))),
            multispace0,
        )(input)
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}
