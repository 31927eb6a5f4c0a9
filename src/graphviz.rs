//! Graphviz DOT export and import for scaffold graphs.
//!
//! ```text
//! graph G {
//! 0 [id="scaffold_a"];
//! 1 [id="scaffold_b"];
//! 0--1 [label=0, weight=8];
//! }
//! ```
//!
//! `label` is the orientation index (0=HH, 1=HT, 2=TH, 3=TT).

use anyhow::{anyhow, bail, Context, Result};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alphanumeric1, char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::{many0, separated_list1},
    sequence::{delimited, separated_pair, tuple},
    IResult, Parser,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::graph::ScaffoldGraph;
use crate::pairing::Orientation;

/// Write a graph as DOT; node statements are numbered by node index
pub fn write_dot<W: Write>(graph: &ScaffoldGraph, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "graph G {{")?;
    for (index, name) in graph.nodes().enumerate() {
        writeln!(writer, "{index} [id=\"{}\"];", escape(name))?;
    }
    for edge in graph.edges() {
        writeln!(
            writer,
            "{}--{} [label={}, weight={}];",
            edge.source,
            edge.target,
            edge.orientation.index(),
            edge.weight
        )?;
    }
    writeln!(writer, "}}")
}

pub fn write_dot_file<P: AsRef<Path>>(graph: &ScaffoldGraph, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_dot(graph, &mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed writing graph to {}", path.display()))
}

/// Parse a DOT graph written by [`write_dot`]
pub fn read_dot(input: &str) -> Result<ScaffoldGraph> {
    let statements = match all_consuming(document)(input) {
        Ok((_, statements)) => statements,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = input.len() - e.input.len();
            let line = input[..offset].matches('\n').count() + 1;
            bail!("Invalid DOT graph near line {line}");
        }
        Err(nom::Err::Incomplete(_)) => bail!("Truncated DOT graph"),
    };

    let mut graph = ScaffoldGraph::new();
    let mut ids: HashMap<usize, usize> = HashMap::new();
    for statement in statements {
        match statement {
            Statement::Node { id, name } => {
                if graph.node_index(&name).is_some() || ids.contains_key(&id) {
                    bail!("Node {id} ('{name}') is declared twice");
                }
                ids.insert(id, graph.add_node(&name));
            }
            Statement::Edge {
                source,
                target,
                weight,
                orientation,
            } => {
                let a = *ids
                    .get(&source)
                    .ok_or_else(|| anyhow!("Edge {source}--{target} uses undeclared node {source}"))?;
                let b = *ids
                    .get(&target)
                    .ok_or_else(|| anyhow!("Edge {source}--{target} uses undeclared node {target}"))?;
                if !graph.add_edge(a, b, weight, orientation) {
                    bail!("Edge {source}--{target} is a self-loop or duplicate");
                }
            }
        }
    }
    Ok(graph)
}

pub fn read_dot_file<P: AsRef<Path>>(path: P) -> Result<ScaffoldGraph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    read_dot(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, PartialEq)]
enum Statement {
    Node {
        id: usize,
        name: String,
    },
    Edge {
        source: usize,
        target: usize,
        weight: u32,
        orientation: Orientation,
    },
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: Parser<&'a str, O, nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn index(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\"\\"),
                '\\',
                alt((value("\\", tag("\\")), value("\"", tag("\"")))),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('"'),
    )(input)
}

fn node_statement(input: &str) -> IResult<&str, Statement> {
    map(
        tuple((
            ws(index),
            char('['),
            ws(tag("id")),
            char('='),
            ws(quoted),
            char(']'),
            ws(char(';')),
        )),
        |(id, _, _, _, name, _, _)| Statement::Node { id, name },
    )(input)
}

fn attribute(input: &str) -> IResult<&str, (&str, u32)> {
    separated_pair(ws(alphanumeric1), char('='), ws(number))(input)
}

fn edge_statement(input: &str) -> IResult<&str, Statement> {
    map_res(
        tuple((
            ws(index),
            tag("--"),
            ws(index),
            char('['),
            separated_list1(char(','), attribute),
            char(']'),
            ws(char(';')),
        )),
        |(source, _, target, _, attributes, _, _)| {
            let lookup = |key: &str| {
                attributes
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|&(_, v)| v)
            };
            let label = lookup("label").ok_or("missing label")?;
            let weight = lookup("weight").ok_or("missing weight")?;
            let orientation =
                Orientation::from_index(label as usize).ok_or("label out of range")?;
            Ok::<_, &str>(Statement::Edge {
                source,
                target,
                weight,
                orientation,
            })
        },
    )(input)
}

fn document(input: &str) -> IResult<&str, Vec<Statement>> {
    delimited(
        tuple((ws(tag("graph")), opt(alphanumeric1), ws(char('{')))),
        many0(alt((edge_statement, node_statement))),
        ws(char('}')),
    )(input)
}
