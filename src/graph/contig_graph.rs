//! Contig Graph: nodes are oriented contig ends, edges are scored links.
//!
//! Every link is inserted together with its reverse-complement twin, so the
//! graph is symmetric: a chain `a+ -> b+ -> c-` always has the mirror chain
//! `c+ -> b- -> a-`. Best-edge choice and branch detection are symmetric too,
//! which is what lets path walking report each chain exactly once.

use ahash::{AHashMap, AHashSet};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::BranchPolicy;
use crate::error::{BridgeError, Result};
use crate::graph::link::{canonical_key, ContigLink, ContigLinks, LinkKey};
use crate::seq::{ContigEnd, SeqArea, SeqId};

/// Ordered contig ends joined by selected edges.
pub type ContigPath = Vec<ContigEnd>;

/// How `calculate_best` ranks competing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BestCriterion {
    #[default]
    Support,
}

#[derive(Debug, Clone)]
pub struct ContigNode {
    pub end: ContigEnd,
    pub best_out: Option<EdgeIndex>,
    pub best_in: Option<EdgeIndex>,
}

#[derive(Debug, Clone)]
pub struct ContigEdge {
    /// The link oriented along this edge.
    pub link: ContigLink,
    /// Canonical key, shared with the twin edge.
    pub key: LinkKey,
    pub selected: bool,
}

impl ContigEdge {
    pub fn support(&self) -> f64 {
        self.link.support
    }

    pub fn link_length(&self) -> i64 {
        self.link.link_length()
    }

    pub fn seq_areas(&self) -> Vec<SeqArea> {
        self.link.seq_areas()
    }
}

pub struct ContigGraph {
    graph: DiGraph<ContigNode, ContigEdge>,
    index: AHashMap<ContigEnd, NodeIndex>,
    contained: AHashSet<SeqId>,
    paths: Vec<ContigPath>,
}

impl ContigGraph {
    /// Build the graph from the aggregator's scored links.
    pub fn create(links: &ContigLinks) -> Self {
        Self::from_links(links.links(), links.contained().clone())
    }

    pub fn from_links(links: &[ContigLink], contained: AHashSet<SeqId>) -> Self {
        let mut graph = ContigGraph {
            graph: DiGraph::with_capacity(links.len() * 2, links.len() * 2),
            index: AHashMap::new(),
            contained,
            paths: Vec::new(),
        };
        for link in links {
            let (key, _) = canonical_key(link.from, link.to);
            graph.add_edge(link.clone(), key);
            graph.add_edge(link.reversed(), key);
        }
        info!(
            "Contig graph: {} nodes, {} edges",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    fn node(&mut self, end: ContigEnd) -> NodeIndex {
        if let Some(&n) = self.index.get(&end) {
            return n;
        }
        let n = self.graph.add_node(ContigNode { end, best_out: None, best_in: None });
        self.index.insert(end, n);
        n
    }

    fn add_edge(&mut self, link: ContigLink, key: LinkKey) {
        let from = self.node(link.from);
        let to = self.node(link.to);
        self.graph.add_edge(from, to, ContigEdge { link, key, selected: false });
    }

    /// Higher support wins; equal support goes to the smaller canonical key.
    fn rank(&self, x: EdgeIndex, y: EdgeIndex, criterion: BestCriterion) -> Ordering {
        let (ex, ey) = (&self.graph[x], &self.graph[y]);
        match criterion {
            BestCriterion::Support => ex.support().total_cmp(&ey.support()).then_with(|| ey.key.cmp(&ex.key)),
        }
    }

    fn best_edge(&self, node: NodeIndex, dir: Direction, criterion: BestCriterion) -> Option<EdgeIndex> {
        self.graph
            .edges_directed(node, dir)
            .map(|e| e.id())
            .max_by(|&x, &y| self.rank(x, y, criterion))
    }

    /// Record, per node, the best outgoing and incoming edge.
    pub fn calculate_best(&mut self, criterion: BestCriterion) {
        for node in self.graph.node_indices() {
            let best_out = self.best_edge(node, Direction::Outgoing, criterion);
            let best_in = self.best_edge(node, Direction::Incoming, criterion);
            let n = &mut self.graph[node];
            n.best_out = best_out;
            n.best_in = best_in;
        }
    }

    /// Whether `node` has two or more credible edges in `dir`: support at
    /// least `ratio` times the best, exact ties always included.
    pub fn is_branch(&self, node: NodeIndex, dir: Direction, ratio: f64) -> bool {
        let best = match dir {
            Direction::Outgoing => self.graph[node].best_out,
            Direction::Incoming => self.graph[node].best_in,
        };
        let Some(best) = best else {
            return false;
        };
        let top = self.graph[best].support();
        self.graph
            .edges_directed(node, dir)
            .filter(|e| e.weight().support() == top || e.weight().support() >= ratio * top)
            .nth(1)
            .is_some()
    }

    /// Select edges and walk them into maximal simple chains.
    ///
    /// An edge is selected when it is the best out-edge of its source and the
    /// best in-edge of its target. Under [`BranchPolicy::No`] an edge touching
    /// a branch on either side is never selected.
    pub fn identify_paths(&mut self, policy: BranchPolicy, branch_ratio: f64) {
        let mut selected = 0usize;
        for e in self.graph.edge_indices().collect::<Vec<_>>() {
            let Some((u, v)) = self.graph.edge_endpoints(e) else {
                continue;
            };
            let mutual = self.graph[u].best_out == Some(e) && self.graph[v].best_in == Some(e);
            let allowed = match policy {
                BranchPolicy::Best => true,
                BranchPolicy::No => {
                    !self.is_branch(u, Direction::Outgoing, branch_ratio)
                        && !self.is_branch(v, Direction::Incoming, branch_ratio)
                }
            };
            self.graph[e].selected = mutual && allowed;
            selected += usize::from(mutual && allowed);
        }

        let mut starts: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.selected_out(n).is_some())
            .collect();
        starts.sort_by_key(|&n| (self.selected_in(n).is_some(), self.graph[n].end));

        // chain heads come first; whatever is left afterwards lies on a cycle
        let mut visited: AHashSet<SeqId> = AHashSet::new();
        let mut paths = Vec::new();
        for start in starts {
            if visited.contains(&self.graph[start].end.id) {
                continue;
            }
            let path = self.walk(start, &mut visited);
            if path.len() >= 2 {
                paths.push(path);
            }
        }

        info!("Selected {} edges, identified {} paths", selected, paths.len());
        self.paths = paths;
    }

    fn walk(&self, start: NodeIndex, visited: &mut AHashSet<SeqId>) -> ContigPath {
        let mut path = vec![self.graph[start].end];
        visited.insert(self.graph[start].end.id);
        let mut current = start;
        while let Some(next) = self.selected_out(current) {
            let end = self.graph[next].end;
            if !visited.insert(end.id) {
                debug!("Path from {} cut before revisiting contig {}", self.graph[start].end, end.id);
                break;
            }
            path.push(end);
            current = next;
        }
        path
    }

    fn selected_out(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().selected)
            .map(|e| e.target())
    }

    fn selected_in(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().selected)
            .map(|e| e.source())
    }

    pub fn paths(&self) -> &[ContigPath] {
        &self.paths
    }

    /// The edge `u -> v`, if the two ends are linked.
    pub fn edge(&self, u: ContigEnd, v: ContigEnd) -> Option<&ContigEdge> {
        let (&nu, &nv) = (self.index.get(&u)?, self.index.get(&v)?);
        self.graph.find_edge(nu, nv).map(|e| &self.graph[e])
    }

    pub fn contained(&self) -> &AHashSet<SeqId> {
        &self.contained
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Contig ids appearing on some path.
    pub fn path_contigs(&self) -> AHashSet<SeqId> {
        self.paths.iter().flatten().map(|end| end.id).collect()
    }

    /// Sequences (reads) supplying filler bases to selected edges.
    pub fn filler_sources(&self) -> AHashSet<SeqId> {
        self.graph
            .edge_weights()
            .filter(|e| e.selected)
            .filter_map(|e| e.link.filler)
            .map(|area| area.id)
            .collect()
    }

    /// Dump every edge with its score and selection state.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| BridgeError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let io = |e| BridgeError::io(path, e);

        writeln!(writer, "from,to,support,link_length,gap,reads,contigs,best_out,best_in,selected").map_err(io)?;
        for e in self.graph.edge_references() {
            let (u, v) = (&self.graph[e.source()], &self.graph[e.target()]);
            let w = e.weight();
            writeln!(
                writer,
                "{},{},{:.3},{},{},{},{},{},{},{}",
                u.end,
                v.end,
                w.support(),
                w.link_length(),
                w.link.gap,
                w.link.read_count,
                w.link.ctg_count,
                u.best_out == Some(e.id()),
                v.best_in == Some(e.id()),
                w.selected
            )
            .map_err(io)?;
        }
        writer.flush().map_err(io)
    }
}
