// Multilevel modularity optimization (Louvain)
//
// Scores how strongly a query's table/column access graph splits into
// communities. The policies only need the final score, but the partition
// state is public so each phase can be driven and inspected on its own.
//
// STATE OWNERSHIP:
// Every call to `score`/`detect` builds its own `Partition`. The input graph
// is only borrowed; coarsened levels are fresh owned graphs. Nothing here is
// shared between calls, so concurrent analyses never interfere.

use std::borrow::Cow;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::AnalysisError;
use crate::graph::Graph;

/// Link weight from one node into each reachable community, in discovery order.
type CommunityLinks = IndexMap<usize, f64, FxBuildHasher>;

// ============================================================================
// SAFETY LIMITS
// ============================================================================

/// Bounds on the optimization loops.
///
/// A pass (or level) counts as an improvement only when modularity grows by
/// more than `tolerance`. With `tolerance = 0.0` this is a strict `>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizerLimits {
    /// Maximum local-moving passes per level
    pub max_passes: usize,
    /// Maximum coarsening levels
    pub max_levels: usize,
    /// Minimum modularity increase that counts as progress
    pub tolerance: f64,
}

impl OptimizerLimits {
    /// No caps at all. Numerically tied inputs may run for a long time.
    pub fn unbounded() -> Self {
        Self {
            max_passes: usize::MAX,
            max_levels: usize::MAX,
            tolerance: 0.0,
        }
    }

    /// Reject limits under which the loops would not stop at a stable value.
    ///
    /// # Errors
    /// - `InvalidLimits` if `tolerance` is negative or not finite, or either cap is 0
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(AnalysisError::InvalidLimits(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.max_passes == 0 {
            return Err(AnalysisError::InvalidLimits("max_passes must be at least 1".to_string()));
        }
        if self.max_levels == 0 {
            return Err(AnalysisError::InvalidLimits("max_levels must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for OptimizerLimits {
    fn default() -> Self {
        Self {
            max_passes: 1000,
            max_levels: 64,
            tolerance: 0.0,
        }
    }
}

// ============================================================================
// PARTITION STATE
// ============================================================================
//
// Modularity of a partition, with m = total edge weight:
//
//   Q = Σ_c [ in[c] / 2m  -  (tot[c] / 2m)² ]     for communities with tot[c] > 0
//
// Where:
//   in[c]  = twice the weight of edges inside c, plus self-loop weight
//   tot[c] = sum of weighted degrees of the members of c
//
// Community ids at a level are node ids of that level, so both arrays are
// indexed by node id and singletons are the starting point.
// ============================================================================

/// Community assignment of every node of one graph level.
#[derive(Debug, Clone)]
pub struct Partition<'g> {
    graph: Cow<'g, Graph>,
    node_to_community: Vec<Option<usize>>,
    internal_weight: Vec<f64>,
    total_degree: Vec<f64>,
}

impl<'g> Partition<'g> {
    /// Singleton partition over `graph`: every node is its own community.
    pub fn new(graph: &'g Graph) -> Self {
        Self::singletons(Cow::Borrowed(graph))
    }

    fn singletons(graph: Cow<'g, Graph>) -> Self {
        let n = graph.node_count();
        let internal_weight = (0..n).map(|node| graph.self_loop_weight(node)).collect();
        let total_degree = (0..n).map(|node| graph.weighted_degree(node)).collect();

        Self {
            graph,
            node_to_community: (0..n).map(Some).collect(),
            internal_weight,
            total_degree,
        }
    }

    /// Graph this partition is defined over.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current community of `node`. `None` only while the node is being moved.
    pub fn community_of(&self, node: usize) -> Option<usize> {
        self.node_to_community[node]
    }

    pub fn internal_weight(&self, community: usize) -> f64 {
        self.internal_weight[community]
    }

    pub fn total_degree(&self, community: usize) -> f64 {
        self.total_degree[community]
    }

    /// Number of communities with at least one member.
    pub fn community_count(&self) -> usize {
        let mut occupied = vec![false; self.node_to_community.len()];
        for community in self.node_to_community.iter().flatten() {
            occupied[*community] = true;
        }
        occupied.into_iter().filter(|&o| o).count()
    }

    /// Modularity of the current partition. `0.0` when the graph has no weight.
    pub fn modularity(&self) -> f64 {
        let m = self.graph.total_weight();
        if m == 0.0 {
            return 0.0;
        }
        let m2 = 2.0 * m;

        self.internal_weight
            .iter()
            .zip(&self.total_degree)
            .filter(|&(_, &tot)| tot > 0.0)
            .map(|(&inside, &tot)| inside / m2 - (tot / m2) * (tot / m2))
            .sum()
    }

    /// Link weight from `node` to each neighboring community.
    ///
    /// The node's own community always comes first, even with zero weight, so
    /// the node can always fall back to it. Self-loops are not links.
    fn neighbor_communities(&self, node: usize) -> CommunityLinks {
        let mut links = CommunityLinks::default();
        if let Some(own) = self.node_to_community[node] {
            links.insert(own, 0.0);
        }

        for &(neighbor, weight) in self.graph.neighbors(node) {
            if neighbor == node {
                continue;
            }
            if let Some(community) = self.node_to_community[neighbor] {
                *links.entry(community).or_insert(0.0) += weight;
            }
        }
        links
    }

    fn remove(&mut self, node: usize, community: usize, link_weight: f64, degree: f64, self_loop: f64) {
        self.total_degree[community] -= degree;
        self.internal_weight[community] -= 2.0 * link_weight + self_loop;
        self.node_to_community[node] = None;
    }

    fn insert(&mut self, node: usize, community: usize, link_weight: f64, degree: f64, self_loop: f64) {
        self.total_degree[community] += degree;
        self.internal_weight[community] += 2.0 * link_weight + self_loop;
        self.node_to_community[node] = Some(community);
    }

    // ------------------------------------------------------------------------
    // PHASE A: LOCAL MOVING
    // ------------------------------------------------------------------------
    //
    // Visit nodes in index order. Take each node out of its community and put
    // it into the neighboring community with the best gain:
    //
    //   gain(v, k) = link(v, k) - tot[k] * deg(v) / 2m
    //
    // The running best starts at (own community, 0). Only a strictly larger
    // gain replaces it, so ties keep the earlier candidate and a node never
    // moves without a positive gain.
    // ------------------------------------------------------------------------

    /// Run local-moving passes until a full pass stops improving modularity.
    ///
    /// Returns the modularity reached before the final, non-improving pass.
    pub fn local_optimize(&mut self, limits: &OptimizerLimits) -> f64 {
        let mut current = self.modularity();
        let m = self.graph.total_weight();
        if m == 0.0 {
            return current;
        }
        let m2 = 2.0 * m;
        let n = self.graph.node_count();

        let mut passes = 0usize;
        loop {
            let before = current;
            let mut moves = 0usize;

            for node in 0..n {
                let Some(own) = self.node_to_community[node] else {
                    continue;
                };
                let links = self.neighbor_communities(node);
                let degree = self.graph.weighted_degree(node);
                let self_loop = self.graph.self_loop_weight(node);
                let own_link = links.get(&own).copied().unwrap_or(0.0);

                self.remove(node, own, own_link, degree, self_loop);

                let mut best = own;
                let mut best_link = own_link;
                let mut best_gain = 0.0;
                for (&community, &link) in &links {
                    let gain = link - self.total_degree[community] * degree / m2;
                    if gain > best_gain {
                        best_gain = gain;
                        best = community;
                        best_link = link;
                    }
                }

                self.insert(node, best, best_link, degree, self_loop);
                if best != own {
                    moves += 1;
                }
                current = self.modularity();
            }

            passes += 1;
            debug!(pass = passes, moves, modularity = current, "local moving pass");

            if current <= before + limits.tolerance {
                return before;
            }
            if passes >= limits.max_passes {
                warn!(
                    max_passes = limits.max_passes,
                    modularity = current,
                    "local moving hit pass limit before converging"
                );
                return current;
            }
        }
    }

    // ------------------------------------------------------------------------
    // PHASE B: COARSENING
    // ------------------------------------------------------------------------
    //
    // Each non-empty community becomes one node, numbered by first occurrence
    // among 0..n. Weight inside a community becomes a self-loop (internal
    // edges counted from both ends, true self-loops once). Weight between two
    // communities becomes one edge, summed only from the lower-numbered side.
    // The coarse graph keeps the parent's total weight, so modularity of the
    // coarse singleton partition equals modularity of this partition.
    // ------------------------------------------------------------------------

    /// Collapse communities into super-nodes.
    ///
    /// Returns the singleton partition over the coarse graph and, for every
    /// node of this level, the coarse node it was merged into.
    pub fn coarsen(&self) -> (Partition<'static>, Vec<usize>) {
        let n = self.graph.node_count();

        let mut renumbered: Vec<Option<usize>> = vec![None; n];
        let mut mapping = vec![0usize; n];
        let mut next_id = 0usize;
        for node in 0..n {
            let community = self.node_to_community[node].unwrap_or(node);
            mapping[node] = *renumbered[community].get_or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
        }

        let mut self_loops: Vec<Option<f64>> = vec![None; next_id];
        let mut crossing: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); next_id];
        for node in 0..n {
            let source = mapping[node];
            for &(neighbor, weight) in self.graph.neighbors(node) {
                let target = mapping[neighbor];
                if target == source {
                    *self_loops[source].get_or_insert(0.0) += weight;
                } else if target > source {
                    *crossing[source].entry(target).or_insert(0.0) += weight;
                }
            }
        }

        let mut coarse = Graph::new(next_id);
        for (community, links) in crossing.iter().enumerate() {
            if let Some(weight) = self_loops[community] {
                coarse.insert_edge(community, community, weight);
            }
            for (&other, &weight) in links {
                coarse.insert_edge(community, other, weight);
            }
        }
        let coarse = coarse.with_total_weight(self.graph.total_weight());

        (Partition::singletons(Cow::Owned(coarse)), mapping)
    }
}

// ============================================================================
// OPTIMIZER
// ============================================================================
//
//   state      <- singletons(graph)
//   modularity <- Q(state)
//   loop:
//       q <- local_optimize(state)
//       state <- coarsen(state)          (always)
//       if q > modularity: modularity <- q, continue
//       else: return modularity
//
// The value of the final, non-improving round is discarded.
// ============================================================================

/// Result of a full optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityReport {
    /// Best modularity reached
    pub modularity: f64,
    /// Number of improving levels
    pub levels: usize,
    /// Community of every input node, numbered 0.. in first-occurrence order
    pub membership: Vec<usize>,
}

impl CommunityReport {
    pub fn community_count(&self) -> usize {
        self.membership.iter().max().map_or(0, |&max| max + 1)
    }
}

/// Louvain modularity maximizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommunityOptimizer {
    limits: OptimizerLimits,
}

impl CommunityOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Same as [`OptimizerLimits::validate`].
    pub fn with_limits(limits: OptimizerLimits) -> Result<Self, AnalysisError> {
        limits.validate()?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &OptimizerLimits {
        &self.limits
    }

    /// Maximum modularity reachable from the singleton partition of `graph`.
    ///
    /// A graph without edge weight (including the empty graph) scores `0.0`.
    pub fn score(&self, graph: &Graph) -> f64 {
        self.detect(graph).modularity
    }

    /// Run the optimizer and keep track of where every input node ends up.
    pub fn detect(&self, graph: &Graph) -> CommunityReport {
        let mut membership: Vec<usize> = (0..graph.node_count()).collect();
        if graph.total_weight() == 0.0 {
            return CommunityReport {
                modularity: 0.0,
                levels: 0,
                membership,
            };
        }

        let mut state = Partition::new(graph);
        let mut modularity = state.modularity();
        let mut levels = 0usize;

        loop {
            let reached = state.local_optimize(&self.limits);
            let (coarse, mapping) = state.coarsen();
            state = coarse;

            if reached <= modularity + self.limits.tolerance {
                break;
            }

            modularity = reached;
            levels += 1;
            for community in membership.iter_mut() {
                *community = mapping[*community];
            }
            debug!(
                level = levels,
                modularity,
                communities = state.graph().node_count(),
                "coarsened level"
            );

            if levels >= self.limits.max_levels {
                warn!(
                    max_levels = self.limits.max_levels,
                    modularity, "optimizer hit level limit before converging"
                );
                break;
            }
        }

        renumber(&mut membership);
        CommunityReport {
            modularity,
            levels,
            membership,
        }
    }
}

/// Renumber communities to be contiguous (0, 1, 2, ...) in first-occurrence order.
fn renumber(communities: &mut [usize]) {
    let mut community_map: FxHashMap<usize, usize> = FxHashMap::default();
    let mut next_id = 0usize;

    for c in communities.iter_mut() {
        if let Some(&mapped) = community_map.get(c) {
            *c = mapped;
        } else {
            community_map.insert(*c, next_id);
            *c = next_id;
            next_id += 1;
        }
    }
}
