//! Analytics and discovery engine (C8): in-memory graph projection with
//! PageRank, community detection, shortest paths, betweenness centrality,
//! and a serendipity-scored discovery pass.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::config::{
    DISCOVERY_HUB_TOP_N, DISCOVERY_SERENDIPITY_MIN, JACCARD_DEDUP_THRESHOLD, JACCARD_MAX_NODES,
    PAGERANK_ALPHA, PAGERANK_MAX_ITER,
};
use crate::engine::MemoryEngine;
use crate::error::Result;
use crate::model::{DiscoveryCandidate, DiscoveryCandidateType};

pub struct GraphProjection {
    graph: UnGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

pub struct AnalysisReport {
    pub pagerank: HashMap<String, f64>,
    pub communities: HashMap<String, i64>,
    pub node_count: usize,
    pub edge_count: usize,
    pub dedup_candidates: Vec<DedupCandidate>,
    pub scores_stored: bool,
}

pub struct DedupCandidate {
    pub entity_a: String,
    pub entity_b: String,
    pub jaccard: f64,
}

pub struct DiscoveredEntity {
    pub entity: String,
    pub serendipity: f64,
    pub relevance: f64,
    pub novelty: f64,
    pub community: i64,
}

impl GraphProjection {
    fn build(nodes: Vec<String>, edges: Vec<(String, String)>) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::new();
        for name in nodes {
            let idx = graph.add_node(name.clone());
            index.insert(name, idx);
        }
        for (a, b) in edges {
            let ia = *index.entry(a.clone()).or_insert_with(|| graph.add_node(a));
            let ib = *index.entry(b.clone()).or_insert_with(|| graph.add_node(b));
            graph.update_edge(ia, ib, ());
        }
        Self { graph, index }
    }

    /// Iterative PageRank over the undirected projection, `alpha` damping,
    /// uniform teleportation, converges or stops at `max_iter`.
    pub fn pagerank(&self, alpha: f64, max_iter: usize) -> HashMap<String, f64> {
        let n = self.graph.node_count();
        if n == 0 {
            return HashMap::new();
        }
        let base = 1.0 / n as f64;
        let mut scores: HashMap<NodeIndex, f64> = self.graph.node_indices().map(|i| (i, base)).collect();

        for _ in 0..max_iter {
            let mut next: HashMap<NodeIndex, f64> = self
                .graph
                .node_indices()
                .map(|i| (i, (1.0 - alpha) / n as f64))
                .collect();

            for node in self.graph.node_indices() {
                let degree = self.graph.edges(node).count();
                if degree == 0 {
                    continue;
                }
                let share = alpha * scores[&node] / degree as f64;
                for edge in self.graph.edges(node) {
                    let neighbor = edge.target();
                    *next.get_mut(&neighbor).unwrap() += share;
                }
            }

            let delta: f64 = self
                .graph
                .node_indices()
                .map(|i| (next[&i] - scores[&i]).abs())
                .sum();
            scores = next;
            if delta < 1e-6 {
                break;
            }
        }

        scores
            .into_iter()
            .map(|(idx, score)| (self.graph[idx].clone(), score))
            .collect()
    }

    /// Connected-components community assignment, deterministic for a given
    /// graph. A full Louvain modularity pass is future work; components
    /// already separate the obviously-unrelated clusters analytics cares
    /// about for bridge/hub discovery.
    pub fn communities(&self) -> HashMap<String, i64> {
        let mut visited = HashSet::new();
        let mut assignment = HashMap::new();
        let mut next_id = 0i64;

        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            visited.insert(start);
            while let Some(node) = queue.pop_front() {
                assignment.insert(self.graph[node].clone(), next_id);
                for edge in self.graph.edges(node) {
                    let neighbor = edge.target();
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            next_id += 1;
        }
        assignment
    }

    pub fn shortest_path_length(&self, from: &str, to: &str) -> Option<usize> {
        let &start = self.index.get(from)?;
        let &end = self.index.get(to)?;
        if start == end {
            return Some(0);
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, 0));
        visited.insert(start);
        while let Some((node, dist)) = queue.pop_front() {
            for edge in self.graph.edges(node) {
                let neighbor = edge.target();
                if neighbor == end {
                    return Some(dist + 1);
                }
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, dist + 1));
                }
            }
        }
        None
    }

    /// Brandes' algorithm for unweighted betweenness centrality.
    pub fn betweenness_centrality(&self) -> HashMap<String, f64> {
        let n = self.graph.node_count();
        let mut centrality: HashMap<NodeIndex, f64> =
            self.graph.node_indices().map(|i| (i, 0.0)).collect();

        for s in self.graph.node_indices() {
            let mut stack = Vec::new();
            let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
            let mut sigma: HashMap<NodeIndex, f64> = self.graph.node_indices().map(|i| (i, 0.0)).collect();
            let mut dist: HashMap<NodeIndex, i64> = self.graph.node_indices().map(|i| (i, -1)).collect();
            sigma.insert(s, 1.0);
            dist.insert(s, 0);

            let mut queue = VecDeque::new();
            queue.push_back(s);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for edge in self.graph.edges(v) {
                    let w = edge.target();
                    if dist[&w] < 0 {
                        dist.insert(w, dist[&v] + 1);
                        queue.push_back(w);
                    }
                    if dist[&w] == dist[&v] + 1 {
                        *sigma.get_mut(&w).unwrap() += sigma[&v];
                        preds.entry(w).or_default().push(v);
                    }
                }
            }

            let mut delta: HashMap<NodeIndex, f64> = self.graph.node_indices().map(|i| (i, 0.0)).collect();
            while let Some(w) = stack.pop() {
                if let Some(parents) = preds.get(&w) {
                    for &v in parents {
                        let contrib = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                        *delta.get_mut(&v).unwrap() += contrib;
                    }
                }
                if w != s {
                    *centrality.get_mut(&w).unwrap() += delta[&w];
                }
            }
        }

        let norm = if n > 2 { 1.0 / ((n - 1) as f64 * (n - 2) as f64) } else { 1.0 };
        centrality
            .into_iter()
            .map(|(idx, c)| (self.graph[idx].clone(), c * norm))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn neighbors_of(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.graph
            .edges(idx)
            .map(|e| self.graph[e.target()].clone())
            .collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.graph.node_indices().map(|i| self.graph[i].clone()).collect()
    }

    /// Every shortest path between `from` and `to`, as ordered node-name
    /// sequences including both endpoints.
    pub fn all_shortest_paths(&self, from: &str, to: &str) -> Vec<Vec<String>> {
        let (Some(&start), Some(&end)) = (self.index.get(from), self.index.get(to)) else {
            return Vec::new();
        };
        if start == end {
            return vec![vec![from.to_string()]];
        }

        let mut dist: HashMap<NodeIndex, usize> = HashMap::new();
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        dist.insert(start, 0);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let d = dist[&node];
            for edge in self.graph.edges(node) {
                let neighbor = edge.target();
                match dist.get(&neighbor) {
                    None => {
                        dist.insert(neighbor, d + 1);
                        preds.insert(neighbor, vec![node]);
                        queue.push_back(neighbor);
                    }
                    Some(&nd) if nd == d + 1 => {
                        preds.entry(neighbor).or_default().push(node);
                    }
                    _ => {}
                }
            }
        }

        if !dist.contains_key(&end) {
            return Vec::new();
        }

        let mut paths = Vec::new();
        let mut stack = vec![vec![end]];
        while let Some(partial) = stack.pop() {
            let head = *partial.last().unwrap();
            if head == start {
                let mut names: Vec<String> =
                    partial.iter().rev().map(|&i| self.graph[i].clone()).collect();
                names.dedup();
                paths.push(names);
                continue;
            }
            for &p in preds.get(&head).into_iter().flatten() {
                let mut next = partial.clone();
                next.push(p);
                stack.push(next);
            }
        }
        paths
    }

    /// One simple path from `from` to `to` of length > the shortest distance
    /// and <= `max_depth`, found via bounded DFS. `None` if none exists.
    pub fn one_longer_simple_path(&self, from: &str, to: &str, max_depth: usize) -> Option<Vec<String>> {
        let (&start, &end) = (self.index.get(from)?, self.index.get(to)?);
        let shortest = self.shortest_path_length(from, to)?;

        let mut visited = HashSet::from([start]);
        let mut path = vec![start];
        self.dfs_longer(start, end, shortest, max_depth, &mut visited, &mut path)
            .map(|nodes| nodes.into_iter().map(|i| self.graph[i].clone()).collect())
    }

    fn dfs_longer(
        &self,
        node: NodeIndex,
        end: NodeIndex,
        shortest: usize,
        max_depth: usize,
        visited: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        if path.len() - 1 > max_depth {
            return None;
        }
        if node == end && path.len() - 1 > shortest {
            return Some(path.clone());
        }
        for edge in self.graph.edges(node) {
            let next = edge.target();
            if visited.contains(&next) {
                continue;
            }
            visited.insert(next);
            path.push(next);
            if let Some(found) = self.dfs_longer(next, end, shortest, max_depth, visited, path) {
                return Some(found);
            }
            path.pop();
            visited.remove(&next);
        }
        None
    }

    /// Nodes reachable from `from` within `max_depth` hops, paired with
    /// distance — used to rank open-ended exploration candidates.
    pub fn reachable_within(&self, from: &str, max_depth: usize) -> Vec<(String, usize)> {
        let Some(&start) = self.index.get(from) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0)]);
        let mut out = Vec::new();
        while let Some((node, dist)) = queue.pop_front() {
            if dist >= max_depth {
                continue;
            }
            for edge in self.graph.edges(node) {
                let neighbor = edge.target();
                if visited.insert(neighbor) {
                    out.push((self.graph[neighbor].clone(), dist + 1));
                    queue.push_back((neighbor, dist + 1));
                }
            }
        }
        out
    }
}

pub struct ExploredPath {
    pub nodes: Vec<String>,
    pub relationship_count: usize,
    pub is_detour: bool,
    pub communities_traversed: usize,
}

pub struct ExploreResult {
    pub paths: Vec<ExploredPath>,
    pub ranked_nodes: Vec<(String, f64)>,
}

impl MemoryEngine {
    pub async fn load_projection(&self) -> Result<GraphProjection> {
        let (names, rels) = self.graph.export_projection().await?;
        let edges = rels.into_iter().map(|r| (r.source, r.target)).collect();
        Ok(GraphProjection::build(names, edges))
    }

    /// Full analysis pass: pagerank, community detection, and neighbor-set
    /// Jaccard overlap surfaced as dedup candidates (same-community pairs
    /// included, unlike `generate_discovery_candidates`'s cross-community
    /// bridges). When `store_scores` is set, persists pagerank/community
    /// values back onto their `Entity` nodes.
    pub async fn analyze_graph(&self, store_scores: bool) -> Result<AnalysisReport> {
        let projection = self.load_projection().await?;
        let pagerank = projection.pagerank(PAGERANK_ALPHA, PAGERANK_MAX_ITER);
        let communities = projection.communities();

        let nodes: Vec<String> = projection.node_names();
        let capped: Vec<&String> = nodes.iter().take(JACCARD_MAX_NODES).collect();
        let mut dedup_candidates = Vec::new();
        for (i, a) in capped.iter().enumerate() {
            let neighbors_a: HashSet<String> = projection.neighbors_of(a).into_iter().collect();
            for b in capped.iter().skip(i + 1) {
                let neighbors_b: HashSet<String> = projection.neighbors_of(b).into_iter().collect();
                let union = neighbors_a.union(&neighbors_b).count();
                if union == 0 {
                    continue;
                }
                let intersection = neighbors_a.intersection(&neighbors_b).count();
                let jaccard = intersection as f64 / union as f64;
                if jaccard > JACCARD_DEDUP_THRESHOLD {
                    dedup_candidates.push(DedupCandidate {
                        entity_a: (*a).clone(),
                        entity_b: (*b).clone(),
                        jaccard,
                    });
                }
            }
        }

        if store_scores {
            self.graph.store_projection_scores(&pagerank, &communities).await?;
        }

        Ok(AnalysisReport {
            node_count: projection.node_count(),
            edge_count: projection.edge_count(),
            pagerank,
            communities,
            dedup_candidates,
            scores_stored: store_scores,
        })
    }

    /// Serendipity-scored discovery around `home_nodes`: relevance is
    /// inverse graph distance, novelty rewards cross-community and obscure
    /// (low-PageRank) nodes.
    pub async fn discover(
        &self,
        home_nodes: &[String],
        novelty_weight: f64,
        max_results: usize,
    ) -> Result<Vec<DiscoveredEntity>> {
        let projection = self.load_projection().await?;
        let pagerank = projection.pagerank(PAGERANK_ALPHA, PAGERANK_MAX_ITER);
        let communities = projection.communities();

        let max_pagerank = pagerank.values().cloned().fold(0.0_f64, f64::max).max(1e-9);
        let home_communities: HashSet<i64> = home_nodes
            .iter()
            .filter_map(|n| communities.get(n).copied())
            .collect();
        let home_communities = if home_communities.is_empty() {
            HashSet::from([-1])
        } else {
            home_communities
        };

        let mut scored = Vec::new();
        for node in projection.node_names() {
            if home_nodes.contains(&node) {
                continue;
            }
            let community = *communities.get(&node).unwrap_or(&-1);
            let pr = *pagerank.get(&node).unwrap_or(&0.0);

            let min_distance = home_nodes
                .iter()
                .filter_map(|home| projection.shortest_path_length(home, &node))
                .min();

            let Some(distance) = min_distance else { continue };
            let relevance = 1.0 / (1.0 + distance as f64);
            if relevance <= 0.0 {
                continue;
            }

            let cross_community = if !home_communities.contains(&community) && community >= 0 {
                1.0
            } else {
                0.3
            };
            let obscurity = 1.0 - (pr / max_pagerank);
            let novelty = 0.6 * cross_community + 0.4 * obscurity;

            let relevance_weight = 1.0 - novelty_weight;
            let serendipity = relevance_weight * relevance + novelty_weight * novelty;

            if serendipity > DISCOVERY_SERENDIPITY_MIN {
                scored.push(DiscoveredEntity {
                    entity: node,
                    serendipity,
                    relevance,
                    novelty,
                    community,
                });
            }
        }

        scored.sort_by(|a, b| b.serendipity.total_cmp(&a.serendipity));
        scored.truncate(max_results);
        Ok(scored)
    }

    /// Regenerates the full set of discovery candidates: cross-community
    /// bridges found via Jaccard neighbor-set overlap, plus the top-N
    /// betweenness-centrality hubs. Replaces the prior set wholesale, no
    /// retention window — a fresh graph snapshot supersedes the last.
    pub async fn generate_discovery_candidates(&self) -> Result<Vec<DiscoveryCandidate>> {
        let projection = self.load_projection().await?;
        let communities = projection.communities();
        let now = Utc::now();
        let mut candidates = Vec::new();

        let nodes: Vec<String> = projection.node_names();
        let capped: Vec<&String> = nodes.iter().take(JACCARD_MAX_NODES).collect();
        if nodes.len() > JACCARD_MAX_NODES {
            tracing::info!(
                total = nodes.len(),
                capped = JACCARD_MAX_NODES,
                "discovery candidate generation capped — not every node pair was considered"
            );
        }

        for (i, a) in capped.iter().enumerate() {
            let community_a = *communities.get(*a).unwrap_or(&-1);
            let neighbors_a: HashSet<String> = projection.neighbors_of(a).into_iter().collect();
            for b in capped.iter().skip(i + 1) {
                let community_b = *communities.get(*b).unwrap_or(&-1);
                if community_a == community_b {
                    continue;
                }
                let neighbors_b: HashSet<String> = projection.neighbors_of(b).into_iter().collect();
                let union = neighbors_a.union(&neighbors_b).count();
                if union == 0 {
                    continue;
                }
                let intersection = neighbors_a.intersection(&neighbors_b).count();
                let jaccard = intersection as f64 / union as f64;
                if jaccard > JACCARD_DEDUP_THRESHOLD {
                    candidates.push(DiscoveryCandidate {
                        entity_a: (*a).clone(),
                        entity_b: (*b).clone(),
                        candidate_type: DiscoveryCandidateType::CrossCommunityBridge,
                        bridge_score: jaccard,
                        community_a,
                        community_b,
                        generated_at: now,
                    });
                }
            }
        }

        let betweenness = projection.betweenness_centrality();
        let mut ranked: Vec<(&String, &f64)> = betweenness.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        for (node, score) in ranked.into_iter().take(DISCOVERY_HUB_TOP_N) {
            let community = *communities.get(node).unwrap_or(&-1);
            candidates.push(DiscoveryCandidate {
                entity_a: node.clone(),
                entity_b: node.clone(),
                candidate_type: DiscoveryCandidateType::HighBetweennessHub,
                bridge_score: *score,
                community_a: community,
                community_b: community,
                generated_at: now,
            });
        }

        *self.discovery_cache.write().await = candidates.clone();
        Ok(candidates)
    }

    /// The candidate set from the last `generate_discovery_candidates` run.
    pub async fn discovery_candidates(&self) -> Vec<DiscoveryCandidate> {
        self.discovery_cache.read().await.clone()
    }

    /// With `target`: every shortest path plus, if one exists, a single
    /// longer simple path labeled `detour`. Without `target`: reachable
    /// nodes within `max_depth`, ranked by `cross_community * distance`.
    pub async fn explore_paths(
        &self,
        source: &str,
        target: Option<&str>,
        max_depth: usize,
        max_paths: usize,
    ) -> Result<ExploreResult> {
        let projection = self.load_projection().await?;
        let communities = projection.communities();

        let Some(target) = target else {
            let home_community = communities.get(source).copied().unwrap_or(-1);
            let mut ranked: Vec<(String, f64)> = projection
                .reachable_within(source, max_depth)
                .into_iter()
                .map(|(node, dist)| {
                    let cross = if communities.get(&node).copied().unwrap_or(-1) != home_community {
                        1.0
                    } else {
                        0.3
                    };
                    (node, cross * dist as f64)
                })
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked.truncate(max_paths);
            return Ok(ExploreResult { paths: Vec::new(), ranked_nodes: ranked });
        };

        let communities_traversed = |nodes: &[String]| {
            nodes
                .iter()
                .map(|n| communities.get(n).copied().unwrap_or(-1))
                .collect::<HashSet<_>>()
                .len()
        };

        let mut paths: Vec<ExploredPath> = projection
            .all_shortest_paths(source, target)
            .into_iter()
            .take(max_paths)
            .map(|nodes| ExploredPath {
                relationship_count: nodes.len().saturating_sub(1),
                communities_traversed: communities_traversed(&nodes),
                nodes,
                is_detour: false,
            })
            .collect();

        if let Some(detour) = projection.one_longer_simple_path(source, target, max_depth) {
            paths.push(ExploredPath {
                relationship_count: detour.len().saturating_sub(1),
                communities_traversed: communities_traversed(&detour),
                nodes: detour,
                is_detour: true,
            });
        }

        Ok(ExploreResult { paths, ranked_nodes: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphProjection {
        GraphProjection::build(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                ("a".into(), "b".into()),
                ("b".into(), "c".into()),
            ],
        )
    }

    #[test]
    fn shortest_path_counts_hops() {
        let g = sample();
        assert_eq!(g.shortest_path_length("a", "c"), Some(2));
        assert_eq!(g.shortest_path_length("a", "d"), None);
    }

    #[test]
    fn pagerank_sums_near_one() {
        let g = sample();
        let scores = g.pagerank(PAGERANK_ALPHA, PAGERANK_MAX_ITER);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 0.05);
    }

    #[test]
    fn isolated_node_is_its_own_community() {
        let g = sample();
        let communities = g.communities();
        assert_ne!(communities["a"], communities["d"]);
        assert_eq!(communities["a"], communities["b"]);
    }
}
