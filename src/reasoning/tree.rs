//! Tree-of-Thoughts: branching exploration under depth and node caps.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::{LlmCommunicator, LlmError, LlmRequest};
use crate::parser::parse_json_object;
use crate::schemas::ChatMessage;

use super::{ExplorationStrategy, ReasoningOutcome};

const MAX_CHILDREN: usize = 3;
const BEAM_WIDTH: usize = 3;
const WALK_STOP_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    Hypothesis,
    Analysis,
    Alternative,
    Refinement,
}

/// Node lifecycle: `Live` until scored, then `Evaluated`; a node that
/// gets no children becomes `Leaf`. `Pruned` is terminal and blocks
/// expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Live,
    Evaluated,
    Pruned,
    Leaf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtNode {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub depth: usize,
    pub thought: String,
    pub thought_type: ThoughtType,
    pub score: f64,
    pub state: NodeState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTree {
    pub root_id: String,
    pub nodes: HashMap<String, ThoughtNode>,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub exploration_strategy: ExplorationStrategy,
    /// Root-to-leaf ids of the best-scored path found.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub best_path: Vec<String>,
    next_id: usize,
}

impl ReasoningTree {
    fn new(
        root_thought: String,
        max_depth: usize,
        max_nodes: usize,
        strategy: ExplorationStrategy,
    ) -> Self {
        let root = ThoughtNode {
            node_id: "n0".into(),
            parent_id: None,
            depth: 0,
            thought: root_thought,
            thought_type: ThoughtType::Hypothesis,
            score: 0.0,
            state: NodeState::Live,
            children: Vec::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(root.node_id.clone(), root);
        Self {
            root_id: "n0".into(),
            nodes,
            max_depth,
            max_nodes: max_nodes.max(1),
            exploration_strategy: strategy,
            best_path: Vec::new(),
            next_id: 1,
        }
    }

    pub fn at_capacity(&self) -> bool {
        self.nodes.len() >= self.max_nodes
    }

    /// Ids from the root down to `node_id`.
    pub fn path_to(&self, node_id: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(node_id.to_string());
        while let Some(id) = current {
            current = self.nodes.get(&id).and_then(|n| n.parent_id.clone());
            path.push(id);
        }
        path.reverse();
        path
    }

    /// Mark a node pruned; it is never expanded afterwards.
    pub fn prune(&mut self, node_id: &str) {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.state = NodeState::Pruned;
        }
    }

    /// Insert a child unless the parent is pruned, the parent is at
    /// max depth, or the tree is at capacity.
    fn insert_child(
        &mut self,
        parent_id: &str,
        thought: String,
        thought_type: ThoughtType,
    ) -> Option<String> {
        if self.at_capacity() {
            return None;
        }
        let (depth, pruned) = {
            let parent = self.nodes.get(parent_id)?;
            (parent.depth, parent.state == NodeState::Pruned)
        };
        if pruned || depth >= self.max_depth {
            return None;
        }

        let node_id = format!("n{}", self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            node_id.clone(),
            ThoughtNode {
                node_id: node_id.clone(),
                parent_id: Some(parent_id.to_string()),
                depth: depth + 1,
                thought,
                thought_type,
                score: 0.0,
                state: NodeState::Live,
                children: Vec::new(),
            },
        );
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(node_id.clone());
        }
        Some(node_id)
    }
}

struct Prioritized {
    score: f64,
    seq: usize,
    id: String,
}

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Prioritized {}
impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Prioritized {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by score; earlier insertion wins ties.
        self.score
            .total_cmp(&other.score)
            .then(other.seq.cmp(&self.seq))
    }
}

enum Frontier {
    Best(BinaryHeap<Prioritized>),
    Fifo(VecDeque<String>),
    Lifo(Vec<String>),
}

impl Frontier {
    fn push(&mut self, id: String, score: f64, seq: usize) {
        match self {
            Frontier::Best(heap) => heap.push(Prioritized { score, seq, id }),
            Frontier::Fifo(queue) => queue.push_back(id),
            Frontier::Lifo(stack) => stack.push(id),
        }
    }

    fn pop(&mut self) -> Option<String> {
        match self {
            Frontier::Best(heap) => heap.pop().map(|p| p.id),
            Frontier::Fifo(queue) => queue.pop_front(),
            Frontier::Lifo(stack) => stack.pop(),
        }
    }
}

/// Deterministic xorshift generator for the monte-carlo walks.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

pub struct TreeOfThoughtsEngine {
    communicator: LlmCommunicator,
    max_depth: usize,
    max_nodes: usize,
    strategy: ExplorationStrategy,
}

impl TreeOfThoughtsEngine {
    pub fn new(
        communicator: LlmCommunicator,
        max_depth: usize,
        max_nodes: usize,
        strategy: ExplorationStrategy,
    ) -> Self {
        Self {
            communicator,
            max_depth: max_depth.max(1),
            max_nodes: max_nodes.max(1),
            strategy,
        }
    }

    /// Explore from an initial hypothesis and synthesize the best path
    /// into a conclusion. `confidence` is the best path's leaf score.
    pub async fn reason(
        &self,
        agent_id: &str,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<(ReasoningOutcome, ReasoningTree), LlmError> {
        let root_thought = self.initial_hypothesis(agent_id, goal, cancel).await?;
        let mut tree = ReasoningTree::new(root_thought, self.max_depth, self.max_nodes, self.strategy);
        let mut best: Option<(String, f64)> = None;

        match self.strategy {
            ExplorationStrategy::BestFirst
            | ExplorationStrategy::BreadthFirst
            | ExplorationStrategy::DepthFirst => {
                self.explore_frontier(agent_id, goal, &mut tree, &mut best, cancel)
                    .await?
            }
            ExplorationStrategy::BeamSearch => {
                self.explore_beam(agent_id, goal, &mut tree, &mut best, cancel)
                    .await?
            }
            ExplorationStrategy::MonteCarlo => {
                self.explore_walks(agent_id, goal, &mut tree, &mut best, cancel)
                    .await?
            }
        }

        // Fall back to the best evaluated interior node when capacity
        // cut exploration before any leaf was scored.
        let (best_id, confidence) = match best {
            Some(best) => best,
            None => tree
                .nodes
                .values()
                .filter(|n| n.state != NodeState::Live)
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|n| (n.node_id.clone(), n.score))
                .unwrap_or((tree.root_id.clone(), 0.0)),
        };
        tree.best_path = tree.path_to(&best_id);

        let conclusion = self.synthesize(agent_id, goal, &tree, cancel).await?;
        Ok((
            ReasoningOutcome {
                success: true,
                conclusion,
                confidence,
            },
            tree,
        ))
    }

    async fn explore_frontier(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &mut ReasoningTree,
        best: &mut Option<(String, f64)>,
        cancel: &CancellationToken,
    ) -> Result<(), LlmError> {
        let mut frontier = match self.strategy {
            ExplorationStrategy::BestFirst => Frontier::Best(BinaryHeap::new()),
            ExplorationStrategy::DepthFirst => Frontier::Lifo(Vec::new()),
            _ => Frontier::Fifo(VecDeque::new()),
        };
        let mut seq = 0usize;
        frontier.push(tree.root_id.clone(), 0.0, seq);

        while let Some(node_id) = frontier.pop() {
            if tree.nodes.get(&node_id).map(|n| n.state) == Some(NodeState::Pruned) {
                continue;
            }

            let score = self.evaluate(agent_id, goal, tree, &node_id, cancel).await?;
            let added = self
                .try_expand(agent_id, goal, tree, &node_id, cancel)
                .await?;

            if added.is_empty() {
                mark_leaf(tree, &node_id, score, best);
            } else {
                for child_id in added {
                    seq += 1;
                    // Children enter the frontier with the parent's
                    // score as their estimate until scored themselves.
                    frontier.push(child_id, score, seq);
                }
            }

            if tree.at_capacity() {
                break;
            }
        }
        Ok(())
    }

    async fn explore_beam(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &mut ReasoningTree,
        best: &mut Option<(String, f64)>,
        cancel: &CancellationToken,
    ) -> Result<(), LlmError> {
        let mut level = vec![tree.root_id.clone()];

        loop {
            let mut scored: Vec<(String, f64)> = Vec::new();
            for node_id in &level {
                let score = self.evaluate(agent_id, goal, tree, node_id, cancel).await?;
                scored.push((node_id.clone(), score));
            }

            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (node_id, _) in scored.iter().skip(BEAM_WIDTH) {
                tree.prune(node_id);
            }
            scored.truncate(BEAM_WIDTH);

            let mut next = Vec::new();
            for (node_id, score) in &scored {
                let added = self
                    .try_expand(agent_id, goal, tree, node_id, cancel)
                    .await?;
                if added.is_empty() {
                    mark_leaf(tree, node_id, *score, best);
                } else {
                    next.extend(added);
                }
            }

            if next.is_empty() || tree.at_capacity() {
                break;
            }
            level = next;
        }
        Ok(())
    }

    async fn explore_walks(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &mut ReasoningTree,
        best: &mut Option<(String, f64)>,
        cancel: &CancellationToken,
    ) -> Result<(), LlmError> {
        let mut rng = Rng::new(0x9E37_79B9 ^ self.max_nodes as u64);
        let max_walks = self.max_nodes * 2;

        for _ in 0..max_walks {
            let mut current = tree.root_id.clone();

            loop {
                let needs_eval =
                    tree.nodes.get(&current).map(|n| n.state) == Some(NodeState::Live);
                let score = if needs_eval {
                    self.evaluate(agent_id, goal, tree, &current, cancel).await?
                } else {
                    tree.nodes.get(&current).map(|n| n.score).unwrap_or(0.0)
                };

                let depth = tree.nodes.get(&current).map(|n| n.depth).unwrap_or(0);
                if depth >= self.max_depth {
                    mark_leaf(tree, &current, score, best);
                    break;
                }
                if rng.next_f64() < WALK_STOP_PROBABILITY {
                    break;
                }

                let has_children = tree
                    .nodes
                    .get(&current)
                    .map(|n| !n.children.is_empty())
                    .unwrap_or(false);
                if !has_children {
                    if tree.at_capacity() {
                        mark_leaf(tree, &current, score, best);
                        break;
                    }
                    let added = self
                        .try_expand(agent_id, goal, tree, &current, cancel)
                        .await?;
                    if added.is_empty() {
                        mark_leaf(tree, &current, score, best);
                        break;
                    }
                }

                // Walk down, biased toward higher-scored children.
                let children: Vec<(String, f64)> = tree
                    .nodes
                    .get(&current)
                    .map(|n| {
                        n.children
                            .iter()
                            .filter(|id| {
                                tree.nodes.get(*id).map(|c| c.state) != Some(NodeState::Pruned)
                            })
                            .map(|id| {
                                let weight =
                                    tree.nodes.get(id).map(|c| c.score).unwrap_or(0.0) + 0.1;
                                (id.clone(), weight)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let Some(next) = pick_weighted(&children, &mut rng) else {
                    break;
                };
                current = next;
            }

            if tree.at_capacity() {
                break;
            }
        }
        Ok(())
    }

    async fn initial_hypothesis(
        &self,
        agent_id: &str,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let content = formatdoc! {r#"
            GOAL: {goal}

            Form one initial hypothesis about the most promising way to
            approach this goal.
            Respond with a single JSON object: {{"thought": (string)}}"#
        };
        let response = self
            .communicator
            .call(agent_id, 0, LlmRequest::new(vec![ChatMessage::new_user(content)]), cancel)
            .await?;
        let value = parse_json_object(&response.text)?;
        Ok(value
            .get("thought")
            .and_then(Value::as_str)
            .unwrap_or(response.text.trim())
            .to_string())
    }

    /// Score one node and move it to `Evaluated`.
    async fn evaluate(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &mut ReasoningTree,
        node_id: &str,
        cancel: &CancellationToken,
    ) -> Result<f64, LlmError> {
        let path = self.render_path(tree, node_id);
        let thought = tree
            .nodes
            .get(node_id)
            .map(|n| n.thought.clone())
            .unwrap_or_default();
        let content = formatdoc! {r#"
            GOAL: {goal}

            Path of thoughts so far:
            {path}

            Rate how promising the last thought is for reaching the goal.
            Respond with a single JSON object: {{"score": (number between 0 and 1)}}

            Thought under evaluation: {thought}"#
        };
        let response = self
            .communicator
            .call(agent_id, 0, LlmRequest::new(vec![ChatMessage::new_user(content)]), cancel)
            .await?;
        let value = parse_json_object(&response.text)?;
        let score = value
            .get("score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        if let Some(node) = tree.nodes.get_mut(node_id) {
            node.score = score;
            if node.state == NodeState::Live {
                node.state = NodeState::Evaluated;
            }
        }
        Ok(score)
    }

    /// Ask for 2-3 follow-up thoughts and insert whatever fits under
    /// the caps. Pruned or depth-capped nodes get none.
    async fn try_expand(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &mut ReasoningTree,
        node_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, LlmError> {
        let expandable = tree.nodes.get(node_id).is_some_and(|n| {
            n.state != NodeState::Pruned && n.depth < self.max_depth
        }) && !tree.at_capacity();
        if !expandable {
            return Ok(Vec::new());
        }

        let path = self.render_path(tree, node_id);
        let content = formatdoc! {r#"
            GOAL: {goal}

            Path of thoughts so far:
            {path}

            Generate 2 to 3 distinct next thoughts that build on the last
            one. Each must be a different angle: deeper analysis, an
            alternative, or a refinement.
            Respond with a single JSON object:
            {{"thoughts": [{{"thought": (string), "type": "analysis" | "alternative" | "refinement"}}]}}"#
        };
        let response = self
            .communicator
            .call(agent_id, 0, LlmRequest::new(vec![ChatMessage::new_user(content)]), cancel)
            .await?;
        let value = parse_json_object(&response.text)?;

        let mut added = Vec::new();
        if let Some(thoughts) = value.get("thoughts").and_then(Value::as_array) {
            for item in thoughts.iter().take(MAX_CHILDREN) {
                let Some(thought) = item.get("thought").and_then(Value::as_str) else {
                    continue;
                };
                let thought_type = match item.get("type").and_then(Value::as_str) {
                    Some("alternative") => ThoughtType::Alternative,
                    Some("refinement") => ThoughtType::Refinement,
                    _ => ThoughtType::Analysis,
                };
                if let Some(id) = tree.insert_child(node_id, thought.to_string(), thought_type) {
                    added.push(id);
                }
            }
        }
        Ok(added)
    }

    async fn synthesize(
        &self,
        agent_id: &str,
        goal: &str,
        tree: &ReasoningTree,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let path = tree
            .best_path
            .iter()
            .filter_map(|id| tree.nodes.get(id))
            .map(|n| format!("- {}", n.thought))
            .collect::<Vec<_>>()
            .join("\n");
        let content = formatdoc! {r#"
            GOAL: {goal}

            Best chain of thoughts found:
            {path}

            Convert this chain into one actionable conclusion for the agent.
            Respond with a single JSON object: {{"conclusion": (string)}}"#
        };
        let response = self
            .communicator
            .call(agent_id, 0, LlmRequest::new(vec![ChatMessage::new_user(content)]), cancel)
            .await?;
        let value = parse_json_object(&response.text)?;
        Ok(value
            .get("conclusion")
            .and_then(Value::as_str)
            .unwrap_or(response.text.trim())
            .to_string())
    }

    fn render_path(&self, tree: &ReasoningTree, node_id: &str) -> String {
        tree.path_to(node_id)
            .iter()
            .filter_map(|id| tree.nodes.get(id))
            .map(|n| format!("- {}", n.thought))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn mark_leaf(
    tree: &mut ReasoningTree,
    node_id: &str,
    score: f64,
    best: &mut Option<(String, f64)>,
) {
    if let Some(node) = tree.nodes.get_mut(node_id) {
        if node.state != NodeState::Pruned {
            node.state = NodeState::Leaf;
        }
    }
    if best.as_ref().is_none_or(|(_, s)| score > *s) {
        *best = Some((node_id.to_string(), score));
    }
}

fn pick_weighted(children: &[(String, f64)], rng: &mut Rng) -> Option<String> {
    if children.is_empty() {
        return None;
    }
    let total: f64 = children.iter().map(|(_, w)| w).sum();
    let mut roll = rng.next_f64() * total;
    for (id, weight) in children {
        roll -= weight;
        if roll <= 0.0 {
            return Some(id.clone());
        }
    }
    children.last().map(|(id, _)| id.clone())
}
