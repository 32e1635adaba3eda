use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::Backend;
use crate::bail;
use crate::error::{Error, Result};
use crate::op::Op;
use crate::shape::Shape;
use crate::tensor::Tensor;

// Graph — append-only operation recording with lazy evaluation
//
// The graph stores one record per applied operation. Records are kept in an
// arena (a growable Vec) and refer to each other by position, so there are
// no owning pointers between nodes and no cycles to manage: back-references
// (consumer lists) are plain index lists.
//
// Central invariant: positions are assigned in strictly increasing creation
// order and every operand position is strictly less than the node's own
// position. Creation order is therefore already a valid topological order,
// and neither forward nor backward ever needs to sort: forward recurses
// down operand positions, backward walks positions from high to low.

/// Process-unique identity of one Graph instance, used to detect handles
/// crossing between graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GraphId(u64);

impl GraphId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        GraphId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handle to one node of a [`Graph`]: the graph's identity plus the node's
/// position. Carries no data itself; all state lives in the graph. A handle
/// is only meaningful for the graph that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    graph: GraphId,
    index: usize,
}

impl Node {
    /// The node's position in its graph's creation order.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Everything the graph keeps per node. The shape is fixed at creation; the
/// value is written at most once (first forward visit); the gradient only
/// ever accumulates.
struct NodeRecord<B: Backend> {
    shape: Shape,
    op: Box<dyn Op<B>>,
    args: Vec<usize>,
    consumers: Vec<usize>,
    value: Option<Tensor<B>>,
    grad: Option<Tensor<B>>,
}

/// An append-only computation graph with lazy forward evaluation and
/// reverse-mode differentiation.
pub struct Graph<B: Backend> {
    id: GraphId,
    nodes: Vec<NodeRecord<B>>,
}

impl<B: Backend> Default for Graph<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Graph<B> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph {
            id: GraphId::new(),
            nodes: Vec::new(),
        }
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no node has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate a handle against this graph.
    ///
    /// A handle from a different graph is a reported error: mixing handles
    /// across independently-owned graphs is a plausible caller mistake. An
    /// out-of-range position is not: positions are only ever produced by
    /// the graph itself, so it means the handle was corrupted, and this
    /// panics rather than risking silent data corruption.
    fn check_node(&self, node: Node) -> Result<()> {
        if node.graph != self.id {
            return Err(Error::GraphMismatch { node: node.index });
        }
        if node.index >= self.nodes.len() {
            panic!(
                "node index {} out of range for a graph with {} node(s); \
                 handles are only produced by their own graph, so this \
                 indicates a corrupted handle",
                node.index,
                self.nodes.len()
            );
        }
        Ok(())
    }

    /// Record one operation applied to existing nodes and return the handle
    /// of the result.
    ///
    /// Shape inference runs eagerly here, before anything is recorded:
    /// a shape mismatch aborts the call with the graph unchanged
    /// (all-or-nothing), which surfaces dimension errors immediately instead
    /// of after expensive numeric work.
    pub fn apply<O>(&mut self, op: O, args: &[Node]) -> Result<Node>
    where
        O: Op<B> + 'static,
    {
        let mut arg_ids = Vec::with_capacity(args.len());
        for &arg in args {
            self.check_node(arg)?;
            arg_ids.push(arg.index);
        }
        let arg_shapes: Vec<&Shape> = arg_ids.iter().map(|&i| &self.nodes[i].shape).collect();
        let shape = op.infer_shape(&arg_shapes)?;

        let index = self.nodes.len();
        for &arg in &arg_ids {
            self.nodes[arg].consumers.push(index);
        }
        self.nodes.push(NodeRecord {
            shape,
            op: Box::new(op),
            args: arg_ids,
            consumers: Vec::new(),
            value: None,
            grad: None,
        });
        Ok(Node {
            graph: self.id,
            index,
        })
    }

    /// Ensure the value of `node` (and of everything it depends on) has been
    /// computed, and return it.
    ///
    /// Values are memoized for the graph's whole lifetime: repeated forward
    /// calls over overlapping subgraphs evaluate each node at most once,
    /// ever, and a stored value is never recomputed or replaced.
    pub fn forward(&mut self, node: Node) -> Result<&Tensor<B>> {
        self.check_node(node)?;
        self.realize(node.index)?;
        match &self.nodes[node.index].value {
            Some(value) => Ok(value),
            None => bail!("node {} has no value after forward evaluation", node.index),
        }
    }

    fn realize(&mut self, index: usize) -> Result<Tensor<B>> {
        if let Some(value) = &self.nodes[index].value {
            return Ok(value.clone());
        }
        let arg_ids = self.nodes[index].args.clone();
        let mut arg_values = Vec::with_capacity(arg_ids.len());
        for arg in arg_ids {
            arg_values.push(self.realize(arg)?);
        }
        let arg_refs: Vec<&Tensor<B>> = arg_values.iter().collect();
        let value = self.nodes[index].op.forward(&arg_refs)?;
        self.nodes[index].value = Some(value.clone());
        Ok(value)
    }

    /// Compute gradients of `node` with respect to every node that
    /// contributed to it.
    ///
    /// The target's gradient is seeded with an all-ones tensor of its shape
    /// (the identity for the scalar-reduction convention), allocated through
    /// the device of the target's realized value. Positions are then visited
    /// from the target down to 0. Because creation order is topological,
    /// every node's own gradient is complete (all consumers have
    /// contributed) before the node propagates to its operands. A node the
    /// forward path never reached is skipped, as is a realized node that
    /// accumulated no gradient (it is not an antecedent of the target, so
    /// its contribution is zero).
    ///
    /// Fails if the target's value was never realized, or if the target
    /// already carries a gradient: differentiation from a given target is
    /// single-use.
    pub fn backward(&mut self, node: Node) -> Result<()> {
        self.check_node(node)?;
        let (shape, device) = {
            let rec = &self.nodes[node.index];
            let value = match &rec.value {
                Some(value) => value,
                None => return Err(Error::NotCalculated { node: node.index }),
            };
            if rec.grad.is_some() {
                return Err(Error::AlreadyDifferentiated { node: node.index });
            }
            (rec.shape.clone(), value.device().clone())
        };
        self.nodes[node.index].grad = Some(Tensor::ones(&shape, &device)?);

        for index in (0..=node.index).rev() {
            let (value, grad, arg_ids) = {
                let rec = &self.nodes[index];
                match (&rec.value, &rec.grad) {
                    (Some(value), Some(grad)) => {
                        (value.clone(), grad.clone(), rec.args.clone())
                    }
                    _ => continue,
                }
            };
            let mut arg_values = Vec::with_capacity(arg_ids.len());
            for &arg in &arg_ids {
                match &self.nodes[arg].value {
                    Some(value) => arg_values.push(value.clone()),
                    None => bail!("operand {} of node {} has no value", arg, index),
                }
            }
            let arg_refs: Vec<&Tensor<B>> = arg_values.iter().collect();
            let contributions = self.nodes[index].op.backward(&value, &grad, &arg_refs)?;
            if contributions.len() != arg_ids.len() {
                bail!(
                    "op {} returned {} gradient contribution(s) for {} operand(s)",
                    self.nodes[index].op.name(),
                    contributions.len(),
                    arg_ids.len()
                );
            }
            for (&arg, contribution) in arg_ids.iter().zip(contributions) {
                self.accumulate(arg, contribution)?;
            }
        }
        Ok(())
    }

    /// Add one contribution into a node's gradient buffer. The buffer is
    /// created on first contact and only ever grows by addition.
    fn accumulate(&mut self, index: usize, contribution: Tensor<B>) -> Result<()> {
        let rec = &mut self.nodes[index];
        rec.grad = Some(match rec.grad.take() {
            Some(grad) => grad.add(&contribution)?,
            None => contribution,
        });
        Ok(())
    }

    // Introspection

    /// The inferred shape of a node.
    pub fn shape(&self, node: Node) -> Result<&Shape> {
        self.check_node(node)?;
        Ok(&self.nodes[node.index].shape)
    }

    /// The realized value of a node, or `None` if forward evaluation has not
    /// reached it yet. Absence is not zero.
    pub fn value(&self, node: Node) -> Result<Option<&Tensor<B>>> {
        self.check_node(node)?;
        Ok(self.nodes[node.index].value.as_ref())
    }

    /// The accumulated gradient of a node, or `None` if differentiation has
    /// not reached it yet. Absence is not zero.
    pub fn gradient(&self, node: Node) -> Result<Option<&Tensor<B>>> {
        self.check_node(node)?;
        Ok(self.nodes[node.index].grad.as_ref())
    }

    /// Handles of the node's operands, in operand order.
    pub fn operands(&self, node: Node) -> Result<Vec<Node>> {
        self.check_node(node)?;
        Ok(self.nodes[node.index]
            .args
            .iter()
            .map(|&index| Node {
                graph: self.id,
                index,
            })
            .collect())
    }

    /// Handles of the nodes that consume this node as an operand.
    pub fn consumers(&self, node: Node) -> Result<Vec<Node>> {
        self.check_node(node)?;
        Ok(self.nodes[node.index]
            .consumers
            .iter()
            .map(|&index| Node {
                graph: self.id,
                index,
            })
            .collect())
    }
}

impl<B: Backend> fmt::Display for Graph<B> {
    /// Diagnostic dump: one line per node with its shape, op name, operand
    /// positions and consumer positions. Reading the dump never changes
    /// graph state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "computation graph with {} node(s):", self.nodes.len())?;
        for (index, rec) in self.nodes.iter().enumerate() {
            writeln!(
                f,
                "  [{}]: shape={}, op={}, operands={:?}, consumers={:?}",
                index,
                rec.shape,
                rec.op.name(),
                rec.args,
                rec.consumers
            )?;
        }
        Ok(())
    }
}
