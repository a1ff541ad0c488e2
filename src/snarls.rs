/*!

Snarl/chain decomposition: the finder capability trait, a replayable
stored decomposition, and the stack-driven builder that turns a
decomposition traversal into a navigable tree of chains, snarls, and
boundary nodes.

The decomposition itself is computed externally; this module only
consumes the properly nested callback sequence the finder emits.

*/

use fnv::FnvHashMap;

use crate::{
    error::{GraphError, Result},
    handle::{Handle, NodeId},
    handlegraph::HandleGraph,
};

#[allow(unused_imports)]
use log::{debug, info};

/// A capability that can walk a snarl decomposition in properly
/// nested order: every chain encloses its snarls, every snarl its
/// child chains. Callbacks receive the boundary traversal: chain
/// starts face into the chain, chain ends face out, snarl starts face
/// in, snarl ends face out.
pub trait SnarlFinder {
    fn traverse_decomposition(
        &self,
        on_chain_start: &mut dyn FnMut(Handle),
        on_chain_end: &mut dyn FnMut(Handle),
        on_snarl_start: &mut dyn FnMut(Handle),
        on_snarl_end: &mut dyn FnMut(Handle),
    );
}

/// One event of a recorded decomposition traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionEvent {
    ChainStart(Handle),
    ChainEnd(Handle),
    SnarlStart(Handle),
    SnarlEnd(Handle),
}

/// A decomposition captured as an event list, replayable any number
/// of times. This is the bridge for decompositions computed by
/// external tools.
#[derive(Debug, Clone, Default)]
pub struct StoredDecomposition {
    pub events: Vec<DecompositionEvent>,
}

impl StoredDecomposition {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn chain_start(mut self, handle: Handle) -> Self {
        self.events.push(DecompositionEvent::ChainStart(handle));
        self
    }

    pub fn chain_end(mut self, handle: Handle) -> Self {
        self.events.push(DecompositionEvent::ChainEnd(handle));
        self
    }

    pub fn snarl_start(mut self, handle: Handle) -> Self {
        self.events.push(DecompositionEvent::SnarlStart(handle));
        self
    }

    pub fn snarl_end(mut self, handle: Handle) -> Self {
        self.events.push(DecompositionEvent::SnarlEnd(handle));
        self
    }

    /// A single-node chain, the shape interior nodes take in a full
    /// decomposition.
    pub fn node_chain(self, handle: Handle) -> Self {
        self.chain_start(handle).chain_end(handle)
    }
}

impl SnarlFinder for StoredDecomposition {
    fn traverse_decomposition(
        &self,
        on_chain_start: &mut dyn FnMut(Handle),
        on_chain_end: &mut dyn FnMut(Handle),
        on_snarl_start: &mut dyn FnMut(Handle),
        on_snarl_end: &mut dyn FnMut(Handle),
    ) {
        for event in self.events.iter() {
            match *event {
                DecompositionEvent::ChainStart(h) => on_chain_start(h),
                DecompositionEvent::ChainEnd(h) => on_chain_end(h),
                DecompositionEvent::SnarlStart(h) => on_snarl_start(h),
                DecompositionEvent::SnarlEnd(h) => on_snarl_end(h),
            }
        }
    }
}

/// A snarl: two boundary traversals and the child chains between
/// them. Trivial snarls (boundaries directly adjacent, no interior)
/// are tagged but stay in the tree so chain positions remain dense.
#[derive(Debug, Clone)]
pub struct Snarl {
    pub start: Handle,
    pub end: Handle,
    pub parent_chain: usize,
    pub children: Vec<usize>,
    pub trivial: bool,
}

/// A chain: boundary node traversals alternating with the snarls
/// that join them. `nodes[i]` and `nodes[i + 1]` bound `snarls[i]`.
#[derive(Debug, Clone)]
pub struct Chain {
    pub start: Handle,
    pub end: Handle,
    pub parent_snarl: Option<usize>,
    pub nodes: Vec<Handle>,
    pub snarls: Vec<usize>,
}

/// The decomposition forest: chains and snarls in discovery order,
/// with the root chains of each connected component.
#[derive(Debug, Clone, Default)]
pub struct SnarlTree {
    pub chains: Vec<Chain>,
    pub snarls: Vec<Snarl>,
    pub roots: Vec<usize>,
    /// chain membership of every boundary node: (chain, position)
    pub node_chain: FnvHashMap<NodeId, (usize, usize)>,
}

impl SnarlTree {
    pub fn chain_of_node(&self, id: NodeId) -> Option<(usize, usize)> {
        self.node_chain.get(&id).copied()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn snarl_count(&self) -> usize {
        self.snarls.len()
    }

    /// Depth of a chain in the forest; roots are depth zero.
    pub fn chain_depth(&self, mut chain: usize) -> usize {
        let mut depth = 0;
        while let Some(snarl) = self.chains[chain].parent_snarl {
            chain = self.snarls[snarl].parent_chain;
            depth += 1;
        }
        depth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Chain(usize),
    Snarl(usize),
}

/// Drive the finder and assemble the snarl tree, checking that the
/// callbacks arrive properly nested.
pub fn build_snarl_tree<G: HandleGraph, F: SnarlFinder>(
    graph: &G,
    finder: &F,
) -> Result<SnarlTree> {
    use std::cell::RefCell;

    // the callbacks run strictly sequentially, but each needs
    // mutable access to the shared builder state
    let state = RefCell::new((
        SnarlTree::default(),
        Vec::<Frame>::new(),
        None::<GraphError>,
    ));

    let fail = |error: &mut Option<GraphError>, msg: &str| {
        if error.is_none() {
            *error = Some(GraphError::invariant(msg.to_string()));
        }
    };

    let mut on_chain_start = |h: Handle| {
        let mut guard = state.borrow_mut();
        let (tree, stack, error) = &mut *guard;
        let chain_ix = tree.chains.len();
        let parent_snarl = match stack.last() {
            Some(Frame::Snarl(s)) => Some(*s),
            Some(Frame::Chain(_)) => {
                fail(error, "chain started directly inside a chain");
                None
            }
            None => None,
        };
        if let Some(s) = parent_snarl {
            tree.snarls[s].children.push(chain_ix);
        } else {
            tree.roots.push(chain_ix);
        }
        tree.node_chain.insert(h.id(), (chain_ix, 0));
        tree.chains.push(Chain {
            start: h,
            end: h,
            parent_snarl,
            nodes: vec![h],
            snarls: vec![],
        });
        stack.push(Frame::Chain(chain_ix));
    };

    let mut on_chain_end = |h: Handle| {
        let mut guard = state.borrow_mut();
        let (tree, stack, error) = &mut *guard;
        match stack.pop() {
            Some(Frame::Chain(c)) => {
                tree.chains[c].end = h;
            }
            _ => fail(error, "chain end without a matching chain start"),
        }
    };

    let mut on_snarl_start = |h: Handle| {
        let mut guard = state.borrow_mut();
        let (tree, stack, error) = &mut *guard;
        match stack.last() {
            Some(Frame::Chain(c)) => {
                let parent_chain = *c;
                let snarl_ix = tree.snarls.len();
                tree.snarls.push(Snarl {
                    start: h,
                    end: h,
                    parent_chain,
                    children: vec![],
                    trivial: false,
                });
                stack.push(Frame::Snarl(snarl_ix));
            }
            _ => fail(error, "snarl started outside of any chain"),
        }
    };

    let mut on_snarl_end = |h: Handle| {
        let mut guard = state.borrow_mut();
        let (tree, stack, error) = &mut *guard;
        match stack.pop() {
            Some(Frame::Snarl(s)) => {
                tree.snarls[s].end = h;
                match stack.last() {
                    Some(Frame::Chain(c)) => {
                        let c = *c;
                        let pos = tree.chains[c].nodes.len();
                        tree.node_chain.insert(h.id(), (c, pos));
                        tree.chains[c].nodes.push(h);
                        tree.chains[c].snarls.push(s);
                    }
                    _ => fail(error, "snarl ended outside of its chain"),
                }
            }
            _ => fail(error, "snarl end without a matching snarl start"),
        }
    };

    finder.traverse_decomposition(
        &mut on_chain_start,
        &mut on_chain_end,
        &mut on_snarl_start,
        &mut on_snarl_end,
    );

    let (mut tree, stack, error) = state.into_inner();

    if let Some(err) = error {
        return Err(err);
    }
    if !stack.is_empty() {
        return Err(GraphError::invariant(
            "decomposition traversal ended mid-structure",
        ));
    }

    // tag trivial snarls: boundaries directly adjacent, no children
    for snarl in tree.snarls.iter_mut() {
        snarl.trivial =
            snarl.children.is_empty() && graph.has_edge(snarl.start, snarl.end);
    }

    debug!(
        "snarl tree: {} chains, {} snarls, {} roots",
        tree.chains.len(),
        tree.snarls.len(),
        tree.roots.len()
    );

    Ok(tree)
}

/// The canonical decomposition of a simple bubble graph, used by
/// tests and examples throughout the crate: a root chain from
/// `start` to `end` around one snarl whose interior nodes each form
/// a single-node chain.
pub fn bubble_decomposition(
    start: Handle,
    interior: &[Handle],
    end: Handle,
) -> StoredDecomposition {
    let mut dec = StoredDecomposition::new()
        .chain_start(start)
        .snarl_start(start);
    for &h in interior {
        dec = dec.node_chain(h);
    }
    dec.snarl_end(end).chain_end(end)
}
