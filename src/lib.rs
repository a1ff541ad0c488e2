/*!
A variation graph core: a bidirected sequence graph with embedded
paths, the snarl distance index built over it, and the phase
unfolding transformation.

# Overview

The crate is organized around a small set of traits that encapsulate
graph access, in the manner of
[`libhandlegraph`](https://github.com/vgteam/libhandlegraph):

* [`handlegraph`] is for immutable access to the nodes and edges of a graph
* [`mutablehandlegraph`] is for mutable access to nodes and edges
* [`pathgraph`] is for access to the paths embedded in a graph, stored
  as rank-ordered mappings with edits

[`HashGraph`](hashgraph::HashGraph) is the concrete store
implementing all three: a `HashMap`-based graph that does nothing to
reduce its memory footprint, but is fast and survives heavy mutation.

On top of the store:

* [`algorithms`] holds the restructuring suite: topological sorting,
  strongly connected components, DAGification, inversion unfolding,
  unchop, normalization, chopping, and bluntification of overlap
  graphs
* [`snarls`] drives a snarl decomposition into a tree of chains,
  snarls, and nodes
* [`distance_index`] packs that tree into a single integer vector and
  answers minimum-distance queries between graph positions
* [`phase_unfolder`] rebuilds pruned graph regions as disjoint
  haplotype-supported walks
* [`edit`] applies walks-with-edits to the graph, splitting nodes at
  breakpoints and grafting novel sequence

# `Handle`s and `NodeId`s

The core types, used all over the various traits, are defined in
[`handle`]:

* [`NodeId`](handle::NodeId) is a newtype used as a node identifier
* [`Handle`](handle::Handle) represents a specific orientation of a node
* [`Edge`](handle::Edge) is a newtype for edges in a specific order
* [`Pos`](handle::Pos) is a base position on an oriented node

# Misc.

* [`conversion`] has some functions for converting from GFA to a
  handlegraph and back
* [`disjoint`] is a lock-free disjoint-set structure used by the
  component-finding algorithms
*/

pub mod handle;

pub mod handlegraph;
pub mod mutablehandlegraph;
pub mod pathgraph;

pub mod hashgraph;

pub mod algorithms;
pub mod snarls;

pub mod distance_index;
pub mod edit;
pub mod phase_unfolder;

pub mod conversion;
pub mod disjoint;
pub mod error;
pub mod util;
