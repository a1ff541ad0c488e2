/*!

Unchop: merge every simple component of the graph into a single node,
collapsing the paths that run over it.

*/

use crate::{
    handle::Handle,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
};

use super::simple_components;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

/// Merge all maximal simple components. Returns the merged handles,
/// one per component of two or more nodes.
pub fn unchop(graph: &mut HashGraph) -> Vec<Handle> {
    let components = simple_components(graph, 2);

    debug!("unchop: merging {} simple components", components.len());

    let mut merged = Vec::with_capacity(components.len());
    for comp in components {
        let handle = graph
            .concat_handles(&comp)
            .expect("simple component was not concatenable");
        merged.push(handle);
    }

    merged
}
