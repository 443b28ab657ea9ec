//! Memoization of flow functions.
//!
//! The solver queries the flow function of an edge once per propagated fact.
//! The cache builds each flow function on first use and hands out shared
//! clones afterwards, so problems can construct closures without worrying
//! about how often an edge is visited.
//!
//! Edge functions are not cached: in this framework they are small enum
//! values and constructing one is cheaper than a map lookup.

use super::flow_function::FlowFunction;
use crate::intermediate_representation::Tid;
use fnv::FnvHashMap;
use petgraph::graph::NodeIndex;
use std::rc::Rc;

/// A cache of the flow functions of a solve,
/// keyed by the nodes (and callees) that identify the flow.
pub struct FlowFunctionCache<D> {
    normal: FnvHashMap<(NodeIndex, NodeIndex), Rc<FlowFunction<D>>>,
    call: FnvHashMap<(NodeIndex, Tid), Rc<FlowFunction<D>>>,
    /// Keyed by `(call, exit, return site)`.
    /// The callee is determined by its exit node.
    ret: FnvHashMap<(NodeIndex, NodeIndex, NodeIndex), Rc<FlowFunction<D>>>,
    call_to_return: FnvHashMap<(NodeIndex, NodeIndex), Rc<FlowFunction<D>>>,
}

impl<D> FlowFunctionCache<D> {
    /// Create an empty cache.
    pub fn new() -> FlowFunctionCache<D> {
        FlowFunctionCache {
            normal: FnvHashMap::default(),
            call: FnvHashMap::default(),
            ret: FnvHashMap::default(),
            call_to_return: FnvHashMap::default(),
        }
    }

    /// The flow function of the intraprocedural edge `curr -> succ`.
    pub fn normal(
        &mut self,
        curr: NodeIndex,
        succ: NodeIndex,
        build: impl FnOnce() -> FlowFunction<D>,
    ) -> Rc<FlowFunction<D>> {
        self.normal
            .entry((curr, succ))
            .or_insert_with(|| Rc::new(build()))
            .clone()
    }

    /// The flow function into the given callee of a call node.
    pub fn call(
        &mut self,
        call: NodeIndex,
        callee: &Tid,
        build: impl FnOnce() -> FlowFunction<D>,
    ) -> Rc<FlowFunction<D>> {
        if let Some(flow) = self.call.get(&(call, callee.clone())) {
            return flow.clone();
        }
        let flow = Rc::new(build());
        self.call.insert((call, callee.clone()), flow.clone());
        flow
    }

    /// The flow function from a callee exit back to the return site of a call.
    pub fn ret(
        &mut self,
        call: NodeIndex,
        exit: NodeIndex,
        return_site: NodeIndex,
        build: impl FnOnce() -> FlowFunction<D>,
    ) -> Rc<FlowFunction<D>> {
        self.ret
            .entry((call, exit, return_site))
            .or_insert_with(|| Rc::new(build()))
            .clone()
    }

    /// The flow function bypassing a call towards its return site.
    pub fn call_to_return(
        &mut self,
        call: NodeIndex,
        return_site: NodeIndex,
        build: impl FnOnce() -> FlowFunction<D>,
    ) -> Rc<FlowFunction<D>> {
        self.call_to_return
            .entry((call, return_site))
            .or_insert_with(|| Rc::new(build()))
            .clone()
    }

    /// The number of cached flow functions.
    pub fn len(&self) -> usize {
        self.normal.len() + self.call.len() + self.ret.len() + self.call_to_return.len()
    }

    /// Return `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D> Default for FlowFunctionCache<D> {
    fn default() -> FlowFunctionCache<D> {
        FlowFunctionCache::new()
    }
}
