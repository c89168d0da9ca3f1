//! Buffer delays between consecutive bundles.
//!
//! Walking the bundles in cycle order, each bundle is pushed later by the
//! largest buffer configured between a class in the previous bundle and a
//! class in this one, on top of the delays of all earlier bundles. Later
//! instructions never move less than earlier ones, so dependencies and
//! resource occupancy stay valid.

use tracing::debug;

use crate::platform::{Platform, ResourceClass};

/// Delay every bundle of `start` and return the per-instruction delay.
pub(crate) fn insert_buffers(platform: &Platform, classes: &[ResourceClass], start: &mut [u64]) -> Vec<u64> {
    let mut order: Vec<usize> = (0..start.len()).collect();
    order.sort_by_key(|&op| (start[op], op));

    let mut delay = vec![0; start.len()];
    let mut previous: Vec<ResourceClass> = vec![];
    let mut accumulated = 0;
    let mut at = 0;
    while at < order.len() {
        let cycle = start[order[at]];
        let len = order[at..].iter().take_while(|&&op| start[op] == cycle).count();
        let bundle = &order[at..at + len];

        let mut current: Vec<ResourceClass> = bundle.iter().map(|&op| classes[op]).collect();
        current.sort_unstable_by_key(|&class| class as u8);
        current.dedup();

        let buffer = previous
            .iter()
            .flat_map(|&from| current.iter().map(move |&to| (from, to)))
            .map(|(from, to)| platform.buffer_cycles(from, to))
            .max()
            .unwrap_or(0);
        accumulated += buffer;
        for &op in bundle {
            delay[op] = accumulated;
        }

        previous = current;
        at += len;
    }

    for (op, cycle) in start.iter_mut().enumerate() {
        *cycle += delay[op];
    }
    debug!(added = accumulated, "buffer delays inserted");
    delay
}
