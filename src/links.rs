//! Reference-counted mesh edges and point adjacency
//!
//! Every unordered point pair used by a wedge is an edge. Its count says how
//! many wedges use it; a finished mesh has every count at exactly 2. The
//! adjacency lists are derived from the edges and are what the stress,
//! erosion and plate algorithms walk.

use std::collections::BTreeMap;

use crate::color::Rgb;
use crate::error::ConsistencyError;
use crate::point::PointId;

/// Highest legal reference count of an edge
pub const MAX_EDGE_COUNT: u8 = 2;

/// Order-independent key of an edge: the smaller id first
#[inline]
pub fn edge_key(a: PointId, b: PointId) -> (PointId, PointId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One edge of the mesh with its per-epoch scratch fields
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Number of wedges using this edge, 1 or 2
    pub count: u8,
    /// Outward force carried along the edge by the stress solver
    pub push_force: f64,
    /// A third of the distance between the two points completing the
    /// edge's wedges
    pub link_width: f64,
    /// Excluded from force transfer for the rest of the stress pass
    pub broken: bool,
    /// The endpoints belong to different plates
    pub plate_crosser: bool,
    /// Average color of the endpoints
    pub color: Rgb,
}

impl Link {
    fn new() -> Self {
        Self {
            count: 1,
            push_force: 0.0,
            link_width: 0.0,
            broken: false,
            plate_crosser: false,
            color: Rgb::BLACK,
        }
    }
}

/// Edge table plus per-point neighbour lists
#[derive(Debug, Clone, Default)]
pub struct LinkSystem {
    edges: BTreeMap<(PointId, PointId), Link>,
    neighbours: Vec<Vec<PointId>>,
}

impl LinkSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all edges and adjacency
    pub fn clear(&mut self) {
        self.edges.clear();
        self.neighbours.clear();
    }

    /// Number of edges
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Register one more wedge using edge `a`-`b`
    ///
    /// # Errors
    ///
    /// `EdgeOverflow` if the edge is already used by two wedges; the table
    /// is left unchanged.
    pub fn add(&mut self, a: PointId, b: PointId) -> Result<(), ConsistencyError> {
        if a == b {
            return Err(ConsistencyError::EdgeOverflow { a, b, count: 0 });
        }
        let key = edge_key(a, b);
        match self.edges.get_mut(&key) {
            Some(link) if link.count >= MAX_EDGE_COUNT => {
                return Err(ConsistencyError::EdgeOverflow {
                    a: key.0,
                    b: key.1,
                    count: link.count + 1,
                })
            }
            Some(link) => link.count += 1,
            None => {
                self.edges.insert(key, Link::new());
                self.link_neighbours(a, b);
                self.link_neighbours(b, a);
            }
        }
        Ok(())
    }

    /// Unregister one wedge from edge `a`-`b`
    ///
    /// When the count reaches zero the edge is deleted and the two points
    /// stop being neighbours. Returns `false` if there was no such edge.
    pub fn remove(&mut self, a: PointId, b: PointId) -> bool {
        let key = edge_key(a, b);
        let Some(link) = self.edges.get_mut(&key) else {
            return false;
        };
        link.count -= 1;
        if link.count == 0 {
            self.edges.remove(&key);
            self.unlink_neighbours(a, b);
            self.unlink_neighbours(b, a);
        }
        true
    }

    /// Delete every edge touching `p`, whatever its count
    pub fn remove_point(&mut self, p: PointId) {
        let others = self.neighbours(p).to_vec();
        for other in others {
            self.edges.remove(&edge_key(p, other));
            self.unlink_neighbours(other, p);
        }
        if let Some(list) = self.neighbours.get_mut(p.index()) {
            list.clear();
        }
    }

    /// Reference count of edge `a`-`b`, 0 if absent
    #[inline]
    pub fn count(&self, a: PointId, b: PointId) -> u8 {
        self.edges.get(&edge_key(a, b)).map_or(0, |l| l.count)
    }

    #[inline]
    pub fn get(&self, a: PointId, b: PointId) -> Option<&Link> {
        self.edges.get(&edge_key(a, b))
    }

    #[inline]
    pub fn get_mut(&mut self, a: PointId, b: PointId) -> Option<&mut Link> {
        self.edges.get_mut(&edge_key(a, b))
    }

    /// Live neighbours of `p`
    #[inline]
    pub fn neighbours(&self, p: PointId) -> &[PointId] {
        self.neighbours.get(p.index()).map_or(&[], Vec::as_slice)
    }

    /// Points adjacent to both `a` and `b`, excluding `a` and `b`
    pub fn common_neighbours(&self, a: PointId, b: PointId) -> Vec<PointId> {
        let nb = self.neighbours(b);
        self.neighbours(a)
            .iter()
            .copied()
            .filter(|p| *p != b && nb.contains(p))
            .collect()
    }

    /// Iterate over edges in key order
    pub fn iter(&self) -> impl Iterator<Item = ((PointId, PointId), &Link)> + '_ {
        self.edges.iter().map(|(k, l)| (*k, l))
    }

    /// Iterate mutably over edges in key order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = ((PointId, PointId), &mut Link)> + '_ {
        self.edges.iter_mut().map(|(k, l)| (*k, l))
    }

    /// All edge keys in order
    pub fn keys(&self) -> Vec<(PointId, PointId)> {
        self.edges.keys().copied().collect()
    }

    /// First edge whose count is not exactly 2, if any
    pub fn first_open_edge(&self) -> Option<((PointId, PointId), u8)> {
        self.edges
            .iter()
            .find(|(_, l)| l.count != MAX_EDGE_COUNT)
            .map(|(k, l)| (*k, l.count))
    }

    fn link_neighbours(&mut self, p: PointId, other: PointId) {
        if self.neighbours.len() <= p.index() {
            self.neighbours.resize_with(p.index() + 1, Vec::new);
        }
        let list = &mut self.neighbours[p.index()];
        if !list.contains(&other) {
            list.push(other);
        }
    }

    fn unlink_neighbours(&mut self, p: PointId, other: PointId) {
        if let Some(list) = self.neighbours.get_mut(p.index()) {
            list.retain(|&q| q != other);
        }
    }
}
