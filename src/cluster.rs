//! Connected-component filtering of a candidate's matched points.
//!
//! Matched points lie on the fitted surface but may form several spatially
//! separate patches; a shape's claim is restricted to the single largest
//! one. Points are binned into a hash grid over the shape's 2-D parametric
//! embedding with cells of side `cluster_epsilon`, occupied cells are
//! unioned across their 8-neighborhoods, and the component with the most
//! points wins. Periodic parametric axes (cylinder seam, torus angles)
//! wrap, so a patch crossing the seam stays one component.

use rustc_hash::FxHashMap;

use crate::shapes::Primitive;
use crate::store::PointStore;

/// Disjoint-set over grid cells, path-halving find.
struct Dsu {
    parent: Vec<u32>,
}

impl Dsu {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Attach the larger root id under the smaller so component
            // representatives are deterministic.
            if ra < rb {
                self.parent[rb as usize] = ra;
            } else {
                self.parent[ra as usize] = rb;
            }
        }
    }
}

/// One parametric axis of the grid: bin width plus optional wrap-around.
#[derive(Clone, Copy)]
struct GridAxis {
    inv_cell: f32,
    bins: Option<i64>,
}

impl GridAxis {
    fn new(cluster_epsilon: f32, period: Option<f32>) -> Self {
        match period {
            // At least one bin; the last bin absorbs the partial remainder
            // so wrapping neighbors line up.
            Some(t) => Self {
                inv_cell: 1.0 / cluster_epsilon,
                bins: Some(((t / cluster_epsilon).floor() as i64).max(1)),
            },
            None => Self {
                inv_cell: 1.0 / cluster_epsilon,
                bins: None,
            },
        }
    }

    fn bin(&self, x: f32, period: Option<f32>) -> i64 {
        match (self.bins, period) {
            (Some(bins), Some(t)) => {
                let wrapped = x.rem_euclid(t);
                ((wrapped * self.inv_cell) as i64).min(bins - 1)
            }
            _ => (x * self.inv_cell).floor() as i64,
        }
    }

    fn neighbor(&self, bin: i64, delta: i64) -> i64 {
        match self.bins {
            Some(bins) => (bin + delta).rem_euclid(bins),
            None => bin + delta,
        }
    }
}

/// Restricts `indices` to the largest connected component under
/// `cluster_epsilon`. Ties go to the component whose first grid cell was
/// seen earliest, which is deterministic for a fixed input order.
pub(crate) fn largest_component(
    shape: &dyn Primitive,
    store: &PointStore,
    indices: &[u32],
    cluster_epsilon: f32,
) -> Vec<u32> {
    if indices.len() <= 1 {
        return indices.to_vec();
    }

    let (period_u, period_v) = shape.periods();
    let axis_u = GridAxis::new(cluster_epsilon, period_u);
    let axis_v = GridAxis::new(cluster_epsilon, period_v);

    // Bin points; occupied cells get dense ids in first-seen order.
    let mut cell_ids: FxHashMap<(i64, i64), u32> = FxHashMap::default();
    let mut cell_coords: Vec<(i64, i64)> = Vec::new();
    let mut point_cell: Vec<u32> = Vec::with_capacity(indices.len());
    for &index in indices {
        let uv = shape.parametric(store.position(index as usize));
        let key = (axis_u.bin(uv.x, period_u), axis_v.bin(uv.y, period_v));
        let next = cell_coords.len() as u32;
        let id = *cell_ids.entry(key).or_insert_with(|| {
            cell_coords.push(key);
            next
        });
        point_cell.push(id);
    }

    // Union occupied cells across 8-neighborhoods.
    let mut dsu = Dsu::new(cell_coords.len());
    for (id, &(cu, cv)) in cell_coords.iter().enumerate() {
        for du in -1..=1i64 {
            for dv in -1..=1i64 {
                if du == 0 && dv == 0 {
                    continue;
                }
                let key = (axis_u.neighbor(cu, du), axis_v.neighbor(cv, dv));
                if let Some(&other) = cell_ids.get(&key) {
                    dsu.union(id as u32, other);
                }
            }
        }
    }

    // Count points per component and keep the biggest.
    let mut component_size: FxHashMap<u32, usize> = FxHashMap::default();
    let roots: Vec<u32> = point_cell.iter().map(|&c| dsu.find(c)).collect();
    for &root in &roots {
        *component_size.entry(root).or_insert(0) += 1;
    }
    let best_root = *component_size
        .iter()
        .max_by_key(|&(&root, &count)| (count, std::cmp::Reverse(root)))
        .map(|(root, _)| root)
        .expect("at least one component");

    indices
        .iter()
        .zip(&roots)
        .filter(|&(_, &root)| root == best_root)
        .map(|(&index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Cylinder, Plane};
    use glam::Vec3;

    fn store_from(positions: Vec<Vec3>) -> PointStore {
        let normals = vec![Vec3::Z; positions.len()];
        PointStore::new(positions, normals).unwrap()
    }

    #[test]
    fn keeps_larger_patch() {
        // Two patches on z = 0 separated by a 1.0 gap; cluster_epsilon 0.1.
        let mut positions = Vec::new();
        for i in 0..20 {
            positions.push(Vec3::new(i as f32 * 0.05, 0.0, 0.0));
        }
        for i in 0..5 {
            positions.push(Vec3::new(3.0 + i as f32 * 0.05, 0.0, 0.0));
        }
        let store = store_from(positions);
        let plane = Plane::new(Vec3::ZERO, Vec3::Z);
        let all: Vec<u32> = (0..store.len() as u32).collect();

        let kept = largest_component(&plane, &store, &all, 0.1);
        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|&i| i < 20));
    }

    #[test]
    fn gap_below_epsilon_merges() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.08, 0.0, 0.0),
            Vec3::new(0.16, 0.0, 0.0),
        ];
        let store = store_from(positions);
        let plane = Plane::new(Vec3::ZERO, Vec3::Z);
        let all: Vec<u32> = (0..3).collect();
        assert_eq!(largest_component(&plane, &store, &all, 0.1).len(), 3);
    }

    #[test]
    fn cylinder_seam_wraps() {
        // A ring of points around a full cylinder circumference: one
        // component even though the angular parameter jumps at ±π.
        let cylinder = Cylinder::new(Vec3::ZERO, Vec3::Z, 1.0);
        let positions: Vec<Vec3> = (0..64)
            .map(|i| {
                let a = i as f32 / 64.0 * std::f32::consts::TAU;
                Vec3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        let store = store_from(positions);
        let all: Vec<u32> = (0..64).collect();
        let kept = largest_component(&cylinder, &store, &all, 0.2);
        assert_eq!(kept.len(), 64);
    }

    #[test]
    fn single_point_passes_through() {
        let store = store_from(vec![Vec3::ZERO]);
        let plane = Plane::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(largest_component(&plane, &store, &[0], 0.1), vec![0]);
    }
}
