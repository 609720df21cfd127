//! Quadric-error edge-collapse simplification.
//!
//! Operates on flat index/attribute arrays: collapses merge one endpoint
//! into the other (vertices never move), so the reduced index list still
//! references the original vertex arrays and a compaction pass densifies
//! afterwards. Locked vertices are never merged away; when UVs are present
//! their distortion enters the collapse cost.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use glbopt_core::SimplifyParams;
use priority_queue::PriorityQueue;

const DEAD: u32 = u32::MAX;

/// Quadric stored as the upper triangle of the symmetric 4x4 matrix:
/// `[aa, ab, ac, ad, bb, bc, bd, cc, cd, dd]`.
type Quadric = [f64; 10];

fn plane_quadric(a: f64, b: f64, c: f64, d: f64) -> Quadric {
    [
        a * a,
        a * b,
        a * c,
        a * d,
        b * b,
        b * c,
        b * d,
        c * c,
        c * d,
        d * d,
    ]
}

fn add_quadric(dst: &mut Quadric, src: &Quadric) {
    for i in 0..10 {
        dst[i] += src[i];
    }
}

fn eval_quadric(q: &Quadric, p: [f64; 3]) -> f64 {
    let [x, y, z] = p;
    (q[0] * x * x
        + 2.0 * q[1] * x * y
        + 2.0 * q[2] * x * z
        + 2.0 * q[3] * x
        + q[4] * y * y
        + 2.0 * q[5] * y * z
        + 2.0 * q[6] * y
        + q[7] * z * z
        + 2.0 * q[8] * z
        + q[9])
        .max(0.0)
}

/// Collapse priority for one edge. The ordering is reversed so the queue's
/// maximum is the cheapest collapse; ties break on vertex ids so runs are
/// reproducible.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    v1: u32,
    v2: u32,
    keep: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.v1.cmp(&self.v1))
            .then_with(|| other.v2.cmp(&self.v2))
    }
}

/// Canonical queue key for an undirected edge.
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

struct Mesh<'a> {
    positions: Vec<[f64; 3]>,
    uvs: Option<&'a [f32]>,
    uv_weight: f64,
    quadrics: Vec<Quadric>,
    adjacency: Vec<BTreeSet<u32>>,
    locked: Vec<bool>,
    triangles: Vec<[u32; 3]>,
    incident: Vec<Vec<u32>>,
    collapse_target: Vec<u32>,
    live_triangles: usize,
}

impl<'a> Mesh<'a> {
    fn build(params: &SimplifyParams<'a>) -> Option<Mesh<'a>> {
        let vertex_count = params.positions.len() / 3;
        if vertex_count == 0 || params.indices.len() < 3 {
            return None;
        }

        // Normalize scale so costs and the error threshold live in
        // bounding-box-relative parameter space.
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for p in params.positions.chunks_exact(3) {
            for i in 0..3 {
                min[i] = min[i].min(p[i] as f64);
                max[i] = max[i].max(p[i] as f64);
            }
        }
        let diagonal = ((max[0] - min[0]).powi(2)
            + (max[1] - min[1]).powi(2)
            + (max[2] - min[2]).powi(2))
        .sqrt();
        if !(diagonal > 0.0) || !diagonal.is_finite() {
            return None;
        }

        let positions: Vec<[f64; 3]> = params
            .positions
            .chunks_exact(3)
            .map(|p| {
                [
                    p[0] as f64 / diagonal,
                    p[1] as f64 / diagonal,
                    p[2] as f64 / diagonal,
                ]
            })
            .collect();

        let mut triangles = Vec::with_capacity(params.indices.len() / 3);
        let mut adjacency = vec![BTreeSet::new(); vertex_count];
        let mut incident = vec![Vec::new(); vertex_count];
        let mut edge_faces: HashMap<(u32, u32), u32> = HashMap::new();

        for chunk in params.indices.chunks_exact(3) {
            let [a, b, c] = [chunk[0], chunk[1], chunk[2]];
            if a as usize >= vertex_count || b as usize >= vertex_count || c as usize >= vertex_count
            {
                continue;
            }
            if a == b || b == c || c == a {
                continue;
            }
            let t = triangles.len() as u32;
            triangles.push([a, b, c]);
            for &(x, y) in &[(a, b), (b, c), (c, a)] {
                adjacency[x as usize].insert(y);
                adjacency[y as usize].insert(x);
                *edge_faces.entry((x.min(y), x.max(y))).or_insert(0) += 1;
            }
            incident[a as usize].push(t);
            incident[b as usize].push(t);
            incident[c as usize].push(t);
        }
        if triangles.is_empty() {
            return None;
        }

        let mut locked = match params.vertex_lock {
            Some(mask) => {
                let mut locked = vec![false; vertex_count];
                for (v, &l) in mask.iter().enumerate().take(vertex_count) {
                    locked[v] = l;
                }
                locked
            }
            None => vec![false; vertex_count],
        };
        if params.lock_border {
            for (&(a, b), &faces) in &edge_faces {
                if faces == 1 {
                    locked[a as usize] = true;
                    locked[b as usize] = true;
                }
            }
        }

        let mut quadrics = vec![[0.0f64; 10]; vertex_count];
        for tri in &triangles {
            let p0 = positions[tri[0] as usize];
            let p1 = positions[tri[1] as usize];
            let p2 = positions[tri[2] as usize];
            let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
            let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
            let nx = e1[1] * e2[2] - e1[2] * e2[1];
            let ny = e1[2] * e2[0] - e1[0] * e2[2];
            let nz = e1[0] * e2[1] - e1[1] * e2[0];
            let len = (nx * nx + ny * ny + nz * nz).sqrt();
            if len < 1e-18 {
                continue;
            }
            let (a, b, c) = (nx / len, ny / len, nz / len);
            let d = -(a * p0[0] + b * p0[1] + c * p0[2]);
            let q = plane_quadric(a, b, c, d);
            for &v in tri {
                add_quadric(&mut quadrics[v as usize], &q);
            }
        }

        let live_triangles = triangles.len();
        let uvs = params.uvs.filter(|u| u.len() >= vertex_count * 2);
        Some(Mesh {
            positions,
            uvs,
            uv_weight: params.uv_weight as f64,
            quadrics,
            adjacency,
            locked,
            triangles,
            incident,
            collapse_target: (0..vertex_count as u32).collect(),
            live_triangles,
        })
    }

    fn resolve(&self, mut v: u32) -> u32 {
        while self.collapse_target[v as usize] != v {
            v = self.collapse_target[v as usize];
        }
        v
    }

    /// Cost of collapsing edge (v1, v2) and the surviving endpoint, or
    /// `None` when the edge may not collapse.
    fn edge_cost(&self, v1: u32, v2: u32) -> Option<(f64, u32)> {
        let l1 = self.locked[v1 as usize];
        let l2 = self.locked[v2 as usize];
        if l1 && l2 {
            return None;
        }

        let mut q = self.quadrics[v1 as usize];
        add_quadric(&mut q, &self.quadrics[v2 as usize]);

        let keep = if l1 {
            v1
        } else if l2 {
            v2
        } else {
            let e1 = eval_quadric(&q, self.positions[v1 as usize]);
            let e2 = eval_quadric(&q, self.positions[v2 as usize]);
            match e1.total_cmp(&e2) {
                Ordering::Less => v1,
                Ordering::Greater => v2,
                Ordering::Equal => v1.min(v2),
            }
        };
        let mut cost = eval_quadric(&q, self.positions[keep as usize]);

        if let Some(uvs) = self.uvs {
            let du = uvs[v1 as usize * 2] as f64 - uvs[v2 as usize * 2] as f64;
            let dv = uvs[v1 as usize * 2 + 1] as f64 - uvs[v2 as usize * 2 + 1] as f64;
            cost += self.uv_weight * (du * du + dv * dv);
        }
        Some((cost, keep))
    }

    /// Merge `gone` into `keep`. Returns the number of triangles removed.
    fn collapse(&mut self, keep: u32, gone: u32) -> usize {
        debug_assert!(!self.locked[gone as usize]);

        let gone_quadric = self.quadrics[gone as usize];
        add_quadric(&mut self.quadrics[keep as usize], &gone_quadric);
        self.collapse_target[gone as usize] = keep;

        let mut removed = 0usize;
        let incident_gone = std::mem::take(&mut self.incident[gone as usize]);
        for t in incident_gone {
            let tri = &mut self.triangles[t as usize];
            if tri[0] == DEAD {
                continue;
            }
            for v in tri.iter_mut() {
                if *v == gone {
                    *v = keep;
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                *tri = [DEAD; 3];
                removed += 1;
            } else {
                self.incident[keep as usize].push(t);
            }
        }
        self.live_triangles -= removed;

        let neighbors: Vec<u32> = self.adjacency[gone as usize].iter().copied().collect();
        for n in neighbors {
            self.adjacency[n as usize].remove(&gone);
            if n != keep {
                self.adjacency[n as usize].insert(keep);
                self.adjacency[keep as usize].insert(n);
            }
        }
        self.adjacency[gone as usize].clear();
        self.adjacency[keep as usize].remove(&gone);
        removed
    }
}

/// Simplify a triangle list with quadric error metrics.
///
/// Returns indices into the original vertex arrays plus the achieved error
/// in bounding-box-relative parameter space. The caller compacts the
/// result to densify vertex indexing.
pub fn simplify(params: &SimplifyParams<'_>) -> (Vec<u32>, f32) {
    let mut target = params.target_index_count;
    target -= target % 3;
    let target = target.max(3);

    if params.indices.len() <= target {
        return (params.indices.to_vec(), 0.0);
    }
    let mut mesh = match Mesh::build(params) {
        Some(mesh) => mesh,
        None => return (params.indices.to_vec(), 0.0),
    };

    let threshold_sq = (params.error_threshold as f64).powi(2);
    let mut queue: PriorityQueue<(u32, u32), Candidate> = PriorityQueue::new();
    for v1 in 0..mesh.adjacency.len() as u32 {
        // Sorted neighbor iteration keeps queue construction reproducible.
        let neighbors: Vec<u32> = mesh.adjacency[v1 as usize]
            .iter()
            .copied()
            .filter(|&v2| v2 > v1)
            .collect();
        for v2 in neighbors {
            if let Some((cost, keep)) = mesh.edge_cost(v1, v2) {
                queue.push((v1, v2), Candidate { cost, v1, v2, keep });
            }
        }
    }

    let mut achieved: f64 = 0.0;
    while mesh.live_triangles * 3 > target {
        let (_, candidate) = match queue.pop() {
            Some(entry) => entry,
            None => break,
        };

        let v1 = mesh.resolve(candidate.v1);
        let v2 = mesh.resolve(candidate.v2);
        if v1 != candidate.v1 || v2 != candidate.v2 || !mesh.adjacency[v1 as usize].contains(&v2)
        {
            continue;
        }

        if candidate.cost > threshold_sq {
            // The queue's maximum is the cheapest edge, so every remaining
            // collapse is at least this bad.
            break;
        }

        let keep = candidate.keep;
        let gone = if keep == v1 { v2 } else { v1 };

        // The vanishing vertex's edges leave the queue before its
        // neighbors are rewired onto the survivor.
        let gone_edges: Vec<(u32, u32)> = mesh.adjacency[gone as usize]
            .iter()
            .map(|&n| edge_key(n, gone))
            .collect();
        mesh.collapse(keep, gone);
        for key in gone_edges {
            queue.remove(&key);
        }
        achieved = achieved.max(candidate.cost);

        // The survivor's quadric changed, so every incident edge is
        // reprioritized in place; edges that became uncollapsible drop out.
        let neighbors: Vec<u32> = mesh.adjacency[keep as usize].iter().copied().collect();
        for n in neighbors {
            let (v1, v2) = edge_key(keep, n);
            match mesh.edge_cost(v1, v2) {
                Some((cost, survivor)) => {
                    queue.push(
                        (v1, v2),
                        Candidate {
                            cost,
                            v1,
                            v2,
                            keep: survivor,
                        },
                    );
                }
                None => {
                    queue.remove(&(v1, v2));
                }
            }
        }
    }

    let mut indices = Vec::with_capacity(mesh.live_triangles * 3);
    for tri in &mesh.triangles {
        if tri[0] == DEAD {
            continue;
        }
        let (a, b, c) = (mesh.resolve(tri[0]), mesh.resolve(tri[1]), mesh.resolve(tri[2]));
        if a != b && b != c && c != a {
            indices.extend_from_slice(&[a, b, c]);
        }
    }
    (indices, achieved.sqrt() as f32)
}
