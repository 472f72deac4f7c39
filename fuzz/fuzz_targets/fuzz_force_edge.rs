#![no_main]

use amibe::{Mesh, MeshType};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<(f64, f64)>, u8, u8)| {
    let (points, a, b) = data;
    let Ok(mut mesh) = Mesh::new(MeshType::Mesh2D, [-1.0, -1.0], [3.0, 3.0]) else {
        return;
    };
    let seed = [[-1.0, -1.0, 0.0], [3.0, -1.0, 0.0], [-1.0, 3.0, 0.0]];
    let v_idxs: Vec<_> = seed.iter().filter_map(|c| mesh.add_vertex(*c).ok()).collect();
    let [v0, v1, v2] = v_idxs[..] else {
        return;
    };
    if mesh.bootstrap(v0, v1, v2).is_err() {
        return;
    }

    let coords: Vec<_> = points
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| [x.rem_euclid(1.0) - 0.5, y.rem_euclid(1.0) - 0.5, 0.0])
        .collect();
    if mesh.insert_vertices(&coords).is_err() {
        return;
    }

    let n = mesh.vertices().len();
    let (start, end) = (a as usize % n, b as usize % n);
    // a failed enforcement may leave swaps behind, never a broken mesh
    let _ = mesh.force_boundary_edge(start, end, 100);

    assert!(mesh.is_valid());
});
