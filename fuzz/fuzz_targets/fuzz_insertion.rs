#![no_main]

use amibe::{Mesh, MeshType};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|points: Vec<(f64, f64)>| {
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

    // keep the points inside the seed triangle
    let coords: Vec<_> = points
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| [x.rem_euclid(1.0) - 0.5, y.rem_euclid(1.0) - 0.5, 0.0])
        .collect();
    let _ = mesh.insert_vertices(&coords);

    assert!(mesh.is_valid());
});
