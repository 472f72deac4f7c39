use super::types::{GridCoord, VertexIdx};

// Quadrants of a cell: a = low x low y, b = low x high y, c = high x high y, d = high x low y.
const A: usize = 0;
const B: usize = 1;
const C: usize = 2;
const D: usize = 3;

/// Per curve state, the children `(state, quadrant)` in the order they are pushed.
const HILBERT_CHILDREN: [[(u8, usize); 4]; 8] = [
    [(3, A), (0, B), (0, C), (7, D)],
    [(6, D), (1, C), (1, B), (2, A)],
    [(5, B), (2, C), (2, D), (1, A)],
    [(0, A), (3, D), (3, C), (4, B)],
    [(7, C), (4, D), (4, A), (3, B)],
    [(2, B), (5, A), (5, D), (6, C)],
    [(1, D), (6, A), (6, B), (5, C)],
    [(4, C), (7, B), (7, A), (0, D)],
];

/// Sorts grid points along a 2D Hilbert curve, points sharing a grid cell keep their order.
pub fn sort_along_hilbert_curve_2d(points: &[(VertexIdx, GridCoord)]) -> Vec<VertexIdx> {
    let mut curve_order = Vec::with_capacity(points.len());
    let Some((g_min, g_max)) = find_min_max_2d(points) else {
        return curve_order;
    };

    let mut to_subdiv = vec![(0u8, g_min, g_max, points.to_vec())];

    while let Some((rot, g_min, g_max, cell)) = to_subdiv.pop() {
        if cell.len() <= 1 || (g_max[0] - g_min[0] <= 1 && g_max[1] - g_min[1] <= 1) {
            curve_order.extend(cell.iter().map(|(v_idx, _)| *v_idx));
            continue;
        }

        let sep = [
            g_min[0] + (g_max[0] - g_min[0]) / 2,
            g_min[1] + (g_max[1] - g_min[1]) / 2,
        ];
        let bounds = [
            (g_min, sep),
            ([g_min[0], sep[1]], [sep[0], g_max[1]]),
            (sep, g_max),
            ([sep[0], g_min[1]], [g_max[0], sep[1]]),
        ];

        let mut quadrants: [Vec<(VertexIdx, GridCoord)>; 4] = Default::default();
        for (v_idx, g) in cell {
            let q = match (g[0] <= sep[0], g[1] <= sep[1]) {
                (true, true) => A,
                (true, false) => B,
                (false, false) => C,
                (false, true) => D,
            };
            quadrants[q].push((v_idx, g));
        }

        for (child_rot, q) in HILBERT_CHILDREN[rot as usize] {
            let (q_min, q_max) = bounds[q];
            to_subdiv.push((child_rot, q_min, q_max, std::mem::take(&mut quadrants[q])));
        }
    }

    curve_order
}

// Finds the minimum and maximum x and y values of the points
fn find_min_max_2d(points: &[(VertexIdx, GridCoord)]) -> Option<(GridCoord, GridCoord)> {
    let (_, first) = points.first()?;
    let mut g_min = *first;
    let mut g_max = *first;

    for (_, g) in points {
        g_min = [g_min[0].min(g[0]), g_min[1].min(g[1])];
        g_max = [g_max[0].max(g[0]), g_max[1].max(g[1])];
    }

    Some((g_min, g_max))
}
