use glam::IVec2;

fn cross(o: IVec2, a: IVec2, b: IVec2) -> i64 {
    let (ox, oy) = (o.x as i64, o.y as i64);
    (a.x as i64 - ox) * (b.y as i64 - oy) - (a.y as i64 - oy) * (b.x as i64 - ox)
}

/// Convex hull of integer points by Andrew's monotone chain.
///
/// Returns the hull vertices counter-clockwise, without repeating the first
/// point. Collinear points on hull edges are dropped. Inputs with fewer than
/// three distinct points come back deduplicated and sorted.
pub fn convex_hull(points: &[IVec2]) -> Vec<IVec2> {
    let mut pts = points.to_vec();
    pts.sort_unstable_by(|a, b| (a.x, a.y).cmp(&(b.x, b.y)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<IVec2> = Vec::with_capacity(2 * pts.len());

    // Lower hull
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }

    // Upper hull
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }

    // Last point repeats the first.
    hull.pop();
    hull
}

/// Perimeter of a polygon, closing the last vertex back to the first.
pub fn closed_perimeter(polygon: &[IVec2]) -> f64 {
    if polygon.len() < 2 {
        return 0.0;
    }
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| (*b - *a).as_dvec2().length())
        .sum()
}
