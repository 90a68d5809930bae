use ultraviolet::Vec3;

/// Axis-aligned bounds of the positions stored at `position_column` of each row.
/// Returns `None` for an empty buffer.
pub fn bounding_box(
    vertices: &[f32],
    components: usize,
    position_column: usize,
) -> Option<(Vec3, Vec3)> {
    let mut rows = vertices.chunks_exact(components).peekable();
    rows.peek()?;

    let initial = (Vec3::broadcast(f32::INFINITY), Vec3::broadcast(f32::NEG_INFINITY));
    let bounds = rows.fold(initial, |(min, max), row| {
        let p = position_at(row, position_column);
        (min.min_by_component(p), max.max_by_component(p))
    });
    Some(bounds)
}

/// Moves the bounding box center to the origin (`center`) and scales the
/// largest half-extent to 1 (`resize`), in place.
pub fn center_and_resize(
    vertices: &mut [f32],
    components: usize,
    position_column: usize,
    center: bool,
    resize: bool,
) {
    if !center && !resize {
        return;
    }
    let (min, max) = match bounding_box(vertices, components, position_column) {
        Some(bounds) => bounds,
        None => return,
    };

    let origin = if center {
        (min + max) * 0.5
    } else {
        Vec3::zero()
    };
    let divisor = if resize {
        ((max - min) * 0.5).component_max()
    } else {
        1.0
    };
    // Degenerate (flat or single point) geometry is only translated.
    let divisor = if divisor.is_finite() && divisor > 0.0 {
        divisor
    } else {
        1.0
    };

    for row in vertices.chunks_exact_mut(components) {
        let p = (position_at(row, position_column) - origin) / divisor;
        row[position_column..position_column + 3].copy_from_slice(&[p.x, p.y, p.z]);
    }
}

fn position_at(row: &[f32], column: usize) -> Vec3 {
    Vec3::new(row[column], row[column + 1], row[column + 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENTS: usize = 5;

    fn rows(positions: &[[f32; 3]]) -> Vec<f32> {
        positions
            .iter()
            .flat_map(|p| vec![1.0, 0.0, p[0], p[1], p[2]])
            .collect()
    }

    fn positions(vertices: &[f32]) -> Vec<Vec3> {
        vertices
            .chunks_exact(COMPONENTS)
            .map(|r| position_at(r, 2))
            .collect()
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).mag() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn centers_and_unitizes() {
        let mut vertices = rows(&[[1.0, 2.0, 3.0], [5.0, 4.0, 3.0], [3.0, 3.0, 4.0]]);
        center_and_resize(&mut vertices, COMPONENTS, 2, true, true);

        let moved = positions(&vertices);
        assert_close(moved[0], Vec3::new(-1.0, -0.5, -0.25));
        assert_close(moved[1], Vec3::new(1.0, 0.5, -0.25));
        assert_close(moved[2], Vec3::new(0.0, 0.0, 0.25));

        // Id columns are untouched.
        assert_eq!(vertices[0], 1.0);
        assert_eq!(vertices[COMPONENTS + 1], 0.0);
    }

    #[test]
    fn resize_alone_keeps_origin() {
        let mut vertices = rows(&[[2.0, 0.0, 0.0], [6.0, 0.0, 0.0]]);
        center_and_resize(&mut vertices, COMPONENTS, 2, false, true);
        let moved = positions(&vertices);
        assert_close(moved[0], Vec3::new(1.0, 0.0, 0.0));
        assert_close(moved[1], Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut vertices = rows(&[[-3.0, 7.0, 1.0], [9.0, 2.0, 1.5], [0.0, 0.0, -4.0]]);
        center_and_resize(&mut vertices, COMPONENTS, 2, true, true);
        let once = vertices.clone();
        center_and_resize(&mut vertices, COMPONENTS, 2, true, true);

        for (a, b) in positions(&once).into_iter().zip(positions(&vertices)) {
            assert_close(a, b);
        }
        let (min, max) = bounding_box(&vertices, COMPONENTS, 2).unwrap();
        assert_close((min + max) * 0.5, Vec3::zero());
        assert!((((max - min) * 0.5).component_max() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn flags_off_or_empty_buffer_do_nothing() {
        let mut vertices = rows(&[[1.0, 2.0, 3.0]]);
        let before = vertices.clone();
        center_and_resize(&mut vertices, COMPONENTS, 2, false, false);
        assert_eq!(vertices, before);

        let mut empty: Vec<f32> = vec![];
        center_and_resize(&mut empty, COMPONENTS, 2, true, true);
        assert!(bounding_box(&empty, COMPONENTS, 2).is_none());

        // A single point only gets translated.
        center_and_resize(&mut vertices, COMPONENTS, 2, true, true);
        assert_close(positions(&vertices)[0], Vec3::zero());
    }
}
