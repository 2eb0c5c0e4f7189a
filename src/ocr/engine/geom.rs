use crate::ocr::{Point, Rect};

/// Inclusive on all four edges.
pub fn point_in_box(point: Point, rect: &Rect) -> bool {
    point.x >= rect.x_min && point.x <= rect.x_max && point.y >= rect.y_min && point.y <= rect.y_max
}

/// True when the rects overlap, or when the axis-decomposed gap
/// `dist_x + dist_y` is within `threshold`. The gap is not a Euclidean
/// distance; grouping results depend on this exact formula.
pub fn boxes_close_or_overlap(a: &Rect, b: &Rect, threshold: f32) -> bool {
    let overlap_x = !(a.x_max < b.x_min || b.x_max < a.x_min);
    let overlap_y = !(a.y_max < b.y_min || b.y_max < a.y_min);
    if overlap_x && overlap_y {
        return true;
    }
    axis_gap(a.x_min, a.x_max, b.x_min, b.x_max) + axis_gap(a.y_min, a.y_max, b.y_min, b.y_max)
        <= threshold
}

fn axis_gap(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> f32 {
    if a_max < b_min {
        b_min - a_max
    } else if b_max < a_min {
        a_min - b_max
    } else {
        0.0
    }
}

/// Reduces a polygon to its axis-aligned bounds, discarding rotation.
pub fn rect_from_polygon(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect {
        x_min: first.x,
        y_min: first.y,
        x_max: first.x,
        y_max: first.y,
    };
    for point in &points[1..] {
        rect.x_min = rect.x_min.min(point.x);
        rect.y_min = rect.y_min.min(point.y);
        rect.x_max = rect.x_max.max(point.x);
        rect.y_max = rect.y_max.max(point.y);
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Rect {
        Rect::new(x_min, y_min, x_max, y_max)
    }

    #[test]
    fn point_on_edge_is_inside() {
        let bbox = rect(0.0, 0.0, 10.0, 10.0);
        assert!(point_in_box(Point::new(0.0, 0.0), &bbox));
        assert!(point_in_box(Point::new(10.0, 10.0), &bbox));
        assert!(point_in_box(Point::new(5.0, 10.0), &bbox));
        assert!(!point_in_box(Point::new(10.01, 5.0), &bbox));
        assert!(!point_in_box(Point::new(5.0, -0.5), &bbox));
    }

    #[test]
    fn touching_boxes_overlap_at_zero_threshold() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(10.0, 0.0, 20.0, 10.0);
        assert!(boxes_close_or_overlap(&a, &b, 0.0));
    }

    #[test]
    fn gap_is_sum_of_axis_separations() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        // 3 apart horizontally, 4 apart vertically: gap 7, Euclidean 5.
        let b = rect(13.0, 14.0, 20.0, 20.0);
        assert!(!boxes_close_or_overlap(&a, &b, 5.0));
        assert!(!boxes_close_or_overlap(&a, &b, 6.9));
        assert!(boxes_close_or_overlap(&a, &b, 7.0));
        assert!(boxes_close_or_overlap(&b, &a, 7.0));
    }

    #[test]
    fn gap_on_one_axis_only() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(12.0, 0.0, 20.0, 10.0);
        assert!(boxes_close_or_overlap(&a, &b, 5.0));
        assert!(!boxes_close_or_overlap(&a, &b, 1.0));
    }

    #[test]
    fn polygon_reduces_to_bounds() {
        let polygon = [
            Point::new(10.0, 5.0),
            Point::new(50.0, 0.0),
            Point::new(55.0, 20.0),
            Point::new(8.0, 25.0),
        ];
        assert_eq!(
            rect_from_polygon(&polygon),
            Some(rect(8.0, 0.0, 55.0, 25.0))
        );
        assert_eq!(rect_from_polygon(&[]), None);
    }
}
