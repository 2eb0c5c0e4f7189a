use serde::Serialize;
use tracing::debug;

use crate::ocr::{Group, Rect};

use super::geom::boxes_close_or_overlap;

/// Connected-component labelling of a set of rects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grouping {
    /// `group_of[i]` is the group id of rect `i`.
    pub group_of: Vec<usize>,
    pub count: usize,
}

/// Labels rects by proximity-graph connectivity. Components are discovered from
/// the lowest unvisited index, so ids are stable for a fixed input order.
pub fn find_groups(rects: &[Rect], threshold: f32) -> Grouping {
    let n = rects.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if boxes_close_or_overlap(&rects[i], &rects[j], threshold) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    let mut group_of: Vec<Option<usize>> = vec![None; n];
    let mut count = 0usize;
    let mut stack = Vec::new();
    for start in 0..n {
        if group_of[start].is_some() {
            continue;
        }
        group_of[start] = Some(count);
        stack.push(start);
        while let Some(node) = stack.pop() {
            for &next in &adjacency[node] {
                if group_of[next].is_none() {
                    group_of[next] = Some(count);
                    stack.push(next);
                }
            }
        }
        count += 1;
    }

    debug!("grouping: {} rects -> {} groups (threshold {})", n, count, threshold);
    Grouping {
        group_of: group_of.into_iter().flatten().collect(),
        count,
    }
}

/// Collapses each component to its member list and envelope.
pub fn build_groups(rects: &[Rect], grouping: &Grouping) -> Vec<Group> {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); grouping.count];
    for (idx, &group) in grouping.group_of.iter().enumerate() {
        members[group].push(idx);
    }
    members
        .into_iter()
        .enumerate()
        .filter_map(|(id, members)| {
            let envelope = members
                .iter()
                .map(|&idx| rects[idx])
                .reduce(|acc, rect| acc.union(&rect))?;
            Some(Group {
                id,
                members,
                envelope,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rects(values: &[(f32, f32, f32, f32)]) -> Vec<Rect> {
        values
            .iter()
            .map(|&(a, b, c, d)| Rect::new(a, b, c, d))
            .collect()
    }

    #[test]
    fn near_pair_merges_and_far_box_stays_alone() {
        let input = rects(&[
            (0.0, 0.0, 10.0, 10.0),
            (12.0, 0.0, 20.0, 10.0),
            (100.0, 100.0, 110.0, 110.0),
        ]);
        let grouping = find_groups(&input, 5.0);
        assert_eq!(grouping.count, 2);
        assert_eq!(grouping.group_of, vec![0, 0, 1]);

        let groups = build_groups(&input, &grouping);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[0].envelope, Rect::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(groups[1].members, vec![2]);
        assert_eq!(groups[1].envelope, Rect::new(100.0, 100.0, 110.0, 110.0));
    }

    #[test]
    fn transitive_chain_forms_one_group() {
        // 0 and 2 are far apart but both touch 1.
        let input = rects(&[
            (0.0, 0.0, 10.0, 10.0),
            (100.0, 0.0, 110.0, 10.0),
            (14.0, 0.0, 96.0, 10.0),
        ]);
        let grouping = find_groups(&input, 4.0);
        assert_eq!(grouping.count, 1);
        assert_eq!(grouping.group_of, vec![0, 0, 0]);
    }

    #[test]
    fn ids_follow_lowest_unvisited_index() {
        let input = rects(&[
            (500.0, 500.0, 510.0, 510.0),
            (0.0, 0.0, 10.0, 10.0),
            (505.0, 505.0, 520.0, 520.0),
            (2.0, 2.0, 8.0, 8.0),
        ]);
        let grouping = find_groups(&input, 0.0);
        assert_eq!(grouping.group_of, vec![0, 1, 0, 1]);
        assert_eq!(find_groups(&input, 0.0), grouping);
    }

    #[test]
    fn identical_boxes_share_a_group_at_zero_threshold() {
        let input = rects(&[(5.0, 5.0, 15.0, 15.0), (5.0, 5.0, 15.0, 15.0)]);
        assert_eq!(find_groups(&input, 0.0).count, 1);
    }

    #[test]
    fn larger_threshold_never_adds_groups() {
        let input = rects(&[
            (0.0, 0.0, 10.0, 10.0),
            (13.0, 0.0, 20.0, 10.0),
            (0.0, 18.0, 10.0, 25.0),
            (40.0, 40.0, 50.0, 50.0),
            (80.0, 0.0, 90.0, 5.0),
        ]);
        let mut previous = usize::MAX;
        for threshold in [0.0, 2.0, 3.0, 8.0, 20.0, 50.0, 200.0] {
            let count = find_groups(&input, threshold).count;
            assert!(count <= previous, "threshold {} gave {}", threshold, count);
            previous = count;
        }
        assert_eq!(find_groups(&input, 200.0).count, 1);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let grouping = find_groups(&[], 10.0);
        assert_eq!(grouping.count, 0);
        assert!(build_groups(&[], &grouping).is_empty());
    }
}
