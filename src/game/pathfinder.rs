//! A* shortest path from the snake head to the apple
//!
//! The path is advisory: the engine exposes it for rendering and never uses it
//! to constrain movement.
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to their predecessor by index,
//! so reconstruction walks indices backwards instead of following references.
//!
//! Tie-break: the open list keeps insertion order and the node with the lowest
//! `cost + heuristic` is picked by a linear scan that only replaces the current
//! best on a strictly smaller total. Among equal totals the node that entered
//! the open list first wins. Neighbours are expanded in `Up, Down, Left, Right`
//! order. This is stable and reproducible but not the canonical
//! "lowest heuristic first" tie-break.

use std::collections::{HashMap, HashSet};

use super::action::Direction;
use super::state::Position;

#[derive(Debug, Clone)]
struct Node {
    pos: Position,
    cost: i32,
    total: i32,
    parent: Option<usize>,
}

/// Find a shortest 4-connected path from `start` to `target`.
///
/// Returns the full path including both endpoints, or an empty vector when
/// `target` is unreachable. Cells outside the `grid_size` square and cells in
/// `obstacles` are never entered.
pub fn find_path(
    start: Position,
    target: Position,
    obstacles: &HashSet<Position>,
    grid_size: usize,
) -> Vec<Position> {
    if !start.is_within(grid_size) || !target.is_within(grid_size) {
        return Vec::new();
    }

    let mut arena = vec![Node {
        pos: start,
        cost: 0,
        total: start.manhattan_distance(target),
        parent: None,
    }];
    let mut index_of: HashMap<Position, usize> = HashMap::from([(start, 0)]);
    let mut open: Vec<usize> = vec![0];
    let mut closed: HashSet<Position> = HashSet::new();

    while !open.is_empty() {
        let mut best = 0;
        for i in 1..open.len() {
            if arena[open[i]].total < arena[open[best]].total {
                best = i;
            }
        }

        let current = open.remove(best);
        let current_pos = arena[current].pos;
        closed.insert(current_pos);

        if current_pos == target {
            return reconstruct(&arena, current);
        }

        for direction in Direction::ALL {
            let neighbor = current_pos.moved_in_direction(direction);

            if !neighbor.is_within(grid_size)
                || obstacles.contains(&neighbor)
                || closed.contains(&neighbor)
            {
                continue;
            }

            let cost = arena[current].cost + 1;
            let total = cost + neighbor.manhattan_distance(target);

            match index_of.get(&neighbor) {
                None => {
                    arena.push(Node {
                        pos: neighbor,
                        cost,
                        total,
                        parent: Some(current),
                    });
                    let idx = arena.len() - 1;
                    index_of.insert(neighbor, idx);
                    open.push(idx);
                }
                Some(&idx) if cost < arena[idx].cost => {
                    let node = &mut arena[idx];
                    node.cost = cost;
                    node.total = total;
                    node.parent = Some(current);
                }
                Some(_) => {}
            }
        }
    }

    Vec::new()
}

fn reconstruct(arena: &[Node], end: usize) -> Vec<Position> {
    let mut path = Vec::new();
    let mut cursor = Some(end);
    while let Some(idx) = cursor {
        path.push(arena[idx].pos);
        cursor = arena[idx].parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(path: &[Position]) {
        for pair in path.windows(2) {
            assert_eq!(
                pair[0].manhattan_distance(pair[1]),
                1,
                "{:?} -> {:?} is not a single step",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_open_grid_path_length() {
        let obstacles = HashSet::new();
        let pairs = [
            (Position::new(0, 0), Position::new(7, 7)),
            (Position::new(10, 10), Position::new(3, 15)),
            (Position::new(19, 0), Position::new(0, 19)),
            (Position::new(5, 5), Position::new(5, 12)),
        ];

        for (start, target) in pairs {
            let path = find_path(start, target, &obstacles, 20);
            assert_eq!(path.len() as i32, start.manhattan_distance(target) + 1);
            assert_eq!(path.first(), Some(&start));
            assert_eq!(path.last(), Some(&target));
            assert_contiguous(&path);
        }
    }

    #[test]
    fn test_start_equals_target() {
        let path = find_path(Position::new(4, 4), Position::new(4, 4), &HashSet::new(), 10);
        assert_eq!(path, vec![Position::new(4, 4)]);
    }

    #[test]
    fn test_path_avoids_obstacles() {
        // Vertical wall at x = 5 from y = 0..=8, gap at y = 9
        let obstacles: HashSet<Position> = (0..9).map(|y| Position::new(5, y)).collect();
        let start = Position::new(2, 2);
        let target = Position::new(8, 2);

        let path = find_path(start, target, &obstacles, 10);

        assert!(!path.is_empty());
        assert_contiguous(&path);
        assert!(path.iter().all(|p| !obstacles.contains(p)));
        assert!(path.contains(&Position::new(5, 9)));
        // Down 7, across 6, up 7
        assert_eq!(path.len(), 21);
    }

    #[test]
    fn test_unreachable_target_returns_empty() {
        // Box the target in
        let target = Position::new(5, 5);
        let obstacles: HashSet<Position> = Direction::ALL
            .iter()
            .map(|d| target.moved_in_direction(*d))
            .collect();

        let path = find_path(Position::new(0, 0), target, &obstacles, 10);
        assert!(path.is_empty());
    }

    #[test]
    fn test_out_of_grid_endpoints() {
        let path = find_path(Position::new(-1, 0), Position::new(3, 3), &HashSet::new(), 10);
        assert!(path.is_empty());
    }

    #[test]
    fn test_tie_break_is_reproducible() {
        let obstacles = HashSet::new();
        let a = find_path(Position::new(2, 2), Position::new(6, 6), &obstacles, 10);
        let b = find_path(Position::new(2, 2), Position::new(6, 6), &obstacles, 10);
        assert_eq!(a, b);
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn test_tie_break_prefers_first_entered() {
        // Every frontier node totals 8; Up is out of the way, so Down enters
        // first and the path runs down the column before turning right.
        let path = find_path(Position::new(2, 2), Position::new(6, 6), &HashSet::new(), 10);

        let expected: Vec<Position> = [
            (2, 2),
            (2, 3),
            (2, 4),
            (2, 5),
            (2, 6),
            (3, 6),
            (4, 6),
            (5, 6),
            (6, 6),
        ]
        .into_iter()
        .map(|(x, y)| Position::new(x, y))
        .collect();
        assert_eq!(path, expected);
    }
}
