//! Orthogonal wire routing.
//!
//! A* over a square grid of [`GRID_SIZE`] cells, moving in the four axis
//! directions. Step cost is one cell; changing direction costs an extra
//! [`TURN_PENALTY`] so routes prefer long straight runs. The heuristic is the
//! Manhattan distance, which never overestimates on a four-connected grid.
//!
//! Costs are whole multiples of the grid size, so the search runs on integer
//! cells and integer costs and the open set can be a plain `BinaryHeap`.
//! Superseded heap entries are left in place and skipped when popped; the side
//! map records which entry is current for each open cell.
//!
//! The search gives up after [`MAX_ROUTE_ITERATIONS`] expansions and returns
//! the direct two-point line instead. A route is always produced.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::bounds::element_bounds;
use crate::consts::{GRID_SIZE, MAX_ROUTE_ITERATIONS, OBSTACLE_PADDING, TURN_PENALTY};
use crate::element::Element;
use crate::geometry::{Point, Rect};
use crate::text::TextMeasure;

type Cell = (i64, i64);

const STEPS: [Cell; 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

struct Node {
    cell: Cell,
    g: i64,
    parent: Option<usize>,
}

/// Heap key: lowest `f` first, ties broken toward the goal, then by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    f: i64,
    h: i64,
    node: usize,
}

#[allow(clippy::cast_possible_truncation)]
fn snap(p: Point) -> Cell {
    ((p.x / GRID_SIZE).round() as i64, (p.y / GRID_SIZE).round() as i64)
}

#[allow(clippy::cast_precision_loss)]
fn cell_point(cell: Cell) -> Point {
    Point::new(cell.0 as f64 * GRID_SIZE, cell.1 as f64 * GRID_SIZE)
}

#[allow(clippy::cast_possible_truncation)]
fn heuristic(a: Cell, b: Cell) -> i64 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) * GRID_SIZE as i64
}

fn walkable(cell: Cell, obstacles: &[Rect]) -> bool {
    let p = cell_point(cell);
    !obstacles.iter().any(|o| o.contains_strict(p))
}

/// Axis-aligned route from `start` to `end` avoiding `obstacles`.
///
/// Intermediate points sit on grid nodes; the first and last points are the
/// exact `start` and `end`. A node is blocked when it lies strictly inside an
/// obstacle. When no route is found within the iteration cap the result is
/// `[start, end]`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn find_orthogonal_path(start: Point, end: Point, obstacles: &[Rect]) -> Vec<Point> {
    let step_cost = GRID_SIZE as i64;
    let turn_cost = TURN_PENALTY as i64;
    let start_cell = snap(start);
    let goal = snap(end);

    let mut nodes = vec![Node { cell: start_cell, g: 0, parent: None }];
    let mut heap = BinaryHeap::new();
    let h0 = heuristic(start_cell, goal);
    heap.push(Reverse(OpenEntry { f: h0, h: h0, node: 0 }));
    let mut open: HashMap<Cell, usize> = HashMap::from([(start_cell, 0)]);
    let mut closed: HashSet<Cell> = HashSet::new();
    let mut iterations = 0;

    while let Some(Reverse(entry)) = heap.pop() {
        let cell = nodes[entry.node].cell;
        if open.get(&cell) != Some(&entry.node) {
            continue;
        }
        if iterations >= MAX_ROUTE_ITERATIONS {
            break;
        }
        iterations += 1;
        open.remove(&cell);

        if cell == goal {
            return reconstruct(&nodes, entry.node, start, end);
        }
        closed.insert(cell);

        let current_g = nodes[entry.node].g;
        let heading = nodes[entry.node].parent.map(|p| {
            let from = nodes[p].cell;
            (cell.0 - from.0, cell.1 - from.1)
        });

        for step in STEPS {
            let next = (cell.0 + step.0, cell.1 + step.1);
            if closed.contains(&next) || !walkable(next, obstacles) {
                continue;
            }
            let mut g = current_g + step_cost;
            if heading.is_some_and(|h| h != step) {
                g += turn_cost;
            }
            if open.get(&next).is_some_and(|&existing| nodes[existing].g <= g) {
                continue;
            }
            let h = heuristic(next, goal);
            let index = nodes.len();
            nodes.push(Node { cell: next, g, parent: Some(entry.node) });
            open.insert(next, index);
            heap.push(Reverse(OpenEntry { f: g + h, h, node: index }));
        }
    }

    tracing::debug!(iterations, "no orthogonal route found; using direct line");
    vec![start, end]
}

fn reconstruct(nodes: &[Node], goal_index: usize, start: Point, end: Point) -> Vec<Point> {
    let mut chain = Vec::new();
    let mut cursor = Some(goal_index);
    while let Some(i) = cursor {
        chain.push(cell_point(nodes[i].cell));
        cursor = nodes[i].parent;
    }
    if chain.len() < 2 {
        return vec![start, end];
    }
    chain.reverse();
    let last = chain.len() - 1;
    chain[0] = start;
    chain[last] = end;
    chain
}

/// Padded obstacle boxes for a wire between `start_id` and `end_id`.
///
/// The wire's own endpoints and every wire are excluded.
#[must_use]
pub fn wire_obstacles(elements: &[Element], start_id: &str, end_id: &str, measure: &dyn TextMeasure) -> Vec<Rect> {
    elements
        .iter()
        .filter(|el| !el.is_wire() && el.id != start_id && el.id != end_id)
        .map(|el| element_bounds(el, measure).inflate(OBSTACLE_PADDING))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::HandleType;
    use crate::geometry::distance;
    use crate::text::ApproxTextMeasure;

    fn path_length(path: &[Point]) -> f64 {
        path.windows(2).map(|w| distance(w[0], w[1])).sum()
    }

    fn is_axis_aligned(path: &[Point]) -> bool {
        path.windows(2).all(|w| (w[0].x - w[1].x).abs() < 1e-9 || (w[0].y - w[1].y).abs() < 1e-9)
    }

    #[test]
    fn straight_route_stays_on_the_axis() {
        let path = find_orthogonal_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &[]);
        assert!(path.iter().all(|p| p.y.abs() < 1e-9));
        assert!((path_length(&path) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn l_route_is_axis_aligned_with_exact_endpoints() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(100.0, 60.0);
        let path = find_orthogonal_path(start, end, &[]);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!(is_axis_aligned(&path));
        assert!((path_length(&path) - 160.0).abs() < 1e-9);
    }

    /// Direction changes along the path, ignoring zero-length segments.
    fn turns(path: &[Point]) -> usize {
        let dirs: Vec<(i8, i8)> = path
            .windows(2)
            .map(|w| (sign(w[1].x - w[0].x), sign(w[1].y - w[0].y)))
            .filter(|d| *d != (0, 0))
            .collect();
        dirs.windows(2).filter(|d| d[0] != d[1]).count()
    }

    fn sign(v: f64) -> i8 {
        if v.abs() < 1e-9 {
            0
        } else if v > 0.0 {
            1
        } else {
            -1
        }
    }

    #[test]
    fn open_field_route_bends_at_most_once() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(200.0, 140.0);
        let path = find_orthogonal_path(start, end, &[]);
        assert!(turns(&path) <= 1, "route {path:?} has {} turns", turns(&path));
        assert!((path_length(&path) - 340.0).abs() < 1e-9);
    }

    #[test]
    fn detour_keeps_turns_to_the_minimum() {
        let wall = Rect::new(90.0, -30.0, 20.0, 60.0);
        let path = find_orthogonal_path(Point::new(0.0, 0.0), Point::new(200.0, 0.0), &[wall]);
        assert!(is_axis_aligned(&path));
        assert!(turns(&path) <= 4, "route {path:?} has {} turns", turns(&path));
    }

    #[test]
    fn endpoints_off_grid_are_kept_exactly() {
        let start = Point::new(3.0, 4.0);
        let end = Point::new(97.0, 2.0);
        let path = find_orthogonal_path(start, end, &[]);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!(path.len() > 2);
    }

    #[test]
    fn route_detours_around_an_obstacle() {
        let wall = Rect::new(30.0, -70.0, 40.0, 140.0);
        let path = find_orthogonal_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &[wall]);
        assert!(is_axis_aligned(&path));
        assert!(path[1..path.len() - 1].iter().all(|p| !wall.contains_strict(*p)));
        assert!(path_length(&path) > 100.0);
    }

    #[test]
    fn unreachable_goal_falls_back_to_direct_line() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(200.0, 200.0);
        let cage = Rect::new(150.0, 150.0, 100.0, 100.0);
        assert_eq!(find_orthogonal_path(start, end, &[cage]), vec![start, end]);
    }

    #[test]
    fn same_cell_endpoints_return_two_points() {
        let start = Point::new(1.0, 1.0);
        let end = Point::new(2.0, 3.0);
        assert_eq!(find_orthogonal_path(start, end, &[]), vec![start, end]);
    }

    #[test]
    fn obstacles_skip_endpoints_and_wires() {
        let m = ApproxTextMeasure::default();
        let elements = vec![
            Element::rectangle("a", 0.0, 0.0, 10.0, 10.0),
            Element::rectangle("b", 100.0, 0.0, 10.0, 10.0),
            Element::rectangle("c", 50.0, 50.0, 10.0, 10.0),
            Element::wire("w", Point::default(), ("a", HandleType::TopLeft), ("b", HandleType::TopLeft)),
        ];
        let obstacles = wire_obstacles(&elements, "a", "b", &m);
        assert_eq!(obstacles, vec![Rect::new(30.0, 30.0, 50.0, 50.0)]);
    }
}
