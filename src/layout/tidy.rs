//! Contour-based tidy tree placement.
//!
//! Subtrees are packed left to right, each shifted just far enough that, at every depth, its
//! left contour sits at least `spacing` to the right of the subtrees already placed. A parent
//! is centered over its first and last child. The result only depends on the tree shape and
//! child order.

/// Leftmost and rightmost node offset at one depth, relative to the subtree root.
type Contour = Vec<(f64, f64)>;

/// Nodes in an order where every node comes after its parent.
pub(crate) fn pre_order(children: &[Vec<usize>], root: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(children.len());
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        order.push(idx);
        stack.extend(children[idx].iter().rev().copied());
    }
    order
}

/// Horizontal position of every node reachable from `root`, indexed like `children`. The
/// root is placed at 0.
pub(crate) fn tidy_positions(children: &[Vec<usize>], root: usize, spacing: f64) -> Vec<f64> {
    let order = pre_order(children, root);
    let mut contours: Vec<Contour> = vec![Vec::new(); children.len()];
    // Offset of each node relative to its parent.
    let mut offsets = vec![0.0; children.len()];

    for &idx in order.iter().rev() {
        let kids = &children[idx];
        if kids.is_empty() {
            contours[idx] = vec![(0.0, 0.0)];
            continue;
        }

        let mut placed: Vec<f64> = Vec::with_capacity(kids.len());
        let mut acc: Contour = std::mem::take(&mut contours[kids[0]]);
        placed.push(0.0);
        for &kid in &kids[1..] {
            let contour = std::mem::take(&mut contours[kid]);
            let shift = acc
                .iter()
                .zip(contour.iter())
                .map(|((_, right), (left, _))| right - left + spacing)
                .fold(f64::MIN, f64::max);
            for (level, (left, right)) in contour.into_iter().enumerate() {
                match acc.get_mut(level) {
                    Some(bounds) => bounds.1 = right + shift,
                    None => acc.push((left + shift, right + shift)),
                }
            }
            placed.push(shift);
        }

        let mid = (placed[0] + placed[placed.len() - 1]) / 2.0;
        for (&kid, pos) in kids.iter().zip(placed) {
            offsets[kid] = pos - mid;
        }
        let mut contour = Vec::with_capacity(acc.len() + 1);
        contour.push((0.0, 0.0));
        if mid == 0.0 {
            contour.extend(acc);
        } else {
            contour.extend(acc.into_iter().map(|(l, r)| (l - mid, r - mid)));
        }
        contours[idx] = contour;
    }

    let mut positions = vec![0.0; children.len()];
    for &idx in order.iter() {
        for &kid in &children[idx] {
            positions[kid] = positions[idx] + offsets[kid];
        }
    }
    positions
}
