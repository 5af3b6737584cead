//! Main-axis distribution for containers that stack their children.

use ratatui::layout::Rect;

pub use ratatui::layout::Direction as Axis;

use super::LayoutRequirements;

/// Split `total` cells along `axis` among `children`.
///
/// Fixed sizes are honoured first. Every flexible child then starts at its
/// minimum and the remainder is shared in proportion to `flex_factor`,
/// respecting each child's maximum. Shares are whole cells; leftover cells
/// from rounding go to the largest fractional remainders, earlier children
/// winning ties. A child with `flex_factor == 0` stays at its minimum.
pub fn distribute(axis: Axis, total: u16, children: &[LayoutRequirements]) -> Vec<u16> {
    let mut sizes: Vec<u16> = children
        .iter()
        .map(|child| {
            child
                .fixed_extent(axis)
                .unwrap_or_else(|| child.min_extent(axis))
        })
        .collect();
    let used: u32 = sizes.iter().map(|size| u32::from(*size)).sum();
    let mut remaining = u32::from(total).saturating_sub(used);

    while remaining > 0 {
        let open: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(idx, child)| {
                child.fixed_extent(axis).is_none()
                    && child.flex_factor > 0
                    && sizes[*idx] < child.max_extent(axis)
            })
            .map(|(idx, _)| idx)
            .collect();
        if open.is_empty() {
            break;
        }
        let weight: u32 = open
            .iter()
            .map(|idx| u32::from(children[*idx].flex_factor))
            .sum();

        let mut shares: Vec<(usize, u32, u32)> = open
            .iter()
            .map(|idx| {
                let flex = u32::from(children[*idx].flex_factor);
                (*idx, remaining * flex / weight, remaining * flex % weight)
            })
            .collect();
        let handed_out: u32 = shares.iter().map(|(_, share, _)| *share).sum();
        let mut leftover = remaining - handed_out;
        let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
        by_remainder.sort_by(|a, b| shares[*b].2.cmp(&shares[*a].2).then(a.cmp(b)));
        for slot in by_remainder {
            if leftover == 0 {
                break;
            }
            shares[slot].1 += 1;
            leftover -= 1;
        }

        let mut consumed = 0u32;
        for (idx, share, _) in shares {
            let headroom = u32::from(children[idx].max_extent(axis) - sizes[idx]);
            let grant = share.min(headroom);
            sizes[idx] += grant as u16;
            consumed += grant;
        }
        if consumed == 0 {
            break;
        }
        remaining -= consumed;
    }
    sizes
}

/// Lay `children` out back to back inside `area`.
pub fn split(axis: Axis, area: Rect, children: &[LayoutRequirements]) -> Vec<Rect> {
    let total = match axis {
        Axis::Horizontal => area.width,
        Axis::Vertical => area.height,
    };
    let sizes = distribute(axis, total, children);
    let mut rects = Vec::with_capacity(sizes.len());
    let mut cursor_x = area.x;
    let mut cursor_y = area.y;
    for size in sizes {
        let rect = match axis {
            Axis::Horizontal => {
                let width = size.min(area.right().saturating_sub(cursor_x));
                let rect = Rect {
                    x: cursor_x,
                    y: area.y,
                    width,
                    height: area.height,
                };
                cursor_x = cursor_x.saturating_add(width);
                rect
            }
            Axis::Vertical => {
                let height = size.min(area.bottom().saturating_sub(cursor_y));
                let rect = Rect {
                    x: area.x,
                    y: cursor_y,
                    width: area.width,
                    height,
                };
                cursor_y = cursor_y.saturating_add(height);
                rect
            }
        };
        rects.push(rect);
    }
    rects
}
