use super::{CandidateRegion, NormalizedBox, ProposalParams, RegionSource};
use crate::edges::{edge_mask, Grad};

/// Coarse occupancy grid over the edge map.
struct CellGrid {
    cols: usize,
    rows: usize,
    cell_w: usize,
    cell_h: usize,
    density: Vec<f32>,
}

impl CellGrid {
    fn from_mask(mask: &[u8], width: usize, height: usize, cells: usize) -> Self {
        let cells = cells.max(1);
        let cell_w = width.div_ceil(cells).max(1);
        let cell_h = height.div_ceil(cells).max(1);
        let cols = width.div_ceil(cell_w);
        let rows = height.div_ceil(cell_h);
        let mut counts = vec![0usize; cols * rows];
        let mut totals = vec![0usize; cols * rows];
        for y in 0..height {
            let row = &mask[y * width..(y + 1) * width];
            let cy = y / cell_h;
            for (x, &m) in row.iter().enumerate() {
                let c = cy * cols + x / cell_w;
                totals[c] += 1;
                counts[c] += m as usize;
            }
        }
        let density = counts
            .iter()
            .zip(&totals)
            .map(|(&c, &t)| if t == 0 { 0.0 } else { c as f32 / t as f32 })
            .collect();
        Self {
            cols,
            rows,
            cell_w,
            cell_h,
            density,
        }
    }

    fn dilate(&self, active: &[bool]) -> Vec<bool> {
        let mut out = active.to_vec();
        for cy in 0..self.rows {
            for cx in 0..self.cols {
                if !active[cy * self.cols + cx] {
                    continue;
                }
                for ny in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                        out[ny * self.cols + nx] = true;
                    }
                }
            }
        }
        out
    }
}

struct Component {
    min: (usize, usize),
    max: (usize, usize),
    cells: usize,
    active_cells: usize,
    density_sum: f32,
}

/// Edge-rich regions: thresholded Sobel magnitude, cell densities, one-cell
/// dilation and 4-connected components.
pub fn edge_density_regions(grad: &Grad, params: &ProposalParams) -> Vec<CandidateRegion> {
    let (width, height) = (grad.width(), grad.height());
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mask = edge_mask(grad, params.edge_threshold);
    let grid = CellGrid::from_mask(&mask, width, height, params.grid_cells);
    let active: Vec<bool> = grid
        .density
        .iter()
        .map(|&d| d >= params.cell_density)
        .collect();
    let dilated = grid.dilate(&active);

    let mut visited = vec![false; dilated.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut regions = Vec::new();
    for start in 0..dilated.len() {
        if !dilated[start] || visited[start] {
            continue;
        }
        let mut comp = Component {
            min: (usize::MAX, usize::MAX),
            max: (0, 0),
            cells: 0,
            active_cells: 0,
            density_sum: 0.0,
        };
        visited[start] = true;
        stack.push((start % grid.cols, start / grid.cols));
        while let Some((cx, cy)) = stack.pop() {
            let idx = cy * grid.cols + cx;
            comp.cells += 1;
            if active[idx] {
                comp.active_cells += 1;
                comp.density_sum += grid.density[idx];
            }
            comp.min = (comp.min.0.min(cx), comp.min.1.min(cy));
            comp.max = (comp.max.0.max(cx), comp.max.1.max(cy));
            let mut neighbours = Vec::with_capacity(4);
            if cx > 0 {
                neighbours.push((cx - 1, cy));
            }
            if cx + 1 < grid.cols {
                neighbours.push((cx + 1, cy));
            }
            if cy > 0 {
                neighbours.push((cx, cy - 1));
            }
            if cy + 1 < grid.rows {
                neighbours.push((cx, cy + 1));
            }
            for (nx, ny) in neighbours {
                let n = ny * grid.cols + nx;
                if dilated[n] && !visited[n] {
                    visited[n] = true;
                    stack.push((nx, ny));
                }
            }
        }

        if comp.active_cells < params.min_component_cells {
            continue;
        }
        let bbox = NormalizedBox::new(
            (comp.min.0 * grid.cell_w) as f32 / width as f32,
            (comp.min.1 * grid.cell_h) as f32 / height as f32,
            ((comp.max.0 + 1) * grid.cell_w) as f32 / width as f32,
            ((comp.max.1 + 1) * grid.cell_h) as f32 / height as f32,
        );
        if bbox.area() < params.min_box_area {
            continue;
        }
        let span = (comp.max.0 - comp.min.0 + 1) * (comp.max.1 - comp.min.1 + 1);
        let fill = comp.cells as f32 / span as f32;
        let mean_density = comp.density_sum / comp.active_cells as f32;
        let density_score = (mean_density / (4.0 * params.cell_density.max(1e-3))).min(1.0);
        regions.push(CandidateRegion {
            id: String::new(),
            bbox,
            confidence: (0.6 * density_score + 0.4 * fill).clamp(0.0, 1.0),
            source: RegionSource::EdgeDensity,
        });
    }
    regions
}
