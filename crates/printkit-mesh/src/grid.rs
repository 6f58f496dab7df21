//! Rectangular bed height grids with bilinear sampling

use serde::{Deserialize, Serialize};

use printkit_core::{MeshError, Result};

/// Edge tolerance when deciding whether a sample point lies inside the
/// grid, absorbing float noise from step arithmetic
const EDGE_EPSILON: f64 = 1e-9;

/// Physical rectangle a grid covers, in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Row-major rectangular matrix of measured Z heights
///
/// Rows advance along Y, columns along X; the bounds define a uniform
/// sampling step in each axis. Shape is validated at construction, so
/// sampling never divides by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGrid {
    points: Vec<Vec<f64>>,
    bounds: Bounds,
}

impl MeshGrid {
    /// Build a grid, rejecting ragged or degenerate inputs
    pub fn new(points: Vec<Vec<f64>>, bounds: Bounds) -> Result<Self> {
        let rows = points.len();
        let cols = points.first().map_or(0, |row| row.len());
        if rows < 2 || cols < 2 {
            return Err(MeshError::DegenerateGrid { rows, cols }.into());
        }
        for (row, values) in points.iter().enumerate() {
            if values.len() != cols {
                return Err(MeshError::NotRectangular {
                    row,
                    len: values.len(),
                    expected: cols,
                }
                .into());
            }
        }
        Ok(Self { points, bounds })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Rows (Y samples)
    pub fn rows(&self) -> usize {
        self.points.len()
    }

    /// Columns (X samples)
    pub fn cols(&self) -> usize {
        self.points[0].len()
    }

    /// Distance between adjacent X samples
    pub fn step_x(&self) -> f64 {
        (self.bounds.max_x - self.bounds.min_x) / (self.cols() - 1) as f64
    }

    /// Distance between adjacent Y samples
    pub fn step_y(&self) -> f64 {
        (self.bounds.max_y - self.bounds.min_y) / (self.rows() - 1) as f64
    }

    /// Physical position of the sample at (row, col)
    pub fn position(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.bounds.min_x + col as f64 * self.step_x(),
            self.bounds.min_y + row as f64 * self.step_y(),
        )
    }

    /// Stored height at (row, col)
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.points[row][col]
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Height at an arbitrary physical point via bilinear interpolation
    /// over the four surrounding samples
    pub fn sample(&self, x: f64, y: f64) -> Result<f64> {
        let b = self.bounds;
        if x < b.min_x - EDGE_EPSILON
            || x > b.max_x + EDGE_EPSILON
            || y < b.min_y - EDGE_EPSILON
            || y > b.max_y + EDGE_EPSILON
        {
            return Err(MeshError::OutOfBounds {
                x,
                y,
                min_x: b.min_x,
                max_x: b.max_x,
                min_y: b.min_y,
                max_y: b.max_y,
            }
            .into());
        }

        let tx = ((x - b.min_x) / self.step_x()).clamp(0.0, (self.cols() - 1) as f64);
        let ty = ((y - b.min_y) / self.step_y()).clamp(0.0, (self.rows() - 1) as f64);
        let col = (tx.floor() as usize).min(self.cols() - 2);
        let row = (ty.floor() as usize).min(self.rows() - 2);
        let fx = tx - col as f64;
        let fy = ty - row as f64;

        let z00 = self.points[row][col];
        let z01 = self.points[row][col + 1];
        let z10 = self.points[row + 1][col];
        let z11 = self.points[row + 1][col + 1];
        let bottom = z00 * (1.0 - fx) + z01 * fx;
        let top = z10 * (1.0 - fx) + z11 * fx;
        Ok(bottom * (1.0 - fy) + top * fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printkit_core::Error;

    fn bounds20() -> Bounds {
        Bounds {
            min_x: 0.0,
            max_x: 20.0,
            min_y: 0.0,
            max_y: 20.0,
        }
    }

    fn grid3x3() -> MeshGrid {
        MeshGrid::new(
            vec![
                vec![0.0, 0.1, 0.2],
                vec![0.1, 0.25, 0.3],
                vec![0.2, 0.3, 0.4],
            ],
            bounds20(),
        )
        .unwrap()
    }

    #[test]
    fn sampling_a_grid_point_returns_its_stored_value() {
        let grid = grid3x3();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let (x, y) = grid.position(row, col);
                let sampled = grid.sample(x, y).unwrap();
                assert!((sampled - grid.value(row, col)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn center_sample_is_exact() {
        let grid = grid3x3();
        assert!((grid.sample(10.0, 10.0).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn interpolates_between_samples() {
        let grid = MeshGrid::new(
            vec![vec![0.0, 1.0], vec![0.0, 1.0]],
            bounds20(),
        )
        .unwrap();
        assert!((grid.sample(5.0, 10.0).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_bounds_samples() {
        let grid = grid3x3();
        let err = grid.sample(20.5, 10.0).unwrap_err();
        assert!(matches!(err, Error::Mesh(MeshError::OutOfBounds { .. })));
        assert!(grid.sample(10.0, -0.5).is_err());
    }

    #[test]
    fn rejects_single_row_grid() {
        let err = MeshGrid::new(vec![vec![0.0, 0.1]], bounds20()).unwrap_err();
        assert!(matches!(
            err,
            Error::Mesh(MeshError::DegenerateGrid { rows: 1, cols: 2 })
        ));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = MeshGrid::new(
            vec![vec![0.0, 0.1], vec![0.0]],
            bounds20(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Mesh(MeshError::NotRectangular { row: 1, .. })
        ));
    }
}
