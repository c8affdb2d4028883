use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Voxel counts of the volume once every axis is resampled to the
    /// smallest spacing.
    ///
    /// `spacing` is (x, y, z) = (column, row, slice) in millimetres and
    /// `original_dim` is (depth, rows, columns); the result uses the same
    /// axis order as `original_dim`.
    pub(crate) fn isotropic_dimensions(
        spacing: (f32, f32, f32),
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        if min_spacing.is_nan() || min_spacing <= 0.0 {
            return original_dim;
        }
        let inv_min_spacing = 1.0 / min_spacing;

        let scale = |count: usize, spacing: f32| {
            ((count as f32 * spacing * inv_min_spacing).round() as usize).max(1)
        };

        (
            scale(original_dim.0, z_spacing),
            scale(original_dim.1, y_spacing),
            scale(original_dim.2, x_spacing),
        )
    }

    /// Resample `plane` to `height` x `width` with bilinear filtering.
    ///
    /// Output pixel centres are mapped back onto the source with a
    /// half-pixel offset and clamped to the source edges.
    pub(crate) fn resample(plane: &ArrayView2<'_, f32>, height: usize, width: usize) -> Array2<f32> {
        let (src_height, src_width) = plane.dim();
        if src_height == 0 || src_width == 0 || (src_height, src_width) == (height, width) {
            return plane.to_owned();
        }

        let values: Vec<f32> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).map(move |x| {
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let norm_y = (y as f32 + 0.5) / height as f32;

                    let src_x = (norm_x * src_width as f32 - 0.5).clamp(0.0, (src_width - 1) as f32);
                    let src_y =
                        (norm_y * src_height as f32 - 0.5).clamp(0.0, (src_height - 1) as f32);

                    Self::bilinear_interpolate(plane, src_y, src_x)
                })
            })
            .collect();

        // `values` holds exactly height * width samples in row-major order.
        Array2::from_shape_vec((height, width), values).unwrap_or_else(|_| plane.to_owned())
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(plane: &ArrayView2<'_, f32>, y: f32, x: f32) -> f32 {
        let (height, width) = plane.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = plane[[y0, x0]];
        let v01 = plane[[y0, x1]];
        let v10 = plane[[y1, x0]];
        let v11 = plane[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn thick_slices_are_stretched_along_depth() {
        let dims = Interpolator::isotropic_dimensions((0.5, 0.5, 2.0), (10, 64, 64));
        assert_eq!(dims, (40, 64, 64));
    }

    #[test]
    fn degenerate_spacing_keeps_dimensions() {
        let dims = Interpolator::isotropic_dimensions((0.0, 1.0, 1.0), (3, 4, 5));
        assert_eq!(dims, (3, 4, 5));
    }

    #[test]
    fn bilinear_midpoint_is_average() {
        let plane = array![[0.0_f32, 10.0], [20.0, 30.0]];
        let value = Interpolator::bilinear_interpolate(&plane.view(), 0.5, 0.5);
        assert!((value - 15.0).abs() < 1e-5);
    }

    #[test]
    fn resample_doubles_rows_and_clamps_edges() {
        let plane = array![[0.0_f32, 0.0], [100.0, 100.0]];
        let out = Interpolator::resample(&plane.view(), 4, 2);
        assert_eq!(out.dim(), (4, 2));
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[3, 1]], 100.0);
        assert!(out[[1, 0]] > 0.0 && out[[1, 0]] < 100.0);
    }
}
