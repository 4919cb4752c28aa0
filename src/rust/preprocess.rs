//! Normalization of arbitrary drawings into the classifier's canvas.
//!
//! The pipeline is pure and deterministic:
//! decode to luminance, make the ink bright on a dark background, crop to the
//! ink, shrink it to fit a [`TARGET_SIZE`] square, paste centered on a
//! [`CANVAS_SIZE`] square, scale to `[0, 1]`, and mirror horizontally.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::{s, Array2, Array4, ArrayView2};

use crate::classifier::INPUT_SIZE;
use crate::error::PredictError;

/// Side of the square canvas the classifier consumes.
pub const CANVAS_SIZE: usize = INPUT_SIZE;
/// Longest side of the glyph once it is pasted on the canvas.
pub const TARGET_SIZE: usize = 20;
/// Images whose mean intensity is above this are treated as dark ink on light paper.
pub const POLARITY_THRESHOLD: f32 = 127.0;
/// Pixels brighter than this count as ink.
pub const INK_THRESHOLD: f32 = 30.0;

/// Box reduction stops once a crop is within this multiple of its target size.
pub const REDUCING_GAP: f64 = 2.0;

const MAX_INTENSITY: f32 = 255.0;

/// Inclusive pixel rectangle enclosing every ink pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl BoundingBox {
    pub fn height(&self) -> usize {
        self.row_max - self.row_min + 1
    }

    pub fn width(&self) -> usize {
        self.col_max - self.col_min + 1
    }

    /// Borrows the part of `grid` covered by this box.
    pub fn crop<'a>(&self, grid: &'a Array2<f32>) -> ArrayView2<'a, f32> {
        grid.slice(s![self.row_min..=self.row_max, self.col_min..=self.col_max])
    }
}

/// Turns encoded image bytes into a `1x28x28x1` tensor with values in `[0, 1]`.
pub fn preprocess(bytes: &[u8]) -> Result<Array4<f32>, PredictError> {
    let grid = decode_luma(bytes)?;
    preprocess_grid(grid)
}

/// Runs the pipeline on an already decoded luminance grid (rows x cols, 0-255).
pub fn preprocess_grid(mut grid: Array2<f32>) -> Result<Array4<f32>, PredictError> {
    normalize_polarity(&mut grid);

    let canvas = match ink_bounding_box(&grid) {
        Some(bbox) => {
            let glyph = fit_to_box(bbox.crop(&grid), TARGET_SIZE)?;
            paste_centered(&glyph)?
        }
        None => Array2::zeros((CANVAS_SIZE, CANVAS_SIZE)),
    };

    let canvas = mirror_horizontal(&canvas.mapv(|v| v / MAX_INTENSITY));
    Ok(canvas.into_shape_with_order((1, CANVAS_SIZE, CANVAS_SIZE, 1))?)
}

/// Decodes any format the `image` crate understands into a luminance grid.
///
/// Color images are reduced with the ITU-R 601-2 weights; alpha is ignored.
pub fn decode_luma(bytes: &[u8]) -> Result<Array2<f32>, PredictError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width() as usize, image.height() as usize);

    let values: Vec<f32> = match image {
        DynamicImage::ImageLuma8(gray) => gray.into_raw().into_iter().map(f32::from).collect(),
        DynamicImage::ImageLumaA8(gray) => gray.pixels().map(|p| f32::from(p.0[0])).collect(),
        other => other.to_rgb8().pixels().map(|p| f32::from(luma_601(p.0))).collect(),
    };

    Ok(Array2::from_shape_vec((height, width), values)?)
}

/// Fixed-point `0.299 R + 0.587 G + 0.114 B`, rounded.
fn luma_601([r, g, b]: [u8; 3]) -> u8 {
    let weighted = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000;
    (weighted >> 16) as u8
}

/// Inverts the grid in place when its mean is above [`POLARITY_THRESHOLD`].
///
/// Returns whether the grid was inverted.
pub fn normalize_polarity(grid: &mut Array2<f32>) -> bool {
    if mean_intensity(grid) > f64::from(POLARITY_THRESHOLD) {
        grid.mapv_inplace(|v| MAX_INTENSITY - v);
        true
    } else {
        false
    }
}

/// Mean intensity, accumulated in f64 so large grids stay exact.
pub fn mean_intensity(grid: &Array2<f32>) -> f64 {
    if grid.is_empty() {
        return 0.0;
    }
    grid.iter().map(|&v| f64::from(v)).sum::<f64>() / grid.len() as f64
}

/// Finds the tight box around all pixels brighter than [`INK_THRESHOLD`].
pub fn ink_bounding_box(grid: &Array2<f32>) -> Option<BoundingBox> {
    grid.indexed_iter()
        .filter(|(_, &v)| v > INK_THRESHOLD)
        .fold(None, |bbox: Option<BoundingBox>, ((row, col), _)| {
            Some(match bbox {
                None => BoundingBox { row_min: row, row_max: row, col_min: col, col_max: col },
                Some(b) => BoundingBox {
                    row_min: b.row_min.min(row),
                    row_max: b.row_max.max(row),
                    col_min: b.col_min.min(col),
                    col_max: b.col_max.max(col),
                },
            })
        })
}

/// Output size `(rows, cols)` of `rows x cols` shrunk to fit a `target` square.
///
/// Crops that already fit keep their size; nothing is ever enlarged. Otherwise the
/// longer side becomes `target` and the shorter one keeps the aspect ratio.
pub fn fitted_size(rows: usize, cols: usize, target: usize) -> (usize, usize) {
    if rows <= target && cols <= target {
        return (rows, cols);
    }
    let scale = |short: usize, long: usize| {
        ((short as f64 * target as f64 / long as f64).round() as usize).clamp(1, target)
    };
    if cols >= rows {
        (scale(rows, cols), target)
    } else {
        (target, scale(cols, rows))
    }
}

/// Integer box-reduction factor applied before resampling `from` down to `to`.
///
/// Large crops are averaged in blocks first while at least [`REDUCING_GAP`]
/// times the target size remains, so Lanczos only covers the last step.
fn reduction_factor(from: usize, to: usize) -> usize {
    ((from as f64 / to as f64 / REDUCING_GAP).floor() as usize).max(1)
}

/// Averages `factor_rows x factor_cols` blocks of `grid`.
///
/// Blocks on the bottom and right edges may be partial; they average the pixels they have.
pub fn box_reduce(grid: ArrayView2<f32>, factor_rows: usize, factor_cols: usize) -> Array2<f32> {
    let (rows, cols) = grid.dim();
    let out_rows = rows.div_ceil(factor_rows);
    let out_cols = cols.div_ceil(factor_cols);
    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let row_end = ((r + 1) * factor_rows).min(rows);
        let col_end = ((c + 1) * factor_cols).min(cols);
        let block = grid.slice(s![r * factor_rows..row_end, c * factor_cols..col_end]);
        block.iter().map(|&v| f64::from(v)).sum::<f64>() as f32 / block.len() as f32
    })
}

/// Shrinks `crop` to fit within a `target` square, like a thumbnail.
///
/// Crops that already fit are returned unchanged. Larger ones are box-reduced,
/// then resampled with a Lanczos3 filter to [`fitted_size`].
pub fn fit_to_box(crop: ArrayView2<f32>, target: usize) -> Result<Array2<f32>, PredictError> {
    let (rows, cols) = crop.dim();
    if rows == 0 || cols == 0 {
        return Err(PredictError::Shape(format!("cannot resize an empty {}x{} crop", rows, cols)));
    }
    let (new_rows, new_cols) = fitted_size(rows, cols, target);
    if (new_rows, new_cols) == (rows, cols) {
        return Ok(crop.to_owned());
    }

    let factor_rows = reduction_factor(rows, new_rows);
    let factor_cols = reduction_factor(cols, new_cols);
    let reduced = if factor_rows > 1 || factor_cols > 1 {
        box_reduce(crop, factor_rows, factor_cols)
    } else {
        crop.to_owned()
    };
    let (rows, cols) = reduced.dim();

    // Resampled in [0, 1] so the filter's clamping matches the 8-bit range
    let normalized: Vec<f32> = reduced.iter().map(|v| v / MAX_INTENSITY).collect();
    let source: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(cols as u32, rows as u32, normalized).ok_or_else(|| {
            PredictError::Shape(format!("crop buffer does not match {}x{}", rows, cols))
        })?;

    let resized = imageops::resize(&source, new_cols as u32, new_rows as u32, FilterType::Lanczos3);
    let values = resized.into_raw().into_iter().map(|v| v * MAX_INTENSITY).collect();
    Ok(Array2::from_shape_vec((new_rows, new_cols), values)?)
}

/// Pastes `glyph` on a zero canvas at offset `((28 - h) / 2, (28 - w) / 2)`.
///
/// Values are clamped and rounded to whole intensities, like an 8-bit canvas.
pub fn paste_centered(glyph: &Array2<f32>) -> Result<Array2<f32>, PredictError> {
    let (rows, cols) = glyph.dim();
    if rows > CANVAS_SIZE || cols > CANVAS_SIZE {
        return Err(PredictError::Shape(format!(
            "glyph of {}x{} does not fit a {}x{} canvas",
            rows, cols, CANVAS_SIZE, CANVAS_SIZE
        )));
    }
    let top = (CANVAS_SIZE - rows) / 2;
    let left = (CANVAS_SIZE - cols) / 2;

    let mut canvas = Array2::zeros((CANVAS_SIZE, CANVAS_SIZE));
    canvas
        .slice_mut(s![top..top + rows, left..left + cols])
        .assign(&glyph.mapv(|v| v.clamp(0.0, MAX_INTENSITY).round()));
    Ok(canvas)
}

/// Flips the columns of `canvas`. Applying it twice is the identity.
pub fn mirror_horizontal(canvas: &Array2<f32>) -> Array2<f32> {
    canvas.slice(s![.., ..;-1]).as_standard_layout().into_owned()
}
