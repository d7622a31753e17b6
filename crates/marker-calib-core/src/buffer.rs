//! Strided extraction from flat foreign buffers.
//!
//! Every piece of per-frame data that enters the pipeline arrives as a flat
//! numeric array owned by the caller: ids as `i32`, marker quads as 8 `f32`
//! per marker, rotation/translation vectors as 3 `f64` per vector. The
//! functions here copy such an array into owned values, grouping `stride`
//! consecutive scalars into one logical unit via a [`Collect`] strategy.
//!
//! ```
//! use marker_calib_core::buffer::{extract, VectorPack3};
//!
//! let flat = [1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let vecs = extract(&flat, 0, None, &VectorPack3);
//! assert_eq!(vecs.len(), 2);
//! assert_eq!(vecs[1].z, 6.0);
//! ```

use crate::Quad;
use nalgebra::{Point2, Scalar, Vector3};

/// Grouping strategy: how many scalars make up one unit and how to build it.
///
/// The chunk handed to [`Collect::collect`] always has exactly
/// [`Collect::stride`] elements and borrows the source buffer only for the
/// duration of the call.
pub trait Collect<T> {
    type Output;

    fn stride(&self) -> usize;

    fn collect(&self, chunk: &[T]) -> Self::Output;
}

/// One scalar per unit, copied as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarCopy;

/// Two scalars per unit packed into a 2D point.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointPack2;

/// Three scalars per unit packed into a 3-vector.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorPack3;

/// Eight scalars per unit packed into a 4-corner marker quad
/// (`x0, y0, x1, y1, x2, y2, x3, y3`).
#[derive(Clone, Copy, Debug, Default)]
pub struct QuadPack8;

/// Caller-defined stride with an arbitrary transform.
#[derive(Clone, Copy, Debug)]
pub struct Strided<F> {
    pub stride: usize,
    pub transform: F,
}

impl<T: Copy> Collect<T> for ScalarCopy {
    type Output = T;

    #[inline]
    fn stride(&self) -> usize {
        1
    }

    #[inline]
    fn collect(&self, chunk: &[T]) -> T {
        chunk[0]
    }
}

impl<T: Scalar + Copy> Collect<T> for PointPack2 {
    type Output = Point2<T>;

    #[inline]
    fn stride(&self) -> usize {
        2
    }

    #[inline]
    fn collect(&self, chunk: &[T]) -> Point2<T> {
        Point2::new(chunk[0], chunk[1])
    }
}

impl<T: Scalar + Copy> Collect<T> for VectorPack3 {
    type Output = Vector3<T>;

    #[inline]
    fn stride(&self) -> usize {
        3
    }

    #[inline]
    fn collect(&self, chunk: &[T]) -> Vector3<T> {
        Vector3::new(chunk[0], chunk[1], chunk[2])
    }
}

impl Collect<f32> for QuadPack8 {
    type Output = Quad;

    #[inline]
    fn stride(&self) -> usize {
        8
    }

    #[inline]
    fn collect(&self, chunk: &[f32]) -> Quad {
        [
            Point2::new(chunk[0], chunk[1]),
            Point2::new(chunk[2], chunk[3]),
            Point2::new(chunk[4], chunk[5]),
            Point2::new(chunk[6], chunk[7]),
        ]
    }
}

impl<T, U, F> Collect<T> for Strided<F>
where
    F: Fn(&[T]) -> U,
{
    type Output = U;

    #[inline]
    fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    fn collect(&self, chunk: &[T]) -> U {
        (self.transform)(chunk)
    }
}

/// Number of units `extract` would produce for the given window.
///
/// `count` is the exclusive end index in scalars; `None` means the end of
/// `src`.
///
/// # Panics
///
/// Panics if the stride is zero, if the window lies outside `src`, or if the
/// window length is not a multiple of the stride.
pub fn unit_count(src_len: usize, offset: usize, count: Option<usize>, stride: usize) -> usize {
    assert!(stride > 0, "collect stride must be positive");
    let end = count.unwrap_or(src_len);
    assert!(
        end <= src_len,
        "extraction window end {end} exceeds buffer length {src_len}"
    );
    assert!(
        offset <= end,
        "extraction offset {offset} is past window end {end}"
    );
    let span = end - offset;
    assert!(
        span % stride == 0,
        "window of {span} elements is not divisible by stride {stride}"
    );
    span / stride
}

/// Append `(count - offset) / stride` units from `src` to `out`.
///
/// # Panics
///
/// See [`unit_count`].
pub fn extract_into<T, C>(
    src: &[T],
    offset: usize,
    count: Option<usize>,
    collector: &C,
    out: &mut Vec<C::Output>,
) where
    C: Collect<T>,
{
    let stride = collector.stride();
    let units = unit_count(src.len(), offset, count, stride);
    out.reserve(units);
    let window = &src[offset..offset + units * stride];
    out.extend(window.chunks_exact(stride).map(|chunk| collector.collect(chunk)));
}

/// Copy `(count - offset) / stride` units out of `src`.
///
/// # Panics
///
/// See [`unit_count`].
pub fn extract<T, C>(src: &[T], offset: usize, count: Option<usize>, collector: &C) -> Vec<C::Output>
where
    C: Collect<T>,
{
    let mut out = Vec::new();
    extract_into(src, offset, count, collector, &mut out);
    out
}

/// Import 3-vectors where `offset` and the end index `count` are expressed in
/// whole vectors rather than scalars. Yields `count - offset` vectors.
pub fn extract_vec3s(src: &[f64], offset: usize, count: Option<usize>) -> Vec<Vector3<f64>> {
    let scalar_count = count.map(|c| c * 3);
    extract(src, offset * 3, scalar_count, &VectorPack3)
}

/// Write the flat scalar form of `quads` into `out` (8 floats per quad).
///
/// Returns the number of quads written, bounded by `out.len() / 8`.
pub fn write_quads(quads: &[Quad], out: &mut [f32]) -> usize {
    let mut written = 0;
    for (quad, slot) in quads.iter().zip(out.chunks_exact_mut(8)) {
        for (k, p) in quad.iter().enumerate() {
            slot[2 * k] = p.x;
            slot[2 * k + 1] = p.y;
        }
        written += 1;
    }
    written
}
