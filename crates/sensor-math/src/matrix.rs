//! Row-major `R x C` matrices.

use crate::vector::Vector;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix<const R: usize, const C: usize> {
    pub m: [[f32; C]; R],
}

pub type Matrix3 = Matrix<3, 3>;

impl<const R: usize, const C: usize> Matrix<R, C> {
    pub const fn new(m: [[f32; C]; R]) -> Self {
        Self { m }
    }

    pub const fn zeros() -> Self {
        Self { m: [[0.0; C]; R] }
    }

    /// Builds a matrix whose rows are the given vectors.
    pub fn from_rows(rows: [Vector<C>; R]) -> Self {
        Self {
            m: rows.map(|row| row.m),
        }
    }

    pub fn row(&self, r: usize) -> Vector<C> {
        Vector::new(self.m[r])
    }

    pub fn transpose(&self) -> Matrix<C, R> {
        let mut out = Matrix::<C, R>::zeros();
        for r in 0..R {
            for c in 0..C {
                out.m[c][r] = self.m[r][c];
            }
        }
        out
    }

    /// Element-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, eps: f32) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl<const N: usize> Matrix<N, N> {
    pub fn identity() -> Self {
        let mut out = Self::zeros();
        for i in 0..N {
            out.m[i][i] = 1.0;
        }
        out
    }

    pub fn trace(&self) -> f32 {
        (0..N).map(|i| self.m[i][i]).sum()
    }
}

impl<const R: usize, const C: usize> Add for Matrix<R, C> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut out = self;
        for r in 0..R {
            for c in 0..C {
                out.m[r][c] += rhs.m[r][c];
            }
        }
        out
    }
}

impl<const R: usize, const C: usize> Sub for Matrix<R, C> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let mut out = self;
        for r in 0..R {
            for c in 0..C {
                out.m[r][c] -= rhs.m[r][c];
            }
        }
        out
    }
}

impl<const R: usize, const C: usize> Mul<f32> for Matrix<R, C> {
    type Output = Self;

    fn mul(self, s: f32) -> Self {
        Self {
            m: self.m.map(|row| row.map(|v| v * s)),
        }
    }
}

impl<const R: usize, const K: usize, const C: usize> Mul<Matrix<K, C>> for Matrix<R, K> {
    type Output = Matrix<R, C>;

    fn mul(self, rhs: Matrix<K, C>) -> Matrix<R, C> {
        let mut out = Matrix::<R, C>::zeros();
        for r in 0..R {
            for c in 0..C {
                out.m[r][c] = (0..K).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        out
    }
}

impl<const R: usize, const C: usize> Mul<Vector<C>> for Matrix<R, C> {
    type Output = Vector<R>;

    fn mul(self, v: Vector<C>) -> Vector<R> {
        let mut out = Vector::<R>::zeros();
        for r in 0..R {
            out.m[r] = self.row(r).dot(&v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_by_identity() {
        let a = Matrix3::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(a * Matrix3::identity(), a);
        assert_eq!(Matrix3::identity() * a, a);
    }

    #[test]
    fn rectangular_product_and_transpose() {
        let a = Matrix::<2, 3>::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let at = a.transpose();
        assert_eq!(at.m, [[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
        let p = a * at;
        assert_eq!(p.m, [[14.0, 32.0], [32.0, 77.0]]);
    }

    #[test]
    fn add_sub_scale() {
        let a = Matrix::<2, 2>::new([[1.0, 2.0], [3.0, 4.0]]);
        let b = Matrix::<2, 2>::new([[4.0, 3.0], [2.0, 1.0]]);
        assert_eq!((a + b).m, [[5.0, 5.0], [5.0, 5.0]]);
        assert_eq!((a - a), Matrix::zeros());
        assert_eq!((a * 2.0).m, [[2.0, 4.0], [6.0, 8.0]]);
    }

    #[test]
    fn matrix_vector_product() {
        let a = Matrix3::new([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let v = a * Vector::new([1.0, 0.0, 0.0]);
        assert_eq!(v.m, [0.0, 1.0, 0.0]);
    }
}
