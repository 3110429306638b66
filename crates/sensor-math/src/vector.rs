//! Fixed-size single-precision vectors.

use std::ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub};

/// A column vector of `N` components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector<const N: usize> {
    pub m: [f32; N],
}

/// Three-component vector, the workhorse of the sensor pipeline.
pub type Vector3 = Vector<3>;

impl<const N: usize> Vector<N> {
    pub const fn new(m: [f32; N]) -> Self {
        Self { m }
    }

    pub const fn zeros() -> Self {
        Self { m: [0.0; N] }
    }

    /// Builds a vector from the first `N` entries of `values`, padding with zeros.
    pub fn from_slice(values: &[f32]) -> Self {
        let mut m = [0.0; N];
        for (dst, src) in m.iter_mut().zip(values) {
            *dst = *src;
        }
        Self { m }
    }

    pub fn add_scalar(&self, s: f32) -> Self {
        self.map(|v| v + s)
    }

    pub fn sub_scalar(&self, s: f32) -> Self {
        self.map(|v| v - s)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.m.iter().zip(other.m.iter()).map(|(a, b)| a * b).sum()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` when the norm is zero
    /// (or not finite) and the direction is undefined.
    pub fn normalize(&self) -> Option<Self> {
        let n = self.norm();
        if n == 0.0 || !n.is_finite() {
            return None;
        }
        Some(*self / n)
    }

    /// Population variance of the components.
    pub fn variance(&self) -> f32 {
        if N == 0 {
            return 0.0;
        }
        let mean = self.m.iter().sum::<f32>() / N as f32;
        self.m.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / N as f32
    }

    /// Component-wise product.
    pub fn component_mul(&self, other: &Self) -> Self {
        let mut m = self.m;
        for (a, b) in m.iter_mut().zip(other.m.iter()) {
            *a *= b;
        }
        Self { m }
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self { m: self.m.map(f) }
    }
}

impl Vector<3> {
    pub const fn xyz(x: f32, y: f32, z: f32) -> Self {
        Self { m: [x, y, z] }
    }

    pub fn x(&self) -> f32 {
        self.m[0]
    }

    pub fn y(&self) -> f32 {
        self.m[1]
    }

    pub fn z(&self) -> f32 {
        self.m[2]
    }

    pub fn cross(&self, other: &Self) -> Self {
        let [ax, ay, az] = self.m;
        let [bx, by, bz] = other.m;
        Self::xyz(ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx)
    }
}

impl<const N: usize> Default for Vector<N> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<const N: usize> From<[f32; N]> for Vector<N> {
    fn from(m: [f32; N]) -> Self {
        Self { m }
    }
}

impl<const N: usize> Index<usize> for Vector<N> {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        &self.m[i]
    }
}

impl<const N: usize> IndexMut<usize> for Vector<N> {
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        &mut self.m[i]
    }
}

impl<const N: usize> Add for Vector<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut m = self.m;
        for (a, b) in m.iter_mut().zip(rhs.m.iter()) {
            *a += b;
        }
        Self { m }
    }
}

impl<const N: usize> Sub for Vector<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let mut m = self.m;
        for (a, b) in m.iter_mut().zip(rhs.m.iter()) {
            *a -= b;
        }
        Self { m }
    }
}

impl<const N: usize> Mul<f32> for Vector<N> {
    type Output = Self;

    fn mul(self, s: f32) -> Self {
        self.map(|v| v * s)
    }
}

impl<const N: usize> Div<f32> for Vector<N> {
    type Output = Self;

    fn div(self, s: f32) -> Self {
        self.map(|v| v / s)
    }
}

impl<const N: usize> Neg for Vector<N> {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}
