//! 8×8 inverse DCT.
//!
//! Implements the JPEG reconstruction convention
//!
//! ```text
//! s(y, x) = 1/4 · Σ_u Σ_v C(u) C(v) S(v, u) cos((2x+1)uπ/16) cos((2y+1)vπ/16)
//! ```
//!
//! with `C(0) = 1/√2` and `C(k) = 1` otherwise, evaluated as two passes of
//! the 8-point basis (rows, then columns). The basis matrix is computed once
//! and reused for every block of a decode.

use std::f64::consts::PI;

pub struct Idct {
    /// `basis[x][u] = C(u) · cos((2x+1)uπ/16)`.
    basis: [[f64; 8]; 8],
}

impl Idct {
    pub fn new() -> Self {
        let mut basis = [[0.0; 8]; 8];
        for (x, row) in basis.iter_mut().enumerate() {
            for (u, b) in row.iter_mut().enumerate() {
                let c = if u == 0 { 0.5f64.sqrt() } else { 1.0 };
                *b = c * ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos();
            }
        }
        Self { basis }
    }

    /// Transforms one block of frequency coefficients into spatial samples.
    /// Both arrays are in raster order.
    pub fn inverse(&self, coeffs: &[f64; 64], out: &mut [f64; 64]) {
        let mut rows = [0.0f64; 64];
        for v in 0..8 {
            for x in 0..8 {
                let mut acc = 0.0;
                for u in 0..8 {
                    acc += self.basis[x][u] * coeffs[v * 8 + u];
                }
                rows[v * 8 + x] = acc;
            }
        }

        for y in 0..8 {
            for x in 0..8 {
                let mut acc = 0.0;
                for v in 0..8 {
                    acc += self.basis[y][v] * rows[v * 8 + x];
                }
                out[y * 8 + x] = 0.25 * acc;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The quadruple sum straight out of the standard, as a cross-check for
    /// the separable implementation.
    fn reference(coeffs: &[f64; 64]) -> [f64; 64] {
        let c = |k: usize| if k == 0 { 0.5f64.sqrt() } else { 1.0 };
        let mut out = [0.0; 64];
        for y in 0..8 {
            for x in 0..8 {
                let mut acc = 0.0;
                for v in 0..8 {
                    for u in 0..8 {
                        acc += c(u)
                            * c(v)
                            * coeffs[v * 8 + u]
                            * ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos()
                            * ((2 * y + 1) as f64 * v as f64 * PI / 16.0).cos();
                    }
                }
                out[y * 8 + x] = acc / 4.0;
            }
        }
        out
    }

    #[test]
    fn constant_dc_block() {
        // A lone DC coefficient reconstructs to the flat value DC/8.
        let mut coeffs = [0.0; 64];
        coeffs[0] = 512.0;

        let mut out = [0.0; 64];
        Idct::new().inverse(&coeffs, &mut out);
        for &s in &out {
            assert!((s - 64.0).abs() < 1e-9, "expected 64, got {s}");
        }
    }

    #[test]
    fn single_ac_coefficient() {
        let mut coeffs = [0.0; 64];
        coeffs[1] = 100.0; // u = 1, v = 0

        let mut out = [0.0; 64];
        Idct::new().inverse(&coeffs, &mut out);

        for y in 0..8 {
            for x in 0..8 {
                let expected =
                    0.25 * 0.5f64.sqrt() * 100.0 * ((2 * x + 1) as f64 * PI / 16.0).cos();
                let got = out[y * 8 + x];
                assert!((got - expected).abs() < 1e-9, "at ({y},{x}): {got} vs {expected}");
            }
        }
    }

    #[test]
    fn matches_reference_sum() {
        // A fixed block exercising every frequency.
        let mut coeffs = [0.0; 64];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = ((i as f64 * 37.0) % 101.0) - 50.0;
        }

        let mut out = [0.0; 64];
        Idct::new().inverse(&coeffs, &mut out);
        let expected = reference(&coeffs);
        for i in 0..64 {
            assert!(
                (out[i] - expected[i]).abs() < 1e-9,
                "index {i}: {} vs {}",
                out[i],
                expected[i]
            );
        }
    }
}
