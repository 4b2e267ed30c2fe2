use crate::MppiError;

/// Savitzky-Golay low-pass filter.
///
/// Fits a least-squares polynomial over a sliding window and evaluates it at
/// the window center. Interior points reduce to a fixed convolution whose
/// coefficients are derived once at construction; the first and last
/// `window / 2` points come from a polynomial fitted to the leading/trailing
/// `window` samples, matching `scipy.signal.savgol_filter`'s interpolation
/// edge mode. Polynomials of degree <= `order` pass through unchanged.
pub struct Savgol {
    window: usize,
    half: usize,
    /// Convolution coefficients for the window center.
    center: na::DVector<f64>,
    /// Maps `window` samples to fitted polynomial coefficients, lowest
    /// degree first, over positions `0..window`.
    edge: na::DMatrix<f64>,
}

impl Savgol {
    pub fn new(window: usize, order: usize) -> Result<Self, MppiError> {
        if window % 2 == 0 || window <= order {
            return Err(MppiError::SmoothingWindow(window));
        }
        let half = window / 2;

        // centered Vandermonde for the interior convolution
        let a = na::DMatrix::from_fn(window, order + 1, |i, j| {
            (i as f64 - half as f64).powi(j as i32)
        });
        let pinv = (a.transpose() * &a)
            .try_inverse()
            .ok_or(MppiError::SmoothingDesign(window))?
            * a.transpose();
        let center = pinv.row(0).transpose();

        // edge fit over absolute positions 0..window
        let b = na::DMatrix::from_fn(window, order + 1, |i, j| (i as f64).powi(j as i32));
        let edge = (b.transpose() * &b)
            .try_inverse()
            .ok_or(MppiError::SmoothingDesign(window))?
            * b.transpose();

        Ok(Self {
            window,
            half,
            center,
            edge,
        })
    }

    /// Filters one channel. `y` must hold at least `window` samples.
    pub fn smooth(&self, y: &[f64]) -> Vec<f64> {
        let n = y.len();
        debug_assert!(n >= self.window);
        let mut out = vec![0.0; n];

        for t in self.half..n - self.half {
            out[t] = self
                .center
                .iter()
                .enumerate()
                .map(|(j, c)| c * y[t + j - self.half])
                .sum();
        }

        let head = &self.edge * na::DVector::from_column_slice(&y[..self.window]);
        for (t, slot) in out.iter_mut().take(self.half).enumerate() {
            *slot = poly_eval(&head, t as f64);
        }

        let tail = &self.edge * na::DVector::from_column_slice(&y[n - self.window..]);
        for (t, slot) in out.iter_mut().enumerate().skip(n - self.half) {
            *slot = poly_eval(&tail, (t + self.window - n) as f64);
        }

        out
    }
}

fn poly_eval(coeffs: &na::DVector<f64>, x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_passes_through() {
        let f = Savgol::new(5, 3).unwrap();
        for v in f.smooth(&[0.7; 12]) {
            assert_relative_eq!(v, 0.7, epsilon = 1e-9);
        }
    }

    #[test]
    fn cubic_passes_through() {
        let f = Savgol::new(7, 3).unwrap();
        let y: Vec<f64> = (0..16)
            .map(|i| {
                let x = i as f64;
                x.powi(3) - 2.0 * x.powi(2) + 3.0 * x - 1.0
            })
            .collect();
        for (s, orig) in f.smooth(&y).iter().zip(&y) {
            assert_relative_eq!(*s, *orig, epsilon = 1e-6, max_relative = 1e-9);
        }
    }

    #[test]
    fn attenuates_alternation() {
        let f = Savgol::new(5, 3).unwrap();
        let y: Vec<f64> = (0..11).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = f.smooth(&y);
        for v in &s[2..9] {
            assert!(v.abs() < 1.0);
        }
    }

    #[test]
    fn even_window_rejected() {
        assert!(matches!(
            Savgol::new(6, 3),
            Err(MppiError::SmoothingWindow(6))
        ));
    }

    #[test]
    fn narrow_window_rejected() {
        assert!(matches!(
            Savgol::new(3, 3),
            Err(MppiError::SmoothingWindow(3))
        ));
    }
}
