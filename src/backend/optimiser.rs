//! Adam optimiser for weight matrices.

use ndarray::{Array2, Zip};

/// Adam hyper-parameters. `alpha` is the live learning rate the warm-up
/// schedule adjusts between batches.
#[derive(Debug, Clone, Copy)]
pub struct Adam {
    pub alpha: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Adam {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    /// Apply one descent step to `weights` given `grad`.
    pub fn step(&self, state: &mut AdamState, weights: &mut Array2<f32>, grad: &Array2<f32>) {
        state.t += 1;
        let bias_1 = 1.0 - self.beta1.powi(state.t);
        let bias_2 = 1.0 - self.beta2.powi(state.t);
        let (beta1, beta2, alpha, eps) = (self.beta1, self.beta2, self.alpha, self.epsilon);
        Zip::from(weights)
            .and(&mut state.m)
            .and(&mut state.v)
            .and(grad)
            .for_each(|w, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_1;
                let v_hat = *v / bias_2;
                *w -= alpha * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

/// First/second moment estimates for one weight matrix.
#[derive(Debug, Clone)]
pub struct AdamState {
    m: Array2<f32>,
    v: Array2<f32>,
    t: i32,
}

impl AdamState {
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
            t: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_first_step_moves_by_alpha() {
        let adam = Adam::new(0.01);
        let mut state = AdamState::new((1, 2));
        let mut w = ndarray::arr2(&[[1.0, 1.0]]);
        let g = ndarray::arr2(&[[2.0, -0.5]]);
        adam.step(&mut state, &mut w, &g);
        // Bias-corrected first step is alpha * sign(g).
        assert_abs_diff_eq!(w[[0, 0]], 0.99, epsilon = 1e-5);
        assert_abs_diff_eq!(w[[0, 1]], 1.01, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_gradient_leaves_weights() {
        let adam = Adam::new(0.1);
        let mut state = AdamState::new((2, 2));
        let mut w = ndarray::arr2(&[[0.5, 0.0], [0.0, -0.5]]);
        let before = w.clone();
        adam.step(&mut state, &mut w, &Array2::zeros((2, 2)));
        assert_eq!(w, before);
    }
}
