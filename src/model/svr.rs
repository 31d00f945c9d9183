use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TAU: f64 = 1e-12;
const MIN_ITERATIONS_PER_VARIABLE: usize = 100;

#[derive(Debug, Error)]
pub enum SvrError {
    #[error("Solver did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },
    #[error("Invalid hyperparameter {name} = {value}")]
    InvalidHyperparameter { name: &'static str, value: f64 },
    #[error("Shape mismatch: {features} features vs {targets} targets")]
    Shape { features: usize, targets: usize },
}

pub type Result<T> = std::result::Result<T, SvrError>;

/// One point of the search space: RBF kernel width, regularisation strength,
/// and the half-width of the epsilon-insensitive tube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub gamma: f64,
    pub c: f64,
    pub epsilon: f64,
}

impl Hyperparameters {
    pub fn new(gamma: f64, c: f64, epsilon: f64) -> Self {
        Self { gamma, c, epsilon }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(SvrError::InvalidHyperparameter {
                name: "gamma",
                value: self.gamma,
            });
        }
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(SvrError::InvalidHyperparameter {
                name: "c",
                value: self.c,
            });
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SvrError::InvalidHyperparameter {
                name: "epsilon",
                value: self.epsilon,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Stopping tolerance on the maximal KKT violation.
    pub tolerance: f64,
    /// Iteration cap for one fit. Never lower than 100 iterations per dual
    /// variable (`200 * n` for `n` samples); smaller values are raised to that
    /// floor.
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 10_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrModel {
    support_vectors: Array1<f64>,
    dual_coef: Array1<f64>,
    intercept: f64,
    gamma: f64,
    iterations: usize,
}

impl SvrModel {
    pub fn predict(&self, x: f64) -> f64 {
        let kernel_sum: f64 = self
            .support_vectors
            .iter()
            .zip(self.dual_coef.iter())
            .map(|(&sv, &coef)| coef * rbf(self.gamma, sv, x))
            .sum();
        kernel_sum + self.intercept
    }

    pub fn predict_batch(&self, xs: ArrayView1<f64>) -> Array1<f64> {
        xs.mapv(|x| self.predict(x))
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

#[inline]
fn rbf(gamma: f64, a: f64, b: f64) -> f64 {
    let d = a - b;
    (-gamma * d * d).exp()
}

/// Epsilon-SVR with an RBF kernel on a single feature, solved in the dual by
/// sequential minimal optimisation.
///
/// The dual has `2n` variables: `alpha[i]` for the upper tube edge and
/// `alpha[i + n]` for the lower edge, each boxed in `[0, C]`, with the
/// equality constraint `sum(y * alpha) = 0` where `y` is `+1` for the first
/// half and `-1` for the second. Working pairs are chosen with second-order
/// information as in libsvm.
pub struct SupportVectorRegressor {
    params: Hyperparameters,
    settings: SolverSettings,
}

impl SupportVectorRegressor {
    pub fn new(params: Hyperparameters, settings: SolverSettings) -> Self {
        Self { params, settings }
    }

    pub fn fit(&self, features: ArrayView1<f64>, targets: ArrayView1<f64>) -> Result<SvrModel> {
        self.params.validate()?;

        let n = features.len();
        if n == 0 || n != targets.len() {
            return Err(SvrError::Shape {
                features: n,
                targets: targets.len(),
            });
        }

        let gamma = self.params.gamma;
        let c = self.params.c;
        let kernel = Array2::from_shape_fn((n, n), |(i, j)| rbf(gamma, features[i], features[j]));

        let l = 2 * n;
        let sign = |t: usize| if t < n { 1.0 } else { -1.0 };
        let q = |a: usize, b: usize| sign(a) * sign(b) * kernel[[a % n, b % n]];

        let mut alpha = vec![0.0_f64; l];
        // Gradient of the dual objective at alpha = 0 is the linear term
        let mut grad: Vec<f64> = (0..l)
            .map(|t| {
                if t < n {
                    self.params.epsilon - targets[t]
                } else {
                    self.params.epsilon + targets[t - n]
                }
            })
            .collect();

        let is_upper = |a: f64| a >= c;
        let is_lower = |a: f64| a <= 0.0;

        let max_iterations = self
            .settings
            .max_iterations
            .max(MIN_ITERATIONS_PER_VARIABLE * l);
        let mut iterations = 0;

        loop {
            let Some((i, j)) = self.select_working_set(&alpha, &grad, &q, n, c) else {
                break;
            };

            if iterations >= max_iterations {
                return Err(SvrError::Convergence {
                    iterations,
                    reason: "iteration limit reached".to_string(),
                });
            }
            iterations += 1;

            let (old_ai, old_aj) = (alpha[i], alpha[j]);
            let q_ij = q(i, j);
            // Diagonal of Q is K(x, x) = 1 for the RBF kernel
            if sign(i) != sign(j) {
                let mut quad = 2.0 + 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;

                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let mut quad = 2.0 - 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;

                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let delta_i = alpha[i] - old_ai;
            let delta_j = alpha[j] - old_aj;
            for (t, g) in grad.iter_mut().enumerate() {
                *g += q(i, t) * delta_i + q(j, t) * delta_j;
            }

            if !delta_i.is_finite() || !delta_j.is_finite() {
                return Err(SvrError::Convergence {
                    iterations,
                    reason: "non-finite update".to_string(),
                });
            }
        }

        let rho = compute_rho(&alpha, &grad, n, &is_upper, &is_lower);
        if !rho.is_finite() {
            return Err(SvrError::Convergence {
                iterations,
                reason: "non-finite intercept".to_string(),
            });
        }

        let (support_vectors, dual_coef): (Vec<f64>, Vec<f64>) = (0..n)
            .filter_map(|k| {
                let coef = alpha[k] - alpha[k + n];
                (coef != 0.0).then_some((features[k], coef))
            })
            .unzip();

        Ok(SvrModel {
            support_vectors: Array1::from_vec(support_vectors),
            dual_coef: Array1::from_vec(dual_coef),
            intercept: -rho,
            gamma,
            iterations,
        })
    }

    /// Pick the maximal-violating pair using second-order gain; `None` once the
    /// KKT violation falls under the tolerance.
    fn select_working_set<Q>(
        &self,
        alpha: &[f64],
        grad: &[f64],
        q: &Q,
        n: usize,
        c: f64,
    ) -> Option<(usize, usize)>
    where
        Q: Fn(usize, usize) -> f64,
    {
        let l = alpha.len();
        let positive = |t: usize| t < n;

        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..l {
            if positive(t) {
                if alpha[t] < c && -grad[t] >= g_max {
                    g_max = -grad[t];
                    i_sel = Some(t);
                }
            } else if alpha[t] > 0.0 && grad[t] >= g_max {
                g_max = grad[t];
                i_sel = Some(t);
            }
        }
        let i = i_sel?;
        let y_i = if positive(i) { 1.0 } else { -1.0 };

        let mut g_max2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        let mut obj_diff_min = f64::INFINITY;
        for t in 0..l {
            if positive(t) {
                if alpha[t] > 0.0 {
                    let grad_diff = g_max + grad[t];
                    if grad[t] >= g_max2 {
                        g_max2 = grad[t];
                    }
                    if grad_diff > 0.0 {
                        let quad = 2.0 - 2.0 * y_i * q(i, t);
                        let obj_diff = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                        if obj_diff <= obj_diff_min {
                            obj_diff_min = obj_diff;
                            j_sel = Some(t);
                        }
                    }
                }
            } else if alpha[t] < c {
                let grad_diff = g_max - grad[t];
                if -grad[t] >= g_max2 {
                    g_max2 = -grad[t];
                }
                if grad_diff > 0.0 {
                    let quad = 2.0 + 2.0 * y_i * q(i, t);
                    let obj_diff = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                    if obj_diff <= obj_diff_min {
                        obj_diff_min = obj_diff;
                        j_sel = Some(t);
                    }
                }
            }
        }

        if g_max + g_max2 < self.settings.tolerance {
            return None;
        }
        j_sel.map(|j| (i, j))
    }
}

/// Offset of the decision function, averaged over free variables when any
/// exist and taken from the feasible midpoint otherwise.
fn compute_rho<U, L>(alpha: &[f64], grad: &[f64], n: usize, is_upper: &U, is_lower: &L) -> f64
where
    U: Fn(f64) -> bool,
    L: Fn(f64) -> bool,
{
    let mut upper_bound = f64::INFINITY;
    let mut lower_bound = f64::NEG_INFINITY;
    let mut free_count = 0usize;
    let mut free_sum = 0.0;

    for (t, (&a, &g)) in alpha.iter().zip(grad.iter()).enumerate() {
        let y = if t < n { 1.0 } else { -1.0 };
        let y_grad = y * g;
        if is_upper(a) {
            if y < 0.0 {
                upper_bound = upper_bound.min(y_grad);
            } else {
                lower_bound = lower_bound.max(y_grad);
            }
        } else if is_lower(a) {
            if y > 0.0 {
                upper_bound = upper_bound.min(y_grad);
            } else {
                lower_bound = lower_bound.max(y_grad);
            }
        } else {
            free_count += 1;
            free_sum += y_grad;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper_bound + lower_bound) / 2.0
    }
}
