//! Nelder-Mead downhill simplex
//!
//! Derivative-free minimiser used to fit Holt-Winters parameters. The
//! objective receives each candidate mutably and may clamp or rewrite it;
//! the rewritten vertex is what stays in the simplex.

/// Simplex optimiser settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimizer {
    /// Iteration cap per minimisation
    pub max_iterations: usize,
    /// Stop once the standard deviation of the simplex values drops below this
    pub epsilon: f64,
    /// Edge length of the starting simplex
    pub scale: f64,
    pub reflection: f64,
    pub contraction: f64,
    pub expansion: f64,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            epsilon: 1e-4,
            scale: 1.0,
            reflection: 1.0,
            contraction: 0.5,
            expansion: 2.0,
        }
    }
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the iteration cap
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder method: set the convergence threshold
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Minimise `objective` starting from `start`
    ///
    /// Returns the objective value at the best vertex and the vertex itself.
    pub fn minimize<F>(&self, mut objective: F, start: &[f64]) -> (f64, Vec<f64>)
    where
        F: FnMut(&mut [f64]) -> f64,
    {
        let n = start.len();
        if n == 0 {
            return (objective(&mut []), Vec::new());
        }
        let nf = n as f64;

        // Regular starting simplex around `start`
        let pn = self.scale * ((nf + 1.0).sqrt() - 1.0 + nf) / (nf * std::f64::consts::SQRT_2);
        let qn = self.scale * ((nf + 1.0).sqrt() - 1.0) / (nf * std::f64::consts::SQRT_2);

        let mut v: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        v.push(start.to_vec());
        for i in 1..=n {
            v.push(
                start
                    .iter()
                    .enumerate()
                    .map(|(j, x)| if i - 1 == j { pn + x } else { qn + x })
                    .collect(),
            );
        }
        let mut f: Vec<f64> = v.iter_mut().map(|vertex| objective(vertex)).collect();

        let mut vm = vec![0.0; n];
        for _ in 0..self.max_iterations {
            // Worst, best and second-worst vertices
            let (mut vg, mut vs) = (0, 0);
            for i in 0..=n {
                if f[i] > f[vg] {
                    vg = i;
                }
                if f[i] < f[vs] {
                    vs = i;
                }
            }
            let mut vh = vs;
            for i in 0..=n {
                if f[i] > f[vh] && f[i] < f[vg] {
                    vh = i;
                }
            }

            // Centroid of every vertex but the worst
            for (i, c) in vm.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (m, vertex) in v.iter().enumerate() {
                    if m != vg {
                        sum += vertex[i];
                    }
                }
                *c = sum / nf;
            }

            let mut vr: Vec<f64> = (0..n)
                .map(|i| vm[i] + self.reflection * (vm[i] - v[vg][i]))
                .collect();
            let fr = objective(&mut vr);

            if fr < f[vh] && fr >= f[vs] {
                v[vg] = vr.clone();
                f[vg] = fr;
            }

            if fr < f[vs] {
                let mut ve: Vec<f64> = (0..n)
                    .map(|i| vm[i] + self.expansion * (vr[i] - vm[i]))
                    .collect();
                let fe = objective(&mut ve);
                if fe < fr {
                    v[vg] = ve;
                    f[vg] = fe;
                } else {
                    v[vg] = vr.clone();
                    f[vg] = fr;
                }
            }

            if fr >= f[vh] {
                let mut vc: Vec<f64> = if fr < f[vg] && fr >= f[vh] {
                    (0..n)
                        .map(|i| vm[i] + self.contraction * (vr[i] - vm[i]))
                        .collect()
                } else {
                    (0..n)
                        .map(|i| vm[i] - self.contraction * (vm[i] - v[vg][i]))
                        .collect()
                };
                let fc = objective(&mut vc);

                if fc < f[vg] {
                    v[vg] = vc;
                    f[vg] = fc;
                } else {
                    // Shrink toward the best vertex
                    let best = v[vs].clone();
                    for (row, vertex) in v.iter_mut().enumerate() {
                        if row != vs {
                            for (x, b) in vertex.iter_mut().zip(&best) {
                                *x = b + (*x - b) / 2.0;
                            }
                        }
                    }
                    f[vg] = objective(&mut v[vg]);
                    f[vh] = objective(&mut v[vh]);
                }
            }

            let favg = f.iter().fold(0.0, |acc, x| acc + x) / (nf + 1.0);
            let mut spread = 0.0;
            for x in &f {
                spread += (x - favg).powf(2.0) / nf;
            }
            if spread.sqrt() < self.epsilon {
                break;
            }
        }

        let mut vs = 0;
        for i in 0..=n {
            if f[i] < f[vs] {
                vs = i;
            }
        }
        let best = v[vs].clone();
        (objective(&mut v[vs]), best)
    }
}
