//! Derivative-free minimisation (Nelder-Mead simplex).

/// Settings for [`nelder_mead`].
#[derive(Debug, Clone, Copy)]
pub struct SimplexConfig {
    pub max_iterations: usize,
    /// Stop when the spread of objective values across the simplex drops
    /// below this.
    pub tolerance: f64,
    /// Initial simplex edge, relative to each start coordinate.
    pub initial_step: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimise `f` starting at `start`.
///
/// Non-finite objective values are treated as `+inf`, which lets callers
/// encode hard constraints by returning `f64::INFINITY`.
pub fn nelder_mead<F>(f: F, start: &[f64], config: SimplexConfig) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };
    let n = start.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), eval(start)));
    for i in 0..n {
        let mut x = start.to_vec();
        let step = if x[i].abs() > 1e-8 {
            x[i] * config.initial_step
        } else {
            config.initial_step * 0.05
        };
        x[i] += step;
        let v = eval(&x);
        simplex.push((x, v));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[n].1;
        if best.is_finite() && worst.is_finite() && (worst - best).abs() <= config.tolerance {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let toward = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = toward(-1.0);
        let fr = eval(&reflected);
        if fr < simplex[0].1 {
            let expanded = toward(-2.0);
            let fe = eval(&expanded);
            simplex[n] = if fe < fr { (expanded, fe) } else { (reflected, fr) };
            continue;
        }
        if fr < simplex[n - 1].1 {
            simplex[n] = (reflected, fr);
            continue;
        }
        let contracted = if fr < simplex[n].1 {
            toward(-0.5)
        } else {
            toward(0.5)
        };
        let fc = eval(&contracted);
        if fc < simplex[n].1.min(fr) {
            simplex[n] = (contracted, fc);
            continue;
        }
        let best_x = simplex[0].0.clone();
        for (x, v) in simplex.iter_mut().skip(1) {
            for (xi, bi) in x.iter_mut().zip(&best_x) {
                *xi = bi + 0.5 * (*xi - bi);
            }
            *v = eval(x);
        }
    }
    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Minimum {
        x,
        value,
        iterations,
        converged,
    }
}
