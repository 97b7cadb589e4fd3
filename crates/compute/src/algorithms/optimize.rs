/// Outcome of a Nelder-Mead minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `f` with the Nelder-Mead simplex method.
///
/// The initial simplex is `start` plus one vertex per dimension offset by
/// `step`. Stops when the spread of simplex values drops below `tolerance`
/// or after `max_iterations`. Non-finite objective values are treated as
/// +infinity so the simplex walks away from them.
pub fn nelder_mead<F>(f: F, start: &[f64], step: f64, tolerance: f64, max_iterations: usize) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    if dim == 0 {
        return Minimum {
            point: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), eval(start)));
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if (worst - best).abs() <= tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }

        // Centroid of every vertex but the worst.
        let mut centroid = vec![0.0; dim];
        for (vertex, _) in &simplex[..dim] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / dim as f64;
            }
        }
        let toward = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[dim].0)
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = toward(-alpha);
        let reflected_value = eval(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = toward(-gamma);
            let expanded_value = eval(&expanded);
            simplex[dim] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
        } else if reflected_value < simplex[dim - 1].1 {
            simplex[dim] = (reflected, reflected_value);
        } else {
            let contracted = toward(rho);
            let contracted_value = eval(&contracted);
            if contracted_value < simplex[dim].1 {
                simplex[dim] = (contracted, contracted_value);
            } else {
                // Shrink toward the best vertex.
                let best_point = simplex[0].0.clone();
                for (vertex, value) in simplex.iter_mut().skip(1) {
                    for (v, b) in vertex.iter_mut().zip(&best_point) {
                        *v = b + sigma * (*v - b);
                    }
                    *value = eval(vertex);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (point, value) = simplex.swap_remove(0);
    Minimum { point, value, iterations, converged }
}
