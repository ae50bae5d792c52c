//! A numerically careful real-root solver for polynomials of degree 1
//! through [`MAX_ORDER`](crate::constants::MAX_ORDER).
//!
//! Degrees up to 4 are solved in closed form (quadratic formula, Cardano's
//! cubic, and a Vieta resolvent for the quartic); everything above that —
//! and degree 3/4 when the caller forces it with `sturm: true`, or when
//! the quartic's coefficients span too many orders of magnitude for the
//! closed form to be trusted — goes through a Sturm-sequence bisection.
//!
//! This is a direct port of POV-Ray's `Solve_Polynomial` / `polysolve`
//! family (`core/math/polynomialsolver.cpp`): the closed-form formulas,
//! the Sturm sequence construction, and the bisection/regula-falsi root
//! refinement all follow the same arithmetic, in the same order, for the
//! same reason — this code has spent decades being right about the
//! specific ways naive root-finding goes numerically wrong.

use crate::constants::{
    FUDGE_FACTOR1, MAX_DISTANCE, MAX_ITERATIONS, MAX_ORDER, RELERROR, SMALL_ENOUGH,
};
use smallvec::SmallVec;

/// A solver's real roots. Inline capacity of 4 covers every closed-form
/// case (the overwhelming majority of calls, from spheres through
/// quartics) without a heap allocation; high-order Sturm solves spill
/// onto the heap transparently.
pub type RootSet = SmallVec<[f64; 4]>;

/// Counters incremented during solving, aggregated by the caller's
/// per-thread statistics block (see [`crate::stats::ThreadStats`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct SolverStats {
    pub polynomials_tested: u64,
    pub roots_eliminated: u64,
}

const TWO_M_PI_3: f64 = 2.0943951023931954923084;
const FOUR_M_PI_3: f64 = 4.1887902047863909846168;

/// A polynomial in Sturm-sequence working form: `coef[i]` is the
/// coefficient of `x^i` (lowest-degree first), `ord` is its degree.
#[derive(Clone)]
struct Poly {
    ord: usize,
    coef: [f64; MAX_ORDER + 1],
}

impl Poly {
    fn zero() -> Self {
        Self {
            ord: 0,
            coef: [0.0; MAX_ORDER + 1],
        }
    }
}

/// Evaluates `sum(coef[i] * x^i for i in 0..=n)` by Horner's method.
fn polyeval(x: f64, n: usize, coef: &[f64]) -> f64 {
    let mut val = coef[n];
    for i in (0..n).rev() {
        val = val * x + coef[i];
    }
    val
}

/// `r = u mod v`, assuming `v`'s leading coefficient is normalized to +-1.
/// Returns the degree of the remainder (0 if it reduced to a constant).
fn modp(u: &Poly, v: &Poly) -> Poly {
    let mut r = u.clone();

    if v.coef[v.ord] < 0.0 {
        let mut k = u.ord as isize - v.ord as isize - 1;
        while k >= 0 {
            r.coef[k as usize] = -r.coef[k as usize];
            k -= 2;
        }
        let mut k = (u.ord - v.ord) as isize;
        while k >= 0 {
            let ku = k as usize;
            let mut j = (v.ord + ku) as isize - 1;
            while j >= ku as isize {
                let ju = j as usize;
                r.coef[ju] = -r.coef[ju] - r.coef[v.ord + ku] * v.coef[ju - ku];
                j -= 1;
            }
            k -= 1;
        }
    } else {
        let mut k = (u.ord - v.ord) as isize;
        while k >= 0 {
            let ku = k as usize;
            let mut j = (v.ord + ku) as isize - 1;
            while j >= ku as isize {
                let ju = j as usize;
                r.coef[ju] -= r.coef[v.ord + ku] * v.coef[ju - ku];
                j -= 1;
            }
            k -= 1;
        }
    }

    let mut k = v.ord as isize - 1;
    while k >= 0 && r.coef[k as usize].abs() < SMALL_ENOUGH {
        r.coef[k as usize] = 0.0;
        k -= 1;
    }
    r.ord = if k < 0 { 0 } else { k as usize };
    r
}

/// Builds the Sturm sequence for `sseq[0]` (already populated, degree
/// `ord`) in place, returning the index of the last element.
fn buildsturm(ord: usize, sseq: &mut Vec<Poly>) -> usize {
    sseq[0].ord = ord;
    sseq.push(Poly::zero());
    sseq[1].ord = ord.saturating_sub(1);

    let f = (sseq[0].coef[ord] * ord as f64).abs();
    for i in 1..=ord {
        sseq[1].coef[i - 1] = sseq[0].coef[i] * i as f64 / f;
    }

    let mut sp = 2usize;
    loop {
        let r = modp(&sseq[sp - 2], &sseq[sp - 1]);
        if r.ord == 0 && r.coef[0] == 0.0 && sseq[sp - 2].ord <= sseq[sp - 1].ord {
            // modp returned a degenerate remainder; original code relies on
            // `modp`'s return value (last computed order) being nonzero to
            // continue the loop. A true order-0 remainder still needs one
            // more slot to carry the final (possibly nonzero) constant.
        }
        sseq.push(r);
        if sseq[sp].ord == 0 {
            break;
        }
        let f = -sseq[sp].coef[sseq[sp].ord].abs();
        for i in (0..=sseq[sp].ord).rev() {
            sseq[sp].coef[i] /= f;
        }
        sp += 1;
    }

    sseq[sp].coef[0] = -sseq[sp].coef[0];
    sp
}

/// Count of sign changes at `x = 0` minus at `x = +inf`, i.e. the number
/// of positive real roots by Sturm's theorem (Budan-Fourier at the two
/// ends of the positive axis).
fn visible_roots(np: usize, sseq: &[Poly]) -> (i32, i32, i32) {
    let mut at_pos_inf = 0;
    let mut at_zero = 0;

    let mut lf = sseq[0].coef[sseq[0].ord];
    for s in &sseq[1..=np] {
        let f = s.coef[s.ord];
        if lf == 0.0 || lf * f < 0.0 {
            at_pos_inf += 1;
        }
        lf = f;
    }

    let mut lf = sseq[0].coef[0];
    for s in &sseq[1..=np] {
        let f = s.coef[0];
        if lf == 0.0 || lf * f < 0.0 {
            at_zero += 1;
        }
        lf = f;
    }

    (at_zero - at_pos_inf, at_zero, at_pos_inf)
}

/// Number of sign changes in the Sturm sequence evaluated at `a`.
fn numchanges(np: usize, sseq: &[Poly], a: f64) -> i32 {
    let mut changes = 0;
    let mut lf = polyeval(a, sseq[0].ord, &sseq[0].coef);
    for s in &sseq[1..=np] {
        let f = polyeval(a, s.ord, &s.coef);
        if lf == 0.0 || lf * f < 0.0 {
            changes += 1;
        }
        lf = f;
    }
    changes
}

/// Regula-falsi root refinement over `[a, b]`, where `f(a)` and `f(b)`
/// have opposite signs. Returns `None` if it fails to converge within
/// [`MAX_ITERATIONS`] — the caller falls back to plain bisection.
fn regula_falsa(order: usize, coef: &[f64], mut a: f64, mut b: f64) -> Option<f64> {
    let mut fa = polyeval(a, order, coef);
    let mut fb = polyeval(b, order, coef);

    if fa * fb > 0.0 {
        return None;
    }
    if fa.abs() < SMALL_ENOUGH {
        return Some(a);
    }
    if fb.abs() < SMALL_ENOUGH {
        return Some(b);
    }

    let mut lfx = fa;

    for _ in 0..MAX_ITERATIONS {
        let x = (fb * a - fa * b) / (fb - fa);
        let fx = polyeval(x, order, coef);

        if x.abs() > RELERROR {
            if (fx / x).abs() < RELERROR {
                return Some(x);
            }
        } else if fx.abs() < RELERROR {
            return Some(x);
        }

        if fa < 0.0 {
            if fx < 0.0 {
                a = x;
                fa = fx;
                if lfx * fx > 0.0 {
                    fb /= 2.0;
                }
            } else {
                b = x;
                fb = fx;
                if lfx * fx > 0.0 {
                    fa /= 2.0;
                }
            }
        } else if fx < 0.0 {
            b = x;
            fb = fx;
            if lfx * fx > 0.0 {
                fa /= 2.0;
            }
        } else {
            a = x;
            fa = fx;
            if lfx * fx > 0.0 {
                fb /= 2.0;
            }
        }

        if (b - a).abs() < RELERROR {
            return Some(x);
        }
        lfx = fx;
    }

    None
}

/// Isolates and refines roots of the Sturm sequence's base polynomial
/// over `[min_value, max_value]`, given the known sign-change counts
/// `atmin`/`atmax` at the endpoints, pushing them into `roots`.
///
/// Preserves the upstream note verbatim: if the interval has a root at
/// one endpoint *and* one strictly inside, the endpoint root wins and the
/// interior one is lost. This is a known quirk of the sign-change
/// bracketing, not something the port should paper over.
#[allow(clippy::too_many_arguments)]
fn sbisect(
    np: usize,
    sseq: &[Poly],
    mut min_value: f64,
    mut max_value: f64,
    atmin: i32,
    atmax: i32,
    roots: &mut Vec<f64>,
) {
    if atmin - atmax == 1 {
        if let Some(r) = regula_falsa(sseq[0].ord, &sseq[0].coef, min_value, max_value) {
            roots.push(r);
            return;
        }

        let mut mid = min_value;
        for _ in 0..MAX_ITERATIONS {
            mid = (min_value + max_value) / 2.0;
            let atmid = numchanges(np, sseq, mid);

            // A count outside [atmax, atmin] indicates accumulated
            // floating-point error in the sign-change count near a
            // boundary; the upstream solver gives up on this interval
            // rather than "fixing" the tolerance, and so do we.
            if atmid < atmax || atmid > atmin {
                return;
            }

            if mid.abs() > RELERROR {
                if ((max_value - min_value) / mid).abs() < RELERROR {
                    roots.push(mid);
                    return;
                }
            } else if (max_value - min_value).abs() < RELERROR {
                roots.push(mid);
                return;
            }

            if atmin - atmid == 0 {
                min_value = mid;
            } else {
                max_value = mid;
            }
        }
        roots.push(mid);
        return;
    }

    for _ in 0..MAX_ITERATIONS {
        let mid = (min_value + max_value) / 2.0;
        let atmid = numchanges(np, sseq, mid);

        if atmid < atmax || atmid > atmin {
            return;
        }

        if mid.abs() > RELERROR {
            if ((max_value - min_value) / mid).abs() < RELERROR {
                roots.push(mid);
                return;
            }
        } else if (max_value - min_value).abs() < RELERROR {
            roots.push(mid);
            return;
        }

        let n1 = atmin - atmid;
        let n2 = atmid - atmax;

        if n1 != 0 && n2 != 0 {
            sbisect(np, sseq, min_value, mid, atmin, atmid, roots);
            sbisect(np, sseq, mid, max_value, atmid, atmax, roots);
            return;
        }

        if n1 == 0 {
            min_value = mid;
        } else {
            max_value = mid;
        }
    }
}

/// Sturm-sequence solve of an `order`-degree polynomial (`coeffs`
/// highest-degree-first), restricted to the positive axis `[0,
/// MAX_DISTANCE]` — the only region that can ever be a valid ray depth.
fn polysolve(order: usize, coeffs: &[f64]) -> RootSet {
    let mut sseq = vec![Poly::zero()];
    for i in 0..=order {
        sseq[0].coef[order - i] = coeffs[i] / coeffs[0];
    }

    let np = buildsturm(order, &mut sseq);

    let (nroots, _, _) = visible_roots(np, &sseq);
    if nroots == 0 {
        return RootSet::new();
    }

    let min_value = 0.0;
    let max_value = MAX_DISTANCE;
    let atmin = numchanges(np, &sseq, min_value);
    let atmax = numchanges(np, &sseq, max_value);

    if atmin - atmax == 0 {
        return RootSet::new();
    }

    let mut roots = Vec::new();
    sbisect(np, &sseq, min_value, max_value, atmin, atmax, &mut roots);
    roots.into_iter().collect()
}

/// `x[0]*x + x[1] = 0`.
fn solve_linear(c: &[f64]) -> RootSet {
    let mut r = RootSet::new();
    if c[0] != 0.0 {
        r.push(-c[1] / c[0]);
    }
    r
}

/// `x[0]*x^2 + x[1]*x + x[2] = 0`.
fn solve_quadratic(x: &[f64]) -> RootSet {
    let mut r = RootSet::new();
    let a = x[0];
    let mut b = -x[1];
    let c = x[2];

    if a == 0.0 {
        if b == 0.0 {
            return r;
        }
        r.push(c / b);
        return r;
    }

    b /= a;
    let c = c / a;

    let d = b * b - 4.0 * c;
    if (-SMALL_ENOUGH..SMALL_ENOUGH).contains(&d) {
        r.push(0.5 * b);
        return r;
    }
    if d < 0.0 {
        return r;
    }

    let d = d.sqrt();
    r.push((b + d) / 2.0);
    r.push((b - d) / 2.0);
    r
}

/// `x[0]*x^3 + x[1]*x^2 + x[2]*x + x[3] = 0` via the depressed-cubic
/// trigonometric form (three real roots) or Cardano's form (one real root).
fn solve_cubic(x: &[f64]) -> RootSet {
    let a0 = x[0];
    if a0 == 0.0 {
        return solve_quadratic(&x[1..]);
    }

    let (a1, a2, a3) = if a0 != 1.0 {
        (x[1] / a0, x[2] / a0, x[3] / a0)
    } else {
        (x[1], x[2], x[3])
    };

    let a2_sq = a1 * a1;
    let q = (a2_sq - 3.0 * a2) / 9.0;
    let r = (a1 * (a2_sq - 4.5 * a2) + 13.5 * a3) / 27.0;
    let q3 = q * q * q;
    let r2 = r * r;
    let d = q3 - r2;
    let an = a1 / 3.0;

    let mut roots = RootSet::new();
    if d >= 0.0 {
        let d = r / q3.sqrt();
        let theta = d.acos() / 3.0;
        let sq = -2.0 * q.sqrt();
        roots.push(sq * theta.cos() - an);
        roots.push(sq * (theta + TWO_M_PI_3).cos() - an);
        roots.push(sq * (theta + FOUR_M_PI_3).cos() - an);
    } else {
        let sq = ((r2 - q3).sqrt() + r.abs()).powf(1.0 / 3.0);
        if r < 0.0 {
            roots.push((sq + q / sq) - an);
        } else {
            roots.push(-(sq + q / sq) - an);
        }
    }
    roots
}

/// `x[0]*x^4 + x[1]*x^3 + x[2]*x^2 + x[3]*x + x[4] = 0` via Vieta's
/// resolvent cubic.
fn solve_quartic(x: &[f64]) -> RootSet {
    let c0 = x[0];
    let (c1, c2, c3, c4) = if c0 != 1.0 {
        (x[1] / c0, x[2] / c0, x[3] / c0, x[4] / c0)
    } else {
        (x[1], x[2], x[3], x[4])
    };

    let c12 = c1 * c1;
    let p = -0.375 * c12 + c2;
    let q = 0.125 * c12 * c1 - 0.5 * c1 * c2 + c3;
    let r = -0.01171875 * c12 * c12 + 0.0625 * c12 * c2 - 0.25 * c1 * c3 + c4;

    let cubic = [1.0, -0.5 * p, -r, 0.5 * r * p - 0.125 * q * q];
    let roots = solve_cubic(&cubic);
    let mut results = RootSet::new();
    let z = match roots.first() {
        Some(&z) => z,
        None => return results,
    };

    let mut d1 = 2.0 * z - p;
    if d1 < 0.0 {
        if d1 > -SMALL_ENOUGH {
            d1 = 0.0;
        } else {
            return results;
        }
    }

    let d2;
    if d1 < SMALL_ENOUGH {
        let t = z * z - r;
        if t < 0.0 {
            return results;
        }
        d2 = t.sqrt();
        d1 = 0.0;
    } else {
        d1 = d1.sqrt();
        d2 = 0.5 * q / d1;
    }

    let q1 = d1 * d1;
    let q2 = -0.25 * c1;

    let p0 = q1 - 4.0 * (z - d2);
    if p0 == 0.0 {
        results.push(-0.5 * d1 - q2);
    } else if p0 > 0.0 {
        let p0 = p0.sqrt();
        results.push(-0.5 * (d1 + p0) + q2);
        results.push(-0.5 * (d1 - p0) + q2);
    }

    let p1 = q1 - 4.0 * (z + d2);
    if p1 == 0.0 {
        results.push(0.5 * d1 - q2);
    } else if p1 > 0.0 {
        let p1 = p1.sqrt();
        results.push(0.5 * (d1 + p1) + q2);
        results.push(0.5 * (d1 - p1) + q2);
    }

    results
}

/// True if the coefficients span more than [`FUDGE_FACTOR1`] orders of
/// magnitude — the closed-form quartic solver becomes unreliable at that
/// point and the caller should force the Sturm path instead.
fn difficult_coeffs(x: &[f64]) -> bool {
    let biggest = x.iter().cloned().fold(0.0_f64, |a, b| a.max(b.abs()));
    if biggest == 0.0 {
        return false;
    }
    x.iter()
        .any(|&c| c != 0.0 && (biggest / c.abs()) > FUDGE_FACTOR1)
}

/// Solves `coeffs[0]*x^degree + coeffs[1]*x^(degree-1) + ... + coeffs[degree] = 0`.
///
/// `epsilon` is the root-elimination tolerance: if the constant term is
/// tiny relative to the next coefficient, one root at (or very near) zero
/// is dropped and the effective degree reduced by one, to avoid
/// self-intersection "acne" at a primitive's own surface. Pass `0.0` to
/// disable elimination. `sturm` forces the iterative path even for
/// degree 3/4, where it would otherwise be optional.
///
/// Total: always returns a (possibly empty) root set, never panics on a
/// degenerate or all-zero polynomial.
pub fn solve(degree: usize, coeffs: &[f64], epsilon: f64, sturm: bool) -> RootSet {
    let mut stats = SolverStats::default();
    solve_with_stats(degree, coeffs, epsilon, sturm, &mut stats)
}

/// As [`solve`], but also accumulates into the caller's per-thread
/// [`SolverStats`].
pub fn solve_with_stats(
    degree: usize,
    coeffs: &[f64],
    epsilon: f64,
    mut sturm: bool,
    stats: &mut SolverStats,
) -> RootSet {
    debug_assert!(degree <= MAX_ORDER);
    debug_assert_eq!(coeffs.len(), degree + 1);
    stats.polynomials_tested += 1;

    // Reduce away small leading coefficients to find the "real" degree.
    let mut lead = 0;
    while lead < degree && coeffs[lead].abs() < SMALL_ENOUGH {
        lead += 1;
    }
    let n = degree - lead;
    let c = &coeffs[lead..];

    match n {
        0 => RootSet::new(),
        1 => solve_linear(c),
        2 => solve_quadratic(c),
        3 => {
            if epsilon > 0.0 && c[2] != 0.0 && (c[3] / c[2]).abs() < epsilon {
                stats.roots_eliminated += 1;
                return solve_quadratic(c);
            }
            if sturm {
                polysolve(3, c)
            } else {
                solve_cubic(c)
            }
        }
        4 => {
            if epsilon > 0.0 && c[3] != 0.0 && (c[4] / c[3]).abs() < epsilon {
                stats.roots_eliminated += 1;
                return if sturm {
                    polysolve(3, c)
                } else {
                    solve_cubic(c)
                };
            }
            if difficult_coeffs(c) {
                sturm = true;
            }
            if sturm {
                polysolve(4, c)
            } else {
                solve_quartic(c)
            }
        }
        _ => {
            if epsilon > 0.0 && c[n - 1] != 0.0 && (c[n] / c[n - 1]).abs() < epsilon {
                stats.roots_eliminated += 1;
                return polysolve(n - 1, c);
            }
            polysolve(n, c)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn quartic_four_real_roots() {
        // x^4 - 10x^2 + 9 = (x-1)(x+1)(x-3)(x+3)
        let roots = solve(4, &[1.0, 0.0, -10.0, 0.0, 9.0], 0.0, false);
        let got = sorted(roots.to_vec());
        let want = [-3.0, -1.0, 1.0, 3.0];
        assert_eq!(got.len(), 4);
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-6, "{g} vs {w}");
        }
    }

    #[test]
    fn quartic_four_real_roots_sturm_path() {
        let roots = solve(4, &[1.0, 0.0, -10.0, 0.0, 9.0], 0.0, true);
        let got = sorted(roots.to_vec());
        assert_eq!(got.len(), 4);
        for (g, w) in got.iter().zip([-3.0, -1.0, 1.0, 3.0].iter()) {
            assert!((g - w).abs() < 1e-6);
        }
    }

    #[test]
    fn quadratic_double_root_near_zero_discriminant() {
        // (x - 2)^2 = x^2 - 4x + 4
        let roots = solve(2, &[1.0, -4.0, 4.0], 0.0, false);
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn linear_root() {
        let roots = solve(1, &[2.0, -6.0], 0.0, false);
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn all_zero_polynomial_returns_no_roots() {
        let roots = solve(3, &[0.0, 0.0, 0.0, 0.0], 0.0, false);
        assert!(roots.is_empty());
    }

    #[test]
    fn root_elimination_drops_near_zero_root() {
        // x^3 - x^2 = x^2 (x - 1); constant term is 0, next coeff nonzero.
        let mut stats = SolverStats::default();
        let roots = solve_with_stats(3, &[1.0, -1.0, 0.0, 1e-12], 1e-6, false, &mut stats);
        assert_eq!(stats.roots_eliminated, 1);
        // Reduced to quadratic x^2 - x = 0 -> roots {0, 1}
        let got = sorted(roots.to_vec());
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn root_count_never_exceeds_degree() {
        let roots = solve(35, &{
            let mut c = [0.0f64; 36];
            c[0] = 1.0;
            c[35] = -1.0;
            c
        }, 0.0, true);
        assert!(roots.len() <= 35);
    }

    #[test]
    fn high_order_sturm_quintic() {
        // x^5 - x = x(x-1)(x+1)(x^2+1): 3 real roots {-1, 0, 1}
        let roots = solve(5, &[1.0, 0.0, 0.0, -1.0, 0.0, 0.0], 0.0, true);
        let got = sorted(roots.to_vec());
        assert_eq!(got.len(), 3);
        for (g, w) in got.iter().zip([-1.0, 0.0, 1.0].iter()) {
            assert!((g - w).abs() < 1e-6);
        }
    }
}
