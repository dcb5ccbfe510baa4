//! Source parameterizations and their moment tensors.
//!
//! Orientation follows strike/dip/rake (degrees); source type follows lune
//! coordinates `v`, `w` (Tape & Tape), where `v = w = 0` is a double couple.
//! Moment tensors are reported in up-south-east order
//! `[Mrr, Mtt, Mpp, Mrt, Mrp, Mtp]` in N·m.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, PI, SQRT_2};
use std::fmt;

/// Scalar moment (N·m) from moment magnitude.
pub fn moment_from_magnitude(mw: f64) -> f64 {
    10f64.powf(1.5 * mw + 9.1)
}

/// Moment magnitude from scalar moment (N·m).
pub fn magnitude_from_moment(m0: f64) -> f64 {
    (m0.log10() - 9.1) / 1.5
}

/// Symmetric moment tensor, `[Mrr, Mtt, Mpp, Mrt, Mrp, Mtp]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentTensor(pub [f64; 6]);

impl MomentTensor {
    pub fn components(&self) -> &[f64; 6] {
        &self.0
    }

    /// Scalar moment, `||M||_F / sqrt(2)`.
    pub fn scalar_moment(&self) -> f64 {
        let m = &self.0;
        let diag = m[0] * m[0] + m[1] * m[1] + m[2] * m[2];
        let off = m[3] * m[3] + m[4] * m[4] + m[5] * m[5];
        ((diag + 2.0 * off) / 2.0).sqrt()
    }

    pub fn magnitude(&self) -> f64 {
        magnitude_from_moment(self.scalar_moment())
    }

    pub fn trace(&self) -> f64 {
        self.0[0] + self.0[1] + self.0[2]
    }
}

impl fmt::Display for MomentTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "[{:.3e}, {:.3e}, {:.3e}, {:.3e}, {:.3e}, {:.3e}]",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// One candidate source, identified by its grid index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceParameterVector {
    pub index: usize,
    /// Degrees, [0, 360).
    pub strike: f64,
    /// Degrees, [0, 90].
    pub dip: f64,
    /// Degrees.
    pub rake: f64,
    /// Lune longitude coordinate, [-1/3, 1/3].
    pub v: f64,
    /// Lune latitude coordinate, [-3π/8, 3π/8].
    pub w: f64,
    pub magnitude: f64,
    /// Position of `magnitude` in the grid's magnitude axis; selects the
    /// source wavelet convolved into the Green's functions.
    #[serde(default)]
    pub magnitude_index: usize,
    /// `None` means the catalog depth of the event.
    pub depth_in_m: Option<f64>,
    /// Position of `depth_in_m` in the grid's depth axis; selects the
    /// Green's functions used for this vector.
    pub origin_index: usize,
}

impl SourceParameterVector {
    /// Double couple at a given orientation.
    pub fn double_couple(strike: f64, dip: f64, rake: f64, magnitude: f64) -> Self {
        Self {
            index: 0,
            strike,
            dip,
            rake,
            v: 0.0,
            w: 0.0,
            magnitude,
            magnitude_index: 0,
            depth_in_m: None,
            origin_index: 0,
        }
    }

    pub fn is_double_couple(&self) -> bool {
        self.v == 0.0 && self.w == 0.0
    }

    pub fn moment_tensor(&self) -> MomentTensor {
        let eigenvalues = lune_eigenvalues(self.v, self.w);
        let (t, n, p) = principal_axes(self.strike, self.dip, self.rake);
        let scale = SQRT_2 * moment_from_magnitude(self.magnitude);

        // North-east-down tensor from its spectral decomposition.
        let mut ned = [[0.0f64; 3]; 3];
        for (lambda, axis) in eigenvalues.iter().zip([t, n, p]) {
            for i in 0..3 {
                for j in 0..3 {
                    ned[i][j] += lambda * axis[i] * axis[j];
                }
            }
        }

        let (nn, ee, dd) = (ned[0][0], ned[1][1], ned[2][2]);
        let (ne, nd, ed) = (ned[0][1], ned[0][2], ned[1][2]);
        MomentTensor([
            scale * dd,
            scale * nn,
            scale * ee,
            scale * nd,
            -scale * ed,
            -scale * ne,
        ])
    }
}

/// Unit eigenvalue triple `λ1 >= λ2 >= λ3` for lune coordinates `(v, w)`.
pub fn lune_eigenvalues(v: f64, w: f64) -> [f64; 3] {
    let gamma = (3.0 * v).clamp(-1.0, 1.0).asin() / 3.0;
    let beta = colatitude_from_w(w);

    let iso = 1.0 / 3f64.sqrt();
    let b = 1.0 / 6f64.sqrt();
    let (sb, cb) = beta.sin_cos();
    let (sg, cg) = gamma.sin_cos();

    [
        cb * iso + sb * (cg * FRAC_1_SQRT_2 - sg * b),
        cb * iso + sb * (2.0 * sg * b),
        cb * iso + sb * (-cg * FRAC_1_SQRT_2 - sg * b),
    ]
}

/// `u(β) = 3β/4 - sin(2β)/2 + sin(4β)/16`, the integral of `2 sin⁴` from 0.
///
/// Near the pole `u ≈ 0.4 β⁵` and the closed form cancels catastrophically,
/// so small angles use the power series of `2 sin⁴ t` integrated term by term.
fn lune_colatitude_integral(beta: f64) -> f64 {
    if beta >= 0.5 {
        return 0.75 * beta - 0.5 * (2.0 * beta).sin() + (4.0 * beta).sin() / 16.0;
    }
    // sin⁴ t = Σ_{n≥2} (-1)ⁿ (16ⁿ - 4·4ⁿ) t²ⁿ / (8 (2n)!)
    let b2 = beta * beta;
    let mut sum = 0.0;
    let mut power = beta.powi(5);
    let (mut four_n, mut sixteen_n, mut factorial) = (16.0, 256.0, 24.0);
    for n in 2..24 {
        let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
        let term = sign * (sixteen_n - 4.0 * four_n) / (8.0 * factorial) * power / (2 * n + 1) as f64;
        sum += term;
        if term.abs() <= f64::EPSILON * sum.abs() {
            break;
        }
        power *= b2;
        four_n *= 4.0;
        sixteen_n *= 16.0;
        factorial *= ((2 * n + 1) * (2 * n + 2)) as f64;
    }
    2.0 * sum
}

/// Invert `3π/8 - w = u(β)` for `β` in `[0, π]`.
///
/// `u` is monotone and `u(π - β) = 3π/4 - u(β)`, so the root is bisected on
/// the half nearer its pole, where `u` is evaluated without cancellation.
pub fn colatitude_from_w(w: f64) -> f64 {
    let total = 3.0 * PI / 4.0;
    let target = (3.0 * PI / 8.0 - w).clamp(0.0, total);
    let (reduced, upper) = if target > 0.5 * total {
        (total - target, true)
    } else {
        (target, false)
    };

    let (mut lo, mut hi) = (0.0, FRAC_PI_2);
    for _ in 0..128 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if lune_colatitude_integral(mid) < reduced {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let beta = 0.5 * (lo + hi);
    if upper {
        PI - beta
    } else {
        beta
    }
}

/// Tension, null and pressure axes (north-east-down) of a fault plane.
fn principal_axes(strike: f64, dip: f64, rake: f64) -> ([f64; 3], [f64; 3], [f64; 3]) {
    let (sf, cf) = strike.to_radians().sin_cos();
    let (sd, cd) = dip.to_radians().sin_cos();
    let (sl, cl) = rake.to_radians().sin_cos();

    let normal = [-sd * sf, sd * cf, -cd];
    let slip = [cl * cf + cd * sl * sf, cl * sf - cd * sl * cf, -sl * sd];

    let t = [
        FRAC_1_SQRT_2 * (normal[0] + slip[0]),
        FRAC_1_SQRT_2 * (normal[1] + slip[1]),
        FRAC_1_SQRT_2 * (normal[2] + slip[2]),
    ];
    let p = [
        FRAC_1_SQRT_2 * (normal[0] - slip[0]),
        FRAC_1_SQRT_2 * (normal[1] - slip[1]),
        FRAC_1_SQRT_2 * (normal[2] - slip[2]),
    ];
    let n = [
        normal[1] * slip[2] - normal[2] * slip[1],
        normal[2] * slip[0] - normal[0] * slip[2],
        normal[0] * slip[1] - normal[1] * slip[0],
    ];
    (t, n, p)
}
