//! Rotation geometry for force-node orientations.
//!
//! Orientations are stored as Wiener-Milenkovic parameters
//! `c = 4 tan(phi / 4) n`. Both rotation helpers take a `transpose` flag:
//! `false` applies the rotation, `true` applies its inverse. Direction
//! cosine matrices are row-major `[f64; 9]`.

/// Cross product `a × b`.
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Dot product.
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm.
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

// Scale factors of the skew term and its square in
// R = I + s1 [c]x + s2 [c]x².
fn wm_coefficients(c: [f64; 3]) -> (f64, f64) {
    let wm0 = 2.0 - 0.125 * dot(c, c);
    let nu = 2.0 / (4.0 - wm0);
    let cos_phi_o2 = 0.5 * wm0 * nu;
    (nu * cos_phi_o2, 0.5 * nu * nu)
}

/// Rotate `r` by the Wiener-Milenkovic parameters `c`.
pub fn apply_wm_rotation(c: [f64; 3], r: [f64; 3], transpose: bool) -> [f64; 3] {
    let (s1, s2) = wm_coefficients(c);
    let sign = if transpose { -1.0 } else { 1.0 };
    let cr = cross(c, r);
    let ccr = cross(c, cr);
    [
        r[0] + sign * s1 * cr[0] + s2 * ccr[0],
        r[1] + sign * s1 * cr[1] + s2 * ccr[1],
        r[2] + sign * s1 * cr[2] + s2 * ccr[2],
    ]
}

/// Rotate `r` by the row-major direction cosine matrix `dcm`.
pub fn apply_dcm_rotation(dcm: &[f64; 9], r: [f64; 3], transpose: bool) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, o) in out.iter_mut().enumerate() {
        *o = (0..3)
            .map(|j| {
                let m = if transpose { dcm[j * 3 + i] } else { dcm[i * 3 + j] };
                m * r[j]
            })
            .sum();
    }
    out
}

/// Direction cosine matrix equivalent to the Wiener-Milenkovic parameters.
pub fn wm_to_dcm(c: [f64; 3]) -> [f64; 9] {
    let (s1, s2) = wm_coefficients(c);
    let skew = [
        [0.0, -c[2], c[1]],
        [c[2], 0.0, -c[0]],
        [-c[1], c[0], 0.0],
    ];
    let mut dcm = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            let sq: f64 = (0..3).map(|k| skew[i][k] * skew[k][j]).sum();
            let identity = if i == j { 1.0 } else { 0.0 };
            dcm[i * 3 + j] = identity + s1 * skew[i][j] + s2 * sq;
        }
    }
    dcm
}

/// Drag on the nacelle for the local flow velocity `u`.
///
/// `F = 0.5 rho cd A |u| u`.
pub fn calc_nacelle_force(u: [f64; 3], cd: f64, area: f64, rho: f64) -> [f64; 3] {
    let coeff = 0.5 * rho * cd * area * norm(u);
    [coeff * u[0], coeff * u[1], coeff * u[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn wm_about_axis(axis: [f64; 3], angle: f64) -> [f64; 3] {
        let s = 4.0 * (angle / 4.0).tan();
        [s * axis[0], s * axis[1], s * axis[2]]
    }

    #[test]
    fn zero_parameters_are_identity() {
        let r = [1.0, -2.0, 3.5];
        assert_eq!(apply_wm_rotation([0.0; 3], r, false), r);
        let dcm = wm_to_dcm([0.0; 3]);
        assert_eq!(dcm, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn quarter_turn_about_z() {
        let c = wm_about_axis([0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        let out = apply_wm_rotation(c, [1.0, 0.0, 0.0], false);
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn nacelle_force_is_quadratic_in_speed() {
        let f = calc_nacelle_force([10.0, 0.0, 0.0], 0.5, 4.0, 1.2);
        assert_relative_eq!(f[0], 0.5 * 1.2 * 0.5 * 4.0 * 100.0);
        assert_eq!(f[1], 0.0);
        assert_eq!(calc_nacelle_force([3.0, 4.0, 0.0], 0.0, 4.0, 1.2), [0.0; 3]);
    }

    #[test]
    fn cross_is_right_handed() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
    }

    fn vec3() -> impl Strategy<Value = [f64; 3]> {
        prop::array::uniform3(-10.0f64..10.0)
    }

    fn wm_params() -> impl Strategy<Value = [f64; 3]> {
        prop::array::uniform3(-2.0f64..2.0)
    }

    proptest! {
        #[test]
        fn wm_and_dcm_agree(c in wm_params(), r in vec3(), transpose in any::<bool>()) {
            let a = apply_wm_rotation(c, r, transpose);
            let b = apply_dcm_rotation(&wm_to_dcm(c), r, transpose);
            for k in 0..3 {
                prop_assert!((a[k] - b[k]).abs() <= 1e-10, "component {k}: {} vs {}", a[k], b[k]);
            }
        }

        #[test]
        fn rotation_preserves_length(c in wm_params(), r in vec3()) {
            let out = apply_wm_rotation(c, r, false);
            prop_assert!((norm(out) - norm(r)).abs() <= 1e-9 * (1.0 + norm(r)));
        }

        #[test]
        fn transpose_undoes_rotation(c in wm_params(), r in vec3()) {
            let back = apply_wm_rotation(c, apply_wm_rotation(c, r, false), true);
            for k in 0..3 {
                prop_assert!((back[k] - r[k]).abs() <= 1e-9 * (1.0 + norm(r)));
            }
        }
    }
}
