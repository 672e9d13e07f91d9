//! A/B testing for conversion experiments.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestResult {
    pub chi2_statistic: f64,
    pub p_value: f64,
    pub control_rate: f64,
    pub treatment_rate: f64,
    pub lift: f64,
    pub is_significant: bool,
}

/// Chi-square test of independence on the 2x2 table
/// `[[conversions, misses]; control, treatment]`, with Yates' continuity
/// correction.
pub fn chi_square_test(
    control_conversions: u64,
    control_trials: u64,
    treatment_conversions: u64,
    treatment_trials: u64,
) -> Result<AbTestResult> {
    if control_conversions > control_trials || treatment_conversions > treatment_trials {
        return Err(SearchError::invalid_input("conversions exceed trials"));
    }
    let observed = [
        [control_conversions as f64, (control_trials - control_conversions) as f64],
        [treatment_conversions as f64, (treatment_trials - treatment_conversions) as f64],
    ];
    let row = [observed[0][0] + observed[0][1], observed[1][0] + observed[1][1]];
    let col = [observed[0][0] + observed[1][0], observed[0][1] + observed[1][1]];
    let total = row[0] + row[1];

    let mut chi2 = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let expected = if total > 0.0 { row[i] * col[j] / total } else { 0.0 };
            if expected == 0.0 {
                return Err(SearchError::invalid_input(
                    "contingency table has a zero expected frequency",
                ));
            }
            let diff = (observed[i][j] - expected).abs();
            let corrected = (diff - diff.min(0.5)).powi(2);
            chi2 += corrected / expected;
        }
    }
    let p_value = chi2_survival_1dof(chi2);

    let control_rate = control_conversions as f64 / control_trials as f64;
    let treatment_rate = treatment_conversions as f64 / treatment_trials as f64;
    let lift = if control_rate > 0.0 { (treatment_rate - control_rate) / control_rate } else { 0.0 };

    Ok(AbTestResult {
        chi2_statistic: chi2,
        p_value,
        control_rate,
        treatment_rate,
        lift,
        is_significant: p_value < SIGNIFICANCE_LEVEL,
    })
}

/// Per-group sample size for a two-proportion test.
pub fn sample_size(baseline_rate: f64, minimum_detectable_effect: f64, power: f64, alpha: f64) -> Result<u64> {
    let p1 = baseline_rate;
    let p2 = baseline_rate + minimum_detectable_effect;
    let in_unit = |p: f64| p > 0.0 && p < 1.0;
    if !in_unit(p1) || !in_unit(p2) || !in_unit(power) || !in_unit(alpha) {
        return Err(SearchError::invalid_input("rates, power and alpha must lie in (0, 1)"));
    }
    if minimum_detectable_effect == 0.0 {
        return Err(SearchError::invalid_input("minimum detectable effect must be non-zero"));
    }
    let z_alpha = normal_quantile(1.0 - alpha / 2.0);
    let z_beta = normal_quantile(power);
    let n = (z_alpha + z_beta).powi(2) * (p1 * (1.0 - p1) + p2 * (1.0 - p2)) / (p1 - p2).powi(2);
    Ok(n.ceil() as u64)
}

fn chi2_survival_1dof(chi2: f64) -> f64 {
    erfc((chi2 / 2.0).sqrt())
}

// Chebyshev fit, fractional error below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

// Acklam's rational approximation, relative error below 1.2e-9.
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
