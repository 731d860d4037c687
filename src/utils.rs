use crate::geometry::Fp;

pub fn safe_sqrt(x: Fp) -> Fp {
    Fp::max(0.0, x).sqrt()
}

/// Fractional part wrapped into `[0, 1)`, also for negative inputs.
pub fn wrap_unit(x: Fp) -> Fp {
    let f = x - x.floor();
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}
