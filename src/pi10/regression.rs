//! Ordinary least-squares line fitting.

/// A fitted line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
    /// Number of points the line was fitted over.
    pub points: usize,
    /// Coefficient of determination; 1.0 when all `y` are equal.
    pub r_squared: f64,
}

impl LineFit {
    /// Evaluates the fitted line at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Why a line could not be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFailure {
    /// Fewer than two points.
    TooFewPoints(usize),
    /// Every `x` is the same (within round-off), so the slope is undefined.
    ZeroVarianceX,
    /// An input or intermediate value was NaN or infinite.
    NonFinite,
}

/// Fits `y = a + b·x` over `points` with centred sums.
///
/// Centring keeps the normal equations well conditioned when the `x`
/// values sit far from zero.
pub fn fit_line(points: &[(f64, f64)]) -> Result<LineFit, FitFailure> {
    let n = points.len();
    if n < 2 {
        return Err(FitFailure::TooFewPoints(n));
    }
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(FitFailure::NonFinite);
    }

    let count = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / count;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if !sxx.is_finite() || !sxy.is_finite() || !syy.is_finite() {
        return Err(FitFailure::NonFinite);
    }

    // Identical x values can still leave a few ulps of spread after the
    // mean is subtracted.
    let max_abs_x = points.iter().fold(0.0_f64, |acc, (x, _)| acc.max(x.abs()));
    let spread = 4.0 * f64::EPSILON * count * max_abs_x;
    if sxx <= count * spread * spread {
        return Err(FitFailure::ZeroVarianceX);
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(FitFailure::NonFinite);
    }

    let r_squared = if syy == 0.0 {
        1.0
    } else {
        (sxy * sxy) / (sxx * syy)
    };

    Ok(LineFit {
        intercept,
        slope,
        points: n,
        r_squared,
    })
}
