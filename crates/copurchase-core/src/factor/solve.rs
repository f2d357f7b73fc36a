//! Dense ridge-regression solve for one ALS row.

/// Fit one row vector to the fixed factors of its members.
///
/// Solves `(F^T F + reg·I) w = F^T 1` where `F` stacks the member factor
/// vectors, via Gaussian elimination with partial pivoting in f64. Returns
/// `Err(())` when the system collapses (pivot underflow), which the caller
/// reports as non-convergence.
pub(super) fn solve_ridge_row(
    members: &[usize],
    fixed: &[Vec<f32>],
    k: usize,
    reg: f64,
) -> Result<Vec<f32>, ()> {
    // Normal equations: gram is symmetric positive definite thanks to reg.
    let mut gram = vec![0.0f64; k * k];
    let mut rhs = vec![0.0f64; k];
    for d in 0..k {
        gram[d * k + d] = reg;
    }
    for &m in members {
        let v = &fixed[m];
        for i in 0..k {
            let vi = f64::from(v[i]);
            rhs[i] += vi;
            let row = i * k;
            for j in 0..k {
                gram[row + j] += vi * f64::from(v[j]);
            }
        }
    }
    solve_dense(&mut gram, &mut rhs, k)?;
    Ok(rhs.into_iter().map(|x| x as f32).collect())
}

/// In-place Gaussian elimination with partial pivoting; the solution
/// replaces `rhs`.
fn solve_dense(a: &mut [f64], rhs: &mut [f64], k: usize) -> Result<(), ()> {
    const PIVOT_EPS: f64 = 1e-12;

    for col in 0..k {
        // Partial pivot: largest magnitude in this column, at or below the
        // diagonal.
        let mut pivot_row = col;
        let mut pivot_val = a[col * k + col].abs();
        for row in (col + 1)..k {
            let candidate = a[row * k + col].abs();
            if candidate > pivot_val {
                pivot_val = candidate;
                pivot_row = row;
            }
        }
        if pivot_val < PIVOT_EPS || !pivot_val.is_finite() {
            return Err(());
        }
        if pivot_row != col {
            for j in 0..k {
                a.swap(col * k + j, pivot_row * k + j);
            }
            rhs.swap(col, pivot_row);
        }

        let pivot = a[col * k + col];
        for row in (col + 1)..k {
            let factor = a[row * k + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..k {
                a[row * k + j] -= factor * a[col * k + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    for col in (0..k).rev() {
        let mut acc = rhs[col];
        for j in (col + 1)..k {
            acc -= a[col * k + j] * rhs[j];
        }
        rhs[col] = acc / a[col * k + col];
    }
    Ok(())
}
