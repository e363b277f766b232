// src/brownian_bridge.rs
//! Brownian Bridge Path Construction
//!
//! # Mathematical Framework
//!
//! A Brownian path on dates `t_1 < ... < t_n` is built by fixing the
//! terminal value first and then filling each remaining date `l` from its
//! already-known neighbours `j < l < k`:
//! ```text
//! W(t_l) = lw · W(t_j) + rw · W(t_k) + sd · Z
//! lw = (t_k - t_l) / (t_k - t_j)
//! rw = (t_l - t_j) / (t_k - t_j)
//! sd = √((t_l - t_j)(t_k - t_l) / (t_k - t_j))
//! ```
//! With `t_0 = 0` and `W(0) = 0` the left term vanishes for the first date.
//!
//! The first normal draws then carry the coarse shape of the path, which
//! is where a low-discrepancy sequence has its best-distributed coordinates.
//!
//! # Table Layout
//!
//! One entry per construction step `i`: the date it fills (`bi`), its left
//! neighbour (`li`, 0 for the time origin) and right neighbour (`ri`), all
//! 1-based, plus the weights `sd`, `lw`, `rw`.

use crate::error::{validation::*, SdeError, SdeResult};

/// Precomputed bridge construction table, read-only during the run
#[derive(Debug, Clone)]
pub struct BridgeArrays {
    num_dates: usize,
    /// Date filled at each step (0-based)
    bi: Vec<usize>,
    /// Left neighbour (0-based), `None` at the time origin
    li: Vec<Option<usize>>,
    /// Right neighbour (0-based); unused at step 0
    ri: Vec<usize>,
    sd: Vec<f64>,
    lw: Vec<f64>,
    rw: Vec<f64>,
}

impl BridgeArrays {
    /// Build from the dataset layout: `inds` is `[3][num_dates]` (bi, li, ri),
    /// `data` is `[3][num_dates]` (sd, lw, rw).
    ///
    /// Every step must fill a new date and may only reference dates filled
    /// by earlier steps.
    pub fn new(num_dates: usize, inds: &[i32], data: &[f64]) -> SdeResult<Self> {
        validate_count("num_dates", num_dates)?;
        validate_len("bb_inds", inds.len(), 3 * num_dates)?;
        validate_len("bb_data", data.len(), 3 * num_dates)?;
        validate_all_finite("bb_data", data)?;

        let (bi_raw, rest) = inds.split_at(num_dates);
        let (li_raw, ri_raw) = rest.split_at(num_dates);

        let date = |field: &str, step: usize, v: i32| -> SdeResult<usize> {
            if v < 1 || v as usize > num_dates {
                return Err(SdeError::InvalidConfiguration {
                    field: field.to_string(),
                    reason: format!("step {}: index {} outside [1, {}]", step, v, num_dates),
                });
            }
            Ok(v as usize - 1)
        };

        let mut filled = vec![false; num_dates];
        let mut bi = Vec::with_capacity(num_dates);
        let mut li = Vec::with_capacity(num_dates);
        let mut ri = Vec::with_capacity(num_dates);

        for step in 0..num_dates {
            let l = date("bb_bi", step, bi_raw[step])?;
            if filled[l] {
                return Err(SdeError::InvalidConfiguration {
                    field: "bb_bi".to_string(),
                    reason: format!("step {} fills date {} twice", step, l + 1),
                });
            }

            if step == 0 {
                li.push(None);
                ri.push(0);
            } else {
                let left = match li_raw[step] {
                    0 => None,
                    v => Some(date("bb_li", step, v)?),
                };
                let right = date("bb_ri", step, ri_raw[step])?;
                let unfilled = left
                    .into_iter()
                    .chain(std::iter::once(right))
                    .find(|&n| !filled[n]);
                if let Some(n) = unfilled {
                    return Err(SdeError::InvalidConfiguration {
                        field: "bb_inds".to_string(),
                        reason: format!(
                            "step {} references date {} before it is filled",
                            step,
                            n + 1
                        ),
                    });
                }
                li.push(left);
                ri.push(right);
            }

            filled[l] = true;
            bi.push(l);
        }

        Ok(BridgeArrays {
            num_dates,
            bi,
            li,
            ri,
            sd: data[..num_dates].to_vec(),
            lw: data[num_dates..2 * num_dates].to_vec(),
            rw: data[2 * num_dates..].to_vec(),
        })
    }

    /// Bisection bridge for the given (strictly increasing, positive) date times
    pub fn standard(times: &[f64]) -> SdeResult<Self> {
        let n = times.len();
        validate_count("num_dates", n)?;
        validate_all_finite("times", times)?;
        validate_positive("times[0]", times[0])?;
        if let Some(i) = (1..n).find(|&i| times[i] <= times[i - 1]) {
            return Err(SdeError::InvalidParameters {
                parameter: format!("times[{}]", i),
                value: times[i],
                constraint: "dates must be strictly increasing".to_string(),
            });
        }

        let mut inds = vec![0i32; 3 * n];
        let mut data = vec![0.0; 3 * n];
        // step that filled each date, 0 meaning not yet filled
        let mut map = vec![0usize; n];

        map[n - 1] = 1;
        inds[0] = n as i32;
        data[0] = times[n - 1].sqrt();

        let mut j = 0;
        for i in 1..n {
            while map[j] != 0 {
                j += 1;
            }
            let mut k = j;
            while map[k] == 0 {
                k += 1;
            }
            let l = j + ((k - 1 - j) >> 1);
            map[l] = i + 1;

            inds[i] = l as i32 + 1;
            inds[n + i] = j as i32;
            inds[2 * n + i] = k as i32 + 1;

            let t_left = if j == 0 { 0.0 } else { times[j - 1] };
            let span = times[k] - t_left;
            data[i] = ((times[l] - t_left) * (times[k] - times[l]) / span).sqrt();
            data[n + i] = (times[k] - times[l]) / span;
            data[2 * n + i] = (times[l] - t_left) / span;

            j = k + 1;
            if j >= n {
                j = 0;
            }
        }

        Self::new(n, &inds, &data)
    }

    pub fn num_dates(&self) -> usize {
        self.num_dates
    }

    /// Bridge the `[date][asset]` normals in `gauss` into per-date
    /// increments in `out`, asset by asset.
    pub fn apply(&self, num_under: usize, gauss: &[f64], out: &mut [f64]) {
        let n = self.num_dates;
        debug_assert!(gauss.len() >= n * num_under && out.len() >= n * num_under);

        for m in 0..num_under {
            out[self.bi[0] * num_under + m] = self.sd[0] * gauss[m];

            for i in 1..n {
                let z = gauss[i * num_under + m];
                let mut w = self.rw[i] * out[self.ri[i] * num_under + m] + self.sd[i] * z;
                if let Some(j) = self.li[i] {
                    w += self.lw[i] * out[j * num_under + m];
                }
                out[self.bi[i] * num_under + m] = w;
            }

            for i in (1..n).rev() {
                out[i * num_under + m] -= out[(i - 1) * num_under + m];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_date_scales_by_sd() {
        let bb = BridgeArrays::standard(&[4.0]).unwrap();
        let mut out = [0.0; 2];
        bb.apply(2, &[1.5, -0.5], &mut out);
        assert_relative_eq!(out[0], 3.0);
        assert_relative_eq!(out[1], -1.0);
    }

    #[test]
    fn test_standard_table_for_four_dates() {
        let bb = BridgeArrays::standard(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(bb.bi, vec![3, 1, 0, 2]);
        assert_eq!(bb.li, vec![None, None, None, Some(1)]);
        assert_eq!(&bb.ri[1..], &[3, 1, 3]);

        assert_relative_eq!(bb.sd[0], 2.0);
        // date 2 between origin and date 4
        assert_relative_eq!(bb.rw[1], 0.5);
        assert_relative_eq!(bb.sd[1], 1.0);
        // date 3 between dates 2 and 4
        assert_relative_eq!(bb.lw[3], 0.5);
        assert_relative_eq!(bb.rw[3], 0.5);
        assert_relative_eq!(bb.sd[3], 0.5f64.sqrt());
    }

    #[test]
    fn test_increments_sum_to_terminal_value() {
        let times = [0.25, 0.5, 0.75, 1.0, 1.25];
        let bb = BridgeArrays::standard(&times).unwrap();
        let gauss = [0.3, -1.2, 0.8, 0.1, -0.4];
        let mut out = [0.0; 5];
        bb.apply(1, &gauss, &mut out);

        // W(T) = sqrt(T) * first draw
        let total: f64 = out.iter().sum();
        assert_relative_eq!(total, 1.25f64.sqrt() * 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_assets_are_bridged_independently() {
        let bb = BridgeArrays::standard(&[1.0, 2.0, 3.0]).unwrap();
        let gauss = [0.5, 0.0, -1.0, 0.0, 2.0, 0.0];
        let mut out = [9.0; 6];
        bb.apply(2, &gauss, &mut out);
        for d in 0..3 {
            assert_eq!(out[d * 2 + 1], 0.0);
        }
        assert!(out.iter().step_by(2).any(|&v| v != 0.0));
    }

    #[test]
    fn test_rejects_reference_to_unfilled_date() {
        // step 1 points right at date 3, which nobody has filled
        let inds = [2, 1, 3, 0, 0, 0, 0, 3, 2];
        let data = [1.0; 9];
        assert!(BridgeArrays::new(3, &inds, &data).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_and_repeated_dates() {
        assert!(BridgeArrays::new(2, &[3, 1, 0, 0, 0, 2], &[1.0; 6]).is_err());
        assert!(BridgeArrays::new(2, &[2, 1, 0, 0, 0, 2], &[1.0; 4]).is_err());
        assert!(BridgeArrays::new(2, &[2, 2, 0, 0, 0, 2], &[1.0; 6]).is_err());
        assert!(BridgeArrays::new(2, &[2, 1, 0, 0, 0, 2], &[1.0; 6]).is_ok());
    }

    #[test]
    fn test_standard_rejects_unordered_times() {
        assert!(BridgeArrays::standard(&[1.0, 1.0]).is_err());
        assert!(BridgeArrays::standard(&[0.0, 1.0]).is_err());
        assert!(BridgeArrays::standard(&[]).is_err());
    }
}
