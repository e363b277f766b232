// src/models/model.rs
//! Packed market-model parameters.
//!
//! All models share one contiguous arena. Sections follow each other in a
//! fixed order, each holding every model's block back to back:
//! ```text
//! | c [M][U][U] | vols [M][D][U] | drifts [M][D][U] | starts [M][U] | discts [M][CF] | detvals [M][DP] |
//! ```
//! Offsets are computed once in [`ModelArrays::pack`]; afterwards models are
//! only reached through [`ModelView`] slices.

use crate::error::{validation::*, SdeError, SdeResult};
use crate::math_utils::padded_len;
use std::ops::Range;

/// Dimensions shared by every model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub num_models: usize,
    pub num_dates: usize,
    pub num_under: usize,
}

/// Borrowed parameters of a single model
#[derive(Debug, Clone, Copy)]
pub struct ModelView<'a> {
    /// Lower-triangular factor `[U][U]`
    pub c: &'a [f64],
    /// `[D][U]`
    pub vols: &'a [f64],
    /// `[D][U]`
    pub drifts: &'a [f64],
    /// `[U]`
    pub starts: &'a [f64],
    /// `[CF]`
    pub discounts: &'a [f64],
    /// `[DP]`
    pub det_values: &'a [f64],
}

#[derive(Debug, Clone)]
struct Section {
    offset: usize,
    stride: usize,
}

impl Section {
    fn block(&self, m: usize) -> Range<usize> {
        let start = self.offset + m * self.stride;
        start..start + self.stride
    }
}

#[derive(Debug, Clone)]
pub struct ModelArrays {
    shape: ModelShape,
    num_cash_flows: usize,
    num_det_pricers: usize,
    arena: Vec<f64>,
    c: Section,
    vols: Section,
    drifts: Section,
    starts: Section,
    discounts: Section,
    det_values: Section,
}

impl ModelArrays {
    /// Pack the per-model arrays into one arena.
    ///
    /// `discounts` and `det_values` hold `num_models` equally sized rows; their
    /// row lengths become the cash-flow and deterministic-pricer counts.
    pub fn pack(
        shape: ModelShape,
        c: &[f64],
        vols: &[f64],
        drifts: &[f64],
        starts: &[f64],
        discounts: &[f64],
        det_values: &[f64],
    ) -> SdeResult<Self> {
        let ModelShape {
            num_models,
            num_dates,
            num_under,
        } = shape;
        validate_count("num_models", num_models)?;
        validate_count("num_dates", num_dates)?;
        validate_count("num_under", num_under)?;

        validate_len("md_c", c.len(), num_models * num_under * num_under)?;
        validate_len("md_vols", vols.len(), num_models * num_dates * num_under)?;
        validate_len("md_drifts", drifts.len(), num_models * num_dates * num_under)?;
        validate_len("md_starts", starts.len(), num_models * num_under)?;
        let num_cash_flows = row_len("md_discts", discounts.len(), num_models)?;
        let num_det_pricers = row_len("md_detvals", det_values.len(), num_models)?;
        validate_count("num_cash_flows", num_cash_flows)?;

        for (name, values) in [
            ("md_c", c),
            ("md_vols", vols),
            ("md_drifts", drifts),
            ("md_starts", starts),
            ("md_discts", discounts),
            ("md_detvals", det_values),
        ] {
            validate_all_finite(name, values)?;
        }

        let total = c.len()
            + vols.len()
            + drifts.len()
            + starts.len()
            + discounts.len()
            + det_values.len();
        let mut arena = Vec::with_capacity(padded_len(total));

        let mut push = |values: &[f64], stride: usize| {
            let section = Section {
                offset: arena.len(),
                stride,
            };
            arena.extend_from_slice(values);
            section
        };

        let c = push(c, num_under * num_under);
        let vols = push(vols, num_dates * num_under);
        let drifts = push(drifts, num_dates * num_under);
        let starts = push(starts, num_under);
        let discounts = push(discounts, num_cash_flows);
        let det_values = push(det_values, num_det_pricers);

        Ok(ModelArrays {
            shape,
            num_cash_flows,
            num_det_pricers,
            arena,
            c,
            vols,
            drifts,
            starts,
            discounts,
            det_values,
        })
    }

    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    pub fn num_models(&self) -> usize {
        self.shape.num_models
    }

    pub fn num_dates(&self) -> usize {
        self.shape.num_dates
    }

    pub fn num_under(&self) -> usize {
        self.shape.num_under
    }

    pub fn num_cash_flows(&self) -> usize {
        self.num_cash_flows
    }

    pub fn num_det_pricers(&self) -> usize {
        self.num_det_pricers
    }

    /// Parameters of model `m`; panics if `m >= num_models`
    pub fn model(&self, m: usize) -> ModelView<'_> {
        assert!(m < self.shape.num_models, "model index {} out of range", m);
        ModelView {
            c: &self.arena[self.c.block(m)],
            vols: &self.arena[self.vols.block(m)],
            drifts: &self.arena[self.drifts.block(m)],
            starts: &self.arena[self.starts.block(m)],
            discounts: &self.arena[self.discounts.block(m)],
            det_values: &self.arena[self.det_values.block(m)],
        }
    }
}

fn row_len(field: &str, len: usize, rows: usize) -> SdeResult<usize> {
    if len % rows != 0 {
        return Err(SdeError::InvalidConfiguration {
            field: field.to_string(),
            reason: format!("{} elements do not split into {} model rows", len, rows),
        });
    }
    Ok(len / rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_models() -> ModelArrays {
        let shape = ModelShape {
            num_models: 2,
            num_dates: 2,
            num_under: 2,
        };
        ModelArrays::pack(
            shape,
            &[1.0, 0.0, 0.5, 0.8, 2.0, 0.0, 0.3, 0.9],
            &[0.1, 0.2, 0.3, 0.4, 1.1, 1.2, 1.3, 1.4],
            &[-0.1, -0.2, -0.3, -0.4, -1.1, -1.2, -1.3, -1.4],
            &[100.0, 200.0, 300.0, 400.0],
            &[0.99, 0.98, 0.97, 0.96, 0.95, 0.94],
            &[1.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_views_select_model_blocks() {
        let md = two_models();
        assert_eq!(md.num_cash_flows(), 3);
        assert_eq!(md.num_det_pricers(), 1);

        let m1 = md.model(1);
        assert_eq!(m1.c, &[2.0, 0.0, 0.3, 0.9]);
        assert_eq!(m1.vols, &[1.1, 1.2, 1.3, 1.4]);
        assert_eq!(m1.drifts, &[-1.1, -1.2, -1.3, -1.4]);
        assert_eq!(m1.starts, &[300.0, 400.0]);
        assert_eq!(m1.discounts, &[0.96, 0.95, 0.94]);
        assert_eq!(m1.det_values, &[2.0]);

        let m0 = md.model(0);
        assert_eq!(m0.starts, &[100.0, 200.0]);
        assert_eq!(m0.discounts, &[0.99, 0.98, 0.97]);
    }

    #[test]
    fn test_pack_rejects_bad_lengths() {
        let shape = ModelShape {
            num_models: 1,
            num_dates: 1,
            num_under: 2,
        };
        let err = ModelArrays::pack(shape, &[1.0; 3], &[0.1; 2], &[0.0; 2], &[1.0; 2], &[1.0], &[])
            .unwrap_err();
        assert!(format!("{}", err).contains("md_c"));

        let shape = ModelShape {
            num_models: 2,
            ..shape
        };
        assert!(ModelArrays::pack(
            shape,
            &[1.0; 8],
            &[0.1; 4],
            &[0.0; 4],
            &[1.0; 4],
            &[1.0; 3],
            &[]
        )
        .is_err());
    }

    #[test]
    fn test_pack_rejects_non_finite() {
        let shape = ModelShape {
            num_models: 1,
            num_dates: 1,
            num_under: 1,
        };
        assert!(
            ModelArrays::pack(shape, &[1.0], &[f64::NAN], &[0.0], &[1.0], &[1.0], &[]).is_err()
        );
    }

    #[test]
    #[should_panic]
    fn test_model_index_out_of_range() {
        two_models().model(2);
    }
}
