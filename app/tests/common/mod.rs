//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for FinPivot integration tests.

#![allow(dead_code)]

use finpivot::{
    add_calculated_field, create_app_state, fixtures, get_pivot_data, load_records,
    update_pivot_config, AppState, CalculatedFieldRequest, FilterRequest, MeasureRequest,
    PivotRequest, PivotResponse,
};
use engine::{Field, FieldValue};

pub const EPSILON: f64 = 1e-6;

/// Test harness for creating and managing test state.
pub struct TestHarness {
    pub state: AppState,
}

impl TestHarness {
    /// Create a new test harness with no records.
    pub fn new() -> Self {
        TestHarness {
            state: create_app_state(),
        }
    }

    /// Create a harness loaded with the twenty demo records.
    pub fn with_sample_data() -> Self {
        let harness = Self::new();
        load_records(&harness.state, fixtures::demo_records()).unwrap();
        harness
    }

    pub fn add_calc(&self, name: &str, formula: &str) -> Field {
        add_calculated_field(
            &self.state,
            CalculatedFieldRequest {
                name: name.to_string(),
                formula: formula.to_string(),
            },
        )
        .unwrap()
    }

    /// Applies `request` and returns the computed pivot.
    pub fn pivot(&self, request: PivotRequest) -> PivotResponse {
        update_pivot_config(&self.state, request).unwrap();
        get_pivot_data(&self.state).unwrap()
    }
}

pub fn rows(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

pub fn measures(fields: &[&str]) -> Vec<MeasureRequest> {
    fields.iter().map(|f| MeasureRequest::new(*f)).collect()
}

pub fn filter(field: &str, operator: &str, value: impl Into<FieldValue>) -> FilterRequest {
    FilterRequest {
        field: field.to_string(),
        operator: operator.to_string(),
        value: Some(value.into()),
        value_to: None,
        values: None,
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {expected}, got {actual}"
    );
}
