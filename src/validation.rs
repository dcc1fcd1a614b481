//! Physical plausibility checks for parsed sensor records.

use crate::config::{Range, ValidationBounds};
use crate::data_models::{Field, PowerSource, SensorRecord};
use crate::errors::ValidationError;

/// `Ok(())` for a valid record, otherwise the first violated bound.
pub type ValidationOutcome = Result<(), ValidationError>;

/// Range validator. Holds an immutable copy of its bounds; validating one record
/// never depends on any other.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    bounds: ValidationBounds,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationBounds::default())
    }
}

impl Validator {
    pub fn new(bounds: ValidationBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &ValidationBounds {
        &self.bounds
    }

    /// Checks voltage, current, temperature and power, in that order.
    pub fn validate(&self, record: &SensorRecord) -> ValidationOutcome {
        check_field(Field::Voltage, record.voltage, self.bounds.voltage)?;
        check_field(Field::Current, record.current, self.bounds.current)?;
        check_field(Field::Temperature, record.temperature, self.bounds.temperature)?;

        let power_range = match record.power_source {
            PowerSource::Measured => self.bounds.power,
            PowerSource::Derived => self.bounds.derived_power(),
        };
        check_field(Field::Power, record.power, power_range)
    }
}

fn check_field(field: Field, value: f64, range: Range) -> ValidationOutcome {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field, value });
    }
    if !range.contains(value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(voltage: f64, current: f64, temperature: f64, power: f64) -> SensorRecord {
        SensorRecord {
            row: 1,
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            voltage,
            current,
            temperature,
            power,
            power_source: PowerSource::Measured,
        }
    }

    fn nudged(field: Field, value: f64) -> SensorRecord {
        let mut r = record(24.5, 5.2, 35.0, 127.4);
        match field {
            Field::Voltage => r.voltage = value,
            Field::Current => r.current = value,
            Field::Temperature => r.temperature = value,
            Field::Power => r.power = value,
        }
        r
    }

    #[test]
    fn test_valid_record() {
        let validator = Validator::default();
        assert_eq!(validator.validate(&record(24.5, 5.2, 35.0, 127.4)), Ok(()));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let validator = Validator::default();
        assert!(validator.validate(&record(0.0, 0.0, -20.0, 0.0)).is_ok());
        assert!(validator.validate(&record(50.0, 15.0, 80.0, 500.0)).is_ok());
    }

    #[test]
    fn test_single_field_just_outside_bound_is_named() {
        let validator = Validator::default();
        let bounds = *validator.bounds();
        let step = 1e-6;

        for field in [Field::Voltage, Field::Current, Field::Temperature, Field::Power] {
            let range = bounds.range(field);
            for value in [range.min - step, range.max + step] {
                let outcome = validator.validate(&nudged(field, value));
                match outcome {
                    Err(ValidationError::OutOfRange { field: got, min, max, .. }) => {
                        assert_eq!(got, field);
                        assert_eq!(min, range.min);
                        assert_eq!(max, range.max);
                    }
                    other => panic!("{} = {} should be out of range, got {:?}", field, value, other),
                }
            }
        }
    }

    #[test]
    fn test_non_finite_values_invalid() {
        let validator = Validator::default();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = validator.validate(&nudged(Field::Temperature, value)).unwrap_err();
            assert!(matches!(err, ValidationError::NonFinite { field: Field::Temperature, .. }));
        }
    }

    #[test]
    fn test_first_violation_reported() {
        let validator = Validator::default();
        let err = validator.validate(&record(999.0, 99.0, 35.0, 127.4)).unwrap_err();
        assert_eq!(err.field(), Field::Voltage);
    }

    #[test]
    fn test_derived_power_uses_recomputed_bound() {
        let validator = Validator::default();
        // 45 V * 14 A = 630 W: above the measured-power ceiling, within the derived one
        let mut derived = record(45.0, 14.0, 30.0, 630.0);
        derived.power_source = PowerSource::Derived;
        assert!(validator.validate(&derived).is_ok());

        let measured = record(45.0, 14.0, 30.0, 630.0);
        assert_eq!(validator.validate(&measured).unwrap_err().field(), Field::Power);
    }

    #[test]
    fn test_custom_bounds() {
        let bounds = ValidationBounds {
            voltage: Range::new(18.0, 32.0),
            current: Range::new(0.0, 12.0),
            temperature: Range::new(-10.0, 80.0),
            ..ValidationBounds::default()
        };
        let validator = Validator::new(bounds);

        assert!(validator.validate(&record(24.5, 5.2, 35.0, 127.4)).is_ok());
        assert_eq!(
            validator.validate(&record(17.9, 5.2, 35.0, 93.0)).unwrap_err().field(),
            Field::Voltage
        );
        assert_eq!(
            validator.validate(&record(24.0, 12.5, 35.0, 300.0)).unwrap_err().field(),
            Field::Current
        );
        assert_eq!(
            validator.validate(&record(24.0, 5.0, -15.0, 120.0)).unwrap_err().field(),
            Field::Temperature
        );
    }

    #[test]
    fn test_validation_is_order_independent() {
        let validator = Validator::default();
        let records = vec![
            record(24.5, 5.2, 35.0, 127.4),
            record(999.0, 5.2, 35.0, 127.4),
            record(24.5, 5.2, 35.0, -1.0),
        ];
        let forward: Vec<_> = records.iter().map(|r| validator.validate(r)).collect();
        let mut backward: Vec<_> = records.iter().rev().map(|r| validator.validate(r)).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
