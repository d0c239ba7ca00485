use std::sync::Arc;

use meterflow_api::{field, Diagnostics, Pressure, Record, Stage, Temperature};

/// кПа в одном psi.
pub const KPA_PER_PSI: f64 = 6.895;

pub fn kpa_to_psi(kpa: f64) -> f64 {
    kpa / KPA_PER_PSI
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 1.8 + 32.0
}

/// Пересчёт давления (кПа → psi) и температуры (°C → °F).
///
/// Всегда возвращает ровно одну запись. Поле, которое не приводится
/// к числу или переполняется при пересчёте, остаётся под исходным
/// именем без изменений.
pub struct ConvertStage {
    diagnostics: Arc<dyn Diagnostics>,
}

impl ConvertStage {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    pub fn convert(&self, record: Record) -> Record {
        let Record { id, pressure, temperature, humidity, wind } = record;

        let pressure = match pressure {
            Pressure::Kilopascal(value) => match value.as_number().map(kpa_to_psi).filter(|v| v.is_finite()) {
                Some(psi) => Pressure::Psi(psi),
                None => {
                    self.diagnostics.conversion_skipped(&id, field::PRESSURE_KPA);
                    Pressure::Kilopascal(value)
                }
            },
            converted => converted,
        };

        let temperature = match temperature {
            Temperature::Celsius(value) => match value.as_number().map(celsius_to_fahrenheit).filter(|v| v.is_finite()) {
                Some(f) => Temperature::Fahrenheit(f),
                None => {
                    self.diagnostics.conversion_skipped(&id, field::TEMPERATURE_C);
                    Temperature::Celsius(value)
                }
            },
            converted => converted,
        };

        Record { id, pressure, temperature, humidity, wind }
    }
}

impl Stage for ConvertStage {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn process(&self, record: Record) -> Option<Record> {
        Some(self.convert(record))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use meterflow_api::{AdapterError, ParseError, Value};

    use super::*;

    #[derive(Default)]
    struct Skipped(Mutex<Vec<&'static str>>);

    impl Diagnostics for Skipped {
        fn record_filtered(&self, _id: &Value, _field: &'static str) {}
        fn conversion_skipped(&self, _id: &Value, field: &'static str) {
            self.0.lock().unwrap().push(field);
        }
        fn malformed_payload(&self, _error: &ParseError) {}
        fn publish_failed(&self, _error: &AdapterError) {}
        fn ack_failed(&self, _error: &AdapterError) {}
    }

    fn stage() -> (ConvertStage, Arc<Skipped>) {
        let diagnostics = Arc::new(Skipped::default());
        (ConvertStage::new(diagnostics.clone()), diagnostics)
    }

    fn number(record: &Record, name: &str) -> f64 {
        match record.get(name) {
            Some(Value::Float(v)) => v,
            other => panic!("{name}: expected float, got {other:?}"),
        }
    }

    #[test]
    fn reference_points() {
        assert!((kpa_to_psi(101.325) - 14.696).abs() < 1e-3);
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
    }

    #[test]
    fn overflowing_result_is_skipped() {
        let (stage, diagnostics) = stage();
        let out = stage.convert(Record::reading(1_i64, 100.0, 1.7e308, 1.0, 1.0));

        assert_eq!(out.temperature, Temperature::Celsius(Value::Float(1.7e308)));
        assert_eq!(out.get(field::TEMPERATURE_F), None);
        assert!((number(&out, field::PRESSURE_PSI) - 14.5033).abs() < 1e-4);
        assert_eq!(*diagnostics.0.lock().unwrap(), vec![field::TEMPERATURE_C]);

        let json = String::from_utf8(out.to_vec().unwrap()).unwrap();
        assert!(!json.contains("null"), "{json}");
    }

    #[test]
    fn converts_both_fields() {
        let (stage, diagnostics) = stage();
        let out = stage.convert(Record::reading(1_i64, 100.0, 20.0, 50.0, 5.0));

        assert!((number(&out, field::PRESSURE_PSI) - 14.5033).abs() < 1e-4);
        assert!((number(&out, field::TEMPERATURE_F) - 68.0).abs() < 1e-9);
        assert_eq!(out.get(field::PRESSURE_KPA), None);
        assert_eq!(out.get(field::TEMPERATURE_C), None);
        assert_eq!(out.id, Value::Integer(1));
        assert_eq!(out.humidity, Value::Float(50.0));
        assert_eq!(out.wind, Value::Float(5.0));
        assert!(diagnostics.0.lock().unwrap().is_empty());
    }

    #[test]
    fn integer_and_numeric_text_are_coerced() {
        let (stage, _) = stage();
        let out = stage.convert(Record::reading(1_i64, 0_i64, " 100 ", 1.0, 1.0));

        assert_eq!(out.pressure, Pressure::Psi(0.0));
        assert!((number(&out, field::TEMPERATURE_F) - 212.0).abs() < 1e-9);
    }

    #[test]
    fn non_numeric_pressure_is_left_untouched() {
        let (stage, diagnostics) = stage();
        let out = stage.convert(Record::reading(9_i64, "bad", 20.0, 50.0, 5.0));

        assert_eq!(out.pressure, Pressure::Kilopascal(Value::from("bad")));
        assert_eq!(out.get(field::PRESSURE_PSI), None);
        assert!((number(&out, field::TEMPERATURE_F) - 68.0).abs() < 1e-9);
        assert_eq!(*diagnostics.0.lock().unwrap(), vec![field::PRESSURE_KPA]);
    }

    #[test]
    fn null_fields_are_skipped_not_dropped() {
        let (stage, _) = stage();
        let record = Record::reading(1_i64, None::<f64>, None::<f64>, 1.0, 1.0);

        assert_eq!(stage.process(record.clone()), Some(record));
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let (stage, _) = stage();
        let once = stage.convert(Record::reading(1_i64, 101.325, -40.0, 10.0, 2.0));
        let twice = stage.convert(once.clone());

        assert_eq!(once, twice);
        assert!((number(&twice, field::TEMPERATURE_F) + 40.0).abs() < 1e-9);
    }
}
