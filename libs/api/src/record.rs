use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::ParseError;

// ════════════════════════════════════════════════════════════════
//  Field names
// ════════════════════════════════════════════════════════════════

/// Имена полей wire-формата.
pub mod field {
    pub const ID: &str = "ID";
    pub const PRESSURE_KPA: &str = "Pressure(kPa)";
    pub const PRESSURE_PSI: &str = "Pressure(psi)";
    pub const TEMPERATURE_C: &str = "Temperature(C)";
    pub const TEMPERATURE_F: &str = "Temperature(F)";
    pub const HUMIDITY: &str = "Humidity(%)";
    pub const WIND: &str = "Wind(m/s)";
}

/// Фиксированный набор ключей входящего сообщения.
pub const INGRESS_FIELDS: [&str; 5] = [
    field::ID,
    field::PRESSURE_KPA,
    field::TEMPERATURE_C,
    field::HUMIDITY,
    field::WIND,
];

// ════════════════════════════════════════════════════════════════
//  Value
// ════════════════════════════════════════════════════════════════

/// Скалярное значение поля измерения.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    /// Целое больше `i64::MAX`: хранится без потери точности.
    Unsigned(u64),
    Float(f64),
    /// Строка в числовом поле. Пропускается фильтром, если это не "none".
    Text(String),
    Null,
}

impl Value {
    /// Null или строковый токен "none" (trim, без учёта регистра).
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().eq_ignore_ascii_case("none"),
            Value::Integer(_) | Value::Unsigned(_) | Value::Float(_) => false,
        }
    }

    /// Числовое приведение. `None`: значение не представимо конечным числом.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Unsigned(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Value::Null => None,
        }
    }

    fn from_json(name: &'static str, raw: serde_json::Value) -> Result<Self, ParseError> {
        match raw {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Value::Unsigned(u))
                } else {
                    n.as_f64()
                        .map(Value::Float)
                        .ok_or(ParseError::UnsupportedValue { field: name, kind: "number" })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            other => Err(ParseError::UnsupportedValue { field: name, kind: json_kind(&other) }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Unsigned(u) => write!(f, "{u}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Null => f.write_str("null"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Unsigned(u) => serializer.serialize_u64(*u),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Null => serializer.serialize_unit(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Integer(v) }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self { Value::Unsigned(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Text(v.to_string()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ════════════════════════════════════════════════════════════════
//  Convertible fields
// ════════════════════════════════════════════════════════════════

/// Давление: исходное значение в кПа либо уже пересчитанное в psi.
#[derive(Debug, Clone, PartialEq)]
pub enum Pressure {
    Kilopascal(Value),
    Psi(f64),
}

/// Температура: исходное значение в °C либо уже пересчитанное в °F.
#[derive(Debug, Clone, PartialEq)]
pub enum Temperature {
    Celsius(Value),
    Fahrenheit(f64),
}

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// Одно измерение, проходящее через pipeline.
///
/// Схема фиксирована: пять входных полей, два из которых могут быть
/// пересчитаны в другие единицы. Стадии получают запись по значению
/// и возвращают новую.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Value,
    pub pressure: Pressure,
    pub temperature: Temperature,
    pub humidity: Value,
    pub wind: Value,
}

impl Record {
    /// Входная запись: давление в кПа, температура в °C.
    pub fn reading(
        id: impl Into<Value>,
        pressure_kpa: impl Into<Value>,
        temperature_c: impl Into<Value>,
        humidity: impl Into<Value>,
        wind: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            pressure: Pressure::Kilopascal(pressure_kpa.into()),
            temperature: Temperature::Celsius(temperature_c.into()),
            humidity: humidity.into(),
            wind: wind.into(),
        }
    }

    /// Распарсить wire payload (UTF-8 JSON object).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::try_from(value)
    }

    /// Сериализовать в wire payload.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Поля в порядке сериализации.
    ///
    /// Непересчитанные поля остаются на исходных местах, пересчитанные
    /// идут в конце (psi перед F).
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        let mut out = Vec::with_capacity(5);
        out.push((field::ID, self.id.clone()));
        if let Pressure::Kilopascal(v) = &self.pressure {
            out.push((field::PRESSURE_KPA, v.clone()));
        }
        if let Temperature::Celsius(v) = &self.temperature {
            out.push((field::TEMPERATURE_C, v.clone()));
        }
        out.push((field::HUMIDITY, self.humidity.clone()));
        out.push((field::WIND, self.wind.clone()));
        if let Pressure::Psi(psi) = self.pressure {
            out.push((field::PRESSURE_PSI, Value::Float(psi)));
        }
        if let Temperature::Fahrenheit(f) = self.temperature {
            out.push((field::TEMPERATURE_F, Value::Float(f)));
        }
        out
    }

    /// Значение поля по wire-имени.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = ParseError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            serde_json::Value::Object(map) => map,
            other => return Err(ParseError::NotAnObject(json_kind(&other))),
        };

        if let Some(extra) = map.keys().find(|k| !INGRESS_FIELDS.contains(&k.as_str())) {
            return Err(ParseError::UnexpectedField(extra.clone()));
        }

        let mut take = |name: &'static str| -> Result<Value, ParseError> {
            let raw = map.remove(name).ok_or(ParseError::MissingField(name))?;
            Value::from_json(name, raw)
        };

        Ok(Self {
            id: take(field::ID)?,
            pressure: Pressure::Kilopascal(take(field::PRESSURE_KPA)?),
            temperature: Temperature::Celsius(take(field::TEMPERATURE_C)?),
            humidity: take(field::HUMIDITY)?,
            wind: take(field::WIND)?,
        })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (name, value) in &fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
