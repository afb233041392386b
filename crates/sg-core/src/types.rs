//! Physical quantities measured by a series

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of physical quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Pressure,
    Temperature,
    TemperatureMinMax,
    Water,
    WaterHeight,
    Other,
}

impl TypeKind {
    /// Token used by the native file format (`sgt` headers)
    pub fn token(&self) -> &'static str {
        match self {
            TypeKind::Pressure => "PRESSURE",
            TypeKind::Temperature => "TEMPERATURE",
            TypeKind::TemperatureMinMax => "TEMPERATURE_MIN_MAX",
            TypeKind::Water => "WATER",
            TypeKind::WaterHeight => "WATER_HEIGHT",
            TypeKind::Other => "OTHER",
        }
    }

    pub fn from_token(token: &str) -> Option<TypeKind> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PRESSURE" => Some(TypeKind::Pressure),
            "TEMPERATURE" => Some(TypeKind::Temperature),
            "TEMPERATURE_MIN_MAX" => Some(TypeKind::TemperatureMinMax),
            "WATER" => Some(TypeKind::Water),
            "WATER_HEIGHT" => Some(TypeKind::WaterHeight),
            _ => None,
        }
    }

    /// Built-in type for this kind, if any
    pub fn builtin(&self) -> Option<Arc<SeriesType>> {
        match self {
            TypeKind::Pressure => Some(PRESSURE.clone()),
            TypeKind::Temperature => Some(TEMPERATURE.clone()),
            TypeKind::TemperatureMinMax => Some(TEMPERATURE_MIN_MAX.clone()),
            TypeKind::Water => Some(WATER.clone()),
            TypeKind::WaterHeight => Some(WATER_HEIGHT.clone()),
            TypeKind::Other => None,
        }
    }
}

/// Describes what a series measures and how its values are displayed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesType {
    pub kind: TypeKind,
    pub name: String,
    pub unit: String,
    /// Number of decimals used when formatting values
    pub precision: usize,
    /// Items carry low/high pairs
    pub high_low: bool,
    /// Values are drawn as steps rather than lines
    pub stepped: bool,
}

impl SeriesType {
    pub fn new(kind: TypeKind, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            unit: unit.into(),
            precision: 2,
            high_low: kind == TypeKind::TemperatureMinMax,
            stepped: kind == TypeKind::Water,
        }
    }

    /// Same kind and name with another unit
    pub fn with_unit(&self, unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..self.clone()
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_high_low(mut self, high_low: bool) -> Self {
        self.high_low = high_low;
        self
    }

    pub fn with_stepped(mut self, stepped: bool) -> Self {
        self.stepped = stepped;
        self
    }

    /// Lookup equality: kind, name and unit
    pub fn matches(&self, kind: TypeKind, name: &str, unit: &str) -> bool {
        self.kind == kind && self.name == name && self.unit == unit
    }

    pub fn is_builtin(&self) -> bool {
        self.kind
            .builtin()
            .map(|b| b.matches(self.kind, &self.name, &self.unit))
            .unwrap_or(false)
    }

    /// Format a value with the type's precision and unit
    pub fn format_value(&self, value: f64) -> String {
        if self.unit.is_empty() {
            format!("{:.*}", self.precision, value)
        } else {
            format!("{:.*} {}", self.precision, value, self.unit)
        }
    }
}

impl PartialEq for SeriesType {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.kind, &other.name, &other.unit)
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.unit)
        }
    }
}

pub static PRESSURE: Lazy<Arc<SeriesType>> =
    Lazy::new(|| Arc::new(SeriesType::new(TypeKind::Pressure, "Pression", "kPa").with_precision(3)));

pub static TEMPERATURE: Lazy<Arc<SeriesType>> =
    Lazy::new(|| Arc::new(SeriesType::new(TypeKind::Temperature, "Température", "°C")));

pub static TEMPERATURE_MIN_MAX: Lazy<Arc<SeriesType>> = Lazy::new(|| {
    Arc::new(SeriesType::new(
        TypeKind::TemperatureMinMax,
        "Température min/max",
        "°C",
    ))
});

pub static WATER: Lazy<Arc<SeriesType>> =
    Lazy::new(|| Arc::new(SeriesType::new(TypeKind::Water, "Précipitations", "mm").with_precision(1)));

pub static WATER_HEIGHT: Lazy<Arc<SeriesType>> =
    Lazy::new(|| Arc::new(SeriesType::new(TypeKind::WaterHeight, "Hauteur d'eau", "cm").with_precision(1)));

fn builtins() -> [Arc<SeriesType>; 5] {
    [
        PRESSURE.clone(),
        TEMPERATURE.clone(),
        TEMPERATURE_MIN_MAX.clone(),
        WATER.clone(),
        WATER_HEIGHT.clone(),
    ]
}

/// Registry of every type known to the process.
///
/// Built-in types are always present and never replaced. Types created while
/// reading file headers are registered here and live as long as the registry.
pub struct TypeRegistry {
    user_types: RwLock<Vec<Arc<SeriesType>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            user_types: RwLock::new(Vec::new()),
        }
    }

    /// Built-in types followed by registered types, in registration order
    pub fn all(&self) -> Vec<Arc<SeriesType>> {
        let mut all: Vec<_> = builtins().into_iter().collect();
        all.extend(self.user_types.read().iter().cloned());
        all
    }

    /// Find a type by kind, name and unit
    pub fn find(&self, kind: TypeKind, name: &str, unit: &str) -> Option<Arc<SeriesType>> {
        builtins()
            .into_iter()
            .find(|t| t.matches(kind, name, unit))
            .or_else(|| {
                self.user_types
                    .read()
                    .iter()
                    .find(|t| t.matches(kind, name, unit))
                    .cloned()
            })
    }

    /// Type of kind `kind` expressed in `unit`.
    ///
    /// Returns the built-in when the unit matches it, otherwise a registered
    /// variant carrying the built-in's name and flags.
    pub fn for_kind(&self, kind: TypeKind, unit: &str) -> Arc<SeriesType> {
        match kind.builtin() {
            Some(builtin) if builtin.unit == unit => builtin,
            Some(builtin) => self.register(builtin.with_unit(unit)),
            None => self.register(SeriesType::new(TypeKind::Other, "", unit)),
        }
    }

    /// Resolve a user-declared `name`/`unit` pair.
    ///
    /// A name matching a built-in resolves to that kind in the given unit;
    /// anything else becomes an `Other` type.
    pub fn resolve(&self, name: &str, unit: &str) -> Arc<SeriesType> {
        if let Some(builtin) = builtins().into_iter().find(|t| t.name == name) {
            return self.for_kind(builtin.kind, unit);
        }
        self.register(SeriesType::new(TypeKind::Other, name, unit))
    }

    /// Register a type, returning the existing instance when an equal one is known
    pub fn register(&self, series_type: SeriesType) -> Arc<SeriesType> {
        if let Some(existing) = self.find(series_type.kind, &series_type.name, &series_type.unit) {
            return existing;
        }
        let mut user_types = self.user_types.write();
        // Another writer may have registered it between find and write
        if let Some(existing) = user_types.iter().find(|t| t.as_ref() == &series_type) {
            return existing.clone();
        }
        debug!("Registering type {}", series_type);
        let series_type = Arc::new(series_type);
        user_types.push(series_type.clone());
        series_type
    }

    /// Registered, non built-in types
    pub fn user_types(&self) -> Vec<Arc<SeriesType>> {
        self.user_types.read().clone()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_returns_constant() {
        let registry = TypeRegistry::new();
        let found = registry.for_kind(TypeKind::Pressure, "kPa");
        assert!(Arc::ptr_eq(&found, &*PRESSURE));
        assert!(registry.user_types().is_empty());
    }

    #[test]
    fn test_other_unit_registers_variant_without_touching_builtin() {
        let registry = TypeRegistry::new();
        let mbar = registry.for_kind(TypeKind::Pressure, "mbar");
        assert_eq!(mbar.kind, TypeKind::Pressure);
        assert_eq!(mbar.unit, "mbar");
        assert_eq!(PRESSURE.unit, "kPa");

        let again = registry.for_kind(TypeKind::Pressure, "mbar");
        assert!(Arc::ptr_eq(&mbar, &again));
        assert_eq!(registry.user_types().len(), 1);
    }

    #[test]
    fn test_resolve_user_type() {
        let registry = TypeRegistry::new();
        let conductivity = registry.resolve("Conductivité", "mS");
        assert_eq!(conductivity.kind, TypeKind::Other);
        let pressure = registry.resolve("Pression", "bar");
        assert_eq!(pressure.kind, TypeKind::Pressure);
        assert_eq!(registry.all().len(), 7);
    }

    #[test]
    fn test_token_round_trip() {
        for kind in [
            TypeKind::Pressure,
            TypeKind::Temperature,
            TypeKind::TemperatureMinMax,
            TypeKind::Water,
            TypeKind::WaterHeight,
        ] {
            assert_eq!(TypeKind::from_token(kind.token()), Some(kind));
        }
        assert_eq!(TypeKind::from_token("OTHER"), None);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(TEMPERATURE.format_value(12.345), "12.35 °C");
    }
}
