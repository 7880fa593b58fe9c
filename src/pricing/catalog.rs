//! Pricing table: materials, optional subtypes, unit prices per m².

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PricingError};

/// Callback-data prefix for material buttons.
pub const MATERIAL_PREFIX: &str = "material:";
/// Callback-data prefix for subtype buttons.
pub const SUBTYPE_PREFIX: &str = "subtype:";

/// Telegram rejects inline buttons whose callback data exceeds 64 bytes.
const CALLBACK_DATA_LIMIT: usize = 64;

/// A priced variant of a material (e.g. glossy vs. matte film).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtype {
    pub key: String,
    pub label: String,
    pub price: Decimal,
}

/// How a material is priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialPricing {
    /// One unit price for the material.
    Flat(Decimal),
    /// Unit price depends on the chosen subtype.
    Subtypes(Vec<Subtype>),
}

/// A material offered for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub key: String,
    pub label: String,
    pub pricing: MaterialPricing,
}

impl Material {
    pub fn flat(key: &str, label: &str, price: Decimal) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            pricing: MaterialPricing::Flat(price),
        }
    }

    pub fn with_subtypes(key: &str, label: &str, subtypes: Vec<Subtype>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            pricing: MaterialPricing::Subtypes(subtypes),
        }
    }

    pub fn has_subtypes(&self) -> bool {
        matches!(self.pricing, MaterialPricing::Subtypes(_))
    }

    /// Subtypes in display order; empty for flat-priced materials.
    pub fn subtypes(&self) -> &[Subtype] {
        match &self.pricing {
            MaterialPricing::Flat(_) => &[],
            MaterialPricing::Subtypes(subtypes) => subtypes,
        }
    }

    pub fn subtype(&self, key: &str) -> Option<&Subtype> {
        self.subtypes().iter().find(|s| s.key == key)
    }

    /// Human-readable name, e.g. `Пленка (Матовая)`.
    pub fn display_name(&self, subtype: Option<&str>) -> String {
        match subtype.and_then(|key| self.subtype(key)) {
            Some(s) => format!("{} ({})", self.label, s.label),
            None => self.label.clone(),
        }
    }
}

/// Immutable material → unit price mapping, in button order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingTable {
    materials: Vec<Material>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            materials: vec![
                Material::flat("банер", "Банер", dec!(300)),
                Material::flat("пленка", "Пленка", dec!(500)),
                Material::flat("холст", "Холст", dec!(700)),
            ],
        }
    }
}

impl PricingTable {
    /// Build a table from materials, validating keys and prices.
    pub fn new(materials: Vec<Material>) -> Result<Self, ConfigError> {
        let table = Self { materials };
        table.validate()?;
        Ok(table)
    }

    /// Parse the JSON price file format.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: PriceFile =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let materials = file
            .materials
            .into_iter()
            .map(MaterialEntry::into_material)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(materials)
    }

    /// Load a JSON price file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, key: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.key == key)
    }

    /// Look up the unit price for a material and optional subtype.
    pub fn unit_price(&self, material: &str, subtype: Option<&str>) -> Result<Decimal, PricingError> {
        let entry = self
            .material(material)
            .ok_or_else(|| PricingError::UnknownMaterial {
                material: material.to_string(),
            })?;

        match (&entry.pricing, subtype) {
            (MaterialPricing::Flat(price), None) => Ok(*price),
            (MaterialPricing::Flat(_), Some(subtype)) => Err(PricingError::UnexpectedSubtype {
                material: material.to_string(),
                subtype: subtype.to_string(),
            }),
            (MaterialPricing::Subtypes(_), None) => Err(PricingError::SubtypeRequired {
                material: material.to_string(),
            }),
            (MaterialPricing::Subtypes(_), Some(subtype)) => entry
                .subtype(subtype)
                .map(|s| s.price)
                .ok_or_else(|| PricingError::UnknownSubtype {
                    material: material.to_string(),
                    subtype: subtype.to_string(),
                }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.materials.is_empty() {
            return Err(invalid("materials", "at least one material is required"));
        }

        let mut seen = HashSet::new();
        for material in &self.materials {
            check_key(MATERIAL_PREFIX, &material.key)?;
            if !seen.insert(material.key.as_str()) {
                return Err(invalid(
                    "materials",
                    &format!("duplicate material key {:?}", material.key),
                ));
            }

            match &material.pricing {
                MaterialPricing::Flat(price) => check_price(&material.key, *price)?,
                MaterialPricing::Subtypes(subtypes) => {
                    if subtypes.is_empty() {
                        return Err(invalid(
                            &material.key,
                            "subtype list must not be empty",
                        ));
                    }
                    let mut seen_subtypes = HashSet::new();
                    for subtype in subtypes {
                        check_key(SUBTYPE_PREFIX, &subtype.key)?;
                        if !seen_subtypes.insert(subtype.key.as_str()) {
                            return Err(invalid(
                                &material.key,
                                &format!("duplicate subtype key {:?}", subtype.key),
                            ));
                        }
                        check_price(&subtype.key, subtype.price)?;
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Price file format ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PriceFile {
    materials: Vec<MaterialEntry>,
}

#[derive(Debug, Deserialize)]
struct MaterialEntry {
    key: String,
    label: String,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    subtypes: Option<Vec<Subtype>>,
}

impl MaterialEntry {
    fn into_material(self) -> Result<Material, ConfigError> {
        let pricing = match (self.price, self.subtypes) {
            (Some(price), None) => MaterialPricing::Flat(price),
            (None, Some(subtypes)) => MaterialPricing::Subtypes(subtypes),
            (Some(_), Some(_)) => {
                return Err(invalid(&self.key, "set either price or subtypes, not both"));
            }
            (None, None) => return Err(invalid(&self.key, "price or subtypes is required")),
        };
        Ok(Material {
            key: self.key,
            label: self.label,
            pricing,
        })
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn check_key(prefix: &str, key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(invalid(prefix.trim_end_matches(':'), "key must not be empty"));
    }
    if prefix.len() + key.len() > CALLBACK_DATA_LIMIT {
        return Err(invalid(
            key,
            &format!("key exceeds {CALLBACK_DATA_LIMIT} bytes of callback data"),
        ));
    }
    Ok(())
}

fn check_price(key: &str, price: Decimal) -> Result<(), ConfigError> {
    if price <= Decimal::ZERO {
        return Err(invalid(key, "price must be positive"));
    }
    Ok(())
}
