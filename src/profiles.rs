use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::models::ColumnRole;
use crate::text::fold_words;

pub const GENERIC_ID: &str = "generic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "DD/MM/YYYY")]
    DmySlash,
    #[serde(rename = "DD-MM-YYYY")]
    DmyDash,
    #[serde(rename = "YYYY-MM-DD")]
    Iso,
}

impl DateFormat {
    pub fn token(&self) -> &'static str {
        match self {
            Self::DmySlash => "DD/MM/YYYY",
            Self::DmyDash => "DD-MM-YYYY",
            Self::Iso => "YYYY-MM-DD",
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            Self::DmySlash => "%d/%m/%Y",
            Self::DmyDash => "%d-%m-%Y",
            Self::Iso => "%Y-%m-%d",
        }
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecimalSeparator {
    #[serde(rename = ",")]
    Comma,
    #[serde(rename = ".")]
    Point,
}

impl DecimalSeparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::Point => ".",
        }
    }
}

/// One institution's export layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankProfile {
    pub id: String,
    pub name: String,
    pub date_format: DateFormat,
    pub decimal_separator: DecimalSeparator,
    /// Rows that always precede the header (cover pages); the header search starts after them.
    #[serde(default)]
    pub skip_rows: usize,
    pub vocabulary: BTreeMap<ColumnRole, Vec<String>>,
}

impl BankProfile {
    pub fn terms(&self, role: ColumnRole) -> &[String] {
        self.vocabulary.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_role(&self, role: ColumnRole) -> bool {
        !self.terms(role).is_empty()
    }

    /// Number of roles this profile knows how to recognize.
    pub fn expected_roles(&self) -> usize {
        self.vocabulary.values().filter(|terms| !terms.is_empty()).count()
    }

    pub fn is_generic(&self) -> bool {
        self.id == GENERIC_ID
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| IngestError::InvalidProfile {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if !self.has_role(ColumnRole::Date) {
            return Err(invalid("no date vocabulary"));
        }
        if !self.has_role(ColumnRole::Description) {
            return Err(invalid("no description vocabulary"));
        }
        let split = self.has_role(ColumnRole::Cargo) && self.has_role(ColumnRole::Abono);
        if !self.has_role(ColumnRole::Amount) && !split {
            return Err(invalid("needs amount or cargo+abono vocabulary"));
        }
        Ok(())
    }

    /// Header terms are compared in folded, punctuation-free form.
    fn normalized(mut self) -> Self {
        for terms in self.vocabulary.values_mut() {
            let mut seen = Vec::with_capacity(terms.len());
            for term in terms.iter() {
                let key = header_key(term);
                if !key.is_empty() && !seen.contains(&key) {
                    seen.push(key);
                }
            }
            *terms = seen;
        }
        self
    }
}

/// Fold a header cell (or vocabulary term) for comparison: lowercase, no
/// diacritics, punctuation replaced by spaces.
pub fn header_key(raw: &str) -> String {
    fold_words(raw)
}

/// Read-only set of known profiles plus the generic fallback.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<BankProfile>,
    generic: BankProfile,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<BankProfile>, generic: BankProfile) -> Result<Self> {
        let generic = generic.normalized();
        generic.validate()?;
        let mut normalized: Vec<BankProfile> = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let profile = profile.normalized();
            profile.validate()?;
            if profile.is_generic() || normalized.iter().any(|p| p.id == profile.id) {
                return Err(IngestError::InvalidProfile {
                    id: profile.id,
                    reason: "duplicate id".to_string(),
                });
            }
            normalized.push(profile);
        }
        Ok(Self {
            profiles: normalized,
            generic,
        })
    }

    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles().into_iter().map(BankProfile::normalized).collect(),
            generic: generic_profile().normalized(),
        }
    }

    /// A new registry where `extra` replaces profiles with the same id and
    /// appends the rest. A profile with the generic id replaces the fallback.
    pub fn merged(&self, extra: Vec<BankProfile>) -> Result<Self> {
        let mut profiles = self.profiles.clone();
        let mut generic = self.generic.clone();
        for profile in extra {
            if profile.is_generic() {
                generic = profile;
            } else if let Some(slot) = profiles.iter_mut().find(|p| p.id == profile.id) {
                *slot = profile;
            } else {
                profiles.push(profile);
            }
        }
        Self::new(profiles, generic)
    }

    pub fn load_profiles_file(path: &Path) -> Result<Vec<BankProfile>> {
        let content = std::fs::read_to_string(path)?;
        let profiles: Vec<BankProfile> = serde_json::from_str(&content)?;
        Ok(profiles)
    }

    /// Built-in profiles, merged with the profiles file when one is given.
    pub fn load(profiles_file: Option<&Path>) -> Result<Self> {
        let registry = Self::builtin();
        match profiles_file {
            Some(path) => registry.merged(Self::load_profiles_file(path)?),
            None => Ok(registry),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BankProfile> {
        if id == GENERIC_ID {
            return Some(&self.generic);
        }
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profiles(&self) -> &[BankProfile] {
        &self.profiles
    }

    pub fn generic(&self) -> &BankProfile {
        &self.generic
    }

    /// Specific profiles in registry order, then the generic fallback.
    pub fn candidates(&self) -> impl Iterator<Item = &BankProfile> {
        self.profiles.iter().chain(std::iter::once(&self.generic))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(
    id: &str,
    name: &str,
    date_format: DateFormat,
    decimal_separator: DecimalSeparator,
    vocabulary: &[(ColumnRole, &[&str])],
) -> BankProfile {
    BankProfile {
        id: id.to_string(),
        name: name.to_string(),
        date_format,
        decimal_separator,
        skip_rows: 0,
        vocabulary: vocabulary
            .iter()
            .map(|(role, terms)| (*role, terms.iter().map(|t| t.to_string()).collect()))
            .collect(),
    }
}

fn builtin_profiles() -> Vec<BankProfile> {
    use ColumnRole::{
        Abono, Amount, Balance, Cargo, Counterparty, Currency, Date, Description, Reference, ValueDate,
    };
    use DateFormat::{DmyDash, DmySlash, Iso};
    use DecimalSeparator::{Comma, Point};

    vec![
        profile("santander", "Banco Santander", DmySlash, Comma, &[
            (Date, &["fecha operacion", "fecha operación"]),
            (ValueDate, &["fecha valor"]),
            (Description, &["concepto"]),
            (Amount, &["importe", "importe eur"]),
            (Balance, &["saldo"]),
            (Currency, &["divisa"]),
        ]),
        profile("bbva", "BBVA", DmySlash, Comma, &[
            (Date, &["fecha"]),
            (ValueDate, &["f.valor", "fecha valor"]),
            (Description, &["concepto"]),
            (Counterparty, &["movimiento"]),
            (Amount, &["importe"]),
            (Balance, &["disponible"]),
            (Currency, &["divisa"]),
            (Reference, &["observaciones"]),
        ]),
        profile("caixabank", "CaixaBank", DmySlash, Comma, &[
            (Date, &["fecha"]),
            (ValueDate, &["fecha valor"]),
            (Description, &["movimiento"]),
            (Reference, &["mas datos", "más datos"]),
            (Amount, &["importe"]),
            (Balance, &["saldo"]),
        ]),
        profile("sabadell", "Banco Sabadell", DmySlash, Comma, &[
            (Date, &["f. operativa", "fecha operativa"]),
            (ValueDate, &["f. valor"]),
            (Description, &["concepto"]),
            (Amount, &["importe"]),
            (Balance, &["saldo"]),
            (Reference, &["referencia 1"]),
            (Counterparty, &["referencia 2"]),
        ]),
        profile("bankinter", "Bankinter", DmySlash, Comma, &[
            (Date, &["fecha contable"]),
            (ValueDate, &["fecha valor"]),
            (Description, &["descripcion", "descripción"]),
            (Amount, &["importe"]),
            (Balance, &["saldo"]),
        ]),
        profile("ing", "ING", DmySlash, Comma, &[
            (Date, &["f. valor"]),
            (Description, &["descripcion", "descripción"]),
            (Counterparty, &["categoria", "subcategoria"]),
            (Amount, &["importe (€)", "importe"]),
            (Balance, &["saldo (€)", "saldo"]),
        ]),
        profile("kutxabank", "Kutxabank", DmyDash, Comma, &[
            (Date, &["fecha"]),
            (ValueDate, &["fecha valor"]),
            (Description, &["concepto"]),
            (Cargo, &["cargos", "debe"]),
            (Abono, &["abonos", "haber"]),
            (Balance, &["saldo"]),
        ]),
        profile("banorte", "Banorte", DmySlash, Point, &[
            (Date, &["fecha"]),
            (Description, &["descripcion", "descripción", "concepto / referencia"]),
            (Cargo, &["cargo", "retiros"]),
            (Abono, &["abono", "depositos", "depósitos"]),
            (Balance, &["saldo"]),
        ]),
        profile("revolut", "Revolut", Iso, Point, &[
            (Date, &["completed date", "started date"]),
            (Description, &["description"]),
            (Amount, &["amount"]),
            (Currency, &["currency"]),
            (Balance, &["balance"]),
            (Reference, &["type"]),
        ]),
    ]
}

fn generic_profile() -> BankProfile {
    use ColumnRole::{
        Abono, Amount, Balance, Cargo, Counterparty, Currency, Date, Description, Reference, ValueDate,
    };

    profile(GENERIC_ID, "Generic", DateFormat::DmySlash, DecimalSeparator::Comma, &[
        (Date, &[
            "fecha", "fecha operacion", "fecha contable", "f. operacion", "fecha movimiento",
            "date", "posting date", "transaction date",
        ]),
        (ValueDate, &["fecha valor", "f. valor", "f.valor", "value date"]),
        (Description, &[
            "concepto", "descripcion", "detalle", "movimiento", "concepto comun",
            "description", "details", "memo",
        ]),
        (Amount, &["importe", "monto", "cantidad", "amount", "importe eur"]),
        (Cargo, &["cargo", "cargos", "debe", "retiros", "debit", "debito"]),
        (Abono, &["abono", "abonos", "haber", "depositos", "credit", "credito"]),
        (Counterparty, &["beneficiario", "ordenante", "contrapartida", "payee", "counterparty"]),
        (Reference, &["referencia", "reference", "ref", "num documento", "n documento"]),
        (Balance, &["saldo", "balance", "saldo disponible", "disponible"]),
        (Currency, &["divisa", "moneda", "currency"]),
    ])
}
