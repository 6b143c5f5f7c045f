//! Chemical compositions
//!
//! A composition is a multiset of element symbols with (possibly fractional)
//! amounts. Formulas are written with elements ordered by electronegativity,
//! which is also the ordering used to pick the most electronegative element
//! of an entry.

use crate::element;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const AMOUNT_TOLERANCE: f64 = 1e-8;

/// Reduced formulas that are written as their molecular or peroxide form.
const SPECIAL_FORMULAS: [(&str, &str); 11] = [
    ("LiO", "Li2O2"),
    ("NaO", "Na2O2"),
    ("KO", "K2O2"),
    ("HO", "H2O2"),
    ("CsO", "Cs2O2"),
    ("RbO", "Rb2O2"),
    ("O", "O2"),
    ("N", "N2"),
    ("F", "F2"),
    ("Cl", "Cl2"),
    ("H", "H2"),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("unknown element symbol {0:?}")]
    UnknownElement(String),
    #[error("invalid formula {formula:?}: {reason}")]
    Syntax { formula: String, reason: String },
    #[error("negative amount {amount} for {symbol}")]
    NegativeAmount { symbol: String, amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "CompositionRepr", into = "BTreeMap<String, f64>")]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

/// Compositions deserialize from either a formula string or a symbol map.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompositionRepr {
    Formula(String),
    Amounts(BTreeMap<String, f64>),
}

impl TryFrom<CompositionRepr> for Composition {
    type Error = FormulaError;

    fn try_from(repr: CompositionRepr) -> Result<Self, Self::Error> {
        match repr {
            CompositionRepr::Formula(formula) => formula.parse(),
            CompositionRepr::Amounts(amounts) => Composition::from_amounts(amounts),
        }
    }
}

impl From<Composition> for BTreeMap<String, f64> {
    fn from(composition: Composition) -> Self {
        composition.amounts
    }
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a composition from (symbol, amount) pairs. Repeated symbols are
    /// summed and zero amounts are dropped.
    pub fn from_amounts<I, S>(amounts: I) -> Result<Self, FormulaError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut composition = Composition::new();
        for (symbol, amount) in amounts {
            composition.add(symbol.as_ref(), amount)?;
        }
        Ok(composition)
    }

    pub fn from_formula(formula: &str) -> Result<Self, FormulaError> {
        let mut parser = FormulaParser::new(formula);
        let amounts = parser.parse_group(0)?;
        Composition::from_amounts(amounts)
    }

    fn add(&mut self, symbol: &str, amount: f64) -> Result<(), FormulaError> {
        if !element::is_element(symbol) {
            return Err(FormulaError::UnknownElement(symbol.to_string()));
        }
        if amount < 0.0 {
            return Err(FormulaError::NegativeAmount {
                symbol: symbol.to_string(),
                amount,
            });
        }
        let total = self.amounts.entry(symbol.to_string()).or_insert(0.0);
        *total += amount;
        if total.abs() < AMOUNT_TOLERANCE {
            self.amounts.remove(symbol);
        }
        Ok(())
    }

    /// Amount of an element, zero when absent.
    pub fn get(&self, symbol: &str) -> f64 {
        self.amounts.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.amounts.contains_key(symbol)
    }

    /// Number of distinct elements.
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn is_element(&self) -> bool {
        self.amounts.len() == 1
    }

    pub fn num_atoms(&self) -> f64 {
        self.amounts.values().map(|amount| amount.abs()).sum()
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(symbol, amount)| (symbol.as_str(), *amount))
    }

    /// Element symbols ordered by increasing electronegativity, ties broken
    /// alphabetically.
    pub fn elements_by_electronegativity(&self) -> Vec<&str> {
        self.elements()
            .sorted_by(|a, b| {
                element::electronegativity(a)
                    .total_cmp(&element::electronegativity(b))
                    .then_with(|| a.cmp(b))
            })
            .collect()
    }

    pub fn most_electronegative(&self) -> Option<&str> {
        self.elements_by_electronegativity().last().copied()
    }

    /// Scale every amount by `factor`.
    pub fn scaled(&self, factor: f64) -> Composition {
        Composition {
            amounts: self
                .amounts
                .iter()
                .map(|(symbol, amount)| (symbol.clone(), amount * factor))
                .collect(),
        }
    }

    /// Formula with elements in electronegativity order, e.g. "Fe2O3".
    pub fn formula(&self) -> String {
        self.elements_by_electronegativity()
            .into_iter()
            .map(|symbol| format!("{}{}", symbol, format_amount(self.get(symbol))))
            .join("")
    }

    /// Reduced formula and the factor relating it to this composition.
    ///
    /// Compositions with non-integer amounts are not reduced. Peroxides of
    /// the alkali metals, hydrogen peroxide and the diatomic elements keep
    /// their molecular form, which halves the factor.
    pub fn reduced_formula_and_factor(&self) -> (String, f64) {
        if self.is_empty() {
            return (String::new(), 1.0);
        }
        let all_integer = self
            .amounts
            .values()
            .all(|amount| (amount - amount.round()).abs() < AMOUNT_TOLERANCE);
        if !all_integer {
            return (self.formula(), 1.0);
        }

        let factor = self
            .amounts
            .values()
            .map(|amount| amount.round().abs() as u64)
            .fold(0, gcd)
            .max(1) as f64;
        let reduced = self.scaled(1.0 / factor);
        let formula = reduced.formula();

        match SPECIAL_FORMULAS.iter().find(|(plain, _)| *plain == formula) {
            Some((_, special)) => (special.to_string(), factor / 2.0),
            None => (formula, factor),
        }
    }

    pub fn reduced_formula(&self) -> String {
        self.reduced_formula_and_factor().0
    }

    pub fn reduced_composition_and_factor(&self) -> (Composition, f64) {
        let (_, factor) = self.reduced_formula_and_factor();
        (self.scaled(1.0 / factor), factor)
    }
}

impl FromStr for Composition {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Composition::from_formula(s)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula())
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn format_amount(amount: f64) -> String {
    if (amount - 1.0).abs() < AMOUNT_TOLERANCE {
        String::new()
    } else if (amount - amount.round()).abs() < AMOUNT_TOLERANCE {
        format!("{}", amount.round() as i64)
    } else {
        format!("{}", (amount * 1e8).round() / 1e8)
    }
}

/// Recursive-descent parser for formulas such as "Fe2O3" or "Fe(OH)2".
struct FormulaParser<'a> {
    formula: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(formula: &'a str) -> Self {
        Self {
            formula,
            chars: formula.chars().filter(|c| !c.is_whitespace()).collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::Syntax {
            formula: self.formula.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_group(&mut self, depth: usize) -> Result<Vec<(String, f64)>, FormulaError> {
        let mut amounts = Vec::new();
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '(' => {
                    self.pos += 1;
                    let inner = self.parse_group(depth + 1)?;
                    if self.chars.get(self.pos) != Some(&')') {
                        return Err(self.error("unbalanced parenthesis"));
                    }
                    self.pos += 1;
                    let multiplier = self.parse_amount()?.unwrap_or(1.0);
                    amounts.extend(inner.into_iter().map(|(el, n)| (el, n * multiplier)));
                }
                ')' if depth > 0 => return Ok(amounts),
                c if c.is_ascii_uppercase() => {
                    let mut symbol = c.to_string();
                    self.pos += 1;
                    while let Some(&next) = self.chars.get(self.pos) {
                        if !next.is_ascii_lowercase() {
                            break;
                        }
                        symbol.push(next);
                        self.pos += 1;
                    }
                    let amount = self.parse_amount()?.unwrap_or(1.0);
                    amounts.push((symbol, amount));
                }
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            }
        }
        if depth > 0 {
            return Err(self.error("unbalanced parenthesis"));
        }
        Ok(amounts)
    }

    fn parse_amount(&mut self) -> Result<Option<f64>, FormulaError> {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(format!("bad amount {digits:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn comp(formula: &str) -> Composition {
        formula.parse().unwrap()
    }

    #[test]
    fn test_parse_simple_formula() {
        let fe2o3 = comp("Fe2O3");
        assert_eq!(fe2o3.get("Fe"), 2.0);
        assert_eq!(fe2o3.get("O"), 3.0);
        assert_eq!(fe2o3.get("S"), 0.0);
        assert_eq!(fe2o3.len(), 2);
        assert_relative_eq!(fe2o3.num_atoms(), 5.0);
    }

    #[test]
    fn test_parse_parentheses_and_fractions() {
        let hydrate = comp("FeO(H2O)2");
        assert_eq!(hydrate.get("H"), 4.0);
        assert_eq!(hydrate.get("O"), 3.0);

        let frac = comp("Li0.5CoO2");
        assert_relative_eq!(frac.get("Li"), 0.5);
        assert_eq!(frac.reduced_formula_and_factor().1, 1.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Composition::from_formula("Xx2"),
            Err(FormulaError::UnknownElement(_))
        ));
        assert!(matches!(
            Composition::from_formula("Fe(OH"),
            Err(FormulaError::Syntax { .. })
        ));
        assert!(matches!(
            Composition::from_formula("fe2"),
            Err(FormulaError::Syntax { .. })
        ));
    }

    #[test]
    fn test_reduced_formula() {
        assert_eq!(comp("Fe4O6").reduced_formula_and_factor(), ("Fe2O3".to_string(), 2.0));
        assert_eq!(comp("H4O2").reduced_formula(), "H2O");
        assert_eq!(comp("FeH4O3").reduced_formula(), "FeH4O3");
    }

    #[test]
    fn test_special_formulas() {
        assert_eq!(comp("O2").reduced_formula_and_factor(), ("O2".to_string(), 1.0));
        assert_eq!(comp("O8").reduced_formula_and_factor(), ("O2".to_string(), 4.0));
        assert_eq!(comp("H2").reduced_formula(), "H2");
        assert_eq!(comp("Li2O2").reduced_formula(), "Li2O2");
        assert_eq!(comp("LiO2").reduced_formula(), "LiO2");
        assert_eq!(comp("Br2").reduced_formula(), "Br");
        assert_eq!(comp("Fe").reduced_formula(), "Fe");
    }

    #[test]
    fn test_reduced_composition() {
        let (reduced, factor) = comp("O4").reduced_composition_and_factor();
        assert_eq!(factor, 2.0);
        assert_eq!(reduced.get("O"), 2.0);
    }

    #[test]
    fn test_most_electronegative() {
        assert_eq!(comp("Fe2O3").most_electronegative(), Some("O"));
        assert_eq!(comp("LiCl").most_electronegative(), Some("Cl"));
        assert_eq!(comp("Mg2Si").most_electronegative(), Some("Si"));
        assert_eq!(Composition::new().most_electronegative(), None);
    }

    #[test]
    fn test_serde_formula_or_map() {
        let from_str: Composition = serde_json::from_str("\"Fe2O3\"").unwrap();
        let from_map: Composition = serde_json::from_str(r#"{"Fe": 2.0, "O": 3.0}"#).unwrap();
        assert_eq!(from_str, from_map);
        let json = serde_json::to_string(&from_str).unwrap();
        assert_eq!(json, r#"{"Fe":2.0,"O":3.0}"#);
    }
}
