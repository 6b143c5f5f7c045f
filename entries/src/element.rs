//! Element lookups backed by the mendeleev periodic table

use mendeleev::Element;

/// Resolve an element symbol such as "Fe" into the periodic-table enum.
pub fn lookup(symbol: &str) -> Option<Element> {
    // the enum variants are named by symbol, so serde does the matching
    serde_json::from_value::<Element>(serde_json::Value::String(symbol.to_string())).ok()
}

pub fn is_element(symbol: &str) -> bool {
    lookup(symbol).is_some()
}

/// Pauling electronegativity of an element.
///
/// Elements without a tabulated value (He, Ne, Ar) and unknown symbols sort
/// as 0.0, i.e. least electronegative.
pub fn electronegativity(symbol: &str) -> f64 {
    lookup(symbol)
        .and_then(|element| element.electronegativity_pauling())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_symbols() {
        assert!(is_element("Fe"));
        assert!(is_element("O"));
        assert!(!is_element("Xx"));
        assert!(!is_element("fe"));
    }

    #[test]
    fn test_electronegativity_ordering() {
        assert!(electronegativity("O") > electronegativity("Fe"));
        assert!(electronegativity("F") > electronegativity("O"));
        assert!(electronegativity("S") > electronegativity("H"));
        assert_eq!(electronegativity("Xx"), 0.0);
    }
}
