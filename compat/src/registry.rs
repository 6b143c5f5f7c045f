//! Scheme construction with an explicit cache
//!
//! Building a scheme reads and validates its tables. The registry builds
//! each distinct configuration once and hands out shared instances until it
//! is cleared.

use crate::aqueous::{AqueousCompatibility, AqueousReferences};
use crate::compatibility::{Compatibility, SchemeOptions};
use crate::corrections_list::CorrectionsList;
use crate::error::ConfigError;
use crate::mp2020::Mp2020Compatibility;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    Mp2020,
    MaterialsProject,
    Mit,
    MitAqueous,
    /// MP2020 followed by aqueous free energy referencing.
    Aqueous,
}

impl FromStr for SchemeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp2020" => Ok(Self::Mp2020),
            "mp" | "materials_project" => Ok(Self::MaterialsProject),
            "mit" => Ok(Self::Mit),
            "mit_aqueous" => Ok(Self::MitAqueous),
            "aqueous" => Ok(Self::Aqueous),
            _ => Err(ConfigError::UnknownScheme(s.to_string())),
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemeKind::Mp2020 => "mp2020",
            SchemeKind::MaterialsProject => "mp",
            SchemeKind::Mit => "mit",
            SchemeKind::MitAqueous => "mit_aqueous",
            SchemeKind::Aqueous => "aqueous",
        };
        f.write_str(name)
    }
}

type ReferenceKey = [Option<u64>; 3];

fn reference_key(references: &AqueousReferences) -> ReferenceKey {
    [
        references.o2_energy.map(f64::to_bits),
        references.h2o_energy.map(f64::to_bits),
        references.h2o_adjustments.map(f64::to_bits),
    ]
}

pub struct SchemeRegistry {
    potcar_checks: bool,
    mp2020: HashMap<SchemeOptions, Arc<Mp2020Compatibility>>,
    lists: HashMap<(SchemeKind, SchemeOptions), Arc<CorrectionsList>>,
    aqueous: HashMap<(SchemeOptions, ReferenceKey), Arc<AqueousCompatibility>>,
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self {
            potcar_checks: true,
            mp2020: HashMap::new(),
            lists: HashMap::new(),
            aqueous: HashMap::new(),
        }
    }

    /// When false, no scheme built by this registry checks POTCARs.
    pub fn with_potcar_checks(mut self, enabled: bool) -> Self {
        self.potcar_checks = enabled;
        self
    }

    fn effective(&self, options: &SchemeOptions) -> SchemeOptions {
        let mut options = options.clone();
        options.check_potcar &= self.potcar_checks;
        options
    }

    pub fn mp2020(&mut self, options: &SchemeOptions) -> Result<Arc<Mp2020Compatibility>, ConfigError> {
        let options = self.effective(options);
        if let Some(scheme) = self.mp2020.get(&options) {
            return Ok(scheme.clone());
        }
        info!("Building MP2020 scheme with {:?}", options);
        let scheme = Arc::new(Mp2020Compatibility::new(&options)?);
        self.mp2020.insert(options, scheme.clone());
        Ok(scheme)
    }

    fn list(
        &mut self,
        kind: SchemeKind,
        options: &SchemeOptions,
        build: fn(&SchemeOptions) -> Result<CorrectionsList, ConfigError>,
    ) -> Result<Arc<CorrectionsList>, ConfigError> {
        let key = (kind, self.effective(options));
        if let Some(scheme) = self.lists.get(&key) {
            return Ok(scheme.clone());
        }
        info!("Building {} scheme with {:?}", kind, key.1);
        let scheme = Arc::new(build(&key.1)?);
        self.lists.insert(key, scheme.clone());
        Ok(scheme)
    }

    pub fn materials_project(
        &mut self,
        options: &SchemeOptions,
    ) -> Result<Arc<CorrectionsList>, ConfigError> {
        self.list(SchemeKind::MaterialsProject, options, CorrectionsList::materials_project)
    }

    pub fn mit(&mut self, options: &SchemeOptions) -> Result<Arc<CorrectionsList>, ConfigError> {
        self.list(SchemeKind::Mit, options, CorrectionsList::mit)
    }

    pub fn mit_aqueous(&mut self, options: &SchemeOptions) -> Result<Arc<CorrectionsList>, ConfigError> {
        self.list(SchemeKind::MitAqueous, options, CorrectionsList::mit_aqueous)
    }

    /// Aqueous referencing on top of the MP2020 scheme built from `options`.
    pub fn aqueous(
        &mut self,
        options: &SchemeOptions,
        references: AqueousReferences,
    ) -> Result<Arc<AqueousCompatibility>, ConfigError> {
        let key = (self.effective(options), reference_key(&references));
        if let Some(scheme) = self.aqueous.get(&key) {
            return Ok(scheme.clone());
        }
        let solid: Arc<dyn Compatibility> = self.mp2020(options)?;
        let scheme = Arc::new(AqueousCompatibility::new(Some(solid), references));
        self.aqueous.insert(key, scheme.clone());
        Ok(scheme)
    }

    /// `references` is only used by [`SchemeKind::Aqueous`].
    pub fn build(
        &mut self,
        kind: SchemeKind,
        options: &SchemeOptions,
        references: AqueousReferences,
    ) -> Result<Arc<dyn Compatibility>, ConfigError> {
        let scheme: Arc<dyn Compatibility> = match kind {
            SchemeKind::Mp2020 => self.mp2020(options)?,
            SchemeKind::MaterialsProject => self.materials_project(options)?,
            SchemeKind::Mit => self.mit(options)?,
            SchemeKind::MitAqueous => self.mit_aqueous(options)?,
            SchemeKind::Aqueous => self.aqueous(options, references)?,
        };
        Ok(scheme)
    }

    /// Number of cached schemes.
    pub fn len(&self) -> usize {
        self.mp2020.len() + self.lists.len() + self.aqueous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.mp2020.clear();
        self.lists.clear();
        self.aqueous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::CompatType;
    use entries::{CalcParameters, ComputedEntry};

    #[test]
    fn test_same_options_share_instance() {
        let mut registry = SchemeRegistry::new();
        let options = SchemeOptions::default();
        let first = registry.mp2020(&options).unwrap();
        let second = registry.mp2020(&options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let gga = SchemeOptions {
            compat_type: CompatType::Gga,
            ..Default::default()
        };
        let third = registry.mp2020(&gga).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clear_invalidates() {
        let mut registry = SchemeRegistry::new();
        let options = SchemeOptions::default();
        let first = registry.materials_project(&options).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        let second = registry.materials_project(&options).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_aqueous_reuses_solid_scheme() {
        let mut registry = SchemeRegistry::new();
        let options = SchemeOptions::default();
        let references = AqueousReferences::new(-4.9, -4.7, -0.23);
        let aqueous = registry.aqueous(&options, references).unwrap();
        let again = registry.aqueous(&options, references).unwrap();
        assert!(Arc::ptr_eq(&aqueous, &again));
        assert_eq!(registry.len(), 2);
        assert_eq!(aqueous.solid().unwrap().name(), "MaterialsProject2020Compatibility");
    }

    #[test]
    fn test_potcar_checks_switch() {
        let mut registry = SchemeRegistry::new().with_potcar_checks(false);
        let scheme = registry
            .build(SchemeKind::Mp2020, &SchemeOptions::default(), AqueousReferences::default())
            .unwrap();
        let mut nacl = ComputedEntry::new("NaCl".parse().unwrap(), -7.0).with_parameters(
            CalcParameters {
                run_type: Some("GGA".into()),
                ..Default::default()
            },
        );
        assert!(scheme.get_adjustments(&mut nacl).is_ok());
    }

    #[test]
    fn test_scheme_kind_parsing() {
        assert_eq!("MP2020".parse::<SchemeKind>().unwrap(), SchemeKind::Mp2020);
        assert_eq!("materials_project".parse::<SchemeKind>().unwrap(), SchemeKind::MaterialsProject);
        assert_eq!("mit_aqueous".parse::<SchemeKind>().unwrap(), SchemeKind::MitAqueous);
        assert!(matches!("mp2021".parse::<SchemeKind>(), Err(ConfigError::UnknownScheme(_))));
    }
}
