//! Periodic crystal structures
//!
//! Only what the anion classifiers need: a lattice, fractional site
//! coordinates and periodic distances.

use crate::composition::{Composition, FormulaError};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub species: String,
    pub frac_coords: Vector3<f64>,
}

impl Site {
    pub fn new(species: impl Into<String>, frac_coords: [f64; 3]) -> Self {
        Self {
            species: species.into(),
            frac_coords: Vector3::from(frac_coords),
        }
    }
}

/// Lattice vectors are the rows of `lattice`, in Angstrom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StructureRepr", into = "StructureRepr")]
pub struct Structure {
    pub lattice: Matrix3<f64>,
    pub sites: Vec<Site>,
}

#[derive(Serialize, Deserialize)]
struct SiteRepr {
    species: String,
    frac_coords: [f64; 3],
}

#[derive(Serialize, Deserialize)]
struct StructureRepr {
    lattice: [[f64; 3]; 3],
    sites: Vec<SiteRepr>,
}

impl From<StructureRepr> for Structure {
    fn from(repr: StructureRepr) -> Self {
        let sites = repr
            .sites
            .into_iter()
            .map(|s| Site::new(s.species, s.frac_coords))
            .collect();
        Structure::new(repr.lattice, sites)
    }
}

impl From<Structure> for StructureRepr {
    fn from(structure: Structure) -> Self {
        let row = |i: usize| {
            let r = structure.lattice.row(i);
            [r[0], r[1], r[2]]
        };
        StructureRepr {
            lattice: [row(0), row(1), row(2)],
            sites: structure
                .sites
                .iter()
                .map(|s| SiteRepr {
                    species: s.species.clone(),
                    frac_coords: [s.frac_coords.x, s.frac_coords.y, s.frac_coords.z],
                })
                .collect(),
        }
    }
}

impl Structure {
    pub fn new(lattice: [[f64; 3]; 3], sites: Vec<Site>) -> Self {
        let rows = lattice.map(|row| Vector3::from(row).transpose());
        Structure {
            lattice: Matrix3::from_rows(&rows),
            sites,
        }
    }

    /// Orthorhombic cell with the given edge lengths.
    pub fn orthorhombic(a: f64, b: f64, c: f64, sites: Vec<Site>) -> Self {
        Structure {
            lattice: Matrix3::from_diagonal(&Vector3::new(a, b, c)),
            sites,
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn composition(&self) -> Result<Composition, FormulaError> {
        Composition::from_amounts(self.sites.iter().map(|s| (s.species.as_str(), 1.0)))
    }

    /// Indices of the sites occupied by `species`.
    pub fn indices_of(&self, species: &str) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.species == species)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.lattice.transpose() * frac
    }

    /// Shortest distance between two sites over all periodic images.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let mut d = self.sites[j].frac_coords - self.sites[i].frac_coords;
        d.apply(|x| *x -= (*x).round());
        // wrapping alone is not enough for skewed cells, so check the
        // neighbouring images too
        let mut best = f64::INFINITY;
        for image in images(1) {
            best = best.min(self.cartesian(&(d + image)).norm());
        }
        best
    }
}

fn images(reach: i32) -> impl Iterator<Item = Vector3<f64>> {
    (-reach..=reach).flat_map(move |a| {
        (-reach..=reach).flat_map(move |b| {
            (-reach..=reach).map(move |c| Vector3::new(a as f64, b as f64, c as f64))
        })
    })
}
