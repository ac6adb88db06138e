//! Built-in formulary: protocol drugs, common bedside medications and
//! procedures.

use crate::types::{DoseUnit, Drug, Procedure};
use once_cell::sync::Lazy;

/// Cached formulary - built once and shared by the engine and the CLI
static FORMULARY: Lazy<Formulary> = Lazy::new(build_formulary);

/// Standard shock energies offered to the operator (Joules)
pub const SHOCK_ENERGY_OPTIONS: [u16; 6] = [120, 150, 200, 250, 300, 360];

/// Dosing definition for a protocol drug
#[derive(Clone, Debug)]
pub struct DrugProtocol {
    pub drug: Drug,
    pub unit: DoseUnit,
    /// Doses in administration order; the last one repeats
    pub standard_doses: Vec<f64>,
    /// Maximum cumulative dose, `None` when only the count is unbounded
    pub ceiling: Option<f64>,
    /// Only the standard unit dose may be given
    pub fixed_dose: bool,
}

impl DrugProtocol {
    /// Standard dose for the n-th administration (0-based)
    pub fn standard_dose(&self, sequence: u32) -> f64 {
        let idx = (sequence as usize).min(self.standard_doses.len().saturating_sub(1));
        self.standard_doses.get(idx).copied().unwrap_or(0.0)
    }
}

/// A frequently used non-protocol medication
#[derive(Clone, Debug)]
pub struct CommonMedication {
    pub short: &'static str,
    pub full: &'static str,
}

/// The complete formulary
#[derive(Clone, Debug)]
pub struct Formulary {
    adrenaline: DrugProtocol,
    amiodarone: DrugProtocol,
    lidocaine: DrugProtocol,
    pub common_medications: Vec<CommonMedication>,
}

impl Formulary {
    pub fn protocol(&self, drug: Drug) -> &DrugProtocol {
        match drug {
            Drug::Adrenaline => &self.adrenaline,
            Drug::Amiodarone => &self.amiodarone,
            Drug::Lidocaine => &self.lidocaine,
        }
    }

    /// Look up a common medication by its short code (case-insensitive)
    pub fn common_medication(&self, short: &str) -> Option<&CommonMedication> {
        self.common_medications
            .iter()
            .find(|m| m.short.eq_ignore_ascii_case(short.trim()))
    }

    pub fn procedure_name(&self, procedure: Procedure) -> &'static str {
        match procedure {
            Procedure::ArterialLine => "A line insertion",
            Procedure::CentralLine => "Central line insertion",
            Procedure::Intubation => "Endotracheal intubation",
            Procedure::Echo => "Bedside echocardiography",
            Procedure::Ecmo => "ECMO insertion",
        }
    }
}

/// Get a reference to the cached formulary
pub fn formulary() -> &'static Formulary {
    &FORMULARY
}

fn build_formulary() -> Formulary {
    Formulary {
        adrenaline: DrugProtocol {
            drug: Drug::Adrenaline,
            unit: DoseUnit::Mg,
            standard_doses: vec![1.0],
            ceiling: None,
            fixed_dose: true,
        },
        amiodarone: DrugProtocol {
            drug: Drug::Amiodarone,
            unit: DoseUnit::Mg,
            standard_doses: vec![300.0, 150.0],
            ceiling: Some(450.0),
            fixed_dose: false,
        },
        lidocaine: DrugProtocol {
            drug: Drug::Lidocaine,
            unit: DoseUnit::MgPerKg,
            standard_doses: vec![1.5, 0.75],
            ceiling: Some(3.0),
            fixed_dose: false,
        },
        common_medications: vec![
            CommonMedication {
                short: "Bicarb",
                full: "7.5% Sodium Bicarbonate 50 mg IV",
            },
            CommonMedication {
                short: "Ca",
                full: "10% Calcium Gluconate 10 ml IV",
            },
            CommonMedication {
                short: "Glu",
                full: "50% Glucose 50 ml IV",
            },
            CommonMedication {
                short: "Mg",
                full: "50% Magnesium Sulfate 2 ml IV",
            },
            CommonMedication {
                short: "KCl",
                full: "KCl 40 mEq in 5%DW 100 ml in 1 hour",
            },
            CommonMedication {
                short: "Atropine",
                full: "Atropine 0.6 mg IV",
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceilings() {
        let f = formulary();
        assert_eq!(f.protocol(Drug::Adrenaline).ceiling, None);
        assert_eq!(f.protocol(Drug::Amiodarone).ceiling, Some(450.0));
        assert_eq!(f.protocol(Drug::Lidocaine).ceiling, Some(3.0));
        assert_eq!(f.protocol(Drug::Lidocaine).unit, DoseUnit::MgPerKg);
        assert!(f.protocol(Drug::Adrenaline).fixed_dose);
        assert!(!f.protocol(Drug::Amiodarone).fixed_dose);
    }

    #[test]
    fn test_standard_dose_repeats_last() {
        let amio = formulary().protocol(Drug::Amiodarone);
        assert_eq!(amio.standard_dose(0), 300.0);
        assert_eq!(amio.standard_dose(1), 150.0);
        assert_eq!(amio.standard_dose(7), 150.0);
        assert_eq!(formulary().protocol(Drug::Adrenaline).standard_dose(12), 1.0);
    }

    #[test]
    fn test_common_medication_lookup() {
        let med = formulary().common_medication("kcl").unwrap();
        assert!(med.full.starts_with("KCl 40 mEq"));
        assert!(formulary().common_medication("unknown").is_none());
    }
}
