//! Banner projection.
//!
//! [`project`] is a pure function of the engine state and is recomputed
//! after every tick and action. It never mutates anything.

use crate::audio::AlertSound;
use crate::medication::{
    amiodarone_supplement_threshold, lidocaine_shock_threshold, Medications,
    AMIODARONE_LOADING_SHOCKS,
};
use crate::session::Session;
use crate::types::{AdrenalineFrequency, Drug, Mode};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "drug", rename_all = "snake_case")]
pub enum BannerKind {
    Compressor,
    PulseCheck,
    Medication(Drug),
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BannerStatus {
    Pending,
    Active,
    Completed,
}

/// One user-facing reminder
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Banner {
    pub kind: BannerKind,
    pub label: String,
    pub timing: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<f64>,
    pub status: BannerStatus,
}

impl Banner {
    pub fn is_active(&self) -> bool {
        self.status == BannerStatus::Active
    }

    /// Sound cue for this banner, if it is audible at all
    pub fn sound(&self) -> Option<AlertSound> {
        match self.kind {
            BannerKind::Compressor => None,
            BannerKind::PulseCheck => Some(AlertSound::PulseCheck),
            BannerKind::Medication(drug) => Some(AlertSound::for_drug(drug)),
        }
    }
}

/// Read-only view of the state the projection depends on
#[derive(Clone, Copy, Debug)]
pub struct ProjectionInput<'a> {
    pub session: &'a Session,
    pub medications: &'a Medications,
    pub adrenaline_frequency: AdrenalineFrequency,
}

/// Build the ordered banner list: compressor, pulse check, then drugs
pub fn project(input: &ProjectionInput<'_>) -> Vec<Banner> {
    let mut banners = vec![compressor_banner(input.session), pulse_banner(input.session)];

    banners.push(adrenaline_banner(input));
    banners.push(amiodarone_banner(input));
    if let Some(banner) = lidocaine_banner(input) {
        banners.push(banner);
    }
    banners
}

fn compressor_banner(session: &Session) -> Banner {
    let cycle = session.cycle_number;
    let status = if session.mechanical_cpr {
        BannerStatus::Pending
    } else if session.is_active() && session.is_prompt_window() && session.compressor_changes < cycle {
        BannerStatus::Active
    } else if session.compressor_changes >= cycle {
        BannerStatus::Completed
    } else {
        BannerStatus::Pending
    };

    Banner {
        kind: BannerKind::Compressor,
        label: if session.mechanical_cpr {
            "Resume Chest Compressor".to_string()
        } else {
            "Change Compressor".to_string()
        },
        timing: "Every cycle".to_string(),
        dose: None,
        status,
    }
}

fn pulse_banner(session: &Session) -> Banner {
    let status = if session.pulse_checked_this_cycle() {
        BannerStatus::Completed
    } else if session.is_active() && session.is_prompt_window() {
        BannerStatus::Active
    } else {
        BannerStatus::Pending
    };

    Banner {
        kind: BannerKind::PulseCheck,
        label: "Pulse Check".to_string(),
        timing: "< 10 seconds".to_string(),
        dose: None,
        status,
    }
}

/// Drug banners are only ever active while coaching an active session
fn drug_status(input: &ProjectionInput<'_>, drug: Drug) -> BannerStatus {
    let tracker = input.medications.get(drug);
    if input.session.mode == Mode::Track {
        return BannerStatus::Pending;
    }
    if tracker.ceiling_reached() {
        return BannerStatus::Completed;
    }
    if input.session.is_active() && tracker.is_due() {
        return BannerStatus::Active;
    }
    if drug == Drug::Adrenaline && tracker.dose_sequence > 0 {
        BannerStatus::Completed
    } else {
        BannerStatus::Pending
    }
}

fn adrenaline_banner(input: &ProjectionInput<'_>) -> Banner {
    Banner {
        kind: BannerKind::Medication(Drug::Adrenaline),
        label: "Adrenaline 1mg".to_string(),
        timing: format!("Every {} min", input.adrenaline_frequency.minutes()),
        dose: input.medications.adrenaline.next_dose(),
        status: drug_status(input, Drug::Adrenaline),
    }
}

fn amiodarone_banner(input: &ProjectionInput<'_>) -> Banner {
    let amio = &input.medications.amiodarone;
    let (label, timing) = match amio.next_dose() {
        None => (
            format!("Amiodarone {}mg total", amio.cumulative_dose),
            "Complete".to_string(),
        ),
        Some(dose) if amio.dose_sequence == 0 => (
            format!("Amiodarone {}mg", dose),
            format!("After shock {}", AMIODARONE_LOADING_SHOCKS),
        ),
        Some(dose) => (
            format!("Amiodarone {}mg", dose),
            format!("After shock {}", amiodarone_supplement_threshold(amio)),
        ),
    };

    Banner {
        kind: BannerKind::Medication(Drug::Amiodarone),
        label,
        timing,
        dose: amio.next_dose(),
        status: drug_status(input, Drug::Amiodarone),
    }
}

/// Shown once relevant: in track mode, after amiodarone completes, or
/// once any lidocaine has been given
fn lidocaine_banner(input: &ProjectionInput<'_>) -> Option<Banner> {
    let lido = &input.medications.lidocaine;
    let mode = input.session.mode;
    let relevant = mode == Mode::Track
        || input.medications.amiodarone.ceiling_reached()
        || lido.dose_sequence > 0;
    if !relevant {
        return None;
    }

    let (label, timing) = match lido.next_dose() {
        None => (
            format!("Lidocaine {}mg/kg total", lido.cumulative_dose),
            "Complete".to_string(),
        ),
        Some(dose) => {
            let timing = match mode {
                Mode::Coach => "Every 6 min".to_string(),
                Mode::Track => format!("At shock {}", lidocaine_shock_threshold(lido.dose_sequence)),
            };
            (format!("Lidocaine {}mg/kg", dose), timing)
        }
    };

    Some(Banner {
        kind: BannerKind::Medication(Drug::Lidocaine),
        label,
        timing,
        dose: lido.next_dose(),
        status: drug_status(input, Drug::Lidocaine),
    })
}
