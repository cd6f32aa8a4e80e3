//! Physical constants and unit conversions.
//!
//! Every quantity crossing a stage boundary is in SI (J, m, kg, s) unless
//! the name says otherwise. The optimizer works in analysis units: track
//! length in nm and event rates per kg·Myr·nm.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;

pub const JOULES_PER_EV: f64 = 1.602_176_634e-19;
pub const JOULES_PER_KEV: f64 = JOULES_PER_EV * 1e3;
pub const JOULES_PER_MEV: f64 = JOULES_PER_EV * 1e6;
pub const JOULES_PER_GEV: f64 = JOULES_PER_EV * 1e9;

pub const METERS_PER_ANGSTROM: f64 = 1e-10;
pub const METERS_PER_NM: f64 = 1e-9;
pub const SQ_METERS_PER_SQ_CM: f64 = 1e-4;
pub const CUBIC_METERS_PER_CUBIC_CM: f64 = 1e-6;

pub const SECONDS_PER_MYR: f64 = 3.1536e13;

/// Atomic mass unit, 931.494 MeV/c².
pub const ATOMIC_MASS_UNIT_KG: f64 = 1.660_539_066_60e-27;

/// Nucleon mass used in the per-nucleon reduced mass, 939 MeV/c².
pub const NUCLEON_MASS_GEV: f64 = 0.939;

pub const HBAR_C_GEV_FM: f64 = 0.197_326_980_4;
pub const HBAR_C_GEV_M: f64 = HBAR_C_GEV_FM * 1e-15;

pub const FERMI_CONSTANT_PER_GEV2: f64 = 1.166_378_7e-5;

/// Low-energy weak mixing angle.
pub const SIN2_THETA_WEAK: f64 = 0.2386;

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

pub fn kev_to_joules(kev: f64) -> f64 {
    kev * JOULES_PER_KEV
}

pub fn mev_to_joules(mev: f64) -> f64 {
    mev * JOULES_PER_MEV
}

pub fn joules_to_gev(joules: f64) -> f64 {
    joules / JOULES_PER_GEV
}

// ---------------------------------------------------------------------------
// Mass
// ---------------------------------------------------------------------------

/// Rest mass in kg of a particle with rest energy `gev`.
pub fn gev_to_kg(gev: f64) -> f64 {
    gev * JOULES_PER_GEV / (SPEED_OF_LIGHT_M_PER_S * SPEED_OF_LIGHT_M_PER_S)
}

pub fn kg_to_gev(kg: f64) -> f64 {
    kg * SPEED_OF_LIGHT_M_PER_S * SPEED_OF_LIGHT_M_PER_S / JOULES_PER_GEV
}

pub fn amu_to_kg(amu: f64) -> f64 {
    amu * ATOMIC_MASS_UNIT_KG
}

/// Rest energy m·c² in J.
pub fn rest_energy_joules(mass_kg: f64) -> f64 {
    mass_kg * SPEED_OF_LIGHT_M_PER_S * SPEED_OF_LIGHT_M_PER_S
}

// ---------------------------------------------------------------------------
// Length, area, density
// ---------------------------------------------------------------------------

pub fn meters_to_nm(meters: f64) -> f64 {
    meters / METERS_PER_NM
}

pub fn nm_to_meters(nm: f64) -> f64 {
    nm * METERS_PER_NM
}

pub fn cm2_to_m2(cm2: f64) -> f64 {
    cm2 * SQ_METERS_PER_SQ_CM
}

pub fn km_per_s_to_m_per_s(km_per_s: f64) -> f64 {
    km_per_s * 1e3
}

/// Number density in 1/m³ from a mass density in GeV/cm³ and a particle
/// mass in GeV.
pub fn number_density_per_m3(density_gev_per_cm3: f64, mass_gev: f64) -> f64 {
    density_gev_per_cm3 / mass_gev / CUBIC_METERS_PER_CUBIC_CM
}

// ---------------------------------------------------------------------------
// Tabulated inputs
// ---------------------------------------------------------------------------

/// Stopping power from eV/Å (stopping-power table convention) to J/m.
pub fn ev_per_angstrom_to_joules_per_meter(ev_per_angstrom: f64) -> f64 {
    ev_per_angstrom * JOULES_PER_EV / METERS_PER_ANGSTROM
}

/// Differential flux from 1/(cm² s MeV) to 1/(m² s J).
pub fn per_cm2_s_mev_to_per_m2_s_j(flux: f64) -> f64 {
    flux / SQ_METERS_PER_SQ_CM / JOULES_PER_MEV
}

/// Differential rate from 1/(kg s m) to 1/(kg Myr nm).
pub fn rate_si_to_per_kg_myr_nm(rate: f64) -> f64 {
    rate * SECONDS_PER_MYR * METERS_PER_NM
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_round_trip_through_gev() {
        let proton_kg = amu_to_kg(1.008);
        let gev = kg_to_gev(proton_kg);
        assert_relative_eq!(gev, 0.9389, epsilon = 1e-3);
        assert_relative_eq!(gev_to_kg(gev), proton_kg, max_relative = 1e-12);
    }

    #[test]
    fn test_stopping_power_conversion() {
        // 1 eV/Å = 1.602e-9 J/m
        assert_relative_eq!(
            ev_per_angstrom_to_joules_per_meter(1.0),
            1.602_176_634e-9,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_rate_conversion_matches_reference_factor() {
        // 1/(kg s m) → 1/(kg Myr nm) is the 3.1536e4 factor of the analysis.
        assert_relative_eq!(rate_si_to_per_kg_myr_nm(1.0), 3.1536e4, max_relative = 1e-12);
    }

    #[test]
    fn test_number_density() {
        // 0.4 GeV/cm³ of 100 GeV particles → 4000 per m³
        assert_relative_eq!(number_density_per_m3(0.4, 100.0), 4000.0, max_relative = 1e-12);
    }
}
