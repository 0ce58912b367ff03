//! Unit system. Energies are measured in MeV and lengths in mm, like in the transport engines
//! feeding the scorer; every other unit is expressed in terms of these two.
//!
//! A quantity `x` is written in unit `u` as `x / u`, e.g. a stopping power in keV/µm is
//! `dedx / KEV_PER_UM`.

/// One MeV.
pub const MEV: f64 = 1.0;

/// One keV.
pub const KEV: f64 = 1e-3 * MEV;

/// One millimetre.
pub const MM: f64 = 1.0;

/// One micrometre.
pub const UM: f64 = 1e-3 * MM;

/// One centimetre.
pub const CM: f64 = 10.0 * MM;

/// One square centimetre.
pub const CM2: f64 = CM * CM;

/// One cubic millimetre.
pub const MM3: f64 = MM * MM * MM;

/// Unit of the LET outputs.
pub const KEV_PER_UM: f64 = KEV / UM;

/// Unit of the fluence output.
pub const PER_CM2: f64 = 1.0 / CM2;
