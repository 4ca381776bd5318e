// Spectrum-based suspiciousness ranking
//
// Failing and passing coverage sets are folded into per-statement spectrum
// counts, scored with one SBFL formula, averaged per file, and ranked.
//
// References:
// - Abreu et al. (2007) "On the Accuracy of Spectrum-based Fault Localization"
// - Wong et al. (2014) "The DStar Method for Effective Software Fault Localization"
// - Naish et al. (2011) "A Model for Spectra-based Software Diagnosis" (Op2)

mod counts;
mod formula;
mod ranker;

pub use counts::{compute_spectrum, SpectrumCounts};
pub use formula::SbflFormula;
pub use ranker::{FileScores, SpectrumRanker};

#[cfg(test)]
mod tests;
