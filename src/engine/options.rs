//! Solver configuration.

/// Dialect of the emitted certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateFormat {
    /// QAIGER-style certificates with symbol annotations.
    Qaiger,
    /// QBFcert-compatible output (ASCII only).
    Qbfcert,
    /// CAQE-style certificates.
    #[default]
    Caqecert,
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Seed for the random number generator.
    pub seed: u64,

    // Computational engines
    pub cegar: bool,
    pub cegar_only: bool,
    pub case_splits: bool,
    pub sat_by_qbf: bool,
    /// Number of concurrently maintained partial-assignment workers.
    pub max_examples: usize,

    // Certificates
    pub certificate_format: CertificateFormat,
    pub functional_synthesis: bool,
    pub quantifier_elimination: bool,

    // Optimizations
    pub minimize_learnt_clauses: bool,
    pub pure_literals: bool,
    pub enhanced_pure_literals: bool,
    pub delete_clauses_on_restarts: bool,

    /// More conservative defaults that are easier to debug.
    pub easy_debugging: bool,
    /// Give up with `Unknown` after this many decisions.
    pub hard_decision_limit: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: 0,
            cegar: true,
            cegar_only: false,
            case_splits: false,
            sat_by_qbf: false,
            max_examples: 0,
            certificate_format: CertificateFormat::default(),
            functional_synthesis: false,
            quantifier_elimination: false,
            minimize_learnt_clauses: true,
            pure_literals: true,
            enhanced_pure_literals: false,
            delete_clauses_on_restarts: false,
            easy_debugging: false,
            hard_decision_limit: None,
        }
    }
}
