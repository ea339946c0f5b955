/// Tunables for one analysis pass (spec.md §4.5, §5).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// A `match` that doesn't cover every constructor of its scrutinee's enum
    /// is a hard error by default; set to `false` to downgrade it to a
    /// warning (useful for IDE-style incremental analysis where the user is
    /// still typing out the match).
    pub non_exhaustive_match_is_error: bool,
    /// Recursion bound for on-demand monomorphization bookkeeping performed
    /// during analysis (mirrors the compiler's specialization-depth guard,
    /// spec.md §4.6).
    pub max_specialization_depth: usize,
    /// When true, diagnostics and generated names avoid any source of
    /// non-determinism (no absolute paths, no incidental counters beyond the
    /// deterministic per-analysis node counter) so two runs over identical
    /// input produce byte-identical output (spec.md §8).
    pub deterministic_naming: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { non_exhaustive_match_is_error: true, max_specialization_depth: 8, deterministic_naming: false }
    }
}

impl AnalyzerConfig {
    pub fn test_mode() -> Self {
        Self { deterministic_naming: true, ..Self::default() }
    }
}
