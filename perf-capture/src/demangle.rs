//! Demangling of raw function names from symbol lookups

/// Turns a raw (possibly mangled) symbol name into its display form
pub trait Demangler: Send + Sync {
    fn demangle(&self, raw: &str) -> String;
}

/// Demangler for Rust symbols (legacy and v0 manglings)
///
/// Uses the alternate format, which drops the trailing `::h<hash>`.
/// Names that are not Rust-mangled are returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustcDemangler;

impl Demangler for RustcDemangler {
    fn demangle(&self, raw: &str) -> String {
        format!("{:#}", rustc_demangle::demangle(raw))
    }
}

impl<F> Demangler for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn demangle(&self, raw: &str) -> String {
        self(raw)
    }
}
