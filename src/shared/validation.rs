use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for administrative codes on geo nodes
    /// Alphanumeric segments separated by a single dot or hyphen
    /// - Valid: "32", "32.73", "32.73.01.1001", "ID-JB", "US"
    /// - Invalid: ".32", "32.", "32..73", "32 73", "32_73"
    pub static ref GEO_CODE_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9]+(?:[.\-][A-Za-z0-9]+)*$").unwrap();
}
