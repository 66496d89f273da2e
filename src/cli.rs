//! Argument helpers shared by the binaries

use crate::config::parse_byte_size;
use crate::model::TimeBoundingBox;
use std::ffi::OsString;

/// Rewrite the historical single-dash options into their long forms
///
/// `-nc N` → `--fanout N`, `-ls SIZE` → `--leaf-size SIZE`,
/// `-tc` → `--order-check strict`, `-tcc` → `--order-check lenient`,
/// `-r IDS` → `--remove IDS`. Everything else passes through untouched.
pub fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    for arg in args {
        match arg.to_str() {
            Some("-nc") => out.push("--fanout".into()),
            Some("-ls") => out.push("--leaf-size".into()),
            Some("-r") => out.push("--remove".into()),
            Some("-tc") => {
                out.push("--order-check".into());
                out.push("strict".into());
            }
            Some("-tcc") => {
                out.push("--order-check".into());
                out.push("lenient".into());
            }
            _ => out.push(arg),
        }
    }
    out
}

/// clap value parser for `--leaf-size`
pub fn leaf_size(s: &str) -> Result<u64, String> {
    match parse_byte_size(s) {
        Ok(0) => Err("leaf size must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Query window from optional bounds; missing bounds are open
pub fn window(start: Option<f64>, end: Option<f64>) -> Result<TimeBoundingBox, String> {
    let earliest = start.unwrap_or(f64::NEG_INFINITY);
    let latest = end.unwrap_or(f64::INFINITY);
    TimeBoundingBox::try_new(earliest, latest)
        .ok_or_else(|| format!("window start {} is after its end {}", earliest, latest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_legacy_flags_rewritten() {
        let got = normalize_legacy_args(args(&["clog2slog2", "-nc", "4", "-ls", "8k", "-tc", "-r", "3,5", "in.clog2"]));
        assert_eq!(
            got,
            args(&[
                "clog2slog2",
                "--fanout",
                "4",
                "--leaf-size",
                "8k",
                "--order-check",
                "strict",
                "--remove",
                "3,5",
                "in.clog2"
            ])
        );
    }

    #[test]
    fn test_modern_flags_untouched() {
        let list = args(&["slog2filter", "-o", "out.slog2", "--coalesce", "in.slog2"]);
        assert_eq!(normalize_legacy_args(list.clone()), list);
    }

    #[test]
    fn test_leaf_size() {
        assert_eq!(leaf_size("64K"), Ok(65536));
        assert!(leaf_size("0").is_err());
        assert!(leaf_size("big").is_err());
    }

    #[test]
    fn test_window() {
        assert_eq!(window(None, None).unwrap().earliest, f64::NEG_INFINITY);
        assert_eq!(window(Some(1.0), Some(2.0)).unwrap(), TimeBoundingBox::new(1.0, 2.0));
        assert!(window(Some(3.0), Some(2.0)).is_err());
    }
}
